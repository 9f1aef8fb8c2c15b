//! Inbound update payloads, classification and command extraction.
//!
//! Only the fields the dispatcher reads are modelled; everything else in the
//! Bot API payload is ignored during deserialization.

use serde::{Deserialize, Serialize};

/// One inbound event as delivered to the webhook.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    pub message: Option<Message>,
    pub business_message: Option<Message>,
    pub inline_query: Option<InlineQuery>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    /// Present on business messages only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_connection_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PhotoSize {
    pub file_id: String,
    pub file_unique_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Document {
    pub file_id: String,
    pub file_unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct InlineQuery {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    pub query: String,
    pub offset: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

/// The closed set of update variants the dispatcher routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Message,
    Photo,
    Document,
    Inline,
    Callback,
    BusinessMessage,
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateKind::Message => write!(f, "message"),
            UpdateKind::Photo => write!(f, "photo"),
            UpdateKind::Document => write!(f, "document"),
            UpdateKind::Inline => write!(f, "inline"),
            UpdateKind::Callback => write!(f, "callback"),
            UpdateKind::BusinessMessage => write!(f, "business_message"),
        }
    }
}

fn has_photo(update: &Update) -> bool {
    update.message.as_ref().is_some_and(|m| m.photo.is_some())
}

fn has_document(update: &Update) -> bool {
    update.message.as_ref().is_some_and(|m| m.document.is_some())
}

fn has_text(update: &Update) -> bool {
    update
        .message
        .as_ref()
        .and_then(|m| m.text.as_deref())
        .is_some_and(|t| !t.is_empty())
}

fn has_inline_query(update: &Update) -> bool {
    update
        .inline_query
        .as_ref()
        .is_some_and(|q| !q.query.is_empty())
}

fn has_callback(update: &Update) -> bool {
    update
        .callback_query
        .as_ref()
        .is_some_and(|c| !c.id.is_empty())
}

fn has_business_message(update: &Update) -> bool {
    update.business_message.is_some()
}

/// Evaluated top to bottom; the first predicate that matches decides the kind.
/// A message carrying a photo and text is therefore a `Photo`.
const CLASSIFIERS: [(UpdateKind, fn(&Update) -> bool); 6] = [
    (UpdateKind::Photo, has_photo),
    (UpdateKind::Document, has_document),
    (UpdateKind::Message, has_text),
    (UpdateKind::Inline, has_inline_query),
    (UpdateKind::Callback, has_callback),
    (UpdateKind::BusinessMessage, has_business_message),
];

/// Classify an update into exactly one kind, or `None` if nothing matches.
pub fn classify(update: &Update) -> Option<UpdateKind> {
    CLASSIFIERS
        .iter()
        .find(|(_, matches)| matches(update))
        .map(|(kind, _)| *kind)
}

/// Extract the command token from a text message, e.g. `/start foo` → `start`.
///
/// Only `Message` and `BusinessMessage` updates carry commands. The token is
/// taken verbatim: `/start@my_bot` yields `start@my_bot`.
pub fn extract_command(update: &Update, kind: Option<UpdateKind>) -> Option<String> {
    let source = match kind? {
        UpdateKind::Message => update.message.as_ref(),
        UpdateKind::BusinessMessage => update.business_message.as_ref(),
        _ => return None,
    };
    let text = source.and_then(|m| m.text.as_deref()).unwrap_or_default();

    if !text.starts_with('/') {
        return None;
    }

    let token = text.split_whitespace().next()?;
    let name = token.strip_prefix('/')?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
