//! Per-request execution context and the reply channel adapter.
//!
//! A [`Context`] is built once for each inbound update. Its reply operations
//! pick the right Bot API call for the update kind: a chat message for
//! messages, an inline result for inline queries, a file for overlong text.
//! Outbound failures are logged and swallowed here; a failed reply never
//! aborts the handler that issued it.

use std::sync::Arc;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::client::{self, ApiResponse, ChatAction, InputFile, Params, ParseMode, TelegramClient};
use crate::dispatcher::Dispatcher;
use crate::update::{classify, extract_command, Message, Update, UpdateKind};

/// Telegram's limit for a single text message, in UTF-16 code units.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

pub const LONG_TEXT_FILE_NAME: &str = "message.txt";
pub const LONG_TEXT_CAPTION: &str = "The reply was too long for a single message, so it is attached as a file.";

// An inline context carries no metadata about a video, so these stand in.
const VIDEO_PLACEHOLDER_THUMBNAIL: &str = "https://telegram.org/img/t_logo.png";
const VIDEO_PLACEHOLDER_TITLE: &str = "Video";
const VIDEO_PLACEHOLDER_CAPTION: &str = "Video";

pub struct Context {
    dispatcher: Arc<Dispatcher>,
    update: Arc<Update>,
    kind: Option<UpdateKind>,
    command: Option<String>,
    chat_id: String,
    reply_to_id: String,
    business_connection_id: Option<String>,
    inline_query_id: Option<String>,
}

impl Context {
    pub fn new(dispatcher: Arc<Dispatcher>, update: Update) -> Self {
        let kind = classify(&update);
        let command = extract_command(&update, kind);

        let source = match kind {
            Some(UpdateKind::Message | UpdateKind::Photo | UpdateKind::Document) => {
                update.message.as_ref()
            }
            Some(UpdateKind::BusinessMessage) => update.business_message.as_ref(),
            _ => None,
        };
        let chat_id = source.map(|m| m.chat.id.to_string()).unwrap_or_default();
        let reply_to_id = source.map(|m| m.message_id.to_string()).unwrap_or_default();
        let business_connection_id = match kind {
            Some(UpdateKind::BusinessMessage) => {
                source.and_then(|m| m.business_connection_id.clone())
            }
            _ => None,
        };
        let inline_query_id = match kind {
            Some(UpdateKind::Inline) => update.inline_query.as_ref().map(|q| q.id.clone()),
            _ => None,
        };

        Self {
            dispatcher,
            update: Arc::new(update),
            kind,
            command,
            chat_id,
            reply_to_id,
            business_connection_id,
            inline_query_id,
        }
    }

    pub fn kind(&self) -> Option<UpdateKind> {
        self.kind
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Chat to reply into; empty when the update has none.
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Message being replied to; empty when the update has none.
    pub fn reply_to_id(&self) -> &str {
        &self.reply_to_id
    }

    pub fn business_connection_id(&self) -> Option<&str> {
        self.business_connection_id.as_deref()
    }

    pub fn inline_query_id(&self) -> Option<&str> {
        self.inline_query_id.as_deref()
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    fn client(&self) -> &TelegramClient {
        self.dispatcher.client()
    }

    /// The message this update is about, if any.
    pub fn message(&self) -> Option<&Message> {
        match self.kind {
            Some(UpdateKind::Message | UpdateKind::Photo | UpdateKind::Document) => {
                self.update.message.as_ref()
            }
            Some(UpdateKind::BusinessMessage) => self.update.business_message.as_ref(),
            _ => None,
        }
    }

    /// Message text or inline query text; empty otherwise.
    pub fn text(&self) -> &str {
        match self.kind {
            Some(UpdateKind::Inline) => self
                .update
                .inline_query
                .as_ref()
                .map(|q| q.query.as_str())
                .unwrap_or_default(),
            _ => self
                .message()
                .and_then(|m| m.text.as_deref())
                .unwrap_or_default(),
        }
    }

    /// Text following the command token, trimmed.
    pub fn command_args(&self) -> &str {
        if self.command.is_none() {
            return "";
        }
        let text = self.text().trim_start();
        text.split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .unwrap_or_default()
    }

    fn kind_label(&self) -> String {
        self.kind
            .map(|k| k.to_string())
            .unwrap_or_else(|| "none".to_string())
    }

    /// Base parameters for a direct reply into the originating chat.
    fn reply_params(&self) -> Params {
        let mut params = Params::new();
        if !self.reply_to_id.is_empty() {
            if let Ok(message_id) = self.reply_to_id.parse::<i64>() {
                params.insert(
                    "reply_parameters".into(),
                    json!({ "message_id": message_id, "allow_sending_without_reply": true }),
                );
            }
        }
        if let Some(connection) = &self.business_connection_id {
            params.insert("business_connection_id".into(), json!(connection));
        }
        params
    }

    /// Reply with text, adapted to the update kind.
    ///
    /// Text longer than [`MAX_MESSAGE_LENGTH`] is sent as a `message.txt`
    /// attachment unless the update is an inline query.
    pub async fn reply(&self, text: &str, parse_mode: Option<ParseMode>, extras: Params) {
        if message_length(text) > MAX_MESSAGE_LENGTH && self.kind != Some(UpdateKind::Inline) {
            self.reply_as_file(text, extras).await;
            return;
        }

        match self.kind {
            Some(
                UpdateKind::Message
                | UpdateKind::Photo
                | UpdateKind::Document
                | UpdateKind::BusinessMessage,
            ) => {
                let mut params = self.reply_params();
                params.extend(extras);
                let outcome = self
                    .client()
                    .send_message(&self.chat_id, text, parse_mode, params)
                    .await;
                log_outcome("sendMessage", outcome);
            }
            Some(UpdateKind::Inline) => {
                let result = article_result(text, parse_mode);
                self.answer_inline(vec![result], extras).await;
            }
            _ => warn!("reply is not supported for update kind {}", self.kind_label()),
        }
    }

    async fn reply_as_file(&self, text: &str, extras: Params) {
        if self.chat_id.is_empty() {
            warn!(
                "Dropping long reply for update kind {}: no chat to attach it to",
                self.kind_label()
            );
            return;
        }
        debug!(
            "Reply of {} UTF-16 units exceeds {}, sending as {}",
            message_length(text),
            MAX_MESSAGE_LENGTH,
            LONG_TEXT_FILE_NAME
        );

        let mut params = self.reply_params();
        params.insert("caption".into(), json!(LONG_TEXT_CAPTION));
        params.extend(extras);

        let document = InputFile::Bytes {
            file_name: LONG_TEXT_FILE_NAME.to_string(),
            data: text.as_bytes().to_vec(),
        };
        let outcome = self
            .client()
            .send_document(&self.chat_id, document, params)
            .await;
        log_outcome("sendDocument", outcome);
    }

    /// Reply with a photo (file id or URL).
    pub async fn reply_photo(&self, photo: &str, caption: Option<&str>, extras: Params) {
        match self.kind {
            Some(UpdateKind::Message | UpdateKind::Photo) => {
                let mut params = self.reply_params();
                params.extend(extras);
                let outcome = self
                    .client()
                    .send_photo(&self.chat_id, photo, caption, params)
                    .await;
                log_outcome("sendPhoto", outcome);
            }
            Some(UpdateKind::Inline) => {
                let mut result = json!({
                    "type": "photo",
                    "id": Uuid::new_v4().to_string(),
                    "photo_url": photo,
                    "thumbnail_url": photo,
                });
                if let Some(caption) = caption {
                    result["caption"] = json!(caption);
                }
                self.answer_inline(vec![result], extras).await;
            }
            _ => warn!(
                "reply_photo is not supported for update kind {}",
                self.kind_label()
            ),
        }
    }

    /// Reply with a video (file id or URL).
    pub async fn reply_video(&self, video: &str, caption: Option<&str>, extras: Params) {
        match self.kind {
            Some(UpdateKind::Message) => {
                let mut params = self.reply_params();
                params.extend(extras);
                let outcome = self
                    .client()
                    .send_video(&self.chat_id, video, caption, params)
                    .await;
                log_outcome("sendVideo", outcome);
            }
            Some(UpdateKind::Inline) => {
                let result = json!({
                    "type": "video",
                    "id": Uuid::new_v4().to_string(),
                    "video_url": video,
                    "mime_type": "video/mp4",
                    "thumbnail_url": VIDEO_PLACEHOLDER_THUMBNAIL,
                    "title": VIDEO_PLACEHOLDER_TITLE,
                    "caption": caption.unwrap_or(VIDEO_PLACEHOLDER_CAPTION),
                });
                self.answer_inline(vec![result], extras).await;
            }
            _ => warn!(
                "reply_video is not supported for update kind {}",
                self.kind_label()
            ),
        }
    }

    /// Show the "typing…" indicator in the originating chat.
    pub async fn send_typing(&self) {
        match self.kind {
            Some(
                UpdateKind::Message
                | UpdateKind::Photo
                | UpdateKind::Document
                | UpdateKind::BusinessMessage,
            ) => {
                let outcome = self
                    .client()
                    .send_chat_action(
                        &self.chat_id,
                        ChatAction::Typing,
                        self.business_connection_id.as_deref(),
                    )
                    .await;
                log_outcome("sendChatAction", outcome);
            }
            _ => debug!("No chat to show typing in for kind {}", self.kind_label()),
        }
    }

    /// Answer the inline query with prepared results.
    pub async fn reply_inline(&self, results: Vec<Value>, extras: Params) {
        if self.kind != Some(UpdateKind::Inline) {
            warn!(
                "reply_inline is only valid for inline queries, got {}",
                self.kind_label()
            );
            return;
        }
        self.answer_inline(results, extras).await;
    }

    async fn answer_inline(&self, results: Vec<Value>, extras: Params) {
        let Some(query_id) = self.inline_query_id.as_deref() else {
            warn!("Inline update without a query id");
            return;
        };
        let outcome = self
            .client()
            .answer_inline_query(query_id, results, extras)
            .await;
        log_outcome("answerInlineQuery", outcome);
    }

    /// Fetch a file's content by id.
    ///
    /// Always returns a response: upstream lookup failures keep their status,
    /// transport failures become `502 Bad Gateway`.
    pub async fn get_file(&self, file_id: &str) -> reqwest::Response {
        match self.client().get_file(file_id).await {
            Ok(response) => {
                if !response.status().is_success() {
                    warn!("getFile for {} failed: {}", file_id, response.status());
                }
                response
            }
            Err(e) => {
                error!("getFile for {} failed: {:#}", file_id, e);
                client::error_response(StatusCode::BAD_GATEWAY, &format!("{:#}", e))
            }
        }
    }
}

/// Log the result of an outbound call. Nothing is propagated.
fn log_outcome<T>(method: &str, outcome: Result<ApiResponse<T>>) {
    match outcome {
        Ok(response) if response.ok => debug!("{} succeeded", method),
        Ok(response) => warn!(
            "{} failed ({}): {}",
            method,
            response.error_code.unwrap_or_default(),
            response.description.as_deref().unwrap_or("no description")
        ),
        Err(e) => error!("{} failed: {:#}", method, e),
    }
}

/// Length as Telegram counts it.
fn message_length(text: &str) -> usize {
    text.encode_utf16().count()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// A single `article` inline result carrying `text` as its message.
fn article_result(text: &str, parse_mode: Option<ParseMode>) -> Value {
    let mut content = json!({ "message_text": text });
    if let Some(mode) = parse_mode {
        content["parse_mode"] = json!(mode.as_str());
    }
    let first_line = text.lines().next().unwrap_or_default();
    json!({
        "type": "article",
        "id": Uuid::new_v4().to_string(),
        "title": truncate_chars(first_line, 64),
        "description": truncate_chars(text, 128),
        "input_message_content": content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimiter;
    use crate::testing::{fake_client, FakeApi, TEST_TOKEN};

    fn message_update(chat_id: i64, text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "chat": {"id": chat_id, "type": "private"},
                "text": text
            }
        }))
        .unwrap()
    }

    fn photo_update() -> Update {
        serde_json::from_value(json!({
            "message": {
                "message_id": 11,
                "chat": {"id": 42, "type": "private"},
                "photo": [{"file_id": "p1", "file_unique_id": "u1", "width": 10, "height": 10}]
            }
        }))
        .unwrap()
    }

    fn inline_update(query: &str) -> Update {
        serde_json::from_value(json!({
            "inline_query": {"id": "q-1", "query": query, "offset": ""}
        }))
        .unwrap()
    }

    fn document_update() -> Update {
        serde_json::from_value(json!({
            "message": {
                "message_id": 12,
                "chat": {"id": 42, "type": "private"},
                "document": {"file_id": "d1", "file_unique_id": "du1", "file_name": "a.pdf"}
            }
        }))
        .unwrap()
    }

    fn business_update() -> Update {
        serde_json::from_value(json!({
            "business_message": {
                "message_id": 5,
                "chat": {"id": 7, "type": "private"},
                "text": "hi",
                "business_connection_id": "conn-1"
            }
        }))
        .unwrap()
    }

    fn callback_update() -> Update {
        serde_json::from_value(json!({"callback_query": {"id": "cb-1", "data": "x"}})).unwrap()
    }

    async fn context_for(update: Update) -> (FakeApi, Context) {
        let (api, client) = fake_client().await;
        let dispatcher = Arc::new(Dispatcher::new(client));
        (api, Context::new(dispatcher, update))
    }

    #[tokio::test]
    async fn test_message_ids_resolved() {
        let (_api, ctx) = context_for(message_update(42, "/start now")).await;
        assert_eq!(ctx.kind(), Some(UpdateKind::Message));
        assert_eq!(ctx.command(), Some("start"));
        assert_eq!(ctx.chat_id(), "42");
        assert_eq!(ctx.reply_to_id(), "10");
        assert_eq!(ctx.business_connection_id(), None);
        assert_eq!(ctx.command_args(), "now");
    }

    #[tokio::test]
    async fn test_business_ids_resolved() {
        let (_api, ctx) = context_for(business_update()).await;
        assert_eq!(ctx.kind(), Some(UpdateKind::BusinessMessage));
        assert_eq!(ctx.chat_id(), "7");
        assert_eq!(ctx.reply_to_id(), "5");
        assert_eq!(ctx.business_connection_id(), Some("conn-1"));
    }

    #[tokio::test]
    async fn test_unresolved_ids_are_empty() {
        let (_api, ctx) = context_for(inline_update("rust")).await;
        assert_eq!(ctx.chat_id(), "");
        assert_eq!(ctx.reply_to_id(), "");
        assert_eq!(ctx.inline_query_id(), Some("q-1"));
        assert_eq!(ctx.text(), "rust");

        let (_api, ctx) = context_for(callback_update()).await;
        assert_eq!(ctx.kind(), Some(UpdateKind::Callback));
        assert_eq!(ctx.chat_id(), "");
        assert_eq!(ctx.reply_to_id(), "");

        let (_api, ctx) = context_for(Update::default()).await;
        assert_eq!(ctx.kind(), None);
        assert_eq!(ctx.command(), None);
        assert_eq!(ctx.chat_id(), "");
    }

    #[tokio::test]
    async fn test_reply_to_message() {
        let (api, ctx) = context_for(message_update(42, "hello")).await;

        ctx.reply("hi there", Some(ParseMode::MarkdownV2), Params::new())
            .await;

        assert_eq!(api.methods(), vec!["sendMessage"]);
        let body = api.calls()[0].json();
        assert_eq!(body["chat_id"], "42");
        assert_eq!(body["text"], "hi there");
        assert_eq!(body["parse_mode"], "MarkdownV2");
        assert_eq!(body["reply_parameters"]["message_id"], 10);
    }

    #[tokio::test]
    async fn test_long_reply_becomes_document() {
        let (api, ctx) = context_for(message_update(42, "hello")).await;
        let long_text = "a".repeat(5000);

        ctx.reply(&long_text, None, Params::new()).await;

        assert_eq!(api.methods(), vec!["sendDocument"]);
        let call = &api.calls()[0];
        assert!(call.content_type.starts_with("multipart/form-data"));
        assert!(call.body.contains("filename=\"message.txt\""));
        assert!(call.body.contains(LONG_TEXT_CAPTION));
        assert!(call.body.contains(&long_text));
    }

    #[tokio::test]
    async fn test_exactly_limit_is_still_a_message() {
        let (api, ctx) = context_for(message_update(42, "hello")).await;

        // 4096 UTF-16 units: "é" is one unit despite being two UTF-8 bytes.
        ctx.reply(&"é".repeat(MAX_MESSAGE_LENGTH), None, Params::new())
            .await;
        // Each emoji is a surrogate pair, so 2048 of them hit the limit exactly.
        ctx.reply(&"😀".repeat(MAX_MESSAGE_LENGTH / 2), None, Params::new())
            .await;

        assert_eq!(api.methods(), vec!["sendMessage", "sendMessage"]);
    }

    #[tokio::test]
    async fn test_emoji_reply_over_limit_becomes_document() {
        let (api, ctx) = context_for(message_update(42, "hello")).await;
        let text = "😀".repeat(3000);
        assert!(text.chars().count() < MAX_MESSAGE_LENGTH);

        ctx.reply(&text, None, Params::new()).await;

        assert_eq!(api.methods(), vec!["sendDocument"]);
        assert!(api.calls()[0].body.contains(&text));
    }

    #[tokio::test]
    async fn test_long_business_reply_keeps_connection_id() {
        let (api, ctx) = context_for(business_update()).await;

        ctx.reply(&"c".repeat(5000), None, Params::new()).await;

        assert_eq!(api.methods(), vec!["sendDocument"]);
        let call = &api.calls()[0];
        assert!(call.content_type.starts_with("multipart/form-data"));
        assert!(call.body.contains("name=\"business_connection_id\""));
        assert!(call.body.contains("conn-1"));
        assert!(call.body.contains("name=\"chat_id\""));
    }

    #[tokio::test]
    async fn test_reply_to_document() {
        let (api, ctx) = context_for(document_update()).await;
        assert_eq!(ctx.kind(), Some(UpdateKind::Document));

        ctx.reply("got it", None, Params::new()).await;
        ctx.reply(&"d".repeat(5000), None, Params::new()).await;

        assert_eq!(api.methods(), vec!["sendMessage", "sendDocument"]);
        let body = api.calls()[0].json();
        assert_eq!(body["chat_id"], "42");
        assert_eq!(body["reply_parameters"]["message_id"], 12);
    }

    #[tokio::test]
    async fn test_long_reply_without_chat_is_dropped() {
        let (api, ctx) = context_for(callback_update()).await;
        ctx.reply(&"e".repeat(5000), None, Params::new()).await;

        let (other_api, unclassified) = context_for(Update::default()).await;
        unclassified.reply(&"e".repeat(5000), None, Params::new()).await;

        assert!(api.calls().is_empty());
        assert!(other_api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_long_inline_reply_stays_inline() {
        let (api, ctx) = context_for(inline_update("essay")).await;
        let long_text = "b".repeat(5000);

        ctx.reply(&long_text, None, Params::new()).await;

        assert_eq!(api.methods(), vec!["answerInlineQuery"]);
        let body = api.calls()[0].json();
        assert_eq!(body["inline_query_id"], "q-1");
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["type"], "article");
        assert_eq!(
            results[0]["input_message_content"]["message_text"],
            long_text.as_str()
        );
    }

    #[tokio::test]
    async fn test_business_reply_carries_connection_id() {
        let (api, ctx) = context_for(business_update()).await;

        ctx.reply("hello", None, Params::new()).await;

        let body = api.calls_to("sendMessage")[0].json();
        assert_eq!(body["chat_id"], "7");
        assert_eq!(body["business_connection_id"], "conn-1");
    }

    #[tokio::test]
    async fn test_reply_to_callback_is_noop() {
        let (api, ctx) = context_for(callback_update()).await;

        ctx.reply("hello", None, Params::new()).await;
        ctx.reply_photo("p", None, Params::new()).await;
        ctx.reply_video("v", None, Params::new()).await;
        ctx.send_typing().await;

        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reply_photo_by_kind() {
        let (api, ctx) = context_for(photo_update()).await;
        ctx.reply_photo("https://img.example/a.jpg", Some("nice"), Params::new())
            .await;
        let body = api.calls_to("sendPhoto")[0].json();
        assert_eq!(body["photo"], "https://img.example/a.jpg");
        assert_eq!(body["caption"], "nice");

        let (api, ctx) = context_for(inline_update("cats")).await;
        ctx.reply_photo("https://img.example/cat.jpg", None, Params::new())
            .await;
        let body = api.calls_to("answerInlineQuery")[0].json();
        assert_eq!(body["results"][0]["type"], "photo");
        assert_eq!(body["results"][0]["photo_url"], "https://img.example/cat.jpg");

        let (api, ctx) = context_for(business_update()).await;
        ctx.reply_photo("https://img.example/a.jpg", None, Params::new())
            .await;
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reply_video_by_kind() {
        let (api, ctx) = context_for(message_update(42, "clip")).await;
        ctx.reply_video("https://vid.example/a.mp4", None, Params::new())
            .await;
        assert_eq!(api.methods(), vec!["sendVideo"]);

        let (api, ctx) = context_for(inline_update("clip")).await;
        ctx.reply_video("https://vid.example/a.mp4", None, Params::new())
            .await;
        let body = api.calls_to("answerInlineQuery")[0].json();
        let result = &body["results"][0];
        assert_eq!(result["type"], "video");
        assert_eq!(result["mime_type"], "video/mp4");
        assert_eq!(result["thumbnail_url"], VIDEO_PLACEHOLDER_THUMBNAIL);
        assert_eq!(result["title"], VIDEO_PLACEHOLDER_TITLE);

        // Videos are not sent back into photo messages.
        let (api, ctx) = context_for(photo_update()).await;
        ctx.reply_video("https://vid.example/a.mp4", None, Params::new())
            .await;
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_typing() {
        let (api, ctx) = context_for(business_update()).await;
        ctx.send_typing().await;
        let body = api.calls_to("sendChatAction")[0].json();
        assert_eq!(body["action"], "typing");
        assert_eq!(body["chat_id"], "7");
        assert_eq!(body["business_connection_id"], "conn-1");

        let (api, ctx) = context_for(inline_update("x")).await;
        ctx.send_typing().await;
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reply_inline_only_for_inline() {
        let (api, ctx) = context_for(message_update(42, "hello")).await;
        ctx.reply_inline(vec![json!({"type": "article"})], Params::new())
            .await;
        assert!(api.calls().is_empty());

        let (api, ctx) = context_for(inline_update("q")).await;
        let mut extras = Params::new();
        extras.insert("cache_time".into(), json!(0));
        ctx.reply_inline(vec![json!({"type": "article", "id": "1"})], extras)
            .await;
        let body = api.calls_to("answerInlineQuery")[0].json();
        assert_eq!(body["cache_time"], 0);
        assert_eq!(body["results"][0]["id"], "1");
    }

    #[tokio::test]
    async fn test_get_file() {
        let (_api, ctx) = context_for(photo_update()).await;

        let response = ctx.get_file("p1").await;
        assert!(response.status().is_success());
        assert_eq!(
            response.text().await.unwrap(),
            "file-bytes:documents/p1.bin"
        );

        let response = ctx.get_file("missing").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_swallowed() {
        let (api, ctx) = context_for(message_update(-1, "hello")).await;

        ctx.reply("hi", None, Params::new()).await;
        ctx.send_typing().await;

        assert_eq!(api.methods(), vec!["sendMessage", "sendChatAction"]);
    }

    #[tokio::test]
    async fn test_transport_failure_is_swallowed() {
        let client = TelegramClient::new(
            TEST_TOKEN,
            "http://127.0.0.1:1",
            Arc::new(RateLimiter::default()),
        );
        let ctx = Context::new(
            Arc::new(Dispatcher::new(client)),
            message_update(42, "hello"),
        );

        ctx.reply("hi", None, Params::new()).await;
        ctx.reply(&"x".repeat(5000), None, Params::new()).await;
        let response = ctx.get_file("p1").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_article_title_is_truncated() {
        let text = format!("{}\nsecond line", "t".repeat(100));
        let article = article_result(&text, Some(ParseMode::Html));
        let title = article["title"].as_str().unwrap();
        assert_eq!(title.chars().count(), 65);
        assert!(title.ends_with('…'));
        assert_eq!(article["input_message_content"]["parse_mode"], "HTML");
    }
}
