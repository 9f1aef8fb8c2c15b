use std::sync::Arc;

use anyhow::{Context as _, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::rate_limit::RateLimiter;
use crate::update::Message;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Extra request parameters merged into a call's payload.
pub type Params = serde_json::Map<String, Value>;

/// Envelope returned by every Bot API method.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

/// File metadata returned by `getFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: String,
    pub file_size: Option<u64>,
    pub file_path: Option<String>,
}

/// An entry of the bot's command menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

/// Document payload for `sendDocument`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFile {
    /// Uploaded inline; forces multipart encoding.
    Bytes { file_name: String, data: Vec<u8> },
    /// A file id already known to Telegram, or an HTTP URL.
    Reference(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    MarkdownV2,
    Markdown,
    Html,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseMode::MarkdownV2 => "MarkdownV2",
            ParseMode::Markdown => "Markdown",
            ParseMode::Html => "HTML",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
    UploadPhoto,
    UploadVideo,
    UploadDocument,
}

impl ChatAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatAction::Typing => "typing",
            ChatAction::UploadPhoto => "upload_photo",
            ChatAction::UploadVideo => "upload_video",
            ChatAction::UploadDocument => "upload_document",
        }
    }
}

/// Bot API client. Every method call first waits on the shared [`RateLimiter`].
///
/// Cloning is cheap; clones share the HTTP connection pool and the limiter.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    token: Arc<str>,
    api_base: Arc<str>,
    limiter: Arc<RateLimiter>,
}

impl TelegramClient {
    pub fn new(token: &str, api_base: &str, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: Arc::from(token),
            api_base: Arc::from(api_base.trim_end_matches('/')),
            limiter,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: &str,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>> {
        self.limiter.acquire().await;

        debug!("Calling Bot API method {}", method);

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        // Failed calls still carry the JSON envelope, so the status is not checked here.
        response
            .json::<ApiResponse<T>>()
            .await
            .with_context(|| format!("Failed to parse {} response", method))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: Value,
    ) -> Result<ApiResponse<T>> {
        let request = self.http.post(self.api_url(method)).json(&payload);
        self.execute(method, request).await
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<ParseMode>,
        extras: Params,
    ) -> Result<ApiResponse<Message>> {
        let mut payload = Params::new();
        payload.insert("chat_id".into(), json!(chat_id));
        payload.insert("text".into(), json!(text));
        if let Some(mode) = parse_mode {
            payload.insert("parse_mode".into(), json!(mode.as_str()));
        }
        payload.extend(extras);
        self.post_json("sendMessage", Value::Object(payload)).await
    }

    pub async fn send_photo(
        &self,
        chat_id: &str,
        photo: &str,
        caption: Option<&str>,
        extras: Params,
    ) -> Result<ApiResponse<Message>> {
        let mut payload = Params::new();
        payload.insert("chat_id".into(), json!(chat_id));
        payload.insert("photo".into(), json!(photo));
        if let Some(caption) = caption {
            payload.insert("caption".into(), json!(caption));
        }
        payload.extend(extras);
        self.post_json("sendPhoto", Value::Object(payload)).await
    }

    pub async fn send_video(
        &self,
        chat_id: &str,
        video: &str,
        caption: Option<&str>,
        extras: Params,
    ) -> Result<ApiResponse<Message>> {
        let mut payload = Params::new();
        payload.insert("chat_id".into(), json!(chat_id));
        payload.insert("video".into(), json!(video));
        if let Some(caption) = caption {
            payload.insert("caption".into(), json!(caption));
        }
        payload.extend(extras);
        self.post_json("sendVideo", Value::Object(payload)).await
    }

    /// Send a document. Raw bytes go out as multipart form data with every
    /// extra parameter as a text field; references go out as JSON.
    pub async fn send_document(
        &self,
        chat_id: &str,
        document: InputFile,
        extras: Params,
    ) -> Result<ApiResponse<Message>> {
        match document {
            InputFile::Reference(reference) => {
                let mut payload = Params::new();
                payload.insert("chat_id".into(), json!(chat_id));
                payload.insert("document".into(), json!(reference));
                payload.extend(extras);
                self.post_json("sendDocument", Value::Object(payload)).await
            }
            InputFile::Bytes { file_name, data } => {
                let mut form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .part("document", Part::bytes(data).file_name(file_name));
                for (key, value) in extras {
                    form = form.text(key, form_value(value));
                }
                let request = self.http.post(self.api_url("sendDocument")).multipart(form);
                self.execute("sendDocument", request).await
            }
        }
    }

    pub async fn send_chat_action(
        &self,
        chat_id: &str,
        action: ChatAction,
        business_connection_id: Option<&str>,
    ) -> Result<ApiResponse<bool>> {
        let mut payload = json!({
            "chat_id": chat_id,
            "action": action.as_str(),
        });
        if let Some(connection) = business_connection_id {
            payload["business_connection_id"] = json!(connection);
        }
        self.post_json("sendChatAction", payload).await
    }

    pub async fn answer_inline_query(
        &self,
        inline_query_id: &str,
        results: Vec<Value>,
        extras: Params,
    ) -> Result<ApiResponse<bool>> {
        let mut payload = Params::new();
        payload.insert("inline_query_id".into(), json!(inline_query_id));
        payload.insert("results".into(), Value::Array(results));
        payload.extend(extras);
        self.post_json("answerInlineQuery", Value::Object(payload))
            .await
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<ApiResponse<bool>> {
        self.post_json("setMyCommands", json!({ "commands": commands }))
            .await
    }

    pub async fn set_webhook(&self, url: &str) -> Result<ApiResponse<bool>> {
        self.post_json("setWebhook", json!({ "url": url })).await
    }

    /// Resolve a file id to its path, then download the content.
    ///
    /// If `getFile` itself reports failure, the returned response carries the
    /// upstream error code and description instead of the file.
    pub async fn get_file(&self, file_id: &str) -> Result<reqwest::Response> {
        let meta: ApiResponse<File> = self
            .post_json("getFile", json!({ "file_id": file_id }))
            .await?;

        if !meta.ok {
            let description = meta.description.as_deref().unwrap_or("getFile failed");
            return Ok(error_response(status_for(meta.error_code), description));
        }

        let Some(file_path) = meta.result.and_then(|file| file.file_path) else {
            return Ok(error_response(
                StatusCode::NOT_FOUND,
                "getFile returned no file_path",
            ));
        };

        debug!("Downloading file {}", file_path);

        self.http
            .get(self.file_url(&file_path))
            .send()
            .await
            .with_context(|| format!("Failed to download file {}", file_path))
    }
}

/// Multipart fields are text: strings go in verbatim, everything else as JSON.
fn form_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn status_for(error_code: Option<i64>) -> StatusCode {
    error_code
        .and_then(|code| u16::try_from(code).ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .filter(|status| status.is_client_error() || status.is_server_error())
        .unwrap_or(StatusCode::BAD_REQUEST)
}

/// A synthesized response standing in for a file download that never happened.
pub(crate) fn error_response(status: StatusCode, body: &str) -> reqwest::Response {
    let mut response = axum::http::Response::new(body.to_string());
    *response.status_mut() = status;
    reqwest::Response::from(response)
}
