//! Recording stand-in for the Bot API and the inference endpoint, served by
//! axum on a random local port.

use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::client::TelegramClient;
use crate::rate_limit::RateLimiter;

pub(crate) const TEST_TOKEN: &str = "123:ABC";

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    /// Bot API method name, `download` for file fetches, `chat/completions` for inference.
    pub method: String,
    pub content_type: String,
    pub body: String,
}

impl RecordedCall {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Clone)]
pub(crate) struct FakeApi {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    base_url: String,
}

impl FakeApi {
    pub async fn spawn() -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .fallback(respond)
            .with_state(Arc::clone(&calls));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            calls,
            base_url: format!("http://{addr}"),
        }
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.method).collect()
    }
}

pub(crate) async fn fake_client() -> (FakeApi, TelegramClient) {
    let api = FakeApi::spawn().await;
    let client = TelegramClient::new(
        TEST_TOKEN,
        &api.base_url(),
        Arc::new(RateLimiter::default()),
    );
    (api, client)
}

fn failure(description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"ok": false, "error_code": 400, "description": description})),
    )
        .into_response()
}

async fn respond(
    State(calls): State<Arc<Mutex<Vec<RecordedCall>>>>,
    uri: Uri,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches('/');
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = String::from_utf8_lossy(&body).to_string();

    let method = if path.starts_with("file/") {
        "download".to_string()
    } else if path.ends_with("chat/completions") {
        "chat/completions".to_string()
    } else {
        path.rsplit('/').next().unwrap_or_default().to_string()
    };

    calls.lock().unwrap().push(RecordedCall {
        method: method.clone(),
        content_type,
        body: body.clone(),
    });

    let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    match method.as_str() {
        "download" => {
            // file/bot<token>/<file_path>
            let file_path = path.splitn(3, '/').nth(2).unwrap_or_default();
            format!("file-bytes:{file_path}").into_response()
        }
        "chat/completions" => {
            let last = payload["messages"]
                .as_array()
                .and_then(|m| m.last())
                .and_then(|m| m["content"].as_str())
                .unwrap_or_default()
                .to_string();
            Json(json!({
                "choices": [{"message": {"role": "assistant", "content": format!("echo: {last}")}}]
            }))
            .into_response()
        }
        _ if payload["chat_id"] == "-1" => failure("Bad Request: chat not found"),
        _ if payload["inline_query_id"] == "expired" => {
            failure("Bad Request: query is too old and response timeout expired")
        }
        _ if payload["url"] == "fail" => failure("Bad Request: bad webhook"),
        "getFile" => {
            let file_id = payload["file_id"].as_str().unwrap_or_default();
            if file_id == "missing" {
                return failure("Bad Request: invalid file_id");
            }
            Json(json!({
                "ok": true,
                "result": {
                    "file_id": file_id,
                    "file_unique_id": "unique",
                    "file_path": format!("documents/{file_id}.bin")
                }
            }))
            .into_response()
        }
        "sendMessage" | "sendPhoto" | "sendVideo" | "sendDocument" => Json(json!({
            "ok": true,
            "result": {"message_id": 1000, "chat": {"id": 42, "type": "private"}}
        }))
        .into_response(),
        _ => Json(json!({"ok": true, "result": true})).into_response(),
    }
}
