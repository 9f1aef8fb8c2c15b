//! Command and update-kind dispatch for the webhook endpoint.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::client::{BotCommand, TelegramClient};
use crate::context::Context;
use crate::update::{Update, UpdateKind};

/// A registered update handler.
///
/// Implemented for any `Fn(Context) -> impl Future<Output = Result<Response>>`,
/// so plain async functions and closures can be registered directly.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: Context) -> Result<Response>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    async fn call(&self, ctx: Context) -> Result<Response> {
        (self)(ctx).await
    }
}

/// Routes webhook requests to handlers.
///
/// Registration happens at startup through `&mut self`; afterwards the
/// dispatcher is shared behind an `Arc` and only read.
pub struct Dispatcher {
    client: TelegramClient,
    public_url: Option<String>,
    commands: HashMap<String, Box<dyn Handler>>,
    command_list: Vec<BotCommand>,
    events: HashMap<UpdateKind, Box<dyn Handler>>,
}

impl Dispatcher {
    pub fn new(client: TelegramClient) -> Self {
        Self {
            client,
            public_url: None,
            commands: HashMap::new(),
            command_list: Vec::new(),
            events: HashMap::new(),
        }
    }

    /// Origin used when registering the webhook, e.g. `https://bot.example.com`.
    pub fn with_public_url(mut self, public_url: Option<String>) -> Self {
        self.public_url = public_url.map(|url| url.trim_end_matches('/').to_string());
        self
    }

    pub fn client(&self) -> &TelegramClient {
        &self.client
    }

    /// The only path the webhook answers on.
    pub fn webhook_path(&self) -> String {
        format!("/{}", self.client.token())
    }

    pub fn commands(&self) -> &[BotCommand] {
        &self.command_list
    }

    pub fn register_command(
        &mut self,
        name: &str,
        description: &str,
        handler: impl Handler + 'static,
    ) -> &mut Self {
        let entry = BotCommand {
            command: name.to_string(),
            description: description.to_string(),
        };
        match self.command_list.iter_mut().find(|c| c.command == name) {
            Some(existing) => {
                warn!("Command /{} registered twice, keeping the latest", name);
                *existing = entry;
            }
            None => self.command_list.push(entry),
        }
        self.commands.insert(name.to_string(), Box::new(handler));
        self
    }

    pub fn register_event(&mut self, kind: UpdateKind, handler: impl Handler + 'static) -> &mut Self {
        if self.events.insert(kind, Box::new(handler)).is_some() {
            warn!("Handler for {} updates registered twice, keeping the latest", kind);
        }
        self
    }

    /// Publish the full command list to Telegram. Safe to call repeatedly.
    pub async fn initialize_commands(&self) -> Result<()> {
        if self.command_list.is_empty() {
            debug!("No commands registered, skipping setMyCommands");
            return Ok(());
        }

        let response = self.client.set_my_commands(&self.command_list).await?;
        if !response.ok {
            anyhow::bail!(
                "setMyCommands failed: {}",
                response.description.unwrap_or_default()
            );
        }

        info!("Registered {} bot commands", self.command_list.len());
        Ok(())
    }

    /// Entry point for every inbound HTTP request.
    ///
    /// Never fails: handler errors and panics become `500`.
    pub async fn handle(self: &Arc<Self>, request: Request<Bytes>) -> Response {
        match AssertUnwindSafe(self.route(request)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!("Failed to handle webhook request: {:#}", e);
                internal_error()
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Handler panicked: {}", message);
                internal_error()
            }
        }
    }

    async fn route(self: &Arc<Self>, request: Request<Bytes>) -> Result<Response> {
        // Anything not addressed to our token is acknowledged and ignored.
        if request.uri().path() != self.webhook_path() {
            debug!("Ignoring request for unknown path");
            return Ok(StatusCode::OK.into_response());
        }

        match *request.method() {
            Method::POST => self.dispatch(request.body()).await,
            Method::GET if wants_webhook_registration(request.uri().query()) => {
                let host = request
                    .headers()
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                self.register_webhook(host.as_deref()).await
            }
            Method::GET => Ok((StatusCode::OK, "OK").into_response()),
            _ => Ok(StatusCode::METHOD_NOT_ALLOWED.into_response()),
        }
    }

    async fn dispatch(self: &Arc<Self>, body: &[u8]) -> Result<Response> {
        let update: Update =
            serde_json::from_slice(body).context("Failed to parse update payload")?;
        let update_id = update.update_id;
        let ctx = Context::new(Arc::clone(self), update);

        if let Some(command) = ctx.command().map(str::to_string) {
            if let Some(handler) = self.commands.get(&command) {
                info!("Update {}: dispatching command /{}", update_id, command);
                return handler.call(ctx).await;
            }
            debug!("Update {}: no handler for command /{}", update_id, command);
        }

        let Some(kind) = ctx.kind() else {
            warn!("Update {}: unhandled update kind", update_id);
            return Ok((StatusCode::BAD_REQUEST, "Unhandled update kind").into_response());
        };

        match self.events.get(&kind) {
            Some(handler) => {
                info!("Update {}: dispatching {} event", update_id, kind);
                handler.call(ctx).await
            }
            None => {
                warn!("Update {}: no handler for {}", update_id, kind);
                Ok((StatusCode::BAD_REQUEST, format!("No handler for {}", kind)).into_response())
            }
        }
    }

    async fn register_webhook(&self, host: Option<&str>) -> Result<Response> {
        let origin = match (&self.public_url, host) {
            (Some(url), _) => url.clone(),
            (None, Some(host)) => format!("https://{}", host),
            (None, None) => {
                return Ok((
                    StatusCode::BAD_REQUEST,
                    "Cannot determine webhook URL: no public_url and no Host header",
                )
                    .into_response());
            }
        };
        let url = format!("{}{}", origin, self.webhook_path());

        let response = self.client.set_webhook(&url).await?;
        if response.ok {
            info!("Webhook registered at {}/<token>", origin);
            Ok((StatusCode::OK, format!("Webhook set to {}/<token>", origin)).into_response())
        } else {
            let description = response.description.unwrap_or_default();
            warn!("setWebhook failed: {}", description);
            Ok((StatusCode::BAD_GATEWAY, description).into_response())
        }
    }
}

fn wants_webhook_registration(query: Option<&str>) -> bool {
    query
        .unwrap_or_default()
        .split('&')
        .any(|pair| pair == "command=set")
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
