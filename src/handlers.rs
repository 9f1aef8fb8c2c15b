//! Handlers bundled with the bot binary.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::client::Params;
use crate::context::Context;
use crate::dispatcher::{Dispatcher, Handler};
use crate::llm::{ChatMessage, Inference};
use crate::update::UpdateKind;

fn accepted() -> Result<Response> {
    Ok(StatusCode::OK.into_response())
}

/// Register every bundled command and event handler.
pub fn register_all(dispatcher: &mut Dispatcher, llm: Arc<dyn Inference>, system_prompt: &str) {
    let chat = ChatHandler {
        llm: Arc::clone(&llm),
        system_prompt: system_prompt.to_string(),
    };
    let inline = InlineHandler {
        llm: Arc::clone(&llm),
        system_prompt: system_prompt.to_string(),
    };

    dispatcher
        .register_command("start", "Say hello and list commands", help)
        .register_command("help", "List available commands", help)
        .register_command(
            "translate",
            "Translate text: /translate <language> <text>",
            TranslateHandler { llm },
        )
        .register_event(UpdateKind::Message, chat)
        .register_event(UpdateKind::Inline, inline)
        .register_event(UpdateKind::Photo, describe_photo);
}

async fn help(ctx: Context) -> Result<Response> {
    let mut text = String::from("Hello! Send me a message and I'll answer it.\n\nCommands:\n");
    for command in ctx.dispatcher().commands() {
        text.push_str(&format!("/{} - {}\n", command.command, command.description));
    }
    ctx.reply(&text, None, Params::new()).await;
    accepted()
}

async fn describe_photo(ctx: Context) -> Result<Response> {
    let largest = ctx
        .message()
        .and_then(|m| m.photo.as_ref())
        .and_then(|sizes| sizes.iter().max_by_key(|p| u64::from(p.width) * u64::from(p.height)));

    let text = match largest {
        Some(photo) => format!("Got your photo ({}x{}).", photo.width, photo.height),
        None => "Got your photo.".to_string(),
    };
    ctx.reply(&text, None, Params::new()).await;
    accepted()
}

struct ChatHandler {
    llm: Arc<dyn Inference>,
    system_prompt: String,
}

#[async_trait]
impl Handler for ChatHandler {
    async fn call(&self, ctx: Context) -> Result<Response> {
        ctx.send_typing().await;

        let messages = [
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(ctx.text()),
        ];
        match self.llm.complete(&messages).await {
            Ok(answer) => ctx.reply(&answer, None, Params::new()).await,
            Err(e) => {
                error!("Inference failed: {:#}", e);
                ctx.reply(
                    "Sorry, I couldn't come up with an answer right now.",
                    None,
                    Params::new(),
                )
                .await;
            }
        }
        accepted()
    }
}

struct InlineHandler {
    llm: Arc<dyn Inference>,
    system_prompt: String,
}

#[async_trait]
impl Handler for InlineHandler {
    async fn call(&self, ctx: Context) -> Result<Response> {
        let messages = [
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(ctx.text()),
        ];
        match self.llm.complete(&messages).await {
            Ok(answer) => ctx.reply(&answer, None, Params::new()).await,
            // An unanswered inline query simply times out on the client.
            Err(e) => error!("Inference failed for inline query: {:#}", e),
        }
        accepted()
    }
}

struct TranslateHandler {
    llm: Arc<dyn Inference>,
}

#[async_trait]
impl Handler for TranslateHandler {
    async fn call(&self, ctx: Context) -> Result<Response> {
        let Some((language, text)) = ctx
            .command_args()
            .split_once(char::is_whitespace)
            .map(|(lang, text)| (lang, text.trim()))
            .filter(|(_, text)| !text.is_empty())
        else {
            ctx.reply("Usage: /translate <language> <text>", None, Params::new())
                .await;
            return accepted();
        };

        ctx.send_typing().await;
        match self.llm.translate(text, language).await {
            Ok(translation) => ctx.reply(&translation, None, Params::new()).await,
            Err(e) => {
                error!("Translation failed: {:#}", e);
                ctx.reply("Translation failed, please try again.", None, Params::new())
                    .await;
            }
        }
        accepted()
    }
}
