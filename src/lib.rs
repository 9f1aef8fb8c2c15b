//! Webhook dispatcher for Telegram bots.
//!
//! Inbound updates are classified into an [`UpdateKind`](update::UpdateKind),
//! routed by command or kind through a [`Dispatcher`](dispatcher::Dispatcher),
//! and answered through a per-request [`Context`](context::Context) whose
//! reply operations go out via a rate-limited [`TelegramClient`](client::TelegramClient).

pub mod client;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod llm;
pub mod rate_limit;
pub mod server;
pub mod update;

#[cfg(test)]
mod testing;
