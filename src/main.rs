use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hookbot::client::TelegramClient;
use hookbot::config::Config;
use hookbot::dispatcher::Dispatcher;
use hookbot::llm::LlmClient;
use hookbot::rate_limit::RateLimiter;
use hookbot::{handlers, server};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hookbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let limit = config.rate_limit.limit();
    info!("Configuration loaded successfully");
    info!("  Bot API: {}", config.telegram.api_base_url);
    info!("  Listen: {}", config.server.listen_addr);
    info!("  Rate limit: {} calls per {:?}", limit.max_calls, limit.window);
    info!("  Model: {} ({})", config.llm.model, config.llm.provider);

    // One limiter for the whole process
    let limiter = Arc::new(RateLimiter::new(limit));
    let client = TelegramClient::new(
        &config.telegram.bot_token,
        &config.telegram.api_base_url,
        limiter,
    );

    let mut dispatcher = Dispatcher::new(client).with_public_url(config.server.public_url.clone());
    let llm = Arc::new(LlmClient::new(config.llm.clone()));
    handlers::register_all(&mut dispatcher, llm, &config.llm.system_prompt);

    if let Err(e) = dispatcher.initialize_commands().await {
        warn!("Could not publish bot commands: {:#}", e);
    }

    info!("Bot is starting...");
    server::serve(config.server.listen_addr, Arc::new(dispatcher)).await?;

    Ok(())
}
