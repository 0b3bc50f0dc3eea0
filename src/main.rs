use std::sync::Arc;

use anyhow::Result;
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adanbot::config::{Config, DeliveryMode};
use adanbot::dispatch::Dispatcher;
use adanbot::llm::CompletionClient;
use adanbot::probe::Prober;
use adanbot::transport;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,adanbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; a missing credential aborts here with a diagnostic.
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Configuration loaded successfully");
    info!("  Mode: {}", config.mode);
    info!("  Model: {}", config.model);
    info!("  Completion service: {}", config.base_url);
    info!("  Port: {}", config.port);

    let dispatcher = Arc::new(Dispatcher::new(
        CompletionClient::new(&config)?,
        Prober::new(&config)?,
    ));
    let bot = Bot::new(&config.bot_token);

    info!("Bot is starting...");
    match config.mode {
        DeliveryMode::Webhook => transport::webhook::run(bot, dispatcher, &config).await,
        DeliveryMode::Polling => transport::polling::run(bot, dispatcher).await,
    }
}
