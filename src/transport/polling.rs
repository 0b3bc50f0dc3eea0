use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::dispatch::Dispatcher as MessageDispatcher;

/// Long-poll variant: pull updates from Telegram and feed them to the
/// dispatcher one by one. The teloxide polling listener retries transient
/// errors itself, so a failed poll never terminates the process.
pub async fn run(bot: Bot, dispatcher: Arc<MessageDispatcher>) -> Result<()> {
    // A webhook left over from a previous deployment blocks getUpdates.
    if let Err(e) = bot.delete_webhook().await {
        warn!(error = %e, "Could not clear stale webhook registration");
    }

    info!("Starting long-poll loop...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("adanbot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    dispatcher: Arc<MessageDispatcher>,
) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    super::handle_text(&bot, &dispatcher, msg.chat.id, &text).await;
    Ok(())
}
