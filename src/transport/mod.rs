pub mod polling;
pub mod webhook;

use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId};

use crate::dispatch::{route, Dispatcher, InboundMessage};

/// Shared inbound path for both transports: build the message, flash a
/// typing indicator when the reply will hit the completion service, then
/// dispatch and send. Outbound failures are logged by teloxide and dropped;
/// they must never take down the update loop or the webhook handler.
pub(crate) async fn handle_text(bot: &Bot, dispatcher: &Dispatcher, chat_id: ChatId, text: &str) {
    let msg = InboundMessage::from_text(chat_id.0, text);
    if route(&msg).needs_upstream() {
        // Best-effort; a failed indicator must not abort the reply.
        bot.send_chat_action(chat_id, ChatAction::Typing).await.ok();
    }
    if let Some(reply) = dispatcher.dispatch(&msg).await {
        send_reply(bot, chat_id, &reply.text).await;
    }
}

pub(crate) async fn send_reply(bot: &Bot, chat_id: ChatId, text: &str) {
    for chunk in split_message(text, 4000) {
        bot.send_message(chat_id, chunk).await.ok();
    }
}

/// Split long replies for Telegram's 4096 char limit.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}
