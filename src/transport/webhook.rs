use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::UpdateKind;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dispatch::Dispatcher;

const REGISTRAR_ATTEMPTS: u32 = 3;
const REGISTRAR_DELAY: Duration = Duration::from_secs(2);

struct WebhookState {
    bot: Bot,
    dispatcher: Arc<Dispatcher>,
}

/// Webhook variant: register the delivery target with Telegram, then serve
/// the inbound endpoint until the process is stopped.
pub async fn run(bot: Bot, dispatcher: Arc<Dispatcher>, config: &Config) -> Result<()> {
    let url = delivery_url(
        config
            .webhook_url
            .clone()
            .context("Webhook mode requires WEBHOOK_URL")?,
    );

    configure(&bot, &url).await?;

    let state = Arc::new(WebhookState { bot, dispatcher });
    let app = Router::new()
        .route("/", get(health))
        .route("/webhook", post(receive_update))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "Webhook listener ready");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .await
        .context("Webhook server terminated")?;

    Ok(())
}

/// The router serves updates on /webhook, so a bare hostname in WEBHOOK_URL
/// would register a target that lands on the health route. Join the path for
/// bare URLs; an explicit path (e.g. behind a rewriting proxy) is kept as-is.
fn delivery_url(mut url: Url) -> Url {
    if url.path() == "/" {
        url.set_path("/webhook");
    }
    url
}

/// Webhook Registrar: clear any previous delivery target, then register the
/// new one. Up to three attempts with a fixed delay; exhausting them is fatal,
/// the process must not serve traffic behind a stale registration.
pub async fn configure(bot: &Bot, url: &Url) -> Result<()> {
    let mut last_err = None;

    for attempt in 1..=REGISTRAR_ATTEMPTS {
        if attempt > 1 {
            tokio::time::sleep(REGISTRAR_DELAY).await;
        }

        let outcome = async {
            bot.delete_webhook().await?;
            bot.set_webhook(url.clone()).await?;
            Ok::<_, teloxide::RequestError>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                info!(url = %url, attempt, "Webhook registered");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, attempt, "Webhook registration failed");
                last_err = Some(e);
            }
        }
    }

    Err(anyhow::anyhow!(
        "Webhook registration failed after {} attempts: {}",
        REGISTRAR_ATTEMPTS,
        last_err.expect("at least one attempt ran")
    ))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "service": "adanbot", "status": "active" }))
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().starts_with("application/json"))
        .unwrap_or(false)
}

/// Inbound endpoint. Dispatch runs inline — it is bounded by the completion
/// client's own timeouts — and every failure maps to a status code; nothing
/// here may crash the listener.
async fn receive_update(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    if !is_json_content_type(&headers) {
        return StatusCode::BAD_REQUEST;
    }

    let update: teloxide::types::Update = match serde_json::from_str(&body) {
        Ok(u) => u,
        Err(e) => {
            error!(error = %e, "Failed to parse update payload");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    // Non-message updates are acknowledged and ignored.
    if let UpdateKind::Message(msg) = update.kind {
        if let Some(text) = msg.text() {
            super::handle_text(&state.bot, &state.dispatcher, msg.chat.id, text).await;
        }
    }

    StatusCode::OK
}
