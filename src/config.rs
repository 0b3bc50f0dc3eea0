use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;

/// How updates reach the bot. Resolved exactly once at startup; nothing
/// re-reads the environment after `Config::from_env` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Webhook,
    Polling,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Webhook => write!(f, "webhook"),
            DeliveryMode::Polling => write!(f, "polling"),
        }
    }
}

impl DeliveryMode {
    /// Explicit `BOT_MODE` wins; otherwise webhook when the hosting platform
    /// signal is present (Render sets `RENDER=true` on every service).
    fn resolve(bot_mode: Option<&str>, platform_signal: bool) -> Result<Self> {
        match bot_mode.map(str::trim) {
            Some("webhook") => Ok(DeliveryMode::Webhook),
            Some("polling") => Ok(DeliveryMode::Polling),
            Some(other) => anyhow::bail!(
                "BOT_MODE must be \"webhook\" or \"polling\", got {:?}",
                other
            ),
            None if platform_signal => Ok(DeliveryMode::Webhook),
            None => Ok(DeliveryMode::Polling),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub api_key: String,
    /// Normalized to an absolute https:// URL ending in the /v1 segment.
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    /// First retry delay; doubles per attempt.
    pub retry_base_delay: Duration,
    pub webhook_url: Option<Url>,
    pub port: u16,
    pub mode: DeliveryMode,
}

fn default_system_prompt() -> String {
    "Eres Adán, un asistente conversacional en Telegram. \
     Responde de forma clara, breve y amable, en el idioma del usuario."
        .to_string()
}

/// Completion-service base URLs come in many spellings ("api.deepseek.com",
/// "https://api.deepseek.com/", "api.deepseek.com/v1/"). Normalize to an
/// absolute https URL ending in the version segment.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let with_scheme = if trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("https://{}", rest)
    } else {
        format!("https://{}", trimmed)
    };
    if with_scheme.ends_with("/v1") {
        with_scheme
    } else {
        format!("{}/v1", with_scheme)
    }
}

fn required(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .with_context(|| format!("Missing required environment variable {}", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("Environment variable {} is set but empty", name);
    }
    Ok(value)
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        None => Ok(default),
    }
}

impl Config {
    /// Read the whole configuration from the environment. This is the only
    /// place in the crate that touches env vars; a missing credential aborts
    /// startup with a diagnostic.
    pub fn from_env() -> Result<Self> {
        let bot_token = required("TELEGRAM_TOKEN")?;
        let api_key = required("DEEPSEEK_API_KEY")?;
        let base_url = normalize_base_url(
            optional("DEEPSEEK_BASE_URL")
                .as_deref()
                .unwrap_or("https://api.deepseek.com"),
        );

        let mode = DeliveryMode::resolve(
            optional("BOT_MODE").as_deref(),
            std::env::var("RENDER").is_ok(),
        )?;

        let webhook_url = match optional("WEBHOOK_URL") {
            Some(raw) => Some(
                Url::parse(raw.trim())
                    .with_context(|| format!("WEBHOOK_URL is not a valid URL: {:?}", raw))?,
            ),
            None => None,
        };
        if mode == DeliveryMode::Webhook && webhook_url.is_none() {
            anyhow::bail!("WEBHOOK_URL is required in webhook mode");
        }

        let temperature: f32 = parsed("TEMPERATURE", 0.7)?;
        if !(0.0..=1.0).contains(&temperature) {
            anyhow::bail!("TEMPERATURE must be in [0, 1], got {}", temperature);
        }

        let timeout_secs: u64 = parsed("LLM_TIMEOUT_SECS", 20)?;
        if timeout_secs == 0 {
            anyhow::bail!("LLM_TIMEOUT_SECS must be positive");
        }

        let max_tokens: u32 = parsed("MAX_TOKENS", 1024)?;
        if max_tokens == 0 {
            anyhow::bail!("MAX_TOKENS must be positive");
        }

        Ok(Config {
            bot_token,
            api_key,
            base_url,
            model: optional("MODEL").unwrap_or_else(|| "deepseek-chat".to_string()),
            system_prompt: optional("SYSTEM_PROMPT").unwrap_or_else(default_system_prompt),
            temperature,
            max_tokens,
            request_timeout: Duration::from_secs(timeout_secs),
            probe_timeout: Duration::from_secs(10),
            retry_base_delay: Duration::from_millis(500),
            webhook_url,
            port: parsed("PORT", 10000)?,
            mode,
        })
    }
}
