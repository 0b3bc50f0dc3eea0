use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::Config;

/// Result of one reachability check. Recomputed on every call; the status
/// command always shows the state at the time it was asked.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub reachable: bool,
    pub latency_ms: Option<f64>,
    pub message: String,
}

impl ConnectionStatus {
    fn down(message: String) -> Self {
        Self {
            reachable: false,
            latency_ms: None,
            message,
        }
    }
}

/// Lightweight pre-flight check against the completion service. One GET with
/// a short timeout, no retries; a status command has to answer fast.
pub struct Prober {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl Prober {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .build()
            .context("Failed to build probe HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Never fails: every error mode collapses into `reachable=false` with a
    /// message that says which mode it was.
    pub async fn probe(&self) -> ConnectionStatus {
        if self.api_key.trim().is_empty() {
            return ConnectionStatus::down("falta la clave de API".to_string());
        }

        let url = format!("{}/models", self.base_url);
        let started = Instant::now();
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await;

        let status = match response {
            Ok(resp) if resp.status().as_u16() == 200 => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                ConnectionStatus {
                    reachable: true,
                    latency_ms: Some(latency_ms),
                    message: "servicio disponible".to_string(),
                }
            }
            Ok(resp) => ConnectionStatus::down(format!(
                "el servicio respondió HTTP {}",
                resp.status().as_u16()
            )),
            Err(e) if e.is_timeout() => {
                ConnectionStatus::down("el servicio no respondió a tiempo".to_string())
            }
            Err(e) if e.is_connect() => {
                ConnectionStatus::down("no se pudo conectar con el servicio".to_string())
            }
            Err(e) => ConnectionStatus::down(format!("error inesperado: {}", e)),
        };

        if status.reachable {
            debug!(latency_ms = status.latency_ms.map(|l| l as u64), "Probe ok");
        } else {
            warn!(message = %status.message, "Probe failed");
        }
        status
    }
}
