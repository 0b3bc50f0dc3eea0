use std::time::Duration;

use adanbot::config::{Config, DeliveryMode};

/// Config pointed at a local mock server, with short timeouts and retry
/// delays so the retry-policy tests stay fast.
pub fn test_config(base_url: &str) -> Config {
    Config {
        bot_token: "test_bot_token_12345".to_string(),
        api_key: "test-key".to_string(),
        base_url: base_url.trim_end_matches('/').to_string(),
        model: "deepseek-chat".to_string(),
        system_prompt: "Eres un bot de prueba.".to_string(),
        temperature: 0.2,
        max_tokens: 64,
        request_timeout: Duration::from_millis(500),
        probe_timeout: Duration::from_millis(500),
        retry_base_delay: Duration::from_millis(10),
        webhook_url: None,
        port: 0,
        mode: DeliveryMode::Polling,
    }
}

/// A listener that accepts connections and never answers; used to force
/// client-side timeouts.
pub async fn stalled_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stalled server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            match listener.accept().await {
                Ok((socket, _)) => held.push(socket),
                Err(_) => break,
            }
        }
    });
    format!("http://{}", addr)
}
