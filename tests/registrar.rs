//! Webhook registrar behavior against a mocked Bot API.
//!
//! Teloxide request paths are `/bot<token>/<Method>`; all methods go out as
//! POST requests.

use adanbot::transport::webhook;
use reqwest::Url;
use teloxide::Bot;

const TOKEN: &str = "test_bot_token_12345";

const OK_TRUE: &str = r#"{"ok":true,"result":true}"#;
const SERVER_ERROR: &str = r#"{"ok":false,"error_code":500,"description":"Internal Server Error"}"#;

fn bot_against(server: &mockito::ServerGuard) -> Bot {
    Bot::new(TOKEN).set_api_url(Url::parse(&server.url()).expect("mock server url"))
}

#[tokio::test]
async fn configure_twice_leaves_one_registration() {
    let mut server = mockito::Server::new_async().await;
    let delete_mock = server
        .mock("POST", format!("/bot{}/DeleteWebhook", TOKEN).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(OK_TRUE)
        .expect(2)
        .create_async()
        .await;
    let set_mock = server
        .mock("POST", format!("/bot{}/SetWebhook", TOKEN).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(OK_TRUE)
        .expect(2)
        .create_async()
        .await;

    let bot = bot_against(&server);
    let target = Url::parse("https://example.com/webhook").unwrap();

    webhook::configure(&bot, &target).await.expect("first run");
    webhook::configure(&bot, &target).await.expect("second run");

    // Each run clears before it registers, so the second run cannot stack a
    // duplicate delivery target.
    delete_mock.assert_async().await;
    set_mock.assert_async().await;
}

#[tokio::test]
async fn registration_failure_is_retried_then_fatal() {
    let mut server = mockito::Server::new_async().await;
    let delete_mock = server
        .mock("POST", format!("/bot{}/DeleteWebhook", TOKEN).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(OK_TRUE)
        .expect(3)
        .create_async()
        .await;
    let set_mock = server
        .mock("POST", format!("/bot{}/SetWebhook", TOKEN).as_str())
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(SERVER_ERROR)
        .expect(3)
        .create_async()
        .await;

    let bot = bot_against(&server);
    let target = Url::parse("https://example.com/webhook").unwrap();

    let result = webhook::configure(&bot, &target).await;

    assert!(result.is_err());
    delete_mock.assert_async().await;
    set_mock.assert_async().await;
}
