//! Integration test: start the relay on a free port, check the health probe
//! and the static app fallback. Does not require a reachable provider — the
//! provider is only contacted from /api/chat. The server task is left
//! running when the test ends.

use lib::config::Config;
use lib::relay;
use std::path::PathBuf;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn test_config(port: u16) -> Config {
    let mut config = Config::default();
    config.server.port = port;
    config.server.bind = "127.0.0.1".to_string();
    config.provider.endpoint = Some("http://127.0.0.1:9".to_string());
    config.provider.api_key = Some("test-key".to_string());
    config
}

#[tokio::test]
async fn relay_health_responds_with_running() {
    let port = free_port();
    let config = test_config(port);
    let config_path = std::env::temp_dir().join(format!(
        "deckchat-relay-test-{}/config.json",
        uuid::Uuid::new_v4()
    ));

    let relay_handle = tokio::spawn(async move {
        let _ = relay::run_relay(config, &config_path).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(format!("{}/healthz", base)).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: serde_json::Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));

                // Non-API routes serve the app entry; asset paths resolve too.
                let index = client
                    .get(format!("{}/some/deep/route", base))
                    .send()
                    .await
                    .expect("fallback");
                assert!(index.status().is_success());
                let html = index.text().await.expect("body");
                assert!(html.contains("<title>deckchat</title>"));

                let css = client
                    .get(format!("{}/app.css", base))
                    .send()
                    .await
                    .expect("asset");
                assert_eq!(
                    css.headers()
                        .get("content-type")
                        .and_then(|v| v.to_str().ok()),
                    Some("text/css")
                );
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let _ = relay_handle.abort();
    panic!(
        "GET {}/healthz did not return 200 within 5s; last error: {:?}",
        base, last_err
    );
}

#[tokio::test]
async fn relay_refuses_to_start_without_provider_credentials() {
    let config = Config::default();
    let err = relay::run_relay(config, &PathBuf::from("/tmp/deckchat-config.json"))
        .await
        .expect_err("startup must fail");
    assert!(err.to_string().contains("endpoint not configured"));

    let mut config = Config::default();
    config.provider.endpoint = Some("http://127.0.0.1:9".to_string());
    let err = relay::run_relay(config, &PathBuf::from("/tmp/deckchat-config.json"))
        .await
        .expect_err("startup must fail");
    assert!(err.to_string().contains("API key not configured"));
}
