use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Config whose Discord endpoints refuse connections, so the bot runs
/// with only its HTTP side server reachable.
fn offline_config(port: u16) -> String {
    format!(
        r#"
[discord]
token = "test-token"
guild_id = "900"
control_channel_id = "901"
mod_role_id = "902"
category_id = "903"
api_base_url = "http://127.0.0.1:9"
gateway_url = "ws://127.0.0.1:9"
timeout_secs = 2

[server]
host = "127.0.0.1"
port = {}
"#,
        port
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

async fn spawn_bot(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_ticketbot"))
        .env("TICKETBOT_CONFIG", config_path)
        .env("RUST_LOG", "error")
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn bot")
}

/// Wait for the side server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn test_side_server_runs_without_discord() {
    let port = get_available_port();
    let temp_file = write_config(&offline_config(port));

    let mut bot = spawn_bot(temp_file.path()).await;
    assert!(wait_for_server(port, 50).await, "Bot did not start in time");

    let client = Client::new();
    let json: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(json["discord"]["token_configured"], true);
    assert_eq!(json["server"]["port"], port);
    assert!(!json.to_string().contains("test-token"));

    let json: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/v1/tickets/open", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(json["total"], 0);

    bot.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_ticketbot"))
            .env("TICKETBOT_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_token_exits_with_error() {
    let temp_file = write_config(
        r#"
[discord]
control_channel_id = "901"

[server]
enabled = false
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_ticketbot"))
            .env("TICKETBOT_CONFIG", temp_file.path())
            .env_remove("DISCORD_TOKEN")
            .env_remove("TICKETBOT_DISCORD_TOKEN")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
