//! Discord REST API client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DiscordConfig;
use crate::metrics;

use super::{
    Channel, CreateChannel, Interaction, InteractionResponse, Message, OutgoingMessage,
    PermissionOverwrite, PlatformClient, PlatformError,
};

/// Error body returned by the Discord API.
#[derive(Debug, Deserialize)]
struct DiscordErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<f64>,
}

#[derive(Serialize)]
struct EditPermissions<'a> {
    permission_overwrites: &'a [PermissionOverwrite],
}

/// Discord client implementation over the v10 REST API.
pub struct DiscordClient {
    client: Client,
    api_base_url: String,
}

impl DiscordClient {
    /// Create a new Discord client authenticated with the bot token.
    pub fn new(config: &DiscordConfig) -> Result<Self, PlatformError> {
        let mut auth = HeaderValue::from_str(&format!("Bot {}", config.token))
            .map_err(|e| PlatformError::InvalidRequest(format!("invalid bot token: {}", e)))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!(
                "DiscordBot (https://github.com/ticketbot/ticketbot, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .default_headers(headers)
            .build()
            .map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.clone(),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Send a request, timing it and mapping non-2xx statuses to errors.
    async fn execute(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, PlatformError> {
        let start = Instant::now();
        let result = send_checked(request).await;
        metrics::record_platform_request(
            operation,
            start.elapsed().as_secs_f64(),
            result.is_ok(),
        );

        match &result {
            Ok(response) => debug!("Discord {} -> {}", operation, response.status()),
            Err(e) => warn!("Discord {} failed: {}", operation, e),
        }
        result
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, PlatformError> {
        let response = self.execute(operation, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))
    }
}

async fn send_checked(request: RequestBuilder) -> Result<Response, PlatformError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            PlatformError::Timeout
        } else if e.is_connect() {
            PlatformError::ConnectionFailed(e.to_string())
        } else {
            PlatformError::Api {
                status: 0,
                message: e.to_string(),
            }
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(error_for_status(status.as_u16(), &body))
}

/// Map a failed Discord response to a [`PlatformError`].
fn error_for_status(status: u16, body: &str) -> PlatformError {
    let parsed: Option<DiscordErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        401 | 403 => PlatformError::Unauthorized(message),
        404 => PlatformError::NotFound(message),
        429 => PlatformError::RateLimited {
            retry_after_secs: parsed.and_then(|b| b.retry_after).unwrap_or(1.0),
        },
        _ => PlatformError::Api { status, message },
    }
}

#[async_trait]
impl PlatformClient for DiscordClient {
    fn name(&self) -> &str {
        "discord"
    }

    async fn channel_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<Message>, PlatformError> {
        let request = self
            .client
            .get(self.url(&format!("/channels/{}/messages", channel_id)))
            .query(&[("limit", limit.clamp(1, 100))]);
        self.execute_json("channel_messages", request).await
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), PlatformError> {
        let request = self.client.delete(self.url(&format!(
            "/channels/{}/messages/{}",
            channel_id, message_id
        )));
        self.execute("delete_message", request).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutgoingMessage,
    ) -> Result<Message, PlatformError> {
        let request = self
            .client
            .post(self.url(&format!("/channels/{}/messages", channel_id)))
            .json(message);
        self.execute_json("send_message", request).await
    }

    async fn create_channel(
        &self,
        guild_id: &str,
        request: &CreateChannel,
    ) -> Result<Channel, PlatformError> {
        let http = self
            .client
            .post(self.url(&format!("/guilds/{}/channels", guild_id)))
            .json(request);
        self.execute_json("create_channel", http).await
    }

    async fn edit_channel_permissions(
        &self,
        channel_id: &str,
        overwrites: &[PermissionOverwrite],
    ) -> Result<(), PlatformError> {
        let request = self
            .client
            .patch(self.url(&format!("/channels/{}", channel_id)))
            .json(&EditPermissions {
                permission_overwrites: overwrites,
            });
        self.execute("edit_channel", request).await?;
        Ok(())
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<(), PlatformError> {
        let request = self
            .client
            .delete(self.url(&format!("/channels/{}", channel_id)));
        self.execute("delete_channel", request).await?;
        Ok(())
    }

    async fn respond_to_interaction(
        &self,
        interaction: &Interaction,
        response: &InteractionResponse,
    ) -> Result<(), PlatformError> {
        let request = self
            .client
            .post(self.url(&format!(
                "/interactions/{}/{}/callback",
                interaction.id, interaction.token
            )))
            .json(response);
        self.execute("interaction_response", request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> DiscordConfig {
        DiscordConfig {
            token: "secret".to_string(),
            api_base_url: base.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let client = DiscordClient::new(&config("https://discord.test/api/v10/")).unwrap();
        assert_eq!(
            client.url("/channels/1"),
            "https://discord.test/api/v10/channels/1"
        );
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let mut cfg = config("https://discord.test");
        cfg.token = "bad\ntoken".to_string();
        assert!(matches!(
            DiscordClient::new(&cfg),
            Err(PlatformError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_error_for_status_mapping() {
        assert!(matches!(
            error_for_status(401, r#"{"message": "401: Unauthorized", "code": 0}"#),
            PlatformError::Unauthorized(ref m) if m == "401: Unauthorized"
        ));
        assert!(matches!(
            error_for_status(403, "forbidden"),
            PlatformError::Unauthorized(_)
        ));
        assert!(matches!(
            error_for_status(404, r#"{"message": "Unknown Channel", "code": 10003}"#),
            PlatformError::NotFound(ref m) if m == "Unknown Channel"
        ));
        assert!(matches!(
            error_for_status(500, "boom"),
            PlatformError::Api { status: 500, ref message } if message == "boom"
        ));
    }

    #[test]
    fn test_rate_limit_reads_retry_after() {
        match error_for_status(429, r#"{"message": "You are being rate limited.", "retry_after": 2.5, "global": false}"#) {
            PlatformError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 2.5),
            other => panic!("unexpected error: {:?}", other),
        }
        match error_for_status(429, "") {
            PlatformError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 1.0),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_connection_failed() {
        // Port 9 (discard) is closed on test hosts
        let client = DiscordClient::new(&config("http://127.0.0.1:9")).unwrap();
        let result = client.delete_channel("1").await;
        assert!(matches!(
            result,
            Err(PlatformError::ConnectionFailed(_)) | Err(PlatformError::Timeout)
        ));
    }
}
