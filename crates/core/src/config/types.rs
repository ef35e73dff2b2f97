use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub tickets: TicketsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Discord connection and guild layout.
///
/// Ids are kept as opaque strings. Guild, category and moderator role are
/// checked per request by the ticket handler, not at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    /// Bot token (without the `Bot ` prefix)
    #[serde(default, deserialize_with = "string_or_number")]
    pub token: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub guild_id: String,
    /// Channel holding the "create ticket" control message
    #[serde(default, deserialize_with = "string_or_number")]
    pub control_channel_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub mod_role_id: String,
    /// Category new ticket channels are created under
    #[serde(default, deserialize_with = "string_or_number")]
    pub category_id: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    /// REST request timeout in seconds (default: 15)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            guild_id: String::new(),
            control_channel_id: String::new(),
            mod_role_id: String::new(),
            category_id: String::new(),
            api_base_url: default_api_base_url(),
            gateway_url: default_gateway_url(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Environment values that look numeric arrive as integers; snowflake ids
/// must still land in a `String`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or an integer")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_string<E: de::Error>(self, value: String) -> Result<String, E> {
            Ok(value)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u128<E: de::Error>(self, value: u128) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i128<E: de::Error>(self, value: i128) -> Result<String, E> {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}

fn default_timeout() -> u64 {
    15
}

/// Ticket channel settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TicketsConfig {
    /// Name prefix of ticket channels, followed by the ticket number
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            channel_prefix: default_channel_prefix(),
        }
    }
}

fn default_channel_prefix() -> String {
    "ticket-".to_string()
}

/// HTTP side server (health, metrics, open tickets)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub discord: SanitizedDiscordConfig,
    pub tickets: TicketsConfig,
    pub server: ServerConfig,
}

/// Sanitized Discord config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDiscordConfig {
    pub token_configured: bool,
    pub guild_id: String,
    pub control_channel_id: String,
    pub mod_role_id: String,
    pub category_id: String,
    pub api_base_url: String,
    pub gateway_url: String,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let d = &config.discord;
        Self {
            discord: SanitizedDiscordConfig {
                token_configured: !d.token.is_empty(),
                guild_id: d.guild_id.clone(),
                control_channel_id: d.control_channel_id.clone(),
                mod_role_id: d.mod_role_id.clone(),
                category_id: d.category_id.clone(),
                api_base_url: d.api_base_url.clone(),
                gateway_url: d.gateway_url.clone(),
                timeout_secs: d.timeout_secs,
            },
            tickets: config.tickets.clone(),
            server: config.server.clone(),
        }
    }
}
