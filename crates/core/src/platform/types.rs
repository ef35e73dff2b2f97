//! Types for chat platform operations.
//!
//! The shapes follow the Discord v10 REST/gateway payloads closely enough
//! to (de)serialize them directly.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors that can occur during platform operations.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request timeout")]
    Timeout,
}

/// Discord permission bits used by ticket channels.
pub mod permissions {
    pub const MANAGE_CHANNELS: u64 = 1 << 4;
    pub const VIEW_CHANNEL: u64 = 1 << 10;
    pub const SEND_MESSAGES: u64 = 1 << 11;
    pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;
}

/// Channel type for guild text channels.
pub const CHANNEL_TYPE_GUILD_TEXT: u8 = 0;

/// Interaction type for message component (button) clicks.
pub const INTERACTION_TYPE_MESSAGE_COMPONENT: u8 = 3;

/// Message flag making a reply visible only to the invoking user.
pub const MESSAGE_FLAG_EPHEMERAL: u64 = 1 << 6;

/// Target of a permission overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OverwriteKind {
    Role,
    Member,
}

impl From<OverwriteKind> for u8 {
    fn from(kind: OverwriteKind) -> u8 {
        match kind {
            OverwriteKind::Role => 0,
            OverwriteKind::Member => 1,
        }
    }
}

impl TryFrom<u8> for OverwriteKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OverwriteKind::Role),
            1 => Ok(OverwriteKind::Member),
            other => Err(format!("unknown overwrite type {}", other)),
        }
    }
}

/// Per-role or per-member permission rule on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OverwriteKind,
    #[serde(with = "permission_bits")]
    pub allow: u64,
    #[serde(with = "permission_bits")]
    pub deny: u64,
}

impl PermissionOverwrite {
    pub fn role(id: impl Into<String>, allow: u64, deny: u64) -> Self {
        Self {
            id: id.into(),
            kind: OverwriteKind::Role,
            allow,
            deny,
        }
    }

    pub fn member(id: impl Into<String>, allow: u64, deny: u64) -> Self {
        Self {
            id: id.into(),
            kind: OverwriteKind::Member,
            allow,
            deny,
        }
    }
}

/// Discord sends permission sets as decimal strings.
mod permission_bits {
    use super::*;

    pub fn serialize<S: Serializer>(bits: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&bits.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Bits {
            Text(String),
            Number(u64),
        }

        match Bits::deserialize(deserializer)? {
            Bits::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Bits::Number(n) => Ok(n),
        }
    }
}

/// A posted message (only the fields the bot reads).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
}

/// A channel (only the fields the bot reads).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Request body for creating a guild channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateChannel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

/// Visual style of a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

impl From<ButtonStyle> for u8 {
    fn from(style: ButtonStyle) -> u8 {
        match style {
            ButtonStyle::Primary => 1,
            ButtonStyle::Danger => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Emoji {
    pub name: String,
}

/// Button component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    kind: u8,
    pub style: ButtonStyle,
    pub label: String,
    pub custom_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Emoji>,
}

impl Button {
    pub fn new(style: ButtonStyle, label: impl Into<String>, custom_id: impl Into<String>) -> Self {
        Self {
            kind: 2,
            style,
            label: label.into(),
            custom_id: custom_id.into(),
            emoji: None,
        }
    }

    pub fn with_emoji(mut self, name: impl Into<String>) -> Self {
        self.emoji = Some(Emoji { name: name.into() });
        self
    }
}

/// Row of buttons under a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    pub components: Vec<Button>,
}

impl ActionRow {
    pub fn new(components: Vec<Button>) -> Self {
        Self {
            kind: 1,
            components,
        }
    }
}

/// Message to post in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            components: Vec::new(),
        }
    }

    /// Attach a single row holding one button.
    pub fn with_button(mut self, button: Button) -> Self {
        self.components.push(ActionRow::new(vec![button]));
        self
    }

    /// Custom ids of every button on the message.
    pub fn custom_ids(&self) -> Vec<&str> {
        self.components
            .iter()
            .flat_map(|row| row.components.iter())
            .map(|b| b.custom_id.as_str())
            .collect()
    }
}

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// Guild member attached to an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionData {
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub component_type: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialChannel {
    pub id: String,
}

/// An inbound interaction (button click, command, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: u8,
    pub token: String,
    #[serde(default)]
    pub data: Option<InteractionData>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel: Option<PartialChannel>,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Interaction {
    pub fn is_message_component(&self) -> bool {
        self.kind == INTERACTION_TYPE_MESSAGE_COMPONENT
    }

    pub fn custom_id(&self) -> Option<&str> {
        self.data.as_ref()?.custom_id.as_deref()
    }

    /// Channel the interaction happened in.
    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id
            .as_deref()
            .or_else(|| self.channel.as_ref().map(|c| c.id.as_str()))
    }

    /// User who triggered the interaction (member user in guilds).
    pub fn acting_user(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
    }

    pub fn has_role(&self, role_id: &str) -> bool {
        self.member
            .as_ref()
            .map(|m| m.roles.iter().any(|r| r == role_id))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionResponseData {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ActionRow>>,
}

/// Reply to an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    pub data: InteractionResponseData,
}

impl InteractionResponse {
    /// New message only the invoking user can see.
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            kind: 4,
            data: InteractionResponseData {
                content: content.into(),
                flags: Some(MESSAGE_FLAG_EPHEMERAL),
                components: None,
            },
        }
    }

    /// Replace the message the component was attached to, dropping its buttons.
    pub fn update_message(content: impl Into<String>) -> Self {
        Self {
            kind: 7,
            data: InteractionResponseData {
                content: content.into(),
                flags: None,
                components: Some(Vec::new()),
            },
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        self.data.flags == Some(MESSAGE_FLAG_EPHEMERAL)
    }
}

/// Chat platform operations used by the ticket handler.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Most recent messages in a channel (newest first).
    async fn channel_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<Message>, PlatformError>;

    async fn delete_message(&self, channel_id: &str, message_id: &str)
        -> Result<(), PlatformError>;

    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutgoingMessage,
    ) -> Result<Message, PlatformError>;

    /// Create a channel in a guild.
    async fn create_channel(
        &self,
        guild_id: &str,
        request: &CreateChannel,
    ) -> Result<Channel, PlatformError>;

    /// Replace the permission overwrites of a channel.
    async fn edit_channel_permissions(
        &self,
        channel_id: &str,
        overwrites: &[PermissionOverwrite],
    ) -> Result<(), PlatformError>;

    async fn delete_channel(&self, channel_id: &str) -> Result<(), PlatformError>;

    async fn respond_to_interaction(
        &self,
        interaction: &Interaction,
        response: &InteractionResponse,
    ) -> Result<(), PlatformError>;
}
