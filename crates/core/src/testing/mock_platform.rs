//! Mock chat platform for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::platform::{
    Channel, CreateChannel, Interaction, InteractionResponse, Message, OutgoingMessage,
    PermissionOverwrite, PlatformClient, PlatformError,
};

/// Platform operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    ChannelMessages,
    DeleteMessage,
    SendMessage,
    CreateChannel,
    EditChannelPermissions,
    DeleteChannel,
    RespondToInteraction,
}

/// A message posted through the mock.
#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub channel_id: String,
    pub message: OutgoingMessage,
    pub timestamp: chrono::DateTime<Utc>,
}

/// An interaction reply sent through the mock.
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    pub interaction_id: String,
    pub response: InteractionResponse,
}

/// State of a channel created through the mock.
#[derive(Debug, Clone)]
pub struct MockChannel {
    pub guild_id: String,
    pub request: CreateChannel,
    pub overwrites: Vec<PermissionOverwrite>,
}

/// Mock implementation of the PlatformClient trait.
///
/// Records every side effect for assertions and can simulate failures,
/// either once (`set_next_error`) or for every call of one operation
/// (`fail_operation`).
///
/// # Example
///
/// ```rust,ignore
/// let platform = MockPlatformClient::new();
/// platform.fail_operation(MockOperation::CreateChannel).await;
///
/// handler.handle_interaction(&interaction).await;
///
/// assert!(platform.channels().await.is_empty());
/// assert!(platform.responses().await[0].response.is_ephemeral());
/// ```
#[derive(Debug)]
pub struct MockPlatformClient {
    /// Existing messages by channel id, returned by `channel_messages`.
    messages: Arc<RwLock<HashMap<String, Vec<Message>>>>,
    /// Messages posted through `send_message`.
    sent: Arc<RwLock<Vec<RecordedMessage>>>,
    /// `(channel_id, message_id)` pairs passed to `delete_message`.
    deleted_messages: Arc<RwLock<Vec<(String, String)>>>,
    /// Live channels by id.
    channels: Arc<RwLock<HashMap<String, MockChannel>>>,
    /// Ids passed to `delete_channel`.
    deleted_channels: Arc<RwLock<Vec<String>>>,
    responses: Arc<RwLock<Vec<RecordedResponse>>>,
    next_error: Arc<RwLock<Option<PlatformError>>>,
    failing: Arc<RwLock<HashSet<MockOperation>>>,
    /// Counter for generating unique snowflakes.
    id_counter: Arc<RwLock<u64>>,
}

impl Default for MockPlatformClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatformClient {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(HashMap::new())),
            sent: Arc::new(RwLock::new(Vec::new())),
            deleted_messages: Arc::new(RwLock::new(Vec::new())),
            channels: Arc::new(RwLock::new(HashMap::new())),
            deleted_channels: Arc::new(RwLock::new(Vec::new())),
            responses: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            failing: Arc::new(RwLock::new(HashSet::new())),
            id_counter: Arc::new(RwLock::new(1000)),
        }
    }

    /// Pre-populate a message in a channel.
    pub async fn seed_message(&self, channel_id: &str, content: &str) -> Message {
        let message = Message {
            id: self.generate_id().await,
            channel_id: channel_id.to_string(),
            content: content.to_string(),
        };
        self.messages
            .write()
            .await
            .entry(channel_id.to_string())
            .or_default()
            .push(message.clone());
        message
    }

    pub async fn sent_messages(&self) -> Vec<RecordedMessage> {
        self.sent.read().await.clone()
    }

    /// Messages posted to one channel.
    pub async fn sent_to(&self, channel_id: &str) -> Vec<OutgoingMessage> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .map(|m| m.message.clone())
            .collect()
    }

    pub async fn deleted_messages(&self) -> Vec<(String, String)> {
        self.deleted_messages.read().await.clone()
    }

    /// Live channels by id.
    pub async fn channels(&self) -> HashMap<String, MockChannel> {
        self.channels.read().await.clone()
    }

    pub async fn channel(&self, channel_id: &str) -> Option<MockChannel> {
        self.channels.read().await.get(channel_id).cloned()
    }

    pub async fn deleted_channels(&self) -> Vec<String> {
        self.deleted_channels.read().await.clone()
    }

    pub async fn responses(&self) -> Vec<RecordedResponse> {
        self.responses.read().await.clone()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: PlatformError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every call of `operation` fail until `clear_failures`.
    pub async fn fail_operation(&self, operation: MockOperation) {
        self.failing.write().await.insert(operation);
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
        *self.next_error.write().await = None;
    }

    async fn check(&self, operation: MockOperation) -> Result<(), PlatformError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if self.failing.read().await.contains(&operation) {
            return Err(PlatformError::Api {
                status: 500,
                message: format!("mock failure: {:?}", operation),
            });
        }
        Ok(())
    }

    async fn generate_id(&self) -> String {
        let mut counter = self.id_counter.write().await;
        *counter += 1;
        counter.to_string()
    }
}

#[async_trait]
impl PlatformClient for MockPlatformClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn channel_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<Message>, PlatformError> {
        self.check(MockOperation::ChannelMessages).await?;

        let messages = self.messages.read().await;
        Ok(messages
            .get(channel_id)
            .map(|list| {
                list.iter()
                    .rev()
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), PlatformError> {
        self.check(MockOperation::DeleteMessage).await?;

        let mut messages = self.messages.write().await;
        let list = messages.entry(channel_id.to_string()).or_default();
        let before = list.len();
        list.retain(|m| m.id != message_id);
        if list.len() == before {
            return Err(PlatformError::NotFound(format!("message {}", message_id)));
        }

        self.deleted_messages
            .write()
            .await
            .push((channel_id.to_string(), message_id.to_string()));
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutgoingMessage,
    ) -> Result<Message, PlatformError> {
        self.check(MockOperation::SendMessage).await?;

        let posted = Message {
            id: self.generate_id().await,
            channel_id: channel_id.to_string(),
            content: message.content.clone(),
        };
        self.messages
            .write()
            .await
            .entry(channel_id.to_string())
            .or_default()
            .push(posted.clone());
        self.sent.write().await.push(RecordedMessage {
            channel_id: channel_id.to_string(),
            message: message.clone(),
            timestamp: Utc::now(),
        });
        Ok(posted)
    }

    async fn create_channel(
        &self,
        guild_id: &str,
        request: &CreateChannel,
    ) -> Result<Channel, PlatformError> {
        self.check(MockOperation::CreateChannel).await?;

        let id = self.generate_id().await;
        self.channels.write().await.insert(
            id.clone(),
            MockChannel {
                guild_id: guild_id.to_string(),
                request: request.clone(),
                overwrites: request.permission_overwrites.clone(),
            },
        );

        Ok(Channel {
            id,
            name: Some(request.name.clone()),
            kind: request.kind,
            guild_id: Some(guild_id.to_string()),
            parent_id: request.parent_id.clone(),
        })
    }

    async fn edit_channel_permissions(
        &self,
        channel_id: &str,
        overwrites: &[PermissionOverwrite],
    ) -> Result<(), PlatformError> {
        self.check(MockOperation::EditChannelPermissions).await?;

        match self.channels.write().await.get_mut(channel_id) {
            Some(channel) => {
                channel.overwrites = overwrites.to_vec();
                Ok(())
            }
            None => Err(PlatformError::NotFound(format!("channel {}", channel_id))),
        }
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<(), PlatformError> {
        self.check(MockOperation::DeleteChannel).await?;

        if self.channels.write().await.remove(channel_id).is_none() {
            return Err(PlatformError::NotFound(format!("channel {}", channel_id)));
        }
        self.deleted_channels
            .write()
            .await
            .push(channel_id.to_string());
        Ok(())
    }

    async fn respond_to_interaction(
        &self,
        interaction: &Interaction,
        response: &InteractionResponse,
    ) -> Result<(), PlatformError> {
        self.check(MockOperation::RespondToInteraction).await?;

        self.responses.write().await.push(RecordedResponse {
            interaction_id: interaction.id.clone(),
            response: response.clone(),
        });
        Ok(())
    }
}
