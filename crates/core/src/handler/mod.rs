//! Interaction handler.
//!
//! Translates platform interactions (button clicks) into ticket service
//! calls and platform side effects: posting the control message, creating
//! private ticket channels, locking them on close and deleting them.

pub mod messages;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::metrics;
use crate::platform::{
    permissions, Button, ButtonStyle, Channel, CreateChannel, Interaction, InteractionResponse,
    Message, OutgoingMessage, PermissionOverwrite, PlatformClient, CHANNEL_TYPE_GUILD_TEXT,
};
use crate::ticket::{Ticket, TicketError, TicketService};

/// Maximum number of old control channel messages cleared on startup.
const CONTROL_CHANNEL_SCAN_LIMIT: u8 = 100;

/// Guild layout the handler needs.
#[derive(Debug, Clone, Default)]
pub struct HandlerConfig {
    pub guild_id: String,
    pub control_channel_id: String,
    pub mod_role_id: String,
    pub category_id: String,
    pub channel_prefix: String,
}

impl From<&Config> for HandlerConfig {
    fn from(config: &Config) -> Self {
        Self {
            guild_id: config.discord.guild_id.clone(),
            control_channel_id: config.discord.control_channel_id.clone(),
            mod_role_id: config.discord.mod_role_id.clone(),
            category_id: config.discord.category_id.clone(),
            channel_prefix: config.tickets.channel_prefix.clone(),
        }
    }
}

/// Button action encoded in a component custom id.
///
/// Close and delete buttons carry the ticket id (`close_ticket:<id>`); bare
/// ids from older messages are resolved through the interaction's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentAction {
    CreateTicket,
    CloseTicket(Option<String>),
    DeleteTicket(Option<String>),
}

impl ComponentAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        let (name, ticket_id) = match custom_id.split_once(':') {
            Some((name, arg)) if !arg.is_empty() => (name, Some(arg.to_string())),
            Some((name, _)) => (name, None),
            None => (custom_id, None),
        };

        match name {
            messages::CREATE_TICKET_ID => Some(ComponentAction::CreateTicket),
            messages::CLOSE_TICKET_ID => Some(ComponentAction::CloseTicket(ticket_id)),
            messages::DELETE_TICKET_ID => Some(ComponentAction::DeleteTicket(ticket_id)),
            _ => None,
        }
    }

    pub fn custom_id(&self) -> String {
        match self {
            ComponentAction::CreateTicket => messages::CREATE_TICKET_ID.to_string(),
            ComponentAction::CloseTicket(id) => with_ticket(messages::CLOSE_TICKET_ID, id),
            ComponentAction::DeleteTicket(id) => with_ticket(messages::DELETE_TICKET_ID, id),
        }
    }

    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ComponentAction::CreateTicket => "create",
            ComponentAction::CloseTicket(_) => "close",
            ComponentAction::DeleteTicket(_) => "delete",
        }
    }
}

fn with_ticket(name: &str, ticket_id: &Option<String>) -> String {
    match ticket_id {
        Some(id) => format!("{}:{}", name, id),
        None => name.to_string(),
    }
}

enum Handled {
    Done,
    Ignored,
}

/// Handles ticket related interactions.
pub struct TicketHandler {
    service: Arc<TicketService>,
    platform: Arc<dyn PlatformClient>,
    config: HandlerConfig,
}

impl TicketHandler {
    pub fn new(
        service: Arc<TicketService>,
        platform: Arc<dyn PlatformClient>,
        config: HandlerConfig,
    ) -> Self {
        Self {
            service,
            platform,
            config,
        }
    }

    pub fn service(&self) -> &TicketService {
        &self.service
    }

    /// Clear the control channel and post a fresh control message.
    ///
    /// Individual deletions that fail are logged and skipped.
    pub async fn initialize_control_panel(&self) -> Result<Message, TicketError> {
        let channel_id = &self.config.control_channel_id;

        let existing = self
            .platform
            .channel_messages(channel_id, CONTROL_CHANNEL_SCAN_LIMIT)
            .await?;
        for message in &existing {
            if let Err(e) = self.platform.delete_message(channel_id, &message.id).await {
                warn!("Failed to delete message {}: {}", message.id, e);
            }
        }

        let control = OutgoingMessage::text(messages::control_message()).with_button(
            Button::new(
                ButtonStyle::Primary,
                messages::CREATE_BUTTON_LABEL,
                messages::CREATE_TICKET_ID,
            )
            .with_emoji(messages::CREATE_EMOJI),
        );
        let posted = self.platform.send_message(channel_id, &control).await?;

        info!(
            "Control message {} posted in {} ({} old messages cleared)",
            posted.id,
            channel_id,
            existing.len()
        );
        Ok(posted)
    }

    /// Handle one inbound interaction. Errors are reported to the user and
    /// logged, never returned.
    pub async fn handle_interaction(&self, interaction: &Interaction) {
        if !interaction.is_message_component() {
            return;
        }

        let Some(action) = interaction.custom_id().and_then(ComponentAction::parse) else {
            debug!(
                "Ignoring component {:?} on interaction {}",
                interaction.custom_id(),
                interaction.id
            );
            return;
        };

        let result = match &action {
            ComponentAction::CreateTicket => self.handle_create_ticket(interaction).await,
            ComponentAction::CloseTicket(id) => {
                self.handle_close_ticket(interaction, id.as_deref()).await
            }
            ComponentAction::DeleteTicket(id) => {
                self.handle_delete_ticket(interaction, id.as_deref()).await
            }
        };

        let outcome = match &result {
            Ok(Handled::Done) => "success",
            Ok(Handled::Ignored) => "ignored",
            Err(_) => "failed",
        };
        metrics::INTERACTIONS
            .with_label_values(&[action.name(), outcome])
            .inc();

        if let Err(e) = result {
            error!(
                "Failed to handle {} interaction {}: {}",
                action.name(),
                interaction.id,
                e
            );
        }
    }

    async fn handle_create_ticket(&self, interaction: &Interaction) -> Result<Handled, TicketError> {
        let Some(user) = interaction.acting_user() else {
            let err = TicketError::InvalidArgument("interaction has no user".to_string());
            return Err(self.fail(interaction, messages::CREATE_FAILED, err).await);
        };
        if user.bot {
            debug!("Ignoring ticket request from bot {}", user.id);
            return Ok(Handled::Ignored);
        }

        // Nothing is persisted until the channel exists
        let mut ticket = match self.service.reserve_ticket(&user.id) {
            Ok(ticket) => ticket,
            Err(e) => return Err(self.fail(interaction, messages::CREATE_FAILED, e).await),
        };

        let channel = match self.create_private_channel(&user.id, &ticket).await {
            Ok(channel) => channel,
            Err(e) => return Err(self.fail(interaction, messages::CHANNEL_FAILED, e).await),
        };

        ticket.attach_channel(&channel.id);
        if let Err(e) = self.service.commit_ticket(&ticket) {
            if let Err(del) = self.platform.delete_channel(&channel.id).await {
                warn!(
                    "Failed to remove channel {} of unsaved ticket {}: {}",
                    channel.id, ticket.id, del
                );
            }
            return Err(self.fail(interaction, messages::CREATE_FAILED, e).await);
        }

        let reply = InteractionResponse::ephemeral(messages::ticket_created(&channel.id));
        if let Err(e) = self.platform.respond_to_interaction(interaction, &reply).await {
            error!("Failed to send interaction response: {}", e);
        }

        let close_id = ComponentAction::CloseTicket(Some(ticket.id.clone())).custom_id();
        let welcome = OutgoingMessage::text(messages::welcome(ticket.ticket_number, &user.id))
            .with_button(
                Button::new(ButtonStyle::Danger, messages::CLOSE_BUTTON_LABEL, close_id)
                    .with_emoji(messages::CLOSE_EMOJI),
            );
        if let Err(e) = self.platform.send_message(&channel.id, &welcome).await {
            error!("Failed to send welcome message: {}", e);
        }

        Ok(Handled::Done)
    }

    async fn create_private_channel(
        &self,
        user_id: &str,
        ticket: &Ticket,
    ) -> Result<Channel, TicketError> {
        let cfg = &self.config;
        if cfg.guild_id.is_empty()
            || cfg.category_id.is_empty()
            || cfg.mod_role_id.is_empty()
            || user_id.is_empty()
        {
            return Err(TicketError::InvalidArgument(format!(
                "missing required IDs (guild: {:?}, category: {:?}, mod role: {:?}, user: {:?})",
                cfg.guild_id, cfg.category_id, cfg.mod_role_id, user_id
            )));
        }

        let request = CreateChannel {
            name: format!("{}{}", cfg.channel_prefix, ticket.ticket_number),
            kind: CHANNEL_TYPE_GUILD_TEXT,
            parent_id: Some(cfg.category_id.clone()),
            permission_overwrites: self.open_overwrites(user_id),
        };

        let channel = self.platform.create_channel(&cfg.guild_id, &request).await?;
        info!(
            channel_id = %channel.id,
            ticket_id = %ticket.id,
            "Ticket channel created"
        );
        Ok(channel)
    }

    /// Overwrites of an open ticket channel: hidden from @everyone, open to
    /// the owner and moderators.
    fn open_overwrites(&self, user_id: &str) -> Vec<PermissionOverwrite> {
        let cfg = &self.config;
        vec![
            // @everyone shares the guild id
            PermissionOverwrite::role(&cfg.guild_id, 0, permissions::VIEW_CHANNEL),
            PermissionOverwrite::member(
                user_id,
                permissions::VIEW_CHANNEL | permissions::SEND_MESSAGES,
                0,
            ),
            PermissionOverwrite::role(
                &cfg.mod_role_id,
                permissions::VIEW_CHANNEL
                    | permissions::SEND_MESSAGES
                    | permissions::MANAGE_CHANNELS,
                0,
            ),
        ]
    }

    async fn handle_close_ticket(
        &self,
        interaction: &Interaction,
        ticket_id: Option<&str>,
    ) -> Result<Handled, TicketError> {
        let (Some(user), Some(channel_id)) = (interaction.acting_user(), interaction.channel_id())
        else {
            let err = TicketError::InvalidArgument("interaction has no user or channel".to_string());
            return Err(self.fail(interaction, messages::CLOSE_FAILED, err).await);
        };

        let cfg = &self.config;
        if cfg.guild_id.is_empty() || cfg.mod_role_id.is_empty() {
            let err = TicketError::InvalidArgument(format!(
                "missing required IDs (guild: {:?}, mod role: {:?})",
                cfg.guild_id, cfg.mod_role_id
            ));
            return Err(self.fail(interaction, messages::CLOSE_FAILED, err).await);
        }

        let ticket = match self.resolve_ticket(ticket_id, channel_id) {
            Ok(ticket) => ticket,
            Err(e) => return Err(self.fail(interaction, messages::CLOSE_FAILED, e).await),
        };
        if !ticket.is_open() {
            self.reply(interaction, messages::TICKET_ALREADY_CLOSED).await;
            return Ok(Handled::Ignored);
        }

        let mut overwrites = vec![
            PermissionOverwrite::role(&cfg.guild_id, 0, permissions::VIEW_CHANNEL),
            PermissionOverwrite::role(
                &cfg.mod_role_id,
                permissions::VIEW_CHANNEL | permissions::READ_MESSAGE_HISTORY,
                permissions::SEND_MESSAGES,
            ),
        ];
        if !interaction.has_role(&cfg.mod_role_id) {
            overwrites.push(PermissionOverwrite::member(
                &user.id,
                0,
                permissions::SEND_MESSAGES | permissions::VIEW_CHANNEL,
            ));
        }

        if let Err(e) = self
            .platform
            .edit_channel_permissions(channel_id, &overwrites)
            .await
        {
            return Err(self.fail(interaction, messages::CLOSE_FAILED, e.into()).await);
        }

        match self.service.close_ticket(&ticket.id) {
            Ok(_) => {}
            Err(TicketError::InvalidState { .. }) => {
                self.reply(interaction, messages::TICKET_ALREADY_CLOSED).await;
                return Ok(Handled::Ignored);
            }
            Err(e) => {
                // Channel is already locked; put the open overwrites back
                error!(
                    ticket_id = %ticket.id,
                    channel_id = %channel_id,
                    "Closing ticket failed after the channel was locked: {}", e
                );
                self.unlock_channel(&ticket, channel_id).await;
                return Err(self.fail(interaction, messages::CLOSE_FAILED, e).await);
            }
        }

        let update = InteractionResponse::update_message(messages::TICKET_CLOSED);
        if let Err(e) = self.platform.respond_to_interaction(interaction, &update).await {
            error!("Failed to update interaction response: {}", e);
        }

        let delete_id = ComponentAction::DeleteTicket(Some(ticket.id.clone())).custom_id();
        let notice = OutgoingMessage::text(messages::TICKET_CLOSED).with_button(
            Button::new(ButtonStyle::Danger, messages::DELETE_BUTTON_LABEL, delete_id)
                .with_emoji(messages::DELETE_EMOJI),
        );
        if let Err(e) = self.platform.send_message(channel_id, &notice).await {
            error!("Failed to send close message: {}", e);
        }

        Ok(Handled::Done)
    }

    async fn unlock_channel(&self, ticket: &Ticket, channel_id: &str) {
        let overwrites = self.open_overwrites(&ticket.user_id);
        match self
            .platform
            .edit_channel_permissions(channel_id, &overwrites)
            .await
        {
            Ok(()) => info!(ticket_id = %ticket.id, "Ticket channel unlocked"),
            Err(e) => error!(
                ticket_id = %ticket.id,
                channel_id = %channel_id,
                "Ticket channel stays locked while the ticket is open: {}", e
            ),
        }
    }

    /// Deletes the channel only; the ticket record is kept.
    async fn handle_delete_ticket(
        &self,
        interaction: &Interaction,
        ticket_id: Option<&str>,
    ) -> Result<Handled, TicketError> {
        let Some(channel_id) = interaction.channel_id() else {
            let err = TicketError::InvalidArgument("interaction has no channel".to_string());
            return Err(self.fail(interaction, messages::DELETE_FAILED, err).await);
        };

        if let Err(e) = self.platform.delete_channel(channel_id).await {
            return Err(self.fail(interaction, messages::DELETE_FAILED, e.into()).await);
        }

        metrics::TICKET_CHANNELS_DELETED.inc();
        info!(
            channel_id = %channel_id,
            ticket_id = ticket_id.unwrap_or("unknown"),
            "Ticket channel deleted"
        );
        Ok(Handled::Done)
    }

    /// Find the ticket a close/delete button refers to.
    fn resolve_ticket(&self, ticket_id: Option<&str>, channel_id: &str) -> Result<Ticket, TicketError> {
        let ticket = match ticket_id {
            Some(id) => self.service.get_ticket(id)?,
            None => self
                .service
                .get_all_tickets()?
                .into_iter()
                .find(|t| t.channel_id.as_deref() == Some(channel_id))
                .ok_or_else(|| TicketError::NotFound(format!("channel {}", channel_id)))?,
        };

        if ticket.channel_id.as_deref() != Some(channel_id) {
            return Err(TicketError::InvalidArgument(format!(
                "ticket {} does not belong to channel {}",
                ticket.id, channel_id
            )));
        }
        Ok(ticket)
    }

    async fn reply(&self, interaction: &Interaction, text: &str) {
        let response = InteractionResponse::ephemeral(text);
        if let Err(e) = self.platform.respond_to_interaction(interaction, &response).await {
            warn!("Failed to send ephemeral reply to {}: {}", interaction.id, e);
        }
    }

    /// Tell the user something failed and hand the error back.
    async fn fail(&self, interaction: &Interaction, text: &str, err: TicketError) -> TicketError {
        self.reply(interaction, text).await;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_component_actions() {
        assert_eq!(
            ComponentAction::parse("create_ticket"),
            Some(ComponentAction::CreateTicket)
        );
        assert_eq!(
            ComponentAction::parse("close_ticket:TICKET-1"),
            Some(ComponentAction::CloseTicket(Some("TICKET-1".to_string())))
        );
        assert_eq!(
            ComponentAction::parse("close_ticket"),
            Some(ComponentAction::CloseTicket(None))
        );
        assert_eq!(
            ComponentAction::parse("delete_ticket:"),
            Some(ComponentAction::DeleteTicket(None))
        );
        assert_eq!(ComponentAction::parse("something_else"), None);
        assert_eq!(ComponentAction::parse(""), None);
    }

    #[test]
    fn test_custom_id_round_trip() {
        let action = ComponentAction::DeleteTicket(Some("TICKET-abc".to_string()));
        assert_eq!(action.custom_id(), "delete_ticket:TICKET-abc");
        assert_eq!(ComponentAction::parse(&action.custom_id()), Some(action));
        assert_eq!(ComponentAction::CloseTicket(None).custom_id(), "close_ticket");
    }

    #[test]
    fn test_custom_id_fits_discord_limit() {
        let id = ComponentAction::CloseTicket(Some(Ticket::generate_id())).custom_id();
        assert!(id.len() <= 100);
    }

    #[test]
    fn test_handler_config_from_config() {
        let mut config = Config::default();
        config.discord.guild_id = "g".to_string();
        config.discord.category_id = "c".to_string();
        let handler_config = HandlerConfig::from(&config);
        assert_eq!(handler_config.guild_id, "g");
        assert_eq!(handler_config.category_id, "c");
        assert_eq!(handler_config.channel_prefix, "ticket-");
    }
}
