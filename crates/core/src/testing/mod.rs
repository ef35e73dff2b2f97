//! Testing utilities and mock implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use ticketbot_core::testing::{fixtures, MockPlatformClient};
//!
//! let platform = Arc::new(MockPlatformClient::new());
//! let handler = fixtures::handler(platform.clone());
//!
//! handler
//!     .handle_interaction(&fixtures::button_click("create_ticket", "user-1", "control"))
//!     .await;
//! ```

mod mock_platform;

pub use mock_platform::{
    MockChannel, MockOperation, MockPlatformClient, RecordedMessage, RecordedResponse,
};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use crate::handler::{HandlerConfig, TicketHandler};
    use crate::platform::{
        Interaction, InteractionData, Member, PlatformClient, User,
        INTERACTION_TYPE_MESSAGE_COMPONENT,
    };
    use crate::ticket::{InMemoryTicketRepository, TicketService};

    pub const GUILD_ID: &str = "900";
    pub const CONTROL_CHANNEL_ID: &str = "901";
    pub const MOD_ROLE_ID: &str = "902";
    pub const CATEGORY_ID: &str = "903";

    /// Handler config with every guild id filled in.
    pub fn handler_config() -> HandlerConfig {
        HandlerConfig {
            guild_id: GUILD_ID.to_string(),
            control_channel_id: CONTROL_CHANNEL_ID.to_string(),
            mod_role_id: MOD_ROLE_ID.to_string(),
            category_id: CATEGORY_ID.to_string(),
            channel_prefix: "ticket-".to_string(),
        }
    }

    pub fn service() -> Arc<TicketService> {
        Arc::new(TicketService::new(Arc::new(InMemoryTicketRepository::new())))
    }

    /// Handler backed by a fresh in-memory repository.
    pub fn handler(platform: Arc<dyn PlatformClient>) -> TicketHandler {
        TicketHandler::new(service(), platform, handler_config())
    }

    /// A guild member clicking a button.
    pub fn button_click(custom_id: &str, user_id: &str, channel_id: &str) -> Interaction {
        Interaction {
            id: format!("interaction-{}-{}", user_id, custom_id),
            application_id: Some("app".to_string()),
            kind: INTERACTION_TYPE_MESSAGE_COMPONENT,
            token: "token".to_string(),
            data: Some(InteractionData {
                custom_id: Some(custom_id.to_string()),
                component_type: Some(2),
            }),
            guild_id: Some(GUILD_ID.to_string()),
            channel_id: Some(channel_id.to_string()),
            channel: None,
            member: Some(Member {
                user: Some(User {
                    id: user_id.to_string(),
                    username: format!("user{}", user_id),
                    bot: false,
                }),
                roles: Vec::new(),
            }),
            user: None,
        }
    }

    /// Same as `button_click`, by a member holding the moderator role.
    pub fn moderator_click(custom_id: &str, user_id: &str, channel_id: &str) -> Interaction {
        let mut interaction = button_click(custom_id, user_id, channel_id);
        if let Some(member) = interaction.member.as_mut() {
            member.roles.push(MOD_ROLE_ID.to_string());
        }
        interaction
    }

    /// Same as `button_click`, by a bot account.
    pub fn bot_click(custom_id: &str, user_id: &str, channel_id: &str) -> Interaction {
        let mut interaction = button_click(custom_id, user_id, channel_id);
        if let Some(user) = interaction.member.as_mut().and_then(|m| m.user.as_mut()) {
            user.bot = true;
        }
        interaction
    }
}
