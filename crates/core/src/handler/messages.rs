//! User facing texts and component ids.

pub const CREATE_TICKET_ID: &str = "create_ticket";
pub const CLOSE_TICKET_ID: &str = "close_ticket";
pub const DELETE_TICKET_ID: &str = "delete_ticket";

pub const CONTROL_MESSAGE_TITLE: &str = "Create a new ticket";
pub const CONTROL_MESSAGE_BODY: &str = "Press the button below to open a new ticket";
pub const CREATE_BUTTON_LABEL: &str = "Create ticket";
pub const CLOSE_BUTTON_LABEL: &str = "Close ticket";
pub const DELETE_BUTTON_LABEL: &str = "Delete ticket";

pub const CREATE_EMOJI: &str = "📨";
pub const CLOSE_EMOJI: &str = "🔒";
pub const DELETE_EMOJI: &str = "🗑️";

pub const TICKET_CLOSED: &str = "🔒 Ticket closed.";
pub const TICKET_ALREADY_CLOSED: &str = "🔒 This ticket is already closed.";

pub const CREATE_FAILED: &str = "❌ Something went wrong while creating the ticket";
pub const CHANNEL_FAILED: &str = "❌ Could not create a channel for the ticket";
pub const CLOSE_FAILED: &str = "❌ Could not close the ticket";
pub const DELETE_FAILED: &str = "❌ Could not delete the ticket";

/// Control message posted in the control channel.
pub fn control_message() -> String {
    format!("**{}**\n{}", CONTROL_MESSAGE_TITLE, CONTROL_MESSAGE_BODY)
}

/// Ephemeral reply after a ticket channel was created.
pub fn ticket_created(channel_id: &str) -> String {
    format!("Ticket created: <#{}>", channel_id)
}

/// First message in a fresh ticket channel.
pub fn welcome(ticket_number: u32, user_id: &str) -> String {
    format!(
        "**Ticket #{}**\nOpened by: <@{}>\n\nDescribe your problem here.",
        ticket_number, user_id
    )
}
