//! Core ticket data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::PlatformError;

/// Prefix for generated ticket identifiers.
pub const TICKET_ID_PREFIX: &str = "TICKET-";

/// Error type for ticket operations.
#[derive(Debug, Error)]
pub enum TicketError {
    /// A required input was missing or empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Ticket not found.
    #[error("Ticket not found: {0}")]
    NotFound(String),

    /// Cannot perform operation due to current status.
    #[error("Cannot {operation} ticket {ticket_id}: current status is {current_state}")]
    InvalidState {
        ticket_id: String,
        current_state: String,
        operation: String,
    },

    /// Storage backend failure.
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// A platform call (channel, message, interaction) failed.
    #[error("External dependency failure: {0}")]
    ExternalDependency(String),
}

impl From<PlatformError> for TicketError {
    fn from(err: PlatformError) -> Self {
        TicketError::ExternalDependency(err.to_string())
    }
}

/// Lifecycle status of a ticket.
///
/// The only transition is `Open -> Closed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    Open,
    Closed,
}

impl TicketStatus {
    /// Returns the status as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "OPEN",
            TicketStatus::Closed => "CLOSED",
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Closed)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A support ticket opened by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Unique identifier (`TICKET-<uuid>`).
    pub id: String,

    /// User who opened the ticket.
    pub user_id: String,

    /// Dedicated channel, `None` until provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    /// Sequential, human facing number (1-based).
    pub ticket_number: u32,

    /// Current status.
    pub status: TicketStatus,

    /// When the ticket was created.
    pub created_at: DateTime<Utc>,

    /// When the ticket was closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Create a new open ticket with no channel attached.
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, ticket_number: u32) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            channel_id: None,
            ticket_number,
            status: TicketStatus::Open,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    /// Generate a fresh ticket identifier.
    pub fn generate_id() -> String {
        format!("{}{}", TICKET_ID_PREFIX, uuid::Uuid::new_v4())
    }

    pub fn is_open(&self) -> bool {
        self.status == TicketStatus::Open
    }

    /// Attach the provisioned channel.
    pub fn attach_channel(&mut self, channel_id: impl Into<String>) {
        self.channel_id = Some(channel_id.into());
    }

    /// Move the ticket to `Closed`.
    pub fn close(&mut self) -> Result<(), TicketError> {
        if self.status.is_terminal() {
            return Err(TicketError::InvalidState {
                ticket_id: self.id.clone(),
                current_state: self.status.to_string(),
                operation: "close".to_string(),
            });
        }
        self.status = TicketStatus::Closed;
        self.closed_at = Some(Utc::now());
        Ok(())
    }

    /// Check the fields a store requires before accepting the ticket.
    pub fn validate(&self) -> Result<(), TicketError> {
        if self.id.trim().is_empty() {
            return Err(TicketError::InvalidArgument(
                "ticket id must not be empty".to_string(),
            ));
        }
        if self.user_id.trim().is_empty() {
            return Err(TicketError::InvalidArgument(
                "ticket user id must not be empty".to_string(),
            ));
        }
        if self.ticket_number == 0 {
            return Err(TicketError::InvalidArgument(
                "ticket number must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
