//! Ticket business rules on top of a [`TicketRepository`].

use std::sync::Arc;

use tracing::{info, warn};

use crate::metrics;

use super::{Ticket, TicketError, TicketRepository};

/// Creates tickets and drives their status transitions.
///
/// This is the only place new ticket identities are minted. The service
/// never retries: repository errors are returned unchanged.
pub struct TicketService {
    repo: Arc<dyn TicketRepository>,
}

impl TicketService {
    pub fn new(repo: Arc<dyn TicketRepository>) -> Self {
        Self { repo }
    }

    /// Create and persist a new open ticket for `user_id`.
    pub fn create_ticket(&self, user_id: &str) -> Result<Ticket, TicketError> {
        let ticket = self.reserve_ticket(user_id)?;
        self.commit_ticket(&ticket)?;
        Ok(ticket)
    }

    /// Build a new open ticket with a reserved number, without persisting it.
    ///
    /// The caller provisions whatever the ticket needs (its channel) and then
    /// hands it to [`TicketService::commit_ticket`]. A reservation that is
    /// never committed leaves a gap in the numbering.
    pub fn reserve_ticket(&self, user_id: &str) -> Result<Ticket, TicketError> {
        if user_id.trim().is_empty() {
            return Err(TicketError::InvalidArgument(
                "user id must not be empty".to_string(),
            ));
        }

        let ticket_number = self.repo.next_ticket_number()?;
        Ok(Ticket::new(Ticket::generate_id(), user_id, ticket_number))
    }

    /// Persist a ticket obtained from [`TicketService::reserve_ticket`].
    pub fn commit_ticket(&self, ticket: &Ticket) -> Result<(), TicketError> {
        self.repo.save(ticket)?;
        metrics::TICKETS_CREATED.inc();
        info!(
            ticket_id = %ticket.id,
            user_id = %ticket.user_id,
            ticket_number = ticket.ticket_number,
            "Ticket created"
        );
        Ok(())
    }

    pub fn get_ticket(&self, ticket_id: &str) -> Result<Ticket, TicketError> {
        self.repo.get(ticket_id)
    }

    /// All tickets whose status is open.
    pub fn get_open_tickets(&self) -> Result<Vec<Ticket>, TicketError> {
        self.repo.find_all_open()
    }

    /// All tickets regardless of status.
    pub fn get_all_tickets(&self) -> Result<Vec<Ticket>, TicketError> {
        self.repo.get_all()
    }

    /// Attach (or re-attach) the channel of a ticket.
    pub fn update_ticket_channel_id(
        &self,
        ticket_id: &str,
        channel_id: &str,
    ) -> Result<(), TicketError> {
        let mut ticket = self.repo.get(ticket_id)?;
        if let Some(previous) = ticket.channel_id.as_deref() {
            if previous != channel_id {
                warn!(
                    ticket_id = %ticket_id,
                    previous_channel_id = %previous,
                    channel_id = %channel_id,
                    "Overwriting ticket channel"
                );
            }
        }
        ticket.attach_channel(channel_id);
        self.repo.save(&ticket)
    }

    /// Close an open ticket. Closing twice fails with `InvalidState`.
    pub fn close_ticket(&self, ticket_id: &str) -> Result<Ticket, TicketError> {
        let mut ticket = self.repo.get(ticket_id)?;
        ticket.close()?;
        self.repo.save(&ticket)?;
        metrics::TICKETS_CLOSED.inc();
        info!(
            ticket_id = %ticket.id,
            user_id = %ticket.user_id,
            "Ticket closed"
        );
        Ok(ticket)
    }
}
