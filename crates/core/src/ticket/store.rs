//! Ticket repository trait.

use crate::ticket::{Ticket, TicketError};

/// Trait for ticket storage backends.
///
/// The repository owns the authoritative copy of every ticket. Callers get
/// clones and route every mutation back through [`TicketRepository::save`].
pub trait TicketRepository: Send + Sync {
    /// Insert or overwrite a ticket keyed by its id.
    ///
    /// Fails with [`TicketError::InvalidArgument`] when required fields are
    /// missing; the store is left untouched in that case.
    fn save(&self, ticket: &Ticket) -> Result<(), TicketError>;

    /// Get a ticket by id.
    fn get(&self, id: &str) -> Result<Ticket, TicketError>;

    /// All stored tickets, in no particular order.
    fn get_all(&self) -> Result<Vec<Ticket>, TicketError>;

    /// Tickets whose status is `Open`. Empty when there are none.
    fn find_all_open(&self) -> Result<Vec<Ticket>, TicketError>;

    /// Number of stored tickets.
    fn count(&self) -> Result<usize, TicketError>;

    /// Reserve the next ticket number.
    ///
    /// The reservation happens under the same exclusion as writes, so two
    /// concurrent callers never receive the same number.
    fn next_ticket_number(&self) -> Result<u32, TicketError>;
}
