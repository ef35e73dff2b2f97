//! Ticket domain: entity, repository and service.

mod memory_store;
mod service;
mod store;
mod types;

pub use memory_store::InMemoryTicketRepository;
pub use service::TicketService;
pub use store::TicketRepository;
pub use types::{Ticket, TicketError, TicketStatus, TICKET_ID_PREFIX};
