//! In-memory ticket repository.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, error, info};

use super::{Ticket, TicketError, TicketRepository, TicketStatus};

#[derive(Debug, Default)]
struct Inner {
    tickets: HashMap<String, Ticket>,
    /// Highest ticket number handed out so far.
    last_number: u32,
}

/// Ticket repository backed by a `HashMap` behind a reader-writer lock.
///
/// Reads share the lock, `save` and number reservation take it exclusively.
#[derive(Debug, Default)]
pub struct InMemoryTicketRepository {
    inner: RwLock<Inner>,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> TicketError {
    TicketError::StorageFailure("ticket store lock poisoned".to_string())
}

impl TicketRepository for InMemoryTicketRepository {
    fn save(&self, ticket: &Ticket) -> Result<(), TicketError> {
        if let Err(e) = ticket.validate() {
            error!("Refusing to save ticket: {}", e);
            return Err(e);
        }

        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.tickets.insert(ticket.id.clone(), ticket.clone());
        inner.last_number = inner.last_number.max(ticket.ticket_number);
        drop(inner);

        info!(
            ticket_id = %ticket.id,
            user_id = %ticket.user_id,
            status = %ticket.status,
            "Ticket saved"
        );
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Ticket, TicketError> {
        let inner = self.inner.read().map_err(poisoned)?;
        match inner.tickets.get(id) {
            Some(ticket) => Ok(ticket.clone()),
            None => {
                debug!(ticket_id = %id, "Ticket lookup missed");
                Err(TicketError::NotFound(id.to_string()))
            }
        }
    }

    fn get_all(&self) -> Result<Vec<Ticket>, TicketError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.tickets.values().cloned().collect())
    }

    fn find_all_open(&self) -> Result<Vec<Ticket>, TicketError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .tickets
            .values()
            .filter(|t| t.status == TicketStatus::Open)
            .cloned()
            .collect())
    }

    fn count(&self) -> Result<usize, TicketError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.tickets.len())
    }

    fn next_ticket_number(&self) -> Result<u32, TicketError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let stored = u32::try_from(inner.tickets.len()).map_err(|_| {
            TicketError::StorageFailure("ticket count exceeds u32".to_string())
        })?;
        let next = inner.last_number.max(stored) + 1;
        inner.last_number = next;
        Ok(next)
    }
}
