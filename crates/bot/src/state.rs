use std::sync::Arc;
use ticketbot_core::{Config, SanitizedConfig, TicketService};

/// Shared application state
pub struct AppState {
    config: Config,
    ticket_service: Arc<TicketService>,
}

impl AppState {
    pub fn new(config: Config, ticket_service: Arc<TicketService>) -> Self {
        Self {
            config,
            ticket_service,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn ticket_service(&self) -> &TicketService {
        &self.ticket_service
    }
}
