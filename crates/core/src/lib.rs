pub mod config;
pub mod handler;
pub mod metrics;
pub mod platform;
pub mod testing;
pub mod ticket;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig,
};
pub use handler::{ComponentAction, HandlerConfig, TicketHandler};
pub use platform::{DiscordClient, Interaction, PlatformClient, PlatformError};
pub use ticket::{
    InMemoryTicketRepository, Ticket, TicketError, TicketRepository, TicketService, TicketStatus,
};
