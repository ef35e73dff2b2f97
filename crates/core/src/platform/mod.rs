//! Chat platform abstraction.
//!
//! This module provides a `PlatformClient` trait for the channel, message
//! and interaction calls the ticket handler makes, with a Discord REST
//! implementation.

mod discord;
mod types;

pub use discord::DiscordClient;
pub use types::*;
