use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Discord token and control channel are set
/// - REST timeout is not 0
/// - Server port is not 0 when the side server is enabled
///
/// Guild, category and moderator role ids are checked when a ticket channel
/// is provisioned.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.discord.token.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "discord.token must be set".to_string(),
        ));
    }

    if config.discord.control_channel_id.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "discord.control_channel_id must be set".to_string(),
        ));
    }

    if config.discord.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "discord.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.server.enabled && config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.discord.token = "token".to_string();
        config.discord.control_channel_id = "123".to_string();
        config
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_missing_token_fails() {
        let mut config = valid_config();
        config.discord.token = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("token")));
    }

    #[test]
    fn test_validate_missing_control_channel_fails() {
        let mut config = valid_config();
        config.discord.control_channel_id.clear();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = valid_config();
        config.discord.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_port_zero_only_when_enabled() {
        let mut config = valid_config();
        config.server.port = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));

        config.server.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_allows_missing_guild_layout() {
        let config = valid_config();
        assert!(config.discord.guild_id.is_empty());
        assert!(validate_config(&config).is_ok());
    }
}
