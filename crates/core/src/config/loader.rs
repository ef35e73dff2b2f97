use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment overrides, e.g. `TICKETBOT_DISCORD_TOKEN`.
pub const ENV_PREFIX: &str = "TICKETBOT_";

const ENV_SECTIONS: [&str; 3] = ["discord_", "tickets_", "server_"];

/// Unprefixed variable names accepted for the Discord settings.
const LEGACY_ENV_KEYS: [(&str, &str); 5] = [
    ("DISCORD_TOKEN", "discord.token"),
    ("DISCORD_GUILD_ID", "discord.guild_id"),
    ("CONTROL_CHANNEL_ID", "discord.control_channel_id"),
    ("MOD_ROLE_ID", "discord.mod_role_id"),
    ("TICKET_CATEGORY_ID", "discord.category_id"),
];

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    extract(Figment::new().merge(Toml::file(path)))
}

/// Load configuration from environment variables only
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    extract(Figment::new())
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn extract(base: Figment) -> Result<Config, ConfigError> {
    base.merge(legacy_env())
        .merge(prefixed_env())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// `TICKETBOT_<SECTION>_<KEY>`, split on the first underscore only so keys
/// like `guild_id` survive.
fn prefixed_env() -> Env {
    Env::prefixed(ENV_PREFIX)
        .filter(|key| {
            let key = key.as_str().to_ascii_lowercase();
            ENV_SECTIONS.iter().any(|section| key.starts_with(section))
        })
        .map(|key| key.as_str().to_ascii_lowercase().replacen('_', ".", 1).into())
}

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        LEGACY_ENV_KEYS
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, path)| (*path).into())
            .unwrap_or_else(|| key.as_str().to_string().into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[discord]
token = "abc"
control_channel_id = "10"

[server]
port = 9000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.discord.token, "abc");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_load_config_from_str_invalid_type() {
        let toml = r#"
[server]
port = "eighty"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[discord]
token = "file-token"
guild_id = "100"
control_channel_id = "200"

[server]
host = "127.0.0.1"
port = 3000
"#
        )
        .unwrap();

        Jail::expect_with(|_jail| {
            let config = load_config(temp_file.path()).unwrap();
            assert_eq!(config.discord.token, "file-token");
            assert_eq!(config.discord.guild_id, "100");
            assert_eq!(config.server.port, 3000);
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
[discord]
token = "file-token"
guild_id = "100"
"#,
            )?;
            jail.set_env("TICKETBOT_DISCORD_TOKEN", "env-token");
            jail.set_env("TICKETBOT_DISCORD_MOD_ROLE_ID", "300");
            jail.set_env("TICKETBOT_SERVER_PORT", "9100");
            jail.set_env("TICKETBOT_LOG_FORMAT", "json");

            let config = load_config(Path::new("config.toml")).unwrap();
            assert_eq!(config.discord.token, "env-token");
            assert_eq!(config.discord.guild_id, "100");
            assert_eq!(config.discord.mod_role_id, "300");
            assert_eq!(config.server.port, 9100);
            Ok(())
        });
    }

    #[test]
    fn test_legacy_env_names() {
        Jail::expect_with(|jail| {
            jail.set_env("DISCORD_TOKEN", "legacy-token");
            jail.set_env("DISCORD_GUILD_ID", "1");
            jail.set_env("CONTROL_CHANNEL_ID", "2");
            jail.set_env("MOD_ROLE_ID", "3");
            jail.set_env("TICKET_CATEGORY_ID", "4");

            let config = load_config_from_env().unwrap();
            assert_eq!(config.discord.token, "legacy-token");
            assert_eq!(config.discord.guild_id, "1");
            assert_eq!(config.discord.control_channel_id, "2");
            assert_eq!(config.discord.mod_role_id, "3");
            assert_eq!(config.discord.category_id, "4");
            Ok(())
        });
    }

    #[test]
    fn test_snowflake_ids_from_legacy_env() {
        Jail::expect_with(|jail| {
            jail.set_env("DISCORD_TOKEN", "tok");
            jail.set_env("DISCORD_GUILD_ID", "1098765432109876543");
            jail.set_env("CONTROL_CHANNEL_ID", "1198765432109876543");
            jail.set_env("MOD_ROLE_ID", "987654321098765432");
            jail.set_env("TICKET_CATEGORY_ID", "1298765432109876543");

            let config = load_config_from_env().unwrap();
            assert_eq!(config.discord.guild_id, "1098765432109876543");
            assert_eq!(config.discord.control_channel_id, "1198765432109876543");
            assert_eq!(config.discord.mod_role_id, "987654321098765432");
            assert_eq!(config.discord.category_id, "1298765432109876543");
            Ok(())
        });
    }

    #[test]
    fn test_snowflake_ids_from_prefixed_env() {
        Jail::expect_with(|jail| {
            jail.set_env("TICKETBOT_DISCORD_TOKEN", "1234567890");
            jail.set_env("TICKETBOT_DISCORD_GUILD_ID", "1098765432109876543");
            jail.set_env("TICKETBOT_DISCORD_CONTROL_CHANNEL_ID", "1198765432109876543");
            jail.set_env("TICKETBOT_DISCORD_MOD_ROLE_ID", "987654321098765432");
            jail.set_env("TICKETBOT_DISCORD_CATEGORY_ID", "1298765432109876543");

            let config = load_config_from_env().unwrap();
            assert_eq!(config.discord.token, "1234567890");
            assert_eq!(config.discord.guild_id, "1098765432109876543");
            assert_eq!(config.discord.control_channel_id, "1198765432109876543");
            assert_eq!(config.discord.mod_role_id, "987654321098765432");
            assert_eq!(config.discord.category_id, "1298765432109876543");
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_wins_over_legacy() {
        Jail::expect_with(|jail| {
            jail.set_env("DISCORD_TOKEN", "legacy-token");
            jail.set_env("TICKETBOT_DISCORD_TOKEN", "prefixed-token");

            let config = load_config_from_env().unwrap();
            assert_eq!(config.discord.token, "prefixed-token");
            Ok(())
        });
    }
}
