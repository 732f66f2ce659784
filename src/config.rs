//! Runtime configuration read from the process environment.

use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;
use tracing::info;

use crate::platform::{
    gateway::DEFAULT_GATEWAY_URL, models::Snowflake, rest::DEFAULT_API_BASE,
};

/// Acknowledge affordance used when `VERIFY_EMOJI` is not set.
pub const DEFAULT_VERIFY_EMOJI: &str = "✅";
/// Default outer period of the counting filler task.
const DEFAULT_FILLER_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
/// Default inactivity timeout of each timeout-workflow step.
const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_PORT: u16 = 8080;

/// Failures raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Environment variable is present but cannot be parsed.
    #[error("invalid value `{value}` for `{var}`: expected {expected}")]
    InvalidValue {
        /// Name of the variable.
        var: &'static str,
        /// Raw value found in the environment.
        value: String,
        /// Description of the accepted format.
        expected: &'static str,
    },
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Bot credential used for both REST and gateway authentication.
    pub token: String,
    /// Guild the bot serves.
    pub guild_id: Snowflake,
    /// Application owning the registered commands.
    pub application_id: Snowflake,
    /// Channel hosting the verification anchor message.
    pub verification_channel: Snowflake,
    /// Role granted when a member acknowledges the rules.
    pub verified_role: Snowflake,
    /// Channel where the counting game is played.
    pub counting_channel: Snowflake,
    /// Channel receiving moderation audit records.
    pub mod_log_channel: Snowflake,
    /// Roles allowed to start the timeout workflow.
    pub moderator_roles: Vec<Snowflake>,
    /// Acknowledge affordance, as a unicode glyph or `name:id`.
    pub verify_emoji: String,
    /// Directory holding the persisted JSON records.
    pub state_dir: PathBuf,
    /// Outer period of the counting filler.
    pub filler_period: Duration,
    /// Deadline of each timeout workflow step.
    pub step_timeout: Duration,
    /// Port of the keep-alive HTTP endpoint.
    pub port: u16,
    /// Base URL of the platform REST API.
    pub api_base: String,
    /// Websocket URL of the platform gateway.
    pub gateway_url: String,
}

impl AppConfig {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::from_lookup(|var| env::var(var).ok())?;
        info!(
            guild = %config.guild_id,
            state_dir = %config.state_dir.display(),
            moderator_roles = config.moderator_roles.len(),
            "loaded configuration from environment"
        );
        Ok(config)
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let require = |var: &'static str| get(var).ok_or(ConfigError::MissingEnvVar { var });
        let snowflake = |var: &'static str| require(var).and_then(|value| parse_snowflake(var, &value));
        let seconds = |var: &'static str, default: Duration| match get(var) {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidValue {
                    var,
                    value,
                    expected: "a positive number of seconds",
                }),
            None => Ok(default),
        };

        let moderator_roles = require("MODERATOR_ROLE_IDS")?
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| parse_snowflake("MODERATOR_ROLE_IDS", value))
            .collect::<Result<Vec<_>, _>>()?;
        if moderator_roles.is_empty() {
            return Err(ConfigError::MissingEnvVar {
                var: "MODERATOR_ROLE_IDS",
            });
        }

        let port = match get("PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                var: "PORT",
                value,
                expected: "a TCP port",
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            token: require("DISCORD_TOKEN")?,
            guild_id: snowflake("GUILD_ID")?,
            application_id: snowflake("APPLICATION_ID")?,
            verification_channel: snowflake("CHANNEL_ID")?,
            verified_role: snowflake("ROLE_ID")?,
            counting_channel: snowflake("COUNTING_CHANNEL_ID")?,
            mod_log_channel: snowflake("MOD_LOG_CHANNEL_ID")?,
            moderator_roles,
            verify_emoji: get("VERIFY_EMOJI").unwrap_or_else(|| DEFAULT_VERIFY_EMOJI.to_string()),
            state_dir: get("STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            filler_period: seconds("FILLER_PERIOD_SECS", DEFAULT_FILLER_PERIOD)?,
            step_timeout: seconds("WORKFLOW_STEP_TIMEOUT_SECS", DEFAULT_STEP_TIMEOUT)?,
            port,
            api_base: get("DISCORD_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            gateway_url: get("DISCORD_GATEWAY_URL")
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
        })
    }
}

fn parse_snowflake(var: &'static str, value: &str) -> Result<Snowflake, ConfigError> {
    value
        .parse::<u64>()
        .map(Snowflake)
        .map_err(|_| ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            expected: "a numeric id",
        })
}
