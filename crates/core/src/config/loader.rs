use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for structured environment overrides, e.g. `TICKETRELAY_BROKER__HOST`.
pub const ENV_PREFIX: &str = "TICKETRELAY_";

/// Plain environment variables understood for compatibility with existing deployments.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("RABBITMQ_HOST", "broker.host"),
    ("RABBITMQ_USER", "broker.username"),
    ("RABBITMQ_PASS", "broker.password"),
    ("RABBITMQ_EXCHANGE", "broker.exchange"),
    ("RABBITMQ_INCOMING_QUEUE", "broker.incoming_queue"),
    ("RABBITMQ_INCOMING_ROUTING_KEY", "broker.incoming_routing_key"),
    ("RABBITMQ_OUTGOING_QUEUE", "broker.outgoing_queue"),
    ("RABBITMQ_OUTGOING_ROUTING_KEY", "broker.outgoing_routing_key"),
    ("REDIS_HOST", "cache.host"),
    ("VLLM_API_URL", "generation.url"),
];

/// Load configuration: defaults, then the optional TOML file, then environment overrides.
///
/// Structured variables (`TICKETRELAY_<SECTION>__<FIELD>`) win over the legacy names.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(legacy_env())
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, path)| (*path).into())
    })
}
