use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Ports are not 0
/// - Broker host is a bare hostname or address
/// - Queue names are set, routing keys too when an exchange is used
/// - Generation URL is http(s) with a non-zero timeout
/// - Broker retry delay and cache connect timeout are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let broker = &config.broker;

    if broker.port == 0 {
        return Err(invalid("broker.port cannot be 0"));
    }
    if broker.host.is_empty()
        || broker
            .host
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '@' | '/' | '?' | '#'))
    {
        return Err(ConfigError::ValidationError(format!(
            "broker.host must be a bare hostname, got '{}'",
            broker.host
        )));
    }
    if broker.incoming_queue.trim().is_empty() {
        return Err(invalid("broker.incoming_queue cannot be empty"));
    }
    if broker.outgoing_queue.trim().is_empty() {
        return Err(invalid("broker.outgoing_queue cannot be empty"));
    }
    if !broker.uses_default_exchange() {
        if broker.incoming_routing_key.is_empty() {
            return Err(invalid(
                "broker.incoming_routing_key is required when an exchange is configured",
            ));
        }
        if broker.outgoing_routing_key.is_empty() {
            return Err(invalid(
                "broker.outgoing_routing_key is required when an exchange is configured",
            ));
        }
    }
    if broker.retry_delay_secs == 0 {
        return Err(invalid("broker.retry_delay_secs cannot be 0"));
    }

    if config.cache.port == 0 {
        return Err(invalid("cache.port cannot be 0"));
    }
    if config.cache.connect_timeout_secs == 0 {
        return Err(invalid("cache.connect_timeout_secs cannot be 0"));
    }

    let url = &config.generation.url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "generation.url must be an http(s) URL, got '{}'",
            url
        )));
    }
    if config.generation.timeout_secs == 0 {
        return Err(invalid("generation.timeout_secs cannot be 0"));
    }

    if config.ingress.port == 0 {
        return Err(invalid("ingress.port cannot be 0"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
