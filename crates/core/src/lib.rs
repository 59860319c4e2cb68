pub mod broker;
pub mod cache;
pub mod config;
pub mod generation;
pub mod metrics;
pub mod processor;
pub mod shutdown;
pub mod testing;
pub mod ticket;

pub use broker::{
    retry_until_connected, AmqpSink, BrokerConnection, BrokerError, ConsumerLoop, ConsumerStats,
    MessageSink, TicketPublisher,
};
pub use cache::{CacheError, CacheKey, CacheStore, RedisCache};
pub use config::{
    load_config, load_config_from_str, validate_config, CacheKeyStrategy, Config, ConfigError,
    SanitizedConfig,
};
pub use generation::{GenerationClient, GenerationError, HttpGenerationClient};
pub use processor::{ProcessOutcome, TicketProcessor};
pub use ticket::{InboundRequest, MessageError, TicketDocument};
