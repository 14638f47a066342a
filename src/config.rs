use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub backend: BackendConfig,
    pub limits: LimitsConfig,
    pub credit: CreditConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Endpoint URL, with or without a trailing /run or /runsync.
    pub endpoint: String,
    /// Bare credential string, sent as-is in the Authorization header.
    pub api_key: String,
    pub request_timeout_s: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    pub max_xml_chars: usize,  // ~2MB of markup
}

#[derive(Debug, Deserialize, Clone)]
pub struct CreditConfig {
    pub min_balance_cents: i64,  // admission gate, not a precise debit
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::Environment::with_prefix("APP"))
            .build()?;

        config.try_deserialize()
    }
}
