use anyhow::Context;
use chrono_tz::Tz;
use serde::Deserialize;

/// Handler configuration, read from the function environment
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// DynamoDB table keyed by `ContactId`
    pub table_name: String,
    /// ARN of the role assumed for delegated credentials
    pub assume_role: String,
    /// IANA zone the call date and timestamp are rendered in
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_time_zone() -> String {
    "America/New_York".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// TABLE_NAME -> table_name, ASSUME_ROLE -> assume_role
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(false))
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Parsed time zone
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid time zone: {}", self.time_zone))
    }
}
