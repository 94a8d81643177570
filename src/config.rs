//! Configuration types for widget-fetch

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Worker pool settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Default concurrency ceiling for jobs that do not request their own (default: 10)
    ///
    /// The effective number of workers for a job is `min(units, workers)`, so small
    /// batches never spawn idle workers.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-unit timeout applied to every unit (None = no per-unit timeout)
    #[serde(default, with = "option_duration_serde")]
    pub unit_timeout: Option<Duration>,

    /// Deadline for a whole batch, measured from submission (None = no deadline)
    ///
    /// When the deadline passes, units still running or not yet started report
    /// a cancellation error; completed units keep their results.
    #[serde(default, with = "option_duration_serde")]
    pub batch_deadline: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            unit_timeout: None,
            batch_deadline: None,
        }
    }
}

/// Shared HTTP client settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout for every request made through the shared client (default: 5 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of response body bytes kept in status errors (default: 256)
    #[serde(default = "default_max_error_body")]
    pub max_error_body: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
            user_agent: default_user_agent(),
            max_error_body: default_max_error_body(),
        }
    }
}

/// Main configuration for widget-fetch
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Worker pool settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Shared HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Load and validate configuration from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it fails
    /// [`Config::validate`]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a bounded, usable pool
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the offending key
    pub fn validate(&self) -> Result<()> {
        if self.pool.max_workers == 0 {
            return Err(Error::Config {
                message: "max_workers must be at least 1".to_string(),
                key: Some("pool.max_workers".to_string()),
            });
        }

        if self.pool.unit_timeout == Some(Duration::ZERO) {
            return Err(Error::Config {
                message: "unit_timeout must be greater than zero".to_string(),
                key: Some("pool.unit_timeout".to_string()),
            });
        }

        if self.http.timeout.is_zero() {
            return Err(Error::Config {
                message: "timeout must be greater than zero".to_string(),
                key: Some("http.timeout".to_string()),
            });
        }

        Ok(())
    }
}

// Default value functions
fn default_max_workers() -> usize {
    10
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_user_agent() -> String {
    format!("widget-fetch/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_error_body() -> usize {
    256
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
