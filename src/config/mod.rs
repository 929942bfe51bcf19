use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api-ssl.bitly.com/v4";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub window: MetricsWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the metrics provider's REST API, without a trailing slash
    pub base_url: String,
    /// Per-request timeout. None leaves the transport default in place.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "UpstreamConfig::default_user_agent")]
    pub user_agent: String,
}

impl UpstreamConfig {
    fn default_user_agent() -> String {
        format!("clickgeo/{}", env!("CARGO_PKG_VERSION"))
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs: None,
            user_agent: Self::default_user_agent(),
        }
    }
}

/// Time-bucket granularity understood by the provider's metrics endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
        }
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trailing observation window: `units` buckets of `unit` each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsWindow {
    pub unit: TimeUnit,
    pub units: u32,
}

impl MetricsWindow {
    pub const fn default_units() -> u32 {
        30
    }
}

impl Default for MetricsWindow {
    fn default() -> Self {
        Self {
            unit: TimeUnit::Day,
            units: Self::default_units(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup, `from_env` passes the process environment
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_host = get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let api_port = get("API_PORT")
            .unwrap_or_else(|| "8000".to_string())
            .parse::<u16>()
            .context("API_PORT must be a valid port number")?;

        let base_url =
            get("UPSTREAM_BASE_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string());

        let timeout_secs = match get("UPSTREAM_TIMEOUT_SECS") {
            Some(v) => Some(
                v.parse::<u64>()
                    .context("UPSTREAM_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            None => None,
        };

        let unit = get("METRICS_UNIT")
            .unwrap_or_else(|| "day".to_string())
            .to_lowercase();

        let unit = match unit.as_str() {
            "minute" => TimeUnit::Minute,
            "hour" => TimeUnit::Hour,
            "day" => TimeUnit::Day,
            "week" => TimeUnit::Week,
            "month" => TimeUnit::Month,
            other => {
                tracing::warn!(
                    "Unknown METRICS_UNIT '{other}', falling back to 'day'. Supported values: minute, hour, day, week, month"
                );
                TimeUnit::Day
            }
        };

        let units = match get("METRICS_UNITS") {
            Some(v) => v
                .parse::<u32>()
                .context("METRICS_UNITS must be a positive integer")?,
            None => MetricsWindow::default_units(),
        };

        if units == 0 {
            bail!("METRICS_UNITS must be greater than zero");
        }

        let mut upstream = UpstreamConfig::new(base_url);
        upstream.timeout_secs = timeout_secs;

        Ok(Config {
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            upstream,
            window: MetricsWindow { unit, units },
        })
    }
}
