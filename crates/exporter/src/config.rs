//! Exporter configuration.
//!
//! Every flag has an environment-variable fallback, and `main` loads a
//! `.env` file before parsing, so the same settings work from a shell,
//! a systemd unit, or a container.
//!
//! | Flag                   | Env                  | Default                                  |
//! |------------------------|----------------------|------------------------------------------|
//! | `--sensors`            | `SENSORS`            | -- (required)                            |
//! | `--listen`             | `LISTEN_ADDR`        | `0.0.0.0:8080`                           |
//! | `--base-url`           | `EGAIN_BASE_URL`     | `https://deployment.egain.io/api/indoor` |
//! | `--poll-interval-secs` | `POLL_INTERVAL_SECS` | `60`                                     |
//! | `--fetch-timeout-secs` | `FETCH_TIMEOUT_SECS` | `30`                                     |
//! | `--rate-interval-secs` | `RATE_INTERVAL_SECS` | `5`                                      |
//! | `--rate-burst`         | `RATE_BURST`         | `4`                                      |
//! | `--log-json`           | `LOG_JSON`           | `false`                                  |

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use egain_client::api::DEFAULT_BASE_URL;
use egain_core::error::CoreError;
use egain_core::sensor::SensorRegistry;

/// Command-line arguments, before validation.
#[derive(Debug, Clone, Parser)]
#[command(name = "egain-exporter", version, about = "Prometheus exporter for eGain indoor sensors")]
pub struct Args {
    /// Comma-separated `id=location` entries, e.g. `abc123=kitchen,def456=bath`.
    #[arg(long, env = "SENSORS")]
    pub sensors: Option<String>,

    /// Address the metrics and liveness endpoints bind to.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Upstream base URL; the sensor id is appended as a path segment.
    #[arg(long, env = "EGAIN_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Seconds between poll cycles.
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 60)]
    pub poll_interval_secs: u64,

    /// Upper bound for one fetch, rate-limit wait included.
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Seconds to refill one rate-limit token.
    #[arg(long, env = "RATE_INTERVAL_SECS", default_value_t = 5)]
    pub rate_interval_secs: u64,

    /// Rate-limit bucket capacity.
    #[arg(long, env = "RATE_BURST", default_value_t = 4)]
    pub rate_burst: u32,

    /// Emit JSON log lines.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

/// Outbound request budget shared by all sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateConfig {
    pub interval: Duration,
    pub burst: u32,
}

/// Validated exporter configuration.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub sensors: SensorRegistry,
    pub listen: SocketAddr,
    pub base_url: String,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub rate: RateConfig,
    pub log_json: bool,
}

impl ExporterConfig {
    /// Validate parsed arguments.
    pub fn from_args(args: Args) -> Result<Self, CoreError> {
        let sensors = SensorRegistry::parse(args.sensors.as_deref().unwrap_or_default())?;

        if args.base_url.trim().is_empty() {
            return Err(CoreError::Configuration("base URL must not be empty".into()));
        }

        let poll_interval = non_zero_secs("poll interval", args.poll_interval_secs)?;
        let fetch_timeout = non_zero_secs("fetch timeout", args.fetch_timeout_secs)?;
        let rate_interval = non_zero_secs("rate interval", args.rate_interval_secs)?;

        if args.rate_burst == 0 {
            return Err(CoreError::Configuration("rate burst must be at least 1".into()));
        }

        Ok(Self {
            sensors,
            listen: args.listen,
            base_url: args.base_url,
            poll_interval,
            fetch_timeout,
            rate: RateConfig {
                interval: rate_interval,
                burst: args.rate_burst,
            },
            log_json: args.log_json,
        })
    }
}

fn non_zero_secs(what: &str, secs: u64) -> Result<Duration, CoreError> {
    if secs == 0 {
        return Err(CoreError::Configuration(format!("{what} must be greater than zero")));
    }
    Ok(Duration::from_secs(secs))
}
