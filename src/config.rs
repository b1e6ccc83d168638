//! Console configuration.
//!
//! Settings are layered with the `config` crate: built-in defaults, an
//! optional TOML file, then `CEMS_*` environment variables.
//!
//! ```toml
//! backend_url = "http://127.0.0.1:8000"
//! connect_timeout = "10s"
//! reconnect_delay = "10s"
//! debounce_window = "3s"
//! freshness_budget = "10s"
//! cache_path = "/var/lib/cems/last_known.json"
//! ```
//!
//! ```bash
//! CEMS_BACKEND_URL=http://10.0.0.5:8000 cems-console
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::backend::DEFAULT_BASE_URL;
use crate::data::duration::parse_duration;
use crate::data::AggregatorSettings;
use crate::stream::StreamSettings;
use crate::view::{AlarmLayout, DEFAULT_FRESHNESS_BUDGET, DEFAULT_WARN_FRACTION};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "CEMS";

/// Upper bound for every configured duration.
const MAX_DURATION: Duration = Duration::from_secs(86_400);

/// Upper bounds for the alarm layout within the status vector.
const MAX_ALARM_OFFSET: usize = 1_024;
const MAX_ALARM_COUNT: usize = 64;

/// Fully resolved console settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    pub backend_url: String,
    pub stream: StreamSettings,
    pub aggregator: AggregatorSettings,
    pub freshness_budget: Duration,
    /// Delay between tearing feeds down and reconnecting on refresh.
    pub refresh_delay: Duration,
    pub startup_attempts: u32,
    pub startup_interval: Duration,
    pub alarm_layout: AlarmLayout,
    pub warn_fraction: f64,
    pub cache_path: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BASE_URL.to_string(),
            stream: StreamSettings::default(),
            aggregator: AggregatorSettings::default(),
            freshness_budget: DEFAULT_FRESHNESS_BUDGET,
            refresh_delay: Duration::from_millis(500),
            startup_attempts: 30,
            startup_interval: Duration::from_secs(1),
            alarm_layout: AlarmLayout::default(),
            warn_fraction: DEFAULT_WARN_FRACTION,
            cache_path: None,
        }
    }
}

/// Settings as written by the operator, before durations are parsed.
#[derive(Debug, Deserialize)]
struct RawConfig {
    backend_url: String,
    connect_timeout: String,
    reconnect_delay: String,
    manual_cooldown: String,
    debounce_window: String,
    banner_duration: String,
    freshness_budget: String,
    refresh_delay: String,
    startup_attempts: u32,
    startup_interval: String,
    alarm_offset: usize,
    alarm_count: usize,
    warn_fraction: f64,
    #[serde(default)]
    cache_path: Option<PathBuf>,
}

impl ConsoleConfig {
    /// Load the configuration from defaults, `path` (if any) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("backend_url", DEFAULT_BASE_URL)?
            .set_default("connect_timeout", "10s")?
            .set_default("reconnect_delay", "10s")?
            .set_default("manual_cooldown", "1s")?
            .set_default("debounce_window", "3s")?
            .set_default("banner_duration", "12s")?
            .set_default("freshness_budget", "10s")?
            .set_default("refresh_delay", "500ms")?
            .set_default("startup_attempts", 30_i64)?
            .set_default("startup_interval", "1s")?
            .set_default("alarm_offset", 15_i64)?
            .set_default("alarm_count", 4_i64)?
            .set_default("warn_fraction", DEFAULT_WARN_FRACTION)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let raw: RawConfig = builder
            .add_source(env)
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        Self::resolve(raw)
    }

    fn resolve(raw: RawConfig) -> Result<Self> {
        let duration = |key: &str, value: &str| -> Result<Duration> {
            let d = parse_duration(value).with_context(|| format!("Invalid `{}`", key))?;
            if d > MAX_DURATION {
                bail!("`{}` must be at most 24h, got {}", key, value);
            }
            Ok(d)
        };

        if !(raw.warn_fraction > 0.0 && raw.warn_fraction <= 1.0) {
            bail!("`warn_fraction` must be in (0, 1], got {}", raw.warn_fraction);
        }
        if raw.startup_attempts == 0 {
            bail!("`startup_attempts` must be at least 1");
        }
        if raw.alarm_count == 0 || raw.alarm_count > MAX_ALARM_COUNT {
            bail!(
                "`alarm_count` must be between 1 and {}, got {}",
                MAX_ALARM_COUNT,
                raw.alarm_count
            );
        }
        if raw.alarm_offset > MAX_ALARM_OFFSET {
            bail!(
                "`alarm_offset` must be at most {}, got {}",
                MAX_ALARM_OFFSET,
                raw.alarm_offset
            );
        }

        Ok(Self {
            backend_url: raw.backend_url.trim_end_matches('/').to_string(),
            stream: StreamSettings {
                connect_timeout: duration("connect_timeout", &raw.connect_timeout)?,
                reconnect_delay: duration("reconnect_delay", &raw.reconnect_delay)?,
                manual_cooldown: duration("manual_cooldown", &raw.manual_cooldown)?,
            },
            aggregator: AggregatorSettings {
                debounce_window: duration("debounce_window", &raw.debounce_window)?,
                banner_duration: duration("banner_duration", &raw.banner_duration)?,
            },
            freshness_budget: duration("freshness_budget", &raw.freshness_budget)?,
            refresh_delay: duration("refresh_delay", &raw.refresh_delay)?,
            startup_attempts: raw.startup_attempts,
            startup_interval: duration("startup_interval", &raw.startup_interval)?,
            alarm_layout: AlarmLayout {
                offset: raw.alarm_offset,
                count: raw.alarm_count,
            },
            warn_fraction: raw.warn_fraction,
            cache_path: raw.cache_path,
        })
    }
}
