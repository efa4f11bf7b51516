use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Wal,
}

impl FromStr for StoreKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "wal" => Ok(StoreKind::Wal),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    pub store: StoreKind,
    pub data_dir: PathBuf,
    pub timezone: Tz,
    pub spaces_file: Option<PathBuf>,
    pub require_approval: bool,
    pub complete_interval: Duration,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    /// Bearer token for the admin routes. Unset keeps them closed.
    pub admin_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: 3000,
            store: StoreKind::Memory,
            data_dir: PathBuf::from("./data"),
            timezone: chrono_tz::Europe::Paris,
            spaces_file: None,
            require_approval: false,
            complete_interval: Duration::from_secs(300),
            compact_threshold: 1000,
            metrics_port: None,
            admin_token: None,
        }
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<bool, ConfigError> {
    match lookup(var) {
        None => Ok(false),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::Invalid { var, value }),
        },
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Config::default();
        let complete_secs: u64 = parse(&lookup, "WOTE_COMPLETE_INTERVAL_SECS", 300)?;
        if complete_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "WOTE_COMPLETE_INTERVAL_SECS",
                value: "0".into(),
            });
        }
        let metrics_port = match lookup("WOTE_METRICS_PORT") {
            None => None,
            Some(value) => Some(value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "WOTE_METRICS_PORT",
                value,
            })?),
        };
        Ok(Self {
            bind: parse(&lookup, "WOTE_BIND", d.bind)?,
            port: parse(&lookup, "WOTE_PORT", d.port)?,
            store: parse(&lookup, "WOTE_STORE", d.store)?,
            data_dir: lookup("WOTE_DATA_DIR").map_or(d.data_dir, PathBuf::from),
            timezone: parse(&lookup, "WOTE_TIMEZONE", d.timezone)?,
            spaces_file: lookup("WOTE_SPACES_FILE").map(PathBuf::from),
            require_approval: parse_bool(&lookup, "WOTE_REQUIRE_APPROVAL")?,
            complete_interval: Duration::from_secs(complete_secs),
            compact_threshold: parse(&lookup, "WOTE_COMPACT_THRESHOLD", d.compact_threshold)?,
            metrics_port,
            admin_token: lookup("WOTE_ADMIN_TOKEN").filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }
}
