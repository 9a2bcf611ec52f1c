//! Configuration from command-line flags and environment variables.

use std::env;

pub const DEFAULT_GROUP: &str = "astroflow";
pub const DEFAULT_MAX_ALERTS: u64 = 50_000;
pub const DEFAULT_RADIUS_ARCSEC: f64 = 3.0;
pub const DEFAULT_DB_PATH: &str = "astroflow.db";

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Bootstrap host:port. Left empty when the flag is missing; the worker
    /// then fails at connect time rather than here.
    pub host: String,
    pub topic: String,
    pub group: String,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub broker: BrokerConfig,
    pub db_path: String,
    /// Message cap per worker.
    pub max_alerts: u64,
    pub workers: usize,
}

impl IngestConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args: Vec<String> = env::args().collect();
        Self::from_arg_list(&args)
    }

    pub fn from_arg_list(args: &[String]) -> Result<Self, ConfigError> {
        let host = flag_value(args, "--host").unwrap_or_default();
        let topic = flag_value(args, "--topic").unwrap_or_default();
        let group = flag_value(args, "--group").unwrap_or_else(|| DEFAULT_GROUP.to_string());

        let max_alerts = match flag_value(args, "--maxalert") {
            Some(s) => s.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(format!("--maxalert must be an integer, got '{}'", s))
            })?,
            None => DEFAULT_MAX_ALERTS,
        };

        let workers = match flag_value(args, "--nprocess") {
            Some(s) => match s.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::InvalidValue(format!(
                        "--nprocess must be a positive integer, got '{}'",
                        s
                    )))
                }
            },
            None => 1,
        };

        Ok(Self {
            broker: BrokerConfig { host, topic, group },
            db_path: env::var("ASTROFLOW_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),
            max_alerts,
            workers,
        })
    }
}

/// Time window for a registry poll.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchWindow {
    DaysAgo(u32),
    /// Operator-invoked full rebuild: the mirror and all derived crossmatch
    /// state are cleared before re-fetching the whole snapshot.
    All,
}

impl std::str::FromStr for FetchWindow {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(FetchWindow::All);
        }
        match s.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(FetchWindow::DaysAgo(n)),
            _ => Err(ConfigError::InvalidValue(format!(
                "--days-ago must be >= 1 or 'all', got '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistryPollConfig {
    pub window: FetchWindow,
    pub radius_arcsec: f64,
    pub registry_url: String,
    pub db_path: String,
}

impl RegistryPollConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args: Vec<String> = env::args().collect();
        Self::from_arg_list(&args)
    }

    pub fn from_arg_list(args: &[String]) -> Result<Self, ConfigError> {
        let window = match flag_value(args, "--days-ago") {
            Some(s) => s.parse()?,
            None => FetchWindow::DaysAgo(1),
        };

        let radius_arcsec = match flag_value(args, "--radius") {
            Some(s) => s.parse::<f64>().map_err(|_| {
                ConfigError::InvalidValue(format!("--radius must be a number, got '{}'", s))
            })?,
            None => DEFAULT_RADIUS_ARCSEC,
        };

        let registry_url = env::var("ASTROFLOW_REGISTRY_URL")
            .map_err(|_| ConfigError::MissingVariable("ASTROFLOW_REGISTRY_URL".to_string()))?;

        Ok(Self {
            window,
            radius_arcsec,
            registry_url,
            db_path: env::var("ASTROFLOW_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),
        })
    }
}

fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|idx| args.get(idx + 1))
        .cloned()
}
