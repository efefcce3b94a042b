use std::{env, path::PathBuf, time::Duration};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_ANALYTICS_URL: &str = "http://localhost:8000";
pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ANALYTICS_MODE must be 'http' or 'process', got '{0}'")]
    UnknownMode(String),
}

/// Where the analytics engine lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsMode {
    Http { base_url: String },
    Process { interpreter: PathBuf, script: PathBuf },
}

impl AnalyticsMode {
    pub fn label(&self) -> &'static str {
        match self {
            AnalyticsMode::Http { .. } => "http",
            AnalyticsMode::Process { .. } => "process",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub analytics: AnalyticsMode,
    pub analytics_timeout: Duration,
    pub identity: IdentityConfig,
    pub data_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests can
    /// feed values without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = lookup("ANALYTICS_MODE").unwrap_or_else(|| "http".to_string());
        let analytics = match mode.trim().to_ascii_lowercase().as_str() {
            "http" => AnalyticsMode::Http {
                base_url: lookup("ANALYTICS_API_URL")
                    .unwrap_or_else(|| DEFAULT_ANALYTICS_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
            "process" => AnalyticsMode::Process {
                interpreter: PathBuf::from(
                    lookup("ANALYTICS_PYTHON").unwrap_or_else(|| "python3".to_string()),
                ),
                script: PathBuf::from(lookup("ANALYTICS_SCRIPT").unwrap_or_else(|| {
                    "analytics-service/services/daily_analysis.py".to_string()
                })),
            },
            _ => return Err(ConfigError::UnknownMode(mode)),
        };

        let identity = IdentityConfig {
            base_url: lookup("FIREBASE_AUTH_URL")
                .unwrap_or_else(|| DEFAULT_IDENTITY_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: lookup("FIREBASE_API_KEY").unwrap_or_else(|| {
                warn!("FIREBASE_API_KEY not set, identity calls will be rejected");
                String::new()
            }),
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", 8080),
            analytics,
            analytics_timeout: Duration::from_secs(parse_or(
                &lookup,
                "ANALYTICS_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )),
            identity,
            data_path: PathBuf::from(
                lookup("APP_DATA_PATH").unwrap_or_else(|| "data/profiles.json".to_string()),
            ),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("invalid {key} value '{raw}', using default: {default}");
            default
        }),
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}
