use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_NEAR_DUE_DAYS: u32 = 14;
const DEFAULT_UPCOMING_DUE_LIMIT: usize = 20;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let near_due_days = match env::var("APP_NEAR_DUE_DAYS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidNearDueDays(raw))?,
            Err(_) => DEFAULT_NEAR_DUE_DAYS,
        };

        let upcoming_due_limit = match env::var("APP_UPCOMING_DUE_LIMIT") {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => return Err(ConfigError::InvalidUpcomingLimit(raw)),
            },
            Err(_) => DEFAULT_UPCOMING_DUE_LIMIT,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig {
                near_due_days,
                upcoming_due_limit,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Windows used when summarizing computed statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Forward window, in days, that classifies a control as near-due.
    pub near_due_days: u32,
    /// Maximum entries in the dashboard's upcoming-due list.
    pub upcoming_due_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            near_due_days: DEFAULT_NEAR_DUE_DAYS,
            upcoming_due_limit: DEFAULT_UPCOMING_DUE_LIMIT,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNearDueDays(String),
    InvalidUpcomingLimit(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNearDueDays(raw) => write!(
                f,
                "APP_NEAR_DUE_DAYS must be a non-negative integer (found '{raw}')"
            ),
            ConfigError::InvalidUpcomingLimit(raw) => write!(
                f,
                "APP_UPCOMING_DUE_LIMIT must be a positive integer (found '{raw}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNearDueDays(_)
            | ConfigError::InvalidUpcomingLimit(_) => None,
        }
    }
}
