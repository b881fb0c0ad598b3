use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::workflows::rental::service::{BillingConfig, OperationsConfig};
use crate::workflows::rental::verification::{VerificationConfig, VerificationWeights};

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
    pub operations: OperationsConfig,
}

fn env_or<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { var }),
        Err(_) => Ok(default),
    }
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

        let defaults = OperationsConfig::default();
        let operations = OperationsConfig {
            billing: BillingConfig {
                grace_period_days: env_or(
                    "RENTAL_GRACE_PERIOD_DAYS",
                    defaults.billing.grace_period_days,
                )?,
                horizon_periods: env_or(
                    "RENTAL_HORIZON_PERIODS",
                    defaults.billing.horizon_periods,
                )?,
                due_soon_window_days: env_or(
                    "RENTAL_DUE_SOON_WINDOW_DAYS",
                    defaults.billing.due_soon_window_days,
                )?,
            },
            verification: VerificationConfig {
                weights: VerificationWeights {
                    profile_fields: env_or(
                        "RENTAL_WEIGHT_PROFILE",
                        defaults.verification.weights.profile_fields,
                    )?,
                    required_documents: env_or(
                        "RENTAL_WEIGHT_DOCUMENTS",
                        defaults.verification.weights.required_documents,
                    )?,
                    location_checkin: env_or(
                        "RENTAL_WEIGHT_CHECKIN",
                        defaults.verification.weights.location_checkin,
                    )?,
                },
                required_documents: defaults.verification.required_documents,
                resubmission_threshold_percent: env_or(
                    "RENTAL_RESUBMISSION_THRESHOLD",
                    defaults.verification.resubmission_threshold_percent,
                )?,
            },
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            operations,
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
        let host = if self.host.eq_ignore_ascii_case("localhost") {
            "127.0.0.1"
        } else {
            self.host.as_str()
        };
        let ip = host
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Settings consumed by the telemetry layer.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost(String),
    InvalidValue { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost(host) => {
                write!(f, "APP_HOST '{}' is not a valid bind address", host)
            }
            ConfigError::InvalidValue { var } => {
                write!(f, "{} holds an unparseable value", var)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
