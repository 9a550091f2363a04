use async_trait::async_trait;
use core::time::Duration;
use std::env;
use std::sync::Arc;

use crate::modules::{
    cache::QueryCache,
    payment::gateway::{GatewayScript, GatewaySettings},
};
use crate::utils::api::{self, Executor, HttpExecutor};

pub const DEFAULT_SCRIPT_URL: &str = "https://checkout.razorpay.com/v1/checkout.js";
pub const DEFAULT_MERCHANT_NAME: &str = "Zfood";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq)]
pub enum AppEnvironment {
    Production,
    Development,
}

impl AppEnvironment {
    pub fn from(raw_environment: String) -> Self {
        match raw_environment.as_ref() {
            "production" => Self::Production,
            _ => Self::Development,
        }
    }

    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Self::Production => "info",
            Self::Development => "debug",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("Invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("Failed to build API client: {0}")]
    Client(#[from] api::Error),
}

/// Everything a checkout session needs from the outside world.
#[derive(Clone)]
pub struct Context {
    pub executor: Arc<dyn Executor>,
    pub gateway: GatewaySettings,
    pub script: Arc<GatewayScript>,
    pub cache: Arc<QueryCache>,
}

impl Context {
    pub fn new(executor: Arc<dyn Executor>, gateway: GatewaySettings) -> Self {
        Self {
            executor,
            gateway,
            script: Arc::new(GatewayScript::new()),
            cache: Arc::new(QueryCache::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
}

#[derive(Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    pub script_url: String,
    pub merchant_name: String,
}

#[derive(Clone)]
pub struct Config {
    pub app: AppConfig,
    pub api: ApiConfig,
    pub gateway: GatewayConfig,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = optional("APP_ENV").unwrap_or_else(|| "development".to_string());
        let base_url = required("API_BASE_URL")?;
        let token = optional("API_TOKEN");
        let timeout = match optional("API_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "API_TIMEOUT_SECS",
                value: raw.clone(),
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let key_id = required("RAZORPAY_KEY_ID")?;
        let script_url =
            optional("RAZORPAY_SCRIPT_URL").unwrap_or_else(|| DEFAULT_SCRIPT_URL.to_string());
        let merchant_name =
            optional("MERCHANT_NAME").unwrap_or_else(|| DEFAULT_MERCHANT_NAME.to_string());

        Ok(Self {
            app: AppConfig {
                environment: AppEnvironment::from(environment),
            },
            api: ApiConfig {
                base_url,
                token,
                timeout: Duration::from_secs(timeout),
            },
            gateway: GatewayConfig {
                key_id,
                script_url,
                merchant_name,
            },
        })
    }
}

#[async_trait]
pub trait ToContext {
    async fn to_context(self) -> Result<Context, ConfigError>;
}

#[async_trait]
impl ToContext for Config {
    async fn to_context(self) -> Result<Context, ConfigError> {
        let executor = HttpExecutor::new(&self.api.base_url, self.api.token, self.api.timeout)?;

        Ok(Context {
            executor: Arc::new(executor),
            gateway: GatewaySettings {
                key_id: self.gateway.key_id,
                script_url: self.gateway.script_url,
                merchant_name: self.gateway.merchant_name,
            },
            script: Arc::new(GatewayScript::new()),
            cache: Arc::new(QueryCache::new()),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_environments_are_development() {
        assert_eq!(
            AppEnvironment::from(String::from("production")),
            AppEnvironment::Production
        );
        assert_eq!(
            AppEnvironment::from(String::from("staging")),
            AppEnvironment::Development
        );
    }

    #[test]
    fn production_logs_less_by_default() {
        assert_eq!(AppEnvironment::Production.default_log_filter(), "info");
        assert_eq!(AppEnvironment::Development.default_log_filter(), "debug");
    }

    #[test]
    fn config_errors_name_the_variable() {
        assert_eq!(
            ConfigError::Missing("API_BASE_URL").to_string(),
            "API_BASE_URL not set"
        );
        assert_eq!(
            ConfigError::Invalid {
                name: "API_TIMEOUT_SECS",
                value: String::from("soon"),
            }
            .to_string(),
            "Invalid API_TIMEOUT_SECS: soon"
        );
    }
}
