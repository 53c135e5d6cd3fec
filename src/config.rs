use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the DeskFlow client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeskFlowConfig {
    /// Backend connection settings
    pub gateway: GatewayConfig,
    /// Who is acting
    pub session: SessionConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Base URL of the DeskFlow REST API, e.g. https://deskflow.example.com/api
    pub base_url: String,
    /// Bearer token (can be set via env var)
    pub token: Option<String>,
    /// Per-request timeout
    pub request_timeout_seconds: u64,
    /// Read cache TTL for ticket, history and parallel-task lookups
    pub cache_ttl_seconds: u64,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Sustained requests per second
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Backend id of the signed-in user
    pub user_id: u64,
    /// Name used for system-preset template fields
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,
}

impl Default for DeskFlowConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                base_url: "http://localhost:3000/api".to_string(),
                token: None, // Will be read from env var or .deskflow-rc
                request_timeout_seconds: 30,
                cache_ttl_seconds: 30,
                rate_limit: RateLimitConfig {
                    requests_per_second: 5,
                    burst_capacity: 10,
                },
            },
            session: SessionConfig {
                user_id: 0,
                display_name: String::new(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl DeskFlowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (deskflow.toml, .deskflow-rc)
    /// 3. Environment variables (prefixed with DESKFLOW_, nested keys joined by `__`)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&DeskFlowConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("deskflow.toml").exists() {
            builder = builder.add_source(File::with_name("deskflow"));
        }

        if Path::new(".deskflow-rc").exists() {
            builder = builder.add_source(
                File::with_name(".deskflow-rc").format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("DESKFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut deskflow_config: DeskFlowConfig = config.try_deserialize()?;

        if deskflow_config.gateway.token.is_none() {
            if let Ok(token) = std::env::var("DESKFLOW_TOKEN") {
                deskflow_config.gateway.token = Some(token);
            }
        }

        deskflow_config.validate()?;
        Ok(deskflow_config)
    }

    /// Reject settings the client cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.gateway.base_url.trim().is_empty() {
            anyhow::bail!("gateway.base_url must not be empty");
        }
        if self.gateway.rate_limit.requests_per_second == 0 {
            anyhow::bail!("gateway.rate_limit.requests_per_second must be at least 1");
        }
        if self.gateway.rate_limit.burst_capacity == 0 {
            anyhow::bail!("gateway.rate_limit.burst_capacity must be at least 1");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DeskFlowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.rate_limit.requests_per_second, 5);
        assert!(config.gateway.token.is_none());
    }

    #[test]
    fn test_zero_rate_limit_is_rejected() {
        let mut config = DeskFlowConfig::default();
        config.gateway.rate_limit.requests_per_second = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_toml_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("deskflow-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("deskflow.toml");

        let mut config = DeskFlowConfig::default();
        config.session.user_id = 17;
        config.session.display_name = "Ana Pérez".to_string();
        config.save_to_file(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: DeskFlowConfig = toml::from_str(&contents).unwrap();
        assert_eq!(parsed.session.user_id, 17);
        assert_eq!(parsed.session.display_name, "Ana Pérez");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
