//! Configuration module for storepay-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{
    AuthConfig, MailConfig, MonnifyConfig, PaymentsConfig, PaystackConfig, ServerConfig,
    SharedConfig, SmtpSecurity,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use storepay_core::gateways::GatewayRegistry;
use storepay_sdk::objects::Gateway;
use thiserror::Error;
use tokio::sync::RwLock;

const DEFAULT_PAYSTACK_URL: &str = "https://api.paystack.co";
const DEFAULT_MONNIFY_URL: &str = "https://sandbox.monnify.com";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub payments: PaymentsConfig,
    pub paystack: Option<PaystackConfig>,
    pub monnify: Option<MonnifyConfig>,
    /// Read at startup only; changing it needs a restart.
    pub mail: Option<MailConfig>,
}

impl LoadedConfig {
    /// Build gateway adapters for the configured providers.
    pub fn gateway_registry(&self) -> GatewayRegistry {
        GatewayRegistry::from_config(
            &self.payments,
            self.paystack.as_ref(),
            self.monnify.as_ref(),
        )
    }

    /// Convert into a SharedConfig with Arc<RwLock<T>> wrappers.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig {
            server: Arc::new(RwLock::new(self.server)),
            auth: Arc::new(RwLock::new(self.auth)),
            payments: Arc::new(RwLock::new(self.payments)),
            paystack: Arc::new(RwLock::new(self.paystack)),
            monnify: Arc::new(RwLock::new(self.monnify)),
        }
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read, override, validate and convert the configuration file.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_from_str(&config_content)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn load_from_str(&self, content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        build_loaded_config(file_config)
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

    if config.auth.jwt_secret.trim().is_empty() {
        return invalid("auth.jwt_secret must not be empty".to_string());
    }
    if config.paystack.is_none() && config.monnify.is_none() {
        return invalid("at least one of [paystack] or [monnify] must be configured".to_string());
    }
    let default_configured = match config.payments.default_gateway {
        Gateway::Paystack => config.paystack.is_some(),
        Gateway::Monnify => config.monnify.is_some(),
    };
    if !default_configured {
        return invalid(format!(
            "payments.default_gateway is {} but its section is missing",
            config.payments.default_gateway
        ));
    }
    let currency = &config.payments.default_currency;
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return invalid(format!(
            "payments.default_currency must be an ISO 4217 code, got {currency:?}"
        ));
    }
    if config.payments.gateway_timeout_secs == 0 {
        return invalid("payments.gateway_timeout_secs must be positive".to_string());
    }
    if config.payments.repair_interval_secs == 0 {
        return invalid("payments.repair_interval_secs must be positive".to_string());
    }
    if let Some(paystack) = &config.paystack {
        if paystack.secret_key.trim().is_empty() {
            return invalid("paystack.secret_key must not be empty".to_string());
        }
    }
    if let Some(monnify) = &config.monnify {
        if monnify.api_key.trim().is_empty()
            || monnify.secret_key.trim().is_empty()
            || monnify.contract_code.trim().is_empty()
        {
            return invalid(
                "monnify.api_key, secret_key and contract_code are required".to_string(),
            );
        }
    }
    if let Some(mail) = &config.mail {
        if mail.smtp_host.trim().is_empty() || mail.from.trim().is_empty() {
            return invalid("mail.smtp_host and mail.from are required".to_string());
        }
        if mail.username.is_some() != mail.password.is_some() {
            return invalid("mail.username and mail.password must be set together".to_string());
        }
        if mail.timeout_secs == 0 || mail.max_attempts == 0 {
            return invalid("mail.timeout_secs and mail.max_attempts must be positive".to_string());
        }
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let paystack = file_config
        .paystack
        .map(|p| -> Result<_, ConfigError> {
            Ok(PaystackConfig {
                secret_key: p.secret_key,
                base_url: match p.base_url {
                    Some(url) => url,
                    None => url::Url::parse(DEFAULT_PAYSTACK_URL)?,
                },
            })
        })
        .transpose()?;
    let monnify = file_config
        .monnify
        .map(|m| -> Result<_, ConfigError> {
            Ok(MonnifyConfig {
                api_key: m.api_key,
                secret_key: m.secret_key,
                contract_code: m.contract_code,
                base_url: match m.base_url {
                    Some(url) => url,
                    None => url::Url::parse(DEFAULT_MONNIFY_URL)?,
                },
            })
        })
        .transpose()?;
    let mail = file_config.mail.map(|m| MailConfig {
        smtp_host: m.smtp_host,
        smtp_port: m.smtp_port,
        security: match m.security {
            file::SmtpSecurity::Tls => SmtpSecurity::Tls,
            file::SmtpSecurity::Starttls => SmtpSecurity::StartTls,
            file::SmtpSecurity::None => SmtpSecurity::None,
        },
        credentials: m.username.zip(m.password),
        from: m.from,
        timeout: Duration::from_secs(m.timeout_secs),
        max_attempts: m.max_attempts,
    });

    Ok(LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
            frontend_url: file_config.server.frontend_url,
        },
        auth: AuthConfig::new(file_config.auth.jwt_secret.into_bytes()),
        payments: PaymentsConfig {
            default_gateway: file_config.payments.default_gateway.into(),
            default_currency: file_config.payments.default_currency,
            gateway_timeout: Duration::from_secs(file_config.payments.gateway_timeout_secs),
            repair_interval: Duration::from_secs(file_config.payments.repair_interval_secs),
        },
        paystack,
        monnify,
        mail,
    })
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storepay_core::entities::GatewayName;

    const BASE: &str = r#"
[server]
frontend_url = "http://localhost:5173"

[auth]
jwt_secret = "secret"
"#;

    fn load(extra: &str) -> Result<LoadedConfig, ConfigError> {
        ConfigLoader::new("unused.toml", None).load_from_str(&format!("{BASE}{extra}"))
    }

    #[test]
    fn converts_to_runtime_config() {
        let loaded = load(
            r#"
[paystack]
secret_key = "sk_test_123"
"#,
        )
        .unwrap();
        assert_eq!(loaded.payments.default_gateway, GatewayName::Paystack);
        assert_eq!(loaded.payments.gateway_timeout, Duration::from_secs(15));
        assert_eq!(
            loaded.paystack.as_ref().unwrap().base_url.as_str(),
            "https://api.paystack.co/"
        );
        let registry = loaded.gateway_registry();
        assert!(registry.get(GatewayName::Paystack).is_some());
        assert!(registry.get(GatewayName::Monnify).is_none());
    }

    #[test]
    fn listen_override_applies() {
        let loader = ConfigLoader::new("unused.toml", Some("127.0.0.1:9999".parse().unwrap()));
        let loaded = loader
            .load_from_str(&format!("{BASE}\n[paystack]\nsecret_key = \"sk\"\n"))
            .unwrap();
        assert_eq!(loaded.server.listen.port(), 9999);
    }

    #[test]
    fn mail_section_converts() {
        let loaded = load(
            r#"
[paystack]
secret_key = "sk"

[mail]
smtp_host = "localhost"
smtp_port = 1025
security = "none"
from = "Storefront <orders@example.com>"
"#,
        )
        .unwrap();
        let mail = loaded.mail.unwrap();
        assert_eq!(mail.security, SmtpSecurity::None);
        assert_eq!(mail.smtp_port, Some(1025));
        assert!(mail.credentials.is_none());
        assert_eq!(mail.timeout, Duration::from_secs(10));

        assert!(matches!(
            load("[paystack]\nsecret_key = \"sk\"\n[mail]\nsmtp_host = \"h\"\nfrom = \"a@b.c\"\nusername = \"u\"\n"),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_invalid_configs() {
        assert!(matches!(load(""), Err(ConfigError::ValidationError(_))));
        assert!(matches!(
            load("[payments]\ndefault_gateway = \"monnify\"\n[paystack]\nsecret_key = \"sk\"\n"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            load("[payments]\ndefault_currency = \"naira\"\n[paystack]\nsecret_key = \"sk\"\n"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            load("[paystack]\nsecret_key = \"  \"\n"),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
