//! TOML file configuration structures.
//!
//! These structs directly map to the `storepay.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use storepay_sdk::objects::Gateway;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    /// Omit the section to disable Paystack.
    #[serde(default)]
    pub paystack: Option<PaystackConfig>,
    /// Omit the section to disable Monnify.
    #[serde(default)]
    pub monnify: Option<MonnifyConfig>,
    /// Omit the section to disable order confirmation emails.
    #[serde(default)]
    pub mail: Option<MailConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:5000").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// Storefront base URL used to build gateway callback URLs.
    pub frontend_url: url::Url,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the service that issues access tokens.
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    #[serde(default = "default_gateway")]
    pub default_gateway: Gateway,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
    #[serde(default = "default_repair_interval_secs")]
    pub repair_interval_secs: u64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            default_gateway: default_gateway(),
            default_currency: default_currency(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
            repair_interval_secs: default_repair_interval_secs(),
        }
    }
}

fn default_gateway() -> Gateway {
    Gateway::Paystack
}

fn default_currency() -> String {
    "NGN".to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    15
}

fn default_repair_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaystackConfig {
    pub secret_key: String,
    /// Defaults to `https://api.paystack.co`.
    #[serde(default)]
    pub base_url: Option<url::Url>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonnifyConfig {
    pub api_key: String,
    pub secret_key: String,
    pub contract_code: String,
    /// Defaults to the sandbox; set `https://api.monnify.com` in production.
    #[serde(default)]
    pub base_url: Option<url::Url>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    Tls,
    Starttls,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub smtp_host: String,
    /// Defaults to 465 for `tls`, 587 for `starttls` and 25 for `none`.
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default = "default_smtp_security")]
    pub security: SmtpSecurity,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Sender mailbox, e.g. `"Storefront <orders@example.com>"`.
    pub from: String,
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_mail_max_attempts")]
    pub max_attempts: u32,
}

fn default_smtp_security() -> SmtpSecurity {
    SmtpSecurity::Starttls
}

fn default_smtp_timeout_secs() -> u64 {
    10
}

fn default_mail_max_attempts() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"
frontend_url = "https://shop.example.com"

[auth]
jwt_secret = "a-very-long-shared-secret"

[payments]
default_gateway = "monnify"
gateway_timeout_secs = 20

[paystack]
secret_key = "sk_test_123"

[monnify]
api_key = "MK_TEST_1"
secret_key = "client-secret"
contract_code = "1234567890"
base_url = "https://api.monnify.com"

[mail]
smtp_host = "smtp.example.com"
username = "orders@example.com"
password = "app-password"
from = "Storefront <orders@example.com>"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.payments.default_gateway, Gateway::Monnify);
        assert_eq!(config.payments.default_currency, "NGN");
        assert_eq!(config.payments.gateway_timeout_secs, 20);
        assert_eq!(config.payments.repair_interval_secs, 300);
        assert!(config.paystack.as_ref().unwrap().base_url.is_none());
        assert_eq!(
            config.monnify.unwrap().base_url.unwrap().as_str(),
            "https://api.monnify.com/"
        );
        let mail = config.mail.unwrap();
        assert_eq!(mail.security, SmtpSecurity::Starttls);
        assert_eq!(mail.smtp_port, None);
        assert_eq!(mail.timeout_secs, 10);
        assert_eq!(mail.max_attempts, 5);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let toml_str = r#"
[server]
frontend_url = "http://localhost:5173"

[auth]
jwt_secret = "secret"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.payments.default_gateway, Gateway::Paystack);
        assert!(config.paystack.is_none());
        assert!(config.monnify.is_none());
        assert!(config.mail.is_none());
    }
}
