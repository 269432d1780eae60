//! Runtime configuration re-exports.
//!
//! The validated config types live in `storepay-core::config` so processors
//! can use them; this module re-exports them for the server.

pub use storepay_core::config::{
    AuthConfig, ConfigStore, MailConfig, MonnifyConfig, PaymentsConfig, PaystackConfig,
    ServerConfig, SharedConfig, SmtpSecurity,
};
