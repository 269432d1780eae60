//! Configuration types for storepay.
//!
//! These types represent the validated runtime configuration used by the server
//! and can be shared across crates. The actual config loading/parsing is handled
//! by the server crate.

mod auth;
mod config_store;
mod mail;
mod payments;
mod providers;
mod server;

pub use auth::AuthConfig;
pub use config_store::{ConfigStore, ConfigWatcher};
pub use mail::{MailConfig, SmtpSecurity};
pub use payments::PaymentsConfig;
pub use providers::{MonnifyConfig, PaystackConfig};
pub use server::ServerConfig;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared configuration state with separate locks for each section.
///
/// This allows independent access to different configuration sections
/// without blocking other readers/writers.
#[derive(Clone)]
pub struct SharedConfig {
    /// Server configuration (listen address, frontend URL).
    pub server: Arc<RwLock<ServerConfig>>,
    /// Caller token validation.
    pub auth: Arc<RwLock<AuthConfig>>,
    /// Checkout and reconciliation settings.
    pub payments: Arc<RwLock<PaymentsConfig>>,
    pub paystack: Arc<RwLock<Option<PaystackConfig>>>,
    pub monnify: Arc<RwLock<Option<MonnifyConfig>>>,
}
