//! Application state shared across all request handlers.

use crate::config::runtime::{ConfigStore, SharedConfig};
use sqlx::PgPool;
use std::time::Duration;
use storepay_core::events::OrderConfirmationSender;
use storepay_core::framework::DatabaseProcessor;
use storepay_core::gateways::GatewayRegistry;
use storepay_core::processors::{OrderMaterializer, Reconciler};

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Runtime configuration (can be reloaded via SIGHUP).
    pub config: SharedConfig,
    /// Gateway adapters, rebuilt when the provider sections are reloaded.
    pub gateways: ConfigStore<GatewayRegistry>,
    /// Order repair period; the sweeper picks up reloaded values.
    pub repair_interval: ConfigStore<Duration>,
    /// Queue for confirmation emails. `None` when `[mail]` is not configured.
    pub confirmations: Option<OrderConfirmationSender>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: SharedConfig,
        gateways: GatewayRegistry,
        repair_interval: Duration,
    ) -> Self {
        Self {
            db,
            config,
            gateways: ConfigStore::new(gateways),
            repair_interval: ConfigStore::new(repair_interval),
            confirmations: None,
        }
    }

    pub fn with_confirmations(mut self, confirmations: OrderConfirmationSender) -> Self {
        self.confirmations = Some(confirmations);
        self
    }

    pub fn processor(&self) -> DatabaseProcessor {
        DatabaseProcessor {
            pool: self.db.clone(),
        }
    }

    pub fn reconciler(&self) -> Reconciler<DatabaseProcessor> {
        Reconciler::new(self.processor()).with_confirmations(self.confirmations.clone())
    }

    pub fn materializer(&self) -> OrderMaterializer<DatabaseProcessor> {
        OrderMaterializer::new(self.processor()).with_confirmations(self.confirmations.clone())
    }
}
