//! Application state management.

use std::sync::Arc;

use crate::domain::{BlockchainAdapter, LedgerStore, NotificationEmitter, PaymentAdapter};

use super::service::{MarketConfig, MarketService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MarketService>,
    pub ledger: Arc<dyn LedgerStore>,
    pub blockchain: Arc<dyn BlockchainAdapter>,
}

impl AppState {
    /// Create a new application state with default market configuration
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        payment: Arc<dyn PaymentAdapter>,
        blockchain: Arc<dyn BlockchainAdapter>,
        notifier: Arc<dyn NotificationEmitter>,
    ) -> Self {
        Self::with_config(ledger, payment, blockchain, notifier, MarketConfig::default())
    }

    /// Create a new application state with an explicit market configuration
    #[must_use]
    pub fn with_config(
        ledger: Arc<dyn LedgerStore>,
        payment: Arc<dyn PaymentAdapter>,
        blockchain: Arc<dyn BlockchainAdapter>,
        notifier: Arc<dyn NotificationEmitter>,
        config: MarketConfig,
    ) -> Self {
        let service = Arc::new(MarketService::with_config(
            Arc::clone(&ledger),
            payment,
            Arc::clone(&blockchain),
            notifier,
            config,
        ));
        Self {
            service,
            ledger,
            blockchain,
        }
    }
}
