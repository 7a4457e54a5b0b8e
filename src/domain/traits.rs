//! Domain traits defining contracts for external systems.

use async_trait::async_trait;

use super::error::AppError;
use super::types::{
    AssetEvent, AssetMetadata, Commission, Escrow, EscrowParty, Evaluator, MintedAsset,
    NewEscrow, NewNotification, NewUser, NewWatch, Notification, OwnershipTransfer, PaymentMethod,
    PaymentReceipt, SaleCommit, Severity, Store, TokenizationOutcome, User, Watch,
};

/// Persistent record of marketplace entities
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Check store connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Create a user with an explicitly initialized balance
    async fn create_user(&self, user: &NewUser) -> Result<User, AppError>;

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn get_store(&self, id: i64) -> Result<Option<Store>, AppError>;

    /// Store record owned by the given user, if any
    async fn get_store_by_user(&self, user_id: i64) -> Result<Option<Store>, AppError>;

    /// Evaluator credential record for the given user, if any
    async fn get_evaluator_by_user(&self, user_id: i64) -> Result<Option<Evaluator>, AppError>;

    /// Register a watch. Serial numbers are unique; a duplicate surfaces
    /// as `DatabaseError::Duplicate`.
    async fn create_watch(&self, watch: &NewWatch) -> Result<Watch, AppError>;

    async fn get_watch(&self, id: i64) -> Result<Option<Watch>, AppError>;

    /// Watches currently listed for sale
    async fn list_marketplace(&self) -> Result<Vec<Watch>, AppError>;

    /// List a watch for sale at the given price. Only evaluated or
    /// tokenized watches can be listed; anything else is a conflict.
    async fn set_listed_for_sale(&self, watch_id: i64, price_brl: f64) -> Result<Watch, AppError>;

    /// Record the outcome of a tokenization attempt: token fields +
    /// `tokenized` on success, `tokenization_failed` on failure.
    async fn record_tokenization(
        &self,
        watch_id: i64,
        outcome: &TokenizationOutcome,
    ) -> Result<Watch, AppError>;

    /// Atomically commit a sale: check-and-set the watch from `for_sale`
    /// to `sold` with the new owner, insert the transfer row, and insert
    /// the commission row in one unit of work. A watch that is no longer
    /// `for_sale` (including a lost concurrent race) is a conflict and
    /// leaves no partial state.
    async fn commit_sale(&self, commit: &SaleCommit) -> Result<OwnershipTransfer, AppError>;

    /// Transfer history for a watch, oldest first
    async fn list_transfers(&self, watch_id: i64) -> Result<Vec<OwnershipTransfer>, AppError>;

    /// Commissions recorded against a transfer
    async fn list_commissions(&self, transfer_id: i64) -> Result<Vec<Commission>, AppError>;

    async fn create_escrow(&self, escrow: &NewEscrow) -> Result<Escrow, AppError>;

    async fn get_escrow(&self, id: i64) -> Result<Option<Escrow>, AppError>;

    /// Apply a confirmation atomically; releases the escrow when both
    /// flags end up set
    async fn confirm_escrow(&self, id: i64, party: EscrowParty) -> Result<Escrow, AppError>;

    /// Transition a pending escrow to disputed
    async fn mark_escrow_disputed(&self, id: i64) -> Result<Escrow, AppError>;

    async fn list_escrows(&self) -> Result<Vec<Escrow>, AppError>;

    async fn record_notification(&self, notification: &NewNotification) -> Result<(), AppError>;

    async fn list_notifications(&self, user_id: i64) -> Result<Vec<Notification>, AppError>;
}

/// Payment processor contract
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Charge the given amount. A decline or provider error is an
    /// `AdapterError`; there is no partial success.
    async fn charge(
        &self,
        amount_brl: f64,
        method: PaymentMethod,
        installments: u32,
    ) -> Result<PaymentReceipt, AppError>;
}

/// Blockchain tokenization contract
#[async_trait]
pub trait BlockchainAdapter: Send + Sync {
    /// Check adapter connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Mint a token for a watch; returns its asset code and issuer
    async fn mint_asset(&self, metadata: &AssetMetadata) -> Result<MintedAsset, AppError>;

    /// Transfer a token between accounts; returns the transaction hash
    async fn transfer_asset(
        &self,
        asset_code: &str,
        from_account: &str,
        to_account: &str,
    ) -> Result<String, AppError>;

    /// On-chain history for an asset
    async fn asset_history(&self, asset_code: &str) -> Result<Vec<AssetEvent>, AppError> {
        let _ = asset_code;
        Err(AppError::NotSupported(
            "asset_history not implemented".to_string(),
        ))
    }
}

/// Notification sink. Fire-and-forget from the workflow's perspective;
/// the workflow logs and swallows emitter failures.
#[async_trait]
pub trait NotificationEmitter: Send + Sync {
    async fn notify(
        &self,
        user_id: i64,
        title: &str,
        message: &str,
        severity: Severity,
    ) -> Result<(), AppError>;
}
