//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::domain::{
    AdapterError, AppError, AssetEvent, AssetMetadata, BlockchainAdapter, Commission,
    DatabaseError, Escrow, EscrowParty, EscrowStatus, Evaluator, LedgerStore, MintedAsset,
    NewEscrow, NewNotification, NewUser, NewWatch, Notification, NotificationEmitter,
    OwnershipTransfer, PaymentAdapter, PaymentMethod, PaymentReceipt, Role, SaleCommit, Severity,
    Store, TokenizationOutcome, User, Watch, WatchStatus, round_cents,
};

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Default)]
struct LedgerState {
    users: HashMap<i64, User>,
    stores: HashMap<i64, Store>,
    evaluators: HashMap<i64, Evaluator>,
    watches: HashMap<i64, Watch>,
    transfers: Vec<OwnershipTransfer>,
    commissions: Vec<Commission>,
    escrows: HashMap<i64, Escrow>,
    notifications: Vec<Notification>,
    next_id: i64,
}

impl LedgerState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory ledger for testing. All mutations inside one lock, so the
/// sale commit is atomic the way the real transaction is.
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
    config: MockConfig,
    is_healthy: AtomicBool,
}

impl MockLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                next_id: 0,
                ..LedgerState::default()
            })),
            config,
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock error".to_string());
            return Err(AppError::Database(DatabaseError::Query(msg)));
        }
        Ok(())
    }

    /// Seed a user with the given id, role, and balance
    pub fn seed_user(&self, id: i64, role: Role, balance_brl: f64) -> User {
        let user = User {
            id,
            full_name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            role,
            account_ref: format!("GACCOUNT{:04}", id),
            balance_brl,
            created_at: Utc::now(),
        };
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(id);
        state.users.insert(id, user.clone());
        user
    }

    /// Seed a store owned by the given user
    pub fn seed_store(&self, id: i64, user_id: i64, commission_rate: f64) -> Store {
        let store = Store {
            id,
            user_id,
            name: format!("Store {}", id),
            credentialed: true,
            commission_rate,
            created_at: Utc::now(),
        };
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(id);
        state.stores.insert(id, store.clone());
        store
    }

    /// Seed an evaluator credential for the given user
    pub fn seed_evaluator(&self, id: i64, user_id: i64, store_id: Option<i64>) -> Evaluator {
        let evaluator = Evaluator {
            id,
            user_id,
            store_id,
            license_ref: Some(format!("LIC-{:04}", id)),
            created_at: Utc::now(),
        };
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(id);
        state.evaluators.insert(id, evaluator.clone());
        evaluator
    }

    /// Seed a watch directly into a given status
    #[allow(clippy::too_many_arguments)]
    pub fn seed_watch(
        &self,
        id: i64,
        owner_user_id: i64,
        store_id: Option<i64>,
        status: WatchStatus,
        listed_price_brl: Option<f64>,
        token_code: Option<&str>,
    ) -> Watch {
        let now = Utc::now();
        let watch = Watch {
            id,
            serial_number: format!("SN-{:04}", id),
            brand: "Rolex".to_string(),
            model: "Submariner".to_string(),
            year: Some(2021),
            condition: Some("excellent".to_string()),
            description: None,
            status,
            current_owner_user_id: owner_user_id,
            current_value_brl: listed_price_brl,
            listed_price_brl,
            token_code: token_code.map(str::to_string),
            token_issuer: token_code.map(|_| "GSIMISSUER".to_string()),
            store_id,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(id);
        state.watches.insert(id, watch.clone());
        watch
    }

    /// All recorded transfers (for assertions)
    pub fn all_transfers(&self) -> Vec<OwnershipTransfer> {
        self.state.lock().unwrap().transfers.clone()
    }

    /// All recorded commissions (for assertions)
    pub fn all_commissions(&self) -> Vec<Commission> {
        self.state.lock().unwrap().commissions.clone()
    }

    /// Current balance of a user (for assertions)
    pub fn balance_of(&self, user_id: i64) -> Option<f64> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(&user_id)
            .map(|u| u.balance_brl)
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MockLedger {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        self.check_should_fail()
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, AppError> {
        self.check_should_fail()?;
        let mut state = self.state.lock().unwrap();
        if state.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Database(DatabaseError::Duplicate(
                user.email.clone(),
            )));
        }
        let id = state.next_id();
        let created = User {
            id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            role: user.role,
            account_ref: user.account_ref.clone(),
            balance_brl: user.initial_balance_brl,
            created_at: Utc::now(),
        };
        state.users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        self.check_should_fail()?;
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }

    async fn get_store(&self, id: i64) -> Result<Option<Store>, AppError> {
        self.check_should_fail()?;
        Ok(self.state.lock().unwrap().stores.get(&id).cloned())
    }

    async fn get_store_by_user(&self, user_id: i64) -> Result<Option<Store>, AppError> {
        self.check_should_fail()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .stores
            .values()
            .find(|s| s.user_id == user_id)
            .cloned())
    }

    async fn get_evaluator_by_user(&self, user_id: i64) -> Result<Option<Evaluator>, AppError> {
        self.check_should_fail()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .evaluators
            .values()
            .find(|e| e.user_id == user_id)
            .cloned())
    }

    async fn create_watch(&self, watch: &NewWatch) -> Result<Watch, AppError> {
        self.check_should_fail()?;
        let mut state = self.state.lock().unwrap();
        if state
            .watches
            .values()
            .any(|w| w.serial_number == watch.serial_number)
        {
            return Err(AppError::Database(DatabaseError::Duplicate(
                watch.serial_number.clone(),
            )));
        }
        let id = state.next_id();
        let now = Utc::now();
        let created = Watch {
            id,
            serial_number: watch.serial_number.clone(),
            brand: watch.brand.clone(),
            model: watch.model.clone(),
            year: watch.year,
            condition: watch.condition.clone(),
            description: watch.description.clone(),
            status: watch.status,
            current_owner_user_id: watch.current_owner_user_id,
            current_value_brl: watch.current_value_brl,
            listed_price_brl: None,
            token_code: None,
            token_issuer: None,
            store_id: watch.store_id,
            created_at: now,
            updated_at: now,
        };
        state.watches.insert(id, created.clone());
        Ok(created)
    }

    async fn get_watch(&self, id: i64) -> Result<Option<Watch>, AppError> {
        self.check_should_fail()?;
        Ok(self.state.lock().unwrap().watches.get(&id).cloned())
    }

    async fn list_marketplace(&self) -> Result<Vec<Watch>, AppError> {
        self.check_should_fail()?;
        let mut watches: Vec<Watch> = self
            .state
            .lock()
            .unwrap()
            .watches
            .values()
            .filter(|w| w.status == WatchStatus::ForSale)
            .cloned()
            .collect();
        watches.sort_by_key(|w| w.id);
        Ok(watches)
    }

    async fn set_listed_for_sale(&self, watch_id: i64, price_brl: f64) -> Result<Watch, AppError> {
        self.check_should_fail()?;
        let mut state = self.state.lock().unwrap();
        let watch = state
            .watches
            .get_mut(&watch_id)
            .ok_or_else(|| AppError::NotFound(format!("Watch {} not found", watch_id)))?;
        if !matches!(watch.status, WatchStatus::Evaluated | WatchStatus::Tokenized) {
            return Err(AppError::Conflict(format!(
                "watch {} cannot be listed from status {}",
                watch_id, watch.status
            )));
        }
        watch.status = WatchStatus::ForSale;
        watch.listed_price_brl = Some(price_brl);
        watch.updated_at = Utc::now();
        Ok(watch.clone())
    }

    async fn record_tokenization(
        &self,
        watch_id: i64,
        outcome: &TokenizationOutcome,
    ) -> Result<Watch, AppError> {
        self.check_should_fail()?;
        let mut state = self.state.lock().unwrap();
        let watch = state
            .watches
            .get_mut(&watch_id)
            .ok_or_else(|| AppError::NotFound(format!("Watch {} not found", watch_id)))?;
        match outcome {
            TokenizationOutcome::Minted(minted) => {
                watch.status = WatchStatus::Tokenized;
                watch.token_code = Some(minted.asset_code.clone());
                watch.token_issuer = Some(minted.issuer.clone());
            }
            TokenizationOutcome::Failed { .. } => {
                watch.status = WatchStatus::TokenizationFailed;
            }
        }
        watch.updated_at = Utc::now();
        Ok(watch.clone())
    }

    async fn commit_sale(&self, commit: &SaleCommit) -> Result<OwnershipTransfer, AppError> {
        self.check_should_fail()?;
        let mut state = self.state.lock().unwrap();

        // Check-and-set under the lock: the double-sale guard.
        let watch = state
            .watches
            .get_mut(&commit.watch_id)
            .ok_or_else(|| AppError::NotFound(format!("Watch {} not found", commit.watch_id)))?;
        if watch.status != WatchStatus::ForSale {
            return Err(AppError::Conflict(format!(
                "watch {} is no longer listed for sale",
                commit.watch_id
            )));
        }
        watch.status = WatchStatus::Sold;
        watch.current_owner_user_id = commit.buyer_id;
        watch.listed_price_brl = None;
        watch.store_id = None;
        watch.updated_at = Utc::now();

        let transfer_id = state.next_id();
        let transfer = OwnershipTransfer {
            id: transfer_id,
            watch_id: commit.watch_id,
            from_user_id: commit.seller_id,
            to_user_id: commit.buyer_id,
            kind: crate::domain::TransferKind::Sale,
            price_brl: commit.price_brl,
            admin_fee_brl: commit.admin_fee_brl,
            token_tx_ref: commit.token_tx_ref.clone(),
            created_at: Utc::now(),
        };
        state.transfers.push(transfer.clone());

        let commission_id = state.next_id();
        state.commissions.push(Commission {
            id: commission_id,
            transfer_id,
            recipient_user_id: commit.fee_recipient_user_id,
            amount_brl: commit.admin_fee_brl,
            description: commit.fee_description.clone(),
            created_at: Utc::now(),
        });

        if let Some(seller) = state.users.get_mut(&commit.seller_id) {
            seller.balance_brl = round_cents(
                seller.balance_brl + commit.price_brl - commit.admin_fee_brl,
            );
        }
        if let Some(recipient) = state.users.get_mut(&commit.fee_recipient_user_id) {
            recipient.balance_brl = round_cents(recipient.balance_brl + commit.admin_fee_brl);
        }

        Ok(transfer)
    }

    async fn list_transfers(&self, watch_id: i64) -> Result<Vec<OwnershipTransfer>, AppError> {
        self.check_should_fail()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .transfers
            .iter()
            .filter(|t| t.watch_id == watch_id)
            .cloned()
            .collect())
    }

    async fn list_commissions(&self, transfer_id: i64) -> Result<Vec<Commission>, AppError> {
        self.check_should_fail()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .commissions
            .iter()
            .filter(|c| c.transfer_id == transfer_id)
            .cloned()
            .collect())
    }

    async fn create_escrow(&self, escrow: &NewEscrow) -> Result<Escrow, AppError> {
        self.check_should_fail()?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let created = Escrow {
            id,
            watch_id: escrow.watch_id,
            buyer_id: escrow.buyer_id,
            seller_id: escrow.seller_id,
            amount_brl: escrow.amount_brl,
            status: EscrowStatus::Pending,
            seller_confirmed: false,
            evaluator_confirmed: false,
            created_at: Utc::now(),
            released_at: None,
        };
        state.escrows.insert(id, created.clone());
        Ok(created)
    }

    async fn get_escrow(&self, id: i64) -> Result<Option<Escrow>, AppError> {
        self.check_should_fail()?;
        Ok(self.state.lock().unwrap().escrows.get(&id).cloned())
    }

    async fn confirm_escrow(&self, id: i64, party: EscrowParty) -> Result<Escrow, AppError> {
        self.check_should_fail()?;
        let mut state = self.state.lock().unwrap();
        let escrow = state
            .escrows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Escrow {} not found", id)))?;
        escrow.apply_confirmation(party, Utc::now())?;
        Ok(escrow.clone())
    }

    async fn mark_escrow_disputed(&self, id: i64) -> Result<Escrow, AppError> {
        self.check_should_fail()?;
        let mut state = self.state.lock().unwrap();
        let escrow = state
            .escrows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Escrow {} not found", id)))?;
        escrow.open_dispute()?;
        Ok(escrow.clone())
    }

    async fn list_escrows(&self) -> Result<Vec<Escrow>, AppError> {
        self.check_should_fail()?;
        let mut escrows: Vec<Escrow> =
            self.state.lock().unwrap().escrows.values().cloned().collect();
        escrows.sort_by_key(|e| e.id);
        Ok(escrows)
    }

    async fn record_notification(&self, notification: &NewNotification) -> Result<(), AppError> {
        self.check_should_fail()?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.notifications.push(Notification {
            id,
            user_id: notification.user_id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            severity: notification.severity,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_notifications(&self, user_id: i64) -> Result<Vec<Notification>, AppError> {
        self.check_should_fail()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Mock payment adapter that records charges and can be told to decline
pub struct MockPaymentAdapter {
    config: MockConfig,
    charges: Mutex<Vec<(f64, PaymentMethod, u32)>>,
}

impl MockPaymentAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            charges: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn declining(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Recorded charge attempts (for assertions)
    pub fn charges(&self) -> Vec<(f64, PaymentMethod, u32)> {
        self.charges.lock().unwrap().clone()
    }
}

impl Default for MockPaymentAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn charge(
        &self,
        amount_brl: f64,
        method: PaymentMethod,
        installments: u32,
    ) -> Result<PaymentReceipt, AppError> {
        self.charges
            .lock()
            .unwrap()
            .push((amount_brl, method, installments));
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Declined".to_string());
            return Err(AppError::Adapter(AdapterError::PaymentDeclined(msg)));
        }
        Ok(PaymentReceipt {
            reference: format!("pay_{}", Uuid::new_v4().simple()),
            amount_brl,
            method,
            installments,
            fees: crate::domain::FeeBreakdown {
                processing_fee_brl: 0.0,
                installment_interest_brl: 0.0,
                total_charged_brl: amount_brl,
            },
        })
    }
}

/// Mock blockchain adapter with configurable mint/transfer failure
pub struct MockBlockchainAdapter {
    mint_config: MockConfig,
    transfer_config: MockConfig,
    transfers: Mutex<Vec<(String, String, String)>>,
    is_healthy: AtomicBool,
}

impl MockBlockchainAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mint_config: MockConfig::success(),
            transfer_config: MockConfig::success(),
            transfers: Mutex::new(Vec::new()),
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn failing_mint(message: impl Into<String>) -> Self {
        Self {
            mint_config: MockConfig::failure(message),
            ..Self::new()
        }
    }

    #[must_use]
    pub fn failing_transfer(message: impl Into<String>) -> Self {
        Self {
            transfer_config: MockConfig::failure(message),
            ..Self::new()
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Recorded transfer calls (for assertions)
    pub fn transfers(&self) -> Vec<(String, String, String)> {
        self.transfers.lock().unwrap().clone()
    }
}

impl Default for MockBlockchainAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlockchainAdapter for MockBlockchainAdapter {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Adapter(AdapterError::Blockchain(
                "Unhealthy".to_string(),
            )));
        }
        Ok(())
    }

    async fn mint_asset(&self, metadata: &AssetMetadata) -> Result<MintedAsset, AppError> {
        if self.mint_config.should_fail {
            let msg = self
                .mint_config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mint failed".to_string());
            return Err(AppError::Adapter(AdapterError::Blockchain(msg)));
        }
        Ok(MintedAsset {
            asset_code: format!("WTCH{:04}", metadata.watch_id),
            issuer: "GMOCKISSUER".to_string(),
        })
    }

    async fn transfer_asset(
        &self,
        asset_code: &str,
        from_account: &str,
        to_account: &str,
    ) -> Result<String, AppError> {
        self.transfers.lock().unwrap().push((
            asset_code.to_string(),
            from_account.to_string(),
            to_account.to_string(),
        ));
        if self.transfer_config.should_fail {
            let msg = self
                .transfer_config
                .error_message
                .clone()
                .unwrap_or_else(|| "Transfer failed".to_string());
            return Err(AppError::Adapter(AdapterError::Blockchain(msg)));
        }
        Ok(format!("tx_{}", Uuid::new_v4().simple()))
    }

    async fn asset_history(&self, _asset_code: &str) -> Result<Vec<AssetEvent>, AppError> {
        Ok(Vec::new())
    }
}

/// Notifier that records emissions in memory
pub struct RecordingNotifier {
    config: MockConfig,
    sent: Mutex<Vec<(i64, String, Severity)>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: MockConfig::success(),
            sent: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            config: MockConfig::failure(message),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Recorded notifications as (user_id, title, severity)
    pub fn sent(&self) -> Vec<(i64, String, Severity)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationEmitter for RecordingNotifier {
    async fn notify(
        &self,
        user_id: i64,
        title: &str,
        _message: &str,
        severity: Severity,
    ) -> Result<(), AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Notifier down".to_string());
            return Err(AppError::Adapter(AdapterError::Notification(msg)));
        }
        self.sent
            .lock()
            .unwrap()
            .push((user_id, title.to_string(), severity));
        Ok(())
    }
}
