//! Application service layer with the transfer workflow engine.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, AssetEvent, AssetMetadata, BlockchainAdapter, Escrow, EscrowParty, HealthResponse,
    HealthStatus, LedgerStore, ListForSaleRequest, NewEscrow, NewWatch, Notification,
    NotificationEmitter, OwnershipTransfer, PaymentAdapter, PurchasePayload, RegisterWatchRequest,
    Role, SaleCommit, SaleReceipt, Severity, TokenizationOutcome, User, Watch, WatchStatus,
    round_cents,
};

/// What to do when the on-chain transfer fails mid-purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenTransferFallback {
    /// Fail the purchase with a conflict; the watch stays listed and the
    /// ledger is untouched until the chain is reconciled manually.
    #[default]
    Strict,
    /// Complete the sale with a synthetic transaction reference and
    /// reconcile on-chain custody later.
    Synthetic,
}

/// Marketplace configuration knobs
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Platform cut applied when the selling store has no rate of its own
    pub platform_commission_rate: f64,
    /// User that receives platform commissions
    pub platform_account_user_id: i64,
    /// Price used when a listing carries neither a listed price nor an
    /// appraised value
    pub default_sale_price_brl: f64,
    pub token_transfer_fallback: TokenTransferFallback,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            platform_commission_rate: 0.03,
            platform_account_user_id: 1,
            default_sale_price_brl: 50_000.0,
            token_transfer_fallback: TokenTransferFallback::Strict,
        }
    }
}

/// Application service containing the marketplace business logic
pub struct MarketService {
    ledger: Arc<dyn LedgerStore>,
    payment: Arc<dyn PaymentAdapter>,
    blockchain: Arc<dyn BlockchainAdapter>,
    notifier: Arc<dyn NotificationEmitter>,
    config: MarketConfig,
}

impl MarketService {
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        payment: Arc<dyn PaymentAdapter>,
        blockchain: Arc<dyn BlockchainAdapter>,
        notifier: Arc<dyn NotificationEmitter>,
    ) -> Self {
        Self::with_config(ledger, payment, blockchain, notifier, MarketConfig::default())
    }

    #[must_use]
    pub fn with_config(
        ledger: Arc<dyn LedgerStore>,
        payment: Arc<dyn PaymentAdapter>,
        blockchain: Arc<dyn BlockchainAdapter>,
        notifier: Arc<dyn NotificationEmitter>,
        config: MarketConfig,
    ) -> Self {
        Self {
            ledger,
            payment,
            blockchain,
            notifier,
            config,
        }
    }

    /// Register a new watch. Evaluator-registered watches skip straight to
    /// `evaluated` and land in the evaluator's store inventory when one is
    /// linked; admin-registered watches start at `registered`.
    #[instrument(skip(self, request), fields(actor_id = actor.id, serial = %request.serial_number))]
    pub async fn register_watch(
        &self,
        actor: &User,
        request: &RegisterWatchRequest,
    ) -> Result<Watch, AppError> {
        request
            .validate()
            .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

        let (status, store_id, owner_user_id) = match actor.role {
            Role::Evaluator => {
                let evaluator = self
                    .ledger
                    .get_evaluator_by_user(actor.id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Policy(format!("user {} has no evaluator credential", actor.id))
                    })?;
                // Store-linked evaluators register watches into the store's
                // inventory, owned by the store's user so the store can sell.
                let owner_user_id = match evaluator.store_id {
                    Some(store_id) => {
                        self.ledger
                            .get_store(store_id)
                            .await?
                            .ok_or_else(|| {
                                AppError::NotFound(format!("Store {} not found", store_id))
                            })?
                            .user_id
                    }
                    None => actor.id,
                };
                (WatchStatus::Evaluated, evaluator.store_id, owner_user_id)
            }
            _ => (WatchStatus::Registered, None, actor.id),
        };

        let new_watch = NewWatch {
            serial_number: request.serial_number.clone(),
            brand: request.brand.clone(),
            model: request.model.clone(),
            year: request.year,
            condition: request.condition.clone(),
            description: request.description.clone(),
            status,
            current_owner_user_id: owner_user_id,
            current_value_brl: request.current_value_brl,
            store_id,
        };

        let watch = self.ledger.create_watch(&new_watch).await?;
        info!(watch_id = watch.id, status = %watch.status, "Watch registered");

        self.emit(
            actor.id,
            "Watch registered",
            &format!(
                "{} {} ({}) registered with id {}",
                watch.brand, watch.model, watch.serial_number, watch.id
            ),
            Severity::Success,
        )
        .await;

        Ok(watch)
    }

    /// Mint a token for a watch. Only credentialed evaluators may tokenize;
    /// a mint failure is recorded as `tokenization_failed` and surfaced.
    #[instrument(skip(self), fields(watch_id, actor_id = actor.id))]
    pub async fn tokenize_watch(&self, watch_id: i64, actor: &User) -> Result<Watch, AppError> {
        self.ledger
            .get_evaluator_by_user(actor.id)
            .await?
            .ok_or_else(|| {
                AppError::Policy(format!("user {} has no evaluator credential", actor.id))
            })?;

        let watch = self.get_watch(watch_id).await?;

        if watch.token_code.is_some() {
            return Err(AppError::Conflict(format!(
                "watch {} is already tokenized as {}",
                watch_id,
                watch.token_code.as_deref().unwrap_or_default()
            )));
        }
        if !matches!(
            watch.status,
            WatchStatus::Registered | WatchStatus::Evaluated
        ) {
            return Err(AppError::Conflict(format!(
                "watch {} cannot be tokenized from status {}",
                watch_id, watch.status
            )));
        }

        let owner = self.get_user(watch.current_owner_user_id).await?;
        let metadata = AssetMetadata {
            watch_id: watch.id,
            brand: watch.brand.clone(),
            model: watch.model.clone(),
            serial_number: watch.serial_number.clone(),
            owner_account: owner.account_ref.clone(),
        };

        match self.blockchain.mint_asset(&metadata).await {
            Ok(minted) => {
                info!(watch_id, asset_code = %minted.asset_code, "Watch tokenized");
                let watch = self
                    .ledger
                    .record_tokenization(watch_id, &TokenizationOutcome::Minted(minted))
                    .await?;
                self.emit(
                    actor.id,
                    "Watch tokenized",
                    &format!(
                        "Token {} minted for watch {}",
                        watch.token_code.as_deref().unwrap_or_default(),
                        watch_id
                    ),
                    Severity::Success,
                )
                .await;
                Ok(watch)
            }
            Err(e) => {
                error!(watch_id, error = %e, "Tokenization failed");
                self.ledger
                    .record_tokenization(
                        watch_id,
                        &TokenizationOutcome::Failed {
                            reason: e.to_string(),
                        },
                    )
                    .await?;
                Err(e)
            }
        }
    }

    /// List a watch for sale. The actor's store must own the watch (admins
    /// may list on behalf of any store).
    #[instrument(skip(self, request), fields(watch_id, actor_id = actor.id))]
    pub async fn list_for_sale(
        &self,
        watch_id: i64,
        actor: &User,
        request: &ListForSaleRequest,
    ) -> Result<Watch, AppError> {
        request
            .validate()
            .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

        let watch = self.get_watch(watch_id).await?;

        if actor.role != Role::Admin {
            let store = self.ledger.get_store_by_user(actor.id).await?.ok_or_else(|| {
                AppError::Policy(format!("user {} has no store", actor.id))
            })?;
            if watch.store_id != Some(store.id) && watch.current_owner_user_id != actor.id {
                return Err(AppError::Policy(format!(
                    "store {} does not hold watch {}",
                    store.id, watch_id
                )));
            }
        }

        let price = request
            .price_brl
            .or(watch.current_value_brl)
            .unwrap_or(self.config.default_sale_price_brl);

        let watch = self.ledger.set_listed_for_sale(watch_id, price).await?;
        info!(watch_id, price_brl = price, "Watch listed for sale");
        Ok(watch)
    }

    /// Purchase a listed watch. Charges the buyer, moves token custody,
    /// then commits the sale atomically: watch ownership, the immutable
    /// transfer record, and the platform commission land in one unit of
    /// work or not at all.
    #[instrument(skip(self, payload), fields(watch_id, buyer_id = buyer.id))]
    pub async fn purchase(
        &self,
        watch_id: i64,
        buyer: &User,
        payload: &PurchasePayload,
    ) -> Result<SaleReceipt, AppError> {
        let installments = payload.validated_installments()?;

        let watch = self.get_watch(watch_id).await?;
        if watch.status != WatchStatus::ForSale {
            return Err(AppError::Conflict(format!(
                "watch {} is not listed for sale (status: {})",
                watch_id, watch.status
            )));
        }

        let seller = self.get_user(watch.current_owner_user_id).await?;
        let seller_store = self.ledger.get_store_by_user(seller.id).await?;
        if seller.role != Role::Store {
            return Err(AppError::Policy(format!(
                "watch {} is not held by a marketplace store",
                watch_id
            )));
        }
        if buyer.id == seller.id {
            return Err(AppError::Policy(
                "buyer already owns this watch".to_string(),
            ));
        }

        let price = watch
            .listed_price_brl
            .or(watch.current_value_brl)
            .unwrap_or(self.config.default_sale_price_brl);

        // Charge first. A decline leaves the listing untouched.
        let receipt = self
            .payment
            .charge(price, payload.payment_method, installments)
            .await
            .map_err(|e| {
                warn!(watch_id, error = %e, "Payment failed; listing unchanged");
                e
            })?;
        info!(watch_id, reference = %receipt.reference, amount_brl = price, "Payment captured");

        let token_tx_ref = self
            .settle_token_transfer(&watch, &seller, buyer)
            .await?;

        let commission_rate = seller_store
            .as_ref()
            .map(|s| s.commission_rate)
            .unwrap_or(self.config.platform_commission_rate);
        let admin_fee = round_cents(price * commission_rate);

        let commit = SaleCommit {
            watch_id,
            seller_id: seller.id,
            buyer_id: buyer.id,
            price_brl: price,
            admin_fee_brl: admin_fee,
            fee_recipient_user_id: self.config.platform_account_user_id,
            fee_description: format!(
                "Platform commission for sale of watch {} ({:.2}%)",
                watch_id,
                commission_rate * 100.0
            ),
            token_tx_ref,
        };
        let transfer = self.ledger.commit_sale(&commit).await?;
        let watch = self.get_watch(watch_id).await?;

        info!(
            watch_id,
            transfer_id = transfer.id,
            price_brl = transfer.price_brl,
            admin_fee_brl = transfer.admin_fee_brl,
            "Sale committed"
        );

        self.emit(
            seller.id,
            "Watch sold",
            &format!(
                "Watch {} sold for R$ {:.2} (commission R$ {:.2})",
                watch_id, price, admin_fee
            ),
            Severity::Success,
        )
        .await;
        self.emit(
            buyer.id,
            "Purchase complete",
            &format!("You are now the owner of watch {}", watch_id),
            Severity::Success,
        )
        .await;

        Ok(SaleReceipt {
            transfer,
            payment: receipt,
            watch,
        })
    }

    /// Move the token between accounts, applying the configured fallback
    /// when the chain rejects the transfer. Untokenized watches settle with
    /// a synthetic reference outright; there is nothing on chain to move.
    async fn settle_token_transfer(
        &self,
        watch: &Watch,
        seller: &User,
        buyer: &User,
    ) -> Result<String, AppError> {
        let Some(asset_code) = watch.token_code.as_deref() else {
            return Ok(format!("synthetic-transfer-{}-{}", watch.id, buyer.id));
        };

        match self
            .blockchain
            .transfer_asset(asset_code, &seller.account_ref, &buyer.account_ref)
            .await
        {
            Ok(tx_ref) => Ok(tx_ref),
            Err(e) => match self.config.token_transfer_fallback {
                TokenTransferFallback::Strict => {
                    error!(watch_id = watch.id, error = %e, "Token transfer failed; aborting sale");
                    Err(AppError::Conflict(format!(
                        "token transfer failed for watch {}; manual reconciliation required: {}",
                        watch.id, e
                    )))
                }
                TokenTransferFallback::Synthetic => {
                    warn!(watch_id = watch.id, error = %e, "Token transfer failed; using synthetic reference");
                    Ok(format!("synthetic-transfer-{}-{}", watch.id, buyer.id))
                }
            },
        }
    }

    /// Open an escrow for a listed watch
    #[instrument(skip(self), fields(watch_id, buyer_id = buyer.id))]
    pub async fn open_escrow(&self, watch_id: i64, buyer: &User) -> Result<Escrow, AppError> {
        let watch = self.get_watch(watch_id).await?;
        if watch.status != WatchStatus::ForSale {
            return Err(AppError::Conflict(format!(
                "watch {} is not listed for sale (status: {})",
                watch_id, watch.status
            )));
        }
        if buyer.id == watch.current_owner_user_id {
            return Err(AppError::Policy(
                "buyer already owns this watch".to_string(),
            ));
        }

        let amount = watch
            .listed_price_brl
            .or(watch.current_value_brl)
            .unwrap_or(self.config.default_sale_price_brl);

        let escrow = self
            .ledger
            .create_escrow(&NewEscrow {
                watch_id,
                buyer_id: buyer.id,
                seller_id: watch.current_owner_user_id,
                amount_brl: amount,
            })
            .await?;
        info!(escrow_id = escrow.id, watch_id, amount_brl = amount, "Escrow opened");
        Ok(escrow)
    }

    /// Confirm an escrow as one of its release parties. Sellers confirm
    /// their own escrows; any credentialed evaluator may confirm as the
    /// evaluator party. Release happens when both flags end up set.
    #[instrument(skip(self), fields(escrow_id, actor_id = actor.id, party = party.as_str()))]
    pub async fn confirm_escrow(
        &self,
        escrow_id: i64,
        party: EscrowParty,
        actor: &User,
    ) -> Result<Escrow, AppError> {
        let escrow = self
            .ledger
            .get_escrow(escrow_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Escrow {} not found", escrow_id)))?;

        match party {
            EscrowParty::Seller => {
                if actor.id != escrow.seller_id {
                    return Err(AppError::Policy(format!(
                        "user {} is not the seller of escrow {}",
                        actor.id, escrow_id
                    )));
                }
            }
            EscrowParty::Evaluator => {
                self.ledger
                    .get_evaluator_by_user(actor.id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Policy(format!(
                            "user {} has no evaluator credential",
                            actor.id
                        ))
                    })?;
            }
        }

        // Validate the transition against the in-memory state machine
        // before touching the ledger; the store re-checks atomically.
        let mut preview = escrow.clone();
        preview.apply_confirmation(party, Utc::now())?;

        let escrow = self.ledger.confirm_escrow(escrow_id, party).await?;
        if escrow.status == crate::domain::EscrowStatus::Released {
            info!(escrow_id, "Escrow released");
            self.emit(
                escrow.buyer_id,
                "Escrow released",
                &format!(
                    "Escrow {} released: R$ {:.2} for watch {}",
                    escrow_id, escrow.amount_brl, escrow.watch_id
                ),
                Severity::Success,
            )
            .await;
        }
        Ok(escrow)
    }

    /// Raise a dispute on a pending escrow. Buyer, seller, or an admin may
    /// dispute; disputed escrows await manual arbitration.
    #[instrument(skip(self), fields(escrow_id, actor_id = actor.id))]
    pub async fn dispute_escrow(&self, escrow_id: i64, actor: &User) -> Result<Escrow, AppError> {
        let escrow = self
            .ledger
            .get_escrow(escrow_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Escrow {} not found", escrow_id)))?;

        let involved = actor.id == escrow.buyer_id || actor.id == escrow.seller_id;
        if !involved && actor.role != Role::Admin {
            return Err(AppError::Policy(format!(
                "user {} is not a party to escrow {}",
                actor.id, escrow_id
            )));
        }

        let mut preview = escrow.clone();
        preview.open_dispute()?;

        let escrow = self.ledger.mark_escrow_disputed(escrow_id).await?;
        warn!(escrow_id, "Escrow disputed");
        Ok(escrow)
    }

    pub async fn get_user(&self, id: i64) -> Result<User, AppError> {
        self.ledger
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn get_watch(&self, id: i64) -> Result<Watch, AppError> {
        self.ledger
            .get_watch(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Watch {} not found", id)))
    }

    pub async fn marketplace(&self) -> Result<Vec<Watch>, AppError> {
        self.ledger.list_marketplace().await
    }

    /// Transfer history for a watch, oldest first
    pub async fn watch_history(&self, watch_id: i64) -> Result<Vec<OwnershipTransfer>, AppError> {
        self.get_watch(watch_id).await?;
        self.ledger.list_transfers(watch_id).await
    }

    /// On-chain event history for a tokenized watch
    pub async fn blockchain_history(&self, watch_id: i64) -> Result<Vec<AssetEvent>, AppError> {
        let watch = self.get_watch(watch_id).await?;
        let asset_code = watch.token_code.as_deref().ok_or_else(|| {
            AppError::Conflict(format!("watch {} is not tokenized", watch_id))
        })?;
        self.blockchain.asset_history(asset_code).await
    }

    pub async fn get_escrow(&self, id: i64) -> Result<Escrow, AppError> {
        self.ledger
            .get_escrow(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Escrow {} not found", id)))
    }

    pub async fn list_escrows(&self) -> Result<Vec<Escrow>, AppError> {
        self.ledger.list_escrows().await
    }

    pub async fn notifications(&self, user_id: i64) -> Result<Vec<Notification>, AppError> {
        self.ledger.list_notifications(user_id).await
    }

    /// Component-level health aggregation
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let ledger = match self.ledger.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                error!(error = %e, "Ledger health check failed");
                HealthStatus::Unhealthy
            }
        };
        let blockchain = match self.blockchain.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = %e, "Blockchain adapter health check failed");
                HealthStatus::Degraded
            }
        };
        HealthResponse::new(ledger, blockchain)
    }

    /// Best-effort notification; failures are logged and swallowed
    async fn emit(&self, user_id: i64, title: &str, message: &str, severity: Severity) {
        if let Err(e) = self.notifier.notify(user_id, title, message, severity).await {
            warn!(user_id, error = %e, "Failed to emit notification");
        }
    }
}
