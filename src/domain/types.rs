//! Domain types with validation support.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::error::AppError;

/// Round a BRL amount to whole cents. All fee arithmetic goes through this
/// so commission figures compare exactly.
#[must_use]
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Role of a marketplace participant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Store,
    Evaluator,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Store => "store",
            Self::Evaluator => "evaluator",
            Self::User => "user",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "store" => Ok(Self::Store),
            "evaluator" => Ok(Self::Evaluator),
            "user" => Ok(Self::User),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a watch. Advances monotonically; `TokenizationFailed`
/// is the terminal failure state reachable only from a tokenization attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    /// Registered in the ledger, not yet evaluated
    #[default]
    Registered,
    /// Evaluated by a credentialed evaluator
    Evaluated,
    /// Token minted on the blockchain
    Tokenized,
    /// Listed on the marketplace
    ForSale,
    /// Sold; ownership transferred
    Sold,
    /// Tokenization attempt failed; requires manual intervention
    TokenizationFailed,
}

impl WatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Evaluated => "evaluated",
            Self::Tokenized => "tokenized",
            Self::ForSale => "for_sale",
            Self::Sold => "sold",
            Self::TokenizationFailed => "tokenization_failed",
        }
    }
}

impl std::str::FromStr for WatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(Self::Registered),
            "evaluated" => Ok(Self::Evaluated),
            "tokenized" => Ok(Self::Tokenized),
            "for_sale" => Ok(Self::ForSale),
            "sold" => Ok(Self::Sold),
            // "nft_error" and "nft_failed" are legacy spellings from imported
            // data; both collapse into the single failure status.
            "tokenization_failed" | "nft_error" | "nft_failed" => Ok(Self::TokenizationFailed),
            _ => Err(format!("Invalid watch status: {}", s)),
        }
    }
}

impl std::fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of an ownership transfer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Sale,
    Gift,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Gift => "gift",
        }
    }
}

impl std::str::FromStr for TransferKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(Self::Sale),
            "gift" => Ok(Self::Gift),
            _ => Err(format!("Invalid transfer kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Escrow lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    /// Waiting for dual confirmation
    #[default]
    Pending,
    /// Both parties confirmed; funds released. Terminal.
    Released,
    /// Dispute raised. Terminal in v1; resolution is manual arbitration.
    Disputed,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Released => "released",
            Self::Disputed => "disputed",
        }
    }
}

impl std::str::FromStr for EscrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "released" => Ok(Self::Released),
            "disputed" => Ok(Self::Disputed),
            _ => Err(format!("Invalid escrow status: {}", s)),
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supported payment methods
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    CreditCard,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pix => "pix",
            Self::CreditCard => "credit_card",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notification severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "success" => Ok(Self::Success),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Marketplace participant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    /// Blockchain account reference used for token custody
    pub account_ref: String,
    /// Simulated BRL balance, initialized explicitly at creation
    pub balance_brl: f64,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a user. Balances are assigned here, at creation,
/// never as a side effect of a later read.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewUser {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
    pub role: Role,
    /// Blockchain account reference assigned by the platform
    pub account_ref: String,
    #[serde(default)]
    pub initial_balance_brl: f64,
}

/// Credentialed marketplace store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Store {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub credentialed: bool,
    /// Platform cut applied to this store's sales
    pub commission_rate: f64,
    pub created_at: DateTime<Utc>,
}

/// Credentialed evaluator, optionally linked to a store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Evaluator {
    pub id: i64,
    pub user_id: i64,
    pub store_id: Option<i64>,
    pub license_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A registered watch and its tokenization/sale state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Watch {
    pub id: i64,
    /// Unique manufacturer serial number
    #[schema(example = "116610LN-9X4122")]
    pub serial_number: String,
    #[schema(example = "Rolex")]
    pub brand: String,
    #[schema(example = "Submariner")]
    pub model: String,
    pub year: Option<i32>,
    pub condition: Option<String>,
    pub description: Option<String>,
    pub status: WatchStatus,
    pub current_owner_user_id: i64,
    /// Appraised value in BRL
    pub current_value_brl: Option<f64>,
    /// Asking price while listed for sale
    pub listed_price_brl: Option<f64>,
    /// Token asset code once tokenized
    pub token_code: Option<String>,
    /// Token issuer account once tokenized
    pub token_issuer: Option<String>,
    /// Inventory store, when owned by a store
    pub store_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to register a new watch
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterWatchRequest {
    #[validate(length(min = 1, message = "Serial number is required"))]
    #[schema(example = "116610LN-9X4122")]
    pub serial_number: String,
    #[validate(length(min = 1, message = "Brand is required"))]
    pub brand: String,
    #[validate(length(min = 1, message = "Model is required"))]
    pub model: String,
    pub year: Option<i32>,
    pub condition: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.01, message = "Value must be greater than 0"))]
    pub current_value_brl: Option<f64>,
}

/// Insert payload for the ledger store
#[derive(Debug, Clone)]
pub struct NewWatch {
    pub serial_number: String,
    pub brand: String,
    pub model: String,
    pub year: Option<i32>,
    pub condition: Option<String>,
    pub description: Option<String>,
    pub status: WatchStatus,
    pub current_owner_user_id: i64,
    pub current_value_brl: Option<f64>,
    pub store_id: Option<i64>,
}

/// Immutable record of a completed ownership transfer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct OwnershipTransfer {
    pub id: i64,
    pub watch_id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub kind: TransferKind,
    pub price_brl: f64,
    pub admin_fee_brl: f64,
    /// Blockchain transaction reference (synthetic when the fallback
    /// policy substituted one)
    pub token_tx_ref: String,
    pub created_at: DateTime<Utc>,
}

/// Platform commission ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Commission {
    pub id: i64,
    pub transfer_id: i64,
    pub recipient_user_id: i64,
    pub amount_brl: f64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Confirming party for an escrow release
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EscrowParty {
    Seller,
    Evaluator,
}

impl EscrowParty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seller => "seller",
            Self::Evaluator => "evaluator",
        }
    }
}

/// Funds held pending dual confirmation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Escrow {
    pub id: i64,
    pub watch_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub amount_brl: f64,
    pub status: EscrowStatus,
    pub seller_confirmed: bool,
    pub evaluator_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl Escrow {
    /// Apply a confirmation. Releases the escrow when both flags end up
    /// set. Returns whether this confirmation caused the release.
    pub fn apply_confirmation(
        &mut self,
        party: EscrowParty,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self.status {
            EscrowStatus::Released => Err(AppError::Conflict(format!(
                "escrow {} is already released",
                self.id
            ))),
            EscrowStatus::Disputed => Err(AppError::Conflict(format!(
                "escrow {} is disputed; manual arbitration required",
                self.id
            ))),
            EscrowStatus::Pending => {
                match party {
                    EscrowParty::Seller => self.seller_confirmed = true,
                    EscrowParty::Evaluator => self.evaluator_confirmed = true,
                }
                if self.seller_confirmed && self.evaluator_confirmed {
                    self.status = EscrowStatus::Released;
                    self.released_at = Some(at);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Raise a dispute. Only a pending escrow can be disputed; there is no
    /// transition out of released.
    pub fn open_dispute(&mut self) -> Result<(), AppError> {
        match self.status {
            EscrowStatus::Pending => {
                self.status = EscrowStatus::Disputed;
                Ok(())
            }
            EscrowStatus::Released => Err(AppError::Conflict(format!(
                "escrow {} is already released",
                self.id
            ))),
            EscrowStatus::Disputed => Err(AppError::Conflict(format!(
                "escrow {} is already disputed",
                self.id
            ))),
        }
    }
}

/// Insert payload for a new escrow
#[derive(Debug, Clone)]
pub struct NewEscrow {
    pub watch_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub amount_brl: f64,
}

/// Stored user notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

/// Payment details for a purchase
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchasePayload {
    pub payment_method: PaymentMethod,
    /// 1..=12; defaults to 1
    pub installments: Option<u32>,
    /// Brazilian tax id (CPF); required for both methods
    pub tax_id: Option<String>,
    pub card_number: Option<String>,
    pub card_holder: Option<String>,
    pub card_expiry: Option<String>,
    pub card_cvv: Option<String>,
}

impl PurchasePayload {
    /// Validate the fields required by the chosen payment method and
    /// return the effective installment count.
    pub fn validated_installments(&self) -> Result<u32, AppError> {
        let installments = self.installments.unwrap_or(1);
        if !(1..=12).contains(&installments) {
            return Err(AppError::InvalidRequest(
                "installments must be between 1 and 12".to_string(),
            ));
        }

        let has_tax_id = self.tax_id.as_deref().is_some_and(|t| !t.trim().is_empty());
        match self.payment_method {
            PaymentMethod::Pix => {
                if !has_tax_id {
                    return Err(AppError::InvalidRequest(
                        "tax id is required for pix payments".to_string(),
                    ));
                }
            }
            PaymentMethod::CreditCard => {
                let card_complete = [
                    &self.card_number,
                    &self.card_holder,
                    &self.card_expiry,
                    &self.card_cvv,
                ]
                .iter()
                .all(|f| f.as_deref().is_some_and(|v| !v.trim().is_empty()));
                if !card_complete {
                    return Err(AppError::InvalidRequest(
                        "card number, holder, expiry and cvv are required for credit card payments"
                            .to_string(),
                    ));
                }
                if !has_tax_id {
                    return Err(AppError::InvalidRequest(
                        "tax id is required for credit card payments".to_string(),
                    ));
                }
            }
        }
        Ok(installments)
    }
}

/// Fee breakdown returned by the payment adapter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct FeeBreakdown {
    pub processing_fee_brl: f64,
    pub installment_interest_brl: f64,
    pub total_charged_brl: f64,
}

/// Successful payment outcome
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PaymentReceipt {
    /// Processor transaction reference
    pub reference: String,
    pub amount_brl: f64,
    pub method: PaymentMethod,
    pub installments: u32,
    pub fees: FeeBreakdown,
}

/// Metadata handed to the blockchain adapter when minting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AssetMetadata {
    pub watch_id: i64,
    pub brand: String,
    pub model: String,
    pub serial_number: String,
    /// Account that receives the minted token
    pub owner_account: String,
}

/// Minted token identity returned by the blockchain adapter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct MintedAsset {
    pub asset_code: String,
    pub issuer: String,
}

/// One entry of a token's on-chain history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AssetEvent {
    #[schema(example = "transfer")]
    pub kind: String,
    pub tx_ref: String,
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    pub at: DateTime<Utc>,
}

/// Outcome of a tokenization attempt, as recorded in the ledger
#[derive(Debug, Clone)]
pub enum TokenizationOutcome {
    Minted(MintedAsset),
    Failed { reason: String },
}

/// Parameters for the atomic sale commit
#[derive(Debug, Clone)]
pub struct SaleCommit {
    pub watch_id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub price_brl: f64,
    pub admin_fee_brl: f64,
    pub fee_recipient_user_id: i64,
    pub fee_description: String,
    pub token_tx_ref: String,
}

/// Purchase response: the committed transfer plus payment details
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaleReceipt {
    pub transfer: OwnershipTransfer,
    pub payment: PaymentReceipt,
    pub watch: Watch,
}

/// Request body for listing a watch for sale
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ListForSaleRequest {
    /// Asking price; falls back to the watch's appraised value
    #[validate(range(min = 0.01, message = "Price must be greater than 0"))]
    pub price_brl: Option<f64>,
}

/// Health status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Some systems degraded but functional
    Degraded,
    /// Critical systems unavailable
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall system status
    pub status: HealthStatus,
    /// Ledger store health status
    pub ledger: HealthStatus,
    /// Blockchain adapter health status
    pub blockchain: HealthStatus,
    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
    /// Application version
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    #[must_use]
    pub fn new(ledger: HealthStatus, blockchain: HealthStatus) -> Self {
        let status = match (&ledger, &blockchain) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        };
        Self {
            status,
            ledger,
            blockchain,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error response structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Error type identifier
    #[schema(example = "conflict_state")]
    pub r#type: String,
    /// Human-readable error message
    #[schema(example = "Conflicting state: watch 42 is not listed for sale")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_watch_status_display_and_parsing() {
        let statuses = vec![
            (WatchStatus::Registered, "registered"),
            (WatchStatus::Evaluated, "evaluated"),
            (WatchStatus::Tokenized, "tokenized"),
            (WatchStatus::ForSale, "for_sale"),
            (WatchStatus::Sold, "sold"),
            (WatchStatus::TokenizationFailed, "tokenization_failed"),
        ];

        for (status, string) in statuses {
            assert_eq!(status.as_str(), string);
            assert_eq!(status.to_string(), string);
            assert_eq!(WatchStatus::from_str(string).unwrap(), status);
        }

        assert!(WatchStatus::from_str("invalid").is_err());
    }

    #[test]
    fn test_legacy_failure_statuses_collapse() {
        assert_eq!(
            WatchStatus::from_str("nft_error").unwrap(),
            WatchStatus::TokenizationFailed
        );
        assert_eq!(
            WatchStatus::from_str("nft_failed").unwrap(),
            WatchStatus::TokenizationFailed
        );
    }

    #[test]
    fn test_role_display_and_parsing() {
        for (role, string) in [
            (Role::Admin, "admin"),
            (Role::Store, "store"),
            (Role::Evaluator, "evaluator"),
            (Role::User, "user"),
        ] {
            assert_eq!(role.to_string(), string);
            assert_eq!(Role::from_str(string).unwrap(), role);
        }
        assert!(Role::from_str("superuser").is_err());
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(95_000.0 * 0.03), 2_850.0);
        assert_eq!(round_cents(100_000.0 * 0.03), 3_000.0);
        assert_eq!(round_cents(0.005), 0.01);
        assert_eq!(round_cents(33.333), 33.33);
    }

    fn pending_escrow() -> Escrow {
        Escrow {
            id: 1,
            watch_id: 10,
            buyer_id: 2,
            seller_id: 3,
            amount_brl: 1_000.0,
            status: EscrowStatus::Pending,
            seller_confirmed: false,
            evaluator_confirmed: false,
            created_at: Utc::now(),
            released_at: None,
        }
    }

    #[test]
    fn test_escrow_releases_only_on_dual_confirmation() {
        let mut escrow = pending_escrow();
        let released = escrow
            .apply_confirmation(EscrowParty::Seller, Utc::now())
            .unwrap();
        assert!(!released);
        assert_eq!(escrow.status, EscrowStatus::Pending);

        let released = escrow
            .apply_confirmation(EscrowParty::Evaluator, Utc::now())
            .unwrap();
        assert!(released);
        assert_eq!(escrow.status, EscrowStatus::Released);
        assert!(escrow.released_at.is_some());
    }

    #[test]
    fn test_escrow_no_transition_out_of_released() {
        let mut escrow = pending_escrow();
        escrow
            .apply_confirmation(EscrowParty::Seller, Utc::now())
            .unwrap();
        escrow
            .apply_confirmation(EscrowParty::Evaluator, Utc::now())
            .unwrap();

        assert!(matches!(
            escrow.apply_confirmation(EscrowParty::Seller, Utc::now()),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(escrow.open_dispute(), Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_disputed_escrow_rejects_confirmation() {
        let mut escrow = pending_escrow();
        escrow.open_dispute().unwrap();
        assert_eq!(escrow.status, EscrowStatus::Disputed);

        assert!(matches!(
            escrow.apply_confirmation(EscrowParty::Seller, Utc::now()),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(escrow.open_dispute(), Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_purchase_payload_validation() {
        let pix = PurchasePayload {
            payment_method: PaymentMethod::Pix,
            installments: None,
            tax_id: Some("123.456.789-09".to_string()),
            card_number: None,
            card_holder: None,
            card_expiry: None,
            card_cvv: None,
        };
        assert_eq!(pix.validated_installments().unwrap(), 1);

        let pix_no_tax = PurchasePayload {
            tax_id: None,
            ..pix.clone()
        };
        assert!(matches!(
            pix_no_tax.validated_installments(),
            Err(AppError::InvalidRequest(_))
        ));

        let card = PurchasePayload {
            payment_method: PaymentMethod::CreditCard,
            installments: Some(6),
            tax_id: Some("123.456.789-09".to_string()),
            card_number: Some("4111111111111111".to_string()),
            card_holder: Some("J Doe".to_string()),
            card_expiry: Some("12/30".to_string()),
            card_cvv: Some("123".to_string()),
        };
        assert_eq!(card.validated_installments().unwrap(), 6);

        let card_incomplete = PurchasePayload {
            card_cvv: None,
            ..card.clone()
        };
        assert!(matches!(
            card_incomplete.validated_installments(),
            Err(AppError::InvalidRequest(_))
        ));

        let too_many = PurchasePayload {
            installments: Some(13),
            ..card
        };
        assert!(matches!(
            too_many.validated_installments(),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_health_response_aggregation() {
        let health = HealthResponse::new(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_eq!(health.status, HealthStatus::Healthy);

        let health = HealthResponse::new(HealthStatus::Healthy, HealthStatus::Unhealthy);
        assert_eq!(health.status, HealthStatus::Unhealthy);

        let health = HealthResponse::new(HealthStatus::Degraded, HealthStatus::Healthy);
        assert_eq!(health.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_watch_serialization_roundtrip() {
        let watch = Watch {
            id: 42,
            serial_number: "SN-42".to_string(),
            brand: "Omega".to_string(),
            model: "Speedmaster".to_string(),
            year: Some(1969),
            condition: Some("excellent".to_string()),
            description: None,
            status: WatchStatus::ForSale,
            current_owner_user_id: 7,
            current_value_brl: Some(95_000.0),
            listed_price_brl: Some(95_000.0),
            token_code: Some("WTCH0042".to_string()),
            token_issuer: Some("GSIMISSUER".to_string()),
            store_id: Some(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&watch).unwrap();
        let back: Watch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, watch);
        assert!(json.contains("\"for_sale\""));
    }
}
