//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod policy;
pub mod traits;
pub mod types;

pub use error::{AdapterError, AppError, DatabaseError};
pub use policy::Operation;
pub use traits::{BlockchainAdapter, LedgerStore, NotificationEmitter, PaymentAdapter};
pub use types::{
    AssetEvent, AssetMetadata, Commission, ErrorDetail, ErrorResponse, Escrow, EscrowParty,
    EscrowStatus, Evaluator, FeeBreakdown, HealthResponse, HealthStatus, ListForSaleRequest,
    MintedAsset, NewEscrow, NewNotification, NewUser, NewWatch, Notification, OwnershipTransfer,
    PaymentMethod, PaymentReceipt, PurchasePayload, RegisterWatchRequest, Role, SaleCommit,
    SaleReceipt, Severity, Store, TokenizationOutcome, TransferKind, User, Watch, WatchStatus,
    round_cents,
};
