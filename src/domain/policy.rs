//! Role policy table.
//!
//! One capability lookup evaluated per request at the API boundary,
//! replacing per-handler role-string checks. Entity-level rules
//! (ownership, credentials, self-purchase) stay in the service layer.

use super::error::AppError;
use super::types::Role;

/// Operations gated by the policy table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    RegisterWatch,
    TokenizeWatch,
    ListForSale,
    PurchaseWatch,
    ViewWatch,
    ViewMarketplace,
    ViewHistory,
    OpenEscrow,
    ConfirmEscrow,
    DisputeEscrow,
    ViewEscrow,
    ListEscrows,
    ViewNotifications,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegisterWatch => "register_watch",
            Self::TokenizeWatch => "tokenize_watch",
            Self::ListForSale => "list_for_sale",
            Self::PurchaseWatch => "purchase_watch",
            Self::ViewWatch => "view_watch",
            Self::ViewMarketplace => "view_marketplace",
            Self::ViewHistory => "view_history",
            Self::OpenEscrow => "open_escrow",
            Self::ConfirmEscrow => "confirm_escrow",
            Self::DisputeEscrow => "dispute_escrow",
            Self::ViewEscrow => "view_escrow",
            Self::ListEscrows => "list_escrows",
            Self::ViewNotifications => "view_notifications",
        }
    }
}

/// Whether `role` may perform `op`
#[must_use]
pub fn allows(role: Role, op: Operation) -> bool {
    use Operation::*;
    use Role::*;

    match op {
        RegisterWatch => matches!(role, Admin | Evaluator),
        TokenizeWatch => matches!(role, Evaluator),
        ListForSale => matches!(role, Store | Admin),
        PurchaseWatch => matches!(role, User),
        ViewWatch | ViewMarketplace | ViewHistory | ViewNotifications | ViewEscrow => true,
        OpenEscrow => matches!(role, User),
        // Sellers confirm their own escrows, and sellers on the
        // marketplace are store accounts.
        ConfirmEscrow => matches!(role, User | Store | Evaluator),
        DisputeEscrow => matches!(role, User | Store | Admin),
        ListEscrows => matches!(role, Admin),
    }
}

/// Policy gate; `Err(Policy)` when the role is not permitted
pub fn require(role: Role, op: Operation) -> Result<(), AppError> {
    if allows(role, op) {
        Ok(())
    } else {
        Err(AppError::Policy(format!(
            "role {} is not permitted to {}",
            role,
            op.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_is_user_only() {
        assert!(allows(Role::User, Operation::PurchaseWatch));
        assert!(!allows(Role::Store, Operation::PurchaseWatch));
        assert!(!allows(Role::Evaluator, Operation::PurchaseWatch));
        assert!(!allows(Role::Admin, Operation::PurchaseWatch));
    }

    #[test]
    fn test_tokenize_is_evaluator_only() {
        assert!(allows(Role::Evaluator, Operation::TokenizeWatch));
        assert!(!allows(Role::Admin, Operation::TokenizeWatch));
        assert!(!allows(Role::Store, Operation::TokenizeWatch));
    }

    #[test]
    fn test_listing_roles() {
        assert!(allows(Role::Store, Operation::ListForSale));
        assert!(allows(Role::Admin, Operation::ListForSale));
        assert!(!allows(Role::User, Operation::ListForSale));

        assert!(allows(Role::Admin, Operation::RegisterWatch));
        assert!(allows(Role::Evaluator, Operation::RegisterWatch));
        assert!(!allows(Role::Store, Operation::RegisterWatch));
    }

    #[test]
    fn test_escrow_roles() {
        assert!(allows(Role::User, Operation::ConfirmEscrow));
        assert!(allows(Role::Evaluator, Operation::ConfirmEscrow));
        assert!(allows(Role::Store, Operation::ConfirmEscrow));
        assert!(!allows(Role::Admin, Operation::ConfirmEscrow));

        assert!(allows(Role::Admin, Operation::ListEscrows));
        assert!(!allows(Role::User, Operation::ListEscrows));
    }

    #[test]
    fn test_require_returns_policy_error() {
        assert!(require(Role::User, Operation::ViewMarketplace).is_ok());
        assert!(matches!(
            require(Role::Store, Operation::PurchaseWatch),
            Err(AppError::Policy(_))
        ));
    }
}
