//! End-to-end tests for the purchase workflow.

use std::sync::Arc;

use watchledger::app::{MarketConfig, MarketService, TokenTransferFallback};
use watchledger::domain::{
    AdapterError, AppError, DatabaseError, LedgerStore, PaymentMethod, PurchasePayload, Role,
    Severity, WatchStatus,
};
use watchledger::test_utils::{
    MockBlockchainAdapter, MockLedger, MockPaymentAdapter, RecordingNotifier,
};

struct Fixture {
    ledger: Arc<MockLedger>,
    payment: Arc<MockPaymentAdapter>,
    blockchain: Arc<MockBlockchainAdapter>,
    notifier: Arc<RecordingNotifier>,
    service: MarketService,
}

/// Platform account 1, store owner 7 (store 70, 3% commission), buyer 9,
/// watch 42 listed at R$ 95000 with a minted token.
fn marketplace_fixture(
    payment: MockPaymentAdapter,
    blockchain: MockBlockchainAdapter,
    config: MarketConfig,
) -> Fixture {
    let ledger = Arc::new(MockLedger::new());
    ledger.seed_user(1, Role::Admin, 0.0);
    ledger.seed_user(7, Role::Store, 0.0);
    ledger.seed_store(70, 7, 0.03);
    ledger.seed_user(9, Role::User, 200_000.0);
    ledger.seed_watch(
        42,
        7,
        Some(70),
        WatchStatus::ForSale,
        Some(95_000.0),
        Some("WTCH0042"),
    );

    let payment = Arc::new(payment);
    let blockchain = Arc::new(blockchain);
    let notifier = Arc::new(RecordingNotifier::new());
    let service = MarketService::with_config(
        Arc::clone(&ledger) as _,
        Arc::clone(&payment) as _,
        Arc::clone(&blockchain) as _,
        Arc::clone(&notifier) as _,
        config,
    );

    Fixture {
        ledger,
        payment,
        blockchain,
        notifier,
        service,
    }
}

fn default_fixture() -> Fixture {
    marketplace_fixture(
        MockPaymentAdapter::new(),
        MockBlockchainAdapter::new(),
        MarketConfig::default(),
    )
}

fn pix_payload() -> PurchasePayload {
    PurchasePayload {
        payment_method: PaymentMethod::Pix,
        installments: None,
        tax_id: Some("123.456.789-09".to_string()),
        card_number: None,
        card_holder: None,
        card_expiry: None,
        card_cvv: None,
    }
}

#[tokio::test]
async fn test_pix_purchase_end_to_end() {
    let fx = default_fixture();
    let buyer = fx.ledger.get_user(9).await.unwrap().unwrap();

    let receipt = fx.service.purchase(42, &buyer, &pix_payload()).await.unwrap();

    assert_eq!(receipt.transfer.watch_id, 42);
    assert_eq!(receipt.transfer.from_user_id, 7);
    assert_eq!(receipt.transfer.to_user_id, 9);
    assert_eq!(receipt.transfer.price_brl, 95_000.0);
    assert_eq!(receipt.transfer.admin_fee_brl, 2_850.0);
    assert_eq!(receipt.watch.status, WatchStatus::Sold);
    assert_eq!(receipt.watch.current_owner_user_id, 9);

    // Exactly one transfer and one commission row
    let transfers = fx.ledger.all_transfers();
    assert_eq!(transfers.len(), 1);
    let commissions = fx.ledger.all_commissions();
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0].recipient_user_id, 1);
    assert_eq!(commissions[0].amount_brl, 2_850.0);

    // Simulated settlement: seller net, platform fee
    assert_eq!(fx.ledger.balance_of(7), Some(92_150.0));
    assert_eq!(fx.ledger.balance_of(1), Some(2_850.0));

    // Token moved from seller account to buyer account
    let chain_transfers = fx.blockchain.transfers();
    assert_eq!(chain_transfers.len(), 1);
    assert_eq!(chain_transfers[0].0, "WTCH0042");

    // Both parties notified
    let sent = fx.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().any(|(user, _, _)| *user == 7));
    assert!(sent.iter().any(|(user, _, sev)| *user == 9 && *sev == Severity::Success));
}

#[tokio::test]
async fn test_purchase_missing_watch_is_not_found() {
    let fx = default_fixture();
    let buyer = fx.ledger.get_user(9).await.unwrap().unwrap();

    let result = fx.service.purchase(999, &buyer, &pix_payload()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_purchase_unlisted_watch_is_conflict() {
    let fx = default_fixture();
    fx.ledger
        .seed_watch(43, 7, Some(70), WatchStatus::Tokenized, Some(10_000.0), Some("WTCH0043"));
    let buyer = fx.ledger.get_user(9).await.unwrap().unwrap();

    let result = fx.service.purchase(43, &buyer, &pix_payload()).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    // No charge attempted, nothing recorded
    assert!(fx.payment.charges().is_empty());
    assert!(fx.ledger.all_transfers().is_empty());
}

#[tokio::test]
async fn test_self_purchase_is_rejected() {
    let fx = default_fixture();
    let seller = fx.ledger.get_user(7).await.unwrap().unwrap();

    let result = fx.service.purchase(42, &seller, &pix_payload()).await;
    assert!(matches!(result, Err(AppError::Policy(_))));
    assert!(fx.payment.charges().is_empty());
}

#[tokio::test]
async fn test_purchase_from_non_store_owner_is_rejected() {
    let fx = default_fixture();
    // Watch listed but owned by a plain user
    fx.ledger.seed_user(11, Role::User, 0.0);
    fx.ledger
        .seed_watch(44, 11, None, WatchStatus::ForSale, Some(5_000.0), None);
    let buyer = fx.ledger.get_user(9).await.unwrap().unwrap();

    let result = fx.service.purchase(44, &buyer, &pix_payload()).await;
    assert!(matches!(result, Err(AppError::Policy(_))));
}

#[tokio::test]
async fn test_payment_validation_is_per_method() {
    let fx = default_fixture();
    let buyer = fx.ledger.get_user(9).await.unwrap().unwrap();

    // Pix without tax id
    let mut payload = pix_payload();
    payload.tax_id = None;
    let result = fx.service.purchase(42, &buyer, &payload).await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));

    // Credit card missing card fields
    let payload = PurchasePayload {
        payment_method: PaymentMethod::CreditCard,
        installments: Some(3),
        tax_id: Some("123.456.789-09".to_string()),
        card_number: Some("4111111111111111".to_string()),
        card_holder: None,
        card_expiry: Some("12/30".to_string()),
        card_cvv: Some("123".to_string()),
    };
    let result = fx.service.purchase(42, &buyer, &payload).await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));

    // Installments out of range
    let payload = PurchasePayload {
        installments: Some(24),
        card_holder: Some("J Doe".to_string()),
        ..payload
    };
    let result = fx.service.purchase(42, &buyer, &payload).await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));

    // Validation failures never reach the processor
    assert!(fx.payment.charges().is_empty());
    let watch = fx.ledger.get_watch(42).await.unwrap().unwrap();
    assert_eq!(watch.status, WatchStatus::ForSale);
}

#[tokio::test]
async fn test_payment_decline_leaves_listing_unchanged() {
    let fx = marketplace_fixture(
        MockPaymentAdapter::declining("insufficient funds"),
        MockBlockchainAdapter::new(),
        MarketConfig::default(),
    );
    let buyer = fx.ledger.get_user(9).await.unwrap().unwrap();

    let result = fx.service.purchase(42, &buyer, &pix_payload()).await;
    assert!(matches!(
        result,
        Err(AppError::Adapter(AdapterError::PaymentDeclined(_)))
    ));

    let watch = fx.ledger.get_watch(42).await.unwrap().unwrap();
    assert_eq!(watch.status, WatchStatus::ForSale);
    assert_eq!(watch.current_owner_user_id, 7);
    assert!(fx.ledger.all_transfers().is_empty());
    assert!(fx.blockchain.transfers().is_empty());
}

#[tokio::test]
async fn test_strict_fallback_aborts_on_chain_failure() {
    let fx = marketplace_fixture(
        MockPaymentAdapter::new(),
        MockBlockchainAdapter::failing_transfer("horizon timeout"),
        MarketConfig::default(),
    );
    let buyer = fx.ledger.get_user(9).await.unwrap().unwrap();

    let result = fx.service.purchase(42, &buyer, &pix_payload()).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let watch = fx.ledger.get_watch(42).await.unwrap().unwrap();
    assert_eq!(watch.status, WatchStatus::ForSale);
    assert!(fx.ledger.all_transfers().is_empty());
}

#[tokio::test]
async fn test_synthetic_fallback_completes_with_synthetic_reference() {
    let fx = marketplace_fixture(
        MockPaymentAdapter::new(),
        MockBlockchainAdapter::failing_transfer("horizon timeout"),
        MarketConfig {
            token_transfer_fallback: TokenTransferFallback::Synthetic,
            ..MarketConfig::default()
        },
    );
    let buyer = fx.ledger.get_user(9).await.unwrap().unwrap();

    let receipt = fx.service.purchase(42, &buyer, &pix_payload()).await.unwrap();
    assert_eq!(receipt.transfer.token_tx_ref, "synthetic-transfer-42-9");
    assert_eq!(receipt.watch.status, WatchStatus::Sold);
}

#[tokio::test]
async fn test_untokenized_watch_settles_synthetically() {
    let fx = default_fixture();
    fx.ledger.seed_user(12, Role::Store, 0.0);
    fx.ledger.seed_store(71, 12, 0.03);
    // Evaluated but never tokenized, then listed
    fx.ledger
        .seed_watch(50, 12, Some(71), WatchStatus::ForSale, Some(8_000.0), None);
    let buyer = fx.ledger.get_user(9).await.unwrap().unwrap();

    let receipt = fx.service.purchase(50, &buyer, &pix_payload()).await.unwrap();
    assert_eq!(receipt.transfer.token_tx_ref, "synthetic-transfer-50-9");
    assert!(fx.blockchain.transfers().is_empty());
}

#[tokio::test]
async fn test_commission_uses_store_rate_and_rounds_to_cents() {
    let fx = default_fixture();
    fx.ledger.seed_user(13, Role::Store, 0.0);
    fx.ledger.seed_store(72, 13, 0.05);
    fx.ledger.seed_watch(
        51,
        13,
        Some(72),
        WatchStatus::ForSale,
        Some(100_000.0),
        Some("WTCH0051"),
    );
    let buyer = fx.ledger.get_user(9).await.unwrap().unwrap();

    let receipt = fx.service.purchase(51, &buyer, &pix_payload()).await.unwrap();
    assert_eq!(receipt.transfer.admin_fee_brl, 5_000.0);

    // And the default platform rate applies at 3%
    let fx2 = default_fixture();
    let buyer2 = fx2.ledger.get_user(9).await.unwrap().unwrap();
    let receipt2 = fx2.service.purchase(42, &buyer2, &pix_payload()).await.unwrap();
    assert_eq!(receipt2.transfer.admin_fee_brl, 2_850.0);
}

#[tokio::test]
async fn test_concurrent_purchases_have_exactly_one_winner() {
    let fx = default_fixture();
    fx.ledger.seed_user(10, Role::User, 200_000.0);
    let buyer_a = fx.ledger.get_user(9).await.unwrap().unwrap();
    let buyer_b = fx.ledger.get_user(10).await.unwrap().unwrap();

    let payload = pix_payload();
    let (a, b) = tokio::join!(
        fx.service.purchase(42, &buyer_a, &payload),
        fx.service.purchase(42, &buyer_b, &payload),
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|&&ok| ok).count();
    assert_eq!(winners, 1, "exactly one purchase must win the race");

    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(AppError::Conflict(_))));

    // Sold watch has exactly one sale transfer row
    let transfers = fx.ledger.all_transfers();
    assert_eq!(transfers.len(), 1);
    let watch = fx.ledger.get_watch(42).await.unwrap().unwrap();
    assert_eq!(watch.status, WatchStatus::Sold);
    assert_eq!(watch.current_owner_user_id, transfers[0].to_user_id);
}

#[tokio::test]
async fn test_ledger_failure_surfaces_as_database_error() {
    let ledger = Arc::new(MockLedger::failing("connection reset"));
    let service = MarketService::new(
        Arc::clone(&ledger) as _,
        Arc::new(MockPaymentAdapter::new()) as _,
        Arc::new(MockBlockchainAdapter::new()) as _,
        Arc::new(RecordingNotifier::new()) as _,
    );

    let result = service.get_watch(42).await;
    assert!(matches!(
        result,
        Err(AppError::Database(DatabaseError::Query(_)))
    ));
}

#[tokio::test]
async fn test_notifier_failure_never_rolls_back_the_sale() {
    let ledger = Arc::new(MockLedger::new());
    ledger.seed_user(1, Role::Admin, 0.0);
    ledger.seed_user(7, Role::Store, 0.0);
    ledger.seed_store(70, 7, 0.03);
    ledger.seed_user(9, Role::User, 0.0);
    ledger.seed_watch(42, 7, Some(70), WatchStatus::ForSale, Some(95_000.0), Some("WTCH0042"));

    let service = MarketService::new(
        Arc::clone(&ledger) as _,
        Arc::new(MockPaymentAdapter::new()) as _,
        Arc::new(MockBlockchainAdapter::new()) as _,
        Arc::new(RecordingNotifier::failing("smtp down")) as _,
    );

    let buyer = ledger.get_user(9).await.unwrap().unwrap();
    let receipt = service.purchase(42, &buyer, &pix_payload()).await.unwrap();
    assert_eq!(receipt.watch.status, WatchStatus::Sold);
    assert_eq!(ledger.all_transfers().len(), 1);
}
