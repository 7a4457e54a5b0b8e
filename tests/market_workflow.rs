//! Tests for watch registration, tokenization, and listing.

use std::sync::Arc;

use watchledger::app::MarketService;
use watchledger::domain::{
    AppError, DatabaseError, LedgerStore, ListForSaleRequest, PaymentMethod, PurchasePayload,
    RegisterWatchRequest, Role, WatchStatus,
};
use watchledger::test_utils::{
    MockBlockchainAdapter, MockLedger, MockPaymentAdapter, RecordingNotifier,
};

fn service_with(ledger: &Arc<MockLedger>, blockchain: MockBlockchainAdapter) -> MarketService {
    MarketService::new(
        Arc::clone(ledger) as _,
        Arc::new(MockPaymentAdapter::new()) as _,
        Arc::new(blockchain) as _,
        Arc::new(RecordingNotifier::new()) as _,
    )
}

fn register_request(serial: &str) -> RegisterWatchRequest {
    RegisterWatchRequest {
        serial_number: serial.to_string(),
        brand: "Omega".to_string(),
        model: "Speedmaster".to_string(),
        year: Some(1969),
        condition: Some("good".to_string()),
        description: None,
        current_value_brl: Some(45_000.0),
    }
}

#[tokio::test]
async fn test_evaluator_registration_starts_evaluated_in_store_inventory() {
    let ledger = Arc::new(MockLedger::new());
    ledger.seed_user(2, Role::Store, 0.0);
    ledger.seed_store(20, 2, 0.03);
    let evaluator_user = ledger.seed_user(3, Role::Evaluator, 0.0);
    ledger.seed_evaluator(30, 3, Some(20));
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    let watch = service
        .register_watch(&evaluator_user, &register_request("SN-A"))
        .await
        .unwrap();

    assert_eq!(watch.status, WatchStatus::Evaluated);
    assert_eq!(watch.store_id, Some(20));
    // Owned by the store's user, not the evaluator, so the store can sell it
    assert_eq!(watch.current_owner_user_id, 2);
}

#[tokio::test]
async fn test_unlinked_evaluator_keeps_ownership_of_registered_watch() {
    let ledger = Arc::new(MockLedger::new());
    let evaluator_user = ledger.seed_user(3, Role::Evaluator, 0.0);
    ledger.seed_evaluator(30, 3, None);
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    let watch = service
        .register_watch(&evaluator_user, &register_request("SN-E"))
        .await
        .unwrap();

    assert_eq!(watch.store_id, None);
    assert_eq!(watch.current_owner_user_id, 3);
}

#[tokio::test]
async fn test_evaluator_registered_watch_is_sellable_through_the_store() {
    let ledger = Arc::new(MockLedger::new());
    ledger.seed_user(1, Role::Admin, 0.0);
    let store_user = ledger.seed_user(2, Role::Store, 0.0);
    ledger.seed_store(20, 2, 0.03);
    let evaluator_user = ledger.seed_user(3, Role::Evaluator, 0.0);
    ledger.seed_evaluator(30, 3, Some(20));
    let buyer = ledger.seed_user(9, Role::User, 100_000.0);
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    let watch = service
        .register_watch(&evaluator_user, &register_request("SN-D"))
        .await
        .unwrap();
    service.tokenize_watch(watch.id, &evaluator_user).await.unwrap();
    service
        .list_for_sale(
            watch.id,
            &store_user,
            &ListForSaleRequest { price_brl: Some(45_000.0) },
        )
        .await
        .unwrap();

    let payload = PurchasePayload {
        payment_method: PaymentMethod::Pix,
        installments: None,
        tax_id: Some("123.456.789-09".to_string()),
        card_number: None,
        card_holder: None,
        card_expiry: None,
        card_cvv: None,
    };
    let receipt = service.purchase(watch.id, &buyer, &payload).await.unwrap();

    assert_eq!(receipt.transfer.from_user_id, 2);
    assert_eq!(receipt.transfer.to_user_id, 9);
    assert_eq!(receipt.watch.status, WatchStatus::Sold);
    assert_eq!(receipt.watch.current_owner_user_id, 9);
}

#[tokio::test]
async fn test_admin_registration_starts_registered() {
    let ledger = Arc::new(MockLedger::new());
    let admin = ledger.seed_user(1, Role::Admin, 0.0);
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    let watch = service
        .register_watch(&admin, &register_request("SN-B"))
        .await
        .unwrap();

    assert_eq!(watch.status, WatchStatus::Registered);
    assert_eq!(watch.store_id, None);
}

#[tokio::test]
async fn test_duplicate_serial_number_is_rejected() {
    let ledger = Arc::new(MockLedger::new());
    let admin = ledger.seed_user(1, Role::Admin, 0.0);
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    service
        .register_watch(&admin, &register_request("SN-DUP"))
        .await
        .unwrap();
    let result = service
        .register_watch(&admin, &register_request("SN-DUP"))
        .await;

    assert!(matches!(
        result,
        Err(AppError::Database(DatabaseError::Duplicate(_)))
    ));
}

#[tokio::test]
async fn test_registration_requires_non_empty_fields() {
    let ledger = Arc::new(MockLedger::new());
    let admin = ledger.seed_user(1, Role::Admin, 0.0);
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    let mut request = register_request("SN-C");
    request.brand = String::new();
    let result = service.register_watch(&admin, &request).await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_tokenize_sets_token_fields() {
    let ledger = Arc::new(MockLedger::new());
    let evaluator = ledger.seed_user(3, Role::Evaluator, 0.0);
    ledger.seed_evaluator(30, 3, None);
    ledger.seed_watch(5, 3, None, WatchStatus::Evaluated, None, None);
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    let watch = service.tokenize_watch(5, &evaluator).await.unwrap();
    assert_eq!(watch.status, WatchStatus::Tokenized);
    assert_eq!(watch.token_code.as_deref(), Some("WTCH0005"));
    assert!(watch.token_issuer.is_some());
}

#[tokio::test]
async fn test_double_tokenization_leaves_token_fields_unchanged() {
    let ledger = Arc::new(MockLedger::new());
    let evaluator = ledger.seed_user(3, Role::Evaluator, 0.0);
    ledger.seed_evaluator(30, 3, None);
    ledger.seed_watch(5, 3, None, WatchStatus::Tokenized, None, Some("WTCH0005"));
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    let result = service.tokenize_watch(5, &evaluator).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let watch = ledger.get_watch(5).await.unwrap().unwrap();
    assert_eq!(watch.token_code.as_deref(), Some("WTCH0005"));
    assert_eq!(watch.token_issuer.as_deref(), Some("GSIMISSUER"));
}

#[tokio::test]
async fn test_tokenize_without_credential_is_rejected() {
    let ledger = Arc::new(MockLedger::new());
    // Evaluator role, but no credential record
    let actor = ledger.seed_user(4, Role::Evaluator, 0.0);
    ledger.seed_watch(5, 4, None, WatchStatus::Evaluated, None, None);
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    let result = service.tokenize_watch(5, &actor).await;
    assert!(matches!(result, Err(AppError::Policy(_))));
}

#[tokio::test]
async fn test_mint_failure_marks_watch_tokenization_failed() {
    let ledger = Arc::new(MockLedger::new());
    let evaluator = ledger.seed_user(3, Role::Evaluator, 0.0);
    ledger.seed_evaluator(30, 3, None);
    ledger.seed_watch(5, 3, None, WatchStatus::Evaluated, None, None);
    let service = service_with(&ledger, MockBlockchainAdapter::failing_mint("issuer unavailable"));

    let result = service.tokenize_watch(5, &evaluator).await;
    assert!(result.is_err());

    let watch = ledger.get_watch(5).await.unwrap().unwrap();
    assert_eq!(watch.status, WatchStatus::TokenizationFailed);
    assert!(watch.token_code.is_none());
}

#[tokio::test]
async fn test_listing_requires_the_owning_store() {
    let ledger = Arc::new(MockLedger::new());
    ledger.seed_user(2, Role::Store, 0.0);
    ledger.seed_store(20, 2, 0.03);
    let other_store_user = ledger.seed_user(6, Role::Store, 0.0);
    ledger.seed_store(60, 6, 0.03);
    ledger.seed_watch(5, 2, Some(20), WatchStatus::Tokenized, None, Some("WTCH0005"));
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    let result = service
        .list_for_sale(5, &other_store_user, &ListForSaleRequest { price_brl: Some(1_000.0) })
        .await;
    assert!(matches!(result, Err(AppError::Policy(_))));
}

#[tokio::test]
async fn test_listing_sets_status_and_price() {
    let ledger = Arc::new(MockLedger::new());
    let store_user = ledger.seed_user(2, Role::Store, 0.0);
    ledger.seed_store(20, 2, 0.03);
    ledger.seed_watch(5, 2, Some(20), WatchStatus::Tokenized, None, Some("WTCH0005"));
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    let watch = service
        .list_for_sale(5, &store_user, &ListForSaleRequest { price_brl: Some(72_500.0) })
        .await
        .unwrap();
    assert_eq!(watch.status, WatchStatus::ForSale);
    assert_eq!(watch.listed_price_brl, Some(72_500.0));

    let marketplace = service.marketplace().await.unwrap();
    assert_eq!(marketplace.len(), 1);
    assert_eq!(marketplace[0].id, 5);
}

#[tokio::test]
async fn test_listing_from_wrong_status_is_conflict() {
    let ledger = Arc::new(MockLedger::new());
    let store_user = ledger.seed_user(2, Role::Store, 0.0);
    ledger.seed_store(20, 2, 0.03);
    ledger.seed_watch(5, 2, Some(20), WatchStatus::Sold, None, None);
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    let result = service
        .list_for_sale(5, &store_user, &ListForSaleRequest { price_brl: Some(1_000.0) })
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_watch_history_lists_transfers_for_existing_watch_only() {
    let ledger = Arc::new(MockLedger::new());
    ledger.seed_user(2, Role::Store, 0.0);
    ledger.seed_watch(5, 2, None, WatchStatus::Registered, None, None);
    let service = service_with(&ledger, MockBlockchainAdapter::new());

    assert!(service.watch_history(5).await.unwrap().is_empty());
    assert!(matches!(
        service.watch_history(999).await,
        Err(AppError::NotFound(_))
    ));
}
