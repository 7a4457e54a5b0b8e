//! Notification emitter backed by the ledger's notification table.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::domain::{
    AppError, LedgerStore, NewNotification, NotificationEmitter, Severity,
};

/// Emitter that persists notifications for later retrieval rather than
/// pushing them anywhere. The workflow treats delivery as best-effort.
pub struct StoredNotifier {
    ledger: Arc<dyn LedgerStore>,
}

impl StoredNotifier {
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl NotificationEmitter for StoredNotifier {
    #[instrument(skip(self, message))]
    async fn notify(
        &self,
        user_id: i64,
        title: &str,
        message: &str,
        severity: Severity,
    ) -> Result<(), AppError> {
        self.ledger
            .record_notification(&NewNotification {
                user_id,
                title: title.to_string(),
                message: message.to_string(),
                severity,
            })
            .await
    }
}
