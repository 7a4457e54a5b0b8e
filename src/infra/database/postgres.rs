//! PostgreSQL ledger implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use crate::domain::{
    AppError, Commission, DatabaseError, Escrow, EscrowParty, EscrowStatus, Evaluator, LedgerStore,
    NewEscrow, NewNotification, NewUser, NewWatch, Notification, OwnershipTransfer, SaleCommit,
    Severity, Store, TokenizationOutcome, TransferKind, User, Watch, WatchStatus,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL ledger with connection pooling
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Create a new PostgreSQL ledger with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new PostgreSQL ledger with default configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_user(row: &sqlx::postgres::PgRow) -> User {
        let role: String = row.get("role");
        User {
            id: row.get("id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            role: role.parse().unwrap_or(crate::domain::Role::User),
            account_ref: row.get("account_ref"),
            balance_brl: row.get("balance_brl"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_watch(row: &sqlx::postgres::PgRow) -> Watch {
        let status: String = row.get("status");
        Watch {
            id: row.get("id"),
            serial_number: row.get("serial_number"),
            brand: row.get("brand"),
            model: row.get("model"),
            year: row.get("year"),
            condition: row.get("condition"),
            description: row.get("description"),
            status: status.parse().unwrap_or(WatchStatus::Registered),
            current_owner_user_id: row.get("current_owner_user_id"),
            current_value_brl: row.get("current_value_brl"),
            listed_price_brl: row.get("listed_price_brl"),
            token_code: row.get("token_code"),
            token_issuer: row.get("token_issuer"),
            store_id: row.get("store_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn row_to_transfer(row: &sqlx::postgres::PgRow) -> OwnershipTransfer {
        let kind: String = row.get("kind");
        OwnershipTransfer {
            id: row.get("id"),
            watch_id: row.get("watch_id"),
            from_user_id: row.get("from_user_id"),
            to_user_id: row.get("to_user_id"),
            kind: kind.parse().unwrap_or(TransferKind::Sale),
            price_brl: row.get("price_brl"),
            admin_fee_brl: row.get("admin_fee_brl"),
            token_tx_ref: row.get("token_tx_ref"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_escrow(row: &sqlx::postgres::PgRow) -> Escrow {
        let status: String = row.get("status");
        Escrow {
            id: row.get("id"),
            watch_id: row.get("watch_id"),
            buyer_id: row.get("buyer_id"),
            seller_id: row.get("seller_id"),
            amount_brl: row.get("amount_brl"),
            status: status.parse().unwrap_or(EscrowStatus::Pending),
            seller_confirmed: row.get("seller_confirmed"),
            evaluator_confirmed: row.get("evaluator_confirmed"),
            created_at: row.get("created_at"),
            released_at: row.get("released_at"),
        }
    }
}

const WATCH_COLUMNS: &str = "id, serial_number, brand, model, year, condition, description, \
     status, current_owner_user_id, current_value_brl, listed_price_brl, \
     token_code, token_issuer, store_id, created_at, updated_at";

#[async_trait]
impl LedgerStore for PostgresLedger {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self, user), fields(email = %user.email, role = %user.role))]
    async fn create_user(&self, user: &NewUser) -> Result<User, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (full_name, email, role, account_ref, balance_brl)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, full_name, email, role, account_ref, balance_brl, created_at
            "#,
        )
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.account_ref)
        .bind(user.initial_balance_brl)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        Ok(Self::row_to_user(&row))
    }

    #[instrument(skip(self))]
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, full_name, email, role, account_ref, balance_brl, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(row.map(|r| Self::row_to_user(&r)))
    }

    #[instrument(skip(self))]
    async fn get_store(&self, id: i64) -> Result<Option<Store>, AppError> {
        let row = sqlx::query(
            "SELECT id, user_id, name, credentialed, commission_rate, created_at \
             FROM stores WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(row.map(|r| Store {
            id: r.get("id"),
            user_id: r.get("user_id"),
            name: r.get("name"),
            credentialed: r.get("credentialed"),
            commission_rate: r.get("commission_rate"),
            created_at: r.get("created_at"),
        }))
    }

    #[instrument(skip(self))]
    async fn get_store_by_user(&self, user_id: i64) -> Result<Option<Store>, AppError> {
        let row = sqlx::query(
            "SELECT id, user_id, name, credentialed, commission_rate, created_at \
             FROM stores WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(row.map(|r| Store {
            id: r.get("id"),
            user_id: r.get("user_id"),
            name: r.get("name"),
            credentialed: r.get("credentialed"),
            commission_rate: r.get("commission_rate"),
            created_at: r.get("created_at"),
        }))
    }

    #[instrument(skip(self))]
    async fn get_evaluator_by_user(&self, user_id: i64) -> Result<Option<Evaluator>, AppError> {
        let row = sqlx::query(
            "SELECT id, user_id, store_id, license_ref, created_at \
             FROM evaluators WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(row.map(|r| Evaluator {
            id: r.get("id"),
            user_id: r.get("user_id"),
            store_id: r.get("store_id"),
            license_ref: r.get("license_ref"),
            created_at: r.get("created_at"),
        }))
    }

    #[instrument(skip(self, watch), fields(serial = %watch.serial_number))]
    async fn create_watch(&self, watch: &NewWatch) -> Result<Watch, AppError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO watches (
                serial_number, brand, model, year, condition, description,
                status, current_owner_user_id, current_value_brl, store_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {WATCH_COLUMNS}
            "#,
        ))
        .bind(&watch.serial_number)
        .bind(&watch.brand)
        .bind(&watch.model)
        .bind(watch.year)
        .bind(&watch.condition)
        .bind(&watch.description)
        .bind(watch.status.as_str())
        .bind(watch.current_owner_user_id)
        .bind(watch.current_value_brl)
        .bind(watch.store_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        Ok(Self::row_to_watch(&row))
    }

    #[instrument(skip(self))]
    async fn get_watch(&self, id: i64) -> Result<Option<Watch>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {WATCH_COLUMNS} FROM watches WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(row.map(|r| Self::row_to_watch(&r)))
    }

    #[instrument(skip(self))]
    async fn list_marketplace(&self) -> Result<Vec<Watch>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {WATCH_COLUMNS} FROM watches WHERE status = 'for_sale' ORDER BY updated_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(rows.iter().map(Self::row_to_watch).collect())
    }

    #[instrument(skip(self))]
    async fn set_listed_for_sale(&self, watch_id: i64, price_brl: f64) -> Result<Watch, AppError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE watches
            SET status = 'for_sale', listed_price_brl = $1, updated_at = $2
            WHERE id = $3 AND status IN ('evaluated', 'tokenized')
            RETURNING {WATCH_COLUMNS}
            "#,
        ))
        .bind(price_brl)
        .bind(Utc::now())
        .bind(watch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        match row {
            Some(row) => Ok(Self::row_to_watch(&row)),
            None => match self.get_watch(watch_id).await? {
                Some(watch) => Err(AppError::Conflict(format!(
                    "watch {} cannot be listed from status {}",
                    watch_id, watch.status
                ))),
                None => Err(AppError::NotFound(format!("Watch {} not found", watch_id))),
            },
        }
    }

    #[instrument(skip(self, outcome))]
    async fn record_tokenization(
        &self,
        watch_id: i64,
        outcome: &TokenizationOutcome,
    ) -> Result<Watch, AppError> {
        let row = match outcome {
            TokenizationOutcome::Minted(minted) => sqlx::query(&format!(
                r#"
                UPDATE watches
                SET status = 'tokenized', token_code = $1, token_issuer = $2, updated_at = $3
                WHERE id = $4
                RETURNING {WATCH_COLUMNS}
                "#,
            ))
            .bind(&minted.asset_code)
            .bind(&minted.issuer)
            .bind(Utc::now())
            .bind(watch_id)
            .fetch_optional(&self.pool)
            .await ,
            TokenizationOutcome::Failed { .. } => sqlx::query(&format!(
                r#"
                UPDATE watches
                SET status = 'tokenization_failed', updated_at = $1
                WHERE id = $2
                RETURNING {WATCH_COLUMNS}
                "#,
            ))
            .bind(Utc::now())
            .bind(watch_id)
            .fetch_optional(&self.pool)
            .await ,
        }
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        row.map(|r| Self::row_to_watch(&r))
            .ok_or_else(|| AppError::NotFound(format!("Watch {} not found", watch_id)))
    }

    /// Commit a sale in one transaction. The conditional owner/status
    /// update is the double-sale guard: whichever concurrent purchase
    /// commits first wins, the other sees zero rows and gets a conflict.
    #[instrument(skip(self, commit), fields(watch_id = commit.watch_id, buyer_id = commit.buyer_id))]
    async fn commit_sale(&self, commit: &SaleCommit) -> Result<OwnershipTransfer, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;

        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE watches
            SET status = 'sold', current_owner_user_id = $1, listed_price_brl = NULL,
                store_id = NULL, updated_at = $2
            WHERE id = $3 AND status = 'for_sale'
            "#,
        )
        .bind(commit.buyer_id)
        .bind(now)
        .bind(commit.watch_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "watch {} is no longer listed for sale",
                commit.watch_id
            )));
        }

        let transfer_row = sqlx::query(
            r#"
            INSERT INTO ownership_transfers (
                watch_id, from_user_id, to_user_id, kind,
                price_brl, admin_fee_brl, token_tx_ref, created_at
            )
            VALUES ($1, $2, $3, 'sale', $4, $5, $6, $7)
            RETURNING id, watch_id, from_user_id, to_user_id, kind,
                      price_brl, admin_fee_brl, token_tx_ref, created_at
            "#,
        )
        .bind(commit.watch_id)
        .bind(commit.seller_id)
        .bind(commit.buyer_id)
        .bind(commit.price_brl)
        .bind(commit.admin_fee_brl)
        .bind(&commit.token_tx_ref)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        let transfer = Self::row_to_transfer(&transfer_row);

        sqlx::query(
            r#"
            INSERT INTO commissions (transfer_id, recipient_user_id, amount_brl, description, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(transfer.id)
        .bind(commit.fee_recipient_user_id)
        .bind(commit.admin_fee_brl)
        .bind(&commit.fee_description)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        // Simulated settlement: seller receives the net amount, the
        // platform account receives the commission.
        sqlx::query("UPDATE users SET balance_brl = balance_brl + $1 WHERE id = $2")
            .bind(commit.price_brl - commit.admin_fee_brl)
            .bind(commit.seller_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;
        sqlx::query("UPDATE users SET balance_brl = balance_brl + $1 WHERE id = $2")
            .bind(commit.admin_fee_brl)
            .bind(commit.fee_recipient_user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(transfer)
    }

    #[instrument(skip(self))]
    async fn list_transfers(&self, watch_id: i64) -> Result<Vec<OwnershipTransfer>, AppError> {
        let rows = sqlx::query(
            "SELECT id, watch_id, from_user_id, to_user_id, kind, price_brl, \
             admin_fee_brl, token_tx_ref, created_at \
             FROM ownership_transfers WHERE watch_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(watch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(rows.iter().map(Self::row_to_transfer).collect())
    }

    #[instrument(skip(self))]
    async fn list_commissions(&self, transfer_id: i64) -> Result<Vec<Commission>, AppError> {
        let rows = sqlx::query(
            "SELECT id, transfer_id, recipient_user_id, amount_brl, description, created_at \
             FROM commissions WHERE transfer_id = $1 ORDER BY id ASC",
        )
        .bind(transfer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(rows
            .iter()
            .map(|r| Commission {
                id: r.get("id"),
                transfer_id: r.get("transfer_id"),
                recipient_user_id: r.get("recipient_user_id"),
                amount_brl: r.get("amount_brl"),
                description: r.get("description"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    #[instrument(skip(self, escrow), fields(watch_id = escrow.watch_id))]
    async fn create_escrow(&self, escrow: &NewEscrow) -> Result<Escrow, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO escrows (watch_id, buyer_id, seller_id, amount_brl, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING id, watch_id, buyer_id, seller_id, amount_brl, status,
                      seller_confirmed, evaluator_confirmed, created_at, released_at
            "#,
        )
        .bind(escrow.watch_id)
        .bind(escrow.buyer_id)
        .bind(escrow.seller_id)
        .bind(escrow.amount_brl)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        Ok(Self::row_to_escrow(&row))
    }

    #[instrument(skip(self))]
    async fn get_escrow(&self, id: i64) -> Result<Option<Escrow>, AppError> {
        let row = sqlx::query(
            "SELECT id, watch_id, buyer_id, seller_id, amount_brl, status, \
             seller_confirmed, evaluator_confirmed, created_at, released_at \
             FROM escrows WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(row.map(|r| Self::row_to_escrow(&r)))
    }

    /// Row-locked confirmation so two parties confirming at once both
    /// land and the release happens exactly once.
    #[instrument(skip(self), fields(escrow_id = id, party = party.as_str()))]
    async fn confirm_escrow(&self, id: i64, party: EscrowParty) -> Result<Escrow, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;

        let row = sqlx::query(
            "SELECT id, watch_id, buyer_id, seller_id, amount_brl, status, \
             seller_confirmed, evaluator_confirmed, created_at, released_at \
             FROM escrows WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?
        .ok_or_else(|| AppError::NotFound(format!("Escrow {} not found", id)))?;

        let mut escrow = Self::row_to_escrow(&row);
        escrow.apply_confirmation(party, Utc::now())?;

        sqlx::query(
            "UPDATE escrows SET status = $1, seller_confirmed = $2, \
             evaluator_confirmed = $3, released_at = $4 WHERE id = $5",
        )
        .bind(escrow.status.as_str())
        .bind(escrow.seller_confirmed)
        .bind(escrow.evaluator_confirmed)
        .bind(escrow.released_at)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(escrow)
    }

    #[instrument(skip(self))]
    async fn mark_escrow_disputed(&self, id: i64) -> Result<Escrow, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;

        let row = sqlx::query(
            "SELECT id, watch_id, buyer_id, seller_id, amount_brl, status, \
             seller_confirmed, evaluator_confirmed, created_at, released_at \
             FROM escrows WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?
        .ok_or_else(|| AppError::NotFound(format!("Escrow {} not found", id)))?;

        let mut escrow = Self::row_to_escrow(&row);
        escrow.open_dispute()?;

        sqlx::query("UPDATE escrows SET status = 'disputed' WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(escrow)
    }

    #[instrument(skip(self))]
    async fn list_escrows(&self) -> Result<Vec<Escrow>, AppError> {
        let rows = sqlx::query(
            "SELECT id, watch_id, buyer_id, seller_id, amount_brl, status, \
             seller_confirmed, evaluator_confirmed, created_at, released_at \
             FROM escrows ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(rows.iter().map(Self::row_to_escrow).collect())
    }

    #[instrument(skip(self, notification), fields(user_id = notification.user_id))]
    async fn record_notification(&self, notification: &NewNotification) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO notifications (user_id, title, message, severity) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.severity.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_notifications(&self, user_id: i64) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, message, severity, created_at \
             FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(rows
            .iter()
            .map(|r| {
                let severity: String = r.get("severity");
                Notification {
                    id: r.get("id"),
                    user_id: r.get("user_id"),
                    title: r.get("title"),
                    message: r.get("message"),
                    severity: severity.parse().unwrap_or(Severity::Info),
                    created_at: r.get("created_at"),
                }
            })
            .collect())
    }
}
