//! services/sender_service.rs
//! Sender pool and daily quota bookkeeping. The increment is a single
//! conditional UPDATE; quota is consumed on send attempt and is not
//! rolled back when the send itself fails.

use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::sender_model::{CreateSenderRequest, Sender};
use crate::timefmt;

#[derive(Clone)]
pub struct SenderService {
    db_pool: Pool<Sqlite>,
}

#[derive(sqlx::FromRow)]
struct SenderRow {
    id: String,
    email: String,
    display_name: Option<String>,
    daily_limit: i64,
    sent_today: i64,
    last_reset_date: String,
    is_active: i64,
}

impl SenderRow {
    fn into_sender(self) -> Sender {
        Sender {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            daily_limit: self.daily_limit,
            sent_today: self.sent_today,
            last_reset_date: self.last_reset_date,
            is_active: self.is_active != 0,
        }
    }
}

const SENDER_COLUMNS: &str =
    "id, email, display_name, daily_limit, sent_today, last_reset_date, is_active";

impl SenderService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        SenderService { db_pool }
    }

    pub async fn create_sender(&self, req: CreateSenderRequest) -> Result<String, EngineError> {
        if req.daily_limit <= 0 {
            return Err(EngineError::Validation(
                "sender daily_limit must be greater than zero".to_string(),
            ));
        }
        if req.email.trim().is_empty() {
            return Err(EngineError::Validation(
                "sender email must not be empty".to_string(),
            ));
        }

        let sender_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO senders (
                id, email, display_name, daily_limit,
                sent_today, last_reset_date, is_active
            )
            VALUES (?1, ?2, ?3, ?4, 0, ?5, 1)
            "#,
        )
        .bind(&sender_id)
        .bind(req.email.trim())
        .bind(&req.display_name)
        .bind(req.daily_limit)
        .bind(timefmt::today())
        .execute(&self.db_pool)
        .await?;

        Ok(sender_id)
    }

    pub async fn list_senders(&self) -> Result<Vec<Sender>, EngineError> {
        let rows: Vec<SenderRow> = sqlx::query_as(&format!(
            "SELECT {SENDER_COLUMNS} FROM senders ORDER BY email ASC"
        ))
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows.into_iter().map(SenderRow::into_sender).collect())
    }

    /// Least-loaded active sender still under its daily quota.
    pub async fn pick_available_sender(&self) -> Result<Sender, EngineError> {
        let row: Option<SenderRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SENDER_COLUMNS}
            FROM senders
            WHERE is_active = 1 AND sent_today < daily_limit
            ORDER BY sent_today ASC, id ASC
            LIMIT 1
            "#
        ))
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(SenderRow::into_sender).ok_or(EngineError::Capacity)
    }

    /// Atomically reserves one send slot. Zero rows affected means a
    /// concurrent executor took the last slot (or the sender was
    /// deactivated in between) and the caller must treat the pool as
    /// exhausted for this attempt.
    pub async fn record_send(&self, sender_id: &str) -> Result<(), EngineError> {
        let updated = sqlx::query(
            r#"
            UPDATE senders
            SET sent_today = sent_today + 1
            WHERE id = ?1 AND is_active = 1 AND sent_today < daily_limit
            "#,
        )
        .bind(sender_id)
        .execute(&self.db_pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(EngineError::Capacity);
        }
        Ok(())
    }

    /// Daily reset, invoked once per day boundary by an external
    /// scheduler. Only rows whose last reset predates today are touched,
    /// so repeated invocations within a day are harmless.
    pub async fn reset_all_daily_counts(&self) -> Result<u64, EngineError> {
        let today = timefmt::today();
        let updated = sqlx::query(
            r#"
            UPDATE senders
            SET sent_today = 0, last_reset_date = ?1
            WHERE last_reset_date < ?1
            "#,
        )
        .bind(&today)
        .execute(&self.db_pool)
        .await?;

        let count = updated.rows_affected();
        if count > 0 {
            log::info!("(reset_all_daily_counts) reset {} senders", count);
        }
        Ok(count)
    }
}
