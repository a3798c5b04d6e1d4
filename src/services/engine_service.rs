//! services/engine_service.rs
//! Global and per-campaign run state. Transitions are compare-and-set
//! updates so concurrent operators cannot double-apply one, and a resume
//! re-derives the paused campaign's schedule before the status flips.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

use crate::errors::EngineError;
use crate::models::engine_model::{EngineState, EngineStatus};
use crate::timefmt;

#[derive(Clone)]
pub struct EngineService {
    db_pool: Pool<Sqlite>,
}

#[derive(sqlx::FromRow)]
struct StateRow {
    status: String,
    paused_at: Option<String>,
}

impl StateRow {
    fn into_state(self) -> Result<EngineState, EngineError> {
        let status = EngineStatus::parse(&self.status).ok_or_else(|| {
            EngineError::Configuration(format!("unknown engine status '{}'", self.status))
        })?;
        let paused_at = match self.paused_at {
            Some(ts) => Some(timefmt::from_db(&ts)?),
            None => None,
        };
        Ok(EngineState { status, paused_at })
    }
}

impl EngineService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        EngineService { db_pool }
    }

    pub async fn get_engine_state(&self) -> Result<EngineState, EngineError> {
        let row: Option<StateRow> =
            sqlx::query_as("SELECT status, paused_at FROM engine_state WHERE id = 1")
                .fetch_optional(&self.db_pool)
                .await?;

        row.ok_or_else(|| {
            EngineError::Configuration("engine state row is missing".to_string())
        })?
        .into_state()
    }

    pub async fn get_campaign_engine_state(
        &self,
        campaign_id: &str,
    ) -> Result<EngineState, EngineError> {
        let row: Option<StateRow> = sqlx::query_as(
            "SELECT status, paused_at FROM campaign_engine_states WHERE campaign_id = ?1",
        )
        .bind(campaign_id)
        .fetch_optional(&self.db_pool)
        .await?;

        match row {
            // No row means the campaign has never been paused or stopped.
            None => Ok(EngineState {
                status: EngineStatus::Running,
                paused_at: None,
            }),
            Some(r) => r.into_state(),
        }
    }

    /// `set_engine_state(status, [campaign_id])` from the external surface.
    /// Without a campaign id the transition applies to the global state;
    /// with one it applies to that campaign (and, when the global state is
    /// paused, a resume also restarts the global engine).
    pub async fn set_engine_state(
        &self,
        status: &str,
        campaign_id: Option<&str>,
    ) -> Result<(), EngineError> {
        let target = EngineStatus::parse(status).ok_or_else(|| {
            EngineError::Validation(format!("invalid engine status '{status}'"))
        })?;

        match campaign_id {
            Some(cid) => self.transition_campaign(cid, target).await,
            None => self.transition_global(target).await,
        }
    }

    async fn transition_global(&self, target: EngineStatus) -> Result<(), EngineError> {
        let current = self.get_engine_state().await?;
        if current.status == target {
            return Ok(());
        }

        let paused_at = match (current.status, target) {
            (EngineStatus::Stopped, EngineStatus::Running) => None,
            (EngineStatus::Paused, EngineStatus::Running) => {
                return Err(EngineError::Validation(
                    "campaign_id required to resume".to_string(),
                ));
            }
            (EngineStatus::Running, EngineStatus::Paused) => Some(timefmt::to_db(Utc::now())),
            (EngineStatus::Running | EngineStatus::Paused, EngineStatus::Stopped) => None,
            (from, to) => {
                return Err(EngineError::Validation(format!(
                    "cannot transition engine from {} to {}",
                    from.as_str(),
                    to.as_str()
                )));
            }
        };

        self.cas_global(current.status, target, paused_at).await
    }

    async fn transition_campaign(
        &self,
        campaign_id: &str,
        target: EngineStatus,
    ) -> Result<(), EngineError> {
        self.ensure_campaign_state_row(campaign_id).await?;
        let current = self.get_campaign_engine_state(campaign_id).await?;
        let mut adjusted = false;

        if current.status != target {
            let mut paused_at: Option<String> = None;
            match (current.status, target) {
                (EngineStatus::Running, EngineStatus::Paused) => {
                    paused_at = Some(timefmt::to_db(Utc::now()));
                }
                (EngineStatus::Paused, EngineStatus::Running) => {
                    // Re-derive the schedule before claims become possible again.
                    self.adjust_campaign_schedule(campaign_id).await?;
                    adjusted = true;
                }
                (EngineStatus::Stopped, EngineStatus::Running) => {}
                (EngineStatus::Running | EngineStatus::Paused, EngineStatus::Stopped) => {}
                (from, to) => {
                    return Err(EngineError::Validation(format!(
                        "cannot transition campaign {campaign_id} from {} to {}",
                        from.as_str(),
                        to.as_str()
                    )));
                }
            }

            let now = timefmt::to_db(Utc::now());
            let updated = sqlx::query(
                r#"
                UPDATE campaign_engine_states
                SET status = ?1, paused_at = ?2, updated_at = ?3
                WHERE campaign_id = ?4 AND status = ?5
                "#,
            )
            .bind(target.as_str())
            .bind(&paused_at)
            .bind(&now)
            .bind(campaign_id)
            .bind(current.status.as_str())
            .execute(&self.db_pool)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(EngineError::Validation(format!(
                    "campaign {campaign_id} engine state changed concurrently"
                )));
            }
        }

        // A targeted resume also restarts a paused global engine. Jobs
        // went overdue during a global-only pause just as during a
        // campaign pause, so the adjuster must run before claims can
        // resume here too.
        if target == EngineStatus::Running {
            let global = self.get_engine_state().await?;
            if global.status == EngineStatus::Paused {
                if !adjusted {
                    self.adjust_campaign_schedule(campaign_id).await?;
                }
                self.cas_global(EngineStatus::Paused, EngineStatus::Running, None)
                    .await?;
            }
        }

        log::info!(
            "(set_engine_state) campaign {} -> {}",
            campaign_id,
            target.as_str()
        );
        Ok(())
    }

    async fn cas_global(
        &self,
        from: EngineStatus,
        to: EngineStatus,
        paused_at: Option<String>,
    ) -> Result<(), EngineError> {
        let now = timefmt::to_db(Utc::now());
        let updated = sqlx::query(
            r#"
            UPDATE engine_state
            SET status = ?1, paused_at = ?2, updated_at = ?3
            WHERE id = 1 AND status = ?4
            "#,
        )
        .bind(to.as_str())
        .bind(&paused_at)
        .bind(&now)
        .bind(from.as_str())
        .execute(&self.db_pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(EngineError::Validation(
                "engine state changed concurrently".to_string(),
            ));
        }

        log::info!("(set_engine_state) engine -> {}", to.as_str());
        Ok(())
    }

    async fn ensure_campaign_state_row(&self, campaign_id: &str) -> Result<(), EngineError> {
        let (exists,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE id = ?1")
                .bind(campaign_id)
                .fetch_one(&self.db_pool)
                .await?;
        if exists == 0 {
            return Err(EngineError::Configuration(format!(
                "campaign {campaign_id} not found"
            )));
        }

        let now = timefmt::to_db(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO campaign_engine_states (campaign_id, status, paused_at, updated_at)
            VALUES (?1, 'running', NULL, ?2)
            ON CONFLICT (campaign_id) DO NOTHING
            "#,
        )
        .bind(campaign_id)
        .bind(&now)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    /// Resume Adjuster. Shifts the campaign's still-scheduled jobs forward
    /// by a single delta (now minus the earliest scheduled time) when that
    /// earliest time is already in the past. The uniform shift keeps every
    /// relative gap and the original ordering; jobs in a terminal state or
    /// mid-processing are untouched. Returns the number of shifted jobs.
    pub async fn adjust_campaign_schedule(&self, campaign_id: &str) -> Result<u64, EngineError> {
        let now = Utc::now();

        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT id, next_processing_time
            FROM jobs
            WHERE campaign_id = ?1 AND status = 'scheduled'
            ORDER BY next_processing_time ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.db_pool)
        .await?;

        let earliest = match rows.first() {
            Some((_, ts)) => timefmt::from_db(ts)?,
            None => return Ok(0),
        };
        if earliest >= now {
            return Ok(0);
        }
        let delta = now - earliest;

        let mut tx = self.db_pool.begin().await?;
        let updated_at = timefmt::to_db(now);
        let mut shifted = 0u64;

        for (job_id, ts) in &rows {
            let old: DateTime<Utc> = timefmt::from_db(ts)?;
            let adjusted = sqlx::query(
                r#"
                UPDATE jobs
                SET next_processing_time = ?1, updated_at = ?2
                WHERE id = ?3 AND status = 'scheduled'
                "#,
            )
            .bind(timefmt::to_db(old + delta))
            .bind(&updated_at)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
            shifted += adjusted.rows_affected();
        }

        tx.commit().await?;

        log::info!(
            "(adjust_campaign_schedule) campaign {} shifted {} jobs by {}s",
            campaign_id,
            shifted,
            delta.num_seconds()
        );
        Ok(shifted)
    }
}
