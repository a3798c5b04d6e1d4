//! services/job_service.rs
//! Job state machine: the atomic claim, terminal transitions, the job
//! log, and the stuck-job sweep.

use chrono::{Duration, Utc};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::engine_model::EngineStatus;
use crate::models::job_model::{Job, JobLogRecord, JobStatus};
use crate::services::engine_service::EngineService;
use crate::timefmt;

#[derive(Clone)]
pub struct JobService {
    db_pool: Pool<Sqlite>,
    engine_service: EngineService,
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    campaign_id: String,
    lead_id: String,
    step_number: i64,
    next_processing_time: String,
    retries: i64,
    status: String,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn into_job(self) -> Result<Job, EngineError> {
        let status = JobStatus::parse(&self.status).ok_or_else(|| {
            EngineError::Configuration(format!(
                "job {} has unknown status '{}'",
                self.id, self.status
            ))
        })?;
        Ok(Job {
            id: self.id,
            campaign_id: self.campaign_id,
            lead_id: self.lead_id,
            step_number: self.step_number,
            next_processing_time: timefmt::from_db(&self.next_processing_time)?,
            retries: self.retries,
            status,
            error_message: self.error_message,
            created_at: timefmt::from_db(&self.created_at)?,
            updated_at: timefmt::from_db(&self.updated_at)?,
        })
    }
}

const JOB_COLUMNS: &str = "id, campaign_id, lead_id, step_number, next_processing_time, \
                           retries, status, error_message, created_at, updated_at";

impl JobService {
    pub fn new(db_pool: Pool<Sqlite>, engine_service: EngineService) -> Self {
        JobService {
            db_pool,
            engine_service,
        }
    }

    /// Claims at most one due job. The claim is a single conditional
    /// UPDATE over a sub-select, so under racing callers exactly one wins
    /// the row and the rest observe `None`. Jobs of inactive campaigns
    /// and of paused or stopped campaign engine states are never
    /// candidates; a missing per-campaign state row counts as running.
    pub async fn claim_next_due_job(&self) -> Result<Option<Job>, EngineError> {
        let engine = self.engine_service.get_engine_state().await?;
        if engine.status != EngineStatus::Running {
            return Ok(None);
        }

        let now = timefmt::to_db(Utc::now());
        let claimed: Option<(String,)> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET status = 'processing', updated_at = ?1
            WHERE id = (
                SELECT j.id
                FROM jobs j
                JOIN campaigns c ON c.id = j.campaign_id
                LEFT JOIN campaign_engine_states s ON s.campaign_id = j.campaign_id
                WHERE j.status = 'scheduled'
                  AND j.next_processing_time <= ?1
                  AND c.status = 'active'
                  AND COALESCE(s.status, 'running') = 'running'
                ORDER BY j.next_processing_time ASC
                LIMIT 1
            )
            AND status = 'scheduled'
            RETURNING id
            "#,
        )
        .bind(&now)
        .fetch_optional(&self.db_pool)
        .await?;

        match claimed {
            Some((job_id,)) => {
                log::info!("(claim_next_due_job) claimed job {}", job_id);
                Ok(Some(self.get_job(&job_id).await?))
            }
            None => Ok(None),
        }
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Job, EngineError> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))
                .bind(job_id)
                .fetch_optional(&self.db_pool)
                .await?;

        row.ok_or_else(|| EngineError::Configuration(format!("job {job_id} not found")))?
            .into_job()
    }

    pub async fn insert_scheduled_job(
        &self,
        campaign_id: &str,
        lead_id: &str,
        step_number: i64,
        next_processing_time: chrono::DateTime<Utc>,
    ) -> Result<String, EngineError> {
        let job_id = Uuid::new_v4().to_string();
        let now = timefmt::to_db(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, campaign_id, lead_id, step_number, next_processing_time,
                retries, status, error_message, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, 0, 'scheduled', NULL, ?6, ?6)
            "#,
        )
        .bind(&job_id)
        .bind(campaign_id)
        .bind(lead_id)
        .bind(step_number)
        .bind(timefmt::to_db(next_processing_time))
        .bind(&now)
        .execute(&self.db_pool)
        .await?;

        Ok(job_id)
    }

    pub async fn complete_job(&self, job_id: &str) -> Result<(), EngineError> {
        self.finish_job(job_id, JobStatus::Completed, None).await
    }

    pub async fn fail_job(&self, job_id: &str, error: &str) -> Result<(), EngineError> {
        self.finish_job(job_id, JobStatus::Failed, Some(error)).await
    }

    async fn finish_job(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), EngineError> {
        let now = timefmt::to_db(Utc::now());
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?1, error_message = ?2, updated_at = ?3
            WHERE id = ?4 AND status = 'processing'
            "#,
        )
        .bind(status.as_str())
        .bind(error)
        .bind(&now)
        .bind(job_id)
        .execute(&self.db_pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(EngineError::Configuration(format!(
                "job {job_id} is not in processing state"
            )));
        }
        Ok(())
    }

    /// Append-only job log. Callers that must not abort on a log failure
    /// (the executor) wrap this and downgrade errors to a warning.
    pub async fn append_log(
        &self,
        job_id: &str,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO job_logs (id, job_id, created_at, message, details)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(job_id)
        .bind(timefmt::to_db(Utc::now()))
        .bind(message)
        .bind(details.map(|d| d.to_string()))
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    pub async fn list_logs(&self, job_id: &str) -> Result<Vec<JobLogRecord>, EngineError> {
        let rows: Vec<(String, String, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, job_id, created_at, message, details
            FROM job_logs
            WHERE job_id = ?1
            ORDER BY created_at ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter()
            .map(|(id, job_id, created_at, message, details)| {
                Ok(JobLogRecord {
                    id,
                    job_id,
                    created_at: timefmt::from_db(&created_at)?,
                    message,
                    details,
                })
            })
            .collect()
    }

    pub async fn list_jobs_for_campaign(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<Job>, EngineError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE campaign_id = ?1
            ORDER BY next_processing_time ASC
            "#
        ))
        .bind(campaign_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Operator sweep for jobs left in `processing` past the threshold
    /// (a worker died mid-send). A job gets a reclaim log entry only
    /// when this sweep won the flip to failed.
    pub async fn reclaim_stuck_jobs(&self, stuck_after_minutes: i64) -> Result<u64, EngineError> {
        let cutoff = timefmt::to_db(Utc::now() - Duration::minutes(stuck_after_minutes));

        let stuck: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM jobs
            WHERE status = 'processing' AND updated_at < ?1
            "#,
        )
        .bind(&cutoff)
        .fetch_all(&self.db_pool)
        .await?;

        let mut reclaimed = 0u64;
        for (job_id,) in stuck {
            let updated = sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'failed',
                    error_message = 'reclaimed: stuck in processing',
                    updated_at = ?1
                WHERE id = ?2 AND status = 'processing' AND updated_at < ?3
                "#,
            )
            .bind(timefmt::to_db(Utc::now()))
            .bind(&job_id)
            .bind(&cutoff)
            .execute(&self.db_pool)
            .await?;

            // The guard can lose to a concurrent terminal transition;
            // log only jobs this sweep actually flipped.
            if updated.rows_affected() == 1 {
                self.append_log(
                    &job_id,
                    "reclaimed: stuck in processing past threshold",
                    Some(serde_json::json!({ "stuck_after_minutes": stuck_after_minutes })),
                )
                .await?;
                reclaimed += 1;
            }
        }

        if reclaimed > 0 {
            log::warn!("(reclaim_stuck_jobs) reclaimed {} stuck jobs", reclaimed);
        }
        Ok(reclaimed)
    }
}
