//! services/campaign_service.rs
//! Campaign, step and lead persistence. This is the narrow read surface
//! the engine consumes, plus the minimal write operations the outer CRUD
//! application calls through the HTTP layer.

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::campaign_model::{
    Campaign, CampaignStatus, CampaignStep, CreateCampaignRequest, CreateCampaignResponse,
};
use crate::models::lead_model::{EnrollLeadRequest, Lead};
use crate::timefmt;

#[derive(Clone)]
pub struct CampaignService {
    db_pool: Pool<Sqlite>,
}

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: String,
    name: String,
    status: String,
    daily_limit: i64,
    time_window_hours: f64,
    market_region: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct StepRow {
    id: String,
    campaign_id: String,
    step_number: i64,
    action_type: String,
    delay_days: i64,
    delay_hours: i64,
    subject_template: String,
    body_template: String,
}

#[derive(sqlx::FromRow)]
struct LeadRow {
    id: String,
    campaign_id: Option<String>,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    property_address: Option<String>,
    market_region: Option<String>,
    created_at: String,
}

impl CampaignRow {
    fn into_campaign(self) -> Result<Campaign, EngineError> {
        let status = CampaignStatus::parse(&self.status).ok_or_else(|| {
            EngineError::Configuration(format!(
                "campaign {} has unknown status '{}'",
                self.id, self.status
            ))
        })?;
        Ok(Campaign {
            id: self.id,
            name: self.name,
            status,
            daily_limit: self.daily_limit,
            time_window_hours: self.time_window_hours,
            market_region: self.market_region,
            created_at: timefmt::from_db(&self.created_at)?,
            updated_at: timefmt::from_db(&self.updated_at)?,
        })
    }
}

impl StepRow {
    fn into_step(self) -> CampaignStep {
        CampaignStep {
            id: self.id,
            campaign_id: self.campaign_id,
            step_number: self.step_number,
            action_type: self.action_type,
            delay_days: self.delay_days,
            delay_hours: self.delay_hours,
            subject_template: self.subject_template,
            body_template: self.body_template,
        }
    }
}

impl LeadRow {
    fn into_lead(self) -> Result<Lead, EngineError> {
        Ok(Lead {
            id: self.id,
            campaign_id: self.campaign_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            property_address: self.property_address,
            market_region: self.market_region,
            created_at: timefmt::from_db(&self.created_at)?,
        })
    }
}

impl CampaignService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        CampaignService { db_pool }
    }

    pub async fn run_migrations(&self) -> Result<(), EngineError> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .map_err(|e| EngineError::Configuration(format!("migrations failed: {e}")))?;
        Ok(())
    }

    pub async fn create_campaign(
        &self,
        req: CreateCampaignRequest,
    ) -> Result<CreateCampaignResponse, EngineError> {
        if req.daily_limit <= 0 {
            return Err(EngineError::Validation(
                "daily_limit must be greater than zero".to_string(),
            ));
        }
        if req.time_window_hours <= 0.0 || req.time_window_hours > 24.0 {
            return Err(EngineError::Validation(
                "time_window_hours must be in (0, 24]".to_string(),
            ));
        }

        let campaign_id = Uuid::new_v4().to_string();
        let now = timefmt::to_db(Utc::now());
        let step_count = req.steps.len();

        let mut tx = self.db_pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, name, status, daily_limit, time_window_hours,
                market_region, created_at, updated_at
            )
            VALUES (?1, ?2, 'draft', ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&campaign_id)
        .bind(&req.name)
        .bind(req.daily_limit)
        .bind(req.time_window_hours)
        .bind(&req.market_region)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for (i, step) in req.steps.into_iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO campaign_steps (
                    id, campaign_id, step_number, action_type,
                    delay_days, delay_hours, subject_template, body_template
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&campaign_id)
            .bind((i + 1) as i64)
            .bind(step.action_type.unwrap_or_else(|| "email".to_string()))
            .bind(step.delay_days)
            .bind(step.delay_hours)
            .bind(&step.subject_template)
            .bind(&step.body_template)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(CreateCampaignResponse {
            id: campaign_id,
            steps: step_count,
        })
    }

    pub async fn get_campaign(&self, campaign_id: &str) -> Result<Campaign, EngineError> {
        let row: Option<CampaignRow> = sqlx::query_as(
            r#"
            SELECT id, name, status, daily_limit, time_window_hours,
                   market_region, created_at, updated_at
            FROM campaigns
            WHERE id = ?1
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.ok_or_else(|| EngineError::Configuration(format!("campaign {campaign_id} not found")))?
            .into_campaign()
    }

    pub async fn set_campaign_status(
        &self,
        campaign_id: &str,
        status: CampaignStatus,
    ) -> Result<(), EngineError> {
        let now = timefmt::to_db(Utc::now());
        sqlx::query("UPDATE campaigns SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(&now)
            .bind(campaign_id)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    /// Ordered steps of a campaign; step_number defines the sequence.
    pub async fn list_steps(&self, campaign_id: &str) -> Result<Vec<CampaignStep>, EngineError> {
        let rows: Vec<StepRow> = sqlx::query_as(
            r#"
            SELECT id, campaign_id, step_number, action_type,
                   delay_days, delay_hours, subject_template, body_template
            FROM campaign_steps
            WHERE campaign_id = ?1
            ORDER BY step_number ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(StepRow::into_step).collect())
    }

    pub async fn get_step(
        &self,
        campaign_id: &str,
        step_number: i64,
    ) -> Result<CampaignStep, EngineError> {
        let row: Option<StepRow> = sqlx::query_as(
            r#"
            SELECT id, campaign_id, step_number, action_type,
                   delay_days, delay_hours, subject_template, body_template
            FROM campaign_steps
            WHERE campaign_id = ?1 AND step_number = ?2
            "#,
        )
        .bind(campaign_id)
        .bind(step_number)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(StepRow::into_step).ok_or_else(|| {
            EngineError::Configuration(format!(
                "campaign {campaign_id} has no step {step_number}"
            ))
        })
    }

    /// Renumbers all steps of a campaign transactionally. Refused once any
    /// job has been generated, because job rows reference step numbers.
    pub async fn resequence_steps(
        &self,
        campaign_id: &str,
        step_ids: &[String],
    ) -> Result<(), EngineError> {
        let existing = self.list_steps(campaign_id).await?;
        if existing.len() != step_ids.len()
            || !existing.iter().all(|s| step_ids.contains(&s.id))
        {
            return Err(EngineError::Validation(
                "step_ids must be a permutation of the campaign's steps".to_string(),
            ));
        }

        let (job_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE campaign_id = ?1")
                .bind(campaign_id)
                .fetch_one(&self.db_pool)
                .await?;
        if job_count > 0 {
            return Err(EngineError::Validation(
                "steps are immutable once jobs have been generated".to_string(),
            ));
        }

        let mut tx = self.db_pool.begin().await?;

        // Two phases to stay clear of the (campaign_id, step_number)
        // uniqueness constraint mid-renumber.
        for (i, step_id) in step_ids.iter().enumerate() {
            sqlx::query("UPDATE campaign_steps SET step_number = ?1 WHERE id = ?2")
                .bind(-((i + 1) as i64))
                .bind(step_id)
                .execute(&mut *tx)
                .await?;
        }
        for (i, step_id) in step_ids.iter().enumerate() {
            sqlx::query("UPDATE campaign_steps SET step_number = ?1 WHERE id = ?2")
                .bind((i + 1) as i64)
                .bind(step_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn enroll_lead(
        &self,
        campaign_id: &str,
        req: EnrollLeadRequest,
    ) -> Result<String, EngineError> {
        if req.email.trim().is_empty() {
            return Err(EngineError::Validation(
                "lead email must not be empty".to_string(),
            ));
        }
        // Campaign must exist before enrollment.
        self.get_campaign(campaign_id).await?;

        let lead_id = Uuid::new_v4().to_string();
        let now = timefmt::to_db(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO leads (
                id, campaign_id, email, first_name, last_name,
                property_address, market_region, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&lead_id)
        .bind(campaign_id)
        .bind(req.email.trim())
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.property_address)
        .bind(&req.market_region)
        .bind(&now)
        .execute(&self.db_pool)
        .await?;

        Ok(lead_id)
    }

    pub async fn get_lead(&self, lead_id: &str) -> Result<Lead, EngineError> {
        let row: Option<LeadRow> = sqlx::query_as(
            r#"
            SELECT id, campaign_id, email, first_name, last_name,
                   property_address, market_region, created_at
            FROM leads
            WHERE id = ?1
            "#,
        )
        .bind(lead_id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.ok_or_else(|| EngineError::Configuration(format!("lead {lead_id} not found")))?
            .into_lead()
    }

    /// Enrolled leads that have no scheduled or processing job in the
    /// campaign. This is what makes re-planning idempotent.
    pub async fn leads_without_open_job(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<Lead>, EngineError> {
        let rows: Vec<LeadRow> = sqlx::query_as(
            r#"
            SELECT l.id, l.campaign_id, l.email, l.first_name, l.last_name,
                   l.property_address, l.market_region, l.created_at
            FROM leads l
            WHERE l.campaign_id = ?1
              AND NOT EXISTS (
                  SELECT 1 FROM jobs j
                  WHERE j.campaign_id = ?1
                    AND j.lead_id = l.id
                    AND j.status IN ('scheduled', 'processing')
              )
            ORDER BY l.created_at ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(LeadRow::into_lead).collect()
    }
}
