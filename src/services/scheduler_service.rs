//! services/scheduler_service.rs
//! Schedule Planner. Buckets leads across sending days, spaces each
//! day's sends evenly over the campaign's time window with random
//! jitter, and materializes later steps one at a time as the prior
//! step's job completes.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::{Pool, Sqlite};

use crate::config::engine_config::EngineConfig;
use crate::errors::EngineError;
use crate::models::campaign_model::CampaignStatus;
use crate::models::job_model::Job;
use crate::services::campaign_service::CampaignService;
use crate::services::job_service::JobService;

#[derive(Clone)]
pub struct SchedulerService {
    db_pool: Pool<Sqlite>,
    campaign_service: CampaignService,
    job_service: JobService,
    day_start_hour: u32,
    jitter_fraction: f64,
}

impl SchedulerService {
    pub fn new(
        db_pool: Pool<Sqlite>,
        campaign_service: CampaignService,
        job_service: JobService,
        config: &EngineConfig,
    ) -> Self {
        SchedulerService {
            db_pool,
            campaign_service,
            job_service,
            day_start_hour: config.day_start_hour,
            jitter_fraction: config.jitter_fraction,
        }
    }

    /// Plans first-step jobs for every enrolled lead that has no open job
    /// yet. Re-invocation is idempotent: already-planned leads are
    /// skipped. Zero eligible leads is a no-op, not an error.
    pub async fn schedule_campaign(
        &self,
        campaign_id: &str,
        spread_days: Option<i64>,
    ) -> Result<i64, EngineError> {
        let campaign = self.campaign_service.get_campaign(campaign_id).await?;

        if campaign.daily_limit <= 0 {
            return Err(EngineError::Validation(format!(
                "campaign {campaign_id} has non-positive daily_limit"
            )));
        }
        if campaign.time_window_hours <= 0.0 || campaign.time_window_hours > 24.0 {
            return Err(EngineError::Validation(format!(
                "campaign {campaign_id} has time_window_hours outside (0, 24]"
            )));
        }
        if let Some(days) = spread_days {
            if days <= 0 {
                return Err(EngineError::Validation(
                    "spread_days must be greater than zero".to_string(),
                ));
            }
        }

        let steps = self.campaign_service.list_steps(campaign_id).await?;
        let first_step = steps.first().ok_or_else(|| {
            EngineError::Configuration(format!("campaign {campaign_id} has no steps"))
        })?;

        let leads = self
            .campaign_service
            .leads_without_open_job(campaign_id)
            .await?;
        if leads.is_empty() {
            log::info!(
                "(schedule_campaign) campaign {} has no eligible leads, nothing to plan",
                campaign_id
            );
            return Ok(0);
        }

        let slots = plan_slots(
            leads.len(),
            campaign.daily_limit,
            campaign.time_window_hours,
            spread_days,
            self.day_start_hour,
            self.jitter_fraction,
            Utc::now(),
        );
        debug_assert_eq!(slots.len(), leads.len());

        let mut tx = self.db_pool.begin().await?;
        let now = crate::timefmt::to_db(Utc::now());
        for (lead, slot) in leads.iter().zip(slots.iter()) {
            sqlx::query(
                r#"
                INSERT INTO jobs (
                    id, campaign_id, lead_id, step_number, next_processing_time,
                    retries, status, error_message, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, 0, 'scheduled', NULL, ?6, ?6)
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(campaign_id)
            .bind(&lead.id)
            .bind(first_step.step_number)
            .bind(crate::timefmt::to_db(*slot))
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        if campaign.status == CampaignStatus::Draft {
            self.campaign_service
                .set_campaign_status(campaign_id, CampaignStatus::Active)
                .await?;
        }

        log::info!(
            "(schedule_campaign) campaign {} planned {} first-step jobs",
            campaign_id,
            leads.len()
        );
        Ok(leads.len() as i64)
    }

    /// Creates the next step's job for a lead whose current job just
    /// completed, due at completion time plus the step's delay. Returns
    /// `None` when the completed step was the last one.
    pub async fn materialize_next_step(
        &self,
        job: &Job,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<String>, EngineError> {
        let steps = self.campaign_service.list_steps(&job.campaign_id).await?;
        let next_step = steps.iter().find(|s| s.step_number > job.step_number);

        let Some(step) = next_step else {
            return Ok(None);
        };

        let due = completed_at
            + Duration::days(step.delay_days)
            + Duration::hours(step.delay_hours);

        let job_id = self
            .job_service
            .insert_scheduled_job(&job.campaign_id, &job.lead_id, step.step_number, due)
            .await?;

        log::info!(
            "(materialize_next_step) lead {} advanced to step {} (job {})",
            job.lead_id,
            step.step_number,
            job_id
        );
        Ok(Some(job_id))
    }
}

/// Pure planning function: one send slot per lead.
///
/// Leads fill day buckets so that no day exceeds `daily_limit`, spread
/// over at least `spread_days` days when given. Within a day, slots are
/// evenly spaced across the window starting at `day_start_hour`, each
/// displaced by uniform jitter spanning `jitter_fraction` of the
/// inter-slot interval (so at most half that span in either direction)
/// and clamped back into the window. Day zero is today unless today's
/// window has already closed; planning mid-window squeezes day zero's
/// slots into the remainder of the window rather than the past.
pub fn plan_slots(
    lead_count: usize,
    daily_limit: i64,
    time_window_hours: f64,
    spread_days: Option<i64>,
    day_start_hour: u32,
    jitter_fraction: f64,
    now: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    if lead_count == 0 {
        return Vec::new();
    }

    let limit = daily_limit.max(1) as usize;
    let min_days = lead_count.div_ceil(limit);
    let days = min_days.max(spread_days.unwrap_or(1).max(1) as usize);

    let per_day = lead_count / days;
    let remainder = lead_count % days;

    let window_secs = time_window_hours * 3600.0;
    let open_hour = day_start_hour.min(23) as i64;
    let day_open = now
        .date_naive()
        .and_time(chrono::NaiveTime::MIN)
        .and_utc()
        + Duration::hours(open_hour);
    let first_day = if now > day_open + Duration::milliseconds((window_secs * 1000.0) as i64) {
        day_open + Duration::days(1)
    } else {
        day_open
    };

    let mut rng = rand::thread_rng();
    let mut slots = Vec::with_capacity(lead_count);

    for day in 0..days {
        // The first `remainder` days carry one extra lead.
        let count = per_day + usize::from(day < remainder);
        if count == 0 {
            continue;
        }
        let opens = first_day + Duration::days(day as i64);
        // Planning mid-window compresses day zero into what is left of
        // its window; already-elapsed slots would all fire at once.
        let (day_start, day_window) = if day == 0 && now > opens {
            let elapsed = (now - opens).num_milliseconds() as f64 / 1000.0;
            (now, (window_secs - elapsed).max(0.0))
        } else {
            (opens, window_secs)
        };
        let interval = day_window / count as f64;
        let jitter_span = interval * jitter_fraction;

        for i in 0..count {
            let jitter = if jitter_span > 0.0 {
                rng.gen_range(-jitter_span / 2.0..=jitter_span / 2.0)
            } else {
                0.0
            };
            let offset = (interval * i as f64 + jitter).clamp(0.0, (day_window - 1.0).max(0.0));
            slots.push(day_start + Duration::milliseconds((offset * 1000.0) as i64));
        }
    }

    slots
}
