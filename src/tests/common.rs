//! tests/common.rs
//! Shared harness: in-memory database, wired services, mock transport.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::config::engine_config::EngineConfig;
use crate::errors::EngineError;
use crate::models::campaign_model::{CreateCampaignRequest, CreateStepRequest};
use crate::models::email_model::{OutboundEmail, SendReceipt};
use crate::models::lead_model::EnrollLeadRequest;
use crate::models::sender_model::CreateSenderRequest;
use crate::services::campaign_service::CampaignService;
use crate::services::email_transport::EmailTransport;
use crate::services::engine_service::EngineService;
use crate::services::executor_service::ExecutorService;
use crate::services::job_service::JobService;
use crate::services::scheduler_service::SchedulerService;
use crate::services::sender_service::SenderService;
use crate::timefmt;

/// Transport double that records sends and can be told to fail.
pub struct MockTransport {
    pub sent: Mutex<Vec<OutboundEmail>>,
    pub fail_with: Mutex<Option<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(MockTransport {
            sent: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
        })
    }

    pub fn fail_next_sends(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailTransport for MockTransport {
    async fn send(&self, email: OutboundEmail) -> Result<SendReceipt, EngineError> {
        if let Some(msg) = self.fail_with.lock().unwrap().clone() {
            return Err(EngineError::Transport(msg));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email);
        Ok(SendReceipt {
            message_id: format!("mock-{}", sent.len()),
        })
    }
}

pub struct TestContext {
    pub pool: Pool<Sqlite>,
    pub campaigns: CampaignService,
    pub engine: EngineService,
    pub senders: SenderService,
    pub jobs: JobService,
    pub scheduler: SchedulerService,
    pub executor: ExecutorService,
    pub transport: Arc<MockTransport>,
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        day_start_hour: 9,
        jitter_fraction: 0.25,
        send_timeout_secs: 5,
        poll_interval_secs: 0,
        stuck_job_minutes: 30,
        ..EngineConfig::default()
    }
}

/// One-connection in-memory pool so every service sees the same database.
pub async fn setup() -> TestContext {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let config = test_config();
    let campaigns = CampaignService::new(pool.clone());
    let engine = EngineService::new(pool.clone());
    let senders = SenderService::new(pool.clone());
    let jobs = JobService::new(pool.clone(), engine.clone());
    let scheduler = SchedulerService::new(pool.clone(), campaigns.clone(), jobs.clone(), &config);
    let transport = MockTransport::new();
    let executor = ExecutorService::new(
        campaigns.clone(),
        jobs.clone(),
        senders.clone(),
        scheduler.clone(),
        transport.clone(),
        &config,
    );

    TestContext {
        pool,
        campaigns,
        engine,
        senders,
        jobs,
        scheduler,
        executor,
        transport,
    }
}

/// Campaign with the given quota/window and one step per (delay_days,
/// delay_hours) pair.
pub async fn create_campaign(
    ctx: &TestContext,
    daily_limit: i64,
    time_window_hours: f64,
    step_delays: &[(i64, i64)],
) -> String {
    let steps = step_delays
        .iter()
        .map(|(days, hours)| CreateStepRequest {
            action_type: None,
            delay_days: *days,
            delay_hours: *hours,
            subject_template: "About {{property_address}}".to_string(),
            body_template: "Hi {{first_name}}, quick question.".to_string(),
        })
        .collect();

    ctx.campaigns
        .create_campaign(CreateCampaignRequest {
            name: "test campaign".to_string(),
            daily_limit,
            time_window_hours,
            market_region: Some("austin".to_string()),
            steps,
        })
        .await
        .expect("Failed to create campaign")
        .id
}

pub async fn enroll_leads(ctx: &TestContext, campaign_id: &str, count: usize) -> Vec<String> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let id = ctx
            .campaigns
            .enroll_lead(
                campaign_id,
                EnrollLeadRequest {
                    email: format!("lead{i}@example.com"),
                    first_name: Some(format!("Lead{i}")),
                    last_name: None,
                    property_address: Some(format!("{i} Main St")),
                    market_region: None,
                },
            )
            .await
            .expect("Failed to enroll lead");
        ids.push(id);
    }
    ids
}

pub async fn create_sender(ctx: &TestContext, daily_limit: i64) -> String {
    ctx.senders
        .create_sender(CreateSenderRequest {
            email: format!("sender-{}@outreach.example.com", uuid::Uuid::new_v4()),
            display_name: None,
            daily_limit,
        })
        .await
        .expect("Failed to create sender")
}

pub async fn start_engine(ctx: &TestContext) {
    ctx.engine
        .set_engine_state("running", None)
        .await
        .expect("Failed to start engine");
}

/// Rewrites every scheduled job of a campaign to be due `ago` in the past
/// while keeping their relative order, so ticks pick them up immediately.
pub async fn force_jobs_due(ctx: &TestContext, campaign_id: &str, ago: Duration) {
    let jobs = ctx
        .jobs
        .list_jobs_for_campaign(campaign_id)
        .await
        .expect("Failed to list jobs");
    let base: DateTime<Utc> = Utc::now() - ago;
    for (i, job) in jobs.iter().enumerate() {
        set_job_time(ctx, &job.id, base + Duration::milliseconds(i as i64)).await;
    }
}

pub async fn set_job_time(ctx: &TestContext, job_id: &str, ts: DateTime<Utc>) {
    sqlx::query("UPDATE jobs SET next_processing_time = ?1 WHERE id = ?2")
        .bind(timefmt::to_db(ts))
        .bind(job_id)
        .execute(&ctx.pool)
        .await
        .expect("Failed to update job time");
}
