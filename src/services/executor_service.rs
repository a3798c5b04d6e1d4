//! services/executor_service.rs
//! Consumes one claimed job end to end: load context, reserve sender
//! quota, render, send, transition, log, and materialize the lead's next
//! step. One invocation of `process_next_due_job` is the unit the poller
//! runs per tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use crate::config::engine_config::EngineConfig;
use crate::errors::EngineError;
use crate::models::email_model::{OutboundEmail, SendReceipt};
use crate::models::job_model::{Job, TickResponse};
use crate::services::campaign_service::CampaignService;
use crate::services::email_transport::EmailTransport;
use crate::services::job_service::JobService;
use crate::services::scheduler_service::SchedulerService;
use crate::services::sender_service::SenderService;
use crate::services::template_service::render_template;

#[derive(Clone)]
pub struct ExecutorService {
    campaign_service: CampaignService,
    job_service: JobService,
    sender_service: SenderService,
    scheduler_service: SchedulerService,
    transport: Arc<dyn EmailTransport>,
    send_timeout: Duration,
}

impl ExecutorService {
    pub fn new(
        campaign_service: CampaignService,
        job_service: JobService,
        sender_service: SenderService,
        scheduler_service: SchedulerService,
        transport: Arc<dyn EmailTransport>,
        config: &EngineConfig,
    ) -> Self {
        ExecutorService {
            campaign_service,
            job_service,
            sender_service,
            scheduler_service,
            transport,
            send_timeout: Duration::from_secs(config.send_timeout_secs),
        }
    }

    /// One poller tick: claim at most one due job and run it to a
    /// terminal state. Claiming nothing is the common idle case.
    pub async fn process_next_due_job(&self) -> Result<TickResponse, EngineError> {
        let Some(job) = self.job_service.claim_next_due_job().await? else {
            return Ok(TickResponse {
                processed: false,
                job_id: None,
            });
        };

        match self.execute(&job).await {
            Ok(receipt) => {
                // Log before the transition so a crash in between never
                // loses the outcome.
                self.append_log_best_effort(
                    &job.id,
                    &format!("step {} sent to lead {}", job.step_number, job.lead_id),
                    Some(json!({ "message_id": receipt.message_id })),
                )
                .await;
                self.job_service.complete_job(&job.id).await?;

                if let Err(e) = self
                    .scheduler_service
                    .materialize_next_step(&job, Utc::now())
                    .await
                {
                    log::error!(
                        "(process_next_due_job) job {} completed but next step \
                         materialization failed: {:?}",
                        job.id,
                        e
                    );
                }
            }
            Err(e) => {
                let reason = e.to_string();
                log::error!("(process_next_due_job) job {} failed: {}", job.id, reason);
                self.append_log_best_effort(
                    &job.id,
                    &format!("job failed: {reason}"),
                    Some(json!({ "step_number": job.step_number })),
                )
                .await;
                self.job_service.fail_job(&job.id, &reason).await?;
            }
        }

        Ok(TickResponse {
            processed: true,
            job_id: Some(job.id),
        })
    }

    async fn execute(&self, job: &Job) -> Result<SendReceipt, EngineError> {
        let lead = self.campaign_service.get_lead(&job.lead_id).await?;
        let step = self
            .campaign_service
            .get_step(&job.campaign_id, job.step_number)
            .await?;

        if lead.email.trim().is_empty() {
            return Err(EngineError::Validation(format!(
                "lead {} has no email address",
                lead.id
            )));
        }

        let sender = self.sender_service.pick_available_sender().await?;
        // Quota is consumed on attempt; a failed send does not refund it.
        self.sender_service.record_send(&sender.id).await?;

        let subject = render_template(&step.subject_template, &lead)?;
        let html_body = render_template(&step.body_template, &lead)?;

        let email = OutboundEmail {
            from: sender.email.clone(),
            to: lead.email.clone(),
            subject,
            html_body,
            attachments: Vec::new(),
        };

        log::info!(
            "(execute) sending step {} for lead {} via sender {}",
            job.step_number,
            lead.id,
            sender.id
        );

        match tokio::time::timeout(self.send_timeout, self.transport.send(email)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Transport(format!(
                "send timed out after {}s",
                self.send_timeout.as_secs()
            ))),
        }
    }

    /// A log write failure must never abort job processing.
    async fn append_log_best_effort(
        &self,
        job_id: &str,
        message: &str,
        details: Option<serde_json::Value>,
    ) {
        if let Err(e) = self.job_service.append_log(job_id, message, details).await {
            log::warn!(
                "(append_log_best_effort) log write for job {} failed: {:?}",
                job_id,
                e
            );
        }
    }
}
