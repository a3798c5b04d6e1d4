//! handlers/job_handler.rs

use actix_web::{web, HttpResponse};

use crate::config::engine_config::EngineConfig;
use crate::handlers::error_response;
use crate::models::job_model::ReclaimResponse;
use crate::services::job_service::JobService;

/// GET /api/campaigns/{id}/jobs — dashboard read of job statuses.
pub async fn list_campaign_jobs_endpoint(
    job_service: web::Data<JobService>,
    path: web::Path<String>,
) -> HttpResponse {
    match job_service.list_jobs_for_campaign(&path.into_inner()).await {
        Ok(jobs) => HttpResponse::Ok().json(jobs),
        Err(e) => error_response(&e),
    }
}

/// GET /api/jobs/{id}/logs
pub async fn list_job_logs_endpoint(
    job_service: web::Data<JobService>,
    path: web::Path<String>,
) -> HttpResponse {
    match job_service.list_logs(&path.into_inner()).await {
        Ok(logs) => HttpResponse::Ok().json(logs),
        Err(e) => error_response(&e),
    }
}

/// POST /api/jobs/reclaim — operator sweep for jobs stuck in processing.
pub async fn reclaim_stuck_jobs_endpoint(
    job_service: web::Data<JobService>,
    config: web::Data<EngineConfig>,
) -> HttpResponse {
    match job_service
        .reclaim_stuck_jobs(config.stuck_job_minutes)
        .await
    {
        Ok(reclaimed) => HttpResponse::Ok().json(ReclaimResponse { reclaimed }),
        Err(e) => error_response(&e),
    }
}
