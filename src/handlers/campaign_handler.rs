//! handlers/campaign_handler.rs

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::handlers::error_response;
use crate::models::campaign_model::{
    CreateCampaignRequest, ResequenceStepsRequest, ScheduleCampaignRequest,
    ScheduleCampaignResponse,
};
use crate::models::lead_model::{EnrollLeadRequest, EnrollLeadResponse};
use crate::services::campaign_service::CampaignService;
use crate::services::scheduler_service::SchedulerService;

/// POST /api/campaigns
pub async fn create_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    body: web::Json<CreateCampaignRequest>,
) -> HttpResponse {
    match campaign_service.create_campaign(body.into_inner()).await {
        Ok(resp) => HttpResponse::Ok().json(json!({
            "success": true,
            "campaign": resp
        })),
        Err(e) => {
            log::error!("Campaign creation error: {}", e);
            error_response(&e)
        }
    }
}

/// GET /api/campaigns/{id}
pub async fn get_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    path: web::Path<String>,
) -> HttpResponse {
    match campaign_service.get_campaign(&path.into_inner()).await {
        Ok(campaign) => HttpResponse::Ok().json(campaign),
        Err(e) => error_response(&e),
    }
}

/// POST /api/campaigns/{id}/leads
pub async fn enroll_lead_endpoint(
    campaign_service: web::Data<CampaignService>,
    path: web::Path<String>,
    body: web::Json<EnrollLeadRequest>,
) -> HttpResponse {
    let campaign_id = path.into_inner();
    match campaign_service
        .enroll_lead(&campaign_id, body.into_inner())
        .await
    {
        Ok(id) => HttpResponse::Ok().json(json!({
            "success": true,
            "lead": EnrollLeadResponse { id }
        })),
        Err(e) => error_response(&e),
    }
}

/// POST /api/campaigns/{id}/schedule
pub async fn schedule_campaign_endpoint(
    scheduler_service: web::Data<SchedulerService>,
    path: web::Path<String>,
    body: web::Json<ScheduleCampaignRequest>,
) -> HttpResponse {
    let campaign_id = path.into_inner();
    match scheduler_service
        .schedule_campaign(&campaign_id, body.spread_days)
        .await
    {
        Ok(jobs_created) => HttpResponse::Ok().json(json!({
            "success": true,
            "result": ScheduleCampaignResponse { jobs_created }
        })),
        Err(e) => {
            log::error!("Scheduling error for campaign {}: {}", campaign_id, e);
            error_response(&e)
        }
    }
}

/// POST /api/campaigns/{id}/steps/resequence
pub async fn resequence_steps_endpoint(
    campaign_service: web::Data<CampaignService>,
    path: web::Path<String>,
    body: web::Json<ResequenceStepsRequest>,
) -> HttpResponse {
    match campaign_service
        .resequence_steps(&path.into_inner(), &body.step_ids)
        .await
    {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => error_response(&e),
    }
}
