//! handlers/sender_handler.rs

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::handlers::error_response;
use crate::models::sender_model::{CreateSenderRequest, CreateSenderResponse, ResetCountsResponse};
use crate::services::sender_service::SenderService;

/// POST /api/senders
pub async fn create_sender_endpoint(
    sender_service: web::Data<SenderService>,
    body: web::Json<CreateSenderRequest>,
) -> HttpResponse {
    match sender_service.create_sender(body.into_inner()).await {
        Ok(id) => HttpResponse::Ok().json(json!({
            "success": true,
            "sender": CreateSenderResponse { id }
        })),
        Err(e) => error_response(&e),
    }
}

/// GET /api/senders
pub async fn list_senders_endpoint(sender_service: web::Data<SenderService>) -> HttpResponse {
    match sender_service.list_senders().await {
        Ok(senders) => HttpResponse::Ok().json(senders),
        Err(e) => error_response(&e),
    }
}

/// POST /api/senders/reset — driven by an external daily cron.
pub async fn reset_counts_endpoint(sender_service: web::Data<SenderService>) -> HttpResponse {
    match sender_service.reset_all_daily_counts().await {
        Ok(reset) => HttpResponse::Ok().json(ResetCountsResponse { reset }),
        Err(e) => error_response(&e),
    }
}
