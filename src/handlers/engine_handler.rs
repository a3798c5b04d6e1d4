//! handlers/engine_handler.rs

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::handlers::error_response;
use crate::models::engine_model::{EngineStateResponse, SetEngineStateRequest};
use crate::services::engine_service::EngineService;
use crate::services::executor_service::ExecutorService;

/// GET /api/engine/state
pub async fn get_engine_state_endpoint(
    engine_service: web::Data<EngineService>,
) -> HttpResponse {
    match engine_service.get_engine_state().await {
        Ok(state) => HttpResponse::Ok().json(EngineStateResponse::from(state)),
        Err(e) => error_response(&e),
    }
}

/// PUT /api/engine/state
pub async fn set_engine_state_endpoint(
    engine_service: web::Data<EngineService>,
    body: web::Json<SetEngineStateRequest>,
) -> HttpResponse {
    let req = body.into_inner();
    match engine_service
        .set_engine_state(&req.status, req.campaign_id.as_deref())
        .await
    {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => {
            log::error!("Engine state change error: {}", e);
            error_response(&e)
        }
    }
}

/// POST /api/engine/tick — the unit an external poller invokes per tick.
pub async fn tick_endpoint(executor_service: web::Data<ExecutorService>) -> HttpResponse {
    match executor_service.process_next_due_job().await {
        Ok(tick) => HttpResponse::Ok().json(tick),
        Err(e) => {
            log::error!("Tick error: {}", e);
            error_response(&e)
        }
    }
}
