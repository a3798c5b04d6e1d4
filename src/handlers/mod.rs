//! handlers/mod.rs
//! HTTP handlers grouped by resource (campaigns, engine, senders, jobs).

pub mod campaign_handler;
pub mod engine_handler;
pub mod job_handler;
pub mod sender_handler;

use actix_web::HttpResponse;
use serde_json::json;

use crate::errors::EngineError;

/// Maps the engine error taxonomy onto HTTP statuses.
pub(crate) fn error_response(e: &EngineError) -> HttpResponse {
    let body = json!({
        "success": false,
        "error": e.to_string()
    });
    match e {
        EngineError::Validation(_) | EngineError::Render(_) => {
            HttpResponse::BadRequest().json(body)
        }
        EngineError::Configuration(_) => HttpResponse::NotFound().json(body),
        EngineError::Capacity => HttpResponse::ServiceUnavailable().json(body),
        EngineError::Transport(_) | EngineError::Database(_) | EngineError::Timestamp(_) => {
            HttpResponse::InternalServerError().json(body)
        }
    }
}
