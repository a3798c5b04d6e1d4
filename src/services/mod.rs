//! services/mod.rs
//! Business layer: one service per engine component.

pub mod campaign_service;
pub mod email_transport;
pub mod engine_service;
pub mod executor_service;
pub mod job_service;
pub mod scheduler_service;
pub mod sender_service;
pub mod template_service;
