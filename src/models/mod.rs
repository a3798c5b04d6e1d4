//! models/mod.rs
//! Shared records and request/response shapes for the engine.

pub mod campaign_model;
pub mod email_model;
pub mod engine_model;
pub mod job_model;
pub mod lead_model;
pub mod sender_model;
