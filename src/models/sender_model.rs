//! models/sender_model.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Sender {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub daily_limit: i64,
    pub sent_today: i64,
    pub last_reset_date: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSenderRequest {
    pub email: String,
    pub display_name: Option<String>,
    pub daily_limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSenderResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetCountsResponse {
    pub reset: u64,
}
