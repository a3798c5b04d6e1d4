//! models/lead_model.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Lead {
    pub id: String,
    pub campaign_id: Option<String>,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub property_address: Option<String>,
    pub market_region: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollLeadRequest {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub property_address: Option<String>,
    pub market_region: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollLeadResponse {
    pub id: String,
}
