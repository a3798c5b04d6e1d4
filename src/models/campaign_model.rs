//! models/campaign_model.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Archived,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CampaignStatus::Draft),
            "active" => Some(CampaignStatus::Active),
            "paused" => Some(CampaignStatus::Paused),
            "completed" => Some(CampaignStatus::Completed),
            "archived" => Some(CampaignStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub daily_limit: i64,
    pub time_window_hours: f64,
    pub market_region: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignStep {
    pub id: String,
    pub campaign_id: String,
    pub step_number: i64,
    pub action_type: String,
    pub delay_days: i64,
    pub delay_hours: i64,
    pub subject_template: String,
    pub body_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub daily_limit: i64,
    pub time_window_hours: f64,
    pub market_region: Option<String>,
    #[serde(default)]
    pub steps: Vec<CreateStepRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStepRequest {
    pub action_type: Option<String>,
    #[serde(default)]
    pub delay_days: i64,
    #[serde(default)]
    pub delay_hours: i64,
    pub subject_template: String,
    pub body_template: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCampaignResponse {
    pub id: String,
    pub steps: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResequenceStepsRequest {
    /// The campaign's step ids in their new order.
    pub step_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleCampaignRequest {
    pub spread_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleCampaignResponse {
    pub jobs_created: i64,
}
