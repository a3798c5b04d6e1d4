//! models/engine_model.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Stopped,
    Running,
    Paused,
}

impl EngineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Stopped => "stopped",
            EngineStatus::Running => "running",
            EngineStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stopped" => Some(EngineStatus::Stopped),
            "running" => Some(EngineStatus::Running),
            "paused" => Some(EngineStatus::Paused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineState {
    pub status: EngineStatus,
    pub paused_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetEngineStateRequest {
    pub status: String,
    pub campaign_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStateResponse {
    pub status: String,
    pub paused_at: Option<String>,
}

impl From<EngineState> for EngineStateResponse {
    fn from(state: EngineState) -> Self {
        EngineStateResponse {
            status: state.status.as_str().to_string(),
            paused_at: state.paused_at.map(|ts| ts.to_rfc3339()),
        }
    }
}
