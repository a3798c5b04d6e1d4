//! config/engine_config.rs
//! Global engine configuration with defaults, overridable from the
//! environment (loaded via .env in main).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,

    /// Hour of day (UTC) at which each sending day opens.
    pub day_start_hour: u32,
    /// Fraction of the inter-job interval used as random jitter on
    /// planned send times.
    pub jitter_fraction: f64,

    /// Upper bound on a single SMTP send before the job is failed.
    pub send_timeout_secs: u64,
    /// Interval of the in-process poll loop; 0 disables it (external
    /// cron can still drive POST /api/engine/tick).
    pub poll_interval_secs: u64,
    /// A job stuck in `processing` longer than this is reclaimable.
    pub stuck_job_minutes: i64,

    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            host: "0.0.0.0".to_string(),
            port: 5080,
            day_start_hour: 9,
            jitter_fraction: 0.25,
            send_timeout_secs: 30,
            poll_interval_secs: 120,
            stuck_job_minutes: 30,
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_user: String::new(),
            smtp_pass: String::new(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let d = EngineConfig::default();
        EngineConfig {
            host: env_or("ENGINE_HOST", d.host),
            port: env_or("ENGINE_PORT", d.port),
            day_start_hour: env_or("SEND_DAY_START_HOUR", d.day_start_hour),
            jitter_fraction: env_or("SCHEDULE_JITTER_FRACTION", d.jitter_fraction),
            send_timeout_secs: env_or("SEND_TIMEOUT_SECS", d.send_timeout_secs),
            poll_interval_secs: env_or("POLL_INTERVAL_SECS", d.poll_interval_secs),
            stuck_job_minutes: env_or("STUCK_JOB_MINUTES", d.stuck_job_minutes),
            smtp_host: env_or("SMTP_HOST", d.smtp_host),
            smtp_port: env_or("SMTP_PORT", d.smtp_port),
            smtp_user: env_or("SMTP_USER", d.smtp_user),
            smtp_pass: env_or("SMTP_PASS", d.smtp_pass),
        }
    }
}
