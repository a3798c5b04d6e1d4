use std::str::FromStr;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::engine_config::EngineConfig;
use crate::logger::init_logger;
use crate::services::campaign_service::CampaignService;
use crate::services::email_transport::SmtpEmailTransport;
use crate::services::engine_service::EngineService;
use crate::services::executor_service::ExecutorService;
use crate::services::job_service::JobService;
use crate::services::scheduler_service::SchedulerService;
use crate::services::sender_service::SenderService;

mod app;
mod config;
mod errors;
mod handlers;
mod logger;
mod models;
mod services;
mod timefmt;

#[cfg(test)]
mod tests;

async fn setup_database() -> anyhow::Result<Pool<Sqlite>> {
    std::fs::create_dir_all("data")?;

    let db_path = std::env::current_dir()?.join("data").join("campaigns.db");
    let db_url = format!("sqlite:{}", db_path.to_string_lossy());

    log::info!("Connecting to SQLite at {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);
    let db_pool = SqlitePoolOptions::new().connect_with(options).await?;

    Ok(db_pool)
}

/// In-process poller. External cron hitting /api/engine/tick is the
/// primary trigger; this loop is a convenience for single-node setups
/// and both can overlap safely.
fn spawn_poll_loop(executor: ExecutorService, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            match executor.process_next_due_job().await {
                Ok(tick) if tick.processed => {
                    log::info!("Poller processed job {:?}", tick.job_id);
                }
                Ok(_) => {}
                Err(e) => log::error!("Poller tick failed: {:?}", e),
            }
        }
    });
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_logger();

    let engine_config = EngineConfig::from_env();

    let db_pool = setup_database().await?;

    let campaign_service = CampaignService::new(db_pool.clone());
    campaign_service.run_migrations().await?;

    let engine_service = EngineService::new(db_pool.clone());
    let sender_service = SenderService::new(db_pool.clone());
    let job_service = JobService::new(db_pool.clone(), engine_service.clone());
    let scheduler_service = SchedulerService::new(
        db_pool.clone(),
        campaign_service.clone(),
        job_service.clone(),
        &engine_config,
    );

    let transport = Arc::new(SmtpEmailTransport::from_config(&engine_config)?);
    let executor_service = ExecutorService::new(
        campaign_service.clone(),
        job_service.clone(),
        sender_service.clone(),
        scheduler_service.clone(),
        transport,
        &engine_config,
    );

    if engine_config.poll_interval_secs > 0 {
        spawn_poll_loop(executor_service.clone(), engine_config.poll_interval_secs);
    }

    let bind_addr = (engine_config.host.clone(), engine_config.port);
    log::info!("Starting server on {}:{}", bind_addr.0, bind_addr.1);

    let config_data = web::Data::new(engine_config);
    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(web::Data::new(campaign_service.clone()))
            .app_data(web::Data::new(engine_service.clone()))
            .app_data(web::Data::new(sender_service.clone()))
            .app_data(web::Data::new(job_service.clone()))
            .app_data(web::Data::new(scheduler_service.clone()))
            .app_data(web::Data::new(executor_service.clone()))
            .configure(app::init_app)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
