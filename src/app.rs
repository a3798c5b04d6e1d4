//! app.rs
use crate::handlers::{campaign_handler, engine_handler, job_handler, sender_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/campaigns")
                    .route(
                        "",
                        web::post().to(campaign_handler::create_campaign_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::get().to(campaign_handler::get_campaign_endpoint),
                    )
                    .route(
                        "/{id}/leads",
                        web::post().to(campaign_handler::enroll_lead_endpoint),
                    )
                    .route(
                        "/{id}/schedule",
                        web::post().to(campaign_handler::schedule_campaign_endpoint),
                    )
                    .route(
                        "/{id}/steps/resequence",
                        web::post().to(campaign_handler::resequence_steps_endpoint),
                    )
                    .route(
                        "/{id}/jobs",
                        web::get().to(job_handler::list_campaign_jobs_endpoint),
                    ),
            )
            .service(
                web::scope("/engine")
                    .route(
                        "/state",
                        web::get().to(engine_handler::get_engine_state_endpoint),
                    )
                    .route(
                        "/state",
                        web::put().to(engine_handler::set_engine_state_endpoint),
                    )
                    .route("/tick", web::post().to(engine_handler::tick_endpoint)),
            )
            .service(
                web::scope("/senders")
                    .route("", web::post().to(sender_handler::create_sender_endpoint))
                    .route("", web::get().to(sender_handler::list_senders_endpoint))
                    .route(
                        "/reset",
                        web::post().to(sender_handler::reset_counts_endpoint),
                    ),
            )
            .service(
                web::scope("/jobs")
                    .route(
                        "/reclaim",
                        web::post().to(job_handler::reclaim_stuck_jobs_endpoint),
                    )
                    .route(
                        "/{id}/logs",
                        web::get().to(job_handler::list_job_logs_endpoint),
                    ),
            ),
    );
}
