//! tests/claim_tests.rs
//! Claim exclusivity and gating by engine and campaign state.

use actix_rt::test;
use chrono::Duration;

use crate::models::job_model::JobStatus;
use crate::tests::common::{
    create_campaign, enroll_leads, force_jobs_due, setup, start_engine,
};

#[test]
async fn claim_returns_none_while_engine_stopped() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[(0, 0)]).await;
    enroll_leads(&ctx, &campaign_id, 1).await;
    ctx.scheduler
        .schedule_campaign(&campaign_id, None)
        .await
        .unwrap();
    force_jobs_due(&ctx, &campaign_id, Duration::minutes(5)).await;

    // Engine starts stopped; a due job must not be claimable.
    assert!(ctx.jobs.claim_next_due_job().await.unwrap().is_none());

    start_engine(&ctx).await;
    assert!(ctx.jobs.claim_next_due_job().await.unwrap().is_some());
}

#[test]
async fn exactly_one_caller_wins_a_racing_claim() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[(0, 0)]).await;
    enroll_leads(&ctx, &campaign_id, 1).await;
    ctx.scheduler
        .schedule_campaign(&campaign_id, None)
        .await
        .unwrap();
    force_jobs_due(&ctx, &campaign_id, Duration::minutes(5)).await;
    start_engine(&ctx).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let jobs = ctx.jobs.clone();
        handles.push(tokio::spawn(async move {
            jobs.claim_next_due_job().await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one racer may claim the job");
}

#[test]
async fn claims_earliest_due_job_first() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[(0, 0)]).await;
    enroll_leads(&ctx, &campaign_id, 3).await;
    ctx.scheduler
        .schedule_campaign(&campaign_id, None)
        .await
        .unwrap();
    force_jobs_due(&ctx, &campaign_id, Duration::minutes(5)).await;
    start_engine(&ctx).await;

    let first = ctx.jobs.claim_next_due_job().await.unwrap().unwrap();
    let second = ctx.jobs.claim_next_due_job().await.unwrap().unwrap();
    assert!(first.next_processing_time <= second.next_processing_time);
    assert_eq!(first.status, JobStatus::Processing);
}

#[test]
async fn future_jobs_are_not_claimable() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[(0, 0)]).await;
    enroll_leads(&ctx, &campaign_id, 1).await;
    ctx.scheduler
        .schedule_campaign(&campaign_id, None)
        .await
        .unwrap();
    start_engine(&ctx).await;

    let job = ctx.jobs.list_jobs_for_campaign(&campaign_id).await.unwrap()[0].clone();
    crate::tests::common::set_job_time(&ctx, &job.id, chrono::Utc::now() + Duration::hours(2))
        .await;

    assert!(ctx.jobs.claim_next_due_job().await.unwrap().is_none());
}

#[test]
async fn paused_campaign_jobs_are_not_candidates() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[(0, 0)]).await;
    enroll_leads(&ctx, &campaign_id, 1).await;
    ctx.scheduler
        .schedule_campaign(&campaign_id, None)
        .await
        .unwrap();
    force_jobs_due(&ctx, &campaign_id, Duration::minutes(5)).await;
    start_engine(&ctx).await;

    ctx.engine
        .set_engine_state("paused", Some(campaign_id.as_str()))
        .await
        .unwrap();
    assert!(
        ctx.jobs.claim_next_due_job().await.unwrap().is_none(),
        "jobs of a paused campaign must be excluded"
    );

    ctx.engine
        .set_engine_state("running", Some(campaign_id.as_str()))
        .await
        .unwrap();
    force_jobs_due(&ctx, &campaign_id, Duration::minutes(5)).await;
    assert!(ctx.jobs.claim_next_due_job().await.unwrap().is_some());
}

#[test]
async fn global_pause_blocks_all_claims() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[(0, 0)]).await;
    enroll_leads(&ctx, &campaign_id, 1).await;
    ctx.scheduler
        .schedule_campaign(&campaign_id, None)
        .await
        .unwrap();
    force_jobs_due(&ctx, &campaign_id, Duration::minutes(5)).await;
    start_engine(&ctx).await;

    ctx.engine.set_engine_state("paused", None).await.unwrap();
    assert!(ctx.jobs.claim_next_due_job().await.unwrap().is_none());
}
