//! tests/scheduler_tests.rs
//! Planner distribution, idempotency and step materialization.

use std::collections::BTreeMap;

use actix_rt::test;
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};

use crate::errors::EngineError;
use crate::models::job_model::JobStatus;
use crate::services::scheduler_service::plan_slots;
use crate::tests::common::{create_campaign, enroll_leads, setup};

fn by_day(slots: &[DateTime<Utc>]) -> BTreeMap<chrono::NaiveDate, Vec<DateTime<Utc>>> {
    let mut days: BTreeMap<_, Vec<_>> = BTreeMap::new();
    for slot in slots {
        days.entry(slot.date_naive()).or_default().push(*slot);
    }
    days
}

#[test]
async fn hundred_leads_spread_over_five_days_within_window() {
    let now = Utc.with_ymd_and_hms(2026, 8, 26, 8, 0, 0).unwrap();
    let slots = plan_slots(100, 20, 8.0, None, 9, 0.25, now);
    assert_eq!(slots.len(), 100);

    let days = by_day(&slots);
    assert_eq!(days.len(), 5, "100 leads at 20/day must take 5 days");

    for (_, mut day_slots) in days {
        assert_eq!(day_slots.len(), 20, "no day may exceed the daily limit");
        day_slots.sort();

        for slot in &day_slots {
            let secs_into_day =
                (slot.hour() as i64) * 3600 + (slot.minute() as i64) * 60 + slot.second() as i64;
            let window_start = 9 * 3600;
            let window_end = window_start + 8 * 3600;
            assert!(
                (window_start..window_end).contains(&secs_into_day),
                "slot {slot} falls outside the 09:00-17:00 window"
            );
        }

        // 8h / 20 sends ≈ 24 min spacing; jitter is bounded by a quarter
        // of the interval, so consecutive gaps stay within ~36 minutes.
        for pair in day_slots.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap <= Duration::minutes(36),
                "gap {gap} is wider than interval plus jitter"
            );
        }
    }
}

#[test]
async fn spread_days_forces_longer_plan() {
    let now = Utc.with_ymd_and_hms(2026, 8, 26, 8, 0, 0).unwrap();
    let slots = plan_slots(10, 20, 4.0, Some(5), 9, 0.25, now);
    assert_eq!(slots.len(), 10);
    let days = by_day(&slots);
    assert_eq!(days.len(), 5, "spread_days must stretch the plan");
    for (_, day_slots) in days {
        assert_eq!(day_slots.len(), 2);
    }
}

#[test]
async fn mid_window_planning_keeps_day_zero_slots_in_the_future() {
    // 13:00 with a 09:00-17:00 window: four hours remain for day zero.
    let now = Utc.with_ymd_and_hms(2026, 8, 26, 13, 0, 0).unwrap();
    let slots = plan_slots(8, 8, 8.0, None, 9, 0.25, now);
    assert_eq!(slots.len(), 8);

    let window_close = Utc.with_ymd_and_hms(2026, 8, 26, 17, 0, 0).unwrap();
    for slot in &slots {
        assert!(*slot >= now, "slot {slot} already elapsed at plan time");
        assert!(*slot < window_close, "slot {slot} falls past the window");
    }

    // The remaining half-window still carries a spread, not a burst.
    let mut sorted = slots.clone();
    sorted.sort();
    assert!(*sorted.last().unwrap() - sorted[0] >= Duration::hours(2));
}

#[test]
async fn planning_starts_tomorrow_when_window_already_closed() {
    let now = Utc.with_ymd_and_hms(2026, 8, 26, 18, 30, 0).unwrap();
    let slots = plan_slots(3, 10, 8.0, None, 9, 0.0, now);
    for slot in slots {
        assert_eq!(slot.date_naive(), now.date_naive() + Duration::days(1));
    }
}

#[test]
async fn schedule_campaign_creates_one_job_per_lead() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 20, 8.0, &[(0, 0), (3, 0)]).await;
    enroll_leads(&ctx, &campaign_id, 100).await;

    let created = ctx
        .scheduler
        .schedule_campaign(&campaign_id, None)
        .await
        .unwrap();
    assert_eq!(created, 100);

    let jobs = ctx.jobs.list_jobs_for_campaign(&campaign_id).await.unwrap();
    assert_eq!(jobs.len(), 100);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Scheduled));
    assert!(jobs.iter().all(|j| j.step_number == 1));

    // Scheduling activates a draft campaign.
    let campaign = ctx.campaigns.get_campaign(&campaign_id).await.unwrap();
    assert_eq!(
        campaign.status,
        crate::models::campaign_model::CampaignStatus::Active
    );
}

#[test]
async fn schedule_campaign_is_idempotent() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[(0, 0)]).await;
    enroll_leads(&ctx, &campaign_id, 7).await;

    assert_eq!(
        ctx.scheduler
            .schedule_campaign(&campaign_id, None)
            .await
            .unwrap(),
        7
    );
    assert_eq!(
        ctx.scheduler
            .schedule_campaign(&campaign_id, None)
            .await
            .unwrap(),
        0,
        "re-planning must skip leads with open jobs"
    );

    let jobs = ctx.jobs.list_jobs_for_campaign(&campaign_id).await.unwrap();
    assert_eq!(jobs.len(), 7);
}

#[test]
async fn scheduling_zero_leads_is_a_noop() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[(0, 0)]).await;

    let created = ctx
        .scheduler
        .schedule_campaign(&campaign_id, None)
        .await
        .unwrap();
    assert_eq!(created, 0);
}

#[test]
async fn campaign_without_steps_is_configuration_error() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[]).await;
    enroll_leads(&ctx, &campaign_id, 2).await;

    let err = ctx
        .scheduler
        .schedule_campaign(&campaign_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}

#[test]
async fn unknown_campaign_is_configuration_error() {
    let ctx = setup().await;
    let err = ctx
        .scheduler
        .schedule_campaign("no-such-campaign", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}

#[test]
async fn invalid_spread_days_is_validation_error() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[(0, 0)]).await;
    let err = ctx
        .scheduler
        .schedule_campaign(&campaign_id, Some(0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
async fn next_step_is_due_after_its_delay() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[(0, 0), (3, 2)]).await;
    enroll_leads(&ctx, &campaign_id, 1).await;
    ctx.scheduler
        .schedule_campaign(&campaign_id, None)
        .await
        .unwrap();

    let first = ctx.jobs.list_jobs_for_campaign(&campaign_id).await.unwrap()[0].clone();

    // Close the first job the way the executor would before handing the
    // lead to the planner again.
    sqlx::query("UPDATE jobs SET status = 'completed' WHERE id = ?1")
        .bind(&first.id)
        .execute(&ctx.pool)
        .await
        .unwrap();

    let completed_at = Utc::now();
    let next_id = ctx
        .scheduler
        .materialize_next_step(&first, completed_at)
        .await
        .unwrap()
        .expect("a second step remains");

    let next = ctx.jobs.get_job(&next_id).await.unwrap();
    assert_eq!(next.step_number, 2);
    assert_eq!(next.status, JobStatus::Scheduled);
    let expected = completed_at + Duration::days(3) + Duration::hours(2);
    let drift = (next.next_processing_time - expected).num_seconds().abs();
    assert!(drift <= 1, "next step due time off by {drift}s");
}

#[test]
async fn last_step_materializes_nothing() {
    let ctx = setup().await;
    let campaign_id = create_campaign(&ctx, 10, 8.0, &[(0, 0)]).await;
    enroll_leads(&ctx, &campaign_id, 1).await;
    ctx.scheduler
        .schedule_campaign(&campaign_id, None)
        .await
        .unwrap();

    let only = ctx.jobs.list_jobs_for_campaign(&campaign_id).await.unwrap()[0].clone();
    sqlx::query("UPDATE jobs SET status = 'completed' WHERE id = ?1")
        .bind(&only.id)
        .execute(&ctx.pool)
        .await
        .unwrap();

    let next = ctx
        .scheduler
        .materialize_next_step(&only, Utc::now())
        .await
        .unwrap();
    assert!(next.is_none());
}
