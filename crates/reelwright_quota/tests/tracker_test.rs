use chrono::{Duration, TimeZone, Utc};
use reelwright_core::ManualClock;
use reelwright_quota::{Period, QuotaLimit, QuotaTracker};
use std::collections::BTreeMap;
use std::sync::Arc;

fn limits(entries: &[(&str, Period, u64)]) -> BTreeMap<String, QuotaLimit> {
    entries
        .iter()
        .map(|(p, period, limit)| (p.to_string(), QuotaLimit::new(*period, *limit)))
        .collect()
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 22, 0, 0).unwrap())
}

#[tokio::test]
async fn test_reserve_commit_release_cycle() {
    let clock = clock();
    let tracker = QuotaTracker::in_memory(
        limits(&[("google_tts", Period::Monthly, 1000)]),
        Arc::new(clock),
    );

    let reservation = tracker.reserve("google_tts", 400).await.expect("fits");
    assert_eq!(tracker.remaining("google_tts").await, Some(600));
    tracker.commit(reservation, 350).await.expect("commit");
    assert_eq!(tracker.remaining("google_tts").await, Some(650));

    let reservation = tracker.reserve("google_tts", 600).await.expect("fits");
    tracker.release(reservation).await;
    assert_eq!(tracker.remaining("google_tts").await, Some(650));

    let snapshot = tracker.snapshot().await;
    assert_eq!(*snapshot.entry("google_tts").expect("entry").consumed(), 350);
}

#[tokio::test]
async fn test_over_budget_reservation_rejected() {
    let tracker = QuotaTracker::in_memory(
        limits(&[("youtube", Period::Daily, 1)]),
        Arc::new(clock()),
    );
    let held = tracker.reserve("youtube", 1).await.expect("fits");

    // Outstanding reservations count against the budget.
    let err = tracker.reserve("youtube", 1).await.expect_err("over budget");
    assert!(err.is_exceeded());

    tracker.commit(held, 1).await.expect("commit");
    assert!(tracker.reserve("youtube", 1).await.is_err());
    assert_eq!(tracker.remaining("youtube").await, Some(0));
}

#[tokio::test]
async fn test_zero_limit_rejects_everything() {
    let tracker = QuotaTracker::in_memory(
        limits(&[("youtube", Period::Daily, 0)]),
        Arc::new(clock()),
    );
    assert!(tracker.reserve("youtube", 1).await.is_err());
}

#[tokio::test]
async fn test_commit_clamps_at_limit() {
    let tracker = QuotaTracker::in_memory(
        limits(&[("google_tts", Period::Daily, 100)]),
        Arc::new(clock()),
    );
    let reservation = tracker.reserve("google_tts", 90).await.expect("fits");
    tracker.commit(reservation, 150).await.expect("commit");
    let snapshot = tracker.snapshot().await;
    let entry = snapshot.entry("google_tts").expect("entry");
    assert_eq!(*entry.consumed(), 100);
    assert!(entry.consumed() <= entry.limit());
}

#[tokio::test]
async fn test_unmetered_provider_always_reserves() {
    let tracker = QuotaTracker::in_memory(BTreeMap::new(), Arc::new(clock()));
    let reservation = tracker.reserve("pexels", 1_000_000).await.expect("unmetered");
    assert!(!reservation.is_metered());
    tracker.commit(reservation, 1_000_000).await.expect("commit");
    assert_eq!(tracker.remaining("pexels").await, None);
}

#[tokio::test]
async fn test_daily_rollover_is_lazy() {
    let clock = clock();
    let tracker = QuotaTracker::in_memory(
        limits(&[("youtube", Period::Daily, 2)]),
        Arc::new(clock.clone()),
    );
    for _ in 0..2 {
        let r = tracker.reserve("youtube", 1).await.expect("fits");
        tracker.commit(r, 1).await.expect("commit");
    }
    assert!(tracker.reserve("youtube", 1).await.is_err());

    // 22:00 + 1h crosses UTC midnight.
    clock.advance(Duration::hours(1));
    let r = tracker.reserve("youtube", 1).await.expect("new period");
    tracker.commit(r, 1).await.expect("commit");
    let snapshot = tracker.snapshot().await;
    let entry = snapshot.entry("youtube").expect("entry");
    assert_eq!(*entry.consumed(), 1);
    assert_eq!(
        *entry.period_start(),
        Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_monthly_period_alignment() {
    let at = Utc.with_ymd_and_hms(2026, 1, 31, 12, 30, 0).unwrap();
    let start = Period::Monthly.start_of(at);
    assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(
        Period::Monthly.next_start(start),
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_ledger_survives_restart_and_limits_override() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("quota.json");
    let clock = Arc::new(clock());

    {
        let tracker = QuotaTracker::open(
            &path,
            limits(&[("google_tts", Period::Monthly, 1000), ("youtube", Period::Daily, 6)]),
            clock.clone(),
        )
        .await
        .expect("open");
        let r = tracker.reserve("google_tts", 300).await.expect("fits");
        tracker.commit(r, 300).await.expect("commit");
    }

    let tracker = QuotaTracker::open(
        &path,
        limits(&[("google_tts", Period::Monthly, 500)]),
        clock.clone(),
    )
    .await
    .expect("reopen");
    assert_eq!(tracker.remaining("google_tts").await, Some(200));
    // Dropped from configuration means unmetered.
    assert_eq!(tracker.remaining("youtube").await, None);
}
