//! Lease contention under real concurrency.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use vigil_scheduler::{RunStatus, Scheduler, Trigger};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_exactly_one_worker_wins_the_lease() {
    let scheduler = Arc::new(Scheduler::new());
    scheduler.register_job("daily-run", Some("06:30"), true);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap();

    let mut handles = Vec::new();
    for worker in 0..16 {
        let scheduler = scheduler.clone();
        handles.push(tokio::spawn(async move {
            scheduler.begin(
                "daily-run",
                Trigger::Manual,
                &format!("worker-{worker}"),
                now,
                Duration::minutes(10),
            )
        }));
    }

    let mut winners = Vec::new();
    let mut losers = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(acquired) => winners.push(acquired),
            Err(err) => {
                assert!(err.is_concurrency_loss());
                losers += 1;
            }
        }
    }

    assert_eq!(winners.len(), 1, "exactly one worker must win");
    assert_eq!(losers, 15);

    // Only the winner produced a run record, and it is the only RUNNING one.
    let runs = scheduler.list_runs("daily-run");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Running);
    assert_eq!(runs[0].run_id, winners[0].run_id);

    // After the winner finishes, the lease is free again.
    scheduler
        .finish(&winners[0], RunStatus::Success, Some("done"), now + Duration::minutes(1))
        .unwrap();
    assert!(scheduler
        .begin(
            "daily-run",
            Trigger::Manual,
            "late-worker",
            now + Duration::minutes(2),
            Duration::minutes(10),
        )
        .is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_two_running_runs_across_lease_generations() {
    let scheduler = Arc::new(Scheduler::new());
    scheduler.register_job("outcome-tracker", None, true);
    let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    // Sequential generations with overlapping contention inside each.
    for generation in 0..5 {
        let now = base + Duration::minutes(generation * 20);
        let mut handles = Vec::new();
        for worker in 0..4 {
            let scheduler = scheduler.clone();
            handles.push(tokio::spawn(async move {
                scheduler.begin(
                    "outcome-tracker",
                    Trigger::Cron,
                    &format!("g{generation}-w{worker}"),
                    now,
                    Duration::minutes(10),
                )
            }));
        }

        let mut winner = None;
        for handle in handles {
            if let Ok(acquired) = handle.await.unwrap() {
                assert!(winner.is_none(), "two winners in one generation");
                winner = Some(acquired);
            }
        }

        let running = scheduler
            .list_runs("outcome-tracker")
            .into_iter()
            .filter(|run| run.status == RunStatus::Running)
            .count();
        assert_eq!(running, 1);

        scheduler
            .finish(
                &winner.unwrap(),
                RunStatus::Success,
                None,
                now + Duration::minutes(1),
            )
            .unwrap();
    }

    assert_eq!(scheduler.list_runs("outcome-tracker").len(), 5);
}
