//! End-to-end lifecycle tests through the admin command surface.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use vigil_alerts::RecordingSink;
use vigil_app::{AppConfig, Application};
use vigil_core::{
    Direction, GovernanceMode, Horizon, ModelOutput, Preset, Price, Role, Symbol,
};
use vigil_pipeline::{AlwaysOkIntegrity, FixedModelOutputSource, StaticTailRisk};
use vigil_resolver::{
    DivergenceGrade, FinalAction, GovernanceDirective, HorizonInput, ResolverInput, TailStats,
};
use vigil_scheduler::Trigger;

fn btc() -> Symbol {
    Symbol::new("BTC").unwrap()
}

fn model_output() -> ModelOutput {
    ModelOutput {
        horizon: Horizon::D7,
        preset: Preset::Balanced,
        role: Role::Active,
        direction: Direction::Up,
        confidence: 0.72,
        expected_move_pct: 0.018,
        current_price: Price::from_str("68000").unwrap(),
    }
}

fn build_app() -> (Application, Arc<FixedModelOutputSource>) {
    let source = Arc::new(FixedModelOutputSource::new());
    source.set_outputs(btc(), vec![model_output()]);

    let app = Application::with_ports(
        AppConfig::default(),
        source.clone(),
        Arc::new(AlwaysOkIntegrity::new()),
        Arc::new(StaticTailRisk::new()),
        Arc::new(RecordingSink::new()),
    )
    .unwrap();
    (app, source)
}

#[tokio::test]
async fn test_snapshot_create_is_idempotent() {
    let (app, _source) = build_app();
    let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    let first = app
        .snapshot_create("BTC", &[Horizon::D7], &[], &[], Some(as_of))
        .await
        .unwrap();
    assert_eq!(first.written, 1);
    assert_eq!(first.skipped_duplicate, 0);

    for _ in 0..2 {
        let repeat = app
            .snapshot_create("BTC", &[Horizon::D7], &[], &[], Some(as_of))
            .await
            .unwrap();
        assert_eq!(repeat.written, 0);
        assert_eq!(repeat.skipped_duplicate, 1);
    }

    let snapshots = app.snapshot_list(Some("BTC"), None, 10).unwrap();
    assert_eq!(snapshots.len(), 1);
    let snap = &snapshots[0];
    assert_eq!(
        snap.resolve_at,
        Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap()
    );
    assert_eq!(snap.target_price, Price::from_str("69224.000").unwrap());
}

#[tokio::test]
async fn test_resolve_due_grades_win_and_feeds_stats() {
    let (app, _source) = build_app();
    let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let resolve_day = Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap();

    app.snapshot_create("BTC", &[Horizon::D7], &[], &[], Some(as_of))
        .await
        .unwrap();
    app.ingest_bar(&btc(), resolve_day, Price::from_str("70000").unwrap());

    let report = app.outcome_resolve_due(Some("BTC")).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.wins, 1);
    assert_eq!(report.errors, 0);

    let stats = app
        .stats_query("BTC", Horizon::D7, Preset::Balanced, Role::Active, None)
        .unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.wins, 1);

    // Re-running resolves nothing new and writes no second outcome.
    let repeat = app.outcome_resolve_due(Some("BTC")).await.unwrap();
    assert_eq!(repeat.processed, 0);
    let stats = app
        .stats_query("BTC", Horizon::D7, Preset::Balanced, Role::Active, None)
        .unwrap();
    assert_eq!(stats.total, 1);
}

#[tokio::test]
async fn test_tiny_move_is_draw_and_outside_hit_rate() {
    let (app, _source) = build_app();
    let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let resolve_day = Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap();

    app.snapshot_create("BTC", &[Horizon::D7], &[], &[], Some(as_of))
        .await
        .unwrap();
    // +0.03%: under the draw epsilon.
    app.ingest_bar(&btc(), resolve_day, Price::from_str("68020").unwrap());

    let report = app.outcome_resolve_due(Some("BTC")).await.unwrap();
    assert_eq!(report.draws, 1);

    let stats = app
        .stats_query("BTC", Horizon::D7, Preset::Balanced, Role::Active, None)
        .unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.draws, 1);
    // A draw decides nothing.
    assert!(stats.win_rate.is_none());
}

#[tokio::test]
async fn test_run_now_loser_reports_already_running() {
    let (app, _source) = build_app();

    // Another worker holds the daily lease.
    let held = app
        .scheduler()
        .begin(
            "daily-run",
            Trigger::Manual,
            "other-worker",
            Utc::now(),
            chrono::Duration::minutes(30),
        )
        .unwrap();

    let response = app.scheduler_run_now("daily-run", Trigger::Manual).await.unwrap();
    assert_eq!(response.status, "already-running");
    assert!(response.run.is_none());
    // The loser produced no run record.
    assert_eq!(app.scheduler().list_runs("daily-run").len(), 1);

    app.scheduler()
        .finish(
            &held,
            vigil_scheduler::RunStatus::Success,
            None,
            Utc::now(),
        )
        .unwrap();

    let response = app.scheduler_run_now("daily-run", Trigger::Manual).await.unwrap();
    assert_eq!(response.status, "completed");
    assert!(response.run.is_some());
}

#[tokio::test]
async fn test_resolver_query_respects_governance_halt() {
    let (app, _source) = build_app();

    app.governance_override("BTC", GovernanceMode::Halt, "ops").unwrap();

    let input = ResolverInput {
        horizons: vec![
            HorizonInput {
                horizon: Horizon::D7,
                signed_edge: 0.8,
                confidence: 0.9,
                reliability: 0.9,
                phase_risk: 0.0,
                blockers: Vec::new(),
            },
            HorizonInput {
                horizon: Horizon::D365,
                signed_edge: 0.6,
                confidence: 0.8,
                reliability: 0.85,
                phase_risk: 0.0,
                blockers: Vec::new(),
            },
        ],
        entropy: 0.0,
        tail: TailStats::default(),
        flags: Vec::new(),
        divergence_grade: DivergenceGrade::B,
        external_modifiers: Vec::new(),
        // Overwritten by the live governance state.
        governance: GovernanceDirective::normal(),
        role: Role::Active,
        policy_hash: "policy-default".to_string(),
    };

    let decision = app.resolver_query("BTC", input.clone()).unwrap();
    assert_eq!(decision.action, FinalAction::Avoid);
    assert_eq!(decision.size_multiplier, 0.0);
    assert_eq!(decision.explain, vec!["governance HALT forces AVOID".to_string()]);

    // Back to NORMAL: the same input trades.
    app.governance_override("BTC", GovernanceMode::Normal, "ops").unwrap();
    let decision = app.resolver_query("BTC", input).unwrap();
    assert_eq!(decision.action, FinalAction::Buy);
    assert!(decision.size_multiplier > 0.0);
}

#[tokio::test]
async fn test_governance_override_audit_trail() {
    let (app, _source) = build_app();

    let state = app.governance_override("BTC", GovernanceMode::Halt, "ops").unwrap();
    assert_eq!(state.mode, GovernanceMode::Halt);
    assert_eq!(state.history.len(), 1);
    assert!(state.history[0].reason.contains("ops"));

    let fetched = app.governance_get("BTC").unwrap();
    assert_eq!(fetched.mode, GovernanceMode::Halt);
}

#[tokio::test]
async fn test_unknown_symbol_is_contract_violation() {
    let (app, _source) = build_app();
    let err = app.governance_get("DOGE").unwrap_err();
    assert_eq!(vigil_app::error_code(&err), "contract_violation");
}

#[tokio::test]
async fn test_drift_query_on_fresh_state() {
    let (app, _source) = build_app();
    let report = app.drift_query("BTC", None).unwrap();
    assert!(report.per_comparison.is_empty());
    assert_eq!(
        report.overall_severity,
        vigil_quality::DriftSeverity::Ok
    );
}
