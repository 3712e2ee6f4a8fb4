//! Vigil - Forecast Lifecycle & Governance backend - Entry Point

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{error, info, warn};
use uuid::Uuid;

use vigil_app::{respond, AppConfig, AppError, Application};
use vigil_core::{EvaluationStatus, GovernanceMode, Horizon, Preset, Price, Role};
use vigil_scheduler::{RunStatus, Trigger};

/// Vigil forecast lifecycle and governance backend
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via VIGIL_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler daemon (daily pipeline + tracker cadence)
    Run,
    /// Run the daily pipeline once and exit
    Daily,
    /// Resolve due snapshots once
    Resolve {
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Write the day's snapshots for a symbol
    Snapshot {
        #[arg(long)]
        symbol: String,
        /// Day bucket, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        as_of: Option<String>,
    },
    /// List stored snapshots
    Snapshots {
        #[arg(long)]
        symbol: Option<String>,
        /// PENDING or RESOLVED
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Query cohort statistics
    Stats {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        horizon: String,
        #[arg(long, default_value = "BALANCED")]
        preset: String,
        #[arg(long, default_value = "ACTIVE")]
        role: String,
        #[arg(long)]
        window: Option<usize>,
    },
    /// Query drift comparisons for a symbol
    Drift {
        #[arg(long)]
        symbol: String,
        /// Restrict to one horizon (e.g. "30d")
        #[arg(long)]
        horizon: Option<String>,
    },
    /// Governance state and overrides
    Governance {
        #[command(subcommand)]
        command: GovernanceCommand,
    },
    /// Scheduler administration
    Scheduler {
        #[command(subcommand)]
        command: SchedulerCommand,
    },
    /// Ingest a daily close bar into the price oracle
    Bar {
        #[arg(long)]
        symbol: String,
        /// Bar day, YYYY-MM-DD
        #[arg(long)]
        date: String,
        #[arg(long)]
        close: String,
    },
}

#[derive(Subcommand, Debug)]
enum GovernanceCommand {
    Get {
        #[arg(long)]
        symbol: String,
    },
    Override {
        #[arg(long)]
        symbol: String,
        /// NORMAL, PROTECTION, FROZEN_ONLY, or HALT
        #[arg(long)]
        mode: String,
        #[arg(long, default_value = "admin")]
        actor: String,
    },
}

#[derive(Subcommand, Debug)]
enum SchedulerCommand {
    Enable {
        #[arg(long)]
        job: String,
    },
    Disable {
        #[arg(long)]
        job: String,
    },
    RunNow {
        #[arg(long)]
        job: String,
    },
}

fn parse_day(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| AppError::Config(format!("invalid date '{raw}': {e}")))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc())
}

fn parse_preset(raw: &str) -> Result<Preset, AppError> {
    match raw.to_ascii_uppercase().as_str() {
        "CONSERVATIVE" => Ok(Preset::Conservative),
        "BALANCED" => Ok(Preset::Balanced),
        "AGGRESSIVE" => Ok(Preset::Aggressive),
        other => Err(AppError::Config(format!("unknown preset: {other}"))),
    }
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    match raw.to_ascii_uppercase().as_str() {
        "ACTIVE" => Ok(Role::Active),
        "SHADOW" => Ok(Role::Shadow),
        other => Err(AppError::Config(format!("unknown role: {other}"))),
    }
}

fn parse_mode(raw: &str) -> Result<GovernanceMode, AppError> {
    match raw.to_ascii_uppercase().as_str() {
        "NORMAL" => Ok(GovernanceMode::Normal),
        "PROTECTION" => Ok(GovernanceMode::Protection),
        "FROZEN_ONLY" => Ok(GovernanceMode::FrozenOnly),
        "HALT" => Ok(GovernanceMode::Halt),
        other => Err(AppError::Config(format!("unknown governance mode: {other}"))),
    }
}

fn parse_status(raw: &str) -> Result<EvaluationStatus, AppError> {
    match raw.to_ascii_uppercase().as_str() {
        "PENDING" => Ok(EvaluationStatus::Pending),
        "RESOLVED" => Ok(EvaluationStatus::Resolved),
        other => Err(AppError::Config(format!("unknown status: {other}"))),
    }
}

fn print_json(value: serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
}

/// Exit codes: 0 success, 1 partial failure, 2 hard failure (lease or
/// store), 3 misconfiguration.
fn exit_code_for(err: &AppError) -> u8 {
    match vigil_app::error_code(err) {
        "misconfiguration" | "contract_violation" => 3,
        "concurrency" | "fatal" => 2,
        _ => 1,
    }
}

async fn run_daemon(app: &Application) -> Result<()> {
    let tracker_interval = app.config().schedule.tracker_interval_secs;
    let mut scheduler_tick = tokio::time::interval(std::time::Duration::from_secs(60));
    let mut tracker_tick = tokio::time::interval(std::time::Duration::from_secs(tracker_interval));
    let owner = format!("daemon-{}", Uuid::new_v4());

    info!(owner = %owner, "daemon started");
    loop {
        tokio::select! {
            _ = scheduler_tick.tick() => {
                let due = app.scheduler().due_jobs(Utc::now());
                for job_id in due {
                    if job_id != "daily-run" {
                        continue;
                    }
                    match app.pipeline().run(Trigger::Cron, &owner).await {
                        Ok(run) => info!(run_id = %run.run_id, status = %run.status, "scheduled pipeline run"),
                        Err(err) => warn!(%err, "scheduled pipeline run failed"),
                    }
                }
            }
            _ = tracker_tick.tick() => {
                match app.outcome_resolve_due(None).await {
                    Ok(report) if report.processed > 0 => {
                        info!(processed = report.processed, "tracker tick resolved outcomes");
                    }
                    Ok(_) => {}
                    Err(err) => warn!(%err, "tracker tick failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}

async fn dispatch(app: &Application, command: Command) -> u8 {
    match command {
        Command::Run => match run_daemon(app).await {
            Ok(()) => 0,
            Err(err) => {
                error!(%err, "daemon failed");
                2
            }
        },
        Command::Daily => {
            let owner = format!("cli-{}", Uuid::new_v4());
            match app.pipeline().run(Trigger::Manual, &owner).await {
                Ok(run) => {
                    print_json(respond::<vigil_scheduler::JobRun>(Ok(run.clone())));
                    match run.status {
                        RunStatus::Success => 0,
                        _ => 1,
                    }
                }
                Err(err) => {
                    let app_err = AppError::from(err);
                    let code = exit_code_for(&app_err);
                    print_json(respond::<()>(Err(app_err)));
                    code
                }
            }
        }
        Command::Resolve { symbol } => {
            let result = app.outcome_resolve_due(symbol.as_deref()).await;
            finish(result)
        }
        Command::Snapshot { symbol, as_of } => {
            let as_of = match as_of.as_deref().map(parse_day).transpose() {
                Ok(parsed) => parsed,
                Err(err) => return finish::<()>(Err(err)),
            };
            let result = app.snapshot_create(&symbol, &[], &[], &[], as_of).await;
            finish(result)
        }
        Command::Snapshots {
            symbol,
            status,
            limit,
        } => {
            let status = match status.as_deref().map(parse_status).transpose() {
                Ok(parsed) => parsed,
                Err(err) => return finish::<()>(Err(err)),
            };
            finish(app.snapshot_list(symbol.as_deref(), status, limit))
        }
        Command::Stats {
            symbol,
            horizon,
            preset,
            role,
            window,
        } => {
            let parsed = Horizon::from_str(&horizon)
                .map_err(AppError::from)
                .and_then(|h| Ok((h, parse_preset(&preset)?, parse_role(&role)?)));
            match parsed {
                Ok((horizon, preset, role)) => {
                    finish(app.stats_query(&symbol, horizon, preset, role, window))
                }
                Err(err) => finish::<()>(Err(err)),
            }
        }
        Command::Drift { symbol, horizon } => {
            let scope = match horizon
                .as_deref()
                .map(Horizon::from_str)
                .transpose()
                .map_err(AppError::from)
            {
                Ok(scope) => scope,
                Err(err) => return finish::<()>(Err(err)),
            };
            finish(app.drift_query(&symbol, scope))
        }
        Command::Governance { command } => match command {
            GovernanceCommand::Get { symbol } => finish(app.governance_get(&symbol)),
            GovernanceCommand::Override {
                symbol,
                mode,
                actor,
            } => match parse_mode(&mode) {
                Ok(mode) => finish(app.governance_override(&symbol, mode, &actor)),
                Err(err) => finish::<()>(Err(err)),
            },
        },
        Command::Scheduler { command } => match command {
            SchedulerCommand::Enable { job } => finish(app.scheduler_enable(&job)),
            SchedulerCommand::Disable { job } => finish(app.scheduler_disable(&job)),
            SchedulerCommand::RunNow { job } => {
                finish(app.scheduler_run_now(&job, Trigger::Manual).await)
            }
        },
        Command::Bar {
            symbol,
            date,
            close,
        } => {
            let result = (|| -> Result<String, AppError> {
                let symbol = vigil_core::Symbol::new(&symbol)?;
                let day = parse_day(&date)?;
                let close = Price::from_str(&close)
                    .map_err(|e| AppError::Config(format!("invalid close: {e}")))?;
                app.ingest_bar(&symbol, day, close);
                Ok(format!("bar ingested for {} at {}", symbol, date))
            })();
            finish(result)
        }
    }
}

/// Print the envelope and derive the exit code.
fn finish<T: serde::Serialize>(result: Result<T, AppError>) -> u8 {
    let code = match &result {
        Ok(_) => 0,
        Err(err) => exit_code_for(err),
    };
    print_json(respond(result));
    code
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    vigil_telemetry::init_logging()?;
    info!("Starting Vigil v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "configuration error");
            return Ok(ExitCode::from(3));
        }
    };

    let app = match Application::new(config) {
        Ok(app) => app,
        Err(err) => {
            error!(%err, "failed to build application");
            return Ok(ExitCode::from(exit_code_for(&err)));
        }
    };

    let code = dispatch(&app, args.command).await;
    Ok(ExitCode::from(code))
}
