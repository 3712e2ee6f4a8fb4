//! Application configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vigil_alerts::AlertPolicyConfig;
use vigil_core::Symbol;
use vigil_governance::GovernanceConfig;
use vigil_quality::{DriftThresholds, QualityConfig};
use vigil_resolver::ResolverConfig;
use vigil_stats::StatsConfig;
use vigil_tracker::TrackerConfig;

use crate::error::{AppError, AppResult};

/// Pipeline scheduling section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Daily pipeline schedule, "HH:MM" UTC.
    #[serde(default = "default_daily_schedule")]
    pub daily_utc: String,
    /// Pipeline lease duration in minutes.
    #[serde(default = "default_pipeline_lease_minutes")]
    pub pipeline_lease_minutes: i64,
    /// Tracker cadence in seconds for the daemon loop.
    #[serde(default = "default_tracker_interval_secs")]
    pub tracker_interval_secs: u64,
    /// Outcome-resolution time budget per pipeline run, seconds.
    #[serde(default = "default_tracker_budget_secs")]
    pub tracker_budget_secs: i64,
}

fn default_daily_schedule() -> String {
    "05:30".to_string()
}

fn default_pipeline_lease_minutes() -> i64 {
    30
}

fn default_tracker_interval_secs() -> u64 {
    300
}

fn default_tracker_budget_secs() -> i64 {
    120
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_utc: default_daily_schedule(),
            pipeline_lease_minutes: default_pipeline_lease_minutes(),
            tracker_interval_secs: default_tracker_interval_secs(),
            tracker_budget_secs: default_tracker_budget_secs(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Symbols driven by the daily pipeline.
    pub symbols: Vec<String>,
    /// Opaque tag of the parameter set producing snapshots.
    #[serde(default = "default_policy_hash")]
    pub policy_hash: String,
    #[serde(default = "default_engine_version")]
    pub engine_version: String,
    /// Journal output directory; `None` disables journaling.
    #[serde(default)]
    pub journal_dir: Option<String>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub drift: DriftThresholds,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub alerts: AlertPolicyConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

fn default_policy_hash() -> String {
    "policy-default".to_string()
}

fn default_engine_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC".to_string()],
            policy_hash: default_policy_hash(),
            engine_version: default_engine_version(),
            journal_dir: None,
            schedule: ScheduleConfig::default(),
            tracker: TrackerConfig::default(),
            stats: StatsConfig::default(),
            quality: QualityConfig::default(),
            drift: DriftThresholds::default(),
            governance: GovernanceConfig::default(),
            alerts: AlertPolicyConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration: `VIGIL_CONFIG` env var, falling back to
    /// `config/default.toml`, falling back to defaults.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("VIGIL_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the loaded configuration.
    pub fn validate(&self) -> AppResult<()> {
        if self.symbols.is_empty() {
            return Err(AppError::Config("no symbols configured".to_string()));
        }
        for raw in &self.symbols {
            Symbol::new(raw).map_err(|e| AppError::Config(e.to_string()))?;
        }
        if self.policy_hash.trim().is_empty() {
            return Err(AppError::Config("policy_hash must not be empty".to_string()));
        }
        if self.schedule.pipeline_lease_minutes <= 0 {
            return Err(AppError::Config(
                "pipeline_lease_minutes must be positive".to_string(),
            ));
        }
        if self.tracker.batch_size == 0 {
            return Err(AppError::Config("tracker batch_size must be positive".to_string()));
        }
        Ok(())
    }

    /// Parsed, validated symbols.
    pub fn parsed_symbols(&self) -> AppResult<Vec<Symbol>> {
        self.symbols
            .iter()
            .map(|raw| Symbol::new(raw).map_err(AppError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.parsed_symbols().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: AppConfig = toml::from_str(r#"symbols = ["BTC", "ETH"]"#).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.symbols.len(), 2);
        assert_eq!(config.schedule.daily_utc, "05:30");
        assert_eq!(config.tracker.batch_size, 200);
    }

    #[test]
    fn test_parse_sections() {
        let raw = r#"
symbols = ["BTC"]
policy_hash = "policy-v3"

[schedule]
daily_utc = "04:00"

[alerts]
quota_per_window = 5

[governance]
recovery_days = 5
"#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.policy_hash, "policy-v3");
        assert_eq!(config.schedule.daily_utc, "04:00");
        assert_eq!(config.alerts.quota_per_window, 5);
        assert_eq!(config.governance.recovery_days, 5);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let empty: AppConfig = toml::from_str("symbols = []").unwrap();
        assert!(empty.validate().is_err());

        let bad_symbol: AppConfig = toml::from_str(r#"symbols = ["BTC/USD"]"#).unwrap();
        assert!(bad_symbol.validate().is_err());
    }
}
