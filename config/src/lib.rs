//! Configuration for Bastion.
//!
//! Loaded from `~/.bastion/config.toml` (or the path in `BASTION_CONFIG`).
//! Every section is optional; absent values fall back to the built-in
//! policy.
//!
//! ```toml
//! [approvals]
//! window_minutes = 15
//!
//! [scheduler]
//! poll_interval_secs = 60
//! auto_escalate = false
//!
//! [audit]
//! path = "${HOME}/.bastion/audit.jsonl"
//!
//! [logging]
//! filter = "info"
//!
//! [auto_deactivation.red]
//! max_hours = 24
//! warn_at_hours = 12
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use bastion_types::{AutoDeactivationPolicy, AutoDeactivationTable, CrisisLevel, InvalidPolicyError};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "BASTION_CONFIG";

const DEFAULT_APPROVAL_WINDOW_MINUTES: u32 = 15;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Invalid { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BastionConfig {
    pub approvals: Option<ApprovalsConfig>,
    pub scheduler: Option<SchedulerConfig>,
    pub audit: Option<AuditConfig>,
    pub logging: Option<LoggingConfig>,
    pub auto_deactivation: Option<AutoDeactivationOverrides>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApprovalsConfig {
    /// Minutes a first dual-key approval waits for its second key.
    pub window_minutes: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between expiry sweeps. Must be between 1 and 60.
    pub poll_interval_secs: Option<u64>,
    /// Follow timed escalation edges automatically. Default: false.
    #[serde(default)]
    pub auto_escalate: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditConfig {
    /// JSONL audit log location. `${VAR}` references are expanded.
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when no env filter is set.
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PolicyOverride {
    pub max_hours: u32,
    pub warn_at_hours: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoDeactivationOverrides {
    pub yellow: Option<PolicyOverride>,
    pub orange: Option<PolicyOverride>,
    pub red: Option<PolicyOverride>,
    pub black: Option<PolicyOverride>,
}

impl AutoDeactivationOverrides {
    fn entries(&self) -> [(CrisisLevel, Option<PolicyOverride>); 4] {
        [
            (CrisisLevel::Yellow, self.yellow),
            (CrisisLevel::Orange, self.orange),
            (CrisisLevel::Red, self.red),
            (CrisisLevel::Black, self.black),
        ]
    }
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                out.push_str(&env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            // Unclosed or empty reference: keep it literally.
            _ => {
                out.push_str("${");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

impl BastionConfig {
    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        let config: Self = match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.approvals.as_ref().and_then(|a| a.window_minutes) == Some(0) {
            return Err(ConfigError::Invalid {
                message: "approvals.window_minutes must be positive".to_string(),
            });
        }
        if let Some(secs) = self.scheduler.as_ref().and_then(|s| s.poll_interval_secs)
            && !(1..=60).contains(&secs)
        {
            return Err(ConfigError::Invalid {
                message: format!("scheduler.poll_interval_secs must be 1..=60, got {secs}"),
            });
        }
        self.auto_deactivation_table().map(|_| ())
    }

    #[must_use]
    pub fn approval_window_minutes(&self) -> u32 {
        self.approvals
            .as_ref()
            .and_then(|a| a.window_minutes)
            .unwrap_or(DEFAULT_APPROVAL_WINDOW_MINUTES)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.scheduler
                .as_ref()
                .and_then(|s| s.poll_interval_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    #[must_use]
    pub fn auto_escalate(&self) -> bool {
        self.scheduler.as_ref().is_some_and(|s| s.auto_escalate)
    }

    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.filter.as_deref())
            .unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Audit log path: configured (env-expanded) or `<data dir>/audit.jsonl`.
    #[must_use]
    pub fn audit_path(&self) -> PathBuf {
        if let Some(raw) = self.audit.as_ref().and_then(|a| a.path.as_deref()) {
            let expanded = expand_env_vars(raw);
            if !expanded.trim().is_empty() {
                return PathBuf::from(expanded);
            }
        }
        data_dir().join("audit.jsonl")
    }

    /// Built-in policy table with any configured overrides applied.
    pub fn auto_deactivation_table(&self) -> Result<AutoDeactivationTable, ConfigError> {
        let mut table = AutoDeactivationTable::default();
        let Some(overrides) = self.auto_deactivation.as_ref() else {
            return Ok(table);
        };
        for (level, entry) in overrides.entries() {
            let Some(entry) = entry else { continue };
            let policy = AutoDeactivationPolicy::new(entry.max_hours, entry.warn_at_hours).map_err(
                |err: InvalidPolicyError| ConfigError::Invalid {
                    message: format!("auto_deactivation.{}: {err}", level.as_str().to_lowercase()),
                },
            )?;
            table = table.with_override(level, policy);
        }
        Ok(table)
    }
}

impl std::str::FromStr for BastionConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// `$BASTION_CONFIG`, else `~/.bastion/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(explicit) = env::var(CONFIG_ENV_VAR)
        && !explicit.trim().is_empty()
    {
        return Some(PathBuf::from(explicit));
    }
    dirs::home_dir().map(|home| home.join(".bastion").join("config.toml"))
}

fn data_dir() -> PathBuf {
    dirs::home_dir().map_or_else(|| PathBuf::from(".bastion"), |home| home.join(".bastion"))
}
