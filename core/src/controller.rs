//! `CrisisController`: the single logical owner of crisis state.
//!
//! Every mutation takes the state lock, validates, writes its audit entry,
//! and only then commits. Operations live next to the state they touch
//! (`authorizer`, `registry`, `escalation`, `drill`, `scheduler`, `status`);
//! this module holds the shared plumbing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use bastion_config::{BastionConfig, ConfigError};
use bastion_types::{AuditAction, AuditEntry, AutoDeactivationTable, CrisisError};

use crate::audit::AuditSink;
use crate::clock::{Clock, SystemClock};
use crate::notify::{ExpiryNotice, NotificationSink, TracingNotifier};
use crate::state::CrisisState;

const DEFAULT_APPROVAL_WINDOW_MINUTES: i64 = 15;

/// Tunables resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// How long a first dual-key approval waits for its second key.
    pub approval_window: TimeDelta,
    pub auto_deactivation: AutoDeactivationTable,
    /// Let the scheduler follow timed escalation edges on its own.
    pub auto_escalate: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            approval_window: TimeDelta::minutes(DEFAULT_APPROVAL_WINDOW_MINUTES),
            auto_deactivation: AutoDeactivationTable::default(),
            auto_escalate: false,
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &BastionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            approval_window: TimeDelta::minutes(i64::from(config.approval_window_minutes())),
            auto_deactivation: config.auto_deactivation_table()?,
            auto_escalate: config.auto_escalate(),
        })
    }
}

pub struct CrisisController {
    state: Mutex<CrisisState>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    settings: ControllerSettings,
}

impl std::fmt::Debug for CrisisController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrisisController")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CrisisController {
    /// Controller on the wall clock, logging notices through `tracing`.
    #[must_use]
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            state: Mutex::new(CrisisState::new(clock.now())),
            audit,
            clock,
            notifier: Arc::new(TracingNotifier),
            settings: ControllerSettings::default(),
        }
    }

    /// Replace the time source. The crisis state restarts at the new clock's
    /// current instant, so call this before any operation.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.state = Mutex::new(CrisisState::new(clock.now()));
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Most recent audit entries, newest first.
    pub fn audit_trail(&self, limit: usize) -> Result<Vec<AuditEntry>, CrisisError> {
        self.audit.recent(limit).map_err(CrisisError::AuditUnavailable)
    }

    /// Every mutation commits whole after its audit write, so a panic
    /// elsewhere cannot leave the state half-updated.
    pub(crate) fn lock(&self) -> MutexGuard<'_, CrisisState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Append one audit entry. Failure aborts the caller's mutation.
    pub(crate) fn record(
        &self,
        action: AuditAction,
        details: Value,
        at: DateTime<Utc>,
    ) -> Result<AuditEntry, CrisisError> {
        let entry = AuditEntry::new(action, details, at);
        if let Err(err) = self.audit.append(&entry) {
            tracing::error!(action = ?action, error = %err, "Audit write failed; mutation rejected");
            return Err(CrisisError::AuditUnavailable(err));
        }
        Ok(entry)
    }

    pub(crate) fn notify(&self, notice: ExpiryNotice) {
        self.notifier.notify(notice);
    }
}
