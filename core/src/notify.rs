//! Expiry notifications emitted by the auto-deactivation scheduler.
//!
//! Notifications are advisory. The audit log is the record of what happened;
//! these exist so on-call staff hear about a halt before it lapses.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use bastion_types::{CrisisLevel, KillSwitch, KillSwitchId, TargetKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExpiryNotice {
    /// A kill switch has reached its warning point and will be lifted at
    /// `auto_deactivate_at` unless someone acts.
    Warning {
        kill_switch_id: KillSwitchId,
        kind: TargetKind,
        target: String,
        level: CrisisLevel,
        drill: bool,
        auto_deactivate_at: DateTime<Utc>,
    },
    /// A kill switch was lifted by the scheduler.
    ForcedDeactivation {
        kill_switch_id: KillSwitchId,
        kind: TargetKind,
        target: String,
        level: CrisisLevel,
        drill: bool,
        deactivated_at: DateTime<Utc>,
    },
}

impl ExpiryNotice {
    #[must_use]
    pub fn warning(ks: &KillSwitch, auto_deactivate_at: DateTime<Utc>) -> Self {
        Self::Warning {
            kill_switch_id: ks.id,
            kind: ks.kind,
            target: ks.target.clone(),
            level: ks.level,
            drill: ks.drill,
            auto_deactivate_at,
        }
    }

    #[must_use]
    pub fn forced(ks: &KillSwitch, deactivated_at: DateTime<Utc>) -> Self {
        Self::ForcedDeactivation {
            kill_switch_id: ks.id,
            kind: ks.kind,
            target: ks.target.clone(),
            level: ks.level,
            drill: ks.drill,
            deactivated_at,
        }
    }

    #[must_use]
    pub fn kill_switch_id(&self) -> KillSwitchId {
        match self {
            Self::Warning { kill_switch_id, .. }
            | Self::ForcedDeactivation { kill_switch_id, .. } => *kill_switch_id,
        }
    }

    /// One-line human-readable rendering.
    #[must_use]
    pub fn format(&self) -> String {
        match self {
            Self::Warning {
                kind,
                target,
                level,
                auto_deactivate_at,
                ..
            } => format!(
                "[Crisis: {level} kill-switch on {kind}:{target} auto-deactivates at {}]",
                auto_deactivate_at.to_rfc3339()
            ),
            Self::ForcedDeactivation {
                kind,
                target,
                level,
                ..
            } => format!("[Crisis: {level} kill-switch on {kind}:{target} auto-deactivated]"),
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: ExpiryNotice);
}

/// Renders notices as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notice: ExpiryNotice) {
        tracing::warn!(kill_switch = %notice.kill_switch_id(), "{}", notice.format());
    }
}

/// Queue of undelivered notices, drained by whatever relays them.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    pending: Mutex<Vec<ExpiryNotice>>,
}

impl NotificationQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all pending notices, in the order they were raised.
    pub fn take(&self) -> Vec<ExpiryNotice> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for NotificationQueue {
    fn notify(&self, notice: ExpiryNotice) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        // Deduplicate: don't add if already present
        if !pending.contains(&notice) {
            pending.push(notice);
        }
    }
}
