//! Read-only queries: status snapshots, halt checks and the static catalogues.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bastion_types::{
    AutoDeactivationPolicy, CrisisLevel, ESCALATION_MATRIX, EscalationRule, KillSwitch,
    LevelInfo, PLAYBOOKS, PendingApproval, Playbook, TargetKind,
};

use crate::controller::CrisisController;
use crate::drill::DrillSession;

/// Point-in-time view of the crisis state, rebuilt on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub level: LevelInfo,
    pub level_since: DateTime<Utc>,
    pub drill_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drill: Option<DrillSession>,
    pub active_kill_switches: Vec<KillSwitch>,
    pub pending_approvals: Vec<PendingApproval>,
    pub auto_deactivation: Option<AutoDeactivationPolicy>,
    pub generated_at: DateTime<Utc>,
}

impl CrisisController {
    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        let state = self.lock();
        let now = self.now();
        StatusSnapshot {
            level: LevelInfo::of(state.level),
            level_since: state.level_since,
            drill_mode: state.drill_mode(),
            drill: state.drill.clone(),
            active_kill_switches: state.registry.snapshot(),
            pending_approvals: state.approvals.live_snapshot(now),
            auto_deactivation: self.settings().auto_deactivation.policy(state.level),
            generated_at: now,
        }
    }

    /// Whether enforcement should block `target` of `kind`. Drill switches
    /// never count. `target` is trimmed the same way activation trims it.
    #[must_use]
    pub fn is_halted(&self, kind: TargetKind, target: &str) -> bool {
        self.lock().registry.is_halted(kind, target.trim())
    }

    #[must_use]
    pub fn current_level(&self) -> CrisisLevel {
        self.lock().level
    }

    /// Effective policies, built-ins merged with configured overrides.
    #[must_use]
    pub fn auto_deactivation_policies(&self) -> Vec<(CrisisLevel, AutoDeactivationPolicy)> {
        self.settings().auto_deactivation.entries().collect()
    }
}

#[must_use]
pub fn escalation_matrix() -> &'static [EscalationRule] {
    ESCALATION_MATRIX
}

#[must_use]
pub fn playbooks() -> &'static [Playbook] {
    PLAYBOOKS
}

#[must_use]
pub fn levels() -> Vec<LevelInfo> {
    CrisisLevel::ALL.into_iter().map(LevelInfo::of).collect()
}
