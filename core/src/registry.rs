//! Kill-switch registry: the authoritative active set.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use bastion_types::{
    ActorId, Approver, AuditAction, Authority, CrisisError, CrisisLevel, DEACTIVATION_ROLES,
    HaltTarget, KillSwitch, KillSwitchId, KillSwitchStatus, PendingApproval, Role, TargetKind,
};

use crate::controller::CrisisController;
use crate::state::CrisisState;

#[derive(Debug, Default)]
pub(crate) struct KillSwitchRegistry {
    active: BTreeMap<KillSwitchId, KillSwitch>,
    /// Switches whose expiry warning has already gone out.
    warned: HashSet<KillSwitchId>,
}

impl KillSwitchRegistry {
    pub(crate) fn insert(&mut self, ks: KillSwitch) {
        self.active.insert(ks.id, ks);
    }

    pub(crate) fn remove(&mut self, id: KillSwitchId) -> Option<KillSwitch> {
        self.warned.remove(&id);
        self.active.remove(&id)
    }

    pub(crate) fn get(&self, id: KillSwitchId) -> Option<&KillSwitch> {
        self.active.get(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn is_halted(&self, kind: TargetKind, target: &str) -> bool {
        self.active.values().any(|ks| ks.halts(kind, target))
    }

    /// Highest level among active switches, ignoring drill switches when
    /// `include_drill` is false.
    pub(crate) fn highest_level(&self, include_drill: bool) -> Option<CrisisLevel> {
        self.active
            .values()
            .filter(|ks| include_drill || !ks.drill)
            .map(|ks| ks.level)
            .max()
    }

    pub(crate) fn drill_ids(&self) -> Vec<KillSwitchId> {
        self.active
            .values()
            .filter(|ks| ks.drill)
            .map(|ks| ks.id)
            .collect()
    }

    pub(crate) fn is_warned(&self, id: KillSwitchId) -> bool {
        self.warned.contains(&id)
    }

    pub(crate) fn mark_warned(&mut self, id: KillSwitchId) {
        if self.active.contains_key(&id) {
            self.warned.insert(id);
        }
    }

    /// Active switches, oldest activation first.
    pub(crate) fn snapshot(&self) -> Vec<KillSwitch> {
        let mut switches: Vec<KillSwitch> = self.active.values().cloned().collect();
        switches.sort_by(|a, b| {
            a.activated_at
                .cmp(&b.activated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        switches
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &KillSwitch> {
        self.active.values()
    }
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReceipt {
    pub kill_switch: KillSwitch,
    pub crisis_level: CrisisLevel,
    pub message: String,
}

/// Result of a successful deactivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeactivationReceipt {
    pub kill_switch: KillSwitch,
    pub crisis_level: CrisisLevel,
    pub remaining_active: usize,
}

/// Level after removing switches: MONITOR once nothing is active, otherwise
/// unchanged.
pub(crate) fn level_after_removal(state: &CrisisState, remaining: usize) -> CrisisLevel {
    if remaining == 0 {
        CrisisLevel::Monitor
    } else {
        state.level
    }
}

impl CrisisController {
    /// Create the switch, audit it, and only then commit it.
    ///
    /// Callers have already enforced role eligibility and the approver count;
    /// `approval` is the dual-key entry this activation completes, if any.
    pub(crate) fn commit_activation(
        &self,
        state: &mut CrisisState,
        target: &HaltTarget,
        reason: &str,
        initiator: Approver,
        approval: Option<&PendingApproval>,
        now: DateTime<Utc>,
    ) -> Result<ActivationReceipt, CrisisError> {
        let level = target.kind().min_level();
        let approvals: Vec<Approver> = approval
            .map(|a| a.first_approver.clone())
            .into_iter()
            .chain(std::iter::once(initiator.clone()))
            .collect();
        debug_assert!(approvals.len() >= usize::from(level.required_approvers()));
        let drill = state.drill_mode();
        let auto_deactivate_at = match self.settings().auto_deactivation.policy(level) {
            Some(policy) => Some(
                now.checked_add_signed(policy.max_duration())
                    .ok_or(CrisisError::DeadlineOutOfRange { level })?,
            ),
            None => None,
        };
        let ks = KillSwitch {
            id: KillSwitchId::new(),
            kind: target.kind(),
            target: target.name().to_string(),
            level,
            reason: reason.to_string(),
            activated_by: initiator.user,
            activated_by_role: initiator.role,
            approvals,
            activated_at: now,
            status: KillSwitchStatus::Active,
            drill,
            auto_deactivate_at,
            deactivated_by: None,
            deactivated_at: None,
            deactivation_reason: None,
        };
        let next_level = state.level.max(level);

        self.record(
            AuditAction::KillSwitchActivated,
            json!({
                "kill_switch": ks,
                "approval": approval,
                "previous_level": state.level,
                "crisis_level": next_level,
            }),
            now,
        )?;

        state.registry.insert(ks.clone());
        state.set_level(next_level, now);

        let message = if drill {
            format!("[DRILL] Kill-switch simulated for {target}")
        } else {
            format!("Kill-switch ACTIVE for {target}. Crisis level: {next_level}")
        };
        tracing::info!(
            kill_switch = %ks.id,
            halt = %target,
            level = %next_level,
            drill,
            "Kill switch activated"
        );

        Ok(ActivationReceipt {
            kill_switch: ks,
            crisis_level: next_level,
            message,
        })
    }

    /// Lift an active kill switch.
    ///
    /// Only `super_admin` and `platform_security` may deactivate. When the
    /// last active switch is lifted the level returns to MONITOR.
    pub fn deactivate(
        &self,
        id: KillSwitchId,
        actor: &ActorId,
        reason: &str,
        role: Role,
    ) -> Result<DeactivationReceipt, CrisisError> {
        if !DEACTIVATION_ROLES.contains(&role) {
            tracing::warn!(actor = %actor, role = %role, kill_switch = %id, "Deactivation rejected: role not authorized");
            return Err(CrisisError::RoleNotAuthorized {
                role,
                authority: Authority::Deactivation,
                allowed: DEACTIVATION_ROLES.to_vec(),
            });
        }

        let mut state = self.lock();
        let now = self.now();
        let Some(current) = state.registry.get(id) else {
            return Err(CrisisError::KillSwitchNotFound { id });
        };

        let lifted = current.deactivated(actor.clone(), reason, now);
        let remaining_active = state.registry.len() - 1;
        let next_level = level_after_removal(&state, remaining_active);

        self.record(
            AuditAction::KillSwitchDeactivated,
            json!({
                "kill_switch": lifted,
                "role": role,
                "crisis_level": next_level,
                "remaining_active": remaining_active,
            }),
            now,
        )?;

        state.remove_switch(id);
        state.set_level(next_level, now);
        tracing::info!(
            kill_switch = %id,
            actor = %actor,
            level = %next_level,
            remaining_active,
            "Kill switch deactivated"
        );

        Ok(DeactivationReceipt {
            kill_switch: lifted,
            crisis_level: next_level,
            remaining_active,
        })
    }
}
