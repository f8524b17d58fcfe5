//! Periodic sweep: expiry warnings, forced auto-deactivation, stale dual-key
//! approvals and opt-in automatic escalation.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use bastion_types::{
    ActorId, ApprovalKey, AuditAction, CrisisError, KillSwitchId, auto_escalation_from,
};

use crate::controller::CrisisController;
use crate::escalation::EscalationReceipt;
use crate::notify::ExpiryNotice;
use crate::registry::level_after_removal;

/// What one sweep changed. An empty report means nothing was due.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub warned: Vec<KillSwitchId>,
    pub deactivated: Vec<KillSwitchId>,
    pub expired_approvals: Vec<ApprovalKey>,
    pub escalated: Option<EscalationReceipt>,
}

impl SweepReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warned.is_empty()
            && self.deactivated.is_empty()
            && self.expired_approvals.is_empty()
            && self.escalated.is_none()
    }
}

impl CrisisController {
    /// Apply everything that has come due. Safe to call at any frequency:
    /// a switch is warned at most once and lifted at most once.
    ///
    /// Each change is audited and committed on its own. If the audit sink
    /// fails midway, changes already committed stay and the rest wait for
    /// the next sweep.
    pub fn run_expiry_sweep(&self) -> Result<SweepReport, CrisisError> {
        let mut state = self.lock();
        let now = self.now();
        let system = ActorId::system();
        let mut report = SweepReport::default();

        let due: Vec<_> = state
            .registry
            .iter()
            .filter(|ks| ks.auto_deactivate_at.is_some_and(|at| now >= at))
            .cloned()
            .collect();
        for ks in due {
            let max_hours = self
                .settings()
                .auto_deactivation
                .policy(ks.level)
                .map_or(0, |policy| policy.max_hours());
            let reason = format!("auto-deactivated after {max_hours}h maximum duration");
            let lifted = ks.deactivated(system.clone(), reason, now);
            let remaining_active = state.registry.len() - 1;
            let next_level = level_after_removal(&state, remaining_active);

            self.record(
                AuditAction::KillSwitchAutoDeactivated,
                json!({
                    "kill_switch": lifted,
                    "crisis_level": next_level,
                    "remaining_active": remaining_active,
                }),
                now,
            )?;
            state.remove_switch(ks.id);
            state.set_level(next_level, now);
            tracing::warn!(kill_switch = %ks.id, halt = %ks.target, level = %next_level, "Kill switch auto-deactivated");
            self.notify(ExpiryNotice::forced(&lifted, now));
            report.deactivated.push(ks.id);
        }

        let warn_due: Vec<_> = state
            .registry
            .iter()
            .filter(|ks| !state.registry.is_warned(ks.id))
            .filter_map(|ks| {
                let policy = self.settings().auto_deactivation.policy(ks.level)?;
                let deadline = ks.auto_deactivate_at?;
                (now >= ks.activated_at + policy.warn_after()).then(|| (ks.clone(), deadline))
            })
            .collect();
        for (ks, deadline) in warn_due {
            self.record(
                AuditAction::AutoDeactivationWarning,
                json!({
                    "kill_switch_id": ks.id,
                    "type": ks.kind,
                    "target": ks.target,
                    "level": ks.level,
                    "drill": ks.drill,
                    "auto_deactivate_at": deadline,
                }),
                now,
            )?;
            state.registry.mark_warned(ks.id);
            self.notify(ExpiryNotice::warning(&ks, deadline));
            report.warned.push(ks.id);
        }

        for approval in state.approvals.expired(now) {
            self.record(
                AuditAction::DualKeyExpired,
                json!({ "approval": approval }),
                now,
            )?;
            state.approvals.remove(&approval.id);
            tracing::info!(key = %approval.id, "Pending dual-key approval expired");
            report.expired_approvals.push(approval.id);
        }

        if self.settings().auto_escalate
            && let Some(rule) = auto_escalation_from(state.level)
            && let Some(minutes) = rule.auto_after_minutes
            && now - state.level_since >= TimeDelta::minutes(i64::from(minutes))
        {
            let receipt = self.commit_escalation(
                &mut state,
                rule,
                rule.trigger,
                &system,
                None,
                AuditAction::AutoEscalation,
                now,
            )?;
            report.escalated = Some(receipt);
        }

        if !report.is_empty() {
            tracing::debug!(
                warned = report.warned.len(),
                deactivated = report.deactivated.len(),
                expired_approvals = report.expired_approvals.len(),
                escalated = report.escalated.is_some(),
                "Expiry sweep applied changes"
            );
        }
        Ok(report)
    }
}

/// Run [`CrisisController::run_expiry_sweep`] every `every` until the task is
/// aborted.
pub fn spawn_scheduler(controller: Arc<CrisisController>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = controller.run_expiry_sweep() {
                tracing::warn!(error = %err, "Expiry sweep incomplete");
            }
        }
    })
}
