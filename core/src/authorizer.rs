//! Kill-switch authorization: single-key and dual-key activation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use bastion_types::{
    ActorId, ApprovalKey, ApprovalStatus, Approver, AuditAction, Authority, CrisisError,
    HaltTarget, PendingApproval, Role,
};

use crate::controller::CrisisController;
use crate::registry::ActivationReceipt;

/// Pending first keys, one per `kind:target`.
#[derive(Debug, Default)]
pub(crate) struct ApprovalBook {
    pending: BTreeMap<ApprovalKey, PendingApproval>,
}

impl ApprovalBook {
    /// The entry for `key`, unless it has expired.
    pub(crate) fn live(&self, key: &ApprovalKey, now: DateTime<Utc>) -> Option<&PendingApproval> {
        self.pending.get(key).filter(|p| !p.is_expired(now))
    }

    pub(crate) fn contains(&self, key: &ApprovalKey) -> bool {
        self.pending.contains_key(key)
    }

    pub(crate) fn insert(&mut self, approval: PendingApproval) {
        self.pending.insert(approval.id.clone(), approval);
    }

    pub(crate) fn remove(&mut self, key: &ApprovalKey) -> Option<PendingApproval> {
        self.pending.remove(key)
    }

    pub(crate) fn expired(&self, now: DateTime<Utc>) -> Vec<PendingApproval> {
        self.pending
            .values()
            .filter(|p| p.is_expired(now))
            .cloned()
            .collect()
    }

    pub(crate) fn live_snapshot(&self, now: DateTime<Utc>) -> Vec<PendingApproval> {
        self.pending
            .values()
            .filter(|p| !p.is_expired(now))
            .cloned()
            .collect()
    }

    pub(crate) fn drill_keys(&self) -> Vec<ApprovalKey> {
        self.pending
            .values()
            .filter(|p| p.drill)
            .map(|p| p.id.clone())
            .collect()
    }
}

/// What a call to [`CrisisController::request_activation`] produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// First key accepted; nothing is halted yet.
    AwaitingSecondKey {
        approval: PendingApproval,
        message: String,
    },
    Activated(ActivationReceipt),
}

impl CrisisController {
    /// Ask for a kill switch on `target`.
    ///
    /// The target kind fixes the level (tenant RED, module ORANGE, global
    /// BLACK). Levels needing two approvers go through a dual-key exchange:
    /// the first eligible caller opens a pending approval and a different
    /// eligible caller completes it within the approval window.
    pub fn request_activation(
        &self,
        target: &HaltTarget,
        actor: &ActorId,
        role: Role,
        reason: &str,
    ) -> Result<ActivationOutcome, CrisisError> {
        let level = target.kind().min_level();
        if !level.is_role_allowed(role) {
            tracing::warn!(actor = %actor, role = %role, halt = %target, "Activation rejected: role not authorized");
            return Err(CrisisError::RoleNotAuthorized {
                role,
                authority: Authority::KillSwitch(level),
                allowed: level.allowed_roles().to_vec(),
            });
        }

        let mut state = self.lock();
        let now = self.now();
        let approver = Approver {
            user: actor.clone(),
            role,
            time: now,
        };

        if !level.requires_dual_key() {
            return self
                .commit_activation(&mut state, target, reason, approver, None, now)
                .map(ActivationOutcome::Activated);
        }

        let key = ApprovalKey::for_target(target);
        let Some(pending) = state.approvals.live(&key, now).cloned() else {
            let replaced_expired = state.approvals.contains(&key);
            let expires_at = now
                .checked_add_signed(self.settings().approval_window)
                .ok_or(CrisisError::DeadlineOutOfRange { level })?;
            let approval = PendingApproval {
                id: key.clone(),
                kind: target.kind(),
                target: target.name().to_string(),
                level,
                reason: reason.to_string(),
                first_approver: approver,
                second_approver: None,
                status: ApprovalStatus::AwaitingSecondKey,
                drill: state.drill_mode(),
                created_at: now,
                expires_at,
            };
            self.record(
                AuditAction::DualKeyFirst,
                json!({
                    "approval": approval,
                    "replaced_expired": replaced_expired,
                }),
                now,
            )?;
            state.approvals.insert(approval.clone());
            tracing::info!(key = %key, actor = %actor, role = %role, "First key accepted");

            let message = format!(
                "Kill-switch requires dual-key authorization. First key accepted from {role}. \
                 Second key needed within {} minutes.",
                self.settings().approval_window.num_minutes()
            );
            return Ok(ActivationOutcome::AwaitingSecondKey { approval, message });
        };

        if pending.first_approver.user == *actor {
            tracing::warn!(key = %key, actor = %actor, "Second key rejected: same approver");
            return Err(CrisisError::SameApproverNotAllowed {
                user: actor.clone(),
                key,
            });
        }

        let approved = pending.approved_by(approver.clone());
        let receipt =
            self.commit_activation(&mut state, target, reason, approver, Some(&approved), now)?;
        state.approvals.remove(&key);
        Ok(ActivationOutcome::Activated(receipt))
    }
}
