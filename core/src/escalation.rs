//! Manual crisis-level changes along the escalation matrix.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use bastion_types::{
    ActorId, AuditAction, Authority, CrisisError, CrisisLevel, EscalationRule, Role,
    validate_transition,
};

use crate::controller::CrisisController;
use crate::state::CrisisState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationReceipt {
    pub from: CrisisLevel,
    pub to: CrisisLevel,
    /// Trigger supplied by the caller, or the edge's own trigger for
    /// automatic escalation.
    pub trigger: String,
    pub escalated_by: ActorId,
    pub at: DateTime<Utc>,
}

impl CrisisController {
    /// Move the crisis level from `from` to `to`.
    ///
    /// The pair must be an edge of the escalation matrix, `role` must be
    /// allowed at `to`, and `from` must still be the current level. Kill
    /// switches are untouched, including on de-escalation.
    pub fn escalate(
        &self,
        from: CrisisLevel,
        to: CrisisLevel,
        trigger: &str,
        actor: &ActorId,
        role: Role,
    ) -> Result<EscalationReceipt, CrisisError> {
        let rule = validate_transition(from, to)?;
        if !to.is_role_allowed(role) {
            tracing::warn!(actor = %actor, role = %role, %from, %to, "Escalation rejected: role not authorized");
            return Err(CrisisError::RoleNotAuthorized {
                role,
                authority: Authority::Escalation(to),
                allowed: to.allowed_roles().to_vec(),
            });
        }

        let mut state = self.lock();
        let now = self.now();
        if state.level != from {
            return Err(CrisisError::LevelMismatch {
                expected: from,
                actual: state.level,
            });
        }

        self.commit_escalation(
            &mut state,
            rule,
            trigger,
            actor,
            Some(role),
            AuditAction::Escalation,
            now,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn commit_escalation(
        &self,
        state: &mut CrisisState,
        rule: &EscalationRule,
        trigger: &str,
        actor: &ActorId,
        role: Option<Role>,
        action: AuditAction,
        now: DateTime<Utc>,
    ) -> Result<EscalationReceipt, CrisisError> {
        self.record(
            action,
            json!({
                "from": rule.from,
                "to": rule.to,
                "trigger": trigger,
                "rule_trigger": rule.trigger,
                "escalated_by": actor,
                "role": role,
                "held_since": state.level_since,
            }),
            now,
        )?;
        state.set_level(rule.to, now);
        tracing::info!(from = %rule.from, to = %rule.to, actor = %actor, trigger, "Crisis level changed");

        Ok(EscalationReceipt {
            from: rule.from,
            to: rule.to,
            trigger: trigger.to_string(),
            escalated_by: actor.clone(),
            at: now,
        })
    }
}
