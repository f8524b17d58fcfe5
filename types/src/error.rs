use std::fmt;

use thiserror::Error;

use crate::{ActorId, ApprovalKey, AuditError, CrisisLevel, KillSwitchId, Role};

/// The act a role was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    KillSwitch(CrisisLevel),
    Escalation(CrisisLevel),
    Deactivation,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KillSwitch(level) => write!(f, "{level} kill-switch"),
            Self::Escalation(level) => write!(f, "escalation to {level}"),
            Self::Deactivation => f.write_str("kill-switch deactivation"),
        }
    }
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|role| role.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A rejected crisis operation. None of these are fatal to the process.
#[derive(Debug, Error)]
pub enum CrisisError {
    #[error("role '{role}' not authorized for {authority} (allowed: {})", join_roles(.allowed))]
    RoleNotAuthorized {
        role: Role,
        authority: Authority,
        allowed: Vec<Role>,
    },
    #[error("no escalation path from {from} to {to}")]
    InvalidTransition { from: CrisisLevel, to: CrisisLevel },
    #[error("dual-key requires two different users; {user} already holds the first key for {key}")]
    SameApproverNotAllowed { user: ActorId, key: ApprovalKey },
    #[error("kill switch {id} not found or already deactivated")]
    KillSwitchNotFound { id: KillSwitchId },
    #[error("unknown playbook '{key}' (available: {})", .available.join(", "))]
    UnknownPlaybook {
        key: String,
        available: Vec<&'static str>,
    },
    #[error("escalation expected current level {expected}, but it is {actual}")]
    LevelMismatch {
        expected: CrisisLevel,
        actual: CrisisLevel,
    },
    #[error("a drill is already running for playbook '{playbook}'")]
    DrillAlreadyActive { playbook: &'static str },
    #[error("no drill is running")]
    NoActiveDrill,
    #[error("{level} deadline falls outside the supported time range")]
    DeadlineOutOfRange { level: CrisisLevel },
    #[error("mutation rejected, audit sink unavailable: {0}")]
    AuditUnavailable(#[source] AuditError),
}

impl CrisisError {
    /// Stable machine-readable code for callers.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RoleNotAuthorized { .. } => "role_not_authorized",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::SameApproverNotAllowed { .. } => "same_approver_not_allowed",
            Self::KillSwitchNotFound { .. } => "kill_switch_not_found",
            Self::UnknownPlaybook { .. } => "unknown_playbook",
            Self::LevelMismatch { .. } => "level_mismatch",
            Self::DrillAlreadyActive { .. } => "drill_already_active",
            Self::NoActiveDrill => "no_active_drill",
            Self::DeadlineOutOfRange { .. } => "deadline_out_of_range",
            Self::AuditUnavailable(_) => "audit_unavailable",
        }
    }
}
