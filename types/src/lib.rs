//! Core domain types for Bastion.
//!
//! This crate contains the crisis-level table, the escalation matrix, the
//! playbook catalogue and the kill-switch records. Everything here is pure
//! data with no IO and no async, so every layer can depend on it.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod audit;
mod error;
mod escalation;
mod ids;
mod kill_switch;
mod level;
mod playbook;
mod role;

pub use audit::{AuditAction, AuditEntry, AuditError};
pub use error::{Authority, CrisisError};
pub use escalation::{
    ESCALATION_MATRIX, EscalationRule, auto_escalation_from, find_rule, is_valid_transition,
    validate_transition,
};
pub use ids::{ActorId, ApprovalKey, AuditEntryId, DrillId, EmptyActorError, KillSwitchId};
pub use kill_switch::{
    ApprovalStatus, Approver, GLOBAL_TARGET, HaltTarget, InvalidTargetError, KillSwitch,
    KillSwitchStatus, ParseTargetKindError, PendingApproval, TargetKind,
};
pub use level::{
    AutoAction, AutoDeactivationPolicy, AutoDeactivationTable, CrisisLevel, DEACTIVATION_ROLES,
    InvalidPolicyError, LevelInfo, MAX_POLICY_HOURS, ParseLevelError,
};
pub use playbook::{PLAYBOOKS, Playbook, PlaybookStep, find_playbook, playbook_keys};
pub use role::{ParseRoleError, Role};
