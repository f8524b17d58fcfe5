//! Kill-switch and dual-key approval records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ActorId, ApprovalKey, CrisisLevel, KillSwitchId, Role};

/// Target name used for every global halt.
pub const GLOBAL_TARGET: &str = "ALL_SYSTEMS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Tenant,
    Module,
    Global,
}

impl TargetKind {
    pub const ALL: [TargetKind; 3] = [TargetKind::Tenant, TargetKind::Module, TargetKind::Global];

    /// Crisis level a kill switch of this kind puts the platform into.
    #[must_use]
    pub const fn min_level(self) -> CrisisLevel {
        match self {
            Self::Tenant => CrisisLevel::Red,
            Self::Module => CrisisLevel::Orange,
            Self::Global => CrisisLevel::Black,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::Module => "module",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown kill-switch kind '{value}' (expected tenant, module or global)")]
pub struct ParseTargetKindError {
    pub value: String,
}

impl FromStr for TargetKind {
    type Err = ParseTargetKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ParseTargetKindError {
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} kill switch needs a non-empty target name")]
pub struct InvalidTargetError {
    pub kind: TargetKind,
}

/// What a kill switch halts.
///
/// Global targets are always named [`GLOBAL_TARGET`]; tenant and module
/// targets carry a non-empty name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HaltTarget {
    kind: TargetKind,
    name: String,
}

impl HaltTarget {
    pub fn new(kind: TargetKind, name: impl Into<String>) -> Result<Self, InvalidTargetError> {
        if kind == TargetKind::Global {
            return Ok(Self::global());
        }
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(InvalidTargetError { kind });
        }
        Ok(Self {
            kind,
            name: trimmed.to_string(),
        })
    }

    pub fn tenant(name: impl Into<String>) -> Result<Self, InvalidTargetError> {
        Self::new(TargetKind::Tenant, name)
    }

    pub fn module(name: impl Into<String>) -> Result<Self, InvalidTargetError> {
        Self::new(TargetKind::Module, name)
    }

    #[must_use]
    pub fn global() -> Self {
        Self {
            kind: TargetKind::Global,
            name: GLOBAL_TARGET.to_string(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for HaltTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillSwitchStatus {
    Active,
    Deactivated,
}

/// One confirmation toward an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    pub user: ActorId,
    pub role: Role,
    pub time: DateTime<Utc>,
}

/// An applied halt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSwitch {
    pub id: KillSwitchId,
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub target: String,
    pub level: CrisisLevel,
    pub reason: String,
    pub activated_by: ActorId,
    pub activated_by_role: Role,
    /// Every confirmation that led to activation, first key first.
    pub approvals: Vec<Approver>,
    pub activated_at: DateTime<Utc>,
    pub status: KillSwitchStatus,
    pub drill: bool,
    pub auto_deactivate_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_by: Option<ActorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivation_reason: Option<String>,
}

impl KillSwitch {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == KillSwitchStatus::Active
    }

    /// Whether this switch halts `(kind, target)` for enforcement purposes.
    /// Drill switches never halt anything.
    #[must_use]
    pub fn halts(&self, kind: TargetKind, target: &str) -> bool {
        if self.drill || !self.is_active() {
            return false;
        }
        self.kind == TargetKind::Global || (self.kind == kind && self.target == target)
    }

    /// Copy of this record in its lifted state.
    #[must_use]
    pub fn deactivated(
        &self,
        by: ActorId,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> KillSwitch {
        KillSwitch {
            status: KillSwitchStatus::Deactivated,
            deactivated_by: Some(by),
            deactivated_at: Some(at),
            deactivation_reason: Some(reason.into()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    AwaitingSecondKey,
    Approved,
}

/// First half of a dual-key activation, waiting for a second approver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub id: ApprovalKey,
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub target: String,
    pub level: CrisisLevel,
    pub reason: String,
    pub first_approver: Approver,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_approver: Option<Approver>,
    pub status: ApprovalStatus,
    pub drill: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingApproval {
    /// The one expiry predicate used everywhere a pending approval is read.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    #[must_use]
    pub fn approved_by(mut self, second: Approver) -> PendingApproval {
        self.second_approver = Some(second);
        self.status = ApprovalStatus::Approved;
        self
    }
}
