//! Crisis level table and auto-deactivation policy.

use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Role;

/// Roles permitted to lift any kill switch.
pub const DEACTIVATION_ROLES: &[Role] = &[Role::SuperAdmin, Role::PlatformSecurity];

const RESPONDER_ROLES: &[Role] = &[Role::SuperAdmin, Role::OpsManager, Role::PlatformSecurity];
const RED_ROLES: &[Role] = &[Role::SuperAdmin, Role::PlatformSecurity];
const BLACK_ROLES: &[Role] = &[Role::SuperAdmin];

/// Platform-wide alert posture, ordered by severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrisisLevel {
    #[default]
    Monitor,
    Yellow,
    Orange,
    Red,
    Black,
}

/// Side effects the platform is expected to trigger while a level is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoAction {
    IncreaseLogging,
    NotifyOps,
    RestrictNewRegistrations,
    HaltTarget,
    NotifyAllStakeholders,
    LockAuditLog,
    HaltAll,
    ActivateWarRoom,
}

impl CrisisLevel {
    pub const ALL: [CrisisLevel; 5] = [
        CrisisLevel::Monitor,
        CrisisLevel::Yellow,
        CrisisLevel::Orange,
        CrisisLevel::Red,
        CrisisLevel::Black,
    ];

    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Monitor => 0,
            Self::Yellow => 1,
            Self::Orange => 2,
            Self::Red => 3,
            Self::Black => 4,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monitor => "MONITOR",
            Self::Yellow => "YELLOW",
            Self::Orange => "ORANGE",
            Self::Red => "RED",
            Self::Black => "BLACK",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Monitor => "Monitor",
            Self::Yellow => "Yellow Alert",
            Self::Orange => "Orange Alert",
            Self::Red => "Red - Kill-Switch Engaged",
            Self::Black => "Black - Full System Halt",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Monitor => "Normal operations, all systems within SLO",
            Self::Yellow => "Elevated risk detected, monitoring intensified",
            Self::Orange => "Active threat, partial service restriction may be needed",
            Self::Red => "Critical breach, targeted kill-switch active, services suspended",
            Self::Black => "Catastrophic, all operations halted, war room active",
        }
    }

    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Monitor => "#22c55e",
            Self::Yellow => "#eab308",
            Self::Orange => "#f97316",
            Self::Red => "#ef4444",
            Self::Black => "#000000",
        }
    }

    #[must_use]
    pub const fn auto_actions(self) -> &'static [AutoAction] {
        match self {
            Self::Monitor => &[],
            Self::Yellow => &[AutoAction::IncreaseLogging, AutoAction::NotifyOps],
            Self::Orange => &[
                AutoAction::IncreaseLogging,
                AutoAction::NotifyOps,
                AutoAction::RestrictNewRegistrations,
            ],
            Self::Red => &[
                AutoAction::HaltTarget,
                AutoAction::NotifyAllStakeholders,
                AutoAction::LockAuditLog,
            ],
            Self::Black => &[
                AutoAction::HaltAll,
                AutoAction::NotifyAllStakeholders,
                AutoAction::LockAuditLog,
                AutoAction::ActivateWarRoom,
            ],
        }
    }

    /// Number of distinct approvers needed before a kill switch at this
    /// level may become active.
    #[must_use]
    pub const fn required_approvers(self) -> u8 {
        match self {
            Self::Monitor => 0,
            Self::Yellow | Self::Orange => 1,
            Self::Red | Self::Black => 2,
        }
    }

    /// Roles eligible to act at this level.
    ///
    /// MONITOR shares the responder set so that standing down to all-clear is
    /// as restricted as raising the first alert.
    #[must_use]
    pub const fn allowed_roles(self) -> &'static [Role] {
        match self {
            Self::Monitor | Self::Yellow | Self::Orange => RESPONDER_ROLES,
            Self::Red => RED_ROLES,
            Self::Black => BLACK_ROLES,
        }
    }

    #[must_use]
    pub fn is_role_allowed(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }

    #[must_use]
    pub fn requires_dual_key(self) -> bool {
        self.required_approvers() >= 2
    }

    /// Built-in auto-deactivation policy; MONITOR has none.
    #[must_use]
    pub const fn default_auto_deactivation(self) -> Option<AutoDeactivationPolicy> {
        match self {
            Self::Monitor => None,
            Self::Yellow => Some(AutoDeactivationPolicy::new_unchecked(72, 48)),
            Self::Orange => Some(AutoDeactivationPolicy::new_unchecked(48, 24)),
            Self::Red => Some(AutoDeactivationPolicy::new_unchecked(24, 12)),
            Self::Black => Some(AutoDeactivationPolicy::new_unchecked(12, 6)),
        }
    }

    const fn index(self) -> usize {
        self.ordinal() as usize
    }
}

impl fmt::Display for CrisisLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown crisis level '{value}' (expected MONITOR, YELLOW, ORANGE, RED or BLACK)")]
pub struct ParseLevelError {
    pub value: String,
}

impl FromStr for CrisisLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ParseLevelError {
                value: s.to_string(),
            })
    }
}

/// Full metadata for one level, as reported by status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub level: CrisisLevel,
    pub ordinal: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub auto_actions: &'static [AutoAction],
    pub required_approvers: u8,
    pub allowed_roles: &'static [Role],
}

impl LevelInfo {
    #[must_use]
    pub fn of(level: CrisisLevel) -> Self {
        Self {
            level,
            ordinal: level.ordinal(),
            name: level.display_name(),
            description: level.description(),
            color: level.color(),
            auto_actions: level.auto_actions(),
            required_approvers: level.required_approvers(),
            allowed_roles: level.allowed_roles(),
        }
    }
}

/// Longest policy accepted: one year.
pub const MAX_POLICY_HOURS: u32 = 8760;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("max_hours ({max_hours}) must be between 1 and {MAX_POLICY_HOURS}, and warn_at_hours ({warn_at_hours}) must be below it")]
pub struct InvalidPolicyError {
    pub max_hours: u32,
    pub warn_at_hours: u32,
}

/// Maximum active duration for a kill switch, with an advisory warning point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoDeactivationPolicy {
    max_hours: u32,
    warn_at_hours: u32,
}

impl AutoDeactivationPolicy {
    pub fn new(max_hours: u32, warn_at_hours: u32) -> Result<Self, InvalidPolicyError> {
        if max_hours == 0 || max_hours > MAX_POLICY_HOURS || warn_at_hours >= max_hours {
            return Err(InvalidPolicyError {
                max_hours,
                warn_at_hours,
            });
        }
        Ok(Self::new_unchecked(max_hours, warn_at_hours))
    }

    const fn new_unchecked(max_hours: u32, warn_at_hours: u32) -> Self {
        Self {
            max_hours,
            warn_at_hours,
        }
    }

    #[must_use]
    pub const fn max_hours(self) -> u32 {
        self.max_hours
    }

    #[must_use]
    pub const fn warn_at_hours(self) -> u32 {
        self.warn_at_hours
    }

    #[must_use]
    pub fn max_duration(self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.max_hours))
    }

    #[must_use]
    pub fn warn_after(self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.warn_at_hours))
    }
}

/// Per-level auto-deactivation policies, seeded from the built-in table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoDeactivationTable {
    policies: [Option<AutoDeactivationPolicy>; 5],
}

impl Default for AutoDeactivationTable {
    fn default() -> Self {
        Self {
            policies: CrisisLevel::ALL.map(CrisisLevel::default_auto_deactivation),
        }
    }
}

impl AutoDeactivationTable {
    #[must_use]
    pub fn policy(&self, level: CrisisLevel) -> Option<AutoDeactivationPolicy> {
        self.policies[level.index()]
    }

    /// Replace the policy for one level. MONITOR never expires anything, so
    /// overrides for it are ignored.
    #[must_use]
    pub fn with_override(mut self, level: CrisisLevel, policy: AutoDeactivationPolicy) -> Self {
        if level != CrisisLevel::Monitor {
            self.policies[level.index()] = Some(policy);
        }
        self
    }

    /// Levels with a policy, in severity order.
    pub fn entries(&self) -> impl Iterator<Item = (CrisisLevel, AutoDeactivationPolicy)> + '_ {
        CrisisLevel::ALL
            .into_iter()
            .filter_map(|level| self.policy(level).map(|policy| (level, policy)))
    }
}
