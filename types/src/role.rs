use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Organizational role supplied by the RBAC layer alongside an actor id.
///
/// The core trusts the role it is handed; it only decides whether that role
/// is eligible for a given level or action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    OpsManager,
    PlatformSecurity,
    Auditor,
    ComplianceOfficer,
    Developer,
    RiskOfficer,
    BlockchainOperator,
    ScmAnalyst,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::SuperAdmin,
        Role::OpsManager,
        Role::PlatformSecurity,
        Role::Auditor,
        Role::ComplianceOfficer,
        Role::Developer,
        Role::RiskOfficer,
        Role::BlockchainOperator,
        Role::ScmAnalyst,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::OpsManager => "ops_manager",
            Self::PlatformSecurity => "platform_security",
            Self::Auditor => "auditor",
            Self::ComplianceOfficer => "compliance_officer",
            Self::Developer => "developer",
            Self::RiskOfficer => "risk_officer",
            Self::BlockchainOperator => "blockchain_operator",
            Self::ScmAnalyst => "scm_analyst",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{value}'")]
pub struct ParseRoleError {
    pub value: String,
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ParseRoleError {
                value: s.to_string(),
            })
    }
}
