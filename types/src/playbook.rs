//! Crisis response playbooks rehearsed by drills.

use serde::Serialize;

use crate::{CrisisLevel, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybookStep {
    pub seq: u8,
    pub action: &'static str,
    pub role: Role,
    pub sla_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Playbook {
    pub key: &'static str,
    pub name: &'static str,
    pub severity: CrisisLevel,
    pub steps: &'static [PlaybookStep],
}

impl Playbook {
    /// Sum of every step's time budget.
    #[must_use]
    pub fn total_sla_minutes(&self) -> u32 {
        self.steps.iter().map(|step| step.sla_minutes).sum()
    }
}

const fn step(seq: u8, action: &'static str, role: Role, sla_minutes: u32) -> PlaybookStep {
    PlaybookStep {
        seq,
        action,
        role,
        sla_minutes,
    }
}

pub static PLAYBOOKS: &[Playbook] = &[
    Playbook {
        key: "data_breach",
        name: "Data Breach Response",
        severity: CrisisLevel::Red,
        steps: &[
            step(1, "Activate kill-switch for affected tenant", Role::PlatformSecurity, 5),
            step(2, "Isolate affected database partitions", Role::OpsManager, 10),
            step(3, "Forensic snapshot of audit logs", Role::Auditor, 15),
            step(4, "Notify affected users per GDPR Art.33", Role::ComplianceOfficer, 60),
            step(5, "External security audit engagement", Role::SuperAdmin, 120),
            step(6, "Remediation and patch deployment", Role::Developer, 240),
            step(7, "Post-mortem and regulatory report", Role::ComplianceOfficer, 4320),
        ],
    },
    Playbook {
        key: "service_outage",
        name: "Service Outage Response",
        severity: CrisisLevel::Orange,
        steps: &[
            step(1, "Confirm outage scope and severity", Role::OpsManager, 5),
            step(2, "Engage failover / DR systems", Role::OpsManager, 10),
            step(3, "Status page update to stakeholders", Role::OpsManager, 15),
            step(4, "Root cause identification", Role::Developer, 60),
            step(5, "Service restoration", Role::Developer, 120),
            step(6, "Post-incident review", Role::OpsManager, 1440),
        ],
    },
    Playbook {
        key: "supply_chain_compromise",
        name: "Supply Chain Integrity Breach",
        severity: CrisisLevel::Red,
        steps: &[
            step(1, "Freeze all pending certifications", Role::RiskOfficer, 5),
            step(2, "Kill-switch on affected supply chain module", Role::PlatformSecurity, 10),
            step(3, "Quarantine suspect blockchain seals", Role::BlockchainOperator, 15),
            step(4, "Notify regulatory bodies (EU CBAM)", Role::ComplianceOfficer, 60),
            step(5, "Full chain-of-custody re-verification", Role::ScmAnalyst, 480),
            step(6, "Remediation report + evidence pack", Role::Auditor, 2880),
        ],
    },
    Playbook {
        key: "financial_fraud",
        name: "Financial Fraud Detection",
        severity: CrisisLevel::Red,
        steps: &[
            step(1, "Suspend billing for affected accounts", Role::SuperAdmin, 5),
            step(2, "Transaction forensics analysis", Role::Auditor, 30),
            step(3, "Kill-switch on billing module", Role::PlatformSecurity, 10),
            step(4, "Contact payment processor", Role::SuperAdmin, 60),
            step(5, "Legal review and SAR filing", Role::ComplianceOfficer, 1440),
        ],
    },
    Playbook {
        key: "insider_threat",
        name: "Insider Threat Response",
        severity: CrisisLevel::Black,
        steps: &[
            step(1, "Revoke all sessions for suspect account", Role::PlatformSecurity, 2),
            step(2, "Full system kill-switch", Role::SuperAdmin, 5),
            step(3, "Forensic audit of all actions by suspect", Role::Auditor, 30),
            step(4, "Legal counsel engagement", Role::SuperAdmin, 60),
            step(5, "Credential rotation and re-auth all users", Role::PlatformSecurity, 120),
            step(6, "Regulatory notification", Role::ComplianceOfficer, 4320),
        ],
    },
];

#[must_use]
pub fn find_playbook(key: &str) -> Option<&'static Playbook> {
    PLAYBOOKS.iter().find(|playbook| playbook.key == key)
}

#[must_use]
pub fn playbook_keys() -> Vec<&'static str> {
    PLAYBOOKS.iter().map(|playbook| playbook.key).collect()
}
