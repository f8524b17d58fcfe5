//! Escalation matrix: the directed graph of permitted level transitions.

use serde::Serialize;

use crate::{CrisisError, CrisisLevel};

/// One permitted edge in the escalation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EscalationRule {
    pub from: CrisisLevel,
    pub to: CrisisLevel,
    pub trigger: &'static str,
    /// Minutes after which the scheduler may take this edge on its own.
    pub auto_after_minutes: Option<u32>,
}

impl EscalationRule {
    #[must_use]
    pub fn is_escalation(&self) -> bool {
        self.to > self.from
    }
}

pub static ESCALATION_MATRIX: &[EscalationRule] = &[
    EscalationRule {
        from: CrisisLevel::Monitor,
        to: CrisisLevel::Yellow,
        trigger: "anomaly_detected",
        auto_after_minutes: None,
    },
    EscalationRule {
        from: CrisisLevel::Yellow,
        to: CrisisLevel::Orange,
        trigger: "threat_confirmed",
        auto_after_minutes: Some(30),
    },
    EscalationRule {
        from: CrisisLevel::Orange,
        to: CrisisLevel::Red,
        trigger: "breach_active",
        auto_after_minutes: Some(15),
    },
    EscalationRule {
        from: CrisisLevel::Red,
        to: CrisisLevel::Black,
        trigger: "data_exfiltration",
        auto_after_minutes: None,
    },
    // De-escalation
    EscalationRule {
        from: CrisisLevel::Black,
        to: CrisisLevel::Red,
        trigger: "threat_contained",
        auto_after_minutes: None,
    },
    EscalationRule {
        from: CrisisLevel::Red,
        to: CrisisLevel::Orange,
        trigger: "remediation_started",
        auto_after_minutes: None,
    },
    EscalationRule {
        from: CrisisLevel::Orange,
        to: CrisisLevel::Yellow,
        trigger: "risk_mitigated",
        auto_after_minutes: None,
    },
    EscalationRule {
        from: CrisisLevel::Yellow,
        to: CrisisLevel::Monitor,
        trigger: "all_clear",
        auto_after_minutes: None,
    },
];

#[must_use]
pub fn find_rule(from: CrisisLevel, to: CrisisLevel) -> Option<&'static EscalationRule> {
    ESCALATION_MATRIX
        .iter()
        .find(|rule| rule.from == from && rule.to == to)
}

#[must_use]
pub fn is_valid_transition(from: CrisisLevel, to: CrisisLevel) -> bool {
    find_rule(from, to).is_some()
}

pub fn validate_transition(
    from: CrisisLevel,
    to: CrisisLevel,
) -> Result<&'static EscalationRule, CrisisError> {
    find_rule(from, to).ok_or(CrisisError::InvalidTransition { from, to })
}

/// The escalating edge out of `level` that carries an automatic timer, if any.
#[must_use]
pub fn auto_escalation_from(level: CrisisLevel) -> Option<&'static EscalationRule> {
    ESCALATION_MATRIX
        .iter()
        .find(|rule| rule.from == level && rule.is_escalation() && rule.auto_after_minutes.is_some())
}
