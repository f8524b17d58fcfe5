use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::AuditEntryId;

/// Every state change the controller records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    DualKeyFirst,
    DualKeyExpired,
    KillSwitchActivated,
    KillSwitchDeactivated,
    KillSwitchAutoDeactivated,
    AutoDeactivationWarning,
    Escalation,
    AutoEscalation,
    DrillStarted,
    DrillEnded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub action: AuditAction,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(action: AuditAction, details: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: AuditEntryId::new(),
            action,
            details,
            timestamp,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit entry could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("audit sink unavailable: {reason}")]
    Unavailable { reason: String },
}
