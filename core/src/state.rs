//! The single owned crisis state guarded by the controller's lock.

use chrono::{DateTime, Utc};

use bastion_types::{CrisisLevel, KillSwitch, KillSwitchId};

use crate::authorizer::ApprovalBook;
use crate::drill::DrillSession;
use crate::registry::KillSwitchRegistry;

#[derive(Debug)]
pub(crate) struct CrisisState {
    pub(crate) level: CrisisLevel,
    /// When `level` last changed. Drives automatic escalation.
    pub(crate) level_since: DateTime<Utc>,
    pub(crate) registry: KillSwitchRegistry,
    pub(crate) approvals: ApprovalBook,
    pub(crate) drill: Option<DrillSession>,
}

impl CrisisState {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            level: CrisisLevel::Monitor,
            level_since: now,
            registry: KillSwitchRegistry::default(),
            approvals: ApprovalBook::default(),
            drill: None,
        }
    }

    pub(crate) fn set_level(&mut self, level: CrisisLevel, now: DateTime<Utc>) {
        if self.level != level {
            self.level = level;
            self.level_since = now;
        }
    }

    pub(crate) fn drill_mode(&self) -> bool {
        self.drill.is_some()
    }

    /// Drop a switch from the active set. Lifting the last real switch while
    /// a drill runs also clears the level the drill will hand back.
    pub(crate) fn remove_switch(&mut self, id: KillSwitchId) -> Option<KillSwitch> {
        let removed = self.registry.remove(id)?;
        if !removed.drill
            && self.registry.highest_level(false).is_none()
            && let Some(drill) = self.drill.as_mut()
        {
            drill.level_at_start = CrisisLevel::Monitor;
        }
        Some(removed)
    }
}
