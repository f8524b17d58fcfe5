//! Drill mode: rehearse a playbook on the live state machine without
//! enforcement effect.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use bastion_types::{
    ActorId, ApprovalKey, AuditAction, CrisisError, CrisisLevel, DrillId, KillSwitchId, Playbook,
    find_playbook, playbook_keys,
};

use crate::controller::CrisisController;

/// A running drill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrillSession {
    pub id: DrillId,
    pub playbook: &'static Playbook,
    pub started_by: ActorId,
    pub started_at: DateTime<Utc>,
    /// Level held when the drill began. Ending the drill hands it back unless
    /// the last real switch was lifted in the meantime.
    pub level_at_start: CrisisLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrillSummary {
    pub drill: DrillSession,
    pub ended_by: ActorId,
    pub ended_at: DateTime<Utc>,
    pub purged_switches: Vec<KillSwitchId>,
    pub purged_approvals: Vec<ApprovalKey>,
    pub crisis_level: CrisisLevel,
}

impl DrillSummary {
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        (self.ended_at - self.drill.started_at).num_minutes()
    }
}

impl CrisisController {
    /// Enter drill mode for the named playbook. Kill switches created until
    /// [`end_drill`](Self::end_drill) are tagged as drill and halt nothing.
    pub fn start_drill(
        &self,
        actor: &ActorId,
        playbook_key: &str,
    ) -> Result<DrillSession, CrisisError> {
        let Some(playbook) = find_playbook(playbook_key) else {
            return Err(CrisisError::UnknownPlaybook {
                key: playbook_key.to_string(),
                available: playbook_keys(),
            });
        };

        let mut state = self.lock();
        let now = self.now();
        if let Some(running) = &state.drill {
            return Err(CrisisError::DrillAlreadyActive {
                playbook: running.playbook.key,
            });
        }

        let session = DrillSession {
            id: DrillId::new(),
            playbook,
            started_by: actor.clone(),
            started_at: now,
            level_at_start: state.level,
        };
        self.record(
            AuditAction::DrillStarted,
            json!({
                "drill_id": session.id,
                "playbook": playbook.key,
                "name": playbook.name,
                "severity": playbook.severity,
                "steps": playbook.steps.len(),
                "started_by": actor,
            }),
            now,
        )?;
        state.drill = Some(session.clone());
        tracing::info!(drill = %session.id, playbook = playbook.key, actor = %actor, "[DRILL] Drill started");

        Ok(session)
    }

    /// Leave drill mode, purging every drill switch and drill approval.
    ///
    /// The level becomes the higher of the level held when the drill began
    /// and the highest real switch still active. Escalations made during the
    /// drill are part of the rehearsal and are discarded.
    pub fn end_drill(&self, actor: &ActorId) -> Result<DrillSummary, CrisisError> {
        let mut state = self.lock();
        let now = self.now();
        let Some(drill) = state.drill.clone() else {
            return Err(CrisisError::NoActiveDrill);
        };

        let purged_switches = state.registry.drill_ids();
        let purged_approvals = state.approvals.drill_keys();
        let crisis_level = state
            .registry
            .highest_level(false)
            .map_or(drill.level_at_start, |level| level.max(drill.level_at_start));

        self.record(
            AuditAction::DrillEnded,
            json!({
                "drill_id": drill.id,
                "playbook": drill.playbook.key,
                "ended_by": actor,
                "started_at": drill.started_at,
                "level_at_start": drill.level_at_start,
                "purged_switches": purged_switches,
                "purged_approvals": purged_approvals,
                "crisis_level": crisis_level,
            }),
            now,
        )?;

        for id in &purged_switches {
            state.registry.remove(*id);
        }
        for key in &purged_approvals {
            state.approvals.remove(key);
        }
        state.drill = None;
        state.set_level(crisis_level, now);

        let summary = DrillSummary {
            drill,
            ended_by: actor.clone(),
            ended_at: now,
            purged_switches,
            purged_approvals,
            crisis_level,
        };
        tracing::info!(
            drill = %summary.drill.id,
            purged = summary.purged_switches.len(),
            minutes = summary.duration_minutes(),
            level = %crisis_level,
            "[DRILL] Drill ended"
        );
        Ok(summary)
    }
}
