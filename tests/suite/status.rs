use std::sync::Arc;

use chrono::TimeDelta;

use bastion_core::{CrisisController, JsonlAuditLog, escalation_matrix, levels, playbooks};
use bastion_types::{AuditAction, CrisisLevel, HaltTarget, Role, TargetKind};

use crate::common::{Harness, actor};

#[test]
fn repeated_status_differs_only_in_generation_time() {
    let h = Harness::new();
    h.halt_tenant("tenant-1");
    h.controller
        .request_activation(
            &HaltTarget::tenant("tenant-2").unwrap(),
            &actor("pat"),
            Role::PlatformSecurity,
            "r",
        )
        .unwrap();

    let first = h.controller.status();
    h.advance(TimeDelta::seconds(30));
    let mut second = h.controller.status();
    assert_ne!(first.generated_at, second.generated_at);
    second.generated_at = first.generated_at;
    assert_eq!(first, second);
}

#[test]
fn status_reports_level_metadata_and_policy() {
    let h = Harness::new();
    let monitor = h.controller.status();
    assert_eq!(monitor.level.level, CrisisLevel::Monitor);
    assert!(monitor.auto_deactivation.is_none());

    h.halt_tenant("tenant-1");
    let status = h.controller.status();
    assert_eq!(status.level.level, CrisisLevel::Red);
    assert_eq!(status.level.required_approvers, 2);
    assert_eq!(status.auto_deactivation.unwrap().max_hours(), 24);
    assert_eq!(status.level_since, status.generated_at);
}

#[test]
fn expired_approvals_drop_out_of_status() {
    let h = Harness::new();
    h.controller
        .request_activation(
            &HaltTarget::tenant("tenant-2").unwrap(),
            &actor("pat"),
            Role::PlatformSecurity,
            "r",
        )
        .unwrap();
    assert_eq!(h.controller.status().pending_approvals.len(), 1);
    h.advance(TimeDelta::minutes(15));
    assert!(h.controller.status().pending_approvals.is_empty());
}

#[test]
fn halt_lookup_ignores_surrounding_whitespace() {
    let h = Harness::new();
    h.halt_tenant(" tenant-1 ");
    assert!(h.controller.is_halted(TargetKind::Tenant, "tenant-1"));
    assert!(h.controller.is_halted(TargetKind::Tenant, " tenant-1 "));
    assert!(h.controller.is_halted(TargetKind::Tenant, "tenant-1\n"));
    assert!(!h.controller.is_halted(TargetKind::Tenant, "tenant-10"));
}

#[test]
fn catalogues_are_complete() {
    assert_eq!(escalation_matrix().len(), 8);
    assert_eq!(playbooks().len(), 5);
    assert_eq!(levels().len(), 5);
    assert_eq!(levels()[4].level, CrisisLevel::Black);
    let h = Harness::new();
    assert_eq!(h.controller.auto_deactivation_policies().len(), 4);
}

#[test]
fn audit_trail_reads_back_from_disk_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let log = JsonlAuditLog::open(dir.path().join("audit.jsonl")).unwrap();
    let controller = CrisisController::new(Arc::new(log));

    controller
        .escalate(
            CrisisLevel::Monitor,
            CrisisLevel::Yellow,
            "anomaly_detected",
            &actor("olivia"),
            Role::OpsManager,
        )
        .unwrap();
    controller
        .start_drill(&actor("olivia"), "service_outage")
        .unwrap();

    let trail = controller.audit_trail(50).unwrap();
    assert_eq!(
        trail.iter().map(|e| e.action).collect::<Vec<_>>(),
        vec![AuditAction::DrillStarted, AuditAction::Escalation]
    );
    assert_eq!(controller.audit_trail(1).unwrap().len(), 1);
}
