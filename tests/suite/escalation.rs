use bastion_types::{AuditAction, Authority, CrisisError, CrisisLevel, Role, TargetKind};

use crate::common::{Harness, actor};

#[test]
fn skipping_a_level_is_rejected() {
    let h = Harness::new();
    let err = h
        .controller
        .escalate(
            CrisisLevel::Monitor,
            CrisisLevel::Orange,
            "panic",
            &actor("sam"),
            Role::SuperAdmin,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CrisisError::InvalidTransition {
            from: CrisisLevel::Monitor,
            to: CrisisLevel::Orange
        }
    ));
    assert_eq!(h.controller.current_level(), CrisisLevel::Monitor);
    assert!(h.audit.is_empty());
}

#[test]
fn escalation_walks_the_matrix() {
    let h = Harness::new();
    let receipt = h
        .controller
        .escalate(
            CrisisLevel::Monitor,
            CrisisLevel::Yellow,
            "anomaly_detected",
            &actor("olivia"),
            Role::OpsManager,
        )
        .unwrap();
    assert_eq!(receipt.to, CrisisLevel::Yellow);
    assert_eq!(receipt.trigger, "anomaly_detected");
    assert_eq!(h.controller.current_level(), CrisisLevel::Yellow);

    let entries = h.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Escalation);
    assert_eq!(entries[0].details["from"], "MONITOR");
    assert_eq!(entries[0].details["to"], "YELLOW");
    assert_eq!(entries[0].details["role"], "ops_manager");
}

#[test]
fn role_is_checked_against_target_level() {
    let h = Harness::new();
    h.halt_tenant("tenant-1");
    let err = h
        .controller
        .escalate(
            CrisisLevel::Red,
            CrisisLevel::Black,
            "data_exfiltration",
            &actor("pat"),
            Role::PlatformSecurity,
        )
        .unwrap_err();
    match err {
        CrisisError::RoleNotAuthorized { authority, .. } => {
            assert_eq!(authority, Authority::Escalation(CrisisLevel::Black));
        }
        other => panic!("unexpected error: {other}"),
    }

    h.controller
        .escalate(
            CrisisLevel::Red,
            CrisisLevel::Black,
            "data_exfiltration",
            &actor("sam"),
            Role::SuperAdmin,
        )
        .unwrap();
    assert_eq!(h.controller.current_level(), CrisisLevel::Black);
}

#[test]
fn stale_from_level_is_a_mismatch() {
    let h = Harness::new();
    let err = h
        .controller
        .escalate(
            CrisisLevel::Yellow,
            CrisisLevel::Orange,
            "threat_confirmed",
            &actor("olivia"),
            Role::OpsManager,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CrisisError::LevelMismatch {
            expected: CrisisLevel::Yellow,
            actual: CrisisLevel::Monitor
        }
    ));
}

#[test]
fn de_escalation_leaves_switches_in_place() {
    let h = Harness::new();
    h.halt_tenant("tenant-9");
    h.controller
        .escalate(
            CrisisLevel::Red,
            CrisisLevel::Orange,
            "remediation_started",
            &actor("pat"),
            Role::PlatformSecurity,
        )
        .unwrap();
    assert_eq!(h.controller.current_level(), CrisisLevel::Orange);
    assert!(h.controller.is_halted(TargetKind::Tenant, "tenant-9"));
    assert_eq!(h.controller.status().active_kill_switches.len(), 1);
}
