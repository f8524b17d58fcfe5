//! Kill-switch activation: single-key, dual-key, and role eligibility.

use chrono::{DateTime, TimeDelta, Utc};

use bastion_core::ActivationOutcome;
use bastion_types::{
    ApprovalStatus, AuditAction, CrisisError, CrisisLevel, HaltTarget, Role, TargetKind,
};

use crate::common::{Harness, activated, actor};

#[test]
fn tenant_halt_needs_two_distinct_approvers() {
    let h = Harness::new();
    let target = HaltTarget::tenant("tenant-42").unwrap();

    let first = h
        .controller
        .request_activation(&target, &actor("pat"), Role::PlatformSecurity, "card testing")
        .unwrap();
    let ActivationOutcome::AwaitingSecondKey { approval, message } = first else {
        panic!("first key must not activate");
    };
    assert_eq!(approval.status, ApprovalStatus::AwaitingSecondKey);
    assert_eq!(approval.expires_at, approval.created_at + TimeDelta::minutes(15));
    assert!(message.contains("platform_security"));
    assert!(message.contains("15 minutes"));
    assert!(!h.controller.is_halted(TargetKind::Tenant, "tenant-42"));
    assert_eq!(h.controller.current_level(), CrisisLevel::Monitor);

    let receipt = activated(
        h.controller
            .request_activation(&target, &actor("sam"), Role::SuperAdmin, "card testing")
            .unwrap(),
    );
    assert_eq!(receipt.crisis_level, CrisisLevel::Red);
    assert_eq!(receipt.kill_switch.level, CrisisLevel::Red);
    assert_eq!(receipt.kill_switch.activated_by, actor("sam"));
    let approvers: Vec<_> = receipt
        .kill_switch
        .approvals
        .iter()
        .map(|a| a.user.as_str().to_string())
        .collect();
    assert_eq!(approvers, vec!["pat".to_string(), "sam".to_string()]);
    assert!(h.controller.is_halted(TargetKind::Tenant, "tenant-42"));
    assert!(h.controller.status().pending_approvals.is_empty());

    assert_eq!(
        h.actions(),
        vec![AuditAction::DualKeyFirst, AuditAction::KillSwitchActivated]
    );
    let activation = h.audit.entries().pop().unwrap();
    assert_eq!(activation.details["approval"]["status"], "approved");
    assert_eq!(activation.details["approval"]["first_approver"]["user"], "pat");
    assert_eq!(activation.details["approval"]["second_approver"]["user"], "sam");
}

#[test]
fn same_user_cannot_supply_both_keys() {
    let h = Harness::new();
    let target = HaltTarget::tenant("tenant-7").unwrap();
    h.controller
        .request_activation(&target, &actor("pat"), Role::PlatformSecurity, "r")
        .unwrap();

    let err = h
        .controller
        .request_activation(&target, &actor("pat"), Role::SuperAdmin, "r")
        .unwrap_err();
    assert!(matches!(err, CrisisError::SameApproverNotAllowed { .. }));
    assert!(!h.controller.is_halted(TargetKind::Tenant, "tenant-7"));
    assert_eq!(h.controller.status().pending_approvals.len(), 1);
    assert_eq!(h.audit.len(), 1);
}

#[test]
fn module_halt_is_single_key_orange() {
    let h = Harness::new();
    let ks = h.halt_module("payments");
    assert_eq!(ks.level, CrisisLevel::Orange);
    assert_eq!(ks.approvals.len(), 1);
    assert_eq!(
        ks.auto_deactivate_at,
        Some(ks.activated_at + TimeDelta::hours(48))
    );
    assert_eq!(h.controller.current_level(), CrisisLevel::Orange);
    assert_eq!(h.actions(), vec![AuditAction::KillSwitchActivated]);
}

#[test]
fn ineligible_role_is_rejected_with_allowed_set() {
    let h = Harness::new();
    let err = h
        .controller
        .request_activation(
            &HaltTarget::tenant("tenant-1").unwrap(),
            &actor("olivia"),
            Role::OpsManager,
            "r",
        )
        .unwrap_err();
    match err {
        CrisisError::RoleNotAuthorized { role, allowed, .. } => {
            assert_eq!(role, Role::OpsManager);
            assert_eq!(allowed, vec![Role::SuperAdmin, Role::PlatformSecurity]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.audit.is_empty());
}

#[test]
fn global_halt_needs_two_super_admins() {
    let h = Harness::new();
    let err = h
        .controller
        .request_activation(&HaltTarget::global(), &actor("pat"), Role::PlatformSecurity, "r")
        .unwrap_err();
    assert!(matches!(err, CrisisError::RoleNotAuthorized { .. }));

    let ks = h.halt_everything();
    assert_eq!(ks.target, "ALL_SYSTEMS");
    assert_eq!(h.controller.current_level(), CrisisLevel::Black);
    assert!(h.controller.is_halted(TargetKind::Tenant, "anyone"));
    assert!(h.controller.is_halted(TargetKind::Module, "anything"));
}

#[test]
fn expired_first_key_cannot_complete_activation() {
    let h = Harness::new();
    let target = HaltTarget::tenant("tenant-3").unwrap();
    h.controller
        .request_activation(&target, &actor("pat"), Role::PlatformSecurity, "r")
        .unwrap();

    h.advance(TimeDelta::minutes(15));
    let outcome = h
        .controller
        .request_activation(&target, &actor("sam"), Role::SuperAdmin, "r")
        .unwrap();
    let ActivationOutcome::AwaitingSecondKey { approval, .. } = outcome else {
        panic!("expired approval must not be consumed");
    };
    assert_eq!(approval.first_approver.user, actor("sam"));
    assert!(!h.controller.is_halted(TargetKind::Tenant, "tenant-3"));

    let entries = h.audit.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].action, AuditAction::DualKeyFirst);
    assert_eq!(entries[1].details["replaced_expired"], true);

    // The original first approver can now supply the second key.
    let receipt = activated(
        h.controller
            .request_activation(&target, &actor("pat"), Role::PlatformSecurity, "r")
            .unwrap(),
    );
    assert_eq!(receipt.kill_switch.approvals.len(), 2);
}

#[test]
fn level_takes_the_highest_active_switch() {
    let h = Harness::new();
    h.halt_tenant("tenant-1");
    h.halt_module("search");
    assert_eq!(h.controller.current_level(), CrisisLevel::Red);
    assert_eq!(h.controller.status().active_kill_switches.len(), 2);
}

#[test]
fn pending_approvals_are_keyed_per_target() {
    let h = Harness::new();
    for tenant in ["tenant-a", "tenant-b"] {
        h.controller
            .request_activation(
                &HaltTarget::tenant(tenant).unwrap(),
                &actor("pat"),
                Role::PlatformSecurity,
                "r",
            )
            .unwrap();
    }
    let pending = h.controller.status().pending_approvals;
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id.as_str(), "tenant:tenant-a");
}

#[test]
fn unrepresentable_deadline_is_rejected_without_halting() {
    let h = Harness::new();
    h.clock.set(DateTime::<Utc>::MAX_UTC - TimeDelta::hours(1));
    let err = h
        .controller
        .request_activation(
            &HaltTarget::module("billing").unwrap(),
            &actor("olivia"),
            Role::OpsManager,
            "degraded",
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CrisisError::DeadlineOutOfRange {
            level: CrisisLevel::Orange
        }
    ));
    assert_eq!(err.code(), "deadline_out_of_range");
    assert!(!h.controller.is_halted(TargetKind::Module, "billing"));
    assert!(h.audit.is_empty());
}
