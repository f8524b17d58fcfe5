use std::time::Duration;

use chrono::TimeDelta;

use bastion_core::{ControllerSettings, ExpiryNotice, spawn_scheduler};
use bastion_types::{ActorId, AuditAction, CrisisLevel, HaltTarget, Role, TargetKind};

use crate::common::{Harness, actor};

#[test]
fn unattended_red_switch_is_lifted_by_system() {
    let h = Harness::new();
    let ks = h.halt_tenant("tenant-42");

    h.advance(TimeDelta::hours(23) + TimeDelta::minutes(59));
    let report = h.controller.run_expiry_sweep().unwrap();
    assert!(report.deactivated.is_empty());
    assert!(h.controller.is_halted(TargetKind::Tenant, "tenant-42"));

    h.advance(TimeDelta::minutes(1));
    let report = h.controller.run_expiry_sweep().unwrap();
    assert_eq!(report.deactivated, vec![ks.id]);
    assert!(!h.controller.is_halted(TargetKind::Tenant, "tenant-42"));
    assert_eq!(h.controller.current_level(), CrisisLevel::Monitor);

    let entry = h
        .audit
        .entries()
        .into_iter()
        .find(|e| e.action == AuditAction::KillSwitchAutoDeactivated)
        .unwrap();
    assert_eq!(
        entry.details["kill_switch"]["deactivated_by"],
        ActorId::SYSTEM
    );
    assert_eq!(entry.details["crisis_level"], "MONITOR");
}

#[test]
fn warning_goes_out_once_before_forced_expiry() {
    let h = Harness::new();
    let ks = h.halt_tenant("tenant-8");

    h.advance(TimeDelta::hours(12));
    let report = h.controller.run_expiry_sweep().unwrap();
    assert_eq!(report.warned, vec![ks.id]);
    let report = h.controller.run_expiry_sweep().unwrap();
    assert!(report.is_empty());

    h.advance(TimeDelta::hours(12));
    h.controller.run_expiry_sweep().unwrap();

    let notices = h.notices.take();
    assert_eq!(notices.len(), 2);
    assert!(matches!(
        &notices[0],
        ExpiryNotice::Warning { auto_deactivate_at, .. }
            if Some(*auto_deactivate_at) == ks.auto_deactivate_at
    ));
    assert!(matches!(&notices[1], ExpiryNotice::ForcedDeactivation { .. }));

    let actions = h.actions();
    let warnings = actions
        .iter()
        .filter(|a| **a == AuditAction::AutoDeactivationWarning)
        .count();
    assert_eq!(warnings, 1);
}

#[test]
fn a_long_outage_skips_straight_to_expiry() {
    let h = Harness::new();
    h.halt_module("search");
    h.advance(TimeDelta::hours(72));
    let report = h.controller.run_expiry_sweep().unwrap();
    assert_eq!(report.deactivated.len(), 1);
    assert!(report.warned.is_empty());
}

#[test]
fn human_deactivation_wins_the_race() {
    let h = Harness::new();
    let ks = h.halt_tenant("tenant-3");
    h.advance(TimeDelta::hours(30));
    h.controller
        .deactivate(ks.id, &actor("pat"), "resolved", Role::PlatformSecurity)
        .unwrap();

    let before = h.audit.len();
    let report = h.controller.run_expiry_sweep().unwrap();
    assert!(report.is_empty());
    assert_eq!(h.audit.len(), before);
    assert!(h.notices.is_empty());
}

#[test]
fn expired_pending_approvals_are_purged_and_audited() {
    let h = Harness::new();
    h.controller
        .request_activation(
            &HaltTarget::tenant("tenant-6").unwrap(),
            &actor("pat"),
            Role::PlatformSecurity,
            "r",
        )
        .unwrap();
    h.advance(TimeDelta::minutes(16));

    let report = h.controller.run_expiry_sweep().unwrap();
    assert_eq!(report.expired_approvals.len(), 1);
    assert_eq!(report.expired_approvals[0].as_str(), "tenant:tenant-6");
    assert_eq!(h.actions().last(), Some(&AuditAction::DualKeyExpired));
    assert!(h.controller.run_expiry_sweep().unwrap().is_empty());
}

#[test]
fn auto_escalation_is_opt_in() {
    let h = Harness::new();
    h.controller
        .escalate(
            CrisisLevel::Monitor,
            CrisisLevel::Yellow,
            "anomaly_detected",
            &actor("olivia"),
            Role::OpsManager,
        )
        .unwrap();
    h.advance(TimeDelta::hours(2));
    assert!(h.controller.run_expiry_sweep().unwrap().escalated.is_none());
    assert_eq!(h.controller.current_level(), CrisisLevel::Yellow);
}

#[test]
fn auto_escalation_follows_timed_edges() {
    let h = Harness::with_settings(ControllerSettings {
        auto_escalate: true,
        ..ControllerSettings::default()
    });
    h.controller
        .escalate(
            CrisisLevel::Monitor,
            CrisisLevel::Yellow,
            "anomaly_detected",
            &actor("olivia"),
            Role::OpsManager,
        )
        .unwrap();

    h.advance(TimeDelta::minutes(29));
    assert!(h.controller.run_expiry_sweep().unwrap().escalated.is_none());

    h.advance(TimeDelta::minutes(1));
    let escalated = h.controller.run_expiry_sweep().unwrap().escalated.unwrap();
    assert_eq!(escalated.to, CrisisLevel::Orange);
    assert_eq!(escalated.escalated_by, ActorId::system());
    assert_eq!(escalated.trigger, "threat_confirmed");

    h.advance(TimeDelta::minutes(15));
    h.controller.run_expiry_sweep().unwrap();
    assert_eq!(h.controller.current_level(), CrisisLevel::Red);

    // RED has no timed edge out of it.
    h.advance(TimeDelta::hours(5));
    assert!(h.controller.run_expiry_sweep().unwrap().escalated.is_none());
    assert_eq!(
        h.actions()
            .iter()
            .filter(|a| **a == AuditAction::AutoEscalation)
            .count(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn background_task_sweeps_on_interval() {
    let h = Harness::new();
    let ks = h.halt_tenant("tenant-11");
    h.advance(TimeDelta::hours(25));

    let handle = spawn_scheduler(h.controller.clone(), Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(!h.controller.is_halted(TargetKind::Tenant, "tenant-11"));
    assert!(
        h.audit
            .entries()
            .iter()
            .any(|e| e.action == AuditAction::KillSwitchAutoDeactivated
                && e.details["kill_switch"]["id"] == ks.id.to_string())
    );
    handle.abort();
}
