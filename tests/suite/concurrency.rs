//! Operations racing on one controller from several threads.

use std::sync::Barrier;
use std::thread;

use chrono::TimeDelta;

use bastion_core::ActivationOutcome;
use bastion_types::{AuditAction, CrisisError, HaltTarget, Role, TargetKind};

use crate::common::{Harness, actor};

const THREADS: usize = 8;

#[test]
fn parallel_first_keys_open_one_approval() {
    let h = Harness::new();
    let target = HaltTarget::tenant("tenant-7").unwrap();
    let gate = Barrier::new(THREADS);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    gate.wait();
                    h.controller.request_activation(
                        &target,
                        &actor("pat"),
                        Role::PlatformSecurity,
                        "card testing",
                    )
                })
            })
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    let opened = results
        .iter()
        .filter(|r| matches!(r, Ok(ActivationOutcome::AwaitingSecondKey { .. })))
        .count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(CrisisError::SameApproverNotAllowed { .. })))
        .count();
    assert_eq!((opened, rejected), (1, THREADS - 1));
    assert_eq!(h.controller.status().pending_approvals.len(), 1);
    assert_eq!(h.actions(), vec![AuditAction::DualKeyFirst]);
}

#[test]
fn racing_key_holders_activate_exactly_once() {
    let h = Harness::new();
    let tenants: Vec<String> = (0..THREADS).map(|n| format!("tenant-{n}")).collect();
    let gate = Barrier::new(THREADS * 2);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = tenants
            .iter()
            .flat_map(|tenant| {
                [("pat", Role::PlatformSecurity), ("sam", Role::SuperAdmin)].map(|(name, role)| {
                    let gate = &gate;
                    let controller = &h.controller;
                    s.spawn(move || {
                        let target = HaltTarget::tenant(tenant.as_str()).unwrap();
                        gate.wait();
                        controller.request_activation(&target, &actor(name), role, "fraud ring")
                    })
                })
            })
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    let activated = results
        .iter()
        .filter(|r| matches!(r, Ok(ActivationOutcome::Activated(_))))
        .count();
    assert_eq!(activated, THREADS);
    assert!(results.iter().all(Result::is_ok));

    let actions = h.actions();
    let count = |action| actions.iter().filter(|a| **a == action).count();
    assert_eq!(count(AuditAction::DualKeyFirst), THREADS);
    assert_eq!(count(AuditAction::KillSwitchActivated), THREADS);
    assert!(h.controller.status().pending_approvals.is_empty());
    for tenant in &tenants {
        assert!(h.controller.is_halted(TargetKind::Tenant, tenant));
    }
}

#[test]
fn deactivation_racing_the_sweep_lifts_once() {
    for _ in 0..20 {
        let h = Harness::new();
        let ks = h.halt_tenant("tenant-3");
        h.advance(TimeDelta::hours(25));
        let gate = Barrier::new(2);

        let (manual, sweep) = thread::scope(|s| {
            let manual = s.spawn(|| {
                gate.wait();
                h.controller
                    .deactivate(ks.id, &actor("pat"), "resolved", Role::PlatformSecurity)
            });
            let sweep = s.spawn(|| {
                gate.wait();
                h.controller.run_expiry_sweep()
            });
            (manual.join().unwrap(), sweep.join().unwrap().unwrap())
        });

        match manual {
            Ok(_) => assert!(sweep.deactivated.is_empty()),
            Err(CrisisError::KillSwitchNotFound { id }) => {
                assert_eq!(id, ks.id);
                assert_eq!(sweep.deactivated, vec![ks.id]);
            }
            Err(other) => panic!("unexpected error: {other}"),
        }

        let lifts = h
            .actions()
            .into_iter()
            .filter(|a| {
                matches!(
                    a,
                    AuditAction::KillSwitchDeactivated | AuditAction::KillSwitchAutoDeactivated
                )
            })
            .count();
        assert_eq!(lifts, 1);
        assert!(!h.controller.is_halted(TargetKind::Tenant, "tenant-3"));
    }
}
