//! Crisis-level state machine and kill-switch control for Bastion.
//!
//! [`CrisisController`] owns the live crisis state: the current level, the
//! active kill switches, pending dual-key approvals and the drill session.
//! Every mutation is validated, written to an [`AuditSink`], and only then
//! committed. [`spawn_scheduler`] drives expiry warnings, forced
//! auto-deactivation and (optionally) timed escalation.

mod audit;
mod authorizer;
mod clock;
mod controller;
mod drill;
mod escalation;
mod notify;
mod registry;
mod scheduler;
mod state;
mod status;

pub use audit::{AuditSink, JsonlAuditLog, MemoryAuditLog};
pub use authorizer::ActivationOutcome;
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{ControllerSettings, CrisisController};
pub use drill::{DrillSession, DrillSummary};
pub use escalation::EscalationReceipt;
pub use notify::{ExpiryNotice, NotificationQueue, NotificationSink, TracingNotifier};
pub use registry::{ActivationReceipt, DeactivationReceipt};
pub use scheduler::{SweepReport, spawn_scheduler};
pub use status::{StatusSnapshot, escalation_matrix, levels, playbooks};
