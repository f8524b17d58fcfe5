//! Command protocol: one JSON object per input line, one per output line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use bastion_core::{CrisisController, escalation_matrix, playbooks};
use bastion_types::{ActorId, CrisisError, CrisisLevel, HaltTarget, KillSwitchId, Role, TargetKind};

const DEFAULT_AUDIT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    RequestActivation {
        kind: TargetKind,
        /// Ignored for global halts, which always target every system.
        #[serde(default)]
        target: Option<String>,
        actor: ActorId,
        role: Role,
        reason: String,
    },
    Deactivate {
        id: KillSwitchId,
        actor: ActorId,
        role: Role,
        reason: String,
    },
    Escalate {
        from: CrisisLevel,
        to: CrisisLevel,
        trigger: String,
        actor: ActorId,
        role: Role,
    },
    StartDrill {
        actor: ActorId,
        playbook: String,
    },
    EndDrill {
        actor: ActorId,
    },
    Status,
    IsHalted {
        kind: TargetKind,
        target: String,
    },
    AuditTrail {
        #[serde(default)]
        limit: Option<usize>,
    },
    EscalationMatrix,
    Playbooks,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<Role>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available: Vec<&'static str>,
}

impl ErrorBody {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            allowed: Vec::new(),
            available: Vec::new(),
        }
    }
}

impl From<&CrisisError> for ErrorBody {
    fn from(err: &CrisisError) -> Self {
        let mut body = Self::new(err.code(), err.to_string());
        match err {
            CrisisError::RoleNotAuthorized { allowed, .. } => body.allowed.clone_from(allowed),
            CrisisError::UnknownPlaybook { available, .. } => {
                body.available.clone_from(available);
            }
            _ => {}
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    fn success(value: &impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(result) => Self {
                ok: true,
                result: Some(result),
                error: None,
            },
            Err(err) => Self::failure(ErrorBody::new("encode_failed", err.to_string())),
        }
    }

    fn failure(error: ErrorBody) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error),
        }
    }

    fn from_result<T: Serialize>(result: Result<T, CrisisError>) -> Self {
        match result {
            Ok(value) => Self::success(&value),
            Err(err) => Self::failure(ErrorBody::from(&err)),
        }
    }
}

/// Parse and execute one input line.
pub fn handle_line(controller: &CrisisController, line: &str) -> Response {
    match serde_json::from_str::<Command>(line) {
        Ok(command) => dispatch(controller, command),
        Err(err) => {
            tracing::debug!(error = %err, "Rejected malformed command");
            Response::failure(ErrorBody::new("invalid_command", err.to_string()))
        }
    }
}

pub fn dispatch(controller: &CrisisController, command: Command) -> Response {
    match command {
        Command::RequestActivation {
            kind,
            target,
            actor,
            role,
            reason,
        } => {
            let target = match kind {
                TargetKind::Global => HaltTarget::global(),
                _ => match HaltTarget::new(kind, target.unwrap_or_default()) {
                    Ok(target) => target,
                    Err(err) => {
                        return Response::failure(ErrorBody::new("invalid_target", err.to_string()));
                    }
                },
            };
            Response::from_result(controller.request_activation(&target, &actor, role, &reason))
        }
        Command::Deactivate {
            id,
            actor,
            role,
            reason,
        } => Response::from_result(controller.deactivate(id, &actor, &reason, role)),
        Command::Escalate {
            from,
            to,
            trigger,
            actor,
            role,
        } => Response::from_result(controller.escalate(from, to, &trigger, &actor, role)),
        Command::StartDrill { actor, playbook } => {
            Response::from_result(controller.start_drill(&actor, &playbook))
        }
        Command::EndDrill { actor } => Response::from_result(controller.end_drill(&actor)),
        Command::Status => Response::success(&controller.status()),
        Command::IsHalted { kind, target } => Response::success(&serde_json::json!({
            "type": kind,
            "target": target,
            "halted": controller.is_halted(kind, &target),
        })),
        Command::AuditTrail { limit } => Response::from_result(
            controller.audit_trail(limit.unwrap_or(DEFAULT_AUDIT_LIMIT)),
        ),
        Command::EscalationMatrix => Response::success(&escalation_matrix()),
        Command::Playbooks => Response::success(&playbooks()),
    }
}
