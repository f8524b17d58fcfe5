//! Bastion CLI - serves the crisis controller over stdin/stdout.
//!
//! Each input line is a JSON command tagged by `op`; each output line is the
//! JSON response. Logs go to stderr so stdout stays a clean channel.
//!
//! ```text
//! main() -> load config -> open audit log -> CrisisController
//!                                              |
//!                          spawn_scheduler <---+---> stdin command loop
//! ```

mod commands;

use std::{env, sync::Arc};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bastion_config::BastionConfig;
use bastion_core::{ControllerSettings, CrisisController, JsonlAuditLog, spawn_scheduler};

const LOG_ENV_VAR: &str = "BASTION_LOG";

fn init_tracing(config_filter: &str) {
    let env_filter = env::var(LOG_ENV_VAR)
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .or_else(|| EnvFilter::try_new(config_filter).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = BastionConfig::load()
        .context("failed to load configuration")?
        .unwrap_or_default();
    init_tracing(config.log_filter());

    let settings =
        ControllerSettings::from_config(&config).context("invalid auto-deactivation policy")?;
    let audit_path = config.audit_path();
    let audit = JsonlAuditLog::open(&audit_path)
        .with_context(|| format!("failed to open audit log at {}", audit_path.display()))?;
    tracing::info!(path = %audit_path.display(), "Audit log ready");

    let controller = Arc::new(CrisisController::new(Arc::new(audit)).with_settings(settings));
    let scheduler = spawn_scheduler(Arc::clone(&controller), config.poll_interval());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let result: Result<()> = loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read command"),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted; shutting down");
                break Ok(());
            }
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = commands::handle_line(&controller, &line);
        let mut encoded = match serde_json::to_string(&response) {
            Ok(encoded) => encoded,
            Err(err) => break Err(err.into()),
        };
        encoded.push('\n');
        if let Err(err) = stdout.write_all(encoded.as_bytes()).await {
            break Err(err.into());
        }
        if let Err(err) = stdout.flush().await {
            break Err(err.into());
        }
    };

    scheduler.abort();
    result
}
