//! # PDSNO Controller Process
//!
//! The executable entry point for one control-plane process. Which tier it
//! runs as (Global/Regional/Local) and which peers it talks to are runtime
//! configuration, not a compile-time choice (spec §6 "Bootstrap
//! configuration"); this binary reads that shape from environment
//! variables, the smallest typed interface that satisfies the spec's "the
//! shape of this configuration is outside the core" note. Grounded on
//! `node-runtime::main`'s tracing-setup-then-run-until-signal shape.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use controller_runtime::config::{
    ApprovalConfig, ControllerConfig, ControllerRole, DiscoveryConfig, IdentityConfig, NibConfig,
    SecurityConfig, TransportConfig,
};
use controller_runtime::container::ControllerContainer;
use controller_runtime::handlers::InboundHandler;
use controller_runtime::wiring;

fn env_role() -> Result<ControllerRole> {
    match std::env::var("PDSNO_ROLE").as_deref() {
        Ok("global") => Ok(ControllerRole::Global),
        Ok("regional") => Ok(ControllerRole::Regional),
        Ok("local") => Ok(ControllerRole::Local),
        Ok(other) => anyhow::bail!("PDSNO_ROLE must be global|regional|local, got {other}"),
        Err(_) => anyhow::bail!("PDSNO_ROLE is required"),
    }
}

/// `PDSNO_PEER_<controller_id>=<http_base_url>`, one per known peer.
fn env_peer_bases() -> HashMap<String, String> {
    let mut bases = HashMap::new();
    for (key, value) in std::env::vars() {
        if let Some(controller_id) = key.strip_prefix("PDSNO_PEER_") {
            bases.insert(controller_id.to_lowercase(), value);
        }
    }
    bases
}

fn load_config() -> Result<ControllerConfig> {
    let role = env_role()?;
    let controller_id = std::env::var("PDSNO_CONTROLLER_ID").context("PDSNO_CONTROLLER_ID is required")?;
    let region = std::env::var("PDSNO_REGION").ok();
    let parent_id = std::env::var("PDSNO_PARENT_ID").ok();

    let http_bind_addr: SocketAddr = std::env::var("PDSNO_BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:7400".to_string())
        .parse()
        .context("PDSNO_BIND_ADDR must be a valid socket address")?;

    let bootstrap_secret = std::env::var("PDSNO_BOOTSTRAP_SECRET")
        .context("PDSNO_BOOTSTRAP_SECRET is required")?
        .into_bytes();

    let persistent = std::env::var("PDSNO_NIB_PERSISTENT")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let data_dir = std::env::var("PDSNO_NIB_DATA_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("./data/nib"));

    Ok(ControllerConfig {
        identity: IdentityConfig {
            controller_id,
            role,
            region,
            parent_id,
        },
        transport: TransportConfig {
            http_bind_addr,
            peer_http_bases: env_peer_bases(),
            ..TransportConfig::default()
        },
        nib: NibConfig { data_dir, persistent },
        security: SecurityConfig {
            bootstrap_secret,
            peer_secrets: Vec::new(),
            signing_key_seed: None,
        },
        discovery: DiscoveryConfig::default(),
        approval: ApprovalConfig::default(),
    })
}

fn telemetry_config() -> pdsno_telemetry::TelemetryConfig {
    pdsno_telemetry::TelemetryConfig {
        json_logs: std::env::var("PDSNO_LOG_JSON")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
        env_filter: std::env::var("PDSNO_LOG_FILTER").unwrap_or_else(|_| "info".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    pdsno_telemetry::init(&telemetry_config()).context("failed to initialize telemetry")?;

    info!("=================================================");
    info!("  PDSNO Controller Runtime");
    info!("=================================================");

    let config = load_config()?;
    let role = config.identity.role;
    let controller_id = config.identity.controller_id.clone();
    let bind_addr = config.transport.http_bind_addr;

    let container = Arc::new(ControllerContainer::new(config)?);
    let sink = Arc::new(InboundHandler::new(Arc::clone(&container)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let background = wiring::spawn_background_loops(Arc::clone(&container), shutdown_rx);

    let server_container = Arc::clone(&container);
    let server = tokio::spawn(async move {
        if let Err(e) = pdsno_c3_transport::http::serve(bind_addr, sink).await {
            tracing::error!(error = %e, "inbound HTTP server exited");
        }
        drop(server_container);
    });

    if role != ControllerRole::Global {
        let admit_container = Arc::clone(&container);
        let temp_id = format!("temp_{controller_id}");
        tokio::spawn(async move {
            match wiring::self_admit(admit_container, temp_id, Duration::from_secs(30)).await {
                Some(result) if !result.error => {
                    info!(assigned_id = ?result.assigned_id, "admitted by parent");
                }
                Some(result) => {
                    tracing::error!(reason = ?result.reason, "parent rejected admission");
                }
                None => {
                    tracing::error!("admission did not complete (no parent response)");
                }
            }
        });
    }

    info!(%controller_id, ?role, %bind_addr, "controller running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down gracefully");
    let _ = shutdown_tx.send(true);
    for handle in background {
        handle.abort();
    }
    server.abort();

    Ok(())
}
