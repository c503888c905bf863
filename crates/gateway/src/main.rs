use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use npg_gateway::bootstrap;
use npg_gateway::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            run_server().await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (_runtime, services) = bootstrap::load_config()?;
            let valid = npg_gateway::cli::config::validate(&services);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (runtime, services) = bootstrap::load_config()?;
            npg_gateway::cli::config::show(&runtime, &services);
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,npg_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server() -> anyhow::Result<()> {
    tracing::info!("npg-gateway starting");

    let (runtime, services_config) = bootstrap::load_config()?;

    let issues = npg_domain::config::validate_services(services_config.services());
    for issue in &issues {
        match issue.severity {
            npg_domain::config::ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            npg_domain::config::ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let error_count = issues
        .iter()
        .filter(|i| i.severity == npg_domain::config::ConfigSeverity::Error)
        .count();
    if error_count > 0 {
        anyhow::bail!("config validation failed with {error_count} error(s)");
    }

    let host = std::env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("GATEWAY_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let self_base_url =
        std::env::var("GATEWAY_SELF_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

    let state = bootstrap::build_state(runtime, services_config.services().to_vec(), self_base_url)
        .context("building gateway state")?;
    bootstrap::spawn_background_tasks(&state);

    let app = npg_gateway::api::router(state.clone()).with_state(state.clone());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "npg-gateway listening");

    let shutdown = state.shutdown.clone();
    let publisher = state.publisher.clone();
    let drain = std::time::Duration::from_millis(state.runtime.shutdown_drain_ms);
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received, draining in-flight requests");
        shutdown.notify_waiters();
    });

    // spec.md §5: shutdown waits up to a configurable drain for in-flight
    // mediator tasks to finish, then the process exits regardless.
    match tokio::time::timeout(drain, serve).await {
        Ok(result) => result.context("axum server error")?,
        Err(_) => tracing::warn!(drain_ms = drain.as_millis() as u64, "shutdown drain timeout elapsed, exiting with requests still in flight"),
    }

    // Tear down the queue connection after axum has drained in-flight
    // requests (spec.md §4.3: close channel then connection; double-close
    // is tolerated so this is safe even if the connection already dropped).
    publisher.shutdown().await;

    Ok(())
}
