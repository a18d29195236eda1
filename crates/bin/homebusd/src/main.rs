//! # homebusd — homebus daemon
//!
//! Composition root that wires the component factories into the home server
//! and exposes it on the TCP command port.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the tracing subscriber
//! - Construct the component factories for the enabled integrations
//! - Start the home server, load the configured components, start the heartbeat
//! - Bind the command port and serve
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod command_port;
mod config;

use std::sync::Arc;

use homebus_adapter_virtual::VirtualComponentFactory;
use homebus_app::ports::ComponentFactory;
use homebus_app::server::{HomeServer, ServerConfig};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Factories
    let mut factories: Vec<Box<dyn ComponentFactory>> = Vec::new();
    if config.integrations.virtual_enabled {
        factories.push(Box::new(VirtualComponentFactory));
    }

    // Server
    let server_config = ServerConfig {
        name: config.server.name.clone(),
        mailbox_capacity: config.bus.mailbox_capacity,
    };
    let server = Arc::new(HomeServer::start(&server_config, Box::new(factories))?);

    let loader = Arc::clone(&server);
    let records = config.component_records();
    let report = tokio::task::spawn_blocking(move || loader.load(records)).await?;
    if !report.failed.is_empty() {
        tracing::warn!(failed = ?report.failed, "some components could not be loaded");
    }

    if let Some(period) = config.heartbeat_period() {
        server.start_heartbeat(period)?;
    }

    // Command port
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "homebusd listening");

    tokio::select! {
        result = command_port::serve(listener, Arc::clone(&server)) => result?,
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutdown requested");
        }
    }

    tokio::task::spawn_blocking(move || server.shutdown()).await?;
    Ok(())
}
