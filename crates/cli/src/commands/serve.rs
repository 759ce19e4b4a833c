//! `agentbridge serve`: start the HTTP gateway.

use std::path::Path;

use tracing::{debug, info};

use super::load_config;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;

    if let Some(port) = port_override {
        debug!(port, "Port overridden on the command line");
        config.gateway.port = port;
    }

    println!("AgentBridge Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Backend:   {}", config.backend.base_url);
    if config.gateway.debug_sessions {
        println!("   Debug:     /debug/sessions enabled");
    }

    info!(
        backend = %config.backend.base_url,
        project = config.backend.project.as_deref().unwrap_or("-"),
        "Starting gateway"
    );
    agentbridge_gateway::start(config).await?;

    Ok(())
}
