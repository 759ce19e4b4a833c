//! `agentbridge status`: backend reachability and configuration summary.

use std::path::Path;

use agentbridge_backend::LettaClient;
use agentbridge_core::backend::AgentBackend;

use super::{config_file, load_config};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    println!("AgentBridge Status");
    println!("==================");
    println!("  Config file:  {}", config_file(config_path).display());
    println!("  Backend:      {}", config.backend.base_url);
    println!(
        "  API key:      {}",
        if config.backend.api_key.is_some() { "set" } else { "not set" }
    );
    if let Some(project) = &config.backend.project {
        println!("  Project:      {project}");
    }
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "  Sessions:     {} entries, {}s TTL",
        config.sessions.max_entries, config.sessions.ttl_seconds
    );
    println!("  Tool prefix:  {}", config.tools.prefix);

    if config.is_hosted_backend() && config.backend.api_key.is_none() {
        println!("\n  ⚠️  Hosted backend without an API key; set LETTA_API_KEY");
    }

    let client = LettaClient::from_config(&config.backend)?;
    match client.list_agents().await {
        Ok(agents) => println!("\n  ✅ Backend reachable ({} agents)", agents.len()),
        Err(e) => println!("\n  ❌ Backend unreachable: {e}"),
    }

    Ok(())
}
