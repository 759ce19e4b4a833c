//! `agentbridge agents`: list the agents callers can use as models.

use std::path::Path;

use agentbridge_backend::LettaClient;
use agentbridge_core::backend::AgentBackend;

use super::load_config;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let client = LettaClient::from_config(&config.backend)?;

    let mut agents = client.list_agents().await?;
    agents.sort_by(|a, b| a.name.cmp(&b.name));

    if agents.is_empty() {
        println!("No agents found on {}", client.base_url());
        return Ok(());
    }

    println!("{:<32} {:<40} PROJECT", "MODEL", "AGENT ID");
    for agent in &agents {
        println!(
            "{:<32} {:<40} {}",
            agent.name,
            agent.id,
            agent.project_id.as_deref().unwrap_or("-")
        );
    }
    println!("\n{} agent(s)", agents.len());

    Ok(())
}
