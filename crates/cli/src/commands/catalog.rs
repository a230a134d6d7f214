//! `clarion catalog` — List personas, capability servers, and frameworks.

use std::path::Path;

pub async fn run(path: Option<&Path>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(path)?;
    let catalog = config.catalog()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    println!("🎯 Personas");
    for persona in catalog.personas() {
        let marker = if persona.id == catalog.fallback_persona().id {
            " (fallback)"
        } else {
            ""
        };
        let servers: Vec<&str> = persona
            .capability_affinities
            .iter()
            .map(|a| a.server_id.as_str())
            .collect();
        println!(
            "  {:<10} {} | {}{}",
            persona.id, persona.display_name, persona.domain, marker
        );
        println!(
            "             threshold {:.2}, servers: {}",
            persona.activation_threshold,
            if servers.is_empty() {
                "none".to_string()
            } else {
                servers.join(" → ")
            }
        );
    }

    println!("\n🔧 Capability servers");
    for server in catalog.servers() {
        println!(
            "  {:<10} {} [{}] {} (timeout {}ms, retries {})",
            server.id,
            server.display_name,
            server.capabilities.join(", "),
            server.endpoint,
            server.timeout_ms,
            server.max_retries
        );
    }

    println!("\n📚 Frameworks");
    for framework in catalog.frameworks() {
        println!("  {:<28} {}", framework.id, framework.name);
    }

    Ok(())
}
