//! `clarion doctor` — Diagnose configuration and server health.

use clarion_pipeline::Enhancer;
use std::path::Path;

pub async fn run(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Clarion Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config = match super::load_config(path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            println!("\n  ⚠️  Fix the configuration before running other checks.");
            return Ok(());
        }
    };

    let enhancer = match Enhancer::from_config(&config) {
        Ok(enhancer) => enhancer,
        Err(e) => {
            println!("  ❌ Pipeline could not start: {e}");
            return Ok(());
        }
    };

    let catalog = enhancer.catalog();
    println!(
        "  ✅ Catalog: {} personas, {} servers, {} frameworks",
        catalog.personas().len(),
        catalog.servers().len(),
        catalog.frameworks().len()
    );

    if config.audit.jsonl_path.is_none() {
        println!("  ⚠️  No audit file configured; records are kept in memory only");
        issues += 1;
    }

    println!("\n  Capability servers:");
    for health in enhancer.check_servers().await {
        let circuit = health
            .circuit
            .as_ref()
            .map(|c| c.state.to_string())
            .unwrap_or_else(|| "unknown".into());
        if health.reachable {
            println!(
                "  ✅ {:<10} {} via {} (circuit {circuit})",
                health.server_id, health.display_name, health.transport
            );
        } else {
            issues += 1;
            println!(
                "  ❌ {:<10} {} via {}: {}",
                health.server_id,
                health.display_name,
                health.transport,
                health.error.as_deref().unwrap_or("unhealthy")
            );
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
