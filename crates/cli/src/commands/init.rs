//! `clarion init` — Write a default configuration file.

use clarion_config::AppConfig;
use std::path::Path;

pub async fn run(path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::config_dir().join("config.toml"),
    };

    println!("🧭 Clarion — Setup");
    println!("==================\n");

    if config_path.exists() && !force {
        println!("  Config already exists: {}", config_path.display());
        println!("  Use --force to overwrite it with defaults.");
        return Ok(());
    }

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Wrote default config: {}", config_path.display());

    println!();
    println!("  The default catalog uses in-process `local:` servers.");
    println!("  Point [[servers]] endpoints at http(s) URLs to use real capability servers.");
    println!("  Try: clarion ask -m \"How should we restructure our teams?\"");

    Ok(())
}
