//! `abus config` -- show the effective configuration.

use anyhow::Result;
use console::style;

use agentbus_infra::config::ConfigSource;

use crate::state::AppState;

/// Print the resolved configuration and its source path.
pub fn show_config(state: &AppState, json: bool) -> Result<()> {
    let loaded = &state.loaded;

    if json {
        let out = serde_json::json!({
            "data_dir": state.data_dir.display().to_string(),
            "path": loaded.path.display().to_string(),
            "source": loaded.source,
            "config": loaded.config,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let source = match loaded.source {
        ConfigSource::File => style("loaded").green(),
        ConfigSource::Missing => style("not found, using defaults").yellow(),
        ConfigSource::Invalid => style("invalid, using defaults").red(),
    };

    println!();
    println!("  {} {}", style("Config:").bold(), style(loaded.path.display()).dim());
    println!("  {} {}", style("Status:").bold(), source);
    println!();
    for line in toml::to_string_pretty(&loaded.config)?.lines() {
        println!("  {line}");
    }
    println!();

    Ok(())
}
