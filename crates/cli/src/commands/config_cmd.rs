//! `crewforge config`: Configuration management commands.

use anyhow::Context;
use crewforge_config::AppConfig;

pub fn validate() -> anyhow::Result<()> {
    println!("🔍 Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push(
            "No API key for the primary provider (set CREWFORGE_API_KEY or OPENAI_API_KEY)",
        );
    }
    if config.fallback.enabled && config.api_key_for(&config.fallback.provider).is_none() {
        warnings.push("Fallback enabled but it has no API key (set ANTHROPIC_API_KEY)");
    }
    if config.memory.redis_url.is_none() {
        warnings.push("No Redis URL, short-term memory is per process");
    }

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Provider:  {}", config.default_provider);
    println!("   Model:     {}", config.default_model);
    println!(
        "   Fallback:  {}",
        if config.fallback.enabled {
            format!("{}/{}", config.fallback.provider, config.fallback.model)
        } else {
            "disabled".to_string()
        }
    );
    println!("   History:   {}", config.history.backend);
    println!(
        "   Focus:     {} iterations, min score {:.1}",
        config.orchestrator.focus_group_max_iterations, config.orchestrator.min_focus_group_score
    );
    Ok(())
}

pub fn show() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let mut value = toml::Value::try_from(&config)?;
    redact(&mut value);
    println!("{}", toml::to_string_pretty(&value)?);
    Ok(())
}

pub fn path() {
    println!("{}", config_path().display());
}

pub fn init(force: bool) -> anyhow::Result<()> {
    let path = config_path();
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    std::fs::write(&path, AppConfig::default_toml())
        .with_context(|| format!("Cannot write {}", path.display()))?;
    println!("✅ Wrote {}", path.display());
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

/// Blank out every `api_key` in a serialized config.
fn redact(value: &mut toml::Value) {
    match value {
        toml::Value::Table(table) => {
            for (key, v) in table.iter_mut() {
                if key == "api_key" {
                    *v = toml::Value::String("***".into());
                } else {
                    redact(v);
                }
            }
        }
        toml::Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}
