//! Configuration management commands.

use crate::cli::icons::{dim_arrow, error, success};

use super::helpers::{print_json, Context};

/// Print the effective configuration.
pub fn cmd_config_show(ctx: &Context) -> anyhow::Result<()> {
    if ctx.json {
        return print_json(&ctx.config);
    }
    print!("{}", ctx.config.to_toml()?);
    Ok(())
}

pub fn cmd_config_check(ctx: &Context) -> anyhow::Result<()> {
    match ctx.config.validate() {
        Ok(()) => {
            println!(
                "{} Configuration is valid: {} provider(s), {} model(s)",
                success(),
                ctx.config.providers.len(),
                ctx.config.models.len()
            );
            Ok(())
        }
        Err(e) => {
            println!("{} {}", error(), e);
            Err(e.into())
        }
    }
}

pub fn cmd_config_paths(ctx: &Context) -> anyhow::Result<()> {
    let source = ctx
        .config
        .source_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults, no config file found)".to_string());

    if ctx.json {
        return print_json(&serde_json::json!({
            "config": source,
            "catalog": ctx.catalog_path.display().to_string(),
        }));
    }
    println!("  {} Config:  {}", dim_arrow(), source);
    println!("  {} Catalog: {}", dim_arrow(), ctx.catalog_path.display());
    Ok(())
}
