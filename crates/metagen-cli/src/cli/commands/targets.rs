//! Catalog entry management.

use std::path::Path;

use console::style;

use metagen::models::{AnnotationTarget, TargetFilter, TargetKind};
use metagen::repository::CatalogRepository;

use super::annotate::print_artifact;
use super::helpers::{print_json, Context};
use crate::cli::icons::{dim_arrow, success, warn};

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn cmd_targets_list(ctx: &Context, filter: TargetFilter) -> anyhow::Result<()> {
    let catalog = ctx.open_catalog().await?;
    let targets = catalog.resolve_targets(&filter).await?;

    if ctx.json {
        return print_json(&targets);
    }
    if targets.is_empty() {
        println!("{} No matching targets in {}", warn(), ctx.catalog_path.display());
        return Ok(());
    }
    for target in &targets {
        let marker = if target.metadata.is_some() {
            style("●").green()
        } else {
            style("○").dim()
        };
        println!(
            "{} {:<16} {:<10} {} {}",
            marker,
            target.id,
            target.kind,
            target.title,
            style(format!("[{}]", target.path_display())).dim()
        );
    }
    println!("  {} {} target(s)", dim_arrow(), targets.len());
    Ok(())
}

pub async fn cmd_targets_add(
    ctx: &Context,
    id: String,
    title: String,
    kind: TargetKind,
    path: Option<&str>,
) -> anyhow::Result<()> {
    let catalog = ctx.open_catalog().await?;
    let target = AnnotationTarget::new(id, title, kind)
        .with_path(path.map(split_path).unwrap_or_default());
    let summary = format!("{} ({})", target.id, target.path_display());
    catalog.upsert_targets(vec![target]).await?;
    println!("{} Saved {}", success(), summary);
    Ok(())
}

pub async fn cmd_targets_import(ctx: &Context, file: &Path) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
    let targets: Vec<AnnotationTarget> = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Invalid target list in {}: {}", file.display(), e))?;

    let count = targets.len();
    let catalog = ctx.open_catalog().await?;
    catalog.upsert_targets(targets).await?;
    println!(
        "{} Imported {} target(s) into {}",
        success(),
        count,
        ctx.catalog_path.display()
    );
    Ok(())
}

pub async fn cmd_targets_show(ctx: &Context, id: &str) -> anyhow::Result<()> {
    let catalog = ctx.open_catalog().await?;
    let snapshot = catalog.snapshot().await;
    let artifacts = snapshot.artifacts_for(id);

    if ctx.json {
        return print_json(&artifacts);
    }
    if artifacts.is_empty() {
        println!("{} No artifacts for {}", warn(), id);
        return Ok(());
    }
    for artifact in artifacts {
        print_artifact(artifact);
    }
    Ok(())
}
