//! Single-target annotation.

use console::style;

use metagen::models::{GeneratedArtifact, GeneratedBy, Operation, TargetFilter};
use metagen::repository::CatalogRepository;

use super::helpers::{print_json, Context};
use crate::cli::icons::{dim_arrow, info, success, warn};

pub async fn cmd_annotate(ctx: &Context, target_id: &str, operation: Operation) -> anyhow::Result<()> {
    let (service, catalog) = ctx.service().await?;

    let target = catalog
        .resolve_targets(&TargetFilter::ids([target_id]))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Target '{}' not found in catalog", target_id))?;

    if !ctx.json {
        eprintln!(
            "{} Generating {} for {} ({})",
            info(),
            operation,
            style(&target.title).bold(),
            target.path_display()
        );
    }

    let artifact = service.annotate_single(&target, operation).await;

    if ctx.json {
        return print_json(&artifact);
    }
    print_artifact(&artifact);
    Ok(())
}

pub fn print_artifact(artifact: &GeneratedArtifact) {
    let icon = match artifact.generated_by {
        GeneratedBy::Fallback => warn(),
        _ => success(),
    };
    println!(
        "{} {} via {} (confidence {:.2}, validation {:.0}%)",
        icon,
        artifact.operation,
        artifact.generated_by,
        artifact.confidence,
        artifact.validation_score * 100.0
    );
    if let Some(model) = &artifact.model {
        println!("  {} Model: {}", dim_arrow(), model);
    }
    if let Some(category) = artifact.payload.category() {
        println!("  {} Category: {}", dim_arrow(), category);
    }
    for correction in &artifact.corrections {
        println!(
            "  {} Attempt {} rejected: {}",
            dim_arrow(),
            correction.attempt,
            correction.errors.join("; ")
        );
    }
    println!(
        "  {} Generated at {}",
        dim_arrow(),
        artifact.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&artifact.payload.body()).unwrap_or_default()
    );
}
