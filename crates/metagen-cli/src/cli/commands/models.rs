//! Model registry inspection.

use console::style;
use serde::Serialize;

use metagen::models::{Operation, PriorityMode};
use metagen::registry::{ModelRegistry, ModelSelector};

use super::helpers::{print_json, Context};
use crate::cli::icons::{dim_arrow, error, success, warn};

#[derive(Serialize)]
struct ModelRow {
    name: String,
    provider: String,
    capabilities: String,
    priority: u32,
    available: bool,
    healthy: Option<bool>,
    calls: u64,
    success_rate: Option<f64>,
    avg_response_ms: f64,
}

pub async fn cmd_models_list(ctx: &Context, probe: bool) -> anyhow::Result<()> {
    let (service, _) = ctx.service().await?;
    if probe {
        service.probe_models().await;
    }

    let health = service.model_health();
    let metrics = service.performance_snapshot();
    let rows: Vec<ModelRow> = service
        .registry()
        .models()
        .into_iter()
        .map(|model| {
            let stats = metrics.get(&model.name).copied().unwrap_or_default();
            ModelRow {
                healthy: health.get(&model.name).copied(),
                calls: stats.total_count,
                success_rate: stats.success_rate(),
                avg_response_ms: stats.avg_response_ms,
                capabilities: model.capabilities.to_string(),
                priority: model.priority,
                available: model.available,
                provider: model.provider,
                name: model.name,
            }
        })
        .collect();

    if ctx.json {
        return print_json(&rows);
    }
    for row in &rows {
        let icon = match (row.available, row.healthy) {
            (false, _) => style("-").dim(),
            (true, Some(false)) => error(),
            (true, Some(true)) => success(),
            (true, None) => warn(),
        };
        println!(
            "{} {:<24} {:<12} priority {:<3} [{}]",
            icon, row.name, row.provider, row.priority, row.capabilities
        );
        if row.calls > 0 {
            println!(
                "  {} {} calls, {:.0}% ok, {:.0}ms avg",
                dim_arrow(),
                row.calls,
                row.success_rate.unwrap_or(0.0) * 100.0,
                row.avg_response_ms
            );
        }
    }
    if !probe && rows.iter().any(|r| r.healthy.is_none()) {
        println!("  {} Health unknown; pass --probe to check", dim_arrow());
    }
    Ok(())
}

pub fn cmd_models_rank(ctx: &Context, operation: Operation, mode: PriorityMode) -> anyhow::Result<()> {
    ctx.config.validate()?;
    let registry = std::sync::Arc::new(ModelRegistry::new(
        ctx.config.model_descriptors(),
        ctx.config.fallback_model.clone(),
    ));
    let selector = ModelSelector::new(registry, ctx.config.selection);
    let capability = operation.capability();
    let ranked = selector.rank(capability, mode);

    if ctx.json {
        let rows: Vec<_> = ranked
            .iter()
            .map(|(model, score)| serde_json::json!({"model": model.name, "score": score}))
            .collect();
        return print_json(&rows);
    }
    if ranked.is_empty() {
        println!("{} No model supports {}", warn(), capability);
        if let Some(fallback) = &ctx.config.fallback_model {
            println!("  {} Fallback model: {}", dim_arrow(), fallback);
        }
        return Ok(());
    }
    println!("Ranking for {} ({} mode):", capability, mode.as_str());
    for (position, (model, score)) in ranked.iter().enumerate() {
        println!(
            "  {}. {:<24} {:>7.2}  {} {} accuracy",
            position + 1,
            model.name,
            score,
            model.speed.as_str(),
            model.accuracy.as_str()
        );
    }
    Ok(())
}
