//! Batch annotation with a progress bar.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use metagen::models::{BatchJob, BatchOptions, BatchSummary, JobStatus, Operation, TargetFilter};
use metagen::utils::{format_duration, truncate};
use metagen_annotate::BatchEvent;

use super::helpers::{print_json, Context};
use crate::cli::icons::{dim_arrow, error, info, success, warn};

/// Spawn a task that drives a progress bar from batch events.
///
/// Returns a `JoinHandle` the caller should `.await` after the job finishes.
fn spawn_progress_handler(
    mut event_rx: mpsc::Receiver<BatchEvent>,
    label: String,
    quiet: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut pb: Option<ProgressBar> = None;
        while let Some(event) = event_rx.recv().await {
            if quiet {
                if matches!(event, BatchEvent::JobFinished { .. }) {
                    break;
                }
                continue;
            }
            match event {
                BatchEvent::JobStarted { total, .. } => {
                    let progress = ProgressBar::new(total as u64);
                    if let Ok(bar_style) = ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                    {
                        progress.set_style(bar_style.progress_chars("█▓░"));
                    }
                    progress.set_message(format!("{}...", label));
                    pb = Some(progress);
                }
                BatchEvent::ItemCompleted {
                    target_id,
                    generated_by,
                    ..
                } => {
                    if let Some(ref progress) = pb {
                        progress.set_message(format!("{} ({})", truncate(&target_id, 40), generated_by));
                        progress.inc(1);
                    }
                }
                BatchEvent::ItemFailed {
                    target_id, error: message, ..
                } => {
                    if let Some(ref progress) = pb {
                        progress.println(format!("{} {} failed: {}", error(), target_id, message));
                        progress.inc(1);
                    }
                }
                BatchEvent::ChunkCompleted { chunk, progress: percent, .. } => {
                    if let Some(ref progress) = pb {
                        progress.set_message(format!("chunk {} done ({:.0}%)", chunk + 1, percent));
                    }
                }
                BatchEvent::JobFinished { .. } => {
                    if let Some(progress) = pb.take() {
                        progress.finish_and_clear();
                    }
                    break;
                }
            }
        }
    })
}

pub async fn cmd_batch(
    ctx: &Context,
    operation: Operation,
    filter: TargetFilter,
    options: BatchOptions,
) -> anyhow::Result<()> {
    let (service, _catalog) = ctx.service().await?;

    let monitor = ctx
        .config
        .health
        .enabled
        .then(|| service.start_health_monitor());

    let (event_tx, event_rx) = mpsc::channel::<BatchEvent>(256);
    let handler = spawn_progress_handler(event_rx, operation.to_string(), ctx.json);

    let job_id = service
        .submit_batch(operation, filter, options, Some(event_tx))
        .await;
    if !ctx.json {
        eprintln!("{} Started {} job {}", info(), operation, style(&job_id).dim());
    }

    let job = tokio::select! {
        job = service.wait_batch(&job_id) => job?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{} Cancelling; in-flight items will finish", warn());
            service.cancel_batch(&job_id).await?;
            service.wait_batch(&job_id).await?
        }
    };
    let _ = handler.await;
    if let Some(monitor) = monitor {
        monitor.shutdown().await;
    }

    if ctx.json {
        return print_json(&job);
    }
    print_job(&job);
    Ok(())
}

fn print_job(job: &BatchJob) {
    let summary = job.summary.clone().unwrap_or_default();
    let icon = match job.status {
        JobStatus::Completed if job.failed == 0 => success(),
        JobStatus::Completed | JobStatus::Cancelled => warn(),
        _ => error(),
    };
    println!(
        "{} Job {} {}: {} succeeded, {} failed, {} remaining",
        icon,
        job.id,
        job.status,
        job.succeeded,
        job.failed,
        job.remaining()
    );
    if let Some(message) = &job.error {
        println!("  {} {}", dim_arrow(), message);
    }
    if summary.processed > 0 {
        print_summary(&summary);
    }
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "  {} Sources: {} ai, {} hybrid, {} fallback",
        dim_arrow(),
        summary.ai,
        summary.hybrid,
        summary.fallback
    );
    println!(
        "  {} Average confidence {:.2}, success ratio {:.0}%",
        dim_arrow(),
        summary.average_confidence,
        summary.success_ratio * 100.0
    );
    println!(
        "  {} {:.1} items/min over {}",
        dim_arrow(),
        summary.throughput_per_minute,
        format_duration(std::time::Duration::from_millis(summary.elapsed_ms))
    );
    if !summary.category_distribution.is_empty() {
        let categories: Vec<String> = summary
            .category_distribution
            .iter()
            .map(|(category, count)| format!("{} {}", category, count))
            .collect();
        println!("  {} Categories: {}", dim_arrow(), categories.join(", "));
    }
}
