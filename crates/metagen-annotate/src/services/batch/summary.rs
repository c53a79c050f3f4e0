use std::collections::BTreeMap;
use std::time::Duration;

use metagen::models::{BatchItemResult, BatchSummary, GeneratedBy};

/// Aggregate item results into a summary.
///
/// `total` is the number of resolved targets, so `remaining` covers items that
/// were never dispatched (for example after cancellation).
pub fn summarize(total: usize, results: &[BatchItemResult], elapsed: Duration) -> BatchSummary {
    let mut summary = BatchSummary {
        total,
        processed: results.len(),
        remaining: total.saturating_sub(results.len()),
        elapsed_ms: elapsed.as_millis() as u64,
        ..BatchSummary::default()
    };

    let mut confidence_sum = 0.0;
    let mut confidence_count = 0usize;
    let mut categories: BTreeMap<String, usize> = BTreeMap::new();

    for result in results {
        if !result.success {
            summary.failed += 1;
            continue;
        }
        summary.succeeded += 1;
        match result.generated_by {
            Some(GeneratedBy::Ai) => summary.ai += 1,
            Some(GeneratedBy::Hybrid) => summary.hybrid += 1,
            Some(GeneratedBy::Fallback) => summary.fallback += 1,
            None => {}
        }
        if let Some(confidence) = result.confidence {
            confidence_sum += confidence;
            confidence_count += 1;
        }
        if let Some(category) = &result.category {
            *categories.entry(category.clone()).or_default() += 1;
        }
    }

    if confidence_count > 0 {
        summary.average_confidence = confidence_sum / confidence_count as f64;
    }
    if summary.processed > 0 {
        summary.success_ratio = summary.succeeded as f64 / summary.processed as f64;
    }
    let minutes = elapsed.as_secs_f64() / 60.0;
    if minutes > 0.0 {
        summary.throughput_per_minute = summary.processed as f64 / minutes;
    }
    summary.category_distribution = categories;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, by: Option<GeneratedBy>, confidence: f64, category: &str) -> BatchItemResult {
        BatchItemResult {
            target_id: id.to_string(),
            success: by.is_some(),
            retries: 0,
            duration_ms: 10,
            quality_score: 1.0,
            generated_by: by,
            confidence: by.map(|_| confidence),
            category: by.map(|_| category.to_string()),
            error: by.is_none().then(|| "catalog unavailable".to_string()),
            absorbed_errors: Vec::new(),
            chunk: 0,
        }
    }

    #[test]
    fn aggregates_outcomes() {
        let results = vec![
            item("a", Some(GeneratedBy::Ai), 0.9, "finance"),
            item("b", Some(GeneratedBy::Hybrid), 0.7, "finance"),
            item("c", Some(GeneratedBy::Fallback), 0.3, "general"),
            item("d", None, 0.0, ""),
        ];
        let summary = summarize(6, &results, Duration::from_secs(30));

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.remaining, 2);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!((summary.ai, summary.hybrid, summary.fallback), (1, 1, 1));
        assert!((summary.average_confidence - 0.6333).abs() < 1e-3);
        assert_eq!(summary.category_distribution["finance"], 2);
        assert_eq!(summary.category_distribution["general"], 1);
        assert!((summary.success_ratio - 0.75).abs() < 1e-9);
        assert!((summary.throughput_per_minute - 8.0).abs() < 1e-9);
    }

    #[test]
    fn empty_run() {
        let summary = summarize(0, &[], Duration::ZERO);
        assert_eq!(summary, BatchSummary::default());
    }
}
