use serde::Serialize;

use crate::config::AlignerConfig;
use crate::error::AlignmentError;
use crate::types::{AlignedEntry, AlignmentOutput, AlignmentSummary, AlignmentWarning, Confidence};

pub const REPORT_SCHEMA_VERSION: u32 = 1;
const LOW_SCORE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub schema_version: u32,
    pub meta: Meta,
    pub summary: AlignmentSummary,
    pub structural: StructuralMetrics,
    pub scores: ScoreMetrics,
    pub entries: Vec<EntryTrace>,
    pub warnings: Vec<AlignmentWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub generated_at: String,
    pub transcript_path: String,
    pub reference_path: String,
    pub output_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle: Option<String>,
    pub config: AlignerConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructuralMetrics {
    pub non_positive_duration_count: u32,
    pub overlap_count: u32,
    pub non_monotonic_count: u32,
    pub short_interpolated_count: u32,
    /// Silence between entries over the track span.
    pub gap_ratio: f32,
    /// Kept lines over all reference lines.
    pub coverage_ratio: f32,
    pub track_span_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreMetrics {
    pub matched: Option<MetricDistribution>,
    pub low_score_ratio: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricDistribution {
    pub mean: f32,
    pub min: f32,
    pub p10: f32,
    pub p50: f32,
    pub p90: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryTrace {
    pub line_index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
    pub confidence: Confidence,
    pub score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub text: String,
}

pub fn build_report(
    meta: Meta,
    output: &AlignmentOutput,
    min_line_duration_ms: u64,
) -> Result<Report, AlignmentError> {
    let structural =
        compute_structural_metrics(&output.entries, &output.summary, min_line_duration_ms)?;
    let scores = compute_score_metrics(&output.entries)?;
    let entries = output
        .entries
        .iter()
        .map(|entry| EntryTrace {
            line_index: entry.line_index,
            start_ms: entry.start_ms,
            end_ms: entry.end_ms,
            duration_ms: entry.duration_ms(),
            confidence: entry.confidence,
            score: entry.score,
            actor: entry.actor.clone(),
            text: entry.text.clone(),
        })
        .collect();

    Ok(Report {
        schema_version: REPORT_SCHEMA_VERSION,
        meta,
        summary: output.summary.clone(),
        structural,
        scores,
        entries,
        warnings: output.warnings.clone(),
    })
}

fn compute_structural_metrics(
    entries: &[AlignedEntry],
    summary: &AlignmentSummary,
    min_line_duration_ms: u64,
) -> Result<StructuralMetrics, AlignmentError> {
    // Entries are [start_ms, end_ms), so end must be strictly greater than start.
    let non_positive_duration_count = entries.iter().filter(|e| e.end_ms <= e.start_ms).count();
    let short_interpolated_count = entries
        .iter()
        .filter(|e| e.confidence == Confidence::Interpolated && e.duration_ms() < min_line_duration_ms)
        .count();

    let mut overlap_count = 0usize;
    let mut non_monotonic_count = 0usize;
    let mut gap_ms = 0u64;
    for pair in entries.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        if current.end_ms > next.start_ms {
            overlap_count += 1;
        } else {
            gap_ms = gap_ms.saturating_add(next.start_ms - current.end_ms);
        }
        if current.start_ms > next.start_ms || current.line_index >= next.line_index {
            non_monotonic_count += 1;
        }
    }

    let track_span_ms = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => last.end_ms.saturating_sub(first.start_ms),
        _ => 0,
    };
    let gap_ratio = if track_span_ms > 0 {
        gap_ms as f64 / track_span_ms as f64
    } else {
        0.0
    };
    let coverage_ratio = if summary.line_count > 0 {
        entries.len() as f64 / summary.line_count as f64
    } else {
        0.0
    };

    Ok(StructuralMetrics {
        non_positive_duration_count: to_u32(non_positive_duration_count),
        overlap_count: to_u32(overlap_count),
        non_monotonic_count: to_u32(non_monotonic_count),
        short_interpolated_count: to_u32(short_interpolated_count),
        gap_ratio: checked_f32(gap_ratio, "structural.gap_ratio")?,
        coverage_ratio: checked_f32(coverage_ratio, "structural.coverage_ratio")?,
        track_span_ms,
    })
}

fn compute_score_metrics(entries: &[AlignedEntry]) -> Result<ScoreMetrics, AlignmentError> {
    let scores: Vec<f64> = entries
        .iter()
        .filter_map(|entry| entry.score.map(f64::from))
        .collect();
    let low = scores.iter().filter(|&&s| s < LOW_SCORE_THRESHOLD).count();
    let low_score_ratio = if scores.is_empty() {
        0.0
    } else {
        low as f64 / scores.len() as f64
    };
    Ok(ScoreMetrics {
        matched: distribution_or_none(&scores)?,
        low_score_ratio: checked_f32(low_score_ratio, "scores.low_score_ratio")?,
    })
}

fn distribution_or_none(values: &[f64]) -> Result<Option<MetricDistribution>, AlignmentError> {
    if values.is_empty() {
        return Ok(None);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(Some(MetricDistribution {
        mean: checked_f32(mean(&sorted), "scores.mean")?,
        min: checked_f32(sorted[0], "scores.min")?,
        p10: checked_f32(percentile_sorted(&sorted, 0.1), "scores.p10")?,
        p50: checked_f32(percentile_sorted(&sorted, 0.5), "scores.p50")?,
        p90: checked_f32(percentile_sorted(&sorted, 0.9), "scores.p90")?,
    }))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn percentile_sorted(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    if sorted_values.len() == 1 {
        return sorted_values[0];
    }

    let clamped = percentile.clamp(0.0, 1.0);
    let max_index = (sorted_values.len() - 1) as f64;
    let rank = clamped * max_index;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = rank - lower as f64;
        sorted_values[lower] * (1.0 - weight) + sorted_values[upper] * weight
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn checked_f32(value: f64, metric_name: &str) -> Result<f32, AlignmentError> {
    if !value.is_finite() || value < f32::MIN as f64 || value > f32::MAX as f64 {
        return Err(AlignmentError::runtime(
            "report metric",
            format!("'{metric_name}' produced unusable value {value}"),
        ));
    }
    Ok(value as f32)
}
