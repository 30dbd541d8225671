//! Timestamp projection from resolver steps onto reference lines.

use crate::alignment::matcher::CandidateTable;
use crate::alignment::resolver::{Resolution, StepKind};
use crate::alignment::segment_store::SegmentStore;
use crate::config::{AlignerConfig, InsertionPolicy};
use crate::error::AlignmentError;
use crate::types::{AlignedEntry, AlignmentWarning, Confidence};

/// Spans shorter than this cannot be shared by two entries.
const MIN_SHARED_SPAN_MS: u64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub entries: Vec<AlignedEntry>,
    pub warnings: Vec<AlignmentWarning>,
    pub interpolated_count: usize,
    pub dropped_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct Draft {
    /// Store position of the line.
    line: usize,
    start_ms: u64,
    end_ms: u64,
    score: Option<f32>,
}

impl Draft {
    fn is_interpolated(&self) -> bool {
        self.score.is_none()
    }

    fn duration(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

pub fn project_timestamps(
    store: &SegmentStore,
    resolution: &Resolution,
    table: &CandidateTable,
    config: &AlignerConfig,
) -> Result<Projection, AlignmentError> {
    let lines = store.lines();
    let mut warnings = Vec::new();

    let mut timed = committed_timings(store, resolution);
    clamp_committed(&mut timed, store, &mut warnings)?;

    let mut drafts = Vec::with_capacity(lines.len());
    let mut dropped_count = 0usize;
    for (position, timing) in timed.iter().enumerate() {
        if let Some((start_ms, end_ms, score)) = *timing {
            drafts.push(Draft {
                line: position,
                start_ms,
                end_ms,
                score: Some(score),
            });
            continue;
        }
        if should_drop(config.insertion_policy, table, position) {
            let line = &lines[position];
            tracing::warn!(
                line_index = line.index,
                policy = %config.insertion_policy,
                text = %line.text,
                "dropping unmatched reference line"
            );
            warnings.push(AlignmentWarning::LineDropped {
                line_index: line.index,
                text: line.text.clone(),
            });
            dropped_count += 1;
            continue;
        }
        drafts.push(Draft {
            line: position,
            start_ms: 0,
            end_ms: 0,
            score: None,
        });
    }

    interpolate_runs(&mut drafts, store, config.min_line_duration_ms)?;
    verify_invariants(&drafts, store)?;

    let interpolated_count = drafts.iter().filter(|d| d.is_interpolated()).count();
    let entries = drafts
        .into_iter()
        .map(|draft| {
            let line = &lines[draft.line];
            AlignedEntry {
                line_index: line.index,
                text: line.text.clone(),
                actor: line.actor.clone(),
                start_ms: draft.start_ms,
                end_ms: draft.end_ms,
                confidence: if draft.is_interpolated() {
                    Confidence::Interpolated
                } else {
                    Confidence::Matched
                },
                score: draft.score,
            }
        })
        .collect();

    Ok(Projection {
        entries,
        warnings,
        interpolated_count,
        dropped_count,
    })
}

/// Raw `(start, end, score)` per store line from match, merge and split steps.
fn committed_timings(store: &SegmentStore, resolution: &Resolution) -> Vec<Option<(u64, u64, f32)>> {
    let segments = store.segments();
    let lines = store.lines();
    let mut timed = vec![None; lines.len()];

    for step in resolution.committed() {
        let contributing = &segments[step.segments.clone()];
        let start = contributing.iter().map(|s| s.start_ms).min().unwrap_or(0);
        let end = contributing.iter().map(|s| s.end_ms).max().unwrap_or(start);

        if step.kind == StepKind::Split {
            let weights: Vec<u64> = lines[step.lines.clone()].iter().map(|l| l.weight()).collect();
            let total: u64 = weights.iter().sum();
            let span = end.saturating_sub(start);
            let mut cumulative = 0u64;
            let mut boundary = start;
            for (offset, weight) in weights.iter().enumerate() {
                cumulative += weight;
                let next = if offset + 1 == weights.len() {
                    end
                } else {
                    start + span * cumulative / total
                };
                timed[step.lines.start + offset] = Some((boundary, next, step.score));
                boundary = next;
            }
        } else {
            timed[step.lines.start] = Some((start, end, step.score));
        }
    }

    for (start, end, _) in timed.iter_mut().flatten() {
        if *end <= *start {
            *end = *start + 1;
        }
    }
    timed
}

/// Remove overlaps between consecutive committed lines.
fn clamp_committed(
    timed: &mut [Option<(u64, u64, f32)>],
    store: &SegmentStore,
    warnings: &mut Vec<AlignmentWarning>,
) -> Result<(), AlignmentError> {
    let committed: Vec<usize> = (0..timed.len()).filter(|&p| timed[p].is_some()).collect();
    for pair in committed.windows(2) {
        let (prev_pos, next_pos) = (pair[0], pair[1]);
        let (Some(prev), Some(next)) = (timed[prev_pos], timed[next_pos]) else {
            continue;
        };
        let (prev_start, prev_end, prev_score) = prev;
        let (next_start, next_end, next_score) = next;
        if next_start >= prev_end {
            continue;
        }

        let line_index = store.lines()[prev_pos].index;
        if next_start > prev_start {
            timed[prev_pos] = Some((prev_start, next_start, prev_score));
            warnings.push(AlignmentWarning::OverlapTrimmed {
                line_index,
                trimmed_ms: prev_end - next_start,
            });
            continue;
        }

        let hi = prev_end.max(next_end);
        if hi - prev_start < MIN_SHARED_SPAN_MS {
            return Err(AlignmentError::degenerate(
                store.lines()[next_pos].index,
                prev_start,
                hi,
            ));
        }
        let mid = prev_start + (hi - prev_start) / 2;
        timed[prev_pos] = Some((prev_start, mid, prev_score));
        timed[next_pos] = Some((mid, hi, next_score));
        if prev_end > mid {
            warnings.push(AlignmentWarning::OverlapTrimmed {
                line_index,
                trimmed_ms: prev_end - mid,
            });
        }
    }
    Ok(())
}

fn should_drop(policy: InsertionPolicy, table: &CandidateTable, line: usize) -> bool {
    match policy {
        InsertionPolicy::Keep => false,
        InsertionPolicy::DropUnsupported => !table.line_has_candidate(line),
        InsertionPolicy::DropAll => true,
    }
}

/// Give every run of interpolated lines a slot between its timed neighbors.
fn interpolate_runs(
    drafts: &mut [Draft],
    store: &SegmentStore,
    min_line_duration_ms: u64,
) -> Result<(), AlignmentError> {
    let mut position = 0usize;
    while position < drafts.len() {
        if !drafts[position].is_interpolated() {
            position += 1;
            continue;
        }
        let run_start = position;
        while position < drafts.len() && drafts[position].is_interpolated() {
            position += 1;
        }
        let run_end = position;
        let count = (run_end - run_start) as u64;
        let prev = run_start.checked_sub(1);
        let next = (run_end < drafts.len()).then_some(run_end);

        let (mut lo, mut hi) = match (prev, next) {
            (Some(p), Some(n)) => (drafts[p].end_ms, drafts[n].start_ms.max(drafts[p].end_ms)),
            (Some(p), None) => {
                let lo = drafts[p].end_ms;
                (lo, lo + count * min_line_duration_ms)
            }
            (None, Some(n)) => {
                let hi = drafts[n].start_ms;
                (hi.saturating_sub(count * min_line_duration_ms), hi)
            }
            (None, None) => (0, count * min_line_duration_ms),
        };

        if hi - lo < count {
            let mut needed = count - (hi - lo);
            if let Some(p) = prev {
                let take = needed.min(drafts[p].duration().saturating_sub(1) / 2);
                drafts[p].end_ms -= take;
                lo -= take;
                needed -= take;
            }
            if let Some(n) = next {
                let take = needed.min(drafts[n].duration().saturating_sub(1) / 2);
                drafts[n].start_ms += take;
                hi += take;
                needed -= take;
            }
            if needed > 0 {
                return Err(AlignmentError::degenerate(
                    store.lines()[drafts[run_start].line].index,
                    lo,
                    hi,
                ));
            }
            tracing::debug!(
                first_line = store.lines()[drafts[run_start].line].index,
                lines = count,
                "borrowed time from neighbors for interpolated lines"
            );
        }

        let slot = (hi - lo) / count;
        let duration = min_line_duration_ms.min(slot);
        for (offset, draft) in drafts[run_start..run_end].iter_mut().enumerate() {
            draft.start_ms = lo + offset as u64 * slot;
            draft.end_ms = draft.start_ms + duration;
        }
    }
    Ok(())
}

fn verify_invariants(drafts: &[Draft], store: &SegmentStore) -> Result<(), AlignmentError> {
    for (position, draft) in drafts.iter().enumerate() {
        let line_index = store.lines()[draft.line].index;
        if draft.start_ms >= draft.end_ms {
            return Err(AlignmentError::degenerate(line_index, draft.start_ms, draft.end_ms));
        }
        if let Some(next) = drafts.get(position + 1) {
            if next.line <= draft.line || draft.end_ms > next.start_ms {
                return Err(AlignmentError::degenerate(
                    store.lines()[next.line].index,
                    next.start_ms,
                    next.end_ms,
                ));
            }
        }
    }
    Ok(())
}
