//! Windowed candidate search between transcript segments and reference lines.

pub mod semantic;
mod window;

#[cfg(test)]
mod tests;

use rayon::prelude::*;

use crate::alignment::segment_store::SegmentStore;
use crate::config::AlignerConfig;
use crate::pipeline::traits::CandidateScorer;
use crate::types::{CandidateMatch, MatchKind};

pub use semantic::{augment_with_oracle, SemanticOutcome};
pub use window::LineWindow;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentCandidates {
    pub window: LineWindow,
    /// Ranked best first.
    pub candidates: Vec<CandidateMatch>,
}

/// Ranked candidates for every segment, addressed by store position.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTable {
    rows: Vec<SegmentCandidates>,
    max_candidates: usize,
}

impl CandidateTable {
    pub fn rows(&self) -> &[SegmentCandidates] {
        &self.rows
    }

    pub fn candidates(&self, segment: usize) -> &[CandidateMatch] {
        self.rows
            .get(segment)
            .map(|row| row.candidates.as_slice())
            .unwrap_or(&[])
    }

    pub fn window(&self, segment: usize) -> Option<LineWindow> {
        self.rows.get(segment).map(|row| row.window)
    }

    pub fn in_window(&self, segment: usize, line: usize) -> bool {
        self.window(segment).is_some_and(|window| window.contains(line))
    }

    /// Best candidate score for the pair, if the pair was proposed at all.
    pub fn score(&self, segment: usize, line: usize) -> Option<f32> {
        self.candidates(segment)
            .iter()
            .filter(|candidate| candidate.line_index == line)
            .map(|candidate| candidate.score)
            .max_by(f32::total_cmp)
    }

    pub fn best_kind(&self, segment: usize, line: usize) -> Option<MatchKind> {
        self.candidates(segment)
            .iter()
            .filter(|candidate| candidate.line_index == line)
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .map(|candidate| candidate.kind)
    }

    pub fn line_has_candidate(&self, line: usize) -> bool {
        self.rows
            .iter()
            .any(|row| row.candidates.iter().any(|c| c.line_index == line))
    }

    pub fn candidate_count(&self) -> usize {
        self.rows.iter().map(|row| row.candidates.len()).sum()
    }

    pub fn semantic_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.candidates.iter())
            .filter(|candidate| candidate.kind == MatchKind::Semantic)
            .count()
    }

    pub fn has_exact(&self, segment: usize) -> bool {
        self.candidates(segment)
            .iter()
            .any(|candidate| candidate.kind == MatchKind::Exact)
    }

    /// Add an oracle-backed candidate. A fuzzy or exact candidate for the same
    /// line that already scores at least as high wins; a weaker one is replaced.
    /// When the row is full the lowest-ranked non-semantic candidate makes room.
    pub(crate) fn add_semantic(&mut self, segment: usize, line: usize, confidence: f32) -> bool {
        let max_candidates = self.max_candidates;
        let Some(row) = self.rows.get_mut(segment) else {
            return false;
        };
        if !row.window.contains(line) {
            return false;
        }
        if row
            .candidates
            .iter()
            .any(|c| c.line_index == line && c.score >= confidence)
        {
            return false;
        }
        row.candidates.retain(|c| c.line_index != line);
        row.candidates.push(CandidateMatch {
            segment_index: segment,
            line_index: line,
            score: confidence,
            kind: MatchKind::Semantic,
        });
        rank_candidates(&mut row.candidates, &row.window);
        while row.candidates.len() > max_candidates {
            match row
                .candidates
                .iter()
                .rposition(|c| c.kind != MatchKind::Semantic)
            {
                Some(position) => {
                    row.candidates.remove(position);
                }
                None => break,
            }
        }
        true
    }
}

/// Score every segment against its window and keep the best `max_candidates`
/// pairs at or above `min_candidate_score`. Segments are scored in parallel.
pub fn build_candidate_table(
    store: &SegmentStore,
    config: &AlignerConfig,
    scorer: &dyn CandidateScorer,
) -> CandidateTable {
    let span = store.time_span();
    let lines = store.lines();

    let rows: Vec<SegmentCandidates> = store
        .segments()
        .par_iter()
        .enumerate()
        .map(|(segment_index, segment)| {
            let window = LineWindow::for_segment(
                segment.start_ms,
                span,
                lines.len(),
                config.window_lines,
            );
            let mut candidates: Vec<CandidateMatch> = window
                .range()
                .filter_map(|line_index| {
                    let line = &lines[line_index];
                    let score = scorer.score(&segment.normalized, &line.normalized);
                    if score <= 0.0 || score < config.min_candidate_score {
                        return None;
                    }
                    let kind = if segment.normalized == line.normalized {
                        MatchKind::Exact
                    } else {
                        MatchKind::Fuzzy
                    };
                    Some(CandidateMatch {
                        segment_index,
                        line_index,
                        score,
                        kind,
                    })
                })
                .collect();
            rank_candidates(&mut candidates, &window);
            candidates.truncate(config.max_candidates);
            SegmentCandidates { window, candidates }
        })
        .collect();

    let table = CandidateTable {
        rows,
        max_candidates: config.max_candidates,
    };
    tracing::debug!(
        segments = store.segment_count(),
        lines = store.line_count(),
        candidates = table.candidate_count(),
        "candidate table built"
    );
    table
}

/// Score descending, then closeness to the expected position, then reading order.
fn rank_candidates(candidates: &mut [CandidateMatch], window: &LineWindow) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| window.distance(a.line_index).cmp(&window.distance(b.line_index)))
            .then_with(|| a.line_index.cmp(&b.line_index))
    });
}
