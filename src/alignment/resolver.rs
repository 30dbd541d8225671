//! Monotonic edit alignment of segments onto reference lines.
//!
//! The table is indexed by `(segments consumed, lines consumed)`. Each cell keeps
//! the best total gain reaching it, the locality drift of that path and the step
//! that got there. Rows only store the line columns the neighboring segment
//! windows can reach.

use std::ops::Range;

use serde::Serialize;

use crate::alignment::matcher::CandidateTable;
use crate::alignment::segment_store::SegmentStore;
use crate::config::AlignerConfig;
use crate::error::AlignmentError;
use crate::pipeline::traits::CandidateScorer;
use crate::types::MatchKind;

const GAIN_EPSILON: f64 = 1e-9;

/// A merge or split must beat every single pair it covers by this much.
pub const MIN_SPAN_IMPROVEMENT: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Match,
    Merge,
    Split,
    Deletion,
    Insertion,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::Merge => "merge",
            Self::Split => "split",
            Self::Deletion => "deletion",
            Self::Insertion => "insertion",
        }
    }

    /// Steps that pair segments with lines and therefore carry timing.
    pub fn is_committed(self) -> bool {
        matches!(self, Self::Match | Self::Merge | Self::Split)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentStep {
    pub kind: StepKind,
    /// Store positions of the consumed segments.
    pub segments: Range<usize>,
    /// Store positions of the consumed lines.
    pub lines: Range<usize>,
    /// 0.0 for deletions and insertions.
    pub score: f32,
    /// The score came from an oracle-backed candidate.
    pub semantic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// In sequence order; consecutive steps tile both axes.
    pub steps: Vec<AlignmentStep>,
    pub total_gain: f64,
    pub global_score: f32,
}

impl Resolution {
    pub fn committed(&self) -> impl Iterator<Item = &AlignmentStep> {
        self.steps.iter().filter(|step| step.kind.is_committed())
    }

    pub fn count(&self, kind: StepKind) -> usize {
        self.steps.iter().filter(|step| step.kind == kind).count()
    }

    pub fn matched_line_count(&self) -> usize {
        self.committed().map(|step| step.lines.len()).sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct Back {
    kind: StepKind,
    segments: usize,
    lines: usize,
    score: f32,
    semantic: bool,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    gain: f64,
    /// Segments and lines skipped between consecutive committed steps.
    drift: usize,
    /// Cell where the last committed step of this path ended.
    anchor: (usize, usize),
    back: Option<Back>,
}

impl Cell {
    const UNREACHED: Cell = Cell {
        gain: f64::NEG_INFINITY,
        drift: usize::MAX,
        anchor: (0, 0),
        back: None,
    };

    fn is_reached(&self) -> bool {
        self.gain.is_finite()
    }

    /// Take `step` from `source` into `(i, j)` if it beats what the cell holds.
    /// Gains within epsilon are ranked by drift, so the path that stays closer to
    /// its previous committed step wins; remaining ties keep the earlier offer.
    fn relax(&mut self, source: Cell, step_gain: f64, step: Back, (i, j): (usize, usize)) {
        let (drift, anchor) = if step.kind.is_committed() {
            let from = (i - step.segments, j - step.lines);
            let skipped = (from.0 - source.anchor.0) + (from.1 - source.anchor.1);
            (source.drift + skipped, (i, j))
        } else {
            (source.drift, source.anchor)
        };
        let gain = source.gain + step_gain;
        let better = gain > self.gain + GAIN_EPSILON
            || (gain >= self.gain - GAIN_EPSILON && drift < self.drift);
        if better {
            *self = Cell {
                gain,
                drift,
                anchor,
                back: Some(step),
            };
        }
    }
}

/// Row-banded DP storage. Row `i` spans the union of the windows of segments
/// `i - 1` and `i`, widened so that bands never move backwards; consecutive rows
/// always overlap, which keeps every stored cell reachable from `(0, 0)`.
struct Lattice {
    lo: Vec<usize>,
    hi: Vec<usize>,
    offsets: Vec<usize>,
    cells: Vec<Cell>,
}

impl Lattice {
    fn for_table(table: &CandidateTable, segment_count: usize, line_count: usize) -> Self {
        let n = segment_count;
        let m = line_count;
        let mut lo = vec![0; n + 1];
        let mut hi = vec![m; n + 1];
        for i in 0..=n {
            let windows = [i.checked_sub(1), (i < n).then_some(i)]
                .into_iter()
                .flatten()
                .filter_map(|segment| table.window(segment));
            let (row_lo, row_hi) = windows.fold((m, 0), |(start, end), window| {
                (start.min(window.start), end.max(window.end))
            });
            if row_lo <= row_hi {
                lo[i] = row_lo;
                hi[i] = row_hi;
            }
        }
        lo[0] = 0;
        hi[n] = m;
        for i in (0..n).rev() {
            lo[i] = lo[i].min(lo[i + 1]);
        }
        for i in 1..=n {
            hi[i] = hi[i].max(hi[i - 1]);
        }

        let mut offsets = Vec::with_capacity(n + 1);
        let mut total = 0;
        for i in 0..=n {
            offsets.push(total);
            total += hi[i] - lo[i] + 1;
        }
        Self {
            lo,
            hi,
            offsets,
            cells: vec![Cell::UNREACHED; total],
        }
    }

    fn columns(&self, i: usize) -> std::ops::RangeInclusive<usize> {
        self.lo[i]..=self.hi[i]
    }

    fn slot(&self, i: usize, j: usize) -> Option<usize> {
        let (lo, hi) = (*self.lo.get(i)?, *self.hi.get(i)?);
        (lo..=hi)
            .contains(&j)
            .then(|| self.offsets[i] + j - lo)
    }

    /// A reached cell, or `None` outside the band.
    fn get(&self, i: usize, j: usize) -> Option<Cell> {
        self.slot(i, j)
            .map(|slot| self.cells[slot])
            .filter(Cell::is_reached)
    }

    fn set(&mut self, i: usize, j: usize, cell: Cell) {
        if let Some(slot) = self.slot(i, j) {
            self.cells[slot] = cell;
        }
    }

    fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// Highest-gain order-preserving assignment of segments to lines.
///
/// Every committed step earns `score - min_candidate_score`, less `span_penalty`
/// for each unit a merge or split consumes beyond one pair. Steps with no
/// positive gain are never committed, and a line no segment covers stays an
/// insertion.
pub fn resolve_alignment(
    store: &SegmentStore,
    table: &CandidateTable,
    scorer: &dyn CandidateScorer,
    config: &AlignerConfig,
) -> Result<Resolution, AlignmentError> {
    let n = store.segment_count();
    let m = store.line_count();
    let floor = f64::from(config.min_candidate_score);
    let penalty = f64::from(config.span_penalty);
    let gain = |score: f32, consumed: usize| -> f64 {
        f64::from(score) - floor - penalty * (consumed as f64 - 2.0)
    };

    let mut lattice = Lattice::for_table(table, n, m);
    lattice.set(
        0,
        0,
        Cell {
            gain: 0.0,
            drift: 0,
            anchor: (0, 0),
            back: None,
        },
    );

    for i in 0..=n {
        for j in lattice.columns(i) {
            if i == 0 && j == 0 {
                continue;
            }
            let at = (i, j);
            let mut cell = Cell::UNREACHED;
            let commit = |cell: &mut Cell, source: Option<Cell>, step: Back, consumed: usize| {
                let step_gain = gain(step.score, consumed);
                if let Some(source) = source.filter(|_| step_gain > GAIN_EPSILON) {
                    cell.relax(source, step_gain, step, at);
                }
            };

            if i > 0 && j > 0 {
                if let Some(score) = table.score(i - 1, j - 1) {
                    let semantic = table.best_kind(i - 1, j - 1) == Some(MatchKind::Semantic);
                    commit(
                        &mut cell,
                        lattice.get(i - 1, j - 1),
                        Back {
                            kind: StepKind::Match,
                            segments: 1,
                            lines: 1,
                            score,
                            semantic,
                        },
                        2,
                    );
                }
            }

            if j > 0 {
                for k in 2..=config.max_merge_segments.min(i) {
                    let Some(source) = lattice.get(i - k, j - 1) else {
                        continue;
                    };
                    if let Some(score) = merge_score(store, table, scorer, i - k..i, j - 1, floor) {
                        commit(
                            &mut cell,
                            Some(source),
                            Back {
                                kind: StepKind::Merge,
                                segments: k,
                                lines: 1,
                                score,
                                semantic: false,
                            },
                            k + 1,
                        );
                    }
                }
            }

            if i > 0 {
                for k in 2..=config.max_split_lines.min(j) {
                    let Some(source) = lattice.get(i - 1, j - k) else {
                        continue;
                    };
                    if let Some(score) = split_score(store, table, scorer, i - 1, j - k..j, floor) {
                        commit(
                            &mut cell,
                            Some(source),
                            Back {
                                kind: StepKind::Split,
                                segments: 1,
                                lines: k,
                                score,
                                semantic: false,
                            },
                            k + 1,
                        );
                    }
                }
            }

            if i > 0 {
                if let Some(source) = lattice.get(i - 1, j) {
                    cell.relax(source, 0.0, gap_step(StepKind::Deletion, 1, 0), at);
                }
            }
            if j > 0 {
                if let Some(source) = lattice.get(i, j - 1) {
                    cell.relax(source, 0.0, gap_step(StepKind::Insertion, 0, 1), at);
                }
            }

            lattice.set(i, j, cell);
        }
    }

    let steps = trace_back(&lattice, n, m)?;
    let weighted: f64 = steps
        .iter()
        .filter(|step| step.kind.is_committed())
        .map(|step| f64::from(step.score) * (step.segments.len() + step.lines.len()) as f64)
        .sum();
    let global_score = (weighted / (n + m) as f64) as f32;
    let resolution = Resolution {
        steps,
        total_gain: lattice.get(n, m).map_or(0.0, |cell| cell.gain),
        global_score,
    };

    tracing::debug!(
        matches = resolution.count(StepKind::Match),
        merges = resolution.count(StepKind::Merge),
        splits = resolution.count(StepKind::Split),
        deletions = resolution.count(StepKind::Deletion),
        insertions = resolution.count(StepKind::Insertion),
        global_score = resolution.global_score,
        total_gain = resolution.total_gain,
        cells = lattice.cell_count(),
        "alignment resolved"
    );

    let matched_lines = resolution.matched_line_count();
    if matched_lines == 0 || resolution.global_score < config.min_global_score {
        return Err(AlignmentError::NoViableAlignment {
            best_score: resolution.global_score,
            min_score: config.min_global_score,
            matched_lines,
        });
    }
    Ok(resolution)
}

fn gap_step(kind: StepKind, segments: usize, lines: usize) -> Back {
    Back {
        kind,
        segments,
        lines,
        score: 0.0,
        semantic: false,
    }
}

/// Joined score for a span step, if it clears the floor and improves on the
/// best single pair inside the span by [`MIN_SPAN_IMPROVEMENT`].
fn span_score(score: f32, best_single: f32, floor: f64) -> Option<f32> {
    (f64::from(score) >= floor && score >= best_single + MIN_SPAN_IMPROVEMENT).then_some(score)
}

/// Several segments onto one line: every pair in window and at least one proposed.
fn merge_score(
    store: &SegmentStore,
    table: &CandidateTable,
    scorer: &dyn CandidateScorer,
    segments: Range<usize>,
    line: usize,
    floor: f64,
) -> Option<f32> {
    if !segments.clone().all(|s| table.in_window(s, line)) {
        return None;
    }
    let best_single = segments
        .clone()
        .filter_map(|s| table.score(s, line))
        .max_by(f32::total_cmp)?;
    let joined: String = store.segments()[segments]
        .iter()
        .map(|segment| segment.normalized.as_str())
        .collect();
    let score = scorer.score(&joined, &store.lines()[line].normalized);
    span_score(score, best_single, floor)
}

/// One segment onto several lines, under the same conditions as a merge.
fn split_score(
    store: &SegmentStore,
    table: &CandidateTable,
    scorer: &dyn CandidateScorer,
    segment: usize,
    lines: Range<usize>,
    floor: f64,
) -> Option<f32> {
    if !lines.clone().all(|l| table.in_window(segment, l)) {
        return None;
    }
    let best_single = lines
        .clone()
        .filter_map(|l| table.score(segment, l))
        .max_by(f32::total_cmp)?;
    let joined: String = store.lines()[lines]
        .iter()
        .map(|line| line.normalized.as_str())
        .collect();
    let score = scorer.score(&store.segments()[segment].normalized, &joined);
    span_score(score, best_single, floor)
}

fn trace_back(lattice: &Lattice, n: usize, m: usize) -> Result<Vec<AlignmentStep>, AlignmentError> {
    let mut steps = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let Some(step) = lattice.get(i, j).and_then(|cell| cell.back) else {
            return Err(AlignmentError::runtime(
                "alignment trace-back",
                format!("no step reaches cell ({i}, {j})"),
            ));
        };
        steps.push(AlignmentStep {
            kind: step.kind,
            segments: i - step.segments..i,
            lines: j - step.lines..j,
            score: step.score,
            semantic: step.semantic,
        });
        i -= step.segments;
        j -= step.lines;
    }
    steps.reverse();
    Ok(steps)
}
