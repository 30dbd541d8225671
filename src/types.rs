use std::fmt;

use serde::{Deserialize, Serialize};

/// One recognized speech unit from the transcription provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    /// Millisecond interval is [start_ms, end_ms), i.e. start inclusive/end exclusive.
    pub start_ms: u64,
    /// Millisecond interval is [start_ms, end_ms), i.e. start inclusive/end exclusive.
    pub end_ms: u64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            text: text.into(),
            start_ms,
            end_ms,
        }
    }

    pub fn from_secs(text: impl Into<String>, start_sec: f64, end_sec: f64) -> Self {
        Self::new(text, secs_to_ms(start_sec), secs_to_ms(end_sec))
    }
}

/// One line of the clean reference script, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLine {
    pub index: usize,
    pub text: String,
    /// Speaker label from an `ACTOR : TEXT` script line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl ReferenceLine {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            actor: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    Semantic,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Semantic => "semantic",
        }
    }
}

/// Proposed pairing of a transcript segment with a reference line.
///
/// Indices are positions inside the segment store, not `ReferenceLine::index`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateMatch {
    pub segment_index: usize,
    pub line_index: usize,
    /// Similarity in [0, 1].
    pub score: f32,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Matched,
    Interpolated,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Interpolated => "interpolated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedEntry {
    /// `ReferenceLine::index` of the line this entry displays.
    pub line_index: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Millisecond interval is [start_ms, end_ms), i.e. start inclusive/end exclusive.
    pub start_ms: u64,
    /// Millisecond interval is [start_ms, end_ms), i.e. start inclusive/end exclusive.
    pub end_ms: u64,
    pub confidence: Confidence,
    /// Score of the resolver step that produced the timing. `None` when interpolated.
    pub score: Option<f32>,
}

impl AlignedEntry {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlignmentInput {
    pub segments: Vec<TranscriptSegment>,
    pub lines: Vec<ReferenceLine>,
}

/// Recoverable problems met during a run. Fatal problems are `AlignmentError`s.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignmentWarning {
    /// Oracle calls failed; the affected segments fell back to fuzzy-only candidates.
    OracleUnavailable {
        degraded_segments: usize,
        quota_exhausted: bool,
        message: String,
    },
    /// An unmatched line removed by the insertion policy.
    LineDropped { line_index: usize, text: String },
    /// Overlapping transcript timing shortened the previous entry.
    OverlapTrimmed { line_index: usize, trimmed_ms: u64 },
}

impl fmt::Display for AlignmentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OracleUnavailable {
                degraded_segments,
                quota_exhausted,
                message,
            } => {
                let cause = if *quota_exhausted {
                    "quota exhausted"
                } else {
                    "unavailable"
                };
                write!(
                    f,
                    "semantic oracle {cause}, {degraded_segments} segment(s) matched fuzzy-only: {message}"
                )
            }
            Self::LineDropped { line_index, text } => {
                write!(f, "reference line {line_index} dropped without timing: {text}")
            }
            Self::OverlapTrimmed {
                line_index,
                trimmed_ms,
            } => write!(
                f,
                "reference line {line_index} shortened by {trimmed_ms} ms to avoid overlap"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignmentSummary {
    pub segment_count: usize,
    pub line_count: usize,
    pub matched_count: usize,
    pub interpolated_count: usize,
    pub dropped_count: usize,
    pub deleted_segment_count: usize,
    pub merge_count: usize,
    pub split_count: usize,
    pub semantic_candidate_count: usize,
    pub global_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentOutput {
    pub entries: Vec<AlignedEntry>,
    pub warnings: Vec<AlignmentWarning>,
    pub summary: AlignmentSummary,
}

pub(crate) fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    }
}
