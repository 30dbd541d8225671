use crate::alignment::matcher::CandidateTable;
use crate::alignment::normalization::{is_ocr_artifact, normalize_text};
use crate::alignment::projector::{project_timestamps, Projection};
use crate::alignment::resolver::{resolve_alignment, Resolution};
use crate::alignment::segment_store::SegmentStore;
use crate::alignment::similarity::text_similarity;
use crate::config::AlignerConfig;
use crate::error::AlignmentError;
use crate::pipeline::traits::{
    CandidateScorer, SequenceResolver, TextNormalizer, TimestampProjector,
};

/// Width folding, bracket stripping, romaji and katakana to hiragana.
pub struct ScriptNormalizer;

impl TextNormalizer for ScriptNormalizer {
    fn normalize(&self, text: &str) -> String {
        normalize_text(text)
    }

    fn is_artifact(&self, line: &str) -> bool {
        is_ocr_artifact(line)
    }
}

/// Blend of edit-distance similarity and bigram overlap.
pub struct FuzzyScorer;

impl CandidateScorer for FuzzyScorer {
    fn score(&self, segment: &str, line: &str) -> f32 {
        text_similarity(segment, line)
    }
}

pub struct DpResolver;

impl SequenceResolver for DpResolver {
    fn resolve(
        &self,
        store: &SegmentStore,
        table: &CandidateTable,
        scorer: &dyn CandidateScorer,
        config: &AlignerConfig,
    ) -> Result<Resolution, AlignmentError> {
        resolve_alignment(store, table, scorer, config)
    }
}

pub struct DefaultProjector;

impl TimestampProjector for DefaultProjector {
    fn project(
        &self,
        store: &SegmentStore,
        resolution: &Resolution,
        table: &CandidateTable,
        config: &AlignerConfig,
    ) -> Result<Projection, AlignmentError> {
        project_timestamps(store, resolution, table, config)
    }
}
