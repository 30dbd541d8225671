use std::fmt;

use crate::alignment::matcher::{augment_with_oracle, build_candidate_table};
use crate::alignment::resolver::StepKind;
use crate::alignment::segment_store::SegmentStore;
use crate::config::AlignerConfig;
use crate::error::AlignmentError;
use crate::export::{emitter_for, TrackFormat};
use crate::pipeline::abort::AbortHandle;
use crate::pipeline::traits::{
    CandidateScorer, SemanticOracle, SequenceResolver, TextNormalizer, TimestampProjector,
};
use crate::types::{
    AlignedEntry, AlignmentInput, AlignmentOutput, AlignmentSummary, AlignmentWarning, Confidence,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Normalize,
    Match,
    Resolve,
    Project,
    Emit,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Normalize,
        PipelineStage::Match,
        PipelineStage::Resolve,
        PipelineStage::Project,
        PipelineStage::Emit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::Match => "match",
            Self::Resolve => "resolve",
            Self::Project => "project",
            Self::Emit => "emit",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-shot alignment pipeline. Holds strategies and configuration only; every
/// call to [`SubtitleAligner::align`] allocates its own run state.
pub struct SubtitleAligner {
    config: AlignerConfig,
    normalizer: Box<dyn TextNormalizer>,
    scorer: Box<dyn CandidateScorer>,
    resolver: Box<dyn SequenceResolver>,
    projector: Box<dyn TimestampProjector>,
    oracle: Option<Box<dyn SemanticOracle>>,
    abort: AbortHandle,
}

pub(crate) struct SubtitleAlignerParts {
    pub config: AlignerConfig,
    pub normalizer: Box<dyn TextNormalizer>,
    pub scorer: Box<dyn CandidateScorer>,
    pub resolver: Box<dyn SequenceResolver>,
    pub projector: Box<dyn TimestampProjector>,
    pub oracle: Option<Box<dyn SemanticOracle>>,
    pub abort: AbortHandle,
}

impl SubtitleAligner {
    pub(crate) fn from_parts(parts: SubtitleAlignerParts) -> Self {
        Self {
            config: parts.config,
            normalizer: parts.normalizer,
            scorer: parts.scorer,
            resolver: parts.resolver,
            projector: parts.projector,
            oracle: parts.oracle,
            abort: parts.abort,
        }
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn oracle_label(&self) -> Option<String> {
        self.oracle.as_ref().map(|oracle| oracle.label())
    }

    pub fn align(&self, input: &AlignmentInput) -> Result<AlignmentOutput, AlignmentError> {
        self.align_observed(input, &mut |_| {})
    }

    /// Same as [`align`](Self::align), calling `on_stage` as each stage starts.
    pub fn align_observed(
        &self,
        input: &AlignmentInput,
        on_stage: &mut dyn FnMut(PipelineStage),
    ) -> Result<AlignmentOutput, AlignmentError> {
        self.enter(PipelineStage::Normalize, on_stage)?;
        let store = SegmentStore::build(
            &input.segments,
            &input.lines,
            self.config.monotonic_tolerance_ms,
            self.normalizer.as_ref(),
        )?;

        self.enter(PipelineStage::Match, on_stage)?;
        let mut table = build_candidate_table(&store, &self.config, self.scorer.as_ref());
        let mut warnings = Vec::new();
        if let Some(oracle) = &self.oracle {
            let outcome = augment_with_oracle(&mut table, &store, &self.config, oracle.as_ref())?;
            if outcome.quota_exhausted() && self.config.abort_on_oracle_quota {
                let reason = outcome
                    .failure
                    .as_ref()
                    .map_or_else(|| "oracle quota exhausted".to_string(), ToString::to_string);
                self.abort.abort(reason);
            }
            warnings.extend(outcome.warning());
        }

        self.enter(PipelineStage::Resolve, on_stage)?;
        let resolution =
            self.resolver
                .resolve(&store, &table, self.scorer.as_ref(), &self.config)?;

        self.enter(PipelineStage::Project, on_stage)?;
        let projection = self
            .projector
            .project(&store, &resolution, &table, &self.config)?;
        warnings.extend(projection.warnings.iter().cloned());

        for warning in &warnings {
            match warning {
                // Already logged by the projector with the line text.
                AlignmentWarning::LineDropped { .. } => {}
                other => tracing::warn!(warning = %other, "alignment warning"),
            }
        }

        let summary = AlignmentSummary {
            segment_count: store.segment_count(),
            line_count: store.line_count(),
            matched_count: count_confidence(&projection.entries, Confidence::Matched),
            interpolated_count: projection.interpolated_count,
            dropped_count: projection.dropped_count,
            deleted_segment_count: resolution.count(StepKind::Deletion),
            merge_count: resolution.count(StepKind::Merge),
            split_count: resolution.count(StepKind::Split),
            semantic_candidate_count: table.semantic_count(),
            global_score: resolution.global_score,
        };
        tracing::debug!(
            entries = projection.entries.len(),
            matched = summary.matched_count,
            interpolated = summary.interpolated_count,
            dropped = summary.dropped_count,
            global_score = summary.global_score,
            "alignment finished"
        );

        Ok(AlignmentOutput {
            entries: projection.entries,
            warnings,
            summary,
        })
    }

    /// Serializes aligned entries. Checks the abort handle first so an aborted
    /// run never produces a track.
    pub fn render(
        &self,
        entries: &[AlignedEntry],
        format: TrackFormat,
    ) -> Result<String, AlignmentError> {
        self.abort.check(PipelineStage::Emit.as_str())?;
        Ok(emitter_for(format).emit(entries))
    }

    fn enter(
        &self,
        stage: PipelineStage,
        on_stage: &mut dyn FnMut(PipelineStage),
    ) -> Result<(), AlignmentError> {
        self.abort.check(stage.as_str())?;
        tracing::debug!(stage = %stage, "pipeline stage");
        on_stage(stage);
        Ok(())
    }
}

fn count_confidence(entries: &[AlignedEntry], confidence: Confidence) -> usize {
    entries
        .iter()
        .filter(|entry| entry.confidence == confidence)
        .count()
}
