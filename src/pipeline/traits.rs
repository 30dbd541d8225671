use crate::alignment::matcher::CandidateTable;
use crate::alignment::projector::Projection;
use crate::alignment::resolver::Resolution;
use crate::alignment::segment_store::SegmentStore;
use crate::config::AlignerConfig;
use crate::error::AlignmentError;
use crate::export::TrackFormat;
use crate::oracle::{OracleError, OracleProposal, OracleQuery};
use crate::types::AlignedEntry;

pub trait TextNormalizer: Send + Sync {
    /// Matching key for a segment or line. Must be applied identically to both sides.
    fn normalize(&self, text: &str) -> String;

    /// Reference lines that are never spoken and must not reach the resolver.
    fn is_artifact(&self, _line: &str) -> bool {
        false
    }
}

pub trait CandidateScorer: Send + Sync {
    /// Similarity in [0, 1] between two normalized strings.
    fn score(&self, segment: &str, line: &str) -> f32;
}

pub trait SequenceResolver: Send + Sync {
    fn resolve(
        &self,
        store: &SegmentStore,
        table: &CandidateTable,
        scorer: &dyn CandidateScorer,
        config: &AlignerConfig,
    ) -> Result<Resolution, AlignmentError>;
}

pub trait TimestampProjector: Send + Sync {
    fn project(
        &self,
        store: &SegmentStore,
        resolution: &Resolution,
        table: &CandidateTable,
        config: &AlignerConfig,
    ) -> Result<Projection, AlignmentError>;
}

pub trait SemanticOracle: Send + Sync {
    fn propose(
        &self,
        segment_text: &str,
        candidate_lines: &[String],
    ) -> Result<Option<OracleProposal>, OracleError>;

    /// One result per query, in query order. A failure fails the whole batch.
    fn propose_batch(
        &self,
        queries: &[OracleQuery],
    ) -> Result<Vec<Option<OracleProposal>>, OracleError> {
        queries
            .iter()
            .map(|query| self.propose(&query.segment_text, &query.candidate_line_texts))
            .collect()
    }

    fn label(&self) -> String {
        "oracle".to_string()
    }
}

pub trait TrackEmitter: Send + Sync {
    fn format(&self) -> TrackFormat;

    fn emit(&self, entries: &[AlignedEntry]) -> String;
}
