pub mod alignment;
pub mod config;
pub mod error;
pub mod export;
pub mod input;
pub mod oracle;
pub mod pipeline;
pub mod types;

pub use config::{AlignerConfig, InsertionPolicy};
pub use error::AlignmentError;
pub use export::TrackFormat;
pub use oracle::{OracleError, OracleProposal, OracleQuery};
pub use pipeline::abort::AbortHandle;
pub use pipeline::builder::SubtitleAlignerBuilder;
pub use pipeline::runtime::{PipelineStage, SubtitleAligner};
pub use pipeline::traits::{
    CandidateScorer, SemanticOracle, SequenceResolver, TextNormalizer, TimestampProjector,
    TrackEmitter,
};
pub use types::{
    AlignedEntry, AlignmentInput, AlignmentOutput, AlignmentSummary, AlignmentWarning,
    Confidence, ReferenceLine, TranscriptSegment,
};
