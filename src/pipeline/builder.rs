use crate::config::AlignerConfig;
use crate::error::AlignmentError;
use crate::pipeline::abort::AbortHandle;
use crate::pipeline::defaults::{DefaultProjector, DpResolver, FuzzyScorer, ScriptNormalizer};
use crate::pipeline::runtime::{SubtitleAligner, SubtitleAlignerParts};
use crate::pipeline::traits::{
    CandidateScorer, SemanticOracle, SequenceResolver, TextNormalizer, TimestampProjector,
};

pub struct SubtitleAlignerBuilder {
    config: AlignerConfig,
    normalizer: Option<Box<dyn TextNormalizer>>,
    scorer: Option<Box<dyn CandidateScorer>>,
    resolver: Option<Box<dyn SequenceResolver>>,
    projector: Option<Box<dyn TimestampProjector>>,
    oracle: Option<Box<dyn SemanticOracle>>,
    abort: Option<AbortHandle>,
}

impl SubtitleAlignerBuilder {
    pub fn new(config: AlignerConfig) -> Self {
        Self {
            config,
            normalizer: None,
            scorer: None,
            resolver: None,
            projector: None,
            oracle: None,
            abort: None,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Box<dyn TextNormalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn with_scorer(mut self, scorer: Box<dyn CandidateScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_resolver(mut self, resolver: Box<dyn SequenceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_projector(mut self, projector: Box<dyn TimestampProjector>) -> Self {
        self.projector = Some(projector);
        self
    }

    pub fn with_oracle(mut self, oracle: Box<dyn SemanticOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn build(self) -> Result<SubtitleAligner, AlignmentError> {
        self.config.validate()?;
        Ok(SubtitleAligner::from_parts(SubtitleAlignerParts {
            config: self.config,
            normalizer: self
                .normalizer
                .unwrap_or_else(|| Box::new(ScriptNormalizer)),
            scorer: self.scorer.unwrap_or_else(|| Box::new(FuzzyScorer)),
            resolver: self.resolver.unwrap_or_else(|| Box::new(DpResolver)),
            projector: self
                .projector
                .unwrap_or_else(|| Box::new(DefaultProjector)),
            oracle: self.oracle,
            abort: self.abort.unwrap_or_default(),
        }))
    }
}
