//! Text-only semantic matching oracle.
//!
//! The matcher only sees [`SemanticOracle`](crate::pipeline::traits::SemanticOracle);
//! the HTTP client lives behind the `http-oracle` feature.

#[cfg(feature = "http-oracle")]
pub mod http;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One segment and the window of reference lines it may map to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleQuery {
    pub segment_text: String,
    pub candidate_line_texts: Vec<String>,
}

/// `candidate_index` addresses `OracleQuery::candidate_line_texts`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OracleProposal {
    pub candidate_index: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("oracle quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("oracle request timed out")]
    Timeout,
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
}

impl OracleError {
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExhausted(_))
    }
}
