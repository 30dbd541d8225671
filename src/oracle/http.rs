//! Blocking JSON client for a text-only matching service.
//!
//! `POST {endpoint}` with `{"items":[{"segment_text", "candidate_line_texts"}]}`,
//! answered by `{"results":[{"best_line_index", "confidence"}]}` in item order.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AlignmentError;
use crate::oracle::{OracleError, OracleProposal, OracleQuery};
use crate::pipeline::traits::SemanticOracle;

#[derive(Debug, Clone)]
pub struct HttpOracleConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl HttpOracleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim().to_string(),
            api_key: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct HttpOracle {
    client: reqwest::blocking::Client,
    config: HttpOracleConfig,
}

impl HttpOracle {
    pub fn new(config: HttpOracleConfig) -> Result<Self, AlignmentError> {
        if config.endpoint.is_empty() {
            return Err(AlignmentError::invalid_config("oracle endpoint is empty"));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AlignmentError::runtime("build oracle HTTP client", e))?;
        Ok(Self { client, config })
    }
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    items: &'a [OracleQuery],
}

#[derive(Deserialize)]
struct BatchResponse {
    results: Vec<WireResult>,
}

#[derive(Deserialize)]
struct WireResult {
    best_line_index: Option<usize>,
    #[serde(default)]
    confidence: f32,
}

impl SemanticOracle for HttpOracle {
    fn propose(
        &self,
        segment_text: &str,
        candidate_lines: &[String],
    ) -> Result<Option<OracleProposal>, OracleError> {
        let query = OracleQuery {
            segment_text: segment_text.to_string(),
            candidate_line_texts: candidate_lines.to_vec(),
        };
        let mut results = self.propose_batch(std::slice::from_ref(&query))?;
        Ok(results.pop().flatten())
    }

    fn propose_batch(
        &self,
        queries: &[OracleQuery],
    ) -> Result<Vec<Option<OracleProposal>>, OracleError> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&BatchRequest { items: queries });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.trim());
        }

        let response = request.send().map_err(classify_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }
        let body = response.text().map_err(classify_transport_error)?;
        parse_batch_response(&body, queries)
    }

    fn label(&self) -> String {
        format!("http:{}", self.config.endpoint)
    }
}

fn classify_transport_error(err: reqwest::Error) -> OracleError {
    if err.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::Unavailable(err.to_string())
    }
}

fn classify_status(status: u16, body: &str) -> OracleError {
    let detail = format!("HTTP {status}: {}", body.trim());
    match status {
        429 => OracleError::QuotaExhausted(detail),
        408 | 504 => OracleError::Timeout,
        _ => OracleError::Unavailable(detail),
    }
}

fn parse_batch_response(
    body: &str,
    queries: &[OracleQuery],
) -> Result<Vec<Option<OracleProposal>>, OracleError> {
    let parsed: BatchResponse =
        serde_json::from_str(body).map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
    if parsed.results.len() != queries.len() {
        return Err(OracleError::InvalidResponse(format!(
            "expected {} results, got {}",
            queries.len(),
            parsed.results.len()
        )));
    }

    parsed
        .results
        .into_iter()
        .zip(queries)
        .map(|(result, query)| {
            let Some(index) = result.best_line_index else {
                return Ok(None);
            };
            if index >= query.candidate_line_texts.len() {
                return Err(OracleError::InvalidResponse(format!(
                    "best_line_index {index} outside {} candidates",
                    query.candidate_line_texts.len()
                )));
            }
            if !result.confidence.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
                return Err(OracleError::InvalidResponse(format!(
                    "confidence {} outside [0, 1]",
                    result.confidence
                )));
            }
            Ok(Some(OracleProposal {
                candidate_index: index,
                confidence: result.confidence,
            }))
        })
        .collect()
}
