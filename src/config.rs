use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AlignmentError;

/// What to do with reference lines the resolver could not pair with any segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionPolicy {
    /// Keep every unmatched line with interpolated timing.
    #[default]
    Keep,
    /// Drop unmatched lines that no segment ever proposed as a candidate.
    DropUnsupported,
    /// Drop every unmatched line.
    DropAll,
}

impl InsertionPolicy {
    pub const ALL: [InsertionPolicy; 3] = [
        InsertionPolicy::Keep,
        InsertionPolicy::DropUnsupported,
        InsertionPolicy::DropAll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::DropUnsupported => "drop_unsupported",
            Self::DropAll => "drop_all",
        }
    }
}

impl fmt::Display for InsertionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsertionPolicy {
    type Err = AlignmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == normalized)
            .ok_or_else(|| {
                AlignmentError::invalid_config(format!("unknown insertion policy '{value}'"))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    /// Reference lines searched on each side of a segment's expected position.
    pub window_lines: usize,
    /// Candidates kept per segment.
    pub max_candidates: usize,
    /// Similarity below which a pair is not a viable candidate.
    pub min_candidate_score: f32,
    pub max_merge_segments: usize,
    pub max_split_lines: usize,
    /// Gain subtracted per extra unit consumed by a merge or split.
    pub span_penalty: f32,
    pub min_line_duration_ms: u64,
    /// How far a segment may start before its predecessor and still be accepted.
    pub monotonic_tolerance_ms: u64,
    pub min_global_score: f32,
    pub insertion_policy: InsertionPolicy,
    pub oracle_concurrency: usize,
    pub oracle_batch_size: usize,
    /// Abort the run instead of degrading when the oracle reports quota exhaustion.
    pub abort_on_oracle_quota: bool,
}

impl AlignerConfig {
    pub const DEFAULT_WINDOW_LINES: usize = 24;
    pub const DEFAULT_MAX_CANDIDATES: usize = 5;
    pub const DEFAULT_MIN_CANDIDATE_SCORE: f32 = 0.2;
    pub const DEFAULT_MAX_MERGE_SEGMENTS: usize = 4;
    pub const DEFAULT_MAX_SPLIT_LINES: usize = 3;
    pub const DEFAULT_SPAN_PENALTY: f32 = 0.02;
    pub const DEFAULT_MIN_LINE_DURATION_MS: u64 = 1_000;
    pub const DEFAULT_MONOTONIC_TOLERANCE_MS: u64 = 500;
    pub const DEFAULT_MIN_GLOBAL_SCORE: f32 = 0.1;
    pub const DEFAULT_ORACLE_CONCURRENCY: usize = 4;
    pub const DEFAULT_ORACLE_BATCH_SIZE: usize = 8;

    pub fn load(path: &Path) -> Result<Self, AlignmentError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| AlignmentError::io("read aligner config", e))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| AlignmentError::json("parse aligner config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AlignmentError> {
        if self.window_lines == 0 {
            return Err(AlignmentError::invalid_config("window_lines must be >= 1"));
        }
        if self.max_candidates == 0 {
            return Err(AlignmentError::invalid_config("max_candidates must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.min_candidate_score) {
            return Err(AlignmentError::invalid_config(format!(
                "min_candidate_score must be within [0, 1], got {}",
                self.min_candidate_score
            )));
        }
        if !(0.0..=1.0).contains(&self.min_global_score) {
            return Err(AlignmentError::invalid_config(format!(
                "min_global_score must be within [0, 1], got {}",
                self.min_global_score
            )));
        }
        if !self.span_penalty.is_finite() || self.span_penalty < 0.0 {
            return Err(AlignmentError::invalid_config(
                "span_penalty must be a non-negative number",
            ));
        }
        if self.max_merge_segments == 0 || self.max_split_lines == 0 {
            return Err(AlignmentError::invalid_config(
                "max_merge_segments and max_split_lines must be >= 1",
            ));
        }
        if self.min_line_duration_ms == 0 {
            return Err(AlignmentError::invalid_config(
                "min_line_duration_ms must be >= 1",
            ));
        }
        if self.oracle_concurrency == 0 || self.oracle_batch_size == 0 {
            return Err(AlignmentError::invalid_config(
                "oracle_concurrency and oracle_batch_size must be >= 1",
            ));
        }
        Ok(())
    }
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            window_lines: Self::DEFAULT_WINDOW_LINES,
            max_candidates: Self::DEFAULT_MAX_CANDIDATES,
            min_candidate_score: Self::DEFAULT_MIN_CANDIDATE_SCORE,
            max_merge_segments: Self::DEFAULT_MAX_MERGE_SEGMENTS,
            max_split_lines: Self::DEFAULT_MAX_SPLIT_LINES,
            span_penalty: Self::DEFAULT_SPAN_PENALTY,
            min_line_duration_ms: Self::DEFAULT_MIN_LINE_DURATION_MS,
            monotonic_tolerance_ms: Self::DEFAULT_MONOTONIC_TOLERANCE_MS,
            min_global_score: Self::DEFAULT_MIN_GLOBAL_SCORE,
            insertion_policy: InsertionPolicy::Keep,
            oracle_concurrency: Self::DEFAULT_ORACLE_CONCURRENCY,
            oracle_batch_size: Self::DEFAULT_ORACLE_BATCH_SIZE,
            abort_on_oracle_quota: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligner_config_default() {
        let config = AlignerConfig::default();
        assert_eq!(config.window_lines, 24);
        assert_eq!(config.min_line_duration_ms, 1_000);
        assert_eq!(config.insertion_policy, InsertionPolicy::Keep);
        assert!(!config.abort_on_oracle_quota);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{ "window_lines": 8, "insertion_policy": "drop_all" }"#;
        let config: AlignerConfig = serde_json::from_str(json).expect("valid config json");
        assert_eq!(config.window_lines, 8);
        assert_eq!(config.insertion_policy, InsertionPolicy::DropAll);
        assert_eq!(
            config.max_candidates,
            AlignerConfig::DEFAULT_MAX_CANDIDATES
        );
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("aligner.json");
        std::fs::write(&path, r#"{ "min_line_duration_ms": 1500 }"#).expect("write config");
        let config = AlignerConfig::load(&path).expect("load config");
        assert_eq!(config.min_line_duration_ms, 1500);

        std::fs::write(&path, r#"{ "window_lines": 0 }"#).expect("write config");
        assert!(matches!(
            AlignerConfig::load(&path),
            Err(AlignmentError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn load_fails_on_missing_file() {
        let result = AlignerConfig::load(Path::new("/nonexistent/aligner.json"));
        assert!(matches!(result, Err(AlignmentError::Io { .. })));
    }

    #[test]
    fn validate_rejects_out_of_range_scores() {
        let config = AlignerConfig {
            min_candidate_score: 1.5,
            ..AlignerConfig::default()
        };
        assert!(config.validate().is_err());
        let config = AlignerConfig {
            min_line_duration_ms: 0,
            ..AlignerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn insertion_policy_parses_cli_spellings() {
        assert_eq!(
            "drop-unsupported".parse::<InsertionPolicy>().unwrap(),
            InsertionPolicy::DropUnsupported
        );
        assert_eq!("KEEP".parse::<InsertionPolicy>().unwrap(), InsertionPolicy::Keep);
        assert!("sometimes".parse::<InsertionPolicy>().is_err());
    }
}
