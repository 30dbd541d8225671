use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context}: {message}")]
    Runtime {
        context: &'static str,
        message: String,
    },
    #[error("malformed input: {message}")]
    MalformedInput { message: String },
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
    #[error(
        "no viable alignment: global score {best_score:.3} is below the minimum {min_score:.3} \
         ({matched_lines} lines matched)"
    )]
    NoViableAlignment {
        best_score: f32,
        min_score: f32,
        matched_lines: usize,
    },
    #[error("degenerate interval for line {line_index}: [{start_ms}, {end_ms}) ms")]
    DegenerateInterval {
        line_index: usize,
        start_ms: u64,
        end_ms: u64,
    },
    #[error("alignment aborted before the {stage} stage: {reason}")]
    Aborted { stage: &'static str, reason: String },
}

impl AlignmentError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn runtime(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Runtime {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn malformed_input(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub(crate) fn degenerate(line_index: usize, start_ms: u64, end_ms: u64) -> Self {
        Self::DegenerateInterval {
            line_index,
            start_ms,
            end_ms,
        }
    }

    pub(crate) fn aborted(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Aborted {
            stage,
            reason: reason.into(),
        }
    }
}
