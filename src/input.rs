//! Loaders for the transcription dump and the OCR reference script.

use std::path::Path;

use serde::Deserialize;

use crate::alignment::normalization::split_actor;
use crate::error::AlignmentError;
use crate::types::{secs_to_ms, ReferenceLine, TranscriptSegment};

#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(default)]
    id: Option<u64>,
    start: f64,
    end: f64,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTranscript {
    Segments(Vec<RawSegment>),
    Wrapped { segments: Vec<RawSegment> },
}

pub fn load_transcript(path: &Path) -> Result<Vec<TranscriptSegment>, AlignmentError> {
    let data =
        std::fs::read_to_string(path).map_err(|e| AlignmentError::io("read transcript", e))?;
    parse_transcript_json(&data)
}

/// Accepts a bare segment array or an object with a `segments` array. Times are seconds.
pub fn parse_transcript_json(data: &str) -> Result<Vec<TranscriptSegment>, AlignmentError> {
    let raw: RawTranscript =
        serde_json::from_str(data).map_err(|e| AlignmentError::json("parse transcript", e))?;
    let raw_segments = match raw {
        RawTranscript::Segments(segments) => segments,
        RawTranscript::Wrapped { segments } => segments,
    };

    raw_segments
        .into_iter()
        .enumerate()
        .map(|(position, segment)| {
            let label = segment
                .id
                .map_or_else(|| format!("#{position}"), |id| format!("id {id}"));
            for (name, value) in [("start", segment.start), ("end", segment.end)] {
                if !value.is_finite() || value < 0.0 {
                    return Err(AlignmentError::malformed_input(format!(
                        "segment {label} has invalid {name} time {value}"
                    )));
                }
            }
            Ok(TranscriptSegment {
                text: segment.text.trim().to_string(),
                start_ms: secs_to_ms(segment.start),
                end_ms: secs_to_ms(segment.end),
            })
        })
        .collect()
}

pub fn load_reference(path: &Path) -> Result<Vec<ReferenceLine>, AlignmentError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| AlignmentError::io("read reference script", e))?;
    Ok(parse_reference_text(&data))
}

/// One reference line per non-empty text line, with `ACTOR : TEXT` labels split off.
pub fn parse_reference_text(data: &str) -> Vec<ReferenceLine> {
    data.lines()
        .map(|line| line.trim_start_matches('\u{feff}').trim())
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            let (actor, text) = split_actor(line);
            let reference = ReferenceLine::new(index, text);
            match actor {
                Some(actor) => reference.with_actor(actor),
                None => reference,
            }
        })
        .collect()
}
