//! Subtitle track serializers.

mod ass;
mod srt;
mod vtt;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

pub use ass::AssEmitter;
pub use srt::SrtEmitter;
pub use vtt::VttEmitter;

use crate::error::AlignmentError;
use crate::pipeline::traits::TrackEmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackFormat {
    #[default]
    Ass,
    Srt,
    Vtt,
}

impl TrackFormat {
    pub const ALL: [TrackFormat; 3] = [TrackFormat::Ass, TrackFormat::Srt, TrackFormat::Vtt];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ass => "ass",
            Self::Srt => "srt",
            Self::Vtt => "vtt",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }

    /// Format implied by the output file extension, if it is a known one.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "ass" | "ssa" => Some(Self::Ass),
            "srt" => Some(Self::Srt),
            "vtt" | "webvtt" => Some(Self::Vtt),
            _ => None,
        }
    }
}

impl fmt::Display for TrackFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackFormat {
    type Err = AlignmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ass" | "ssa" => Ok(Self::Ass),
            "srt" => Ok(Self::Srt),
            "vtt" | "webvtt" => Ok(Self::Vtt),
            _ => Err(AlignmentError::invalid_config(format!(
                "unknown track format '{value}' (expected ass, srt or vtt)"
            ))),
        }
    }
}

pub fn emitter_for(format: TrackFormat) -> Box<dyn TrackEmitter> {
    match format {
        TrackFormat::Ass => Box::new(AssEmitter::default()),
        TrackFormat::Srt => Box::new(SrtEmitter),
        TrackFormat::Vtt => Box::new(VttEmitter),
    }
}

/// Splits milliseconds into (hours, minutes, seconds, millis).
pub(crate) fn clock_parts(ms: u64) -> (u64, u64, u64, u64) {
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1_000) % 60;
    (hours, minutes, seconds, ms % 1_000)
}

/// Removes control characters other than line breaks and normalizes line endings.
pub(crate) fn strip_controls(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| *c == '\n' || !c.is_control())
        .collect()
}
