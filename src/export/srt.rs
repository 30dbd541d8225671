use crate::export::{clock_parts, strip_controls, TrackFormat};
use crate::pipeline::traits::TrackEmitter;
use crate::types::AlignedEntry;

#[derive(Debug, Clone, Copy, Default)]
pub struct SrtEmitter;

impl TrackEmitter for SrtEmitter {
    fn format(&self) -> TrackFormat {
        TrackFormat::Srt
    }

    fn emit(&self, entries: &[AlignedEntry]) -> String {
        let mut out = String::new();
        for (cue, entry) in entries.iter().enumerate() {
            if cue > 0 {
                out.push('\n');
            }
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n",
                cue + 1,
                srt_timestamp(entry.start_ms),
                srt_timestamp(entry.end_ms),
                cue_text(&entry.text)
            ));
        }
        out
    }
}

fn srt_timestamp(ms: u64) -> String {
    let (hours, minutes, seconds, millis) = clock_parts(ms);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// A blank line ends an SRT cue, and `-->` would be read as a timing line.
fn cue_text(text: &str) -> String {
    let lines: Vec<String> = strip_controls(text)
        .lines()
        .map(|line| line.trim().replace("-->", "->"))
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        " ".to_string()
    } else {
        lines.join("\n")
    }
}
