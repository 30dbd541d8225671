use crate::export::{clock_parts, strip_controls, TrackFormat};
use crate::pipeline::traits::TrackEmitter;
use crate::types::AlignedEntry;

#[derive(Debug, Clone, Copy, Default)]
pub struct VttEmitter;

impl TrackEmitter for VttEmitter {
    fn format(&self) -> TrackFormat {
        TrackFormat::Vtt
    }

    fn emit(&self, entries: &[AlignedEntry]) -> String {
        let mut out = String::from("WEBVTT\n");
        for entry in entries {
            let text = cue_text(&entry.text);
            let payload = match entry.actor.as_deref() {
                Some(actor) if !actor.trim().is_empty() => {
                    format!("<v {}>{text}", escape(&actor.replace('\n', " ")).trim())
                }
                _ => text,
            };
            out.push_str(&format!(
                "\n{} --> {}\n{payload}\n",
                vtt_timestamp(entry.start_ms),
                vtt_timestamp(entry.end_ms)
            ));
        }
        out
    }
}

fn vtt_timestamp(ms: u64) -> String {
    let (hours, minutes, seconds, millis) = clock_parts(ms);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn cue_text(text: &str) -> String {
    let lines: Vec<String> = strip_controls(text)
        .lines()
        .map(|line| escape(line.trim()))
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Confidence;

    fn entry(text: &str, actor: Option<&str>) -> AlignedEntry {
        AlignedEntry {
            line_index: 0,
            text: text.to_string(),
            actor: actor.map(str::to_string),
            start_ms: 1_500,
            end_ms: 62_250,
            confidence: Confidence::Matched,
            score: Some(0.9),
        }
    }

    #[test]
    fn header_and_cue_timing() {
        let out = VttEmitter.emit(&[entry("こんにちは", None)]);
        assert_eq!(out, "WEBVTT\n\n00:00:01.500 --> 00:01:02.250\nこんにちは\n");
    }

    #[test]
    fn actor_becomes_voice_span() {
        let out = VttEmitter.emit(&[entry("A & B <3", Some("ユキ"))]);
        assert!(out.contains("<v ユキ>A &amp; B &lt;3\n"));
    }

    #[test]
    fn empty_track_is_header_only() {
        assert_eq!(VttEmitter.emit(&[]), "WEBVTT\n");
    }
}
