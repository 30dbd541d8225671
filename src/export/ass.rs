use crate::export::{clock_parts, strip_controls, TrackFormat};
use crate::pipeline::traits::TrackEmitter;
use crate::types::AlignedEntry;

/// Advanced SubStation Alpha v4+ writer with a single bottom-centered style.
#[derive(Debug, Clone)]
pub struct AssEmitter {
    pub font_name: String,
    pub font_size: u32,
    pub title: String,
}

impl Default for AssEmitter {
    fn default() -> Self {
        Self {
            font_name: "Arial".to_string(),
            font_size: 22,
            title: "Aligned script".to_string(),
        }
    }
}

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";
const EVENT_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

impl TrackEmitter for AssEmitter {
    fn format(&self) -> TrackFormat {
        TrackFormat::Ass
    }

    fn emit(&self, entries: &[AlignedEntry]) -> String {
        let mut out = String::new();
        out.push_str("[Script Info]\n");
        out.push_str(&format!("Title: {}\n", escape_field(&self.title)));
        out.push_str("ScriptType: v4.00+\n");
        out.push_str("WrapStyle: 0\n");
        out.push_str("ScaledBorderAndShadow: yes\n");
        out.push_str("PlayResX: 384\n");
        out.push_str("PlayResY: 288\n\n");

        out.push_str("[V4+ Styles]\n");
        out.push_str(STYLE_FORMAT);
        out.push('\n');
        out.push_str(&format!(
            "Style: Default,{},{},&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,2,2,2,10,10,10,1\n\n",
            escape_field(&self.font_name),
            self.font_size
        ));

        out.push_str("[Events]\n");
        out.push_str(EVENT_FORMAT);
        out.push('\n');
        for entry in entries {
            let name = entry.actor.as_deref().map(escape_field).unwrap_or_default();
            let (start_cs, end_cs) = event_span(entry.start_ms, entry.end_ms);
            out.push_str(&format!(
                "Dialogue: 0,{},{},Default,{},0,0,0,,{}\n",
                ass_timestamp(start_cs),
                ass_timestamp(end_cs),
                name,
                escape_text(&entry.text)
            ));
        }
        out
    }
}

/// Event bounds in centiseconds, rounded to nearest. An entry shorter than the
/// format's resolution still ends one centisecond after it starts.
fn event_span(start_ms: u64, end_ms: u64) -> (u64, u64) {
    let start_cs = (start_ms + 5) / 10;
    let end_cs = ((end_ms + 5) / 10).max(start_cs + 1);
    (start_cs, end_cs)
}

/// `h:mm:ss.cc`.
fn ass_timestamp(cs_total: u64) -> String {
    let (hours, minutes, seconds, _) = clock_parts(cs_total * 10);
    format!("{hours}:{minutes:02}:{seconds:02}.{:02}", cs_total % 100)
}

/// Override blocks and escapes become full-width so they render literally.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in strip_controls(text.trim()).chars() {
        match c {
            '\n' => out.push_str("\\N"),
            '{' => out.push('｛'),
            '}' => out.push('｝'),
            '\\' => out.push('＼'),
            other => out.push(other),
        }
    }
    out
}

/// Header and Name fields are comma separated and single-line.
fn escape_field(value: &str) -> String {
    strip_controls(value)
        .replace('\n', " ")
        .replace(',', "，")
        .trim()
        .to_string()
}
