use crate::alignment::normalization::fold_whitespace;
use crate::error::AlignmentError;
use crate::pipeline::traits::TextNormalizer;
use crate::types::{ReferenceLine, TranscriptSegment};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSegment {
    pub text: String,
    pub normalized: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLine {
    /// `ReferenceLine::index` of the source line.
    pub index: usize,
    pub text: String,
    pub actor: Option<String>,
    pub normalized: String,
}

impl StoredLine {
    /// Weight used when a segment interval is shared between several lines.
    pub fn weight(&self) -> u64 {
        self.normalized.chars().count().max(1) as u64
    }
}

/// Normalized, validated, read-only view of one run's inputs.
///
/// Every later stage addresses segments and lines by their position in this
/// store, never by `ReferenceLine::index`.
#[derive(Debug, Clone)]
pub struct SegmentStore {
    segments: Vec<StoredSegment>,
    lines: Vec<StoredLine>,
}

impl SegmentStore {
    pub fn build(
        segments: &[TranscriptSegment],
        lines: &[ReferenceLine],
        monotonic_tolerance_ms: u64,
        normalizer: &dyn TextNormalizer,
    ) -> Result<Self, AlignmentError> {
        if segments.is_empty() {
            return Err(AlignmentError::malformed_input("transcript has no segments"));
        }

        let mut stored_segments = Vec::with_capacity(segments.len());
        let mut prev_start: Option<u64> = None;
        for (position, segment) in segments.iter().enumerate() {
            if let Some(prev) = prev_start {
                if segment.start_ms + monotonic_tolerance_ms < prev {
                    return Err(AlignmentError::malformed_input(format!(
                        "segment {position} starts at {} ms, before its predecessor at {prev} ms",
                        segment.start_ms
                    )));
                }
            }
            let end_ms = if segment.end_ms >= segment.start_ms {
                segment.end_ms
            } else if segment.start_ms - segment.end_ms <= monotonic_tolerance_ms {
                segment.start_ms
            } else {
                return Err(AlignmentError::malformed_input(format!(
                    "segment {position} ends at {} ms, before its start at {} ms",
                    segment.end_ms, segment.start_ms
                )));
            };
            prev_start = Some(segment.start_ms);
            stored_segments.push(StoredSegment {
                text: fold_whitespace(&segment.text),
                normalized: normalizer.normalize(&segment.text),
                start_ms: segment.start_ms,
                end_ms,
            });
        }

        let mut stored_lines = Vec::with_capacity(lines.len());
        let mut prev_index: Option<usize> = None;
        let mut artifact_count = 0usize;
        for line in lines {
            if prev_index.is_some_and(|prev| line.index <= prev) {
                return Err(AlignmentError::malformed_input(format!(
                    "reference line index {} does not follow {}",
                    line.index,
                    prev_index.unwrap_or_default()
                )));
            }
            prev_index = Some(line.index);
            if normalizer.is_artifact(&line.text) {
                tracing::debug!(
                    line_index = line.index,
                    text = %line.text,
                    "dropping OCR artifact line"
                );
                artifact_count += 1;
                continue;
            }
            stored_lines.push(StoredLine {
                index: line.index,
                text: fold_whitespace(&line.text),
                actor: line.actor.clone(),
                normalized: normalizer.normalize(&line.text),
            });
        }
        if stored_lines.is_empty() {
            return Err(AlignmentError::malformed_input(
                "reference script has no dialogue lines",
            ));
        }

        tracing::debug!(
            segments = stored_segments.len(),
            lines = stored_lines.len(),
            artifacts = artifact_count,
            "segment store built"
        );

        Ok(Self {
            segments: stored_segments,
            lines: stored_lines,
        })
    }

    pub fn segments(&self) -> &[StoredSegment] {
        &self.segments
    }

    pub fn lines(&self) -> &[StoredLine] {
        &self.lines
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Earliest segment start and latest segment end.
    pub fn time_span(&self) -> (u64, u64) {
        let start = self.segments.iter().map(|s| s.start_ms).min().unwrap_or(0);
        let end = self.segments.iter().map(|s| s.end_ms).max().unwrap_or(start);
        (start, end.max(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::defaults::ScriptNormalizer;

    fn build(
        segments: &[TranscriptSegment],
        lines: &[ReferenceLine],
    ) -> Result<SegmentStore, AlignmentError> {
        SegmentStore::build(segments, lines, 500, &ScriptNormalizer)
    }

    fn lines(texts: &[&str]) -> Vec<ReferenceLine> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| ReferenceLine::new(i, *t))
            .collect()
    }

    #[test]
    fn normalizes_both_sides() {
        let store = build(
            &[TranscriptSegment::new("  ohayou   gozaimasu ", 0, 1200)],
            &lines(&["おはようございます。"]),
        )
        .unwrap();
        assert_eq!(store.segments()[0].text, "ohayou gozaimasu");
        assert_eq!(store.segments()[0].normalized, "おはようございます");
        assert_eq!(store.lines()[0].normalized, "おはようございます");
    }

    #[test]
    fn drops_artifact_lines_but_keeps_source_index() {
        let store = build(
            &[TranscriptSegment::new("a", 0, 10)],
            &lines(&["- 3 -", "（拍手）", "おはよう"]),
        )
        .unwrap();
        assert_eq!(store.line_count(), 1);
        assert_eq!(store.lines()[0].index, 2);
    }

    #[test]
    fn empty_inputs_are_malformed() {
        assert!(matches!(
            build(&[], &lines(&["a"])),
            Err(AlignmentError::MalformedInput { .. })
        ));
        assert!(matches!(
            build(&[TranscriptSegment::new("a", 0, 10)], &lines(&["12"])),
            Err(AlignmentError::MalformedInput { .. })
        ));
    }

    #[test]
    fn small_backwards_steps_are_tolerated() {
        let store = build(
            &[
                TranscriptSegment::new("a", 1000, 2000),
                TranscriptSegment::new("b", 700, 1500),
                TranscriptSegment::new("c", 3000, 2800),
            ],
            &lines(&["a"]),
        )
        .unwrap();
        assert_eq!(store.segments()[2].end_ms, 3000);
        assert_eq!(store.time_span(), (700, 3000));
    }

    #[test]
    fn large_backwards_steps_are_malformed() {
        let starts_early = build(
            &[
                TranscriptSegment::new("a", 5000, 6000),
                TranscriptSegment::new("b", 1000, 2000),
            ],
            &lines(&["a"]),
        );
        assert!(matches!(
            starts_early,
            Err(AlignmentError::MalformedInput { .. })
        ));
        let ends_early = build(&[TranscriptSegment::new("a", 5000, 1000)], &lines(&["a"]));
        assert!(matches!(ends_early, Err(AlignmentError::MalformedInput { .. })));
    }

    #[test]
    fn line_indices_must_increase() {
        let result = build(
            &[TranscriptSegment::new("a", 0, 10)],
            &[ReferenceLine::new(3, "a"), ReferenceLine::new(3, "b")],
        );
        assert!(matches!(result, Err(AlignmentError::MalformedInput { .. })));
    }

    #[test]
    fn line_weight_is_at_least_one() {
        let store = build(
            &[TranscriptSegment::new("a", 0, 10)],
            &lines(&["……", "あいう"]),
        )
        .unwrap();
        assert_eq!(store.lines()[0].weight(), 1);
        assert_eq!(store.lines()[1].weight(), 3);
    }
}
