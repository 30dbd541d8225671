use std::ops::Range;

/// Reference lines a segment may be compared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineWindow {
    /// Expected line position from the segment's place in the transcript timeline.
    pub center: usize,
    pub start: usize,
    /// Exclusive.
    pub end: usize,
}

impl LineWindow {
    /// Window for a segment starting at `start_ms`, given the transcript span and
    /// the number of lines. `line_count` must be at least 1.
    pub fn for_segment(
        start_ms: u64,
        (span_start_ms, span_end_ms): (u64, u64),
        line_count: usize,
        window_lines: usize,
    ) -> Self {
        let last_line = line_count.saturating_sub(1);
        let span = span_end_ms.saturating_sub(span_start_ms);
        let center = if span == 0 || line_count <= 1 {
            0
        } else {
            let offset = start_ms.saturating_sub(span_start_ms) as f64;
            let position = (offset / span as f64 * last_line as f64).round() as usize;
            position.min(last_line)
        };
        Self {
            center,
            start: center.saturating_sub(window_lines),
            end: (center + window_lines + 1).min(line_count),
        }
    }

    pub fn contains(&self, line: usize) -> bool {
        self.range().contains(&line)
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn distance(&self, line: usize) -> usize {
        line.abs_diff(self.center)
    }
}
