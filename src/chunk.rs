//! Overlapping segment windows.
//!
//! Every chunk carries a read-only context span around the segments that must
//! be translated. Main ranges of consecutive chunks tile the document exactly.

use std::ops::Range;

use crate::subtitle::Segment;

/// A window of segments; `main` indexes into `context`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub context: &'a [Segment],
    pub main: Range<usize>,
    /// Position of the first main segment in the whole document
    pub start_index: usize,
}

impl<'a> Chunk<'a> {
    /// Positions within `context` that must be translated
    pub fn main_indices(&self) -> Vec<usize> {
        self.main.clone().collect()
    }

    pub fn main_segments(&self) -> &'a [Segment] {
        &self.context[self.main.clone()]
    }

    pub fn main_count(&self) -> usize {
        self.main.len()
    }

    /// Context-only segments, in document order
    pub fn reference_segments(&self) -> Vec<&'a Segment> {
        self.context
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.main.contains(i))
            .map(|(_, segment)| segment)
            .collect()
    }
}

/// Split `segments` into windows of `window_size` main segments, each
/// surrounded by up to `context_radius` read-only neighbours on both sides.
pub fn chunk(segments: &[Segment], window_size: usize, context_radius: usize) -> Vec<Chunk<'_>> {
    let window_size = window_size.max(1);
    let total = segments.len();

    (0..total)
        .step_by(window_size)
        .map(|start| {
            let context_start = start.saturating_sub(context_radius);
            let context_end = (start + window_size + context_radius).min(total);
            let main_len = window_size.min(total - start);
            let offset = start - context_start;

            Chunk {
                context: &segments[context_start..context_end],
                main: offset..offset + main_len,
                start_index: start,
            }
        })
        .collect()
}
