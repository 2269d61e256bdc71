pub const BYTE_ORDER_MARK: char = '\u{feff}';

/// One subtitle entry: ordinal label, opaque timing line, and (possibly multi-line) text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub id: String,
    pub timing: String,
    pub text: String,
}

impl Segment {
    pub fn new(id: impl Into<String>, timing: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timing: timing.into(),
            text: text.into(),
        }
    }

    /// Id as written inside `[[..]]` markers: no byte order mark, no padding.
    /// The raw `id` is what gets serialized.
    pub fn marker_id(&self) -> &str {
        self.id.trim().trim_start_matches(BYTE_ORDER_MARK).trim()
    }

    /// Same id and timing, new text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            timing: self.timing.clone(),
            text: text.into(),
        }
    }
}

/// Parse SRT-like text into segments.
///
/// Blocks are separated by a blank line; the first line is the id, the second
/// the timing, the rest the text. Blocks with fewer than three lines are dropped.
pub fn parse(content: &str) -> Vec<Segment> {
    let normalized = content.replace("\r\n", "\n");

    normalized
        .trim()
        .split("\n\n")
        .filter_map(|block| {
            let lines: Vec<&str> = block.split('\n').collect();
            if lines.len() < 3 {
                return None;
            }
            Some(Segment {
                id: lines[0].to_string(),
                timing: lines[1].to_string(),
                text: lines[2..].join("\n"),
            })
        })
        .collect()
}

/// Serialize segments back to SRT-like text, in the order given
pub fn serialize(segments: &[Segment]) -> String {
    let mut content = segments
        .iter()
        .map(|segment| format!("{}\n{}\n{}", segment.id, segment.timing, segment.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    if !content.is_empty() {
        content.push('\n');
    }
    content
}
