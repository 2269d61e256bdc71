use tracing::warn;

use crate::chunk::Chunk;
use crate::subtitle::Segment;
use super::repair::parse_translation_text;

/// Map translated entries onto the chunk's main segments.
///
/// Missing entries get `placeholder`; surplus entries are dropped. Ids and
/// timings are kept from the source.
pub fn apply_translation(chunk: &Chunk<'_>, translated: &str, placeholder: &str) -> Vec<Segment> {
    let main = chunk.main_segments();
    let entries = parse_translation_text(translated);

    if entries.len() < main.len() {
        warn!(
            "Translation has {} entries for {} segments, padding with placeholder",
            entries.len(),
            main.len()
        );
    } else if entries.len() > main.len() {
        warn!(
            "Translation has {} entries for {} segments, ignoring the surplus",
            entries.len(),
            main.len()
        );
    }

    main.iter()
        .enumerate()
        .map(|(i, segment)| match entries.get(i) {
            Some(text) => segment.with_text(text.as_str()),
            None => segment.with_text(placeholder),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk;

    fn segments() -> Vec<Segment> {
        (1..=4)
            .map(|i| Segment::new(format!("{}", i * 10), format!("t{}", i), format!("src {}", i)))
            .collect()
    }

    #[test]
    fn test_short_translation_is_padded() {
        let segments = segments();
        let chunks = chunk(&segments, 4, 0);
        let applied = apply_translation(&chunks[0], "[[10]]\na\n[[20]]\nb\n[[30]]\nc", "[missing]");

        assert_eq!(applied.len(), 4);
        assert_eq!(applied[2].text, "c");
        assert_eq!(applied[3].text, "[missing]");
        assert_eq!(applied[3].id, "40");
        assert_eq!(applied[3].timing, "t4");
    }

    #[test]
    fn test_surplus_entries_are_dropped() {
        let segments = segments();
        let chunks = chunk(&segments, 2, 1);
        let applied = apply_translation(&chunks[1], "[[30]]\nc\n[[40]]\nd\n[[50]]\ne", "[missing]");
        let texts: Vec<&str> = applied.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "d"]);
        assert_eq!(applied[0].id, "30");
    }
}
