use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::backend::complete_with_retry;
use crate::chunk::Chunk;
use crate::error::Result;
use crate::localization::msg;
use crate::progress::Progress;
use crate::prompt;
use crate::subtitle::BYTE_ORDER_MARK;
use super::TranslationSession;

static MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\[\d+\]\]$").expect("marker regex"));

/// Split a translated blob into entries.
///
/// A line holding only `[[n]]` starts a new entry. Lines of one entry stay
/// separate lines; blank lines are dropped, and a marker with no text after it
/// yields no entry.
pub fn parse_translation_text(text: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.trim().lines() {
        let line = line.trim().trim_start_matches(BYTE_ORDER_MARK).trim();
        if MARKER_RE.is_match(line) {
            if !current.is_empty() {
                entries.push(current.join("\n"));
                current.clear();
            }
        } else if !line.is_empty() {
            current.push(line);
        }
    }
    if !current.is_empty() {
        entries.push(current.join("\n"));
    }
    entries
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    pub text: String,
    /// Whether a corrective request was sent
    pub attempted: bool,
}

/// Re-translate the chunk once if `draft` has the wrong number of entries.
///
/// The corrected output replaces the draft even if it still mismatches;
/// padding downstream makes up for missing entries.
pub async fn repair(
    session: &mut TranslationSession<'_>,
    system_prompt: &str,
    chunk: &Chunk<'_>,
    draft: String,
    index: usize,
    progress: &mut Progress<'_>,
) -> Result<Repaired> {
    let expected = chunk.main_count();
    let found = parse_translation_text(&draft).len();
    if found == expected {
        return Ok(Repaired { text: draft, attempted: false });
    }

    warn!("│ Entry count mismatch in chunk {}: {} of {}", index + 1, found, expected);
    let message = session.localizer.format(
        msg::REPAIRING_CHUNK,
        &[("index", &(index + 1)), ("found", &found), ("expected", &expected)],
    );
    progress.message(&message);

    let user_prompt = prompt::repair_prompt(chunk, &draft);
    debug!("│ Repair prompt:\n{}", user_prompt);
    let options = session.options();
    let corrected = complete_with_retry(&mut *session.backend, system_prompt, &user_prompt, options, session.retry).await?;

    let after = parse_translation_text(&corrected).len();
    if after == expected {
        info!("│ Repair restored {} entries", expected);
    } else {
        warn!("│ Repair still has {} of {} entries", after, expected);
    }
    Ok(Repaired { text: corrected, attempted: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, RetryPolicy};
    use crate::chunk::chunk;
    use crate::config::Config;
    use crate::glossary::Glossary;
    use crate::localization::Localizer;
    use crate::progress::NullProgress;
    use crate::subtitle::Segment;

    #[test]
    fn test_parse_markers() {
        let text = "[[1]]\nHello\n[[2]]\nfirst line\nsecond line\n\n[[3]]\n  ♪ la la ♪  ";
        assert_eq!(
            parse_translation_text(text),
            vec!["Hello", "first line\nsecond line", "♪ la la ♪"]
        );
    }

    #[test]
    fn test_parse_text_before_first_marker() {
        assert_eq!(parse_translation_text("stray\n[[1]]\nok"), vec!["stray", "ok"]);
    }

    #[test]
    fn test_parse_empty_marker_yields_nothing() {
        assert_eq!(parse_translation_text("[[1]]\n[[2]]\nonly"), vec!["only"]);
        assert!(parse_translation_text("").is_empty());
    }

    #[test]
    fn test_byte_order_mark_before_marker() {
        assert_eq!(parse_translation_text("\u{feff}[[1]]\na\n[[2]]\nb"), vec!["a", "b"]);
    }

    #[test]
    fn test_bracketed_text_is_not_a_marker() {
        assert_eq!(parse_translation_text("[[1]]\n[[applause]]"), vec!["[[applause]]"]);
    }

    fn segments() -> Vec<Segment> {
        (1..=4)
            .map(|i| Segment::new(i.to_string(), "00:00:00,000 --> 00:00:01,000", format!("part {}", i)))
            .collect()
    }

    async fn run(backend: &mut MockBackend, draft: &str) -> Repaired {
        let config = Config::default();
        let localizer = Localizer::english();
        let glossary = Glossary::new();
        let segments = segments();
        let chunks = chunk(&segments, 10, 2);
        let mut sink = NullProgress;
        let mut progress = Progress::new(&mut sink);
        let mut session = TranslationSession {
            backend,
            config: &config.translate,
            retry: RetryPolicy::none(),
            localizer: &localizer,
            glossary: &glossary,
            source_lang: "en",
            target_lang: "ja",
            reflection: false,
        };
        repair(&mut session, "system", &chunks[0], draft.to_string(), 0, &mut progress)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_matching_count_needs_no_call() {
        let mut backend = MockBackend::new();
        backend.expect_complete().times(0);
        let draft = "[[1]]\na\n[[2]]\nb\n[[3]]\nc\n[[4]]\nd";
        let repaired = run(&mut backend, draft).await;
        assert!(!repaired.attempted);
        assert_eq!(repaired.text, draft);
    }

    #[tokio::test]
    async fn test_mismatch_triggers_single_repair() {
        let mut backend = MockBackend::new();
        backend.expect_describe().return_const("mock".to_string());
        backend.expect_complete().times(1).returning(|_, user, _| {
            assert!(user.contains("exactly 4 entries"));
            assert!(user.contains("[[1]]\nab"));
            Ok("[[1]]\na\n[[2]]\nb\n[[3]]\nc\n[[4]]\nd".to_string())
        });
        let repaired = run(&mut backend, "[[1]]\nab\n[[3]]\nc\n[[4]]\nd").await;
        assert!(repaired.attempted);
        assert_eq!(parse_translation_text(&repaired.text).len(), 4);
    }

    #[tokio::test]
    async fn test_repair_is_not_repeated() {
        let mut backend = MockBackend::new();
        backend.expect_describe().return_const("mock".to_string());
        backend
            .expect_complete()
            .times(1)
            .returning(|_, _, _| Ok("[[1]]\na\n[[2]]\nb\n[[3]]\nc".to_string()));
        let repaired = run(&mut backend, "[[1]]\nabc").await;
        assert!(repaired.attempted);
        assert_eq!(parse_translation_text(&repaired.text).len(), 3);
    }
}
