// Chunked translation pipeline
//
// Each chunk runs through three stages, strictly in document order:
// - reflect: draft translation, then optional critique and improvement
// - repair: one forced re-translation when the entry count drifted
// - apply: map translated entries back onto the chunk's segments

pub mod apply;
pub mod plain_text;
pub mod reflect;
pub mod repair;

use tracing::{debug, info};

use crate::backend::{Backend, CompletionOptions, RetryPolicy};
use crate::chunk::chunk;
use crate::config::TranslateConfig;
use crate::error::Result;
use crate::glossary::Glossary;
use crate::localization::{Localizer, msg};
use crate::progress::{CancelToken, Progress, RunOutcome};
use crate::prompt;
use crate::subtitle::Segment;

pub use apply::apply_translation;
pub use reflect::{Reflection, ReflectionStage};
pub use repair::parse_translation_text;

/// Everything one translation run borrows. The glossary is read-only here.
pub struct TranslationSession<'a> {
    pub backend: &'a mut dyn Backend,
    pub config: &'a TranslateConfig,
    pub retry: RetryPolicy,
    pub localizer: &'a Localizer,
    pub glossary: &'a Glossary,
    pub source_lang: &'a str,
    pub target_lang: &'a str,
    pub reflection: bool,
}

impl TranslationSession<'_> {
    fn options(&self) -> CompletionOptions {
        CompletionOptions::new(self.config.max_tokens, self.config.temperature)
    }

    fn critique_options(&self) -> CompletionOptions {
        CompletionOptions::new(self.config.max_tokens, self.config.critique_temperature)
    }
}

/// Translate `segments` chunk by chunk.
///
/// The result has one segment per input segment with `id` and `timing`
/// preserved. Cancellation is checked before every chunk; a backend failure
/// aborts the run.
pub async fn translate_segments(
    session: &mut TranslationSession<'_>,
    segments: &[Segment],
    progress: &mut Progress<'_>,
    cancel: &CancelToken,
) -> Result<RunOutcome<Vec<Segment>>> {
    let system_prompt = prompt::system_prompt(session.source_lang, session.target_lang);
    debug!("System prompt: {}", system_prompt);

    let chunks = chunk(segments, session.config.chunk_size, session.config.context_size);
    info!("Split {} segments into {} chunks", segments.len(), chunks.len());
    let message = session.localizer.format(msg::CHUNKED, &[("count", &chunks.len())]);
    progress.message(&message);

    let placeholder = session.localizer.text(msg::TRANSLATION_MISSING);
    let mut translated = Vec::with_capacity(segments.len());
    let total = chunks.len();
    let step = if total == 0 { 1.0 } else { 1.0 / total as f64 };

    for (index, chunk) in chunks.iter().enumerate() {
        if cancel.is_cancelled() {
            info!("Translation cancelled before chunk {}/{}", index + 1, total);
            return Ok(RunOutcome::Cancelled);
        }

        info!("┌─ Chunk {}/{} (segments {}..{})", index + 1, total, chunk.start_index + 1, chunk.start_index + chunk.main_count());
        let message = session
            .localizer
            .format(msg::TRANSLATING_CHUNK, &[("index", &(index + 1)), ("total", &total)]);
        progress.message(&message);

        let reflection = reflect::translate_chunk(session, &system_prompt, chunk, index, total, progress).await?;
        debug!("│ Reflection ended at {:?}", reflection.stage);

        let repaired = repair::repair(session, &system_prompt, chunk, reflection.text, index, progress).await?;
        if repaired.attempted {
            info!("│ Repair requested for chunk {}", index + 1);
        }

        translated.extend(apply_translation(chunk, &repaired.text, &placeholder));
        info!("└─ Chunk {}/{} done", index + 1, total);

        let message = session
            .localizer
            .format(msg::CHUNK_DONE, &[("index", &(index + 1)), ("total", &total)]);
        progress.advance(&message, step);
    }

    Ok(RunOutcome::Completed(translated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::config::Config;
    use crate::progress::NullProgress;

    fn document(count: usize) -> Vec<Segment> {
        (1..=count)
            .map(|i| Segment::new(i.to_string(), format!("00:00:0{},000 --> 00:00:0{},500", i, i), format!("line {}", i)))
            .collect()
    }

    /// Echo the `[[id]]` markers of the `[Translate ...]` section with upper-cased text
    fn echo(user: &str) -> String {
        let section = user.split("[Translate - entries").nth(1).unwrap_or("");
        section
            .lines()
            .skip(1)
            .take_while(|line| !line.trim().is_empty())
            .map(|line| if line.starts_with("[[") { line.to_string() } else { line.to_uppercase() })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_chunks_translated_in_order() {
        let config = Config::default();
        let mut translate = config.translate.clone();
        translate.chunk_size = 2;
        translate.context_size = 1;
        let localizer = Localizer::english();
        let glossary = Glossary::new();

        let mut backend = MockBackend::new();
        backend.expect_describe().return_const("mock".to_string());
        backend.expect_complete().times(3).returning(|_, user, _| Ok(echo(user)));

        let segments = document(5);
        let mut sink = NullProgress;
        let mut progress = Progress::new(&mut sink);
        let mut session = TranslationSession {
            backend: &mut backend,
            config: &translate,
            retry: RetryPolicy::none(),
            localizer: &localizer,
            glossary: &glossary,
            source_lang: "en",
            target_lang: "ja",
            reflection: false,
        };

        let result = translate_segments(&mut session, &segments, &mut progress, &CancelToken::new())
            .await
            .unwrap()
            .completed()
            .unwrap();

        assert_eq!(result.len(), 5);
        for (source, output) in segments.iter().zip(&result) {
            assert_eq!(output.id, source.id);
            assert_eq!(output.timing, source.timing);
            assert_eq!(output.text, source.text.to_uppercase());
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_makes_no_calls() {
        let config = Config::default();
        let localizer = Localizer::english();
        let glossary = Glossary::new();
        let mut backend = MockBackend::new();
        backend.expect_complete().times(0);

        let cancel = CancelToken::new();
        cancel.cancel();
        let mut sink = NullProgress;
        let mut progress = Progress::new(&mut sink);
        let mut session = TranslationSession {
            backend: &mut backend,
            config: &config.translate,
            retry: RetryPolicy::none(),
            localizer: &localizer,
            glossary: &glossary,
            source_lang: "auto",
            target_lang: "ja",
            reflection: true,
        };

        let outcome = translate_segments(&mut session, &document(3), &mut progress, &cancel)
            .await
            .unwrap();
        assert!(outcome.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_between_chunks_stops_before_next_chunk() {
        let config = Config::default();
        let mut translate = config.translate.clone();
        translate.chunk_size = 2;
        translate.context_size = 1;
        let localizer = Localizer::english();
        let glossary = Glossary::new();
        let cancel = CancelToken::new();
        let trigger = cancel.clone();

        let mut backend = MockBackend::new();
        backend.expect_describe().return_const("mock".to_string());
        backend.expect_complete().times(1).returning(move |_, user, _| {
            trigger.cancel();
            Ok(echo(user))
        });

        let mut sink = NullProgress;
        let mut progress = Progress::new(&mut sink);
        let mut session = TranslationSession {
            backend: &mut backend,
            config: &translate,
            retry: RetryPolicy::none(),
            localizer: &localizer,
            glossary: &glossary,
            source_lang: "en",
            target_lang: "ja",
            reflection: false,
        };

        let outcome = translate_segments(&mut session, &document(5), &mut progress, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
    }
}
