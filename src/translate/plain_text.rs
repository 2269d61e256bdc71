use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::backend::complete_with_retry;
use crate::error::Result;
use crate::localization::msg;
use crate::progress::{CancelToken, Progress, RunOutcome};
use crate::prompt;
use super::TranslationSession;

static PARAGRAPH_BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("paragraph regex"));

/// Group blank-line separated paragraphs into chunks of at most `max_chars`
/// characters. A paragraph longer than the limit forms its own chunk.
pub fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.replace("\r\n", "\n");
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for paragraph in PARAGRAPH_BREAK_RE.split(&text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let len = paragraph.chars().count();
        if !current.is_empty() && current_len + 2 + len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(paragraph);
        current_len += len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Translate unsegmented text paragraph group by paragraph group.
/// There is no entry structure to repair; reflection applies as for subtitles.
pub async fn translate_plain_text(
    session: &mut TranslationSession<'_>,
    text: &str,
    progress: &mut Progress<'_>,
    cancel: &CancelToken,
) -> Result<RunOutcome<String>> {
    let system_prompt = prompt::plain_text::system_prompt(session.source_lang, session.target_lang);
    let chunks = split_paragraphs(text, session.config.plain_text_chunk_chars.max(1));
    info!("Split plain text into {} chunks", chunks.len());
    let message = session
        .localizer
        .format(msg::PLAIN_TEXT_CHUNKED, &[("count", &chunks.len())]);
    progress.message(&message);

    let total = chunks.len();
    let step = if total == 0 { 1.0 } else { 1.0 / total as f64 };
    let options = session.options();
    let mut translated = Vec::with_capacity(total);

    for (index, source) in chunks.iter().enumerate() {
        if cancel.is_cancelled() {
            info!("Plain text translation cancelled before chunk {}/{}", index + 1, total);
            return Ok(RunOutcome::Cancelled);
        }

        let message = session
            .localizer
            .format(msg::TRANSLATING_CHUNK, &[("index", &(index + 1)), ("total", &total)]);
        progress.message(&message);

        let glossary_section = session.glossary.prompt_section(source);
        let user_prompt = prompt::plain_text::translation_prompt(source, &glossary_section);
        let mut result =
            complete_with_retry(&mut *session.backend, &system_prompt, &user_prompt, options, session.retry).await?;
        debug!("Draft:\n{}", result);

        if session.reflection {
            let message = session
                .localizer
                .format(msg::REFLECTING_CHUNK, &[("index", &(index + 1)), ("total", &total)]);
            progress.message(&message);

            let critique_system = prompt::critique_system_prompt(session.target_lang);
            let critique_prompt = prompt::plain_text::critique_prompt(source, &result);
            let critique_options = session.critique_options();
            let recommendation = complete_with_retry(
                &mut *session.backend,
                &critique_system,
                &critique_prompt,
                critique_options,
                session.retry,
            )
            .await?;

            if !recommendation.trim().is_empty() {
                let improve_prompt = prompt::plain_text::improvement_prompt(source, &result, &recommendation);
                result = complete_with_retry(&mut *session.backend, &system_prompt, &improve_prompt, options, session.retry)
                    .await?;
            }
        }

        translated.push(result.trim().to_string());
        let message = session
            .localizer
            .format(msg::CHUNK_DONE, &[("index", &(index + 1)), ("total", &total)]);
        progress.advance(&message, step);
    }

    Ok(RunOutcome::Completed(translated.join("\n\n")))
}
