use tracing::{debug, info};

use crate::backend::complete_with_retry;
use crate::chunk::Chunk;
use crate::error::Result;
use crate::localization::msg;
use crate::progress::Progress;
use crate::prompt;
use super::TranslationSession;

/// How far a chunk got through the reflection loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionStage {
    /// First draft only
    Translated,
    /// Critique requested but it asked for no change
    Critiqued,
    /// Draft rewritten according to the critique
    Improved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reflection {
    pub text: String,
    pub stage: ReflectionStage,
}

/// Text the glossary is matched against: every segment the backend sees
fn chunk_text(chunk: &Chunk<'_>) -> String {
    chunk
        .context
        .iter()
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Draft a translation of the chunk and, when reflection is on, critique and improve it
pub async fn translate_chunk(
    session: &mut TranslationSession<'_>,
    system_prompt: &str,
    chunk: &Chunk<'_>,
    index: usize,
    total: usize,
    progress: &mut Progress<'_>,
) -> Result<Reflection> {
    let glossary_section = session.glossary.prompt_section(&chunk_text(chunk));
    let user_prompt = prompt::translation_prompt(chunk, &glossary_section);
    debug!("│ Translation prompt:\n{}", user_prompt);

    let options = session.options();
    let draft = complete_with_retry(&mut *session.backend, system_prompt, &user_prompt, options, session.retry).await?;
    debug!("│ Draft:\n{}", draft);

    if !session.reflection {
        progress.message(&session.localizer.text(msg::REFLECTION_DISABLED));
        return Ok(Reflection { text: draft, stage: ReflectionStage::Translated });
    }

    let message = session
        .localizer
        .format(msg::REFLECTING_CHUNK, &[("index", &(index + 1)), ("total", &total)]);
    progress.message(&message);

    let critique_system = prompt::critique_system_prompt(session.target_lang);
    let critique_prompt = prompt::critique_prompt(chunk, &draft);
    let critique_options = session.critique_options();
    let recommendation =
        complete_with_retry(&mut *session.backend, &critique_system, &critique_prompt, critique_options, session.retry)
            .await?;

    if recommendation.trim().is_empty() {
        info!("│ Critique found nothing to change");
        return Ok(Reflection { text: draft, stage: ReflectionStage::Critiqued });
    }
    debug!("│ Critique:\n{}", recommendation);

    let improve_prompt = prompt::improvement_prompt(chunk, &draft, &recommendation);
    let improved = complete_with_retry(&mut *session.backend, system_prompt, &improve_prompt, options, session.retry).await?;
    debug!("│ Improved:\n{}", improved);

    Ok(Reflection { text: improved, stage: ReflectionStage::Improved })
}
