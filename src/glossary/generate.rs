use tracing::{debug, info, warn};

use crate::backend::{Backend, RetryPolicy};
use crate::config::GlossaryConfig;
use crate::error::Result;
use crate::localization::{Localizer, msg};
use crate::progress::{CancelToken, Progress, RunOutcome};
use super::Glossary;
use super::extract::{clean, extract_terms, split_into_chunks};
use super::translate::{filter_terms, term_frequencies, translate_terms};

/// Share of the generation bar spent on each stage
const SPLIT_SHARE: f64 = 0.1;
const EXTRACT_SHARE: f64 = 0.5;
const FREQUENCY_SHARE: f64 = 0.05;
const FILTER_SHARE: f64 = 0.05;
const TRANSLATE_SHARE: f64 = 0.3;

/// Everything one generation run borrows
pub struct GlossarySession<'a, 'p> {
    pub backend: &'a mut dyn Backend,
    pub config: &'a GlossaryConfig,
    pub retry: RetryPolicy,
    pub progress: &'a mut Progress<'p>,
    pub localizer: &'a Localizer,
    pub cancel: &'a CancelToken,
}

/// Build a glossary for `source_text`: extract candidate terms per chunk,
/// keep the most frequent ones and translate them in batches.
///
/// Returns an empty glossary when the text yields no usable terms and
/// `Cancelled` if the token fires at any chunk or batch boundary.
pub async fn generate_glossary(
    session: &mut GlossarySession<'_, '_>,
    source_text: &str,
    target_lang: &str,
) -> Result<RunOutcome<Glossary>> {
    info!("Generating glossary (target: {})", target_lang);
    if session.cancel.is_cancelled() {
        return Ok(RunOutcome::Cancelled);
    }
    session.progress.set("", 0.0);

    let cleaned = clean(source_text);
    let chunks = split_into_chunks(&cleaned, session.config.chunk_size, session.config.chunk_overlap);
    if chunks.is_empty() {
        warn!("No text to extract glossary terms from");
        let message = session.localizer.text(msg::GLOSSARY_EMPTY);
        session.progress.set(&message, 1.0);
        return Ok(RunOutcome::Completed(Glossary::new()));
    }
    info!("Glossary source split into {} chunks", chunks.len());
    let message = session
        .localizer
        .format(msg::GLOSSARY_TEXT_SPLIT, &[("count", &chunks.len())]);
    session.progress.advance(&message, SPLIT_SHARE);

    session.progress.push_window(SPLIT_SHARE, SPLIT_SHARE + EXTRACT_SHARE);
    let extracted = extract_terms(session, &chunks).await;
    session.progress.pop_window();
    let term_contexts = match extracted? {
        RunOutcome::Completed(map) => map,
        RunOutcome::Cancelled => return Ok(RunOutcome::Cancelled),
    };
    info!("Extracted {} candidate terms", term_contexts.len());
    debug!("Term contexts: {:?}", term_contexts);

    let frequencies = term_frequencies(&term_contexts, &cleaned);
    debug!("Term frequencies: {:?}", frequencies);
    let message = session.localizer.text(msg::GLOSSARY_FREQUENCY_DONE);
    session.progress.set(&message, SPLIT_SHARE + EXTRACT_SHARE + FREQUENCY_SHARE);

    let terms = filter_terms(&frequencies, session.config.min_term_frequency, session.config.term_cap());
    let message = session
        .localizer
        .format(msg::GLOSSARY_FILTERED, &[("count", &terms.len())]);
    session
        .progress
        .set(&message, SPLIT_SHARE + EXTRACT_SHARE + FREQUENCY_SHARE + FILTER_SHARE);

    if terms.is_empty() {
        warn!("No terms passed the frequency filter");
        let message = session.localizer.text(msg::GLOSSARY_EMPTY);
        session.progress.set(&message, 1.0);
        return Ok(RunOutcome::Completed(Glossary::new()));
    }

    let start = 1.0 - TRANSLATE_SHARE;
    session.progress.push_window(start, 1.0);
    let translated = translate_terms(session, &terms, &term_contexts, target_lang).await;
    session.progress.pop_window();
    let glossary = match translated? {
        RunOutcome::Completed(glossary) => glossary,
        RunOutcome::Cancelled => return Ok(RunOutcome::Cancelled),
    };

    info!("Glossary generated with {} terms", glossary.len());
    let message = session
        .localizer
        .format(msg::GLOSSARY_COMPLETED, &[("count", &glossary.len())]);
    session.progress.set(&message, 1.0);
    Ok(RunOutcome::Completed(glossary))
}
