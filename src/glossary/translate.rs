use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::backend::{CompletionOptions, complete_with_retry};
use crate::error::Result;
use crate::localization::msg;
use crate::progress::RunOutcome;
use crate::prompt::glossary::{TermWithContext, term_translation_prompt};
use super::Glossary;
use super::extract::TermContextMap;
use super::generate::GlossarySession;

/// Lower-cased term → occurrences in the cleaned source text
pub type TermFrequency = BTreeMap<String, usize>;

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*?\}").expect("json object regex"));

pub fn term_frequencies(term_contexts: &TermContextMap, cleaned_text: &str) -> TermFrequency {
    let haystack = cleaned_text.to_lowercase();
    term_contexts
        .keys()
        .map(|term| (term.clone(), haystack.matches(term.as_str()).count()))
        .collect()
}

/// Terms seen at least `min_frequency` times, most frequent first, at most `cap`.
/// Equal frequencies keep alphabetical order.
pub fn filter_terms(frequencies: &TermFrequency, min_frequency: usize, cap: usize) -> Vec<String> {
    let mut kept: Vec<(&String, usize)> = frequencies
        .iter()
        .filter(|(_, count)| **count >= min_frequency)
        .map(|(term, count)| (term, *count))
        .collect();
    kept.sort_by(|a, b| b.1.cmp(&a.1));
    kept.into_iter().take(cap).map(|(term, _)| term.clone()).collect()
}

/// Longest recorded context, cut to `max_chars` characters
pub fn best_context(contexts: &[String], max_chars: usize) -> Option<String> {
    let longest = contexts.iter().max_by_key(|c| c.chars().count())?;
    if longest.chars().count() > max_chars {
        Some(format!("{}...", longest.chars().take(max_chars).collect::<String>()))
    } else {
        Some(longest.clone())
    }
}

fn accept_pairs<'a>(
    pairs: impl Iterator<Item = (String, String)> + 'a,
    batch: &'a [String],
) -> Vec<(String, String)> {
    pairs
        .filter_map(|(source, target)| {
            let source = source.trim().to_lowercase();
            let target = target.trim().to_string();
            if target.is_empty() || !batch.iter().any(|term| term.to_lowercase() == source) {
                return None;
            }
            Some((source, target))
        })
        .collect()
}

fn json_pairs(value: serde_json::Value) -> Option<Vec<(String, String)>> {
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .map(|(source, target)| {
                let target = match target {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (source.clone(), target)
            })
            .collect(),
    )
}

/// Parse the model's term translations.
///
/// Tries the whole response as a JSON object, then the first `{...}` block,
/// then `term: translation` lines. Only terms from `batch` are accepted.
pub fn parse_translations(response: &str, batch: &[String]) -> Vec<(String, String)> {
    let parsed = serde_json::from_str::<serde_json::Value>(response.trim())
        .ok()
        .and_then(json_pairs)
        .or_else(|| {
            JSON_OBJECT_RE
                .find(response)
                .and_then(|m| serde_json::from_str::<serde_json::Value>(m.as_str()).ok())
                .and_then(json_pairs)
        });

    if let Some(pairs) = parsed {
        return accept_pairs(pairs.into_iter(), batch);
    }

    debug!("Term translations are not JSON, falling back to key: value lines");
    let pairs = response.lines().filter_map(|line| {
        let (source, target) = line.trim().split_once(':')?;
        let source = source.trim().trim_matches('"').to_string();
        let target = target.trim().trim_end_matches(',').trim().trim_matches('"').to_string();
        Some((source, target))
    });
    accept_pairs(pairs, batch)
}

/// Translate `terms` in batches; the first translation of a term wins.
///
/// A batch whose request fails contributes nothing.
pub async fn translate_terms(
    session: &mut GlossarySession<'_, '_>,
    terms: &[String],
    term_contexts: &TermContextMap,
    target_lang: &str,
) -> Result<RunOutcome<Glossary>> {
    let mut glossary = Glossary::new();
    let batch_size = session.config.batch_size.max(1);
    let batches: Vec<&[String]> = terms.chunks(batch_size).collect();
    if batches.is_empty() {
        return Ok(RunOutcome::Completed(glossary));
    }

    let options = CompletionOptions::new(session.config.max_tokens, session.config.temperature);
    let step = 1.0 / batches.len() as f64;

    for (index, batch) in batches.iter().enumerate() {
        if session.cancel.is_cancelled() {
            info!("Term translation cancelled");
            return Ok(RunOutcome::Cancelled);
        }

        info!("Translating term batch {}/{} ({} terms)", index + 1, batches.len(), batch.len());
        let items: Vec<TermWithContext> = batch
            .iter()
            .map(|term| TermWithContext {
                term: term.clone(),
                context: term_contexts
                    .get(term)
                    .and_then(|contexts| best_context(contexts, session.config.context_max_chars)),
            })
            .collect();
        let prompt = term_translation_prompt(&items, target_lang);

        match complete_with_retry(&mut *session.backend, "", &prompt, options, session.retry).await {
            Ok(response) => {
                debug!("Term translation response: {}", response);
                for (source, target) in parse_translations(&response, batch) {
                    glossary.add_if_absent(&source, &target);
                }
            }
            Err(e) => warn!("Term translation failed for batch {}: {}", index + 1, e),
        }

        let message = session
            .localizer
            .format(msg::GLOSSARY_BATCH_DONE, &[("index", &(index + 1)), ("total", &batches.len())]);
        session.progress.advance(&message, step);
    }

    Ok(RunOutcome::Completed(glossary))
}
