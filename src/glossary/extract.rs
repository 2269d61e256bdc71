use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::backend::{CompletionOptions, complete_with_retry};
use crate::config::GlossaryConfig;
use crate::error::Result;
use crate::localization::msg;
use crate::progress::RunOutcome;
use crate::prompt::glossary::term_extraction_prompt;
use super::generate::GlossarySession;

/// Lower-cased candidate term → distinct snippets it appeared in
pub type TermContextMap = BTreeMap<String, Vec<String>>;

static TIMING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{2}:\d{2}:\d{2}[.,]\d{3}\s*-->\s*\d{2}:\d{2}:\d{2}[.,]\d{3}").expect("timing regex")
});
static NUMERAL_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\d+\s*$").expect("numeral line regex"));
static MARKUP_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("markup regex"));
static BRACE_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("brace regex"));
static STAGE_DIRECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("stage direction regex"));
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("blank run regex"));
static SPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("space run regex"));
static JSON_ARRAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*?\]").expect("json array regex"));

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？', '\n'];

/// Reduce subtitle text to its spoken words
pub fn clean(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = TIMING_RE.replace_all(&text, "");
    let text = NUMERAL_LINE_RE.replace_all(&text, "");
    let text = MARKUP_TAG_RE.replace_all(&text, "");
    let text = BRACE_TAG_RE.replace_all(&text, "");
    let text = STAGE_DIRECTION_RE.replace_all(&text, "");
    let text = BLANK_RUN_RE.replace_all(&text, "\n");
    let text = SPACE_RUN_RE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Slice `text` into overlapping chunks of at most `size` characters.
///
/// A chunk ends at the last sentence terminator found in the final quarter of
/// the window, or at the hard limit when there is none. Each step advances by
/// at least one character.
pub fn split_into_chunks(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    if total <= size {
        let trimmed = text.trim();
        return if trimmed.is_empty() { Vec::new() } else { vec![trimmed.to_string()] };
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let mut end = (start + size).min(total);

        if end < total {
            let search_start = start + size * 3 / 4;
            if let Some(i) = (search_start + 1..end)
                .rev()
                .find(|&i| SENTENCE_TERMINATORS.contains(&chars[i]))
            {
                end = i + 1;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= total {
            break;
        }
        start = (start + 1).max(end.saturating_sub(overlap));
    }

    chunks
}

fn accept_term(term: &str, config: &GlossaryConfig) -> Option<String> {
    let term = term.trim().to_lowercase();
    let length = term.chars().count();
    if term.is_empty() || length < config.min_term_length || length > config.max_term_length {
        return None;
    }
    Some(term)
}

/// Parse the model's term list: a JSON array, or quoted lines as a fallback
pub fn parse_terms(response: &str, config: &GlossaryConfig) -> Vec<String> {
    let from_json = JSON_ARRAY_RE
        .find(response)
        .and_then(|m| serde_json::from_str::<Vec<serde_json::Value>>(m.as_str()).ok())
        .map(|values| {
            values
                .iter()
                .filter_map(|value| value.as_str())
                .filter_map(|term| accept_term(term, config))
                .collect::<Vec<_>>()
        });

    let candidates = match from_json {
        Some(terms) => terms,
        None => {
            debug!("Term list is not JSON, falling back to quoted lines");
            response
                .lines()
                .map(|line| line.trim().trim_end_matches(',').trim())
                .filter(|line| line.len() >= 2 && line.starts_with('"') && line.ends_with('"'))
                .filter_map(|line| accept_term(line.trim_matches('"'), config))
                .collect()
        }
    };

    let mut terms: Vec<String> = Vec::new();
    for term in candidates {
        if !terms.contains(&term) {
            terms.push(term);
        }
        if terms.len() >= config.max_terms_per_chunk {
            break;
        }
    }
    terms
}

/// Snippet around the first case-insensitive occurrence of `term`, cut to whole words
pub fn term_context(text: &str, term: &str, window: usize) -> String {
    let pattern = match Regex::new(&format!("(?i){}", regex::escape(term))) {
        Ok(pattern) => pattern,
        Err(_) => return String::new(),
    };
    let Some(found) = pattern.find(text) else {
        return String::new();
    };

    let chars: Vec<char> = text.chars().collect();
    let match_start = text[..found.start()].chars().count();
    let match_end = match_start + found.as_str().chars().count();

    let context_start = match_start.saturating_sub(window);
    let context_end = (match_end + window).min(chars.len());

    let raw: String = chars[context_start..context_end].iter().collect();
    let mut context = raw.trim().to_string();

    if context_start > 0 {
        if let Some(space) = context.find(' ') {
            if space > 0 {
                context = context[space + 1..].to_string();
            }
        }
    }
    if context_end < chars.len() {
        if let Some(space) = context.rfind(' ') {
            if space > 0 {
                context.truncate(space);
            }
        }
    }
    context
}

/// Add `terms` found in `chunk` to `map`, keeping one distinct snippet per occurrence chunk
pub fn record_terms(map: &mut TermContextMap, chunk: &str, terms: &[String], window: usize) {
    for term in terms {
        let contexts = map.entry(term.clone()).or_default();
        let context = term_context(chunk, term, window);
        if !context.is_empty() && !contexts.contains(&context) {
            contexts.push(context);
        }
    }
}

/// Ask the backend for the proper nouns of every chunk.
///
/// Cancellation is checked before each chunk and yields `Cancelled` without a
/// partial map. A chunk whose request fails contributes no terms.
pub async fn extract_terms(
    session: &mut GlossarySession<'_, '_>,
    chunks: &[String],
) -> Result<RunOutcome<TermContextMap>> {
    let mut term_contexts = TermContextMap::new();
    if chunks.is_empty() {
        warn!("No text chunks to extract terms from");
        return Ok(RunOutcome::Completed(term_contexts));
    }

    let options = CompletionOptions::new(session.config.max_tokens, session.config.temperature);
    let step = 1.0 / chunks.len() as f64;

    for (index, chunk) in chunks.iter().enumerate() {
        if session.cancel.is_cancelled() {
            info!("Term extraction cancelled");
            return Ok(RunOutcome::Cancelled);
        }

        info!("Extracting terms from chunk {}/{}", index + 1, chunks.len());
        let prompt = term_extraction_prompt(chunk, session.config);

        let terms = match complete_with_retry(&mut *session.backend, "", &prompt, options, session.retry).await {
            Ok(response) => {
                debug!("Term extraction response: {}", response);
                parse_terms(&response, session.config)
            }
            Err(e) => {
                warn!("Term extraction failed for chunk {}: {}", index + 1, e);
                Vec::new()
            }
        };

        record_terms(&mut term_contexts, chunk, &terms, session.config.context_window);
        debug!("Terms in chunk {}: {:?}", index + 1, terms);

        let message = session.localizer.format(
            msg::GLOSSARY_CHUNK_DONE,
            &[("index", &(index + 1)), ("total", &chunks.len()), ("terms", &terms.len())],
        );
        session.progress.advance(&message, step);
    }

    Ok(RunOutcome::Completed(term_contexts))
}
