use crate::config::GlossaryConfig;
use super::language_code_to_name;

/// One term offered for translation, with its most informative context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermWithContext {
    pub term: String,
    pub context: Option<String>,
}

/// Ask for the proper nouns of one text chunk as a JSON array
pub fn term_extraction_prompt(chunk: &str, config: &GlossaryConfig) -> String {
    format!(
        "Extract the proper nouns from the text below that have no standard, widely used translation.\n\
         \n\
         [Extract]\n\
         1. Person names\n\
         2. Nicknames\n\
         3. Specific place names\n\
         4. Organization names\n\
         \n\
         [Do not extract]\n\
         - common verbs, adjectives, adverbs, prepositions or conjunctions\n\
         - general vocabulary (computer, internet, music, art, science, ...)\n\
         - common music or sports terms\n\
         - basic academic vocabulary\n\
         - everyday words that already have a standard translation\n\
         \n\
         [Quality]\n\
         - each term is {}-{} characters long\n\
         - at most {} of the most important terms\n\
         \n\
         [Output format]\n\
         A JSON array:\n\
         [\"term1\", \"term2\", \"term3\"]\n\
         \n\
         [Text]\n\
         {}\n\
         \n\
         Extracted terms:\n",
        config.min_term_length, config.max_term_length, config.max_terms_per_chunk, chunk
    )
}

/// Ask for a JSON object mapping each term to its translation
pub fn term_translation_prompt(terms: &[TermWithContext], target_lang: &str) -> String {
    let target = language_code_to_name(target_lang);
    let listing = terms
        .iter()
        .enumerate()
        .map(|(i, item)| match &item.context {
            Some(context) => format!("{}. **{}**\n   Context: \"{}\"", i + 1, item.term, context),
            None => format!("{}. **{}**", i + 1, item.term),
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Translate the following terms into {target}. Each term comes with the context it \
         appeared in; use it to choose the most fitting translation.\n\
         \n\
         [Requirements]\n\
         1. Understand the meaning of each term from its context.\n\
         2. Use established translations where they exist.\n\
         3. Proper nouns may keep the original spelling or use the usual transliteration.\n\
         4. Keep translations short and precise; no explanations.\n\
         \n\
         [Output format]\n\
         Strictly a JSON object whose keys are the terms exactly as listed:\n\
         {{\n  \"middle-earth\": \"...\",\n  \"gandalf\": \"...\"\n}}\n\
         \n\
         [Terms]\n\
         {listing}\n\
         \n\
         Translations:\n"
    )
}
