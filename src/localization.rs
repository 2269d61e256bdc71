//! Localized status messages.
//!
//! Message ids are the English texts below. A compiled gettext catalog (.mo)
//! may translate them; missing entries fall back to English.

use gettext::Catalog;
use std::fs::File;
use std::path::Path;

use crate::error::{Result, YakusuError};

pub mod msg {
    pub const PARSED_SEGMENTS: &str = "Parsed {count} subtitle segments";
    pub const NO_GLOSSARY: &str = "No glossary found, generating one";
    pub const GLOSSARY_FOUND: &str = "Using glossary with {count} terms";
    pub const CHUNKED: &str = "Split subtitles into {count} chunks";
    pub const TRANSLATING_CHUNK: &str = "Translating chunk {index}/{total}";
    pub const REFLECTING_CHUNK: &str = "Reviewing translation of chunk {index}/{total}";
    pub const REFLECTION_DISABLED: &str = "Reflection disabled, keeping first draft";
    pub const REPAIRING_CHUNK: &str = "Segment count mismatch in chunk {index} ({found}/{expected}), requesting repair";
    pub const CHUNK_DONE: &str = "Chunk {index}/{total} translated";
    pub const PROCESSING_STOPPED: &str = "Processing stopped";
    pub const TRANSLATION_COMPLETED: &str = "Translation completed";
    pub const TRANSLATION_FAILED: &str = "Translation failed: {error}";
    pub const TRANSLATION_MISSING: &str = "[translation missing]";
    pub const PLAIN_TEXT_CHUNKED: &str = "Split text into {count} chunks";
    pub const GLOSSARY_TEXT_SPLIT: &str = "Glossary: text split into {count} chunks";
    pub const GLOSSARY_CHUNK_DONE: &str = "Glossary: chunk {index}/{total} yielded {terms} terms";
    pub const GLOSSARY_FREQUENCY_DONE: &str = "Glossary: term frequency computed";
    pub const GLOSSARY_FILTERED: &str = "Glossary: kept {count} terms";
    pub const GLOSSARY_BATCH_DONE: &str = "Glossary: batch {index}/{total} translated";
    pub const GLOSSARY_COMPLETED: &str = "Glossary generated with {count} terms";
    pub const GLOSSARY_EMPTY: &str = "Glossary: no terms found";
}

pub struct Localizer {
    catalog: Catalog,
}

impl Default for Localizer {
    fn default() -> Self {
        Self::english()
    }
}

impl Localizer {
    /// Untranslated message ids
    pub fn english() -> Self {
        Self {
            catalog: Catalog::empty(),
        }
    }

    /// Load a compiled gettext catalog
    pub fn from_mo_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| YakusuError::Localization(format!("{}: {}", path.display(), e)))?;
        let catalog = Catalog::parse(file)
            .map_err(|e| YakusuError::Localization(format!("{}: {}", path.display(), e)))?;
        Ok(Self { catalog })
    }

    pub fn text(&self, id: &str) -> String {
        self.catalog.gettext(id).to_string()
    }

    /// Translate `id` and substitute `{name}` placeholders
    pub fn format(&self, id: &str, args: &[(&str, &dyn std::fmt::Display)]) -> String {
        let mut text = self.text(id);
        for (name, value) in args {
            text = text.replace(&format!("{{{}}}", name), &value.to_string());
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_fallback() {
        let localizer = Localizer::english();
        assert_eq!(localizer.text(msg::TRANSLATION_MISSING), "[translation missing]");
    }

    #[test]
    fn test_format_placeholders() {
        let localizer = Localizer::english();
        let text = localizer.format(msg::TRANSLATING_CHUNK, &[("index", &3), ("total", &12)]);
        assert_eq!(text, "Translating chunk 3/12");
    }

    #[test]
    fn test_missing_catalog_is_an_error() {
        let result = Localizer::from_mo_file("/nonexistent/catalog.mo");
        assert!(matches!(result, Err(YakusuError::Localization(_))));
    }
}
