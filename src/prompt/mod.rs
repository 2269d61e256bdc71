// Prompt construction
//
// Pure functions turning structured inputs into instructions for the backend:
// - subtitle chunks (this module): translation, critique, improvement, repair
// - glossary: term extraction and term translation
// - plain_text: paragraph translation without segment markers

pub mod glossary;
pub mod plain_text;

use crate::chunk::Chunk;
use crate::subtitle::Segment;

/// Source language value meaning "detect automatically"
pub const AUTO_DETECT: &str = "auto";

/// Convert language code to full language name for clearer prompts
pub fn language_code_to_name(code: &str) -> String {
    match code.trim().to_lowercase().as_str() {
        "en" => "English".to_string(),
        "ja" => "Japanese".to_string(),
        "ko" => "Korean".to_string(),
        "zh" | "zh-cn" | "zh-hans" => "Simplified Chinese".to_string(),
        "zh-tw" | "zh-hk" | "zh-hant" => "Traditional Chinese".to_string(),
        "fr" => "French".to_string(),
        "de" => "German".to_string(),
        "es" => "Spanish".to_string(),
        "ru" => "Russian".to_string(),
        "it" => "Italian".to_string(),
        "pt" => "Portuguese".to_string(),
        "pt-br" => "Brazilian Portuguese".to_string(),
        "pl" => "Polish".to_string(),
        "nl" => "Dutch".to_string(),
        "tr" => "Turkish".to_string(),
        "ar" => "Arabic".to_string(),
        "hi" => "Hindi".to_string(),
        "th" => "Thai".to_string(),
        "vi" => "Vietnamese".to_string(),
        "id" => "Indonesian".to_string(),
        "sv" => "Swedish".to_string(),
        "da" => "Danish".to_string(),
        "no" => "Norwegian".to_string(),
        "fi" => "Finnish".to_string(),
        "he" => "Hebrew".to_string(),
        "hu" => "Hungarian".to_string(),
        "cs" => "Czech".to_string(),
        "uk" => "Ukrainian".to_string(),
        "el" => "Greek".to_string(),
        _ => code.trim().to_string(), // Already a name, or unknown code
    }
}

fn language_instruction(source_lang: &str, target_lang: &str, what: &str) -> String {
    let target = language_code_to_name(target_lang);
    if source_lang.trim().is_empty() || source_lang.trim().eq_ignore_ascii_case(AUTO_DETECT) {
        format!("Detect the language of the input {} automatically and translate it into {}.", what, target)
    } else {
        format!(
            "Translate the {} from {} into {}.",
            what,
            language_code_to_name(source_lang),
            target
        )
    }
}

/// Render segments as `[[id]]` blocks
pub fn format_segments<'a>(segments: impl IntoIterator<Item = &'a Segment>) -> String {
    segments
        .into_iter()
        .map(|segment| format!("[[{}]]\n{}", segment.marker_id(), segment.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn reference_block(chunk: &Chunk<'_>) -> String {
    let reference = format_segments(chunk.reference_segments());
    if reference.is_empty() {
        "(none)".to_string()
    } else {
        reference
    }
}

fn id_range(chunk: &Chunk<'_>) -> (String, String) {
    let main = chunk.main_segments();
    let first = main.first().map(|s| s.marker_id().to_string()).unwrap_or_default();
    let last = main.last().map(|s| s.marker_id().to_string()).unwrap_or_default();
    (first, last)
}

const FORMAT_RULES: &str = "Output format:\n\
[[number]]\n\
translated text\n\
\n\
The [[number]] marker must be alone on its own line, followed by the translation on the next line.";

/// System prompt shared by translation, improvement and repair requests
pub fn system_prompt(source_lang: &str, target_lang: &str) -> String {
    format!(
        "You are a professional subtitle translator. {}\n\
         \n\
         Rules:\n\
         1. Output only the translated text. No explanations, notes or commentary.\n\
         2. Keep the tone and register of the original; the translation must read naturally.\n\
         3. Translate song lyrics directly; never replace them with asterisks or other symbols.\n\
         4. Keep the music symbol ♪ where it appears.\n\
         5. Every entry starts with its [[number]] marker. One entry may span several lines; \
         never treat the lines of one entry as separate entries, and never merge entries.\n\
         6. You may think before answering, but never include <think> tags or their content in the output.\n\
         \n\
         Example: an entry spanning two lines is still one entry.\n\
         [[1]]\n\
         I could often read by means\n\
         of the tenure of her speech\n\
         \n\
         Example of merged entries (wrong) versus kept entries (right):\n\
         Source:\n\
         [[1]]\n\
         But if you see that I'm done for,\n\
         [[2]]\n\
         well, you're gonna have to do\n\
         for yourself.\n\
         Wrong: a single [[1]] holding both sentences.\n\
         Right: [[1]] holds the first sentence and [[2]] the second, its two lines kept together.",
        language_instruction(source_lang, target_lang, "subtitles")
    )
}

/// First-pass translation of a chunk's main segments
pub fn translation_prompt(chunk: &Chunk<'_>, glossary_section: &str) -> String {
    let expected = chunk.main_count();
    let (first, last) = id_range(chunk);

    let mut prompt = format!(
        "Translate the subtitle entries listed under [Translate].\n\
         \n\
         [Context - for understanding only, DO NOT translate]\n\
         {}\n\
         \n\
         [Translate - entries {} to {}, {} in total]\n\
         {}\n",
        reference_block(chunk),
        first,
        last,
        expected,
        format_segments(chunk.main_segments()),
    );

    if !glossary_section.trim().is_empty() {
        prompt.push('\n');
        prompt.push_str(glossary_section);
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "\n\
         Steps:\n\
         1. Read the context to understand the scene and tone, but do not translate it.\n\
         2. Count the entries under [Translate]; one marker and the lines below it form one entry.\n\
         3. Translate, producing exactly {expected} entries with the same markers. Use the glossary \
         translations exactly where they apply.\n\
         4. Check that no entry was dropped, merged or split.\n\
         \n\
         Requirements:\n\
         1. Translate only the {expected} entries under [Translate].\n\
         2. Keep the markers {first} to {last}.\n\
         3. Keep pronouns and terminology consistent.\n\
         \n\
         {FORMAT_RULES}\n"
    ));

    prompt
}

/// System prompt for the critique step
pub fn critique_system_prompt(target_lang: &str) -> String {
    let target = language_code_to_name(target_lang);
    format!(
        "You are a subtitle translation reviewer. Assess the translation and give improvement \
         suggestions only when there are serious problems. The source language is detected \
         automatically; the target language is {target}.\n\
         Principles:\n\
         - Check that the translation is actually in {target}; if it is not, say so.\n\
         - A good translation does not need forced changes. If nothing needs fixing, reply with nothing."
    )
}

/// Ask for a short critique of a draft translation
pub fn critique_prompt(chunk: &Chunk<'_>, draft: &str) -> String {
    format!(
        "Review the source and the translation. Check that everything was translated, assess the \
         quality and give short, concrete suggestions.\n\
         \n\
         [Context - for understanding only, not part of the source]\n\
         {}\n\
         \n\
         [Source]\n\
         {}\n\
         \n\
         [Translation]\n\
         {}\n\
         \n\
         Only comment on clear errors:\n\
         - mistranslations or omissions\n\
         - grammar errors\n\
         - unnatural phrasing\n\
         - words left untranslated\n",
        reference_block(chunk),
        format_segments(chunk.main_segments()),
        draft
    )
}

/// Ask for a revised translation that applies a critique
pub fn improvement_prompt(chunk: &Chunk<'_>, draft: &str, recommendation: &str) -> String {
    let expected = chunk.main_count();
    format!(
        "Improve the translation according to the suggestions, keeping the number of entries unchanged.\n\
         \n\
         [Context - for understanding only, DO NOT translate]\n\
         {}\n\
         \n\
         [Source]\n\
         {}\n\
         \n\
         [Translation]\n\
         {}\n\
         \n\
         [Suggestions]\n\
         {}\n\
         \n\
         Combine the source, the translation and the suggestions into the final translation. \
         Translate only the source; the context is reference material. \
         Keep pronouns and terminology consistent.\n\
         \n\
         Requirements:\n\
         1. Output exactly {} entries.\n\
         2. Never drop, merge or skip an entry.\n\
         3. Translate lyrics directly; never replace them with symbols.\n\
         4. Output only the translation, without explanations or notes.\n\
         \n\
         {}\n",
        reference_block(chunk),
        format_segments(chunk.main_segments()),
        draft,
        recommendation.trim(),
        expected,
        FORMAT_RULES
    )
}

/// Forced re-translation after the entry count drifted
pub fn repair_prompt(chunk: &Chunk<'_>, mismatched: &str) -> String {
    let expected = chunk.main_count();
    format!(
        "The entries of the translation do not match the source. Translate the source again so \
         that every entry matches the source entry with the same marker.\n\
         \n\
         [Source]\n\
         {}\n\
         \n\
         [Wrong translation]\n\
         {}\n\
         \n\
         Steps:\n\
         1. Compare each source entry with the wrong translation and find the entries that do not line up.\n\
         2. Translate the source again so that every marker and its content match the source.\n\
         \n\
         Requirements:\n\
         1. Output exactly {} entries.\n\
         2. Never drop, merge or skip an entry, even when an entry is only half a sentence.\n\
         3. Output only the translation, without explanations or notes.\n\
         \n\
         Example:\n\
         Source:\n\
         [[432]]\n\
         shall not perish\n\
         [[433]]\n\
         from the earth.\n\
         [[434]]\n\
         [applause]\n\
         Wrong translation: [[432]] holds the whole sentence and [[433]] is empty.\n\
         Right translation: the sentence is divided between [[432]] and [[433]], [[434]] keeps [applause].\n\
         \n\
         {}\n",
        format_segments(chunk.main_segments()),
        mismatched,
        expected,
        FORMAT_RULES
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk;

    fn document() -> Vec<Segment> {
        (1..=5)
            .map(|i| Segment::new(i.to_string(), "t", format!("line {}", i)))
            .collect()
    }

    #[test]
    fn test_language_names() {
        assert_eq!(language_code_to_name("ja"), "Japanese");
        assert_eq!(language_code_to_name("zh-CN"), "Simplified Chinese");
        assert_eq!(language_code_to_name("Klingon"), "Klingon");
    }

    #[test]
    fn test_system_prompt_auto_detect() {
        assert!(system_prompt("auto", "fr").contains("Detect the language"));
        let explicit = system_prompt("en", "fr");
        assert!(explicit.contains("from English into French"));
    }

    #[test]
    fn test_translation_prompt_separates_context_and_targets() {
        let segs = document();
        let chunks = chunk(&segs, 2, 1);
        let prompt = translation_prompt(&chunks[1], "");

        let context_pos = prompt.find("[Context").unwrap();
        let translate_pos = prompt.find("[Translate - entries 3 to 4, 2 in total]").unwrap();
        assert!(context_pos < translate_pos);
        assert!(prompt[context_pos..translate_pos].contains("[[2]]\nline 2"));
        assert!(prompt[context_pos..translate_pos].contains("[[5]]\nline 5"));
        assert!(prompt[translate_pos..].contains("[[3]]\nline 3\n[[4]]\nline 4"));
        assert!(prompt.contains("exactly 2 entries"));
        assert!(!prompt.contains("[Glossary]"));
    }

    #[test]
    fn test_translation_prompt_includes_glossary() {
        let segs = document();
        let chunks = chunk(&segs, 5, 0);
        let prompt = translation_prompt(&chunks[0], "[Glossary]\n- frodo → フロド");
        assert!(prompt.contains("[Glossary]\n- frodo → フロド"));
        assert!(prompt.contains("(none)"));
    }

    #[test]
    fn test_repair_prompt_lists_source_markers() {
        let segs = document();
        let chunks = chunk(&segs, 3, 0);
        let prompt = repair_prompt(&chunks[0], "[[1]]\nA\n[[2]]\nB");
        assert!(prompt.contains("[[1]]\nline 1\n[[2]]\nline 2\n[[3]]\nline 3"));
        assert!(prompt.contains("exactly 3 entries"));
        assert!(prompt.contains("[Wrong translation]\n[[1]]\nA\n[[2]]\nB"));
    }

    #[test]
    fn test_markers_use_normalized_ids() {
        let segs = vec![
            Segment::new("\u{feff}1", "t", "Hello"),
            Segment::new("2 ", "t", "World"),
        ];
        let chunks = chunk(&segs, 2, 0);
        let prompt = translation_prompt(&chunks[0], "");
        assert!(prompt.contains("[Translate - entries 1 to 2, 2 in total]"));
        assert!(prompt.contains("[[1]]\nHello\n[[2]]\nWorld"));
        assert!(!prompt.contains('\u{feff}'));
    }
}
