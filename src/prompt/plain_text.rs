use super::language_instruction;

pub fn system_prompt(source_lang: &str, target_lang: &str) -> String {
    format!(
        "You are a professional translator. {}\n\
         \n\
         Rules:\n\
         1. Output only the translated text. No explanations, notes or commentary.\n\
         2. Keep the formatting and tone of the original; the translation must read naturally.\n\
         3. Translate song lyrics directly; never replace them with asterisks or other symbols.\n\
         4. Keep the music symbol ♪ where it appears.\n\
         5. You may think before answering, but never include <think> tags or their content in the output.",
        language_instruction(source_lang, target_lang, "text")
    )
}

pub fn translation_prompt(text: &str, glossary_section: &str) -> String {
    if glossary_section.trim().is_empty() {
        format!("Translate the following text:\n{}\n", text)
    } else {
        format!("Translate the following text:\n{}\n\n{}\n", text, glossary_section)
    }
}

pub fn critique_prompt(source: &str, draft: &str) -> String {
    format!(
        "Review the source and the translation, assess the quality and give short, concrete suggestions.\n\
         \n\
         [Source]\n\
         {}\n\
         \n\
         [Translation]\n\
         {}\n",
        source, draft
    )
}

pub fn improvement_prompt(source: &str, draft: &str, recommendation: &str) -> String {
    format!(
        "Improve the translation according to the suggestions.\n\
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
         Keep pronouns and terminology consistent. Output only the translation, without explanations or notes.\n",
        source,
        draft,
        recommendation.trim()
    )
}
