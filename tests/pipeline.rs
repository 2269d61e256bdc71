use assert_fs::prelude::*;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::{Arc, Mutex};

use yakusu::backend::{Backend, CompletionOptions};
use yakusu::config::Config;
use yakusu::error::{Result, YakusuError};
use yakusu::glossary::{Glossary, GlossaryStore};
use yakusu::localization::Localizer;
use yakusu::progress::{CancelToken, NullProgress, RunOutcome};
use yakusu::workflow::{TranslationRequest, Workflow};

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Zorka\d+").unwrap());
static LISTED_TERM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\. \*\*([^*]+)\*\*").unwrap());

type Handler = Box<dyn Fn(&str, usize) -> Result<String> + Send + Sync>;

/// Answers prompts from a script and records every user prompt it receives
struct ScriptedBackend {
    handler: Handler,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    fn new(handler: Handler) -> (Self, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        (Self { handler, prompts: prompts.clone() }, prompts)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn complete(&mut self, _system_prompt: &str, user_prompt: &str, _options: CompletionOptions) -> Result<String> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(user_prompt.to_string());
            prompts.len()
        };
        (self.handler)(user_prompt, call)
    }

    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

fn is_extraction(prompt: &str) -> bool {
    prompt.contains("Extracted terms:")
}

fn is_term_translation(prompt: &str) -> bool {
    prompt.contains("Translations:")
}

fn is_repair(prompt: &str) -> bool {
    prompt.contains("[Wrong translation]")
}

/// `[[id]]` blocks under `[Translate ...]`, text upper-cased
fn echo_translation(prompt: &str) -> String {
    let section = prompt.split("[Translate - entries").nth(1).unwrap_or("");
    section
        .lines()
        .skip(1)
        .take_while(|line| !line.trim().is_empty())
        .map(|line| if line.starts_with("[[") { line.to_string() } else { line.to_uppercase() })
        .collect::<Vec<_>>()
        .join("\n")
}

fn srt(texts: &[&str]) -> String {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("{}\n00:00:{:02},000 --> 00:00:{:02},500\n{}\n", i + 1, i, i, text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn config_in(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.backend.max_retries = 0;
    config.glossary.storage_dir = dir.join("glossary").to_string_lossy().into_owned();
    config
}

fn request(auto_glossary: bool) -> TranslationRequest {
    TranslationRequest {
        source_lang: "en".to_string(),
        target_lang: "ja".to_string(),
        reflection: false,
        auto_glossary,
    }
}

#[tokio::test]
async fn test_short_translation_is_repaired_once_then_padded() {
    let source = srt(&["one", "two", "three", "four"]);
    let three_blocks = "[[1]]\nいち\n[[2]]\nに\n[[3]]\nさん";
    let (backend, prompts) = ScriptedBackend::new(Box::new(move |_, _| Ok(three_blocks.to_string())));

    let temp = assert_fs::TempDir::new().unwrap();
    let mut workflow = Workflow::with_backend(config_in(temp.path()), Box::new(backend), Localizer::english());
    let mut glossary = Glossary::new();

    let output = workflow
        .translate(&source, &mut glossary, &request(false), &mut NullProgress, &CancelToken::new())
        .await
        .unwrap()
        .completed()
        .unwrap();

    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(is_repair(&prompts[1]));

    let segments = yakusu::subtitle::parse(&output);
    assert_eq!(segments.len(), 4);
    assert_eq!(segments[2].text, "さん");
    assert_eq!(segments[3].text, "[translation missing]");
    assert_eq!(segments[3].id, "4");
}

#[tokio::test]
async fn test_cancelled_file_run_writes_nothing() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("episode.srt");
    input.write_str(&srt(&["Hello", "World"])).unwrap();
    let output = temp.child("out/episode.ja.srt");

    let (backend, prompts) = ScriptedBackend::new(Box::new(|prompt, _| Ok(echo_translation(prompt))));
    let mut workflow = Workflow::with_backend(config_in(temp.path()), Box::new(backend), Localizer::english());

    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = workflow
        .translate_file(input.path(), output.path(), &request(true), &mut NullProgress, &cancel)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert!(prompts.lock().unwrap().is_empty());
    assert!(!output.path().exists());
}

#[tokio::test]
async fn test_file_translation_generates_and_stores_glossary() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("fellowship.srt");
    input
        .write_str(&srt(&["Frodo, wake up.", "Where is Gandalf?", "Gandalf went ahead.", "Then follow Frodo."]))
        .unwrap();
    let output = temp.child("out/fellowship.ja.srt");

    let (backend, prompts) = ScriptedBackend::new(Box::new(|prompt, _| {
        if is_extraction(prompt) {
            Ok("[\"Frodo\", \"Gandalf\"]".to_string())
        } else if is_term_translation(prompt) {
            Ok("{\"frodo\": \"フロド\", \"gandalf\": \"ガンダルフ\"}".to_string())
        } else {
            Ok(echo_translation(prompt))
        }
    }));
    let config = config_in(temp.path());
    let store = GlossaryStore::from_config(&config.glossary);
    let mut workflow = Workflow::with_backend(config, Box::new(backend), Localizer::english());

    let mut fractions = Vec::new();
    let mut sink = |_: &str, fraction: f64| fractions.push(fraction);
    let outcome = workflow
        .translate_file(input.path(), output.path(), &request(true), &mut sink, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Completed(output.path().to_path_buf()));
    output.assert(srt(&["FRODO, WAKE UP.", "WHERE IS GANDALF?", "GANDALF WENT AHEAD.", "THEN FOLLOW FRODO."]).as_str());

    let stored = store.load(input.path()).await.unwrap();
    assert_eq!(stored.get("Frodo"), Some("フロド"));
    assert_eq!(stored.get("gandalf"), Some("ガンダルフ"));

    let prompts = prompts.lock().unwrap();
    let translation = prompts.iter().find(|p| p.contains("[Translate - entries")).unwrap();
    assert!(translation.contains("- frodo → フロド"));

    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(fractions.last().copied(), Some(1.0));
}

fn name_heavy_source() -> String {
    let lines: Vec<String> = (0..80)
        .map(|i| format!("Zorka{} greets Zorka{} twice.", i, i))
        .collect();
    let texts: Vec<&str> = lines.iter().map(String::as_str).collect();
    srt(&texts)
}

fn glossary_handler() -> Handler {
    Box::new(|prompt, _| {
        if is_extraction(prompt) {
            let text = prompt.split("[Text]").nth(1).unwrap_or("");
            let mut names: Vec<String> = Vec::new();
            for found in NAME_RE.find_iter(text) {
                let name = format!("\"{}\"", found.as_str());
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            names.truncate(15);
            Ok(format!("[{}]", names.join(", ")))
        } else if is_term_translation(prompt) {
            let pairs: Vec<String> = LISTED_TERM_RE
                .captures_iter(prompt)
                .map(|c| format!("\"{}\": \"{}\"", &c[1], c[1].to_uppercase()))
                .collect();
            Ok(format!("{{{}}}", pairs.join(", ")))
        } else {
            Err(YakusuError::Backend("unexpected prompt".to_string()))
        }
    })
}

#[tokio::test]
async fn test_generated_glossary_is_capped() {
    let temp = assert_fs::TempDir::new().unwrap();
    let (backend, prompts) = ScriptedBackend::new(glossary_handler());
    let mut workflow = Workflow::with_backend(config_in(temp.path()), Box::new(backend), Localizer::english());

    let glossary = workflow
        .generate_glossary(&name_heavy_source(), "ja", &mut NullProgress, &CancelToken::new())
        .await
        .unwrap()
        .completed()
        .unwrap();

    let prompts = prompts.lock().unwrap();
    let requested: usize = prompts
        .iter()
        .filter(|p| is_term_translation(p))
        .map(|p| LISTED_TERM_RE.captures_iter(p).count())
        .sum();

    assert!(requested <= 50);
    assert!(glossary.len() <= 50);
    assert_eq!(glossary.len(), requested);
}

#[tokio::test]
async fn test_glossary_generation_is_idempotent() {
    let temp = assert_fs::TempDir::new().unwrap();
    let source = name_heavy_source();

    let mut results = Vec::new();
    for _ in 0..2 {
        let (backend, _) = ScriptedBackend::new(glossary_handler());
        let mut workflow = Workflow::with_backend(config_in(temp.path()), Box::new(backend), Localizer::english());
        let glossary = workflow
            .generate_glossary(&source, "ja", &mut NullProgress, &CancelToken::new())
            .await
            .unwrap();
        results.push(glossary);
    }

    assert_eq!(results[0], results[1]);
    assert!(!results[0].clone().completed().unwrap().is_empty());
}

#[tokio::test]
async fn test_bom_and_padded_ids_keep_segments_aligned() {
    let source = "\u{feff}1\n00:00:00,000 --> 00:00:00,500\nHello\n\n\
                  2 \n00:00:01,000 --> 00:00:01,500\nWorld\n\n\
                  3\n00:00:02,000 --> 00:00:02,500\nBye\n";
    let (backend, prompts) = ScriptedBackend::new(Box::new(|prompt, _| Ok(echo_translation(prompt))));

    let temp = assert_fs::TempDir::new().unwrap();
    let mut workflow = Workflow::with_backend(config_in(temp.path()), Box::new(backend), Localizer::english());
    let mut glossary = Glossary::new();

    let output = workflow
        .translate(source, &mut glossary, &request(false), &mut NullProgress, &CancelToken::new())
        .await
        .unwrap()
        .completed()
        .unwrap();

    // no repair round trip
    assert_eq!(prompts.lock().unwrap().len(), 1);
    assert_eq!(output, source.replace("Hello", "HELLO").replace("World", "WORLD").replace("Bye", "BYE"));
}

#[tokio::test]
async fn test_cancel_between_chunks_writes_nothing() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("episode.srt");
    input.write_str(&srt(&["one", "two", "three"])).unwrap();
    let output = temp.child("out/episode.ja.srt");

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let (backend, prompts) = ScriptedBackend::new(Box::new(move |prompt, _| {
        trigger.cancel();
        Ok(echo_translation(prompt))
    }));
    let mut config = config_in(temp.path());
    config.translate.chunk_size = 1;
    let mut workflow = Workflow::with_backend(config, Box::new(backend), Localizer::english());

    let mut messages = Vec::new();
    let mut sink = |message: &str, _: f64| messages.push(message.to_string());
    let outcome = workflow
        .translate_file(input.path(), output.path(), &request(false), &mut sink, &cancel)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(prompts.lock().unwrap().len(), 1);
    assert!(!output.path().exists());
    assert_eq!(messages.last().map(String::as_str), Some("Processing stopped"));
}

#[tokio::test]
async fn test_cancel_during_glossary_generation_stops_the_run() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("fellowship.srt");
    input.write_str(&name_heavy_source()).unwrap();
    let output = temp.child("fellowship.ja.srt");

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let handler = glossary_handler();
    let (backend, prompts) = ScriptedBackend::new(Box::new(move |prompt, call| {
        trigger.cancel();
        handler(prompt, call)
    }));
    let config = config_in(temp.path());
    let store = GlossaryStore::from_config(&config.glossary);
    let mut workflow = Workflow::with_backend(config, Box::new(backend), Localizer::english());

    let outcome = workflow
        .translate_file(input.path(), output.path(), &request(true), &mut NullProgress, &cancel)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(is_extraction(&prompts[0]));
    assert!(!output.path().exists());
    assert!(store.load(input.path()).await.unwrap().is_empty());
}
