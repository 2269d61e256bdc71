use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};

use crate::backend::{Backend, BackendFactory, RetryPolicy};
use crate::config::Config;
use crate::error::{Result, YakusuError};
use crate::glossary::generate::GlossarySession;
use crate::glossary::{Glossary, GlossaryStore, MergePolicy, generate_glossary};
use crate::localization::{Localizer, msg};
use crate::progress::{CancelToken, Progress, ProgressSink, RunOutcome};
use crate::subtitle;
use crate::translate::plain_text::translate_plain_text;
use crate::translate::{TranslationSession, translate_segments};

/// Share of a translation run spent generating a missing glossary
const GLOSSARY_SHARE: f64 = 0.3;

/// Per-run choices made by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub source_lang: String,
    pub target_lang: String,
    pub reflection: bool,
    /// Generate a glossary when the one passed in is empty
    pub auto_glossary: bool,
}

impl TranslationRequest {
    pub fn new(source_lang: impl Into<String>, target_lang: impl Into<String>, config: &Config) -> Self {
        Self {
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            reflection: config.translate.reflection_enabled,
            auto_glossary: config.translate.auto_glossary,
        }
    }
}

/// Owns the backend for the duration of a run and sequences the pipeline
pub struct Workflow {
    config: Config,
    backend: Box<dyn Backend>,
    localizer: Localizer,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let backend = BackendFactory::create_backend(&config.backend)?;
        let localizer = match &config.ui.catalog_path {
            Some(path) => Localizer::from_mo_file(path)?,
            None => Localizer::english(),
        };
        info!("Using backend {}", backend.describe());
        Ok(Self::with_backend(config, backend, localizer))
    }

    pub fn with_backend(config: Config, backend: Box<dyn Backend>, localizer: Localizer) -> Self {
        Self { config, backend, localizer }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn localizer(&self) -> &Localizer {
        &self.localizer
    }

    fn retry(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config.backend)
    }

    pub async fn check_backend(&self) -> Result<()> {
        self.backend.check_availability().await
    }

    /// Free the model held by the runtime. Failure is logged, never fatal.
    pub async fn release(&mut self) {
        if let Err(e) = self.backend.release().await {
            warn!("Failed to release {}: {}", self.backend.describe(), e);
        }
    }

    async fn run_glossary(
        &mut self,
        source_text: &str,
        target_lang: &str,
        progress: &mut Progress<'_>,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<Glossary>> {
        let retry = self.retry();
        let mut session = GlossarySession {
            backend: &mut *self.backend,
            config: &self.config.glossary,
            retry,
            progress,
            localizer: &self.localizer,
            cancel,
        };
        generate_glossary(&mut session, source_text, target_lang).await
    }

    /// Report how a run ended and free the backend
    async fn finish<T>(&mut self, progress: &mut Progress<'_>, outcome: &Result<RunOutcome<T>>, completed: Option<&str>) {
        match outcome {
            Ok(RunOutcome::Completed(_)) => {
                if let Some(id) = completed {
                    progress.set(&self.localizer.text(id), 1.0);
                }
            }
            Ok(RunOutcome::Cancelled) => {
                progress.message(&self.localizer.text(msg::PROCESSING_STOPPED));
            }
            Err(e) => {
                error!("Translation failed: {}", e);
                let message = self.localizer.format(msg::TRANSLATION_FAILED, &[("error", e)]);
                progress.message(&message);
            }
        }
        self.release().await;
    }

    /// Build a glossary for `source_text` without translating it
    pub async fn generate_glossary(
        &mut self,
        source_text: &str,
        target_lang: &str,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<Glossary>> {
        let mut progress = Progress::new(sink);
        let outcome = self.run_glossary(source_text, target_lang, &mut progress, cancel).await;
        self.finish(&mut progress, &outcome, None).await;
        outcome
    }

    /// Translate subtitle text.
    ///
    /// An empty `glossary` is filled by generation first when the request
    /// allows it; the caller decides whether to persist it.
    pub async fn translate(
        &mut self,
        source_text: &str,
        glossary: &mut Glossary,
        request: &TranslationRequest,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<String>> {
        let mut progress = Progress::new(sink);
        let outcome = self.run_translate(source_text, glossary, request, &mut progress, cancel).await;
        self.finish(&mut progress, &outcome, Some(msg::TRANSLATION_COMPLETED)).await;
        outcome
    }

    async fn run_translate(
        &mut self,
        source_text: &str,
        glossary: &mut Glossary,
        request: &TranslationRequest,
        progress: &mut Progress<'_>,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<String>> {
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }

        let segments = subtitle::parse(source_text);
        info!("Parsed {} subtitle segments", segments.len());
        let message = self
            .localizer
            .format(msg::PARSED_SEGMENTS, &[("count", &segments.len())]);
        progress.message(&message);

        let translate_from = if glossary.is_empty() && request.auto_glossary {
            progress.message(&self.localizer.text(msg::NO_GLOSSARY));
            progress.push_window(0.0, GLOSSARY_SHARE);
            let generated = self
                .run_glossary(source_text, &request.target_lang, progress, cancel)
                .await;
            progress.pop_window();
            match generated? {
                RunOutcome::Completed(generated) => {
                    glossary.merge(&generated, MergePolicy::KeepExisting);
                }
                RunOutcome::Cancelled => return Ok(RunOutcome::Cancelled),
            }
            GLOSSARY_SHARE
        } else {
            let message = self
                .localizer
                .format(msg::GLOSSARY_FOUND, &[("count", &glossary.len())]);
            progress.message(&message);
            0.0
        };

        let retry = self.retry();
        let mut session = TranslationSession {
            backend: &mut *self.backend,
            config: &self.config.translate,
            retry,
            localizer: &self.localizer,
            glossary,
            source_lang: &request.source_lang,
            target_lang: &request.target_lang,
            reflection: request.reflection,
        };

        progress.push_window(translate_from, 1.0);
        let translated = translate_segments(&mut session, &segments, progress, cancel).await;
        progress.pop_window();

        Ok(translated?.map(|segments| subtitle::serialize(&segments)))
    }

    /// Translate unsegmented text with the same glossary and reflection rules
    pub async fn translate_plain_text(
        &mut self,
        text: &str,
        glossary: &Glossary,
        request: &TranslationRequest,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<String>> {
        let mut progress = Progress::new(sink);
        let outcome = self.run_plain_text(text, glossary, request, &mut progress, cancel).await;
        self.finish(&mut progress, &outcome, Some(msg::TRANSLATION_COMPLETED)).await;
        outcome
    }

    async fn run_plain_text(
        &mut self,
        text: &str,
        glossary: &Glossary,
        request: &TranslationRequest,
        progress: &mut Progress<'_>,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<String>> {
        let retry = self.retry();
        let mut session = TranslationSession {
            backend: &mut *self.backend,
            config: &self.config.translate,
            retry,
            localizer: &self.localizer,
            glossary,
            source_lang: &request.source_lang,
            target_lang: &request.target_lang,
            reflection: request.reflection,
        };
        translate_plain_text(&mut session, text, progress, cancel).await
    }

    fn store(&self) -> GlossaryStore {
        GlossaryStore::from_config(&self.config.glossary)
    }

    async fn read_source(input: &Path) -> Result<String> {
        if !input.exists() {
            return Err(YakusuError::FileNotFound(input.display().to_string()));
        }
        Ok(fs::read_to_string(input).await?)
    }

    async fn write_output(output: &Path, content: &str) -> Result<()> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(output, content).await?;
        Ok(())
    }

    /// Translate a subtitle file, using and updating the stored glossary for it
    pub async fn translate_file(
        &mut self,
        input: &Path,
        output: &Path,
        request: &TranslationRequest,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<PathBuf>> {
        info!("Translating {} -> {}", input.display(), output.display());
        let mut progress = Progress::new(sink);
        let outcome = self.run_translate_file(input, output, request, &mut progress, cancel).await;
        self.finish(&mut progress, &outcome, Some(msg::TRANSLATION_COMPLETED)).await;
        outcome
    }

    async fn run_translate_file(
        &mut self,
        input: &Path,
        output: &Path,
        request: &TranslationRequest,
        progress: &mut Progress<'_>,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<PathBuf>> {
        let source = Self::read_source(input).await?;
        let store = self.store();
        let mut glossary = store.load(input).await?;
        let had_glossary = !glossary.is_empty();

        let outcome = self.run_translate(&source, &mut glossary, request, progress, cancel).await?;
        let RunOutcome::Completed(translated) = outcome else {
            return Ok(RunOutcome::Cancelled);
        };

        if !had_glossary && !glossary.is_empty() {
            store.save(input, &glossary).await?;
        }
        Self::write_output(output, &translated).await?;
        info!("Wrote {}", output.display());
        Ok(RunOutcome::Completed(output.to_path_buf()))
    }

    /// Translate a plain text file with the stored glossary for it, if any
    pub async fn translate_text_file(
        &mut self,
        input: &Path,
        output: &Path,
        request: &TranslationRequest,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<PathBuf>> {
        info!("Translating text {} -> {}", input.display(), output.display());
        let mut progress = Progress::new(sink);
        let outcome = self.run_text_file(input, output, request, &mut progress, cancel).await;
        self.finish(&mut progress, &outcome, Some(msg::TRANSLATION_COMPLETED)).await;
        outcome
    }

    async fn run_text_file(
        &mut self,
        input: &Path,
        output: &Path,
        request: &TranslationRequest,
        progress: &mut Progress<'_>,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<PathBuf>> {
        let source = Self::read_source(input).await?;
        let glossary = self.store().load(input).await?;

        let outcome = self.run_plain_text(&source, &glossary, request, progress, cancel).await?;
        let RunOutcome::Completed(translated) = outcome else {
            return Ok(RunOutcome::Cancelled);
        };

        Self::write_output(output, &translated).await?;
        info!("Wrote {}", output.display());
        Ok(RunOutcome::Completed(output.to_path_buf()))
    }

    /// Generate a glossary for a file and merge it into the stored one.
    /// Existing entries win over generated ones.
    pub async fn generate_glossary_file(
        &mut self,
        input: &Path,
        target_lang: &str,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<Glossary>> {
        let mut progress = Progress::new(sink);
        let outcome = self.run_glossary_file(input, target_lang, &mut progress, cancel).await;
        self.finish(&mut progress, &outcome, None).await;
        outcome
    }

    async fn run_glossary_file(
        &mut self,
        input: &Path,
        target_lang: &str,
        progress: &mut Progress<'_>,
        cancel: &CancelToken,
    ) -> Result<RunOutcome<Glossary>> {
        let source = Self::read_source(input).await?;
        let store = self.store();
        let mut glossary = store.load(input).await?;

        let outcome = self.run_glossary(&source, target_lang, progress, cancel).await?;
        let RunOutcome::Completed(generated) = outcome else {
            return Ok(RunOutcome::Cancelled);
        };

        let added = glossary.merge(&generated, MergePolicy::KeepExisting);
        info!("Added {} generated terms to the glossary of {}", added, input.display());
        store.save(input, &glossary).await?;
        Ok(RunOutcome::Completed(glossary))
    }
}
