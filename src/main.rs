//! Yakusu - LLM subtitle translation
//!
//! Command line entry point. Every run happens in one background task that
//! owns the workflow and its backend; this task renders progress and turns
//! Ctrl-C into a cancellation request.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::Path;
use tracing::{Level, info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use yakusu::cli::{Args, Commands, GlossaryAction};
use yakusu::config::Config;
use yakusu::glossary::{GlossaryStore, MergePolicy};
use yakusu::progress::{self, CancelToken, ChannelProgress, RunOutcome};
use yakusu::workflow::{TranslationRequest, Workflow};

const BAR_LENGTH: u64 = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;
    info!("Starting Yakusu");

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Translate { input, output, source_lang, target_lang, reflect, no_glossary } => {
            let mut request = TranslationRequest::new(source_lang, target_lang, &config);
            request.reflection |= reflect;
            request.auto_glossary &= !no_glossary;

            let mut workflow = Workflow::new(config)?;
            let outcome = run_with_progress(move |mut sink, cancel| async move {
                workflow.translate_file(&input, &output, &request, &mut sink, &cancel).await
            })
            .await?;

            match outcome {
                RunOutcome::Completed(path) => println!("Translated subtitles written to {}", path.display()),
                RunOutcome::Cancelled => println!("Translation cancelled"),
            }
        }
        Commands::Text { input, output, source_lang, target_lang, reflect } => {
            let mut request = TranslationRequest::new(source_lang, target_lang, &config);
            request.reflection |= reflect;

            let mut workflow = Workflow::new(config)?;
            let outcome = run_with_progress(move |mut sink, cancel| async move {
                workflow.translate_text_file(&input, &output, &request, &mut sink, &cancel).await
            })
            .await?;

            match outcome {
                RunOutcome::Completed(path) => println!("Translated text written to {}", path.display()),
                RunOutcome::Cancelled => println!("Translation cancelled"),
            }
        }
        Commands::Glossary { action } => manage_glossary(config, action).await?,
        Commands::Check => {
            let workflow = Workflow::new(config)?;
            workflow.check_backend().await?;
            println!("Backend is available: {} at {}", workflow.config().backend.model, workflow.config().backend.endpoint);
        }
    }

    info!("Yakusu finished");
    Ok(())
}

async fn manage_glossary(config: Config, action: GlossaryAction) -> Result<()> {
    let store = GlossaryStore::from_config(&config.glossary);

    match action {
        GlossaryAction::Generate { input, target_lang } => {
            let mut workflow = Workflow::new(config)?;
            let outcome = run_with_progress(move |mut sink, cancel| async move {
                workflow.generate_glossary_file(&input, &target_lang, &mut sink, &cancel).await
            })
            .await?;

            match outcome {
                RunOutcome::Completed(glossary) => println!("Glossary now holds {} terms", glossary.len()),
                RunOutcome::Cancelled => println!("Glossary generation cancelled"),
            }
        }
        GlossaryAction::Show { input } => {
            let glossary = store.load(&input).await?;
            if glossary.is_empty() {
                println!("No glossary terms for {}", input.display());
            } else {
                println!("\nGlossary for {} ({} terms):", input.display(), glossary.len());
                println!("{:<30} {:<30}", "Source", "Translation");
                println!("{}", "-".repeat(60));
                for (source, target) in glossary.iter() {
                    println!("{:<30} {:<30}", source, target);
                }
            }
        }
        GlossaryAction::Add { input, source, target } => {
            let mut glossary = store.load(&input).await?;
            if !glossary.add(&source, &target) {
                anyhow::bail!("Source term and translation must not be empty");
            }
            store.save(&input, &glossary).await?;
            println!("Added {} → {}", source.trim(), target.trim());
        }
        GlossaryAction::Remove { input, source } => {
            let mut glossary = store.load(&input).await?;
            match glossary.remove(&source) {
                Some(_) => {
                    store.save(&input, &glossary).await?;
                    println!("Removed {}", source);
                }
                None => println!("No term {} in the glossary", source),
            }
        }
        GlossaryAction::Clear { input } => {
            if store.delete(&input).await? {
                println!("Deleted glossary for {}", input.display());
            } else {
                println!("No glossary stored for {}", input.display());
            }
        }
        GlossaryAction::Import { input, file, overwrite } => {
            let mut glossary = store.load(&input).await?;
            let imported = GlossaryStore::import(&file).await?;
            let policy = if overwrite { MergePolicy::Overwrite } else { MergePolicy::KeepExisting };
            let changed = glossary.merge(&imported, policy);
            store.save(&input, &glossary).await?;
            println!("Imported {} of {} terms", changed, imported.len());
        }
        GlossaryAction::Export { input, file } => {
            let glossary = store.load(&input).await?;
            GlossaryStore::export(&glossary, &file).await?;
            println!("Exported {} terms to {}", glossary.len(), file.display());
        }
    }

    Ok(())
}

/// Run `job` on a worker task while rendering its progress.
/// Ctrl-C requests cancellation; the worker stops at the next chunk boundary.
async fn run_with_progress<T, F, Fut>(job: F) -> Result<RunOutcome<T>>
where
    F: FnOnce(ChannelProgress, CancelToken) -> Fut,
    Fut: Future<Output = yakusu::error::Result<RunOutcome<T>>> + Send + 'static,
    T: Send + 'static,
{
    let (sink, mut receiver) = progress::channel();
    let cancel = CancelToken::new();

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current step");
                cancel.cancel();
            }
        })
    };

    let worker = tokio::spawn(job(sink, cancel));

    let bar = ProgressBar::new(BAR_LENGTH);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")?
            .progress_chars("#>-"),
    );

    // The channel closes once the worker drops its sink
    while let Some(update) = receiver.recv().await {
        bar.set_position((update.fraction * BAR_LENGTH as f64).round() as u64);
        if !update.message.is_empty() {
            bar.set_message(update.message);
        }
    }

    let result = worker.await?;
    watcher.abort();

    match &result {
        Ok(RunOutcome::Completed(_)) => bar.finish(),
        _ => bar.abandon(),
    }
    Ok(result?)
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".yakusu").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "yakusu.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("yakusu.log").display()
    );

    Ok(())
}
