use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate an SRT subtitle file
    Translate {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file
        #[arg(short, long)]
        output: PathBuf,

        /// Source language code, or "auto" to detect
        #[arg(short, long, default_value = "auto")]
        source_lang: String,

        /// Target language code
        #[arg(short, long)]
        target_lang: String,

        /// Critique and improve every chunk
        #[arg(long)]
        reflect: bool,

        /// Do not generate a glossary when none is stored
        #[arg(long)]
        no_glossary: bool,
    },

    /// Translate a plain text file
    Text {
        /// Input text file
        #[arg(short, long)]
        input: PathBuf,

        /// Output text file
        #[arg(short, long)]
        output: PathBuf,

        /// Source language code, or "auto" to detect
        #[arg(short, long, default_value = "auto")]
        source_lang: String,

        /// Target language code
        #[arg(short, long)]
        target_lang: String,

        /// Critique and improve every chunk
        #[arg(long)]
        reflect: bool,
    },

    /// Manage the glossary stored for a source file
    Glossary {
        #[command(subcommand)]
        action: GlossaryAction,
    },

    /// Check that the backend is reachable and the model is available
    Check,
}

#[derive(Subcommand)]
pub enum GlossaryAction {
    /// Generate terms from the file and merge them into its glossary
    Generate {
        /// Source file the glossary belongs to
        #[arg(short, long)]
        input: PathBuf,

        /// Target language code
        #[arg(short, long)]
        target_lang: String,
    },

    /// Print the glossary
    Show {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Add or replace a term
    Add {
        #[arg(short, long)]
        input: PathBuf,

        /// Source term
        source: String,

        /// Translation
        target: String,
    },

    /// Remove a term
    Remove {
        #[arg(short, long)]
        input: PathBuf,

        /// Source term
        source: String,
    },

    /// Delete the stored glossary
    Clear {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Merge terms from a JSON file into the glossary
    Import {
        #[arg(short, long)]
        input: PathBuf,

        /// JSON object of term to translation
        #[arg(short, long)]
        file: PathBuf,

        /// Replace existing translations with imported ones
        #[arg(long)]
        overwrite: bool,
    },

    /// Write the glossary to a JSON file
    Export {
        #[arg(short, long)]
        input: PathBuf,

        /// Destination JSON file
        #[arg(short, long)]
        file: PathBuf,
    },
}
