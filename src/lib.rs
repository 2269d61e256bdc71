//! Yakusu - LLM subtitle translation
//!
//! Translates subtitle tracks and plain documents with a locally hosted model
//! (Ollama or an OpenAI-compatible server) in overlapping chunks, with optional
//! reflection, segment-count repair and an automatically generated glossary.

pub mod backend;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod error;
pub mod glossary;
pub mod localization;
pub mod progress;
pub mod prompt;
pub mod subtitle;
pub mod translate;
pub mod workflow;
