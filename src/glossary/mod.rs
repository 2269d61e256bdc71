//! Term glossary: an explicitly owned source→target map used to keep proper
//! nouns consistent across a document, plus its per-document storage and the
//! AI generation pipeline (`extract` then `translate`).

pub mod extract;
pub mod generate;
pub mod translate;

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::GlossaryConfig;
use crate::error::{Result, YakusuError};

pub use extract::TermContextMap;
pub use generate::generate_glossary;
pub use translate::TermFrequency;

/// How `merge` resolves a source term present on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Incoming translation replaces the existing one
    Overwrite,
    /// Existing translation is kept
    KeepExisting,
}

/// Source term → translation, case-insensitive on the source side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Glossary {
    entries: BTreeMap<String, String>,
}

impl Glossary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find_key(&self, source: &str) -> Option<String> {
        let wanted = source.trim().to_lowercase();
        self.entries
            .keys()
            .find(|key| key.to_lowercase() == wanted)
            .cloned()
    }

    /// Add or replace a term. A term differing only in case replaces the old spelling.
    /// Blank sources or targets are ignored.
    pub fn add(&mut self, source: &str, target: &str) -> bool {
        let source = source.trim();
        let target = target.trim();
        if source.is_empty() || target.is_empty() {
            return false;
        }
        if let Some(existing) = self.find_key(source) {
            self.entries.remove(&existing);
        }
        self.entries.insert(source.to_string(), target.to_string());
        true
    }

    /// Add a term only if no translation exists yet (first translation wins)
    pub fn add_if_absent(&mut self, source: &str, target: &str) -> bool {
        if self.contains(source) {
            return false;
        }
        self.add(source, target)
    }

    pub fn remove(&mut self, source: &str) -> Option<String> {
        let key = self.find_key(source)?;
        self.entries.remove(&key)
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        let key = self.find_key(source)?;
        self.entries.get(&key).map(String::as_str)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.find_key(source).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries sorted by source term
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, t)| (s.as_str(), t.as_str()))
    }

    /// Merge another glossary; returns how many entries were added or replaced
    pub fn merge(&mut self, other: &Glossary, policy: MergePolicy) -> usize {
        let mut changed = 0;
        for (source, target) in other.iter() {
            let applied = match policy {
                MergePolicy::Overwrite => {
                    if self.get(source) == Some(target) {
                        false
                    } else {
                        self.add(source, target)
                    }
                }
                MergePolicy::KeepExisting => self.add_if_absent(source, target),
            };
            if applied {
                changed += 1;
            }
        }
        changed
    }

    /// Prompt section listing the entries whose source term occurs in `text`
    pub fn prompt_section(&self, text: &str) -> String {
        let haystack = text.to_lowercase();
        let lines: Vec<String> = self
            .iter()
            .filter(|(source, _)| haystack.contains(&source.to_lowercase()))
            .map(|(source, target)| format!("- {} → {}", source, target))
            .collect();

        if lines.is_empty() {
            return String::new();
        }
        format!("[Glossary - use these translations exactly]\n{}", lines.join("\n"))
    }
}

impl FromIterator<(String, String)> for Glossary {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut glossary = Glossary::new();
        for (source, target) in iter {
            glossary.add(&source, &target);
        }
        glossary
    }
}

/// Keys are folded through `add`, so spellings differing only in case collapse
impl<'de> Deserialize<'de> for Glossary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = BTreeMap::<String, String>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

/// Per-document glossary files, named by a hash of the document's base name
pub struct GlossaryStore {
    dir: PathBuf,
}

impl GlossaryStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &GlossaryConfig) -> Self {
        Self::new(&config.storage_dir)
    }

    /// Deterministic file name for a source document
    pub fn file_name_for(source: &Path) -> String {
        let base_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.to_string_lossy().into_owned());

        let mut hasher = Sha256::new();
        hasher.update(base_name.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("glossary_{}.json", &digest[..16])
    }

    pub fn path_for(&self, source: &Path) -> PathBuf {
        self.dir.join(Self::file_name_for(source))
    }

    /// Load the glossary for `source`; a missing file yields an empty glossary
    pub async fn load(&self, source: &Path) -> Result<Glossary> {
        let path = self.path_for(source);
        if !path.exists() {
            info!("No stored glossary for {}", source.display());
            return Ok(Glossary::new());
        }
        let glossary = Self::import(&path).await?;
        info!("Loaded glossary with {} terms from {}", glossary.len(), path.display());
        Ok(glossary)
    }

    pub async fn save(&self, source: &Path, glossary: &Glossary) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(source);
        Self::export(glossary, &path).await?;
        info!("Saved glossary with {} terms to {}", glossary.len(), path.display());
        Ok(path)
    }

    /// Read a glossary from any JSON object file of string→string
    pub async fn import(path: &Path) -> Result<Glossary> {
        let content = tokio::fs::read_to_string(path).await?;
        let glossary: Glossary = serde_json::from_str(&content).map_err(|e| {
            YakusuError::Glossary(format!("Invalid glossary file {}: {}", path.display(), e))
        })?;
        debug!("Read {} glossary entries from {}", glossary.len(), path.display());
        Ok(glossary)
    }

    pub async fn export(glossary: &Glossary, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(glossary)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub async fn delete(&self, source: &Path) -> Result<bool> {
        let path = self.path_for(source);
        if !path.exists() {
            return Ok(false);
        }
        tokio::fs::remove_file(&path).await?;
        Ok(true)
    }
}
