//! Optional retrieval of textbook context for prompts.
//!
//! Retrieval is a capability selected when the engine is built:
//! [`Retrieval::Absent`] never supplies context, [`Retrieval::Present`] asks a
//! [`ContextRetriever`]. Either way the generator's output contract is the
//! same; only the prompt text differs. Retrieval failures are logged and
//! degrade to "no context".

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Result, StepwiseError};
use crate::subject::Subject;

/// Maximum size of a single passage file in bytes (256KB).
pub const MAX_PASSAGE_FILE_SIZE: u64 = 256 * 1024;

/// Time allowed for one retrieval before it is abandoned.
const RETRIEVAL_TIMEOUT: Duration = Duration::from_millis(500);

/// Supplies topic-relevant excerpts.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Returns up to `top_k` relevant excerpts joined into one text blob,
    /// or `None` if nothing relevant exists.
    async fn retrieve(&self, subject: Subject, topic: &str, top_k: usize)
        -> Result<Option<String>>;
}

/// Whether the engine enriches prompts with retrieved context.
#[derive(Clone, Default)]
pub enum Retrieval {
    /// No retriever configured; context is always `None`.
    #[default]
    Absent,
    /// Context is fetched from the retriever.
    Present {
        /// The retriever to query.
        retriever: Arc<dyn ContextRetriever>,
        /// Number of excerpts to request.
        top_k: usize,
    },
}

impl std::fmt::Debug for Retrieval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => write!(f, "Absent"),
            Self::Present { top_k, .. } => write!(f, "Present {{ top_k: {top_k} }}"),
        }
    }
}

impl Retrieval {
    /// Wraps a retriever.
    #[must_use]
    pub fn present(retriever: Arc<dyn ContextRetriever>, top_k: usize) -> Self {
        Self::Present { retriever, top_k }
    }

    /// Returns `true` if a retriever is configured.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// Fetches context for the subject and topic.
    ///
    /// Never fails: errors and slow retrievers yield `None`.
    pub async fn fetch(&self, subject: Subject, topic: &str) -> Option<String> {
        self.fetch_within(subject, topic, RETRIEVAL_TIMEOUT).await
    }

    /// Fetches context, giving up after `limit` or the retrieval timeout,
    /// whichever is shorter.
    pub async fn fetch_within(
        &self,
        subject: Subject,
        topic: &str,
        limit: Duration,
    ) -> Option<String> {
        let Self::Present { retriever, top_k } = self else {
            return None;
        };

        match tokio::time::timeout(
            limit.min(RETRIEVAL_TIMEOUT),
            retriever.retrieve(subject, topic, *top_k),
        )
        .await
        {
            Ok(Ok(context)) => {
                debug!(
                    %subject,
                    topic,
                    found = context.is_some(),
                    "Context retrieval finished"
                );
                context
            }
            Ok(Err(e)) => {
                warn!(%subject, topic, error = %e, "Context retrieval failed; continuing without context");
                None
            }
            Err(_) => {
                warn!(%subject, topic, "Context retrieval timed out; continuing without context");
                None
            }
        }
    }
}

// ============================================================================
// Passage retriever
// ============================================================================

/// One paragraph of textbook text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    /// Name of the file the passage came from (without extension).
    pub source: String,
    /// The paragraph text.
    pub text: String,
    keywords: HashSet<String>,
}

impl Passage {
    /// Creates a passage and indexes its keywords.
    #[must_use]
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let keywords = keywords(&text);
        Self {
            source: source.into(),
            text,
            keywords,
        }
    }

    fn score(&self, query: &HashSet<String>) -> usize {
        query.intersection(&self.keywords).count()
    }
}

/// Ranks in-memory textbook passages by keyword overlap with the topic.
#[derive(Debug, Clone, Default)]
pub struct PassageRetriever {
    passages: Vec<Passage>,
}

impl PassageRetriever {
    /// Creates a retriever over the given passages.
    #[must_use]
    pub const fn new(passages: Vec<Passage>) -> Self {
        Self { passages }
    }

    /// Loads every `.txt` and `.md` file in `dir`, one passage per paragraph.
    ///
    /// Files larger than [`MAX_PASSAGE_FILE_SIZE`] or not valid UTF-8 are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::Io` if the directory cannot be read.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_passage_file(path))
            .collect();
        files.sort();

        let mut passages = Vec::new();
        for path in &files {
            match load_file(path) {
                Ok(mut loaded) => passages.append(&mut loaded),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping passage file"),
            }
        }

        info!(
            dir = %dir.display(),
            files = files.len(),
            passages = passages.len(),
            "Loaded textbook passages"
        );
        Ok(Self::new(passages))
    }

    /// Returns the number of loaded passages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Returns `true` if no passages are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Returns the `top_k` best-matching passages, best first.
    ///
    /// Ties keep load order. Passages sharing no keyword with the query are
    /// never returned.
    #[must_use]
    pub fn rank(&self, subject: Subject, topic: &str, top_k: usize) -> Vec<&Passage> {
        let mut query = keywords(topic);
        query.extend(keywords(subject.name()));

        let mut scored: Vec<(usize, &Passage)> = self
            .passages
            .iter()
            .map(|p| (p.score(&query), p))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(top_k).map(|(_, p)| p).collect()
    }
}

#[async_trait]
impl ContextRetriever for PassageRetriever {
    async fn retrieve(
        &self,
        subject: Subject,
        topic: &str,
        top_k: usize,
    ) -> Result<Option<String>> {
        let ranked = self.rank(subject, topic, top_k);
        if ranked.is_empty() {
            return Ok(None);
        }
        let blob = ranked
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(Some(blob))
    }
}

fn is_passage_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md"))
}

fn load_file(path: &Path) -> Result<Vec<Passage>> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_PASSAGE_FILE_SIZE {
        return Err(StepwiseError::retrieval_failed(format!(
            "passage file is {}KB, limit is {}KB",
            size / 1024,
            MAX_PASSAGE_FILE_SIZE / 1024
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let source = path
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().to_string());

    Ok(split_paragraphs(&content)
        .into_iter()
        .map(|text| Passage::new(source.clone(), text))
        .collect())
}

/// Splits text into blank-line separated paragraphs.
fn split_paragraphs(content: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

/// Lowercased alphanumeric tokens of three or more characters.
fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}
