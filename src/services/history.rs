// Scan History
// Bounded newest-first log of past results, persisted as a single JSON array

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{AnalysisResult, ScanStats, Verdict};
use crate::services::config_store::HistorySettings;
use crate::services::sanitizer::truncate_chars;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Failed to write history to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub struct HistoryStore {
    path: PathBuf,
    settings: HistorySettings,
    entries: Vec<AnalysisResult>,
}

impl HistoryStore {
    /// Open the history at `path`. Missing or unreadable data starts an empty history.
    pub fn open(path: PathBuf, settings: HistorySettings) -> Self {
        let mut entries = load_entries(&path);
        entries.truncate(settings.capacity);
        info!(path = %path.display(), entries = entries.len(), "history.loaded");
        Self { path, settings, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Newest first.
    pub fn entries(&self) -> &[AnalysisResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prepend `result` (content shortened to a preview) and evict the oldest entries
    /// beyond capacity. The in-memory history is updated even if persisting fails.
    pub fn append(&mut self, mut result: AnalysisResult) -> Result<(), HistoryError> {
        result.content = truncate_chars(&result.content, self.settings.preview_chars);
        self.entries.insert(0, result);
        self.entries.truncate(self.settings.capacity);
        self.persist()
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.entries.clear();
        self.persist()
    }

    /// Counts per verdict, recomputed from the entries on every call.
    pub fn stats(&self) -> ScanStats {
        compute_stats(&self.entries)
    }

    fn persist(&self) -> Result<(), HistoryError> {
        let write_err = |source| HistoryError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let content = serde_json::to_string(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

fn load_entries(path: &Path) -> Vec<AnalysisResult> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "history.read_failed");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<AnalysisResult>>(&content) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "history.corrupt_reset");
            Vec::new()
        }
    }
}

pub fn compute_stats(entries: &[AnalysisResult]) -> ScanStats {
    let mut stats = ScanStats::default();
    for entry in entries {
        match entry.verdict {
            Verdict::Scam => stats.scams += 1,
            Verdict::Suspicious => stats.suspicious += 1,
            Verdict::Safe => stats.safe += 1,
        }
        stats.total += 1;
    }
    stats
}
