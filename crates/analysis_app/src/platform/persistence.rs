use std::fs;
use std::path::Path;

use analysis_core::HistoryEntry;
use analysis_engine::{ensure_output_dir, AtomicFileWriter};
use analysis_logging::{analysis_error, analysis_info, analysis_warn};
use serde::{Deserialize, Serialize};

const HISTORY_FILENAME: &str = ".analysis_history.ron";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntry {
    prompt: String,
    article_count: usize,
    saved_path: String,
    saved_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedHistory {
    analyses: Vec<PersistedEntry>,
}

impl From<PersistedEntry> for HistoryEntry {
    fn from(entry: PersistedEntry) -> Self {
        HistoryEntry {
            prompt: entry.prompt,
            article_count: entry.article_count,
            saved_path: entry.saved_path,
            saved_at: entry.saved_at,
        }
    }
}

impl From<&HistoryEntry> for PersistedEntry {
    fn from(entry: &HistoryEntry) -> Self {
        PersistedEntry {
            prompt: entry.prompt.clone(),
            article_count: entry.article_count,
            saved_path: entry.saved_path.clone(),
            saved_at: entry.saved_at.clone(),
        }
    }
}

/// Previously saved analyses, oldest first. Unreadable files yield an empty history.
pub(crate) fn load_history(output_dir: &Path) -> Vec<HistoryEntry> {
    let path = output_dir.join(HISTORY_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Vec::new();
        }
        Err(err) => {
            analysis_warn!("Failed to read history from {:?}: {}", path, err);
            return Vec::new();
        }
    };

    let history: PersistedHistory = match ron::from_str(&content) {
        Ok(history) => history,
        Err(err) => {
            analysis_warn!("Failed to parse history from {:?}: {}", path, err);
            return Vec::new();
        }
    };

    analysis_info!(
        "Loaded {} history entries from {:?}",
        history.analyses.len(),
        path
    );
    history.analyses.into_iter().map(HistoryEntry::from).collect()
}

pub(crate) fn save_history(output_dir: &Path, entries: &[HistoryEntry]) {
    if let Err(err) = ensure_output_dir(output_dir) {
        analysis_error!("Failed to ensure output dir {:?}: {}", output_dir, err);
        return;
    }

    let history = PersistedHistory {
        analyses: entries.iter().map(PersistedEntry::from).collect(),
    };

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&history, pretty) {
        Ok(text) => text,
        Err(err) => {
            analysis_error!("Failed to serialize history: {}", err);
            return;
        }
    };

    let writer = AtomicFileWriter::new(output_dir.to_path_buf());
    if let Err(err) = writer.write(HISTORY_FILENAME, content.as_bytes()) {
        analysis_error!("Failed to write history to {:?}: {}", output_dir, err);
    }
}

/// Re-reads the file so entries written by another run are kept.
pub(crate) fn append_history(output_dir: &Path, entry: HistoryEntry) {
    let mut entries = load_history(output_dir);
    entries.push(entry);
    save_history(output_dir, &entries);
}
