use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::state::Turn;

/// Sanitizes a thread id for use as a file name component.
///
/// Lowercases, replaces non-alphanumeric chars with `-`, collapses
/// consecutive dashes, and trims leading/trailing dashes.
pub fn sanitize_thread_id(id: &str) -> String {
    let mut result = String::with_capacity(id.len());
    for ch in id.chars() {
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push('-');
        }
    }
    let collapsed: String = result
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if collapsed.is_empty() {
        return "unnamed".to_string();
    }
    collapsed
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    thread_id: String,
    updated_at: chrono::DateTime<chrono::Utc>,
    messages: Vec<Turn>,
}

/// Per-thread conversation persistence.
///
/// One JSON file per thread under the base directory. A traversal loads
/// its thread's history before running and saves the full message log
/// afterwards; the store itself never participates in a running
/// traversal.
pub struct SessionStore {
    base_path: PathBuf,
}

impl SessionStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.json", sanitize_thread_id(thread_id)))
    }

    /// Load the message log for a thread. `Ok(None)` when the thread has
    /// no history yet.
    pub fn load(&self, thread_id: &str) -> Result<Option<Vec<Turn>>> {
        let path = self.thread_path(thread_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read session file {}", path.display()))?;
        let file: SessionFile = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse session file {}", path.display()))?;
        tracing::debug!(
            thread_id,
            turns = file.messages.len(),
            "loaded session history"
        );
        Ok(Some(file.messages))
    }

    /// Save the full message log for a thread, overwriting any previous
    /// snapshot.
    pub fn save(&self, thread_id: &str, messages: &[Turn]) -> Result<()> {
        fs::create_dir_all(&self.base_path).with_context(|| {
            format!(
                "failed to create session directory {}",
                self.base_path.display()
            )
        })?;
        let file = SessionFile {
            thread_id: thread_id.to_string(),
            updated_at: chrono::Utc::now(),
            messages: messages.to_vec(),
        };
        let path = self.thread_path(thread_id);
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write session file {}", path.display()))?;
        tracing::debug!(thread_id, turns = messages.len(), "saved session history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_special_chars() {
        assert_eq!(sanitize_thread_id("Main Thread #1"), "main-thread-1");
        assert_eq!(sanitize_thread_id("///"), "unnamed");
    }

    #[test]
    fn load_missing_thread_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load("fresh").unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips_messages() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let messages = vec![
            Turn::user("show me errors"),
            Turn::assistant("Found 3 indices"),
        ];
        store.save("thread-1", &messages).unwrap();
        let loaded = store.load("thread-1").unwrap().unwrap();
        assert_eq!(loaded, messages);
    }
}
