//! Knowledge store - versioned archive of learned technologies
//!
//! One JSON file per technology under the data directory, holding that
//! technology's full version history. Re-learning appends a new version;
//! nothing is ever mutated in place. Each append goes through a temp
//! file and rename, so a concurrent reader sees either the pre- or
//! post-write history, never a torn record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use crate::error::LearnError;
use crate::quality::Grade;

/// A versioned, persisted summary of one completed learning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub technology: String,
    /// Monotonically increasing per technology, starting at 1
    pub version: u32,
    pub quality_grade: Grade,
    pub proficiency: f64,
    /// Best-effort canonical code/documentation for the technology
    pub content: String,
    pub learned_at: DateTime<Utc>,
}

/// Durable, queryable archive of `KnowledgeRecord`s
pub struct KnowledgeStore {
    base_dir: PathBuf,
    /// Serializes writers; readers go straight to the filesystem
    write_lock: Mutex<()>,
}

impl KnowledgeStore {
    /// Open the store at the default data location
    pub fn new() -> Result<Self, LearnError> {
        let base_dir = crate::config::data_dir()
            .map_err(|e| LearnError::Storage(e.to_string()))?
            .join("knowledge");
        Self::with_dir(base_dir)
    }

    /// Open the store at a custom directory
    pub fn with_dir(base_dir: impl Into<PathBuf>) -> Result<Self, LearnError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)
            .map_err(|e| LearnError::Storage(format!("failed to create {}: {}", base_dir.display(), e)))?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Append a new version for `technology` and return the stored record
    pub fn put(
        &self,
        technology: &str,
        quality_grade: Grade,
        proficiency: f64,
        content: &str,
    ) -> Result<KnowledgeRecord, LearnError> {
        let _guard = self.write_lock.lock().expect("knowledge store lock poisoned");

        let mut history = self.load_history(technology)?;
        let version = history.last().map(|r| r.version + 1).unwrap_or(1);
        let record = KnowledgeRecord {
            technology: technology.to_string(),
            version,
            quality_grade,
            proficiency,
            content: content.to_string(),
            learned_at: Utc::now(),
        };
        history.push(record.clone());

        let path = self.file_path(technology);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&history)
            .map_err(|e| LearnError::Storage(e.to_string()))?;
        std::fs::write(&tmp, json)
            .map_err(|e| LearnError::Storage(format!("failed to write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| LearnError::Storage(format!("failed to commit {}: {}", path.display(), e)))?;

        info!(technology, version, grade = %record.quality_grade, "knowledge record stored");
        Ok(record)
    }

    /// Highest-version record for a technology
    pub fn get_latest(&self, technology: &str) -> Result<KnowledgeRecord, LearnError> {
        self.load_history(technology)?
            .into_iter()
            .last()
            .ok_or_else(|| LearnError::UnknownTechnology(technology.to_string()))
    }

    /// A specific stored version, if present
    pub fn get_version(&self, technology: &str, version: u32) -> Result<Option<KnowledgeRecord>, LearnError> {
        Ok(self
            .load_history(technology)?
            .into_iter()
            .find(|r| r.version == version))
    }

    /// Number of stored versions for a technology
    pub fn version_count(&self, technology: &str) -> Result<u32, LearnError> {
        Ok(self.load_history(technology)?.len() as u32)
    }

    /// Distinct technology names with at least one record, alphabetical
    pub fn list_technologies(&self) -> Result<Vec<String>, LearnError> {
        let mut names = Vec::new();
        let entries = std::fs::read_dir(&self.base_dir)
            .map_err(|e| LearnError::Storage(e.to_string()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(record) = read_history(&path)?.first() {
                    names.push(record.technology.clone());
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Total records across all technologies
    pub fn record_count(&self) -> Result<u32, LearnError> {
        let mut count = 0;
        for technology in self.list_technologies()? {
            count += self.version_count(&technology)?;
        }
        Ok(count)
    }

    /// Case-insensitive search over technology names and content.
    ///
    /// Latest version per technology; exact name matches rank before
    /// substring matches.
    pub fn search(&self, query: &str) -> Result<Vec<KnowledgeRecord>, LearnError> {
        let query_lower = query.to_lowercase();
        let mut exact = Vec::new();
        let mut partial = Vec::new();

        for technology in self.list_technologies()? {
            let record = self.get_latest(&technology)?;
            let name_lower = record.technology.to_lowercase();
            if name_lower == query_lower {
                exact.push(record);
            } else if name_lower.contains(&query_lower)
                || record.content.to_lowercase().contains(&query_lower)
            {
                partial.push(record);
            }
        }

        exact.extend(partial);
        Ok(exact)
    }

    // --- File I/O ---

    fn file_path(&self, technology: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", slug(technology)))
    }

    fn load_history(&self, technology: &str) -> Result<Vec<KnowledgeRecord>, LearnError> {
        let path = self.file_path(technology);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_history(&path)
    }
}

fn read_history(path: &Path) -> Result<Vec<KnowledgeRecord>, LearnError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LearnError::Storage(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| LearnError::Storage(format!("corrupt history {}: {}", path.display(), e)))
}

/// Filesystem-safe name for a technology.
///
/// Injective: any character outside [a-z0-9] is hex-escaped as `_XX`
/// (one escape per UTF-8 byte, `_` itself included), so distinct names
/// ("c++", "c--") never share a history file.
fn slug(technology: &str) -> String {
    let mut out = String::with_capacity(technology.len());
    for c in technology.trim().to_lowercase().chars() {
        match c {
            'a'..='z' | '0'..='9' => out.push(c),
            other => {
                let mut buf = [0u8; 4];
                for byte in other.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("_{:02x}", byte));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, KnowledgeStore) {
        let dir = TempDir::new().unwrap();
        let store = KnowledgeStore::with_dir(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_assigns_monotonic_versions() {
        let (_dir, store) = store();
        let v1 = store.put("json", Grade::A, 0.9, "first").unwrap();
        let v2 = store.put("json", Grade::B, 0.8, "second").unwrap();
        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
    }

    #[test]
    fn test_relearning_never_overwrites() {
        let (_dir, store) = store();
        store.put("json", Grade::A, 0.9, "original content").unwrap();
        store.put("json", Grade::B, 0.7, "new content").unwrap();

        let latest = store.get_latest("json").unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.content, "new content");

        let v1 = store.get_version("json", 1).unwrap().unwrap();
        assert_eq!(v1.content, "original content");
        assert_eq!(v1.quality_grade, Grade::A);
    }

    #[test]
    fn test_get_latest_unknown_technology() {
        let (_dir, store) = store();
        let err = store.get_latest("nope").unwrap_err();
        assert!(matches!(err, LearnError::UnknownTechnology(_)));
    }

    #[test]
    fn test_list_technologies_sorted() {
        let (_dir, store) = store();
        store.put("zeromq", Grade::B, 0.8, "z").unwrap();
        store.put("asyncio", Grade::A, 0.9, "a").unwrap();
        store.put("asyncio", Grade::A, 0.9, "a2").unwrap();
        assert_eq!(store.list_technologies().unwrap(), vec!["asyncio", "zeromq"]);
    }

    #[test]
    fn test_search_exact_match_ranks_first() {
        let (_dir, store) = store();
        store.put("json-schema", Grade::B, 0.8, "schema validation").unwrap();
        store.put("json", Grade::A, 0.9, "serialization").unwrap();

        let results = store.search("json").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].technology, "json");
        assert_eq!(results[1].technology, "json-schema");
    }

    #[test]
    fn test_search_matches_content() {
        let (_dir, store) = store();
        store.put("requests", Grade::A, 0.9, "HTTP client for humans").unwrap();
        let results = store.search("http CLIENT").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].technology, "requests");
    }

    #[test]
    fn test_record_count() {
        let (_dir, store) = store();
        store.put("a", Grade::A, 0.9, "x").unwrap();
        store.put("a", Grade::A, 0.9, "y").unwrap();
        store.put("b", Grade::B, 0.8, "z").unwrap();
        assert_eq!(store.record_count().unwrap(), 3);
    }

    #[test]
    fn test_slug_sanitizes() {
        assert_eq!(slug("fastapi"), "fastapi");
        assert_eq!(slug("Apache Kafka"), "apache_20kafka");
        assert_eq!(slug("c++/stl"), "c_2b_2b_2fstl");
    }

    #[test]
    fn test_slug_distinct_names_never_collide() {
        assert_ne!(slug("c++"), slug("c--"));
        assert_ne!(slug("a_b"), slug("a b"));
        assert_ne!(slug("a.b"), slug("a-b"));
    }

    #[test]
    fn test_similar_names_keep_separate_histories() {
        let (_dir, store) = store();
        store.put("c++", Grade::A, 0.9, "plus").unwrap();
        store.put("c--", Grade::B, 0.7, "minus").unwrap();

        let plus = store.get_latest("c++").unwrap();
        let minus = store.get_latest("c--").unwrap();
        assert_eq!(plus.version, 1);
        assert_eq!(minus.version, 1);
        assert_eq!(plus.content, "plus");
        assert_eq!(minus.content, "minus");
    }
}
