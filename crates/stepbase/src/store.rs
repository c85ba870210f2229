//! Baseline persistence.
//!
//! A baseline id is written at most once. Saving content identical to what
//! is already stored under the id is a no-op; saving different content
//! under a taken id mints a fresh id for the new baseline.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::baseline::{new_baseline_id, Baseline};
use crate::error::{EngineError, Result};

/// Re-mint attempts before giving up on a free id.
const MAX_ATTEMPTS: usize = 8;

/// Storage of baselines by id.
pub trait BaselineStore: Send + Sync {
    /// Persist `baseline` and return the id it is stored under.
    fn save(&self, baseline: &Baseline) -> Result<String>;

    /// Load a stored baseline.
    fn load(&self, baseline_id: &str) -> Result<Baseline>;

    /// Stored ids, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

/// Outcome of trying to claim an id.
enum Claim {
    Written,
    Identical,
    Taken,
}

/// Shared save loop: try the baseline's own id, then fresh ones.
fn save_with(baseline: &Baseline, mut claim: impl FnMut(&str, &str) -> Result<Claim>) -> Result<String> {
    let mut candidate = baseline.clone();
    for _ in 0..MAX_ATTEMPTS {
        check_id(&candidate.baseline_id)?;
        let json = candidate.to_json()?;
        match claim(&candidate.baseline_id, &json)? {
            Claim::Written | Claim::Identical => return Ok(candidate.baseline_id),
            Claim::Taken => {
                let fresh = new_baseline_id(Utc::now(), json.as_bytes());
                debug!(taken = %candidate.baseline_id, %fresh, "baseline id taken, minting a new one");
                candidate.baseline_id = fresh;
            }
        }
    }
    Err(EngineError::config(format!(
        "no free baseline id after {MAX_ATTEMPTS} attempts"
    )))
}

/// Ids become file names, so only a safe alphabet is accepted.
fn check_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(EngineError::config(format!("invalid baseline id '{id}'")))
    }
}

/// One pretty JSON file per baseline, `<dir>/<baseline_id>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store rooted at `dir`, created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn claim(&self, id: &str, json: &str) -> Result<Claim> {
        let path = self.path_of(id);
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| EngineError::io(&self.dir, e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| EngineError::io(tmp.path(), e))?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(Claim::Written),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                let existing = fs::read_to_string(&path).map_err(|e| EngineError::io(&path, e))?;
                Ok(if existing == json {
                    Claim::Identical
                } else {
                    Claim::Taken
                })
            }
            Err(e) => Err(EngineError::io(&path, e.error)),
        }
    }
}

impl BaselineStore for FileStore {
    fn save(&self, baseline: &Baseline) -> Result<String> {
        fs::create_dir_all(&self.dir).map_err(|e| EngineError::io(&self.dir, e))?;
        let id = save_with(baseline, |id, json| self.claim(id, json))?;
        info!(baseline_id = %id, dir = %self.dir.display(), "baseline saved");
        Ok(id)
    }

    fn load(&self, baseline_id: &str) -> Result<Baseline> {
        check_id(baseline_id)?;
        let path = self.path_of(baseline_id);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EngineError::NotFound(baseline_id.to_string()))
            }
            Err(e) => return Err(EngineError::io(&path, e)),
        };
        Baseline::from_json(&text)
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EngineError::io(&self.dir, e)),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| EngineError::io(&self.dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-process store holding serialized snapshots.
#[derive(Debug, Default)]
pub struct MemoryStore {
    baselines: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselineStore for MemoryStore {
    fn save(&self, baseline: &Baseline) -> Result<String> {
        let mut baselines = self.baselines.write();
        save_with(baseline, |id, json| {
            Ok(match baselines.get(id) {
                None => {
                    baselines.insert(id.to_string(), json.to_string());
                    Claim::Written
                }
                Some(existing) if existing == json => Claim::Identical,
                Some(_) => Claim::Taken,
            })
        })
    }

    fn load(&self, baseline_id: &str) -> Result<Baseline> {
        let baselines = self.baselines.read();
        let json = baselines
            .get(baseline_id)
            .ok_or_else(|| EngineError::NotFound(baseline_id.to_string()))?;
        Baseline::from_json(json)
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.baselines.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BaselineBuilder;
    use crate::testing;

    fn bracket() -> Baseline {
        BaselineBuilder::default()
            .build(&testing::bracket_tree())
            .unwrap()
    }

    fn exercise(store: &dyn BaselineStore) {
        let baseline = bracket();
        let id = store.save(&baseline).unwrap();
        assert_eq!(id, baseline.baseline_id);
        assert_eq!(store.load(&id).unwrap(), baseline);

        // Identical content keeps the id.
        assert_eq!(store.save(&baseline).unwrap(), id);
        assert_eq!(store.list().unwrap(), [id.clone()]);

        // Different content under the same id gets a new one.
        let mut other = bracket();
        other.baseline_id = id.clone();
        other.components[1].name = "lid".into();
        let other_id = store.save(&other).unwrap();
        assert_ne!(other_id, id);
        assert_eq!(store.load(&other_id).unwrap().components[1].name, "lid");
        assert_eq!(store.load(&id).unwrap(), baseline);
        assert_eq!(store.list().unwrap().len(), 2);

        assert!(matches!(
            store.load("BL_19700101_000000_deadbeef"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("baselines"));
        assert!(store.list().unwrap().is_empty());
        exercise(&store);

        let names: Vec<String> = fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| n.ends_with(".json")), "{names:?}");
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.load("../secrets"),
            Err(EngineError::Configuration(_))
        ));

        let mut baseline = bracket();
        baseline.baseline_id = "a/b".into();
        assert!(store.save(&baseline).is_err());
    }
}
