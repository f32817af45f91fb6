//! Persistence of the data and rules documents with file locking.
//!
//! Both documents are read and rewritten whole. Writers are serialized by an
//! exclusive `fs2` lock on a sidecar `.lock` file held for the entire
//! read-modify-write, so concurrent processes never interleave updates.

use crate::{Error, Result, RuleSet, StoreDocument};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Whole-document storage for the medication data
pub trait Store {
    /// Read the current document
    fn load(&self) -> Result<StoreDocument>;

    /// Replace the stored document
    fn save(&self, document: &StoreDocument) -> Result<()>;

    /// Load, modify and save while holding the writer lock.
    ///
    /// `f` returns whether the document changed; unchanged documents are not
    /// written back. Returns the document as it stands after the update.
    fn update(
        &self,
        f: &mut dyn FnMut(&mut StoreDocument) -> Result<bool>,
    ) -> Result<StoreDocument>;
}

/// JSON file store with an advisory lock file next to it
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store for the given data file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open_lock(&self) -> Result<File> {
        open_lock_for(&self.path)
    }

    /// Read without taking the lock; seeds the demo document if missing
    fn read_unlocked(&self) -> Result<StoreDocument> {
        if !self.path.exists() {
            tracing::info!("No data file at {:?}, seeding demo data", self.path);
            let seed = StoreDocument::seed();
            write_atomic(&self.path, &seed)?;
            return Ok(seed);
        }
        read_json(&self.path)
    }
}

impl Store for JsonFileStore {
    fn load(&self) -> Result<StoreDocument> {
        let lock = self.open_lock()?;
        if self.path.exists() {
            lock.lock_shared()?;
        } else {
            // Seeding writes the file
            lock.lock_exclusive()?;
        }

        let result = self.read_unlocked();
        lock.unlock()?;
        result
    }

    fn save(&self, document: &StoreDocument) -> Result<()> {
        let lock = self.open_lock()?;
        lock.lock_exclusive()?;
        let result = write_atomic(&self.path, document);
        lock.unlock()?;
        result
    }

    fn update(
        &self,
        f: &mut dyn FnMut(&mut StoreDocument) -> Result<bool>,
    ) -> Result<StoreDocument> {
        let lock = self.open_lock()?;
        lock.lock_exclusive()?;
        let result = self.modify_unlocked(f);
        lock.unlock()?;
        result
    }
}

impl JsonFileStore {
    fn modify_unlocked(
        &self,
        f: &mut dyn FnMut(&mut StoreDocument) -> Result<bool>,
    ) -> Result<StoreDocument> {
        let mut document = self.read_unlocked()?;
        if f(&mut document)? {
            write_atomic(&self.path, &document)?;
        }
        Ok(document)
    }
}

impl RuleSet {
    /// Load the rules document, seeding the demo rule if it is missing
    ///
    /// Uses the same sidecar locking as the data store, so concurrent first
    /// runs seed the file exactly once.
    pub fn load(path: &Path) -> Result<Self> {
        let lock = open_lock_for(path)?;
        if path.exists() {
            lock.lock_shared()?;
        } else {
            lock.lock_exclusive()?;
        }

        let result = Self::read_or_seed(path);
        lock.unlock()?;

        let rules = result?;
        tracing::debug!("Loaded {} rules from {:?}", rules.rules.len(), path);
        Ok(rules)
    }

    /// Write the rules document
    pub fn save(&self, path: &Path) -> Result<()> {
        let lock = open_lock_for(path)?;
        lock.lock_exclusive()?;
        let result = write_atomic(path, self);
        lock.unlock()?;
        result
    }

    fn read_or_seed(path: &Path) -> Result<Self> {
        // Another process may have seeded it while we waited for the lock
        if !path.exists() {
            tracing::info!("No rules file at {:?}, seeding demo rules", path);
            let seed = RuleSet::seed();
            write_atomic(path, &seed)?;
            return Ok(seed);
        }
        read_json(path)
    }
}

/// Open (creating if needed) the `<file>.lock` sidecar that guards `path`
fn open_lock_for(path: &Path) -> Result<File> {
    ensure_parent_dir(path)?;

    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path.with_file_name(name))?;
    Ok(file)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    let mut contents = String::new();
    std::io::BufReader::new(file).read_to_string(&mut contents)?;

    let value = serde_json::from_str(&contents)
        .map_err(|e| Error::Store(format!("{} is not a valid document: {}", path.display(), e)))?;
    tracing::debug!("Read {:?}", path);
    Ok(value)
}

/// Atomically replace `path`: temp file, fsync, rename
fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let temp = NamedTempFile::new_in(dir)?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rule;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_missing_store_is_seeded() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        let store = JsonFileStore::new(&path);

        let doc = store.load().unwrap();
        assert_eq!(doc, StoreDocument::seed());
        assert!(path.exists());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("data.json"));

        let mut doc = StoreDocument::seed();
        doc.medications[0].times.push("2025-12-11T20:00:00".into());
        store.save(&doc).unwrap();

        assert_eq!(store.load().unwrap(), doc);
    }

    #[test]
    fn test_corrupted_store_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(Error::Store(_))));

        // Not overwritten
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ invalid json }");
    }

    #[test]
    fn test_update_skips_write_when_unchanged() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        let store = JsonFileStore::new(&path);
        store.load().unwrap();
        let before = std::fs::metadata(&path).unwrap().modified().unwrap();

        store.update(&mut |_| Ok(false)).unwrap();

        let after = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_update_error_leaves_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("data.json"));
        store.load().unwrap();

        let result = store.update(&mut |doc| {
            doc.medications.clear();
            Err(Error::Validation("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.load().unwrap().medications.len(), 2);
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("data.json");
        JsonFileStore::new(&path).load().unwrap();
        let path = Arc::new(path);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = Arc::clone(&path);
                thread::spawn(move || {
                    let store = JsonFileStore::new(path.as_path());
                    store
                        .update(&mut |doc| {
                            doc.medications[0].times.push(format!("2025-12-12T{:02}:00:00", i));
                            Ok(true)
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let doc = JsonFileStore::new(path.as_path()).load().unwrap();
        assert_eq!(doc.medications[0].times.len(), 9);
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("data.json"));
        store.save(&StoreDocument::seed()).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "data.json" && name != "data.json.lock")
            .collect();
        assert!(extras.is_empty(), "unexpected files: {:?}", extras);
    }

    #[test]
    fn test_rules_seeded_and_reloaded() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("rules.json");

        let seeded = RuleSet::load(&path).unwrap();
        assert_eq!(seeded, RuleSet::seed());

        let custom = RuleSet {
            rules: vec![Rule {
                id: "R-900".into(),
                med_a: "Levothyroxine".into(),
                med_b: "Calcium".into(),
                min_time_diff_minutes: 240,
            }],
        };
        custom.save(&path).unwrap();
        assert_eq!(RuleSet::load(&path).unwrap(), custom);
    }

    #[test]
    fn test_concurrent_first_rules_load_seeds_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = Arc::new(temp_dir.path().join("rules.json"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = Arc::clone(&path);
                thread::spawn(move || RuleSet::load(path.as_path()))
            })
            .collect();

        for handle in handles {
            let rules = handle.join().unwrap().unwrap();
            assert_eq!(rules, RuleSet::seed());
        }
        assert_eq!(RuleSet::load(&path).unwrap(), RuleSet::seed());
    }

    #[test]
    fn test_rules_seeding_waits_for_writer_lock() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("rules.json");

        // Hold the writer lock while a custom file appears, as a concurrent
        // saver would; the loader must read it rather than seed over it
        let lock = open_lock_for(&path).unwrap();
        lock.lock_exclusive().unwrap();

        let loader_path = path.clone();
        let loader = thread::spawn(move || RuleSet::load(&loader_path));

        let custom = RuleSet {
            rules: vec![Rule {
                id: "R-900".into(),
                med_a: "Levothyroxine".into(),
                med_b: "Calcium".into(),
                min_time_diff_minutes: 240,
            }],
        };
        thread::sleep(std::time::Duration::from_millis(100));
        write_atomic(&path, &custom).unwrap();
        lock.unlock().unwrap();

        assert_eq!(loader.join().unwrap().unwrap(), custom);
        assert_eq!(RuleSet::load(&path).unwrap(), custom);
    }
}
