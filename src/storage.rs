//! Persistent key-value storage of JSON values.
//!
//! Values are kept as JSON text, keyed by string. The file store keeps all of
//! them in one JSON object:
//!
//! ```text
//! <data dir>/storage.json
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    fs, io,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// The raw text store underneath [`Storage`]. Last write wins.
pub trait KeyValueStore {
    /// # Errors
    /// when the store can't be written
    fn set_item(&mut self, key: &str, value: String) -> Result<()>;
    /// # Errors
    /// when the store can't be read
    fn get_item(&self, key: &str) -> Result<Option<String>>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn set_item(&mut self, key: &str, value: String) -> Result<()> {
        (**self).set_item(key, value)
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn set_item(&mut self, key: &str, value: String) -> Result<()> {
        self.items.insert(key.to_string(), value);
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }
}

/// A store backed by one JSON file, rewritten on every write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    /// when the file exists but can't be read or isn't a JSON object of strings
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, items })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.items)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn set_item(&mut self, key: &str, value: String) -> Result<()> {
        let previous = self.items.insert(key.to_string(), value);
        if let Err(e) = self.flush() {
            // keep memory in step with what's on disk
            match previous {
                Some(previous) => self.items.insert(key.to_string(), previous),
                None => self.items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }
}

/// Saves and reads back JSON values by key.
#[derive(Debug)]
pub struct Storage<S> {
    store: S,
}

impl<S: KeyValueStore> Storage<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// # Errors
    /// when the value can't be serialized or the store can't be written
    pub fn save<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.store.set_item(key, text)
    }

    /// Reads the value saved under `key`, `None` if nothing was.
    ///
    /// # Errors
    /// when the store can't be read or the saved text isn't valid JSON
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.store
            .get_item(key)?
            .map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(Into::into)
    }

    pub const fn store(&self) -> &S {
        &self.store
    }
}
