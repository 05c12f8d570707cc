//! Local index store: named indexes of chunks, held in memory and optionally
//! persisted as one JSON file per index under a storage directory.
//!
//! Readers get an immutable `Arc<IndexSnapshot>`; every write swaps in a new
//! snapshot, so in-flight queries keep the view they started with. Writers
//! are serialized by a separate gate and build and persist the next entry
//! without the map lock, which is held only to publish it.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::IndexStore;
use ragdb_core::types::{Chunk, DocumentInfo, IndexInfo, IndexSnapshot, IndexStats};

const MAX_NAME_LEN: usize = 64;

#[derive(Deserialize)]
struct IndexFile {
    info: IndexInfo,
    documents: Vec<DocumentInfo>,
    chunks: Vec<Chunk>,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    info: &'a IndexInfo,
    documents: &'a [DocumentInfo],
    chunks: &'a [Chunk],
}

struct IndexEntry {
    info: IndexInfo,
    documents: Vec<DocumentInfo>,
    snapshot: Arc<IndexSnapshot>,
}

impl IndexEntry {
    fn empty(name: &str) -> Self {
        Self {
            info: IndexInfo { name: name.to_string(), created_at: Utc::now(), stats: IndexStats::default() },
            documents: Vec::new(),
            snapshot: Arc::new(IndexSnapshot::new(name, Vec::new())),
        }
    }

    fn refresh_stats(&mut self) {
        self.info.stats = IndexStats {
            total_documents: self.documents.len(),
            total_chunks: self.snapshot.chunks.len(),
            total_size: self.documents.iter().map(|d| d.size).sum(),
        };
    }
}

pub struct LocalIndexStore {
    dir: Option<PathBuf>,
    indexes: RwLock<BTreeMap<String, IndexEntry>>,
    writer: Mutex<()>,
}

impl LocalIndexStore {
    /// Store that lives only in memory.
    pub fn in_memory() -> Self {
        Self { dir: None, indexes: RwLock::new(BTreeMap::new()), writer: Mutex::new(()) }
    }

    /// Opens (creating if needed) a storage directory and loads every index file in it.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let mut indexes = BTreeMap::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_index_file(&path) {
                Ok(file) => {
                    let name = file.info.name.clone();
                    let snapshot = Arc::new(IndexSnapshot::new(&name, file.chunks));
                    let mut entry = IndexEntry { info: file.info, documents: file.documents, snapshot };
                    entry.refresh_stats();
                    indexes.insert(name, entry);
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable index file"),
            }
        }
        tracing::info!(dir = %dir.display(), indexes = indexes.len(), "opened index store");
        Ok(Self { dir: Some(dir), indexes: RwLock::new(indexes), writer: Mutex::new(()) })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn index_count(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, IndexEntry>> {
        self.indexes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, IndexEntry>> {
        self.indexes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn index_path(&self, name: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{name}.json")))
    }

    fn persist(&self, entry: &IndexEntry) -> Result<()> {
        let Some(path) = self.index_path(&entry.info.name) else {
            return Ok(());
        };
        let file = IndexFileRef { info: &entry.info, documents: &entry.documents, chunks: &entry.snapshot.chunks };
        let bytes = serde_json::to_vec(&file)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| Error::Storage(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path).map_err(|e| Error::Storage(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }

    /// Applies `update` to a copy of the named index, persists it, then publishes it.
    /// Only the final swap takes the map's write lock.
    fn modify<T>(&self, name: &str, update: impl FnOnce(&mut IndexEntry) -> Result<T>) -> Result<T> {
        let _writer = self.lock_writer();
        let mut next = {
            let indexes = self.read();
            let current = indexes.get(name).ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
            IndexEntry {
                info: current.info.clone(),
                documents: current.documents.clone(),
                snapshot: Arc::clone(&current.snapshot),
            }
        };
        let out = update(&mut next)?;
        next.refresh_stats();
        self.persist(&next)?;
        self.write().insert(name.to_string(), next);
        Ok(out)
    }
}

fn load_index_file(path: &Path) -> Result<IndexFile> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Index names become file names, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_index_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "index name '{name}' must be 1-{MAX_NAME_LEN} characters of letters, digits, '_' or '-'"
        )))
    }
}

fn without_document(snapshot: &IndexSnapshot, doc_id: &str) -> Vec<Chunk> {
    snapshot.chunks.iter().filter(|c| c.doc_id != doc_id).cloned().collect()
}

impl IndexStore for LocalIndexStore {
    fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        Ok(self.read().values().map(|e| e.info.clone()).collect())
    }

    fn create_index(&self, name: &str) -> Result<IndexInfo> {
        validate_index_name(name)?;
        let _writer = self.lock_writer();
        if self.read().contains_key(name) {
            return Err(Error::IndexExists(name.to_string()));
        }
        let entry = IndexEntry::empty(name);
        self.persist(&entry)?;
        let info = entry.info.clone();
        self.write().insert(name.to_string(), entry);
        tracing::info!(index = name, "created index");
        Ok(info)
    }

    fn delete_index(&self, name: &str) -> Result<()> {
        let _writer = self.lock_writer();
        if self.write().remove(name).is_none() {
            return Err(Error::IndexNotFound(name.to_string()));
        }
        if let Some(path) = self.index_path(name) {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| Error::Storage(format!("remove {}: {e}", path.display())))?;
            }
        }
        tracing::info!(index = name, "deleted index");
        Ok(())
    }

    fn get_index(&self, name: &str) -> Result<IndexInfo> {
        self.read()
            .get(name)
            .map(|e| e.info.clone())
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))
    }

    fn snapshot(&self, name: &str) -> Result<Arc<IndexSnapshot>> {
        self.read()
            .get(name)
            .map(|e| Arc::clone(&e.snapshot))
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))
    }

    /// Adding a document whose id is already present replaces it.
    fn add_document(&self, index: &str, document: DocumentInfo, chunks: Vec<Chunk>) -> Result<()> {
        let doc_id = document.id.clone();
        let added = chunks.len();
        self.modify(index, move |entry| {
            let mut all = without_document(&entry.snapshot, &document.id);
            all.extend(chunks);
            entry.documents.retain(|d| d.id != document.id);
            entry.documents.push(document);
            entry.snapshot = Arc::new(IndexSnapshot::new(index, all));
            Ok(())
        })?;
        tracing::debug!(index, document = %doc_id, chunks = added, "stored document");
        Ok(())
    }

    fn list_documents(&self, index: &str) -> Result<Vec<DocumentInfo>> {
        self.read()
            .get(index)
            .map(|e| e.documents.clone())
            .ok_or_else(|| Error::IndexNotFound(index.to_string()))
    }

    fn get_document(&self, index: &str, document_id: &str) -> Result<DocumentInfo> {
        let indexes = self.read();
        let entry = indexes.get(index).ok_or_else(|| Error::IndexNotFound(index.to_string()))?;
        entry
            .documents
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
            .ok_or_else(|| Error::DocumentNotFound { index: index.to_string(), document: document_id.to_string() })
    }

    fn delete_document(&self, index: &str, document_id: &str) -> Result<DocumentInfo> {
        self.modify(index, |entry| {
            let pos = entry.documents.iter().position(|d| d.id == document_id).ok_or_else(|| {
                Error::DocumentNotFound { index: index.to_string(), document: document_id.to_string() }
            })?;
            let removed = entry.documents.remove(pos);
            entry.snapshot = Arc::new(IndexSnapshot::new(index, without_document(&entry.snapshot, document_id)));
            Ok(removed)
        })
    }
}
