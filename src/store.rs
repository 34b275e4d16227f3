//! Persistence collaborator: an opaque asynchronous key-value store.
//!
//! Absence of a key means "use the default". Failures are reported but never
//! fatal; the caller logs them and carries on without persistence.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreError;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<Value>, StoreError>>;

    fn put(&self, key: &str, value: Value) -> BoxFuture<'static, Result<(), StoreError>>;
}

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Document {
    version: u32,
    entries: BTreeMap<String, Value>,
}

impl Document {
    fn empty() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Keeps every entry in one JSON document on disk. Writes are serialized
/// through a single lock so concurrent puts never interleave.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: Arc<PathBuf>,
    document: Arc<tokio::sync::Mutex<Option<Document>>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            document: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }
}

async fn read_document(path: &Path) -> Result<Document, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let document: Document = serde_json::from_str(&contents)?;
            if document.version != DOCUMENT_VERSION {
                debug!(
                    version = document.version,
                    "parameter document has a different version"
                );
            }
            Ok(document)
        }
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(Document::empty()),
        Err(error) => Err(error.into()),
    }
}

/// Sibling file the document is written to before it replaces the original.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("parameters"));
    name.push(".tmp");
    path.with_file_name(name)
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<Value>, StoreError>> {
        let path = self.path.clone();
        let document = self.document.clone();
        let key = key.to_owned();

        async move {
            let mut document = document.lock().await;
            if document.is_none() {
                *document = Some(read_document(&path).await?);
            }
            Ok(document
                .as_ref()
                .and_then(|document| document.entries.get(&key).cloned()))
        }
        .boxed()
    }

    fn put(&self, key: &str, value: Value) -> BoxFuture<'static, Result<(), StoreError>> {
        let path = self.path.clone();
        let document = self.document.clone();
        let key = key.to_owned();

        async move {
            let mut guard = document.lock().await;
            let document = match guard.take() {
                Some(document) => document,
                None => match read_document(&path).await {
                    Ok(document) => document,
                    Err(StoreError::Malformed(error)) => {
                        warn!(
                            path = %path.display(),
                            %error,
                            "discarding malformed parameter document"
                        );
                        Document::empty()
                    }
                    Err(error) => return Err(error),
                },
            };
            let document = guard.get_or_insert(document);
            document.entries.insert(key, value);

            let contents = serde_json::to_string_pretty(&*document)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let staging = staging_path(&path);
            tokio::fs::write(&staging, contents).await?;
            tokio::fs::rename(&staging, &*path).await?;
            Ok(())
        }
        .boxed()
    }
}

/// Process-local store, used in tests and as a fallback.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_owned(), value);
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<Value>, StoreError>> {
        let value = self
            .entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned());
        future::ready(Ok(value)).boxed()
    }

    fn put(&self, key: &str, value: Value) -> BoxFuture<'static, Result<(), StoreError>> {
        self.insert(key, value);
        future::ready(Ok(())).boxed()
    }
}

/// Stands in when no backend is available: nothing is ever found and every
/// write succeeds without effect.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStore;

impl KeyValueStore for NullStore {
    fn get(&self, _key: &str) -> BoxFuture<'static, Result<Option<Value>, StoreError>> {
        future::ready(Ok(None)).boxed()
    }

    fn put(&self, _key: &str, _value: Value) -> BoxFuture<'static, Result<(), StoreError>> {
        future::ready(Ok(())).boxed()
    }
}
