//! Object storage port: containers of named blobs.
//!
//! The workflow never touches the file system or a cloud SDK directly; it is
//! handed a [`DocumentStore`]. Object names are `/`-separated relative paths
//! (`general/offre.docx`, `alice/temp_working.docx`).
//!
//! Two implementations ship with the crate:
//!
//! - [`LocalStore`]: one directory per container under a root, atomic writes.
//! - [`MemoryStore`]: in-process map, for tests and dry runs.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch(&self, container: &str, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Create or overwrite `name`. Returns the number of bytes written.
    async fn store(&self, container: &str, name: &str, bytes: &[u8]) -> Result<u64, StoreError>;

    async fn exists(&self, container: &str, name: &str) -> Result<bool, StoreError>;

    async fn delete(&self, container: &str, name: &str) -> Result<(), StoreError>;

    /// Objects whose name starts with `prefix`, sorted by name.
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<StoredObject>, StoreError>;

    /// Time-limited download link for an existing object.
    async fn signed_url(
        &self,
        container: &str,
        name: &str,
        expiry_hours: u32,
    ) -> Result<String, StoreError>;
}

/// Reject names that could escape their container.
pub fn validate_object_name(name: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| {
        Err(StoreError::InvalidPath {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };
    if name.trim().is_empty() {
        return invalid("empty name");
    }
    if name.starts_with('/') || name.contains('\\') {
        return invalid("must be a relative '/'-separated path");
    }
    if name.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
        return invalid("empty, '.' or '..' path component");
    }
    Ok(())
}

fn expiry_query(expiry_hours: u32) -> String {
    let expires = Utc::now() + Duration::hours(i64::from(expiry_hours));
    format!("expires={}", expires.to_rfc3339_opts(SecondsFormat::Secs, true))
}

// ── Local file system ────────────────────────────────────────────────────

/// Containers as directories under `root`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf, StoreError> {
        if container.contains('/') {
            return Err(StoreError::InvalidPath {
                name: container.to_string(),
                reason: "container names cannot contain '/'".into(),
            });
        }
        validate_object_name(container)?;
        Ok(self.root.join(container))
    }

    fn object_path(&self, container: &str, name: &str) -> Result<PathBuf, StoreError> {
        validate_object_name(name)?;
        let mut path = self.container_dir(container)?;
        path.extend(name.split('/'));
        Ok(path)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn not_found_or_io(container: &str, name: &str, path: &Path, e: std::io::Error) -> StoreError {
    if e.kind() == ErrorKind::NotFound {
        StoreError::NotFound {
            container: container.to_string(),
            name: name.to_string(),
        }
    } else {
        io_error(path, e)
    }
}

/// Write via a temp file in the target directory, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| io_error(path, std::io::Error::other("object path has no parent")))?;
    std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
    tmp.write_all(bytes).map_err(|e| io_error(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| io_error(path, e))?;
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

/// Walk `dir` recursively collecting files; hidden entries (temp files) are skipped.
fn walk(dir: &Path, rel: &str, out: &mut Vec<StoredObject>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }
        let name = if rel.is_empty() {
            file_name
        } else {
            format!("{rel}/{file_name}")
        };
        let meta = entry.metadata()?;
        if meta.is_dir() {
            walk(&entry.path(), &name, out)?;
        } else if meta.is_file() {
            out.push(StoredObject {
                name,
                size: meta.len(),
                last_modified: meta.modified().map(DateTime::<Utc>::from)?,
            });
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn fetch(&self, container: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(container, name)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(container, name, &path, e))?;
        debug!("Fetched {}/{} ({} bytes)", container, name, bytes.len());
        Ok(bytes)
    }

    async fn store(&self, container: &str, name: &str, bytes: &[u8]) -> Result<u64, StoreError> {
        let path = self.object_path(container, name)?;
        let data = bytes.to_vec();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, &data))
            .await
            .map_err(|e| io_error(&path, std::io::Error::other(e)))??;
        debug!("Stored {}/{} ({} bytes)", container, name, bytes.len());
        Ok(bytes.len() as u64)
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool, StoreError> {
        let path = self.object_path(container, name)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), StoreError> {
        let path = self.object_path(container, name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(container, name, &path, e))?;
        debug!("Deleted {}/{}", container, name);
        Ok(())
    }

    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<StoredObject>, StoreError> {
        let dir = self.container_dir(container)?;
        let prefix = prefix.to_string();
        let walk_dir = dir.clone();
        let mut objects = tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            match walk(&walk_dir, "", &mut out) {
                Ok(()) => Ok(out),
                // a container nobody wrote to yet is empty
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(|e| io_error(&dir, std::io::Error::other(e)))?
        .map_err(|e| io_error(&dir, e))?;

        objects.retain(|o| o.name.starts_with(&prefix));
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    async fn signed_url(
        &self,
        container: &str,
        name: &str,
        expiry_hours: u32,
    ) -> Result<String, StoreError> {
        let path = self.object_path(container, name)?;
        if !self.exists(container, name).await? {
            return Err(StoreError::NotFound {
                container: container.to_string(),
                name: name.to_string(),
            });
        }
        Ok(format!("file://{}?{}", path.display(), expiry_query(expiry_hours)))
    }
}

// ── In memory ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct MemoryObject {
    bytes: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// Process-local store keyed by `(container, name)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), MemoryObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), MemoryObject>> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Backdate or postdate an object. Returns `false` when it does not exist.
    pub fn set_last_modified(&self, container: &str, name: &str, at: DateTime<Utc>) -> bool {
        match self
            .objects()
            .get_mut(&(container.to_string(), name.to_string()))
        {
            Some(obj) => {
                obj.last_modified = at;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch(&self, container: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        self.objects()
            .get(&(container.to_string(), name.to_string()))
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StoreError::NotFound {
                container: container.to_string(),
                name: name.to_string(),
            })
    }

    async fn store(&self, container: &str, name: &str, bytes: &[u8]) -> Result<u64, StoreError> {
        validate_object_name(name)?;
        self.objects().insert(
            (container.to_string(), name.to_string()),
            MemoryObject {
                bytes: bytes.to_vec(),
                last_modified: Utc::now(),
            },
        );
        Ok(bytes.len() as u64)
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool, StoreError> {
        Ok(self
            .objects()
            .contains_key(&(container.to_string(), name.to_string())))
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), StoreError> {
        self.objects()
            .remove(&(container.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                container: container.to_string(),
                name: name.to_string(),
            })
    }

    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<StoredObject>, StoreError> {
        let mut objects: Vec<StoredObject> = self
            .objects()
            .iter()
            .filter(|((c, n), _)| c == container && n.starts_with(prefix))
            .map(|((_, n), o)| StoredObject {
                name: n.clone(),
                size: o.bytes.len() as u64,
                last_modified: o.last_modified,
            })
            .collect();
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    async fn signed_url(
        &self,
        container: &str,
        name: &str,
        expiry_hours: u32,
    ) -> Result<String, StoreError> {
        if !self.exists(container, name).await? {
            return Err(StoreError::NotFound {
                container: container.to_string(),
                name: name.to_string(),
            });
        }
        Ok(format!(
            "memory://{container}/{name}?{}",
            expiry_query(expiry_hours)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn object_names_stay_inside_container() {
        assert!(validate_object_name("alice/temp_working.docx").is_ok());
        for bad in ["", "/etc/passwd", "../x", "a/../b", "a//b", "a\\b", "a/./b"] {
            assert!(
                matches!(validate_object_name(bad), Err(StoreError::InvalidPath { .. })),
                "{bad:?} accepted"
            );
        }
    }

    #[tokio::test]
    async fn local_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();

        assert!(!store.exists("docs", "alice/a.docx").await.unwrap());
        assert_eq!(store.store("docs", "alice/a.docx", b"hello").await.unwrap(), 5);
        assert!(store.exists("docs", "alice/a.docx").await.unwrap());
        assert_eq!(store.fetch("docs", "alice/a.docx").await.unwrap(), b"hello");

        // overwrite
        store.store("docs", "alice/a.docx", b"bye").await.unwrap();
        assert_eq!(store.fetch("docs", "alice/a.docx").await.unwrap(), b"bye");

        store.delete("docs", "alice/a.docx").await.unwrap();
        assert!(matches!(
            store.fetch("docs", "alice/a.docx").await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("docs", "alice/a.docx").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn local_list_filters_by_prefix_and_recurses() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        store.store("t", "general/b.docx", b"bb").await.unwrap();
        store.store("t", "general/a.docx", b"a").await.unwrap();
        store.store("t", "bob/temp_working.docx", b"ccc").await.unwrap();

        let general = store.list("t", "general/").await.unwrap();
        let names: Vec<&str> = general.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["general/a.docx", "general/b.docx"]);
        assert_eq!(general[1].size, 2);

        assert_eq!(store.list("t", "").await.unwrap().len(), 3);
        assert!(store.list("never-written", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_signed_url_needs_existing_object() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.signed_url("docs", "x.docx", 24).await,
            Err(StoreError::NotFound { .. })
        ));
        store.store("docs", "x.docx", b"x").await.unwrap();
        let url = store.signed_url("docs", "x.docx", 24).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.contains("x.docx?expires="));
    }

    #[test]
    fn memory_store_lists_and_backdates() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.store("t", "alice/a.docx", b"1").await.unwrap();
            store.store("t", "general/g.docx", b"22").await.unwrap();
            store.store("other", "alice/b.docx", b"3").await.unwrap();

            let listed = store.list("t", "alice/").await.unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].name, "alice/a.docx");

            let past = Utc::now() - Duration::hours(48);
            assert!(store.set_last_modified("t", "alice/a.docx", past));
            assert!(!store.set_last_modified("t", "missing", past));
            assert_eq!(store.list("t", "alice/").await.unwrap()[0].last_modified, past);
            assert_eq!(store.len(), 3);
        });
    }
}
