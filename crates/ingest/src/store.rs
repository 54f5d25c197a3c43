//! Object storage boundary.
//!
//! [`ObjectStore`] is the only way the pipeline reads documents. Two
//! implementations ship with the crate:
//!
//! - [`InMemoryObjectStore`]: a map of `(bucket, key)` to bytes, for tests
//! - [`FsObjectStore`]: `<root>/<bucket>/<key>` on the local filesystem
//!
//! Both return text only; content that is not UTF-8 is rejected here so the
//! parser never sees it.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::FetchError;

pub trait ObjectStore: Send + Sync {
    /// Read the whole object as UTF-8 text.
    fn get_object(&self, bucket: &str, key: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    unavailable: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_object(&self, bucket: impl Into<String>, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((bucket.into(), key.into()), body.into());
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<String, FetchError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FetchError::Unavailable("object store offline".to_string()));
        }
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let body = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| FetchError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        utf8(bucket, key, body.clone())
    }
}

/// Objects stored as files under `root/bucket/key`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map `bucket`/`key` to a path that cannot leave the root.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, FetchError> {
        let mut path = self.root.clone();
        for (label, part) in [("bucket", bucket), ("key", key)] {
            let relative = Path::new(part);
            for component in relative.components() {
                match component {
                    Component::Normal(segment) => path.push(segment),
                    Component::CurDir => {}
                    _ => {
                        return Err(FetchError::InvalidKey {
                            key: format!("{bucket}/{key}"),
                            reason: format!("{label} must be a relative path without `..`"),
                        })
                    }
                }
            }
        }
        Ok(path)
    }
}

impl ObjectStore for FsObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<String, FetchError> {
        let path = self.object_path(bucket, key)?;
        match std::fs::read(&path) {
            Ok(body) => utf8(bucket, key, body),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(FetchError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(err) => Err(FetchError::Io(format!("{}: {err}", path.display()))),
        }
    }
}

fn utf8(bucket: &str, key: &str, body: Vec<u8>) -> Result<String, FetchError> {
    String::from_utf8(body).map_err(|err| FetchError::InvalidUtf8 {
        bucket: bucket.to_string(),
        key: key.to_string(),
        valid_up_to: err.utf8_error().valid_up_to(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_round_trip_and_errors() {
        let store = InMemoryObjectStore::new();
        store.put_object("b", "item.xml", "<Item/>");
        assert_eq!(store.get_object("b", "item.xml").as_deref(), Ok("<Item/>"));
        assert!(matches!(
            store.get_object("b", "other.xml"),
            Err(FetchError::NotFound { .. })
        ));

        store.put_object("b", "bin", vec![b'o', b'k', 0xff]);
        assert_eq!(
            store.get_object("b", "bin"),
            Err(FetchError::InvalidUtf8 {
                bucket: "b".into(),
                key: "bin".into(),
                valid_up_to: 2
            })
        );

        store.set_available(false);
        assert!(matches!(
            store.get_object("b", "item.xml"),
            Err(FetchError::Unavailable(_))
        ));
    }

    #[test]
    fn fs_store_reads_nested_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("inbound").join("items");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(nested.join("a b.xml"), "<Item/>").expect("write");

        let store = FsObjectStore::new(dir.path());
        assert_eq!(
            store.get_object("inbound", "items/a b.xml").as_deref(),
            Ok("<Item/>")
        );
        assert!(matches!(
            store.get_object("inbound", "missing.xml"),
            Err(FetchError::NotFound { .. })
        ));
    }

    #[test]
    fn fs_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::new(dir.path());
        assert!(matches!(
            store.get_object("inbound", "../secret"),
            Err(FetchError::InvalidKey { .. })
        ));
        assert!(matches!(
            store.get_object("..", "x"),
            Err(FetchError::InvalidKey { .. })
        ));
        assert!(matches!(
            store.get_object("inbound", "/etc/passwd"),
            Err(FetchError::InvalidKey { .. })
        ));
    }
}
