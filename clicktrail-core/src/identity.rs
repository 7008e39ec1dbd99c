//! User and session identity
//!
//! The user id is durable: it is read from client storage and created once.
//! The session id lives only as long as the [`Identity`] that generated it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Storage key holding the persisted user id
pub const USER_ID_KEY: &str = "tracking_user_id";

/// Durable key/value client storage
pub trait Storage: Send + Sync {
    /// Read a value, `Ok(None)` if the key is absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Generate `<prefix>_<random base-36>`
pub fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, to_base36(uuid::Uuid::new_v4().as_u128()))
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(25);
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Per-user and per-session identifiers
#[derive(Debug, Clone)]
pub struct Identity {
    user_id: String,
    session_id: String,
}

impl Identity {
    /// Resolve the user id from `storage` (creating and persisting it on first
    /// use) and start a new session.
    ///
    /// Without storage, a fresh unpersisted user id is generated. Storage
    /// failures are logged and never propagated.
    pub fn new(storage: Option<&dyn Storage>) -> Self {
        let session_id = generate_id("session");
        let user_id = match storage {
            Some(storage) => load_or_create_user_id(storage),
            None => generate_id("user"),
        };

        tracing::debug!(user_id = %user_id, session_id = %session_id, "Identity established");

        Self {
            user_id,
            session_id,
        }
    }

    /// Build an identity from known ids
    pub fn from_parts(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

fn load_or_create_user_id(storage: &dyn Storage) -> String {
    match storage.get(USER_ID_KEY) {
        Ok(Some(existing)) if !existing.is_empty() => return existing,
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read user ID from storage");
        }
    }

    let user_id = generate_id("user");
    if let Err(e) = storage.set(USER_ID_KEY, &user_id) {
        tracing::warn!(error = %e, "Failed to store user ID, continuing with unpersisted ID");
    }
    user_id
}

// ============================================
// Storage implementations
// ============================================

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object on disk, one string value per key
///
/// Defaults to `$XDG_DATA_HOME/clicktrail/storage.json`.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Storage at the default XDG location
    pub fn open_default() -> Self {
        Self::new(crate::config::Config::storage_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            Error::Storage(format!("corrupt storage file {}: {}", self.path.display(), e))
        })
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename: readers never observe a partially written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&values)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Storage("quota exceeded".to_string()))
        }
    }

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Storage("unavailable".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Storage("unavailable".to_string()))
        }
    }

    #[test]
    fn test_generate_id_format() {
        let id = generate_id("user");
        let suffix = id.strip_prefix("user_").expect("prefix");
        assert!(!suffix.is_empty());
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(generate_id("evt"), generate_id("evt"));
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(36 * 36 + 1), "101");
    }

    #[test]
    fn test_user_id_persisted_across_constructions() {
        let storage = MemoryStorage::new();
        let first = Identity::new(Some(&storage));
        let second = Identity::new(Some(&storage));

        assert!(first.user_id().starts_with("user_"));
        assert_eq!(first.user_id(), second.user_id());
        assert_eq!(
            storage.get(USER_ID_KEY).unwrap().as_deref(),
            Some(first.user_id())
        );
        assert_ne!(first.session_id(), second.session_id());
    }

    #[test]
    fn test_existing_user_id_is_reused() {
        let storage = MemoryStorage::new();
        storage.set(USER_ID_KEY, "user_existing").unwrap();

        let identity = Identity::new(Some(&storage));
        assert_eq!(identity.user_id(), "user_existing");
    }

    #[test]
    fn test_without_storage_ids_are_fresh() {
        let a = Identity::new(None);
        let b = Identity::new(None);
        assert_ne!(a.user_id(), b.user_id());
        assert!(a.session_id().starts_with("session_"));
    }

    #[test]
    fn test_session_id_is_stable_for_identity() {
        let identity = Identity::new(None);
        let session = identity.session_id().to_string();
        assert_eq!(identity.session_id(), session);
        assert_eq!(identity.clone().session_id(), session);
    }

    #[test]
    fn test_write_failure_still_returns_id() {
        let a = Identity::new(Some(&ReadOnlyStorage));
        let b = Identity::new(Some(&ReadOnlyStorage));
        assert!(a.user_id().starts_with("user_"));
        assert_ne!(a.user_id(), b.user_id());
    }

    #[test]
    fn test_read_failure_generates_id() {
        let identity = Identity::new(Some(&BrokenStorage));
        assert!(identity.user_id().starts_with("user_"));
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let first = Identity::new(Some(&FileStorage::new(&path)));
        let second = Identity::new(Some(&FileStorage::new(&path)));

        assert!(path.exists());
        assert_eq!(first.user_id(), second.user_id());
    }

    #[test]
    fn test_file_storage_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("storage.json"));

        storage.set("theme", "dark").unwrap();
        storage.set(USER_ID_KEY, "user_abc").unwrap();

        assert_eq!(storage.get("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(storage.get(USER_ID_KEY).unwrap().as_deref(), Some("user_abc"));
        assert_eq!(storage.get("missing").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_storage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(storage.get(USER_ID_KEY), Err(Error::Storage(_))));
        // Identity still comes up
        assert!(Identity::new(Some(&storage)).user_id().starts_with("user_"));
    }
}
