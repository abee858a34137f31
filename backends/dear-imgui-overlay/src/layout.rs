//! Persisted window layouts
//!
//! Each context saves its immediate-mode window layout as an opaque blob under
//! its persisted-layout name. Missing blobs are not errors.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Layout name used when a context is created without one
pub const DEFAULT_LAYOUT: &str = "Default";

/// Load/save of named layout blobs
pub trait LayoutStore {
    fn load(&self, name: &str) -> Option<Vec<u8>>;

    /// Persist `data`; false if the write failed and should be retried
    fn save(&self, name: &str, data: &[u8]) -> bool;
}

/// `UC{name}.ini` files in a user directory, falling back to a read-only
/// default directory on load
#[derive(Clone, Debug)]
pub struct FileLayoutStore {
    user_dir: PathBuf,
    default_dir: Option<PathBuf>,
}

impl FileLayoutStore {
    pub fn new(user_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_dir: user_dir.into(),
            default_dir: None,
        }
    }

    /// Per-user config directory of `app`, e.g. `~/.config/<app>/layouts`
    pub fn for_app(app: &str) -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join(app).join("layouts")))
    }

    pub fn with_default_dir(mut self, default_dir: impl Into<PathBuf>) -> Self {
        self.default_dir = Some(default_dir.into());
        self
    }

    pub fn file_name(name: &str) -> String {
        format!("UC{name}.ini")
    }

    pub fn user_path(&self, name: &str) -> PathBuf {
        self.user_dir.join(Self::file_name(name))
    }

    fn read(path: &Path) -> Option<Vec<u8>> {
        match std::fs::read(path) {
            Ok(data) => Some(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!(
                    target: "dear-imgui-overlay",
                    "Failed to read layout {}: {}",
                    path.display(),
                    err
                );
                None
            }
        }
    }
}

impl LayoutStore for FileLayoutStore {
    fn load(&self, name: &str) -> Option<Vec<u8>> {
        Self::read(&self.user_path(name)).or_else(|| {
            self.default_dir
                .as_ref()
                .and_then(|dir| Self::read(&dir.join(Self::file_name(name))))
        })
    }

    fn save(&self, name: &str, data: &[u8]) -> bool {
        if data.is_empty() {
            return true;
        }
        let path = self.user_path(name);
        let result = std::fs::create_dir_all(&self.user_dir).and_then(|()| std::fs::write(&path, data));
        match result {
            Ok(()) => {
                tracing::debug!(target: "dear-imgui-overlay", "Saved layout {}", path.display());
                true
            }
            Err(err) => {
                tracing::warn!(
                    target: "dear-imgui-overlay",
                    "Failed to save layout {}: {}",
                    path.display(),
                    err
                );
                false
            }
        }
    }
}

/// In-memory store for hosts without a writable filesystem
#[derive(Debug, Default)]
pub struct MemoryLayoutStore {
    blobs: RefCell<HashMap<String, Vec<u8>>>,
    fail_saves: Cell<bool>,
    save_attempts: Cell<usize>,
}

impl MemoryLayoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.blobs.borrow_mut().insert(name.to_owned(), data.into());
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.borrow().get(name).cloned()
    }

    /// Make subsequent saves fail, to exercise retry paths
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }

    pub fn save_attempts(&self) -> usize {
        self.save_attempts.get()
    }
}

impl LayoutStore for MemoryLayoutStore {
    fn load(&self, name: &str) -> Option<Vec<u8>> {
        self.get(name)
    }

    fn save(&self, name: &str, data: &[u8]) -> bool {
        self.save_attempts.set(self.save_attempts.get() + 1);
        if self.fail_saves.get() {
            return false;
        }
        self.insert(name, data);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_layout_wins_over_default() {
        let user = tempfile::tempdir().unwrap();
        let defaults = tempfile::tempdir().unwrap();
        std::fs::write(defaults.path().join("UCDefault.ini"), "[Window][Stats]").unwrap();
        let store = FileLayoutStore::new(user.path()).with_default_dir(defaults.path());

        assert_eq!(store.load("Default").as_deref(), Some(&b"[Window][Stats]"[..]));
        assert!(store.save("Default", b"[Window][Mine]"));
        assert_eq!(store.load("Default").as_deref(), Some(&b"[Window][Mine]"[..]));
        assert!(store.load("Missing").is_none());
    }

    #[test]
    fn save_creates_user_directory_and_skips_empty_blobs() {
        let root = tempfile::tempdir().unwrap();
        let store = FileLayoutStore::new(root.path().join("nested").join("layouts"));
        assert!(store.save("Tools", b""));
        assert!(!store.user_path("Tools").exists());
        assert!(store.save("Tools", b"x"));
        assert!(store.user_path("Tools").ends_with("UCTools.ini"));
        assert!(store.user_path("Tools").exists());
    }

    #[test]
    fn memory_store_counts_attempts() {
        let store = MemoryLayoutStore::new();
        store.set_fail_saves(true);
        assert!(!store.save("Default", b"a"));
        assert!(store.load("Default").is_none());
        store.set_fail_saves(false);
        assert!(store.save("Default", b"a"));
        assert_eq!(store.save_attempts(), 2);
        assert_eq!(store.load("Default").as_deref(), Some(&b"a"[..]));
    }
}
