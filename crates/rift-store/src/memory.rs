use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::template::Template;
use crate::traits::TemplateStore;

/// In-memory template store.
///
/// Intended for tests and embedding. The saved directory is held behind a
/// `RwLock`; templates are cloned on load and save. Saves can be made to
/// fail on demand to exercise persistence-failure recovery.
pub struct InMemoryTemplateStore {
    templates: RwLock<Vec<Template>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemoryTemplateStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(Vec::new()),
            saves: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Number of templates in the last saved directory.
    pub fn len(&self) -> usize {
        self.templates.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the saved directory is empty.
    pub fn is_empty(&self) -> bool {
        self.templates.read().expect("lock poisoned").is_empty()
    }

    /// Number of successful `save_all` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make subsequent saves fail with an I/O error (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl Default for InMemoryTemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn load_all(&self) -> StoreResult<Vec<Template>> {
        Ok(self.templates.read().expect("lock poisoned").clone())
    }

    fn save_all(&self, templates: &[Template]) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated template store failure",
            )));
        }
        *self.templates.write().expect("lock poisoned") = templates.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryTemplateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTemplateStore")
            .field("template_count", &self.len())
            .field("save_count", &self.save_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_types::{HashContext, ItemVariant, TemplateHash, Timestamp};

    fn template(name: &str) -> Template {
        Template::new(
            TemplateHash::from_bytes(name.as_bytes()),
            ItemVariant::new(name),
            HashContext::default(),
            Timestamp::zero(),
        )
    }

    #[test]
    fn empty_store_loads_nothing() {
        let store = InMemoryTemplateStore::new();
        assert!(store.load_all().unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn save_then_load() {
        let store = InMemoryTemplateStore::new();
        store.save_all(&[template("a"), template("b")]).unwrap();
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![template("a"), template("b")]);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn save_replaces_directory() {
        let store = InMemoryTemplateStore::new();
        store.save_all(&[template("a"), template("b")]).unwrap();
        store.save_all(&[template("c")]).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![template("c")]);
    }

    #[test]
    fn failing_saves_leave_previous_directory() {
        let store = InMemoryTemplateStore::new();
        store.save_all(&[template("a")]).unwrap();
        store.set_fail_saves(true);
        assert!(matches!(
            store.save_all(&[template("b")]),
            Err(StoreError::Io(_))
        ));
        assert_eq!(store.load_all().unwrap(), vec![template("a")]);
        store.set_fail_saves(false);
        store.save_all(&[template("b")]).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![template("b")]);
    }

    #[test]
    fn debug_format() {
        let debug = format!("{:?}", InMemoryTemplateStore::new());
        assert!(debug.contains("InMemoryTemplateStore"));
        assert!(debug.contains("template_count"));
    }
}
