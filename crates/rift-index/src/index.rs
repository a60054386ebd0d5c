//! The core template directory.
//!
//! [`TemplateIndex`] holds a `BTreeMap<TemplateHash, Template>`. Mutations
//! happen in memory and mark the index dirty; [`TemplateIndex::save`] writes
//! the whole directory through the backing store. A crash between a
//! mutation and the next save can leave the persisted counts behind the
//! ledgers; a rebuild recomputes them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use rift_store::{Template, TemplateStore};
use rift_types::{HashContext, ItemVariant, TemplateHash, Timestamp};

use crate::error::{IndexError, IndexResult};

/// The template directory with global reference counts.
pub struct TemplateIndex {
    templates: BTreeMap<TemplateHash, Template>,
    dirty: bool,
    store: Arc<dyn TemplateStore>,
}

impl std::fmt::Debug for TemplateIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateIndex")
            .field("templates", &self.templates.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl TemplateIndex {
    /// Create an empty index backed by the given store.
    ///
    /// Nothing is read from the store; use [`TemplateIndex::load`] to
    /// resume from persisted state.
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self {
            templates: BTreeMap::new(),
            dirty: false,
            store,
        }
    }

    /// Reconstruct the index from whatever the store last saved.
    pub fn load(store: Arc<dyn TemplateStore>) -> IndexResult<Self> {
        let templates: BTreeMap<TemplateHash, Template> = store
            .load_all()?
            .into_iter()
            .map(|t| (t.hash, t))
            .collect();
        info!(templates = templates.len(), "template index loaded");
        Ok(Self {
            templates,
            dirty: false,
            store,
        })
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` if the index has no templates.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Returns `true` if there are mutations not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// Look up a template by hash.
    pub fn find(&self, hash: &TemplateHash) -> Option<&Template> {
        self.templates.get(hash)
    }

    pub fn contains(&self, hash: &TemplateHash) -> bool {
        self.templates.contains_key(hash)
    }

    /// All templates in hash order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// All template hashes in order.
    pub fn hashes(&self) -> Vec<TemplateHash> {
        self.templates.keys().copied().collect()
    }

    /// Sum of all reference counts.
    pub fn total_refs(&self) -> u64 {
        self.templates.values().map(|t| t.ref_count).sum()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Insert a template for `hash` if none exists.
    ///
    /// Returns `true` if a template was created. Calling again with the same
    /// hash is a no-op: the first sample wins.
    pub fn put_template(
        &mut self,
        hash: TemplateHash,
        sample: &ItemVariant,
        context: &HashContext,
        now: Timestamp,
    ) -> bool {
        if self.templates.contains_key(&hash) {
            return false;
        }
        self.templates.insert(
            hash,
            Template::new(hash, sample.clone(), context.clone(), now),
        );
        self.dirty = true;
        debug!(template = %hash.short_hex(), kind = %sample.kind, "template created");
        true
    }

    /// Add `delta` (possibly negative) to a template's reference count.
    ///
    /// Returns the new count. The count saturates at zero; an underflow is
    /// logged since it means the index has drifted from the ledgers.
    pub fn inc_ref(&mut self, hash: &TemplateHash, delta: i64) -> IndexResult<u64> {
        let template = self
            .templates
            .get_mut(hash)
            .ok_or(IndexError::UnknownTemplate(*hash))?;

        let updated = if delta >= 0 {
            template.ref_count.saturating_add(delta as u64)
        } else {
            let decrement = delta.unsigned_abs();
            if decrement > template.ref_count {
                warn!(
                    template = %hash.short_hex(),
                    ref_count = template.ref_count,
                    decrement,
                    "reference count underflow; clamping to zero"
                );
            }
            template.ref_count.saturating_sub(decrement)
        };

        if updated != template.ref_count {
            template.ref_count = updated;
            self.dirty = true;
        }
        Ok(updated)
    }

    /// Overwrite a template's reference count.
    pub fn set_ref(&mut self, hash: &TemplateHash, count: u64) -> IndexResult<()> {
        let template = self
            .templates
            .get_mut(hash)
            .ok_or(IndexError::UnknownTemplate(*hash))?;
        if template.ref_count != count {
            template.ref_count = count;
            self.dirty = true;
        }
        Ok(())
    }

    /// Remove a template outright. Only rebuild-with-cleanup does this.
    pub fn remove(&mut self, hash: &TemplateHash) -> Option<Template> {
        let removed = self.templates.remove(hash);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Persist the full directory if anything changed since the last save.
    ///
    /// On failure the index stays dirty so the next save retries.
    pub fn save(&mut self) -> IndexResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let templates: Vec<Template> = self.templates.values().cloned().collect();
        self.store.save_all(&templates)?;
        self.dirty = false;
        debug!(templates = templates.len(), "template index saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_store::{FileTemplateStore, InMemoryTemplateStore};

    fn make_store() -> Arc<InMemoryTemplateStore> {
        Arc::new(InMemoryTemplateStore::new())
    }

    fn make_index() -> TemplateIndex {
        TemplateIndex::new(make_store())
    }

    fn variant(name: &str) -> ItemVariant {
        ItemVariant::new(name)
    }

    fn hash(name: &str) -> TemplateHash {
        TemplateHash::from_bytes(name.as_bytes())
    }

    fn put(index: &mut TemplateIndex, name: &str) -> TemplateHash {
        let h = hash(name);
        index.put_template(h, &variant(name), &HashContext::default(), Timestamp::from_millis(1));
        h
    }

    // -----------------------------------------------------------------------
    // Lookup / insertion
    // -----------------------------------------------------------------------

    #[test]
    fn new_index_is_empty() {
        let idx = make_index();
        assert!(idx.is_empty());
        assert!(!idx.is_dirty());
        assert!(idx.find(&hash("x")).is_none());
    }

    #[test]
    fn put_template_creates_once() {
        let mut idx = make_index();
        let h = hash("minecraft:dirt");
        assert!(idx.put_template(h, &variant("minecraft:dirt"), &HashContext::default(), Timestamp::zero()));
        assert!(!idx.put_template(h, &variant("minecraft:other"), &HashContext::default(), Timestamp::zero()));

        let t = idx.find(&h).unwrap();
        assert_eq!(t.sample.kind, "minecraft:dirt");
        assert_eq!(t.ref_count, 0);
        assert_eq!(idx.len(), 1);
        assert!(idx.is_dirty());
    }

    #[test]
    fn hashes_are_sorted() {
        let mut idx = make_index();
        put(&mut idx, "c");
        put(&mut idx, "a");
        put(&mut idx, "b");
        let hashes = idx.hashes();
        for w in hashes.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    // -----------------------------------------------------------------------
    // Reference counting
    // -----------------------------------------------------------------------

    #[test]
    fn inc_ref_adds_and_subtracts() {
        let mut idx = make_index();
        let h = put(&mut idx, "stone");
        assert_eq!(idx.inc_ref(&h, 10).unwrap(), 10);
        assert_eq!(idx.inc_ref(&h, -4).unwrap(), 6);
        assert_eq!(idx.find(&h).unwrap().ref_count, 6);
        assert_eq!(idx.total_refs(), 6);
    }

    #[test]
    fn inc_ref_saturates_at_zero() {
        let mut idx = make_index();
        let h = put(&mut idx, "stone");
        idx.inc_ref(&h, 2).unwrap();
        assert_eq!(idx.inc_ref(&h, -5).unwrap(), 0);
    }

    #[test]
    fn inc_ref_unknown_template_fails() {
        let mut idx = make_index();
        let err = idx.inc_ref(&hash("ghost"), 1).unwrap_err();
        assert!(matches!(err, IndexError::UnknownTemplate(h) if h == hash("ghost")));
    }

    #[test]
    fn set_ref_and_remove() {
        let mut idx = make_index();
        let h = put(&mut idx, "gravel");
        idx.set_ref(&h, 42).unwrap();
        assert_eq!(idx.find(&h).unwrap().ref_count, 42);
        assert!(idx.remove(&h).is_some());
        assert!(idx.remove(&h).is_none());
        assert!(matches!(idx.set_ref(&h, 1), Err(IndexError::UnknownTemplate(_))));
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    #[test]
    fn save_and_load_roundtrip() {
        let store = make_store();
        let mut idx = TemplateIndex::new(store.clone());
        let h = put(&mut idx, "sand");
        idx.inc_ref(&h, 7).unwrap();
        idx.save().unwrap();
        assert!(!idx.is_dirty());

        let reloaded = TemplateIndex::load(store).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.find(&h).unwrap().ref_count, 7);
    }

    #[test]
    fn clean_index_skips_save() {
        let store = make_store();
        let mut idx = TemplateIndex::new(store.clone());
        idx.save().unwrap();
        assert_eq!(store.save_count(), 0);
        put(&mut idx, "clay");
        idx.save().unwrap();
        idx.save().unwrap();
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn failed_save_stays_dirty() {
        let store = make_store();
        let mut idx = TemplateIndex::new(store.clone());
        put(&mut idx, "clay");
        store.set_fail_saves(true);
        assert!(matches!(idx.save(), Err(IndexError::Store(_))));
        assert!(idx.is_dirty());

        store.set_fail_saves(false);
        idx.save().unwrap();
        assert!(!idx.is_dirty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn file_backed_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn TemplateStore> = Arc::new(FileTemplateStore::open(dir.path()));
        let mut idx = TemplateIndex::new(store);
        let h = put(&mut idx, "minecraft:emerald");
        idx.inc_ref(&h, 3).unwrap();
        idx.save().unwrap();

        let reopened =
            TemplateIndex::load(Arc::new(FileTemplateStore::open(dir.path()))).unwrap();
        assert_eq!(reopened.find(&h).unwrap().ref_count, 3);
        assert_eq!(reopened.find(&h).unwrap().sample, variant("minecraft:emerald"));
    }

    #[test]
    fn debug_format() {
        let debug = format!("{:?}", make_index());
        assert!(debug.contains("TemplateIndex"));
    }
}
