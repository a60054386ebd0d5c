//! The vault engine.
//!
//! [`RiftEngine`] owns every piece of vault state: the template index, the
//! resident ledgers, the delegation graph, presence, sync sessions, and the
//! per-binding insert buffers. It is driven from one serialized context;
//! every mutating call takes `&mut self` and persists its effects before
//! returning. Persistence failures are logged and retried on the next
//! flush rather than surfaced to the caller.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use rift_crypto::VariantHasher;
use rift_index::TemplateIndex;
use rift_ledger::{
    FileLedgerBackend, FileLegacyStore, InMemoryLedgerBackend, InMemoryLegacyStore,
    LedgerBackend, LedgerBook, LedgerResult, LegacyStore, PlayerLedger,
};
use rift_merge::{DelegationEdge, DelegationGraph, MergeError, MergedView, ViewPlan};
use rift_store::{FileTemplateStore, InMemoryTemplateStore, TemplateStore};
use rift_sync::{
    BroadcastSink, Delivery, NullSink, SessionManager, SyncEntry, SyncPayload, SyncSink,
};
use rift_types::{BindingId, HashContext, ItemStack, ItemVariant, OwnerId, TemplateHash, Timestamp};

use crate::batch::{InsertBuffer, RefillThrottle};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// The storage and delivery collaborators an engine runs on.
#[derive(Clone)]
pub struct Backends {
    pub templates: Arc<dyn TemplateStore>,
    pub ledgers: Arc<dyn LedgerBackend>,
    pub legacy: Arc<dyn LegacyStore>,
    pub sink: Arc<dyn SyncSink>,
}

impl Backends {
    /// File backends under `data_dir`, with payloads discarded.
    pub fn files(data_dir: &Path) -> Self {
        Self {
            templates: Arc::new(FileTemplateStore::open(data_dir)),
            ledgers: Arc::new(FileLedgerBackend::open(data_dir)),
            legacy: Arc::new(FileLegacyStore::open(data_dir)),
            sink: Arc::new(NullSink),
        }
    }

    /// Fresh in-memory backends, with payloads discarded.
    pub fn in_memory() -> Self {
        Self {
            templates: Arc::new(InMemoryTemplateStore::new()),
            ledgers: Arc::new(InMemoryLedgerBackend::new()),
            legacy: Arc::new(InMemoryLegacyStore::new()),
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn SyncSink>) -> Self {
        self.sink = sink;
        self
    }
}

/// Template-addressed, deduplicated item storage for many owners.
pub struct RiftEngine {
    pub(crate) config: EngineConfig,
    pub(crate) hasher: VariantHasher,
    pub(crate) index: TemplateIndex,
    pub(crate) ledgers: LedgerBook,
    pub(crate) legacy: Arc<dyn LegacyStore>,
    graph: DelegationGraph,
    online: BTreeSet<OwnerId>,
    sessions: SessionManager,
    sink: Arc<dyn SyncSink>,
    buffers: HashMap<BindingId, InsertBuffer>,
    throttles: HashMap<BindingId, RefillThrottle>,
}

impl std::fmt::Debug for RiftEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiftEngine")
            .field("templates", &self.index.len())
            .field("ledgers", &self.ledgers)
            .field("bindings", &self.graph.len())
            .field("online", &self.online.len())
            .finish()
    }
}

/// Saturating conversion for ledger and index deltas.
fn signed(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

impl RiftEngine {
    /// Start an engine on the given backends, loading the template index.
    pub fn new(config: EngineConfig, backends: Backends) -> EngineResult<Self> {
        let index = TemplateIndex::load(backends.templates)?;
        let hasher = VariantHasher::new(HashContext::new(config.registry.clone()));
        info!(
            templates = index.len(),
            registry = %config.registry,
            "rift engine started"
        );
        Ok(Self {
            config,
            hasher,
            index,
            ledgers: LedgerBook::new(backends.ledgers),
            legacy: backends.legacy,
            graph: DelegationGraph::new(),
            online: BTreeSet::new(),
            sessions: SessionManager::new(),
            sink: backends.sink,
            buffers: HashMap::new(),
            throttles: HashMap::new(),
        })
    }

    /// Start an engine on the file layout under `config.data_dir`.
    pub fn open(config: EngineConfig, sink: Arc<dyn SyncSink>) -> EngineResult<Self> {
        let backends = Backends::files(&config.data_dir).with_sink(sink);
        Self::new(config, backends)
    }

    /// [`RiftEngine::open`] delivering through a [`BroadcastSink`] sized by
    /// `config.broadcast_capacity`. The sink is returned for subscribing.
    pub fn open_broadcast(config: EngineConfig) -> EngineResult<(Self, Arc<BroadcastSink>)> {
        let sink = Arc::new(BroadcastSink::new(config.broadcast_capacity));
        let engine = Self::open(config, sink.clone())?;
        Ok((engine, sink))
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index(&self) -> &TemplateIndex {
        &self.index
    }

    pub fn graph(&self) -> &DelegationGraph {
        &self.graph
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn is_online(&self, owner: &OwnerId) -> bool {
        self.online.contains(owner)
    }

    /// Template hash of a variant under this engine's context.
    pub fn template_hash(&self, variant: &ItemVariant) -> EngineResult<TemplateHash> {
        Ok(self.hasher.hash(variant)?)
    }

    /// A copy of `owner`'s ledger. Unknown owners yield an empty ledger.
    pub fn ledger(&mut self, owner: OwnerId) -> PlayerLedger {
        let ledger = self.ledgers.snapshot(owner);
        self.release();
        ledger
    }

    /// Units of `variant` held by `owner` alone.
    pub fn count(&mut self, owner: OwnerId, variant: &ItemVariant) -> u64 {
        let Ok(hash) = self.hasher.hash(variant) else {
            return 0;
        };
        let count = self.ledgers.count(owner, &hash);
        self.release();
        count
    }

    /// The owners whose ledgers `viewer` sees.
    pub fn plan(&self, viewer: OwnerId) -> ViewPlan {
        ViewPlan::for_viewer(viewer, &self.graph, &self.online)
    }

    /// The merged view of `viewer`.
    pub fn view(&mut self, viewer: OwnerId) -> MergedView {
        let plan = self.plan(viewer);
        let view = MergedView::build(&plan, &mut self.ledgers);
        self.release();
        view
    }

    /// Units buffered by `binding` and not yet credited.
    pub fn buffered_units(&self, binding: &BindingId) -> u64 {
        self.buffers.get(binding).map(InsertBuffer::units).unwrap_or(0)
    }

    // ---------------------------------------------------------------
    // Insert / take
    // ---------------------------------------------------------------

    /// Credit `count` units of `variant` to `owner`'s own ledger.
    ///
    /// Returns the number of units credited, zero for an empty stack.
    pub fn insert(
        &mut self,
        owner: OwnerId,
        variant: &ItemVariant,
        count: u64,
        timestamp: Timestamp,
    ) -> u64 {
        if count == 0 || variant.is_empty() {
            return 0;
        }
        let hash = match self.hasher.hash(variant) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(owner = %owner, error = %e, "insert rejected");
                return 0;
            }
        };
        let credited = match self.credit(owner, &[(hash, variant, count)], timestamp) {
            Ok(credited) => credited,
            Err(e) => {
                warn!(owner = %owner, error = %e, "insert refused; ledger unreadable");
                self.release();
                return 0;
            }
        };
        self.persist();
        self.notify(owner);
        self.release();
        debug!(owner = %owner, template = %hash.short_hex(), count = credited, "inserted");
        credited
    }

    /// [`RiftEngine::insert`] stamped with the current time.
    pub fn insert_for_owner(&mut self, owner: OwnerId, variant: &ItemVariant, count: u64) -> u64 {
        self.insert(owner, variant, count, Timestamp::now())
    }

    /// Apply credits to `owner`'s ledger and the reference counts, without
    /// persisting. Templates are created before they are referenced.
    ///
    /// Fails with nothing applied if `owner`'s ledger cannot be read.
    fn credit(
        &mut self,
        owner: OwnerId,
        items: &[(TemplateHash, &ItemVariant, u64)],
        timestamp: Timestamp,
    ) -> LedgerResult<u64> {
        self.ledgers.try_ledger(owner)?;
        let mut credited = 0u64;
        for (hash, variant, count) in items {
            let delta = signed(*count);
            self.index
                .put_template(*hash, variant, self.hasher.context(), timestamp);
            self.ledgers.add(owner, *hash, delta, timestamp)?;
            if let Err(e) = self.index.inc_ref(hash, delta) {
                warn!(template = %hash.short_hex(), error = %e, "reference count not updated");
            }
            credited = credited.saturating_add(delta as u64);
        }
        Ok(credited)
    }

    /// Remove up to `want` units of `variant` from `viewer`'s merged view.
    ///
    /// The viewer's own ledger is drawn from first, then the other members
    /// of the view in visit order. Returns the number of units taken, which
    /// is less than `want` when the view holds fewer.
    pub fn take(&mut self, viewer: OwnerId, variant: &ItemVariant, want: u64) -> u64 {
        if want == 0 || variant.is_empty() {
            return 0;
        }
        let Ok(hash) = self.hasher.hash(variant) else {
            return 0;
        };
        if !self.index.contains(&hash) {
            return 0;
        }

        let plan = self.plan(viewer);
        let mut remaining = want;
        for member in &plan.members {
            if remaining == 0 {
                break;
            }
            let Some(entry) = self.ledgers.ledger(*member).entry(&hash).cloned() else {
                continue;
            };
            let portion = entry.count.min(remaining).min(i64::MAX as u64);
            // A take keeps the entry's own timestamp.
            if let Err(e) = self
                .ledgers
                .add(*member, hash, -(portion as i64), entry.last_touched)
            {
                warn!(owner = %member, error = %e, "take skipped owner");
                continue;
            }
            remaining -= portion;
        }

        let taken = want - remaining;
        if taken > 0 {
            if let Err(e) = self.index.inc_ref(&hash, -signed(taken)) {
                warn!(template = %hash.short_hex(), error = %e, "reference count not updated");
            }
            self.persist();
            self.notify(viewer);
            debug!(viewer = %viewer, template = %hash.short_hex(), want, taken, "took");
        }
        self.release();
        taken
    }

    /// [`RiftEngine::take`] returning the taken units as a stack.
    pub fn take_for_owner(&mut self, owner: OwnerId, variant: &ItemVariant, max: u64) -> ItemStack {
        let taken = self.take(owner, variant, max);
        if taken == 0 {
            ItemStack::empty()
        } else {
            ItemStack::new(variant.clone(), taken)
        }
    }

    // ---------------------------------------------------------------
    // Sharing objects
    // ---------------------------------------------------------------

    /// Bind a sharing object so that `delegator`'s view merges into
    /// `root`'s. Returns `false` if this binding already carries the edge.
    pub fn bind_object(
        &mut self,
        binding: BindingId,
        delegator: OwnerId,
        root: OwnerId,
    ) -> EngineResult<bool> {
        let added = self.graph.bind(binding, delegator, root)?;
        if added {
            self.notify(delegator);
            self.release();
        }
        Ok(added)
    }

    /// Remove a sharing object. Its buffered units are credited first; if
    /// the root's ledger cannot be read the binding is kept and the load
    /// error returned.
    ///
    /// Everyone who saw the delegator's ledger through this binding is
    /// resynced, as is the delegator.
    pub fn unbind_object(&mut self, binding: BindingId) -> EngineResult<DelegationEdge> {
        let Some(edge) = self.graph.edge(&binding).copied() else {
            return Err(MergeError::UnknownBinding(binding).into());
        };
        if self.buffered_units(&binding) > 0 {
            // Buffered units have nowhere to go if the root is unreadable.
            self.ledgers.try_ledger(edge.root)?;
        }
        self.flush_binding(binding);
        self.buffers.remove(&binding);
        self.throttles.remove(&binding);

        let mut group = self.plan(edge.delegator).members;
        let edge = self.graph.unbind(&binding)?;
        group.extend(self.plan(edge.delegator).members);
        self.notify_group(group);
        self.release();
        Ok(edge)
    }

    /// Queue units inserted through a sharing object for its root.
    ///
    /// The units are credited by a later [`RiftEngine::tick`],
    /// [`RiftEngine::flush_binding`], or [`RiftEngine::unbind_object`].
    /// Returns the number of units accepted.
    pub fn buffer_insert(
        &mut self,
        binding: BindingId,
        variant: &ItemVariant,
        count: u64,
        now: Timestamp,
    ) -> EngineResult<u64> {
        let edge = *self
            .graph
            .edge(&binding)
            .ok_or(MergeError::UnknownBinding(binding))?;
        if count == 0 || variant.is_empty() {
            return Ok(0);
        }
        let hash = self.hasher.hash(variant)?;
        self.buffers
            .entry(binding)
            .or_insert_with(|| InsertBuffer::new(edge.root))
            .push(hash, variant, count, now);
        Ok(count)
    }

    /// Credit everything buffered by `binding` now. Returns the units
    /// credited.
    pub fn flush_binding(&mut self, binding: BindingId) -> u64 {
        self.flush_buffer(binding, Timestamp::now())
    }

    fn flush_buffer(&mut self, binding: BindingId, now: Timestamp) -> u64 {
        let Some(buffer) = self.buffers.get_mut(&binding) else {
            return 0;
        };
        if buffer.is_empty() {
            return 0;
        }
        let root = buffer.root();
        let drained = buffer.drain();
        let items: Vec<(TemplateHash, &ItemVariant, u64)> =
            drained.iter().map(|p| (p.hash, &p.variant, p.count)).collect();

        let credited = match self.credit(root, &items, now) {
            Ok(credited) => credited,
            Err(e) => {
                warn!(binding = %binding, root = %root, error = %e, "insert buffer kept; root ledger unreadable");
                if let Some(buffer) = self.buffers.get_mut(&binding) {
                    for p in &drained {
                        buffer.push(p.hash, &p.variant, p.count, now);
                    }
                }
                self.release();
                return 0;
            }
        };
        self.persist();
        self.notify(root);
        self.release();
        debug!(binding = %binding, root = %root, templates = items.len(), units = credited, "insert buffer flushed");
        credited
    }

    /// Take up to `max` units for a sharing object's output, from the
    /// binding root's view, at most once per refill interval.
    ///
    /// Returns `None` while throttled.
    pub fn refill(
        &mut self,
        binding: BindingId,
        variant: &ItemVariant,
        max: u64,
        now: Timestamp,
    ) -> EngineResult<Option<ItemStack>> {
        let edge = *self
            .graph
            .edge(&binding)
            .ok_or(MergeError::UnknownBinding(binding))?;
        let interval = self.config.refill_interval();
        let throttle = self
            .throttles
            .entry(binding)
            .or_insert_with(|| RefillThrottle::new(interval));
        if !throttle.try_acquire(now) {
            return Ok(None);
        }
        Ok(Some(self.take_for_owner(edge.root, variant, max)))
    }

    /// Periodic work: flush insert buffers that have waited long enough
    /// and retry any failed writes. Returns the number of buffers flushed.
    pub fn tick(&mut self, now: Timestamp) -> usize {
        let delay = self.config.insert_flush_delay();
        let due: Vec<BindingId> = self
            .buffers
            .iter()
            .filter(|(_, buffer)| buffer.is_due(now, delay))
            .map(|(binding, _)| *binding)
            .collect();
        for binding in &due {
            self.flush_buffer(*binding, now);
        }
        if self.ledgers.dirty_owners().next().is_some() || self.index.is_dirty() {
            self.persist();
            self.release();
        }
        due.len()
    }

    // ---------------------------------------------------------------
    // Presence and sync
    // ---------------------------------------------------------------

    /// Mark `owner` online and make sure they have a sync session.
    ///
    /// An online delegator's ledger joins its root's view, so the rest of
    /// that view is resynced.
    pub fn connect(&mut self, owner: OwnerId) {
        self.online.insert(owner);
        self.sessions.get_or_start_session(owner);
        if self.graph.is_dependent(&owner) {
            let others: Vec<OwnerId> = self
                .plan(owner)
                .members
                .into_iter()
                .filter(|member| *member != owner)
                .collect();
            self.notify_group(others);
            self.release();
        }
        info!(owner = %owner, "owner connected");
    }

    /// Mark `owner` offline, ending their session and writing back their
    /// ledger. A delegator's ledger leaves its root's view, so the rest of
    /// that view is resynced.
    pub fn disconnect(&mut self, owner: OwnerId) {
        let group = if self.graph.is_dependent(&owner) {
            self.plan(owner).members
        } else {
            Vec::new()
        };
        self.online.remove(&owner);
        self.sessions.end_session(&owner);
        if let Err(e) = self.ledgers.flush_owner(&owner) {
            warn!(owner = %owner, error = %e, "ledger save failed; will retry");
        }
        self.notify_group(group);
        self.release();
        info!(owner = %owner, "owner disconnected");
    }

    /// The viewer opens their store: start a fresh session and push a full
    /// snapshot, which also settles any pending changes.
    pub fn open_view(&mut self, viewer: OwnerId) -> SyncPayload {
        self.sessions.set_viewing(viewer, true);
        self.sessions.start_new_session(viewer);
        self.sessions.take_pending(&viewer);
        let payload = self.build_sync_payload(viewer);
        self.deliver(payload.clone());
        payload
    }

    pub fn close_view(&mut self, viewer: OwnerId) {
        self.sessions.set_viewing(viewer, false);
    }

    /// Snapshot `viewer`'s merged view as the next payload of their
    /// session.
    pub fn build_sync_payload(&mut self, viewer: OwnerId) -> SyncPayload {
        let view = self.view(viewer);
        let entries = view
            .entries()
            .filter_map(|entry| match self.index.find(&entry.template) {
                Some(template) => Some(SyncEntry {
                    hash: entry.template,
                    variant: template.sample.clone(),
                    count: entry.count,
                    stored_at: entry.stored_at,
                }),
                None => {
                    warn!(viewer = %viewer, template = %entry.template.short_hex(), "view references unknown template");
                    None
                }
            })
            .collect();

        let session_id = self.sessions.get_or_start_session(viewer).session_id;
        let seq = self.sessions.next_seq(viewer);
        SyncPayload {
            viewer,
            session_id,
            seq,
            entries,
        }
    }

    /// Tell every online member of `actor`'s view that it changed.
    pub(crate) fn notify(&mut self, actor: OwnerId) {
        let online: Vec<OwnerId> = self.plan(actor).online_members(&self.online).collect();
        self.notify_group(online);
    }

    /// Tell each online owner in `group` once that their view changed.
    fn notify_group(&mut self, group: Vec<OwnerId>) {
        let mut seen = BTreeSet::new();
        for member in group {
            if !self.online.contains(&member) || !seen.insert(member) {
                continue;
            }
            if self.sessions.mark_changed(member) == Delivery::Push {
                let payload = self.build_sync_payload(member);
                self.deliver(payload);
            }
        }
    }

    fn deliver(&self, payload: SyncPayload) {
        let viewer = payload.viewer;
        let seq = payload.seq;
        if let Err(e) = self.sink.deliver(payload) {
            warn!(viewer = %viewer, seq, error = %e, "sync delivery failed");
        }
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Write back every dirty ledger and the index, logging failures.
    pub(crate) fn persist(&mut self) {
        self.ledgers.flush();
        if let Err(e) = self.index.save() {
            warn!(error = %e, "template index save failed; will retry");
        }
    }

    /// Drop offline ledgers loaded during the current call.
    pub(crate) fn release(&mut self) {
        self.ledgers.release(&self.online);
    }

    /// Flush every buffer and all pending writes, then drop sessions,
    /// presence, and bindings' runtime state.
    pub fn shutdown(&mut self) -> EngineResult<()> {
        let now = Timestamp::now();
        let bindings: Vec<BindingId> = self.buffers.keys().copied().collect();
        for binding in bindings {
            self.flush_buffer(binding, now);
        }

        let report = self.ledgers.flush();
        let saved = self.index.save();

        self.sessions.clear();
        self.online.clear();
        self.buffers.clear();
        self.throttles.clear();
        self.ledgers.release(&BTreeSet::new());
        info!(written = report.written.len(), failed = report.failed.len(), "rift engine shut down");

        if !report.is_clean() {
            return Err(EngineError::Unsaved {
                owners: report.failed,
            });
        }
        saved?;
        Ok(())
    }
}
