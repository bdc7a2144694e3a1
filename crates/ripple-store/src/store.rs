//! The store: property state, accessor layer, and public façade.
//!
//! A `Store` holds a flat table mapping normalized paths to values. Root
//! keys hold whole subtrees; deep-path keys are notification caches written
//! as changes flow through the pending buffer. Reads walk the tree from the
//! root key, so stale caches never shadow live data.
//!
//! All public writes funnel through the pending buffer: a write that passes
//! change detection updates the data table, records the first-seen old
//! value for the cycle, and schedules a flush. Writes to read-only roots
//! are dropped silently; [`Store::set_read_only`] is the owner-side setter
//! for them.

use crate::changes::ChangeMap;
use crate::client::ClientHandle;
use crate::config::StoreBuilder;
use crate::effect::EffectRegistry;
use crate::error::StoreResult;
use crate::path;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A store method: computed function or observer.
///
/// Methods receive the store itself so observers can write back into it;
/// computed methods return `Some(value)` (`None` meaning the result is
/// undefined), observers return `None`.
pub type Method = Arc<dyn Fn(&mut Store, &[Value]) -> Option<Value> + Send + Sync>;

/// Reactive observable store over a JSON data tree.
pub struct Store {
    pub(crate) data: HashMap<String, Value>,
    pub(crate) pending: Option<ChangeMap>,
    pub(crate) old: Option<ChangeMap>,
    pub(crate) registry: EffectRegistry,
    pub(crate) methods: HashMap<String, Method>,
    pub(crate) types: HashMap<String, String>,
    pub(crate) linked_paths: HashMap<String, String>,
    pub(crate) pending_clients: Vec<ClientHandle>,
    pub(crate) invalid: bool,
    pub(crate) initialized: bool,
    pub(crate) from_above: bool,
    pub(crate) async_effects: bool,
    pub(crate) run_id: u64,
    pub(crate) in_flight: bool,
    pub(crate) interim: Option<ChangeMap>,
    pub(crate) interim_old: Option<ChangeMap>,
    pub(crate) stamps: HashMap<usize, u64>,
}

impl Store {
    /// Start building a store from a property configuration.
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub(crate) fn from_parts(
        registry: EffectRegistry,
        methods: HashMap<String, Method>,
        types: HashMap<String, String>,
        pending_clients: Vec<ClientHandle>,
        async_effects: bool,
    ) -> Self {
        Self {
            data: HashMap::new(),
            pending: None,
            old: None,
            registry,
            methods,
            types,
            linked_paths: HashMap::new(),
            pending_clients,
            invalid: false,
            initialized: false,
            from_above: false,
            async_effects,
            run_id: 0,
            in_flight: false,
            interim: None,
            interim_old: None,
            stamps: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read a value by path; `None` on any missing segment.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path::is_deep(path) {
            let root = path::root(path);
            let rest = &path[root.len() + 1..];
            path::get_in(self.data.get(root)?, rest)
        } else {
            self.data.get(path)
        }
    }

    /// Read a value from an explicit tree instead of the store's own data.
    pub fn get_in<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
        path::get_in(root, path)
    }

    /// The raw data table, deep-path notification caches included.
    pub fn raw(&self) -> &HashMap<String, Value> {
        &self.data
    }

    /// The declared type marker of a property, if any.
    pub fn type_of(&self, property: &str) -> Option<&str> {
        self.types.get(property).map(String::as_str)
    }

    /// True after [`Store::ready`] has completed.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True while a downward-propagation flush is in progress.
    #[inline]
    pub fn is_from_above(&self) -> bool {
        self.from_above
    }

    /// The effect registry backing this store.
    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write a value by path.
    ///
    /// A no-op when the root property is read-only or an intermediate
    /// segment is missing.
    pub fn set(&mut self, path: &str, value: Value) -> StoreResult<()> {
        if self.registry.has_read_only(path::root(path)) {
            return Ok(());
        }
        self.set_unchecked(path, value)
    }

    /// Owner-side setter for read-only properties.
    pub fn set_read_only(&mut self, path: &str, value: Value) -> StoreResult<()> {
        self.set_unchecked(path, value)
    }

    /// Bare tree write into an explicit root with no notification.
    pub fn set_in(root: &mut Value, path: &str, value: Value) -> Option<String> {
        path::set_in(root, path, value)
    }

    /// Batch write; runs a single flush after all entries are enqueued.
    ///
    /// Read-only roots are skipped.
    pub fn set_properties<I, K>(&mut self, props: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut dirty = false;
        for (key, value) in props {
            let key = key.as_ref();
            if self.registry.has_read_only(path::root(key)) {
                continue;
            }
            if let Some(p) = self.set_path_or_unmanaged(key, &value) {
                dirty |= self.set_pending(&p, Some(value));
            }
        }
        if dirty {
            self.schedule_flush()?;
        }
        Ok(())
    }

    /// Force a notification for an externally mutated leaf.
    ///
    /// When `value` is omitted the current value is read and notified.
    pub fn notify_path(&mut self, path: &str, value: Option<Value>) -> StoreResult<()> {
        let value = value.or_else(|| self.get(path).cloned());
        if self.set_pending(path, value) {
            self.schedule_flush()?;
        }
        Ok(())
    }

    /// Keep `to` and `from` (and their subtrees) mirrored inside the
    /// change cycle.
    pub fn link_paths(&mut self, to: &str, from: &str) {
        self.linked_paths.insert(to.to_owned(), from.to_owned());
    }

    /// Delete a path alias installed by [`Store::link_paths`].
    pub fn unlink_paths(&mut self, to: &str) {
        self.linked_paths.remove(to);
    }

    /// Mark the store initialized and run the first flush if writes were
    /// buffered before this call.
    pub fn ready(&mut self) -> StoreResult<()> {
        self.initialized = true;
        if self.pending.is_some() {
            self.flush_properties(false)?;
        } else {
            self.invalid = false;
        }
        Ok(())
    }

    /// Run a change cycle now.
    ///
    /// Needed in deferred mode ([`Store::set_async_effects`]); in the
    /// default synchronous mode every public mutator flushes on its own.
    pub fn flush(&mut self) -> StoreResult<()> {
        self.flush_properties(false)
    }

    /// Switch between deferred (`true`) and synchronous (`false`) flushing.
    pub fn set_async_effects(&mut self, async_effects: bool) {
        self.async_effects = async_effects;
    }

    /// Enqueue a client for the next cascade stage.
    pub fn enqueue_client(&mut self, client: ClientHandle) {
        self.pending_clients.push(client);
    }

    // ------------------------------------------------------------------
    // Pending buffer
    // ------------------------------------------------------------------

    fn set_unchecked(&mut self, path: &str, value: Value) -> StoreResult<()> {
        if let Some(p) = self.set_path_or_unmanaged(path, &value) {
            if self.set_pending(&p, Some(value)) {
                self.schedule_flush()?;
            }
        }
        Ok(())
    }

    /// Route a write to the data tree, the pending buffer, or both.
    ///
    /// Unmanaged paths (no effect on the root) are written straight into
    /// the tree. Managed paths return the normalized path so the caller
    /// funnels them through [`Store::set_pending`]; deep managed paths are
    /// written to the tree as well. A missing intermediate makes the whole
    /// write a no-op.
    pub(crate) fn set_path_or_unmanaged(&mut self, path: &str, value: &Value) -> Option<String> {
        let root = path::root(path).to_owned();
        let managed = self.registry.has_effect(&root);
        let mut routed = Some(path.to_owned());
        if !managed || path::is_deep(path) {
            routed = if path::is_deep(path) {
                let rest = &path[root.len() + 1..];
                self.data
                    .get_mut(&root)
                    .and_then(|tree| path::set_in(tree, rest, value.clone()))
                    .map(|_| path.to_owned())
            } else {
                self.data.insert(path.to_owned(), value.clone());
                Some(path.to_owned())
            };
        }
        if managed {
            routed
        } else {
            None
        }
    }

    /// Record a proposed change; returns true when it passed change
    /// detection and was enqueued.
    pub(crate) fn set_pending(&mut self, path: &str, value: Option<Value>) -> bool {
        let old = self.data.get(path).cloned();
        if !should_change(value.as_ref(), old.as_ref()) {
            return false;
        }
        // A fresh container at a root orphans cached deep-path entries
        // below it; drop them so they cannot shadow the new subtree.
        if !path::is_deep(path) {
            if let Some(v) = &value {
                if v.is_object() || v.is_array() {
                    self.data
                        .retain(|k, _| k == path || !path::is_descendant(path, k));
                }
            }
        }
        match &value {
            Some(v) => {
                self.data.insert(path.to_owned(), v.clone());
            }
            None => {
                self.data.remove(path);
            }
        }
        self.old
            .get_or_insert_with(ChangeMap::new)
            .insert_if_absent(path, old);
        self.pending
            .get_or_insert_with(ChangeMap::new)
            .insert(path, value);
        true
    }

    /// Mark a flush due and, in synchronous mode, run it now.
    ///
    /// While a cycle is already in flight the pending writes are left for
    /// that cycle to fold in; a change made inside an observer never
    /// starts a second cycle.
    pub(crate) fn schedule_flush(&mut self) -> StoreResult<()> {
        self.invalid = true;
        if self.initialized && !self.async_effects && !self.in_flight {
            self.flush_properties(false)?;
        }
        Ok(())
    }

    pub(crate) fn method(&self, name: &str) -> Option<Method> {
        self.methods.get(name).cloned()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("data", &self.data)
            .field("initialized", &self.initialized)
            .field("invalid", &self.invalid)
            .field("linked_paths", &self.linked_paths)
            .finish()
    }
}

/// Decide whether a proposed value counts as a change.
///
/// Containers always change (identity is ignored); primitives change when
/// unequal, except that NaN-to-NaN is never a change.
pub(crate) fn should_change(new: Option<&Value>, old: Option<&Value>) -> bool {
    if let Some(v) = new {
        if v.is_object() || v.is_array() {
            return true;
        }
    }
    if new == old {
        return false;
    }
    if let (Some(a), Some(b)) = (new, old) {
        if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
            if x.is_nan() && y.is_nan() {
                return false;
            }
        }
    }
    true
}
