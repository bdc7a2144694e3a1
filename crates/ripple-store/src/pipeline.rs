//! The batched change cycle.
//!
//! [`Store::flush_properties`] transforms the pending change set into a
//! fully propagated steady state:
//!
//! 1. **Compute fixpoint** — computed effects re-run until no new pending
//!    writes appear (bounded; non-convergence is a `ComputedCycle` error).
//! 2. **Linked-path mirror** — changes under one side of an alias are
//!    written through to the other side.
//! 3. **Fold** — the settled change set merges into the in-flight interim
//!    buffers and the run counter advances.
//! 4. **Client cascade** — enqueued clients flush with `from_above = true`.
//! 5. **Observers** — simple observers fire per concrete changed path;
//!    method observers fire once per pass with marshalled arguments.
//! 6. **Reset** — buffers clear and the store returns to its resting state.
//!
//! Reentrancy is a state-machine invariant, not call-stack trickery: a
//! flush entered while another is in flight runs stages 1-3 only, merging
//! its results into the interim buffers, and returns. The outermost frame
//! drains the buffers in a loop, so writes made inside an observer are
//! observed before the mutator that started the cycle returns, without
//! starting a second cycle.

use crate::changes::ChangeMap;
use crate::effect::{Effect, EffectAction, EffectKind};
use crate::error::{StoreError, StoreResult};
use crate::expr::Signature;
use crate::path;
use crate::store::Store;
use serde_json::{json, Value};
use std::sync::Arc;

/// Upper bound on compute passes within one cycle.
pub(crate) const MAX_COMPUTE_PASSES: usize = 100;

impl Store {
    /// Run one change cycle.
    ///
    /// Called by every public mutator in synchronous mode and by
    /// [`Store::ready`] / [`Store::flush`] otherwise. An uninitialized
    /// store is initialized first.
    pub(crate) fn flush_properties(&mut self, from_above: bool) -> StoreResult<()> {
        if !self.initialized {
            return self.ready();
        }
        let outermost = !self.in_flight;
        self.in_flight = true;
        let prev_from_above = self.from_above;
        self.from_above = from_above;
        let result = self.flush_frame(outermost);
        self.from_above = prev_from_above;
        if outermost {
            self.in_flight = false;
        }
        result
    }

    fn flush_frame(&mut self, outermost: bool) -> StoreResult<()> {
        self.fold_pending()?;
        if !outermost {
            // Inner frames merge into the in-flight buffers and return;
            // the outermost frame commits.
            return Ok(());
        }
        loop {
            // Writes that arrived during the previous observer round
            // (reentrant mutations) fold into this same cycle.
            self.fold_pending()?;
            if self.interim.is_none() && self.pending_clients.is_empty() {
                break;
            }
            let changed = self.interim.take().unwrap_or_default();
            let old = self.interim_old.take().unwrap_or_default();
            tracing::debug!(paths = changed.len(), "change cycle settled");
            self.flush_clients();
            self.run_observers(&changed, &old)?;
        }
        self.invalid = false;
        Ok(())
    }

    /// Stages 1-3: drive pending to a fixpoint, mirror aliases, and fold
    /// the result into the interim buffers.
    fn fold_pending(&mut self) -> StoreResult<()> {
        let Some(mut changed) = self.pending.take() else {
            return Ok(());
        };
        let mut old = self.old.take().unwrap_or_default();
        self.run_compute_fixpoint(&mut changed, &mut old)?;
        self.mirror_linked_paths(&mut changed);
        self.run_id += 1;
        let interim = self.interim.get_or_insert_with(ChangeMap::new);
        for (k, v) in changed.iter() {
            interim.insert(k, v.clone());
        }
        let interim_old = self.interim_old.get_or_insert_with(ChangeMap::new);
        for (k, v) in old.iter() {
            interim_old.insert_if_absent(k, v.clone());
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stage 1: compute fixpoint
    // ------------------------------------------------------------------

    fn run_compute_fixpoint(
        &mut self,
        changed: &mut ChangeMap,
        old: &mut ChangeMap,
    ) -> StoreResult<()> {
        let mut input: Vec<String> = changed.keys().map(str::to_owned).collect();
        let mut passes = 0usize;
        loop {
            let stamp = self.next_run_id();
            for trigger in &input {
                let root = path::root(trigger).to_owned();
                let effects = self
                    .registry
                    .effects_for(&root, EffectKind::Compute)
                    .to_vec();
                for fx in effects {
                    if self.already_ran(fx.id, stamp) || !path::matches(&fx.path, trigger) {
                        continue;
                    }
                    self.mark_ran(fx.id, stamp);
                    self.run_compute_effect(&fx, trigger)?;
                }
            }
            // Computations that passed change detection refilled `pending`;
            // their outputs are the next pass's inputs.
            match self.pending.take() {
                None => break,
                Some(fresh) => {
                    passes += 1;
                    if passes >= MAX_COMPUTE_PASSES {
                        return Err(StoreError::computed_cycle(format!(
                            "no fixpoint after {MAX_COMPUTE_PASSES} passes"
                        )));
                    }
                    let fresh_old = self.old.take().unwrap_or_default();
                    input.clear();
                    for (k, v) in fresh.iter() {
                        if let Some(o) = fresh_old.get(k) {
                            old.insert_if_absent(k, o.clone());
                        }
                        changed.insert(k, v.clone());
                        input.push(k.to_owned());
                    }
                }
            }
        }
        Ok(())
    }

    fn run_compute_effect(&mut self, fx: &Arc<Effect>, trigger: &str) -> StoreResult<()> {
        let EffectAction::Compute { signature, target } = &fx.action else {
            return Ok(());
        };
        let Some(method) = self.method(&signature.method_name) else {
            self.warn_missing(&signature.method_name, "computed");
            return Ok(());
        };
        let target = target.clone();
        let args = self.marshal_args(signature, trigger);
        let result = method(self, &args);
        self.set_property_from_computation(&target, result);
        Ok(())
    }

    /// Route a computation result: managed targets go through the pending
    /// buffer (and are picked up by the next pass), unmanaged targets are
    /// assigned directly.
    fn set_property_from_computation(&mut self, target: &str, result: Option<Value>) {
        if self.registry.has_effect(path::root(target)) {
            self.set_pending(target, result);
        } else {
            match result {
                Some(v) => {
                    self.data.insert(target.to_owned(), v);
                }
                None => {
                    self.data.remove(target);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Stage 2: linked-path mirror
    // ------------------------------------------------------------------

    fn mirror_linked_paths(&mut self, changed: &mut ChangeMap) {
        if self.linked_paths.is_empty() {
            return;
        }
        let links: Vec<(String, String)> = self
            .linked_paths
            .iter()
            .map(|(to, from)| (to.clone(), from.clone()))
            .collect();
        let snapshot: Vec<String> = changed.keys().map(str::to_owned).collect();
        for p in snapshot {
            let value: Option<Value> = changed.get(&p).cloned().flatten();
            for (to, from) in &links {
                if path::is_descendant(to, &p) {
                    let q = path::translate(to, from, &p);
                    if q != p {
                        self.write_mirrored(&q, value.as_ref());
                        changed.insert(&q, value.clone());
                    }
                }
                if path::is_descendant(from, &p) {
                    let q = path::translate(from, to, &p);
                    if q != p {
                        self.write_mirrored(&q, value.as_ref());
                        changed.insert(&q, value.clone());
                    }
                }
            }
        }
    }

    /// Write a mirrored value through to the tree and the flat table.
    fn write_mirrored(&mut self, q: &str, value: Option<&Value>) {
        if path::is_deep(q) {
            let root = path::root(q).to_owned();
            let rest = &q[root.len() + 1..];
            if let (Some(tree), Some(v)) = (self.data.get_mut(&root), value) {
                let _ = path::set_in(tree, rest, v.clone());
            }
        }
        match value {
            Some(v) => {
                self.data.insert(q.to_owned(), v.clone());
            }
            None => {
                self.data.remove(q);
            }
        }
    }

    // ------------------------------------------------------------------
    // Stage 4: client cascade
    // ------------------------------------------------------------------

    fn flush_clients(&mut self) {
        let clients = std::mem::take(&mut self.pending_clients);
        for client in clients {
            if let Ok(mut client) = client.lock() {
                client.flush_properties(true);
            }
        }
    }

    // ------------------------------------------------------------------
    // Stage 5: observers
    // ------------------------------------------------------------------

    fn run_observers(&mut self, changed: &ChangeMap, old: &ChangeMap) -> StoreResult<()> {
        if changed.is_empty() {
            return Ok(());
        }
        let stamp = self.next_run_id();
        let entries: Vec<(String, Option<Value>)> = changed
            .iter()
            .map(|(k, v)| (k.to_owned(), v.clone()))
            .collect();
        for (p, new_value) in entries {
            let root = path::root(&p).to_owned();
            let effects = self
                .registry
                .effects_for(&root, EffectKind::Observe)
                .to_vec();
            for fx in effects {
                match &fx.action {
                    EffectAction::ObserveSimple { method } => {
                        // Simple property observers follow the property's
                        // whole subtree and receive the concrete path.
                        if !path::is_descendant(path::wildcard_base(&fx.path), &p) {
                            continue;
                        }
                        let Some(f) = self.method(method) else {
                            self.warn_missing(method, "observer");
                            continue;
                        };
                        let old_value = old.get(&p).cloned().flatten();
                        let args = [
                            new_value.clone().unwrap_or(Value::Null),
                            old_value.unwrap_or(Value::Null),
                            Value::String(p.clone()),
                        ];
                        f(self, &args);
                    }
                    EffectAction::ObserveMethod { signature } => {
                        if self.already_ran(fx.id, stamp) || !path::matches(&fx.path, &p) {
                            continue;
                        }
                        self.mark_ran(fx.id, stamp);
                        let Some(f) = self.method(&signature.method_name) else {
                            self.warn_missing(&signature.method_name, "observer");
                            continue;
                        };
                        let args = self.marshal_args(signature, &p);
                        f(self, &args);
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Argument marshalling
    // ------------------------------------------------------------------

    /// Build the call vector for a method signature.
    ///
    /// Literals pass through; path arguments read live data; wildcard
    /// arguments deliver `{path, value, base}` bound to the concrete
    /// changed path when it falls inside the wildcard's subtree.
    pub(crate) fn marshal_args(&self, signature: &Signature, trigger: &str) -> Vec<Value> {
        signature
            .args
            .iter()
            .map(|arg| {
                if let Some(lit) = &arg.literal {
                    return lit.clone();
                }
                if arg.wildcard {
                    let within = path::is_descendant(&arg.name, trigger);
                    let concrete = if within { trigger } else { arg.name.as_str() };
                    let base = self.get(&arg.name).cloned().unwrap_or(Value::Null);
                    let value = if within {
                        self.get(concrete).cloned().unwrap_or(Value::Null)
                    } else {
                        base.clone()
                    };
                    json!({ "path": concrete, "value": value, "base": base })
                } else {
                    self.get(&arg.name).cloned().unwrap_or(Value::Null)
                }
            })
            .collect()
    }

    fn warn_missing(&self, method: &str, role: &str) {
        // A method name that is also a declared property is late-bound;
        // no warning for those.
        if !self.registry.has_effect(method) {
            tracing::warn!(method, role, "method not defined; effect skipped");
        }
    }

    fn next_run_id(&mut self) -> u64 {
        self.run_id += 1;
        self.run_id
    }

    fn already_ran(&self, id: usize, stamp: u64) -> bool {
        self.stamps.get(&id) == Some(&stamp)
    }

    fn mark_ran(&mut self, id: usize, stamp: u64) {
        self.stamps.insert(id, stamp);
    }
}
