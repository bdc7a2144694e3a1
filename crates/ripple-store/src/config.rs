//! Store configuration and construction.
//!
//! Properties are declared up front; `build()` turns the declarations into
//! registered effects, validates every method expression, and rejects
//! statically cyclic computed configurations.

use crate::client::ClientHandle;
use crate::effect::{EffectAction, EffectKind, EffectRegistry};
use crate::error::{StoreError, StoreResult};
use crate::expr::{self, Signature};
use crate::store::{Method, Store};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Declared semantics of one property.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyConfig {
    /// Opaque type marker, carried verbatim for external consumers.
    #[serde(rename = "type")]
    pub ty: Option<String>,
    /// Reject public writes; only the internal setter is accepted.
    pub read_only: bool,
    /// Computed expression; implies `read_only`.
    pub computed: Option<String>,
    /// Method invoked with `(new, old, path)` on every change under the
    /// property.
    pub observer: Option<String>,
}

impl PropertyConfig {
    /// A plain property with no declared semantics.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the type marker.
    pub fn ty(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    /// Mark the property read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Derive the property from a method expression.
    pub fn computed(mut self, expression: impl Into<String>) -> Self {
        self.computed = Some(expression.into());
        self
    }

    /// Observe the property with a named method.
    pub fn observer(mut self, method: impl Into<String>) -> Self {
        self.observer = Some(method.into());
        self
    }
}

/// Builder collecting property declarations, methods, and observers.
///
/// Declaration order is significant: effects register in the order
/// properties were added, and observers fire in registration order.
#[derive(Default)]
pub struct StoreBuilder {
    properties: Vec<(String, PropertyConfig)>,
    methods: HashMap<String, Method>,
    observers: Vec<String>,
    registry: EffectRegistry,
    clients: Vec<ClientHandle>,
    async_effects: bool,
}

impl StoreBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a property.
    pub fn property(mut self, name: impl Into<String>, config: PropertyConfig) -> Self {
        self.properties.push((name.into(), config));
        self
    }

    /// Register a method resolvable by computed expressions and observers.
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Store, &[Value]) -> Option<Value> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
        self
    }

    /// Register a method observer expression such as `_fn(a.b.*, c)`.
    pub fn observer_expression(mut self, expression: impl Into<String>) -> Self {
        self.observers.push(expression.into());
        self
    }

    /// Start from an inherited registry (copy-on-write; see
    /// [`EffectRegistry::fork`]).
    pub fn registry(mut self, registry: EffectRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Enqueue a downstream client from the start.
    pub fn client(mut self, client: ClientHandle) -> Self {
        self.clients.push(client);
        self
    }

    /// Start in deferred mode (mutators accumulate; `flush()` drains).
    pub fn async_effects(mut self, async_effects: bool) -> Self {
        self.async_effects = async_effects;
        self
    }

    /// Validate the configuration and construct the store.
    pub fn build(self) -> StoreResult<Store> {
        let mut registry = self.registry;
        let mut types = HashMap::new();

        for (name, config) in &self.properties {
            if let Some(ty) = &config.ty {
                types.insert(name.clone(), ty.clone());
            }
            let read_only = config.read_only || config.computed.is_some();
            if let Some(expression) = &config.computed {
                if !registry.has_compute(name) {
                    register_compute(&mut registry, name, expr::parse(expression)?);
                }
            }
            if read_only && !registry.has_read_only(name) {
                registry.add_effect(name, EffectKind::ReadOnly, EffectAction::ReadOnly);
            }
            if let Some(method) = &config.observer {
                registry.add_effect(
                    name,
                    EffectKind::Observe,
                    EffectAction::ObserveSimple {
                        method: method.clone(),
                    },
                );
            }
        }

        for expression in &self.observers {
            register_method_observer(&mut registry, expr::parse(expression)?);
        }

        detect_computed_cycles(&registry)?;

        Ok(Store::from_parts(
            registry,
            self.methods,
            types,
            self.clients,
            self.async_effects,
        ))
    }
}

/// Register a computed effect on every dependency root and on the method
/// name itself (late-bound methods re-run when the property of the same
/// name changes).
fn register_compute(registry: &mut EffectRegistry, target: &str, signature: Signature) {
    let mut triggers: Vec<String> = signature
        .dependencies()
        .filter_map(|arg| arg.trigger_path())
        .collect();
    triggers.push(signature.method_name.clone());
    registry.add_effect_group(
        &triggers,
        EffectKind::Compute,
        EffectAction::Compute {
            signature,
            target: target.to_owned(),
        },
    );
}

fn register_method_observer(registry: &mut EffectRegistry, signature: Signature) {
    let triggers: Vec<String> = signature
        .dependencies()
        .filter_map(|arg| arg.trigger_path())
        .collect();
    if triggers.is_empty() {
        tracing::warn!(
            method = %signature.method_name,
            "observer expression has no dependencies; skipped"
        );
        return;
    }
    registry.add_effect_group(
        &triggers,
        EffectKind::Observe,
        EffectAction::ObserveMethod { signature },
    );
}

/// Reject configurations whose computed dependency graph is cyclic.
fn detect_computed_cycles(registry: &EffectRegistry) -> StoreResult<()> {
    let mut deps: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (root, fx) in registry.compute_effects() {
        if let EffectAction::Compute { signature, target } = &fx.action {
            if root == signature.method_name {
                continue;
            }
            deps.entry(target.as_str()).or_default().insert(root);
        }
    }

    fn visit<'a>(
        node: &'a str,
        deps: &HashMap<&'a str, HashSet<&'a str>>,
        visiting: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Option<&'a str> {
        if done.contains(node) {
            return None;
        }
        if !visiting.insert(node) {
            return Some(node);
        }
        if let Some(nexts) = deps.get(node) {
            for next in nexts {
                if let Some(cycle) = visit(next, deps, visiting, done) {
                    return Some(cycle);
                }
            }
        }
        visiting.remove(node);
        done.insert(node);
        None
    }

    let mut visiting = HashSet::new();
    let mut done = HashSet::new();
    for target in deps.keys() {
        if let Some(node) = visit(target, &deps, &mut visiting, &mut done) {
            return Err(StoreError::computed_cycle(format!(
                "dependency cycle involving '{node}'"
            )));
        }
    }
    Ok(())
}
