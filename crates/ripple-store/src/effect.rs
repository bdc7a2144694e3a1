//! Effect registry: per-property effect lists indexed by trigger root.
//!
//! Every declared behavior of a store — computed expressions, observers,
//! read-only enforcement — is an [`Effect`] keyed by the root property of
//! its trigger path. The registry keeps one bucket map per effect kind plus
//! a union bucket with every effect for a property.
//!
//! Registries are copy-on-write: [`EffectRegistry::fork`] shares storage
//! with the parent and the first mutation on either side clones the bucket
//! maps (effect records themselves are shared `Arc`s). A store derived from
//! another therefore inherits its effect table without either instance
//! leaking additions into the other.

use crate::expr::Signature;
use crate::path;
use std::collections::HashMap;
use std::sync::Arc;

/// The kind of an effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// Computes a target property from a method expression.
    Compute,
    /// Invokes an observer when the trigger changes.
    Observe,
    /// Marks a property as rejecting public writes.
    ReadOnly,
}

/// The per-kind payload of an effect.
#[derive(Clone, Debug)]
pub enum EffectAction {
    /// Evaluate `signature` and store the result into `target`.
    Compute {
        /// Parsed method expression.
        signature: Signature,
        /// Property receiving the computed result.
        target: String,
    },
    /// Simple property observer: called with `(new, old, path)`.
    ObserveSimple {
        /// Observer method name.
        method: String,
    },
    /// Method observer: called with a marshalled argument vector.
    ObserveMethod {
        /// Parsed method expression.
        signature: Signature,
    },
    /// Read-only marker; carries no behavior.
    ReadOnly,
}

/// An effect: a trigger path plus the action to run when it changes.
///
/// Effects registered from one signature under several trigger roots share
/// an `id`; the pipeline uses the id as its dedupe key so a multi-argument
/// method runs once per pass no matter how many of its inputs changed.
#[derive(Clone, Debug)]
pub struct Effect {
    /// Shared identity for dedupe stamping.
    pub id: usize,
    /// Effect kind (matches the registry bucket it lives in).
    pub kind: EffectKind,
    /// Trigger path, wildcard suffix included.
    pub path: String,
    /// What to do when the trigger fires.
    pub action: EffectAction,
}

#[derive(Clone, Debug, Default)]
struct Buckets {
    any: HashMap<String, Vec<Arc<Effect>>>,
    compute: HashMap<String, Vec<Arc<Effect>>>,
    observe: HashMap<String, Vec<Arc<Effect>>>,
    read_only: HashMap<String, Vec<Arc<Effect>>>,
    next_id: usize,
}

impl Buckets {
    fn for_kind(&self, kind: EffectKind) -> &HashMap<String, Vec<Arc<Effect>>> {
        match kind {
            EffectKind::Compute => &self.compute,
            EffectKind::Observe => &self.observe,
            EffectKind::ReadOnly => &self.read_only,
        }
    }

    fn for_kind_mut(&mut self, kind: EffectKind) -> &mut HashMap<String, Vec<Arc<Effect>>> {
        match kind {
            EffectKind::Compute => &mut self.compute,
            EffectKind::Observe => &mut self.observe,
            EffectKind::ReadOnly => &mut self.read_only,
        }
    }
}

/// Registry of effects for one store (or one family of forked stores).
#[derive(Clone, Debug, Default)]
pub struct EffectRegistry {
    inner: Arc<Buckets>,
}

impl EffectRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Share this registry copy-on-write.
    ///
    /// The fork reads the same buckets until either side mutates; the first
    /// `add_effect` after a fork clones the maps.
    pub fn fork(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Register an effect on a single trigger path.
    pub fn add_effect(&mut self, trigger: &str, kind: EffectKind, action: EffectAction) {
        let inner = Arc::make_mut(&mut self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        Self::insert(inner, id, trigger, kind, action);
    }

    /// Register one effect under several trigger paths.
    ///
    /// All records share an id, so the pipeline dispatches the underlying
    /// method at most once per pass.
    pub fn add_effect_group(&mut self, triggers: &[String], kind: EffectKind, action: EffectAction) {
        let inner = Arc::make_mut(&mut self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        for trigger in triggers {
            Self::insert(inner, id, trigger, kind, action.clone());
        }
    }

    fn insert(inner: &mut Buckets, id: usize, trigger: &str, kind: EffectKind, action: EffectAction) {
        let effect = Arc::new(Effect {
            id,
            kind,
            path: trigger.to_owned(),
            action,
        });
        let root = path::root(path::wildcard_base(trigger)).to_owned();
        inner.any.entry(root.clone()).or_default().push(effect.clone());
        inner.for_kind_mut(kind).entry(root).or_default().push(effect);
    }

    /// Effects of one kind triggered by a root property.
    pub fn effects_for(&self, root: &str, kind: EffectKind) -> &[Arc<Effect>] {
        self.inner
            .for_kind(kind)
            .get(root)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All effects triggered by a root property, regardless of kind.
    pub fn all_for(&self, root: &str) -> &[Arc<Effect>] {
        self.inner.any.get(root).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when the property has any effect.
    #[inline]
    pub fn has_effect(&self, property: &str) -> bool {
        self.inner.any.contains_key(property)
    }

    /// True when the property rejects public writes.
    #[inline]
    pub fn has_read_only(&self, property: &str) -> bool {
        self.inner.read_only.contains_key(property)
    }

    /// True when the property is the target of a computed effect.
    pub fn has_compute(&self, property: &str) -> bool {
        self.inner.compute.values().flatten().any(|fx| {
            matches!(&fx.action, EffectAction::Compute { target, .. } if target == property)
        })
    }

    /// Root properties that carry effects.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.inner.any.keys().map(String::as_str)
    }

    /// Iterate every compute effect in the registry.
    pub(crate) fn compute_effects(&self) -> impl Iterator<Item = (&str, &Arc<Effect>)> {
        self.inner
            .compute
            .iter()
            .flat_map(|(root, list)| list.iter().map(move |fx| (root.as_str(), fx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observe(method: &str) -> EffectAction {
        EffectAction::ObserveSimple {
            method: method.to_owned(),
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let mut reg = EffectRegistry::new();
        reg.add_effect("name", EffectKind::Observe, observe("_nameChanged"));

        assert!(reg.has_effect("name"));
        assert!(!reg.has_effect("other"));
        assert_eq!(reg.effects_for("name", EffectKind::Observe).len(), 1);
        assert_eq!(reg.all_for("name").len(), 1);
        assert!(reg.effects_for("name", EffectKind::Compute).is_empty());
    }

    #[test]
    fn test_wildcard_trigger_indexes_by_root() {
        let mut reg = EffectRegistry::new();
        reg.add_effect("user.*", EffectKind::Observe, observe("_userChanged"));
        assert_eq!(reg.effects_for("user", EffectKind::Observe).len(), 1);
        assert_eq!(reg.all_for("user")[0].path, "user.*");
    }

    #[test]
    fn test_group_shares_id() {
        let mut reg = EffectRegistry::new();
        reg.add_effect_group(
            &["a".to_owned(), "b.c".to_owned()],
            EffectKind::Observe,
            observe("_fn"),
        );
        let a = &reg.effects_for("a", EffectKind::Observe)[0];
        let b = &reg.effects_for("b", EffectKind::Observe)[0];
        assert_eq!(a.id, b.id);
        assert_eq!(b.path, "b.c");
    }

    #[test]
    fn test_fork_is_copy_on_write() {
        let mut parent = EffectRegistry::new();
        parent.add_effect("shared", EffectKind::Observe, observe("_shared"));

        let mut child = parent.fork();
        child.add_effect("extra", EffectKind::Observe, observe("_extra"));

        assert!(child.has_effect("shared"));
        assert!(child.has_effect("extra"));
        assert!(!parent.has_effect("extra"));

        // Mutating the parent after the fork does not leak into the child.
        parent.add_effect("late", EffectKind::Observe, observe("_late"));
        assert!(!child.has_effect("late"));
    }

    #[test]
    fn test_read_only_bucket() {
        let mut reg = EffectRegistry::new();
        reg.add_effect("locked", EffectKind::ReadOnly, EffectAction::ReadOnly);
        assert!(reg.has_read_only("locked"));
        assert!(!reg.has_read_only("open"));
    }
}
