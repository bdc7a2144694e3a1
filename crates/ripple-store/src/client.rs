//! Downstream client cascade.
//!
//! A store can carry a set of clients awaiting a cascaded flush: once its
//! own change cycle reaches a steady state (computed fixpoint and linked
//! paths settled), enqueued clients are drained with `from_above = true`
//! before observers run. This is the injection point for child-component
//! wiring; the crate ships only the trait and the plumbing.

use std::sync::{Arc, Mutex};

/// A downstream consumer that can flush its own pending state.
pub trait StoreClient: Send {
    /// Run the client's change cycle.
    ///
    /// `from_above` is true when the flush cascades down from a parent
    /// store, which suppresses notifications back up to it.
    fn flush_properties(&mut self, from_above: bool);
}

/// Shared handle to an enqueued client.
pub type ClientHandle = Arc<Mutex<dyn StoreClient>>;
