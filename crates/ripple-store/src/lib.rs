//! Reactive observable store over a JSON data tree.
//!
//! `ripple-store` holds a set of named properties, forms a dependency graph
//! among them, and propagates changes through computed properties,
//! observers, and deep-path notifications in a single coordinated batch.
//!
//! # Core Concepts
//!
//! - **Property**: a declared slot with optional computed expression,
//!   observer, read-only flag, and an opaque type marker
//! - **Path**: a dotted string (`tourists.2.name`) addressing into the
//!   nested value tree; a `.*` suffix binds a whole subtree
//! - **Effect**: a registered behavior (compute / observe / read-only)
//!   indexed by the root property of its trigger path
//! - **Flush**: one batched change cycle — computed fixpoint, linked-path
//!   mirroring, client cascade, then observers
//!
//! # Quick Start
//!
//! ```
//! use ripple_store::{PropertyConfig, Store};
//! use serde_json::json;
//! use std::sync::{Arc, Mutex};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let log = seen.clone();
//!
//! let mut store = Store::builder()
//!     .property("firstName", PropertyConfig::new().ty("String"))
//!     .property("lastName", PropertyConfig::new().ty("String"))
//!     .property(
//!         "fullName",
//!         PropertyConfig::new()
//!             .computed("_computeFullName(firstName, lastName)")
//!             .observer("_fullNameChanged"),
//!     )
//!     .method("_computeFullName", |_, args| {
//!         match (args[0].as_str(), args[1].as_str()) {
//!             (Some(first), Some(last)) => Some(json!(format!("{first} {last}"))),
//!             _ => None,
//!         }
//!     })
//!     .method("_fullNameChanged", move |_, args| {
//!         log.lock().unwrap().push(args[0].clone());
//!         None
//!     })
//!     .build()?;
//! store.ready()?;
//!
//! store.set("firstName", json!("Ada"))?;
//! store.set("lastName", json!("Lovelace"))?;
//!
//! assert_eq!(store.get("fullName"), Some(&json!("Ada Lovelace")));
//! assert_eq!(*seen.lock().unwrap(), [json!("Ada Lovelace")]);
//! # Ok::<(), ripple_store::StoreError>(())
//! ```
//!
//! # Change Cycle
//!
//! Writes accumulate in a pending buffer and are driven to a steady state
//! by one flush: computed effects re-run to a fixpoint, linked paths
//! mirror, enqueued clients cascade, and observers fire last with the
//! old values captured at the start of the cycle. Writes made *inside* an
//! observer fold into the in-flight cycle instead of starting a new one.
//!
//! Before [`Store::ready`] every write is buffered; afterwards each public
//! mutator flushes synchronously unless deferred mode is selected with
//! [`Store::set_async_effects`].

mod changes;
mod client;
mod config;
mod effect;
mod error;
mod expr;
mod pipeline;
mod splice;
mod store;

pub mod path;

pub use client::{ClientHandle, StoreClient};
pub use config::{PropertyConfig, StoreBuilder};
pub use effect::{Effect, EffectAction, EffectKind, EffectRegistry};
pub use error::{StoreError, StoreResult};
pub use expr::{parse as parse_expression, ArgDesc, Signature};
pub use splice::Splice;
pub use store::{Method, Store};

// Re-export serde_json::Value for convenience
pub use serde_json::Value;
