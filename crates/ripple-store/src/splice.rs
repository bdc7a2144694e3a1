//! Array mutators and splice notification.
//!
//! Each mutator resolves its target array through the path engine, performs
//! the mutation in place, and — when the operation changed length or moved
//! elements — emits a single splice record through the normal pending/flush
//! path as `<path>.splices`, followed by `<path>.length`.

use crate::error::StoreResult;
use crate::path;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A record of one contiguous array mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Splice {
    /// Position the mutation applied at.
    pub index: usize,
    /// Number of elements inserted at `index`.
    pub added_count: usize,
    /// Elements removed at `index`, in order.
    pub removed: Vec<Value>,
    /// The array after the mutation.
    pub object: Vec<Value>,
    /// Always `"splice"`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Splice {
    /// Create a splice record.
    pub fn new(index: usize, added_count: usize, removed: Vec<Value>, object: Vec<Value>) -> Self {
        Self {
            index,
            added_count,
            removed,
            object,
            kind: "splice".to_owned(),
        }
    }
}

impl Store {
    /// Append items to the array at `path`; returns the new length.
    ///
    /// A no-op returning `None` when the path does not resolve to an array.
    pub fn push<I>(&mut self, path: &str, items: I) -> StoreResult<Option<usize>>
    where
        I: IntoIterator<Item = Value>,
    {
        let (splice, len) = {
            let Some(arr) = self.array_mut(path) else {
                return Ok(None);
            };
            let index = arr.len();
            let mut added = 0usize;
            for item in items {
                arr.push(item);
                added += 1;
            }
            let len = arr.len();
            if added == 0 {
                return Ok(Some(len));
            }
            (Splice::new(index, added, Vec::new(), arr.clone()), len)
        };
        self.enqueue_splices(path, vec![splice], len)?;
        Ok(Some(len))
    }

    /// Remove and return the last element of the array at `path`.
    pub fn pop(&mut self, path: &str) -> StoreResult<Option<Value>> {
        let (removed, splice, len) = {
            let Some(arr) = self.array_mut(path) else {
                return Ok(None);
            };
            let Some(removed) = arr.pop() else {
                return Ok(None);
            };
            let len = arr.len();
            (
                removed.clone(),
                Splice::new(len, 0, vec![removed], arr.clone()),
                len,
            )
        };
        self.enqueue_splices(path, vec![splice], len)?;
        Ok(Some(removed))
    }

    /// Remove and return the first element of the array at `path`.
    pub fn shift(&mut self, path: &str) -> StoreResult<Option<Value>> {
        let (removed, splice, len) = {
            let Some(arr) = self.array_mut(path) else {
                return Ok(None);
            };
            if arr.is_empty() {
                return Ok(None);
            }
            let removed = arr.remove(0);
            let len = arr.len();
            (
                removed.clone(),
                Splice::new(0, 0, vec![removed], arr.clone()),
                len,
            )
        };
        self.enqueue_splices(path, vec![splice], len)?;
        Ok(Some(removed))
    }

    /// Prepend items to the array at `path`; returns the new length.
    pub fn unshift<I>(&mut self, path: &str, items: I) -> StoreResult<Option<usize>>
    where
        I: IntoIterator<Item = Value>,
    {
        let (splice, len) = {
            let Some(arr) = self.array_mut(path) else {
                return Ok(None);
            };
            let mut added = 0usize;
            for item in items {
                arr.insert(added, item);
                added += 1;
            }
            let len = arr.len();
            if added == 0 {
                return Ok(Some(len));
            }
            (Splice::new(0, added, Vec::new(), arr.clone()), len)
        };
        self.enqueue_splices(path, vec![splice], len)?;
        Ok(Some(len))
    }

    /// Remove `delete_count` elements at `start` and insert `items` there;
    /// returns the removed elements.
    ///
    /// Negative starts count back from the end (clamped to 0); oversized
    /// starts clamp to the array length.
    pub fn splice(
        &mut self,
        path: &str,
        start: isize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> StoreResult<Option<Vec<Value>>> {
        let (removed, splice, len) = {
            let Some(arr) = self.array_mut(path) else {
                return Ok(None);
            };
            let start = normalize_start(start, arr.len());
            let delete_count = delete_count.min(arr.len() - start);
            let added = items.len();
            let removed: Vec<Value> = arr.splice(start..start + delete_count, items).collect();
            if removed.is_empty() && added == 0 {
                return Ok(Some(removed));
            }
            let len = arr.len();
            (
                removed.clone(),
                Splice::new(start, added, removed, arr.clone()),
                len,
            )
        };
        self.enqueue_splices(path, vec![splice], len)?;
        Ok(Some(removed))
    }

    /// Remove the first element equal to `value`; returns it when found.
    pub fn splice_by_value(&mut self, path: &str, value: &Value) -> StoreResult<Option<Value>> {
        let position = self
            .get(path)
            .and_then(Value::as_array)
            .and_then(|arr| arr.iter().position(|v| v == value));
        match position {
            Some(i) => {
                let removed = self.splice(path, i as isize, 1, Vec::new())?;
                Ok(removed.and_then(|mut r| (!r.is_empty()).then(|| r.remove(0))))
            }
            None => Ok(None),
        }
    }

    /// Re-emit splice records for an already-mutated array.
    ///
    /// Enqueues `<path>.splices` and `<path>.length`; a no-op when the path
    /// does not resolve to an array.
    pub fn notify_splices(&mut self, path: &str, splices: Vec<Splice>) -> StoreResult<()> {
        let Some(len) = self.get(path).and_then(Value::as_array).map(Vec::len) else {
            return Ok(());
        };
        self.enqueue_splices(path, splices, len)
    }

    fn enqueue_splices(&mut self, path: &str, splices: Vec<Splice>, len: usize) -> StoreResult<()> {
        let splices_path = format!("{path}.splices");
        let length_path = format!("{path}.length");
        self.set_pending(&splices_path, Some(json!({ "indexSplices": splices })));
        self.set_pending(&length_path, Some(json!(len)));
        // The payload is released as soon as it is enqueued: both the data
        // entry and the pending record drop it so large removed slices do
        // not outlive the notification.
        if let Some(entry) = self.data.get_mut(&splices_path) {
            entry["indexSplices"] = Value::Null;
        }
        if let Some(pending) = &mut self.pending {
            if let Some(Some(record)) = pending.get_mut(&splices_path) {
                record["indexSplices"] = Value::Null;
            }
        }
        self.schedule_flush()
    }

    fn array_mut(&mut self, path: &str) -> Option<&mut Vec<Value>> {
        if path::is_deep(path) {
            let root = path::root(path);
            let rest = &path[root.len() + 1..];
            path::get_in_mut(self.data.get_mut(root)?, rest)?.as_array_mut()
        } else {
            self.data.get_mut(path)?.as_array_mut()
        }
    }
}

fn normalize_start(start: isize, len: usize) -> usize {
    if start < 0 {
        len.saturating_sub(start.unsigned_abs())
    } else {
        (start as usize).min(len)
    }
}
