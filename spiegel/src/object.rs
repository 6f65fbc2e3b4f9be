use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dispatch::DispatchError;
use crate::Value;

/// On-demand member materialization hook.
///
/// Runs under the owning container's write lock and must not call back
/// into the same container.
pub type Materializer = Box<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// An open-ended, insertion-ordered mapping from string keys to values.
///
/// Lookup ignores insertion order; enumeration preserves it. A container
/// may carry a [`Materializer`] that fills absent keys on first access,
/// after which the produced value is memoized like any stored entry
/// (unresolved keys transition to resolved exactly once).
///
/// Not designed for concurrent mutation from multiple threads; callers
/// sharing an [`ObjectRef`] across threads synchronize externally.
#[derive(Default)]
pub struct DynamicObject {
    entries: Vec<(Arc<str>, Value)>,
    index: HashMap<Arc<str>, usize, ahash::RandomState>,
    materialize: Option<Materializer>,
}

impl DynamicObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_materializer<F>(materialize: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            entries: Vec::new(),
            index: HashMap::default(),
            materialize: Some(Box::new(materialize)),
        }
    }

    /// Fetch `name`, materializing and memoizing it on a first-access miss.
    pub fn get(&mut self, name: &str) -> Result<Value, DispatchError> {
        if let Some(&i) = self.index.get(name) {
            return Ok(self.entries[i].1.clone());
        }
        if let Some(fill) = &self.materialize {
            if let Some(value) = fill(name) {
                self.set(name, value.clone());
                return Ok(value);
            }
        }
        Err(DispatchError::MissingMember {
            name: Arc::from(name),
        })
    }

    /// Fetch `name` without triggering materialization.
    pub fn peek(&self, name: &str) -> Option<Value> {
        self.index.get(name).map(|&i| self.entries[i].1.clone())
    }

    /// Insert or overwrite. Overwriting keeps the original insertion slot.
    pub fn set(&mut self, name: &str, value: Value) {
        if let Some(&i) = self.index.get(name) {
            self.entries[i].1 = value;
        } else {
            let key: Arc<str> = Arc::from(name);
            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, value));
        }
    }

    /// True only for present entries; never consults the materializer.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let i = self.index.remove(name)?;
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (&**k, v))
    }
}

impl fmt::Debug for DynamicObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (&**k, v)))
            .finish()
    }
}

/// Shared handle to a [`DynamicObject`].
///
/// Cloning shares the container; the handle never owns the conceptual
/// lifetime of what it points at beyond the reference count.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<DynamicObject>>);

impl ObjectRef {
    pub fn new(object: DynamicObject) -> Self {
        Self(Arc::new(RwLock::new(object)))
    }

    pub fn get(&self, name: &str) -> Result<Value, DispatchError> {
        self.0.write().get(name)
    }

    pub fn peek(&self, name: &str) -> Option<Value> {
        self.0.read().peek(name)
    }

    pub fn set(&self, name: &str, value: Value) {
        self.0.write().set(name, value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.read().contains(name)
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.0.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Insertion-ordered copy of all entries.
    pub fn snapshot(&self) -> Vec<(Arc<str>, Value)> {
        self.0
            .read()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.read().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn set_then_get() {
        let mut obj = DynamicObject::new();
        obj.set("a", Value::Int(1));
        obj.set("b", Value::Int(2));
        obj.set("a", Value::Int(3));
        assert_eq!(obj.get("a").unwrap(), Value::Int(3));
        assert_eq!(obj.get("b").unwrap(), Value::Int(2));
        assert_eq!(obj.len(), 2);
    }

    #[test]
    fn missing_member() {
        let mut obj = DynamicObject::new();
        match obj.get("nope") {
            Err(DispatchError::MissingMember { name }) => {
                assert_eq!(&*name, "nope")
            }
            other => panic!("expected MissingMember, got {other:?}"),
        }
    }

    #[test]
    fn insertion_order_survives_overwrite_and_remove() {
        let mut obj = DynamicObject::new();
        obj.set("x", Value::Int(1));
        obj.set("y", Value::Int(2));
        obj.set("z", Value::Int(3));
        obj.set("x", Value::Int(10));
        obj.remove("y");
        let keys: Vec<&str> = obj.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["x", "z"]);
        assert_eq!(obj.get("z").unwrap(), Value::Int(3));
    }

    #[test]
    fn materializer_fills_once() {
        static CALLS: AtomicU32 = AtomicU32::new(0);
        let mut obj = DynamicObject::with_materializer(|name| {
            CALLS.fetch_add(1, Ordering::Relaxed);
            (name == "lazy").then(|| Value::Int(42))
        });

        assert_eq!(obj.get("lazy").unwrap(), Value::Int(42));
        assert_eq!(obj.get("lazy").unwrap(), Value::Int(42));
        assert_eq!(CALLS.load(Ordering::Relaxed), 1);
        assert!(obj.contains("lazy"));

        assert!(matches!(
            obj.get("other"),
            Err(DispatchError::MissingMember { .. })
        ));
    }

    #[test]
    fn contains_does_not_materialize() {
        let obj = DynamicObject::with_materializer(|_| Some(Value::Null));
        assert!(!obj.contains("anything"));
    }

    #[test]
    fn shared_handle() {
        let a = ObjectRef::default();
        let b = a.clone();
        b.set("k", Value::Int(9));
        assert_eq!(a.get("k").unwrap(), Value::Int(9));
        assert!(a.ptr_eq(&b));
    }
}
