use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::lookup::{match_params, resolve, Resolution};
use crate::registry::{MemberError, MethodDef, PropertyDef, Registry};
use crate::{CallShape, OpKind, TypeTag, Value};

/// Everything a dynamic operation can fail with.
#[derive(Debug, Clone)]
pub enum DispatchError {
    /// No candidate member for the requested name, operation, and
    /// argument shape.
    NoMatchingMember {
        receiver: TypeTag,
        name: Arc<str>,
        op: OpKind,
    },
    /// Two or more candidates scored equally well.
    AmbiguousMatch { receiver: TypeTag, name: Arc<str> },
    /// Resolution succeeded but the member itself failed; the underlying
    /// error is carried, never swallowed.
    Invocation {
        name: Arc<str>,
        source: Arc<dyn Error + Send + Sync>,
    },
    /// A value-returning invoke hit a member that produces none.
    VoidReturnMismatch { name: Arc<str> },
    /// Plain container get on an absent key with no materialization rule.
    MissingMember { name: Arc<str> },
    /// Eager proxy validation found unsatisfied shape operations.
    IncompatibleShape {
        shape: Arc<str>,
        missing: Vec<Arc<str>>,
    },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NoMatchingMember { receiver, name, op } => {
                write!(
                    f,
                    "no matching member `{name}` for {} on {}",
                    op.name(),
                    receiver.name()
                )
            }
            DispatchError::AmbiguousMatch { receiver, name } => {
                write!(
                    f,
                    "ambiguous overloads for `{name}` on {}",
                    receiver.name()
                )
            }
            DispatchError::Invocation { name, source } => {
                write!(f, "member `{name}` failed: {source}")
            }
            DispatchError::VoidReturnMismatch { name } => {
                write!(f, "member `{name}` does not produce a value")
            }
            DispatchError::MissingMember { name } => {
                write!(f, "missing member `{name}`")
            }
            DispatchError::IncompatibleShape { shape, missing } => {
                write!(f, "receiver does not satisfy shape `{shape}`: ")?;
                for (i, name) in missing.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "`{name}`")?;
                }
                write!(f, " unresolved")
            }
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DispatchError::Invocation { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

/// The strategy a shape resolved to.
enum Plan {
    GetProperty(Arc<PropertyDef>),
    SetProperty(Arc<PropertyDef>),
    CallMethod(Arc<MethodDef>),
    GetSlot,
    SetSlot,
    CallSlot,
}

/// A reusable, resolved execution strategy bound to one [`CallShape`].
///
/// Holds everything needed to execute without re-resolving. Stateless with
/// respect to individual receivers: valid for every receiver whose tag
/// matches the shape, not just the one that triggered its creation.
pub struct Dispatcher {
    shape: CallShape,
    plan: Plan,
}

/// Resolve `shape` once and freeze the outcome into a [`Dispatcher`].
pub(crate) fn build_dispatcher(
    registry: &Registry,
    shape: &CallShape,
) -> Result<Dispatcher, DispatchError> {
    let plan = match resolve(registry, shape)? {
        Resolution::Property(p) => match shape.op {
            OpKind::Set => Plan::SetProperty(p),
            _ => Plan::GetProperty(p),
        },
        Resolution::Method(m) => Plan::CallMethod(m),
        Resolution::DynamicSlot => match shape.op {
            OpKind::Get => Plan::GetSlot,
            OpKind::Set => Plan::SetSlot,
            OpKind::Invoke | OpKind::InvokeVoid => Plan::CallSlot,
        },
    };
    Ok(Dispatcher {
        shape: shape.clone(),
        plan,
    })
}

impl Dispatcher {
    pub fn shape(&self) -> &CallShape {
        &self.shape
    }

    /// Execute against `receiver`. Arguments are passed as a mutable
    /// slice so members with output parameters can write results back
    /// into their positions.
    pub fn execute(
        &self,
        receiver: &Value,
        args: &mut [Value],
    ) -> Result<Value, DispatchError> {
        match &self.plan {
            Plan::GetProperty(property) => {
                let get =
                    property.getter().ok_or_else(|| self.no_match())?;
                get(receiver).map_err(|e| self.invocation(e))
            }
            Plan::SetProperty(property) => {
                let set =
                    property.setter().ok_or_else(|| self.no_match())?;
                let value = mem::replace(&mut args[0], Value::Null);
                set(receiver, value)
                    .map(|_| Value::Null)
                    .map_err(|e| self.invocation(e))
            }
            Plan::CallMethod(method) => method
                .call(receiver, args)
                .map_err(|e| self.invocation(e)),
            Plan::GetSlot => {
                let object = self.expect_object(receiver)?;
                object.get(&self.shape.name)
            }
            Plan::SetSlot => {
                let object = self.expect_object(receiver)?;
                let value = mem::replace(&mut args[0], Value::Null);
                object.set(&self.shape.name, value);
                Ok(Value::Null)
            }
            Plan::CallSlot => self.call_slot(receiver, args),
        }
    }

    /// Invoke a callable entry of a dynamic object. The entry is fetched
    /// and checked per call because two objects sharing this dispatcher
    /// may hold different functions under the same name.
    fn call_slot(
        &self,
        receiver: &Value,
        args: &mut [Value],
    ) -> Result<Value, DispatchError> {
        let object = self.expect_object(receiver)?;
        let entry = object.get(&self.shape.name).map_err(|e| match e {
            DispatchError::MissingMember { .. } => self.no_match(),
            other => other,
        })?;
        let Value::Function(function) = entry else {
            return Err(self.no_match());
        };
        if match_params(function.params(), &self.shape.args, &self.shape.dirs)
            .is_none()
        {
            return Err(self.no_match());
        }
        if self.shape.op == OpKind::Invoke && !function.has_return() {
            return Err(DispatchError::VoidReturnMismatch {
                name: self.shape.name.clone(),
            });
        }
        function.call(args).map_err(|e| self.invocation(e))
    }

    fn expect_object<'a>(
        &self,
        receiver: &'a Value,
    ) -> Result<&'a crate::ObjectRef, DispatchError> {
        receiver.as_object().ok_or_else(|| self.no_match())
    }

    fn no_match(&self) -> DispatchError {
        DispatchError::NoMatchingMember {
            receiver: self.shape.receiver,
            name: self.shape.name.clone(),
            op: self.shape.op,
        }
    }

    fn invocation(&self, source: MemberError) -> DispatchError {
        DispatchError::Invocation {
            name: self.shape.name.clone(),
            source: Arc::from(source),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Counters snapshot of a [`DispatchCache`].
///
/// `misses` equals the number of resolutions performed on behalf of the
/// cache, so tests can assert that N identical calls resolved once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct CacheInner {
    map: RwLock<HashMap<CallShape, Arc<Dispatcher>, ahash::RandomState>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Shape-keyed dispatcher cache.
///
/// Grows monotonically; the domain of shapes in a running process is
/// bounded by the code paths exercised, so there is no eviction. Safe for
/// concurrent population: readers never observe a partially built
/// dispatcher, and when two threads miss on the same shape the first
/// inserted dispatcher wins and both get the same identity thereafter.
///
/// Held by a composition root ([`Invoker`](crate::Invoker)), never as
/// process-global state.
#[derive(Clone)]
pub struct DispatchCache {
    inner: Arc<CacheInner>,
}

impl DispatchCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CacheInner {
                map: RwLock::new(HashMap::default()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Fetch the dispatcher for `shape`, building and caching it on miss.
    ///
    /// A failed build is returned to the caller and caches nothing.
    pub fn get_or_build<F>(
        &self,
        shape: CallShape,
        build: F,
    ) -> Result<Arc<Dispatcher>, DispatchError>
    where
        F: FnOnce(&CallShape) -> Result<Dispatcher, DispatchError>,
    {
        if let Some(found) = self.inner.map.read().get(&shape) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(found.clone());
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        log::trace!("dispatch cache miss: {shape:?}");
        let built = Arc::new(build(&shape)?);

        let mut map = self.inner.map.write();
        Ok(map.entry(shape).or_insert(built).clone())
    }

    pub fn len(&self) -> usize {
        self.inner.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.map.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for DispatchCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("DispatchCache")
            .field("entries", &stats.entries)
            .field("hits", &stats.hits)
            .field("misses", &stats.misses)
            .finish()
    }
}
