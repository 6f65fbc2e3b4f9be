use std::fmt;
use std::sync::Arc;

use crate::registry::Registry;
use crate::{CallArg, DispatchError, Invoker, OpKind, ParamFlags, Value};

/// One operation an interface shape requires.
#[derive(Debug, Clone)]
pub struct OpSig {
    pub name: Arc<str>,
    pub op: OpKind,
    pub dirs: Vec<ParamFlags>,
}

/// The set of operations a proxy presents: a structural interface the
/// wrapped receiver never declared.
#[derive(Debug, Clone)]
pub struct InterfaceShape {
    name: Arc<str>,
    ops: Vec<OpSig>,
}

impl InterfaceShape {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            ops: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ops(&self) -> &[OpSig] {
        &self.ops
    }

    pub fn getter(self, name: &str) -> Self {
        self.operation(name, OpKind::Get, Vec::new())
    }

    pub fn setter(self, name: &str) -> Self {
        self.operation(name, OpKind::Set, vec![ParamFlags::IN])
    }

    /// Value-returning method taking `arity` input arguments.
    pub fn method(self, name: &str, arity: usize) -> Self {
        self.operation(name, OpKind::Invoke, vec![ParamFlags::IN; arity])
    }

    /// Void method taking `arity` input arguments.
    pub fn action(self, name: &str, arity: usize) -> Self {
        self.operation(name, OpKind::InvokeVoid, vec![ParamFlags::IN; arity])
    }

    pub fn operation(
        mut self,
        name: &str,
        op: OpKind,
        dirs: Vec<ParamFlags>,
    ) -> Self {
        self.ops.push(OpSig {
            name: Arc::from(name),
            op,
            dirs,
        });
        self
    }

    fn find(&self, name: &str, op: OpKind) -> Option<&OpSig> {
        self.ops.iter().find(|sig| &*sig.name == name && sig.op == op)
    }
}

/// Check every shape operation against the receiver's registered members
/// and report the names that do not resolve.
///
/// Argument tags are unknown until a real call, so methods are validated
/// by name, arity, and directions only.
pub(crate) fn validate_shape(
    registry: &Registry,
    receiver: &Value,
    shape: &InterfaceShape,
) -> Vec<Arc<str>> {
    let tag = receiver.type_tag();
    let mut missing = Vec::new();
    for sig in &shape.ops {
        let satisfied = if let Value::Object(object) = receiver {
            // Dynamic objects accept any set; everything else needs a
            // present entry.
            sig.op == OpKind::Set || object.contains(&sig.name)
        } else {
            match sig.op {
                OpKind::Get => registry
                    .property(tag, &sig.name)
                    .is_some_and(|p| p.is_gettable()),
                OpKind::Set => registry
                    .property(tag, &sig.name)
                    .is_some_and(|p| p.is_settable()),
                OpKind::Invoke | OpKind::InvokeVoid => registry
                    .overloads(tag, &sig.name)
                    .iter()
                    .any(|m| {
                        m.params.len() == sig.dirs.len()
                            && m.params
                                .iter()
                                .zip(&sig.dirs)
                                .all(|(p, d)| p.flags == *d)
                            && (sig.op == OpKind::InvokeVoid || m.has_return)
                    }),
            }
        };
        if !satisfied {
            missing.push(sig.name.clone());
        }
    }
    missing
}

/// A duck-typing adapter: presents the wrapped receiver through an
/// [`InterfaceShape`] it never declared.
///
/// Holds the receiver as a shared handle, never owning its lifecycle. The
/// proxy's own identity is not part of any call shape, so two proxies
/// over the same receiver (or receivers of the same tag) share dispatch
/// cache entries.
pub struct Proxy {
    invoker: Invoker,
    target: Value,
    shape: Arc<InterfaceShape>,
}

impl Proxy {
    pub(crate) fn new(
        invoker: Invoker,
        target: Value,
        shape: Arc<InterfaceShape>,
    ) -> Self {
        Self {
            invoker,
            target,
            shape,
        }
    }

    pub fn target(&self) -> &Value {
        &self.target
    }

    pub fn shape(&self) -> &InterfaceShape {
        &self.shape
    }

    pub fn get(&self, name: &str) -> Result<Value, DispatchError> {
        self.require(name, OpKind::Get)?;
        self.invoker.invoke_get(&self.target, name)
    }

    pub fn set(
        &self,
        name: &str,
        value: Value,
    ) -> Result<(), DispatchError> {
        self.require(name, OpKind::Set)?;
        self.invoker.invoke_set(&self.target, name, value)
    }

    /// Call a value-returning shape method with plain input arguments.
    pub fn call(
        &self,
        name: &str,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let sig = self.require(name, OpKind::Invoke)?;
        if sig.dirs.len() != args.len()
            || sig.dirs.iter().any(|d| *d != ParamFlags::IN)
        {
            return Err(self.outside_shape(name, OpKind::Invoke));
        }
        self.invoker.invoke_member(&self.target, name, args)
    }

    /// Call a void shape method with plain input arguments.
    pub fn call_action(
        &self,
        name: &str,
        args: &[Value],
    ) -> Result<(), DispatchError> {
        let sig = self.require(name, OpKind::InvokeVoid)?;
        if sig.dirs.len() != args.len()
            || sig.dirs.iter().any(|d| *d != ParamFlags::IN)
        {
            return Err(self.outside_shape(name, OpKind::InvokeVoid));
        }
        self.invoker.invoke_member_action(&self.target, name, args)
    }

    /// Call a shape method with explicit directions; `OUT`/`INOUT`
    /// positions are written back.
    pub fn call_with(
        &self,
        name: &str,
        args: &mut [CallArg],
    ) -> Result<Value, DispatchError> {
        let sig = self.require(name, OpKind::Invoke)?;
        if sig.dirs.len() != args.len()
            || sig
                .dirs
                .iter()
                .zip(args.iter())
                .any(|(d, a)| *d != a.flags)
        {
            return Err(self.outside_shape(name, OpKind::Invoke));
        }
        self.invoker.invoke_member_with(&self.target, name, args)
    }

    /// Operations outside the declared shape never reach the receiver.
    fn require(
        &self,
        name: &str,
        op: OpKind,
    ) -> Result<&OpSig, DispatchError> {
        self.shape
            .find(name, op)
            .ok_or_else(|| self.outside_shape(name, op))
    }

    fn outside_shape(&self, name: &str, op: OpKind) -> DispatchError {
        DispatchError::NoMatchingMember {
            receiver: self.target.type_tag(),
            name: Arc::from(name),
            op,
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("shape", &self.shape.name)
            .field("target", &self.target.type_tag().name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{expect_int, expect_native};
    use crate::registry::{ParamSpec, ParamType};
    use parking_lot::Mutex;

    struct Gauge {
        level: Mutex<i64>,
    }

    fn gauge_invoker() -> Invoker {
        let invoker = Invoker::new();
        invoker.registry().register_native::<Gauge, _>("gauge", |spec| {
            spec.accessor(
                "level",
                |recv| Ok(Value::Int(*expect_native::<Gauge>(recv)?.level.lock())),
                |recv, value| {
                    *expect_native::<Gauge>(recv)?.level.lock() =
                        expect_int(&value)?;
                    Ok(())
                },
            );
            spec.method(
                "scaled",
                vec![ParamSpec::input(ParamType::Int)],
                |recv, args| {
                    let gauge = expect_native::<Gauge>(recv)?;
                    Ok(Value::Int(*gauge.level.lock() * expect_int(&args[0])?))
                },
            );
        });
        invoker
    }

    fn gauge(level: i64) -> Value {
        Value::native(Gauge {
            level: Mutex::new(level),
        })
    }

    fn meter_shape() -> Arc<InterfaceShape> {
        Arc::new(
            InterfaceShape::new("Meter")
                .getter("level")
                .setter("level")
                .method("scaled", 1),
        )
    }

    #[test]
    fn forwards_through_facade() {
        let invoker = gauge_invoker();
        let proxy = invoker.wrap(gauge(3), meter_shape());
        assert_eq!(proxy.get("level").unwrap(), Value::Int(3));
        proxy.set("level", Value::Int(5)).unwrap();
        assert_eq!(
            proxy.call("scaled", &[Value::Int(2)]).unwrap(),
            Value::Int(10)
        );
    }

    #[test]
    fn operations_outside_shape_never_reach_receiver() {
        let invoker = gauge_invoker();
        let proxy = invoker.wrap(gauge(3), meter_shape());
        // "scaled" resolves on the receiver, but the shape only declares
        // it as value-returning.
        assert!(matches!(
            proxy.call_action("scaled", &[Value::Int(2)]),
            Err(DispatchError::NoMatchingMember { .. })
        ));
        assert!(matches!(
            proxy.get("missing"),
            Err(DispatchError::NoMatchingMember { .. })
        ));
    }

    #[test]
    fn lazy_wrap_fails_per_call() {
        let invoker = gauge_invoker();
        let shape = Arc::new(
            InterfaceShape::new("Wrong")
                .getter("level")
                .method("no_such", 0),
        );
        // Construction succeeds even though "no_such" can never resolve.
        let proxy = invoker.wrap(gauge(1), shape);
        assert_eq!(proxy.get("level").unwrap(), Value::Int(1));
        assert!(matches!(
            proxy.call("no_such", &[]),
            Err(DispatchError::NoMatchingMember { .. })
        ));
    }

    #[test]
    fn eager_wrap_reports_missing_members() {
        let invoker = gauge_invoker();
        let shape = Arc::new(
            InterfaceShape::new("Wrong")
                .getter("level")
                .method("no_such", 0)
                .setter("absent"),
        );
        match invoker.wrap_checked(gauge(1), shape) {
            Err(DispatchError::IncompatibleShape { shape, missing }) => {
                assert_eq!(&*shape, "Wrong");
                let names: Vec<&str> =
                    missing.iter().map(|n| &**n).collect();
                assert_eq!(names, ["no_such", "absent"]);
            }
            other => panic!("expected IncompatibleShape, got {other:?}"),
        }

        assert!(invoker.wrap_checked(gauge(1), meter_shape()).is_ok());
    }

    #[test]
    fn two_wraps_share_cache_entries() {
        let invoker = gauge_invoker();
        let receiver = gauge(2);
        let first = invoker.wrap(receiver.clone(), meter_shape());
        let second = invoker.wrap(receiver, meter_shape());

        first.call("scaled", &[Value::Int(1)]).unwrap();
        second.call("scaled", &[Value::Int(1)]).unwrap();

        let stats = invoker.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn wraps_dynamic_objects() {
        let invoker = gauge_invoker();
        let receiver = Value::object();
        invoker
            .invoke_set(&receiver, "name", Value::from("duck"))
            .unwrap();

        let shape = Arc::new(
            InterfaceShape::new("Named").getter("name").setter("name"),
        );
        let proxy = invoker.wrap_checked(receiver, shape).unwrap();
        assert_eq!(proxy.get("name").unwrap(), Value::from("duck"));
    }
}
