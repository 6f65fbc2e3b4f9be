use std::sync::Arc;

use crate::dispatch::{build_dispatcher, CacheStats, DispatchCache};
use crate::proxy::{validate_shape, InterfaceShape, Proxy};
use crate::registry::Registry;
use crate::{CallArg, CallShape, DispatchError, ParamFlags, Value};

/// The invocation facade and composition root.
///
/// Owns the member registry and the dispatch cache explicitly; cloning
/// shares both, so clones observe each other's cache population. Every
/// entry point follows the same path: derive a [`CallShape`] from the
/// receiver's runtime tag and the argument tags, fetch or build the
/// dispatcher for it, execute.
#[derive(Debug, Clone)]
pub struct Invoker {
    registry: Registry,
    cache: DispatchCache,
}

impl Invoker {
    /// Facade over a registry preloaded with the primitive builtins.
    pub fn new() -> Self {
        Self::with_registry(Registry::with_builtins())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            cache: DispatchCache::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn run(
        &self,
        shape: CallShape,
        receiver: &Value,
        args: &mut [Value],
    ) -> Result<Value, DispatchError> {
        let dispatcher = self
            .cache
            .get_or_build(shape, |s| build_dispatcher(&self.registry, s))?;
        dispatcher.execute(receiver, args)
    }

    /// Read the named property of `receiver`.
    pub fn invoke_get(
        &self,
        receiver: &Value,
        name: &str,
    ) -> Result<Value, DispatchError> {
        self.run(CallShape::get(receiver, name), receiver, &mut [])
    }

    /// Write the named property of `receiver`.
    pub fn invoke_set(
        &self,
        receiver: &Value,
        name: &str,
        value: Value,
    ) -> Result<(), DispatchError> {
        let shape = CallShape::set(receiver, name, &value);
        let mut args = [value];
        self.run(shape, receiver, &mut args).map(|_| ())
    }

    /// Call the named method of `receiver` and return its value.
    pub fn invoke_member(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let shape = CallShape::invoke(receiver, name, args);
        let mut args = args.to_vec();
        self.run(shape, receiver, &mut args)
    }

    /// Call the named method of `receiver`, discarding any value it
    /// produces.
    pub fn invoke_member_action(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<(), DispatchError> {
        let shape = CallShape::invoke_void(receiver, name, args);
        let mut args = args.to_vec();
        self.run(shape, receiver, &mut args).map(|_| ())
    }

    /// Direction-explicit invoke. Positions flagged `OUT` or `INOUT` are
    /// written back into `args` after the call.
    pub fn invoke_member_with(
        &self,
        receiver: &Value,
        name: &str,
        args: &mut [CallArg],
    ) -> Result<Value, DispatchError> {
        let shape = CallShape::invoke_with(receiver, name, args, false);
        let mut values: Vec<Value> =
            args.iter().map(|a| a.value.clone()).collect();
        let result = self.run(shape, receiver, &mut values)?;
        for (slot, value) in args.iter_mut().zip(values) {
            if slot.flags.contains(ParamFlags::OUT) {
                slot.value = value;
            }
        }
        Ok(result)
    }

    /// Present `receiver` through `shape` without validating anything up
    /// front; each call on the proxy resolves lazily.
    pub fn wrap(&self, receiver: Value, shape: Arc<InterfaceShape>) -> Proxy {
        Proxy::new(self.clone(), receiver, shape)
    }

    /// Like [`wrap`](Self::wrap), but validates every shape operation
    /// against the receiver first.
    pub fn wrap_checked(
        &self,
        receiver: Value,
        shape: Arc<InterfaceShape>,
    ) -> Result<Proxy, DispatchError> {
        let missing = validate_shape(&self.registry, &receiver, &shape);
        if !missing.is_empty() {
            return Err(DispatchError::IncompatibleShape {
                shape: Arc::from(shape.name()),
                missing,
            });
        }
        Ok(Proxy::new(self.clone(), receiver, shape))
    }
}

impl Default for Invoker {
    fn default() -> Self {
        Self::new()
    }
}
