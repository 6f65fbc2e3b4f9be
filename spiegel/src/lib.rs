mod command;
mod dispatch;
mod invoke;
mod lookup;
mod object;
mod proxy;
mod registry;
mod shape;
mod value;

pub mod builtins;

pub use command::{Command, Trampoline};
pub use dispatch::{CacheStats, DispatchCache, DispatchError, Dispatcher};
pub use invoke::Invoker;
pub use lookup::{resolve, Resolution};
pub use object::{DynamicObject, Materializer, ObjectRef};
pub use proxy::{InterfaceShape, OpSig, Proxy};
pub use registry::{
    ArgMatch, MemberError, MethodDef, ParamSpec, ParamType, PropertyDef,
    Registry, TypeSpec,
};
pub use shape::{CallArg, CallShape, OpKind, ParamFlags};
pub use value::{FunctionValue, TypeTag, Value};
