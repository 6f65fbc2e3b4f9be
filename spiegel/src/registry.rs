use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{ParamFlags, TypeTag, Value};

/// Failure produced by a member body; wrapped unmodified into
/// [`DispatchError::Invocation`](crate::DispatchError::Invocation).
pub type MemberError = Box<dyn std::error::Error + Send + Sync>;

/// Declared type of one method parameter.
///
/// `Any` accepts every argument and always loses against a more specific
/// parameter during overload scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Any,
    Bool,
    Int,
    Float,
    Str,
    Object,
    Function,
    Native(TypeId),
}

impl ParamType {
    pub fn of<T: Any>() -> Self {
        ParamType::Native(TypeId::of::<T>())
    }

    /// How well an argument with runtime tag `tag` satisfies this
    /// parameter, or `None` if it cannot.
    pub fn accepts(self, tag: TypeTag) -> Option<ArgMatch> {
        match (self, tag) {
            (ParamType::Any, _) => Some(ArgMatch::General),
            (ParamType::Bool, TypeTag::Bool)
            | (ParamType::Int, TypeTag::Int)
            | (ParamType::Float, TypeTag::Float)
            | (ParamType::Str, TypeTag::Str)
            | (ParamType::Object, TypeTag::Object)
            | (ParamType::Function, TypeTag::Function) => Some(ArgMatch::Exact),
            (ParamType::Native(want), TypeTag::Native(have)) if want == have => {
                Some(ArgMatch::Exact)
            }
            // The only widening conversion in the value model.
            (ParamType::Float, TypeTag::Int) => Some(ArgMatch::Widen),
            _ => None,
        }
    }
}

/// Quality of a single argument-to-parameter match, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgMatch {
    Exact,
    Widen,
    General,
}

impl ArgMatch {
    pub fn score(self) -> u32 {
        match self {
            ArgMatch::Exact => 2,
            ArgMatch::Widen => 1,
            ArgMatch::General => 0,
        }
    }
}

/// Type and direction of one declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub ty: ParamType,
    pub flags: ParamFlags,
}

impl ParamSpec {
    pub fn input(ty: ParamType) -> Self {
        Self {
            ty,
            flags: ParamFlags::IN,
        }
    }

    pub fn output(ty: ParamType) -> Self {
        Self {
            ty,
            flags: ParamFlags::OUT,
        }
    }

    pub fn inout(ty: ParamType) -> Self {
        Self {
            ty,
            flags: ParamFlags::INOUT,
        }
    }
}

type GetterFn =
    Box<dyn Fn(&Value) -> Result<Value, MemberError> + Send + Sync>;
type SetterFn =
    Box<dyn Fn(&Value, Value) -> Result<(), MemberError> + Send + Sync>;
type MethodBody = Box<
    dyn Fn(&Value, &mut [Value]) -> Result<Value, MemberError> + Send + Sync,
>;

/// A named gettable and/or settable member.
pub struct PropertyDef {
    pub name: Arc<str>,
    get: Option<GetterFn>,
    set: Option<SetterFn>,
}

impl PropertyDef {
    pub fn is_gettable(&self) -> bool {
        self.get.is_some()
    }

    pub fn is_settable(&self) -> bool {
        self.set.is_some()
    }

    pub(crate) fn getter(&self) -> Option<&GetterFn> {
        self.get.as_ref()
    }

    pub(crate) fn setter(&self) -> Option<&SetterFn> {
        self.set.as_ref()
    }
}

impl fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("gettable", &self.is_gettable())
            .field("settable", &self.is_settable())
            .finish()
    }
}

/// One overload of a named method.
///
/// The body receives the receiver immutably; members that mutate their
/// receiver rely on the receiver's own interior mutability.
pub struct MethodDef {
    pub name: Arc<str>,
    pub params: Vec<ParamSpec>,
    pub has_return: bool,
    body: MethodBody,
}

impl MethodDef {
    pub(crate) fn call(
        &self,
        receiver: &Value,
        args: &mut [Value],
    ) -> Result<Value, MemberError> {
        (self.body)(receiver, args)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("has_return", &self.has_return)
            .finish_non_exhaustive()
    }
}

/// Every member a runtime type declares: properties and method overloads.
///
/// Built once per type and handed to the [`Registry`]; this is the
/// capability table the resolver enumerates instead of scanning anything
/// reflectively per call.
pub struct TypeSpec {
    label: Arc<str>,
    properties: HashMap<Arc<str>, Arc<PropertyDef>, ahash::RandomState>,
    methods: HashMap<Arc<str>, Vec<Arc<MethodDef>>, ahash::RandomState>,
}

impl TypeSpec {
    pub fn new(label: &str) -> Self {
        Self {
            label: Arc::from(label),
            properties: HashMap::default(),
            methods: HashMap::default(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Read-only property.
    pub fn getter<G>(&mut self, name: &str, get: G) -> &mut Self
    where
        G: Fn(&Value) -> Result<Value, MemberError> + Send + Sync + 'static,
    {
        self.add_property(name, Some(Box::new(get)), None)
    }

    /// Read-write property.
    pub fn accessor<G, S>(&mut self, name: &str, get: G, set: S) -> &mut Self
    where
        G: Fn(&Value) -> Result<Value, MemberError> + Send + Sync + 'static,
        S: Fn(&Value, Value) -> Result<(), MemberError>
            + Send
            + Sync
            + 'static,
    {
        self.add_property(name, Some(Box::new(get)), Some(Box::new(set)))
    }

    fn add_property(
        &mut self,
        name: &str,
        get: Option<GetterFn>,
        set: Option<SetterFn>,
    ) -> &mut Self {
        let name: Arc<str> = Arc::from(name);
        self.properties.insert(
            name.clone(),
            Arc::new(PropertyDef { name, get, set }),
        );
        self
    }

    /// Value-returning method overload.
    pub fn method<F>(
        &mut self,
        name: &str,
        params: Vec<ParamSpec>,
        body: F,
    ) -> &mut Self
    where
        F: Fn(&Value, &mut [Value]) -> Result<Value, MemberError>
            + Send
            + Sync
            + 'static,
    {
        self.add_method(name, params, true, Box::new(body))
    }

    /// Effect-only method overload; produces no value for the caller.
    pub fn action<F>(
        &mut self,
        name: &str,
        params: Vec<ParamSpec>,
        body: F,
    ) -> &mut Self
    where
        F: Fn(&Value, &mut [Value]) -> Result<Value, MemberError>
            + Send
            + Sync
            + 'static,
    {
        self.add_method(name, params, false, Box::new(body))
    }

    fn add_method(
        &mut self,
        name: &str,
        params: Vec<ParamSpec>,
        has_return: bool,
        body: MethodBody,
    ) -> &mut Self {
        let name: Arc<str> = Arc::from(name);
        self.methods.entry(name.clone()).or_default().push(Arc::new(
            MethodDef {
                name,
                params,
                has_return,
                body,
            },
        ));
        self
    }

    fn property(&self, name: &str) -> Option<Arc<PropertyDef>> {
        self.properties.get(name).cloned()
    }

    fn overloads(&self, name: &str) -> Vec<Arc<MethodDef>> {
        self.methods.get(name).cloned().unwrap_or_default()
    }
}

impl fmt::Debug for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSpec")
            .field("label", &self.label)
            .field("properties", &self.properties.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

struct RegistryImpl {
    types: HashMap<TypeTag, TypeSpec, ahash::RandomState>,
}

/// Shared table of [`TypeSpec`]s keyed by runtime tag.
///
/// Registration is expected to happen before the first dispatch against
/// the type: the dispatch cache never invalidates, so members added to a
/// type later are only seen by call shapes that have not been resolved
/// yet.
#[derive(Clone)]
pub struct Registry(Arc<RwLock<RegistryImpl>>);

impl Registry {
    /// Empty registry, no builtin members.
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(RegistryImpl {
            types: HashMap::default(),
        })))
    }

    /// Registry preloaded with the default members of the primitive tags.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::builtins::install(&registry);
        registry
    }

    /// Install (or replace) the spec for `tag`.
    pub fn register(&self, tag: TypeTag, spec: TypeSpec) {
        log::debug!("registering type `{}` for {}", spec.label(), tag.name());
        self.0.write().types.insert(tag, spec);
    }

    /// Install a spec for the native type `T`.
    pub fn register_native<T, F>(&self, label: &str, build: F)
    where
        T: Any + Send + Sync,
        F: FnOnce(&mut TypeSpec),
    {
        let mut spec = TypeSpec::new(label);
        build(&mut spec);
        self.register(TypeTag::of::<T>(), spec);
    }

    /// Add members to an already registered tag, creating the spec when
    /// absent. Shapes already resolved through the cache are unaffected.
    pub fn extend<F>(&self, tag: TypeTag, build: F)
    where
        F: FnOnce(&mut TypeSpec),
    {
        let mut inner = self.0.write();
        let spec = inner
            .types
            .entry(tag)
            .or_insert_with(|| TypeSpec::new(tag.name()));
        build(spec);
    }

    pub fn property(
        &self,
        tag: TypeTag,
        name: &str,
    ) -> Option<Arc<PropertyDef>> {
        self.0.read().types.get(&tag)?.property(name)
    }

    pub fn overloads(&self, tag: TypeTag, name: &str) -> Vec<Arc<MethodDef>> {
        self.0
            .read()
            .types
            .get(&tag)
            .map(|spec| spec.overloads(name))
            .unwrap_or_default()
    }

    pub fn has_method(&self, tag: TypeTag, name: &str) -> bool {
        self.0
            .read()
            .types
            .get(&tag)
            .is_some_and(|spec| spec.methods.contains_key(name))
    }

    pub fn label(&self, tag: TypeTag) -> Option<Arc<str>> {
        self.0.read().types.get(&tag).map(|spec| spec.label.clone())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.read();
        f.debug_struct("Registry")
            .field("types", &inner.types.len())
            .finish()
    }
}
