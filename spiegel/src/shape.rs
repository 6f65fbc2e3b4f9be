use std::sync::Arc;

use bitflags::bitflags;

use crate::{TypeTag, Value};

/// The closed set of dynamic operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Read a named property.
    Get,
    /// Write a named property.
    Set,
    /// Call a named method and use its value.
    Invoke,
    /// Call a named method for effect only.
    InvokeVoid,
}

impl OpKind {
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Get => "get",
            OpKind::Set => "set",
            OpKind::Invoke => "invoke",
            OpKind::InvokeVoid => "invoke-void",
        }
    }
}

bitflags! {
    /// Declared direction of one argument position.
    ///
    /// Directions are supplied by the caller, never inferred; a candidate
    /// member matches only if its parameter direction is identical.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParamFlags: u8 {
        const IN = 1 << 0;
        const OUT = 1 << 1;
        const INOUT = Self::IN.bits() | Self::OUT.bits();
    }
}

/// One argument of a direction-explicit invocation.
#[derive(Debug, Clone)]
pub struct CallArg {
    pub flags: ParamFlags,
    pub value: Value,
}

impl CallArg {
    pub fn input(value: Value) -> Self {
        Self {
            flags: ParamFlags::IN,
            value,
        }
    }

    /// Output-only position; the placeholder is overwritten on return.
    pub fn output() -> Self {
        Self {
            flags: ParamFlags::OUT,
            value: Value::Null,
        }
    }

    pub fn inout(value: Value) -> Self {
        Self {
            flags: ParamFlags::INOUT,
            value,
        }
    }
}

/// Identity of one unique dynamic operation.
///
/// Everything resolution depends on is part of the key, so a dispatcher
/// cached under a shape is valid for every receiver and argument list
/// producing that same shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallShape {
    pub op: OpKind,
    pub name: Arc<str>,
    pub receiver: TypeTag,
    pub args: Vec<TypeTag>,
    pub dirs: Vec<ParamFlags>,
}

impl CallShape {
    pub fn get(receiver: &Value, name: &str) -> Self {
        Self {
            op: OpKind::Get,
            name: Arc::from(name),
            receiver: receiver.type_tag(),
            args: Vec::new(),
            dirs: Vec::new(),
        }
    }

    pub fn set(receiver: &Value, name: &str, value: &Value) -> Self {
        Self {
            op: OpKind::Set,
            name: Arc::from(name),
            receiver: receiver.type_tag(),
            args: vec![value.type_tag()],
            dirs: vec![ParamFlags::IN],
        }
    }

    pub fn invoke(receiver: &Value, name: &str, args: &[Value]) -> Self {
        Self::invocation(OpKind::Invoke, receiver, name, args)
    }

    pub fn invoke_void(receiver: &Value, name: &str, args: &[Value]) -> Self {
        Self::invocation(OpKind::InvokeVoid, receiver, name, args)
    }

    fn invocation(
        op: OpKind,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> Self {
        Self {
            op,
            name: Arc::from(name),
            receiver: receiver.type_tag(),
            args: args.iter().map(Value::type_tag).collect(),
            dirs: vec![ParamFlags::IN; args.len()],
        }
    }

    /// Direction-explicit invocation shape. Output-only positions carry no
    /// meaningful input, so their tag is normalized to keep the key
    /// independent of whatever placeholder the caller passed.
    pub fn invoke_with(
        receiver: &Value,
        name: &str,
        args: &[CallArg],
        void: bool,
    ) -> Self {
        Self {
            op: if void { OpKind::InvokeVoid } else { OpKind::Invoke },
            name: Arc::from(name),
            receiver: receiver.type_tag(),
            args: args
                .iter()
                .map(|a| {
                    if a.flags == ParamFlags::OUT {
                        TypeTag::Null
                    } else {
                        a.value.type_tag()
                    }
                })
                .collect(),
            dirs: args.iter().map(|a| a.flags).collect(),
        }
    }
}
