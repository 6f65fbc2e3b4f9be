use std::any::Any;

use crate::{MemberError, Registry, TypeTag, Value};

pub mod boolean;
pub mod float;
pub mod int;
pub mod string;

/// Install the default member specs for the primitive tags.
pub fn install(registry: &Registry) {
    registry.register(TypeTag::Bool, boolean::spec());
    registry.register(TypeTag::Int, int::spec());
    registry.register(TypeTag::Float, float::spec());
    registry.register(TypeTag::Str, string::spec());
}

pub fn expect_bool(value: &Value) -> Result<bool, MemberError> {
    value
        .as_bool()
        .ok_or_else(|| type_error("bool", value))
}

pub fn expect_int(value: &Value) -> Result<i64, MemberError> {
    value.as_int().ok_or_else(|| type_error("int", value))
}

/// Accepts int as well, mirroring the widening rule of overload scoring.
pub fn expect_float(value: &Value) -> Result<f64, MemberError> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        other => Err(type_error("float", other)),
    }
}

pub fn expect_str(value: &Value) -> Result<&str, MemberError> {
    value.as_str().ok_or_else(|| type_error("string", value))
}

pub fn expect_native<T: Any>(value: &Value) -> Result<&T, MemberError> {
    value
        .as_native::<T>()
        .ok_or_else(|| type_error("native", value))
}

fn type_error(expected: &str, got: &Value) -> MemberError {
    format!("expected {expected}, got {}", got.type_tag().name()).into()
}
