use crate::builtins::expect_str;
use crate::{ParamSpec, ParamType, TypeSpec, Value};

pub fn spec() -> TypeSpec {
    let mut spec = TypeSpec::new("string");
    spec.getter("length", |recv| {
        Ok(Value::Int(expect_str(recv)?.len() as i64))
    });
    spec.method("to_string", vec![], |recv, _| {
        Ok(Value::from(expect_str(recv)?))
    });
    spec.method(
        "starts_with",
        vec![ParamSpec::input(ParamType::Str)],
        |recv, args| {
            let prefix = expect_str(&args[0])?.to_owned();
            Ok(Value::Bool(expect_str(recv)?.starts_with(&prefix)))
        },
    );
    spec.method(
        "contains",
        vec![ParamSpec::input(ParamType::Str)],
        |recv, args| {
            let needle = expect_str(&args[0])?.to_owned();
            Ok(Value::Bool(expect_str(recv)?.contains(&needle)))
        },
    );
    spec
}
