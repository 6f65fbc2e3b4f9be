use crate::builtins::expect_int;
use crate::{TypeSpec, Value};

pub fn spec() -> TypeSpec {
    let mut spec = TypeSpec::new("int");
    spec.method("to_string", vec![], |recv, _| {
        Ok(Value::from(expect_int(recv)?.to_string()))
    });
    spec.method("abs", vec![], |recv, _| {
        Ok(Value::Int(expect_int(recv)?.wrapping_abs()))
    });
    spec
}
