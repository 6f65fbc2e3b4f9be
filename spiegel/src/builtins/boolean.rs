use crate::builtins::expect_bool;
use crate::{TypeSpec, Value};

pub fn spec() -> TypeSpec {
    let mut spec = TypeSpec::new("bool");
    spec.method("to_string", vec![], |recv, _| {
        Ok(Value::from(expect_bool(recv)?.to_string()))
    });
    spec.method("not", vec![], |recv, _| {
        Ok(Value::Bool(!expect_bool(recv)?))
    });
    spec
}
