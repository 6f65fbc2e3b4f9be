use crate::builtins::expect_float;
use crate::{TypeSpec, Value};

pub fn spec() -> TypeSpec {
    let mut spec = TypeSpec::new("float");
    spec.method("to_string", vec![], |recv, _| {
        Ok(Value::from(expect_float(recv)?.to_string()))
    });
    spec.method("abs", vec![], |recv, _| {
        Ok(Value::Float(expect_float(recv)?.abs()))
    });
    spec.method("sqrt", vec![], |recv, _| {
        Ok(Value::Float(expect_float(recv)?.sqrt()))
    });
    spec
}
