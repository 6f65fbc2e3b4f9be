use criterion::{black_box, criterion_group, criterion_main, Criterion};
use parking_lot::Mutex;
use spiegel::builtins::{expect_int, expect_native};
use spiegel::{Invoker, ParamSpec, ParamType, Value};

struct Acc {
    total: Mutex<i64>,
}

fn setup() -> (Invoker, Value) {
    let invoker = Invoker::new();
    invoker.registry().register_native::<Acc>("acc", |spec| {
        spec.method(
            "add",
            vec![ParamSpec::input(ParamType::Int)],
            |recv, args| {
                let acc = expect_native::<Acc>(recv)?;
                let mut total = acc.total.lock();
                *total += expect_int(&args[0])?;
                Ok(Value::Int(*total))
            },
        );
        spec.method(
            "add",
            vec![ParamSpec::input(ParamType::Any)],
            |_, _| Ok(Value::Null),
        );
    });
    let receiver = Value::native(Acc {
        total: Mutex::new(0),
    });
    (invoker, receiver)
}

fn bench_dispatch(c: &mut Criterion) {
    let (invoker, receiver) = setup();
    // Warm the cache so the hot loop measures pure hits.
    invoker
        .invoke_member(&receiver, "add", &[Value::Int(1)])
        .expect("warmup");

    c.bench_function("invoke_member_cached", |b| {
        b.iter(|| {
            black_box(
                invoker
                    .invoke_member(&receiver, "add", &[Value::Int(1)])
                    .expect("cached invoke"),
            )
        })
    });

    c.bench_function("invoke_member_cold_cache", |b| {
        b.iter(|| {
            let (invoker, receiver) = setup();
            black_box(
                invoker
                    .invoke_member(&receiver, "add", &[Value::Int(1)])
                    .expect("cold invoke"),
            )
        })
    });
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
