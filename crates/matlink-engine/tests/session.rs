//! Round trips through a live MATLAB session. Skipped unless `MATLAB_ROOT`
//! points at an installation.

use matlink_engine::{Engine, EngineError, MatlabConfig};
use matlink_mx::MxAlloc;
use matlink_value::{StructValue, Value};

fn engine() -> Option<Engine> {
    if std::env::var_os("MATLAB_ROOT").is_none() {
        eprintln!("MATLAB_ROOT not set, skipping test");
        return None;
    }
    let config = MatlabConfig::from_env();
    Some(Engine::start(config).expect("failed to start MATLAB engine"))
}

#[test]
fn closed_engine_rejects_calls() {
    let Some(mut engine) = engine() else { return };
    engine.close().unwrap();
    assert!(!engine.is_open());
    assert!(matches!(engine.eval("1;"), Err(EngineError::Closed)));
    assert!(matches!(engine.get("x"), Err(EngineError::Closed)));
    engine.close().unwrap();
}

#[test]
fn put_eval_get() {
    let Some(engine) = engine() else { return };
    engine.put("x", &Value::from(vec![1.0, 2.0, 3.0])).unwrap();
    engine.eval("y = sum(x); s = size(x);").unwrap();
    assert_eq!(engine.get("y").unwrap(), Value::from(6.0));
    assert_eq!(
        engine.get("s").unwrap(),
        Value::matrix(&[1, 2], vec![1.0, 3.0]).unwrap()
    );
}

#[test]
fn matrices_keep_matlab_indexing() {
    let Some(engine) = engine() else { return };
    engine.eval("m = reshape(0:14, 3, 5);").unwrap();
    let m = engine.get("m").unwrap();
    assert_eq!(m.dims(), Some(vec![3, 5]));
    engine.put("m2", &m).unwrap();
    engine.eval("same = isequal(m, m2);").unwrap();
    assert_eq!(engine.get("same").unwrap(), Value::Bool(true));
}

#[test]
fn update_stores_every_pair() {
    let Some(engine) = engine() else { return };
    let customer = Value::from(
        StructValue::new()
            .with("name", "John Doe")
            .with("billing", 127.0),
    );
    let label = Value::from("unit");
    engine
        .update([("customer", &customer), ("label", &label)])
        .unwrap();
    engine.eval("n = customer.name; l = label;").unwrap();
    assert_eq!(engine.get("n").unwrap(), Value::from("John Doe"));
    assert_eq!(engine.get("l").unwrap(), label);
    assert_eq!(engine.get("customer").unwrap(), customer);
}

#[test]
fn declined_values_are_owned_by_the_caller() {
    let Some(engine) = engine() else { return };
    engine.eval("f = @(t) t + 1;").unwrap();
    let Value::Foreign(handle) = engine.get("f").unwrap() else {
        panic!("function handles are not converted");
    };
    engine.put("g", &Value::Foreign(handle)).unwrap();
    engine.eval("r = g(1);").unwrap();
    assert_eq!(engine.get("r").unwrap(), Value::from(2.0));
    engine.mx().destroy(handle);
}

#[test]
fn missing_variable_is_a_call_error() {
    let Some(engine) = engine() else { return };
    assert!(matches!(
        engine.get("no_such_variable_here"),
        Err(EngineError::Call { .. })
    ));
}
