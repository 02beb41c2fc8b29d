use tarn::{Store, InstanceId, Value, TrapKind};


fn instantiate(store: &mut Store, text: &str) -> InstanceId {
    let bytes = wat::parse_str(text).unwrap();
    let module = wasm::Parser::parse_module(&bytes, Default::default()).unwrap();
    wasm::Validator::validate_module(&module).unwrap();
    store.instantiate(&module, &[]).unwrap()
}

fn trap_kind(err: tarn::Error) -> TrapKind {
    err.as_trap().expect("expected a trap").kind()
}


#[test]
fn unreachable() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, r#"
        (module (func (export "boom") (unreachable)))
    "#);

    let boom = store.get_export_func(inst, "boom").unwrap();
    let err = store.invoke(boom, &[]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::Unreachable);

    let err = store.invoke(boom, &[]).unwrap_err();
    assert!(err.to_string().contains("unreachable"));
}

#[test]
fn integer_division() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, r#"
        (module
          (func (export "div_s") (param i32 i32) (result i32)
            (i32.div_s (local.get 0) (local.get 1)))
          (func (export "rem_s") (param i32 i32) (result i32)
            (i32.rem_s (local.get 0) (local.get 1)))
          (func (export "div_u64") (param i64 i64) (result i64)
            (i64.div_u (local.get 0) (local.get 1))))
    "#);

    let div_s = store.get_export_func(inst, "div_s").unwrap();
    let err = store.invoke(div_s, &[Value::I32(i32::MIN), Value::I32(-1)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::IntegerOverflow);
    let err = store.invoke(div_s, &[Value::I32(10), Value::I32(0)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::IntegerDivideByZero);
    assert_eq!(store.invoke(div_s, &[Value::I32(-7), Value::I32(2)]).unwrap(), [Value::I32(-3)]);

    // rem_s of INT_MIN by -1 is 0, not a trap.
    let rem_s = store.get_export_func(inst, "rem_s").unwrap();
    assert_eq!(store.invoke(rem_s, &[Value::I32(i32::MIN), Value::I32(-1)]).unwrap(), [Value::I32(0)]);

    let div_u64 = store.get_export_func(inst, "div_u64").unwrap();
    let err = store.invoke(div_u64, &[Value::I64(1), Value::I64(0)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::IntegerDivideByZero);
}

#[test]
fn truncation() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, r#"
        (module
          (func (export "t32") (param f32) (result i32)
            (i32.trunc_f32_s (local.get 0)))
          (func (export "t64u") (param f64) (result i64)
            (i64.trunc_f64_u (local.get 0))))
    "#);

    let t32 = store.get_export_func(inst, "t32").unwrap();
    assert_eq!(store.invoke(t32, &[Value::F32(42.7)]).unwrap(), [Value::I32(42)]);
    assert_eq!(store.invoke(t32, &[Value::F32(-42.7)]).unwrap(), [Value::I32(-42)]);

    let err = store.invoke(t32, &[Value::F32(f32::NAN)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::InvalidConversionToInteger);
    let err = store.invoke(t32, &[Value::F32(3.0e9)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::IntegerOverflow);
    let err = store.invoke(t32, &[Value::F32(f32::NEG_INFINITY)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::IntegerOverflow);

    let t64u = store.get_export_func(inst, "t64u").unwrap();
    assert_eq!(store.invoke(t64u, &[Value::F64(1e18)]).unwrap(), [Value::I64(1_000_000_000_000_000_000)]);
    let err = store.invoke(t64u, &[Value::F64(-1.0)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::IntegerOverflow);
}

#[test]
fn call_stack_exhaustion() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, r#"
        (module (func $f (export "inf") (call $f)))
    "#);

    let inf = store.get_export_func(inst, "inf").unwrap();
    let err = store.invoke(inf, &[]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::CallStackExhausted);
}

#[test]
fn trap_unwinds_but_keeps_writes() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, r#"
        (module
          (global $g (export "g") (mut i32) (i32.const 0))
          (func (export "poke")
            (global.set $g (i32.const 7))
            (unreachable)))
    "#);

    let poke = store.get_export_func(inst, "poke").unwrap();
    let err = store.invoke(poke, &[]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::Unreachable);

    // the write before the trap is not rolled back.
    let g = store.get_export_global(inst, "g").unwrap();
    assert_eq!(store.global_get(g), Value::I32(7));

    // and the store stays usable.
    assert_eq!(trap_kind(store.invoke(poke, &[]).unwrap_err()), TrapKind::Unreachable);
}

#[test]
fn trap_in_nested_call_unwinds_all_frames() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, r#"
        (module
          (func $inner (result i32) (unreachable))
          (func $middle (result i32) (call $inner))
          (func (export "outer") (result i32)
            (i32.add (i32.const 1) (call $middle))))
    "#);

    let outer = store.get_export_func(inst, "outer").unwrap();
    let err = store.invoke(outer, &[]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::Unreachable);
}
