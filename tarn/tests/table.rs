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

const MODULE: &str = r#"
    (module
      (type $ret_i32 (func (result i32)))
      (table (export "tab") 4 funcref)
      (elem (i32.const 0) $ten $twenty $wrong_type)
      (func $ten (result i32) (i32.const 10))
      (func $twenty (export "twenty") (result i32) (i32.const 20))
      (func $wrong_type (result f32) (f32.const 1.5))
      (func (export "call_by_idx") (param i32) (result i32)
        (call_indirect (type $ret_i32) (local.get 0))))
"#;


#[test]
fn indirect_dispatch() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, MODULE);

    let call = store.get_export_func(inst, "call_by_idx").unwrap();
    assert_eq!(store.invoke(call, &[Value::I32(0)]).unwrap(), [Value::I32(10)]);
    assert_eq!(store.invoke(call, &[Value::I32(1)]).unwrap(), [Value::I32(20)]);
}

#[test]
fn indirect_traps() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, MODULE);

    let call = store.get_export_func(inst, "call_by_idx").unwrap();

    // index past the table.
    let err = store.invoke(call, &[Value::I32(4)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::UndefinedElement);

    // slot 3 was never initialised.
    let err = store.invoke(call, &[Value::I32(3)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::UninitializedElement);

    // slot 2 holds a function of the wrong type.
    let err = store.invoke(call, &[Value::I32(2)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::IndirectCallTypeMismatch);
    assert!(store.invoke(call, &[Value::I32(2)]).unwrap_err()
        .to_string().contains("indirect call type mismatch"));
}

#[test]
fn host_table_mutation() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, MODULE);

    let tab = store.get_export_table(inst, "tab").unwrap();
    let call = store.get_export_func(inst, "call_by_idx").unwrap();

    assert!(store.table_get(tab, 0).unwrap().is_some());
    assert!(store.table_get(tab, 3).unwrap().is_none());
    assert!(store.table_get(tab, 4).is_err());

    // fill the empty slot from the host and call through it.
    let twenty = store.get_export_func(inst, "twenty").unwrap();
    store.table_set(tab, 3, Some(twenty)).unwrap();
    assert_eq!(store.invoke(call, &[Value::I32(3)]).unwrap(), [Value::I32(20)]);

    // clearing a slot brings the trap back.
    store.table_set(tab, 1, None).unwrap();
    let err = store.invoke(call, &[Value::I32(1)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::UninitializedElement);
}
