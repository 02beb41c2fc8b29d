use std::cell::RefCell;
use std::rc::Rc;

use tarn::{Store, Extern, Value, Trap, TrapKind};
use wasm::{GlobalType, Limits, ValueType};


fn load(text: &str) -> wasm::Module {
    let bytes = wat::parse_str(text).unwrap();
    let module = wasm::Parser::parse_module(&bytes, Default::default()).unwrap();
    wasm::Validator::validate_module(&module).unwrap();
    module
}


#[test]
fn host_function_round_trip() {
    let mut store = Store::new();

    let double = store.new_host_func(&[ValueType::I32], &[ValueType::I32], |_, args| {
        let Value::I32(v) = args[0] else { unreachable!() };
        Ok(vec![Value::I32(v * 2)])
    });

    let module = load(r#"
        (module
          (import "env" "double" (func $double (param i32) (result i32)))
          (func (export "quad") (param i32) (result i32)
            (call $double (call $double (local.get 0)))))
    "#);
    let inst = store.instantiate(&module, &[Extern::Func(double)]).unwrap();

    let quad = store.get_export_func(inst, "quad").unwrap();
    assert_eq!(store.invoke(quad, &[Value::I32(5)]).unwrap(), [Value::I32(20)]);

    // host functions are also directly invocable.
    assert_eq!(store.invoke(double, &[Value::I32(21)]).unwrap(), [Value::I32(42)]);
}

#[test]
fn host_function_observes_calls_in_order() {
    let mut store = Store::new();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = {
        let seen = seen.clone();
        store.new_host_func(&[ValueType::I32], &[], move |_, args| {
            let Value::I32(v) = args[0] else { unreachable!() };
            seen.borrow_mut().push(v);
            Ok(Vec::new())
        })
    };

    let module = load(r#"
        (module
          (import "env" "sink" (func $sink (param i32)))
          (func (export "run")
            (call $sink (i32.const 1))
            (call $sink (i32.const 2))
            (call $sink (i32.const 3))))
    "#);
    let inst = store.instantiate(&module, &[Extern::Func(sink)]).unwrap();

    let run = store.get_export_func(inst, "run").unwrap();
    store.invoke(run, &[]).unwrap();
    assert_eq!(*seen.borrow(), [1, 2, 3]);
}

#[test]
fn host_function_trap_unwinds_wasm() {
    let mut store = Store::new();

    let fail = store.new_host_func(&[], &[], |_, _| {
        Err(Trap::new(TrapKind::HostError))
    });

    let module = load(r#"
        (module
          (import "env" "fail" (func $fail))
          (func (export "go") (result i32)
            (call $fail)
            (i32.const 1)))
    "#);
    let inst = store.instantiate(&module, &[Extern::Func(fail)]).unwrap();

    let go = store.get_export_func(inst, "go").unwrap();
    let err = store.invoke(go, &[]).unwrap_err();
    assert_eq!(err.as_trap().unwrap().kind(), TrapKind::HostError);
}

#[test]
fn reentrant_host_function() {
    let mut store = Store::new();

    // the host callback calls back into the same store.
    let module = load(r#"
        (module
          (func (export "add1") (param i32) (result i32)
            (i32.add (local.get 0) (i32.const 1))))
    "#);
    let helper = store.instantiate(&module, &[]).unwrap();
    let add1 = store.get_export_func(helper, "add1").unwrap();

    let via_host = store.new_host_func(&[ValueType::I32], &[ValueType::I32], move |store, args| {
        store.invoke(add1, args).map_err(|_| Trap::new(TrapKind::HostError))
    });

    let module = load(r#"
        (module
          (import "env" "via" (func $via (param i32) (result i32)))
          (func (export "twice") (param i32) (result i32)
            (call $via (call $via (local.get 0)))))
    "#);
    let inst = store.instantiate(&module, &[Extern::Func(via_host)]).unwrap();

    let twice = store.get_export_func(inst, "twice").unwrap();
    assert_eq!(store.invoke(twice, &[Value::I32(40)]).unwrap(), [Value::I32(42)]);
}

#[test]
fn import_count_and_kind_checking() {
    let mut store = Store::new();

    let module = load(r#"
        (module (import "env" "f" (func)))
    "#);

    let err = store.instantiate(&module, &[]).unwrap_err();
    assert!(matches!(err, tarn::Error::Link(tarn::LinkError::ImportCount { .. })));

    let g = store.new_global(GlobalType { ty: ValueType::I32, mutable: false }, Value::I32(0)).unwrap();
    let err = store.instantiate(&module, &[Extern::Global(g)]).unwrap_err();
    assert!(matches!(err, tarn::Error::Link(tarn::LinkError::KindMismatch { .. })));
}

#[test]
fn import_func_type_checking() {
    let mut store = Store::new();

    let module = load(r#"
        (module (import "env" "f" (func (param i32) (result i32))))
    "#);

    let wrong = store.new_host_func(&[ValueType::I64], &[ValueType::I32], |_, _| {
        Ok(vec![Value::I32(0)])
    });
    let err = store.instantiate(&module, &[Extern::Func(wrong)]).unwrap_err();
    assert!(matches!(err, tarn::Error::Link(tarn::LinkError::FuncTypeMismatch { .. })));
}

#[test]
fn import_global_checking() {
    let mut store = Store::new();

    // the module wants a mutable i32.
    let module = load(r#"
        (module (import "env" "g" (global (mut i32))))
    "#);

    let immutable = store.new_global(GlobalType { ty: ValueType::I32, mutable: false }, Value::I32(1)).unwrap();
    let err = store.instantiate(&module, &[Extern::Global(immutable)]).unwrap_err();
    assert!(matches!(err, tarn::Error::Link(tarn::LinkError::GlobalTypeMismatch { .. })));

    let mutable = store.new_global(GlobalType { ty: ValueType::I32, mutable: true }, Value::I32(1)).unwrap();
    store.instantiate(&module, &[Extern::Global(mutable)]).unwrap();
}

#[test]
fn import_limits_subsumption() {
    let mut store = Store::new();

    let module = load(r#"
        (module (import "env" "mem" (memory 2)))
    "#);

    let small = store.new_memory(Limits { min: 1, max: None }).unwrap();
    let err = store.instantiate(&module, &[Extern::Memory(small)]).unwrap_err();
    assert!(matches!(err, tarn::Error::Link(tarn::LinkError::LimitsNotSubsumed { .. })));

    let fitting = store.new_memory(Limits { min: 2, max: None }).unwrap();
    store.instantiate(&module, &[Extern::Memory(fitting)]).unwrap();

    // a required max demands a provided max below it.
    let module = load(r#"
        (module (import "env" "mem" (memory 1 2)))
    "#);
    let unbounded = store.new_memory(Limits { min: 1, max: None }).unwrap();
    let err = store.instantiate(&module, &[Extern::Memory(unbounded)]).unwrap_err();
    assert!(matches!(err, tarn::Error::Link(tarn::LinkError::LimitsNotSubsumed { .. })));

    let bounded = store.new_memory(Limits { min: 1, max: Some(2) }).unwrap();
    store.instantiate(&module, &[Extern::Memory(bounded)]).unwrap();
}

#[test]
fn imported_global_in_initialiser() {
    let mut store = Store::new();

    let base = store.new_global(GlobalType { ty: ValueType::I32, mutable: false }, Value::I32(41)).unwrap();

    let module = load(r#"
        (module
          (import "env" "base" (global $base i32))
          (global (export "derived") i32 (global.get $base))
          (func (export "get") (result i32) (global.get $base)))
    "#);
    let inst = store.instantiate(&module, &[Extern::Global(base)]).unwrap();

    let get = store.get_export_func(inst, "get").unwrap();
    assert_eq!(store.invoke(get, &[]).unwrap(), [Value::I32(41)]);

    let derived = store.get_export_global(inst, "derived").unwrap();
    assert_eq!(store.global_get(derived), Value::I32(41));
}

#[test]
fn cross_module_function_import() {
    let mut store = Store::new();

    let provider = load(r#"
        (module (func (export "add") (param i32 i32) (result i32)
          (i32.add (local.get 0) (local.get 1))))
    "#);
    let provider = store.instantiate(&provider, &[]).unwrap();
    let add = store.get_export_func(provider, "add").unwrap();

    let consumer = load(r#"
        (module
          (import "calc" "add" (func $add (param i32 i32) (result i32)))
          (func (export "inc") (param i32) (result i32)
            (call $add (local.get 0) (i32.const 1))))
    "#);
    let consumer = store.instantiate(&consumer, &[Extern::Func(add)]).unwrap();

    let inc = store.get_export_func(consumer, "inc").unwrap();
    assert_eq!(store.invoke(inc, &[Value::I32(41)]).unwrap(), [Value::I32(42)]);
}

#[test]
fn shared_memory_between_modules() {
    let mut store = Store::new();

    let writer = load(r#"
        (module
          (memory (export "mem") 1)
          (func (export "put") (param i32 i32)
            (i32.store (local.get 0) (local.get 1))))
    "#);
    let writer = store.instantiate(&writer, &[]).unwrap();
    let mem = store.get_export_memory(writer, "mem").unwrap();

    let reader = load(r#"
        (module
          (import "w" "mem" (memory 1))
          (func (export "get") (param i32) (result i32)
            (i32.load (local.get 0))))
    "#);
    let reader = store.instantiate(&reader, &[Extern::Memory(mem)]).unwrap();

    let put = store.get_export_func(writer, "put").unwrap();
    let get = store.get_export_func(reader, "get").unwrap();

    store.invoke(put, &[Value::I32(64), Value::I32(-7)]).unwrap();
    assert_eq!(store.invoke(get, &[Value::I32(64)]).unwrap(), [Value::I32(-7)]);
}
