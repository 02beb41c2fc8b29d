use tarn::{Store, Extern, Value, TrapKind};
use wasm::Limits;


fn load(text: &str) -> wasm::Module {
    let bytes = wat::parse_str(text).unwrap();
    let module = wasm::Parser::parse_module(&bytes, Default::default()).unwrap();
    wasm::Validator::validate_module(&module).unwrap();
    module
}


#[test]
fn start_function_runs() {
    let mut store = Store::new();

    let module = load(r#"
        (module
          (global $g (export "flag") (mut i32) (i32.const 0))
          (func $init (global.set $g (i32.const 1)))
          (start $init))
    "#);
    let inst = store.instantiate(&module, &[]).unwrap();

    let flag = store.get_export_global(inst, "flag").unwrap();
    assert_eq!(store.global_get(flag), Value::I32(1));
}

#[test]
fn start_function_trap_fails_instantiation() {
    let mut store = Store::new();

    let module = load(r#"
        (module (func $boom (unreachable)) (start $boom))
    "#);
    let err = store.instantiate(&module, &[]).unwrap_err();
    assert_eq!(err.as_trap().unwrap().kind(), TrapKind::Unreachable);
}

#[test]
fn element_segment_out_of_bounds() {
    let mut store = Store::new();

    let module = load(r#"
        (module
          (table 2 funcref)
          (func $f)
          (elem (i32.const 1) $f $f))
    "#);
    let err = store.instantiate(&module, &[]).unwrap_err();
    assert_eq!(err.as_trap().unwrap().kind(), TrapKind::ElemSegmentDoesNotFit);
    assert!(err.to_string().contains("elements segment does not fit"));
}

#[test]
fn element_offset_from_imported_global() {
    let mut store = Store::new();

    let offset = store.new_global(
        wasm::GlobalType { ty: wasm::ValueType::I32, mutable: false },
        Value::I32(1)).unwrap();

    let module = load(r#"
        (module
          (import "env" "offset" (global $offset i32))
          (type $ret (func (result i32)))
          (table 3 funcref)
          (elem (global.get $offset) $f)
          (func $f (result i32) (i32.const 7))
          (func (export "call") (param i32) (result i32)
            (call_indirect (type $ret) (local.get 0))))
    "#);
    let inst = store.instantiate(&module, &[Extern::Global(offset)]).unwrap();

    let call = store.get_export_func(inst, "call").unwrap();
    assert_eq!(store.invoke(call, &[Value::I32(1)]).unwrap(), [Value::I32(7)]);
    assert_eq!(
        store.invoke(call, &[Value::I32(0)]).unwrap_err().as_trap().unwrap().kind(),
        TrapKind::UninitializedElement);
}

#[test]
fn data_segment_out_of_bounds() {
    let mut store = Store::new();

    let module = load(r#"
        (module
          (import "env" "mem" (memory 1))
          (data (i32.const 65533) "\01\02\03\04"))
    "#);

    let mem = store.new_memory(Limits { min: 1, max: None }).unwrap();
    let err = store.instantiate(&module, &[Extern::Memory(mem)]).unwrap_err();
    assert_eq!(err.as_trap().unwrap().kind(), TrapKind::DataSegmentDoesNotFit);

    // nothing was written.
    let mut bytes = [0u8; 3];
    store.memory_read(mem, 65533, &mut bytes).unwrap();
    assert_eq!(bytes, [0, 0, 0]);
}

#[test]
fn segments_are_checked_before_any_copy() {
    let mut store = Store::new();

    // the first segment fits, the second does not; the first must still
    // not be applied.
    let module = load(r#"
        (module
          (import "env" "mem" (memory 1))
          (data (i32.const 0) "\aa")
          (data (i32.const 65536) "\bb"))
    "#);

    let mem = store.new_memory(Limits { min: 1, max: None }).unwrap();
    let err = store.instantiate(&module, &[Extern::Memory(mem)]).unwrap_err();
    assert_eq!(err.as_trap().unwrap().kind(), TrapKind::DataSegmentDoesNotFit);

    let mut byte = [0xffu8; 1];
    store.memory_read(mem, 0, &mut byte).unwrap();
    assert_eq!(byte, [0]);
}

#[test]
fn instances_share_the_store() {
    let mut store = Store::new();

    let module = load(r#"
        (module
          (global $n (export "n") (mut i32) (i32.const 0))
          (func (export "bump") (result i32)
            (global.set $n (i32.add (global.get $n) (i32.const 1)))
            (global.get $n)))
    "#);

    // two instances of the same module get distinct globals.
    let a = store.instantiate(&module, &[]).unwrap();
    let b = store.instantiate(&module, &[]).unwrap();

    let bump_a = store.get_export_func(a, "bump").unwrap();
    let bump_b = store.get_export_func(b, "bump").unwrap();

    assert_eq!(store.invoke(bump_a, &[]).unwrap(), [Value::I32(1)]);
    assert_eq!(store.invoke(bump_a, &[]).unwrap(), [Value::I32(2)]);
    assert_eq!(store.invoke(bump_b, &[]).unwrap(), [Value::I32(1)]);
}
