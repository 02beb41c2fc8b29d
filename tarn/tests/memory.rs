use tarn::{Store, InstanceId, Value, TrapKind};

use wasm::PAGE_SIZE32;


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
      (memory (export "mem") 1 4)
      (func (export "size") (result i32) (memory.size))
      (func (export "grow") (param i32) (result i32) (memory.grow (local.get 0)))
      (func (export "store32") (param i32 i32)
        (i32.store (local.get 0) (local.get 1)))
      (func (export "load32") (param i32) (result i32)
        (i32.load (local.get 0)))
      (func (export "load8_s") (param i32) (result i32)
        (i32.load8_s (local.get 0)))
      (func (export "load8_u") (param i32) (result i32)
        (i32.load8_u (local.get 0)))
      (func (export "store64") (param i32 i64)
        (i64.store (local.get 0) (local.get 1)))
      (func (export "load32_u64") (param i32) (result i64)
        (i64.load32_u (local.get 0)))
      (func (export "load_far") (param i32) (result i32)
        (i32.load offset=65532 (local.get 0))))
"#;


#[test]
fn page_accounting() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, MODULE);

    let size = store.get_export_func(inst, "size").unwrap();
    let grow = store.get_export_func(inst, "grow").unwrap();
    let store32 = store.get_export_func(inst, "store32").unwrap();

    assert_eq!(store.invoke(size, &[]).unwrap(), [Value::I32(1)]);
    assert_eq!(store.invoke(grow, &[Value::I32(2)]).unwrap(), [Value::I32(1)]);
    assert_eq!(store.invoke(size, &[]).unwrap(), [Value::I32(3)]);

    // a 4-byte store at the very end of page 3 fits...
    let end = 3 * PAGE_SIZE32 - 4;
    store.invoke(store32, &[Value::I32(end as i32), Value::I32(-1)]).unwrap();

    // ...one byte further does not.
    let err = store.invoke(store32, &[Value::I32(end as i32 + 1), Value::I32(-1)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::MemoryOutOfBounds);

    // growing past the declared max fails with -1 and changes nothing.
    assert_eq!(store.invoke(grow, &[Value::I32(2)]).unwrap(), [Value::I32(-1)]);
    assert_eq!(store.invoke(size, &[]).unwrap(), [Value::I32(3)]);
    assert_eq!(store.invoke(grow, &[Value::I32(1)]).unwrap(), [Value::I32(3)]);
    assert_eq!(store.invoke(size, &[]).unwrap(), [Value::I32(4)]);
}

#[test]
fn little_endian_and_extension() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, MODULE);

    let store32 = store.get_export_func(inst, "store32").unwrap();
    let load8_s = store.get_export_func(inst, "load8_s").unwrap();
    let load8_u = store.get_export_func(inst, "load8_u").unwrap();

    store.invoke(store32, &[Value::I32(0), Value::I32(0x0102_0304)]).unwrap();

    let mem = store.get_export_memory(inst, "mem").unwrap();
    let mut bytes = [0u8; 4];
    store.memory_read(mem, 0, &mut bytes).unwrap();
    assert_eq!(bytes, [4, 3, 2, 1]);

    store.invoke(store32, &[Value::I32(8), Value::I32(-128)]).unwrap();
    assert_eq!(store.invoke(load8_s, &[Value::I32(8)]).unwrap(), [Value::I32(-128)]);
    assert_eq!(store.invoke(load8_u, &[Value::I32(8)]).unwrap(), [Value::I32(128)]);

    let store64 = store.get_export_func(inst, "store64").unwrap();
    let load32_u64 = store.get_export_func(inst, "load32_u64").unwrap();
    store.invoke(store64, &[Value::I32(16), Value::I64(-1)]).unwrap();
    assert_eq!(store.invoke(load32_u64, &[Value::I32(16)]).unwrap(), [Value::I64(0xffff_ffff)]);
}

#[test]
fn static_offset_is_part_of_the_address() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, MODULE);

    let load_far = store.get_export_func(inst, "load_far").unwrap();

    // 0 + 65532 + 4 = 65536 bytes: exactly in bounds on one page.
    assert_eq!(store.invoke(load_far, &[Value::I32(0)]).unwrap(), [Value::I32(0)]);

    // 4 + 65532 + 4 crosses the page end.
    let err = store.invoke(load_far, &[Value::I32(4)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::MemoryOutOfBounds);

    // the effective address is 64-bit: no wraparound back into bounds.
    let err = store.invoke(load_far, &[Value::I32(-4)]).unwrap_err();
    assert_eq!(trap_kind(err), TrapKind::MemoryOutOfBounds);
}

#[test]
fn data_segments_initialise_memory() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, r#"
        (module
          (memory (export "mem") 1)
          (data (i32.const 8) "\2a\00\00\00")
          (data (i32.const 16) "ab")
          (func (export "get") (param i32) (result i32)
            (i32.load (local.get 0))))
    "#);

    let get = store.get_export_func(inst, "get").unwrap();
    assert_eq!(store.invoke(get, &[Value::I32(8)]).unwrap(), [Value::I32(42)]);

    let mem = store.get_export_memory(inst, "mem").unwrap();
    let mut bytes = [0u8; 2];
    store.memory_read(mem, 16, &mut bytes).unwrap();
    assert_eq!(&bytes, b"ab");
}

#[test]
fn host_accessors() {
    let mut store = Store::new();
    let inst = instantiate(&mut store, MODULE);
    let mem = store.get_export_memory(inst, "mem").unwrap();

    assert_eq!(store.memory_size(mem), 1);
    store.memory_write(mem, 100, &[1, 2, 3]).unwrap();

    let load32 = store.get_export_func(inst, "load32").unwrap();
    assert_eq!(store.invoke(load32, &[Value::I32(100)]).unwrap(), [Value::I32(0x0003_0201)]);

    let mut buf = [0u8; 4];
    assert!(store.memory_read(mem, PAGE_SIZE32 - 3, &mut buf).is_err());
    assert!(store.memory_write(mem, PAGE_SIZE32, &[0]).is_err());

    assert_eq!(store.memory_grow(mem, 1), Some(1));
    assert_eq!(store.memory_size(mem), 2);
    store.memory_write(mem, PAGE_SIZE32, &[9]).unwrap();
}
