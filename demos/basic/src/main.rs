use anyhow::Result;

use tarn::{Store, Value};


fn main() -> Result<()> {
    env_logger::init();

    let bytes = wat::parse_str(r#"
        (module
          (func (export "add") (param i32 i32) (result i32)
            (i32.add (local.get 0) (local.get 1)))
          (func (export "gcd") (param i32 i32) (result i32)
            (block $done
              (loop $top
                (br_if $done (i32.eqz (local.get 1)))
                (local.set 1
                  (i32.rem_u (local.get 0)
                    (local.tee 0 (local.get 1))))
                (br $top)))
            (local.get 0)))
    "#)?;

    let module = wasm::Parser::parse_module(&bytes, Default::default())?;
    wasm::Validator::validate_module(&module)?;

    let mut store = Store::new();
    let inst = store.instantiate(&module, &[])?;

    let add = store.get_export_func(inst, "add").unwrap();
    let results = store.invoke(add, &[Value::I32(7), Value::I32(35)])?;
    println!("add(7, 35) = {results:?}");

    let gcd = store.get_export_func(inst, "gcd").unwrap();
    let results = store.invoke(gcd, &[Value::I32(1071), Value::I32(462)])?;
    println!("gcd(1071, 462) = {results:?}");

    Ok(())
}
