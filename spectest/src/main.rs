//! Conformance-script runner.
//!
//! Consumes the JSON command format produced by `wast2json`: one JSON file
//! describing modules, actions and assertions, next to the pre-converted
//! `.wasm` binaries it references. Text-form modules (`module_type:
//! "text"`) are skipped; the core has no text-format reader.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use tarn::{Store, InstanceId, Extern, Value};
use wasm::{GlobalType, Limits, ValueType};


#[derive(Deserialize)]
struct Script {
    source_filename: String,
    commands: Vec<Command>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Command {
    #[serde(rename = "module")]
    Module { line: u64, name: Option<String>, filename: String },

    #[serde(rename = "register")]
    Register { line: u64, name: Option<String>, #[serde(rename = "as")] as_name: String },

    #[serde(rename = "action")]
    Action { line: u64, action: Action },

    #[serde(rename = "assert_return")]
    AssertReturn { line: u64, action: Action, #[serde(default)] expected: Vec<Val> },

    // wast2json builds from the 1.0 era emit dedicated nan commands instead
    // of nan:* expectation values.
    #[serde(rename = "assert_return_canonical_nan")]
    AssertReturnCanonicalNan { line: u64, action: Action, #[serde(default)] expected: Vec<Val> },

    #[serde(rename = "assert_return_arithmetic_nan")]
    AssertReturnArithmeticNan { line: u64, action: Action, #[serde(default)] expected: Vec<Val> },

    #[serde(rename = "assert_trap")]
    AssertTrap { line: u64, action: Action, text: String },

    #[serde(rename = "assert_exhaustion")]
    AssertExhaustion { line: u64, action: Action, text: String },

    #[serde(rename = "assert_malformed")]
    AssertMalformed { line: u64, filename: String, module_type: String },

    #[serde(rename = "assert_invalid")]
    AssertInvalid { line: u64, filename: String, module_type: String },

    #[serde(rename = "assert_unlinkable")]
    AssertUnlinkable { line: u64, filename: String, module_type: String },

    #[serde(rename = "assert_uninstantiable")]
    AssertUninstantiable { line: u64, filename: String, module_type: String },
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Action {
    #[serde(rename = "invoke")]
    Invoke { module: Option<String>, field: String, args: Vec<Val> },

    #[serde(rename = "get")]
    Get { module: Option<String>, field: String },
}

#[derive(Deserialize)]
struct Val {
    #[serde(rename = "type")]
    ty: String,
    value: Option<String>,
}

/// An expected result: a bit pattern, or a NaN class.
enum Expect {
    Exact(Value),
    CanonicalNan32,
    CanonicalNan64,
    ArithmeticNan32,
    ArithmeticNan64,
}

impl Val {
    fn to_value(&self) -> Result<Value> {
        let value = self.value.as_deref()
            .ok_or_else(|| anyhow!("value without payload"))?;
        Ok(match self.ty.as_str() {
            "i32" => Value::I32(value.parse::<u32>()? as i32),
            "i64" => Value::I64(value.parse::<u64>()? as i64),
            "f32" => Value::F32(f32::from_bits(value.parse::<u32>()?)),
            "f64" => Value::F64(f64::from_bits(value.parse::<u64>()?)),
            ty => bail!("unsupported value type {ty:?}"),
        })
    }

    fn to_expect(&self) -> Result<Expect> {
        Ok(match (self.ty.as_str(), self.value.as_deref()) {
            ("f32", Some("nan:canonical"))  => Expect::CanonicalNan32,
            ("f64", Some("nan:canonical"))  => Expect::CanonicalNan64,
            ("f32", Some("nan:arithmetic")) => Expect::ArithmeticNan32,
            ("f64", Some("nan:arithmetic")) => Expect::ArithmeticNan64,

            // the dedicated nan assertion commands carry typed,
            // payload-less expectations.
            ("f32", None) => Expect::CanonicalNan32,
            ("f64", None) => Expect::CanonicalNan64,

            _ => Expect::Exact(self.to_value()?),
        })
    }
}

impl Expect {
    fn matches(&self, actual: Value) -> bool {
        match (self, actual) {
            (Expect::Exact(Value::I32(e)), Value::I32(a)) => *e == a,
            (Expect::Exact(Value::I64(e)), Value::I64(a)) => *e == a,
            (Expect::Exact(Value::F32(e)), Value::F32(a)) => e.to_bits() == a.to_bits(),
            (Expect::Exact(Value::F64(e)), Value::F64(a)) => e.to_bits() == a.to_bits(),

            (Expect::CanonicalNan32, Value::F32(a)) => a.to_bits() & 0x7fff_ffff == 0x7fc0_0000,
            (Expect::CanonicalNan64, Value::F64(a)) => {
                a.to_bits() & 0x7fff_ffff_ffff_ffff == 0x7ff8_0000_0000_0000
            }
            (Expect::ArithmeticNan32, Value::F32(a)) => a.to_bits() & 0x0040_0000 != 0,
            (Expect::ArithmeticNan64, Value::F64(a)) => a.to_bits() & 0x0008_0000_0000_0000 != 0,

            _ => false,
        }
    }
}


/// How far a module made it through decode -> validate -> link ->
/// instantiate. The assert_* commands each expect a specific stage to fail.
enum LoadOutcome {
    Instantiated(InstanceId),
    Malformed(String),
    Invalid(String),
    Unlinkable(String),
    Uninstantiable(String),
}

struct Runner {
    store: Store,
    dir:   PathBuf,

    last:     Option<InstanceId>,
    named:    HashMap<String, InstanceId>,
    /// import-module name -> export map, fed by `register` and the
    /// built-in spectest module.
    registry: HashMap<String, Vec<(String, Extern)>>,

    passed: u32,
    failed: u32,
}

impl Runner {
    fn new(dir: PathBuf) -> Result<Runner> {
        let mut store = Store::new();
        let spectest = spectest_exports(&mut store)?;

        let mut registry = HashMap::new();
        registry.insert("spectest".to_string(), spectest);

        Ok(Runner {
            store,
            dir,
            last: None,
            named: HashMap::new(),
            registry,
            passed: 0,
            failed: 0,
        })
    }

    fn load(&mut self, filename: &str) -> Result<LoadOutcome> {
        let path = self.dir.join(filename);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("reading {}", path.display()))?;

        let module = match wasm::Parser::parse_module(&bytes, Default::default()) {
            Ok(module) => module,
            Err(err) => return Ok(LoadOutcome::Malformed(err.to_string())),
        };

        if let Err(err) = wasm::Validator::validate_module(&module) {
            return Ok(LoadOutcome::Invalid(err.to_string()));
        }

        let mut imports = Vec::with_capacity(module.imports.imports.len());
        for import in &module.imports.imports {
            let found = self.registry.get(&import.module)
                .and_then(|exports| {
                    exports.iter().rev()
                        .find(|(name, _)| *name == import.name)
                        .map(|(_, value)| *value)
                });
            match found {
                Some(value) => imports.push(value),
                None => return Ok(LoadOutcome::Unlinkable(
                    format!("unknown import {}::{}", import.module, import.name))),
            }
        }

        Ok(match self.store.instantiate(&module, &imports) {
            Ok(instance) => LoadOutcome::Instantiated(instance),
            Err(err @ tarn::Error::Trap(_)) => LoadOutcome::Uninstantiable(err.to_string()),
            Err(err) => LoadOutcome::Unlinkable(err.to_string()),
        })
    }

    fn instance(&self, name: &Option<String>) -> Result<InstanceId> {
        match name {
            Some(name) => self.named.get(name).copied()
                .ok_or_else(|| anyhow!("unknown module {name}")),
            None => self.last
                .ok_or_else(|| anyhow!("no module instantiated yet")),
        }
    }

    fn run_action(&mut self, action: &Action) -> Result<Result<Vec<Value>, tarn::Error>> {
        match action {
            Action::Invoke { module, field, args } => {
                let instance = self.instance(module)?;
                let func = self.store.get_export_func(instance, field)
                    .ok_or_else(|| anyhow!("no exported function {field:?}"))?;
                let args = args.iter().map(Val::to_value).collect::<Result<Vec<_>>>()?;
                Ok(self.store.invoke(func, &args))
            }

            Action::Get { module, field } => {
                let instance = self.instance(module)?;
                let global = self.store.get_export_global(instance, field)
                    .ok_or_else(|| anyhow!("no exported global {field:?}"))?;
                Ok(Ok(vec![self.store.global_get(global)]))
            }
        }
    }

    fn check(&mut self, source: &str, line: u64, result: Result<(), String>) {
        match result {
            Ok(()) => self.passed += 1,
            Err(detail) => {
                self.failed += 1;
                println!("FAIL {source}:{line}: {detail}");
            }
        }
    }

    fn command(&mut self, source: &str, command: &Command) -> Result<()> {
        match command {
            Command::Module { line, name, filename } => {
                let result = match self.load(filename)? {
                    LoadOutcome::Instantiated(instance) => {
                        self.last = Some(instance);
                        if let Some(name) = name {
                            self.named.insert(name.clone(), instance);
                        }
                        Ok(())
                    }
                    LoadOutcome::Malformed(e)
                    | LoadOutcome::Invalid(e)
                    | LoadOutcome::Unlinkable(e)
                    | LoadOutcome::Uninstantiable(e) => {
                        Err(format!("module {filename} failed to load: {e}"))
                    }
                };
                self.check(source, *line, result);
            }

            Command::Register { line, name, as_name } => {
                let result = match self.instance(name) {
                    Ok(instance) => {
                        let exports = self.store.exports(instance).to_vec();
                        self.registry.insert(as_name.clone(), exports);
                        Ok(())
                    }
                    Err(e) => Err(e.to_string()),
                };
                self.check(source, *line, result);
            }

            Command::Action { line, action } => {
                let result = match self.run_action(action)? {
                    Ok(_) => Ok(()),
                    Err(e) => Err(format!("action failed: {e}")),
                };
                self.check(source, *line, result);
            }

            Command::AssertReturn { line, action, expected }
            | Command::AssertReturnCanonicalNan { line, action, expected }
            | Command::AssertReturnArithmeticNan { line, action, expected } => {
                let expected = expected.iter()
                    .map(Val::to_expect)
                    .collect::<Result<Vec<_>>>()?;

                let result = match self.run_action(action)? {
                    Err(e) => Err(format!("expected results, got {e}")),
                    Ok(actual) => {
                        if actual.len() == expected.len()
                            && expected.iter().zip(&actual).all(|(e, a)| e.matches(*a))
                        {
                            Ok(())
                        }
                        else {
                            Err(format!("result mismatch, got {actual:?}"))
                        }
                    }
                };
                self.check(source, *line, result);
            }

            Command::AssertTrap { line, action, text }
            | Command::AssertExhaustion { line, action, text } => {
                let result = match self.run_action(action)? {
                    Ok(actual) => Err(format!("expected trap {text:?}, got {actual:?}")),
                    Err(err) => match err.as_trap() {
                        Some(trap) if trap.to_string().contains(text.as_str())
                            || text.contains(&trap.to_string()) => Ok(()),
                        Some(trap) => Err(format!("expected trap {text:?}, got {trap:?}")),
                        None => Err(format!("expected trap {text:?}, got {err}")),
                    },
                };
                self.check(source, *line, result);
            }

            Command::AssertMalformed { line, filename, module_type } => {
                if module_type == "text" {
                    return Ok(());
                }
                let result = match self.load(filename)? {
                    LoadOutcome::Malformed(_) => Ok(()),
                    _ => Err(format!("{filename} should be malformed")),
                };
                self.check(source, *line, result);
            }

            Command::AssertInvalid { line, filename, module_type } => {
                if module_type == "text" {
                    return Ok(());
                }
                let result = match self.load(filename)? {
                    LoadOutcome::Invalid(_) => Ok(()),
                    LoadOutcome::Malformed(e) => {
                        Err(format!("{filename} failed to decode instead of to validate: {e}"))
                    }
                    _ => Err(format!("{filename} should be invalid")),
                };
                self.check(source, *line, result);
            }

            Command::AssertUnlinkable { line, filename, module_type } => {
                if module_type == "text" {
                    return Ok(());
                }
                let result = match self.load(filename)? {
                    // segment bounds failures surface as instantiation
                    // traps but belong to this assertion in the suite.
                    LoadOutcome::Unlinkable(_) | LoadOutcome::Uninstantiable(_) => Ok(()),
                    _ => Err(format!("{filename} should be unlinkable")),
                };
                self.check(source, *line, result);
            }

            Command::AssertUninstantiable { line, filename, module_type } => {
                if module_type == "text" {
                    return Ok(());
                }
                let result = match self.load(filename)? {
                    LoadOutcome::Uninstantiable(_) => Ok(()),
                    _ => Err(format!("{filename} should fail to instantiate")),
                };
                self.check(source, *line, result);
            }
        }
        Ok(())
    }
}


/// The host module the suite imports from: no-op printers, a few constant
/// globals (the i32 one must be 666), a small memory and table.
fn spectest_exports(store: &mut Store) -> Result<Vec<(String, Extern)>> {
    use ValueType::*;

    let mut exports = Vec::new();

    let print_sigs: &[(&str, &[ValueType])] = &[
        ("print", &[]),
        ("print_i32", &[I32]),
        ("print_i64", &[I64]),
        ("print_f32", &[F32]),
        ("print_f64", &[F64]),
        ("print_i32_f32", &[I32, F32]),
        ("print_f64_f64", &[F64, F64]),
    ];
    for (name, params) in print_sigs {
        let func = store.new_host_func(params, &[], |_, args| {
            log::trace!("spectest print: {args:?}");
            Ok(Vec::new())
        });
        exports.push((name.to_string(), Extern::Func(func)));
    }

    let const_global = |store: &mut Store, ty, value| {
        store.new_global(GlobalType { ty, mutable: false }, value)
    };
    let global_i32 = const_global(store, I32, Value::I32(666))?;
    let global_i64 = const_global(store, I64, Value::I64(666))?;
    let global_f32 = const_global(store, F32, Value::F32(666.6))?;
    let global_f64 = const_global(store, F64, Value::F64(666.6))?;

    // older suites import plain "global".
    exports.push(("global".to_string(), Extern::Global(global_i32)));
    exports.push(("global_i32".to_string(), Extern::Global(global_i32)));
    exports.push(("global_i64".to_string(), Extern::Global(global_i64)));
    exports.push(("global_f32".to_string(), Extern::Global(global_f32)));
    exports.push(("global_f64".to_string(), Extern::Global(global_f64)));

    let memory = store.new_memory(Limits { min: 1, max: Some(2) })?;
    exports.push(("memory".to_string(), Extern::Memory(memory)));

    let table = store.new_table(Limits { min: 10, max: Some(20) })?;
    exports.push(("table".to_string(), Extern::Table(table)));

    Ok(exports)
}


fn run_script(path: &Path) -> Result<(u32, u32)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let script: Script = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;

    let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let mut runner = Runner::new(dir)?;

    for command in &script.commands {
        runner.command(&script.source_filename, command)?;
    }

    Ok((runner.passed, runner.failed))
}

fn main() -> Result<()> {
    env_logger::init();

    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        bail!("usage: spectest <script.json>...");
    }

    let mut passed = 0;
    let mut failed = 0;
    for path in &paths {
        log::info!("running {}", path.display());
        let (p, f) = run_script(path)?;
        passed += p;
        failed += f;
    }

    println!("{} checks, {passed} passed, {failed} failed", passed + failed);
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
