use std::env;
use std::fs;
use std::process::ExitCode;

use floyd::{
    compile, new_interpreter, run_main, ArgValues, HeapData, HostFunctions, RunOptions, RunResult,
    RuntimeError, StructDefs, Value,
};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(EnvFilter::from_env("FLOYD_LOG"))
        .without_time()
        .with_target(false)
        .try_init();

    let args: Vec<String> = env::args().collect();
    let Some(file_path) = args.get(1) else {
        eprintln!("usage: floyd <path-to-source>");
        return ExitCode::from(2);
    };

    let source = match fs::read_to_string(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error reading {file_path}: {err}");
            return ExitCode::from(2);
        }
    };

    let program = match compile(&source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("compile error: {err}");
            return ExitCode::from(1);
        }
    };
    tracing::debug!(functions = program.functions.len(), "compiled program");

    let host = CliHost {
        structs: program.structs.clone(),
    };
    let mut interp = match new_interpreter(program, RunOptions { host: Box::new(host) }) {
        Ok(interp) => interp,
        Err(err) => {
            eprintln!("error initializing globals: {err}");
            return ExitCode::from(3);
        }
    };

    match run_main(&mut interp) {
        Ok(value) => {
            tracing::info!(result = %value.display_with_heap(interp.heap()), "main returned");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("runtime error: {err}");
            ExitCode::from(3)
        }
    }
}

/// The concrete host function library the CLI registers (spec.md §6):
/// `print`, `size`, `update`, `to_pretty_string_json`, `to_string`. Only
/// these five names are wired up, matching `host_signatures.rs`'s table.
struct CliHost {
    structs: StructDefs,
}

impl HostFunctions for CliHost {
    fn call(&mut self, id: u32, name: &str, mut args: ArgValues<'_>) -> RunResult<Value> {
        let result = match name {
            "print" => {
                println!("{}", args.value(0).display_with_heap(args.heap()));
                Ok(Value::Undefined)
            }
            "size" => size(&args),
            "to_string" => Ok(to_string(&mut args)),
            "to_pretty_string_json" => to_pretty_string_json(&mut args, id),
            "update" => update(&mut args, &self.structs, id),
            other => Err(RuntimeError::HostFunctionError {
                id,
                message: format!("unregistered host function '{other}'"),
            }),
        };
        args.finish();
        result
    }
}

fn size(args: &ArgValues<'_>) -> RunResult<Value> {
    let len = match args.value(0) {
        Value::Ref(id) => match args.heap().get(*id) {
            HeapData::String(s) => s.chars().count(),
            HeapData::Vector { items, .. } => items.len(),
            HeapData::Dict { entries, .. } => entries.len(),
            HeapData::Json(serde_json::Value::Array(items)) => items.len(),
            HeapData::Json(serde_json::Value::Object(map)) => map.len(),
            HeapData::Json(serde_json::Value::String(s)) => s.chars().count(),
            other => {
                return Err(RuntimeError::HostFunctionError {
                    id: 0,
                    message: format!("size: unsupported value of kind '{}'", other.type_name()),
                })
            }
        },
        _ => {
            return Err(RuntimeError::HostFunctionError {
                id: 0,
                message: "size: argument has no length".to_owned(),
            })
        }
    };
    Ok(Value::Int(i64::try_from(len).expect("length fits in i64")))
}

fn to_string(args: &mut ArgValues<'_>) -> Value {
    let s = args.value(0).display_with_heap(args.heap());
    let id = args.heap_mut().allocate(HeapData::String(s));
    Value::Ref(id)
}

fn to_pretty_string_json(args: &mut ArgValues<'_>, id: u32) -> RunResult<Value> {
    let Value::Ref(json_id) = *args.value(0) else {
        return Err(RuntimeError::HostFunctionError {
            id,
            message: "to_pretty_string_json: argument must be a json value".to_owned(),
        });
    };
    let pretty = match args.heap().get(json_id) {
        HeapData::Json(json) => {
            serde_json::to_string_pretty(json).expect("json value is always serializable")
        }
        _ => {
            return Err(RuntimeError::HostFunctionError {
                id,
                message: "to_pretty_string_json: argument must be a json value".to_owned(),
            })
        }
    };
    let new_id = args.heap_mut().allocate(HeapData::String(pretty));
    Ok(Value::Ref(new_id))
}

fn update(args: &mut ArgValues<'_>, structs: &StructDefs, id: u32) -> RunResult<Value> {
    let Value::Ref(struct_id) = *args.value(0) else {
        return Err(RuntimeError::HostFunctionError {
            id,
            message: "update: first argument must be a struct".to_owned(),
        });
    };
    let (type_name, raw_members) = match args.heap().get(struct_id) {
        HeapData::Struct { type_name, members } => {
            (type_name.clone(), members.iter().map(raw_copy).collect::<Vec<_>>())
        }
        _ => {
            return Err(RuntimeError::HostFunctionError {
                id,
                message: "update: first argument must be a struct".to_owned(),
            })
        }
    };
    let Value::Ref(path_id) = *args.value(1) else {
        return Err(RuntimeError::HostFunctionError {
            id,
            message: "update: second argument must be a member name".to_owned(),
        });
    };
    let member_index = match args.heap().get(path_id) {
        HeapData::String(path) => {
            let shape = structs.get(&type_name).ok_or_else(|| RuntimeError::HostFunctionError {
                id,
                message: format!("update: unknown struct type '{type_name}'"),
            })?;
            shape.member_index(path).ok_or_else(|| RuntimeError::HostFunctionError {
                id,
                message: format!("update: '{type_name}' has no member '{path}'"),
            })?
        }
        _ => {
            return Err(RuntimeError::HostFunctionError {
                id,
                message: "update: second argument must be a member name".to_owned(),
            })
        }
    };
    let replacement = raw_copy(args.value(2));

    let mut new_members = Vec::with_capacity(raw_members.len());
    for raw in raw_members {
        new_members.push(finish_raw(raw, args.heap_mut()));
    }
    new_members[member_index] = finish_raw(replacement, args.heap_mut());

    let new_id = args.heap_mut().allocate(HeapData::Struct { type_name, members: new_members });
    Ok(Value::Ref(new_id))
}

/// Copies a `Value` without bumping its refcount; pair with `finish_raw`
/// once the heap borrow this was read under has ended (mirrors the
/// interpreter's own register-copy sequencing).
fn raw_copy(v: &Value) -> Value {
    match v {
        Value::Ref(heap_id) => Value::Ref(*heap_id),
        Value::Undefined => Value::Undefined,
        Value::Bool(b) => Value::Bool(*b),
        Value::Int(n) => Value::Int(*n),
        Value::Float(f) => Value::Float(*f),
    }
}

fn finish_raw(raw: Value, heap: &mut floyd::Heap) -> Value {
    if let Value::Ref(heap_id) = raw {
        heap.inc_ref(heap_id);
    }
    raw
}
