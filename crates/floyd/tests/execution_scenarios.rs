//! End-to-end scenarios covering compile → run for the whole pipeline
//! (spec.md §8 "Testable properties", concrete scenarios 1-6), plus the
//! runtime/compile error cases spec.md §7 calls out. Mirrors the teacher's
//! `os_tests.rs` shape: small helpers up top, one `#[test]` per scenario,
//! grouped with separator comments.

use floyd::{
    call_function, compile, find_global, interpreter_to_json, new_interpreter, run_main, HeapData,
    NoHostFunctions, RunOptions, RuntimeError, Value,
};

fn run(source: &str) -> Value {
    let program = compile(source).expect("compiles");
    let mut interp = new_interpreter(program, RunOptions::default()).expect("globals init");
    run_main(&mut interp).expect("runs")
}

fn run_with_string_arg(source: &str, arg: &str) -> Value {
    let program = compile(source).expect("compiles");
    let mut interp = new_interpreter(program, RunOptions::default()).expect("globals init");
    let arg_id = interp.heap_mut().allocate(HeapData::String(arg.to_owned()));
    let (index, _) = interp.program().find_function("main").expect("has main");
    interp
        .call_function_index(index, vec![Value::Ref(arg_id)])
        .expect("runs")
}

fn assert_int(value: &Value, expected: i64) {
    assert!(matches!(value, Value::Int(v) if *v == expected), "expected Int({expected}), got {value:?}");
}

fn assert_heap_string(value: &Value, heap: &floyd::Heap, expected: &str) {
    let Value::Ref(id) = value else { panic!("expected a ref, got {value:?}") };
    match heap.get(*id) {
        HeapData::String(s) => assert_eq!(s, expected),
        other => panic!("expected a string, got {other:?}"),
    }
}

// =============================================================================
// spec.md §8 concrete scenarios
// =============================================================================

#[test]
fn scenario_one_arithmetic_ignores_unused_arg() {
    let result = run_with_string_arg("int main(string a){ return 3 + 4; }", "x");
    assert_int(&result, 7);
}

#[test]
fn scenario_two_string_concat() {
    let program = compile(r#"string main(string a){ return "123" + "456"; }"#).expect("compiles");
    let mut interp = new_interpreter(program, RunOptions::default()).expect("globals init");
    let arg_id = interp.heap_mut().allocate(HeapData::String("n".to_owned()));
    let (index, _) = interp.program().find_function("main").expect("has main");
    let result = interp.call_function_index(index, vec![Value::Ref(arg_id)]).expect("runs");
    assert_heap_string(&result, interp.heap(), "123456");
}

#[test]
fn scenario_three_function_calls_and_arithmetic() {
    let result = run("int f(){ return 5; } int main(){ return f() + f()*2; }");
    assert_int(&result, 15);
}

#[test]
fn scenario_four_string_wrapping() {
    let program = compile(r#"string main(string a){ return "-" + a + "-"; }"#).expect("compiles");
    let mut interp = new_interpreter(program, RunOptions::default()).expect("globals init");
    let arg_id = interp.heap_mut().allocate(HeapData::String("xyz".to_owned()));
    let (index, _) = interp.program().find_function("main").expect("has main");
    let result = interp.call_function_index(index, vec![Value::Ref(arg_id)]).expect("runs");
    assert_heap_string(&result, interp.heap(), "-xyz-");
}

#[test]
fn scenario_five_division_by_zero_is_a_runtime_error() {
    let program = compile("int main(string a){ return 2/0; }").expect("compiles");
    let mut interp = new_interpreter(program, RunOptions::default()).expect("globals init");
    let arg_id = interp.heap_mut().allocate(HeapData::String("x".to_owned()));
    let (index, _) = interp.program().find_function("main").expect("has main");
    let err = interp.call_function_index(index, vec![Value::Ref(arg_id)]).unwrap_err();
    assert!(matches!(err, RuntimeError::DivideByZero { .. }), "expected DivideByZero, got {err:?}");
}

#[test]
fn scenario_six_struct_construction_and_member_access() {
    let result = run(r#"struct pixel { string s; } string main(){ pixel p = pixel("hi"); return p.s; }"#);
    let Value::Ref(_) = result else { panic!("expected a string ref") };
}

// =============================================================================
// Compile errors (spec.md §7 "compile errors carry a source span")
// =============================================================================

#[test]
fn division_by_a_literal_zero_is_a_compile_error() {
    let err = compile("int main(){ return 1/0; }").unwrap_err();
    assert!(matches!(err, floyd::CompileError::DivByZeroConst { .. }));
}

#[test]
fn undefined_name_is_a_compile_error() {
    let err = compile("int main(){ return undeclared_thing; }").unwrap_err();
    assert!(matches!(err, floyd::CompileError::UndefinedName { .. }));
}

#[test]
fn wrong_arity_is_a_compile_error() {
    let err = compile("int f(int a){ return a; } int main(){ return f(1, 2); }").unwrap_err();
    assert!(matches!(err, floyd::CompileError::Arity { .. }));
}

// =============================================================================
// Runtime errors beyond scenario 5
// =============================================================================

#[test]
fn vector_index_out_of_bounds_is_a_runtime_error() {
    let program = compile("int main(){ [1, 2, 3][9]; return 0; }").expect("compiles");
    let mut interp = new_interpreter(program, RunOptions::default()).expect("globals init");
    let err = run_main(&mut interp).unwrap_err();
    assert!(matches!(err, RuntimeError::LookupOutOfBounds { .. }), "expected LookupOutOfBounds, got {err:?}");
}

// =============================================================================
// Embedder API surface (spec.md §6 "Embedder API")
// =============================================================================

#[test]
fn find_global_resolves_a_top_level_bind() {
    let program = compile("bind int answer = 40 + 2; int main(){ return answer; }").expect("compiles");
    let interp = new_interpreter(program, RunOptions::default()).expect("globals init");
    let value = find_global(&interp, "answer").expect("global exists");
    assert_int(value, 42);
}

#[test]
fn find_global_is_none_for_an_unknown_name() {
    let program = compile("int main(){ return 0; }").expect("compiles");
    let interp = new_interpreter(program, RunOptions::default()).expect("globals init");
    assert!(find_global(&interp, "nope").is_none());
}

#[test]
fn call_function_can_target_a_non_main_function() {
    let program = compile("int double_it(int n){ return n * 2; } int main(){ return 0; }").expect("compiles");
    let mut interp = new_interpreter(program, RunOptions::default()).expect("globals init");
    let result = call_function(&mut interp, "double_it", vec![Value::Int(21)]).expect("runs");
    assert_int(&result, 42);
}

#[test]
fn calling_an_unknown_function_is_a_runtime_error() {
    let program = compile("int main(){ return 0; }").expect("compiles");
    let mut interp = new_interpreter(program, RunOptions::default()).expect("globals init");
    let err = call_function(&mut interp, "nope", Vec::new()).unwrap_err();
    assert!(matches!(err, RuntimeError::HostFunctionError { id: 0, .. }));
}

#[test]
fn interpreter_to_json_reports_program_shape_with_an_idle_call_stack() {
    let program = compile("int main(){ return 1; }").expect("compiles");
    let mut interp = new_interpreter(program, RunOptions::default()).expect("globals init");
    run_main(&mut interp).expect("runs");
    let snapshot = interpreter_to_json(&interp);
    assert_eq!(snapshot["functions"], 1);
    assert_eq!(snapshot["call_stack"].as_array().expect("array").len(), 0);
}

#[test]
fn unregistered_host_function_reports_its_name() {
    let program = compile("int main(){ return size(3); }").expect("compiles");
    let mut interp = new_interpreter(program, RunOptions { host: Box::new(NoHostFunctions) }).expect("globals init");
    let err = run_main(&mut interp).unwrap_err();
    let RuntimeError::HostFunctionError { message, .. } = err else {
        panic!("expected HostFunctionError, got {err:?}")
    };
    assert!(message.contains("size"), "message was: {message}");
}
