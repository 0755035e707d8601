//! The bytecode interpreter (spec.md §4.4 "Execution"). A plain
//! fetch-decode-execute loop over one function's `Opcode` slice at a time;
//! Floyd-to-Floyd calls recurse through `run_code` using the host Rust call
//! stack, since this core has no tail-call or coroutine requirement to work
//! around.

use crate::bytecode::{Arithmetic, BcProgram, Comparison, Opcode, Reg};
use crate::error::{RunResult, RuntimeError};
use crate::heap::{Heap, HeapData};
use crate::interp::frame;
use crate::interp::host::{ArgValues, HostFunctions};
use crate::typeid::TypeId;
use crate::value::Value;

/// Owns everything a running program needs: the compiled program, the heap,
/// and the globals frame. Constructed once by `run::new_interpreter` and
/// reused across any number of `call_function` invocations.
pub struct Interpreter {
    pub(crate) program: BcProgram,
    pub(crate) heap: Heap,
    pub(crate) globals: Vec<Value>,
    pub(crate) host: Box<dyn HostFunctions>,
    /// Function-table indices of currently open Floyd-to-Floyd calls,
    /// outermost first. Used only by `to_json`'s debug snapshot; the VM
    /// itself never reads it.
    call_stack: Vec<u32>,
}

enum Flow {
    Next,
    Jump(usize),
    Return(Value),
}

impl Interpreter {
    pub fn new(program: BcProgram, host: Box<dyn HostFunctions>) -> RunResult<Self> {
        let mut interp = Self {
            globals: frame::open(&program.globals),
            program,
            heap: Heap::default(),
            host,
            call_stack: Vec::new(),
        };
        let code = interp.program.globals_code.clone();
        let mut dummy = Vec::new();
        interp.run_code(&code, &mut dummy)?;
        Ok(interp)
    }

    #[must_use]
    pub fn program(&self) -> &BcProgram {
        &self.program
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutable heap access so an embedder can allocate argument values
    /// (strings, vectors, ...) before passing them to `call_function_index`.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    #[must_use]
    pub fn global_value(&self, index: u16) -> &Value {
        &self.globals[index as usize]
    }

    /// Calls a function by its function-table index, moving `args` directly
    /// into its frame's leading parameter slots (spec.md §4.4 "Open frame").
    pub fn call_function_index(&mut self, func_index: u32, args: Vec<Value>) -> RunResult<Value> {
        let def = &self.program.functions[func_index as usize];
        if def.host_function_id != 0 {
            return self.call_host(func_index, args.into_iter().map(|v| (TypeId::Dynamic, v)).collect());
        }
        let code = def.code.clone();
        let layout = def.frame.clone();
        let mut new_frame = frame::open(&layout);
        for (slot, value) in new_frame.iter_mut().zip(args) {
            *slot = value;
        }
        self.call_stack.push(func_index);
        let result = self.run_code(&code, &mut new_frame);
        self.call_stack.pop();
        frame::close(new_frame, &layout, &mut self.heap);
        result
    }

    /// Debug snapshot (spec.md §6 "`interpreter_to_json`"): program shape
    /// plus the currently open call stack, outermost frame first.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let call_stack = self
            .call_stack
            .iter()
            .map(|&index| {
                serde_json::json!({ "function": self.program.functions[index as usize].name })
            })
            .collect::<Vec<_>>();
        serde_json::json!({
            "functions": self.program.functions.len(),
            "globals": self.program.globals.len(),
            "call_stack": call_stack,
        })
    }

    fn call_host(&mut self, func_index: u32, args: Vec<(TypeId, Value)>) -> RunResult<Value> {
        let def = &self.program.functions[func_index as usize];
        let host_id = def.host_function_id;
        let name = self.program.host_function_names[(host_id - 1) as usize].clone();
        let arg_values = ArgValues::new(args, &mut self.heap);
        self.host.call(host_id, &name, arg_values)
    }

    /// Runs one function's opcode stream to completion: either a `Return` is
    /// hit, or control falls off the end (only valid for the globals'
    /// init code and `void`-returning functions, per spec.md §4.4).
    fn run_code(&mut self, code: &[Opcode], frame: &mut Vec<Value>) -> RunResult<Value> {
        let mut pc = 0usize;
        let mut temp_stack: Vec<Value> = Vec::new();
        while pc < code.len() {
            match self.exec(&code[pc], frame, &mut temp_stack, pc)? {
                Flow::Next => pc += 1,
                Flow::Jump(target) => pc = target,
                Flow::Return(value) => return Ok(value),
            }
        }
        Ok(Value::Undefined)
    }

    /// Reads a register. A free function of `globals`/`frame` rather than a
    /// `&self` method, so callers can read a register and mutate `self.heap`
    /// (a disjoint field) in the same expression without fighting the borrow
    /// checker.
    fn reg<'a>(globals: &'a [Value], frame: &'a [Value], reg: Reg) -> &'a Value {
        if reg.parent_steps == -1 {
            &globals[reg.index as usize]
        } else {
            &frame[reg.index as usize]
        }
    }

    fn reg_mut<'a>(&'a mut self, frame: &'a mut [Value], reg: Reg) -> &'a mut Value {
        if reg.parent_steps == -1 {
            &mut self.globals[reg.index as usize]
        } else {
            &mut frame[reg.index as usize]
        }
    }

    fn store(&mut self, frame: &mut [Value], dst: Reg, value: Value) {
        let slot = self.reg_mut(frame, dst);
        let old = std::mem::replace(slot, value);
        old.drop_with_heap(&mut self.heap);
    }

    fn exec(&mut self, op: &Opcode, frame: &mut Vec<Value>, temp_stack: &mut Vec<Value>, pc: usize) -> RunResult<Flow> {
        match op {
            Opcode::LoadConstInt { dst, value } => self.store(frame, *dst, Value::Int(*value)),
            Opcode::LoadConstFloat { dst, value } => self.store(frame, *dst, Value::Float(*value)),
            Opcode::LoadConstBool { dst, value } => self.store(frame, *dst, Value::Bool(*value)),
            Opcode::LoadConstString { dst, value } => {
                let s = self.program.strings[*value as usize].clone();
                let id = self.heap.allocate(HeapData::String(s));
                self.store(frame, *dst, Value::Ref(id));
            }
            Opcode::LoadConstTypeId { dst, ty_index } => {
                let ty = self.program.types.get(*ty_index).clone();
                let id = self.heap.allocate(HeapData::Typeid(ty));
                self.store(frame, *dst, Value::Ref(id));
            }
            Opcode::LoadConstFunction { dst, func_index } => {
                let id = self.heap.allocate(HeapData::Function(*func_index));
                self.store(frame, *dst, Value::Ref(id));
            }
            Opcode::StoreResolve { dst, src } => {
                let value = Self::reg(&self.globals, frame, *src).clone_with_heap(&mut self.heap);
                self.store(frame, *dst, value);
            }
            Opcode::Return { src } => {
                let value = Self::reg(&self.globals, frame, *src).clone_with_heap(&mut self.heap);
                return Ok(Flow::Return(value));
            }
            Opcode::Push { src } => {
                let value = Self::reg(&self.globals, frame, *src).clone_with_heap(&mut self.heap);
                temp_stack.push(value);
            }
            Opcode::PopN { count } => {
                for _ in 0..*count {
                    if let Some(value) = temp_stack.pop() {
                        value.drop_with_heap(&mut self.heap);
                    }
                }
            }
            Opcode::BranchZero { test, offset } => {
                let Value::Bool(b) = Self::reg(&self.globals, frame, *test) else {
                    panic!("BranchZero on a non-bool register");
                };
                if !*b {
                    return Ok(Flow::Jump(jump_target(pc, *offset)));
                }
            }
            Opcode::Jump { offset } => return Ok(Flow::Jump(jump_target(pc, *offset))),
            Opcode::ResolveMember { dst, object, member_index } => {
                let Value::Ref(id) = Self::reg(&self.globals, frame, *object) else {
                    panic!("ResolveMember on a non-struct value");
                };
                let id = *id;
                let HeapData::Struct { members, .. } = self.heap.get(id) else {
                    panic!("ResolveMember on non-struct heap data");
                };
                let raw = raw_copy(&members[*member_index as usize]);
                let value = self.finish_raw(raw);
                self.store(frame, *dst, value);
            }
            Opcode::LookupElement { dst, object, index } => {
                let value = self.lookup_element(frame, *object, *index, pc)?;
                self.store(frame, *dst, value);
            }
            Opcode::Call { dst, callee, arg_count } => {
                let value = self.exec_call(frame, *callee, *arg_count)?;
                self.store(frame, *dst, value);
            }
            Opcode::ConstructValue { dst, ty, args, arg_count } => {
                let value = self.construct_value(frame, ty, *args, *arg_count, pc)?;
                self.store(frame, *dst, value);
            }
            Opcode::Comparison { op, dst, left, right } => {
                let value = self.comparison(frame, *op, *left, *right)?;
                self.store(frame, *dst, value);
            }
            Opcode::LogicalEqual { dst, left, right } => {
                let eq = Self::reg(&self.globals, frame, *left).eq_with_heap(Self::reg(&self.globals, frame, *right), &self.heap);
                self.store(frame, *dst, Value::Bool(eq));
            }
            Opcode::LogicalNotEqual { dst, left, right } => {
                let eq = Self::reg(&self.globals, frame, *left).eq_with_heap(Self::reg(&self.globals, frame, *right), &self.heap);
                self.store(frame, *dst, Value::Bool(!eq));
            }
            Opcode::LogicalAnd { dst, left, right } => {
                let (Value::Bool(a), Value::Bool(b)) = (Self::reg(&self.globals, frame, *left), Self::reg(&self.globals, frame, *right)) else {
                    panic!("LogicalAnd on non-bool registers");
                };
                self.store(frame, *dst, Value::Bool(*a && *b));
            }
            Opcode::LogicalOr { dst, left, right } => {
                let (Value::Bool(a), Value::Bool(b)) = (Self::reg(&self.globals, frame, *left), Self::reg(&self.globals, frame, *right)) else {
                    panic!("LogicalOr on non-bool registers");
                };
                self.store(frame, *dst, Value::Bool(*a || *b));
            }
            Opcode::Arithmetic { op, dst, left, right } => {
                let value = self.arithmetic(frame, *op, *left, *right, pc)?;
                self.store(frame, *dst, value);
            }
            Opcode::Negate { dst, src } => {
                let value = match Self::reg(&self.globals, frame, *src) {
                    Value::Int(v) => Value::Int(-v),
                    Value::Float(v) => Value::Float(-v),
                    _ => panic!("Negate on a non-numeric register"),
                };
                self.store(frame, *dst, value);
            }
            Opcode::BuildVector { dst, start, count } => {
                let element_type = Self::reg(&self.globals, frame, *start).type_of(&self.heap);
                let items = self.take_block(frame, *start, *count);
                let id = self.heap.allocate(HeapData::Vector { element_type, items });
                self.store(frame, *dst, Value::Ref(id));
            }
            Opcode::BuildDict { dst, keys, start, count } => {
                let value_type = Self::reg(&self.globals, frame, *start).type_of(&self.heap);
                let values = self.take_block(frame, *start, *count);
                let entries = keys
                    .iter()
                    .map(|&k| self.program.strings[k as usize].clone())
                    .zip(values)
                    .collect();
                let id = self.heap.allocate(HeapData::Dict { value_type, entries });
                self.store(frame, *dst, Value::Ref(id));
            }
        }
        Ok(Flow::Next)
    }

    /// Clones a contiguous run of registers out without disturbing the
    /// originals, since they remain live frame slots until the frame closes.
    fn take_block(&mut self, frame: &mut Vec<Value>, start: Reg, count: u16) -> Vec<Value> {
        (0..count)
            .map(|i| {
                let r = Reg { parent_steps: start.parent_steps, index: start.index + i };
                Self::reg(&self.globals, frame, r).clone_with_heap(&mut self.heap)
            })
            .collect()
    }

    fn lookup_element(&mut self, frame: &mut Vec<Value>, object: Reg, index: Reg, pc: usize) -> RunResult<Value> {
        let Value::Ref(id) = Self::reg(&self.globals, frame, object) else {
            panic!("LookupElement on a non-indexable value");
        };
        let id = *id;

        // Each arm below pulls out a heap-borrow-free intermediate; the actual
        // heap mutation (allocate/inc_ref) happens after the match ends, since
        // that borrows `self.heap` mutably while these arms hold it shared.
        enum Elem {
            Char(char),
            Raw(Value),
            Json(serde_json::Value),
        }

        let elem = match self.heap.get(id) {
            HeapData::String(s) => {
                let Value::Int(i) = Self::reg(&self.globals, frame, index) else {
                    panic!("string index must be int");
                };
                let i = *i;
                let chars: Vec<char> = s.chars().collect();
                let ch = usize::try_from(i)
                    .ok()
                    .and_then(|idx| chars.get(idx).copied())
                    .ok_or(RuntimeError::StringIndexOutOfBounds { index: i, len: chars.len(), pc })?;
                Elem::Char(ch)
            }
            HeapData::Vector { items, .. } => {
                let Value::Int(i) = Self::reg(&self.globals, frame, index) else {
                    panic!("vector index must be int");
                };
                let i = *i;
                let len = items.len();
                let raw = usize::try_from(i)
                    .ok()
                    .and_then(|idx| items.get(idx))
                    .map(raw_copy)
                    .ok_or(RuntimeError::LookupOutOfBounds { index: i, len, pc })?;
                Elem::Raw(raw)
            }
            HeapData::Dict { entries, .. } => {
                let Value::Ref(key_id) = Self::reg(&self.globals, frame, index) else {
                    panic!("dict key must be a string");
                };
                let HeapData::String(key) = self.heap.get(*key_id) else {
                    panic!("dict key must be a string");
                };
                let key = key.clone();
                let raw = entries
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| raw_copy(v))
                    .ok_or_else(|| RuntimeError::DictKeyMissing { key: key.clone(), pc })?;
                Elem::Raw(raw)
            }
            HeapData::Json(json) => {
                let result = match Self::reg(&self.globals, frame, index) {
                    Value::Int(i) => json.get(*i as usize).cloned(),
                    Value::Ref(key_id) => {
                        let HeapData::String(key) = self.heap.get(*key_id) else {
                            panic!("json string index must be a string");
                        };
                        json.get(key).cloned()
                    }
                    _ => panic!("json lookup index must be int or string"),
                };
                let result = result.ok_or_else(|| RuntimeError::JsonTypeMismatch {
                    message: "index not present in json value".to_owned(),
                    pc,
                })?;
                Elem::Json(result)
            }
            _ => panic!("LookupElement on a non-indexable value"),
        };

        Ok(match elem {
            Elem::Char(ch) => Value::Ref(self.heap.allocate(HeapData::String(ch.to_string()))),
            Elem::Json(j) => Value::Ref(self.heap.allocate(HeapData::Json(j))),
            Elem::Raw(v) => self.finish_raw(v),
        })
    }

    /// Bumps the refcount on a `raw_copy`d value, completing the copy. Split
    /// out from `raw_copy` itself so callers can finish the copy once any
    /// heap borrow the copy was read from has gone out of scope.
    fn finish_raw(&mut self, raw: Value) -> Value {
        if let Value::Ref(id) = &raw {
            self.heap.inc_ref(*id);
        }
        raw
    }

    fn exec_call(&mut self, frame: &mut Vec<Value>, callee: Reg, arg_count: u16) -> RunResult<Value> {
        let Value::Ref(fn_id) = Self::reg(&self.globals, frame, callee) else {
            panic!("call target is not a function value");
        };
        let HeapData::Function(func_index) = self.heap.get(*fn_id) else {
            panic!("call target does not reference a function");
        };
        let func_index = *func_index;
        let def = &self.program.functions[func_index as usize];
        let param_types = def.frame.slot_types[..def.param_count].to_vec();

        let mut offset = 1u16;
        let mut args = Vec::with_capacity(param_types.len());
        for param_ty in &param_types {
            if *param_ty == TypeId::Dynamic {
                let tid_reg = Reg { parent_steps: callee.parent_steps, index: callee.index + offset };
                let Value::Ref(tid_id) = Self::reg(&self.globals, frame, tid_reg) else {
                    panic!("dynamic argument missing its typeid companion slot");
                };
                let HeapData::Typeid(actual_ty) = self.heap.get(*tid_id) else {
                    panic!("dynamic argument typeid slot did not hold a typeid");
                };
                let actual_ty = actual_ty.clone();
                offset += 1;
                let value_reg = Reg { parent_steps: callee.parent_steps, index: callee.index + offset };
                let value = Self::reg(&self.globals, frame, value_reg).clone_with_heap(&mut self.heap);
                offset += 1;
                args.push((actual_ty, value));
            } else {
                let value_reg = Reg { parent_steps: callee.parent_steps, index: callee.index + offset };
                let value = Self::reg(&self.globals, frame, value_reg).clone_with_heap(&mut self.heap);
                offset += 1;
                args.push((param_ty.clone(), value));
            }
        }
        debug_assert_eq!(offset - 1, arg_count);

        if def.host_function_id != 0 {
            self.call_host(func_index, args)
        } else {
            self.call_function_index(func_index, args.into_iter().map(|(_, v)| v).collect())
        }
    }

    fn construct_value(&mut self, frame: &mut Vec<Value>, ty: &TypeId, args: Reg, arg_count: u16, pc: usize) -> RunResult<Value> {
        let mut values = self.take_block(frame, args, arg_count);
        match ty {
            TypeId::Struct(name) => {
                let id = self.heap.allocate(HeapData::Struct { type_name: name.clone(), members: values });
                Ok(Value::Ref(id))
            }
            TypeId::JsonValue => {
                let value = values.pop().expect("construct always carries exactly one arg for primitives");
                match value {
                    Value::Ref(id) => match self.heap.get(id) {
                        HeapData::String(s) => {
                            let parsed = serde_json::from_str(s).map_err(|e| RuntimeError::JsonTypeMismatch {
                                message: e.to_string(),
                                pc,
                            })?;
                            Ok(Value::Ref(self.heap.allocate(HeapData::Json(parsed))))
                        }
                        HeapData::Json(_) => Ok(Value::Ref(id)),
                        _ => panic!("json construct from an unsupported value"),
                    },
                    _ => panic!("json construct from an unsupported value"),
                }
            }
            TypeId::String => {
                let value = values.pop().expect("construct always carries exactly one arg for primitives");
                match value {
                    Value::Ref(id) => match self.heap.get(id) {
                        HeapData::Json(j) => {
                            let s = j.to_string();
                            Ok(Value::Ref(self.heap.allocate(HeapData::String(s))))
                        }
                        HeapData::String(_) => Ok(Value::Ref(id)),
                        _ => panic!("string construct from an unsupported value"),
                    },
                    _ => panic!("string construct from an unsupported value"),
                }
            }
            _ => Ok(values.pop().expect("construct always carries exactly one arg for primitives")),
        }
    }

    fn comparison(&mut self, frame: &mut Vec<Value>, op: Comparison, left: Reg, right: Reg) -> RunResult<Value> {
        let ordering = match (Self::reg(&self.globals, frame, left), Self::reg(&self.globals, frame, right)) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).expect("NaN comparison is not reachable from Floyd source"),
            (Value::Ref(a), Value::Ref(b)) => {
                let (HeapData::String(s1), HeapData::String(s2)) = (self.heap.get(*a), self.heap.get(*b)) else {
                    panic!("comparison on non-numeric, non-string registers");
                };
                s1.cmp(s2)
            }
            _ => panic!("comparison on incompatible registers"),
        };
        let b = match op {
            Comparison::Lt => ordering.is_lt(),
            Comparison::Le => ordering.is_le(),
            Comparison::Gt => ordering.is_gt(),
            Comparison::Ge => ordering.is_ge(),
        };
        Ok(Value::Bool(b))
    }

    fn arithmetic(&mut self, frame: &mut Vec<Value>, op: Arithmetic, left: Reg, right: Reg, pc: usize) -> RunResult<Value> {
        match (Self::reg(&self.globals, frame, left), Self::reg(&self.globals, frame, right)) {
            (Value::Int(a), Value::Int(b)) => {
                let (a, b) = (*a, *b);
                match op {
                    Arithmetic::Add => Ok(Value::Int(a + b)),
                    Arithmetic::Subtract => Ok(Value::Int(a - b)),
                    Arithmetic::Multiply => Ok(Value::Int(a * b)),
                    Arithmetic::Divide => {
                        if b == 0 {
                            Err(RuntimeError::DivideByZero { pc })
                        } else {
                            Ok(Value::Int(a / b))
                        }
                    }
                    Arithmetic::Remainder => {
                        if b == 0 {
                            Err(RuntimeError::DivideByZero { pc })
                        } else {
                            Ok(Value::Int(a % b))
                        }
                    }
                }
            }
            (Value::Float(a), Value::Float(b)) => {
                let (a, b) = (*a, *b);
                match op {
                    Arithmetic::Add => Ok(Value::Float(a + b)),
                    Arithmetic::Subtract => Ok(Value::Float(a - b)),
                    Arithmetic::Multiply => Ok(Value::Float(a * b)),
                    Arithmetic::Divide => {
                        if b == 0.0 {
                            Err(RuntimeError::DivideByZero { pc })
                        } else {
                            Ok(Value::Float(a / b))
                        }
                    }
                    Arithmetic::Remainder => {
                        if b == 0.0 {
                            Err(RuntimeError::DivideByZero { pc })
                        } else {
                            Ok(Value::Float(a % b))
                        }
                    }
                }
            }
            (Value::Ref(a), Value::Ref(b)) => {
                let (a, b) = (*a, *b);
                enum Combined {
                    Concat(String),
                    Vector(TypeId, Vec<Value>),
                }
                let combined = match (self.heap.get(a), self.heap.get(b)) {
                    (HeapData::String(s1), HeapData::String(s2)) => Combined::Concat(format!("{s1}{s2}")),
                    (HeapData::Vector { element_type, items: i1 }, HeapData::Vector { items: i2, .. }) => {
                        let element_type = element_type.clone();
                        let mut items: Vec<Value> = i1.iter().map(raw_copy).collect();
                        items.extend(i2.iter().map(raw_copy));
                        Combined::Vector(element_type, items)
                    }
                    _ => panic!("arithmetic on incompatible registers"),
                };
                match combined {
                    Combined::Concat(s) => Ok(Value::Ref(self.heap.allocate(HeapData::String(s)))),
                    Combined::Vector(element_type, items) => {
                        for item in &items {
                            if let Value::Ref(id) = item {
                                self.heap.inc_ref(*id);
                            }
                        }
                        Ok(Value::Ref(self.heap.allocate(HeapData::Vector { element_type, items })))
                    }
                }
            }
            _ => panic!("arithmetic on incompatible registers"),
        }
    }
}

/// Copies a `Value` without touching its refcount; callers that keep the
/// copy must `inc_ref` any `Ref` themselves once the source heap borrow ends.
fn raw_copy(v: &Value) -> Value {
    match v {
        Value::Undefined => Value::Undefined,
        Value::Bool(b) => Value::Bool(*b),
        Value::Int(i) => Value::Int(*i),
        Value::Float(f) => Value::Float(*f),
        Value::Ref(id) => Value::Ref(*id),
    }
}

fn jump_target(pc: usize, offset: i32) -> usize {
    let next = pc as i64 + 1 + i64::from(offset);
    usize::try_from(next).expect("jump target underflowed")
}
