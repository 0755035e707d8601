//! Bytecode generator (spec.md §4.3): lowers the typed AST produced by
//! `analyser.rs` into a linear `Opcode` stream per function, allocating a
//! temp register for every subexpression result the way the generator's
//! "symbol list (args + locals + temporaries)" description implies.

use std::collections::HashMap;

use crate::ast::BinOp;
use crate::bytecode::instr::{Arithmetic, Comparison, Opcode, Reg};
use crate::bytecode::program::{BcProgram, FrameLayout, FunctionDef};
use crate::symbol::VarAddr;
use crate::typed_ast::{TExpr, TExprKind, TFuncDef, TProgram, TStmt, TStmtKind};
use crate::typeid::{StructDefs, TypeId, TypeTable};

pub fn generate(program: &TProgram, structs: StructDefs) -> BcProgram {
    let mut types = TypeTable::default();
    let mut strings = Strings::default();

    let globals_frame = FrameLayout::from_slot_types(program.global_types.clone());
    let mut globals_gen = FuncGen {
        types: &mut types,
        strings: &mut strings,
        slot_types: program.global_types.clone(),
        code: Vec::new(),
    };
    for (slot, func_index) in &program.function_globals {
        globals_gen.code.push(Opcode::LoadConstFunction {
            dst: Reg::global(*slot),
            func_index: *func_index,
        });
    }
    for stmt in &program.globals {
        globals_gen.gen_stmt(stmt);
    }
    let globals_code = globals_gen.code;

    let functions = program
        .functions
        .iter()
        .map(|f| gen_function(f, &mut types, &mut strings))
        .collect();

    BcProgram {
        types,
        structs,
        strings: strings.into_vec(),
        globals: globals_frame,
        global_names: program.global_names.clone(),
        globals_code,
        functions,
        host_function_names: program.host_function_names.clone(),
    }
}

fn gen_function(f: &TFuncDef, types: &mut TypeTable, strings: &mut Strings) -> FunctionDef {
    if f.host_function_id != 0 {
        return FunctionDef {
            name: f.name.clone(),
            param_count: f.param_count,
            ret: f.ret.clone(),
            frame: FrameLayout::from_slot_types(f.locals.clone()),
            code: Vec::new(),
            host_function_id: f.host_function_id,
        };
    }
    let mut gen = FuncGen {
        types,
        strings,
        slot_types: f.locals.clone(),
        code: Vec::new(),
    };
    for stmt in &f.body {
        gen.gen_stmt(stmt);
    }
    FunctionDef {
        name: f.name.clone(),
        param_count: f.param_count,
        ret: f.ret.clone(),
        frame: FrameLayout::from_slot_types(gen.slot_types),
        code: gen.code,
        host_function_id: 0,
    }
}

#[derive(Default)]
struct Strings {
    pool: Vec<String>,
    index_of: HashMap<String, u32>,
}

impl Strings {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&i) = self.index_of.get(s) {
            return i;
        }
        let i = u32::try_from(self.pool.len()).expect("string pool overflow");
        self.pool.push(s.to_owned());
        self.index_of.insert(s.to_owned(), i);
        i
    }

    fn into_vec(self) -> Vec<String> {
        self.pool
    }
}

struct FuncGen<'a> {
    types: &'a mut TypeTable,
    strings: &'a mut Strings,
    slot_types: Vec<TypeId>,
    code: Vec<Opcode>,
}

fn reg_of(addr: VarAddr) -> Reg {
    Reg {
        parent_steps: addr.parent_steps,
        index: addr.index,
    }
}

impl FuncGen<'_> {
    fn alloc_temp(&mut self, ty: TypeId) -> Reg {
        let index = u16::try_from(self.slot_types.len()).expect("frame overflow (> 65535 slots)");
        self.slot_types.push(ty);
        Reg::local(index)
    }

    /// Allocates `types.len()` contiguous slots, returning the first one —
    /// used everywhere the calling/construction convention needs args laid
    /// out back-to-back (spec.md §4.4 "Calling convention").
    fn alloc_block(&mut self, types: &[TypeId]) -> Reg {
        let start = u16::try_from(self.slot_types.len()).expect("frame overflow (> 65535 slots)");
        self.slot_types.extend_from_slice(types);
        Reg::local(start)
    }

    fn offset_reg(reg: Reg, delta: u16) -> Reg {
        Reg {
            parent_steps: reg.parent_steps,
            index: reg.index + delta,
        }
    }

    fn gen_stmt(&mut self, stmt: &TStmt) {
        match &stmt.kind {
            TStmtKind::Return(expr) => {
                let src = self.gen_expr(expr);
                self.code.push(Opcode::Return { src });
            }
            TStmtKind::Bind { addr, expr } | TStmtKind::Assign { addr, expr } => {
                let src = self.gen_expr(expr);
                self.code.push(Opcode::StoreResolve {
                    dst: reg_of(*addr),
                    src,
                });
            }
            TStmtKind::If {
                test,
                then_body,
                else_body,
            } => {
                let test_reg = self.gen_expr(test);
                let branch_idx = self.code.len();
                self.code.push(Opcode::BranchZero { test: test_reg, offset: 0 });
                for s in then_body {
                    self.gen_stmt(s);
                }
                let jump_idx = self.code.len();
                self.code.push(Opcode::Jump { offset: 0 });
                let else_start = self.code.len();
                self.patch_branch(branch_idx, else_start);
                for s in else_body {
                    self.gen_stmt(s);
                }
                let end = self.code.len();
                self.patch_jump(jump_idx, end);
            }
            TStmtKind::While { test, body } => {
                let loop_start = self.code.len();
                let test_reg = self.gen_expr(test);
                let branch_idx = self.code.len();
                self.code.push(Opcode::BranchZero { test: test_reg, offset: 0 });
                for s in body {
                    self.gen_stmt(s);
                }
                let back_idx = self.code.len();
                self.code.push(Opcode::Jump { offset: 0 });
                self.patch_jump_to(back_idx, loop_start);
                let end = self.code.len();
                self.patch_branch(branch_idx, end);
            }
            TStmtKind::For {
                addr,
                start,
                end,
                body,
            } => {
                let addr_reg = reg_of(*addr);
                let start_reg = self.gen_expr(start);
                self.code.push(Opcode::StoreResolve {
                    dst: addr_reg,
                    src: start_reg,
                });
                let end_reg = self.gen_expr(end);
                let loop_start = self.code.len();
                let cmp_reg = self.alloc_temp(TypeId::Bool);
                self.code.push(Opcode::Comparison {
                    op: Comparison::Lt,
                    dst: cmp_reg,
                    left: addr_reg,
                    right: end_reg,
                });
                let branch_idx = self.code.len();
                self.code.push(Opcode::BranchZero { test: cmp_reg, offset: 0 });
                for s in body {
                    self.gen_stmt(s);
                }
                let one_reg = self.alloc_temp(TypeId::Int);
                self.code.push(Opcode::LoadConstInt { dst: one_reg, value: 1 });
                let sum_reg = self.alloc_temp(TypeId::Int);
                self.code.push(Opcode::Arithmetic {
                    op: Arithmetic::Add,
                    dst: sum_reg,
                    left: addr_reg,
                    right: one_reg,
                });
                self.code.push(Opcode::StoreResolve {
                    dst: addr_reg,
                    src: sum_reg,
                });
                let back_idx = self.code.len();
                self.code.push(Opcode::Jump { offset: 0 });
                self.patch_jump_to(back_idx, loop_start);
                let after = self.code.len();
                self.patch_branch(branch_idx, after);
            }
            TStmtKind::Block(stmts) => {
                for s in stmts {
                    self.gen_stmt(s);
                }
            }
            TStmtKind::Expr(expr) => {
                self.gen_expr(expr);
            }
        }
    }

    fn patch_branch(&mut self, instr_idx: usize, target: usize) {
        let Opcode::BranchZero { offset, .. } = &mut self.code[instr_idx] else {
            panic!("patch_branch on non-branch instruction");
        };
        *offset = target as i32 - (instr_idx as i32 + 1);
    }

    fn patch_jump(&mut self, instr_idx: usize, target: usize) {
        self.patch_jump_to(instr_idx, target);
    }

    fn patch_jump_to(&mut self, instr_idx: usize, target: usize) {
        let Opcode::Jump { offset } = &mut self.code[instr_idx] else {
            panic!("patch_jump on non-jump instruction");
        };
        *offset = target as i32 - (instr_idx as i32 + 1);
    }

    fn gen_expr(&mut self, expr: &TExpr) -> Reg {
        match &expr.kind {
            TExprKind::Literal(lit) | TExprKind::Const(lit) => self.gen_literal(lit),
            TExprKind::Var(addr) => reg_of(*addr),
            TExprKind::Binary { op, left, right } => {
                let l = self.gen_expr(left);
                let r = self.gen_expr(right);
                let dst = self.alloc_temp(expr.ty.clone());
                self.code.push(binop_opcode(*op, dst, l, r));
                dst
            }
            TExprKind::UnaryMinus(inner) => {
                let src = self.gen_expr(inner);
                let dst = self.alloc_temp(expr.ty.clone());
                self.code.push(Opcode::Negate { dst, src });
                dst
            }
            TExprKind::Cond {
                test,
                then_branch,
                else_branch,
            } => {
                let test_reg = self.gen_expr(test);
                let dst = self.alloc_temp(expr.ty.clone());
                let branch_idx = self.code.len();
                self.code.push(Opcode::BranchZero { test: test_reg, offset: 0 });
                let then_reg = self.gen_expr(then_branch);
                self.code.push(Opcode::StoreResolve { dst, src: then_reg });
                let jump_idx = self.code.len();
                self.code.push(Opcode::Jump { offset: 0 });
                let else_start = self.code.len();
                self.patch_branch(branch_idx, else_start);
                let else_reg = self.gen_expr(else_branch);
                self.code.push(Opcode::StoreResolve { dst, src: else_reg });
                let end = self.code.len();
                self.patch_jump(jump_idx, end);
                dst
            }
            TExprKind::Call {
                function,
                args,
                param_types,
            } => self.gen_call(*function, args, param_types, expr.ty.clone()),
            TExprKind::Construct { ty, args } => self.gen_construct(ty.clone(), args, expr.ty.clone()),
            TExprKind::Member { object, member_index } => {
                let obj = self.gen_expr(object);
                let dst = self.alloc_temp(expr.ty.clone());
                self.code.push(Opcode::ResolveMember {
                    dst,
                    object: obj,
                    member_index: *member_index,
                });
                dst
            }
            TExprKind::Index { object, index } => {
                let obj = self.gen_expr(object);
                let idx = self.gen_expr(index);
                let dst = self.alloc_temp(expr.ty.clone());
                self.code.push(Opcode::LookupElement {
                    dst,
                    object: obj,
                    index: idx,
                });
                dst
            }
            TExprKind::VectorLit(items) => {
                let elem_ty = items.first().map_or(TypeId::Dynamic, |i| i.ty.clone());
                let block_types = vec![elem_ty; items.len()];
                let start = self.alloc_block(&block_types);
                for (i, item) in items.iter().enumerate() {
                    let r = self.gen_expr(item);
                    let slot = Self::offset_reg(start, u16::try_from(i).expect("vector literal overflow"));
                    self.code.push(Opcode::StoreResolve { dst: slot, src: r });
                }
                let dst = self.alloc_temp(expr.ty.clone());
                self.code.push(Opcode::BuildVector {
                    dst,
                    start,
                    count: u16::try_from(items.len()).expect("vector literal overflow"),
                });
                dst
            }
            TExprKind::DictLit(entries) => {
                let block_types = entries.iter().map(|(_, v)| v.ty.clone()).collect::<Vec<_>>();
                let start = self.alloc_block(&block_types);
                let mut keys = Vec::with_capacity(entries.len());
                for (i, (key, value)) in entries.iter().enumerate() {
                    keys.push(self.strings.intern(key));
                    let r = self.gen_expr(value);
                    let slot = Self::offset_reg(start, u16::try_from(i).expect("dict literal overflow"));
                    self.code.push(Opcode::StoreResolve { dst: slot, src: r });
                }
                let dst = self.alloc_temp(expr.ty.clone());
                self.code.push(Opcode::BuildDict {
                    dst,
                    keys,
                    start,
                    count: u16::try_from(entries.len()).expect("dict literal overflow"),
                });
                dst
            }
        }
    }

    fn gen_literal(&mut self, lit: &crate::ast::Literal) -> Reg {
        use crate::ast::Literal;
        match lit {
            Literal::Int(v) => {
                let dst = self.alloc_temp(TypeId::Int);
                self.code.push(Opcode::LoadConstInt { dst, value: *v });
                dst
            }
            Literal::Float(v) => {
                let dst = self.alloc_temp(TypeId::Float);
                self.code.push(Opcode::LoadConstFloat { dst, value: *v });
                dst
            }
            Literal::Bool(v) => {
                let dst = self.alloc_temp(TypeId::Bool);
                self.code.push(Opcode::LoadConstBool { dst, value: *v });
                dst
            }
            Literal::String(v) => {
                let dst = self.alloc_temp(TypeId::String);
                let value = self.strings.intern(v);
                self.code.push(Opcode::LoadConstString { dst, value });
                dst
            }
        }
    }

    fn gen_call(&mut self, function: VarAddr, args: &[TExpr], param_types: &[TypeId], ret: TypeId) -> Reg {
        let mut block_types = Vec::with_capacity(1 + args.len() * 2);
        block_types.push(TypeId::Function {
            ret: Box::new(ret.clone()),
            args: param_types.to_vec(),
            is_pure: false,
        });
        for (arg, param_ty) in args.iter().zip(param_types) {
            if *param_ty == TypeId::Dynamic {
                block_types.push(TypeId::Typeid);
            }
            block_types.push(arg.ty.clone());
        }
        let block_start = self.alloc_block(&block_types);
        self.code.push(Opcode::StoreResolve {
            dst: block_start,
            src: reg_of(function),
        });
        let mut offset = 1u16;
        for (arg, param_ty) in args.iter().zip(param_types) {
            if *param_ty == TypeId::Dynamic {
                let ty_index = self.types.intern(arg.ty.clone());
                let tid_slot = Self::offset_reg(block_start, offset);
                self.code.push(Opcode::LoadConstTypeId { dst: tid_slot, ty_index });
                offset += 1;
            }
            let r = self.gen_expr(arg);
            let value_slot = Self::offset_reg(block_start, offset);
            self.code.push(Opcode::StoreResolve { dst: value_slot, src: r });
            offset += 1;
        }
        let dst = self.alloc_temp(ret);
        self.code.push(Opcode::Call {
            dst,
            callee: block_start,
            arg_count: offset - 1,
        });
        dst
    }

    fn gen_construct(&mut self, ty: TypeId, args: &[TExpr], result_ty: TypeId) -> Reg {
        let block_types = args.iter().map(|a| a.ty.clone()).collect::<Vec<_>>();
        let start = self.alloc_block(&block_types);
        for (i, arg) in args.iter().enumerate() {
            let r = self.gen_expr(arg);
            let slot = Self::offset_reg(start, u16::try_from(i).expect("constructor argument overflow"));
            self.code.push(Opcode::StoreResolve { dst: slot, src: r });
        }
        let dst = self.alloc_temp(result_ty);
        self.code.push(Opcode::ConstructValue {
            dst,
            ty,
            args: start,
            arg_count: u16::try_from(args.len()).expect("constructor argument overflow"),
        });
        dst
    }
}

fn binop_opcode(op: BinOp, dst: Reg, left: Reg, right: Reg) -> Opcode {
    match op {
        BinOp::Add => Opcode::Arithmetic { op: Arithmetic::Add, dst, left, right },
        BinOp::Sub => Opcode::Arithmetic { op: Arithmetic::Subtract, dst, left, right },
        BinOp::Mul => Opcode::Arithmetic { op: Arithmetic::Multiply, dst, left, right },
        BinOp::Div => Opcode::Arithmetic { op: Arithmetic::Divide, dst, left, right },
        BinOp::Rem => Opcode::Arithmetic { op: Arithmetic::Remainder, dst, left, right },
        BinOp::Lt => Opcode::Comparison { op: Comparison::Lt, dst, left, right },
        BinOp::Le => Opcode::Comparison { op: Comparison::Le, dst, left, right },
        BinOp::Gt => Opcode::Comparison { op: Comparison::Gt, dst, left, right },
        BinOp::Ge => Opcode::Comparison { op: Comparison::Ge, dst, left, right },
        BinOp::Eq => Opcode::LogicalEqual { dst, left, right },
        BinOp::NotEq => Opcode::LogicalNotEqual { dst, left, right },
        BinOp::And => Opcode::LogicalAnd { dst, left, right },
        BinOp::Or => Opcode::LogicalOr { dst, left, right },
    }
}
