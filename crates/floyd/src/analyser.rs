//! Pass-3: the semantic analyser (spec.md §4.2). Type-checks every
//! expression, materializes symbol tables, constant-folds literal-only
//! subexpressions, and disambiguates `NAME(args…)` between a function call
//! and a value construction — the one production the untyped parser leaves
//! merged since the two are lexically identical.

use std::collections::HashMap;

use crate::ast::{self, BinOp, Literal, Program, StmtKind};
use crate::error::{CompileError, CompileResult};
use crate::host_signatures;
use crate::resolve::{build_struct_defs, is_type_name, resolve_type_expr};
use crate::span::Span;
use crate::symbol::{FunctionScope, GlobalScope, SymbolKind, VarAddr};
use crate::typed_ast::{TExpr, TExprKind, TFuncDef, TProgram, TStmt, TStmtKind};
use crate::typeid::{StructDefs, TypeId};

#[derive(Debug, Clone)]
struct FunctionSig {
    ret: TypeId,
    params: Vec<TypeId>,
    func_index: u32,
}

pub fn analyse(program: &Program) -> CompileResult<TProgram> {
    let structs = build_struct_defs(program)?;
    let mut globals = GlobalScope::new();
    let mut function_sigs = HashMap::new();
    let mut function_globals = Vec::new();

    for (index, f) in program.functions.iter().enumerate() {
        if function_sigs.contains_key(&f.name) {
            return Err(CompileError::Type {
                message: format!("duplicate function definition '{}'", f.name),
                span: f.span,
            });
        }
        let ret = resolve_type_expr(&f.ret, &structs);
        let params = f
            .params
            .iter()
            .map(|p| resolve_type_expr(&p.type_expr, &structs))
            .collect::<Vec<_>>();
        let func_index = u32::try_from(index).expect("function table overflow");
        let addr = globals.declare(
            f.name.clone(),
            TypeId::Function {
                ret: Box::new(ret.clone()),
                args: params.clone(),
                is_pure: true,
            },
            SymbolKind::ImmutableLocal,
        );
        function_globals.push((addr.index, func_index));
        function_sigs.insert(
            f.name.clone(),
            FunctionSig {
                ret,
                params,
                func_index,
            },
        );
    }

    let mut analyser = Analyser {
        structs,
        globals,
        function_sigs,
        function_globals,
        host_names: Vec::new(),
        num_user_functions: u32::try_from(program.functions.len()).expect("function table overflow"),
        current_ret: TypeId::Void,
    };

    let mut tglobals = Vec::new();
    for stmt in &program.globals {
        let StmtKind::Bind {
            mutable,
            type_expr,
            name,
            expr,
        } = &stmt.kind
        else {
            return Err(CompileError::Type {
                message: "only 'bind' statements are allowed at the top level".to_owned(),
                span: stmt.span,
            });
        };
        let texpr = analyser.analyse_global_init(expr, stmt.span)?;
        let declared = analyser.check_bind_type(type_expr.as_ref(), &texpr, stmt.span)?;
        let kind = if *mutable {
            SymbolKind::MutableLocal
        } else {
            SymbolKind::ImmutableLocal
        };
        let addr = analyser.globals.declare(name.clone(), declared, kind);
        tglobals.push(TStmt {
            span: stmt.span,
            kind: TStmtKind::Bind { addr, expr: texpr },
        });
    }

    let mut functions = Vec::with_capacity(program.functions.len());
    for f in &program.functions {
        functions.push(analyser.analyse_function(f)?);
    }
    // Host functions may have been discovered lazily while analysing bodies
    // above, so this has to run after that loop, not interleaved with it.
    for (host_index, name) in analyser.host_names.iter().enumerate() {
        let sig = analyser.function_sigs[name].clone();
        functions.push(TFuncDef {
            name: name.clone(),
            param_count: sig.params.len(),
            ret: sig.ret,
            locals: sig.params,
            body: Vec::new(),
            host_function_id: u32::try_from(host_index + 1).expect("host table overflow"),
        });
    }

    // Snapshot every global's type *after* all functions (and any host
    // functions they reference) have been registered, since globals holds
    // user functions, `bind` globals, and lazily-discovered host functions
    // all in one shared index space (spec.md §3 "Symbols").
    let global_types = analyser
        .globals
        .symbols()
        .iter()
        .map(|s| s.value_type.clone())
        .collect();
    let global_names = analyser.globals.symbols().iter().map(|s| s.name.clone()).collect();

    Ok(TProgram {
        global_types,
        global_names,
        globals: tglobals,
        functions,
        function_globals: analyser.function_globals,
        host_function_names: analyser.host_names,
    })
}

struct Analyser {
    structs: StructDefs,
    globals: GlobalScope,
    function_sigs: HashMap<String, FunctionSig>,
    function_globals: Vec<(u16, u32)>,
    host_names: Vec<String>,
    num_user_functions: u32,
    current_ret: TypeId,
}

impl Analyser {
    fn analyse_global_init(&mut self, expr: &ast::Expr, span: Span) -> CompileResult<TExpr> {
        // Globals have no enclosing function frame; give them an empty one
        // purely so expression analysis has a scope to query (global
        // initializers may not reference locals, since none exist yet).
        let mut scope = FunctionScope::new();
        let _ = span;
        self.analyse_expr(expr, &mut scope)
    }

    fn check_bind_type(
        &self,
        type_expr: Option<&ast::TypeExpr>,
        value: &TExpr,
        span: Span,
    ) -> CompileResult<TypeId> {
        match type_expr {
            None => Ok(value.ty.clone()),
            Some(te) => {
                let declared = resolve_type_expr(te, &self.structs);
                if declared == value.ty {
                    Ok(declared)
                } else {
                    Err(CompileError::Type {
                        message: format!(
                            "cannot bind value of type {:?} to declared type {:?}",
                            value.ty, declared
                        ),
                        span,
                    })
                }
            }
        }
    }

    fn analyse_function(&mut self, f: &ast::FuncDef) -> CompileResult<TFuncDef> {
        let sig = self.function_sigs[&f.name].clone();
        self.current_ret = sig.ret.clone();
        let mut scope = FunctionScope::new();
        for (param, ty) in f.params.iter().zip(sig.params.iter()) {
            scope.declare(param.name.clone(), ty.clone(), SymbolKind::ImmutableArg);
        }
        let body = self.analyse_stmts(&f.body, &mut scope)?;
        Ok(TFuncDef {
            name: f.name.clone(),
            param_count: f.params.len(),
            ret: sig.ret,
            locals: scope.into_symbols().into_iter().map(|s| s.value_type).collect(),
            body,
            host_function_id: 0,
        })
    }

    fn analyse_stmts(&mut self, stmts: &[ast::Stmt], scope: &mut FunctionScope) -> CompileResult<Vec<TStmt>> {
        stmts.iter().map(|s| self.analyse_stmt(s, scope)).collect()
    }

    fn analyse_stmt(&mut self, stmt: &ast::Stmt, scope: &mut FunctionScope) -> CompileResult<TStmt> {
        let span = stmt.span;
        let kind = match &stmt.kind {
            StmtKind::Return(expr) => {
                let texpr = self.analyse_expr(expr, scope)?;
                if texpr.ty != self.current_ret {
                    return Err(CompileError::Type {
                        message: format!(
                            "return type mismatch: function returns {:?}, got {:?}",
                            self.current_ret, texpr.ty
                        ),
                        span,
                    });
                }
                TStmtKind::Return(texpr)
            }
            StmtKind::Bind {
                mutable,
                type_expr,
                name,
                expr,
            } => {
                let texpr = self.analyse_expr(expr, scope)?;
                let declared = self.check_bind_type(type_expr.as_ref(), &texpr, span)?;
                let kind = if *mutable {
                    SymbolKind::MutableLocal
                } else {
                    SymbolKind::ImmutableLocal
                };
                let addr = scope.declare(name.clone(), declared, kind);
                TStmtKind::Bind { addr, expr: texpr }
            }
            StmtKind::Assign { name, expr } => {
                let (addr, symbol_kind, symbol_ty) = self.resolve_assignable(name, scope, span)?;
                if !symbol_kind.is_mutable() {
                    return Err(CompileError::ImmutableRebind {
                        name: name.clone(),
                        span,
                    });
                }
                let texpr = self.analyse_expr(expr, scope)?;
                if texpr.ty != symbol_ty {
                    return Err(CompileError::Type {
                        message: format!(
                            "cannot assign value of type {:?} to '{name}' of type {symbol_ty:?}",
                            texpr.ty
                        ),
                        span,
                    });
                }
                TStmtKind::Assign { addr, expr: texpr }
            }
            StmtKind::If {
                test,
                then_body,
                else_body,
            } => {
                let ttest = self.analyse_expr(test, scope)?;
                self.require_bool(&ttest, span)?;
                scope.push_block();
                let tthen = self.analyse_stmts(then_body, scope)?;
                scope.pop_block();
                scope.push_block();
                let telse = self.analyse_stmts(else_body, scope)?;
                scope.pop_block();
                TStmtKind::If {
                    test: ttest,
                    then_body: tthen,
                    else_body: telse,
                }
            }
            StmtKind::While { test, body } => {
                let ttest = self.analyse_expr(test, scope)?;
                self.require_bool(&ttest, span)?;
                scope.push_block();
                let tbody = self.analyse_stmts(body, scope)?;
                scope.pop_block();
                TStmtKind::While {
                    test: ttest,
                    body: tbody,
                }
            }
            StmtKind::For {
                var,
                start,
                end,
                body,
            } => {
                let tstart = self.analyse_expr(start, scope)?;
                let tend = self.analyse_expr(end, scope)?;
                for (e, name) in [(&tstart, "start"), (&tend, "end")] {
                    if e.ty != TypeId::Int {
                        return Err(CompileError::Type {
                            message: format!("'for' {name} bound must be int, got {:?}", e.ty),
                            span,
                        });
                    }
                }
                scope.push_block();
                // The induction variable is compiler-managed and may be
                // read or mutated by the desugared loop body, mirroring a
                // plain C-style `for`.
                let addr = scope.declare(var.clone(), TypeId::Int, SymbolKind::MutableLocal);
                let tbody = self.analyse_stmts(body, scope)?;
                scope.pop_block();
                TStmtKind::For {
                    addr,
                    start: tstart,
                    end: tend,
                    body: tbody,
                }
            }
            StmtKind::Block(stmts) => {
                scope.push_block();
                let tbody = self.analyse_stmts(stmts, scope)?;
                scope.pop_block();
                TStmtKind::Block(tbody)
            }
            StmtKind::Expr(expr) => TStmtKind::Expr(self.analyse_expr(expr, scope)?),
        };
        Ok(TStmt { span, kind })
    }

    fn resolve_assignable(
        &self,
        name: &str,
        scope: &FunctionScope,
        span: Span,
    ) -> CompileResult<(VarAddr, SymbolKind, TypeId)> {
        if let Some((addr, symbol)) = scope.resolve(name) {
            return Ok((addr, symbol.kind, symbol.value_type.clone()));
        }
        if let Some((addr, symbol)) = self.globals.resolve(name) {
            return Ok((addr, symbol.kind, symbol.value_type.clone()));
        }
        Err(CompileError::UndefinedName {
            name: name.to_owned(),
            span,
        })
    }

    fn require_bool(&self, expr: &TExpr, span: Span) -> CompileResult<()> {
        if expr.ty == TypeId::Bool {
            Ok(())
        } else {
            Err(CompileError::Type {
                message: format!("expected bool, got {:?}", expr.ty),
                span,
            })
        }
    }

    fn analyse_expr(&mut self, expr: &ast::Expr, scope: &mut FunctionScope) -> CompileResult<TExpr> {
        let span = expr.span;
        match &expr.kind {
            ast::ExprKind::Literal(lit) => Ok(TExpr {
                span,
                ty: literal_type(lit),
                kind: TExprKind::Literal(lit.clone()),
            }),
            ast::ExprKind::Ident(name) => {
                let (addr, ty) = if let Some((addr, symbol)) = scope.resolve(name) {
                    (addr, symbol.value_type.clone())
                } else if let Some((addr, symbol)) = self.globals.resolve(name) {
                    (addr, symbol.value_type.clone())
                } else {
                    return Err(CompileError::UndefinedName {
                        name: name.clone(),
                        span,
                    });
                };
                Ok(TExpr {
                    span,
                    ty,
                    kind: TExprKind::Var(addr),
                })
            }
            ast::ExprKind::Binary { op, left, right } => {
                let tleft = self.analyse_expr(left, scope)?;
                let tright = self.analyse_expr(right, scope)?;
                if matches!(op, BinOp::Div | BinOp::Rem) && is_literal_zero(&tright) {
                    return Err(CompileError::DivByZeroConst { span });
                }
                let ty = self.check_binary(*op, &tleft, &tright, span)?;
                Ok(fold_binary(span, ty, *op, tleft, tright))
            }
            ast::ExprKind::UnaryMinus(inner) => {
                let tinner = self.analyse_expr(inner, scope)?;
                if !tinner.ty.is_numeric() {
                    return Err(CompileError::Type {
                        message: format!("unary '-' requires a numeric operand, got {:?}", tinner.ty),
                        span,
                    });
                }
                let ty = tinner.ty.clone();
                Ok(fold_unary_minus(span, ty, tinner))
            }
            ast::ExprKind::Cond {
                test,
                then_branch,
                else_branch,
            } => {
                let ttest = self.analyse_expr(test, scope)?;
                self.require_bool(&ttest, span)?;
                let tthen = self.analyse_expr(then_branch, scope)?;
                let telse = self.analyse_expr(else_branch, scope)?;
                if tthen.ty != telse.ty {
                    return Err(CompileError::Type {
                        message: format!(
                            "conditional branches have different types: {:?} vs {:?}",
                            tthen.ty, telse.ty
                        ),
                        span,
                    });
                }
                let ty = tthen.ty.clone();
                Ok(fold_cond(span, ty, ttest, tthen, telse))
            }
            ast::ExprKind::Call { callee, args } => self.analyse_call(callee, args, scope, span),
            ast::ExprKind::Member { object, member } => {
                let tobject = self.analyse_expr(object, scope)?;
                let TypeId::Struct(struct_name) = &tobject.ty else {
                    return Err(CompileError::Type {
                        message: format!("member access on non-struct type {:?}", tobject.ty),
                        span,
                    });
                };
                let shape = self
                    .structs
                    .get(struct_name)
                    .expect("struct types only come from a registered StructDefs entry");
                let Some(index) = shape.member_index(member) else {
                    return Err(CompileError::UndefinedName {
                        name: member.clone(),
                        span,
                    });
                };
                let ty = shape.member_type(index).expect("index came from member_index").clone();
                Ok(TExpr {
                    span,
                    ty,
                    kind: TExprKind::Member {
                        object: Box::new(tobject),
                        member_index: u16::try_from(index).expect("struct member overflow"),
                    },
                })
            }
            ast::ExprKind::Index { object, index } => {
                let tobject = self.analyse_expr(object, scope)?;
                let tindex = self.analyse_expr(index, scope)?;
                let ty = match &tobject.ty {
                    TypeId::String => {
                        self.require_index_type(&tindex, TypeId::Int, span)?;
                        TypeId::String
                    }
                    TypeId::Vector(elem) => {
                        self.require_index_type(&tindex, TypeId::Int, span)?;
                        (**elem).clone()
                    }
                    TypeId::Dict(value_ty) => {
                        self.require_index_type(&tindex, TypeId::String, span)?;
                        (**value_ty).clone()
                    }
                    TypeId::JsonValue => {
                        if tindex.ty != TypeId::Int && tindex.ty != TypeId::String {
                            return Err(CompileError::Type {
                                message: "json lookup index must be int or string".to_owned(),
                                span,
                            });
                        }
                        TypeId::JsonValue
                    }
                    other => {
                        return Err(CompileError::Type {
                            message: format!("type {other:?} does not support indexing"),
                            span,
                        })
                    }
                };
                Ok(TExpr {
                    span,
                    ty,
                    kind: TExprKind::Index {
                        object: Box::new(tobject),
                        index: Box::new(tindex),
                    },
                })
            }
            ast::ExprKind::VectorLit(items) => {
                if items.is_empty() {
                    return Err(CompileError::Type {
                        message: "cannot infer the element type of an empty vector literal".to_owned(),
                        span,
                    });
                }
                let titems = items
                    .iter()
                    .map(|e| self.analyse_expr(e, scope))
                    .collect::<CompileResult<Vec<_>>>()?;
                let elem_ty = titems[0].ty.clone();
                for item in &titems {
                    if item.ty != elem_ty {
                        return Err(CompileError::Type {
                            message: format!(
                                "vector literal element type mismatch: expected {elem_ty:?}, got {:?}",
                                item.ty
                            ),
                            span,
                        });
                    }
                }
                Ok(TExpr {
                    span,
                    ty: TypeId::vector(elem_ty),
                    kind: TExprKind::VectorLit(titems),
                })
            }
            ast::ExprKind::DictLit(entries) => {
                if entries.is_empty() {
                    return Err(CompileError::Type {
                        message: "cannot infer the value type of an empty dict literal".to_owned(),
                        span,
                    });
                }
                let mut tentries = Vec::with_capacity(entries.len());
                let mut value_ty = None;
                for (key, value) in entries {
                    let ast::ExprKind::Literal(Literal::String(key_text)) = &key.kind else {
                        return Err(CompileError::Type {
                            message: "dict literal keys must be string literals".to_owned(),
                            span,
                        });
                    };
                    if key_text.is_empty() {
                        return Err(CompileError::Type {
                            message: "dict keys must be non-empty strings".to_owned(),
                            span,
                        });
                    }
                    let tvalue = self.analyse_expr(value, scope)?;
                    match &value_ty {
                        None => value_ty = Some(tvalue.ty.clone()),
                        Some(expected) if *expected != tvalue.ty => {
                            return Err(CompileError::Type {
                                message: format!(
                                    "dict literal value type mismatch: expected {expected:?}, got {:?}",
                                    tvalue.ty
                                ),
                                span,
                            });
                        }
                        Some(_) => {}
                    }
                    tentries.push((key_text.clone(), tvalue));
                }
                Ok(TExpr {
                    span,
                    ty: TypeId::dict(value_ty.expect("checked non-empty above")),
                    kind: TExprKind::DictLit(tentries),
                })
            }
        }
    }

    fn require_index_type(&self, index: &TExpr, expected: TypeId, span: Span) -> CompileResult<()> {
        if index.ty == expected {
            Ok(())
        } else {
            Err(CompileError::Type {
                message: format!("lookup index must be {expected:?}, got {:?}", index.ty),
                span,
            })
        }
    }

    fn check_binary(&self, op: BinOp, left: &TExpr, right: &TExpr, span: Span) -> CompileResult<TypeId> {
        use BinOp::{Add, And, Div, Eq, Ge, Gt, Le, Lt, Mul, NotEq, Or, Rem, Sub};
        match op {
            Add => match (&left.ty, &right.ty) {
                (TypeId::Int, TypeId::Int) => Ok(TypeId::Int),
                (TypeId::Float, TypeId::Float) => Ok(TypeId::Float),
                (TypeId::String, TypeId::String) => Ok(TypeId::String),
                (TypeId::Vector(a), TypeId::Vector(b)) if a == b => Ok(TypeId::Vector(a.clone())),
                _ => Err(binop_type_error(op, left, right, span)),
            },
            Sub | Mul | Div | Rem => {
                if left.ty.is_numeric() && left.ty == right.ty {
                    Ok(left.ty.clone())
                } else {
                    Err(binop_type_error(op, left, right, span))
                }
            }
            Lt | Le | Gt | Ge => {
                let numeric_or_string =
                    |t: &TypeId| t.is_numeric() || *t == TypeId::String;
                if left.ty == right.ty && numeric_or_string(&left.ty) {
                    Ok(TypeId::Bool)
                } else {
                    Err(binop_type_error(op, left, right, span))
                }
            }
            Eq | NotEq => {
                if left.ty == right.ty {
                    Ok(TypeId::Bool)
                } else {
                    Err(binop_type_error(op, left, right, span))
                }
            }
            And | Or => {
                if left.ty == TypeId::Bool && right.ty == TypeId::Bool {
                    Ok(TypeId::Bool)
                } else {
                    Err(binop_type_error(op, left, right, span))
                }
            }
        }
    }

    fn analyse_call(
        &mut self,
        callee: &str,
        args: &[ast::Expr],
        scope: &mut FunctionScope,
        span: Span,
    ) -> CompileResult<TExpr> {
        if is_type_name(callee, &self.structs) {
            return self.analyse_construct(callee, args, scope, span);
        }

        let targs = args
            .iter()
            .map(|a| self.analyse_expr(a, scope))
            .collect::<CompileResult<Vec<_>>>()?;

        let (addr, ret, params) = self.resolve_function(callee, span)?;

        if targs.len() != params.len() {
            return Err(CompileError::Arity {
                expected: params.len(),
                got: targs.len(),
                span,
            });
        }
        for (arg, param_ty) in targs.iter().zip(params.iter()) {
            if *param_ty == TypeId::Dynamic {
                continue;
            }
            if arg.ty != *param_ty {
                return Err(CompileError::Type {
                    message: format!(
                        "argument type mismatch calling '{callee}': expected {param_ty:?}, got {:?}",
                        arg.ty
                    ),
                    span,
                });
            }
        }
        Ok(TExpr {
            span,
            ty: ret,
            kind: TExprKind::Call {
                function: addr,
                args: targs,
                param_types: params,
            },
        })
    }

    fn resolve_function(&mut self, name: &str, span: Span) -> CompileResult<(VarAddr, TypeId, Vec<TypeId>)> {
        if let Some((addr, symbol)) = self.globals.resolve(name) {
            let TypeId::Function { ret, args, .. } = &symbol.value_type else {
                return Err(CompileError::Type {
                    message: format!("'{name}' is not callable"),
                    span,
                });
            };
            return Ok((addr, (**ret).clone(), args.clone()));
        }
        let Some(sig) = host_signatures::lookup(name) else {
            return Err(CompileError::UndefinedName {
                name: name.to_owned(),
                span,
            });
        };
        let func_index = self.num_user_functions + u32::try_from(self.host_names.len()).expect("host table overflow");
        self.host_names.push(name.to_owned());
        let params = sig.params.to_vec();
        let ret = sig.ret.clone();
        let addr = self.globals.declare(
            name.to_owned(),
            TypeId::Function {
                ret: Box::new(ret.clone()),
                args: params.clone(),
                is_pure: false,
            },
            SymbolKind::ImmutableLocal,
        );
        self.function_globals.push((addr.index, func_index));
        self.function_sigs.insert(
            name.to_owned(),
            FunctionSig {
                ret: ret.clone(),
                params: params.clone(),
                func_index,
            },
        );
        Ok((addr, ret, params))
    }

    fn analyse_construct(
        &mut self,
        type_name: &str,
        args: &[ast::Expr],
        scope: &mut FunctionScope,
        span: Span,
    ) -> CompileResult<TExpr> {
        let ty = resolve_type_expr(&ast::TypeExpr::Name(type_name.to_owned()), &self.structs);
        let targs = args
            .iter()
            .map(|a| self.analyse_expr(a, scope))
            .collect::<CompileResult<Vec<_>>>()?;

        match &ty {
            TypeId::Struct(name) => {
                let shape = self
                    .structs
                    .get(name)
                    .expect("is_type_name confirmed this struct is registered")
                    .clone();
                if targs.len() != shape.members.len() {
                    return Err(CompileError::Arity {
                        expected: shape.members.len(),
                        got: targs.len(),
                        span,
                    });
                }
                for (arg, (member_name, member_ty)) in targs.iter().zip(shape.members.iter()) {
                    if arg.ty != *member_ty {
                        return Err(CompileError::Type {
                            message: format!(
                                "struct '{name}' member '{member_name}' expects {member_ty:?}, got {:?}",
                                arg.ty
                            ),
                            span,
                        });
                    }
                }
                Ok(TExpr {
                    span,
                    ty,
                    kind: TExprKind::Construct { ty: TypeId::Struct(name.clone()), args: targs },
                })
            }
            primitive => {
                if targs.len() != 1 {
                    return Err(CompileError::Arity {
                        expected: 1,
                        got: targs.len(),
                        span,
                    });
                }
                let arg = &targs[0];
                let ok = arg.ty == *primitive
                    || (*primitive == TypeId::String && arg.ty == TypeId::JsonValue)
                    || (*primitive == TypeId::JsonValue && arg.ty == TypeId::String);
                if !ok {
                    return Err(CompileError::Type {
                        message: format!("cannot construct {primitive:?} from {:?}", arg.ty),
                        span,
                    });
                }
                Ok(TExpr {
                    span,
                    ty: primitive.clone(),
                    kind: TExprKind::Construct {
                        ty: primitive.clone(),
                        args: targs,
                    },
                })
            }
        }
    }
}

fn literal_type(lit: &Literal) -> TypeId {
    match lit {
        Literal::Int(_) => TypeId::Int,
        Literal::Float(_) => TypeId::Float,
        Literal::String(_) => TypeId::String,
        Literal::Bool(_) => TypeId::Bool,
    }
}

fn binop_type_error(op: BinOp, left: &TExpr, right: &TExpr, span: Span) -> CompileError {
    CompileError::Type {
        message: format!("operator {op:?} not defined for {:?} and {:?}", left.ty, right.ty),
        span,
    }
}

fn as_literal(expr: &TExpr) -> Option<&Literal> {
    match &expr.kind {
        TExprKind::Literal(l) | TExprKind::Const(l) => Some(l),
        _ => None,
    }
}

/// Folds a binary expression whose operands are both compile-time literals
/// (spec.md §4.2 "constant folding"), raising `DivByZeroConst` for a
/// statically-known division/remainder by zero.
fn fold_binary(span: Span, ty: TypeId, op: BinOp, left: TExpr, right: TExpr) -> TExpr {
    let make = |kind| TExpr { span, ty: ty.clone(), kind };
    let (Some(l), Some(r)) = (as_literal(&left), as_literal(&right)) else {
        return make(TExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        });
    };
    let folded = match (op, l, r) {
        (BinOp::Add, Literal::Int(a), Literal::Int(b)) => Some(Literal::Int(a + b)),
        (BinOp::Sub, Literal::Int(a), Literal::Int(b)) => Some(Literal::Int(a - b)),
        (BinOp::Mul, Literal::Int(a), Literal::Int(b)) => Some(Literal::Int(a * b)),
        (BinOp::Div, Literal::Int(a), Literal::Int(b)) if *b != 0 => Some(Literal::Int(a / b)),
        (BinOp::Rem, Literal::Int(a), Literal::Int(b)) if *b != 0 => Some(Literal::Int(a % b)),
        (BinOp::Add, Literal::Float(a), Literal::Float(b)) => Some(Literal::Float(a + b)),
        (BinOp::Sub, Literal::Float(a), Literal::Float(b)) => Some(Literal::Float(a - b)),
        (BinOp::Mul, Literal::Float(a), Literal::Float(b)) => Some(Literal::Float(a * b)),
        (BinOp::Div, Literal::Float(a), Literal::Float(b)) if *b != 0.0 => Some(Literal::Float(a / b)),
        (BinOp::Add, Literal::String(a), Literal::String(b)) => Some(Literal::String(format!("{a}{b}"))),
        (BinOp::Lt, Literal::Int(a), Literal::Int(b)) => Some(Literal::Bool(a < b)),
        (BinOp::Le, Literal::Int(a), Literal::Int(b)) => Some(Literal::Bool(a <= b)),
        (BinOp::Gt, Literal::Int(a), Literal::Int(b)) => Some(Literal::Bool(a > b)),
        (BinOp::Ge, Literal::Int(a), Literal::Int(b)) => Some(Literal::Bool(a >= b)),
        (BinOp::Eq, a, b) => Some(Literal::Bool(a == b)),
        (BinOp::NotEq, a, b) => Some(Literal::Bool(a != b)),
        (BinOp::And, Literal::Bool(a), Literal::Bool(b)) => Some(Literal::Bool(*a && *b)),
        (BinOp::Or, Literal::Bool(a), Literal::Bool(b)) => Some(Literal::Bool(*a || *b)),
        _ => None,
    };
    match folded {
        Some(lit) => make(TExprKind::Const(lit)),
        None => make(TExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }),
    }
}

fn fold_unary_minus(span: Span, ty: TypeId, inner: TExpr) -> TExpr {
    if let Some(lit) = as_literal(&inner) {
        let folded = match lit {
            Literal::Int(v) => Some(Literal::Int(-v)),
            Literal::Float(v) => Some(Literal::Float(-v)),
            _ => None,
        };
        if let Some(lit) = folded {
            return TExpr {
                span,
                ty,
                kind: TExprKind::Const(lit),
            };
        }
    }
    TExpr {
        span,
        ty,
        kind: TExprKind::UnaryMinus(Box::new(inner)),
    }
}

fn fold_cond(span: Span, ty: TypeId, test: TExpr, then_branch: TExpr, else_branch: TExpr) -> TExpr {
    if let Some(Literal::Bool(b)) = as_literal(&test) {
        return if *b { then_branch } else { else_branch };
    }
    TExpr {
        span,
        ty,
        kind: TExprKind::Cond {
            test: Box::new(test),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        },
    }
}

/// Whether `expr` is a (possibly already-folded) literal zero — spec.md
/// §4.2 "division/remainder by a literal zero is a compile-time error".
fn is_literal_zero(expr: &TExpr) -> bool {
    match as_literal(expr) {
        Some(Literal::Int(0)) => true,
        Some(Literal::Float(f)) => *f == 0.0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn analyse_src(src: &str) -> CompileResult<TProgram> {
        let program = parse(src).expect("parses");
        analyse(&program)
    }

    #[test]
    fn scenario_one_type_checks() {
        let program = analyse_src("int main(string a){ return 3 + 4; }").expect("analyses");
        assert_eq!(program.functions[0].ret, TypeId::Int);
    }

    #[test]
    fn folds_constant_addition() {
        let program = analyse_src("int main(string a){ return 3 + 4; }").expect("analyses");
        let TStmtKind::Return(expr) = &program.functions[0].body[0].kind else {
            panic!("expected return")
        };
        assert!(matches!(expr.kind, TExprKind::Const(Literal::Int(7))));
    }

    #[test]
    fn rejects_mismatched_return_type() {
        assert!(analyse_src("int main(string a){ return \"x\"; }").is_err());
    }

    #[test]
    fn rejects_immutable_reassignment() {
        let err = analyse_src("int main(){ int x = 1; x = 2; return x; }").unwrap_err();
        assert!(matches!(err, CompileError::ImmutableRebind { .. }));
    }

    #[test]
    fn allows_mutable_reassignment() {
        assert!(analyse_src("int main(){ mutable int x = 1; x = 2; return x; }").is_ok());
    }

    #[test]
    fn struct_construction_type_checks() {
        let program = analyse_src(
            "struct pixel { string s; } string main(){ pixel p = pixel(\"hi\"); return p.s; }",
        )
        .expect("analyses");
        assert_eq!(program.functions[0].ret, TypeId::String);
    }

    #[test]
    fn host_call_registers_lazily() {
        let program = analyse_src("int main(){ print(\"hi\"); return 1; }").expect("analyses");
        assert_eq!(program.host_function_names, vec!["print".to_owned()]);
    }

    #[test]
    fn unknown_function_is_undefined_name() {
        let err = analyse_src("int main(){ return mystery(1); }").unwrap_err();
        assert!(matches!(err, CompileError::UndefinedName { .. }));
    }
}
