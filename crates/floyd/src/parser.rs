//! Recursive-descent parser, lowering a token stream into the untyped AST
//! (spec.md §4.1). Precedence climbing for expressions follows the table in
//! spec.md §4.1 exactly: postfix tightest, then unary minus, `* / %`, `+ -`,
//! relational, equality, `&&`, `||`, and right-associative `?:` loosest.
//!
//! Grounded on the teacher's parser shape (fail-fast, no error recovery,
//! `ParseError` carrying a span) even though the teacher itself defers to
//! `ruff_python_parser` for Python's grammar — Floyd's C-family grammar has
//! no ready-made crate in the pack, so this is hand-rolled the way
//! `original_source/FloydSpeak/floyd_parser.cpp` does it.

use crate::ast::*;
use crate::error::{CompileError, CompileResult};
use crate::lexer::{Lexer, Tok, Token};
use crate::span::Span;

pub fn parse(source: &str) -> CompileResult<Program> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser { tokens, pos: 0 }.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens
            .get(self.pos + offset)
            .map_or(&Tok::Eof, |t| &t.tok)
    }

    fn span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> CompileResult<Token> {
        if self.peek() == tok {
            Ok(self.bump())
        } else {
            Err(CompileError::Parse {
                message: format!("expected {what}, found {:?}", self.peek()),
                span: self.span(),
            })
        }
    }

    fn expect_ident(&mut self, what: &str) -> CompileResult<String> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.bump();
                Ok(name)
            }
            other => Err(CompileError::Parse {
                message: format!("expected {what}, found {other:?}"),
                span: self.span(),
            }),
        }
    }

    fn parse_program(&mut self) -> CompileResult<Program> {
        let mut program = Program::default();
        while self.peek() != &Tok::Eof {
            match self.peek() {
                Tok::Struct => program.structs.push(self.parse_struct_def()?),
                Tok::Bind => program.globals.push(self.parse_stmt()?),
                _ => program.functions.push(self.parse_func_def()?),
            }
        }
        Ok(program)
    }

    fn parse_type_expr(&mut self) -> CompileResult<TypeExpr> {
        match self.peek().clone() {
            Tok::LBracket => {
                self.bump();
                let inner = self.parse_type_expr()?;
                if self.peek() == &Tok::Colon {
                    self.bump();
                    let value = self.parse_type_expr()?;
                    self.expect(&Tok::RBracket, "']'")?;
                    let _ = inner; // key type is always `string`, per spec.md §6.
                    Ok(TypeExpr::Dict(Box::new(value)))
                } else {
                    self.expect(&Tok::RBracket, "']'")?;
                    Ok(TypeExpr::Vector(Box::new(inner)))
                }
            }
            Tok::Ident(name) => {
                self.bump();
                Ok(TypeExpr::Name(name))
            }
            other => Err(CompileError::Parse {
                message: format!("expected a type, found {other:?}"),
                span: self.span(),
            }),
        }
    }

    fn parse_struct_def(&mut self) -> CompileResult<StructDef> {
        let start = self.span();
        self.bump(); // 'struct'
        let name = self.expect_ident("struct name")?;
        self.expect(&Tok::LBrace, "'{'")?;
        let mut members = Vec::new();
        while self.peek() != &Tok::RBrace {
            let type_expr = self.parse_type_expr()?;
            let name = self.expect_ident("member name")?;
            // Default member initializers (`T b = expr;`) are parsed and
            // discarded at the AST level; spec.md's struct construction rule
            // requires every constructor call to supply all members
            // positionally, so defaults have no resolved-AST representation.
            if self.peek() == &Tok::Eq {
                self.bump();
                self.parse_expr()?;
            }
            self.expect(&Tok::Semi, "';'")?;
            members.push(Param { name, type_expr });
        }
        let end = self.span();
        self.bump(); // '}'
        Ok(StructDef {
            span: start.to(end),
            name,
            members,
        })
    }

    fn parse_func_def(&mut self) -> CompileResult<FuncDef> {
        let start = self.span();
        let ret = self.parse_type_expr()?;
        let name = self.expect_ident("function name")?;
        self.expect(&Tok::LParen, "'('")?;
        let mut params = Vec::new();
        while self.peek() != &Tok::RParen {
            let type_expr = self.parse_type_expr()?;
            let pname = self.expect_ident("parameter name")?;
            params.push(Param {
                name: pname,
                type_expr,
            });
            if self.peek() == &Tok::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(&Tok::RParen, "')'")?;
        let body = self.parse_block()?;
        let end = self.span();
        Ok(FuncDef {
            span: start.to(end),
            name,
            params,
            ret,
            body,
        })
    }

    fn parse_block(&mut self) -> CompileResult<Vec<Stmt>> {
        self.expect(&Tok::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while self.peek() != &Tok::RBrace {
            stmts.push(self.parse_stmt()?);
        }
        self.bump(); // '}'
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> CompileResult<Stmt> {
        let start = self.span();
        let kind = match self.peek().clone() {
            Tok::Return => {
                self.bump();
                let expr = self.parse_expr()?;
                self.expect(&Tok::Semi, "';'")?;
                StmtKind::Return(expr)
            }
            Tok::Bind => {
                self.bump();
                let mutable = if self.peek() == &Tok::Mutable {
                    self.bump();
                    true
                } else {
                    false
                };
                // `bind` always carries an explicit type in Floyd's surface
                // syntax; `Option` on the AST node exists for resolved-AST
                // symmetry with function-body temporaries, not surface parsing.
                let type_expr = Some(self.parse_type_expr()?);
                let name = self.expect_ident("variable name")?;
                self.expect(&Tok::Eq, "'='")?;
                let expr = self.parse_expr()?;
                self.expect(&Tok::Semi, "';'")?;
                StmtKind::Bind {
                    mutable,
                    type_expr,
                    name,
                    expr,
                }
            }
            Tok::If => {
                self.bump();
                self.expect(&Tok::LParen, "'('")?;
                let test = self.parse_expr()?;
                self.expect(&Tok::RParen, "')'")?;
                let then_body = self.parse_block()?;
                let else_body = if self.peek() == &Tok::Else {
                    self.bump();
                    if self.peek() == &Tok::If {
                        vec![self.parse_stmt()?]
                    } else {
                        self.parse_block()?
                    }
                } else {
                    Vec::new()
                };
                StmtKind::If {
                    test,
                    then_body,
                    else_body,
                }
            }
            Tok::While => {
                self.bump();
                self.expect(&Tok::LParen, "'('")?;
                let test = self.parse_expr()?;
                self.expect(&Tok::RParen, "')'")?;
                let body = self.parse_block()?;
                StmtKind::While { test, body }
            }
            Tok::For => {
                self.bump();
                self.expect(&Tok::LParen, "'('")?;
                let var = self.expect_ident("loop variable")?;
                self.expect(&Tok::Eq, "'='")?;
                let start_expr = self.parse_expr()?;
                self.expect(&Tok::Comma, "','")?;
                let end_expr = self.parse_expr()?;
                self.expect(&Tok::RParen, "')'")?;
                let body = self.parse_block()?;
                StmtKind::For {
                    var,
                    start: start_expr,
                    end: end_expr,
                    body,
                }
            }
            Tok::LBrace => StmtKind::Block(self.parse_block()?),
            Tok::Ident(name) if self.peek_at(1) == &Tok::Eq => {
                self.bump();
                self.bump(); // '='
                let expr = self.parse_expr()?;
                self.expect(&Tok::Semi, "';'")?;
                StmtKind::Assign { name, expr }
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&Tok::Semi, "';'")?;
                StmtKind::Expr(expr)
            }
        };
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        Ok(Stmt {
            span: start.to(end),
            kind,
        })
    }

    // --- Expressions, tightest to loosest (spec.md §4.1 precedence table) ---

    fn parse_expr(&mut self) -> CompileResult<Expr> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> CompileResult<Expr> {
        let test = self.parse_or()?;
        if self.peek() == &Tok::Question {
            self.bump();
            let then_branch = self.parse_conditional()?; // right-associative
            self.expect(&Tok::Colon, "':'")?;
            let else_branch = self.parse_conditional()?;
            let span = test.span.to(else_branch.span);
            Ok(Expr {
                span,
                kind: ExprKind::Cond {
                    test: Box::new(test),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                },
            })
        } else {
            Ok(test)
        }
    }

    fn parse_or(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == &Tok::OrOr {
            self.bump();
            let right = self.parse_and()?;
            left = bin(left, BinOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.peek() == &Tok::AndAnd {
            self.bump();
            let right = self.parse_equality()?;
            left = bin(left, BinOp::And, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Tok::EqEq => BinOp::Eq,
                Tok::NotEq => BinOp::NotEq,
                _ => break,
            };
            self.bump();
            let right = self.parse_relational()?;
            left = bin(left, op, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Tok::Lt => BinOp::Lt,
                Tok::Le => BinOp::Le,
                Tok::Gt => BinOp::Gt,
                Tok::Ge => BinOp::Ge,
                _ => break,
            };
            self.bump();
            let right = self.parse_additive()?;
            left = bin(left, op, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.parse_multiplicative()?;
            left = bin(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::Percent => BinOp::Rem,
                _ => break,
            };
            self.bump();
            let right = self.parse_unary()?;
            left = bin(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> CompileResult<Expr> {
        if self.peek() == &Tok::Minus {
            let start = self.span();
            self.bump();
            let operand = self.parse_unary()?;
            let span = start.to(operand.span);
            Ok(Expr {
                span,
                kind: ExprKind::UnaryMinus(Box::new(operand)),
            })
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> CompileResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().clone() {
                Tok::Dot => {
                    self.bump();
                    let member = self.expect_ident("member name")?;
                    let end = self.tokens[self.pos - 1].span;
                    expr = Expr {
                        span: expr.span.to(end),
                        kind: ExprKind::Member {
                            object: Box::new(expr),
                            member,
                        },
                    };
                }
                Tok::LBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(&Tok::RBracket, "']'")?;
                    let end = self.tokens[self.pos - 1].span;
                    expr = Expr {
                        span: expr.span.to(end),
                        kind: ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                Tok::LParen => {
                    // Only a bare identifier may be called/constructed
                    // (spec.md §4.1 `call` / `constructor`); anything else
                    // in callee position is a type error the analyser will
                    // report more precisely than the parser could.
                    let ExprKind::Ident(callee) = expr.kind.clone() else {
                        break;
                    };
                    self.bump();
                    let mut args = Vec::new();
                    while self.peek() != &Tok::RParen {
                        args.push(self.parse_expr()?);
                        if self.peek() == &Tok::Comma {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    self.expect(&Tok::RParen, "')'")?;
                    let end = self.tokens[self.pos - 1].span;
                    expr = Expr {
                        span: expr.span.to(end),
                        kind: ExprKind::Call { callee, args },
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> CompileResult<Expr> {
        let start = self.span();
        match self.peek().clone() {
            Tok::Int(v) => {
                self.bump();
                Ok(Expr {
                    span: start,
                    kind: ExprKind::Literal(Literal::Int(v)),
                })
            }
            Tok::Float(v) => {
                self.bump();
                Ok(Expr {
                    span: start,
                    kind: ExprKind::Literal(Literal::Float(v)),
                })
            }
            Tok::Str(v) => {
                self.bump();
                Ok(Expr {
                    span: start,
                    kind: ExprKind::Literal(Literal::String(v)),
                })
            }
            Tok::True => {
                self.bump();
                Ok(Expr {
                    span: start,
                    kind: ExprKind::Literal(Literal::Bool(true)),
                })
            }
            Tok::False => {
                self.bump();
                Ok(Expr {
                    span: start,
                    kind: ExprKind::Literal(Literal::Bool(false)),
                })
            }
            Tok::Ident(name) => {
                self.bump();
                Ok(Expr {
                    span: start,
                    kind: ExprKind::Ident(name),
                })
            }
            Tok::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(inner)
            }
            Tok::LBracket => {
                self.bump();
                let mut items = Vec::new();
                while self.peek() != &Tok::RBracket {
                    items.push(self.parse_expr()?);
                    if self.peek() == &Tok::Comma {
                        self.bump();
                    } else {
                        break;
                    }
                }
                let end = self.span();
                self.expect(&Tok::RBracket, "']'")?;
                Ok(Expr {
                    span: start.to(end),
                    kind: ExprKind::VectorLit(items),
                })
            }
            Tok::LBrace => {
                self.bump();
                let mut entries = Vec::new();
                while self.peek() != &Tok::RBrace {
                    let key = self.parse_expr()?;
                    self.expect(&Tok::Colon, "':'")?;
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    if self.peek() == &Tok::Comma {
                        self.bump();
                    } else {
                        break;
                    }
                }
                let end = self.span();
                self.expect(&Tok::RBrace, "'}'")?;
                Ok(Expr {
                    span: start.to(end),
                    kind: ExprKind::DictLit(entries),
                })
            }
            other => Err(CompileError::Parse {
                message: format!("unexpected token {other:?} in expression"),
                span: start,
            }),
        }
    }
}

fn bin(left: Expr, op: BinOp, right: Expr) -> Expr {
    let span = left.span.to(right.span);
    Expr {
        span,
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_one() {
        let program = parse("int main(string a){ return 3 + 4; }").expect("parses");
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].name, "main");
    }

    #[test]
    fn parses_struct_def() {
        let program = parse("struct pixel { string s; } string main(){ pixel p = pixel(\"hi\"); return p.s; }")
            .expect("parses");
        assert_eq!(program.structs.len(), 1);
        assert_eq!(program.structs[0].members.len(), 1);
    }

    #[test]
    fn precedence_matches_spec() {
        let program = parse("int main(){ return 1 + 2 * 3; }").expect("parses");
        let StmtKind::Return(expr) = &program.functions[0].body[0].kind else {
            panic!("expected return");
        };
        let ExprKind::Binary { op: BinOp::Add, right, .. } = &expr.kind else {
            panic!("expected top-level add");
        };
        assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn conditional_is_right_associative() {
        // a ? b : c ? d : e  ==  a ? b : (c ? d : e)
        let program = parse("int main(){ return 1 ? 2 : 3 ? 4 : 5; }").expect("parses");
        let StmtKind::Return(expr) = &program.functions[0].body[0].kind else {
            panic!("expected return");
        };
        let ExprKind::Cond { else_branch, .. } = &expr.kind else {
            panic!("expected conditional");
        };
        assert!(matches!(else_branch.kind, ExprKind::Cond { .. }));
    }

    #[test]
    fn unterminated_block_errs() {
        assert!(parse("int main() { return 1;").is_err());
    }
}
