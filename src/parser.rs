// ABOUTME: Recursive-descent parser turning lexemes into the syntax tree

use crate::ast::{BinOp, Expr, Param, Stmt, TypeNode, TypeSpec, UnOp};
use crate::error::SyntaxError;
use crate::lexer::{Lexeme, SrcLoc, TokenKind};
use std::rc::Rc;

/// Binary operator precedence, lowest first. Each level is left-associative
/// except the assignment family, which associates to the right.
const OP_SETS: &[&[(TokenKind, BinOp)]] = &[
    &[
        (TokenKind::Assign, BinOp::Assign),
        (TokenKind::AddAssign, BinOp::AddAssign),
        (TokenKind::SubAssign, BinOp::SubAssign),
        (TokenKind::MulAssign, BinOp::MulAssign),
        (TokenKind::DivAssign, BinOp::DivAssign),
    ],
    &[(TokenKind::OrOr, BinOp::Or)],
    &[(TokenKind::AndAnd, BinOp::And)],
    &[(TokenKind::EqEq, BinOp::Eq), (TokenKind::Ne, BinOp::Ne)],
    &[
        (TokenKind::Lt, BinOp::Lt),
        (TokenKind::Gt, BinOp::Gt),
        (TokenKind::Ge, BinOp::Ge),
        (TokenKind::Le, BinOp::Le),
    ],
    &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
    &[(TokenKind::Star, BinOp::Mul), (TokenKind::Slash, BinOp::Div)],
];

/// Parse a token stream into a statement list. All syntax errors found are
/// returned together; the parser synchronizes after each failed statement so
/// later errors still surface.
pub fn parse(toks: &[Lexeme]) -> Result<Vec<Stmt>, Vec<SyntaxError>> {
    let mut parser = Parser {
        toks,
        pos: 0,
        errors: Vec::new(),
    };
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(parser.errors)
    }
}

struct Parser<'a> {
    toks: &'a [Lexeme],
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl<'a> Parser<'a> {
    // ===== Cursor helpers =====

    fn peek(&self) -> &'a Lexeme {
        // The stream always ends with Eof, so clamping is safe.
        &self.toks[self.pos.min(self.toks.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> &'a Lexeme {
        let lexeme = self.peek();
        if !self.at_eof() {
            self.pos += 1;
        }
        lexeme
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    fn eat(&mut self, kind: &TokenKind) -> Option<SrcLoc> {
        if self.check(kind) {
            Some(self.advance().loc.clone())
        } else {
            None
        }
    }

    fn eat_ident(&mut self) -> Option<(Rc<str>, SrcLoc)> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            let loc = self.advance().loc.clone();
            Some((name, loc))
        } else {
            None
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Option<SrcLoc> {
        if let Some(loc) = self.eat(kind) {
            Some(loc)
        } else {
            self.errors.push(SyntaxError::ExpectedToken {
                loc: self.peek().loc.clone(),
                expected: kind.to_string(),
                found: self.peek().to_string(),
            });
            None
        }
    }

    fn expect_ident(&mut self) -> Option<(Rc<str>, SrcLoc)> {
        if let Some(found) = self.eat_ident() {
            Some(found)
        } else {
            self.errors.push(SyntaxError::ExpectedToken {
                loc: self.peek().loc.clone(),
                expected: "identifier".to_string(),
                found: self.peek().to_string(),
            });
            None
        }
    }

    fn expected_rule(&mut self, rule: &'static str) {
        self.errors.push(SyntaxError::ExpectedRule {
            loc: self.peek().loc.clone(),
            rule,
            found: self.peek().to_string(),
        });
    }

    /// Skip to the end of the current statement so parsing can continue.
    fn sync(&mut self) {
        while !self.at_eof() {
            if matches!(self.peek().kind, TokenKind::RBrace) {
                return;
            }
            let was_semi = matches!(self.peek().kind, TokenKind::Semi);
            self.advance();
            if was_semi {
                return;
            }
        }
    }

    // ===== Statements =====

    fn parse_program(&mut self) -> Vec<Stmt> {
        let mut program = Vec::new();
        while !self.at_eof() {
            let errors_before = self.errors.len();
            match self.parse_stmt() {
                Some(stmt) => program.push(stmt),
                None => {
                    if self.errors.len() == errors_before {
                        self.expected_rule("statement");
                    }
                    let before = self.pos;
                    self.sync();
                    // A stray '}' stops sync without progress; step over it.
                    if self.pos == before && !self.at_eof() {
                        self.advance();
                    }
                }
            }
        }
        program
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        match &self.peek().kind {
            TokenKind::KwFn => self.parse_fn(),
            TokenKind::KwBreak | TokenKind::KwContinue => self.parse_ctrl(),
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwWhile => self.parse_while(),
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwPrint => self.parse_print(),
            TokenKind::KwReturn => self.parse_return(),
            TokenKind::KwClassDef => {
                let stmt = self.parse_class_def()?;
                self.expect(&TokenKind::Semi)?;
                Some(stmt)
            }
            TokenKind::KwI32 | TokenKind::KwF32 | TokenKind::KwString | TokenKind::KwClass => {
                let stmt = self.parse_decl()?;
                self.expect(&TokenKind::Semi)?;
                Some(stmt)
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semi)?;
                Some(Stmt::Expr(expr))
            }
        }
    }

    /// A body is a single bare statement or a `{ ... }` block.
    fn parse_body(&mut self) -> Option<Vec<Stmt>> {
        if self.eat(&TokenKind::LBrace).is_some() {
            let mut body = Vec::new();
            while !self.check(&TokenKind::RBrace) && !self.at_eof() {
                let errors_before = self.errors.len();
                match self.parse_stmt() {
                    Some(stmt) => body.push(stmt),
                    None => {
                        if self.errors.len() == errors_before {
                            self.expected_rule("statement");
                        }
                        self.sync();
                    }
                }
            }
            self.expect(&TokenKind::RBrace)?;
            Some(body)
        } else {
            Some(vec![self.parse_stmt()?])
        }
    }

    fn expect_body(&mut self) -> Option<Vec<Stmt>> {
        let errors_before = self.errors.len();
        match self.parse_body() {
            Some(body) => Some(body),
            None => {
                if self.errors.len() == errors_before {
                    self.expected_rule("body-statement");
                }
                None
            }
        }
    }

    fn parse_fn(&mut self) -> Option<Stmt> {
        self.eat(&TokenKind::KwFn)?;

        // Constructors spell their name as the token pair `+` `new`.
        let (name, loc) = if let Some(loc) = self.eat(&TokenKind::Plus) {
            self.expect(&TokenKind::KwNew)?;
            (Rc::from("+new"), loc)
        } else {
            self.expect_ident()?
        };

        self.expect(&TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(&TokenKind::RParen)?;

        let ret = if self.eat(&TokenKind::Colon).is_some() {
            Some(self.expect_type()?)
        } else {
            None
        };

        let body = if self.eat(&TokenKind::Semi).is_some() {
            None
        } else {
            Some(Rc::from(self.expect_body()?))
        };

        Some(Stmt::Fn {
            name,
            params: Rc::from(params),
            ret,
            body,
            loc,
        })
    }

    fn parse_params(&mut self) -> Option<Vec<Param>> {
        let mut params = Vec::new();
        let Some(first_ty) = self.parse_type() else {
            return Some(params);
        };
        let (name, loc) = self.expect_ident()?;
        params.push(Param {
            ty: first_ty,
            name,
            loc,
        });
        while self.eat(&TokenKind::Comma).is_some() {
            let ty = self.expect_type()?;
            let (name, loc) = self.expect_ident()?;
            params.push(Param { ty, name, loc });
        }
        Some(params)
    }

    fn parse_ctrl(&mut self) -> Option<Stmt> {
        let stmt = if let Some(loc) = self.eat(&TokenKind::KwBreak) {
            Stmt::Break { loc }
        } else {
            let loc = self.eat(&TokenKind::KwContinue)?;
            Stmt::Continue { loc }
        };
        self.expect(&TokenKind::Semi)?;
        Some(stmt)
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        let loc = self.eat(&TokenKind::KwReturn)?;
        let value = self.expect_expr()?;
        self.expect(&TokenKind::Semi)?;
        Some(Stmt::Return { value, loc })
    }

    fn parse_while(&mut self) -> Option<Stmt> {
        let loc = self.eat(&TokenKind::KwWhile)?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.expect_expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.expect_body()?;
        Some(Stmt::While { cond, body, loc })
    }

    fn parse_for(&mut self) -> Option<Stmt> {
        let loc = self.eat(&TokenKind::KwFor)?;
        self.expect(&TokenKind::LParen)?;

        let init = match &self.peek().kind {
            TokenKind::Semi => None,
            TokenKind::KwI32 | TokenKind::KwF32 | TokenKind::KwString | TokenKind::KwClass => {
                Some(Box::new(self.parse_decl()?))
            }
            _ => Some(Box::new(Stmt::Expr(self.expect_expr()?))),
        };
        self.expect(&TokenKind::Semi)?;

        let cond = self.expect_expr()?;
        self.expect(&TokenKind::Semi)?;

        let inc = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.expect_expr()?)
        };
        self.expect(&TokenKind::RParen)?;

        let body = self.expect_body()?;
        Some(Stmt::For {
            init,
            cond,
            inc,
            body,
            loc,
        })
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let loc = self.eat(&TokenKind::KwIf)?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.expect_expr()?;
        self.expect(&TokenKind::RParen)?;
        let then_body = self.expect_body()?;
        let else_body = if self.eat(&TokenKind::KwElse).is_some() {
            Some(self.expect_body()?)
        } else {
            None
        };
        Some(Stmt::If {
            cond,
            then_body,
            else_body,
            loc,
        })
    }

    fn parse_print(&mut self) -> Option<Stmt> {
        let loc = self.eat(&TokenKind::KwPrint)?;
        let mut args = Vec::new();
        match self.parse_expr() {
            Some(expr) => args.push(expr),
            None => {
                self.expected_rule("argument-expression-list");
                return None;
            }
        }
        while self.eat(&TokenKind::Comma).is_some() {
            args.push(self.expect_expr()?);
        }
        self.expect(&TokenKind::Semi)?;
        Some(Stmt::Print { args, loc })
    }

    fn parse_class_def(&mut self) -> Option<Stmt> {
        self.eat(&TokenKind::KwClassDef)?;
        let (name, loc) = self.expect_ident()?;
        self.expect(&TokenKind::LBrace)?;

        let mut body = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::KwI32 | TokenKind::KwF32 | TokenKind::KwString | TokenKind::KwClass => {
                    let decl = self.parse_decl()?;
                    self.expect(&TokenKind::Semi)?;
                    body.push(decl);
                }
                TokenKind::KwFn => body.push(self.parse_fn()?),
                _ => break,
            }
        }

        self.expect(&TokenKind::RBrace)?;
        Some(Stmt::ClassDef { name, body, loc })
    }

    fn parse_decl(&mut self) -> Option<Stmt> {
        let ty = self.parse_type()?;
        let (name, loc) = self.expect_ident()?;
        let init = if self.eat(&TokenKind::Assign).is_some() {
            Some(self.expect_expr()?)
        } else {
            None
        };
        Some(Stmt::Decl {
            ty,
            name,
            init,
            loc,
        })
    }

    // ===== Types =====

    fn parse_type(&mut self) -> Option<TypeNode> {
        let (spec, loc) = match &self.peek().kind {
            TokenKind::KwI32 => (TypeSpec::I32, self.advance().loc.clone()),
            TokenKind::KwF32 => (TypeSpec::F32, self.advance().loc.clone()),
            TokenKind::KwString => (TypeSpec::Str, self.advance().loc.clone()),
            TokenKind::KwClass => {
                self.advance();
                let (name, loc) = self.expect_ident()?;
                (TypeSpec::Class(name), loc)
            }
            _ => return None,
        };

        let array = if self.eat(&TokenKind::LBracket).is_some() {
            self.expect(&TokenKind::RBracket)?;
            true
        } else {
            false
        };

        Some(TypeNode { spec, array, loc })
    }

    fn expect_type(&mut self) -> Option<TypeNode> {
        let errors_before = self.errors.len();
        match self.parse_type() {
            Some(ty) => Some(ty),
            None => {
                if self.errors.len() == errors_before {
                    self.expected_rule("type");
                }
                None
            }
        }
    }

    // ===== Expressions =====

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_binary(0)
    }

    fn expect_expr(&mut self) -> Option<Expr> {
        let errors_before = self.errors.len();
        match self.parse_expr() {
            Some(expr) => Some(expr),
            None => {
                if self.errors.len() == errors_before {
                    self.expected_rule("expression");
                }
                None
            }
        }
    }

    fn parse_binary(&mut self, level: usize) -> Option<Expr> {
        if level >= OP_SETS.len() {
            return self.parse_unary();
        }

        let mut lhs = self.parse_binary(level + 1)?;

        loop {
            let Some(op) = OP_SETS[level]
                .iter()
                .find(|(kind, _)| self.check(kind))
                .map(|(_, op)| *op)
            else {
                return Some(lhs);
            };
            let loc = self.advance().loc.clone();

            // Assignment associates to the right; everything else loops left.
            let rhs_level = if level == 0 { level } else { level + 1 };
            let rhs = self.parse_binary(rhs_level);
            let Some(rhs) = rhs else {
                self.expected_rule("expression");
                return None;
            };

            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                loc,
            };
            if level == 0 {
                return Some(lhs);
            }
        }
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        let op = if self.check(&TokenKind::Minus) {
            Some(UnOp::Neg)
        } else if self.check(&TokenKind::Bang) {
            Some(UnOp::Not)
        } else {
            None
        };
        if let Some(op) = op {
            let loc = self.advance().loc.clone();
            let Some(rhs) = self.parse_unary() else {
                self.expected_rule("expression");
                return None;
            };
            return Some(Expr::Unary {
                op,
                rhs: Box::new(rhs),
                loc,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut base = self.parse_primary()?;

        loop {
            if let Some(loc) = self.eat(&TokenKind::LBracket) {
                let index = self.expect_expr()?;
                self.expect(&TokenKind::RBracket)?;
                base = Expr::Index {
                    base: Box::new(base),
                    index: Box::new(index),
                    loc,
                };
            } else if self.eat(&TokenKind::Dot).is_some() {
                let (name, loc) = self.expect_ident()?;
                base = Expr::Member {
                    base: Box::new(base),
                    name,
                    loc,
                };
            } else if let Some(loc) = self.eat(&TokenKind::LParen) {
                let args = self.parse_args()?;
                self.expect(&TokenKind::RParen)?;
                base = Expr::Call {
                    base: Box::new(base),
                    args,
                    loc,
                };
            } else if let Some(loc) = self.eat(&TokenKind::Incr) {
                base = Expr::PostIncr {
                    lhs: Box::new(base),
                    loc,
                };
            } else if let Some(loc) = self.eat(&TokenKind::Decr) {
                base = Expr::PostDecr {
                    lhs: Box::new(base),
                    loc,
                };
            } else {
                return Some(base);
            }
        }
    }

    fn parse_args(&mut self) -> Option<Vec<Expr>> {
        let mut args = Vec::new();
        let Some(first) = self.parse_expr() else {
            return Some(args);
        };
        args.push(first);
        while self.eat(&TokenKind::Comma).is_some() {
            args.push(self.expect_expr()?);
        }
        Some(args)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        match &self.peek().kind {
            TokenKind::Int(value) => {
                let value = *value;
                let loc = self.advance().loc.clone();
                Some(Expr::Int { value, loc })
            }
            TokenKind::Float(value) => {
                let value = *value;
                let loc = self.advance().loc.clone();
                Some(Expr::Float { value, loc })
            }
            TokenKind::Str(value) => {
                let value = value.clone();
                let loc = self.advance().loc.clone();
                Some(Expr::Str { value, loc })
            }
            TokenKind::KwNew => {
                let loc = self.advance().loc.clone();
                let (class, _) = self.expect_ident()?;
                Some(Expr::New { class, loc })
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                let loc = self.advance().loc.clone();
                Some(Expr::Ident { name, loc })
            }
            TokenKind::KwArrayInit => {
                let loc = self.advance().loc.clone();
                self.expect(&TokenKind::Lt)?;
                let elem = self.expect_type()?;
                self.expect(&TokenKind::Gt)?;

                if self.eat(&TokenKind::LBrace).is_some() {
                    let items = self.parse_args()?;
                    self.expect(&TokenKind::RBrace)?;
                    Some(Expr::ArrayLit { elem, items, loc })
                } else {
                    self.expect(&TokenKind::LParen)?;
                    let size = self.expect_expr()?;
                    self.expect(&TokenKind::RParen)?;
                    Some(Expr::ArrayNew {
                        elem,
                        size: Box::new(size),
                        loc,
                    })
                }
            }
            TokenKind::LParen => {
                self.advance();
                let body = self.expect_expr()?;
                self.expect(&TokenKind::RParen)?;
                Some(body)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex_source;

    fn parse_ok(src: &str) -> Vec<Stmt> {
        let toks = lex_source(src, "<test>").unwrap();
        parse(&toks).unwrap()
    }

    fn parse_errors(src: &str) -> Vec<SyntaxError> {
        let toks = lex_source(src, "<test>").unwrap();
        parse(&toks).unwrap_err()
    }

    #[test]
    fn test_parse_declaration() {
        let prog = parse_ok("i32 x = 1 + 2;");
        assert_eq!(prog.len(), 1);
        match &prog[0] {
            Stmt::Decl { name, init, ty, .. } => {
                assert_eq!(name.as_ref(), "x");
                assert!(!ty.array);
                assert!(matches!(
                    init,
                    Some(Expr::Binary {
                        op: BinOp::Add,
                        ..
                    })
                ));
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let prog = parse_ok("i32 x = 1 + 2 * 3;");
        match &prog[0] {
            Stmt::Decl {
                init: Some(Expr::Binary { op, rhs, .. }),
                ..
            } => {
                assert_eq!(*op, BinOp::Add);
                assert!(matches!(
                    rhs.as_ref(),
                    Expr::Binary {
                        op: BinOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        // a = b = 1 parses as a = (b = 1)
        let prog = parse_ok("a = b = 1;");
        match &prog[0] {
            Stmt::Expr(Expr::Binary {
                op: BinOp::Assign,
                rhs,
                ..
            }) => {
                assert!(matches!(
                    rhs.as_ref(),
                    Expr::Binary {
                        op: BinOp::Assign,
                        ..
                    }
                ));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_comparison_is_left_associative() {
        let prog = parse_ok("x = a - b - c;");
        match &prog[0] {
            Stmt::Expr(Expr::Binary { rhs, .. }) => match rhs.as_ref() {
                Expr::Binary {
                    op: BinOp::Sub,
                    lhs,
                    ..
                } => {
                    assert!(matches!(
                        lhs.as_ref(),
                        Expr::Binary {
                            op: BinOp::Sub,
                            ..
                        }
                    ));
                }
                other => panic!("unexpected rhs: {:?}", other),
            },
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_postfix_chain() {
        // a.b[0](1) parses inside-out
        let prog = parse_ok("a.b[0](1);");
        match &prog[0] {
            Stmt::Expr(Expr::Call { base, args, .. }) => {
                assert_eq!(args.len(), 1);
                assert!(matches!(base.as_ref(), Expr::Index { .. }));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_function_definition() {
        let prog = parse_ok("fn add(i32 a, i32 b): i32 { return a + b; }");
        match &prog[0] {
            Stmt::Fn {
                name,
                params,
                ret,
                body,
                ..
            } => {
                assert_eq!(name.as_ref(), "add");
                assert_eq!(params.len(), 2);
                assert!(ret.is_some());
                assert_eq!(body.as_ref().map(|b| b.len()), Some(1));
            }
            other => panic!("expected fn, got {:?}", other),
        }
    }

    #[test]
    fn test_forward_declaration() {
        let prog = parse_ok("fn sqrt(f32 x): f32;");
        match &prog[0] {
            Stmt::Fn { body, .. } => assert!(body.is_none()),
            other => panic!("expected fn, got {:?}", other),
        }
    }

    #[test]
    fn test_constructor_name() {
        let prog = parse_ok("class_def P { i32 x; fn +new(i32 a) { this.x = a; } };");
        match &prog[0] {
            Stmt::ClassDef { name, body, .. } => {
                assert_eq!(name.as_ref(), "P");
                assert_eq!(body.len(), 2);
                match &body[1] {
                    Stmt::Fn { name, .. } => assert_eq!(name.as_ref(), "+new"),
                    other => panic!("expected ctor, got {:?}", other),
                }
            }
            other => panic!("expected class_def, got {:?}", other),
        }
    }

    #[test]
    fn test_array_init_forms() {
        let prog = parse_ok("i32[] a = array_init<i32>{1, 2, 3}; i32[] b = array_init<i32>(8);");
        match &prog[0] {
            Stmt::Decl {
                init: Some(Expr::ArrayLit { items, .. }),
                ..
            } => assert_eq!(items.len(), 3),
            other => panic!("unexpected parse: {:?}", other),
        }
        match &prog[1] {
            Stmt::Decl {
                init: Some(Expr::ArrayNew { .. }),
                ..
            } => {}
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_for_with_declaration_init() {
        let prog = parse_ok("for (i32 i = 0; i < 10; i++) print i;");
        match &prog[0] {
            Stmt::For { init, inc, .. } => {
                assert!(matches!(init.as_deref(), Some(Stmt::Decl { .. })));
                assert!(matches!(inc, Some(Expr::PostIncr { .. })));
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_else_binds_inner() {
        let prog = parse_ok("if (1) if (0) print 1; else print 2;");
        match &prog[0] {
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                assert!(else_body.is_none());
                assert!(matches!(
                    &then_body[0],
                    Stmt::If {
                        else_body: Some(_),
                        ..
                    }
                ));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_semicolon_is_reported() {
        let errors = parse_errors("i32 x = 1");
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("expected ';'")));
    }

    #[test]
    fn test_parser_reports_multiple_errors() {
        let errors = parse_errors("i32 x = ;\ni32 y = 1\ni32 z = 2;");
        assert!(errors.len() >= 2);
    }

    #[test]
    fn test_missing_expression_reported() {
        let errors = parse_errors("i32 x = 1 + ;");
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("expected 'expression'")));
    }
}
