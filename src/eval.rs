// ABOUTME: The tree-walking evaluator: statements, declarations, expressions and calls

use crate::ast::{BinOp, Expr, Stmt, TypeNode, TypeSpec, UnOp};
use crate::error::EvalError;
use crate::heap::BlockId;
use crate::interp::{Interp, NativeCtx};
use crate::lexer::SrcLoc;
use crate::scope::{self, ClassDef, FnDef, ScopeId};
use crate::value::{ClassId, Data, Origin, Spec, Type, Value};
use std::rc::Rc;

impl Interp {
    // ========================================================================
    // Statements
    // ========================================================================

    /// Run a statement list in an existing scope, stopping when the scope
    /// returns or a loop flag armed at entry gets cleared by break/continue.
    pub(crate) fn exec_body(&mut self, s: ScopeId, stmts: &[Stmt]) -> Result<(), EvalError> {
        let entry_cont = self.scopes[s].cont_flag;
        let entry_break = self.scopes[s].break_flag;

        for stmt in stmts {
            if self.scopes[s].ret_flag {
                break;
            }
            if entry_cont && !self.scopes[s].cont_flag {
                break;
            }
            if entry_break && !self.scopes[s].break_flag {
                break;
            }
            self.exec_stmt(s, stmt)?;
        }
        Ok(())
    }

    /// Run a statement list in a fresh child scope, propagating the return
    /// slot and loop flags back to the parent. Leaving the scope is a
    /// collection safe point when no expression evaluation is in flight.
    fn exec_body_scope(&mut self, s: ScopeId, stmts: &[Stmt]) -> Result<(), EvalError> {
        let child = self.push_scope(Some(s), self.scopes[s].ret_type, self.scopes[s].size);
        self.scopes[child].cont_flag = self.scopes[s].cont_flag;
        self.scopes[child].break_flag = self.scopes[s].break_flag;

        let result = self.exec_body(child, stmts);
        if result.is_ok() {
            self.scopes[s].ret_flag = self.scopes[child].ret_flag;
            self.scopes[s].cont_flag = self.scopes[child].cont_flag;
            self.scopes[s].break_flag = self.scopes[child].break_flag;
            self.scopes[s].ret_value = self.scopes[child].ret_value.clone();
        }
        self.scopes.truncate(child);

        if result.is_ok() && self.eval_depth == 0 {
            self.collect();
        }
        result
    }

    pub(crate) fn exec_stmt(&mut self, s: ScopeId, stmt: &Stmt) -> Result<(), EvalError> {
        match stmt {
            Stmt::Expr(e) => {
                self.eval_expr(s, e)?;
                Ok(())
            }
            Stmt::Decl {
                ty, name, init, loc,
            } => self.exec_decl(s, ty, name, init.as_ref(), loc),
            Stmt::ClassDef { name, body, loc } => self.exec_class_def(s, name, body, loc),
            Stmt::Fn { .. } => self.exec_fn(s, stmt, None),
            Stmt::Print { args, .. } => self.exec_print(s, args),
            Stmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => self.exec_if(s, cond, then_body, else_body.as_deref()),
            Stmt::While { cond, body, .. } => self.exec_while(s, cond, body),
            Stmt::For {
                init,
                cond,
                inc,
                body,
                ..
            } => self.exec_for(s, init.as_deref(), cond, inc.as_ref(), body),
            Stmt::Return { value, loc } => self.exec_return(s, value, loc),
            Stmt::Break { loc } => {
                if !self.scopes[s].break_flag {
                    return Err(EvalError::BreakOutsideLoop { loc: loc.clone() });
                }
                self.scopes[s].break_flag = false;
                Ok(())
            }
            Stmt::Continue { loc } => {
                if !self.scopes[s].cont_flag {
                    return Err(EvalError::ContinueOutsideLoop { loc: loc.clone() });
                }
                self.scopes[s].cont_flag = false;
                Ok(())
            }
        }
    }

    fn exec_decl(
        &mut self,
        s: ScopeId,
        ty_node: &TypeNode,
        name: &Rc<str>,
        init: Option<&Expr>,
        loc: &SrcLoc,
    ) -> Result<(), EvalError> {
        let ty = self.eval_type(s, ty_node)?;
        let Some(var) = self.scopes[s].add_var(name.clone(), ty) else {
            return Err(EvalError::Redefinition {
                loc: loc.clone(),
                name: name.to_string(),
            });
        };

        let value = match init {
            Some(e) => {
                let mut v = self.eval_expr(s, e)?;
                if !v.cast_to(&ty) {
                    return Err(EvalError::InitTypeMismatch {
                        loc: ty_node.loc.clone(),
                        expected: self.type_name(&ty),
                        found: self.type_name(&v.ty),
                    });
                }
                v
            }
            None => Value::zero(ty),
        };

        self.check_stack(s, loc)?;
        self.heap.store(self.stack, var.off, ty, &value);
        Ok(())
    }

    fn exec_class_def(
        &mut self,
        s: ScopeId,
        name: &Rc<str>,
        body: &[Stmt],
        loc: &SrcLoc,
    ) -> Result<(), EvalError> {
        if scope::find_class(&self.scopes, s, name).is_some() {
            return Err(EvalError::RedefinitionClass {
                loc: loc.clone(),
                name: name.to_string(),
            });
        }

        // Register the class before walking its body so fields and methods
        // can refer to it.
        let cid = self.classes.len();
        self.classes.push(ClassDef::new(name.clone()));
        self.scopes[s].classes.insert(name.clone(), cid);

        for member in body {
            match member {
                Stmt::Decl {
                    ty,
                    name: field,
                    init,
                    loc,
                } => {
                    if init.is_some() {
                        return Err(EvalError::FieldInitializer {
                            loc: loc.clone(),
                            name: field.to_string(),
                        });
                    }
                    let fty = self.eval_type(s, ty)?;
                    if self.classes[cid].add_field(field.clone(), fty).is_none() {
                        return Err(EvalError::Redefinition {
                            loc: loc.clone(),
                            name: field.to_string(),
                        });
                    }
                }
                Stmt::Fn { .. } => self.exec_fn(s, member, Some(cid))?,
                _ => {}
            }
        }

        // A class without a constructor gets an implicit empty one, so
        // `new C()` yields a zeroed instance.
        if !self.classes[cid].methods.contains_key("+new") {
            let fid = self.fns.len();
            self.fns.push(FnDef {
                name: Rc::from("+new"),
                params: Rc::from(Vec::new()),
                body: Some(Rc::from(Vec::new())),
                ret: Type::NONE,
                native: None,
                parent: s,
                class: Some(cid),
                is_ctor: true,
            });
            self.classes[cid].methods.insert(Rc::from("+new"), fid);
        }
        Ok(())
    }

    /// Register a function record, or update an existing record's signature
    /// for a bodyless forward declaration. `class` is set when the function
    /// is a method of the class currently being defined.
    fn exec_fn(
        &mut self,
        s: ScopeId,
        stmt: &Stmt,
        class: Option<ClassId>,
    ) -> Result<(), EvalError> {
        let Stmt::Fn {
            name,
            params,
            ret,
            body,
            loc,
        } = stmt
        else {
            return Ok(());
        };

        let ret_ty = match ret {
            Some(node) => self.eval_type(s, node)?,
            None => Type::NONE,
        };

        let Some(body) = body else {
            let target = match class {
                Some(cid) => self.classes[cid].methods.get(name.as_ref()).copied(),
                None => scope::find_fn(&self.scopes, s, name),
            };
            let Some(fid) = target else {
                return Err(EvalError::UnboundForwardDecl {
                    loc: loc.clone(),
                    name: name.to_string(),
                });
            };
            self.fns[fid].ret = ret_ty;
            self.fns[fid].params = params.clone();
            return Ok(());
        };

        let exists = match class {
            Some(cid) => self.classes[cid].methods.contains_key(name.as_ref()),
            None => scope::find_fn(&self.scopes, s, name).is_some(),
        };
        if exists {
            return Err(EvalError::RedefinitionFn {
                loc: loc.clone(),
                name: name.to_string(),
            });
        }

        let fid = self.fns.len();
        self.fns.push(FnDef {
            name: name.clone(),
            params: params.clone(),
            body: Some(body.clone()),
            ret: ret_ty,
            native: None,
            parent: s,
            class,
            is_ctor: class.is_some() && name.as_ref() == "+new",
        });
        match class {
            Some(cid) => {
                self.classes[cid].methods.insert(name.clone(), fid);
            }
            None => {
                self.scopes[s].fns.insert(name.clone(), fid);
            }
        }
        Ok(())
    }

    fn exec_print(&mut self, s: ScopeId, args: &[Expr]) -> Result<(), EvalError> {
        let mut line = String::new();
        for arg in args {
            let v = self.eval_expr(s, arg)?;
            line.push_str(&self.format_value(&v));
            line.push(' ');
        }
        line.push('\n');
        self.emit(&line);
        Ok(())
    }

    fn exec_if(
        &mut self,
        s: ScopeId,
        cond: &Expr,
        then_body: &[Stmt],
        else_body: Option<&[Stmt]>,
    ) -> Result<(), EvalError> {
        if self.eval_cond(s, cond)? != 0 {
            self.exec_body_scope(s, then_body)
        } else if let Some(else_body) = else_body {
            self.exec_body_scope(s, else_body)
        } else {
            Ok(())
        }
    }

    fn exec_while(&mut self, s: ScopeId, cond: &Expr, body: &[Stmt]) -> Result<(), EvalError> {
        let ls = self.push_scope(Some(s), self.scopes[s].ret_type, self.scopes[s].size);
        let result = self.while_frame(s, ls, cond, body);
        if result.is_ok() {
            self.scopes[s].ret_flag = self.scopes[ls].ret_flag;
            self.scopes[s].ret_value = self.scopes[ls].ret_value.clone();
        }
        self.scopes.truncate(ls);
        result
    }

    fn while_frame(
        &mut self,
        s: ScopeId,
        ls: ScopeId,
        cond: &Expr,
        body: &[Stmt],
    ) -> Result<(), EvalError> {
        loop {
            if self.eval_cond(s, cond)? == 0 {
                return Ok(());
            }
            // Loop flags are re-armed every iteration.
            self.scopes[ls].cont_flag = true;
            self.scopes[ls].break_flag = true;

            self.exec_body_scope(ls, body)?;

            if self.scopes[ls].ret_flag || !self.scopes[ls].break_flag {
                return Ok(());
            }
        }
    }

    fn exec_for(
        &mut self,
        s: ScopeId,
        init: Option<&Stmt>,
        cond: &Expr,
        inc: Option<&Expr>,
        body: &[Stmt],
    ) -> Result<(), EvalError> {
        let ls = self.push_scope(Some(s), self.scopes[s].ret_type, self.scopes[s].size);
        let result = self.for_frame(ls, init, cond, inc, body);
        if result.is_ok() {
            self.scopes[s].ret_flag = self.scopes[ls].ret_flag;
            self.scopes[s].ret_value = self.scopes[ls].ret_value.clone();
        }
        self.scopes.truncate(ls);
        result
    }

    fn for_frame(
        &mut self,
        ls: ScopeId,
        init: Option<&Stmt>,
        cond: &Expr,
        inc: Option<&Expr>,
        body: &[Stmt],
    ) -> Result<(), EvalError> {
        if let Some(init) = init {
            self.exec_stmt(ls, init)?;
        }
        loop {
            if self.eval_cond(ls, cond)? == 0 {
                return Ok(());
            }
            self.scopes[ls].cont_flag = true;
            self.scopes[ls].break_flag = true;

            self.exec_body_scope(ls, body)?;

            if self.scopes[ls].ret_flag || !self.scopes[ls].break_flag {
                return Ok(());
            }
            // The increment runs for its side effects only; the condition is
            // re-evaluated fresh at the top of the loop.
            if let Some(inc) = inc {
                self.eval_expr(ls, inc)?;
            }
        }
    }

    fn exec_return(&mut self, s: ScopeId, value: &Expr, loc: &SrcLoc) -> Result<(), EvalError> {
        let v = self.eval_expr(s, value)?;
        if v.ty != self.scopes[s].ret_type {
            return Err(EvalError::ReturnTypeMismatch {
                loc: loc.clone(),
                expected: self.type_name(&self.scopes[s].ret_type),
                found: self.type_name(&v.ty),
            });
        }
        self.scopes[s].ret_flag = true;
        self.scopes[s].ret_value = v;
        Ok(())
    }

    fn eval_cond(&mut self, s: ScopeId, cond: &Expr) -> Result<i32, EvalError> {
        let v = self.eval_expr(s, cond)?;
        match v.data {
            Data::I32(x) if v.ty == Type::I32 => Ok(x),
            _ => Err(EvalError::NonIntegerCondition {
                loc: cond.loc().clone(),
                found: self.type_name(&v.ty),
            }),
        }
    }

    // ========================================================================
    // Types
    // ========================================================================

    pub(crate) fn eval_type(&self, s: ScopeId, node: &TypeNode) -> Result<Type, EvalError> {
        let spec = match &node.spec {
            TypeSpec::I32 => Spec::I32,
            TypeSpec::F32 => Spec::F32,
            TypeSpec::Str => Spec::Str,
            TypeSpec::Class(name) => {
                let Some(cid) = scope::find_class(&self.scopes, s, name) else {
                    return Err(EvalError::UndefinedClass {
                        loc: node.loc.clone(),
                        name: name.to_string(),
                    });
                };
                Spec::Class(cid)
            }
        };
        Ok(Type {
            spec,
            array: node.array,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(crate) fn eval_expr(&mut self, s: ScopeId, e: &Expr) -> Result<Value, EvalError> {
        self.eval_depth += 1;
        let result = self.eval_expr_inner(s, e);
        self.eval_depth -= 1;
        result
    }

    fn eval_expr_inner(&mut self, s: ScopeId, e: &Expr) -> Result<Value, EvalError> {
        match e {
            Expr::Int { value, .. } => Ok(Value::from_i32(*value)),
            Expr::Float { value, .. } => Ok(Value::from_f32(*value)),
            Expr::Str { value, .. } => {
                let block = self.heap.alloc_string(value);
                Ok(Value::block(Type::STR, Some(block)))
            }
            Expr::Ident { name, loc } => self.eval_ident(s, name, loc),
            Expr::Unary { op, rhs, loc } => self.eval_unary(s, *op, rhs, loc),
            Expr::Binary { op, lhs, rhs, loc } => self.eval_binary(s, *op, lhs, rhs, loc),
            Expr::Index { base, index, loc } => self.eval_index(s, base, index, loc),
            Expr::Member { base, name, loc } => self.eval_member(s, base, name, loc),
            Expr::Call { base, args, loc } => self.eval_call(s, base, args, loc),
            Expr::New { class, loc } => self.eval_new(s, class, loc),
            Expr::ArrayLit { elem, items, .. } => self.eval_array_lit(s, elem, items),
            Expr::ArrayNew { elem, size, loc } => self.eval_array_new(s, elem, size, loc),
            Expr::PostIncr { lhs, loc } => self.eval_post(s, lhs, loc, 1.0),
            Expr::PostDecr { lhs, loc } => self.eval_post(s, lhs, loc, -1.0),
        }
    }

    /// An identifier resolves to a variable (loaded from the stack block) or
    /// a function value.
    fn eval_ident(&mut self, s: ScopeId, name: &str, loc: &SrcLoc) -> Result<Value, EvalError> {
        if let Some(var) = scope::find_var(&self.scopes, s, name) {
            return Ok(self.heap.load(self.stack, var.off, var.ty));
        }
        if let Some(fid) = scope::find_fn(&self.scopes, s, name) {
            return Ok(Value {
                ty: Type::FN,
                data: Data::Fn(fid),
                origin: None,
            });
        }
        Err(EvalError::Undeclared {
            loc: loc.clone(),
            name: name.to_string(),
        })
    }

    fn eval_unary(
        &mut self,
        s: ScopeId,
        op: UnOp,
        rhs_expr: &Expr,
        loc: &SrcLoc,
    ) -> Result<Value, EvalError> {
        let rhs = self.eval_expr(s, rhs_expr)?;
        match (op, rhs.data) {
            (UnOp::Neg, Data::I32(v)) if rhs.ty == Type::I32 => {
                Ok(Value::from_i32(v.wrapping_neg()))
            }
            (UnOp::Neg, Data::F32(v)) if rhs.ty == Type::F32 => Ok(Value::from_f32(-v)),
            (UnOp::Not, Data::I32(v)) if rhs.ty == Type::I32 => {
                Ok(Value::from_i32(i32::from(v == 0)))
            }
            _ => Err(EvalError::NoOperator {
                loc: loc.clone(),
                op: op.symbol(),
                operands: format!("'{}'", self.type_name(&rhs.ty)),
            }),
        }
    }

    fn eval_binary(
        &mut self,
        s: ScopeId,
        op: BinOp,
        lhs_expr: &Expr,
        rhs_expr: &Expr,
        loc: &SrcLoc,
    ) -> Result<Value, EvalError> {
        // Both operands evaluate eagerly, left then right; `&&` and `||` do
        // not short-circuit.
        let lhs = self.eval_expr(s, lhs_expr)?;
        let rhs = self.eval_expr(s, rhs_expr)?;

        if op.is_assign() {
            self.eval_assign(op, lhs, rhs, loc)
        } else {
            self.eval_arith(op, lhs, rhs, loc)
        }
    }

    fn eval_assign(
        &mut self,
        op: BinOp,
        lhs: Value,
        rhs: Value,
        loc: &SrcLoc,
    ) -> Result<Value, EvalError> {
        let Some(origin) = lhs.origin else {
            return Err(EvalError::NotLvalue { loc: loc.clone() });
        };

        let updated = if lhs.ty == Type::I32 {
            let mut r = rhs.clone();
            if !r.cast_to(&Type::I32) {
                return self.no_op(op.symbol(), &lhs, &rhs, loc);
            }
            let (Data::I32(a), Data::I32(b)) = (lhs.data, r.data) else {
                return self.no_op(op.symbol(), &lhs, &rhs, loc);
            };
            let v = match op {
                BinOp::Assign => b,
                BinOp::AddAssign => a.wrapping_add(b),
                BinOp::SubAssign => a.wrapping_sub(b),
                BinOp::MulAssign => a.wrapping_mul(b),
                BinOp::DivAssign => {
                    if b == 0 {
                        return Err(EvalError::DivisionByZero { loc: loc.clone() });
                    }
                    a.wrapping_div(b)
                }
                _ => return self.no_op(op.symbol(), &lhs, &rhs, loc),
            };
            Value {
                ty: Type::I32,
                data: Data::I32(v),
                origin: Some(origin),
            }
        } else if lhs.ty == Type::F32 {
            let mut r = rhs.clone();
            if !r.cast_to(&Type::F32) {
                return self.no_op(op.symbol(), &lhs, &rhs, loc);
            }
            let (Data::F32(a), Data::F32(b)) = (lhs.data, r.data) else {
                return self.no_op(op.symbol(), &lhs, &rhs, loc);
            };
            let v = match op {
                BinOp::Assign => b,
                BinOp::AddAssign => a + b,
                BinOp::SubAssign => a - b,
                BinOp::MulAssign => a * b,
                BinOp::DivAssign => a / b,
                _ => return self.no_op(op.symbol(), &lhs, &rhs, loc),
            };
            Value {
                ty: Type::F32,
                data: Data::F32(v),
                origin: Some(origin),
            }
        } else if lhs.ty == Type::STR && rhs.ty == Type::STR {
            match op {
                BinOp::Assign => Value {
                    ty: Type::STR,
                    data: rhs.data,
                    origin: Some(origin),
                },
                // `+=` always rebinds to a freshly allocated concatenation.
                BinOp::AddAssign => {
                    let block = self.concat(&lhs, &rhs, loc)?;
                    Value {
                        ty: Type::STR,
                        data: Data::Block(Some(block)),
                        origin: Some(origin),
                    }
                }
                _ => return self.no_op(op.symbol(), &lhs, &rhs, loc),
            }
        } else if lhs.ty == rhs.ty && lhs.ty.is_ref() && op == BinOp::Assign {
            // Class, array and string assignments copy the reference.
            Value {
                ty: lhs.ty,
                data: rhs.data,
                origin: Some(origin),
            }
        } else {
            return self.no_op(op.symbol(), &lhs, &rhs, loc);
        };

        self.heap.store(origin.base, origin.offset, updated.ty, &updated);
        Ok(updated)
    }

    fn eval_arith(
        &mut self,
        op: BinOp,
        lhs: Value,
        rhs: Value,
        loc: &SrcLoc,
    ) -> Result<Value, EvalError> {
        if lhs.ty == Type::I32 && rhs.ty == Type::I32 {
            let (Data::I32(a), Data::I32(b)) = (lhs.data, rhs.data) else {
                return self.no_op(op.symbol(), &lhs, &rhs, loc);
            };
            let v = match op {
                BinOp::Add => a.wrapping_add(b),
                BinOp::Sub => a.wrapping_sub(b),
                BinOp::Mul => a.wrapping_mul(b),
                BinOp::Div => {
                    if b == 0 {
                        return Err(EvalError::DivisionByZero { loc: loc.clone() });
                    }
                    a.wrapping_div(b)
                }
                BinOp::Lt => (a < b) as i32,
                BinOp::Gt => (a > b) as i32,
                BinOp::Le => (a <= b) as i32,
                BinOp::Ge => (a >= b) as i32,
                BinOp::Eq => (a == b) as i32,
                BinOp::Ne => (a != b) as i32,
                BinOp::And => (a != 0 && b != 0) as i32,
                BinOp::Or => (a != 0 || b != 0) as i32,
                _ => return self.no_op(op.symbol(), &lhs, &rhs, loc),
            };
            return Ok(Value::from_i32(v));
        }

        // Mixed numeric operands promote to f32.
        let mut l = lhs.clone();
        let mut r = rhs.clone();
        if l.cast_to(&Type::F32) && r.cast_to(&Type::F32) {
            let (Data::F32(a), Data::F32(b)) = (l.data, r.data) else {
                return self.no_op(op.symbol(), &lhs, &rhs, loc);
            };
            return match op {
                BinOp::Add => Ok(Value::from_f32(a + b)),
                BinOp::Sub => Ok(Value::from_f32(a - b)),
                BinOp::Mul => Ok(Value::from_f32(a * b)),
                BinOp::Div => Ok(Value::from_f32(a / b)),
                BinOp::Lt => Ok(Value::from_i32((a < b) as i32)),
                BinOp::Gt => Ok(Value::from_i32((a > b) as i32)),
                BinOp::Le => Ok(Value::from_i32((a <= b) as i32)),
                BinOp::Ge => Ok(Value::from_i32((a >= b) as i32)),
                BinOp::Eq => Ok(Value::from_i32((a == b) as i32)),
                BinOp::Ne => Ok(Value::from_i32((a != b) as i32)),
                _ => self.no_op(op.symbol(), &lhs, &rhs, loc),
            };
        }

        if lhs.ty == Type::STR && rhs.ty == Type::STR {
            if op == BinOp::Add {
                let block = self.concat(&lhs, &rhs, loc)?;
                return Ok(Value::block(Type::STR, Some(block)));
            }
            return self.no_op(op.symbol(), &lhs, &rhs, loc);
        }

        self.no_op(op.symbol(), &lhs, &rhs, loc)
    }

    fn no_op(
        &self,
        op: &'static str,
        lhs: &Value,
        rhs: &Value,
        loc: &SrcLoc,
    ) -> Result<Value, EvalError> {
        Err(EvalError::NoOperator {
            loc: loc.clone(),
            op,
            operands: format!(
                "'{}' and '{}'",
                self.type_name(&lhs.ty),
                self.type_name(&rhs.ty)
            ),
        })
    }

    /// Allocate a fresh block holding the concatenation of two strings.
    fn concat(&mut self, lhs: &Value, rhs: &Value, loc: &SrcLoc) -> Result<BlockId, EvalError> {
        let (Some(a), Some(b)) = (lhs.handle(), rhs.handle()) else {
            return Err(EvalError::UninitialisedString { loc: loc.clone() });
        };
        let mut bytes = self.heap.bytes(a).to_vec();
        bytes.extend_from_slice(self.heap.bytes(b));
        Ok(self.heap.alloc_bytes(&bytes))
    }

    fn eval_index(
        &mut self,
        s: ScopeId,
        base_expr: &Expr,
        index_expr: &Expr,
        loc: &SrcLoc,
    ) -> Result<Value, EvalError> {
        let base = self.eval_expr(s, base_expr)?;
        if !base.ty.array {
            return Err(EvalError::NotArray { loc: loc.clone() });
        }

        let index = self.eval_expr(s, index_expr)?;
        let i = match index.data {
            Data::I32(v) if index.ty == Type::I32 => v,
            _ => {
                return Err(EvalError::NonIntegerIndex {
                    loc: loc.clone(),
                    found: self.type_name(&index.ty),
                })
            }
        };

        let Some(block) = base.handle() else {
            return Err(EvalError::UninitialisedArray { loc: loc.clone() });
        };

        let elem = base.ty.elem();
        if i < 0 {
            return Err(EvalError::IndexOutOfBounds { loc: loc.clone() });
        }
        let off = i as usize * elem.slot_size();
        if off + elem.slot_size() > self.heap.size(block) {
            return Err(EvalError::IndexOutOfBounds { loc: loc.clone() });
        }

        Ok(self.heap.load(block, off, elem))
    }

    fn eval_member(
        &mut self,
        s: ScopeId,
        base_expr: &Expr,
        name: &Rc<str>,
        loc: &SrcLoc,
    ) -> Result<Value, EvalError> {
        let base = self.eval_expr(s, base_expr)?;

        if base.ty.array {
            if name.as_ref() == "length" {
                let Some(block) = base.handle() else {
                    return Err(EvalError::UninitialisedArray { loc: loc.clone() });
                };
                let count = self.heap.size(block) / base.ty.elem().slot_size();
                return Ok(Value::from_i32(count as i32));
            }
            return Err(EvalError::UnknownArrayMember {
                loc: loc.clone(),
                name: name.to_string(),
            });
        }

        let Spec::Class(cid) = base.ty.spec else {
            return Err(EvalError::MemberOfNonClass {
                loc: loc.clone(),
                name: name.to_string(),
            });
        };
        let Some(inst) = base.handle() else {
            return Err(EvalError::UninitialisedClass {
                loc: loc.clone(),
                name: name.to_string(),
            });
        };

        if let Some(field) = self.classes[cid].fields.get(name.as_ref()).copied() {
            return Ok(self.heap.load(inst, field.off, field.ty));
        }
        if let Some(mid) = self.classes[cid].methods.get(name.as_ref()).copied() {
            // A method value pins its receiver through its origin.
            return Ok(Value {
                ty: Type::FN,
                data: Data::Fn(mid),
                origin: Some(Origin {
                    base: inst,
                    offset: 0,
                }),
            });
        }

        Err(EvalError::UnknownMember {
            loc: loc.clone(),
            class: self.classes[cid].name.to_string(),
            name: name.to_string(),
        })
    }

    /// `new ClassName` allocates a zeroed instance and yields its
    /// constructor as a function value bound to the fresh block; the call
    /// that follows runs it.
    fn eval_new(&mut self, s: ScopeId, class: &Rc<str>, loc: &SrcLoc) -> Result<Value, EvalError> {
        let Some(cid) = scope::find_class(&self.scopes, s, class) else {
            return Err(EvalError::UndefinedClass {
                loc: loc.clone(),
                name: class.to_string(),
            });
        };
        let Some(ctor) = self.classes[cid].methods.get("+new").copied() else {
            return Err(EvalError::UnknownMember {
                loc: loc.clone(),
                class: class.to_string(),
                name: "+new".to_string(),
            });
        };

        let block = self.heap.alloc(self.classes[cid].size);
        Ok(Value {
            ty: Type::FN,
            data: Data::Fn(ctor),
            origin: Some(Origin {
                base: block,
                offset: 0,
            }),
        })
    }

    fn eval_array_lit(
        &mut self,
        s: ScopeId,
        elem_node: &TypeNode,
        items: &[Expr],
    ) -> Result<Value, EvalError> {
        let elem = self.eval_type(s, elem_node)?;
        let block = self.heap.alloc(items.len() * elem.slot_size());

        for (i, item) in items.iter().enumerate() {
            let v = self.eval_expr(s, item)?;
            if v.ty != elem {
                return Err(EvalError::ArrayInitTypeMismatch {
                    loc: item.loc().clone(),
                    expected: self.type_name(&elem),
                    found: self.type_name(&v.ty),
                });
            }
            self.heap.store(block, i * elem.slot_size(), elem, &v);
        }

        Ok(Value::block(
            Type {
                spec: elem.spec,
                array: true,
            },
            Some(block),
        ))
    }

    fn eval_array_new(
        &mut self,
        s: ScopeId,
        elem_node: &TypeNode,
        size_expr: &Expr,
        loc: &SrcLoc,
    ) -> Result<Value, EvalError> {
        let elem = self.eval_type(s, elem_node)?;
        let size = self.eval_expr(s, size_expr)?;
        let n = match size.data {
            Data::I32(v) if size.ty == Type::I32 => v,
            _ => return Err(EvalError::NonIntegerArraySize { loc: loc.clone() }),
        };
        if n < 0 {
            return Err(EvalError::NegativeArraySize { loc: loc.clone() });
        }

        let block = self.heap.alloc(n as usize * elem.slot_size());
        Ok(Value::block(
            Type {
                spec: elem.spec,
                array: true,
            },
            Some(block),
        ))
    }

    /// Postfix `++`/`--`: yields the original value, writes back the
    /// stepped one.
    fn eval_post(
        &mut self,
        s: ScopeId,
        lhs_expr: &Expr,
        loc: &SrcLoc,
        step: f32,
    ) -> Result<Value, EvalError> {
        let lhs = self.eval_expr(s, lhs_expr)?;
        let Some(origin) = lhs.origin else {
            return Err(EvalError::NotLvalue { loc: loc.clone() });
        };

        let updated = match lhs.data {
            Data::I32(v) if lhs.ty == Type::I32 => Value::from_i32(v.wrapping_add(step as i32)),
            Data::F32(v) if lhs.ty == Type::F32 => Value::from_f32(v + step),
            _ => {
                let op = if step > 0.0 { "++" } else { "--" };
                return Err(EvalError::NoOperator {
                    loc: loc.clone(),
                    op,
                    operands: format!("'{}'", self.type_name(&lhs.ty)),
                });
            }
        };

        self.heap.store(origin.base, origin.offset, lhs.ty, &updated);
        Ok(lhs.rvalue())
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn eval_call(
        &mut self,
        s: ScopeId,
        base_expr: &Expr,
        args: &[Expr],
        loc: &SrcLoc,
    ) -> Result<Value, EvalError> {
        let base = self.eval_expr(s, base_expr)?;
        if base.ty != Type::FN {
            return Err(EvalError::CallNonFunction { loc: loc.clone() });
        }
        let Data::Fn(fid) = base.data else {
            return Err(EvalError::CallNonFunction { loc: loc.clone() });
        };

        let fndef = self.fns[fid].clone();
        if fndef.body.is_none() && fndef.native.is_none() {
            return Err(EvalError::CallBodyless { loc: loc.clone() });
        }

        // The frame's search parent is the callee's lexical parent, so the
        // caller's locals are invisible to the body. A function that escaped
        // a dead nested scope falls back to global lookup.
        let parent = if fndef.parent < self.scopes.len() {
            fndef.parent
        } else {
            0
        };
        let frame = self.push_scope(Some(parent), fndef.ret, self.scopes[s].size);
        let result = self.call_frame(s, frame, &fndef, &base, args, loc);
        self.scopes.truncate(frame);
        result
    }

    fn call_frame(
        &mut self,
        s: ScopeId,
        frame: ScopeId,
        fndef: &FnDef,
        base: &Value,
        args: &[Expr],
        loc: &SrcLoc,
    ) -> Result<Value, EvalError> {
        let receiver = base.origin.map(|o| o.base);

        // Methods get an implicit `this` holding the receiver block.
        if let Some(cid) = fndef.class {
            let this_ty = Type::class(cid);
            if let Some(var) = self.scopes[frame].add_var(Rc::from("this"), this_ty) {
                self.check_stack(frame, loc)?;
                self.heap
                    .store(self.stack, var.off, this_ty, &Value::block(this_ty, receiver));
            }
        }

        for (i, param) in fndef.params.iter().enumerate() {
            if i >= args.len() {
                return Err(EvalError::TooFewArguments {
                    loc: loc.clone(),
                    name: fndef.name.to_string(),
                });
            }
            let pty = self.eval_type(frame, &param.ty)?;

            // Argument sub-expressions run in the caller's scope, offset past
            // the callee's frame so nested calls see free stack.
            let callee_size = self.scopes[frame].size;
            self.scopes[s].size += callee_size;
            let arg_result = self.eval_expr(s, &args[i]);
            self.scopes[s].size -= callee_size;
            let mut arg = arg_result?;

            if !arg.cast_to(&pty) {
                return Err(EvalError::ArgTypeMismatch {
                    loc: param.loc.clone(),
                    expected: self.type_name(&pty),
                    found: self.type_name(&arg.ty),
                });
            }

            let Some(var) = self.scopes[frame].add_var(param.name.clone(), pty) else {
                return Err(EvalError::RedefinitionParam {
                    loc: param.loc.clone(),
                    name: param.name.to_string(),
                });
            };
            self.check_stack(frame, &param.loc)?;
            self.heap.store(self.stack, var.off, pty, &arg);
        }

        if args.len() > fndef.params.len() {
            return Err(EvalError::TooManyArguments {
                loc: loc.clone(),
                name: fndef.name.to_string(),
            });
        }

        if let Some(body) = &fndef.body {
            self.exec_body(frame, body)?;
        } else if let Some(native) = fndef.native {
            let value = {
                let mut ctx = NativeCtx::new(self, frame);
                native(&mut ctx)?
            };
            self.scopes[frame].ret_value = value;
        }

        // Constructors yield the instance rather than the body's return.
        if fndef.is_ctor {
            if let Some(cid) = fndef.class {
                return Ok(Value::block(Type::class(cid), receiver));
            }
        }
        Ok(self.scopes[frame].ret_value.clone())
    }
}
