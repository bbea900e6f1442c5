// ABOUTME: The interpreter core: host embedding API, scope stack and GC safe points

use crate::ast::Stmt;
use crate::config::STACK_SIZE;
use crate::error::{CirnoError, EvalError};
use crate::heap::{self, BlockId, Heap, HeapStats};
use crate::lexer::{lex_source, Lexer};
use crate::parser::parse;
use crate::scope::{self, ClassDef, FnDef, Scope, ScopeId};
use crate::value::{self, Data, Type, Value};
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

/// Signature of a host-registered native function. The context exposes the
/// argument frame (parameters by name) and the heap; the returned value
/// fills the call's return slot.
pub type NativeFn = fn(&mut NativeCtx) -> Result<Value, EvalError>;

enum OutSink {
    Stdout,
    Buffer(Vec<u8>),
}

/// The interpreter: global scope, active call chain, class and function
/// arenas, and the garbage-collected heap. One instance is one independent
/// runtime; everything is single-threaded and non-reentrant.
pub struct Interp {
    /// Scope stack. Index 0 is the global scope; the stack order is the
    /// transient global → child chain the collector walks during calls.
    pub(crate) scopes: Vec<Scope>,
    pub(crate) classes: Vec<ClassDef>,
    pub(crate) fns: Vec<FnDef>,
    pub(crate) heap: Heap,
    /// Block 0 of every runtime: the stack backing locals and parameters.
    pub(crate) stack: BlockId,
    /// Depth of in-flight expression evaluation. Collection only runs at
    /// zero so values held in evaluator temporaries are never swept.
    pub(crate) eval_depth: u32,
    out: OutSink,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    /// Create a runtime with a fresh global scope and stack block.
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let stack = heap.alloc(STACK_SIZE);
        Interp {
            scopes: vec![Scope::global()],
            classes: Vec::new(),
            fns: Vec::new(),
            heap,
            stack,
            eval_depth: 0,
            out: OutSink::Stdout,
        }
    }

    // ===== Output =====

    /// Redirect `print` output into an internal buffer, retrievable with
    /// [`take_output`](Self::take_output).
    pub fn capture_output(&mut self) {
        self.out = OutSink::Buffer(Vec::new());
    }

    pub fn take_output(&mut self) -> String {
        match &mut self.out {
            OutSink::Buffer(buffer) => String::from_utf8_lossy(&std::mem::take(buffer)).into_owned(),
            OutSink::Stdout => String::new(),
        }
    }

    pub(crate) fn emit(&mut self, text: &str) {
        match &mut self.out {
            OutSink::Stdout => {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
            OutSink::Buffer(buffer) => buffer.extend_from_slice(text.as_bytes()),
        }
    }

    // ===== Pipeline =====

    /// Lex, parse and run a source file. Parsing failures suppress
    /// evaluation and are returned together.
    pub fn load(&mut self, path: &Path) -> Result<(), CirnoError> {
        let toks = Lexer::new().lex_file(path)?;
        let prog = parse(&toks).map_err(CirnoError::Parse)?;
        self.run(&prog)?;
        Ok(())
    }

    /// Lex, parse and run an in-memory source string.
    pub fn run_source(&mut self, src: &str, name: &str) -> Result<(), CirnoError> {
        let toks = lex_source(src, name)?;
        let prog = parse(&toks).map_err(CirnoError::Parse)?;
        self.run(&prog)?;
        Ok(())
    }

    /// Evaluate a parsed program at global scope. Statement boundaries at
    /// the top level are collection safe points.
    pub fn run(&mut self, prog: &[Stmt]) -> Result<(), EvalError> {
        for stmt in prog {
            if self.scopes[0].ret_flag {
                break;
            }
            self.exec_stmt(0, stmt)?;
            self.collect();
        }
        Ok(())
    }

    /// Tear down the global scope and collect everything. The runtime can
    /// load fresh programs afterwards.
    pub fn stop(&mut self) {
        self.scopes.truncate(1);
        let global = &mut self.scopes[0];
        global.vars.clear();
        global.fns.clear();
        global.classes.clear();
        global.size = 0;
        global.ret_flag = false;
        global.ret_value = Value::none();
        self.classes.clear();
        self.fns.clear();
        self.collect();
    }

    // ===== Host embedding =====

    /// Register a native function in the global scope. Natives carry no
    /// signature of their own; scripts supply one with a bodyless forward
    /// declaration (the shipped prelude does this for the stdlib shims).
    pub fn bind(&mut self, name: &str, native: NativeFn) {
        let fid = self.fns.len();
        self.fns.push(FnDef {
            name: Rc::from(name),
            params: Rc::from(Vec::new()),
            body: None,
            ret: Type::NONE,
            native: Some(native),
            parent: 0,
            class: None,
            is_ctor: false,
        });
        self.scopes[0].fns.insert(Rc::from(name), fid);
    }

    /// Invoke a script-defined function from the host. Arguments must match
    /// the parameter types exactly; the callee's return value is handed
    /// back.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let fid = scope::find_fn(&self.scopes, 0, name).ok_or_else(|| EvalError::CallUnknown {
            name: name.to_string(),
        })?;
        let fndef = self.fns[fid].clone();
        // Stack the frame above whatever is currently active, so nested
        // calls from native callbacks do not overlap live locals.
        let top_size = self.scopes[self.scopes.len() - 1].size;
        let parent = if fndef.parent < self.scopes.len() {
            fndef.parent
        } else {
            0
        };
        let frame = self.push_scope(Some(parent), fndef.ret, top_size);
        let result = self.host_call_in_frame(frame, &fndef, name, args);
        self.scopes.truncate(frame);
        result
    }

    fn host_call_in_frame(
        &mut self,
        frame: ScopeId,
        fndef: &FnDef,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        if args.len() != fndef.params.len() {
            return Err(EvalError::CallArity {
                name: name.to_string(),
            });
        }

        for (param, arg) in fndef.params.iter().zip(args) {
            let ty = self.eval_type(frame, &param.ty)?;
            if ty != arg.ty {
                return Err(EvalError::CallArgType {
                    name: name.to_string(),
                    expected: self.type_name(&ty),
                    found: self.type_name(&arg.ty),
                });
            }
            let var = self.scopes[frame]
                .add_var(param.name.clone(), ty)
                .ok_or_else(|| EvalError::RedefinitionParam {
                    loc: param.loc.clone(),
                    name: param.name.to_string(),
                })?;
            self.check_stack(frame, &param.loc)?;
            self.heap.store(self.stack, var.off, ty, arg);
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

        Ok(self.scopes[frame].ret_value.clone())
    }

    // ===== Internals shared with the evaluator =====

    pub(crate) fn push_scope(
        &mut self,
        search_parent: Option<ScopeId>,
        ret_type: Type,
        size: usize,
    ) -> ScopeId {
        self.scopes.push(Scope::new(search_parent, ret_type, size));
        self.scopes.len() - 1
    }

    pub(crate) fn check_stack(
        &self,
        s: ScopeId,
        loc: &crate::lexer::SrcLoc,
    ) -> Result<(), EvalError> {
        if self.scopes[s].size >= STACK_SIZE {
            Err(EvalError::OutOfMemory {
                loc: loc.clone(),
                used: self.scopes[s].size,
                cap: STACK_SIZE,
            })
        } else {
            Ok(())
        }
    }

    pub(crate) fn type_name(&self, ty: &Type) -> String {
        value::type_name(ty, &self.classes)
    }

    /// Render a value the way `print` and diagnostics show it.
    pub(crate) fn format_value(&self, v: &Value) -> String {
        if v.ty == Type::STR {
            return match v.handle() {
                Some(h) => String::from_utf8_lossy(self.heap.bytes(h)).into_owned(),
                None => "<null>".to_string(),
            };
        }
        match v.data {
            Data::I32(x) => x.to_string(),
            Data::F32(x) => format!("{:.6}", x),
            Data::Block(_) | Data::Fn(_) => self.type_name(&v.ty),
        }
    }

    // ===== Collection =====

    /// Mark-and-sweep over the live scope chain: every variable of every
    /// active scope, plus filled return slots. Class instances are walked
    /// field-by-field against their instance blocks.
    pub(crate) fn collect(&mut self) {
        self.heap.clear_marks();
        self.heap.mark(self.stack);

        for si in 0..self.scopes.len() {
            for vi in 0..self.scopes[si].vars.len() {
                let var = self.scopes[si].vars[vi];
                if var.ty.is_ref() {
                    let handle = self.heap.read_handle(self.stack, var.off);
                    heap::mark_value(&mut self.heap, &self.classes, &var.ty, handle);
                }
            }
            if self.scopes[si].ret_flag {
                let ret = self.scopes[si].ret_value.clone();
                heap::mark_root(&mut self.heap, &self.classes, &self.fns, &ret);
            }
        }

        self.heap.sweep();
    }

    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }
}

/// Argument access and allocation helpers handed to native callbacks.
pub struct NativeCtx<'a> {
    interp: &'a mut Interp,
    frame: ScopeId,
}

impl<'a> NativeCtx<'a> {
    pub(crate) fn new(interp: &'a mut Interp, frame: ScopeId) -> Self {
        NativeCtx { interp, frame }
    }

    /// Read a parameter out of the argument frame by name.
    pub fn arg(&self, name: &str) -> Result<Value, EvalError> {
        let var = self.interp.scopes[self.frame]
            .vars
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::NativeArg {
                name: name.to_string(),
            })?;
        Ok(self.interp.heap.load(self.interp.stack, var.off, var.ty))
    }

    pub fn arg_i32(&self, name: &str) -> Result<i32, EvalError> {
        match self.arg(name)?.data {
            Data::I32(v) => Ok(v),
            _ => Err(EvalError::NativeArg {
                name: name.to_string(),
            }),
        }
    }

    pub fn arg_f32(&self, name: &str) -> Result<f32, EvalError> {
        match self.arg(name)?.data {
            Data::F32(v) => Ok(v),
            _ => Err(EvalError::NativeArg {
                name: name.to_string(),
            }),
        }
    }

    pub fn arg_str(&self, name: &str) -> Result<String, EvalError> {
        let value = self.arg(name)?;
        match (value.ty == Type::STR, value.handle()) {
            (true, Some(h)) => Ok(String::from_utf8_lossy(self.interp.heap.bytes(h)).into_owned()),
            _ => Err(EvalError::NativeArg {
                name: name.to_string(),
            }),
        }
    }

    /// Heap-allocate a string and wrap it as a value.
    pub fn alloc_string(&mut self, s: &str) -> Value {
        let block = self.interp.heap.alloc_string(s);
        Value::block(Type::STR, Some(block))
    }

    /// Write through the interpreter's output sink (stdout, or the capture
    /// buffer under test).
    pub fn write(&mut self, text: &str) {
        self.interp.emit(text);
    }

    /// Call back into script code. Native callbacks run synchronously inside
    /// the evaluator, so this simply pushes another frame.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        self.interp.call(name, args)
    }
}
