// ABOUTME: Scopes, variable records, function records and class definitions

use crate::ast::{Param, Stmt};
use crate::interp::NativeFn;
use crate::value::{ClassId, FnId, Type, Value};
use indexmap::IndexMap;
use std::rc::Rc;

/// Index of a scope in the interpreter's scope stack. The stack order is the
/// transient global → child chain: index 0 is the global scope, and every
/// active call frame or block scope sits above its parent.
pub type ScopeId = usize;

/// A variable: its type and byte offset. Locals and parameters offset into
/// the stack block; class fields offset into an instance block.
#[derive(Debug, Clone, Copy)]
pub struct Var {
    pub ty: Type,
    pub off: usize,
}

/// A function record. Parameters stay in syntax form because their types are
/// resolved per call; `body` is None for natives and unfilled forward
/// declarations.
#[derive(Debug, Clone)]
pub struct FnDef {
    pub name: Rc<str>,
    pub params: Rc<[Param]>,
    pub body: Option<Rc<[Stmt]>>,
    pub ret: Type,
    pub native: Option<NativeFn>,
    /// Lexical parent scope, used as the search parent of call frames.
    pub parent: ScopeId,
    /// The class this function is a method of, if any.
    pub class: Option<ClassId>,
    pub is_ctor: bool,
}

/// A class definition: field and method tables plus the instance byte size.
/// Field order is insertion order, which the collector relies on when it
/// walks instances.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: Rc<str>,
    pub fields: IndexMap<Rc<str>, Var>,
    pub methods: IndexMap<Rc<str>, FnId>,
    pub size: usize,
}

impl ClassDef {
    pub fn new(name: Rc<str>) -> Self {
        ClassDef {
            name,
            fields: IndexMap::new(),
            methods: IndexMap::new(),
            size: 0,
        }
    }

    /// Add a field at the next offset. Returns None when the name is taken.
    pub fn add_field(&mut self, name: Rc<str>, ty: Type) -> Option<Var> {
        if self.fields.contains_key(name.as_ref()) {
            return None;
        }
        let var = Var { ty, off: self.size };
        self.size += ty.slot_size();
        self.fields.insert(name, var);
        Some(var)
    }
}

/// One naming environment: insertion-ordered variable, function and class
/// tables, a lookup parent, the return slot, and the loop/return flags.
#[derive(Debug)]
pub struct Scope {
    pub vars: IndexMap<Rc<str>, Var>,
    pub fns: IndexMap<Rc<str>, FnId>,
    pub classes: IndexMap<Rc<str>, ClassId>,
    pub search_parent: Option<ScopeId>,
    pub ret_type: Type,
    pub ret_value: Value,
    pub ret_flag: bool,
    /// True while a loop is active and no `continue` has fired this
    /// iteration. Cleared by `continue`, re-armed by the loop.
    pub cont_flag: bool,
    /// True while a loop is active and no `break` has fired.
    pub break_flag: bool,
    /// Running byte offset for variables declared in this scope. Call frames
    /// and blocks start from their parent's size so locals stack upward.
    pub size: usize,
}

impl Scope {
    pub fn new(search_parent: Option<ScopeId>, ret_type: Type, size: usize) -> Self {
        Scope {
            vars: IndexMap::new(),
            fns: IndexMap::new(),
            classes: IndexMap::new(),
            search_parent,
            ret_type,
            ret_value: Value::none(),
            ret_flag: false,
            cont_flag: false,
            break_flag: false,
            size,
        }
    }

    pub fn global() -> Self {
        Scope::new(None, Type::NONE, 0)
    }

    /// Declare a variable at the current offset, advancing the size counter.
    /// Returns None when the name already exists in this scope — conflicts
    /// are per-region; nested blocks get fresh scopes and may shadow.
    pub fn add_var(&mut self, name: Rc<str>, ty: Type) -> Option<Var> {
        if self.vars.contains_key(name.as_ref()) {
            return None;
        }
        let var = Var { ty, off: self.size };
        self.size += ty.slot_size();
        self.vars.insert(name, var);
        Some(var)
    }
}

/// Walk the search-parent chain looking for a variable; first hit wins.
pub fn find_var(scopes: &[Scope], from: ScopeId, name: &str) -> Option<Var> {
    let mut current = Some(from);
    while let Some(id) = current {
        if let Some(var) = scopes[id].vars.get(name) {
            return Some(*var);
        }
        current = scopes[id].search_parent;
    }
    None
}

/// Walk the search-parent chain looking for a function.
pub fn find_fn(scopes: &[Scope], from: ScopeId, name: &str) -> Option<FnId> {
    let mut current = Some(from);
    while let Some(id) = current {
        if let Some(fid) = scopes[id].fns.get(name) {
            return Some(*fid);
        }
        current = scopes[id].search_parent;
    }
    None
}

/// Walk the search-parent chain looking for a class.
pub fn find_class(scopes: &[Scope], from: ScopeId, name: &str) -> Option<ClassId> {
    let mut current = Some(from);
    while let Some(id) = current {
        if let Some(cid) = scopes[id].classes.get(name) {
            return Some(*cid);
        }
        current = scopes[id].search_parent;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SLOT_SIZE;

    #[test]
    fn test_add_var_advances_offsets() {
        let mut scope = Scope::global();
        let a = scope.add_var(Rc::from("a"), Type::I32).unwrap();
        let b = scope.add_var(Rc::from("b"), Type::F32).unwrap();
        assert_eq!(a.off, 0);
        assert_eq!(b.off, SLOT_SIZE);
        assert_eq!(scope.size, 2 * SLOT_SIZE);
    }

    #[test]
    fn test_redeclaration_in_same_scope_fails() {
        let mut scope = Scope::global();
        assert!(scope.add_var(Rc::from("x"), Type::I32).is_some());
        assert!(scope.add_var(Rc::from("x"), Type::I32).is_none());
    }

    #[test]
    fn test_lookup_walks_parent_chain() {
        let mut global = Scope::global();
        global.add_var(Rc::from("g"), Type::I32);
        let mut child = Scope::new(Some(0), Type::NONE, global.size);
        child.add_var(Rc::from("l"), Type::F32);
        let scopes = vec![global, child];

        assert!(find_var(&scopes, 1, "l").is_some());
        assert!(find_var(&scopes, 1, "g").is_some());
        assert!(find_var(&scopes, 0, "l").is_none());
        assert!(find_var(&scopes, 1, "missing").is_none());
    }

    #[test]
    fn test_shadowing_across_scopes() {
        let mut global = Scope::global();
        global.add_var(Rc::from("x"), Type::I32);
        let mut child = Scope::new(Some(0), Type::NONE, global.size);
        // A nested scope may reintroduce a name; lookup finds the inner one.
        let inner = child.add_var(Rc::from("x"), Type::F32).unwrap();
        let scopes = vec![global, child];

        let found = find_var(&scopes, 1, "x").unwrap();
        assert_eq!(found.off, inner.off);
        assert_eq!(found.ty, Type::F32);
    }

    #[test]
    fn test_class_field_layout() {
        let mut class = ClassDef::new(Rc::from("Point"));
        let x = class.add_field(Rc::from("x"), Type::I32).unwrap();
        let y = class.add_field(Rc::from("y"), Type::I32).unwrap();
        assert_eq!(x.off, 0);
        assert_eq!(y.off, SLOT_SIZE);
        assert_eq!(class.size, 2 * SLOT_SIZE);
        assert!(class.add_field(Rc::from("x"), Type::F32).is_none());
    }
}
