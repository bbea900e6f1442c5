// ABOUTME: Runtime type and value representation for the evaluator

use crate::config::SLOT_SIZE;
use crate::heap::BlockId;
use crate::scope::ClassDef;
use std::fmt;

/// Index of a class definition in the interpreter's class arena.
pub type ClassId = usize;

/// Index of a function record in the interpreter's function arena.
pub type FnId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spec {
    None,
    I32,
    F32,
    Str,
    Class(ClassId),
    Fn,
}

/// A runtime type: primitive tag plus the single-dimension array flag.
/// Equality compares both, including the class identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Type {
    pub spec: Spec,
    pub array: bool,
}

impl Type {
    pub const NONE: Type = Type {
        spec: Spec::None,
        array: false,
    };
    pub const I32: Type = Type {
        spec: Spec::I32,
        array: false,
    };
    pub const F32: Type = Type {
        spec: Spec::F32,
        array: false,
    };
    pub const STR: Type = Type {
        spec: Spec::Str,
        array: false,
    };
    pub const FN: Type = Type {
        spec: Spec::Fn,
        array: false,
    };

    pub fn class(id: ClassId) -> Type {
        Type {
            spec: Spec::Class(id),
            array: false,
        }
    }

    pub fn array_of(spec: Spec) -> Type {
        Type { spec, array: true }
    }

    /// The element type of an array: the same spec with the array flag
    /// dropped.
    pub fn elem(&self) -> Type {
        Type {
            spec: self.spec,
            array: false,
        }
    }

    /// Whether values of this type are stored as heap block handles.
    pub fn is_ref(&self) -> bool {
        self.array || matches!(self.spec, Spec::Str | Spec::Class(_))
    }

    /// A non-array class instance type.
    pub fn is_instance(&self) -> bool {
        !self.array && matches!(self.spec, Spec::Class(_))
    }

    /// Bytes one variable, field or array element of this type occupies.
    pub fn slot_size(&self) -> usize {
        SLOT_SIZE
    }
}

/// Render a type as its canonical diagnostic string, e.g. `i32` or
/// `class Foo[]`. Class names come from the class arena.
pub fn type_name(ty: &Type, classes: &[ClassDef]) -> String {
    let base = match ty.spec {
        Spec::None => "none".to_string(),
        Spec::I32 => "i32".to_string(),
        Spec::F32 => "f32".to_string(),
        Spec::Str => "string".to_string(),
        Spec::Fn => "fn".to_string(),
        Spec::Class(id) => match classes.get(id) {
            Some(class) => format!("class {}", class.name),
            None => "class ?".to_string(),
        },
    };
    if ty.array {
        format!("{}[]", base)
    } else {
        base
    }
}

/// The payload of an expression result. Reference payloads hold an optional
/// heap block handle (None = null); function payloads hold a function record
/// handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Data {
    I32(i32),
    F32(f32),
    Block(Option<BlockId>),
    Fn(FnId),
}

/// Where a value was loaded from: a heap block (the stack block included)
/// and a byte offset within it. Present exactly for lvalues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub base: BlockId,
    pub offset: usize,
}

/// An expression result: its type, payload and optional origin. For method
/// values the origin base is the receiver's instance block, used by the call
/// machinery to synthesize `this`.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub ty: Type,
    pub data: Data,
    pub origin: Option<Origin>,
}

impl Value {
    pub fn none() -> Value {
        Value {
            ty: Type::NONE,
            data: Data::I32(0),
            origin: None,
        }
    }

    pub fn from_i32(v: i32) -> Value {
        Value {
            ty: Type::I32,
            data: Data::I32(v),
            origin: None,
        }
    }

    pub fn from_f32(v: f32) -> Value {
        Value {
            ty: Type::F32,
            data: Data::F32(v),
            origin: None,
        }
    }

    pub fn block(ty: Type, block: Option<BlockId>) -> Value {
        Value {
            ty,
            data: Data::Block(block),
            origin: None,
        }
    }

    /// The zero value of a type, used for declarations without an
    /// initializer.
    pub fn zero(ty: Type) -> Value {
        let data = match ty {
            _ if ty.is_ref() => Data::Block(None),
            Type { spec: Spec::F32, .. } => Data::F32(0.0),
            _ => Data::I32(0),
        };
        Value {
            ty,
            data,
            origin: None,
        }
    }

    pub fn is_lvalue(&self) -> bool {
        self.origin.is_some()
    }

    /// A copy of this value with its origin stripped.
    pub fn rvalue(&self) -> Value {
        Value {
            ty: self.ty,
            data: self.data,
            origin: None,
        }
    }

    /// The block handle of a reference-typed value.
    pub fn handle(&self) -> Option<BlockId> {
        match self.data {
            Data::Block(h) => h,
            _ => None,
        }
    }

    /// Convert in place to the target type. Identical types always succeed;
    /// i32 and f32 convert into each other (float-to-int truncates, as the
    /// source language does). Anything else fails.
    pub fn cast_to(&mut self, target: &Type) -> bool {
        if self.ty == *target {
            return true;
        }
        if self.ty.array || target.array {
            return false;
        }
        match (self.ty.spec, target.spec, self.data) {
            (Spec::I32, Spec::F32, Data::I32(v)) => {
                self.data = Data::F32(v as f32);
                self.ty = Type::F32;
                true
            }
            (Spec::F32, Spec::I32, Data::F32(v)) => {
                self.data = Data::I32(v as i32);
                self.ty = Type::I32;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    /// Formats numeric payloads the way `print` does; reference payloads
    /// need heap access and are rendered by the interpreter instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data {
            Data::I32(v) => write!(f, "{}", v),
            Data::F32(v) => write!(f, "{:.6}", v),
            Data::Block(Some(_)) => write!(f, "<ref>"),
            Data::Block(None) => write!(f, "<null>"),
            Data::Fn(_) => write!(f, "fn"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_equality() {
        assert_eq!(Type::I32, Type::I32);
        assert_ne!(Type::I32, Type::F32);
        assert_ne!(Type::I32, Type::array_of(Spec::I32));
        assert_ne!(Type::class(0), Type::class(1));
        assert_eq!(Type::class(2), Type::class(2));
    }

    #[test]
    fn test_elem_drops_array_flag() {
        let arr = Type::array_of(Spec::F32);
        assert_eq!(arr.elem(), Type::F32);
    }

    #[test]
    fn test_ref_types() {
        assert!(Type::STR.is_ref());
        assert!(Type::class(0).is_ref());
        assert!(Type::array_of(Spec::I32).is_ref());
        assert!(!Type::I32.is_ref());
        assert!(!Type::FN.is_ref());
    }

    #[test]
    fn test_numeric_casts() {
        let mut v = Value::from_i32(3);
        assert!(v.cast_to(&Type::F32));
        assert_eq!(v.data, Data::F32(3.0));

        let mut v = Value::from_f32(2.9);
        assert!(v.cast_to(&Type::I32));
        assert_eq!(v.data, Data::I32(2));
    }

    #[test]
    fn test_reference_casts_require_exact_type() {
        let mut v = Value::block(Type::STR, None);
        assert!(v.cast_to(&Type::STR));
        assert!(!v.cast_to(&Type::I32));
        assert!(!v.cast_to(&Type::array_of(Spec::Str)));
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(Value::zero(Type::I32).data, Data::I32(0));
        assert_eq!(Value::zero(Type::F32).data, Data::F32(0.0));
        assert_eq!(Value::zero(Type::STR).data, Data::Block(None));
        assert_eq!(
            Value::zero(Type::array_of(Spec::I32)).data,
            Data::Block(None)
        );
    }

    #[test]
    fn test_float_display_matches_print_format() {
        assert_eq!(Value::from_f32(5.0).to_string(), "5.000000");
        assert_eq!(Value::from_i32(42).to_string(), "42");
    }
}
