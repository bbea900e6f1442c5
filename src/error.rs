// ABOUTME: Error types for lexing, parsing and evaluation failures

use crate::lexer::SrcLoc;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the lexer and parser. Each carries the location of the
/// offending lexeme and renders in the `path:line:error: message` shape.
#[derive(Error, Debug, Clone)]
pub enum SyntaxError {
    #[error("{loc}:error: expected '{expected}' before '{found}'")]
    ExpectedToken {
        loc: SrcLoc,
        expected: String,
        found: String,
    },

    #[error("{loc}:error: expected '{rule}' before '{found}'")]
    ExpectedRule {
        loc: SrcLoc,
        rule: &'static str,
        found: String,
    },

    #[error("{loc}:error: unterminated string literal")]
    UnterminatedString { loc: SrcLoc },

    #[error("{loc}:error: expected '\"path\"' after '#include'")]
    BadInclude { loc: SrcLoc },
}

/// Errors reported by the evaluator. Diagnostics carry the source location
/// they were raised against; the handful of host-API errors (raised from
/// `call` and native callbacks, where no lexeme exists) do not.
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    // ===== Name resolution =====
    #[error("{loc}:error: '{name}' undeclared")]
    Undeclared { loc: SrcLoc, name: String },

    #[error("{loc}:error: use of undefined class '{name}'")]
    UndefinedClass { loc: SrcLoc, name: String },

    #[error("{loc}:error: 'class {class}' has no member named '{name}'")]
    UnknownMember {
        loc: SrcLoc,
        class: String,
        name: String,
    },

    #[error("{loc}:error: request for unknown member '{name}' in array")]
    UnknownArrayMember { loc: SrcLoc, name: String },

    #[error("{loc}:error: request for member '{name}' in non-class")]
    MemberOfNonClass { loc: SrcLoc, name: String },

    #[error("{loc}:error: request for member '{name}' in uninitialised class")]
    UninitialisedClass { loc: SrcLoc, name: String },

    // ===== Redefinition =====
    #[error("{loc}:error: redefinition of '{name}'")]
    Redefinition { loc: SrcLoc, name: String },

    #[error("{loc}:error: redefinition of function '{name}'")]
    RedefinitionFn { loc: SrcLoc, name: String },

    #[error("{loc}:error: redefinition of class '{name}'")]
    RedefinitionClass { loc: SrcLoc, name: String },

    #[error("{loc}:error: redefinition of param '{name}'")]
    RedefinitionParam { loc: SrcLoc, name: String },

    #[error("{loc}:error: bodyless function '{name}' is unbound")]
    UnboundForwardDecl { loc: SrcLoc, name: String },

    #[error("{loc}:error: cannot initialize '{name}'")]
    FieldInitializer { loc: SrcLoc, name: String },

    // ===== Type errors =====
    #[error("{loc}:error: incompatible types when initializing '{expected}' with '{found}'")]
    InitTypeMismatch {
        loc: SrcLoc,
        expected: String,
        found: String,
    },

    #[error(
        "{loc}:error: incompatible types when returning type '{found}' but '{expected}' was expected"
    )]
    ReturnTypeMismatch {
        loc: SrcLoc,
        expected: String,
        found: String,
    },

    #[error("{loc}:error: expected '{expected}' but argument is of type '{found}'")]
    ArgTypeMismatch {
        loc: SrcLoc,
        expected: String,
        found: String,
    },

    #[error("{loc}:error: incompatible types when initializing array type '{expected}' with '{found}'")]
    ArrayInitTypeMismatch {
        loc: SrcLoc,
        expected: String,
        found: String,
    },

    #[error("{loc}:error: unknown operand type for '{op}': {operands}")]
    NoOperator {
        loc: SrcLoc,
        op: &'static str,
        operands: String,
    },

    #[error("{loc}:error: condition is of type '{found}', not 'i32'")]
    NonIntegerCondition { loc: SrcLoc, found: String },

    // ===== Lvalues, arrays, members =====
    #[error("{loc}:error: lvalue required as left operand of assignment")]
    NotLvalue { loc: SrcLoc },

    #[error("{loc}:error: subscripted value is not an array")]
    NotArray { loc: SrcLoc },

    #[error("{loc}:error: array subscript is of type '{found}', not 'i32'")]
    NonIntegerIndex { loc: SrcLoc, found: String },

    #[error("{loc}:error: cannot index into uninitialised array")]
    UninitialisedArray { loc: SrcLoc },

    #[error("{loc}:error: use of uninitialised string")]
    UninitialisedString { loc: SrcLoc },

    #[error("{loc}:error: index out of bounds")]
    IndexOutOfBounds { loc: SrcLoc },

    #[error("{loc}:error: size of array has non-integer type")]
    NonIntegerArraySize { loc: SrcLoc },

    #[error("{loc}:error: array size is negative")]
    NegativeArraySize { loc: SrcLoc },

    // ===== Calls =====
    #[error("{loc}:error: attempt to call non-function")]
    CallNonFunction { loc: SrcLoc },

    #[error("{loc}:error: attempt to call function without body")]
    CallBodyless { loc: SrcLoc },

    #[error("{loc}:error: too few arguments to function '{name}'")]
    TooFewArguments { loc: SrcLoc, name: String },

    #[error("{loc}:error: too many arguments to function '{name}'")]
    TooManyArguments { loc: SrcLoc, name: String },

    // ===== Control flow =====
    #[error("{loc}:error: cannot break outside loop")]
    BreakOutsideLoop { loc: SrcLoc },

    #[error("{loc}:error: cannot continue outside loop")]
    ContinueOutsideLoop { loc: SrcLoc },

    // ===== Runtime =====
    #[error("{loc}:error: division by zero")]
    DivisionByZero { loc: SrcLoc },

    #[error("{loc}:error: ran out of stack memory ({used}/{cap} bytes)")]
    OutOfMemory { loc: SrcLoc, used: usize, cap: usize },

    // ===== Host API (no lexeme to cite) =====
    #[error("call: function '{name}' undeclared")]
    CallUnknown { name: String },

    #[error("call: {name}(): wrong number of arguments")]
    CallArity { name: String },

    #[error("call: {name}(): expected '{expected}' but argument is of type '{found}'")]
    CallArgType {
        name: String,
        expected: String,
        found: String,
    },

    #[error("native callback read of unknown argument '{name}'")]
    NativeArg { name: String },
}

/// Top-level error for the embedding pipeline: I/O failures, collected
/// syntax errors, or an evaluation failure.
#[derive(Error, Debug)]
pub enum CirnoError {
    #[error("could not open '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", format_syntax_errors(.0))]
    Parse(Vec<SyntaxError>),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

fn format_syntax_errors(errors: &[SyntaxError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn loc() -> SrcLoc {
        SrcLoc::new(Rc::from("test.crn"), 7)
    }

    #[test]
    fn test_diagnostic_format() {
        let err = EvalError::Undeclared {
            loc: loc(),
            name: "x".to_string(),
        };
        assert_eq!(err.to_string(), "test.crn:7:error: 'x' undeclared");
    }

    #[test]
    fn test_syntax_error_format() {
        let err = SyntaxError::ExpectedToken {
            loc: loc(),
            expected: ";".to_string(),
            found: "EOF".to_string(),
        };
        assert_eq!(err.to_string(), "test.crn:7:error: expected ';' before 'EOF'");
    }

    #[test]
    fn test_parse_error_aggregation() {
        let err = CirnoError::Parse(vec![
            SyntaxError::UnterminatedString { loc: loc() },
            SyntaxError::ExpectedRule {
                loc: loc(),
                rule: "expression",
                found: ")".to_string(),
            },
        ]);
        let text = err.to_string();
        assert!(text.contains("unterminated string literal"));
        assert!(text.contains("expected 'expression' before ')'"));
    }
}
