//! Error types for expansion, analysis and evaluation

use thiserror::Error;

use crate::reader::{ParseError, SourceLocation};
use crate::symbol::Symbol;
use crate::value::Value;

/// Main error type for entmoot operations.
///
/// Every error aborts the top-level form being compiled. Contexts are only
/// ever replaced by a successful `define`, so a failed form leaves the
/// caller's context untouched.
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    /// A special form was used with the wrong shape or arity
    #[error("Expansion error: {message}{}", describe_site(.form, .location))]
    Expansion {
        /// What went wrong
        message: String,
        /// The offending form, if known
        form: Option<Value>,
        /// Where the offending form was read from
        location: Option<SourceLocation>,
    },

    /// A construct required a symbol or vector and got something else
    #[error("Analysis error: {message}{}", describe_site(.form, .location))]
    Analysis {
        /// What went wrong
        message: String,
        /// The offending form, if known
        form: Option<Value>,
        /// Where the offending form was read from
        location: Option<SourceLocation>,
    },

    /// A symbol was forced but no slot exists for it in the live context
    #[error("Unresolved symbol: {symbol}")]
    UnresolvedSymbol {
        /// The (qualified) symbol that could not be resolved
        symbol: Symbol,
    },

    /// A slot was forced again while it was still being computed
    #[error("Cyclic dependency while computing {symbol}")]
    CyclicDependency {
        /// The slot whose computation re-entered itself
        symbol: Symbol,
    },

    /// Failure inside a builtin function or the interop layer
    #[error("Invocation error: {message}")]
    Invocation {
        /// Description of the failure
        message: String,
        /// The underlying error, when the failure wraps another one
        source: Option<Box<EvalError>>,
    },

    /// Closure calls nested deeper than the configured bound
    #[error("Stack overflow: call depth {depth} exceeds maximum {max}")]
    StackOverflow {
        /// Depth reached
        depth: usize,
        /// Configured maximum
        max: usize,
    },

    /// A function or expander was called with an unsupported argument count
    #[error("Arity error: {name} expects {expected} argument(s), got {got}")]
    Arity {
        /// Name of the callable
        name: String,
        /// Human-readable description of the accepted arity
        expected: String,
        /// Number of arguments actually supplied
        got: usize,
    },

    /// A value of the wrong runtime type was supplied
    #[error("Type error: expected {expected}, got {got}")]
    Type {
        /// Expected type
        expected: String,
        /// Actual type received
        got: String,
    },

    /// The reader could not turn source text into forms
    #[error(transparent)]
    Parse(#[from] ParseError),
}

fn describe_site(form: &Option<Value>, location: &Option<SourceLocation>) -> String {
    let mut out = String::new();
    if let Some(form) = form {
        out.push_str(&format!(" in {:?}", form));
    }
    if let Some(loc) = location {
        out.push_str(&format!(" at {}", loc));
    }
    out
}

impl EvalError {
    /// Build an expansion error, pulling the source location off the form.
    pub fn expansion(message: impl Into<String>, form: &Value) -> Self {
        EvalError::Expansion {
            message: message.into(),
            location: form.source_location(),
            form: Some(form.clone()),
        }
    }

    /// Build an analysis error, pulling the source location off the form.
    pub fn analysis(message: impl Into<String>, form: &Value) -> Self {
        EvalError::Analysis {
            message: message.into(),
            location: form.source_location(),
            form: Some(form.clone()),
        }
    }

    /// Build an invocation error with no underlying cause.
    pub fn invocation(message: impl Into<String>) -> Self {
        EvalError::Invocation {
            message: message.into(),
            source: None,
        }
    }

    /// Build a type error for a value that should have been `expected`.
    pub fn type_error(expected: impl Into<String>, got: &Value) -> Self {
        EvalError::Type {
            expected: expected.into(),
            got: type_name(got).to_string(),
        }
    }

    /// The symbol named by an unresolved-symbol error.
    pub fn unresolved_symbol(&self) -> Option<&Symbol> {
        match self {
            EvalError::UnresolvedSymbol { symbol } => Some(symbol),
            EvalError::Invocation {
                source: Some(inner),
                ..
            } => inner.unresolved_symbol(),
            _ => None,
        }
    }
}

/// Result type alias for entmoot operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Get the user-facing type name of a value.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Bool(_) => "boolean",
        Value::Int(_) => "long",
        Value::Float(_) => "double",
        Value::Char(_) => "char",
        Value::String(_) => "string",
        Value::Symbol(_) => "symbol",
        Value::Keyword(_) => "keyword",
        Value::List(_) => "list",
        Value::Vector(_) => "vector",
        Value::Map(_) => "map",
        Value::Set(_) => "set",
        Value::Function(_) => "function",
        Value::Expander(_) => "expander",
        Value::Node(_) => "node",
        Value::Type(_) => "type",
    }
}
