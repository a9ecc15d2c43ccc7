//! # Entmoot
//!
//! A Lisp compiler core with user-extensible syntax and incremental,
//! dependency-aware redefinition.
//!
//! Source text is read into forms, forms are expanded into a small closed
//! set of AST nodes, and nodes are evaluated against a persistent
//! [`Context`]. Every definition lives in a lazily computed [`Slot`] that
//! records what it depends on, so redefining a symbol invalidates exactly
//! the definitions that (transitively) used it.
//!
//! ## Architecture
//!
//! - **Reader**: source text to forms ([`Reader`])
//! - **Expanders**: forms to nodes; special forms, user expanders and
//!   macros all share one protocol ([`Expander`])
//! - **Nodes**: evaluate, specialize against known bindings, optimize
//!   ([`Node`])
//! - **Context**: persistent symbol table with dependency tracking
//!   ([`Context`], [`Slot`])
//! - **Compiler**: the read/expand/eval loop ([`Compiler`])
//!
//! ```
//! let context = entmoot::initial_context().unwrap();
//! let result = entmoot::eval(&context, "(defn sq [x] (* x x)) (sq 7)").unwrap();
//! assert_eq!(result.value, entmoot::Value::Int(49));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analyser;
pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod expander;
pub mod interop;
pub mod node;
pub mod reader;
pub mod symbol;
pub mod value;

// Re-export main types
pub use compiler::{eval, Compiler};
pub use config::CompilerConfig;
pub use context::{bootstrap, bootstrap_with_host, initial_context, primitives, Context, Slot};
pub use error::{type_name, EvalError, Result};
pub use expander::{Expander, MacroExpander, SpecialForm, UserExpander};
pub use interop::{HostInterop, HostType, Interop, TypeRef};
pub use node::{apply, Bindings, Dependencies, EvalResult, Node, NodeKind};
pub use reader::{read_str, ParseError, Reader, SourceLocation};
pub use symbol::{Keyword, Symbol, CORE_NS};
pub use value::{BuiltinFn, BuiltinFnPtr, Closure, Function, List, Value};

/// Entmoot version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
