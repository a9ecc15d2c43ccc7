//! Callable value types: builtins and closures

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use super::Value;
use crate::config::DEFAULT_MAX_CALL_DEPTH;
use crate::context::Context;
use crate::error::{EvalError, Result};
use crate::node::{Bindings, Node};
use crate::symbol::Symbol;

thread_local! {
    // Closure calls active on this thread, and the bound on them.
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
    static MAX_CALL_DEPTH: Cell<usize> = const { Cell::new(DEFAULT_MAX_CALL_DEPTH) };
}

struct CallGuard;

impl CallGuard {
    fn enter() -> Result<Self> {
        let depth = CALL_DEPTH.with(Cell::get);
        let max = MAX_CALL_DEPTH.with(Cell::get);
        if depth >= max {
            return Err(EvalError::StackOverflow { depth, max });
        }
        CALL_DEPTH.with(|d| d.set(depth + 1));
        Ok(CallGuard)
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Bounds closure call depth on the current thread until dropped.
pub(crate) struct CallDepthLimit(usize);

impl CallDepthLimit {
    pub(crate) fn enter(max: usize) -> Self {
        CallDepthLimit(MAX_CALL_DEPTH.with(|m| m.replace(max)))
    }
}

impl Drop for CallDepthLimit {
    fn drop(&mut self) {
        MAX_CALL_DEPTH.with(|m| m.set(self.0));
    }
}

/// Type alias for builtin function pointers to reduce complexity
pub type BuiltinFnPtr = Arc<dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync>;

/// A function value.
#[derive(Clone)]
pub enum Function {
    /// Native Rust function
    Builtin(BuiltinFn),
    /// Lambda closed over its defining context
    Closure(Arc<Closure>),
}

impl Function {
    /// Invoke with already-evaluated arguments.
    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        match self {
            Function::Builtin(builtin) => builtin.call(&args),
            Function::Closure(closure) => closure.call(args),
        }
    }

    /// Name used in error messages.
    pub fn name(&self) -> &str {
        match self {
            Function::Builtin(builtin) => &builtin.name,
            Function::Closure(_) => "fn",
        }
    }

    pub(crate) fn ptr_eq(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Builtin(a), Function::Builtin(b)) => Arc::ptr_eq(&a.func, &b.func),
            (Function::Closure(a), Function::Closure(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn addr(&self) -> usize {
        match self {
            Function::Builtin(builtin) => Arc::as_ptr(&builtin.func) as *const () as usize,
            Function::Closure(closure) => Arc::as_ptr(closure) as usize,
        }
    }
}

/// A built-in native function.
///
/// These are Rust functions exposed to the language.
#[derive(Clone)]
pub struct BuiltinFn {
    /// Function name (for display/debugging)
    pub name: String,

    /// Arity (-1 for variadic)
    pub arity: i32,

    /// The actual function pointer
    pub func: BuiltinFnPtr,
}

impl BuiltinFn {
    /// Wrap a Rust closure as a builtin.
    pub fn new<F>(name: impl Into<String>, arity: i32, func: F) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        BuiltinFn {
            name: name.into(),
            arity,
            func: Arc::new(func),
        }
    }

    /// Check the arity, then run the function.
    ///
    /// Failures reported by the function become invocation errors.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        if self.arity >= 0 && args.len() != self.arity as usize {
            return Err(EvalError::Arity {
                name: self.name.clone(),
                expected: self.arity.to_string(),
                got: args.len(),
            });
        }
        (self.func)(args).map_err(|message| EvalError::Invocation {
            message: format!("{}: {}", self.name, message),
            source: None,
        })
    }
}

impl fmt::Debug for BuiltinFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinFn({})", self.name)
    }
}

/// A lambda value.
///
/// The body has already been specialized against the lexical bindings that
/// were live when the lambda was evaluated; `captured` keeps those bindings
/// for nodes that are not specialized (interop calls).
pub struct Closure {
    /// Positional parameters
    pub params: Vec<Symbol>,

    /// Rest parameter, bound to a vector of the remaining arguments
    pub rest: Option<Symbol>,

    /// The lambda body
    pub body: Node,

    /// Lexical bindings captured at creation, minus the parameters
    pub captured: Bindings,

    /// The context the lambda was evaluated in
    pub context: Context,
}

impl Closure {
    /// Bind arguments to parameters and evaluate the body in the captured
    /// context.
    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        let fixed = self.params.len();
        let arity_ok = match self.rest {
            Some(_) => args.len() >= fixed,
            None => args.len() == fixed,
        };
        if !arity_ok {
            return Err(EvalError::Arity {
                name: "fn".to_string(),
                expected: self.describe_arity(),
                got: args.len(),
            });
        }

        let mut frame = self.captured.clone();
        let mut args = args.into_iter();
        for param in &self.params {
            if let Some(arg) = args.next() {
                frame.insert(param.clone(), arg);
            }
        }
        if let Some(rest) = &self.rest {
            frame.insert(rest.clone(), Value::Vector(args.collect()));
        }

        let _call = CallGuard::enter()?;
        let body = self.body.specialize(&frame);
        Ok(body.eval(&self.context, &frame)?.value)
    }

    fn describe_arity(&self) -> String {
        match self.rest {
            Some(_) => format!("at least {}", self.params.len()),
            None => self.params.len().to_string(),
        }
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure([")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", param)?;
        }
        if let Some(rest) = &self.rest {
            if !self.params.is_empty() {
                write!(f, " ")?;
            }
            write!(f, "& {}", rest)?;
        }
        write!(f, "])")
    }
}
