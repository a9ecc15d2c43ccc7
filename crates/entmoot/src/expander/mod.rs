//! Expanders: the functions that turn forms into nodes
//!
//! Every expander takes a context, a form and a continuation expander (used
//! to expand sub-forms). The initial expander dispatches on the head of a
//! list: a head symbol bound to an expander in the context hands the form
//! over to it, anything else is an application.
//!
//! ```text
//! (when t x)  ──▶ slot `when` holds a macro ──▶ (if t (do x)) ──▶ If node
//! (.length s) ──▶ (. s (length))             ──▶ InvokeInstance node
//! (f a b)     ──▶ Apply(Lookup f, [Lookup a, Lookup b])
//! ```

mod special_forms;

pub use special_forms::SpecialForm;

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::config::DEFAULT_MAX_EXPANSION_DEPTH;
use crate::context::Context;
use crate::error::{EvalError, Result};
use crate::node::{Bindings, Node};
use crate::symbol::{Symbol, DOT};
use crate::value::{Function, List, Value};

/// A form-to-node transformer.
#[derive(Clone)]
pub enum Expander {
    /// The default expander; `remaining` bounds nested user expansions
    Initial {
        /// User expander and macro invocations still allowed below this point
        remaining: usize,
    },
    /// One of the built-in special forms
    Builtin(SpecialForm),
    /// Defined by an `expander` literal
    User(Arc<UserExpander>),
    /// Defined by `macro`: a function from argument forms to a form
    Macro(Arc<MacroExpander>),
}

impl Expander {
    /// The default expander with the default depth bound.
    pub fn initial() -> Self {
        Self::with_depth_limit(DEFAULT_MAX_EXPANSION_DEPTH)
    }

    /// The default expander allowing `depth` nested user expansions.
    pub fn with_depth_limit(depth: usize) -> Self {
        Expander::Initial { remaining: depth }
    }

    /// Expand `form` into a node, using `continuation` for sub-forms.
    pub fn expand(&self, context: &Context, form: &Value, continuation: &Expander) -> Result<Node> {
        match self {
            Expander::Initial { .. } => initial_expand(context, form, continuation),
            Expander::Builtin(special) => special.expand(context, form, continuation),
            Expander::User(user) => user.expand(context, form, continuation),
            Expander::Macro(mac) => mac.expand(context, form, continuation),
        }
    }

    /// Call the expander as a function of one form, returning a node value.
    pub fn call(&self, context: &Context, args: Vec<Value>) -> Result<Value> {
        if args.len() != 1 {
            return Err(EvalError::Arity {
                name: "expander".to_string(),
                expected: "1".to_string(),
                got: args.len(),
            });
        }
        let continuation = match self {
            Expander::Initial { .. } => self.clone(),
            _ => Expander::initial(),
        };
        let node = self.expand(context, &args[0], &continuation)?;
        Ok(Value::Node(node))
    }

    // The continuation handed to a user expander or macro one level down.
    fn descend(&self, form: &Value) -> Result<Expander> {
        match self {
            Expander::Initial { remaining: 0 } => Err(EvalError::expansion(
                "maximum expansion depth exceeded",
                form,
            )),
            Expander::Initial { remaining } => Ok(Expander::Initial {
                remaining: remaining - 1,
            }),
            other => Ok(other.clone()),
        }
    }

    pub(crate) fn identity(&self) -> usize {
        match self {
            Expander::Initial { .. } => 0,
            Expander::Builtin(special) => *special as usize + 1,
            Expander::User(user) => Arc::as_ptr(user) as usize,
            Expander::Macro(mac) => Arc::as_ptr(mac) as usize,
        }
    }
}

impl PartialEq for Expander {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expander::Initial { .. }, Expander::Initial { .. }) => true,
            (Expander::Builtin(a), Expander::Builtin(b)) => a == b,
            (Expander::User(a), Expander::User(b)) => Arc::ptr_eq(a, b),
            (Expander::Macro(a), Expander::Macro(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Expander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expander::Initial { .. } => write!(f, "expander initial"),
            Expander::Builtin(special) => write!(f, "special-form {}", special.name()),
            Expander::User(user) => write!(f, "expander {:?}", user.params),
            Expander::Macro(_) => write!(f, "macro"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Initial expander
// ═══════════════════════════════════════════════════════════════════════

fn initial_expand(context: &Context, form: &Value, ex: &Expander) -> Result<Node> {
    match form {
        Value::List(list) => expand_list(context, form, list, ex),
        Value::Vector(items) => Ok(Node::vector(expand_all(context, items.iter(), ex)?)),
        Value::Map(map) => {
            let mut nodes = Vec::with_capacity(map.len() * 2);
            for (key, value) in map.iter() {
                nodes.push(ex.expand(context, key, ex)?);
                nodes.push(ex.expand(context, value, ex)?);
            }
            Ok(Node::hash_map(nodes))
        }
        Value::Set(items) => Ok(Node::set(expand_all(context, items.iter(), ex)?)),
        Value::Symbol(sym) => Ok(Node::lookup(sym.clone())),
        Value::Node(node) => Ok(node.clone()),
        other => Ok(Node::constant(other.clone())),
    }
}

fn expand_list(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    let head = match list.head() {
        Some(head) => head,
        None => return Ok(Node::constant(form.clone())),
    };

    if let Value::Symbol(sym) = head {
        let bound = match context.get_slot(sym) {
            Some(slot) => slot.as_expander(context)?,
            None => None,
        };
        if let Some(expander) = bound {
            let continuation = match expander {
                Expander::Builtin(_) => ex.clone(),
                _ => ex.descend(form)?,
            };
            trace!(head = %sym, "expanding");
            let node = expander.expand(context, form, &continuation)?;
            return Ok(node.include_dependency(sym));
        }

        if let Some(member) = sym.name().strip_prefix('.') {
            if !sym.is_qualified() && !member.is_empty() {
                return ex.expand(context, &member_call(form, list, member)?, ex);
            }
        }
    }

    let function = ex.expand(context, head, ex)?;
    let args = expand_all(context, list.iter().skip(1), ex)?;
    Ok(Node::apply(function, args).with_source(list.source()))
}

// (.member obj args...) => (. obj (member args...))
fn member_call(form: &Value, list: &List, member: &str) -> Result<Value> {
    let target = list
        .get(1)
        .ok_or_else(|| EvalError::expansion(format!(".{} requires a target", member), form))?;
    let call = Value::list(
        std::iter::once(Value::Symbol(Symbol::new(member)))
            .chain(list.iter().skip(2).cloned())
            .collect(),
    );
    let items = vec![Value::Symbol(DOT.clone()), target.clone(), call];
    Ok(match list.source() {
        Some(loc) => Value::list_at(items, loc.clone()),
        None => Value::list(items),
    })
}

pub(crate) fn expand_all<'a>(
    context: &Context,
    forms: impl Iterator<Item = &'a Value>,
    ex: &Expander,
) -> Result<Vec<Node>> {
    forms.map(|form| ex.expand(context, form, ex)).collect()
}

// ═══════════════════════════════════════════════════════════════════════
// User-defined expanders
// ═══════════════════════════════════════════════════════════════════════

/// Expander created by evaluating an `expander` literal.
pub struct UserExpander {
    /// Bound to the continuation expander during expansion
    pub continuation: Symbol,
    /// Bound to the raw argument forms during expansion
    pub params: Vec<Symbol>,
    /// Body, already specialized against the captured bindings
    pub body: Node,
    /// Lexical bindings captured when the literal was evaluated
    pub captured: Bindings,
}

impl UserExpander {
    /// Bind the continuation and argument forms, then run the body.
    pub fn expand(&self, context: &Context, form: &Value, ex: &Expander) -> Result<Node> {
        let list = form
            .as_list()
            .ok_or_else(|| EvalError::expansion("expander applied to a non-list form", form))?;
        if list.len() != self.params.len() + 1 {
            return Err(EvalError::Arity {
                name: "expander".to_string(),
                expected: self.params.len().to_string(),
                got: list.len().saturating_sub(1),
            });
        }

        let mut bindings = self.captured.clone();
        bindings.insert(self.continuation.clone(), Value::Expander(ex.clone()));
        for (param, arg) in self.params.iter().zip(list.iter().skip(1)) {
            bindings.insert(param.clone(), arg.clone());
        }

        trace!(form = ?form, "user expander");
        let result = self.body.compute(context, &bindings)?;
        finish(context, result, ex)
    }
}

/// Expander created by `macro`: calls a function on the argument forms.
pub struct MacroExpander {
    /// The macro function
    pub function: Function,
}

impl MacroExpander {
    /// Call the function on the unevaluated argument forms and expand the
    /// resulting form.
    pub fn expand(&self, context: &Context, form: &Value, ex: &Expander) -> Result<Node> {
        let list = form
            .as_list()
            .ok_or_else(|| EvalError::expansion("macro applied to a non-list form", form))?;
        let args: Vec<Value> = list.iter().skip(1).cloned().collect();
        trace!(form = ?form, "macro");
        let result = self.function.call(args)?;
        finish(context, result, ex)
    }
}

// A node result is final; any other value is a form to expand further.
fn finish(context: &Context, result: Value, ex: &Expander) -> Result<Node> {
    match result {
        Value::Node(node) => Ok(node),
        form => ex.expand(context, &form, ex),
    }
}
