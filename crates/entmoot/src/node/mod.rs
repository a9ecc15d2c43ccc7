//! Analysed program nodes
//!
//! Expansion turns forms into nodes. A node is immutable and knows the free
//! symbols it references (its dependencies), which the context uses to
//! invalidate dependent slots when a symbol is redefined.
//!
//! Three operations act on nodes:
//! - [`Node::eval`] produces a value and a possibly updated context
//! - [`Node::specialize`] substitutes known lexical values
//! - [`Node::optimize`] performs context-free rewrites such as constant folding

mod eval;
mod transform;

pub use eval::apply;

use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::interop::TypeRef;
use crate::reader::SourceLocation;
use crate::symbol::Symbol;
use crate::value::Value;

/// Set of symbols a node references
pub type Dependencies = im::HashSet<Symbol>;

/// Lexical bindings from symbols to already-computed values
pub type Bindings = im::HashMap<Symbol, Value>;

/// The outcome of evaluating a node: its value and the context to continue
/// with. Only definitions produce a context different from the input.
#[derive(Clone, Debug)]
pub struct EvalResult {
    /// The computed value
    pub value: Value,
    /// The context after evaluation
    pub context: Context,
}

impl EvalResult {
    /// Pair a value with a context.
    pub fn new(value: Value, context: Context) -> Self {
        EvalResult { value, context }
    }
}

/// The closed set of node variants.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// A fixed value
    Constant(Value),

    /// Lexical binding first, otherwise the context
    Lookup(Symbol),

    /// Call a function (or expander) on evaluated arguments
    Apply {
        /// Callee
        function: Node,
        /// Arguments, evaluated left to right
        args: Vec<Node>,
    },

    /// Bind a symbol in the context
    Define {
        /// Name being defined
        symbol: Symbol,
        /// Definition, kept unevaluated in the slot
        expr: Node,
    },

    /// Evaluate in order, threading the context; value of the last
    Do(Vec<Node>),

    /// `nil` selects the else branch; everything else the then branch
    If {
        /// Condition
        test: Node,
        /// Branch for a non-nil condition
        then: Node,
        /// Branch for `nil`
        otherwise: Node,
    },

    /// Parallel lexical bindings around a body
    Let {
        /// Names and their expressions, all evaluated in the outer scope
        bindings: Vec<(Symbol, Node)>,
        /// Body evaluated with the bindings in scope
        body: Node,
    },

    /// Function literal
    Lambda {
        /// Positional parameters
        params: Vec<Symbol>,
        /// Rest parameter
        rest: Option<Symbol>,
        /// Function body
        body: Node,
    },

    /// Expander literal
    Expander {
        /// Symbol bound to the continuation expander
        continuation: Symbol,
        /// Parameters bound to the raw argument forms
        params: Vec<Symbol>,
        /// Body producing a node or a form
        body: Node,
    },

    /// Returns a form unevaluated
    Quote {
        /// The quoted form, with any unquotes already substituted
        form: Value,
        /// Whether the form came from `syntax-quote`
        syntax: bool,
    },

    /// Vector constructor
    Vector(Vec<Node>),
    /// List constructor
    List(Vec<Node>),
    /// Map constructor over alternating keys and values
    HashMap(Vec<Node>),
    /// Set constructor
    Set(Vec<Node>),

    /// Call a member on a host value
    InvokeInstance {
        /// Receiver
        target: Node,
        /// Member name
        member: Symbol,
        /// Arguments
        args: Vec<Node>,
    },

    /// Call a static member on a host type
    InvokeStatic {
        /// Resolved type
        ty: TypeRef,
        /// Member name
        member: Symbol,
        /// Arguments
        args: Vec<Node>,
    },

    /// Convert a value to a host type
    Cast {
        /// Target type, resolved at expansion time
        ty: TypeRef,
        /// Value to convert
        expr: Node,
    },

    /// Test a value against a host type
    InstanceOf {
        /// Type expression, evaluated at runtime
        ty: Node,
        /// Value to test
        expr: Node,
    },
}

struct NodeInner {
    kind: NodeKind,
    deps: Dependencies,
    // added by `include_dependency`, kept across rewrites
    extra: Dependencies,
    source: Option<Arc<SourceLocation>>,
}

/// Shared handle to an immutable node.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

fn union_of<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Dependencies {
    nodes
        .into_iter()
        .fold(Dependencies::new(), |acc, node| acc.union(node.0.deps.clone()))
}

fn without(deps: Dependencies, symbols: impl IntoIterator<Item = Symbol>) -> Dependencies {
    symbols.into_iter().fold(deps, |acc, sym| acc.without(&sym))
}

impl Node {
    fn build(kind: NodeKind, deps: Dependencies) -> Self {
        Node(Arc::new(NodeInner {
            kind,
            deps,
            extra: Dependencies::new(),
            source: None,
        }))
    }

    fn from_kind(kind: NodeKind) -> Self {
        let deps = match &kind {
            NodeKind::Constant(_) | NodeKind::Quote { .. } => Dependencies::new(),
            NodeKind::Lookup(sym) => Dependencies::unit(sym.clone()),
            NodeKind::Apply { function, args } => {
                function.0.deps.clone().union(union_of(args))
            }
            NodeKind::Define { expr, .. } => expr.0.deps.clone(),
            NodeKind::Do(body)
            | NodeKind::Vector(body)
            | NodeKind::List(body)
            | NodeKind::HashMap(body)
            | NodeKind::Set(body) => union_of(body),
            NodeKind::If {
                test,
                then,
                otherwise,
            } => union_of([test, then, otherwise]),
            NodeKind::Let { bindings, body } => {
                let inner = without(
                    body.0.deps.clone(),
                    bindings.iter().map(|(sym, _)| sym.clone()),
                );
                union_of(bindings.iter().map(|(_, expr)| expr)).union(inner)
            }
            NodeKind::Lambda { params, rest, body } => without(
                body.0.deps.clone(),
                params.iter().chain(rest.iter()).cloned(),
            ),
            NodeKind::Expander {
                continuation,
                params,
                body,
            } => without(
                body.0.deps.clone(),
                params.iter().chain(std::iter::once(continuation)).cloned(),
            ),
            NodeKind::InvokeInstance { target, args, .. } => {
                target.0.deps.clone().union(union_of(args))
            }
            NodeKind::InvokeStatic { args, .. } => union_of(args),
            NodeKind::Cast { expr, .. } => expr.0.deps.clone(),
            NodeKind::InstanceOf { ty, expr } => union_of([ty, expr]),
        };
        Node::build(kind, deps)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════════════════════════════

    /// A constant value.
    pub fn constant(value: Value) -> Self {
        Node::from_kind(NodeKind::Constant(value))
    }

    /// A symbol lookup.
    pub fn lookup(symbol: Symbol) -> Self {
        Node::from_kind(NodeKind::Lookup(symbol))
    }

    /// A function application.
    pub fn apply(function: Node, args: Vec<Node>) -> Self {
        Node::from_kind(NodeKind::Apply { function, args })
    }

    /// A definition.
    pub fn define(symbol: Symbol, expr: Node) -> Self {
        Node::from_kind(NodeKind::Define { symbol, expr })
    }

    /// A sequence of nodes.
    pub fn sequence(body: Vec<Node>) -> Self {
        Node::from_kind(NodeKind::Do(body))
    }

    /// A conditional.
    pub fn conditional(test: Node, then: Node, otherwise: Node) -> Self {
        Node::from_kind(NodeKind::If {
            test,
            then,
            otherwise,
        })
    }

    /// Lexical bindings around a body.
    pub fn let_block(bindings: Vec<(Symbol, Node)>, body: Node) -> Self {
        Node::from_kind(NodeKind::Let { bindings, body })
    }

    /// A function literal.
    pub fn lambda(params: Vec<Symbol>, rest: Option<Symbol>, body: Node) -> Self {
        Node::from_kind(NodeKind::Lambda { params, rest, body })
    }

    /// An expander literal.
    pub fn expander(continuation: Symbol, params: Vec<Symbol>, body: Node) -> Self {
        Node::from_kind(NodeKind::Expander {
            continuation,
            params,
            body,
        })
    }

    /// A quoted form.
    pub fn quote(form: Value, syntax: bool) -> Self {
        Node::from_kind(NodeKind::Quote { form, syntax })
    }

    /// A vector constructor.
    pub fn vector(items: Vec<Node>) -> Self {
        Node::from_kind(NodeKind::Vector(items))
    }

    /// A list constructor.
    pub fn list(items: Vec<Node>) -> Self {
        Node::from_kind(NodeKind::List(items))
    }

    /// A map constructor; `items` alternate keys and values.
    pub fn hash_map(items: Vec<Node>) -> Self {
        Node::from_kind(NodeKind::HashMap(items))
    }

    /// A set constructor.
    pub fn set(items: Vec<Node>) -> Self {
        Node::from_kind(NodeKind::Set(items))
    }

    /// An instance member call.
    pub fn invoke_instance(target: Node, member: Symbol, args: Vec<Node>) -> Self {
        Node::from_kind(NodeKind::InvokeInstance {
            target,
            member,
            args,
        })
    }

    /// A static member call.
    pub fn invoke_static(ty: TypeRef, member: Symbol, args: Vec<Node>) -> Self {
        Node::from_kind(NodeKind::InvokeStatic { ty, member, args })
    }

    /// A cast to a host type.
    pub fn cast(ty: TypeRef, expr: Node) -> Self {
        Node::from_kind(NodeKind::Cast { ty, expr })
    }

    /// A host type test.
    pub fn instance_of(ty: Node, expr: Node) -> Self {
        Node::from_kind(NodeKind::InstanceOf { ty, expr })
    }

    // ═══════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════

    /// The node's variant.
    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    /// Free symbols referenced by this node.
    pub fn dependencies(&self) -> &Dependencies {
        &self.0.deps
    }

    /// Where the node's form was read from, if known.
    pub fn source(&self) -> Option<&SourceLocation> {
        self.0.source.as_deref()
    }

    /// Whether the node is a [`NodeKind::Constant`].
    pub fn is_constant(&self) -> bool {
        matches!(self.0.kind, NodeKind::Constant(_))
    }

    /// The value of a constant node.
    pub fn constant_value(&self) -> Option<&Value> {
        match &self.0.kind {
            NodeKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Same node with `symbol` added to its dependencies.
    pub fn include_dependency(&self, symbol: &Symbol) -> Node {
        if self.0.deps.contains(symbol) {
            return self.clone();
        }
        Node(Arc::new(NodeInner {
            kind: self.0.kind.clone(),
            deps: self.0.deps.update(symbol.clone()),
            extra: self.0.extra.update(symbol.clone()),
            source: self.0.source.clone(),
        }))
    }

    /// Same node annotated with a source location.
    pub fn with_source(&self, location: Option<&SourceLocation>) -> Node {
        match location {
            None => self.clone(),
            Some(loc) => Node(Arc::new(NodeInner {
                kind: self.0.kind.clone(),
                deps: self.0.deps.clone(),
                extra: self.0.extra.clone(),
                source: Some(Arc::new(loc.clone())),
            })),
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    // A node standing in for `self`, keeping the dependencies recorded on it.
    fn replace_with(&self, node: Node) -> Node {
        self.0
            .extra
            .iter()
            .fold(node, |acc, sym| acc.include_dependency(sym))
    }

    // Rebuild with the same extra dependencies and source as `self`.
    fn rebuild(&self, kind: NodeKind) -> Node {
        let fresh = Node::from_kind(kind);
        if self.0.extra.is_empty() && self.0.source.is_none() {
            return fresh;
        }
        Node(Arc::new(NodeInner {
            kind: fresh.0.kind.clone(),
            deps: fresh.0.deps.clone().union(self.0.extra.clone()),
            extra: self.0.extra.clone(),
            source: self.0.source.clone(),
        }))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
            for node in nodes {
                write!(f, " {:?}", node)?;
            }
            Ok(())
        }

        match &self.0.kind {
            NodeKind::Constant(value) => write!(f, "(Constant {:?})", value),
            NodeKind::Lookup(sym) => write!(f, "(Lookup {})", sym),
            NodeKind::Apply { function, args } => {
                write!(f, "(Apply {:?}", function)?;
                join(f, args)?;
                write!(f, ")")
            }
            NodeKind::Define { symbol, expr } => write!(f, "(Define {} {:?})", symbol, expr),
            NodeKind::Do(body) => {
                write!(f, "(Do")?;
                join(f, body)?;
                write!(f, ")")
            }
            NodeKind::If {
                test,
                then,
                otherwise,
            } => write!(f, "(If {:?} {:?} {:?})", test, then, otherwise),
            NodeKind::Let { bindings, body } => {
                write!(f, "(Let [")?;
                for (i, (sym, expr)) in bindings.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{} {:?}", sym, expr)?;
                }
                write!(f, "] {:?})", body)
            }
            NodeKind::Lambda { params, rest, body } => {
                write!(f, "(Lambda {:?}", params)?;
                if let Some(rest) = rest {
                    write!(f, " & {}", rest)?;
                }
                write!(f, " {:?})", body)
            }
            NodeKind::Expander {
                continuation,
                params,
                body,
            } => write!(f, "(Expander {} {:?} {:?})", continuation, params, body),
            NodeKind::Quote { form, .. } => write!(f, "(Quote {:?})", form),
            NodeKind::Vector(items) => {
                write!(f, "(Vector")?;
                join(f, items)?;
                write!(f, ")")
            }
            NodeKind::List(items) => {
                write!(f, "(List")?;
                join(f, items)?;
                write!(f, ")")
            }
            NodeKind::HashMap(items) => {
                write!(f, "(HashMap")?;
                join(f, items)?;
                write!(f, ")")
            }
            NodeKind::Set(items) => {
                write!(f, "(Set")?;
                join(f, items)?;
                write!(f, ")")
            }
            NodeKind::InvokeInstance {
                target,
                member,
                args,
            } => {
                write!(f, "(InvokeInstance {:?} {}", target, member)?;
                join(f, args)?;
                write!(f, ")")
            }
            NodeKind::InvokeStatic { ty, member, args } => {
                write!(f, "(InvokeStatic {} {}", ty.name(), member)?;
                join(f, args)?;
                write!(f, ")")
            }
            NodeKind::Cast { ty, expr } => write!(f, "(Cast {} {:?})", ty.name(), expr),
            NodeKind::InstanceOf { ty, expr } => write!(f, "(InstanceOf {:?} {:?})", ty, expr),
        }
    }
}
