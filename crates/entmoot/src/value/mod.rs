//! Value representation for runtime values and forms
//!
//! The reader produces values, expanders consume them as forms, and nodes
//! evaluate to them. Collections are persistent (`im`), so sharing a form
//! between a quote node and the caller never requires a deep copy.

mod callable;
mod display;
mod hashable;
mod impls;

pub use callable::{BuiltinFn, BuiltinFnPtr, Closure, Function};
pub(crate) use callable::CallDepthLimit;

use std::sync::Arc;

use crate::expander::Expander;
use crate::interop::TypeRef;
use crate::node::Node;
use crate::reader::SourceLocation;
use crate::symbol::{Keyword, Symbol};

/// Persistent vector of values
pub type Vector = im::Vector<Value>;

/// Persistent map of values
pub type Map = im::HashMap<Value, Value>;

/// Persistent set of values
pub type Set = im::HashSet<Value>;

/// Runtime value representation.
///
/// Values are organized into three tiers:
/// - Tier 1: Inline primitives and identifiers
/// - Tier 2: Persistent collections (which double as source forms)
/// - Tier 3: Callables and compiler objects (functions, expanders, nodes, types)
///
/// Only `Nil` is falsy. `Bool(false)` counts as true in a conditional.
#[derive(Clone)]
pub enum Value {
    // ═══════════════════════════════════════════════════════════════════
    // Tier 1: Inline Primitives
    // ═══════════════════════════════════════════════════════════════════
    /// The absent value, and the only false value
    Nil,

    /// `true` or `false`
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point
    Float(f64),

    /// Unicode scalar value
    Char(char),

    /// Immutable string
    String(Arc<str>),

    /// Identifier, evaluated by lookup
    Symbol(Symbol),

    /// Self-evaluating identifier
    Keyword(Keyword),

    // ═══════════════════════════════════════════════════════════════════
    // Tier 2: Persistent Collections
    // ═══════════════════════════════════════════════════════════════════
    /// List; as a form, an application or special form
    List(List),

    /// Vector
    Vector(Vector),

    /// Hash map
    Map(Map),

    /// Hash set
    Set(Set),

    // ═══════════════════════════════════════════════════════════════════
    // Tier 3: Callables and Compiler Objects
    // ═══════════════════════════════════════════════════════════════════
    /// Builtin or closure
    Function(Function),

    /// Form-to-node transformer
    Expander(Expander),

    /// Already-analysed node; expands to itself
    Node(Node),

    /// Host type handle from the interop layer
    Type(TypeRef),
}

/// A list form with the source location it was read from.
///
/// The location is informational; two lists with the same items are equal
/// regardless of where they were read.
#[derive(Clone, Default)]
pub struct List {
    items: Vector,
    source: Option<Arc<SourceLocation>>,
}

impl List {
    /// Create a list with no source location.
    pub fn new(items: Vector) -> Self {
        List {
            items,
            source: None,
        }
    }

    /// Attach the location the list was read from.
    pub fn with_source(mut self, location: SourceLocation) -> Self {
        self.source = Some(Arc::new(location));
        self
    }

    /// The list's elements.
    pub fn items(&self) -> &Vector {
        &self.items
    }

    /// Where the list was read from, if known.
    pub fn source(&self) -> Option<&SourceLocation> {
        self.source.as_deref()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is `()`.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// The first element.
    pub fn head(&self) -> Option<&Value> {
        self.items.front()
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> im::vector::Iter<'_, Value> {
        self.items.iter()
    }
}
