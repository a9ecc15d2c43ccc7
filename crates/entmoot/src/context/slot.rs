//! Lazily computed, memoized definitions

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use tracing::trace;

use super::{Context, ContextInner};
use crate::error::{EvalError, Result};
use crate::expander::Expander;
use crate::node::{Bindings, Dependencies, Node};
use crate::symbol::{Symbol, NS_SLOT};
use crate::value::Value;

thread_local! {
    // Slots currently being forced on this thread, by address.
    static FORCING: RefCell<Vec<usize>> = RefCell::new(Vec::new());
}

struct ForcingGuard(usize);

impl ForcingGuard {
    fn enter(slot: &Slot) -> Result<Self> {
        let key = slot as *const Slot as usize;
        FORCING.with(|forcing| {
            let mut forcing = forcing.borrow_mut();
            if forcing.contains(&key) {
                return Err(EvalError::CyclicDependency {
                    symbol: slot.symbol.clone(),
                });
            }
            forcing.push(key);
            Ok(ForcingGuard(key))
        })
    }
}

impl Drop for ForcingGuard {
    fn drop(&mut self) {
        FORCING.with(|forcing| {
            let mut forcing = forcing.borrow_mut();
            if let Some(pos) = forcing.iter().rposition(|key| *key == self.0) {
                forcing.remove(pos);
            }
        });
    }
}

/// The binding of one symbol in a context.
///
/// The node is evaluated the first time the value is needed and the result
/// is kept; concurrent forcers block until the first computation finishes.
/// A failed computation is not cached.
pub struct Slot {
    symbol: Symbol,
    node: Node,
    bindings: Bindings,
    dependencies: Dependencies,
    namespace: Arc<str>,
    owner: Weak<ContextInner>,
    value: OnceCell<Value>,
}

impl Slot {
    pub(super) fn new(
        symbol: Symbol,
        node: Node,
        bindings: Bindings,
        dependencies: Dependencies,
        namespace: Arc<str>,
        owner: Weak<ContextInner>,
    ) -> Self {
        Slot {
            symbol,
            node,
            bindings,
            dependencies,
            namespace,
            owner,
            value: OnceCell::new(),
        }
    }

    /// A fresh, uncomputed copy owned by another context.
    pub(super) fn invalidate(&self, owner: Weak<ContextInner>) -> Slot {
        Slot::new(
            self.symbol.clone(),
            self.node.clone(),
            self.bindings.clone(),
            self.dependencies.clone(),
            self.namespace.clone(),
            owner,
        )
    }

    /// The qualified symbol this slot defines.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// The unevaluated definition.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Lexical bindings the definition is evaluated with.
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Qualified dependencies of the definition.
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Namespace that was current when the slot was defined.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether the value has been computed.
    pub fn is_computed(&self) -> bool {
        self.value.get().is_some()
    }

    /// Compute (once) and return the value, evaluating in the owning context.
    pub fn value(&self) -> Result<Value> {
        match self.owner.upgrade() {
            Some(inner) => self.force(&Context { inner }),
            None => Err(EvalError::invocation(format!(
                "context owning {} has been dropped",
                self.symbol
            ))),
        }
    }

    /// Compute (once) and return the value.
    ///
    /// Evaluates in the owning context while it is alive. Once it has been
    /// dropped, `via` stands in for it; callers pass a context they found
    /// this exact slot in, which agrees with the owner on everything the
    /// slot depends on.
    pub(crate) fn force(&self, via: &Context) -> Result<Value> {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        if let Some(value) = self.node.constant_value() {
            return Ok(self.value.get_or_init(|| value.clone()).clone());
        }
        let _guard = ForcingGuard::enter(self)?;
        self.value
            .get_or_try_init(|| {
                let context = self.evaluation_context(via);
                trace!(symbol = %self.symbol, "computing slot");
                self.node.compute(&context, &self.bindings)
            })
            .cloned()
    }

    // The owner (or `via`), switched to the namespace the slot was defined
    // in. An invalidated copy is owned by a context whose current namespace
    // may differ.
    fn evaluation_context(&self, via: &Context) -> Context {
        let context = match self.owner.upgrade() {
            Some(inner) => Context { inner },
            None => via.clone(),
        };
        if context.namespace() == *self.namespace {
            context
        } else {
            context.define(&NS_SLOT, Node::constant(Value::string(&*self.namespace)))
        }
    }

    /// The expander bound by this slot, if any.
    ///
    /// Forces the slot; a failure to compute it is returned as is.
    pub(crate) fn as_expander(&self, via: &Context) -> Result<Option<Expander>> {
        match self.force(via)? {
            Value::Expander(expander) => Ok(Some(expander)),
            _ => Ok(None),
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("symbol", &self.symbol)
            .field("node", &self.node)
            .field("computed", &self.value.get())
            .finish()
    }
}
