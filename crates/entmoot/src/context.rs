//! Persistent compilation context
//!
//! A [`Context`] maps qualified symbols to [`Slot`]s and indexes which slots
//! depend on which symbols. It is never mutated: [`Context::define`]
//! returns a new context sharing everything that did not change. Slots that
//! (transitively) depend on the redefined symbol are replaced by fresh,
//! uncomputed copies bound to the new context, so redefinition is seen by
//! dependents the next time they are forced.
//!
//! ```text
//! c1 ── define b ──▶ c2 ── define a ──▶ c3
//!                    b ─ depends on ─▶ a      (b's slot in c3 is fresh)
//! ```

mod prelude;
mod slot;

pub use prelude::{bootstrap, bootstrap_with_host, initial_context, primitives};
pub use slot::Slot;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use tracing::debug;

use crate::error::{EvalError, Result};
use crate::interop::{HostInterop, Interop};
use crate::node::{Bindings, Dependencies, Node};
use crate::symbol::{Symbol, CORE_NS, NS_SLOT};
use crate::value::Value;

pub(crate) struct ContextInner {
    slots: im::HashMap<Symbol, Arc<Slot>>,
    dependents: im::HashMap<Symbol, Dependencies>,
    host: Arc<dyn Interop>,
}

/// Immutable symbol table; cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::empty()
    }
}

impl Context {
    /// A context with no definitions and the default host.
    pub fn empty() -> Self {
        Self::with_host(Arc::new(HostInterop::new()))
    }

    /// A context with no definitions using `host` for interop.
    pub fn with_host(host: Arc<dyn Interop>) -> Self {
        Context {
            inner: Arc::new(ContextInner {
                slots: im::HashMap::new(),
                dependents: im::HashMap::new(),
                host,
            }),
        }
    }

    /// The interop layer.
    pub fn host(&self) -> &dyn Interop {
        self.inner.host.as_ref()
    }

    /// Current namespace, from the `entmoot.core/*ns*` slot.
    pub fn namespace(&self) -> String {
        self.inner
            .slots
            .get(&*NS_SLOT)
            .and_then(|slot| slot.force(self).ok())
            .and_then(|value| value.as_str().map(String::from))
            .unwrap_or_else(|| CORE_NS.to_string())
    }

    /// Qualify an unqualified symbol with the current namespace.
    pub fn qualify(&self, symbol: &Symbol) -> Symbol {
        if symbol.is_qualified() {
            symbol.clone()
        } else {
            symbol.qualify(&self.namespace())
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Lookup
    // ═══════════════════════════════════════════════════════════════════

    /// Find the slot for a symbol: qualified symbols directly, unqualified
    /// ones in the current namespace and then in `entmoot.core`.
    pub fn get_slot(&self, symbol: &Symbol) -> Option<Arc<Slot>> {
        if symbol.is_qualified() {
            return self.inner.slots.get(symbol).cloned();
        }
        let namespace = self.namespace();
        self.inner
            .slots
            .get(&symbol.qualify(&namespace))
            .or_else(|| {
                if namespace == CORE_NS {
                    None
                } else {
                    self.inner.slots.get(&symbol.qualify(CORE_NS))
                }
            })
            .cloned()
    }

    /// Force the slot for a symbol.
    pub fn get_value(&self, symbol: &Symbol) -> Result<Value> {
        match self.get_slot(symbol) {
            Some(slot) => slot.force(self),
            None => Err(EvalError::UnresolvedSymbol {
                symbol: self.qualify(symbol),
            }),
        }
    }

    /// The unevaluated definition of a symbol.
    pub fn get_node(&self, symbol: &Symbol) -> Option<Node> {
        self.get_slot(symbol).map(|slot| slot.node().clone())
    }

    /// Dependencies recorded for a symbol's definition.
    pub fn get_dependencies(&self, symbol: &Symbol) -> Dependencies {
        self.get_slot(symbol)
            .map(|slot| slot.dependencies().clone())
            .unwrap_or_default()
    }

    /// Slots that directly reference `symbol`, spelled exactly as given.
    pub fn get_dependents(&self, symbol: &Symbol) -> Dependencies {
        self.inner
            .dependents
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    /// Every slot that directly or transitively depends on `symbol`.
    pub fn calc_dependents(&self, symbol: &Symbol) -> Dependencies {
        let mut found = Dependencies::new();
        let mut queue = VecDeque::from([self.qualify(symbol)]);
        while let Some(next) = queue.pop_front() {
            if let Some(direct) = self.inner.dependents.get(&next) {
                for dependent in direct.iter() {
                    if found.insert(dependent.clone()).is_none() {
                        queue.push_back(dependent.clone());
                    }
                }
            }
        }
        found
    }

    /// All defined symbols, sorted.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.inner.slots.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    // ═══════════════════════════════════════════════════════════════════
    // Definition
    // ═══════════════════════════════════════════════════════════════════

    /// Bind `symbol` to an unevaluated node.
    pub fn define(&self, symbol: &Symbol, node: Node) -> Context {
        self.define_with_bindings(symbol, node, Bindings::new())
    }

    /// Bind `symbol` to an unevaluated node plus the lexical bindings it
    /// should be evaluated with.
    pub fn define_with_bindings(&self, symbol: &Symbol, node: Node, bindings: Bindings) -> Context {
        let namespace = self.namespace();
        let symbol = symbol.qualify(&namespace);
        let dependencies = qualify_dependencies(node.dependencies(), &namespace);
        let invalidated = self.calc_dependents(&symbol);

        let mut dependents = self.inner.dependents.clone();
        if let Some(old) = self.inner.slots.get(&symbol) {
            for dependency in old.dependencies().iter() {
                let remaining = dependents
                    .get(dependency)
                    .map(|set| set.without(&symbol))
                    .unwrap_or_default();
                if remaining.is_empty() {
                    dependents.remove(dependency);
                } else {
                    dependents.insert(dependency.clone(), remaining);
                }
            }
        }
        for dependency in dependencies.iter() {
            let updated = dependents
                .get(dependency)
                .cloned()
                .unwrap_or_default()
                .update(symbol.clone());
            dependents.insert(dependency.clone(), updated);
        }

        let namespace: Arc<str> = Arc::from(namespace.as_str());
        let inner = Arc::new_cyclic(|owner: &Weak<ContextInner>| {
            let mut slots = self.inner.slots.clone();
            for dependent in invalidated.iter() {
                if let Some(slot) = slots.get(dependent).cloned() {
                    slots.insert(dependent.clone(), Arc::new(slot.invalidate(owner.clone())));
                }
            }
            slots.insert(
                symbol.clone(),
                Arc::new(Slot::new(
                    symbol.clone(),
                    node,
                    bindings,
                    dependencies,
                    namespace,
                    owner.clone(),
                )),
            );
            ContextInner {
                slots,
                dependents,
                host: self.inner.host.clone(),
            }
        });

        debug!(symbol = %symbol, invalidated = invalidated.len(), "define");
        Context { inner }
    }
}

// Register a dependency under every spelling a later definition may use.
fn qualify_dependencies(dependencies: &Dependencies, namespace: &str) -> Dependencies {
    let mut qualified = Dependencies::new();
    for dependency in dependencies.iter() {
        qualified.insert(dependency.clone());
        if !dependency.is_qualified() {
            qualified.insert(dependency.qualify(namespace));
            if namespace != CORE_NS {
                qualified.insert(dependency.qualify(CORE_NS));
            }
        }
    }
    qualified
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("namespace", &self.namespace())
            .field("symbols", &self.inner.slots.len())
            .finish()
    }
}
