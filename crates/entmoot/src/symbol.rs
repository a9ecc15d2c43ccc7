//! Symbols, keywords and the well-known names the core relies on
//!
//! A symbol is an optional namespace plus a name. `a` and `entmoot.core/a`
//! are distinct values; resolution against a context's current namespace
//! happens in [`crate::Context`], never here.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Namespace holding the special forms, primitives and `*ns*`.
pub const CORE_NS: &str = "entmoot.core";

/// A possibly namespace-qualified identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    namespace: Option<Arc<str>>,
    name: Arc<str>,
}

impl Symbol {
    /// Create an unqualified symbol.
    pub fn new(name: impl AsRef<str>) -> Self {
        Symbol {
            namespace: None,
            name: Arc::from(name.as_ref()),
        }
    }

    /// Create a symbol qualified with `namespace`.
    pub fn qualified(namespace: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Symbol {
            namespace: Some(Arc::from(namespace.as_ref())),
            name: Arc::from(name.as_ref()),
        }
    }

    /// Parse `ns/name` or `name`.
    ///
    /// A lone `/` and names with a leading or trailing slash stay unqualified.
    pub fn parse(text: &str) -> Self {
        match text.rfind('/') {
            Some(idx) if idx > 0 && idx < text.len() - 1 => {
                Symbol::qualified(&text[..idx], &text[idx + 1..])
            }
            _ => Symbol::new(text),
        }
    }

    /// The namespace part, if qualified.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// The name part.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the symbol carries a namespace.
    pub fn is_qualified(&self) -> bool {
        self.namespace.is_some()
    }

    /// Qualify against `namespace` unless already qualified.
    pub fn qualify(&self, namespace: &str) -> Symbol {
        if self.is_qualified() {
            self.clone()
        } else {
            Symbol {
                namespace: Some(Arc::from(namespace)),
                name: self.name.clone(),
            }
        }
    }

    /// The same name without a namespace.
    pub fn unqualified(&self) -> Symbol {
        Symbol {
            namespace: None,
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<&str> for Symbol {
    fn from(text: &str) -> Self {
        Symbol::parse(text)
    }
}

/// A self-evaluating identifier, printed with a leading colon.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keyword(Symbol);

impl Keyword {
    /// Parse `ns/name` or `name` (without the colon).
    pub fn parse(text: &str) -> Self {
        Keyword(Symbol::parse(text))
    }

    /// The namespace part, if qualified.
    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace()
    }

    /// The name part.
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// The symbol with the same spelling.
    pub fn to_symbol(&self) -> Symbol {
        self.0.clone()
    }
}

impl From<Symbol> for Keyword {
    fn from(symbol: Symbol) -> Self {
        Keyword(symbol)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl fmt::Debug for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Well-known symbols
// ═══════════════════════════════════════════════════════════════════════

macro_rules! well_known {
    ($($(#[$meta:meta])* $id:ident => $text:expr;)*) => {
        $(
            $(#[$meta])*
            pub static $id: Lazy<Symbol> = Lazy::new(|| Symbol::new($text));
        )*
    };
}

well_known! {
    /// `def`
    DEF => "def";
    /// `defn`
    DEFN => "defn";
    /// `fn`
    FN => "fn";
    /// `do`
    DO => "do";
    /// `if`
    IF => "if";
    /// `let`
    LET => "let";
    /// `quote`
    QUOTE => "quote";
    /// `syntax-quote`
    SYNTAX_QUOTE => "syntax-quote";
    /// `unquote`
    UNQUOTE => "unquote";
    /// `macro`
    MACRO => "macro";
    /// `defmacro`
    DEFMACRO => "defmacro";
    /// `expander`
    EXPANDER => "expander";
    /// `.`
    DOT => ".";
    /// `cast`
    CAST => "cast";
    /// `instance?`
    INSTANCE => "instance?";
    /// `vector`
    VECTOR => "vector";
    /// `list`
    LIST => "list";
    /// `set`
    SET => "set";
    /// `hashmap`
    HASHMAP => "hashmap";
    /// `ns`
    NS => "ns";
    /// `&`, introducing a rest parameter
    AMPERSAND => "&";
}

/// `entmoot.core/*ns*`, the slot holding the current namespace name.
pub static NS_SLOT: Lazy<Symbol> = Lazy::new(|| Symbol::qualified(CORE_NS, "*ns*"));
