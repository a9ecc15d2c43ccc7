//! Host interop boundary
//!
//! The compiler never reflects on host values itself. Interop nodes hand
//! already-evaluated arguments to an [`Interop`] implementation, which
//! resolves a member by name and argument count and invokes it.

mod host;

pub use host::{HostInterop, HostType};

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::value::Value;

/// Handle to a host type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    name: Arc<str>,
}

impl TypeRef {
    /// Create a handle for the type called `name`.
    pub fn new(name: impl AsRef<str>) -> Self {
        TypeRef {
            name: Arc::from(name.as_ref()),
        }
    }

    /// The type's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.name)
    }
}

/// The native call layer the compiler delegates to.
pub trait Interop: Send + Sync {
    /// Resolve a type by name.
    fn resolve_type(&self, name: &str) -> Option<TypeRef>;

    /// Call a static member of `ty`.
    fn invoke_static(&self, ty: &TypeRef, member: &str, args: &[Value]) -> Result<Value>;

    /// Call a member on `target`.
    fn invoke_instance(&self, target: &Value, member: &str, args: &[Value]) -> Result<Value>;

    /// Whether `value` is an instance of `ty`.
    fn instance_of(&self, ty: &TypeRef, value: &Value) -> bool;

    /// Convert `value` to `ty`, failing when no conversion exists.
    fn cast(&self, ty: &TypeRef, value: Value) -> Result<Value>;
}

/// Whether a symbol name could name a type: the last dotted segment starts
/// with an uppercase letter.
pub fn maybe_type_name(name: &str) -> bool {
    name.rsplit('.')
        .next()
        .and_then(|segment| segment.chars().next())
        .map(char::is_uppercase)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maybe_type_name() {
        assert!(maybe_type_name("String"));
        assert!(maybe_type_name("java.lang.Math"));
        assert!(!maybe_type_name("s"));
        assert!(!maybe_type_name("foo.bar"));
        assert!(!maybe_type_name(""));
    }
}
