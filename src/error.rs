//! Error types for binding and resolution

use crate::key::{Identifier, TypeKey};
use thiserror::Error;

/// Errors that can occur while binding or resolving
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    /// No binding matches the requested type and identifier
    #[error("No binding found for {type_name}{}", describe_id(.identifier))]
    NoBindingFound {
        type_name: &'static str,
        identifier: Option<Identifier>,
    },

    /// A single-instance resolve matched several bindings
    #[error("Ambiguous binding for {type_name}{}: {candidates} candidates match", describe_id(.identifier))]
    AmbiguousBinding {
        type_name: &'static str,
        identifier: Option<Identifier>,
        candidates: usize,
    },

    /// A type was re-entered while it was still being constructed
    #[error("Circular dependency detected: {path}")]
    CircularDependency {
        type_name: &'static str,
        path: String,
    },

    /// The binding has no way to produce an instance
    #[error("No injectable constructor for {type_name}")]
    NoInjectableConstructor { type_name: &'static str },

    /// Batch binding received type and strategy lists of different lengths
    #[error("Arity mismatch: {types} types but {strategies} strategies")]
    ArityMismatch { types: usize, strategies: usize },

    /// The container was disposed
    #[error("Container has been disposed")]
    ContainerDisposed,

    /// A plain resolve hit a factory binding
    #[error("{type_name} is bound as a factory; resolve it with `resolve_factory`")]
    FactoryBinding { type_name: &'static str },

    /// A stored instance did not have the requested type
    #[error("Stored instance of {found} cannot be used as {expected}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A producer or constructor reported a failure
    #[error("Failed to create {type_name}: {reason}")]
    CreationFailed {
        type_name: &'static str,
        reason: String,
    },

    /// An extension lifecycle hook failed
    #[error("Extension {extension} failed: {reason}")]
    Extension {
        extension: &'static str,
        reason: String,
    },
}

fn describe_id(identifier: &Option<Identifier>) -> String {
    match identifier {
        Some(id) => format!(" (identifier `{id}`)"),
        None => String::new(),
    }
}

impl DiError {
    /// Create a NoBindingFound error for a key
    #[inline]
    pub fn no_binding(key: TypeKey, identifier: Option<&Identifier>) -> Self {
        Self::NoBindingFound {
            type_name: key.name(),
            identifier: identifier.cloned(),
        }
    }

    /// Create a CreationFailed error
    #[inline]
    pub fn creation_failed<T: ?Sized + 'static>(reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }

    /// Create an Extension error for extension type `E`
    #[inline]
    pub fn extension<E: ?Sized + 'static>(reason: impl Into<String>) -> Self {
        Self::Extension {
            extension: std::any::type_name::<E>(),
            reason: reason.into(),
        }
    }

    /// True for the "nothing is bound" family of errors
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoBindingFound { .. })
    }
}

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    #[test]
    fn test_messages_name_identifier() {
        let err = DiError::no_binding(TypeKey::of::<Widget>(), Some(&Identifier::from("left")));
        let msg = err.to_string();
        assert!(msg.contains("Widget"));
        assert!(msg.contains("`left`"));

        let err = DiError::no_binding(TypeKey::of::<Widget>(), None);
        assert!(!err.to_string().contains("identifier"));
    }

    #[test]
    fn test_arity_message() {
        let err = DiError::ArityMismatch {
            types: 2,
            strategies: 3,
        };
        assert_eq!(err.to_string(), "Arity mismatch: 2 types but 3 strategies");
    }
}
