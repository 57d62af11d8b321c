//! Shared context handed to middleware factories and units.
//!
//! Services are registered once while the application is assembled and then
//! resolved by type. The context is built before the dispatch table and is
//! never mutated afterwards; there is no global lookup.
//!
//! ```rust
//! use hermes_core::SharedContext;
//! use std::sync::Arc;
//!
//! struct Secrets {
//!     short: String,
//! }
//!
//! let ctx = SharedContext::new().with(Arc::new(Secrets { short: "s".into() }));
//! let secrets: Arc<Secrets> = ctx.require().unwrap();
//! assert_eq!(secrets.short, "s");
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A service could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to resolve {type_name}: {reason}")]
pub struct InjectionError {
    /// The type name that could not be resolved.
    pub type_name: &'static str,
    /// The reason for the failure.
    pub reason: String,
}

impl InjectionError {
    /// Missing service of type `T`.
    #[must_use]
    pub fn not_registered<T>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            reason: "service not registered".to_string(),
        }
    }
}

/// Typed service registry.
#[derive(Default, Clone)]
pub struct SharedContext {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl SharedContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service, replacing any previous one of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert(TypeId::of::<T>(), service);
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.insert(service);
        self
    }

    /// Resolves a service.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|s| s.clone().downcast::<T>().ok())
    }

    /// Resolves a service or fails.
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectionError> {
        self.get().ok_or_else(InjectionError::not_registered::<T>)
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedContext")
            .field("service_count", &self.services.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Clock(u64);

    #[test]
    fn test_insert_and_get() {
        let mut ctx = SharedContext::new();
        assert!(ctx.is_empty());
        ctx.insert(Arc::new(Clock(7)));
        assert_eq!(ctx.get::<Clock>().unwrap().0, 7);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_require_missing() {
        let ctx = SharedContext::new();
        let err = ctx.require::<Clock>().unwrap_err();
        assert!(err.type_name.contains("Clock"));
        assert!(err.to_string().contains("service not registered"));
    }

    #[test]
    fn test_insert_replaces() {
        let ctx = SharedContext::new()
            .with(Arc::new(Clock(1)))
            .with(Arc::new(Clock(2)));
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.require::<Clock>().unwrap().0, 2);
    }
}
