//! Middleware registry.
//!
//! Maps middleware names (`__shortToken`, `__device`, …) to factories. The
//! registry is the catalog the dispatch table resolves marker parameters
//! against; [`MiddlewareRegistry::instantiate`] then builds every middleware
//! once from the shared context.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use hermes_core::{DispatchError, InjectionError, SharedContext};
use hermes_router::MiddlewareCatalog;
use indexmap::IndexMap;
use thiserror::Error;

use crate::bolt::Bolt;
use crate::middleware::Middleware;

/// Builds a middleware from the shared context.
pub type MiddlewareFactory =
    Arc<dyn Fn(&SharedContext) -> Result<Arc<dyn Middleware>, InjectionError> + Send + Sync>;

/// Failure to build a middleware.
#[derive(Debug, Clone, Error)]
#[error("middleware {name} could not be built: {source}")]
pub struct RegistryError {
    /// Middleware name.
    pub name: String,
    /// Missing dependency.
    #[source]
    pub source: InjectionError,
}

impl From<RegistryError> for DispatchError {
    fn from(err: RegistryError) -> Self {
        DispatchError::configuration(err.to_string())
    }
}

/// Name → factory.
#[derive(Default, Clone)]
pub struct MiddlewareRegistry {
    factories: IndexMap<String, MiddlewareFactory>,
}

impl MiddlewareRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&SharedContext) -> Result<Arc<dyn Middleware>, InjectionError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Registers a ready-made middleware.
    pub fn register_instance(
        &mut self,
        name: impl Into<String>,
        middleware: Arc<dyn Middleware>,
    ) -> &mut Self {
        self.register(name, move |_| Ok(Arc::clone(&middleware)))
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Number of registered middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Builds every registered middleware.
    pub fn instantiate(&self, ctx: &SharedContext) -> Result<MiddlewareSet, RegistryError> {
        let mut stages = HashMap::with_capacity(self.factories.len());
        for (name, factory) in &self.factories {
            let middleware = factory(ctx).map_err(|source| RegistryError {
                name: name.clone(),
                source,
            })?;
            tracing::debug!(middleware = %name, "middleware ready");
            stages.insert(name.clone(), middleware);
        }
        Ok(MiddlewareSet { stages })
    }
}

impl MiddlewareCatalog for MiddlewareRegistry {
    fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistry")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Built middleware, shared read-only by every request.
#[derive(Clone, Default)]
pub struct MiddlewareSet {
    stages: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareSet {
    /// A built middleware by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Middleware>> {
        self.stages.get(name)
    }

    /// Prepares a bolt for an operation's stack.
    ///
    /// Stacks come from a dispatch table built against the same registry, so
    /// a miss here means the table and set are out of sync.
    pub fn bolt(&self, names: &[String]) -> Result<Bolt, DispatchError> {
        names
            .iter()
            .map(|name| {
                self.stages
                    .get(name)
                    .map(|mw| (name.clone(), Arc::clone(mw)))
                    .ok_or_else(|| {
                        DispatchError::configuration(format!("middleware {name} is not built"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Bolt::new)
    }
}

impl MiddlewareCatalog for MiddlewareSet {
    fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }
}

impl fmt::Debug for MiddlewareSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.stages.keys().collect();
        names.sort();
        f.debug_struct("MiddlewareSet").field("names", &names).finish()
    }
}
