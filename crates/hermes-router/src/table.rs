//! Dispatch table construction.
//!
//! [`DispatchTable::build`] walks every unit's exposed descriptors once at
//! startup and produces:
//!
//! - a [`RoutingMatrix`]: unit → verb → operation names, and
//! - [`MiddlewareRequirements`]: (unit, operation) → ordered middleware names.
//!
//! Parameters starting with [`MIDDLEWARE_MARKER`] are middleware references.
//! A reference the catalog cannot resolve aborts the build, so a dangling
//! reference never reaches a running server.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use hermes_core::{DescriptorError, DispatchError, OperationDescriptor, Verb};
use indexmap::IndexMap;
use smallvec::SmallVec;
use thiserror::Error;

use crate::signature::{inspect, MissingCallableError};
use crate::unit::Unit;

/// Prefix marking a parameter as a middleware reference.
pub const MIDDLEWARE_MARKER: &str = "__";

/// Ordered middleware names for one operation.
pub type MiddlewareStack = SmallVec<[String; 4]>;

/// Answers whether a middleware name is registered.
pub trait MiddlewareCatalog {
    /// Returns `true` if `name` resolves to a middleware.
    fn contains(&self, name: &str) -> bool;
}

impl MiddlewareCatalog for HashSet<String> {
    fn contains(&self, name: &str) -> bool {
        HashSet::contains(self, name)
    }
}

impl MiddlewareCatalog for BTreeSet<String> {
    fn contains(&self, name: &str) -> bool {
        BTreeSet::contains(self, name)
    }
}

impl MiddlewareCatalog for [&str] {
    fn contains(&self, name: &str) -> bool {
        self.iter().any(|n| *n == name)
    }
}

/// Table construction failures. All of them are configuration defects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A descriptor string did not parse.
    #[error("unit '{unit}' has an invalid descriptor: {source}")]
    Descriptor {
        /// Unit name.
        unit: String,
        /// Parse error.
        #[source]
        source: DescriptorError,
    },

    /// A descriptor names an operation the unit never registered.
    #[error(transparent)]
    MissingCallable(#[from] MissingCallableError),

    /// A marker parameter has no middleware behind it.
    #[error("Middleware {name} not found in repository (required by {unit}.{operation})")]
    UnresolvedMiddleware {
        /// Unit name.
        unit: String,
        /// Operation name.
        operation: String,
        /// The unresolved middleware name.
        name: String,
    },

    /// Two units share a name.
    #[error("unit '{0}' is registered more than once")]
    DuplicateUnit(String),
}

impl From<TableError> for DispatchError {
    fn from(err: TableError) -> Self {
        DispatchError::configuration(err.to_string())
    }
}

/// unit → verb → operation names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingMatrix {
    units: IndexMap<String, IndexMap<Verb, Vec<String>>>,
}

impl RoutingMatrix {
    fn insert(&mut self, unit: &str, descriptor: &OperationDescriptor) {
        let names = self
            .units
            .entry(unit.to_string())
            .or_default()
            .entry(descriptor.verb)
            .or_default();
        if !names.contains(&descriptor.operation) {
            names.push(descriptor.operation.clone());
        }
    }

    /// Whether the unit exposes anything.
    #[must_use]
    pub fn contains_unit(&self, unit: &str) -> bool {
        self.units.contains_key(unit)
    }

    /// Operation names exposed by `unit` under `verb`.
    #[must_use]
    pub fn operations(&self, unit: &str, verb: Verb) -> &[String] {
        self.units
            .get(unit)
            .and_then(|verbs| verbs.get(&verb))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Whether `(unit, verb, operation)` is a legal call.
    #[must_use]
    pub fn allows(&self, unit: &str, verb: Verb, operation: &str) -> bool {
        self.operations(unit, verb).iter().any(|op| op == operation)
    }

    /// Unit names in load order.
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }
}

/// (unit, operation) → ordered middleware names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiddlewareRequirements {
    stacks: IndexMap<String, IndexMap<String, MiddlewareStack>>,
}

impl MiddlewareRequirements {
    /// Middleware for an operation; empty when it needs none.
    #[must_use]
    pub fn get(&self, unit: &str, operation: &str) -> &[String] {
        self.stacks
            .get(unit)
            .and_then(|ops| ops.get(operation))
            .map_or(&[][..], |stack| stack.as_slice())
    }

    /// Every middleware name referenced anywhere.
    #[must_use]
    pub fn referenced(&self) -> BTreeSet<&str> {
        self.stacks
            .values()
            .flat_map(IndexMap::values)
            .flat_map(|stack| stack.iter().map(String::as_str))
            .collect()
    }
}

/// A resolved call target.
#[derive(Debug, Clone)]
pub struct Route<'a> {
    /// The target unit.
    pub unit: &'a Arc<Unit>,
    /// Operation name.
    pub operation: &'a str,
    /// Middleware to run before the operation.
    pub middleware: &'a [String],
}

/// Routing matrix, middleware requirements and the units behind them.
///
/// Built once, then shared read-only by every dispatch front.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    routing: RoutingMatrix,
    requirements: MiddlewareRequirements,
    units: IndexMap<String, Arc<Unit>>,
}

impl DispatchTable {
    /// Builds the table, failing on the first configuration defect.
    pub fn build<I, C>(units: I, catalog: &C) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = Arc<Unit>>,
        C: MiddlewareCatalog + ?Sized,
    {
        let mut table = Self::default();

        for unit in units {
            let unit_name = unit.name().to_string();
            if table.units.contains_key(&unit_name) {
                return Err(TableError::DuplicateUnit(unit_name));
            }
            tracing::info!(unit = %unit_name, operations = unit.exposed().len(), "loading unit");

            for raw in unit.exposed() {
                let descriptor =
                    OperationDescriptor::parse(raw).map_err(|source| TableError::Descriptor {
                        unit: unit_name.clone(),
                        source,
                    })?;
                table.routing.insert(&unit_name, &descriptor);

                let params = inspect(
                    &unit_name,
                    &descriptor.operation,
                    unit.signature(&descriptor.operation),
                )?;
                let stack = resolve_stack(&unit_name, &descriptor.operation, &params, catalog)?;
                tracing::debug!(
                    unit = %unit_name,
                    descriptor = %descriptor,
                    params = ?params,
                    middleware = ?stack.as_slice(),
                    "registered operation"
                );
                table
                    .requirements
                    .stacks
                    .entry(unit_name.clone())
                    .or_default()
                    .insert(descriptor.operation.clone(), stack);
            }

            table.units.insert(unit_name, unit);
        }

        Ok(table)
    }

    /// The routing matrix.
    #[must_use]
    pub const fn routing(&self) -> &RoutingMatrix {
        &self.routing
    }

    /// The middleware requirements.
    #[must_use]
    pub const fn requirements(&self) -> &MiddlewareRequirements {
        &self.requirements
    }

    /// A loaded unit by name.
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&Arc<Unit>> {
        self.units.get(name)
    }

    /// Number of loaded units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if no units are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Resolves an HTTP-style call, or returns the routing error to report.
    pub fn resolve<'a>(
        &'a self,
        unit: &str,
        verb: Option<Verb>,
        operation: &'a str,
    ) -> Result<Route<'a>, DispatchError> {
        let (unit_name, target) = self
            .units
            .get_key_value(unit)
            .filter(|_| self.routing.contains_unit(unit))
            .ok_or_else(|| DispatchError::unit_not_found(unit))?;
        let allowed = verb.is_some_and(|verb| self.routing.allows(unit, verb, operation));
        if !allowed {
            return Err(DispatchError::operation_not_found(unit, operation));
        }
        Ok(Route {
            unit: target,
            operation,
            middleware: self.requirements.get(unit_name, operation),
        })
    }
}

fn resolve_stack<C>(
    unit: &str,
    operation: &str,
    params: &[String],
    catalog: &C,
) -> Result<MiddlewareStack, TableError>
where
    C: MiddlewareCatalog + ?Sized,
{
    let mut stack = MiddlewareStack::new();
    for param in params.iter().filter(|p| p.starts_with(MIDDLEWARE_MARKER)) {
        if !catalog.contains(param) {
            return Err(TableError::UnresolvedMiddleware {
                unit: unit.to_string(),
                operation: operation.to_string(),
                name: param.clone(),
            });
        }
        if !stack.contains(param) {
            stack.push(param.clone());
        }
    }
    Ok(stack)
}
