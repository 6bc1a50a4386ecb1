// Named filter, controller, and route-table registries
//
// String references in route tables resolve through these explicit
// registries instead of runtime module loading. Resolution distinguishes
// "not registered" (typed error naming the reference) from "registered but
// its factory failed" (the factory's own error, surfaced unchanged).

use crate::controller::MethodRouteTable;
use crate::error::ConfigError;
use crate::middleware::{Filter, HandlerFn};
use std::collections::HashMap;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

type FilterFactory = Box<dyn Fn() -> Result<Arc<dyn Filter>, BoxError> + Send + Sync>;
type HandlerFactory = Box<dyn Fn() -> Result<HandlerFn, BoxError> + Send + Sync>;
type RouteTableFactory = Box<dyn Fn() -> Result<MethodRouteTable, BoxError> + Send + Sync>;

/// Named filters, populated at startup.
#[derive(Default)]
pub struct FilterRegistry {
    entries: HashMap<String, FilterFactory>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory that builds the filter on every resolution.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn Filter>, BoxError> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Box::new(factory));
    }

    /// Register an already-built filter under a name.
    pub fn register_filter(&mut self, name: impl Into<String>, filter: Arc<dyn Filter>) {
        self.register(name, move || Ok(filter.clone()));
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Filter>, ConfigError> {
        match self.entries.get(name) {
            None => Err(ConfigError::FilterNotFound(name.to_string())),
            Some(factory) => factory().map_err(ConfigError::Init),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

/// Named controller handlers, populated at startup.
#[derive(Default)]
pub struct ControllerRegistry {
    entries: HashMap<String, HandlerFactory>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<HandlerFn, BoxError> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Box::new(factory));
    }

    pub fn register_handler(&mut self, name: impl Into<String>, handler: HandlerFn) {
        self.register(name, move || Ok(handler.clone()));
    }

    pub fn resolve(&self, name: &str) -> Result<HandlerFn, ConfigError> {
        match self.entries.get(name) {
            None => Err(ConfigError::ControllerNotFound(name.to_string())),
            Some(factory) => factory().map_err(ConfigError::Init),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

/// Named route tables, the registry form of "routes given as a module path".
#[derive(Default)]
pub struct RouteTableRegistry {
    entries: HashMap<String, RouteTableFactory>,
}

impl RouteTableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<MethodRouteTable, BoxError> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Box::new(factory));
    }

    pub fn resolve(&self, name: &str) -> Result<MethodRouteTable, ConfigError> {
        match self.entries.get(name) {
            None => Err(ConfigError::RouteTableNotFound(name.to_string())),
            Some(factory) => factory().map_err(ConfigError::Init),
        }
    }
}
