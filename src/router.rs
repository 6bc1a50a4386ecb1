// Router: merges controller-derived routes with an explicit route table,
// resolves every reference, and binds the result to the application.

use crate::app::App;
use crate::controller::{ControllerMap, FilterRef, HandlerRef, Method, MethodRouteTable};
use crate::dispatch;
use crate::error::ConfigError;
use crate::middleware::{Filter, FilterChain, HandlerFn};
use crate::registry::{ControllerRegistry, FilterRegistry, RouteTableRegistry};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Registries used to resolve named filter/controller/route-table references.
#[derive(Default)]
pub struct RouterOptions {
    pub filters: FilterRegistry,
    pub controllers: ControllerRegistry,
    pub route_tables: RouteTableRegistry,
}

/// Where the explicit route table comes from.
pub enum RoutesSource {
    None,
    Table(MethodRouteTable),
    Named(String),
}

impl From<MethodRouteTable> for RoutesSource {
    fn from(table: MethodRouteTable) -> Self {
        RoutesSource::Table(table)
    }
}

impl From<&str> for RoutesSource {
    fn from(name: &str) -> Self {
        RoutesSource::Named(name.to_string())
    }
}

/// A fully resolved endpoint, ready for registration.
pub struct BoundRoute {
    pub filters: Vec<Arc<dyn Filter>>,
    pub controller: HandlerFn,
}

/// The route composition engine.
///
/// Construction builds the effective table once: controller-derived routes
/// first (base filters prepended, base route path-joined), then the explicit
/// table merged over them, explicit entries winning per verb+path key. All
/// references are resolved eagerly, so a missing filter or controller aborts
/// startup instead of failing a request later.
pub struct Router {
    routes: BTreeMap<Method, BTreeMap<String, BoundRoute>>,
}

// Bound routes hold trait objects; summarize as verb -> paths.
impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (method, paths) in &self.routes {
            map.entry(&method.verb(), &paths.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

impl Router {
    pub fn new(
        controllers: ControllerMap,
        routes: Option<MethodRouteTable>,
        options: &RouterOptions,
    ) -> Result<Self, ConfigError> {
        let no_controllers = controllers.is_empty();
        let no_routes = routes.as_ref().is_none_or(|table| table.is_empty());
        if no_controllers && no_routes {
            return Err(ConfigError::EmptyRouter);
        }

        let mut table = Self::controller_routes(&controllers);
        if let Some(explicit) = routes {
            table.extend_over(explicit);
        }

        let bound = Self::bind(&table, options)?;
        Ok(Self { routes: bound })
    }

    /// Derive the route table contributed by controllers.
    fn controller_routes(controllers: &ControllerMap) -> MethodRouteTable {
        let mut derived = MethodRouteTable::new();

        for (name, controller) in controllers {
            trace!(controller = %name, "collecting controller routes");
            let base_route = controller.base_route().map(str::to_string);
            let base_filters = controller.base_filters();
            let table = controller.routes();

            for method in Method::ALL {
                let Some(paths) = table.routes(method) else {
                    continue;
                };
                for (path, entry) in paths {
                    let mut entry = entry.clone();
                    // Class-level filters run first.
                    if !base_filters.is_empty() {
                        let mut filters = base_filters.clone();
                        filters.extend(entry.filters);
                        entry.filters = filters;
                    }
                    let full_path = match &base_route {
                        Some(base) => join_paths(base, path),
                        None => path.clone(),
                    };
                    derived.insert(method, full_path, entry);
                }
            }
        }

        derived
    }

    /// Resolve every entry of the effective table into a bound route.
    fn bind(
        table: &MethodRouteTable,
        options: &RouterOptions,
    ) -> Result<BTreeMap<Method, BTreeMap<String, BoundRoute>>, ConfigError> {
        let mut bound: BTreeMap<Method, BTreeMap<String, BoundRoute>> = BTreeMap::new();

        for method in Method::ALL {
            let Some(paths) = table.routes(method) else {
                continue;
            };
            for (path, entry) in paths {
                debug!("Registering server route: {} {}", method.verb(), path);

                let controller = Self::resolve_controller(&entry.controller, path, options)?;
                let filters = Self::resolve_filters(&entry.filters, method, path, options)?;

                bound
                    .entry(method)
                    .or_default()
                    .insert(path.clone(), BoundRoute { filters, controller });
            }
        }

        Ok(bound)
    }

    fn resolve_controller(
        controller: &HandlerRef,
        path: &str,
        options: &RouterOptions,
    ) -> Result<HandlerFn, ConfigError> {
        match controller {
            HandlerRef::Inline(handler) => Ok(handler.clone()),
            HandlerRef::Named(name) if name.is_empty() => {
                Err(ConfigError::InvalidController(path.to_string()))
            }
            HandlerRef::Named(name) => options.controllers.resolve(name),
        }
    }

    fn resolve_filters(
        filters: &[FilterRef],
        method: Method,
        path: &str,
        options: &RouterOptions,
    ) -> Result<Vec<Arc<dyn Filter>>, ConfigError> {
        // An empty name can only come from a broken route definition.
        if filters
            .iter()
            .any(|f| matches!(f, FilterRef::Named(name) if name.is_empty()))
        {
            return Err(ConfigError::InvalidFilters {
                verb: method.verb().to_string(),
                path: path.to_string(),
            });
        }

        filters
            .iter()
            .map(|filter| match filter {
                FilterRef::Inline(filter) => Ok(filter.clone()),
                FilterRef::Named(name) => options.filters.resolve(name),
            })
            .collect()
    }

    /// Number of bound endpoints.
    pub fn len(&self) -> usize {
        self.routes.values().map(|paths| paths.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bound(&self, method: Method, path: &str) -> Option<&BoundRoute> {
        self.routes.get(&method)?.get(path)
    }

    /// Attach every bound route to the application, each chain element
    /// independently wrapped for error safety. Verbs bind in fixed order,
    /// paths in sorted order.
    pub fn register(self, app: Option<App>) -> App {
        let mut app = app.unwrap_or_default();
        for (method, paths) in self.routes {
            for (path, route) in paths {
                let (filters, controller) = dispatch::wrap_chain(route.filters, route.controller);
                app.route(method, &path, FilterChain::new(filters), controller);
            }
        }
        app
    }

    /// Build and register in one step.
    pub fn build(
        controllers: ControllerMap,
        routes: impl Into<RoutesSource>,
        options: RouterOptions,
    ) -> Result<App, ConfigError> {
        let routes = match routes.into() {
            RoutesSource::None => None,
            RoutesSource::Table(table) => Some(table),
            RoutesSource::Named(name) => Some(options.route_tables.resolve(&name)?),
        };
        let router = Self::new(controllers, routes, &options)?;
        Ok(router.register(None))
    }
}

/// Join a base route with a declared path, normalizing slashes.
pub fn join_paths(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (base.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{path}"),
    }
}
