// Route metadata model
//
// Controllers declare their routes through a two-phase builder: `route()`
// calls accumulate a per-controller table, and the consuming `finalize()`
// attaches the base route and base filters. Sealing the builder is what
// enforces "register method routes before finalizing the controller".

use crate::middleware::{Filter, HandlerFn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The HTTP verbs this layer binds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Fixed binding order.
    pub const ALL: [Method; 4] = [Method::Get, Method::Post, Method::Put, Method::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Delete => "delete",
        }
    }

    /// Uppercase verb, as it appears on the wire and in error messages.
    pub fn verb(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb.to_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }
}

/// A filter reference: inline, or a name resolved through the registry.
#[derive(Clone)]
pub enum FilterRef {
    Inline(Arc<dyn Filter>),
    Named(String),
}

impl From<Arc<dyn Filter>> for FilterRef {
    fn from(filter: Arc<dyn Filter>) -> Self {
        FilterRef::Inline(filter)
    }
}

impl From<&str> for FilterRef {
    fn from(name: &str) -> Self {
        FilterRef::Named(name.to_string())
    }
}

impl From<String> for FilterRef {
    fn from(name: String) -> Self {
        FilterRef::Named(name)
    }
}

/// A controller reference: inline, or a name resolved through the registry.
#[derive(Clone)]
pub enum HandlerRef {
    Inline(HandlerFn),
    Named(String),
}

impl From<HandlerFn> for HandlerRef {
    fn from(handler: HandlerFn) -> Self {
        HandlerRef::Inline(handler)
    }
}

impl From<&str> for HandlerRef {
    fn from(name: &str) -> Self {
        HandlerRef::Named(name.to_string())
    }
}

impl From<String> for HandlerRef {
    fn from(name: String) -> Self {
        HandlerRef::Named(name)
    }
}

/// One bound endpoint: the terminal controller plus its ordered filters.
#[derive(Clone)]
pub struct RouteEntry {
    pub controller: HandlerRef,
    pub filters: Vec<FilterRef>,
}

impl RouteEntry {
    pub fn new(controller: impl Into<HandlerRef>) -> Self {
        Self {
            controller: controller.into(),
            filters: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: Vec<FilterRef>) -> Self {
        self.filters = filters;
        self
    }
}

/// Mapping from verb to path to route entry.
///
/// Paths are case-sensitive and may carry `:param` placeholders. Inserting
/// at an existing verb+path key overwrites, which is what gives explicit
/// routes precedence over controller-derived ones during the merge.
#[derive(Clone, Default)]
pub struct MethodRouteTable {
    tables: BTreeMap<Method, BTreeMap<String, RouteEntry>>,
}

// Entries hold trait objects; summarize as verb -> paths.
impl fmt::Debug for MethodRouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (method, paths) in &self.tables {
            map.entry(&method.verb(), &paths.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

impl MethodRouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: Method, path: impl Into<String>, entry: RouteEntry) {
        self.tables.entry(method).or_default().insert(path.into(), entry);
    }

    /// Builder-style insertion.
    pub fn route(mut self, method: Method, path: impl Into<String>, entry: RouteEntry) -> Self {
        self.insert(method, path, entry);
        self
    }

    pub fn get(self, path: impl Into<String>, entry: RouteEntry) -> Self {
        self.route(Method::Get, path, entry)
    }

    pub fn post(self, path: impl Into<String>, entry: RouteEntry) -> Self {
        self.route(Method::Post, path, entry)
    }

    pub fn put(self, path: impl Into<String>, entry: RouteEntry) -> Self {
        self.route(Method::Put, path, entry)
    }

    pub fn delete(self, path: impl Into<String>, entry: RouteEntry) -> Self {
        self.route(Method::Delete, path, entry)
    }

    pub fn routes(&self, method: Method) -> Option<&BTreeMap<String, RouteEntry>> {
        self.tables.get(&method)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(|paths| paths.is_empty())
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(|paths| paths.len()).sum()
    }

    /// Merge `overrides` into this table, key by key per verb. Entries in
    /// `overrides` win on collision; keys absent from it are kept.
    pub fn extend_over(&mut self, overrides: MethodRouteTable) {
        for (method, paths) in overrides.tables {
            for (path, entry) in paths {
                self.insert(method, path, entry);
            }
        }
    }
}

/// Capability surface of a finalized controller.
pub trait Controller: Send + Sync {
    /// Base route path-joined in front of every declared path.
    fn base_route(&self) -> Option<&str> {
        None
    }

    /// Filters prepended to every method's own filters.
    fn base_filters(&self) -> Vec<FilterRef> {
        Vec::new()
    }

    /// The per-controller routing table accumulated before finalization.
    fn routes(&self) -> MethodRouteTable;
}

/// Controllers keyed by an arbitrary registration name. Keys are ordered so
/// route derivation is deterministic.
pub type ControllerMap = BTreeMap<String, Arc<dyn Controller>>;

/// Two-phase builder for controller route metadata.
pub struct ControllerBuilder {
    table: MethodRouteTable,
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            table: MethodRouteTable::new(),
        }
    }

    /// Register one method route with its own filters.
    pub fn route(
        mut self,
        method: Method,
        path: impl Into<String>,
        filters: Vec<FilterRef>,
        handler: impl Into<HandlerRef>,
    ) -> Self {
        self.table
            .insert(method, path, RouteEntry::new(handler).with_filters(filters));
        self
    }

    pub fn get(self, path: impl Into<String>, handler: impl Into<HandlerRef>) -> Self {
        self.route(Method::Get, path, Vec::new(), handler)
    }

    pub fn post(self, path: impl Into<String>, handler: impl Into<HandlerRef>) -> Self {
        self.route(Method::Post, path, Vec::new(), handler)
    }

    pub fn put(self, path: impl Into<String>, handler: impl Into<HandlerRef>) -> Self {
        self.route(Method::Put, path, Vec::new(), handler)
    }

    pub fn delete(self, path: impl Into<String>, handler: impl Into<HandlerRef>) -> Self {
        self.route(Method::Delete, path, Vec::new(), handler)
    }

    /// Seal the controller, attaching its base route and base filters.
    /// Consumes the builder: no route can be registered afterwards.
    pub fn finalize(
        self,
        base_route: Option<&str>,
        base_filters: Vec<FilterRef>,
    ) -> ControllerRoutes {
        ControllerRoutes {
            base_route: base_route.map(str::to_string),
            base_filters,
            table: self.table,
        }
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A finalized controller produced by [`ControllerBuilder`].
pub struct ControllerRoutes {
    base_route: Option<String>,
    base_filters: Vec<FilterRef>,
    table: MethodRouteTable,
}

impl Controller for ControllerRoutes {
    fn base_route(&self) -> Option<&str> {
        self.base_route.as_deref()
    }

    fn base_filters(&self) -> Vec<FilterRef> {
        self.base_filters.clone()
    }

    fn routes(&self) -> MethodRouteTable {
        self.table.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::handler_fn;
    use crate::{HttpResponse, filter_fn};

    fn noop_handler() -> HandlerFn {
        handler_fn(|_req| async { Ok(HttpResponse::ok()) })
    }

    #[test]
    fn test_method_verbs() {
        assert_eq!(Method::Get.verb(), "GET");
        assert_eq!(Method::from_verb("delete"), Some(Method::Delete));
        assert_eq!(Method::from_verb("PATCH"), None);
    }

    #[test]
    fn test_table_insert_and_overwrite() {
        let mut table = MethodRouteTable::new();
        table.insert(Method::Get, "/a", RouteEntry::new(noop_handler()));
        table.insert(Method::Get, "/a", RouteEntry::new("named"));
        assert_eq!(table.len(), 1);

        let entry = &table.routes(Method::Get).unwrap()["/a"];
        assert!(matches!(&entry.controller, HandlerRef::Named(n) if n == "named"));
    }

    #[test]
    fn test_extend_over_prefers_overrides() {
        let mut base = MethodRouteTable::new()
            .get("/kept", RouteEntry::new("base-kept"))
            .get("/shared", RouteEntry::new("base-shared"));
        let overrides = MethodRouteTable::new().get("/shared", RouteEntry::new("override"));

        base.extend_over(overrides);
        assert_eq!(base.len(), 2);

        let shared = &base.routes(Method::Get).unwrap()["/shared"];
        assert!(matches!(&shared.controller, HandlerRef::Named(n) if n == "override"));
        let kept = &base.routes(Method::Get).unwrap()["/kept"];
        assert!(matches!(&kept.controller, HandlerRef::Named(n) if n == "base-kept"));
    }

    #[test]
    fn test_builder_accumulates_routes() {
        let auth = filter_fn(|req, next| async move { next(req).await });
        let controller = ControllerBuilder::new()
            .get("/status", noop_handler())
            .route(
                Method::Post,
                "/users",
                vec![FilterRef::Inline(auth.clone())],
                noop_handler(),
            )
            .finalize(Some("/api"), vec![FilterRef::Inline(auth)]);

        assert_eq!(controller.base_route(), Some("/api"));
        assert_eq!(controller.base_filters().len(), 1);

        let table = controller.routes();
        assert!(table.routes(Method::Get).unwrap().contains_key("/status"));
        let post = &table.routes(Method::Post).unwrap()["/users"];
        assert_eq!(post.filters.len(), 1);
    }

    #[test]
    fn test_table_debug_lists_verbs_and_paths() {
        let table = MethodRouteTable::new()
            .get("/status", RouteEntry::new(noop_handler()))
            .post("/users", RouteEntry::new("create"));
        let rendered = format!("{table:?}");
        assert!(rendered.contains("GET"));
        assert!(rendered.contains("/status"));
        assert!(rendered.contains("POST"));
        assert!(rendered.contains("/users"));
    }

    #[test]
    fn test_finalize_without_base() {
        let controller = ControllerBuilder::new()
            .get("/", noop_handler())
            .finalize(None, Vec::new());
        assert_eq!(controller.base_route(), None);
        assert!(controller.base_filters().is_empty());
        assert_eq!(controller.routes().len(), 1);
    }
}
