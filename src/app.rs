// The application object routes are bound to
//
// This is the boundary collaborator the router registers against: per-verb
// route registration, `:param` path matching, dispatch through the filter
// chain, and two terminal slots — a not-found handler for unmatched
// requests and an error handler for anything the chain surfaces. An
// in-process `handle` drives requests without sockets; `listen` serves
// over HTTP via hyper.

use crate::controller::Method;
use crate::middleware::{FilterChain, HandlerFn};
use crate::{Error, HttpRequest, HttpResponse};
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

type NotFoundHandler =
    Arc<dyn Fn(HttpRequest) -> Pin<Box<dyn Future<Output = HttpResponse> + Send>> + Send + Sync>;
type ErrorHandler = Arc<
    dyn Fn(Error, HttpRequest) -> Pin<Box<dyn Future<Output = HttpResponse> + Send>> + Send + Sync,
>;

struct AppRoute {
    method: Method,
    path: String,
    filters: FilterChain,
    controller: HandlerFn,
}

/// HTTP application holding the bound dispatch table.
#[derive(Default)]
pub struct App {
    routes: Vec<AppRoute>,
    not_found: Option<NotFoundHandler>,
    error_handler: Option<ErrorHandler>,
}

// Handlers are trait objects; summarize with counts and slot occupancy.
impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes.len())
            .field("not_found", &self.not_found.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bound chain under a verb and path.
    pub fn route(&mut self, method: Method, path: &str, filters: FilterChain, controller: HandlerFn) {
        self.routes.push(AppRoute {
            method,
            path: path.to_string(),
            filters,
            controller,
        });
    }

    pub fn get(&mut self, path: &str, filters: FilterChain, controller: HandlerFn) {
        self.route(Method::Get, path, filters, controller);
    }

    pub fn post(&mut self, path: &str, filters: FilterChain, controller: HandlerFn) {
        self.route(Method::Post, path, filters, controller);
    }

    pub fn put(&mut self, path: &str, filters: FilterChain, controller: HandlerFn) {
        self.route(Method::Put, path, filters, controller);
    }

    pub fn delete(&mut self, path: &str, filters: FilterChain, controller: HandlerFn) {
        self.route(Method::Delete, path, filters, controller);
    }

    /// Install the terminal handler for unmatched requests. Terminal
    /// handlers run after every registered route has been considered.
    pub fn use_not_found<F, Fut>(&mut self, handler: F)
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.not_found = Some(Arc::new(move |req| Box::pin(handler(req))));
    }

    /// Install the terminal handler for errors surfaced by a route chain.
    pub fn use_error_handler<F, Fut>(&mut self, handler: F)
    where
        F: Fn(Error, HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.error_handler = Some(Arc::new(move |err, req| Box::pin(handler(err, req))));
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Dispatch one request through the bound table.
    pub async fn handle(&self, mut req: HttpRequest) -> HttpResponse {
        // The request keeps its original URL; matching runs on the bare path.
        let (path, query) = match req.path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (req.path.clone(), None),
        };
        if let Some(query) = query {
            req.query_params = parse_query_string(&query);
        }

        let method = Method::from_verb(&req.method);

        for route in &self.routes {
            if Some(route.method) != method {
                continue;
            }
            let Some(params) = match_path(&route.path, &path) else {
                continue;
            };
            req.path_params = params;

            // Kept for the error handler; the chain consumes the request.
            let ctx = req.clone();
            return match route.filters.apply(req, route.controller.clone()).await {
                Ok(response) => response,
                Err(err) => match &self.error_handler {
                    Some(handler) => handler(err, ctx).await,
                    None => default_error_response(&err),
                },
            };
        }

        match &self.not_found {
            Some(handler) => handler(req).await,
            None => default_not_found_response(&req),
        }
    }

    /// Start serving on the given port.
    pub async fn listen(self, port: u16) -> Result<(), Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;

        info!("Server listening on http://{addr}");

        let app = Arc::new(self);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let app = app.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let app = app.clone();
                    async move { serve_request(req, app).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {err:?}");
                }
            });
        }
    }
}

async fn serve_request(
    req: Request<IncomingBody>,
    app: Arc<App>,
) -> Result<Response<Full<bytes::Bytes>>, hyper::Error> {
    let method = req.method().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut request = HttpRequest::new(method, path);

    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.to_string(), value.to_string());
        }
    }

    let body = req.collect().await?.to_bytes();
    request.body = body.to_vec();

    let response = app.handle(request).await;

    let mut builder = Response::builder().status(response.status);
    for (key, value) in response.headers {
        builder = builder.header(key, value);
    }

    let body = Full::new(bytes::Bytes::from(response.body));
    Ok(builder
        .body(body)
        .unwrap_or_else(|_| Response::new(Full::new(bytes::Bytes::new()))))
}

fn default_not_found_response(req: &HttpRequest) -> HttpResponse {
    HttpResponse::not_found()
        .with_json(&json!({
            "message": format!("Not found: {} {}", req.method, req.path),
            "status": 404,
        }))
        .unwrap_or_else(|_| HttpResponse::not_found())
}

fn default_error_response(err: &Error) -> HttpResponse {
    let status = err.status_hint().unwrap_or(500);
    HttpResponse::new(status)
        .with_json(&json!({
            "message": err.to_string(),
            "status": status,
        }))
        .unwrap_or_else(|_| HttpResponse::internal_server_error())
}

/// Match a route path pattern against a request path.
/// Returns Some(params) if matched, None otherwise.
pub fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        if let Some(param_name) = pattern_part.strip_prefix(':') {
            params.insert(param_name.to_string(), path_part.to_string());
        } else if pattern_part != path_part {
            return None;
        }
    }

    Some(params)
}

/// Parse a query string into a map of parameters.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|part| {
            let mut split = part.splitn(2, '=');
            let key = split.next()?;
            let value = split.next().unwrap_or("");
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
