//! End-to-end tests: routes composed by the router, dispatched through the
//! app, with the error reporter installed as the terminal handler pair.

use gantry::*;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn install_reporter(app: &mut App) {
    ErrorReporter::middleware(ErrorDefinitions::new(), ReporterOptions::default())(app);
}

fn install_reporter_with_tracker(app: &mut App, tracker: Arc<dyn ErrorTracker>) {
    ErrorReporter::middleware(
        ErrorDefinitions::new(),
        ReporterOptions {
            tracker: Some(tracker),
            production: false,
        },
    )(app);
}

fn body(response: &HttpResponse) -> Value {
    serde_json::from_slice(&response.body).unwrap()
}

struct CountingTracker {
    captures: Mutex<Vec<(Severity, u16)>>,
}

impl CountingTracker {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            captures: Mutex::new(Vec::new()),
        })
    }

    fn count(&self) -> usize {
        self.captures.lock().unwrap().len()
    }
}

impl ErrorTracker for CountingTracker {
    fn capture(&self, error: &HttpError, context: &TrackerContext) {
        self.captures
            .lock()
            .unwrap()
            .push((context.severity, error.status));
    }
}

fn status_controller() -> Arc<dyn Controller> {
    Arc::new(
        ControllerBuilder::new()
            .get(
                "/status",
                handler_fn(|_req| async {
                    Ok(HttpResponse::success(&json!({ "status": "ok" })))
                }),
            )
            .finalize(Some("/test"), Vec::new()),
    )
}

fn controllers_of(pairs: Vec<(&str, Arc<dyn Controller>)>) -> ControllerMap {
    pairs
        .into_iter()
        .map(|(name, ctrl)| (name.to_string(), ctrl))
        .collect()
}

#[tokio::test]
async fn test_controller_route_end_to_end() {
    let controllers = controllers_of(vec![("status", status_controller())]);
    let mut app =
        Router::build(controllers, RoutesSource::None, RouterOptions::default()).unwrap();
    install_reporter(&mut app);

    let response = app.handle(HttpRequest::new("GET", "/test/status")).await;
    assert_eq!(response.status, 200);
    assert_eq!(body(&response), json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_explicit_route_table_end_to_end() {
    let routes = MethodRouteTable::new().get(
        "/",
        RouteEntry::new(handler_fn(|_req| async {
            Ok(HttpResponse::success(&json!({ "test": "ok" })))
        })),
    );
    let mut app =
        Router::build(ControllerMap::new(), routes, RouterOptions::default()).unwrap();
    install_reporter(&mut app);

    let response = app.handle(HttpRequest::new("GET", "/")).await;
    assert_eq!(response.status, 200);
    assert_eq!(body(&response), json!({ "test": "ok" }));
}

#[tokio::test]
async fn test_explicit_routes_win_over_controller_routes() {
    let controllers = controllers_of(vec![("status", status_controller())]);
    let routes = MethodRouteTable::new().get(
        "/test/status",
        RouteEntry::new(handler_fn(|_req| async {
            Ok(HttpResponse::success(&json!({ "source": "explicit" })))
        })),
    );
    let mut app = Router::build(controllers, routes, RouterOptions::default()).unwrap();
    install_reporter(&mut app);

    let response = app.handle(HttpRequest::new("GET", "/test/status")).await;
    assert_eq!(body(&response)["source"], "explicit");
}

#[tokio::test]
async fn test_base_filters_run_before_method_filters() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let recording = |tag: &'static str, order: Arc<Mutex<Vec<&'static str>>>| {
        filter_fn(move |req: HttpRequest, next: Next| {
            let order = order.clone();
            async move {
                order.lock().unwrap().push(tag);
                next(req).await
            }
        })
    };

    let base = recording("base", order.clone());
    let own = recording("method", order.clone());
    let controller_order = order.clone();

    let controller: Arc<dyn Controller> = Arc::new(
        ControllerBuilder::new()
            .route(
                Method::Get,
                "/guarded",
                vec![FilterRef::Inline(own)],
                handler_fn(move |_req| {
                    let order = controller_order.clone();
                    async move {
                        order.lock().unwrap().push("controller");
                        Ok(HttpResponse::ok())
                    }
                }),
            )
            .finalize(None, vec![FilterRef::Inline(base)]),
    );

    let mut app = Router::build(
        controllers_of(vec![("guarded", controller)]),
        RoutesSource::None,
        RouterOptions::default(),
    )
    .unwrap();
    install_reporter(&mut app);

    let response = app.handle(HttpRequest::new("GET", "/guarded")).await;
    assert_eq!(response.status, 200);
    assert_eq!(*order.lock().unwrap(), vec!["base", "method", "controller"]);
}

#[tokio::test]
async fn test_failing_controller_reaches_reporter_exactly_once() {
    let tracker = CountingTracker::new();
    let routes = MethodRouteTable::new().get(
        "/fail",
        RouteEntry::new(handler_fn(|_req| async {
            Err(Error::foreign("driver disconnected"))
        })),
    );
    let mut app =
        Router::build(ControllerMap::new(), routes, RouterOptions::default()).unwrap();
    install_reporter_with_tracker(&mut app, tracker.clone());

    let response = app.handle(HttpRequest::new("GET", "/fail")).await;
    assert_eq!(response.status, 500);
    assert_eq!(tracker.count(), 1);
}

#[tokio::test]
async fn test_panicking_controller_reaches_reporter_exactly_once() {
    let tracker = CountingTracker::new();
    let routes = MethodRouteTable::new().get(
        "/panic",
        RouteEntry::new(handler_fn(|_req| async { panic!("controller blew up") })),
    );
    let mut app =
        Router::build(ControllerMap::new(), routes, RouterOptions::default()).unwrap();
    install_reporter_with_tracker(&mut app, tracker.clone());

    let response = app.handle(HttpRequest::new("GET", "/panic")).await;
    assert_eq!(response.status, 500);
    assert!(
        body(&response)["message"]
            .as_str()
            .unwrap()
            .contains("controller blew up")
    );
    assert_eq!(tracker.count(), 1);
}

#[tokio::test]
async fn test_unmatched_request_hits_not_found_handler() {
    let routes = MethodRouteTable::new().get(
        "/exists",
        RouteEntry::new(handler_fn(|_req| async { Ok(HttpResponse::ok()) })),
    );
    let mut app =
        Router::build(ControllerMap::new(), routes, RouterOptions::default()).unwrap();
    install_reporter(&mut app);

    let response = app.handle(HttpRequest::new("POST", "/does-not-exist")).await;
    assert_eq!(response.status, 404);
    let body = body(&response);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .to_lowercase()
            .contains("not found")
    );
    assert!(!body["stackId"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_http_error_fidelity() {
    let routes = MethodRouteTable::new().get(
        "/forbidden",
        RouteEntry::new(handler_fn(|_req| async {
            Err(Error::from(HttpError::new("X", 403, json!({ "test": "ok" }))))
        })),
    );
    let mut app =
        Router::build(ControllerMap::new(), routes, RouterOptions::default()).unwrap();
    install_reporter(&mut app);

    let response = app.handle(HttpRequest::new("GET", "/forbidden")).await;
    assert_eq!(response.status, 403);
    let body = body(&response);
    assert!(body["message"].as_str().unwrap().contains("X"));
    assert_eq!(body["details"]["test"], "ok");
    assert!(!body["stackId"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_filter_that_never_continues_leaves_request_pending() {
    let gate = filter_fn(|req: HttpRequest, next: Next| async move {
        if req.query("token").is_some() {
            next(req).await
        } else {
            std::future::pending().await
        }
    });

    let routes = MethodRouteTable::new().get(
        "/gated",
        RouteEntry::new(handler_fn(|_req| async { Ok(HttpResponse::ok()) }))
            .with_filters(vec![FilterRef::Inline(gate)]),
    );
    let mut app =
        Router::build(ControllerMap::new(), routes, RouterOptions::default()).unwrap();
    install_reporter(&mut app);

    let allowed = app.handle(HttpRequest::new("GET", "/gated?token=1")).await;
    assert_eq!(allowed.status, 200);

    let pending = tokio::time::timeout(
        Duration::from_millis(50),
        app.handle(HttpRequest::new("GET", "/gated")),
    )
    .await;
    assert!(pending.is_err());
}

#[test]
fn test_empty_configuration_fails_before_binding() {
    let err = Router::build(
        ControllerMap::new(),
        RoutesSource::None,
        RouterOptions::default(),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Could not initialize the router without routes or controllers"
    );
}

#[tokio::test]
async fn test_named_resolution_is_idempotent() {
    let mut options = RouterOptions::default();
    options.controllers.register_handler(
        "echo",
        handler_fn(|req| async move {
            Ok(HttpResponse::success(&json!({ "path": req.path })))
        }),
    );

    let routes = MethodRouteTable::new()
        .get("/a", RouteEntry::new("echo"))
        .get("/b", RouteEntry::new("echo"));

    let mut app = Router::build(ControllerMap::new(), routes, options).unwrap();
    install_reporter(&mut app);

    let a = app.handle(HttpRequest::new("GET", "/a")).await;
    let b = app.handle(HttpRequest::new("GET", "/b")).await;
    assert_eq!(a.status, 200);
    assert_eq!(b.status, 200);
    assert_eq!(body(&a)["path"], "/a");
    assert_eq!(body(&b)["path"], "/b");
}
