// Terminal error handling: the two handlers installed last on the app.
//
// `not_found` answers every request no route matched; `unknown_error`
// consumes whatever the filter chain surfaced, normalizes it into an
// `HttpError`, optionally forwards it to an external tracker, logs it with
// its correlation id, and serializes the response. Normalization precedence
// is fixed: a wrapped inner HTTP error wins, then a direct HTTP error, then
// everything else becomes a fresh 500 (or whatever status the error hints).

use crate::app::App;
use crate::error::{Error, HttpError};
use crate::http::{HttpRequest, HttpResponse};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

/// Severity attached to tracker captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Context forwarded to the tracker alongside the captured error.
#[derive(Debug, Clone)]
pub struct TrackerContext {
    pub severity: Severity,
    pub method: String,
    pub url: String,
}

/// External error-tracking sink, in the shape of a capture call per error.
pub trait ErrorTracker: Send + Sync {
    fn capture(&self, error: &HttpError, context: &TrackerContext);
}

/// A known application error code mapped to the response it should produce.
#[derive(Debug, Clone)]
pub struct ErrorDefinition {
    pub status: u16,
    pub message: String,
}

/// Mapping from application error codes to response definitions. Errors
/// carrying a code found here are reported with the defined status and
/// message instead of the raw foreign message.
#[derive(Debug, Clone, Default)]
pub struct ErrorDefinitions {
    map: HashMap<String, ErrorDefinition>,
}

impl ErrorDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(
        mut self,
        code: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        self.map.insert(
            code.into(),
            ErrorDefinition {
                status,
                message: message.into(),
            },
        );
        self
    }

    pub fn get(&self, code: &str) -> Option<&ErrorDefinition> {
        self.map.get(code)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Options for the error reporter.
#[derive(Default)]
pub struct ReporterOptions {
    /// External tracker to forward captured errors to.
    pub tracker: Option<Arc<dyn ErrorTracker>>,
    /// Strip stack traces from response bodies.
    pub production: bool,
}

/// The terminal error-handling pair.
pub struct ErrorReporter {
    definitions: ErrorDefinitions,
    options: ReporterOptions,
}

impl ErrorReporter {
    pub fn new(definitions: ErrorDefinitions, options: ReporterOptions) -> Self {
        Self {
            definitions,
            options,
        }
    }

    /// Produce an installer that registers both terminal handlers on an app.
    /// Call it after every route is bound; the handlers only see requests
    /// and errors nothing else claimed.
    pub fn middleware(
        definitions: ErrorDefinitions,
        options: ReporterOptions,
    ) -> impl FnOnce(&mut App) {
        let reporter = Arc::new(Self::new(definitions, options));
        move |app: &mut App| {
            let not_found = reporter.clone();
            app.use_not_found(move |req| {
                let reporter = not_found.clone();
                async move { reporter.not_found(&req) }
            });
            let unknown = reporter;
            app.use_error_handler(move |err, req| {
                let reporter = unknown.clone();
                async move { reporter.unknown_error(err, &req) }
            });
        }
    }

    /// Handle a request no route matched.
    pub fn not_found(&self, req: &HttpRequest) -> HttpResponse {
        let err = HttpError::new(
            format!(
                "The resource was not found: {} {}",
                req.method,
                req.original_url()
            ),
            404,
            json!({
                "method": req.method,
                "originalUrl": req.original_url(),
            }),
        );
        self.track(&err, Severity::Warning, req);
        warn!(stack_id = %err.stack_id, "{}", err.message);
        self.respond(&err)
    }

    /// Handle an error surfaced by a route chain.
    pub fn unknown_error(&self, error: Error, req: &HttpRequest) -> HttpResponse {
        let server_error = self.normalize(error);
        let severity = if server_error.status >= 500 {
            Severity::Error
        } else {
            Severity::Warning
        };
        self.track(&server_error, severity, req);
        error!(
            stack_id = %server_error.stack_id,
            method = %req.method,
            url = %req.original_url(),
            "{}",
            server_error.message
        );
        self.respond(&server_error)
    }

    fn normalize(&self, error: Error) -> HttpError {
        match error {
            Error::Wrapped { inner, .. } => inner,
            Error::Http(err) => err,
            other => {
                let code = other.code().map(str::to_string);
                if let Some(def) = code.as_deref().and_then(|c| self.definitions.get(c)) {
                    return HttpError::new(
                        def.message.clone(),
                        def.status,
                        json!({ "code": code }),
                    );
                }
                let status = other.status_hint().unwrap_or(500);
                HttpError::new(other.to_string(), status, json!({ "code": code }))
            }
        }
    }

    fn respond(&self, err: &HttpError) -> HttpResponse {
        if !self.options.production {
            return HttpResponse::error(err);
        }
        // Production strips the stack from the body.
        let status = if err.status == 0 { 500 } else { err.status };
        HttpResponse::new(status)
            .with_json(&err.to_json(false))
            .unwrap_or_else(|_| HttpResponse::internal_server_error())
    }

    fn track(&self, err: &HttpError, severity: Severity, req: &HttpRequest) {
        if let Some(tracker) = &self.options.tracker {
            tracker.capture(
                err,
                &TrackerContext {
                    severity,
                    method: req.method.clone(),
                    url: req.original_url().to_string(),
                },
            );
        }
    }
}
