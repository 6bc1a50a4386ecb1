// Error types: the HTTP error carried to clients, the per-request error
// channel, and startup configuration failures.

use serde_json::{Map, Value, json};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use thiserror::Error as ThisError;
use uuid::Uuid;

/// Arbitrary key/value bag attached to an error.
pub type ErrorDetails = Map<String, Value>;

/// An application error bound for an HTTP response.
///
/// Every instance carries a generated correlation id (`stack_id`) that is
/// included in logs and in the serialized response body, so a client-reported
/// failure can be matched to server-side logs. The message is shaped as
/// `[<status>] <message> (stackId: <id>)`.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub status: u16,
    pub message: String,
    pub stack_id: String,
    pub details: ErrorDetails,
    /// Captured backtrace, when the environment enables capture.
    pub stack: Option<String>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: u16, details: Value) -> Self {
        let stack_id = Uuid::new_v4().to_string();
        let details = match details {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        let backtrace = Backtrace::capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };
        Self {
            status,
            message: format!("[{status}] {} (stackId: {stack_id})", message.into()),
            stack_id,
            details,
            stack,
        }
    }

    /// Backfill the stack trace when wrapping a foreign error that carried one.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Serialize for a response body. The stack is only included when asked
    /// for; production deployments are expected to strip it.
    pub fn to_json(&self, include_stack: bool) -> Value {
        let mut body = json!({
            "status": self.status,
            "message": self.message,
            "stackId": self.stack_id,
            "details": Value::Object(self.details.clone()),
        });
        if include_stack {
            if let Some(stack) = &self.stack {
                body["stack"] = json!(stack);
            }
        }
        body
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// The per-request error channel.
///
/// Controllers and filters fail with this type; the dispatch wrapper
/// guarantees every failure (including panics) reaches it, and the error
/// reporter consumes it exactly once at the end of the chain.
#[derive(ThisError, Debug)]
pub enum Error {
    /// An HTTP condition signaled explicitly by application code.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Foreign-library convention that wraps the real HTTP error in an
    /// inner field. The reporter unwraps it before anything else.
    #[error("{context}")]
    Wrapped { context: String, inner: HttpError },

    /// Any non-HTTP failure bubbling out of a controller or filter.
    #[error("{message}")]
    Foreign {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    /// A panic caught by the dispatch wrapper.
    #[error("handler panicked: {0}")]
    Panic(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn foreign(message: impl Into<String>) -> Self {
        Error::Foreign {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    pub fn foreign_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Error::Foreign {
            message: message.into(),
            code: Some(code.into()),
            status: None,
        }
    }

    /// The HTTP status this error suggests, if it carries one.
    pub fn status_hint(&self) -> Option<u16> {
        match self {
            Error::Http(e) => Some(e.status),
            Error::Wrapped { inner, .. } => Some(inner.status),
            Error::Foreign { status, .. } => *status,
            _ => None,
        }
    }

    /// The application error code, if the error carries one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Foreign { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Configuration-time failures raised while composing the router.
///
/// These abort startup and never reach the error reporter.
#[derive(ThisError, Debug)]
pub enum ConfigError {
    #[error("Could not initialize the router without routes or controllers")]
    EmptyRouter,

    #[error("Filter not found: {0}")]
    FilterNotFound(String),

    #[error("Controller not found: {0}")]
    ControllerNotFound(String),

    #[error("Route table not found: {0}")]
    RouteTableNotFound(String),

    #[error("Controller is not valid for route: {0}")]
    InvalidController(String),

    #[error("Invalid filters for route: {verb} {path}")]
    InvalidFilters { verb: String, path: String },

    /// A registered factory failed during its own initialization. The
    /// original error is surfaced unchanged so authoring bugs keep their
    /// real message instead of being misreported as "not found".
    #[error(transparent)]
    Init(Box<dyn std::error::Error + Send + Sync>),
}
