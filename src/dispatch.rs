// Dispatch wrapping for error safety
//
// Every element of a bound route chain is wrapped before registration so
// that no failure escapes: an `Err` return already rides the error channel,
// and a panic (the synchronous-throw analog) is caught and normalized into
// `Error::Panic` on the same channel. The error reporter at the end of the
// chain is the only consumer.

use crate::middleware::{BoxFuture, Filter, HandlerFn, Next};
use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Wrap a controller so panics surface as `Error::Panic` instead of
/// unwinding through the server.
pub fn guard_handler(handler: HandlerFn) -> HandlerFn {
    Arc::new(move |req: HttpRequest| {
        // The handler may panic while constructing its future or while the
        // future is polled; both paths are caught.
        let started = std::panic::catch_unwind(AssertUnwindSafe(|| handler(req)));
        Box::pin(async move {
            match started {
                Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Err(Error::Panic(panic_message(payload))),
                },
                Err(payload) => Err(Error::Panic(panic_message(payload))),
            }
        }) as BoxFuture
    })
}

struct PanicGuard {
    inner: Arc<dyn Filter>,
}

#[async_trait]
impl Filter for PanicGuard {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let started = std::panic::catch_unwind(AssertUnwindSafe(|| self.inner.handle(req, next)));
        match started {
            Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(Error::Panic(panic_message(payload))),
            },
            Err(payload) => Err(Error::Panic(panic_message(payload))),
        }
    }
}

/// Wrap a filter so panics surface as `Error::Panic`.
pub fn guard_filter(filter: Arc<dyn Filter>) -> Arc<dyn Filter> {
    Arc::new(PanicGuard { inner: filter })
}

/// Wrap a whole bound chain, each element independently, preserving order.
pub fn wrap_chain(
    filters: Vec<Arc<dyn Filter>>,
    controller: HandlerFn,
) -> (Vec<Arc<dyn Filter>>, HandlerFn) {
    let filters = filters.into_iter().map(guard_filter).collect();
    (filters, guard_handler(controller))
}
