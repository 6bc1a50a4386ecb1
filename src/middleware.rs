// Filters and the request-processing chain
//
// A filter is a guard run before the controller. It receives the request and
// a continuation; it may pass the request on, short-circuit with its own
// response or error, or suspend without ever continuing, which leaves the
// request pending and gates everything behind it.

use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed response future used throughout the dispatch path.
pub type BoxFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// The continuation handed to a filter.
pub type Next = Box<dyn FnOnce(HttpRequest) -> BoxFuture + Send>;

/// Type alias for terminal controller functions.
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> BoxFuture + Send + Sync>;

/// Guard middleware run ahead of a controller.
#[async_trait]
pub trait Filter: Send + Sync {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error>;
}

/// Wrap an async function as a controller handler.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

struct FnFilter<F>(F);

#[async_trait]
impl<F, Fut> Filter for FnFilter<F>
where
    F: Fn(HttpRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        (self.0)(req, next).await
    }
}

/// Wrap an async closure as a filter.
pub fn filter_fn<F, Fut>(f: F) -> Arc<dyn Filter>
where
    F: Fn(HttpRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(FnFilter(f))
}

/// Executor for an ordered filter chain terminating in a controller.
#[derive(Clone)]
pub struct FilterChain {
    filters: Arc<Vec<Arc<dyn Filter>>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self {
            filters: Arc::new(filters),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run the chain: each filter is awaited before the next stage runs,
    /// and the controller only runs after every filter has continued.
    pub async fn apply(
        &self,
        req: HttpRequest,
        handler: HandlerFn,
    ) -> Result<HttpResponse, Error> {
        self.execute_from(0, req, handler).await
    }

    fn execute_from(&self, index: usize, req: HttpRequest, handler: HandlerFn) -> BoxFuture {
        if index >= self.filters.len() {
            handler(req)
        } else {
            let filter = self.filters[index].clone();
            let chain = self.clone();
            let handler_clone = handler.clone();

            Box::pin(async move {
                filter
                    .handle(
                        req,
                        Box::new(move |req| chain.execute_from(index + 1, req, handler_clone)),
                    )
                    .await
            })
        }
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::empty()
    }
}
