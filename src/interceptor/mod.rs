use crate::exception::Exception;
use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use std::future::Future;
use std::pin::Pin;

pub mod layer;

pub use layer::{InterceptorLayer, InterceptorMiddleware};

/// standard return type for Interceptors
pub type InterceptorResult = Result<Response, Exception>;

type BoxedRun =
    Box<dyn FnOnce(Request<Body>) -> Pin<Box<dyn Future<Output = InterceptorResult> + Send>> + Send>;

/// Represents the next handler in the chain
pub struct Next {
    run: BoxedRun,
}

impl Next {
    /// Create a new Next handler
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Request<Body>) -> Pin<Box<dyn Future<Output = InterceptorResult> + Send>>
            + Send
            + 'static,
    {
        Self { run: Box::new(f) }
    }

    /// Execute the next handler
    pub async fn run(self, request: Request<Body>) -> InterceptorResult {
        (self.run)(request).await
    }
}

/// The Interceptor trait
///
/// Interceptors can inspect/modify the request before it reaches the handler,
/// and inspect/modify the response after the handler returns. Returning `Err`
/// hands the exception to the layer's exception filter.
///
/// # Example
/// ```
/// use api_boilerplate::interceptor::{Interceptor, InterceptorResult, Next};
/// use api_boilerplate::async_trait;
/// use axum::{body::Body, http::Request};
///
/// struct RequestIdInterceptor;
///
/// #[async_trait]
/// impl Interceptor for RequestIdInterceptor {
///     async fn intercept(&self, req: Request<Body>, next: Next) -> InterceptorResult {
///         let mut res = next.run(req).await?;
///         res.headers_mut().insert("x-request-id", "42".parse().unwrap());
///         Ok(res)
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult;
}
