use crate::exception::{BoxError, Exception, ExceptionFilter, RaisedException};
use crate::interceptor::{Interceptor, Next};
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower Layer for invoking a chain of Interceptors
///
/// Errors coming out of the chain, or out of the wrapped service, are turned
/// into responses by the exception filter, so the resulting service never fails.
/// With a custom filter installed, exceptions a handler already rendered are
/// handed to that filter as well.
#[derive(Clone)]
pub struct InterceptorLayer {
    interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
    filter: Option<Arc<dyn ExceptionFilter>>,
}

impl InterceptorLayer {
    /// Layer using the default `ApiExceptionFilter`
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptors: Arc::new(interceptors),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn ExceptionFilter>) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl<S> Layer<S> for InterceptorLayer {
    type Service = InterceptorMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InterceptorMiddleware {
            inner,
            interceptors: Arc::clone(&self.interceptors),
            filter: self.filter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct InterceptorMiddleware<S> {
    inner: S,
    interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
    filter: Option<Arc<dyn ExceptionFilter>>,
}

impl<S> Service<Request<Body>> for InterceptorMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError> + Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // a service that cannot become ready is reported when called
        match self.inner.poll_ready(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(_) => Poll::Ready(Ok(())),
        }
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let interceptors = Arc::clone(&self.interceptors);
        let filter = self.filter.clone();

        // take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            // Base chain: executes inner service
            let mut chain = Next::new(move |req| {
                Box::pin(async move {
                    std::future::poll_fn(|cx| inner.poll_ready(cx))
                        .await
                        .map_err(|e| Exception::from_boxed(e.into()))?;
                    inner
                        .call(req)
                        .await
                        .map_err(|e| Exception::from_boxed(e.into()))
                })
            });

            // Wrap in reverse so the first interceptor runs first
            for interceptor in interceptors.iter().rev() {
                let interceptor = Arc::clone(interceptor);
                let next = chain;
                chain = Next::new(move |req| {
                    Box::pin(async move { interceptor.intercept(req, next).await })
                });
            }

            Ok(match (chain.run(request).await, filter) {
                (Ok(mut response), Some(filter)) => {
                    let raised = response
                        .extensions_mut()
                        .remove::<RaisedException>()
                        .and_then(|raised| raised.take());
                    match raised {
                        Some(exception) => filter.catch(exception),
                        None => response,
                    }
                }
                (Ok(response), None) => response,
                (Err(exception), Some(filter)) => filter.catch(exception),
                (Err(exception), None) => exception.into_response(),
            })
        })
    }
}
