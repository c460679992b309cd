//! Installing the error and CORS handling on a router
//!
//! ```rust,no_run
//! use api_boilerplate::prelude::*;
//!
//! async fn show_user(ApiPath(id): ApiPath<u64>) -> Result<ApiResponse<Value>, Exception> {
//!     Err(RecordNotFound::new("User").with_id(id).into())
//! }
//!
//! # fn build() -> api_boilerplate::Result<Router> {
//! let boilerplate = ApiBoilerplate::new().dumb_wrapping("user")?.enable_cors();
//! let router: Router = Router::new()
//!     .route("/users/{id}", axum::routing::get(show_user))
//!     .api_boilerplate(&boilerplate);
//! # Ok(router)
//! # }
//! ```

use crate::config::BoilerplateConfig;
use crate::cors::{CorsLayer, CorsMiddleware};
use crate::error::Result;
use crate::exception::ExceptionFilter;
use crate::interceptor::{Interceptor, InterceptorLayer, InterceptorMiddleware};
use crate::wrapping::DumbWrapping;
use axum::Router;
use std::sync::Arc;
use tower::Layer;

/// Per-controller API behavior
///
/// Errors are always classified into JSON error responses and CORS headers are
/// always stamped. Parameter wrapping is opt-in.
#[derive(Clone)]
pub struct ApiBoilerplate {
    filter: Option<Arc<dyn ExceptionFilter>>,
    wrapping: Option<DumbWrapping>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Default for ApiBoilerplate {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiBoilerplate {
    pub fn new() -> Self {
        Self {
            filter: None,
            wrapping: None,
            interceptors: Vec::new(),
        }
    }

    pub fn from_config(config: &BoilerplateConfig) -> Result<Self> {
        let mut boilerplate = Self::new();
        if config.wrap_key.is_some() {
            boilerplate.wrapping = Some(DumbWrapping::from_config(config)?);
        }
        Ok(boilerplate)
    }

    /// Nest every body parameter under `key`
    pub fn dumb_wrapping(self, key: impl Into<String>) -> Result<Self> {
        Ok(self.with_wrapping(DumbWrapping::new(key)?))
    }

    pub fn with_wrapping(mut self, wrapping: DumbWrapping) -> Self {
        self.wrapping = Some(wrapping);
        self
    }

    /// CORS headers are already stamped on every response; this only states intent.
    pub fn enable_cors(self) -> Self {
        self
    }

    /// Replace the default `ApiExceptionFilter` for every error on these routes
    pub fn with_filter<F: ExceptionFilter>(mut self, filter: F) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Run an extra interceptor after parameter wrapping
    pub fn interceptor<I: Interceptor>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn wrapping(&self) -> Option<&DumbWrapping> {
        self.wrapping.as_ref()
    }

    pub fn layer(&self) -> ApiBoilerplateLayer {
        let mut interceptors: Vec<Arc<dyn Interceptor>> = Vec::new();
        if let Some(wrapping) = &self.wrapping {
            interceptors.push(Arc::new(wrapping.clone()));
        }
        interceptors.extend(self.interceptors.iter().cloned());

        let mut layer = InterceptorLayer::new(interceptors);
        if let Some(filter) = &self.filter {
            layer = layer.with_filter(Arc::clone(filter));
        }

        ApiBoilerplateLayer {
            cors: CorsLayer::new(),
            interceptors: layer,
        }
    }
}

/// Tower Layer: interceptors and exception filter inside, CORS stamping outside
#[derive(Clone)]
pub struct ApiBoilerplateLayer {
    cors: CorsLayer,
    interceptors: InterceptorLayer,
}

impl<S> Layer<S> for ApiBoilerplateLayer {
    type Service = CorsMiddleware<InterceptorMiddleware<S>>;

    fn layer(&self, inner: S) -> Self::Service {
        self.cors.layer(self.interceptors.layer(inner))
    }
}

pub trait RouterExt {
    /// Install the boilerplate on every route of this router
    fn api_boilerplate(self, boilerplate: &ApiBoilerplate) -> Self;
}

impl<S> RouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn api_boilerplate(self, boilerplate: &ApiBoilerplate) -> Self {
        self.layer(boilerplate.layer())
    }
}
