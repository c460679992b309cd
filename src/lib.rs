//! # api-boilerplate
//!
//! JSON error responses and CORS headers for axum applications.
//!
//! Every error raised while handling a request is turned into a JSON response
//! with a fitting status code, and every response leaves with the same
//! permissive CORS headers.
//!
//! ## Features
//!
//! - **Error classification**: validation failures, missing records, mass
//!   assignment and application status errors map to fixed statuses and bodies;
//!   everything else is a logged 500
//! - **CORS**: three fixed `Access-Control-*` headers on success and failure alike
//! - **Response helpers**: `respond_success`, `respond_empty`, `respond_error`
//! - **Extractors**: `ApiJson`, `ApiPath` and `ApiQuery` reject malformed
//!   requests with the same JSON error bodies
//! - **Parameter wrapping**: optionally nest request body parameters under one key
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use api_boilerplate::prelude::*;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! async fn show_user(ApiPath(id): ApiPath<u64>) -> Result<ApiResponse<User>, Exception> {
//!     if id != 1 {
//!         return Err(RecordNotFound::new("User").with_id(id).into());
//!     }
//!     Ok(ApiResponse::success(User { id, name: "Ada".to_string() }))
//! }
//!
//! async fn create_user(ApiJson(params): ApiJson<Value>) -> Result<ApiResponse<Value>, Exception> {
//!     let name = params["object"]["name"].as_str().unwrap_or_default();
//!     if name.is_empty() {
//!         return Err(ValidationError::field("name", "can't be blank").into());
//!     }
//!     Ok(respond_empty(RespondOptions::status(StatusCode::CREATED)))
//! }
//!
//! #[tokio::main]
//! async fn main() -> api_boilerplate::Result<()> {
//!     let boilerplate = ApiBoilerplate::new().dumb_wrapping("object")?.enable_cors();
//!
//!     let app: Router = Router::new()
//!         .route("/users/{id}", axum::routing::get(show_user))
//!         .route("/users", axum::routing::post(create_user))
//!         .api_boilerplate(&boilerplate);
//!
//!     // Serve your app...
//!     # let _ = app;
//!     Ok(())
//! }
//! ```

pub mod boilerplate;
pub mod common;
pub mod config;
pub mod cors;
pub mod error;
pub mod exception;
pub mod extract;
pub mod interceptor;
pub mod wrapping;

// Re-export core types
pub use boilerplate::{ApiBoilerplate, ApiBoilerplateLayer, RouterExt};
pub use common::{ApiResponse, ErrorResponse, RespondOptions};
pub use error::{BoilerplateError, Result};
pub use exception::{ErrorKind, Exception, ExceptionFilter, RaisedException};
pub use extract::{ApiJson, ApiPath, ApiQuery};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use api_boilerplate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::boilerplate::{ApiBoilerplate, RouterExt};
    pub use crate::common::{
        ApiResponse, ErrorResponse, RespondOptions, respond_empty, respond_error, respond_success,
    };
    pub use crate::config::{BoilerplateConfig, ConfigService};
    pub use crate::cors::{CorsHeaders, CorsLayer, apply_cors_headers};
    pub use crate::error::BoilerplateError;
    pub use crate::exception::{
        ApiExceptionFilter, ErrorKind, Exception, ExceptionFilter, FieldErrors,
        MassAssignmentError, RaisedException, RecordNotFound, StatusError, ValidationError,
        classify,
    };
    pub use crate::extract::{ApiJson, ApiPath, ApiQuery};
    pub use crate::interceptor::{Interceptor, InterceptorLayer, InterceptorResult, Next};
    pub use crate::wrapping::{DumbWrapping, wrap_parameters};
    pub use async_trait::async_trait;
    pub use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    pub use serde_json::Value;
    pub use std::sync::Arc;
}
