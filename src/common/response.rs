use crate::cors::CorsHeaders;
use crate::exception::{ApiExceptionFilter, Exception};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Output of a failed request
///
/// The body is always a JSON object; anything else collapses to `{}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub body: Map<String, Value>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        let body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { status, body }
    }

    /// An error with an empty `{}` body
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: Map::new(),
        }
    }

    pub fn body_value(&self) -> Value {
        Value::Object(self.body.clone())
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(Value::Object(self.body))).into_response();
        CorsHeaders.apply(response.headers_mut());
        response
    }
}

/// Render options for successful responses
#[derive(Debug, Clone, Default)]
pub struct RespondOptions {
    /// Defaults to 200 OK
    pub status: Option<StatusCode>,
    /// Sets the `Location` header, typically after a create
    pub location: Option<String>,
}

impl RespondOptions {
    pub fn status(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Standard API response
///
/// Renders its payload as JSON and stamps the CORS headers.
///
/// # Example
/// ```
/// use api_boilerplate::common::{ApiResponse, RespondOptions};
/// use axum::http::StatusCode;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// async fn create_user() -> ApiResponse<User> {
///     let user = User { id: 1, name: "Ada".to_string() };
///     ApiResponse::success(user)
///         .with_options(RespondOptions::status(StatusCode::CREATED).with_location("/users/1"))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub options: RespondOptions,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response with data
    ///
    /// Defaults to HTTP 200 OK.
    pub fn success(data: T) -> Self {
        Self {
            data,
            options: RespondOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RespondOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.options.status = Some(status);
        self
    }
}

impl ApiResponse<Value> {
    /// A successful response with an empty `{}` body
    pub fn empty() -> Self {
        Self::success(Value::Object(Map::new()))
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = match serde_json::to_value(&self.data) {
            Ok(body) => body,
            Err(err) => return Exception::new(err).into_response(),
        };

        let status = self.options.status.unwrap_or(StatusCode::OK);
        let mut response = (status, Json(body)).into_response();

        if let Some(location) = self.options.location {
            match HeaderValue::try_from(location) {
                Ok(value) => {
                    response.headers_mut().insert(LOCATION, value);
                }
                Err(e) => tracing::warn!("Dropping invalid Location header: {}", e),
            }
        }

        CorsHeaders.apply(response.headers_mut());
        response
    }
}

/// Render `payload` as JSON, 200 unless `options` says otherwise
pub fn respond_success<T: Serialize>(payload: T, options: RespondOptions) -> ApiResponse<T> {
    ApiResponse::success(payload).with_options(options)
}

/// Render an empty `{}` body
pub fn respond_empty(options: RespondOptions) -> ApiResponse<Value> {
    ApiResponse::empty().with_options(options)
}

/// Render `error_obj` as JSON with `status`
///
/// Objects that fail to serialize are reported as an internal error.
pub fn respond_error<E: Serialize>(status: StatusCode, error_obj: E) -> ErrorResponse {
    match serde_json::to_value(error_obj) {
        Ok(body) => ErrorResponse::new(status, body),
        Err(err) => ApiExceptionFilter.classify(&Exception::new(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;
    use std::collections::BTreeMap;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn assert_cors(response: &Response) {
        for (name, value) in CorsHeaders.entries() {
            assert_eq!(response.headers().get_all(&name).iter().count(), 1);
            assert_eq!(response.headers()[&name], value);
        }
    }

    #[tokio::test]
    async fn test_empty_response() {
        let response = respond_empty(RespondOptions::default()).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        assert_eq!(body_json(response).await, json!({}));
    }

    #[tokio::test]
    async fn test_success_with_status_and_location() {
        let options = RespondOptions::status(StatusCode::CREATED).with_location("/widgets/9");
        let response = respond_success(json!({ "id": 9 }), options).into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[LOCATION], "/widgets/9");
        assert_cors(&response);
        assert_eq!(body_json(response).await, json!({ "id": 9 }));
    }

    #[tokio::test]
    async fn test_success_payload_may_be_any_json() {
        let response = ApiResponse::success(vec![1, 2, 3]).into_response();
        assert_eq!(body_json(response).await, json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_error_response() {
        let response =
            respond_error(StatusCode::CONFLICT, json!({ "why": "duplicate" })).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_cors(&response);
        assert_eq!(body_json(response).await, json!({ "why": "duplicate" }));
    }

    #[tokio::test]
    async fn test_error_body_defaults_to_empty_object() {
        let response = respond_error(StatusCode::NOT_FOUND, ()).into_response();
        assert_eq!(body_json(response).await, json!({}));

        let response = respond_error(StatusCode::BAD_REQUEST, "just a string").into_response();
        assert_eq!(body_json(response).await, json!({}));
    }

    #[tokio::test]
    async fn test_unserializable_payload_becomes_internal_error() {
        // JSON object keys must be strings
        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8], "value");

        let response = ApiResponse::success(bad).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["type"], "serde_json::error::Error");
    }
}
