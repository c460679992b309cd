//! Permissive CORS headers stamped on every response

use axum::http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{
        ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    },
};
use tower::Layer;
use tower_http::set_header::{SetResponseHeader, SetResponseHeaderLayer};

pub const ALLOW_HEADERS: &str = "X-Requested-With,Content-Type";
pub const ALLOW_METHODS: &str = "OPTIONS,GET,HEAD,POST,PUT,DELETE";
pub const ALLOW_ORIGIN: &str = "*";

/// The fixed CORS header set
#[derive(Debug, Clone, Copy, Default)]
pub struct CorsHeaders;

impl CorsHeaders {
    pub fn entries(&self) -> [(HeaderName, HeaderValue); 3] {
        [
            (
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOW_HEADERS),
            ),
            (
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOW_METHODS),
            ),
            (
                ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static(ALLOW_ORIGIN),
            ),
        ]
    }

    pub fn header_map(&self) -> HeaderMap {
        self.entries().into_iter().collect()
    }

    /// Set the headers, replacing any earlier values. Idempotent.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in self.entries() {
            headers.insert(name, value);
        }
    }
}

pub fn apply_cors_headers(headers: &mut HeaderMap) {
    CorsHeaders.apply(headers);
}

/// Service produced by [`CorsLayer`]: one header override per CORS header
pub type CorsMiddleware<S> = SetResponseHeader<
    SetResponseHeader<SetResponseHeader<S, HeaderValue>, HeaderValue>,
    HeaderValue,
>;

/// The CORS headers as overriding `SetResponseHeaderLayer`s
pub fn cors_header_layers() -> [SetResponseHeaderLayer<HeaderValue>; 3] {
    CorsHeaders
        .entries()
        .map(|(name, value)| SetResponseHeaderLayer::overriding(name, value))
}

/// Tower Layer stamping CORS headers on every response
#[derive(Debug, Clone, Copy, Default)]
pub struct CorsLayer;

impl CorsLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for CorsLayer {
    type Service = CorsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        let [allow_headers, allow_methods, allow_origin] = cors_header_layers();
        allow_origin.layer(allow_methods.layer(allow_headers.layer(inner)))
    }
}
