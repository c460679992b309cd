//! Dumb parameter wrapping
//!
//! Nests every body parameter under a single key, so handlers can extract
//! `{"object": {...}}` no matter how the client shaped the payload. JSON
//! objects and urlencoded forms are wrapped; an empty JSON or write-request
//! body becomes `{"object": {}}`. Requests whose `User-Agent` matches the
//! test-harness marker are left alone.

use crate::config::{BoilerplateConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_TEST_USER_AGENT};
use crate::error::{BoilerplateError, Result};
use crate::exception::{Exception, StatusError};
use crate::interceptor::{Interceptor, InterceptorResult, Next};
use async_trait::async_trait;
use axum::{
    body::{Body, Bytes, HttpBody, to_bytes},
    http::{
        HeaderMap, HeaderValue, Method, Request, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT},
    },
};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use url::form_urlencoded;

pub const DEFAULT_WRAP_KEY: &str = "object";

/// Copy of `params` with the whole set also nested under `key`
pub fn wrap_parameters(params: Map<String, Value>, key: &str) -> Map<String, Value> {
    let mut wrapped = params.clone();
    wrapped.insert(key.to_string(), Value::Object(params));
    wrapped
}

/// Urlencoded form with every pair repeated under `key`
///
/// `a=1&b[c]=2` wrapped under `object` becomes
/// `a=1&b[c]=2&object[a]=1&object[b][c]=2`.
pub fn wrap_form_parameters(form: &[u8], key: &str) -> String {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(form).into_owned().collect();

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.extend_pairs(&pairs);
    for (name, value) in &pairs {
        serializer.append_pair(&nested_name(key, name), value);
    }
    serializer.finish()
}

fn nested_name(key: &str, name: &str) -> String {
    match name.find('[') {
        Some(0) | None => format!("{key}[{name}]"),
        Some(idx) => format!("{key}[{}]{}", &name[..idx], &name[idx..]),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Json,
    Form,
    Other,
}

fn body_format(headers: &HeaderMap) -> Option<BodyFormat> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    Some(if mime == "application/x-www-form-urlencoded" {
        BodyFormat::Form
    } else if mime == "application/json" || mime.ends_with("+json") {
        BodyFormat::Json
    } else {
        BodyFormat::Other
    })
}

#[derive(Debug, Clone)]
pub struct DumbWrapping {
    key: String,
    test_user_agent: String,
    max_body_bytes: usize,
}

impl Default for DumbWrapping {
    fn default() -> Self {
        Self {
            key: DEFAULT_WRAP_KEY.to_string(),
            test_user_agent: DEFAULT_TEST_USER_AGENT.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl DumbWrapping {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(BoilerplateError::InvalidWrapKey(key));
        }
        Ok(Self {
            key,
            ..Self::default()
        })
    }

    pub fn from_config(config: &BoilerplateConfig) -> Result<Self> {
        let key = config.wrap_key.as_deref().unwrap_or(DEFAULT_WRAP_KEY);
        Ok(Self::new(key)?
            .with_test_user_agent(config.test_user_agent.clone())
            .with_max_body_bytes(config.max_body_bytes))
    }

    pub fn with_test_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.test_user_agent = user_agent.into();
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn is_test_harness(&self, headers: &HeaderMap) -> bool {
        headers
            .get(USER_AGENT)
            .is_some_and(|agent| agent.as_bytes() == self.test_user_agent.as_bytes())
    }

    fn too_large(&self) -> Exception {
        StatusError::new(StatusCode::PAYLOAD_TOO_LARGE)
            .with("why", "body_too_large")
            .with("limit", self.max_body_bytes)
            .into()
    }

    fn read_failed(&self, err: axum::Error) -> Exception {
        let exception = Exception::new(err);
        if exception.is::<LengthLimitError>() {
            self.too_large()
        } else {
            exception
        }
    }

    /// The rewritten body, or `None` when it is passed through untouched
    fn wrap_body(
        &self,
        method: &Method,
        format: Option<BodyFormat>,
        bytes: &Bytes,
    ) -> std::result::Result<Option<(Vec<u8>, BodyFormat)>, serde_json::Error> {
        let empty = bytes.iter().all(u8::is_ascii_whitespace);
        let write_request = matches!(*method, Method::POST | Method::PUT | Method::PATCH);

        match format {
            Some(BodyFormat::Form) if !empty => Ok(Some((
                wrap_form_parameters(bytes, &self.key).into_bytes(),
                BodyFormat::Form,
            ))),
            Some(BodyFormat::Json) | None if empty && (format.is_some() || write_request) => {
                let wrapped = wrap_parameters(Map::new(), &self.key);
                Ok(Some((serde_json::to_vec(&wrapped)?, BodyFormat::Json)))
            }
            Some(BodyFormat::Json) | None => match serde_json::from_slice::<Value>(bytes) {
                Ok(Value::Object(params)) => Ok(Some((
                    serde_json::to_vec(&wrap_parameters(params, &self.key))?,
                    BodyFormat::Json,
                ))),
                _ => Ok(None),
            },
            Some(BodyFormat::Form) | Some(BodyFormat::Other) => Ok(None),
        }
    }
}

#[async_trait]
impl Interceptor for DumbWrapping {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        if self.is_test_harness(request.headers()) {
            return next.run(request).await;
        }

        let (mut parts, body) = request.into_parts();

        let declared_length = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        let hinted_length = usize::try_from(body.size_hint().lower()).unwrap_or(usize::MAX);
        if hinted_length > self.max_body_bytes
            || declared_length.is_some_and(|len| len > self.max_body_bytes)
        {
            return Err(self.too_large());
        }

        let bytes = to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|err| self.read_failed(err))?;

        let format = body_format(&parts.headers);
        let body = match self.wrap_body(&parts.method, format, &bytes)? {
            Some((wrapped, wrapped_format)) => {
                parts
                    .headers
                    .insert(CONTENT_LENGTH, HeaderValue::from(wrapped.len()));
                if format.is_none() && wrapped_format == BodyFormat::Json {
                    parts
                        .headers
                        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                tracing::debug!(key = %self.key, ?wrapped_format, "wrapped request parameters");
                Body::from(wrapped)
            }
            None => Body::from(bytes),
        };

        next.run(Request::from_parts(parts, body)).await
    }
}
