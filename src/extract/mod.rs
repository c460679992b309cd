//! Extractors whose rejections are JSON error responses
//!
//! axum's own `Json`, `Path` and `Query` reject with a plain-text body. These
//! wrappers turn the rejection into a [`StatusError`] carrying the same status,
//! so a malformed request gets `{"why": ..., "msg": ...}` with CORS headers like
//! every other error.

use crate::exception::{Exception, StatusError};
use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::request::Parts,
};
use serde::de::DeserializeOwned;

/// JSON body extractor rejecting with a JSON error
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

/// Path parameter extractor rejecting with a JSON error
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

/// Query string extractor rejecting with a JSON error
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

fn rejected(status: axum::http::StatusCode, why: &str, body_text: String) -> Exception {
    StatusError::new(status)
        .with("why", why)
        .with_message(body_text)
        .into()
}

pub fn json_rejection(rejection: JsonRejection) -> Exception {
    let why = match &rejection {
        JsonRejection::JsonDataError(_) => "invalid_body",
        JsonRejection::JsonSyntaxError(_) => "malformed_body",
        JsonRejection::MissingJsonContentType(_) => "unsupported_media_type",
        _ => "unreadable_body",
    };
    rejected(rejection.status(), why, rejection.body_text())
}

pub fn path_rejection(rejection: PathRejection) -> Exception {
    let why = match &rejection {
        PathRejection::FailedToDeserializePathParams(_) => "invalid_path",
        _ => "missing_path_params",
    };
    rejected(rejection.status(), why, rejection.body_text())
}

pub fn query_rejection(rejection: QueryRejection) -> Exception {
    rejected(rejection.status(), "invalid_query", rejection.body_text())
}

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Exception;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        Ok(Self(value))
    }
}

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Exception;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(path_rejection)?;
        Ok(Self(value))
    }
}

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Exception;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(query_rejection)?;
        Ok(Self(value))
    }
}
