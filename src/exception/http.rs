use crate::common::ErrorResponse;
use crate::exception::{
    ErrorKind, Exception, ExceptionFilter, MassAssignmentError, RecordNotFound, StatusError,
    ValidationError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::error::Error;

type Matcher = fn(&(dyn Error + 'static)) -> Option<ErrorResponse>;

struct Rule {
    kind: ErrorKind,
    matcher: Matcher,
}

/// Classification rules, tried in order. The first rule matching the error
/// or any of its sources wins; anything left over is `Unclassified`.
const RULES: &[Rule] = &[
    Rule {
        kind: ErrorKind::ValidationFailed,
        matcher: validation_failed,
    },
    Rule {
        kind: ErrorKind::RecordNotFound,
        matcher: record_not_found,
    },
    Rule {
        kind: ErrorKind::MassAssignmentRejected,
        matcher: mass_assignment_rejected,
    },
    Rule {
        kind: ErrorKind::DomainStatusError,
        matcher: domain_status_error,
    },
];

fn validation_failed(err: &(dyn Error + 'static)) -> Option<ErrorResponse> {
    let err = err.downcast_ref::<ValidationError>()?;
    Some(ErrorResponse::new(
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({ "why": "invalid", "errors": err.errors }),
    ))
}

fn record_not_found(err: &(dyn Error + 'static)) -> Option<ErrorResponse> {
    if err.is::<RecordNotFound>() {
        return Some(ErrorResponse::empty(StatusCode::NOT_FOUND));
    }

    #[cfg(feature = "sea-orm")]
    if let Some(sea_orm::DbErr::RecordNotFound(_)) = err.downcast_ref::<sea_orm::DbErr>() {
        return Some(ErrorResponse::empty(StatusCode::NOT_FOUND));
    }

    None
}

fn mass_assignment_rejected(err: &(dyn Error + 'static)) -> Option<ErrorResponse> {
    err.downcast_ref::<MassAssignmentError>()?;
    Some(ErrorResponse::new(
        StatusCode::BAD_REQUEST,
        json!({ "why": "attribute_protected" }),
    ))
}

fn domain_status_error(err: &(dyn Error + 'static)) -> Option<ErrorResponse> {
    let err = err.downcast_ref::<StatusError>()?;
    Some(ErrorResponse::new(
        err.status(),
        Value::Object(err.payload().clone()),
    ))
}

fn match_rules(exception: &Exception) -> Option<(ErrorKind, ErrorResponse)> {
    RULES.iter().find_map(|rule| {
        exception
            .chain()
            .find_map(rule.matcher)
            .map(|response| (rule.kind, response))
    })
}

/// Which rule an exception falls under
pub(crate) fn kind_of(exception: &Exception) -> ErrorKind {
    match_rules(exception).map_or(ErrorKind::Unclassified, |(kind, _)| kind)
}

/// Classify with the default filter
pub fn classify(exception: &Exception) -> ErrorResponse {
    ApiExceptionFilter.classify(exception)
}

/// Maps errors onto JSON error responses
///
/// Known kinds get their fixed status and body. Everything else becomes a
/// 500 carrying the error's type name and message; for those the message and
/// backtrace are logged, and never sent to the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiExceptionFilter;

impl ApiExceptionFilter {
    pub fn classify(&self, exception: &Exception) -> ErrorResponse {
        if let Some((kind, response)) = match_rules(exception) {
            tracing::debug!(%kind, status = %response.status, "classified error");
            return response;
        }

        tracing::error!("{}", exception.message());
        tracing::error!("{}", exception.backtrace_text());

        ErrorResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "type": exception.type_name(),
                "msg": exception.message(),
            }),
        )
    }

    pub(crate) fn catch_ref(&self, exception: &Exception) -> Response {
        self.classify(exception).into_response()
    }
}

impl ExceptionFilter for ApiExceptionFilter {
    fn catch(&self, exception: Exception) -> Response {
        self.catch_ref(&exception)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::FieldErrors;
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::{Layer, Registry};

    struct ErrorEventCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for ErrorEventCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn classify_counting(exception: &Exception) -> (ErrorResponse, usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = Registry::default().with(ErrorEventCounter(Arc::clone(&count)));
        let response =
            tracing::subscriber::with_default(subscriber, || classify(exception));
        (response, count.load(Ordering::SeqCst))
    }

    #[derive(Debug, thiserror::Error)]
    #[error("save failed")]
    struct SaveFailed(#[source] ValidationError);

    #[test]
    fn test_validation_failed() {
        let err = ValidationError::new(FieldErrors::new().with("name", "can't be blank"));
        let (response, logged) = classify_counting(&err.into());

        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            response.body_value(),
            json!({ "why": "invalid", "errors": { "name": ["can't be blank"] } })
        );
        assert_eq!(logged, 0);
    }

    #[test]
    fn test_record_not_found() {
        let (response, logged) = classify_counting(&RecordNotFound::new("User").with_id(1).into());
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body_value(), json!({}));
        assert_eq!(logged, 0);
    }

    #[test]
    fn test_mass_assignment_rejected() {
        let (response, _) = classify_counting(&MassAssignmentError::new(["admin"]).into());
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body_value(), json!({ "why": "attribute_protected" }));
    }

    #[test]
    fn test_domain_status_error_passes_payload_through() {
        let err = StatusError::new(StatusCode::FORBIDDEN)
            .with("why", "suspended")
            .with("until", "2030-01-01");
        let (response, _) = classify_counting(&err.into());

        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(
            response.body_value(),
            json!({ "why": "suspended", "until": "2030-01-01" })
        );
    }

    #[test]
    fn test_unclassified_logs_twice() {
        let (response, logged) = classify_counting(&io::Error::other("socket closed").into());

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.body_value(),
            json!({ "type": "std::io::error::Error", "msg": "socket closed" })
        );
        assert_eq!(logged, 2);
    }

    #[test]
    fn test_body_never_contains_backtrace() {
        let (response, _) = classify_counting(&io::Error::other("boom").into());
        assert_eq!(response.body.len(), 2);
        assert!(response.body.contains_key("type"));
        assert!(response.body.contains_key("msg"));
    }

    #[test]
    fn test_wrapped_errors_are_classified_by_source() {
        let exception: Exception =
            SaveFailed(ValidationError::field("email", "is invalid")).into();
        assert_eq!(exception.kind(), ErrorKind::ValidationFailed);
        assert_eq!(classify(&exception).status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_not_found_cause_beats_status_wrapper() {
        let err = StatusError::new(StatusCode::CONFLICT)
            .with("why", "stale")
            .caused_by(RecordNotFound::new("Plan").with_id(3));
        let exception: Exception = err.into();

        assert_eq!(exception.kind(), ErrorKind::RecordNotFound);
        let response = classify(&exception);
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body_value(), json!({}));
    }

    #[test]
    fn test_known_causes_beat_status_wrapper() {
        let validation = StatusError::new(StatusCode::CONFLICT)
            .caused_by(SaveFailed(ValidationError::field("name", "is taken")));
        let response = classify(&validation.into());
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.body["why"], "invalid");

        let protected =
            StatusError::new(StatusCode::CONFLICT).caused_by(MassAssignmentError::new(["role"]));
        let response = classify(&protected.into());
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body_value(), json!({ "why": "attribute_protected" }));
    }

    #[test]
    fn test_status_wrapper_around_unknown_cause_keeps_its_status() {
        let err = StatusError::new(StatusCode::SERVICE_UNAVAILABLE)
            .with("why", "maintenance")
            .caused_by(io::Error::other("replica offline"));
        let (response, logged) = classify_counting(&err.into());

        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body_value(), json!({ "why": "maintenance" }));
        assert_eq!(logged, 0);
    }

    #[test]
    fn test_catch_renders_cors_headers() {
        let response = ApiExceptionFilter.catch(RecordNotFound::new("Post").into());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            crate::cors::ALLOW_ORIGIN
        );
    }
}
