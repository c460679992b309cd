//! Exception capture and classification
//!
//! Handlers return `Result<T, Exception>`. Any error type converts into an
//! [`Exception`] with `?`, which remembers the concrete type name and a
//! backtrace so the fallback branch has something to report and log.

use axum::response::{IntoResponse, Response};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};

pub mod http;
pub mod kinds;

pub use http::{ApiExceptionFilter, classify};
pub use kinds::{FieldErrors, MassAssignmentError, RecordNotFound, StatusError, ValidationError};

/// Type-erased error as it arrives from a tower service
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Type name reported for errors that were boxed before reaching us
pub const BOXED_TYPE_NAME: &str = "dyn std::error::Error";

/// Classification tag assigned to a raised error
///
/// Variants are declared in the order the classification rules are tried.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::IntoStaticStr,
    strum_macros::EnumIter,
)]
pub enum ErrorKind {
    ValidationFailed,
    RecordNotFound,
    MassAssignmentRejected,
    DomainStatusError,
    Unclassified,
}

/// An error raised while handling a request
pub struct Exception {
    inner: BoxError,
    type_name: &'static str,
    backtrace: Backtrace,
}

impl Exception {
    /// Wrap a concrete error, recording its type name
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(error),
            type_name: std::any::type_name::<E>(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Wrap an error that is already boxed (e.g. a tower service error)
    pub fn from_boxed(error: BoxError) -> Self {
        Self {
            inner: error,
            type_name: BOXED_TYPE_NAME,
            backtrace: Backtrace::capture(),
        }
    }

    /// The reported kind name: the Rust type the error was raised as
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Backtrace rendered for logging, or a placeholder when none was captured
    pub fn backtrace_text(&self) -> String {
        match self.backtrace.status() {
            BacktraceStatus::Captured => self.backtrace.to_string(),
            _ => "<backtrace unavailable>".to_string(),
        }
    }

    pub fn get_ref(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    pub fn into_inner(self) -> BoxError {
        self.inner
    }

    /// The error followed by each of its sources
    pub fn chain(&self) -> impl Iterator<Item = &(dyn Error + 'static)> {
        let first: &(dyn Error + 'static) = self.inner.as_ref();
        std::iter::successors(Some(first), |err: &&(dyn Error + 'static)| (*err).source())
    }

    /// First error in the chain of type `E`
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.chain().find_map(|err| err.downcast_ref::<E>())
    }

    pub fn is<E: Error + 'static>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// Which rule this exception falls under, without side effects
    pub fn kind(&self) -> ErrorKind {
        http::kind_of(self)
    }
}

impl<E> From<E> for Exception
where
    E: Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("type_name", &self.type_name)
            .field("error", &self.inner)
            .finish()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl IntoResponse for Exception {
    /// Renders with the default filter. The exception rides along in the
    /// response extensions so an installed custom filter can take it over.
    fn into_response(self) -> Response {
        let mut response = ApiExceptionFilter.catch_ref(&self);
        response.extensions_mut().insert(RaisedException::new(self));
        response
    }
}

/// Response extension carrying the exception a handler returned
///
/// `InterceptorMiddleware` takes it out and hands it to a custom filter.
#[derive(Clone)]
pub struct RaisedException(Arc<Mutex<Option<Exception>>>);

impl RaisedException {
    pub fn new(exception: Exception) -> Self {
        Self(Arc::new(Mutex::new(Some(exception))))
    }

    /// The exception, if nobody has taken it yet
    pub fn take(&self) -> Option<Exception> {
        match self.0.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl fmt::Debug for RaisedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RaisedException").finish_non_exhaustive()
    }
}

/// The ExceptionFilter trait
///
/// Filters handle errors thrown during request processing.
/// They must return a valid Response.
pub trait ExceptionFilter: Send + Sync + 'static {
    /// Catch an exception and return a response
    fn catch(&self, exception: Exception) -> Response;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use strum::IntoEnumIterator;

    #[derive(Debug, thiserror::Error)]
    #[error("lookup failed")]
    struct Wrapper {
        #[source]
        source: RecordNotFound,
    }

    #[test]
    fn test_type_name_is_recorded() {
        let exception = Exception::new(io::Error::other("disk on fire"));
        assert_eq!(exception.type_name(), "std::io::error::Error");
        assert_eq!(exception.message(), "disk on fire");
    }

    #[test]
    fn test_boxed_errors_report_placeholder_name() {
        let boxed: BoxError = "plain message".into();
        let exception = Exception::from_boxed(boxed);
        assert_eq!(exception.type_name(), BOXED_TYPE_NAME);
        assert_eq!(exception.message(), "plain message");
    }

    #[test]
    fn test_downcast_walks_source_chain() {
        let exception = Exception::new(Wrapper {
            source: RecordNotFound::new("User"),
        });
        assert_eq!(exception.chain().count(), 2);
        assert!(exception.is::<RecordNotFound>());
        assert!(!exception.is::<ValidationError>());
    }

    #[test]
    fn test_chain_lists_every_source() {
        let exception = Exception::new(
            StatusError::new(axum::http::StatusCode::CONFLICT).caused_by(Wrapper {
                source: RecordNotFound::new("User"),
            }),
        );
        let messages: Vec<String> = exception.chain().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec!["409 Conflict", "lookup failed", "Couldn't find User"]
        );
    }

    #[test]
    fn test_question_mark_conversion() {
        fn lookup() -> Result<(), Exception> {
            Err::<(), _>(RecordNotFound::new("User").with_id(7))?;
            Ok(())
        }

        let exception = lookup().unwrap_err();
        assert_eq!(exception.kind(), ErrorKind::RecordNotFound);
    }

    #[test]
    fn test_rendered_exception_is_kept_in_extensions() {
        let response = Exception::new(RecordNotFound::new("User")).into_response();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);

        let raised = response.extensions().get::<RaisedException>().unwrap();
        let exception = raised.take().unwrap();
        assert!(exception.is::<RecordNotFound>());
        assert!(raised.take().is_none());
    }

    #[test]
    fn test_kinds_in_precedence_order() {
        let kinds: Vec<&'static str> = ErrorKind::iter().map(Into::into).collect();
        assert_eq!(
            kinds,
            vec![
                "ValidationFailed",
                "RecordNotFound",
                "MassAssignmentRejected",
                "DomainStatusError",
                "Unclassified",
            ]
        );
    }
}
