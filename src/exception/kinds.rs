//! Error types recognized by the classification rules

use axum::http::StatusCode;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Field name to validation messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn with(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add(field, message);
        self
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K, V> FromIterator<(K, V)> for FieldErrors
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut errors = Self::new();
        for (field, message) in iter {
            errors.add(field, message);
        }
        errors
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in self.iter() {
            for message in messages {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{field} {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A record failed its validation rules
#[derive(Debug, Clone, thiserror::Error)]
#[error("Validation failed: {errors}")]
pub struct ValidationError {
    pub errors: FieldErrors,
}

impl ValidationError {
    pub fn new(errors: FieldErrors) -> Self {
        Self { errors }
    }

    /// Shorthand for a single failing field
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FieldErrors::new().with(field, message))
    }
}

/// A lookup by identifier found nothing
#[derive(Debug, Clone, thiserror::Error)]
#[error("Couldn't find {model}{}", id_suffix(.id))]
pub struct RecordNotFound {
    pub model: String,
    pub id: Option<String>,
}

fn id_suffix(id: &Option<String>) -> String {
    id.as_ref()
        .map(|id| format!(" with id={id}"))
        .unwrap_or_default()
}

impl RecordNotFound {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl fmt::Display) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

/// A disallowed attribute was set in bulk
#[derive(Debug, Clone, thiserror::Error)]
#[error("Can't mass-assign protected attributes: {}", .attributes.join(", "))]
pub struct MassAssignmentError {
    pub attributes: Vec<String>,
}

impl MassAssignmentError {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

/// An application error carrying its own status and payload
///
/// Serializes to its payload as-is; the status travels out of band.
///
/// # Example
/// ```
/// use api_boilerplate::exception::StatusError;
/// use axum::http::StatusCode;
///
/// let err = StatusError::new(StatusCode::CONFLICT)
///     .with("why", "already_taken")
///     .with("field", "email");
/// assert_eq!(err.status(), StatusCode::CONFLICT);
/// ```
#[derive(Debug, Clone)]
pub struct StatusError {
    status: StatusCode,
    payload: Map<String, Value>,
    cause: Option<Arc<dyn Error + Send + Sync>>,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload.get("msg").and_then(Value::as_str) {
            Some(msg) => f.write_str(msg),
            None => fmt::Display::fmt(&self.status, f),
        }
    }
}

impl Error for StatusError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn Error + 'static))
    }
}

impl StatusError {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            payload: Map::new(),
            cause: None,
        }
    }

    /// Record the error this one was raised for; reported as its `source()`
    pub fn caused_by<E>(mut self, cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Add a payload entry; values that fail to serialize are stored as null
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.payload.insert(key.into(), value);
        self
    }

    pub fn with_message(self, msg: impl Into<String>) -> Self {
        self.with("msg", msg.into())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}

impl Serialize for StatusError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.payload.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_errors_accumulate() {
        let mut errors = FieldErrors::new();
        errors.add("name", "can't be blank");
        errors.add("name", "is too short");
        errors.add("email", "is invalid");

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.get("name"),
            Some(&["can't be blank".to_string(), "is too short".to_string()][..])
        );
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({
                "email": ["is invalid"],
                "name": ["can't be blank", "is too short"],
            })
        );
    }

    #[test]
    fn test_error_messages() {
        let invalid = ValidationError::field("name", "can't be blank");
        assert_eq!(invalid.to_string(), "Validation failed: name can't be blank");

        assert_eq!(
            RecordNotFound::new("User").with_id(42).to_string(),
            "Couldn't find User with id=42"
        );
        assert_eq!(RecordNotFound::new("User").to_string(), "Couldn't find User");

        let protected = MassAssignmentError::new(["admin", "role"]);
        assert_eq!(
            protected.to_string(),
            "Can't mass-assign protected attributes: admin, role"
        );
    }

    #[test]
    fn test_status_error_serializes_payload() {
        let err = StatusError::new(StatusCode::PAYMENT_REQUIRED)
            .with_message("card declined")
            .with("retry", false);

        assert_eq!(err.to_string(), "card declined");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "msg": "card declined", "retry": false })
        );
        assert_eq!(
            StatusError::new(StatusCode::GONE).to_string(),
            "410 Gone"
        );
    }

    #[test]
    fn test_status_error_cause_is_its_source() {
        let err = StatusError::new(StatusCode::CONFLICT).caused_by(RecordNotFound::new("Plan"));
        let source = err.source().unwrap();
        assert!(source.is::<RecordNotFound>());
        assert_eq!(serde_json::to_value(&err).unwrap(), json!({}));

        assert!(StatusError::new(StatusCode::GONE).source().is_none());
    }
}
