use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoilerplateError>;

#[derive(Debug, Error)]
pub enum BoilerplateError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Invalid parameter wrapping key: {0:?}")]
    InvalidWrapKey(String),
}
