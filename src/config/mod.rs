use crate::error::{BoilerplateError, Result};
use dashmap::DashMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

pub const WRAP_KEY: &str = "API_WRAP_KEY";
pub const TEST_USER_AGENT: &str = "API_TEST_USER_AGENT";
pub const MAX_BODY_BYTES: &str = "API_MAX_BODY_BYTES";

/// `User-Agent` that marks a test-harness request, which parameter wrapping skips.
///
/// Rails request specs send `Rails Testing`; set `API_TEST_USER_AGENT` to that
/// value when the same suites drive this API.
pub const DEFAULT_TEST_USER_AGENT: &str = "API Testing";

/// Marker sent by Rails request specs
pub const RAILS_TEST_USER_AGENT: &str = "Rails Testing";
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the process environment
    pub fn from_env() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Parse a value, `None` when the key is absent
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse()
                    .map_err(|e: T::Err| BoilerplateError::InvalidConfig {
                        key: key.to_string(),
                        message: e.to_string(),
                    })
            })
            .transpose()
    }
}

/// Settings for the API boilerplate layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoilerplateConfig {
    /// Parameter wrapping is enabled when a key is set
    pub wrap_key: Option<String>,
    pub test_user_agent: String,
    pub max_body_bytes: usize,
}

impl Default for BoilerplateConfig {
    fn default() -> Self {
        Self {
            wrap_key: None,
            test_user_agent: DEFAULT_TEST_USER_AGENT.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl BoilerplateConfig {
    pub fn from_config(config: &ConfigService) -> Result<Self> {
        let defaults = Self::default();

        let wrap_key = match config.get(WRAP_KEY) {
            Some(key) if key.trim().is_empty() => {
                return Err(BoilerplateError::InvalidWrapKey(key));
            }
            other => other,
        };

        Ok(Self {
            wrap_key,
            test_user_agent: config
                .get(TEST_USER_AGENT)
                .unwrap_or(defaults.test_user_agent),
            max_body_bytes: config
                .get_parsed(MAX_BODY_BYTES)?
                .unwrap_or(defaults.max_body_bytes),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(&ConfigService::from_env())
    }
}
