//! Startup configuration taken from environment variables.

use std::env;
use std::time::Duration;

use llmbas_core::RetryPolicy;
use llmbas_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

const API_KEY: &str = "OPENAI_API_KEY";
const BASE_URL: &str = "OPENAI_BASE_URL";
const MODEL: &str = "OPENAI_MODEL";
const MAX_ATTEMPTS: &str = "LLMBAS_MAX_ATTEMPTS";
const TOOL_TIMEOUT: &str = "LLMBAS_TOOL_TIMEOUT_SECS";

/// Errors raised while reading the environment.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    /// A required variable is not set.
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    /// A variable holds a value that can't be parsed.
    #[error("invalid value `{value}` for {var}")]
    Invalid {
        /// Name of the variable.
        var: &'static str,
        /// The offending value.
        value: String,
    },
}

/// Settings of one run.
#[derive(Debug)]
pub struct EnvConfig {
    /// Provider configuration.
    pub openai: OpenAIConfig,
    /// How model calls are retried.
    pub retry_policy: RetryPolicy,
    /// Upper bound of a single tool call, if any.
    pub tool_timeout: Option<Duration>,
}

impl EnvConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, EnvError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Reads the variables through `lookup`.
    ///
    /// Unset and empty variables are treated the same.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|value| !value.is_empty());

        let api_key = get(API_KEY).ok_or(EnvError::Missing(API_KEY))?;
        let mut openai = OpenAIConfigBuilder::with_api_key(api_key);
        if let Some(base_url) = get(BASE_URL) {
            openai = openai.with_base_url(base_url);
        }
        if let Some(model) = get(MODEL) {
            openai = openai.with_model(model);
        }

        let retry_policy = match get(MAX_ATTEMPTS) {
            Some(value) => match parse::<u32>(MAX_ATTEMPTS, value)? {
                0 => RetryPolicy::unbounded(),
                max => RetryPolicy::default().with_max_attempts(Some(max)),
            },
            None => RetryPolicy::default(),
        };
        let tool_timeout = get(TOOL_TIMEOUT)
            .map(|value| parse::<u64>(TOOL_TIMEOUT, value))
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            openai: openai.build(),
            retry_policy,
            tool_timeout,
        })
    }
}

fn parse<T: std::str::FromStr>(
    var: &'static str,
    value: String,
) -> Result<T, EnvError> {
    value
        .trim()
        .parse()
        .map_err(|_| EnvError::Invalid { var, value })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<EnvConfig, EnvError> {
        let vars: HashMap<_, _> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.openai.model(), "gpt-4o");
        assert_eq!(config.retry_policy, RetryPolicy::default());
        assert_eq!(config.tool_timeout, None);
    }

    #[test]
    fn test_missing_key() {
        let err = load(&[("OPENAI_MODEL", "gpt-4o-mini")]).unwrap_err();
        assert_eq!(err, EnvError::Missing("OPENAI_API_KEY"));
        let err = load(&[("OPENAI_API_KEY", "")]).unwrap_err();
        assert_eq!(err, EnvError::Missing("OPENAI_API_KEY"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("LLMBAS_MAX_ATTEMPTS", "0"),
            ("LLMBAS_TOOL_TIMEOUT_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.openai.model(), "gpt-4o-mini");
        assert_eq!(config.retry_policy, RetryPolicy::unbounded());
        assert_eq!(config.tool_timeout, Some(Duration::from_secs(30)));

        let config = load(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("LLMBAS_MAX_ATTEMPTS", "3"),
        ])
        .unwrap();
        assert_eq!(
            config.retry_policy,
            RetryPolicy::default().with_max_attempts(Some(3))
        );
    }

    #[test]
    fn test_invalid_number() {
        let err = load(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("LLMBAS_TOOL_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            EnvError::Invalid {
                var: "LLMBAS_TOOL_TIMEOUT_SECS",
                value: "soon".to_owned()
            }
        );
    }
}
