//! Server configuration from the environment

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Per-request limits applied by the proxy endpoints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProxyLimits {
    /// Most recent messages forwarded by the chat endpoint
    pub chat_history_window: usize,
    /// Most recent messages forwarded by the agent endpoint
    pub agent_history_window: usize,
    pub max_output_tokens: u32,
    pub max_tool_rounds: usize,
    /// Upper bound on one streamed response
    pub request_ceiling: Duration,
}

impl Default for ProxyLimits {
    fn default() -> Self {
        Self {
            chat_history_window: 10,
            agent_history_window: 12,
            max_output_tokens: 500,
            max_tool_rounds: 3,
            request_ceiling: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub limits: ProxyLimits,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ProxyLimits::default();
        let limits = ProxyLimits {
            chat_history_window: positive(
                &lookup,
                "FOLIO_CHAT_WINDOW",
                defaults.chat_history_window,
            )?,
            agent_history_window: positive(
                &lookup,
                "FOLIO_AGENT_WINDOW",
                defaults.agent_history_window,
            )?,
            max_output_tokens: positive(
                &lookup,
                "FOLIO_MAX_OUTPUT_TOKENS",
                defaults.max_output_tokens,
            )?,
            max_tool_rounds: positive(&lookup, "FOLIO_MAX_TOOL_ROUNDS", defaults.max_tool_rounds)?,
            request_ceiling: Duration::from_secs(positive(
                &lookup,
                "FOLIO_REQUEST_CEILING_SECS",
                defaults.request_ceiling.as_secs(),
            )?),
        };

        Ok(Self {
            port: parsed(&lookup, "FOLIO_PORT", "a port number", 8000)?,
            data_dir: lookup("FOLIO_DATA_DIR")
                .filter(|d| !d.trim().is_empty())
                .map_or_else(|| PathBuf::from("./data"), PathBuf::from),
            limits,
        })
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value: raw,
        }),
    }
}

fn positive<T: FromStr + PartialOrd + Default>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    const EXPECTED: &str = "a positive integer";
    let value = parsed(lookup, var, EXPECTED, default)?;
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var,
            expected: EXPECTED,
            value: lookup(var).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.limits, ProxyLimits::default());
        assert_eq!(config.limits.chat_history_window, 10);
        assert_eq!(config.limits.agent_history_window, 12);
        assert_eq!(config.limits.max_tool_rounds, 3);
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("FOLIO_PORT", "9100"),
            ("FOLIO_DATA_DIR", "/var/lib/folio"),
            ("FOLIO_CHAT_WINDOW", "4"),
            ("FOLIO_REQUEST_CEILING_SECS", " 15 "),
        ])
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/folio"));
        assert_eq!(config.limits.chat_history_window, 4);
        assert_eq!(config.limits.request_ceiling, Duration::from_secs(15));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = config_with(&[("FOLIO_PORT", "eighty")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "FOLIO_PORT",
                expected: "a port number",
                value: "eighty".to_string(),
            }
        );

        assert!(config_with(&[("FOLIO_MAX_TOOL_ROUNDS", "0")]).is_err());
        assert!(config_with(&[("FOLIO_CHAT_WINDOW", "-3")]).is_err());
    }
}
