//! Controller configuration.
//!
//! Everything is read from environment variables so the controller can be
//! configured from its Deployment manifest.

use crate::error::ControllerError;
use hcloud_client::client::DEFAULT_ENDPOINT;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration of the HetznerCluster controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch, `None` for all namespaces
    pub namespace: Option<String>,
    /// Base URL of the Hetzner Cloud API
    pub hcloud_endpoint: String,
    /// How long the API is left alone after a rate limit was hit
    pub rate_limit_wait: Duration,
    /// Maximum concurrent reconciliations
    pub concurrency: u16,
    /// Delay after the last watch event before reconciling
    pub debounce: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            hcloud_endpoint: DEFAULT_ENDPOINT.to_string(),
            rate_limit_wait: Duration::from_secs(300),
            concurrency: 3,
            debounce: Duration::from_secs(5),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unset or empty variables fall back to the defaults; set but
    /// unparsable ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            namespace: get("WATCH_NAMESPACE"),
            hcloud_endpoint: get("HCLOUD_ENDPOINT").unwrap_or(defaults.hcloud_endpoint),
            rate_limit_wait: match get("RATE_LIMIT_WAIT_SECONDS") {
                Some(raw) => Duration::from_secs(parse("RATE_LIMIT_WAIT_SECONDS", &raw)?),
                None => defaults.rate_limit_wait,
            },
            concurrency: match get("RECONCILE_CONCURRENCY") {
                Some(raw) => parse("RECONCILE_CONCURRENCY", &raw)?,
                None => defaults.concurrency,
            },
            debounce: match get("RECONCILE_DEBOUNCE_SECONDS") {
                Some(raw) => Duration::from_secs(parse("RECONCILE_DEBOUNCE_SECONDS", &raw)?),
                None => defaults.debounce,
            },
        })
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        ControllerError::InvalidConfig(format!("{key} has invalid value {raw:?}: {e}"))
    })
}
