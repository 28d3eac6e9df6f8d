//! Controller configuration.
//!
//! Process settings are read from the environment once at startup. The
//! operand image is the exception: it is looked up on every build through an
//! [`ImageLookup`], so the builder can be exercised with fixed inputs.

use crate::error::ControllerError;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the operand image
pub const RECIPE_IMAGE_ENV: &str = "RECIPE_IMAGE";

const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_CONCURRENCY: u16 = 3;
const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30;

/// Resolves the operand image; `None` when it is not configured.
#[derive(Clone)]
pub struct ImageLookup(Arc<dyn Fn() -> Option<String> + Send + Sync>);

impl ImageLookup {
    /// Looks up `RECIPE_IMAGE` in the process environment on every call.
    pub fn from_env() -> Self {
        Self::new(|| env::var(RECIPE_IMAGE_ENV).ok())
    }

    /// Always resolves to `image`.
    #[cfg(test)]
    pub fn fixed(image: Option<&str>) -> Self {
        let image = image.map(str::to_string);
        Self::new(move || image.clone())
    }

    pub fn new(lookup: impl Fn() -> Option<String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(lookup))
    }

    /// Resolved image; empty values count as unset.
    pub fn resolve(&self) -> Option<String> {
        (self.0)().filter(|image| !image.trim().is_empty())
    }
}

impl fmt::Debug for ImageLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ImageLookup").finish_non_exhaustive()
    }
}

/// Startup configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Listener for `/healthz`, `/readyz` and `/metrics`
    pub metrics_bind_address: SocketAddr,
    /// Maximum concurrent reconciliations
    pub concurrency: u16,
    /// Quiet period applied to bursts of watch events
    pub debounce: Duration,
    /// Deadline for a single reconcile cycle
    pub reconcile_timeout: Duration,
}

impl ControllerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let metrics_bind_address = lookup("METRICS_BIND_ADDRESS")
            .unwrap_or_else(|| DEFAULT_METRICS_BIND_ADDRESS.to_string());
        let metrics_bind_address = metrics_bind_address.parse().map_err(|e| {
            ControllerError::InvalidConfig(format!(
                "METRICS_BIND_ADDRESS {metrics_bind_address:?} is not a socket address: {e}"
            ))
        })?;

        let concurrency = parse_or("RECONCILE_CONCURRENCY", &lookup, DEFAULT_CONCURRENCY)?;
        if concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        let debounce_ms = parse_or("RECONCILE_DEBOUNCE_MS", &lookup, DEFAULT_DEBOUNCE_MS)?;
        let timeout_secs = parse_or("RECONCILE_TIMEOUT_SECS", &lookup, DEFAULT_RECONCILE_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            watch_namespace,
            metrics_bind_address,
            concurrency,
            debounce: Duration::from_millis(debounce_ms),
            reconcile_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> Result<T, ControllerError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{key} {raw:?} is invalid: {e}"))),
    }
}
