//! Logging setup for a TrustChain node.
//!
//! One node per process during tests, one node per process in production:
//! either way logging is just a `tracing_subscriber::fmt` layer with an
//! `EnvFilter`, set up once at startup.

mod config;

pub use config::TelemetryConfig;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Failure to install the global tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A subscriber was already installed (e.g. `init_telemetry` called twice).
    #[error("tracing subscriber already installed")]
    AlreadyInitialized,
}

/// Install the process-wide tracing subscriber. Returns a guard whose only
/// job is to keep the caller honest about lifetime; dropping it does not
/// tear anything down (there is no exporter to flush).
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json_logs {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    result.map_err(|_| TelemetryError::AlreadyInitialized)?;
    Ok(TelemetryGuard { _private: () })
}

/// Marker guard returned by [`init_telemetry`].
pub struct TelemetryGuard {
    _private: (),
}

/// Open a span tagged with this node's identity, for wrapping a round of
/// protocol work.
#[macro_export]
macro_rules! node_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_roundtrip() {
        let config = TelemetryConfig::for_node("0");
        assert_eq!(config.service_name, "trustchain-node-0");
    }
}
