//! Production configuration and clock.
//!
//! `Config` loads the process environment once at startup per spec.md §6;
//! `SystemClock` is the production `teltonika_core::Clock` implementation,
//! mirroring the teacher's `SystemEnv` (real wall-clock time, no sleeping or
//! randomness needed by the core).

use std::time::Instant;

use teltonika_core::Clock;

use crate::error::GatewayError;

const DEFAULT_TCP_PORT: u16 = 5000;
const DEFAULT_STATUS_PORT: u16 = 3000;

/// Process-wide configuration, loaded once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute URL of the Fleet API ingest endpoint.
    pub fleet_api_url: String,
    /// Bearer token sent with every sink request.
    pub shared_secret: String,
    /// Port the TCP device listener binds to.
    pub tcp_port: u16,
    /// Port the status HTTP listener binds to.
    pub status_port: u16,
}

impl Config {
    /// Builds a `Config` from the process environment.
    ///
    /// `FLEET_API_URL` and `SHARED_SECRET` are required; `TCP_PORT` and
    /// `STATUS_PORT` default to 5000 and 3000. Any missing or malformed
    /// value is reported as a single `GatewayError::Config` describing
    /// exactly what's wrong, never a panic.
    pub fn from_env() -> Result<Self, GatewayError> {
        let fleet_api_url = required_var("FLEET_API_URL")?;
        if url::Url::parse(&fleet_api_url).is_err() {
            return Err(GatewayError::Config(format!(
                "FLEET_API_URL must be an absolute URL, got {fleet_api_url:?}"
            )));
        }

        let shared_secret = required_var("SHARED_SECRET")?;
        if shared_secret.is_empty() {
            return Err(GatewayError::Config("SHARED_SECRET must not be empty".to_string()));
        }

        let tcp_port = optional_port("TCP_PORT", DEFAULT_TCP_PORT)?;
        let status_port = optional_port("STATUS_PORT", DEFAULT_STATUS_PORT)?;

        Ok(Self { fleet_api_url, shared_secret, tcp_port, status_port })
    }
}

fn required_var(name: &str) -> Result<String, GatewayError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) => Err(GatewayError::Config(format!("{name} must not be empty"))),
        Err(_) => Err(GatewayError::Config(format!("{name} is required but was not set"))),
    }
}

fn optional_port(name: &str, default: u16) -> Result<u16, GatewayError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => value
            .parse()
            .map_err(|_| GatewayError::Config(format!("{name} must be a valid port number, got {value:?}"))),
    }
}

/// Production clock: real `std::time::Instant`, matching the teacher's
/// `SystemEnv::now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Instant = Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let t1 = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let t2 = clock.now();
        assert!(t2 > t1);
    }

    #[test]
    fn missing_required_var_is_config_error() {
        // SAFETY-free: test runs single-threaded with respect to this var
        // within this process; no other test reads FLEET_API_URL_TEST_MISSING.
        let err = required_var("FLEET_API_URL_TEST_MISSING_XYZ").unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn optional_port_defaults_when_unset() {
        let port = optional_port("STATUS_PORT_TEST_UNSET_XYZ", 3000).unwrap();
        assert_eq!(port, 3000);
    }
}
