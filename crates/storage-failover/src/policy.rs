//! Failover eligibility policy.
//!
//! Decides which primary failures are worth replaying against the secondary.
//! The default treats `400 Bad Request` and every status at or above `500` as
//! a sign that the primary is unavailable or misbehaving. Everything else
//! (`403`, `404`, `409`, ...) describes a problem with the request itself and
//! is surfaced to the caller unchanged.
//!
//! ```
//! use inferadb_common_storage_failover::FailoverPolicy;
//!
//! let policy = FailoverPolicy::default();
//! assert!(policy.is_eligible_status(400));
//! assert!(!policy.is_eligible_status(404));
//! assert!(policy.is_eligible_status(503));
//!
//! let strict = FailoverPolicy::server_errors_only();
//! assert!(!strict.is_eligible_status(400));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, ConfigError};

/// Lowest status code treated as a server error by default.
pub const DEFAULT_SERVER_ERROR_FLOOR: u16 = 500;

/// The `400 Bad Request` status code.
const BAD_REQUEST: u16 = 400;

const MIN_STATUS: u16 = 100;
const MAX_STATUS: u16 = 599;

/// Which backend errors trigger a failover.
///
/// Deserialized values go through the same validation as the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFailoverPolicy")]
pub struct FailoverPolicy {
    /// Fail over on exactly `400 Bad Request`.
    failover_on_bad_request: bool,

    /// Fail over on every status at or above this value.
    server_error_floor: u16,
}

/// Unvalidated wire form of [`FailoverPolicy`].
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFailoverPolicy {
    #[serde(default = "default_failover_on_bad_request")]
    failover_on_bad_request: bool,
    #[serde(default = "default_server_error_floor")]
    server_error_floor: u16,
}

impl TryFrom<RawFailoverPolicy> for FailoverPolicy {
    type Error = ConfigError;

    fn try_from(raw: RawFailoverPolicy) -> Result<Self, Self::Error> {
        FailoverPolicy::builder()
            .failover_on_bad_request(raw.failover_on_bad_request)
            .server_error_floor(raw.server_error_floor)
            .build()
    }
}

fn default_failover_on_bad_request() -> bool {
    true
}

fn default_server_error_floor() -> u16 {
    DEFAULT_SERVER_ERROR_FLOOR
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self {
            failover_on_bad_request: default_failover_on_bad_request(),
            server_error_floor: default_server_error_floor(),
        }
    }
}

#[bon::bon]
impl FailoverPolicy {
    /// Creates a policy, validating the server error floor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] if `server_error_floor` is not a
    /// valid HTTP status code (100–599).
    #[builder]
    pub fn new(
        #[builder(default = default_failover_on_bad_request())] failover_on_bad_request: bool,
        #[builder(default = DEFAULT_SERVER_ERROR_FLOOR)] server_error_floor: u16,
    ) -> Result<Self, ConfigError> {
        if !(MIN_STATUS..=MAX_STATUS).contains(&server_error_floor) {
            return Err(ConfigError::OutOfRange {
                field: "server_error_floor",
                min: MIN_STATUS.to_string(),
                max: MAX_STATUS.to_string(),
                value: server_error_floor.to_string(),
            });
        }
        Ok(Self { failover_on_bad_request, server_error_floor })
    }

    /// A policy that fails over only on `5xx` responses.
    #[must_use]
    pub fn server_errors_only() -> Self {
        Self { failover_on_bad_request: false, server_error_floor: DEFAULT_SERVER_ERROR_FLOOR }
    }

    /// Returns whether `400 Bad Request` triggers failover.
    #[must_use]
    pub fn failover_on_bad_request(&self) -> bool {
        self.failover_on_bad_request
    }

    /// Returns the lowest status treated as a server error.
    #[must_use]
    pub fn server_error_floor(&self) -> u16 {
        self.server_error_floor
    }

    /// Returns whether a failure with `status` should fail over.
    #[must_use]
    pub fn is_eligible_status(&self, status: u16) -> bool {
        (self.failover_on_bad_request && status == BAD_REQUEST) || status >= self.server_error_floor
    }

    /// Returns whether `error` should fail over. Errors without a status never do.
    #[must_use]
    pub fn is_eligible(&self, error: &BackendError) -> bool {
        error.status_code().is_some_and(|status| self.is_eligible_status(status))
    }
}
