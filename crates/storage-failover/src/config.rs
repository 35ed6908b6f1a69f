//! Configuration for the failover client.
//!
//! [`FailoverConfig`] pairs each backend with the bucket it serves. All four
//! fields are required; the builder reports the first one that is missing.

use std::{fmt, sync::Arc};

use crate::{
    backend::StorageBackend,
    error::{FailoverError, Result},
    policy::FailoverPolicy,
};

/// Configuration for [`FailoverClient`](crate::FailoverClient).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use inferadb_common_storage_failover::{FailoverConfig, FailoverPolicy, StorageBackend};
///
/// fn build(
///     primary: Arc<dyn StorageBackend>,
///     secondary: Arc<dyn StorageBackend>,
/// ) -> Result<FailoverConfig, Box<dyn std::error::Error>> {
///     let config = FailoverConfig::builder()
///         .primary(primary)
///         .primary_bucket("assets-us-east")
///         .secondary(secondary)
///         .secondary_bucket("assets-us-west")
///         .policy(FailoverPolicy::server_errors_only())
///         .build()?;
///     Ok(config)
/// }
/// ```
#[derive(Clone)]
pub struct FailoverConfig {
    primary: Arc<dyn StorageBackend>,
    primary_bucket: String,
    secondary: Arc<dyn StorageBackend>,
    secondary_bucket: String,
    policy: FailoverPolicy,
}

#[bon::bon]
impl FailoverConfig {
    /// Creates a configuration, checking that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::MissingConfiguration`] naming the first of
    /// `primary`, `primary_bucket`, `secondary`, `secondary_bucket` that is
    /// absent (or, for buckets, empty).
    #[builder]
    pub fn new(
        primary: Option<Arc<dyn StorageBackend>>,
        #[builder(into)] primary_bucket: Option<String>,
        secondary: Option<Arc<dyn StorageBackend>>,
        #[builder(into)] secondary_bucket: Option<String>,
        #[builder(default)] policy: FailoverPolicy,
    ) -> Result<Self> {
        let primary = primary.ok_or(FailoverError::missing_configuration("primary"))?;
        let primary_bucket = non_empty(primary_bucket, "primary_bucket")?;
        let secondary = secondary.ok_or(FailoverError::missing_configuration("secondary"))?;
        let secondary_bucket = non_empty(secondary_bucket, "secondary_bucket")?;

        Ok(Self { primary, primary_bucket, secondary, secondary_bucket, policy })
    }

    /// Returns the primary backend.
    #[must_use]
    pub fn primary(&self) -> &Arc<dyn StorageBackend> {
        &self.primary
    }

    /// Returns the bucket used on the primary backend.
    #[must_use]
    pub fn primary_bucket(&self) -> &str {
        &self.primary_bucket
    }

    /// Returns the secondary backend.
    #[must_use]
    pub fn secondary(&self) -> &Arc<dyn StorageBackend> {
        &self.secondary
    }

    /// Returns the bucket used on the secondary backend.
    #[must_use]
    pub fn secondary_bucket(&self) -> &str {
        &self.secondary_bucket
    }

    /// Returns the failover eligibility policy.
    #[must_use]
    pub fn policy(&self) -> &FailoverPolicy {
        &self.policy
    }
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<String> {
    value.filter(|v| !v.is_empty()).ok_or(FailoverError::missing_configuration(field))
}

impl fmt::Debug for FailoverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailoverConfig")
            .field("primary_bucket", &self.primary_bucket)
            .field("secondary_bucket", &self.secondary_bucket)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testutil::MockBackend;

    fn backend() -> Arc<dyn StorageBackend> {
        Arc::new(MockBackend::succeeding())
    }

    #[test]
    fn test_valid_config() {
        let config = FailoverConfig::builder()
            .primary(backend())
            .primary_bucket("bucket1")
            .secondary(backend())
            .secondary_bucket("bucket2")
            .build()
            .unwrap();

        assert_eq!(config.primary_bucket(), "bucket1");
        assert_eq!(config.secondary_bucket(), "bucket2");
        assert_eq!(config.policy(), &FailoverPolicy::default());
    }

    #[test]
    fn test_missing_primary() {
        let err = FailoverConfig::builder()
            .primary_bucket("bucket1")
            .secondary(backend())
            .secondary_bucket("bucket2")
            .build()
            .unwrap_err();

        assert!(matches!(err, FailoverError::MissingConfiguration { field: "primary" }));
    }

    #[test]
    fn test_missing_secondary_bucket() {
        let err = FailoverConfig::builder()
            .primary(backend())
            .primary_bucket("bucket1")
            .secondary(backend())
            .build()
            .unwrap_err();

        assert!(matches!(err, FailoverError::MissingConfiguration { field: "secondary_bucket" }));
    }

    #[test]
    fn test_empty_bucket_counts_as_missing() {
        let err = FailoverConfig::builder()
            .primary(backend())
            .primary_bucket("")
            .secondary(backend())
            .secondary_bucket("bucket2")
            .build()
            .unwrap_err();

        assert!(matches!(err, FailoverError::MissingConfiguration { field: "primary_bucket" }));
    }

    #[test]
    fn test_debug_omits_backends() {
        let config = FailoverConfig::builder()
            .primary(backend())
            .primary_bucket("bucket1")
            .secondary(backend())
            .secondary_bucket("bucket2")
            .build()
            .unwrap();

        let debug = format!("{config:?}");
        assert!(debug.contains("bucket1"), "unexpected debug output: {debug}");
        assert!(debug.contains("bucket2"), "unexpected debug output: {debug}");
    }
}
