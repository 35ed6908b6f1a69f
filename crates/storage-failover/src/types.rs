//! Common types shared by the client, requests and backends.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{backend::BackendCall, backend::StorageBackend, error::FailoverError};

/// Name of the request parameter that selects the bucket.
///
/// The bucket is owned by the failover proxy: it is injected into every
/// backend call and callers may not set it themselves.
pub const BUCKET_PARAM: &str = "Bucket";

/// A storage operation supported by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// Store an object.
    Put,
    /// Remove a single object.
    Delete,
    /// Remove several objects in one call.
    DeleteMany,
    /// List objects in a bucket.
    List,
    /// Fetch an object.
    Get,
}

impl Operation {
    /// All operations, in declaration order.
    pub const ALL: [Operation; 5] =
        [Operation::Put, Operation::Delete, Operation::DeleteMany, Operation::List, Operation::Get];

    /// Returns the S3-style method name (`putObject`, `deleteObjects`, ...).
    #[must_use]
    pub fn method_name(self) -> &'static str {
        match self {
            Self::Put => "putObject",
            Self::Delete => "deleteObject",
            Self::DeleteMany => "deleteObjects",
            Self::List => "listObjects",
            Self::Get => "getObject",
        }
    }

    /// Returns the short name (`put`, `delete_many`, ...).
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Delete => "delete",
            Self::DeleteMany => "delete_many",
            Self::List => "list",
            Self::Get => "get",
        }
    }

    /// Issues this operation on `backend`, returning an unsent call.
    pub fn issue(self, backend: &dyn StorageBackend) -> Box<dyn BackendCall> {
        match self {
            Self::Put => backend.put_object(),
            Self::Delete => backend.delete_object(),
            Self::DeleteMany => backend.delete_objects(),
            Self::List => backend.list_objects(),
            Self::Get => backend.get_object(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.method_name() == s || op.short_name() == s)
            .ok_or_else(|| UnknownOperation(s.to_owned()))
    }
}

/// Returned when parsing an [`Operation`] from an unrecognized name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown operation: {0}")]
pub struct UnknownOperation(pub String);

/// Which of the two backends produced an event or settled a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendRole {
    /// The primary backend.
    Primary,
    /// The secondary backend, reached only after failover.
    Secondary,
}

impl fmt::Display for BackendRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// Caller-supplied parameters forwarded with a backend call.
///
/// Keys follow the backend's naming (`Key`, `Prefix`, `ContentType`, ...).
/// The [`BUCKET_PARAM`] key is reserved; the proxy fills it in for whichever
/// backend is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParams(BTreeMap<String, String>);

impl RequestParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a parameter, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns whether `key` is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the bucket parameter, if set.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.get(BUCKET_PARAM)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether no parameters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns a copy targeted at `bucket`.
    ///
    /// Fails if the caller already set the bucket.
    pub(crate) fn for_bucket(&self, bucket: &str) -> Result<Self, FailoverError> {
        if self.contains(BUCKET_PARAM) {
            return Err(FailoverError::reserved_parameter_used(BUCKET_PARAM));
        }
        Ok(self.clone().with(BUCKET_PARAM, bucket))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parses_both_spellings() {
        for op in Operation::ALL {
            assert_eq!(op.method_name().parse::<Operation>().unwrap(), op);
            assert_eq!(op.short_name().parse::<Operation>().unwrap(), op);
        }
        assert_eq!("deleteObjects".parse::<Operation>().unwrap(), Operation::DeleteMany);
    }

    #[test]
    fn test_operation_rejects_unknown_name() {
        let err = "copyObject".parse::<Operation>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown operation: copyObject");
    }

    #[test]
    fn test_params_for_bucket_injects_bucket() {
        let params = RequestParams::new().with("Key", "a.txt");
        let targeted = params.for_bucket("bucket1").unwrap();

        assert_eq!(targeted.bucket(), Some("bucket1"));
        assert_eq!(targeted.get("Key"), Some("a.txt"));
        // The caller's copy is left untouched.
        assert_eq!(params.bucket(), None);
    }

    #[test]
    fn test_params_for_bucket_rejects_override() {
        let params = RequestParams::new().with(BUCKET_PARAM, "mine");
        let err = params.for_bucket("bucket1").unwrap_err();

        assert!(matches!(err, FailoverError::ReservedParameterUsed { parameter: "Bucket" }));
    }

    #[test]
    fn test_params_deserialize_from_map() {
        let params: RequestParams =
            serde_json::from_str(r#"{"Key": "photos/1.jpg", "ContentType": "image/jpeg"}"#)
                .unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("ContentType"), Some("image/jpeg"));
        assert_eq!(
            params.iter().collect::<Vec<_>>(),
            vec![("ContentType", "image/jpeg"), ("Key", "photos/1.jpg")]
        );
    }
}
