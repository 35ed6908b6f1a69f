//! Operation factory.
//!
//! [`FailoverClient`] exposes the five supported storage operations. Each
//! method issues the call on the primary backend immediately and returns an
//! unsent [`Request`] that knows how to issue the same operation on the
//! secondary backend if it has to fail over.

use std::sync::Arc;

use crate::{
    config::FailoverConfig,
    error::{FailoverError, Result},
    metrics::FailoverMetrics,
    request::Request,
    types::{Operation, RequestParams},
};

/// State shared by a client and every request it creates.
pub(crate) struct ClientInner {
    pub(crate) config: FailoverConfig,
    pub(crate) metrics: FailoverMetrics,
}

/// Storage client that fails over from a primary to a secondary backend.
///
/// Cheap to clone; clones share configuration and metrics.
///
/// # Example
///
/// ```no_run
/// # use inferadb_common_storage_failover::{FailoverClient, FailoverConfig, RequestParams};
/// # async fn run(config: FailoverConfig) -> Result<(), Box<dyn std::error::Error>> {
/// let client = FailoverClient::new(config);
///
/// let mut request = client.put_object();
/// request.on("failover", |event| {
///     eprintln!("primary unavailable: {:?}", event.error());
/// })?;
/// request.send_with(RequestParams::new().with("Key", "reports/q3.csv")).await?;
///
/// let snapshot = client.metrics().snapshot();
/// println!("failover rate: {:.2}", snapshot.failover_rate());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FailoverClient {
    inner: Arc<ClientInner>,
}

impl FailoverClient {
    /// Creates a client from a validated configuration.
    #[must_use]
    pub fn new(config: FailoverConfig) -> Self {
        Self { inner: Arc::new(ClientInner { config, metrics: FailoverMetrics::new() }) }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &FailoverConfig {
        &self.inner.config
    }

    /// Returns the metrics shared by every request from this client.
    #[must_use]
    pub fn metrics(&self) -> &FailoverMetrics {
        &self.inner.metrics
    }

    /// Creates a request that stores an object.
    #[must_use]
    pub fn put_object(&self) -> Request {
        self.start(Operation::Put)
    }

    /// Creates a request that removes one object.
    #[must_use]
    pub fn delete_object(&self) -> Request {
        self.start(Operation::Delete)
    }

    /// Creates a request that removes several objects.
    #[must_use]
    pub fn delete_objects(&self) -> Request {
        self.start(Operation::DeleteMany)
    }

    /// Creates a request that lists objects.
    #[must_use]
    pub fn list_objects(&self) -> Request {
        self.start(Operation::List)
    }

    /// Creates a request that fetches an object.
    #[must_use]
    pub fn get_object(&self) -> Request {
        self.start(Operation::Get)
    }

    /// Creates a request for `operation` chosen at runtime.
    ///
    /// Operations take their parameters at send time, so `args` must be `None`.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::UnsupportedArgument`] if `args` is `Some`.
    /// Nothing is issued on either backend in that case.
    pub fn request(&self, operation: Operation, args: Option<RequestParams>) -> Result<Request> {
        if args.is_some() {
            return Err(FailoverError::unsupported_argument(operation));
        }
        Ok(self.start(operation))
    }

    fn start(&self, operation: Operation) -> Request {
        let primary = operation.issue(self.inner.config.primary().as_ref());
        let secondary_backend = Arc::clone(self.inner.config.secondary());
        let secondary = Box::new(move || operation.issue(secondary_backend.as_ref()));

        tracing::trace!(operation = %operation, "issued call on primary backend");
        Request::new(operation, primary, secondary, Arc::clone(&self.inner))
    }
}

impl std::fmt::Debug for FailoverClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverClient")
            .field("config", &self.inner.config)
            .field("metrics", &self.inner.metrics.snapshot())
            .finish()
    }
}
