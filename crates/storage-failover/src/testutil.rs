//! Shared test utilities for failover testing.
//!
//! Provides a scriptable [`MockBackend`], helpers for wiring two mocks into a
//! [`FailoverClient`], and an [`EventLog`] that records every event a request
//! delivers. Feature-gated behind `testutil` to keep it out of production
//! builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! inferadb-common-storage-failover = { path = "../storage-failover", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use inferadb_common_storage_failover::testutil::{EventLog, MockBackend, client_for};
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    backend::{BackendCall, EventSender, Response, StorageBackend},
    client::FailoverClient,
    config::FailoverConfig,
    error::BackendError,
    event::{Event, EventKind, LifecycleEvent},
    policy::FailoverPolicy,
    request::Request,
    types::{BackendRole, Operation, RequestParams},
};

/// Bucket configured for the primary by [`client_for`].
pub const PRIMARY_BUCKET: &str = "bucket1";

/// Bucket configured for the secondary by [`client_for`].
pub const SECONDARY_BUCKET: &str = "bucket2";

/// How every call issued by a [`MockBackend`] behaves when sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `send`, `httpData` (get only), `extractData`, `success`, `complete`.
    Succeed,
    /// `send`, `extractError`, `error` with `status`, `complete`.
    Fail {
        /// Status code carried by the error and the response.
        status: u16,
    },
    /// `send`, `error` without a status code, `complete`.
    FailWithoutStatus,
    /// `send`, `retry`, then nothing.
    Retry,
}

struct MockState {
    name: String,
    outcome: Outcome,
    calls: Mutex<HashMap<Operation, usize>>,
    sends: AtomicUsize,
    sent_params: Mutex<Vec<RequestParams>>,
}

/// Scriptable in-memory backend that records what it was asked to do.
///
/// Clones share state, so a test can hand one clone to the client and keep
/// another for assertions. Every response carries the backend's name as its
/// request id.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<MockState>,
}

impl MockBackend {
    /// Creates a mock named `name` whose calls all end with `outcome`.
    #[must_use]
    pub fn new(name: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            state: Arc::new(MockState {
                name: name.into(),
                outcome,
                calls: Mutex::new(HashMap::new()),
                sends: AtomicUsize::new(0),
                sent_params: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A mock whose calls succeed.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::new("mock", Outcome::Succeed)
    }

    /// A mock whose calls fail with `status`.
    #[must_use]
    pub fn failing(status: u16) -> Self {
        Self::new("mock", Outcome::Fail { status })
    }

    /// A mock whose calls retry and then go quiet.
    #[must_use]
    pub fn retrying() -> Self {
        Self::new("mock", Outcome::Retry)
    }

    /// Number of calls issued for `operation`, sent or not.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.state.calls.lock().get(&operation).copied().unwrap_or(0)
    }

    /// Number of calls issued across all operations.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.state.calls.lock().values().sum()
    }

    /// Number of calls that were actually sent.
    #[must_use]
    pub fn sends(&self) -> usize {
        self.state.sends.load(Ordering::SeqCst)
    }

    /// Parameters of every sent call, in send order.
    #[must_use]
    pub fn sent_params(&self) -> Vec<RequestParams> {
        self.state.sent_params.lock().clone()
    }

    fn issue(&self, operation: Operation) -> Box<dyn BackendCall> {
        *self.state.calls.lock().entry(operation).or_insert(0) += 1;
        Box::new(MockCall { operation, state: Arc::clone(&self.state) })
    }
}

impl StorageBackend for MockBackend {
    fn put_object(&self) -> Box<dyn BackendCall> {
        self.issue(Operation::Put)
    }

    fn delete_object(&self) -> Box<dyn BackendCall> {
        self.issue(Operation::Delete)
    }

    fn delete_objects(&self) -> Box<dyn BackendCall> {
        self.issue(Operation::DeleteMany)
    }

    fn list_objects(&self) -> Box<dyn BackendCall> {
        self.issue(Operation::List)
    }

    fn get_object(&self) -> Box<dyn BackendCall> {
        self.issue(Operation::Get)
    }
}

struct MockCall {
    operation: Operation,
    state: Arc<MockState>,
}

#[async_trait]
impl BackendCall for MockCall {
    async fn send(self: Box<Self>, params: RequestParams, events: EventSender) {
        let state = &self.state;
        state.sends.fetch_add(1, Ordering::SeqCst);
        state.sent_params.lock().push(params);

        let response = || Response::new().with_request_id(state.name.clone());
        events.send_started(response());

        match state.outcome {
            Outcome::Succeed => {
                if self.operation == Operation::Get {
                    events.lifecycle(
                        LifecycleEvent::HttpData,
                        response().with_status(200).with_body(state.name.clone()),
                    );
                }
                events.lifecycle(LifecycleEvent::ExtractData, response().with_status(200));
                events.success(response().with_status(200));
                events.complete(response().with_status(200));
            },
            Outcome::Fail { status } => {
                events.lifecycle(LifecycleEvent::ExtractError, response().with_status(status));
                events.error(
                    BackendError::with_status(status, format!("{} failed", state.name)),
                    response().with_status(status),
                );
                events.complete(response().with_status(status));
            },
            Outcome::FailWithoutStatus => {
                events.error(BackendError::new("connection reset"), response());
                events.complete(response());
            },
            Outcome::Retry => {
                events.retry(response().with_retry_count(1));
            },
        }
    }
}

/// Builds a client over `primary` and `secondary` with the default policy.
///
/// Buckets are [`PRIMARY_BUCKET`] and [`SECONDARY_BUCKET`].
#[must_use]
pub fn client_for(primary: &MockBackend, secondary: &MockBackend) -> FailoverClient {
    client_with_policy(primary, secondary, FailoverPolicy::default())
}

/// Builds a client over `primary` and `secondary` with `policy`.
///
/// # Panics
///
/// Panics if the configuration is rejected (should not happen: every field is set).
#[must_use]
pub fn client_with_policy(
    primary: &MockBackend,
    secondary: &MockBackend,
    policy: FailoverPolicy,
) -> FailoverClient {
    let config = FailoverConfig::builder()
        .primary(Arc::new(primary.clone()) as Arc<dyn StorageBackend>)
        .primary_bucket(PRIMARY_BUCKET)
        .secondary(Arc::new(secondary.clone()) as Arc<dyn StorageBackend>)
        .secondary_bucket(SECONDARY_BUCKET)
        .policy(policy)
        .build()
        .expect("test configuration is complete");
    FailoverClient::new(config)
}

/// One event as seen by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Backend that produced the event.
    pub backend: BackendRole,
    /// Request id of the attached response.
    pub request_id: Option<String>,
    /// Status code of the attached error, if any.
    pub error_status: Option<u16>,
}

/// Records every event delivered to a request, in delivery order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a recording handler for every event kind on `request`.
    pub fn attach(&self, request: &mut Request) {
        let kinds = LifecycleEvent::ALL
            .into_iter()
            .map(EventKind::from)
            .chain([EventKind::Error, EventKind::Failover]);
        for kind in kinds {
            let events = Arc::clone(&self.events);
            request.on_event(kind, move |event: &Event<'_>| {
                events.lock().push(RecordedEvent {
                    kind: event.kind(),
                    backend: event.backend(),
                    request_id: event.response().request_id().map(str::to_owned),
                    error_status: event.error().and_then(BackendError::status_code),
                });
            });
        }
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Returns the recorded event names, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|event| event.kind.name()).collect()
    }

    /// Number of recorded events of `kind`.
    #[must_use]
    pub fn count(&self, kind: impl Into<EventKind>) -> usize {
        let kind = kind.into();
        self.events.lock().iter().filter(|event| event.kind == kind).count()
    }
}
