//! Backend capability consumed by the failover proxy.
//!
//! A storage backend exposes one method per [`Operation`](crate::Operation),
//! each returning an unsent [`BackendCall`]. Sending a call reports its outcome
//! as a sequence of [`CallEvent`]s through an [`EventSender`], in the order the
//! backend observes them.
//!
//! # Implementing a Backend
//!
//! ```
//! use async_trait::async_trait;
//! use inferadb_common_storage_failover::{
//!     BackendCall, EventSender, RequestParams, Response, StorageBackend,
//! };
//!
//! struct AlwaysOk;
//!
//! #[async_trait]
//! impl BackendCall for AlwaysOk {
//!     async fn send(self: Box<Self>, _params: RequestParams, events: EventSender) {
//!         events.send_started(Response::new());
//!         events.success(Response::new().with_status(200));
//!         events.complete(Response::new().with_status(200));
//!     }
//! }
//!
//! struct OkBackend;
//!
//! impl StorageBackend for OkBackend {
//!     fn put_object(&self) -> Box<dyn BackendCall> { Box::new(AlwaysOk) }
//!     fn delete_object(&self) -> Box<dyn BackendCall> { Box::new(AlwaysOk) }
//!     fn delete_objects(&self) -> Box<dyn BackendCall> { Box::new(AlwaysOk) }
//!     fn list_objects(&self) -> Box<dyn BackendCall> { Box::new(AlwaysOk) }
//!     fn get_object(&self) -> Box<dyn BackendCall> { Box::new(AlwaysOk) }
//! }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{error::BackendError, event::LifecycleEvent, types::RequestParams};

/// An object-storage service endpoint.
///
/// Issuing an operation only allocates the call; nothing is sent until
/// [`BackendCall::send`] is awaited.
pub trait StorageBackend: Send + Sync {
    /// Allocates a `putObject` call.
    fn put_object(&self) -> Box<dyn BackendCall>;

    /// Allocates a `deleteObject` call.
    fn delete_object(&self) -> Box<dyn BackendCall>;

    /// Allocates a `deleteObjects` call.
    fn delete_objects(&self) -> Box<dyn BackendCall>;

    /// Allocates a `listObjects` call.
    fn list_objects(&self) -> Box<dyn BackendCall>;

    /// Allocates a `getObject` call.
    fn get_object(&self) -> Box<dyn BackendCall>;
}

/// A single in-flight backend call.
#[async_trait]
pub trait BackendCall: Send {
    /// Sends the call with `params` and reports its outcome through `events`.
    ///
    /// The call ends when this future completes and `events` is dropped.
    /// Events sent after the receiving side has been discarded are ignored.
    async fn send(self: Box<Self>, params: RequestParams, events: EventSender);
}

/// Outcome event reported by a backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// A pass-through lifecycle event.
    Lifecycle(LifecycleEvent, Response),
    /// The call failed.
    Error {
        /// The failure.
        error: BackendError,
        /// Whatever response the backend had at the time of failure.
        response: Response,
    },
}

/// Response metadata attached to every event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    status_code: Option<u16>,
    request_id: Option<String>,
    body: Option<Bytes>,
    retry_count: u32,
}

impl Response {
    /// Creates an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP status code.
    #[must_use]
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Sets the backend request identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Sets the response body (or the current chunk for `httpData`).
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets how many times the backend retried internally.
    #[must_use]
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Returns the backend request identifier.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Returns the response body.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns the number of internal backend retries.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }
}

/// Sending half of a call's event channel.
///
/// Cloneable so that backends which hand work to a spawned task can report
/// from there; the call is considered finished once every clone is dropped.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<CallEvent>,
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<CallEvent>) -> Self {
        Self { tx }
    }

    /// Reports an event. Returns `false` if the proxy has discarded the call.
    pub fn emit(&self, event: CallEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Reports a lifecycle event.
    pub fn lifecycle(&self, kind: LifecycleEvent, response: Response) -> bool {
        self.emit(CallEvent::Lifecycle(kind, response))
    }

    /// Reports `send`.
    pub fn send_started(&self, response: Response) -> bool {
        self.lifecycle(LifecycleEvent::Send, response)
    }

    /// Reports `retry`.
    pub fn retry(&self, response: Response) -> bool {
        self.lifecycle(LifecycleEvent::Retry, response)
    }

    /// Reports `success`.
    pub fn success(&self, response: Response) -> bool {
        self.lifecycle(LifecycleEvent::Success, response)
    }

    /// Reports `complete`.
    pub fn complete(&self, response: Response) -> bool {
        self.lifecycle(LifecycleEvent::Complete, response)
    }

    /// Reports an error.
    pub fn error(&self, error: BackendError, response: Response) -> bool {
        self.emit(CallEvent::Error { error, response })
    }

    /// Returns whether the proxy has stopped listening to this call.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_builder() {
        let response = Response::new()
            .with_status(200)
            .with_request_id("req-1")
            .with_body(Bytes::from_static(b"hello"))
            .with_retry_count(2);

        assert_eq!(response.status_code(), Some(200));
        assert_eq!(response.request_id(), Some("req-1"));
        assert_eq!(response.body().map(Bytes::as_ref), Some(&b"hello"[..]));
        assert_eq!(response.retry_count(), 2);
    }

    #[test]
    fn test_event_sender_reports_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = EventSender::new(tx);

        assert!(events.send_started(Response::new()));
        assert!(events.error(BackendError::with_status(500, "boom"), Response::new()));

        assert_eq!(
            rx.try_recv().ok(),
            Some(CallEvent::Lifecycle(LifecycleEvent::Send, Response::new()))
        );
        assert!(matches!(rx.try_recv(), Ok(CallEvent::Error { .. })));
    }

    #[test]
    fn test_event_sender_detects_discarded_call() {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = EventSender::new(tx);
        drop(rx);

        assert!(events.is_closed());
        assert!(!events.success(Response::new()));
    }
}
