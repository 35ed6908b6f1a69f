//! Event names and the per-request callback registry.
//!
//! Callers observe a request through handlers registered per [`EventKind`].
//! The set of kinds is closed: registering under any other name fails with
//! [`FailoverError::UnknownEventType`].
//!
//! | Name | Kind | Delivered |
//! |------|------|-----------|
//! | `send`, `retry`, `extractError`, `extractData`, `success`, `complete`, `httpData` | lifecycle | verbatim from the active backend call |
//! | `error` | proxy | non-eligible primary failures and every secondary failure |
//! | `failover` | proxy | once, when failover is decided, before the secondary call is sent |

use std::{collections::HashMap, fmt, str::FromStr};

use crate::{
    backend::Response,
    error::{BackendError, FailoverError},
    types::BackendRole,
};

/// Lifecycle events forwarded verbatim from the backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The call was dispatched.
    Send,
    /// The backend is retrying the call internally.
    Retry,
    /// The backend is extracting an error from the response.
    ExtractError,
    /// The backend is extracting data from the response.
    ExtractData,
    /// The call succeeded.
    Success,
    /// The call finished, successfully or not.
    Complete,
    /// A chunk of the response body arrived.
    HttpData,
}

impl LifecycleEvent {
    /// All lifecycle events.
    pub const ALL: [LifecycleEvent; 7] = [
        LifecycleEvent::Send,
        LifecycleEvent::Retry,
        LifecycleEvent::ExtractError,
        LifecycleEvent::ExtractData,
        LifecycleEvent::Success,
        LifecycleEvent::Complete,
        LifecycleEvent::HttpData,
    ];
}

/// Every event a caller can register a handler for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A pass-through lifecycle event.
    Lifecycle(LifecycleEvent),
    /// A failure surfaced to the caller.
    Error,
    /// The request is failing over to the secondary backend.
    Failover,
}

impl EventKind {
    /// Returns the canonical event name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Lifecycle(LifecycleEvent::Send) => "send",
            Self::Lifecycle(LifecycleEvent::Retry) => "retry",
            Self::Lifecycle(LifecycleEvent::ExtractError) => "extractError",
            Self::Lifecycle(LifecycleEvent::ExtractData) => "extractData",
            Self::Lifecycle(LifecycleEvent::Success) => "success",
            Self::Lifecycle(LifecycleEvent::Complete) => "complete",
            Self::Lifecycle(LifecycleEvent::HttpData) => "httpData",
            Self::Error => "error",
            Self::Failover => "failover",
        }
    }
}

impl From<LifecycleEvent> for EventKind {
    fn from(event: LifecycleEvent) -> Self {
        Self::Lifecycle(event)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = FailoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "send" => LifecycleEvent::Send.into(),
            "retry" => LifecycleEvent::Retry.into(),
            "extractError" | "extract_error" => LifecycleEvent::ExtractError.into(),
            "extractData" | "extract_data" => LifecycleEvent::ExtractData.into(),
            "success" => LifecycleEvent::Success.into(),
            "complete" => LifecycleEvent::Complete.into(),
            "httpData" | "http_data" => LifecycleEvent::HttpData.into(),
            "error" => Self::Error,
            "failover" => Self::Failover,
            other => return Err(FailoverError::unknown_event_type(other)),
        };
        Ok(kind)
    }
}

/// An event delivered to a caller's handler.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    kind: EventKind,
    backend: BackendRole,
    response: &'a Response,
    error: Option<&'a BackendError>,
}

impl<'a> Event<'a> {
    pub(crate) fn lifecycle(
        kind: LifecycleEvent,
        backend: BackendRole,
        response: &'a Response,
    ) -> Self {
        Self { kind: kind.into(), backend, response, error: None }
    }

    pub(crate) fn failure(
        backend: BackendRole,
        error: &'a BackendError,
        response: &'a Response,
    ) -> Self {
        Self { kind: EventKind::Error, backend, response, error: Some(error) }
    }

    pub(crate) fn failover(error: &'a BackendError, response: &'a Response) -> Self {
        Self {
            kind: EventKind::Failover,
            backend: BackendRole::Primary,
            response,
            error: Some(error),
        }
    }

    /// Returns the event kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the backend that produced the event.
    ///
    /// For `failover` this is always the primary, whose error caused it.
    #[must_use]
    pub fn backend(&self) -> BackendRole {
        self.backend
    }

    /// Returns the response attached to the event.
    #[must_use]
    pub fn response(&self) -> &'a Response {
        self.response
    }

    /// Returns the backend error for `error` and `failover` events.
    #[must_use]
    pub fn error(&self) -> Option<&'a BackendError> {
        self.error
    }
}

/// A caller-supplied event handler.
pub(crate) type Handler = Box<dyn FnMut(&Event<'_>) + Send>;

/// Per-request mapping from event kind to handler.
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    handlers: HashMap<EventKind, Handler>,
}

impl CallbackRegistry {
    /// Stores `handler` under `kind`, replacing any previous handler.
    pub(crate) fn register(&mut self, kind: EventKind, handler: Handler) {
        if self.handlers.insert(kind, handler).is_some() {
            tracing::debug!(event = %kind, "replaced existing handler");
        }
    }

    /// Invokes the handler for the event's kind. Returns whether one ran.
    pub(crate) fn dispatch(&mut self, event: &Event<'_>) -> bool {
        match self.handlers.get_mut(&event.kind()) {
            Some(handler) => {
                handler(event);
                true
            },
            None => false,
        }
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().map(|kind| kind.name()).collect();
        names.sort_unstable();
        f.debug_struct("CallbackRegistry").field("handlers", &names).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;

    #[test]
    fn test_every_recognized_name_round_trips() {
        let kinds = LifecycleEvent::ALL
            .into_iter()
            .map(EventKind::from)
            .chain([EventKind::Error, EventKind::Failover]);

        for kind in kinds {
            assert_eq!(kind.name().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_snake_case_aliases() {
        assert_eq!(
            "http_data".parse::<EventKind>().unwrap(),
            EventKind::Lifecycle(LifecycleEvent::HttpData)
        );
        assert_eq!(
            "extract_error".parse::<EventKind>().unwrap(),
            EventKind::Lifecycle(LifecycleEvent::ExtractError)
        );
    }

    #[test]
    fn test_unknown_names_rejected() {
        for name in ["whatisthiscraziness", "Success", "", "validate", "build"] {
            let err = name.parse::<EventKind>().unwrap_err();
            assert!(
                matches!(&err, FailoverError::UnknownEventType { name: n } if n == name),
                "unexpected error for {name:?}: {err:?}"
            );
        }
    }

    #[test]
    fn test_registry_dispatches_only_matching_kind() {
        let hits = Arc::new(AtomicU32::new(0));
        let mut registry = CallbackRegistry::default();
        let counter = Arc::clone(&hits);
        registry.register(
            LifecycleEvent::Success.into(),
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );

        let response = Response::new();
        assert!(registry.dispatch(&Event::lifecycle(
            LifecycleEvent::Success,
            BackendRole::Primary,
            &response
        )));
        assert!(!registry.dispatch(&Event::lifecycle(
            LifecycleEvent::Complete,
            BackendRole::Primary,
            &response
        )));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_registry_last_registration_wins() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let mut registry = CallbackRegistry::default();

        let counter = Arc::clone(&first);
        registry.register(
            EventKind::Error,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );
        let counter = Arc::clone(&second);
        registry.register(
            EventKind::Error,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );

        let error = BackendError::with_status(404, "missing");
        let response = Response::new();
        assert!(registry.dispatch(&Event::failure(BackendRole::Primary, &error, &response)));
        assert!(!registry.dispatch(&Event::failover(&error, &response)));

        assert_eq!(first.load(Ordering::Relaxed), 0);
        assert_eq!(second.load(Ordering::Relaxed), 1);
    }
}
