//! Per-operation failover state machine.
//!
//! A [`Request`] wraps one logical storage operation. It forwards the call to
//! the primary backend, relays lifecycle events to the caller, and when the
//! primary fails with a failover-eligible error it replays the operation
//! against the secondary backend, exactly once.
//!
//! # State Machine
//!
//! ```text
//! ┌────────────────┐  send  ┌─────────────┐  eligible error  ┌───────────────────┐
//! │ PrimaryPending │ ─────→ │ PrimarySent │ ───────────────→ │ FailoverTriggered │
//! └────────────────┘        └─────────────┘                  └───────────────────┘
//!                                 │                                    │ resend
//!                                 │ settled                            ↓
//!                                 │                          ┌───────────────┐
//!                                 │                          │ SecondarySent │
//!                                 │                          └───────────────┘
//!                                 ↓                                    │ settled
//!                       ┌──────────────────────┐                       │
//!                       │ Succeeded / Failed   │ ←─────────────────────┘
//!                       └──────────────────────┘
//! ```
//!
//! # Ordering
//!
//! Events are delivered in the order the active call emits them. Once a
//! failover is decided the primary call and its event channel are dropped, so
//! nothing from the primary reaches the caller afterwards. The `failover`
//! event always precedes every event of the secondary call.

use std::{fmt, sync::Arc};

use fail::fail_point;
use tokio::sync::mpsc;

use crate::{
    backend::{BackendCall, CallEvent, EventSender, Response},
    client::ClientInner,
    error::{BackendError, Result},
    event::{CallbackRegistry, Event, EventKind, LifecycleEvent},
    types::{BackendRole, Operation, RequestParams},
};

/// Deferred issue of the same operation against the secondary backend.
pub(crate) type SecondaryCall = Box<dyn FnOnce() -> Box<dyn BackendCall> + Send>;

/// Which backend a request is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Bound to the primary; a failover is still possible.
    Primary,
    /// Failed over to the secondary. Permanent.
    FailedOver,
}

impl Route {
    /// Returns the backend this route sends to.
    #[must_use]
    pub fn role(self) -> BackendRole {
        match self {
            Self::Primary => BackendRole::Primary,
            Self::FailedOver => BackendRole::Secondary,
        }
    }
}

/// Lifecycle state of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Created, not yet sent.
    PrimaryPending,
    /// Sent to the primary, awaiting its outcome.
    PrimarySent,
    /// The primary failed with an eligible error; the secondary call is being issued.
    FailoverTriggered,
    /// Sent to the secondary, awaiting its outcome.
    SecondarySent,
    /// Settled successfully by the given backend.
    Succeeded(BackendRole),
    /// Settled with a failure (or without a success) on the given backend.
    Failed(BackendRole),
}

impl RequestState {
    /// Returns whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    /// Returns the backend that settled the request, if terminal.
    #[must_use]
    pub fn settled_by(self) -> Option<BackendRole> {
        match self {
            Self::Succeeded(role) | Self::Failed(role) => Some(role),
            _ => None,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryPending => write!(f, "primary_pending"),
            Self::PrimarySent => write!(f, "primary_sent"),
            Self::FailoverTriggered => write!(f, "failover_triggered"),
            Self::SecondarySent => write!(f, "secondary_sent"),
            Self::Succeeded(role) => write!(f, "succeeded({role})"),
            Self::Failed(role) => write!(f, "failed({role})"),
        }
    }
}

/// How a single backend call ended.
enum CallFlow {
    Settled(RequestState),
    FailOver { error: BackendError, response: Response },
}

/// One in-flight logical storage operation with at most one failover.
///
/// Created by [`FailoverClient`](crate::FailoverClient). Register handlers with
/// [`on`](Self::on), then drive the request with [`send`](Self::send) or
/// [`send_with`](Self::send_with).
///
/// # Example
///
/// ```no_run
/// # use inferadb_common_storage_failover::{FailoverClient, RequestParams};
/// # async fn run(client: FailoverClient) -> Result<(), Box<dyn std::error::Error>> {
/// let mut request = client.get_object();
/// request
///     .on("success", |event| println!("served by {}", event.backend()))?
///     .on("failover", |event| eprintln!("primary failed: {:?}", event.error()))?
///     .on("error", |event| eprintln!("request failed: {:?}", event.error()))?;
///
/// let state = request.send_with(RequestParams::new().with("Key", "photos/1.jpg")).await?;
/// println!("settled: {state}");
/// # Ok(())
/// # }
/// ```
pub struct Request {
    operation: Operation,
    route: Route,
    state: RequestState,
    active: Option<Box<dyn BackendCall>>,
    secondary: Option<SecondaryCall>,
    callbacks: CallbackRegistry,
    client: Arc<ClientInner>,
}

impl Request {
    pub(crate) fn new(
        operation: Operation,
        primary: Box<dyn BackendCall>,
        secondary: SecondaryCall,
        client: Arc<ClientInner>,
    ) -> Self {
        Self {
            operation,
            route: Route::Primary,
            state: RequestState::PrimaryPending,
            active: Some(primary),
            secondary: Some(secondary),
            callbacks: CallbackRegistry::default(),
            client,
        }
    }

    /// Returns the operation this request performs.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns the backend the request is currently bound to.
    #[must_use]
    pub fn route(&self) -> Route {
        self.route
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Registers `handler` under the event named `event`.
    ///
    /// A later registration under the same name replaces the earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::UnknownEventType`](crate::FailoverError::UnknownEventType)
    /// if `event` is not a recognized event name.
    pub fn on<F>(&mut self, event: &str, handler: F) -> Result<&mut Self>
    where
        F: FnMut(&Event<'_>) + Send + 'static,
    {
        let kind = event.parse::<EventKind>()?;
        Ok(self.on_event(kind, handler))
    }

    /// Registers `handler` under a typed event kind.
    pub fn on_event<F>(&mut self, kind: impl Into<EventKind>, handler: F) -> &mut Self
    where
        F: FnMut(&Event<'_>) + Send + 'static,
    {
        self.callbacks.register(kind.into(), Box::new(handler));
        self
    }

    /// Sends the request without caller parameters.
    ///
    /// See [`send_with`](Self::send_with).
    pub async fn send(&mut self) -> Result<RequestState> {
        self.dispatch(RequestParams::new()).await
    }

    /// Sends the request with `params`, failing over at most once.
    ///
    /// The bucket of the active backend is injected into `params`. Backend
    /// failures are reported through the `error` and `failover` handlers, not
    /// through the returned `Result`. Once the request has been sent, further
    /// calls return the current state without contacting any backend.
    ///
    /// # Errors
    ///
    /// Returns [`ReservedParameterUsed`](crate::FailoverError::ReservedParameterUsed) if
    /// `params` sets the bucket.
    pub async fn send_with(&mut self, params: RequestParams) -> Result<RequestState> {
        self.dispatch(params).await
    }

    #[tracing::instrument(name = "send", skip_all, fields(operation = %self.operation))]
    async fn dispatch(&mut self, params: RequestParams) -> Result<RequestState> {
        if self.state.is_terminal() || self.active.is_none() {
            tracing::debug!(state = %self.state, "request already sent, not resending");
            return Ok(self.state);
        }

        let mut call_params = params.for_bucket(self.active_bucket())?;
        self.client.metrics.record_request();

        loop {
            let role = self.route.role();
            let Some(call) = self.active.take() else {
                return Ok(self.settle(RequestState::Failed(role)));
            };

            self.state = match role {
                BackendRole::Primary => RequestState::PrimarySent,
                BackendRole::Secondary => RequestState::SecondarySent,
            };

            match self.drive(call, call_params, role).await {
                CallFlow::Settled(state) => return Ok(self.settle(state)),
                CallFlow::FailOver { error, response } => {
                    self.fail_over(&error, &response);
                    call_params = params.for_bucket(self.active_bucket())?;
                },
            }
        }
    }

    /// Sends one backend call and relays its events until it ends or fails over.
    async fn drive(
        &mut self,
        call: Box<dyn BackendCall>,
        params: RequestParams,
        role: BackendRole,
    ) -> CallFlow {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut in_flight = call.send(params, EventSender::new(tx));
        let mut dispatched = false;
        let mut succeeded = false;
        let mut failed = false;

        loop {
            tokio::select! {
                biased;

                event = rx.recv() => match event {
                    Some(CallEvent::Lifecycle(kind, response)) => {
                        succeeded |= kind == LifecycleEvent::Success;
                        self.callbacks.dispatch(&Event::lifecycle(kind, role, &response));
                    },
                    Some(CallEvent::Error { error, response }) => {
                        // Only an unsettled primary call may fail over.
                        let settled = succeeded || failed;
                        if self.route == Route::Primary
                            && !settled
                            && self.is_failover_eligible(&error)
                        {
                            return CallFlow::FailOver { error, response };
                        }
                        failed = true;
                        self.deliver_error(role, &error, &response);
                    },
                    None => break,
                },
                () = &mut in_flight, if !dispatched => dispatched = true,
            }
        }

        if succeeded && !failed {
            CallFlow::Settled(RequestState::Succeeded(role))
        } else {
            CallFlow::Settled(RequestState::Failed(role))
        }
    }

    fn is_failover_eligible(&self, error: &BackendError) -> bool {
        fail_point!("failover-eligibility", |forced| forced.as_deref() != Some("false"));
        self.client.config.policy().is_eligible(error)
    }

    fn fail_over(&mut self, error: &BackendError, response: &Response) {
        self.route = Route::FailedOver;
        self.state = RequestState::FailoverTriggered;
        self.client.metrics.record_failover();

        tracing::warn!(
            operation = %self.operation,
            status_code = error.status_code(),
            primary_bucket = self.client.config.primary_bucket(),
            secondary_bucket = self.client.config.secondary_bucket(),
            error = %error,
            "primary backend failed, failing over to secondary",
        );

        if let Some(issue_secondary) = self.secondary.take() {
            self.active = Some(issue_secondary());
        }
        self.callbacks.dispatch(&Event::failover(error, response));
    }

    fn deliver_error(&mut self, role: BackendRole, error: &BackendError, response: &Response) {
        if !self.callbacks.dispatch(&Event::failure(role, error, response)) {
            tracing::debug!(
                backend = %role,
                error = %error,
                "no error handler registered, dropping backend error",
            );
        }
    }

    fn settle(&mut self, state: RequestState) -> RequestState {
        self.state = state;
        self.client.metrics.record_settled(state);
        tracing::debug!(state = %state, "request settled");
        state
    }

    fn active_bucket(&self) -> &str {
        match self.route {
            Route::Primary => self.client.config.primary_bucket(),
            Route::FailedOver => self.client.config.secondary_bucket(),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("operation", &self.operation)
            .field("route", &self.route)
            .field("state", &self.state)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testutil::{MockBackend, client_for};

    #[tokio::test]
    async fn test_success_settles_on_primary() {
        let primary = MockBackend::succeeding();
        let secondary = MockBackend::succeeding();
        let mut request = client_for(&primary, &secondary).put_object();
        assert_eq!(request.state(), RequestState::PrimaryPending);

        let state = request.send().await.unwrap();

        assert_eq!(state, RequestState::Succeeded(BackendRole::Primary));
        assert_eq!(request.route(), Route::Primary);
        assert_eq!(secondary.sends(), 0);
    }

    #[tokio::test]
    async fn test_eligible_error_fails_over_once() {
        let primary = MockBackend::failing(503);
        let secondary = MockBackend::failing(503);
        let mut request = client_for(&primary, &secondary).delete_object();

        let state = request.send().await.unwrap();

        assert_eq!(state, RequestState::Failed(BackendRole::Secondary));
        assert_eq!(request.route(), Route::FailedOver);
        assert_eq!(primary.sends(), 1);
        assert_eq!(secondary.sends(), 1);
    }

    #[tokio::test]
    async fn test_retry_only_call_settles_as_failed() {
        let primary = MockBackend::retrying();
        let secondary = MockBackend::succeeding();
        let mut request = client_for(&primary, &secondary).list_objects();

        let state = request.send().await.unwrap();

        assert_eq!(state, RequestState::Failed(BackendRole::Primary));
        assert_eq!(secondary.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_resend_is_noop() {
        let primary = MockBackend::failing(500);
        let secondary = MockBackend::succeeding();
        let mut request = client_for(&primary, &secondary).get_object();

        let first = request.send().await.unwrap();
        let second = request.send().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(primary.sends(), 1);
        assert_eq!(secondary.sends(), 1);
    }

    #[test]
    fn test_state_helpers() {
        assert!(!RequestState::PrimaryPending.is_terminal());
        assert!(!RequestState::FailoverTriggered.is_terminal());
        assert!(RequestState::Failed(BackendRole::Primary).is_terminal());
        assert_eq!(
            RequestState::Succeeded(BackendRole::Secondary).settled_by(),
            Some(BackendRole::Secondary)
        );
        assert_eq!(RequestState::SecondarySent.settled_by(), None);
        assert_eq!(RequestState::Failed(BackendRole::Primary).to_string(), "failed(primary)");
        assert_eq!(Route::FailedOver.role(), BackendRole::Secondary);
    }

    #[test]
    fn test_debug_lists_registered_handlers() {
        let primary = MockBackend::succeeding();
        let secondary = MockBackend::succeeding();
        let mut request = client_for(&primary, &secondary).put_object();
        request.on("success", |_| {}).unwrap().on("failover", |_| {}).unwrap();

        let debug = format!("{request:?}");
        assert!(debug.contains("failover"), "unexpected debug output: {debug}");
        assert!(debug.contains("success"), "unexpected debug output: {debug}");
    }
}
