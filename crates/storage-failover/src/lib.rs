//! Failover-aware proxy for object-storage backends.
//!
//! This crate wraps two object-storage backends, a primary and a secondary,
//! behind a single client. Every operation goes to the primary first. When the
//! primary fails with a failover-eligible error (by default `400` or any
//! `5xx`), the operation is replayed once against the secondary, with the
//! secondary's bucket substituted. Callers observe the whole exchange through
//! named event handlers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Caller                               │
//! │        on("success") / on("error") / on("failover")         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   FailoverClient                            │
//! │    put_object │ delete_object │ delete_objects │ ...        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      Request                                │
//! │   bucket injection, event relay, at most one failover       │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │   primary StorageBackend     │   secondary StorageBackend   │
//! │        (bucket A)            │  (bucket B, after failover)  │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use inferadb_common_storage_failover::{
//!     FailoverClient, FailoverConfig, RequestParams, StorageBackend,
//! };
//!
//! async fn upload(
//!     primary: Arc<dyn StorageBackend>,
//!     secondary: Arc<dyn StorageBackend>,
//! ) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FailoverConfig::builder()
//!         .primary(primary)
//!         .primary_bucket("assets-us-east")
//!         .secondary(secondary)
//!         .secondary_bucket("assets-us-west")
//!         .build()?;
//!     let client = FailoverClient::new(config);
//!
//!     let mut request = client.put_object();
//!     request
//!         .on("success", |event| println!("stored on {}", event.backend()))?
//!         .on("error", |event| eprintln!("upload failed: {:?}", event.error()))?;
//!
//!     let state = request.send_with(RequestParams::new().with("Key", "logo.png")).await?;
//!     println!("request settled as {state}");
//!     Ok(())
//! }
//! ```
//!
//! # Events
//!
//! Lifecycle events (`send`, `retry`, `extractError`, `extractData`,
//! `success`, `complete`, `httpData`) are forwarded verbatim from whichever
//! backend is active. `error` carries failures the proxy does not recover
//! from, and `failover` fires once when the request switches backends. See
//! [`event`] for the full table.
//!
//! # Error Handling
//!
//! Misuse of the API (missing configuration, unknown event names, setting the
//! reserved `Bucket` parameter, passing arguments to an operation) is returned
//! synchronously as a [`FailoverError`]. Backend failures are never returned;
//! they are delivered as [`BackendError`]s to the `error` and `failover`
//! handlers.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with a scriptable mock backend, client
//!   factories and an event recorder. Enable this in `[dev-dependencies]` for integration tests.
//! - **`failpoints`**: Enables `fail` crate injection points (`failover-eligibility`).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod policy;
pub mod request;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::{BackendCall, CallEvent, EventSender, Response, StorageBackend};
pub use client::FailoverClient;
pub use config::FailoverConfig;
pub use error::{BackendError, ConfigError, FailoverError, Result};
pub use event::{Event, EventKind, LifecycleEvent};
pub use metrics::{FailoverMetrics, FailoverMetricsSnapshot};
pub use policy::{DEFAULT_SERVER_ERROR_FLOOR, FailoverPolicy};
pub use request::{Request, RequestState, Route};
pub use types::{BUCKET_PARAM, BackendRole, Operation, RequestParams, UnknownOperation};
