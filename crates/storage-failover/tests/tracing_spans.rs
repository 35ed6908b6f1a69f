//! Integration test verifying that `#[instrument]` annotations and failover
//! logging produce the expected spans and events.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use inferadb_common_storage_failover::testutil::{MockBackend, Outcome, client_for};
use tracing::{Level, Subscriber};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer — records span names and event levels
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
    levels: Arc<Mutex<Vec<Level>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }

    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        self.levels.lock().expect("lock poisoned").push(*event.metadata().level());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let primary = MockBackend::succeeding();
    let secondary = MockBackend::succeeding();
    client_for(&primary, &secondary).put_object().send().await.expect("send should succeed");

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "send"), "expected a 'send' span, got: {recorded:?}");
}

#[tokio::test]
async fn failover_logs_warning() {
    let collector = SpanCollector::default();
    let levels = Arc::clone(&collector.levels);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let primary = MockBackend::new("primary", Outcome::Fail { status: 500 });
    let secondary = MockBackend::new("secondary", Outcome::Succeed);
    client_for(&primary, &secondary).get_object().send().await.expect("send should succeed");

    let recorded = levels.lock().expect("lock poisoned");
    assert_eq!(
        recorded.iter().filter(|level| **level == Level::WARN).count(),
        1,
        "expected exactly one warning, got: {recorded:?}"
    );
}

#[tokio::test]
async fn primary_success_logs_no_warning() {
    let collector = SpanCollector::default();
    let levels = Arc::clone(&collector.levels);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let primary = MockBackend::succeeding();
    let secondary = MockBackend::succeeding();
    client_for(&primary, &secondary).list_objects().send().await.expect("send should succeed");

    let recorded = levels.lock().expect("lock poisoned");
    assert!(!recorded.contains(&Level::WARN), "unexpected warning: {recorded:?}");
}
