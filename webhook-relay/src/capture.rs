//! Sending messages to Sentry's event ingestion.

/// Tag attached to every event sent by the relay.
pub const SOURCE_TAG: (&str, &str) = ("source", "issue-assigner");

/// Fire-and-forget sink for test events.
pub trait EventCapture: Send + Sync {
    fn capture_message(&self, message: &str);
}

/// Captures through the process-wide Sentry client set up by `sentry::init`.
///
/// Without an initialised client the call is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct SentryCapture;

impl EventCapture for SentryCapture {
    fn capture_message(&self, message: &str) {
        let event_id = sentry::with_scope(
            |scope| scope.set_tag(SOURCE_TAG.0, SOURCE_TAG.1),
            || sentry::capture_message(message, sentry::Level::Error),
        );
        tracing::debug!(event_id = %event_id, "captured test event");
    }
}
