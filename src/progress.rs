// Progress reporting and cancellation
//
// The pipeline never talks to a UI directly. Callers inject a ProgressSink and
// a Cancellation handle; both are polled/called from the single pipeline thread.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::{broadcast, watch};

/// Severity of a progress message, ordered from chattiest to most severe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Filter directive for `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warn",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

/// Capability the pipeline reports progress through.
///
/// Any `Fn(Severity, &str)` closure is a sink, so tests and front ends can
/// plug in whatever collector they need.
pub trait ProgressSink: Send + Sync {
    fn report(&self, severity: Severity, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(Severity, &str) + Send + Sync,
{
    fn report(&self, severity: Severity, message: &str) {
        self(severity, message)
    }
}

/// Sink that forwards every message to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn report(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Trace => tracing::trace!("{}", message),
            Severity::Debug => tracing::debug!("{}", message),
            Severity::Info => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
    }
}

/// One message emitted by the pipeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub severity: Severity,
    pub message: String,
}

/// Sink that broadcasts [`ProgressEvent`]s to any number of subscribers
///
/// Messages below `min_severity` are dropped before hitting the channel.
pub struct ChannelSink {
    tx: broadcast::Sender<ProgressEvent>,
    min_severity: Severity,
}

impl ChannelSink {
    /// Create a sink with a broadcast buffer of `capacity` events
    pub fn new(capacity: usize, min_severity: Severity) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, min_severity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, severity: Severity, message: &str) {
        if severity < self.min_severity {
            return;
        }
        // Ignore send errors - it's OK if no one is listening
        let _ = self.tx.send(ProgressEvent {
            severity,
            message: message.to_string(),
        });
    }
}

/// Cooperative cancellation signal polled by the pipeline.
///
/// Wraps the receiving side of a `watch` channel; sending `true` on the
/// matching sender requests a stop.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    rx: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// A handle that never fires
    pub fn none() -> Self {
        Self { rx: None }
    }

    pub fn from_watch(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Create a sender/handle pair
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::from_watch(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Debug);
        assert!(Severity::Warning < Severity::Error);
        assert_eq!(Severity::default(), Severity::Info);
        assert_eq!(Severity::Warning.as_filter(), "warn");
    }

    #[test]
    fn test_closure_is_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |severity: Severity, message: &str| {
            seen.lock().unwrap().push((severity, message.to_string()));
        };
        sink.report(Severity::Warning, "missing mesh");
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[(Severity::Warning, "missing mesh".to_string())]
        );
    }

    #[tokio::test]
    async fn test_channel_sink_filters_and_broadcasts() {
        let sink = ChannelSink::new(16, Severity::Info);
        let mut rx = sink.subscribe();

        sink.report(Severity::Debug, "dropped");
        sink.report(Severity::Info, "kept");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.severity, Severity::Info);
        assert_eq!(event.message, "kept");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancellation_follows_watch() {
        let (tx, cancel) = Cancellation::channel();
        assert!(!cancel.is_cancelled());
        tx.send(true).unwrap();
        assert!(cancel.is_cancelled());
        assert!(!Cancellation::none().is_cancelled());
    }
}
