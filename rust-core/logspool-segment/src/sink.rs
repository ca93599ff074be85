// SPDX-License-Identifier: PMPL-1.0-or-later
//
// logspool - Event sinks and failure reporting
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The spool sits in a chain of event consumers: the host hands each event to
// a `SinkChain`, the spool writes it, and the event always continues to the
// next sink whatever the spool did with it.
//
// When the spool cannot write it tells a `FailureReporter` once and then
// stays quiet until it is re-enabled.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::error;

use crate::error::SpoolFailure;
use crate::event::LogEvent;

/// Tracing target used by [`TracingReporter`].
pub const FALLBACK_TARGET: &str = "logspool::fallback";

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// Something that consumes log events.
pub trait EventSink {
    fn emit(&mut self, event: &LogEvent);
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: &LogEvent) {
        (**self).emit(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &LogEvent) {
        (**self).emit(event);
    }
}

/// Two sinks in order: `head` first, then `next`, unconditionally.
#[derive(Debug)]
pub struct SinkChain<H, N> {
    head: H,
    next: N,
}

impl<H: EventSink, N: EventSink> SinkChain<H, N> {
    pub fn new(head: H, next: N) -> Self {
        Self { head, next }
    }

    pub fn head(&self) -> &H {
        &self.head
    }

    pub fn head_mut(&mut self) -> &mut H {
        &mut self.head
    }

    pub fn next(&self) -> &N {
        &self.next
    }

    pub fn into_parts(self) -> (H, N) {
        (self.head, self.next)
    }
}

impl<H: EventSink, N: EventSink> EventSink for SinkChain<H, N> {
    fn emit(&mut self, event: &LogEvent) {
        self.head.emit(event);
        self.next.emit(event);
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F: FnMut(&LogEvent)> EventSink for FnSink<F> {
    fn emit(&mut self, event: &LogEvent) {
        (self.0)(event);
    }
}

/// A sink that drops everything. Terminates a chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &LogEvent) {}
}

// ---------------------------------------------------------------------------
// FailureReporter
// ---------------------------------------------------------------------------

/// Receives write-side failures. Called at most once per disable.
pub trait FailureReporter: Send + Sync {
    fn report(&self, failure: &SpoolFailure);
}

/// Reports through `tracing` at error level on [`FALLBACK_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, failure: &SpoolFailure) {
        error!(target: FALLBACK_TARGET, error = %failure, "Spooling disabled");
    }
}

/// Keeps every reported failure. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    failures: Arc<Mutex<Vec<SpoolFailure>>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<SpoolFailure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FailureReporter for CollectingReporter {
    fn report(&self, failure: &SpoolFailure) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;
    use std::path::PathBuf;

    #[test]
    fn test_chain_forwards_to_both() {
        let mut seen_head = Vec::new();
        let mut seen_next = Vec::new();
        {
            let mut chain = SinkChain::new(
                FnSink(|e: &LogEvent| seen_head.push(e.severity)),
                FnSink(|e: &LogEvent| seen_next.push(e.severity)),
            );
            chain.emit(&LogEvent::new(Severity::Warning, "a"));
            chain.emit(&LogEvent::new(Severity::Debug1, "b"));
        }
        assert_eq!(seen_head, vec![Severity::Warning, Severity::Debug1]);
        assert_eq!(seen_next, seen_head);
    }

    #[test]
    fn test_collecting_reporter_shares_storage() {
        let reporter = CollectingReporter::new();
        let clone = reporter.clone();
        clone.report(&SpoolFailure::Config {
            dir: PathBuf::from("/nope"),
            message: "missing".to_string(),
        });
        assert_eq!(reporter.len(), 1);
        assert!(matches!(reporter.failures()[0], SpoolFailure::Config { .. }));
    }

    #[test]
    fn test_null_sink_accepts_anything() {
        let mut sink = NullSink;
        sink.emit(&LogEvent::new(Severity::Panic, "ignored"));
    }
}
