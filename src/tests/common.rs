//! Shared fixtures for the protocol tests.
//!
//! This module contains:
//! - `CallCount`: invocation counter for collaborators
//! - `Trace`: ordered log of observed events across handlers and steps
//! - Source factories: `rejecting`, `resolving`, `flaky_source`
//! - Step factories: `tracing_step`, `failing_once_step`

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::fault::Fault;
use crate::promised::{BoxFuture, Resolved};
use crate::sequencer::{step, Context, Step};

// ============================================================================
// Observation helpers
// ============================================================================

/// Counts how many times a collaborator was invoked.
#[derive(Clone, Default)]
pub struct CallCount(Arc<AtomicUsize>);

impl CallCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ordered log of events observed during a run.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().expect("trace lock").push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().expect("trace lock").clone()
    }
}

// ============================================================================
// Source factories
// ============================================================================

/// A source that always rejects with `message`, counting invocations.
pub fn rejecting(
    count: &CallCount,
    message: &str,
) -> impl Fn() -> BoxFuture<Resolved> + Send + Sync + 'static {
    let count = count.clone();
    let message = message.to_owned();
    move || {
        count.bump();
        let message = message.clone();
        Box::pin(async move { Err(Fault::new(message)) }) as BoxFuture<Resolved>
    }
}

/// A source that always resolves with `value`, counting invocations.
pub fn resolving(
    count: &CallCount,
    value: Value,
) -> impl Fn() -> BoxFuture<Resolved> + Send + Sync + 'static {
    let count = count.clone();
    move || {
        count.bump();
        let value = value.clone();
        Box::pin(async move { Ok(value) }) as BoxFuture<Resolved>
    }
}

/// A source that rejects on its first `failures` invocations, then resolves
/// with `value`.
pub fn flaky_source(
    count: &CallCount,
    failures: usize,
    value: Value,
) -> impl Fn() -> BoxFuture<Resolved> + Send + Sync + 'static {
    let count = count.clone();
    move || {
        count.bump();
        let attempt = count.get();
        let value = value.clone();
        Box::pin(async move {
            if attempt <= failures {
                Err(Fault::new(format!("transient #{attempt}")))
            } else {
                Ok(value)
            }
        }) as BoxFuture<Resolved>
    }
}

// ============================================================================
// Step factories
// ============================================================================

/// A step that logs its invocation and resolves with `resolution`.
pub fn tracing_step(trace: &Trace, name: &str, resolution: Value) -> Step {
    let trace = trace.clone();
    let name = name.to_owned();
    step(move |_context: &Context| {
        trace.push(name.clone());
        let resolution = resolution.clone();
        async move { Ok(resolution) }
    })
}

/// A step that fails with `message` on its first invocation, then resolves
/// with `resolution`. Logs every invocation.
pub fn failing_once_step(trace: &Trace, name: &str, message: &str, resolution: Value) -> Step {
    let trace = trace.clone();
    let name = name.to_owned();
    let message = message.to_owned();
    let failed = Arc::new(AtomicBool::new(false));
    step(move |_context: &Context| {
        trace.push(name.clone());
        let first = !failed.swap(true, Ordering::SeqCst);
        let message = message.clone();
        let resolution = resolution.clone();
        async move {
            if first {
                Err(Fault::new(message))
            } else {
                Ok(resolution)
            }
        }
    })
}
