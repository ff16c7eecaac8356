//! The future guard: normalizing whatever a collaborator hands back.
//!
//! Collaborators are opaque functions that are *supposed* to return a
//! future. [`Returned`] makes that contract explicit at the call boundary:
//! either the collaborator honored it ([`Returned::Future`]) or it handed
//! back a bare value ([`Returned::Bare`]). [`settle`] awaits the former and
//! rewrites every failure mode into a uniform, descriptive [`Fault`], so
//! downstream diagnostics read the same no matter which collaborator
//! misbehaved.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::fault::Fault;

/// A pinned, boxed, sendable future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// What a collaborator settles with: a value, or a [`Fault`].
pub type Resolved = Result<Value, Fault>;

/// The raw return of a collaborator call, before the guard has vetted it.
///
/// Well-behaved collaborators produce [`Returned::Future`]. The [`Bare`]
/// variant exists for call sites wired through dynamic layers that can
/// violate the contract; [`settle`] turns it into the mandated
/// "expected to return a Promise" failure rather than letting it slip
/// through unnoticed.
///
/// [`Bare`]: Returned::Bare
pub enum Returned {
    /// The collaborator honored the contract and returned a future.
    Future(BoxFuture<Resolved>),
    /// The collaborator returned a bare value instead of a future.
    Bare(Value),
}

impl Returned {
    /// Wrap a future as an honored contract.
    pub fn future<F>(fut: F) -> Self
    where
        F: Future<Output = Resolved> + Send + 'static,
    {
        Self::Future(Box::pin(fut))
    }

    /// Wrap a bare value as a contract violation.
    pub fn bare(value: impl Into<Value>) -> Self {
        Self::Bare(value.into())
    }
}

impl fmt::Debug for Returned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Future(_) => f.write_str("Returned::Future(..)"),
            Self::Bare(value) => f.debug_tuple("Returned::Bare").field(value).finish(),
        }
    }
}

/// Await a collaborator's return, normalizing both failure modes.
///
/// - A future that fails is re-failed with
///   `it was rejected with '<stringified fault>'`.
/// - A bare value fails with
///   `it was expected to return a Promise, but instead it returned <json>`.
/// - A future that succeeds passes its value through unchanged.
pub async fn settle(returned: Returned) -> Resolved {
    match returned {
        Returned::Future(fut) => fut
            .await
            .map_err(|fault| Fault::new(format!("it was rejected with '{fault}'"))),
        Returned::Bare(value) => Err(Fault::new(format!(
            "it was expected to return a Promise, but instead it returned {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn success_passes_through_unchanged() {
        let value = settle(Returned::future(async { Ok(json!({"a": 1})) }))
            .await
            .expect("should resolve");
        assert_eq!(value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn failure_is_rewritten_with_the_stringified_fault() {
        let fault = settle(Returned::future(async { Err(Fault::new("X")) }))
            .await
            .expect_err("should fail");
        assert_eq!(fault.message(), "it was rejected with 'Error: X'");
    }

    #[tokio::test]
    async fn bare_value_fails_with_the_contract_message() {
        let fault = settle(Returned::bare(json!(5)))
            .await
            .expect_err("should fail");
        assert_eq!(
            fault.message(),
            "it was expected to return a Promise, but instead it returned 5"
        );
    }

    #[tokio::test]
    async fn bare_value_renders_as_compact_json() {
        let fault = settle(Returned::bare(json!({"k": [1, 2]})))
            .await
            .expect_err("should fail");
        assert_eq!(
            fault.message(),
            "it was expected to return a Promise, but instead it returned {\"k\":[1,2]}"
        );
    }
}
