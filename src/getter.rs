//! Fallback-chasing value resolution with verification and
//! back-synchronization.
//!
//! A [`Getter`] tries a primary source, then secondary sources in
//! registration order, accepting the first value the optional verifier
//! approves. Once a value is accepted, every registered synchronizer runs
//! with it (typically to write the fallback value back into the primary
//! store). Every failure along the way is recorded in a per-run
//! [`Ledger`], and if no
//! source succeeds the whole run fails with one composite fault enumerating
//! the entire attempt sequence.
//!
//! Configuration is immutable once built; all the mutable bookkeeping lives
//! in a per-call [`Run`] value, so one `Getter` can be reused for fresh
//! attempts back to back.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::fault::Fault;
use crate::ledger::Ledger;
use crate::promised::{settle, Resolved, Returned};
use crate::quitter::Quitter;

/// A way to obtain a value: an opaque operation returning a future.
pub type Source = Box<dyn Fn() -> Returned + Send + Sync>;

/// An operation invoked with the accepted value to reconcile the primary
/// store after a fallback was used.
pub type Synchronizer = Box<dyn Fn(Value) -> Returned + Send + Sync>;

/// A predicate deciding whether a resolved value is acceptable.
pub type Verifier = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// Usage errors: programmer misuse of the configuration or invocation API.
///
/// These are raised synchronously at the violating call, never deferred
/// into a future. Treat them as bugs, not recoverable runtime conditions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GetterError {
    /// `build` was called without a primary source.
    #[error("a primary source is required before `get` can run")]
    MissingPrimarySource,

    /// The primary source was registered more than once.
    #[error("the primary source can only be registered once")]
    PrimarySourceAlreadySet,

    /// The verifier was registered more than once.
    #[error("the verifier can only be registered once")]
    VerifierAlreadySet,

    /// `get` was called while a previous `get` future was still unsettled.
    #[error("`get` was called again before the first call to `get` completed. A getter runs one attempt at a time; await the first call before starting another")]
    AlreadyInFlight,
}

// ============================================================================
// Builder
// ============================================================================

/// Fluent assembly of an immutable [`Getter`] configuration.
///
/// Setters only accumulate; set-once violations and the missing-primary
/// check are reported when the configuration is finalized by
/// [`GetterBuilder::build`].
pub struct GetterBuilder {
    name: String,
    primary: Option<Source>,
    primary_set_twice: bool,
    secondaries: Vec<Source>,
    verifier: Option<Verifier>,
    verifier_set_twice: bool,
    synchronizers: Vec<Synchronizer>,
    ignore_sync_errors: bool,
}

impl GetterBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary: None,
            primary_set_twice: false,
            secondaries: Vec::new(),
            verifier: None,
            verifier_set_twice: false,
            synchronizers: Vec::new(),
            ignore_sync_errors: false,
        }
    }

    /// Register the primary source. Set-once.
    #[must_use]
    pub fn primary_source<F, Fut>(self, source: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Resolved> + Send + 'static,
    {
        self.primary_source_raw(Box::new(move || Returned::future(source())))
    }

    /// Register the primary source at the [`Returned`] boundary. Set-once.
    #[must_use]
    pub fn primary_source_raw(mut self, source: Source) -> Self {
        if self.primary.is_some() {
            self.primary_set_twice = true;
        } else {
            self.primary = Some(source);
        }
        self
    }

    /// Append a secondary source. Registration order is attempt order.
    #[must_use]
    pub fn secondary_source<F, Fut>(self, source: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Resolved> + Send + 'static,
    {
        self.secondary_source_raw(Box::new(move || Returned::future(source())))
    }

    /// Append a secondary source at the [`Returned`] boundary.
    #[must_use]
    pub fn secondary_source_raw(mut self, source: Source) -> Self {
        self.secondaries.push(source);
        self
    }

    /// Register the verifier predicate. Set-once.
    #[must_use]
    pub fn verify<F>(mut self, verifier: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        if self.verifier.is_some() {
            self.verifier_set_twice = true;
        } else {
            self.verifier = Some(Box::new(verifier));
        }
        self
    }

    /// Append a synchronizer, invoked with the accepted value.
    #[must_use]
    pub fn synchronize<F, Fut>(self, synchronizer: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Resolved> + Send + 'static,
    {
        self.synchronize_raw(Box::new(move |value| Returned::future(synchronizer(value))))
    }

    /// Append a synchronizer at the [`Returned`] boundary.
    #[must_use]
    pub fn synchronize_raw(mut self, synchronizer: Synchronizer) -> Self {
        self.synchronizers.push(synchronizer);
        self
    }

    /// Swallow synchronizer failures instead of failing the whole run.
    #[must_use]
    pub fn ignore_synchronization_errors(mut self) -> Self {
        self.ignore_sync_errors = true;
        self
    }

    /// Finalize the configuration.
    ///
    /// # Errors
    ///
    /// - [`GetterError::PrimarySourceAlreadySet`] / [`GetterError::VerifierAlreadySet`]
    ///   when a set-once slot was registered twice.
    /// - [`GetterError::MissingPrimarySource`] when no primary source was
    ///   registered.
    pub fn build(self) -> Result<Getter, GetterError> {
        if self.primary_set_twice {
            return Err(GetterError::PrimarySourceAlreadySet);
        }
        if self.verifier_set_twice {
            return Err(GetterError::VerifierAlreadySet);
        }
        let primary = self.primary.ok_or(GetterError::MissingPrimarySource)?;
        Ok(Getter {
            name: self.name,
            primary,
            secondaries: self.secondaries,
            verifier: self.verifier,
            synchronizers: self.synchronizers,
            ignore_sync_errors: self.ignore_sync_errors,
            in_flight: AtomicBool::new(false),
        })
    }
}

// ============================================================================
// Run state
// ============================================================================

/// Mutable bookkeeping for one `get` call.
///
/// Constructed fresh at the start of every call and discarded when it
/// settles; nothing leaks between runs.
struct Run {
    ledger: Ledger,
    quitter: Quitter,
}

impl Run {
    fn new(operation: &str) -> Self {
        Self {
            ledger: Ledger::new(operation),
            quitter: Quitter::new(),
        }
    }
}

/// RAII hold on the in-flight flag. Releases when the `get` future
/// settles or is dropped, so the next call is immediately permitted.
struct Flight<'a>(&'a AtomicBool);

impl<'a> Flight<'a> {
    fn begin(flag: &'a AtomicBool) -> Result<Self, GetterError> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GetterError::AlreadyInFlight);
        }
        Ok(Self(flag))
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Getter
// ============================================================================

/// A determined value getter: primary source, ordered fallbacks, optional
/// verification, back-synchronization, and one composite failure if
/// everything fails.
pub struct Getter {
    name: String,
    primary: Source,
    secondaries: Vec<Source>,
    verifier: Option<Verifier>,
    synchronizers: Vec<Synchronizer>,
    ignore_sync_errors: bool,
    in_flight: AtomicBool,
}

impl Getter {
    /// Start building a getter for the named operation. The name is the
    /// header of the composite failure message (`<name> has failed.`).
    pub fn builder(name: impl Into<String>) -> GetterBuilder {
        GetterBuilder::new(name)
    }

    /// The operation name this getter was built for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one resolution attempt.
    ///
    /// The outer `Result` is the synchronous usage-error layer; the returned
    /// future carries only collaborator outcomes: the accepted value, or the
    /// composite fault when every source failed.
    ///
    /// # Errors
    ///
    /// [`GetterError::AlreadyInFlight`] when a previous `get` future is
    /// still alive and unsettled.
    pub fn get(&self) -> Result<impl Future<Output = Resolved> + Send + '_, GetterError> {
        let flight = Flight::begin(&self.in_flight)?;
        Ok(async move {
            let _flight = flight;
            let mut run = Run::new(&self.name);
            match self.chase(&mut run).await {
                Ok(value) => Ok(value),
                Err(last) => Err(run.ledger.finalize(last)),
            }
        })
    }

    /// Attempt primary, then secondaries in order, synchronizing whichever
    /// value gets accepted. Returns the last unrecorded fault on failure;
    /// the caller finalizes it into the composite.
    async fn chase(&self, run: &mut Run) -> Result<Value, Fault> {
        #[cfg(feature = "tracing")]
        tracing::info!(source = "primary", "source.attempt");

        let mut last = match self.attempt(&self.primary).await {
            Ok(value) => match self.synchronize(&value, run).await {
                Ok(()) => return Ok(value),
                Err(fault) => fault,
            },
            Err(fault) => fault.named("primary source"),
        };

        for (position, source) in self.secondaries.iter().enumerate() {
            run.quitter.guard(&last)?;
            run.ledger.record_failure(&last);

            let label = format!("secondary source #{}", position + 1);

            #[cfg(feature = "tracing")]
            tracing::info!(source = %label, "source.attempt");

            last = match self.attempt(source).await {
                Ok(value) => {
                    run.ledger.record_success(&label, &value);
                    match self.synchronize(&value, run).await {
                        Ok(()) => return Ok(value),
                        Err(fault) => fault,
                    }
                }
                Err(fault) => fault.named(label),
            };
        }

        Err(last)
    }

    /// Invoke one source through the future guard and the verifier.
    async fn attempt(&self, source: &Source) -> Result<Value, Fault> {
        let value = settle(source()).await?;
        if let Some(verifier) = &self.verifier {
            if !verifier(&value) {
                return Err(Fault::new(format!(
                    "the verifier function did not accept the value {value}"
                )));
            }
        }
        Ok(value)
    }

    /// Run every synchronizer with the accepted value, in registration
    /// order. The overall call resolves with the accepted value; the
    /// synchronizers' own resolutions are discarded.
    async fn synchronize(&self, accepted: &Value, run: &mut Run) -> Result<(), Fault> {
        for (position, synchronizer) in self.synchronizers.iter().enumerate() {
            #[cfg(feature = "tracing")]
            tracing::info!(synchronizer = position + 1, "synchronize.start");

            match settle(synchronizer(accepted.clone())).await {
                // A synchronizer's resolved value is discarded.
                Ok(_) => {}
                Err(fault) => {
                    let fault =
                        fault.named(format!("primarySourceSynchronizer function #{}", position + 1));

                    if self.ignore_sync_errors {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(synchronizer = position + 1, "synchronize.swallowed");

                        run.ledger.record_failure(&fault);
                        continue;
                    }

                    #[cfg(feature = "tracing")]
                    tracing::error!(synchronizer = position + 1, "synchronize.failed");

                    run.quitter.latch();
                    return Err(fault);
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Getter")
            .field("name", &self.name)
            .field("secondaries", &self.secondaries.len())
            .field("verifier", &self.verifier.is_some())
            .field("synchronizers", &self.synchronizers.len())
            .field("ignore_sync_errors", &self.ignore_sync_errors)
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .finish()
    }
}
