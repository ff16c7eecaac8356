//! Resumable sequential step execution.
//!
//! A [`Sequencer`] runs an ordered list of asynchronous steps one at a
//! time, threading an accumulating context mapping through them. When a
//! step fails, the failure is labeled with its position, dispatched to the
//! registered error handlers, and the run stops where it is. The caller can
//! then inspect the failure and call [`Sequencer::resume`], which
//! re-executes the step that failed and continues from there. There is no
//! automatic retry: recovery is always an explicit caller action.

use std::fmt;
use std::future::Future;

use regex::Regex;
use serde_json::{Map, Value};

use crate::fault::Fault;
use crate::ordinal::ordinal;
use crate::promised::{Resolved, Returned};

/// The shared context threaded through every step.
pub type Context = Map<String, Value>;

/// One stage of a sequential process: an opaque operation given the shared
/// context, returning a future. A mapping resolution is merged into the
/// context; anything else contributes nothing.
pub type Step = Box<dyn FnMut(&Context) -> Returned + Send>;

/// Handler invoked with a dispatched step failure.
pub type ErrorHandler = Box<dyn FnMut(&Fault) + Send>;

/// Handler invoked with the final context once every step has settled.
/// Returning `Err` is treated as a failure at the `onSuccess callback`
/// position and goes through regular error dispatch.
pub type SuccessHandler = Box<dyn FnMut(&Context) -> Result<(), Fault> + Send>;

/// Handler invoked when a run is resumed, before the failed step re-runs.
pub type ResumeHandler = Box<dyn FnMut() + Send>;

/// Wrap an async closure as a [`Step`].
///
/// The closure receives the context by reference and must clone whatever it
/// needs before its future suspends; the sequencer, not the step, performs
/// the merge afterwards.
pub fn step<F, Fut>(mut operation: F) -> Step
where
    F: FnMut(&Context) -> Fut + Send + 'static,
    Fut: Future<Output = Resolved> + Send + 'static,
{
    Box::new(move |context| Returned::future(operation(context)))
}

/// Usage errors: programmer misuse of the sequencer API.
///
/// Raised synchronously at the violating call, never deferred into a
/// future.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    /// The step list was empty at construction.
    #[error("a sequencer needs at least one step")]
    NeedsAtLeastOneStep,

    /// `execute` was called before an `on_error` handler was registered.
    #[error("an `on_error` handler must be registered before `execute` can run")]
    MissingErrorHandler,

    /// `execute` was called while a run was already started (or finished).
    #[error("`execute` was called while a run was already in progress; use `resume` to continue after a failure")]
    AlreadyStarted,

    /// `resume` was called with no dispatched step failure pending.
    #[error("`resume` was called but no step failure is pending")]
    NothingToResume,

    /// An `on_specific_error` pattern failed to compile.
    #[error("invalid error pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as registered.
        pattern: String,
        /// The regex compiler's complaint.
        reason: String,
    },
}

/// Outcome of driving a run (or a resumption) as far as it will go.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every step settled and the success handler, if any, ran cleanly.
    /// Carries the fully merged context.
    Completed(Context),
    /// A step failed; its fault was dispatched to the registered handlers.
    /// Call [`Sequencer::resume`] to re-execute the failed step.
    Faulted(Fault),
}

impl RunOutcome {
    /// Returns `true` if the run completed successfully.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns `true` if the run stopped on a step failure.
    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }
}

/// A pattern-routed error handler. The pattern must match the *entire*
/// prefixed failure message, not a substring.
struct SpecificHandler {
    pattern: Regex,
    handler: ErrorHandler,
}

// ============================================================================
// Sequencer
// ============================================================================

/// Runs an ordered list of asynchronous steps with pausable, resumable
/// error handling.
///
/// A sequencer is one-shot: after a run completes, `execute` cannot be
/// called again on the same instance. Only `resume` continues a stopped
/// run.
pub struct Sequencer {
    steps: Vec<Step>,
    on_success: Option<SuccessHandler>,
    on_resume: Option<ResumeHandler>,
    on_error: Option<ErrorHandler>,
    specific: Vec<SpecificHandler>,
    current_step: Option<usize>,
    context: Context,
    faulted: bool,
}

impl Sequencer {
    /// Create a sequencer over the given steps.
    ///
    /// # Errors
    ///
    /// [`SequencerError::NeedsAtLeastOneStep`] when `steps` is empty.
    pub fn new(steps: Vec<Step>) -> Result<Self, SequencerError> {
        if steps.is_empty() {
            return Err(SequencerError::NeedsAtLeastOneStep);
        }
        Ok(Self {
            steps,
            on_success: None,
            on_resume: None,
            on_error: None,
            specific: Vec::new(),
            current_step: None,
            context: Context::new(),
            faulted: false,
        })
    }

    /// Register the success handler. Re-registration replaces: the last
    /// one registered wins.
    #[must_use]
    pub fn on_success<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&Context) -> Result<(), Fault> + Send + 'static,
    {
        self.on_success = Some(Box::new(handler));
        self
    }

    /// Register the resume handler, invoked each time `resume` is called.
    #[must_use]
    pub fn on_resume<F>(mut self, handler: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_resume = Some(Box::new(handler));
        self
    }

    /// Register the general error handler. Required before `execute`.
    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&Fault) + Send + 'static,
    {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Register a handler for failures whose full prefixed message matches
    /// `pattern`. Accumulating: every matching handler fires, and when at
    /// least one matches, the general `on_error` handler does not.
    ///
    /// # Errors
    ///
    /// [`SequencerError::InvalidPattern`] when the pattern does not
    /// compile.
    pub fn on_specific_error<F>(mut self, pattern: &str, handler: F) -> Result<Self, SequencerError>
    where
        F: FnMut(&Fault) + Send + 'static,
    {
        // Anchor once at registration so dispatch is a full-string match.
        let anchored = format!("^(?:{pattern})$");
        let compiled = Regex::new(&anchored).map_err(|err| SequencerError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: err.to_string(),
        })?;
        self.specific.push(SpecificHandler {
            pattern: compiled,
            handler: Box::new(handler),
        });
        Ok(self)
    }

    /// The context as merged so far.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Start the run with the given initial context (empty for none).
    ///
    /// The outer `Result` is the synchronous usage-error layer; the
    /// returned future drives steps until completion or the first failure.
    ///
    /// # Errors
    ///
    /// - [`SequencerError::MissingErrorHandler`] when no `on_error` handler
    ///   is registered.
    /// - [`SequencerError::AlreadyStarted`] when a run was already started
    ///   on this instance.
    pub fn execute(
        &mut self,
        context: Context,
    ) -> Result<impl Future<Output = RunOutcome> + Send + '_, SequencerError> {
        if self.on_error.is_none() {
            return Err(SequencerError::MissingErrorHandler);
        }
        if self.current_step.is_some() {
            return Err(SequencerError::AlreadyStarted);
        }
        self.context = context;
        Ok(self.run_steps())
    }

    /// Resume after a dispatched failure: invoke the resume handler, step
    /// the cursor back by one, and re-execute the step that failed.
    ///
    /// # Errors
    ///
    /// [`SequencerError::NothingToResume`] when no dispatched failure is
    /// pending.
    pub fn resume(
        &mut self,
    ) -> Result<impl Future<Output = RunOutcome> + Send + '_, SequencerError> {
        if !self.faulted {
            return Err(SequencerError::NothingToResume);
        }
        if let Some(on_resume) = self.on_resume.as_mut() {
            on_resume();
        }
        self.faulted = false;
        // Step back so the next advance re-executes the failed step.
        self.current_step = self.current_step.and_then(|index| index.checked_sub(1));

        #[cfg(feature = "tracing")]
        tracing::info!(step = ?self.current_step, "sequencer.resume");

        Ok(self.run_steps())
    }

    async fn run_steps(&mut self) -> RunOutcome {
        loop {
            let next = self.current_step.map_or(0, |index| index + 1);
            self.current_step = Some(next);

            if next >= self.steps.len() {
                // Past the last step: the run is complete. A failure inside
                // the success handler goes through regular dispatch, at the
                // "onSuccess callback" position.
                if let Some(on_success) = self.on_success.as_mut() {
                    if let Err(fault) = on_success(&self.context) {
                        return self.handle_step_error(fault);
                    }
                }

                #[cfg(feature = "tracing")]
                tracing::info!(steps = self.steps.len(), "sequencer.completed");

                return RunOutcome::Completed(self.context.clone());
            }

            #[cfg(feature = "tracing")]
            tracing::info!(step = next, "step.start");

            let current = &mut self.steps[next];
            match current(&self.context) {
                Returned::Future(fut) => match fut.await {
                    Ok(resolution) => {
                        #[cfg(feature = "tracing")]
                        tracing::info!(step = next, outcome = "continue", "step.end");

                        self.merge_context(resolution);
                    }
                    Err(fault) => return self.handle_step_error(fault),
                },
                Returned::Bare(value) => {
                    return self.handle_step_error(Fault::new(format!(
                        "it didn't return a Promise. Instead, it returned {value}"
                    )));
                }
            }
        }
    }

    /// Shallow-merge a mapping resolution into the context; later keys win.
    /// Non-mapping resolutions contribute nothing.
    fn merge_context(&mut self, resolution: Value) {
        if let Value::Object(additions) = resolution {
            for (key, value) in additions {
                self.context.insert(key, value);
            }
        }
    }

    /// Label the fault with its position, route it to every matching
    /// specific handler (or the general handler if none match), and leave
    /// the sequencer waiting for `resume`.
    fn handle_step_error(&mut self, fault: Fault) -> RunOutcome {
        let position = self.current_step.unwrap_or(0);
        let label = if position >= self.steps.len() {
            "onSuccess callback".to_owned()
        } else {
            format!("{} step", ordinal(position + 1))
        };
        let fault = Fault::new(format!("Error in {label}: {}", fault.message()));

        #[cfg(feature = "tracing")]
        tracing::error!(step = position, message = fault.message(), "step.failed");

        self.faulted = true;

        let mut matched = false;
        for specific in &mut self.specific {
            if specific.pattern.is_match(fault.message()) {
                matched = true;
                (specific.handler)(&fault);
            }
        }
        if !matched {
            if let Some(on_error) = self.on_error.as_mut() {
                on_error(&fault);
            }
        }

        RunOutcome::Faulted(fault)
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("steps", &self.steps.len())
            .field("current_step", &self.current_step)
            .field("faulted", &self.faulted)
            .field("specific_handlers", &self.specific.len())
            .field("context_keys", &self.context.len())
            .finish()
    }
}
