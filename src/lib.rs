#![deny(missing_docs)]

//! Recourse: composable control-flow utilities for async operations.
//!
//! # Design Goals
//!
//! Recourse is focused on **deterministic diagnostics**:
//!
//! - **Strictly sequential attempts**: fallback sources and steps run one at
//!   a time, in registration order, never concurrently
//! - **Nothing is silently dropped**: every failed attempt is recorded and
//!   surfaces in one composite, human-readable failure message
//! - **Recovery is explicit**: a stopped run continues only when the caller
//!   says so
//!
//! # Core Concepts
//!
//! - [`Getter`]: fallback-chasing value resolution. Try a primary source,
//!   then secondaries in order, verify, and synchronize the primary with
//!   whatever fallback succeeded
//! - [`Sequencer`]: resumable sequential step execution over a shared
//!   context, with caller-driven retry of the failed step
//! - [`Fault`], [`Ledger`], [`Quitter`], [`Returned`]: the failure value,
//!   the attempt log, the abort latch, and the collaborator-contract guard
//!   the two protocols are built from

// Modules
pub mod fault;
pub mod getter;
pub mod ledger;
pub mod ordinal;
pub mod promised;
pub mod quitter;
pub mod sequencer;

// Re-exports for convenience
pub use fault::Fault;
pub use getter::{Getter, GetterBuilder, GetterError, Source, Synchronizer, Verifier};
pub use ledger::{Entry, Ledger};
pub use promised::{settle, BoxFuture, Resolved, Returned};
pub use quitter::Quitter;
pub use sequencer::{step, Context, RunOutcome, Sequencer, SequencerError, Step};

#[cfg(test)]
mod tests;
