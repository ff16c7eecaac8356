//! Tests for the two stateful protocols.
//!
//! ## Test Organization
//!
//! - `common`: invocation counters, event traces, source and step factories
//! - `getter`: fallback resolution. Ordering, verification, composite
//!   message exactness, synchronizer isolation, re-use and in-flight guards
//! - `sequencer`: resumable execution. Resumption, context merge law,
//!   specific-error routing, usage errors, success-handler failures
//!
//! Leaf components (`fault`, `promised`, `quitter`, `ledger`, `ordinal`)
//! carry their own unit tests inline.

mod common;
