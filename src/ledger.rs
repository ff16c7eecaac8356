//! Ordered record of attempt outcomes and the composite failure message.
//!
//! During a fallback run every outcome, failed or accepted, is appended to
//! a [`Ledger`]. If the whole run fails, [`Ledger::finalize`] renders one
//! composite fault enumerating every recorded entry in chronological order,
//! so a human reading the message can
//! reconstruct the entire attempt sequence. That rendered message is the
//! crate's primary diagnostic surface; consumers parse and display it, so
//! its layout is fixed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fault::Fault;

/// One recorded outcome: a step that resolved, or a step that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    /// A step resolved with a value.
    Success {
        /// The name of the step that resolved.
        step: String,
        /// The resolved value.
        value: Value,
    },
    /// A step failed.
    Failure {
        /// The name of the step that failed, if one was attributed.
        step: Option<String>,
        /// The failure message.
        message: String,
    },
}

/// Accumulates per-step outcomes for one named operation.
///
/// Entries render in append order, which is chronological attempt order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    operation: String,
    entries: Vec<Entry>,
}

impl Ledger {
    /// Create an empty ledger for the named operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            entries: Vec::new(),
        }
    }

    /// Append an outcome verbatim.
    pub fn record(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Append a success record. The value is only borrowed: the ledger
    /// never consumes what it logs.
    pub fn record_success(&mut self, step: impl Into<String>, value: &Value) {
        self.record(Entry::Success {
            step: step.into(),
            value: value.clone(),
        });
    }

    /// Append a failure record, named or not, exactly as attributed so far.
    pub fn record_failure(&mut self, fault: &Fault) {
        self.record(Entry::Failure {
            step: fault.step_name().map(str::to_owned),
            message: fault.message().to_owned(),
        });
    }

    /// The recorded entries, in chronological order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Record the final incoming failure, then build the composite fault.
    ///
    /// The message is `<operation> has failed.` followed by one
    /// newline-terminated line per entry:
    ///
    /// ```text
    ///   - <step> resolved with <value>
    ///   - <step> failed because <message>
    /// ```
    pub fn finalize(&mut self, last: Fault) -> Fault {
        self.record_failure(&last);

        let mut message = format!("{} has failed.\n", self.operation);
        for entry in &self.entries {
            match entry {
                Entry::Success { step, value } => {
                    message.push_str(&format!("  - {step} resolved with {value}\n"));
                }
                Entry::Failure { step, message: why } => {
                    let step = step.as_deref().unwrap_or("unnamed step");
                    message.push_str(&format!("  - {step} failed because {why}\n"));
                }
            }
        }
        Fault::new(message)
    }
}
