//! The failure value collaborators reject with.
//!
//! Every failure flowing through this crate, whether a rejected source, a
//! verifier refusal, a failed synchronizer, or a failed step, is a
//! [`Fault`]. A fault carries a human-readable message and, once some layer
//! has attributed it, the name of the step it belongs to.

use serde::{Deserialize, Serialize};

/// A failure produced by (or attributed to) a collaborator.
///
/// The step name is assigned lazily: [`Fault::named`] attaches a name only
/// if none is set yet, so an outer layer can re-name a propagating fault
/// without losing the attribution made by an inner one.
///
/// `Display` renders `Error: <message>`, the stringified form a raised
/// error prints as. The future guard embeds this form in its
/// "rejected with" diagnostic, so it is part of the composite message
/// format consumers parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Error: {message}")]
pub struct Fault {
    message: String,
    step_name: Option<String>,
}

impl Fault {
    /// Create a fault with the given message and no step name.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            step_name: None,
        }
    }

    /// The failure message, without the `Error: ` display prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The step this fault has been attributed to, if any.
    pub fn step_name(&self) -> Option<&str> {
        self.step_name.as_deref()
    }

    /// Attribute this fault to a step, unless it already carries a name.
    ///
    /// Non-destructive on purpose: when a fault passes through several
    /// naming layers, the innermost attribution wins.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        if self.step_name.is_none() {
            self.step_name = Some(name.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_like_a_raised_error() {
        let fault = Fault::new("disk on fire");
        assert_eq!(fault.to_string(), "Error: disk on fire");
    }

    #[test]
    fn named_only_sets_an_unset_name() {
        let fault = Fault::new("nope").named("inner layer");
        assert_eq!(fault.step_name(), Some("inner layer"));

        let renamed = fault.named("outer layer");
        assert_eq!(renamed.step_name(), Some("inner layer"));
    }

    #[test]
    fn serializes_and_round_trips() {
        let fault = Fault::new("boom").named("step one");
        let json = serde_json::to_string(&fault).expect("should serialize");
        let back: Fault = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(back, fault);
    }
}
