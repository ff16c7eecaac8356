//! One-way abort latch for fallback chains.
//!
//! Once a terminal condition is observed (today: a synchronizer failure that
//! is not being ignored), the latch flips and every later attempt in the
//! same run short-circuits by re-raising instead of proceeding. Already
//! in-flight work is never cancelled; the latch only gates *future*
//! attempts.

use crate::fault::Fault;

/// A one-way abort flag.
#[derive(Debug, Default)]
pub struct Quitter {
    latched: bool,
}

impl Quitter {
    /// Create an unlatched quitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the abort flag. There is no way back.
    pub fn latch(&mut self) {
        self.latched = true;
    }

    /// Latch only when `condition` holds; no-op otherwise.
    pub fn latch_if(&mut self, condition: bool) {
        if condition {
            self.latched = true;
        }
    }

    /// Whether the latch has been set.
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Re-raise `fault` if the latch is set; no-op otherwise.
    pub fn guard(&self, fault: &Fault) -> Result<(), Fault> {
        if self.latched {
            Err(fault.clone())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_a_no_op_until_latched() {
        let mut quitter = Quitter::new();
        let fault = Fault::new("stop everything");

        assert!(quitter.guard(&fault).is_ok());

        quitter.latch();
        let raised = quitter.guard(&fault).expect_err("should re-raise");
        assert_eq!(raised, fault);
    }

    #[test]
    fn latch_if_respects_the_condition() {
        let mut quitter = Quitter::new();
        quitter.latch_if(false);
        assert!(!quitter.is_latched());

        quitter.latch_if(true);
        assert!(quitter.is_latched());
    }
}
