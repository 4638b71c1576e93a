//! The step-sequencer seam.
//!
//! The invocation engine never executes individual statements itself; it
//! hands the body (and the teardown step) to a [`StepSequencer`] and
//! interprets the returned [`ControlSignal`]. Sequencers are expected to
//! poll [`RunContext::expired_deadline`](crate::RunContext::expired_deadline)
//! at their own observation points and surface the deadline's failure as a
//! signal; how often they look is their business, not the engine's.

use keyflow_types::{ControlSignal, Step};

use crate::context::RunContext;

/// Executes keyword body steps and teardown steps.
pub trait StepSequencer {
    /// Run the whole body. `Ok(())` means the body ran to the end; any
    /// early completion comes back as the signal that caused it.
    fn run_steps(&self, steps: &[Step], context: &mut RunContext) -> Result<(), ControlSignal>;

    /// Run a single step under an already-resolved name; used for
    /// teardowns.
    fn run_step(&self, step: &Step, resolved_name: &str, context: &mut RunContext) -> Result<(), ControlSignal>;
}

/// Sequencer that treats every step as an immediate success.
///
/// Useful for previews and for unit tests that only exercise the
/// invocation machinery around the body.
pub struct NoopSequencer;

impl StepSequencer for NoopSequencer {
    fn run_steps(&self, _steps: &[Step], _context: &mut RunContext) -> Result<(), ControlSignal> {
        Ok(())
    }

    fn run_step(&self, _step: &Step, _resolved_name: &str, _context: &mut RunContext) -> Result<(), ControlSignal> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sequencer_completes_everything_normally() {
        let mut context = RunContext::new();
        let steps = vec![Step::named("Anything")];
        assert!(NoopSequencer.run_steps(&steps, &mut context).is_ok());
        assert!(NoopSequencer.run_step(&steps[0], "Anything", &mut context).is_ok());
    }
}
