//! Reconciliation of body and teardown outcomes.
//!
//! [`reconcile`] is a pure function from the body's [`ControlSignal`] and
//! the teardown's optional failure to the final invocation outcome. The
//! rules: an earlier failure attached to a non-failing signal becomes a
//! pending failure; pending and teardown failures merge into one composite
//! that preserves both messages; any failure beats a captured pass or
//! skip.

use keyflow_types::{ControlSignal, Failure, FailureKind, RaisedSignal, ReturnSignal};

/// Outcome of reconciling one invocation.
pub struct Reconciled {
    /// Early-return signal captured from the body, when any.
    pub return_signal: Option<ReturnSignal>,
    /// Signal to raise to the caller, when any.
    pub raised: Option<RaisedSignal>,
}

/// Fold the body signal and the teardown result into the final outcome.
pub fn reconcile(body: ControlSignal, teardown_failure: Option<Failure>) -> Reconciled {
    let (return_signal, captured, pending) = match body {
        ControlSignal::Normal => (None, None, None),
        ControlSignal::Return(signal) => {
            let pending = signal.earlier_failure.clone();
            (Some(signal), None, pending)
        }
        ControlSignal::Pass(mut signal) => {
            let pending = signal.earlier_failure.take();
            (None, Some(RaisedSignal::Passed(signal)), pending)
        }
        ControlSignal::Skip(mut signal) => {
            let pending = signal.earlier_failure.take();
            (None, Some(RaisedSignal::Skipped(signal)), pending)
        }
        ControlSignal::Failure(failure) => (None, None, Some(failure)),
    };

    let merged = merge_failures(pending, teardown_failure);
    let raised = merged.map(RaisedSignal::Failed).or(captured);
    Reconciled { return_signal, raised }
}

fn merge_failures(body: Option<Failure>, teardown: Option<Failure>) -> Option<Failure> {
    match (body, teardown) {
        (None, None) => None,
        (Some(failure), None) => Some(failure),
        (None, Some(teardown)) => Some(Failure {
            kind: FailureKind::Teardown,
            message: format!("Keyword teardown failed:\n{}", teardown.message),
            continue_on_failure: false,
            return_value: None,
        }),
        (Some(failure), Some(teardown)) => Some(Failure {
            kind: FailureKind::Composite,
            message: format!("{}\n\nAlso keyword teardown failed:\n{}", failure.message, teardown.message),
            continue_on_failure: failure.continue_on_failure,
            return_value: None,
        }),
    }
}
