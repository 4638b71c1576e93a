//! Control-flow signal model.
//!
//! A keyword body finishes in exactly one of five ways: it runs to the
//! end, returns early, passes early, skips, or fails. The step sequencer
//! reports that as a [`ControlSignal`] value instead of unwinding, which
//! keeps reconciliation (body signal + teardown result -> final outcome) a
//! pure, unit-testable function. Non-failure signals may still carry an
//! earlier failure accumulated by an enclosing iteration construct; that
//! failure is orthogonal to the current signal and always merged back in.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Completion signal produced by running a keyword body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ControlSignal {
    /// The body ran to the end without any signal.
    Normal,
    /// An early return was requested.
    Return(ReturnSignal),
    /// Execution was passed early.
    Pass(PassSignal),
    /// Execution was skipped.
    Skip(SkipSignal),
    /// The body failed.
    Failure(Failure),
}

/// Early return raised inside a keyword body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReturnSignal {
    /// Return expression items, unresolved.
    pub values: Vec<String>,
    /// Failure collected by an enclosing iteration construct before the
    /// return was reached.
    pub earlier_failure: Option<Failure>,
}

impl ReturnSignal {
    /// A return signal carrying the given unresolved items.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            earlier_failure: None,
        }
    }
}

/// Early pass raised inside a keyword body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassSignal {
    /// Message attached to the pass.
    pub message: String,
    /// Failure collected by an enclosing iteration construct.
    pub earlier_failure: Option<Failure>,
    /// Return value attached when the signal escapes an invocation.
    pub return_value: Option<Value>,
}

impl PassSignal {
    /// A pass signal with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            earlier_failure: None,
            return_value: None,
        }
    }
}

/// Skip raised inside a keyword body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkipSignal {
    /// Message attached to the skip.
    pub message: String,
    /// Failure collected by an enclosing iteration construct.
    pub earlier_failure: Option<Failure>,
    /// Return value attached when the signal escapes an invocation.
    pub return_value: Option<Value>,
}

impl SkipSignal {
    /// A skip signal with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            earlier_failure: None,
            return_value: None,
        }
    }
}

/// Classification of a failure, used by the continuation policy and by
/// callers that need to tell binding problems from runtime ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The keyword definition itself is invalid (e.g. empty body).
    Definition,
    /// Call arguments could not be mapped onto the parameter contract.
    ArgumentBinding,
    /// A variable reference could not be resolved.
    Variable,
    /// The body deadline expired.
    Timeout,
    /// A structurally invalid construct was reached at run time.
    Syntax,
    /// A step in the body failed.
    Execution,
    /// The teardown failed while the body did not.
    Teardown,
    /// Body and teardown failures merged into one.
    Composite,
}

/// A failure propagating out of a keyword invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Error)]
#[error("{message}")]
pub struct Failure {
    /// What went wrong, coarsely.
    pub kind: FailureKind,
    /// Human-readable failure message.
    pub message: String,
    /// Whether an enclosing iteration construct may absorb this failure
    /// and continue with its next round.
    pub continue_on_failure: bool,
    /// Best-available return value computed before the failure was raised.
    pub return_value: Option<Value>,
}

impl Failure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            continue_on_failure: false,
            return_value: None,
        }
    }

    /// Create a definition error.
    pub fn definition(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Definition, message)
    }

    /// Create an argument binding error.
    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ArgumentBinding, message)
    }

    /// Create a variable resolution error.
    pub fn variable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Variable, message)
    }

    /// Create a timeout failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    /// Create a syntax failure.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Syntax, message)
    }

    /// Create an execution failure.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Execution, message)
    }

    /// Create a teardown failure.
    pub fn teardown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Teardown, message)
    }

    /// Mark this failure as absorbable by an enclosing iteration construct.
    pub fn continuable(mut self) -> Self {
        self.continue_on_failure = true;
        self
    }

    /// Whether the caller may continue past this failure.
    ///
    /// Timeouts and syntax errors always abort. Inside a caller's teardown
    /// every other failure continues, so later teardown steps still run.
    /// Elsewhere the step that raised the failure decides via
    /// `continue_on_failure`.
    pub fn can_continue(&self, caller_in_teardown: bool) -> bool {
        match self.kind {
            FailureKind::Timeout | FailureKind::Syntax => false,
            _ if caller_in_teardown => true,
            _ => self.continue_on_failure,
        }
    }
}

/// Signal that escapes a keyword invocation to its caller.
///
/// `run` either produces a return value or raises one of these; a raised
/// signal always carries the best-available return value that could be
/// computed before it escaped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Error)]
pub enum RaisedSignal {
    /// The invocation failed.
    #[error("{0}")]
    Failed(Failure),
    /// The invocation passed early.
    #[error("{}", .0.message)]
    Passed(PassSignal),
    /// The invocation was skipped.
    #[error("{}", .0.message)]
    Skipped(SkipSignal),
}

impl RaisedSignal {
    /// Message carried by the signal.
    pub fn message(&self) -> &str {
        match self {
            RaisedSignal::Failed(failure) => &failure.message,
            RaisedSignal::Passed(pass) => &pass.message,
            RaisedSignal::Skipped(skip) => &skip.message,
        }
    }

    /// The failure, when this signal is one.
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            RaisedSignal::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Return value attached to the signal, when one was computed.
    pub fn return_value(&self) -> Option<&Value> {
        match self {
            RaisedSignal::Failed(failure) => failure.return_value.as_ref(),
            RaisedSignal::Passed(pass) => pass.return_value.as_ref(),
            RaisedSignal::Skipped(skip) => skip.return_value.as_ref(),
        }
    }

    /// Attach the return value computed for the invocation.
    pub fn set_return_value(&mut self, value: Value) {
        match self {
            RaisedSignal::Failed(failure) => failure.return_value = Some(value),
            RaisedSignal::Passed(pass) => pass.return_value = Some(value),
            RaisedSignal::Skipped(skip) => skip.return_value = Some(value),
        }
    }

    /// Whether an enclosing construct in the caller may continue past this
    /// signal. Pass and skip are always absorbable; failures delegate to
    /// [`Failure::can_continue`].
    pub fn can_continue(&self, caller_in_teardown: bool) -> bool {
        match self {
            RaisedSignal::Failed(failure) => failure.can_continue(caller_in_teardown),
            RaisedSignal::Passed(_) | RaisedSignal::Skipped(_) => true,
        }
    }
}
