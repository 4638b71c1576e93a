//! Shared type definitions for the Keyflow keyword engine.
//!
//! The models defined here are split along the same line as the runtime:
//! `keyword` holds the long-lived definition side (parameter contracts,
//! timeout specs, bodies) loaded once per program run, `call` holds the
//! per-invocation call-site data, and `signal` holds the control-flow
//! outcomes a running keyword can produce. Authoring order is preserved
//! where it matters (named arguments, keyword-variadic collections) via
//! `IndexMap`.

pub mod call;
pub mod keyword;
pub mod signal;

pub use call::{CallArguments, CallKind, KeywordCall};
pub use keyword::{EmbeddedSignature, KeywordDefinition, ParameterContract, ParameterSpec, Step, TimeoutSpec};
pub use signal::{ControlSignal, Failure, FailureKind, PassSignal, RaisedSignal, ReturnSignal, SkipSignal};
