//! # Keyflow Engine
//!
//! The Keyflow engine invokes user-defined keywords: it binds call-site
//! arguments to a declared parameter contract, executes the keyword body
//! under an optional deadline, guarantees the teardown runs on every
//! outcome, reconciles early-return/pass/skip/failure signals into a
//! single result, and computes the return value with variable
//! interpolation.
//!
//! ## Key pieces
//!
//! - **Argument binding**: positional, defaulted, variadic and
//!   keyword-variadic parameters, plus arguments embedded in the call
//!   name and extracted by pattern matching
//! - **Timeout guard**: a deadline armed around body execution only,
//!   polled cooperatively by the step sequencer
//! - **Signal reconciliation**: one pure fold from the body signal and
//!   the teardown result to the final outcome; a failing teardown always
//!   beats an early pass or skip
//! - **Return values**: explicit return beats the declared expression,
//!   with the single-item scalar unwrap rule and splice expansion
//!
//! ## Usage
//!
//! ```rust
//! use keyflow_engine::{KeywordRunner, NoopSequencer, RunContext};
//! use keyflow_types::{CallArguments, KeywordCall, KeywordDefinition, ParameterContract, ParameterSpec, Step};
//!
//! let mut definition = KeywordDefinition::new("Greet", vec![Step::named("Log")]);
//! definition.contract = ParameterContract {
//!     positional: vec![ParameterSpec::with_default("name", "world")],
//!     varargs: None,
//!     kwargs: None,
//! };
//! definition.return_expr = vec!["hello ${name}".into()];
//!
//! let runner = KeywordRunner::new(&definition);
//! let call = KeywordCall::with_args("Greet", CallArguments::positional(["keyflow"]));
//! let mut context = RunContext::new();
//! let value = runner.run(&call, &mut context, &NoopSequencer)?;
//! assert_eq!(value, serde_json::json!("hello keyflow"));
//! # Ok::<(), keyflow_types::RaisedSignal>(())
//! ```
//!
//! ## Architecture
//!
//! - **`scope`**: variable frames, interpolation and splice expansion
//! - **`binding`**: the two argument binding strategies and assignment
//!   distribution
//! - **`timeout`**: timeout resolution and deadlines
//! - **`sequencer`**: the seam to the external step executor
//! - **`outcome`**: pure body/teardown reconciliation
//! - **`return_value`**: return-value computation
//! - **`runner`**: the invocation driver tying it all together
//! - **`context`**: per-run mutable state and the record sink

pub mod binding;
pub mod context;
pub mod outcome;
pub mod return_value;
pub mod runner;
pub mod scope;
pub mod sequencer;
pub mod timeout;

// Re-export commonly used types for convenience
pub use binding::{ArgumentBindingStrategy, EmbeddedBindings, ResolvedArguments, assign_return_value, validate_assignment};
pub use context::{DEFAULT_MAX_CALL_DEPTH, KeywordRecord, NoopSink, ResultSink, RunContext};
pub use outcome::{Reconciled, reconcile};
pub use return_value::resolve_return_value;
pub use runner::KeywordRunner;
pub use scope::{BoundValue, ScopeStack, VariableError, VariableKind, is_splice_marker};
pub use sequencer::{NoopSequencer, StepSequencer};
pub use timeout::{Deadline, resolve_timeout};
