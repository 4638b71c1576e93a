//! Keyword invocation driver.
//!
//! [`KeywordRunner`] is the public entry point: it binds arguments, arms
//! the optional deadline, drives the body through the step sequencer,
//! guarantees the teardown runs, reconciles the outcome and computes the
//! return value. `run` either produces a value or raises a
//! [`RaisedSignal`]; `dry_run` validates structure and arguments without
//! touching live variable values.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use keyflow_types::{ControlSignal, Failure, KeywordCall, KeywordDefinition, RaisedSignal, Step};

use crate::binding::{ArgumentBindingStrategy, ResolvedArguments, assign_return_value, validate_assignment};
use crate::context::{KeywordRecord, RunContext};
use crate::outcome::{Reconciled, reconcile};
use crate::return_value::resolve_return_value;
use crate::sequencer::StepSequencer;
use crate::timeout::{Deadline, resolve_timeout};

/// Runs one keyword definition.
///
/// The runner is cheap to construct per call; the definition stays owned
/// by whoever loaded it. Embedded-argument keywords must be constructed
/// through [`KeywordRunner::for_call`] so that pattern matching (and its
/// failure) happens at selection time.
#[derive(Debug)]
pub struct KeywordRunner<'a> {
    definition: &'a KeywordDefinition,
    name: String,
    strategy: ArgumentBindingStrategy,
}

impl<'a> KeywordRunner<'a> {
    /// Runner for a keyword with an explicit argument signature.
    pub fn new(definition: &'a KeywordDefinition) -> Self {
        Self {
            definition,
            name: definition.name.clone(),
            strategy: ArgumentBindingStrategy::Explicit,
        }
    }

    /// Select the runner for a concrete call name. Keywords with an
    /// embedded signature match the name here; a non-matching name fails
    /// before any binding is attempted.
    pub fn for_call(definition: &'a KeywordDefinition, call_name: &str) -> Result<Self, Failure> {
        match &definition.embedded {
            Some(signature) => {
                let strategy = ArgumentBindingStrategy::embedded(signature, call_name)?;
                Ok(Self {
                    definition,
                    name: call_name.to_string(),
                    strategy,
                })
            }
            None => Ok(Self::new(definition)),
        }
    }

    /// Call-site name this runner was selected for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified name including the declaring library.
    pub fn longname(&self) -> String {
        match &self.definition.library {
            Some(library) => format!("{library}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Invoke the keyword.
    ///
    /// Returns the computed return value, or raises the signal that
    /// escaped the invocation. A raised signal carries the best-available
    /// return value that could still be computed.
    pub fn run(&self, call: &KeywordCall, context: &mut RunContext, sequencer: &dyn StepSequencer) -> Result<Value, RaisedSignal> {
        let mut record = self.new_record(call, context);
        debug!(keyword = %self.longname(), "keyword invocation started");

        let outcome = self.run_guarded(call, context, sequencer, &mut record);

        record.finished_at = Some(Utc::now());
        context.emit_record(record);
        match &outcome {
            Ok(_) => debug!(keyword = %self.longname(), "keyword invocation finished"),
            Err(signal) => debug!(keyword = %self.longname(), signal = signal.message(), "keyword invocation raised"),
        }
        outcome
    }

    /// Validate the invocation without executing anything for real: the
    /// assignment targets and explicit arguments are checked structurally,
    /// no values are resolved or bound, timeouts stay unresolved, and the
    /// body and teardown run through the sequencer in dry mode.
    pub fn dry_run(&self, call: &KeywordCall, context: &mut RunContext, sequencer: &dyn StepSequencer) -> Result<(), RaisedSignal> {
        let was_dry = context.dry_run;
        context.dry_run = true;
        let mut record = self.new_record(call, context);

        let outcome = self.dry_run_guarded(call, context, sequencer);

        record.finished_at = Some(Utc::now());
        context.emit_record(record);
        context.dry_run = was_dry;
        outcome
    }

    fn run_guarded(
        &self,
        call: &KeywordCall,
        context: &mut RunContext,
        sequencer: &dyn StepSequencer,
        record: &mut KeywordRecord,
    ) -> Result<Value, RaisedSignal> {
        validate_assignment(&call.assign).map_err(RaisedSignal::Failed)?;
        let resolved = self
            .strategy
            .resolve(&self.name, &self.definition.contract, &call.args, &context.variables)
            .map_err(RaisedSignal::Failed)?;

        context.enter_call().map_err(RaisedSignal::Failed)?;
        context.variables.push_frame();
        let outcome = self.run_frame(resolved, context, sequencer, record);
        context.variables.pop_frame();
        context.exit_call();

        let value = outcome?;
        assign_return_value(&call.assign, &value, &mut context.variables).map_err(RaisedSignal::Failed)?;
        Ok(value)
    }

    fn dry_run_guarded(&self, call: &KeywordCall, context: &mut RunContext, sequencer: &dyn StepSequencer) -> Result<(), RaisedSignal> {
        validate_assignment(&call.assign).map_err(RaisedSignal::Failed)?;
        self.strategy
            .validate(&self.name, &self.definition.contract, &call.args)
            .map_err(RaisedSignal::Failed)?;

        context.enter_call().map_err(RaisedSignal::Failed)?;
        context.variables.push_frame();
        let outcome = self.execute(None, context, sequencer);
        context.variables.pop_frame();
        context.exit_call();

        match outcome?.raised {
            Some(signal) => Err(signal),
            None => Ok(()),
        }
    }

    fn run_frame(
        &self,
        resolved: ResolvedArguments,
        context: &mut RunContext,
        sequencer: &dyn StepSequencer,
        record: &mut KeywordRecord,
    ) -> Result<Value, RaisedSignal> {
        resolved
            .bind_into(&self.name, &self.definition.contract, &mut context.variables)
            .map_err(RaisedSignal::Failed)?;

        let deadline = match (&self.definition.timeout, context.dry_run) {
            (Some(spec), false) => {
                let deadline = resolve_timeout(spec, &context.variables).map_err(RaisedSignal::Failed)?;
                record.timeout = Some(deadline.display().to_string());
                Some(deadline)
            }
            _ => None,
        };

        let reconciled = self.execute(deadline, context, sequencer)?;
        self.finish(reconciled, context)
    }

    /// Body execution and the always-run teardown. Only a definition
    /// error aborts before the teardown; every body signal still reaches
    /// it.
    fn execute(
        &self,
        deadline: Option<Deadline>,
        context: &mut RunContext,
        sequencer: &dyn StepSequencer,
    ) -> Result<Reconciled, RaisedSignal> {
        if self.definition.body.is_empty() && self.definition.return_expr.is_empty() {
            return Err(RaisedSignal::Failed(Failure::definition(format!(
                "User keyword '{}' contains no keywords.",
                self.name
            ))));
        }

        let timed = deadline.is_some();
        if let Some(deadline) = deadline {
            context.push_deadline(deadline);
        }
        let mut body_signal = match sequencer.run_steps(&self.definition.body, context) {
            Ok(()) => ControlSignal::Normal,
            Err(signal) => signal,
        };
        if timed {
            if matches!(body_signal, ControlSignal::Normal)
                && let Some(deadline) = context.expired_deadline()
            {
                body_signal = ControlSignal::Failure(deadline.failure());
            }
            context.pop_deadline();
        }

        let teardown_failure = self.run_teardown(context, sequencer);
        if let Some(failure) = &teardown_failure {
            warn!(keyword = %self.longname(), error = %failure, "keyword teardown failed");
        }

        Ok(reconcile(body_signal, teardown_failure))
    }

    /// Runs the declared teardown with `in_teardown` forced on and
    /// restored afterwards, whatever the body did.
    fn run_teardown(&self, context: &mut RunContext, sequencer: &dyn StepSequencer) -> Option<Failure> {
        let step = self.definition.teardown.as_ref()?;
        let caller_in_teardown = context.in_teardown;
        context.in_teardown = true;
        let result = self.run_teardown_step(step, context, sequencer);
        context.in_teardown = caller_in_teardown;
        result
    }

    fn run_teardown_step(&self, step: &Step, context: &mut RunContext, sequencer: &dyn StepSequencer) -> Option<Failure> {
        let name = if context.dry_run {
            context.variables.interpolate_lenient(&step.name)
        } else {
            match context.variables.resolve_string(&step.name) {
                Ok(name) => name,
                Err(error) => return Some(Failure::syntax(error.to_string())),
            }
        };
        if name.is_empty() || name.eq_ignore_ascii_case("none") {
            return None;
        }
        match sequencer.run_step(step, &name, context) {
            Ok(()) | Err(ControlSignal::Normal) | Err(ControlSignal::Pass(_)) => None,
            Err(ControlSignal::Failure(failure)) => Some(failure),
            Err(ControlSignal::Skip(signal)) => Some(Failure::execution(format!(
                "Skip raised in keyword teardown: {}",
                signal.message
            ))),
            Err(ControlSignal::Return(_)) => Some(Failure::syntax("Return is not allowed in keyword teardown.")),
        }
    }

    /// Continuation check and return-value computation. The check asks the
    /// *caller's* teardown flag, which `run_teardown` restored before this
    /// point; the teardown entered for this call never leaks into it.
    fn finish(&self, reconciled: Reconciled, context: &mut RunContext) -> Result<Value, RaisedSignal> {
        let caller_in_teardown = context.in_teardown;
        let Reconciled { return_signal, raised } = reconciled;
        let computed = resolve_return_value(&self.definition.return_expr, return_signal.as_ref(), &context.variables);

        match raised {
            Some(mut signal) => {
                if !signal.can_continue(caller_in_teardown) {
                    // Still attach whatever value could be computed so a
                    // caller inspecting the propagating signal sees it.
                    if let Ok(value) = computed {
                        signal.set_return_value(value);
                    }
                    return Err(signal);
                }
                match computed {
                    Ok(value) => {
                        signal.set_return_value(value);
                        Err(signal)
                    }
                    Err(failure) => Err(RaisedSignal::Failed(failure)),
                }
            }
            None => computed.map_err(RaisedSignal::Failed),
        }
    }

    fn new_record(&self, call: &KeywordCall, context: &RunContext) -> KeywordRecord {
        let doc = context.variables.interpolate_lenient(&self.definition.doc);
        let (doc, doc_tags) = split_tags_from_doc(&doc);
        let mut tags: Vec<String> = self
            .definition
            .tags
            .iter()
            .map(|tag| context.variables.interpolate_lenient(tag))
            .collect();
        tags.extend(doc_tags);

        KeywordRecord {
            name: self.name.clone(),
            library: self.definition.library.clone(),
            doc: doc.lines().next().unwrap_or_default().to_string(),
            args: call.args.display_list(),
            assign: call.assign.clone(),
            tags,
            kind: call.kind,
            timeout: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Split a trailing `Tags: a, b` line off a documentation string.
fn split_tags_from_doc(doc: &str) -> (String, Vec<String>) {
    let trimmed = doc.trim_end();
    let (head, last_line) = match trimmed.rsplit_once('\n') {
        Some((head, last_line)) => (head, last_line),
        None => ("", trimmed),
    };
    let candidate = last_line.trim();
    let is_tag_line = candidate.get(..5).is_some_and(|prefix| prefix.eq_ignore_ascii_case("tags:"));
    if is_tag_line {
        let tags = candidate[5..]
            .split(',')
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        (head.trim_end().to_string(), tags)
    } else {
        (doc.to_string(), Vec::new())
    }
}
