//! Per-run execution context.
//!
//! [`RunContext`] carries everything an invocation scopes into and out of:
//! the variable frames, the active deadline stack, the dry-run and
//! teardown flags, the nested-call depth guard, and the sink that receives
//! one [`KeywordRecord`] per invocation. The context is owned by the
//! caller and threaded mutably through the engine; the engine restores
//! every flag it touches on every exit path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keyflow_types::{CallKind, Failure};

use crate::scope::ScopeStack;
use crate::timeout::Deadline;

/// Nested invocations beyond this depth fail instead of recursing forever.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 100;

/// One row of reporting data per keyword invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordRecord {
    /// Call-site keyword name.
    pub name: String,
    /// Declaring library, when any.
    pub library: Option<String>,
    /// First documentation line, variables interpolated.
    pub doc: String,
    /// Arguments exactly as written at the call site.
    pub args: Vec<String>,
    /// Assignment targets of the call.
    pub assign: Vec<String>,
    /// Resolved tags (tag templates plus tags split off the doc).
    pub tags: Vec<String>,
    /// Invocation position.
    pub kind: CallKind,
    /// Resolved timeout rendering, when a deadline was armed.
    pub timeout: Option<String>,
    /// When the invocation started.
    pub started_at: DateTime<Utc>,
    /// When the invocation finished, on every exit path.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Receives one record per invocation.
pub trait ResultSink {
    /// Accept a finished invocation record.
    fn record(&self, record: KeywordRecord);
}

/// Sink that drops every record; the default.
pub struct NoopSink;

impl ResultSink for NoopSink {
    fn record(&self, _record: KeywordRecord) {}
}

/// Channel senders work directly as sinks; a disconnected receiver is not
/// an error, records are simply dropped.
impl ResultSink for std::sync::mpsc::Sender<KeywordRecord> {
    fn record(&self, record: KeywordRecord) {
        let _ = self.send(record);
    }
}

/// Mutable state threaded through a keyword invocation.
pub struct RunContext {
    /// Variable frames, one per active call.
    pub variables: ScopeStack,
    /// Validate structure without touching live values.
    pub dry_run: bool,
    /// Whether the *current caller* is executing a teardown.
    pub in_teardown: bool,
    /// Depth at which [`RunContext::enter_call`] starts failing.
    pub max_call_depth: usize,
    deadlines: Vec<Deadline>,
    call_depth: usize,
    sink: Box<dyn ResultSink>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// A context with an empty scope and no record sink.
    pub fn new() -> Self {
        Self {
            variables: ScopeStack::new(),
            dry_run: false,
            in_teardown: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            deadlines: Vec::new(),
            call_depth: 0,
            sink: Box::new(NoopSink),
        }
    }

    /// Replace the record sink.
    pub fn with_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Forward a finished record to the sink.
    pub fn emit_record(&self, record: KeywordRecord) {
        self.sink.record(record);
    }

    /// Arm a deadline around a body execution.
    pub fn push_deadline(&mut self, deadline: Deadline) {
        self.deadlines.push(deadline);
    }

    /// Disarm the innermost deadline.
    pub fn pop_deadline(&mut self) {
        self.deadlines.pop();
    }

    /// The innermost expired deadline, when any. Step sequencers call this
    /// at their own observation points; teardowns never do.
    pub fn expired_deadline(&self) -> Option<&Deadline> {
        self.deadlines.iter().rev().find(|deadline| deadline.expired())
    }

    /// Enter one nested invocation, failing once the depth limit is hit.
    pub fn enter_call(&mut self) -> Result<(), Failure> {
        if self.call_depth >= self.max_call_depth {
            return Err(Failure::execution(format!(
                "Maximum limit of {} nested keyword invocations exceeded.",
                self.max_call_depth
            )));
        }
        self.call_depth += 1;
        Ok(())
    }

    /// Leave one nested invocation.
    pub fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn call_depth_limit_produces_a_failure() {
        let mut context = RunContext::new();
        context.max_call_depth = 2;
        context.enter_call().expect("first call fits");
        context.enter_call().expect("second call fits");
        let failure = context.enter_call().expect_err("third call exceeds the limit");
        assert!(failure.message.contains("Maximum limit of 2"));
        context.exit_call();
        context.exit_call();
        context.enter_call().expect("depth restored after exits");
    }

    #[test]
    fn innermost_expired_deadline_wins() {
        let mut context = RunContext::new();
        context.push_deadline(Deadline::after(Duration::from_secs(3600), "1 hour".into(), None));
        context.push_deadline(Deadline::after(Duration::ZERO, "0 seconds".into(), None));
        let expired = context.expired_deadline().expect("inner deadline expired");
        assert_eq!(expired.display(), "0 seconds");
        context.pop_deadline();
        assert!(context.expired_deadline().is_none());
    }

    #[test]
    fn channel_sender_collects_records() {
        let (sender, receiver) = mpsc::channel();
        let context = RunContext::new().with_sink(sender);
        context.emit_record(KeywordRecord {
            name: "Create App".into(),
            library: None,
            doc: String::new(),
            args: vec![],
            assign: vec![],
            tags: vec![],
            kind: CallKind::Normal,
            timeout: None,
            started_at: Utc::now(),
            finished_at: None,
        });
        let record = receiver.try_recv().expect("record delivered");
        assert_eq!(record.name, "Create App");
    }
}
