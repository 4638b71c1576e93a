//! Return-value computation.
//!
//! An explicit return signal wins over the keyword's declared return
//! expression. Items resolve as a sequence with splice expansion, then the
//! scalar/list disambiguation rule applies: exactly one resolved item that
//! did not come from a splice marker unwraps to a scalar; everything else
//! stays a list.

use serde_json::Value;

use keyflow_types::{Failure, ReturnSignal};

use crate::scope::{ScopeStack, is_splice_marker};

/// Compute the externally observable return value of an invocation.
///
/// Resolution failures are re-tagged as variable errors so callers can
/// tell a bad return expression from the failure that may already be
/// propagating.
pub fn resolve_return_value(
    declared: &[String],
    return_signal: Option<&ReturnSignal>,
    variables: &ScopeStack,
) -> Result<Value, Failure> {
    let items: &[String] = match return_signal {
        Some(signal) => &signal.values,
        None => declared,
    };
    if items.is_empty() {
        return Ok(Value::Null);
    }

    // Checked before resolution: a splice marker expanding to one value
    // must still produce a list.
    let contains_splice = items.iter().any(|item| is_splice_marker(item));

    let resolved = variables
        .resolve_items(items)
        .map_err(|error| Failure::variable(format!("Replacing variables from keyword return value failed: {error}")))?;

    if resolved.len() != 1 || contains_splice {
        return Ok(Value::Array(resolved));
    }
    Ok(resolved.into_iter().next().expect("length checked above"))
}
