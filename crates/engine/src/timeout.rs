//! Keyword body deadlines.
//!
//! A [`TimeoutSpec`] holds unresolved expressions; [`resolve_timeout`]
//! turns it into a concrete [`Deadline`] immediately before the body
//! starts. The deadline wraps body execution only: argument binding
//! happens before it is armed and teardown after it is disarmed, so a
//! teardown always runs to completion even when the body overran.

use std::time::{Duration, Instant};

use keyflow_types::{Failure, TimeoutSpec};

use crate::scope::ScopeStack;

/// An armed body deadline.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Instant,
    display: String,
    message: Option<String>,
}

impl Deadline {
    /// A deadline expiring after `duration`, carrying its human-readable
    /// rendering and an optional custom expiry message.
    pub fn after(duration: Duration, display: String, message: Option<String>) -> Self {
        Self {
            expires_at: Instant::now() + duration,
            display,
            message,
        }
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Human-readable rendering of the resolved duration, recorded on the
    /// invocation report.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// The failure injected when this deadline expires.
    pub fn failure(&self) -> Failure {
        let message = match &self.message {
            Some(custom) => custom.clone(),
            None => format!("Keyword timeout {} exceeded.", self.display),
        };
        Failure::timeout(message)
    }
}

/// Resolve a timeout spec against the live scope into an armed deadline.
///
/// Both the duration expression and the message template are
/// variable-resolved before use; an unresolvable variable is a variable
/// error, an unparsable duration a syntax error.
pub fn resolve_timeout(spec: &TimeoutSpec, variables: &ScopeStack) -> Result<Deadline, Failure> {
    let raw = variables.resolve_string(&spec.value)?;
    let duration = parse_duration(&raw).ok_or_else(|| {
        Failure::syntax(format!("Setting keyword timeout failed: invalid time string '{raw}'."))
    })?;
    let message = match &spec.message {
        Some(template) => Some(variables.resolve_string(template)?),
        None => None,
    };
    Ok(Deadline::after(duration, format_duration(duration), message))
}

/// Suffixes accepted by [`parse_duration`], longest first so that
/// `"2 minutes"` is not consumed by the `"s"` entry.
const DURATION_SUFFIXES: &[(&str, f64)] = &[
    ("milliseconds", 0.001),
    ("millisecond", 0.001),
    ("minutes", 60.0),
    ("seconds", 1.0),
    ("millis", 0.001),
    ("minute", 60.0),
    ("second", 1.0),
    ("hours", 3600.0),
    ("hour", 3600.0),
    ("mins", 60.0),
    ("secs", 1.0),
    ("min", 60.0),
    ("sec", 1.0),
    ("ms", 0.001),
    ("h", 3600.0),
    ("m", 60.0),
    ("s", 1.0),
];

/// Parse a duration string such as `"1.5s"`, `"2 minutes"`, `"500ms"` or
/// a bare number of seconds. Returns `None` for anything unparsable or
/// non-positive.
pub(crate) fn parse_duration(text: &str) -> Option<Duration> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (number_text, scale) = DURATION_SUFFIXES
        .iter()
        .find_map(|(suffix, scale)| {
            trimmed
                .strip_suffix(suffix)
                .map(|prefix| (prefix.trim_end(), *scale))
        })
        .unwrap_or((trimmed, 1.0));

    let number: f64 = number_text.parse().ok()?;
    if !number.is_finite() || number <= 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(number * scale))
}

/// Render a duration the way reports show it: `"1 minute 30 seconds"`,
/// `"2 seconds"`, `"500 milliseconds"`.
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_millis = duration.as_millis();
    if total_millis < 1000 {
        return format!("{} {}", total_millis, plural("millisecond", total_millis));
    }

    let mut parts = Vec::new();
    let mut remaining_millis = total_millis;

    for (unit, millis_per_unit) in [("hour", 3_600_000), ("minute", 60_000)] {
        let count = remaining_millis / millis_per_unit;
        if count > 0 {
            parts.push(format!("{} {}", count, plural(unit, count)));
            remaining_millis %= millis_per_unit;
        }
    }

    if remaining_millis > 0 || parts.is_empty() {
        let seconds = remaining_millis as f64 / 1000.0;
        let rendered = if seconds.fract() == 0.0 {
            format!("{}", seconds as u128)
        } else {
            format!("{seconds}")
        };
        let count = if (seconds - 1.0).abs() < f64::EPSILON { 1 } else { 2 };
        parts.push(format!("{} {}", rendered, plural("second", count as u128)));
    }

    parts.join(" ")
}

fn plural(unit: &str, count: u128) -> String {
    if count == 1 {
        unit.to_string()
    } else {
        format!("{unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{BoundValue, ScopeStack};
    use serde_json::json;

    #[test]
    fn durations_parse_with_and_without_suffixes() {
        assert_eq!(parse_duration("2s"), Some(Duration::from_secs(2)));
        assert_eq!(parse_duration("1.5 seconds"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("2 minutes"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("42"), Some(Duration::from_secs(42)));
    }

    #[test]
    fn invalid_and_non_positive_durations_are_rejected() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration("0"), None);
    }

    #[test]
    fn durations_render_like_reports_expect() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500 milliseconds");
        assert_eq!(format_duration(Duration::from_secs(2)), "2 seconds");
        assert_eq!(format_duration(Duration::from_secs(1)), "1 second");
        assert_eq!(format_duration(Duration::from_secs(90)), "1 minute 30 seconds");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1 hour");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5 seconds");
    }

    #[test]
    fn timeout_spec_resolves_value_and_message_through_variables() {
        let mut scope = ScopeStack::new();
        scope.bind("limit", BoundValue::Scalar(json!("90s")));
        scope.bind("op", BoundValue::Scalar(json!("deploy")));
        let spec = TimeoutSpec {
            value: "${limit}".into(),
            message: Some("${op} took too long".into()),
        };

        let deadline = resolve_timeout(&spec, &scope).expect("resolve timeout");
        assert_eq!(deadline.display(), "1 minute 30 seconds");
        assert_eq!(deadline.failure().message, "deploy took too long");
    }

    #[test]
    fn unparsable_timeout_value_is_a_syntax_failure() {
        let scope = ScopeStack::new();
        let spec = TimeoutSpec {
            value: "whenever".into(),
            message: None,
        };
        let failure = resolve_timeout(&spec, &scope).expect_err("should fail");
        assert_eq!(failure.kind, keyflow_types::FailureKind::Syntax);
        assert!(failure.message.contains("invalid time string 'whenever'"));
    }

    #[test]
    fn default_expiry_message_names_the_resolved_timeout() {
        let deadline = Deadline::after(Duration::ZERO, "2 seconds".into(), None);
        assert!(deadline.expired());
        let failure = deadline.failure();
        assert_eq!(failure.message, "Keyword timeout 2 seconds exceeded.");
        assert_eq!(failure.kind, keyflow_types::FailureKind::Timeout);
    }
}
