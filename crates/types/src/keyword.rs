//! Definition-side models for user keywords.
//!
//! A [`KeywordDefinition`] is loaded once (by an external loader) and stays
//! read-only for the lifetime of the program; the engine only ever borrows
//! it. Parameter defaults and timeout values are kept as *unevaluated*
//! expressions so they can be resolved lazily against whatever variable
//! scope is live at invocation time.

use serde::{Deserialize, Serialize};

/// A single declared positional parameter, optionally carrying a default.
///
/// The default is an expression, not a value: `Some("${fallback}")` is
/// resolved against the call scope only when no actual argument was
/// supplied for this parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParameterSpec {
    /// Parameter name, undecorated (`count`, not `${count}`).
    pub name: String,
    /// Optional default expression, resolved lazily at binding time.
    #[serde(default)]
    pub default: Option<String>,
}

impl ParameterSpec {
    /// A required parameter with no default.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// A parameter with a default expression.
    pub fn with_default(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }
}

/// The declared argument signature of a keyword.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParameterContract {
    /// Ordered positional parameters, each optionally defaulted.
    #[serde(default)]
    pub positional: Vec<ParameterSpec>,
    /// Name of the variadic tail (`*rest`), when declared.
    #[serde(default)]
    pub varargs: Option<String>,
    /// Name of the keyword-variadic mapping (`**extra`), when declared.
    #[serde(default)]
    pub kwargs: Option<String>,
}

impl ParameterContract {
    /// Number of positional arguments that must be supplied one way or
    /// another (no default declared).
    pub fn minimum_arity(&self) -> usize {
        self.positional.iter().filter(|parameter| parameter.default.is_none()).count()
    }

    /// Maximum number of positional arguments accepted, `None` when a
    /// variadic tail makes the signature unbounded.
    pub fn maximum_arity(&self) -> Option<usize> {
        if self.varargs.is_some() { None } else { Some(self.positional.len()) }
    }

    /// Human-readable arity range, e.g. `"1 to 3"` or `"at least 2"`.
    pub fn arity_text(&self) -> String {
        let minimum = self.minimum_arity();
        match self.maximum_arity() {
            None => format!("at least {minimum}"),
            Some(maximum) if maximum == minimum => format!("{minimum}"),
            Some(maximum) => format!("{minimum} to {maximum}"),
        }
    }
}

/// Pattern-based signature for keywords whose arguments are embedded in
/// the call name itself.
///
/// `pattern` is a regular expression with one capture group per entry in
/// `names`, in declared order. Matching happens at keyword-selection time;
/// the captured texts are variable-resolved only when the keyword actually
/// runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddedSignature {
    /// Regular expression the full call name must match.
    pub pattern: String,
    /// Embedded parameter names, one per capture group, in declared order.
    #[serde(default)]
    pub names: Vec<String>,
}

/// Declared timeout for a keyword body.
///
/// Both fields are variable-bearing expressions resolved immediately
/// before the body starts; the resolved duration wraps body execution
/// only, never argument binding or teardown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutSpec {
    /// Duration expression, e.g. `"3s"`, `"2 minutes"` or `"${timeout}"`.
    pub value: String,
    /// Optional message template used when the deadline expires.
    #[serde(default)]
    pub message: Option<String>,
}

/// One executable statement of a keyword body or teardown.
///
/// Steps are opaque to the invocation engine; the step sequencer owns
/// their meaning. Arguments stay unresolved here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    /// Name of the keyword this step calls, possibly variable-bearing.
    pub name: String,
    /// Raw argument expressions.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Step {
    /// Convenience constructor for an argument-less step.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

/// A fully loaded user keyword definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordDefinition {
    /// Keyword name as declared.
    pub name: String,
    /// Declaring library or resource name, when any.
    #[serde(default)]
    pub library: Option<String>,
    /// Explicit argument signature.
    #[serde(default)]
    pub contract: ParameterContract,
    /// Embedded-argument signature, for keywords bound from their call name.
    #[serde(default)]
    pub embedded: Option<EmbeddedSignature>,
    /// Optional body timeout.
    #[serde(default)]
    pub timeout: Option<TimeoutSpec>,
    /// Optional teardown step, executed on every invocation outcome.
    #[serde(default)]
    pub teardown: Option<Step>,
    /// Ordered body steps.
    #[serde(default)]
    pub body: Vec<Step>,
    /// Documentation template; may contain variables.
    #[serde(default)]
    pub doc: String,
    /// Tag templates; may contain variables.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Declared return expression, one entry per returned item.
    #[serde(default)]
    pub return_expr: Vec<String>,
}

impl KeywordDefinition {
    /// Minimal definition with the given name and body.
    pub fn new(name: impl Into<String>, body: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            library: None,
            contract: ParameterContract::default(),
            embedded: None,
            timeout: None,
            teardown: None,
            body,
            doc: String::new(),
            tags: Vec::new(),
            return_expr: Vec::new(),
        }
    }

    /// Fully qualified name, `library.name` when a library is declared.
    pub fn longname(&self) -> String {
        match &self.library {
            Some(library) => format!("{}.{}", library, self.name),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_text_covers_fixed_range_and_unbounded_signatures() {
        let fixed = ParameterContract {
            positional: vec![ParameterSpec::required("a"), ParameterSpec::required("b")],
            ..Default::default()
        };
        assert_eq!(fixed.arity_text(), "2");

        let ranged = ParameterContract {
            positional: vec![ParameterSpec::required("a"), ParameterSpec::with_default("b", "2")],
            ..Default::default()
        };
        assert_eq!(ranged.arity_text(), "1 to 2");

        let unbounded = ParameterContract {
            positional: vec![ParameterSpec::required("a")],
            varargs: Some("rest".into()),
            ..Default::default()
        };
        assert_eq!(unbounded.arity_text(), "at least 1");
    }

    #[test]
    fn longname_includes_library_when_declared() {
        let mut definition = KeywordDefinition::new("Open Session", vec![Step::named("Log")]);
        assert_eq!(definition.longname(), "Open Session");
        definition.library = Some("sessions".into());
        assert_eq!(definition.longname(), "sessions.Open Session");
    }

    #[test]
    fn definitions_deserialize_with_defaults() {
        let definition: KeywordDefinition = serde_json::from_str(
            r#"{
                "name": "Create App",
                "contract": {"positional": [{"name": "app"}], "varargs": "rest"},
                "body": [{"name": "Log", "args": ["${app}"]}]
            }"#,
        )
        .expect("deserialize definition");

        assert_eq!(definition.name, "Create App");
        assert_eq!(definition.contract.positional.len(), 1);
        assert_eq!(definition.contract.varargs.as_deref(), Some("rest"));
        assert!(definition.teardown.is_none());
        assert!(definition.return_expr.is_empty());
    }
}
