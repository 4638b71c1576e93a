//! Call-site models: what a single keyword invocation looks like before
//! any resolution has happened.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Raw call-site arguments, already split into positional and named but
/// otherwise unresolved.
///
/// The split itself is an upstream concern; expressions arrive here
/// verbatim (`"${app}"`, `"retries=3"` becomes `named["retries"] = "3"`).
/// Named arguments preserve the order they were written in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallArguments {
    /// Positional argument expressions, in call order.
    #[serde(default)]
    pub positional: Vec<String>,
    /// Named argument expressions, in call order.
    #[serde(default)]
    pub named: IndexMap<String, String>,
}

impl CallArguments {
    /// Arguments consisting of positional expressions only.
    pub fn positional<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: IndexMap::new(),
        }
    }

    /// True when no arguments were supplied at all.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Total number of supplied arguments.
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// The arguments as they were written, for reporting (`value`,
    /// `name=value`).
    pub fn display_list(&self) -> Vec<String> {
        let mut rendered: Vec<String> = self.positional.clone();
        rendered.extend(self.named.iter().map(|(name, value)| format!("{name}={value}")));
        rendered
    }
}

/// Why a keyword is being invoked; reported as-is, never interpreted by
/// the engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Ordinary body step.
    #[default]
    Normal,
    /// Setup position of an enclosing construct.
    Setup,
    /// Teardown position of an enclosing construct.
    Teardown,
}

/// One keyword invocation as issued by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordCall {
    /// Call-site name; for embedded-argument keywords this carries the
    /// argument values inside the text.
    pub name: String,
    /// Unresolved call arguments.
    #[serde(default)]
    pub args: CallArguments,
    /// Caller variable names that receive the return value
    /// (`${out}`, optionally a trailing `@{rest}` collector).
    #[serde(default)]
    pub assign: Vec<String>,
    /// Invocation position.
    #[serde(default)]
    pub kind: CallKind,
}

impl KeywordCall {
    /// A plain call with no arguments and no assignment.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: CallArguments::default(),
            assign: Vec::new(),
            kind: CallKind::Normal,
        }
    }

    /// A call with the given arguments.
    pub fn with_args(name: impl Into<String>, args: CallArguments) -> Self {
        Self {
            name: name.into(),
            args,
            assign: Vec::new(),
            kind: CallKind::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    #[test]
    fn display_list_appends_named_arguments_in_call_order() {
        let args = CallArguments {
            positional: vec!["1".into(), "${two}".into()],
            named: indexmap! {
                "retries".to_string() => "3".to_string(),
                "app".to_string() => "${app}".to_string(),
            },
        };

        assert_eq!(args.display_list(), vec!["1", "${two}", "retries=3", "app=${app}"]);
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn calls_deserialize_with_defaulted_fields() {
        let call: KeywordCall = serde_json::from_str(r#"{"name": "Create App"}"#).expect("deserialize call");
        assert_eq!(call.name, "Create App");
        assert!(call.args.is_empty());
        assert!(call.assign.is_empty());
        assert_eq!(call.kind, CallKind::Normal);
    }
}
