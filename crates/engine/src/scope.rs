//! Variable scope and interpolation.
//!
//! Variables are written `${name}` (scalar), `@{name}` (list) and
//! `&{name}` (mapping). An expression that is exactly one decorated
//! variable resolves to the stored value itself; anywhere else variables
//! are interpolated into the surrounding text. Scopes stack per keyword
//! call: reads fall through to outer frames, writes always land in the
//! innermost one.

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use keyflow_types::Failure;

/// The three variable shapes a name can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// `${name}`
    Scalar,
    /// `@{name}`
    List,
    /// `&{name}`
    Mapping,
}

/// A value bound into a scope frame.
///
/// Lists and mappings are kept in their own shapes (not as JSON arrays /
/// objects) so that binding preserves the kind a parameter was declared
/// with and mappings keep their insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// A single value of any shape.
    Scalar(Value),
    /// An ordered sequence.
    List(Vec<Value>),
    /// An insertion-ordered mapping.
    Mapping(IndexMap<String, Value>),
}

impl BoundValue {
    /// The bound value as a plain JSON value.
    pub fn as_value(&self) -> Value {
        match self {
            BoundValue::Scalar(value) => value.clone(),
            BoundValue::List(items) => Value::Array(items.clone()),
            BoundValue::Mapping(entries) => {
                Value::Object(entries.iter().map(|(key, value)| (key.clone(), value.clone())).collect())
            }
        }
    }

    /// Compact rendering used by trace diagnostics.
    pub fn render(&self) -> String {
        serde_json::to_string(&self.as_value()).unwrap_or_else(|_| String::from("<unrenderable>"))
    }
}

/// Errors raised while resolving variable expressions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    #[error("Variable '{name}' not found.")]
    NotFound { name: String },

    #[error("Value of variable '{name}' is not a list.")]
    NotAList { name: String },
}

impl From<VariableError> for Failure {
    fn from(error: VariableError) -> Self {
        Failure::variable(error.to_string())
    }
}

/// Splits a decorated variable expression (`${x}`, `@{x}`, `&{x}`) into
/// its kind and undecorated name. Returns `None` for anything that is not
/// exactly one decorated variable.
pub(crate) fn parse_decorated(expression: &str) -> Option<(VariableKind, &str)> {
    let kind = match expression.as_bytes().first()? {
        b'$' => VariableKind::Scalar,
        b'@' => VariableKind::List,
        b'&' => VariableKind::Mapping,
        _ => return None,
    };
    let inner = expression[1..].strip_prefix('{')?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains(['{', '}']) {
        return None;
    }
    Some((kind, inner))
}

/// True when the expression is a list-splice marker (`@{name}`): an item
/// that expands to multiple values when a sequence is resolved.
pub fn is_splice_marker(expression: &str) -> bool {
    matches!(parse_decorated(expression), Some((VariableKind::List, _)))
}

/// Stack of variable frames, innermost last.
#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<IndexMap<String, BoundValue>>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    /// A scope stack with a single base frame.
    pub fn new() -> Self {
        Self {
            frames: vec![IndexMap::new()],
        }
    }

    /// Open a new frame for a keyword call.
    pub fn push_frame(&mut self) {
        self.frames.push(IndexMap::new());
    }

    /// Close the innermost frame. The base frame is never removed.
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Bind (or replace) a name in the innermost frame.
    pub fn bind(&mut self, name: &str, value: BoundValue) {
        let frame = self.frames.last_mut().expect("scope stack keeps a base frame");
        frame.insert(name.to_string(), value);
    }

    /// Look a name up, innermost frame first.
    pub fn lookup(&self, name: &str) -> Option<&BoundValue> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Resolve an argument expression to a single value.
    ///
    /// An expression that is exactly one decorated variable yields the
    /// stored value; any other text is interpolated and yields a string.
    pub fn resolve_scalar(&self, expression: &str) -> Result<Value, VariableError> {
        if let Some((_, name)) = parse_decorated(expression) {
            let bound = self.lookup(name).ok_or_else(|| VariableError::NotFound {
                name: expression.to_string(),
            })?;
            return Ok(bound.as_value());
        }
        Ok(Value::String(self.interpolate(expression, true)?))
    }

    /// Resolve an expression to a string, failing on unknown variables.
    pub fn resolve_string(&self, expression: &str) -> Result<String, VariableError> {
        self.interpolate(expression, true)
    }

    /// Interpolate an expression, leaving unknown variables in place.
    /// Used for documentation and tag templates where resolution failures
    /// are ignored.
    pub fn interpolate_lenient(&self, expression: &str) -> String {
        self.interpolate(expression, false).expect("lenient interpolation cannot fail")
    }

    /// Resolve a sequence of item expressions, expanding `@{list}` splice
    /// markers in place.
    pub fn resolve_items(&self, items: &[String]) -> Result<Vec<Value>, VariableError> {
        let mut resolved = Vec::with_capacity(items.len());
        for item in items {
            match parse_decorated(item) {
                Some((VariableKind::List, name)) => match self.lookup(name) {
                    Some(BoundValue::List(values)) => resolved.extend(values.iter().cloned()),
                    Some(BoundValue::Scalar(Value::Array(values))) => resolved.extend(values.iter().cloned()),
                    Some(_) => {
                        return Err(VariableError::NotAList { name: item.clone() });
                    }
                    None => {
                        return Err(VariableError::NotFound { name: item.clone() });
                    }
                },
                _ => resolved.push(self.resolve_scalar(item)?),
            }
        }
        Ok(resolved)
    }

    fn interpolate(&self, input: &str, strict: bool) -> Result<String, VariableError> {
        let mut output = String::new();
        let mut remaining = input;

        while let Some(start) = find_variable_start(remaining) {
            let (before, rest) = remaining.split_at(start);
            output.push_str(before);

            match rest.find('}') {
                Some(end) => {
                    let token = &rest[..=end];
                    let name = &rest[2..end];
                    match self.lookup(name) {
                        Some(bound) => output.push_str(&format_value(&bound.as_value())),
                        None if strict => {
                            return Err(VariableError::NotFound { name: token.to_string() });
                        }
                        // Unknown variable in lenient mode keeps its text.
                        None => output.push_str(token),
                    }
                    remaining = &rest[end + 1..];
                }
                None => {
                    // Unterminated variable marker, keep the rest as-is.
                    output.push_str(rest);
                    return Ok(output);
                }
            }
        }

        output.push_str(remaining);
        Ok(output)
    }
}

fn find_variable_start(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    bytes
        .windows(2)
        .position(|window| matches!(window[0], b'$' | b'@' | b'&') && window[1] == b'{')
}

/// Renders a value for embedding into surrounding text.
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(boolean) => boolean.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
