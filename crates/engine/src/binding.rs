//! Argument binding.
//!
//! Maps call-site arguments onto a keyword's parameter contract and writes
//! the results into the call's variable frame. Two strategies exist,
//! selected once at keyword-selection time: explicit arguments supplied at
//! the call site, or arguments embedded in the call name and extracted by
//! pattern matching. Also hosts assignment-target distribution for the
//! caller side of `${out} =  Keyword`.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use tracing::trace;

use keyflow_types::{CallArguments, EmbeddedSignature, Failure, ParameterContract};

use crate::scope::{BoundValue, ScopeStack, VariableKind, parse_decorated};

/// How a keyword receives its arguments.
#[derive(Debug)]
pub enum ArgumentBindingStrategy {
    /// Arguments are supplied explicitly at the call site.
    Explicit,
    /// Arguments are extracted from the call name at selection time.
    EmbeddedFromName(EmbeddedBindings),
}

/// Name/text pairs captured from an embedded-argument call name.
///
/// The captured texts stay unresolved until the keyword actually runs;
/// dry validation never touches them.
#[derive(Debug)]
pub struct EmbeddedBindings {
    pairs: Vec<(String, String)>,
}

impl EmbeddedBindings {
    /// The embedded parameter names in declared order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(name, _)| name.as_str())
    }
}

/// Call arguments after variable resolution in the caller's scope,
/// ready to be bound into the fresh call frame.
pub enum ResolvedArguments {
    /// Resolved explicit arguments.
    Explicit {
        positional: Vec<Value>,
        named: IndexMap<String, Value>,
    },
    /// Resolved embedded name/value pairs.
    Embedded { pairs: Vec<(String, Value)> },
}

impl ArgumentBindingStrategy {
    /// Build the embedded strategy by matching the call name against the
    /// keyword's embedded signature. Fails when the name does not match;
    /// this happens at keyword-selection time, before any invocation.
    pub fn embedded(signature: &EmbeddedSignature, call_name: &str) -> Result<Self, Failure> {
        let pattern = Regex::new(&signature.pattern).map_err(|error| {
            Failure::syntax(format!(
                "Compiling embedded argument pattern '{}' failed: {error}",
                signature.pattern
            ))
        })?;
        let captures = pattern.captures(call_name).ok_or_else(|| {
            Failure::argument(format!(
                "Keyword name '{call_name}' does not match the embedded argument pattern '{}'.",
                signature.pattern
            ))
        })?;
        let pairs = signature
            .names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let text = captures
                    .get(index + 1)
                    .map(|group| group.as_str().to_string())
                    .unwrap_or_default();
                (name.clone(), text)
            })
            .collect();
        Ok(Self::EmbeddedFromName(EmbeddedBindings { pairs }))
    }

    /// Structural validation without variable resolution: arity, unknown
    /// named arguments, duplicates. This is all a dry run checks; no
    /// values are resolved or bound.
    pub fn validate(&self, keyword_name: &str, contract: &ParameterContract, args: &CallArguments) -> Result<(), Failure> {
        validate_shape(keyword_name, contract, args)
    }

    /// Resolve the call-site actuals in the caller's scope.
    ///
    /// Explicit arguments resolve each expression to a value; embedded
    /// arguments resolve the captured texts as scalars (after checking
    /// that no explicit arguments were supplied on top of them).
    pub fn resolve(
        &self,
        keyword_name: &str,
        contract: &ParameterContract,
        args: &CallArguments,
        variables: &ScopeStack,
    ) -> Result<ResolvedArguments, Failure> {
        validate_shape(keyword_name, contract, args)?;
        match self {
            ArgumentBindingStrategy::Explicit => {
                let positional = args
                    .positional
                    .iter()
                    .map(|expression| variables.resolve_scalar(expression))
                    .collect::<Result<Vec<_>, _>>()?;
                let named = args
                    .named
                    .iter()
                    .map(|(name, expression)| Ok((name.clone(), variables.resolve_scalar(expression)?)))
                    .collect::<Result<IndexMap<_, _>, Failure>>()?;
                Ok(ResolvedArguments::Explicit { positional, named })
            }
            ArgumentBindingStrategy::EmbeddedFromName(bindings) => {
                let pairs = bindings
                    .pairs
                    .iter()
                    .map(|(name, text)| Ok((name.clone(), variables.resolve_scalar(text)?)))
                    .collect::<Result<Vec<_>, Failure>>()?;
                Ok(ResolvedArguments::Embedded { pairs })
            }
        }
    }
}

impl ResolvedArguments {
    /// Map resolved values onto the contract and bind every parameter
    /// into the (freshly pushed) call frame: scalars for positional
    /// parameters, a list for the variadic tail, an insertion-ordered
    /// mapping for the keyword-variadic collector. Defaults are resolved
    /// lazily, in declaration order, so a default may reference an
    /// earlier parameter.
    pub fn bind_into(self, keyword_name: &str, contract: &ParameterContract, variables: &mut ScopeStack) -> Result<(), Failure> {
        match self {
            ResolvedArguments::Explicit { positional, named } => {
                bind_explicit(keyword_name, contract, positional, named, variables)?;
                trace_bound_arguments(keyword_name, contract, variables);
            }
            ResolvedArguments::Embedded { pairs } => {
                let names: Vec<String> = pairs.iter().map(|(name, _)| name.clone()).collect();
                for (name, value) in pairs {
                    variables.bind(&name, BoundValue::Scalar(value));
                }
                trace_embedded_arguments(keyword_name, &names, variables);
            }
        }
        Ok(())
    }
}

fn bind_explicit(
    keyword_name: &str,
    contract: &ParameterContract,
    positional: Vec<Value>,
    named: IndexMap<String, Value>,
    variables: &mut ScopeStack,
) -> Result<(), Failure> {
    let supplied = positional.len();
    let mut slots: Vec<Option<Value>> = contract.positional.iter().map(|_| None).collect();
    let mut tail: Vec<Value> = Vec::new();

    for (index, value) in positional.into_iter().enumerate() {
        if index < slots.len() {
            slots[index] = Some(value);
        } else if contract.varargs.is_some() {
            tail.push(value);
        } else {
            return Err(arity_failure(keyword_name, contract, supplied));
        }
    }

    let mut extra: IndexMap<String, Value> = IndexMap::new();
    for (name, value) in named {
        if let Some(index) = contract.positional.iter().position(|parameter| parameter.name == name) {
            if slots[index].is_some() {
                return Err(Failure::argument(format!(
                    "Keyword '{keyword_name}' got multiple values for argument '{name}'."
                )));
            }
            slots[index] = Some(value);
        } else if contract.kwargs.is_some() {
            extra.insert(name, value);
        } else {
            return Err(Failure::argument(format!(
                "Keyword '{keyword_name}' got unexpected named argument '{name}'."
            )));
        }
    }

    for (parameter, slot) in contract.positional.iter().zip(slots) {
        let value = match slot {
            Some(value) => value,
            None => match &parameter.default {
                Some(expression) => variables.resolve_scalar(expression)?,
                None => {
                    return Err(Failure::argument(format!(
                        "Keyword '{keyword_name}' missing value for argument '{}'.",
                        parameter.name
                    )));
                }
            },
        };
        variables.bind(&parameter.name, BoundValue::Scalar(value));
    }

    if let Some(name) = &contract.varargs {
        variables.bind(name, BoundValue::List(tail));
    }
    if let Some(name) = &contract.kwargs {
        variables.bind(name, BoundValue::Mapping(extra));
    }
    Ok(())
}

fn validate_shape(keyword_name: &str, contract: &ParameterContract, args: &CallArguments) -> Result<(), Failure> {
    if let Some(maximum) = contract.maximum_arity()
        && args.positional.len() > maximum
    {
        return Err(arity_failure(keyword_name, contract, args.positional.len()));
    }

    for name in args.named.keys() {
        let is_parameter = contract.positional.iter().any(|parameter| &parameter.name == name);
        if !is_parameter && contract.kwargs.is_none() {
            return Err(Failure::argument(format!(
                "Keyword '{keyword_name}' got unexpected named argument '{name}'."
            )));
        }
    }

    for (index, parameter) in contract.positional.iter().enumerate() {
        let filled_positionally = index < args.positional.len();
        let filled_by_name = args.named.contains_key(&parameter.name);
        if filled_positionally && filled_by_name {
            return Err(Failure::argument(format!(
                "Keyword '{keyword_name}' got multiple values for argument '{}'.",
                parameter.name
            )));
        }
        if !filled_positionally && !filled_by_name && parameter.default.is_none() {
            return Err(Failure::argument(format!(
                "Keyword '{keyword_name}' missing value for argument '{}'.",
                parameter.name
            )));
        }
    }
    Ok(())
}

fn arity_failure(keyword_name: &str, contract: &ParameterContract, got: usize) -> Failure {
    let expected = contract.arity_text();
    let noun = if expected == "1" { "argument" } else { "arguments" };
    Failure::argument(format!("Keyword '{keyword_name}' expected {expected} {noun}, got {got}."))
}

fn trace_bound_arguments(keyword_name: &str, contract: &ParameterContract, variables: &ScopeStack) {
    trace!(keyword = keyword_name, "Arguments: [ {} ]", {
        let mut parts: Vec<String> = contract
            .positional
            .iter()
            .map(|parameter| rendered_binding('$', &parameter.name, variables))
            .collect();
        if let Some(name) = &contract.varargs {
            parts.push(rendered_binding('@', name, variables));
        }
        if let Some(name) = &contract.kwargs {
            parts.push(rendered_binding('&', name, variables));
        }
        parts.join(" | ")
    });
}

fn trace_embedded_arguments(keyword_name: &str, names: &[String], variables: &ScopeStack) {
    trace!(keyword = keyword_name, "Arguments: [ {} ]", {
        let parts: Vec<String> = names.iter().map(|name| rendered_binding('$', name, variables)).collect();
        parts.join(" | ")
    });
}

fn rendered_binding(sigil: char, name: &str, variables: &ScopeStack) -> String {
    let rendered = variables
        .lookup(name)
        .map(BoundValue::render)
        .unwrap_or_else(|| String::from("<unbound>"));
    format!("{sigil}{{{name}}}={rendered}")
}

/// Check assignment targets structurally: every target must be a decorated
/// variable, at most one list collector is allowed and only in the last
/// position, and a mapping target must stand alone.
pub fn validate_assignment(targets: &[String]) -> Result<(), Failure> {
    for (index, target) in targets.iter().enumerate() {
        match parse_decorated(target) {
            Some((VariableKind::Scalar, _)) => {}
            Some((VariableKind::List, _)) if index == targets.len() - 1 => {}
            Some((VariableKind::List, _)) => {
                return Err(Failure::syntax("Only the last assignment target can be a list."));
            }
            Some((VariableKind::Mapping, _)) if targets.len() == 1 => {}
            Some((VariableKind::Mapping, _)) => {
                return Err(Failure::syntax("A mapping assignment target must be the only target."));
            }
            None => {
                return Err(Failure::syntax(format!("Invalid assignment target '{target}'.")));
            }
        }
    }
    Ok(())
}

/// Distribute a keyword return value over the caller's assignment targets.
///
/// One target takes the whole value in its declared shape; several targets
/// spread a list, with an optional trailing `@{rest}` collecting whatever
/// remains.
pub fn assign_return_value(targets: &[String], value: &Value, variables: &mut ScopeStack) -> Result<(), Failure> {
    if targets.is_empty() {
        return Ok(());
    }

    if let [target] = targets {
        let (kind, name) = parse_decorated(target)
            .ok_or_else(|| Failure::syntax(format!("Invalid assignment target '{target}'.")))?;
        let bound = match kind {
            VariableKind::Scalar => BoundValue::Scalar(value.clone()),
            VariableKind::List => match value {
                Value::Array(items) => BoundValue::List(items.clone()),
                other => return Err(assignment_shape_failure("a list", other)),
            },
            VariableKind::Mapping => match value {
                Value::Object(entries) => {
                    BoundValue::Mapping(entries.iter().map(|(key, entry)| (key.clone(), entry.clone())).collect())
                }
                other => return Err(assignment_shape_failure("a mapping", other)),
            },
        };
        variables.bind(name, bound);
        return Ok(());
    }

    let Value::Array(items) = value else {
        return Err(assignment_shape_failure("a list", value));
    };

    let collects_rest = targets
        .last()
        .and_then(|target| parse_decorated(target))
        .is_some_and(|(kind, _)| kind == VariableKind::List);
    let scalar_count = targets.len() - usize::from(collects_rest);

    if collects_rest {
        if items.len() < scalar_count {
            return Err(Failure::argument(format!(
                "Cannot assign keyword return value: expected a list with at least {scalar_count} items, got {}.",
                items.len()
            )));
        }
    } else if items.len() != scalar_count {
        return Err(Failure::argument(format!(
            "Cannot assign keyword return value: expected a list with {scalar_count} items, got {}.",
            items.len()
        )));
    }

    for (target, item) in targets.iter().take(scalar_count).zip(items) {
        let (_, name) = parse_decorated(target)
            .ok_or_else(|| Failure::syntax(format!("Invalid assignment target '{target}'.")))?;
        variables.bind(name, BoundValue::Scalar(item.clone()));
    }
    if collects_rest {
        let (_, name) = parse_decorated(targets.last().expect("targets checked non-empty"))
            .ok_or_else(|| Failure::syntax("Invalid assignment target.".to_string()))?;
        variables.bind(name, BoundValue::List(items[scalar_count..].to_vec()));
    }
    Ok(())
}

fn assignment_shape_failure(expected: &str, got: &Value) -> Failure {
    Failure::argument(format!(
        "Cannot assign keyword return value: expected {expected}, got {}.",
        value_type_name(got)
    ))
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "none",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;
    use keyflow_types::ParameterSpec;
    use serde_json::json;

    fn contract(positional: Vec<ParameterSpec>, varargs: Option<&str>, kwargs: Option<&str>) -> ParameterContract {
        ParameterContract {
            positional,
            varargs: varargs.map(String::from),
            kwargs: kwargs.map(String::from),
        }
    }

    fn bind_fresh(contract: &ParameterContract, args: &CallArguments) -> Result<ScopeStack, Failure> {
        let caller = ScopeStack::new();
        let resolved = ArgumentBindingStrategy::Explicit.resolve("K", contract, args, &caller)?;
        let mut scope = ScopeStack::new();
        scope.push_frame();
        resolved.bind_into("K", contract, &mut scope)?;
        Ok(scope)
    }

    #[test]
    fn defaulted_and_variadic_parameters_bind_in_order() {
        let contract = contract(
            vec![ParameterSpec::required("a"), ParameterSpec::with_default("b", "2")],
            Some("rest"),
            None,
        );
        let args = CallArguments::positional(["1", "5", "6"]);

        let scope = bind_fresh(&contract, &args).expect("bind");
        assert_eq!(scope.lookup("a"), Some(&BoundValue::Scalar(json!("1"))));
        assert_eq!(scope.lookup("b"), Some(&BoundValue::Scalar(json!("5"))));
        assert_eq!(scope.lookup("rest"), Some(&BoundValue::List(vec![json!("6")])));
    }

    #[test]
    fn missing_actual_falls_back_to_lazily_resolved_default() {
        let contract = contract(
            vec![ParameterSpec::required("host"), ParameterSpec::with_default("url", "http://${host}/")],
            None,
            None,
        );
        let args = CallArguments::positional(["example.org"]);

        let scope = bind_fresh(&contract, &args).expect("bind");
        assert_eq!(scope.lookup("url"), Some(&BoundValue::Scalar(json!("http://example.org/"))));
    }

    #[test]
    fn binding_is_idempotent_across_fresh_scopes() {
        let contract = contract(
            vec![ParameterSpec::required("a"), ParameterSpec::with_default("b", "2")],
            Some("rest"),
            Some("extra"),
        );
        let args = CallArguments {
            positional: vec!["1".into()],
            named: indexmap! { "other".to_string() => "x".to_string() },
        };

        let first = bind_fresh(&contract, &args).expect("first bind");
        let second = bind_fresh(&contract, &args).expect("second bind");
        for name in ["a", "b", "rest", "extra"] {
            assert_eq!(first.lookup(name), second.lookup(name), "mismatch for '{name}'");
        }
    }

    #[test]
    fn named_arguments_fill_parameters_and_collect_into_kwargs() {
        let contract = contract(vec![ParameterSpec::required("a")], None, Some("extra"));
        let args = CallArguments {
            positional: vec![],
            named: indexmap! {
                "zeta".to_string() => "z".to_string(),
                "a".to_string() => "1".to_string(),
                "alpha".to_string() => "y".to_string(),
            },
        };

        let scope = bind_fresh(&contract, &args).expect("bind");
        assert_eq!(scope.lookup("a"), Some(&BoundValue::Scalar(json!("1"))));
        let Some(BoundValue::Mapping(extra)) = scope.lookup("extra") else {
            panic!("kwargs not bound as mapping");
        };
        let keys: Vec<&str> = extra.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"], "insertion order lost");
    }

    #[test]
    fn excess_positionals_without_varargs_fail_with_arity_range() {
        let contract = contract(
            vec![ParameterSpec::required("a"), ParameterSpec::with_default("b", "2")],
            None,
            None,
        );
        let args = CallArguments::positional(["1", "2", "3"]);

        let failure = bind_fresh(&contract, &args).expect_err("should fail");
        assert_eq!(failure.message, "Keyword 'K' expected 1 to 2 arguments, got 3.");
    }

    #[test]
    fn duplicate_and_unexpected_named_arguments_fail() {
        let contract = contract(vec![ParameterSpec::required("a")], None, None);

        let duplicated = CallArguments {
            positional: vec!["1".into()],
            named: indexmap! { "a".to_string() => "2".to_string() },
        };
        let failure = bind_fresh(&contract, &duplicated).expect_err("duplicate should fail");
        assert_eq!(failure.message, "Keyword 'K' got multiple values for argument 'a'.");

        let unexpected = CallArguments {
            positional: vec!["1".into()],
            named: indexmap! { "nope".to_string() => "2".to_string() },
        };
        let failure = bind_fresh(&contract, &unexpected).expect_err("unexpected should fail");
        assert_eq!(failure.message, "Keyword 'K' got unexpected named argument 'nope'.");
    }

    #[test]
    fn missing_required_parameter_is_a_binding_error() {
        let contract = contract(vec![ParameterSpec::required("a"), ParameterSpec::required("b")], None, None);
        let args = CallArguments::positional(["1"]);
        let failure = bind_fresh(&contract, &args).expect_err("should fail");
        assert_eq!(failure.message, "Keyword 'K' missing value for argument 'b'.");
    }

    #[test]
    fn actuals_resolve_in_the_caller_scope() {
        let contract = contract(vec![ParameterSpec::required("a")], None, None);
        let mut caller = ScopeStack::new();
        caller.bind("value", BoundValue::Scalar(json!(7)));
        let args = CallArguments::positional(["${value}"]);

        let resolved = ArgumentBindingStrategy::Explicit
            .resolve("K", &contract, &args, &caller)
            .expect("resolve");
        let mut scope = ScopeStack::new();
        scope.push_frame();
        resolved.bind_into("K", &contract, &mut scope).expect("bind");
        assert_eq!(scope.lookup("a"), Some(&BoundValue::Scalar(json!(7))));
    }

    #[test]
    fn embedded_construction_fails_before_any_binding_when_name_does_not_match() {
        let signature = EmbeddedSignature {
            pattern: "^Open (.+) page$".into(),
            names: vec!["target".into()],
        };
        let failure = ArgumentBindingStrategy::embedded(&signature, "Close the login page").expect_err("should fail");
        assert!(failure.message.contains("does not match"));
    }

    #[test]
    fn embedded_bindings_defer_resolution_until_bind_time() {
        let signature = EmbeddedSignature {
            pattern: "^Open (.+) page$".into(),
            names: vec!["target".into()],
        };
        let strategy = ArgumentBindingStrategy::embedded(&signature, "Open ${kind} page").expect("matching name");

        let mut caller = ScopeStack::new();
        caller.bind("kind", BoundValue::Scalar(json!("login")));
        let resolved = strategy
            .resolve("Open ${kind} page", &ParameterContract::default(), &CallArguments::default(), &caller)
            .expect("resolve");

        let mut scope = ScopeStack::new();
        scope.push_frame();
        resolved
            .bind_into("Open ${kind} page", &ParameterContract::default(), &mut scope)
            .expect("bind");
        assert_eq!(scope.lookup("target"), Some(&BoundValue::Scalar(json!("login"))));
    }

    #[test]
    fn embedded_keywords_reject_explicit_arguments() {
        let signature = EmbeddedSignature {
            pattern: "^Open (.+) page$".into(),
            names: vec!["target".into()],
        };
        let strategy = ArgumentBindingStrategy::embedded(&signature, "Open login page").expect("matching name");
        let args = CallArguments::positional(["extra"]);
        let failure = strategy
            .validate("Open login page", &ParameterContract::default(), &args)
            .expect_err("should fail");
        assert_eq!(failure.message, "Keyword 'Open login page' expected 0 arguments, got 1.");
    }

    #[test]
    fn assignment_spreads_lists_and_collects_the_rest() {
        let mut scope = ScopeStack::new();
        let targets = vec!["${first}".to_string(), "@{rest}".to_string()];
        validate_assignment(&targets).expect("valid targets");
        assign_return_value(&targets, &json!(["a", "b", "c"]), &mut scope).expect("assign");
        assert_eq!(scope.lookup("first"), Some(&BoundValue::Scalar(json!("a"))));
        assert_eq!(scope.lookup("rest"), Some(&BoundValue::List(vec![json!("b"), json!("c")])));
    }

    #[test]
    fn assignment_rejects_short_lists_and_misplaced_collectors() {
        let mut scope = ScopeStack::new();
        let targets = vec!["${a}".to_string(), "${b}".to_string()];
        let failure = assign_return_value(&targets, &json!(["only"]), &mut scope).expect_err("should fail");
        assert_eq!(
            failure.message,
            "Cannot assign keyword return value: expected a list with 2 items, got 1."
        );

        let misplaced = vec!["@{rest}".to_string(), "${a}".to_string()];
        let failure = validate_assignment(&misplaced).expect_err("should fail");
        assert_eq!(failure.message, "Only the last assignment target can be a list.");
    }

    #[test]
    fn single_targets_take_the_whole_value_in_their_shape() {
        let mut scope = ScopeStack::new();
        assign_return_value(&["${whole}".to_string()], &json!(["x", "y"]), &mut scope).expect("assign scalar");
        assert_eq!(scope.lookup("whole"), Some(&BoundValue::Scalar(json!(["x", "y"]))));

        assign_return_value(&["@{items}".to_string()], &json!(["x", "y"]), &mut scope).expect("assign list");
        assert_eq!(scope.lookup("items"), Some(&BoundValue::List(vec![json!("x"), json!("y")])));

        let failure = assign_return_value(&["@{items}".to_string()], &json!("scalar"), &mut scope).expect_err("should fail");
        assert_eq!(failure.message, "Cannot assign keyword return value: expected a list, got a string.");
    }
}
