//! Structural subtyping: does every value `smaller` accepts also fit `bigger`?
//!
//! Each side resolves named references in its own resolver. The type stack
//! holds the `(bigger, smaller)` name pairs currently being compared; meeting
//! the same pair again means a recursive type has been unfolded once already
//! and the enclosing comparison will decide.
use super::{Members, ObjectPattern, Pattern, resolve, without_optionality};
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::value::Value;

pub type TypeStack = Vec<(String, String)>;

impl Pattern {
    pub fn encompasses(
        &self,
        smaller: &Pattern,
        this_resolver: &Resolver,
        other_resolver: &Resolver,
        seen: &mut TypeStack,
    ) -> MatchResult {
        let pair = match (self.name(), smaller.name()) {
            (Some(a), Some(b)) => Some((a.to_string(), b.to_string())),
            _ => None,
        };
        if let Some(pair) = &pair {
            if seen.contains(pair) {
                return MatchResult::Success;
            }
            seen.push(pair.clone());
        }

        let result = match (resolve(self, this_resolver), resolve(smaller, other_resolver)) {
            (Ok(bigger), Ok(smaller)) => encompasses_resolved(bigger, smaller, this_resolver, other_resolver, seen),
            (Err(error), _) | (_, Err(error)) => MatchResult::failure(error.to_string()),
        };

        if pair.is_some() {
            seen.pop();
        }
        result
    }

    /// Convenience entry point with an empty type stack.
    pub fn encompasses_pattern(&self, smaller: &Pattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        self.encompasses(smaller, this_resolver, other_resolver, &mut TypeStack::new())
    }
}

impl ObjectPattern {
    pub fn encompasses(&self, smaller: &ObjectPattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        encompasses_object(self, smaller, this_resolver, other_resolver, &mut TypeStack::new())
    }
}

fn encompasses_resolved(
    bigger: &Pattern,
    smaller: &Pattern,
    this_resolver: &Resolver,
    other_resolver: &Resolver,
    seen: &mut TypeStack,
) -> MatchResult {
    match (bigger, smaller) {
        (_, Pattern::AnyOf(alternatives)) => MatchResult::all(
            alternatives
                .iter()
                .map(|alternative| bigger.encompasses(alternative, this_resolver, other_resolver, seen)),
        ),
        (Pattern::AnyOf(alternatives), _) => {
            encompasses_any(bigger, alternatives, smaller, this_resolver, other_resolver, seen)
        }
        (Pattern::Exact(expected), Pattern::Exact(actual)) => {
            if expected == actual { MatchResult::Success } else { type_mismatch(bigger, smaller) }
        }
        (_, Pattern::Exact(value)) => bigger.matches(value, &this_resolver.with_null_type()),
        (Pattern::Exact(_), _) => type_mismatch(bigger, smaller),
        (Pattern::String, Pattern::String)
        | (Pattern::Number, Pattern::Number)
        | (Pattern::Boolean, Pattern::Boolean)
        | (Pattern::Null, Pattern::Null)
        | (Pattern::String, Pattern::Url(_)) => MatchResult::Success,
        (Pattern::Url(a), Pattern::Url(b)) if a.encompasses(b) => MatchResult::Success,
        (Pattern::Object(a), Pattern::Object(b)) => encompasses_object(a, b, this_resolver, other_resolver, seen),
        (Pattern::Array(_) | Pattern::Rest(_), Pattern::Array(_) | Pattern::Rest(_)) => {
            encompasses_sequence(bigger, smaller, this_resolver, other_resolver, seen)
        }
        _ => type_mismatch(bigger, smaller),
    }
}

/// Some alternative of `bigger` must take `smaller`. A union with a single
/// non-null alternative reports that alternative's own failure.
fn encompasses_any(
    bigger: &Pattern,
    alternatives: &[Pattern],
    smaller: &Pattern,
    this_resolver: &Resolver,
    other_resolver: &Resolver,
    seen: &mut TypeStack,
) -> MatchResult {
    let mut failures = Vec::with_capacity(alternatives.len());
    for alternative in alternatives {
        match alternative.encompasses(smaller, this_resolver, other_resolver, seen) {
            MatchResult::Success => return MatchResult::Success,
            failure => failures.push(failure),
        }
    }
    let mut non_null = alternatives.iter().zip(failures).filter(|(alternative, _)| **alternative != Pattern::Null);
    match (non_null.next(), non_null.next()) {
        (Some((_, failure)), None) => failure,
        _ => type_mismatch(bigger, smaller),
    }
}

fn type_mismatch(bigger: &Pattern, smaller: &Pattern) -> MatchResult {
    MatchResult::failure(format!("Expected {}, got {}", bigger.type_name(), smaller.type_name()))
}

fn encompasses_object(
    bigger: &ObjectPattern,
    smaller: &ObjectPattern,
    this_resolver: &Resolver,
    other_resolver: &Resolver,
    seen: &mut TypeStack,
) -> MatchResult {
    let this_resolver = this_resolver.with_null_type();
    let other_resolver = other_resolver.with_null_type();

    // Required on the bigger side must be required on the smaller side,
    // unless null may stand in for the absent value.
    for (key, pattern) in bigger.required_keys() {
        let required_in_smaller = smaller.fields().contains_key(key);
        if required_in_smaller {
            continue;
        }
        let absence_ok = pattern.matches(&Value::Null, &this_resolver).is_success();
        if !absence_ok {
            return MatchResult::failure(format!("Key {key} was missing")).breadcrumb(key);
        }
    }

    for (key, bigger_pattern) in bigger.fields() {
        let name = without_optionality(key);
        let Some((_, smaller_pattern)) = smaller.field(name) else { continue };
        let result = bigger_pattern.encompasses(smaller_pattern, &this_resolver, &other_resolver, seen);
        if result.is_failure() {
            return result.breadcrumb(name);
        }
    }

    MatchResult::Success
}

/// `Rest(x)` on its own behaves as the endless sequence `[x...]`.
fn members_of(pattern: &Pattern) -> Option<Members<'_>> {
    match pattern {
        Pattern::Array(array) => Some(array.members()),
        Pattern::Rest(inner) => Some(Members { fixed: &[], rest: Some(&**inner) }),
        _ => None,
    }
}

fn is_unconstrained(pattern: &Pattern) -> bool {
    matches!(pattern, Pattern::Array(array) if array.elements().is_empty())
}

fn encompasses_sequence(
    bigger: &Pattern,
    smaller: &Pattern,
    this_resolver: &Resolver,
    other_resolver: &Resolver,
    seen: &mut TypeStack,
) -> MatchResult {
    if is_unconstrained(bigger) {
        return MatchResult::Success;
    }
    if is_unconstrained(smaller) {
        return type_mismatch(bigger, smaller);
    }
    let (Some(these), Some(those)) = (members_of(bigger), members_of(smaller)) else {
        return type_mismatch(bigger, smaller);
    };

    if those.is_endless() && !these.is_endless() {
        return MatchResult::failure("Finite list is not a superset of an infinite list.");
    }

    let this_resolver = this_resolver.with_null_type();
    let other_resolver = other_resolver.with_null_type();

    let length = these.fixed.len().max(those.fixed.len());
    for index in 0..length {
        let result = match (these.at(index), those.at(index)) {
            (Some(b), Some(s)) => b.encompasses(s, &this_resolver, &other_resolver, seen),
            // the smaller sequence is done; fine only if bigger may stop here
            (Some(_), None) if index >= these.fixed.len() => MatchResult::Success,
            (Some(_), None) | (None, Some(_)) => MatchResult::failure(format!(
                "Expected an array of length {}, got one of length {}",
                describe_length(&these),
                describe_length(&those)
            )),
            (None, None) => MatchResult::Success,
        };
        if result.is_failure() {
            return result.breadcrumb(format!("[{index}]"));
        }
    }

    match (these.rest, those.rest) {
        (Some(b), Some(s)) => b
            .encompasses(s, &this_resolver, &other_resolver, seen)
            .breadcrumb(format!("[{length}...]")),
        _ => MatchResult::Success,
    }
}

fn describe_length(members: &Members<'_>) -> String {
    match members.rest {
        Some(_) => format!("at least {}", members.fixed.len()),
        None => members.fixed.len().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::parsed_pattern;

    fn p(text: &str) -> Pattern {
        parsed_pattern(text).unwrap()
    }

    fn encompasses(bigger: &str, smaller: &str) -> MatchResult {
        let resolver = Resolver::default();
        p(bigger).encompasses_pattern(&p(smaller), &resolver, &resolver)
    }

    #[test]
    fn scalars() {
        assert!(encompasses("(number)", "(number)").is_success());
        assert!(encompasses("(string)", "(number)").is_failure());
        assert!(encompasses("(string)", "(url)").is_success());
        assert!(encompasses("(url)", "(url https)").is_success());
        assert!(encompasses("(url https)", "(url)").is_failure());
    }

    #[test]
    fn exact_values() {
        assert!(encompasses("(number)", "10").is_failure());
        let resolver = Resolver::default();
        let ten = Pattern::Exact(Value::number(10));
        assert!(Pattern::Number.encompasses_pattern(&ten, &resolver, &resolver).is_success());
        assert!(ten.encompasses_pattern(&ten, &resolver, &resolver).is_success());
        assert!(ten.encompasses_pattern(&Pattern::Number, &resolver, &resolver).is_failure());
    }

    #[test]
    fn nullable_unions() {
        assert!(encompasses("(number?)", "(number)").is_success());
        assert!(encompasses("(number?)", "(null)").is_success());
        assert!(encompasses("(number)", "(number?)").is_failure());
        assert!(encompasses("(number?)", "(number?)").is_success());
    }

    #[test]
    fn required_key_must_stay_required() {
        let failure = encompasses(r#"{"value": "(number)", "optional": "(number)"}"#, r#"{"value": "(number)", "optional?": "(number)"}"#);
        let failure = failure.as_failure().unwrap();
        assert_eq!(failure.path(), "optional");
        assert_eq!(failure.messages(), vec!["Key optional was missing"]);

        assert!(encompasses(r#"{"value": "(number)", "optional?": "(number)"}"#, r#"{"value": "(number)", "optional": "(number)"}"#).is_success());
    }

    #[test]
    fn extra_keys_in_smaller_are_ignored() {
        assert!(encompasses(r#"{"a": "(number)"}"#, r#"{"a": "(number)", "b": "(string)"}"#).is_success());
    }

    #[test]
    fn nullable_required_key_tolerates_absence() {
        assert!(encompasses(r#"{"a": "(number?)"}"#, r#"{}"#).is_success());
    }

    #[test]
    fn finite_does_not_encompass_endless() {
        let result = encompasses(r#"["(number)"]"#, r#"["(number...)"]"#);
        assert_eq!(result.as_failure().unwrap().messages(), vec!["Finite list is not a superset of an infinite list."]);
        assert!(encompasses(r#"["(number...)"]"#, r#"["(number)", "(number)"]"#).is_success());
        assert!(encompasses(r#"["(number...)"]"#, r#"["(number...)"]"#).is_success());
        assert!(encompasses(r#"["(number)", "(string)"]"#, r#"["(number)"]"#).is_failure());
    }

    #[test]
    fn sequence_mismatch_is_located() {
        let result = encompasses(r#"[{"name": "(string)"}, "(number...)"]"#, r#"[{"name": "(number)"}, "(number)"]"#);
        assert_eq!(result.as_failure().unwrap().path(), "[0].name");
    }

    #[test]
    fn named_types_resolve_independently() {
        let older = Resolver::new([("Customer", p(r#"{"name": "(string)"}"#))]);
        let newer_same = Resolver::new([("Customer", p(r#"{"name": "(string)"}"#))]);
        let newer_diverged = Resolver::new([("Customer", p(r#"{"name": "(number)"}"#))]);
        let customer = Pattern::deferred("Customer");

        assert!(customer.encompasses_pattern(&customer, &older, &newer_same).is_success());
        let diverged = customer.encompasses_pattern(&customer, &older, &newer_diverged);
        assert_eq!(diverged.as_failure().unwrap().path(), "name");
    }

    #[test]
    fn recursive_types_terminate() {
        let node = p(r#"{"value": "(number)", "next": "(Node?)"}"#);
        let resolver = Resolver::new([("Node", node)]);
        let reference = Pattern::deferred("Node");
        assert!(reference.encompasses_pattern(&reference, &resolver, &resolver).is_success());

        let other = Resolver::new([("Node", p(r#"{"value": "(string)", "next": "(Node?)"}"#))]);
        assert!(reference.encompasses_pattern(&reference, &resolver, &other).is_failure());
    }

    #[test]
    fn nullable_references_keep_the_nested_location() {
        let older = Resolver::new([("Address", p(r#"{"street": "(string)", "zip": "(number)"}"#))]);
        let newer = Resolver::new([("Address", p(r#"{"street": "(string)", "zip": "(string)"}"#))]);
        let body = p(r#"{"address": "(Address?)"}"#);

        assert!(body.encompasses_pattern(&body, &older, &older).is_success());
        let result = body.encompasses_pattern(&body, &older, &newer);
        let failure = result.as_failure().unwrap();
        assert_eq!(failure.path(), "address.zip");
        assert_eq!(failure.messages(), vec!["Expected number, got string"]);

        let nullable = encompasses("(number?)", r#"{"a": "(string)"}"#);
        assert_eq!(nullable.as_failure().unwrap().messages(), vec!["Expected number, got json object"]);

        let resolver = Resolver::default();
        let either = Pattern::AnyOf(vec![Pattern::Number, Pattern::Boolean]);
        let result = either.encompasses_pattern(&Pattern::String, &resolver, &resolver);
        assert_eq!(result.as_failure().unwrap().messages(), vec!["Expected number or boolean, got string"]);
    }

    #[test]
    fn category_mismatch_quotes_both_names() {
        let result = encompasses(r#"{"a": "(number)"}"#, r#"["(number)"]"#);
        assert_eq!(result.as_failure().unwrap().messages(), vec!["Expected json object, got json array"]);
    }
}
