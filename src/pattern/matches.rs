//! Value-against-pattern matching. Pure and resolver read-only.
use indexmap::IndexMap;

use super::{ArrayPattern, ObjectPattern, Pattern, UnexpectedKeys, is_optional, resolve, without_optionality};
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::value::Value;

impl Pattern {
    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        match self {
            Pattern::String => match value {
                Value::String(_) => MatchResult::Success,
                other => MatchResult::mismatch("string", other),
            },
            Pattern::Number => match value {
                Value::Number(_) => MatchResult::Success,
                other => MatchResult::mismatch("number", other),
            },
            Pattern::Boolean => match value {
                Value::Boolean(_) => MatchResult::Success,
                other => MatchResult::mismatch("boolean", other),
            },
            // An empty body is how HTTP says "nothing".
            Pattern::Null => match value {
                Value::Null => MatchResult::Success,
                other if other.is_empty_string() => MatchResult::Success,
                other => MatchResult::mismatch("null", other),
            },
            Pattern::Url(scheme) => match value {
                Value::String(s) if scheme.accepts(s) => MatchResult::Success,
                Value::String(s) => MatchResult::failure(format!(
                    "Expected url with prefix {}, actual was \"{s}\"",
                    scheme.prefix()
                )),
                other => MatchResult::mismatch("url", other),
            },
            Pattern::Exact(expected) => {
                if expected == value {
                    MatchResult::Success
                } else {
                    MatchResult::mismatch(expected.display_value(), value)
                }
            }
            Pattern::Rest(inner) => match value {
                Value::Array(items) => matches_each(inner, items, 0, resolver),
                other => MatchResult::mismatch("json array", other),
            },
            Pattern::Deferred(_) => match resolve(self, resolver) {
                Ok(resolved) => resolved.matches(value, resolver),
                Err(error) => MatchResult::failure(error.to_string()),
            },
            Pattern::AnyOf(alternatives) => matches_any(self, alternatives, value, resolver),
            Pattern::Object(object) => matches_object(object, value, resolver),
            Pattern::Array(array) => matches_array(array, value, resolver),
        }
    }
}

impl ObjectPattern {
    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        matches_object(self, value, resolver)
    }
}

fn matches_any(pattern: &Pattern, alternatives: &[Pattern], value: &Value, resolver: &Resolver) -> MatchResult {
    let mut failures = Vec::new();
    for alternative in alternatives {
        match alternative.matches(value, resolver) {
            MatchResult::Success => return MatchResult::Success,
            failure => failures.push(failure),
        }
    }
    // A single non-null alternative reports its own, more precise failure.
    let non_null = alternatives.iter().filter(|p| **p != Pattern::Null).count();
    if non_null == 1 {
        if let Some(index) = alternatives.iter().position(|p| *p != Pattern::Null) {
            return failures.swap_remove(index);
        }
    }
    MatchResult::mismatch(pattern.type_name(), value)
}

fn matches_object(object: &ObjectPattern, value: &Value, resolver: &Resolver) -> MatchResult {
    let resolver = resolver.with_null_type();
    let Value::Object(actual) = value else {
        return MatchResult::mismatch("json object", value);
    };

    if let Some(key_error) = find_key_error(object, actual, &resolver) {
        return key_error;
    }

    for (key, pattern) in object.fields() {
        let name = without_optionality(key);
        let Some(sample) = actual.get(name) else { continue };
        if is_optional(key) && sample.is_null() && resolver.is_null_tolerant() {
            continue;
        }
        let result = pattern.matches(sample, &resolver);
        if result.is_failure() {
            return result.breadcrumb(name);
        }
    }

    MatchResult::Success
}

/// First missing required key, then first unexpected key (when the object
/// rejects them).
fn find_key_error(object: &ObjectPattern, actual: &IndexMap<String, Value>, resolver: &Resolver) -> Option<MatchResult> {
    for (key, pattern) in object.required_keys() {
        if actual.contains_key(key) {
            continue;
        }
        if resolver.is_null_tolerant() && pattern.matches(&Value::Null, resolver).is_success() {
            continue;
        }
        return Some(MatchResult::failure(format!("Key {key} is missing")).breadcrumb(key));
    }

    if object.unexpected_keys() == UnexpectedKeys::Reject {
        if let Some(extra) = actual.keys().find(|k| object.field(k).is_none()) {
            return Some(MatchResult::failure(format!("Key {extra} was unexpected")).breadcrumb(extra.clone()));
        }
    }

    None
}

fn matches_array(array: &ArrayPattern, value: &Value, resolver: &Resolver) -> MatchResult {
    let Value::Array(items) = value else {
        return MatchResult::mismatch("json array", value);
    };
    if array.elements().is_empty() {
        return MatchResult::Success;
    }

    let resolver = resolver.with_null_type();
    let members = array.members();

    for (index, pattern) in members.fixed.iter().enumerate() {
        let Some(item) = items.get(index) else {
            return length_mismatch(array, items.len());
        };
        let result = pattern.matches(item, &resolver);
        if result.is_failure() {
            return result.breadcrumb(format!("[{index}]"));
        }
    }

    match members.rest {
        Some(rest) => matches_each(rest, &items[members.fixed.len()..], members.fixed.len(), &resolver),
        None if items.len() > members.fixed.len() => length_mismatch(array, items.len()),
        None => MatchResult::Success,
    }
}

/// Every item against one pattern; breadcrumbs count from `offset`.
fn matches_each(pattern: &Pattern, items: &[Value], offset: usize, resolver: &Resolver) -> MatchResult {
    for (index, item) in items.iter().enumerate() {
        let result = pattern.matches(item, resolver);
        if result.is_failure() {
            return result.breadcrumb(format!("[{}]", offset + index));
        }
    }
    MatchResult::Success
}

fn length_mismatch(array: &ArrayPattern, actual: usize) -> MatchResult {
    let members = array.members();
    let expected = match members.rest {
        Some(_) => format!("at least {}", members.fixed.len()),
        None => members.fixed.len().to_string(),
    };
    MatchResult::failure(format!("Expected an array of length {expected}, actual length {actual}"))
}
