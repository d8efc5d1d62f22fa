//! Example synthesis and combinatorial expansion.
//!
//! [`Pattern::generate`] produces one random value a pattern accepts.
//! [`Pattern::new_based_on`] produces the concrete pattern variants implied by
//! optional keys, unions and an example row.
use indexmap::IndexMap;
use rand::Rng;
use rand::seq::SliceRandom;

use super::{Pattern, UrlScheme, is_optional, is_pattern_token, parsed_pattern, resolve, without_optionality};
use crate::error::{ContractError, ContractResult};
use crate::resolver::{KeyCombinations, Row, Resolver};
use crate::result::MatchResult;
use crate::value::Value;

const WORD_LENGTH: usize = 5;
const MAX_NUMBER: u32 = 1000;

impl Pattern {
    pub fn generate(&self, resolver: &Resolver) -> ContractResult<Value> {
        generate_value(self, resolver, &mut Vec::new())
    }

    /// Every concrete variant of this pattern under `row`.
    ///
    /// Included optional keys lose their `?`, so each variant states exactly
    /// which keys it carries.
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> ContractResult<Vec<Pattern>> {
        based_on(self, row, resolver, &mut Vec::new())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// GENERATE
// ————————————————————————————————————————————————————————————————————————————

fn random_word() -> String {
    let mut rng = rand::rng();
    (0..WORD_LENGTH).map(|_| char::from(rng.random_range(b'A'..=b'Z'))).collect()
}

fn random_url(scheme: UrlScheme) -> String {
    let host = random_word().to_lowercase();
    let path = random_word().to_lowercase();
    match scheme {
        UrlScheme::Http => format!("http://{host}.com/{path}"),
        UrlScheme::Https | UrlScheme::Any => format!("https://{host}.com/{path}"),
        UrlScheme::Path => format!("/{host}/{path}"),
    }
}

fn generate_value(pattern: &Pattern, resolver: &Resolver, stack: &mut Vec<String>) -> ContractResult<Value> {
    match pattern {
        Pattern::String => Ok(Value::string(random_word())),
        Pattern::Number => Ok(Value::number(rand::rng().random_range(1..=MAX_NUMBER))),
        Pattern::Boolean => Ok(Value::Boolean(rand::rng().random_bool(0.5))),
        Pattern::Null => Ok(Value::Null),
        Pattern::Url(scheme) => Ok(Value::string(random_url(*scheme))),
        Pattern::Exact(value) => Ok(value.clone()),
        Pattern::Rest(inner) => Ok(Value::Array(vec![generate_value(inner, resolver, stack)?])),
        Pattern::Deferred(name) => {
            if stack.contains(name) {
                return Err(ContractError::EndlessRecursion(name.clone()));
            }
            stack.push(name.clone());
            let value = resolve(pattern, resolver).and_then(|resolved| generate_value(resolved, resolver, stack));
            stack.pop();
            value
        }
        Pattern::AnyOf(alternatives) => {
            // an undefined alternative is a broken contract whichever one is picked
            for alternative in alternatives {
                resolve(alternative, resolver)?;
            }
            let mut order: Vec<&Pattern> = alternatives.iter().collect();
            order.shuffle(&mut rand::rng());
            let mut last_error = None;
            for alternative in order {
                match generate_value(alternative, resolver, stack) {
                    Ok(value) => return Ok(value),
                    Err(error) if error.is_endless_recursion() => last_error = Some(error),
                    Err(error) => return Err(error),
                }
            }
            Err(last_error.unwrap_or_else(|| ContractError::parse("cannot generate a value from an empty union")))
        }
        Pattern::Object(object) => {
            let mut fields = IndexMap::with_capacity(object.fields().len());
            for (key, field) in object.fields() {
                let name = without_optionality(key);
                if let Some(cell) = resolver.row().and_then(|row| row.get(name)) {
                    let value = generate_from_cell(cell, field, resolver).map_err(|e| e.at(name))?;
                    fields.insert(name.to_string(), value);
                    continue;
                }
                match generate_value(field, resolver, stack) {
                    Ok(value) => {
                        fields.insert(name.to_string(), value);
                    }
                    // an optional key is the way out of a recursive type
                    Err(error) if is_optional(key) && error.is_endless_recursion() => {}
                    Err(error) => return Err(error.at(name)),
                }
            }
            Ok(Value::Object(fields))
        }
        Pattern::Array(array) => {
            let mut items = Vec::with_capacity(array.elements().len());
            for (index, element) in array.elements().iter().enumerate() {
                let item = match element {
                    Pattern::Rest(inner) => generate_value(inner, resolver, stack),
                    other => generate_value(other, resolver, stack),
                };
                items.push(item.map_err(|e| e.at(format!("[{index}]")))?);
            }
            Ok(Value::Array(items))
        }
    }
}

fn generate_from_cell(cell: &str, declared: &Pattern, resolver: &Resolver) -> ContractResult<Value> {
    if is_pattern_token(cell) {
        return parsed_pattern(cell)?.generate(resolver);
    }
    declared.parse(cell, resolver)
}

// ————————————————————————————————————————————————————————————————————————————
// NEW BASED ON
// ————————————————————————————————————————————————————————————————————————————

fn based_on(pattern: &Pattern, row: &Row, resolver: &Resolver, stack: &mut Vec<String>) -> ContractResult<Vec<Pattern>> {
    match pattern {
        Pattern::String
        | Pattern::Number
        | Pattern::Boolean
        | Pattern::Null
        | Pattern::Url(_)
        | Pattern::Exact(_) => Ok(vec![pattern.clone()]),
        Pattern::Rest(inner) => Ok(based_on(inner, row, resolver, stack)?.into_iter().map(Pattern::rest).collect()),
        // recursive types stay folded
        Pattern::Deferred(name) if stack.contains(name) => Ok(vec![pattern.clone()]),
        Pattern::Deferred(name) => {
            let resolved = resolve(pattern, resolver)?;
            stack.push(name.clone());
            let variants = based_on(resolved, row, resolver, stack);
            stack.pop();
            variants
        }
        Pattern::AnyOf(alternatives) => {
            let mut variants: Vec<Pattern> = Vec::new();
            for alternative in alternatives {
                for variant in based_on(alternative, row, resolver, stack)? {
                    if !variants.contains(&variant) {
                        variants.push(variant);
                    }
                }
            }
            Ok(variants)
        }
        Pattern::Object(object) => {
            let mut choices: Vec<Vec<Option<(String, Pattern)>>> = Vec::with_capacity(object.fields().len());
            for (key, field) in object.fields() {
                let name = without_optionality(key);
                let included = match row.get(name) {
                    Some(cell) => row_value(name, cell, field, row, resolver, stack)?,
                    None => based_on(field, row, resolver, stack).map_err(|e| e.at(name))?,
                };
                let included = included.into_iter().map(|variant| Some((name.to_string(), variant)));

                let options: Vec<Option<(String, Pattern)>> = if !is_optional(key) || row.contains(name) {
                    included.collect()
                } else if resolver.key_combinations() == KeyCombinations::CompositeOnly && field.is_scalar(resolver) {
                    vec![None]
                } else {
                    std::iter::once(None).chain(included).collect()
                };
                choices.push(options);
            }

            Ok(combinations(choices)
                .into_iter()
                .map(|chosen| Pattern::Object(object.with_fields(chosen.into_iter().flatten().collect())))
                .collect())
        }
        Pattern::Array(array) => {
            let choices = array
                .elements()
                .iter()
                .enumerate()
                .map(|(index, element)| based_on(element, row, resolver, stack).map_err(|e| e.at(format!("[{index}]"))))
                .collect::<ContractResult<Vec<_>>>()?;
            Ok(combinations(choices)
                .into_iter()
                .map(|elements| Pattern::Array(array.with_elements(elements)))
                .collect())
        }
    }
}

/// Substitute a row cell for a declared field.
///
/// A type token must be acceptable where the field is declared and is then
/// expanded itself. A literal must parse as, and match, the declared pattern.
fn row_value(
    key: &str,
    cell: &str,
    declared: &Pattern,
    row: &Row,
    resolver: &Resolver,
    stack: &mut Vec<String>,
) -> ContractResult<Vec<Pattern>> {
    let invalid = |message: String| ContractError::InvalidExample { key: key.to_string(), message }.at(key);
    let tolerant = resolver.with_null_type();

    if is_pattern_token(cell) {
        let token = parsed_pattern(cell).map_err(|e| invalid(e.to_string()))?;
        if let MatchResult::Failure(failure) = declared.encompasses_pattern(&token, &tolerant, &tolerant) {
            return Err(invalid(failure.report()));
        }
        return based_on(&token, row, resolver, stack).map_err(|e| e.at(key));
    }

    let value = declared.parse(cell, resolver).map_err(|e| invalid(e.to_string()))?;
    if let MatchResult::Failure(failure) = declared.matches(&value, &tolerant) {
        return Err(invalid(failure.report()));
    }
    Ok(vec![Pattern::Exact(value)])
}

/// Cartesian product, first choice varying slowest.
fn combinations<T: Clone>(choices: Vec<Vec<T>>) -> Vec<Vec<T>> {
    choices.into_iter().fold(vec![Vec::new()], |partials, options| {
        partials
            .iter()
            .flat_map(|partial| {
                options.iter().map(move |option| {
                    let mut next = partial.clone();
                    next.push(option.clone());
                    next
                })
            })
            .collect()
    })
}
