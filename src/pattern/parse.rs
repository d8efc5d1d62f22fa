//! Text to value, guided by the pattern the text is meant to fit.
use super::{Pattern, resolve};
use crate::error::{ContractError, ContractResult};
use crate::resolver::Resolver;
use crate::value::Value;

impl Pattern {
    /// Interpret `text` (an example cell, a query parameter, a request body)
    /// as a value of this pattern's shape. The result is not matched; callers
    /// that need validation run [`Pattern::matches`] on it.
    pub fn parse(&self, text: &str, resolver: &Resolver) -> ContractResult<Value> {
        match self {
            Pattern::String => Ok(Value::string(text)),
            Pattern::Number => text
                .trim()
                .parse::<serde_json::Number>()
                .map(Value::Number)
                .map_err(|_| expected("number", text)),
            Pattern::Boolean => match text.trim() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(expected("boolean", text)),
            },
            Pattern::Null => match text.trim() {
                "" | "null" => Ok(Value::Null),
                _ => Err(expected("null", text)),
            },
            Pattern::Url(scheme) if scheme.accepts(text.trim()) => Ok(Value::string(text.trim())),
            Pattern::Url(scheme) => Err(expected(format!("url with prefix {}", scheme.prefix()), text)),
            Pattern::Exact(Value::String(_)) => Ok(Value::string(text)),
            Pattern::Exact(_) => Value::parse_json(text).map_err(ContractError::parse),
            Pattern::Deferred(_) => resolve(self, resolver)?.parse(text, resolver),
            Pattern::AnyOf(alternatives) => alternatives
                .iter()
                .find_map(|alternative| alternative.parse(text, resolver).ok())
                .ok_or_else(|| expected(self.type_name(), text)),
            Pattern::Object(_) => match Value::parse_json(text).map_err(ContractError::parse)? {
                object @ Value::Object(_) => Ok(object),
                _ => Err(expected("json object", text)),
            },
            Pattern::Array(_) | Pattern::Rest(_) => match Value::parse_json(text).map_err(ContractError::parse)? {
                array @ Value::Array(_) => Ok(array),
                _ => Err(expected("json array", text)),
            },
        }
    }
}

fn expected(what: impl std::fmt::Display, text: &str) -> ContractError {
    ContractError::parse(format!("expected {what}, actual was \"{text}\""))
}
