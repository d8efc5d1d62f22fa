//! Pattern-token grammar: `(number)`, `(Customer?)`, `(string...)`, and JSON
//! text whose string leaves are tokens or literals.
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{ArrayPattern, ObjectKind, ObjectPattern, Pattern, UrlScheme};
use crate::error::{ContractError, ContractResult};
use crate::value::Value;

static TYPE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("type name regex is valid")
});

/// `name:type` inside a token; the name is only meaningful to row lookups.
static KEYED_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_\-]*)\s*:\s*(.+?)\s*$").expect("keyed token regex is valid")
});

pub fn is_pattern_token(text: &str) -> bool {
    let text = text.trim();
    text.len() > 2 && text.starts_with('(') && text.ends_with(')')
}

/// Strip surrounding whitespace and parentheses: `(Customer)` → `Customer`.
pub fn type_name(name: &str) -> &str {
    let trimmed = name.trim();
    trimmed
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Split a keyed token body `(id:number)` into `("id", "number")`.
pub fn keyed(text: &str) -> Option<(&str, &str)> {
    let captures = KEYED_TOKEN.captures(type_name(text))?;
    let key = captures.get(1)?.as_str();
    let ty = captures.get(2)?.as_str();
    Some((key, ty))
}

/// Parse pattern text: a token, JSON text, or a literal string.
pub fn parsed_pattern(text: &str) -> ContractResult<Pattern> {
    let trimmed = text.trim();
    if is_pattern_token(trimmed) {
        return parse_token(type_name(trimmed));
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        let json = serde_json::from_str::<serde_json::Value>(trimmed)
            .map_err(|error| ContractError::parse(format!("invalid json pattern {trimmed}: {error}")))?;
        return pattern_from_json(&json);
    }
    Ok(Pattern::Exact(Value::string(text)))
}

fn parse_token(body: &str) -> ContractResult<Pattern> {
    let body = body.trim();
    if let Some(inner) = body.strip_suffix("...") {
        return Ok(Pattern::rest(parse_token(inner)?));
    }
    if let Some(inner) = body.strip_suffix('?') {
        return Ok(Pattern::nullable(parse_token(inner)?));
    }
    if let Some(captures) = KEYED_TOKEN.captures(body) {
        if let Some(ty) = captures.get(2) {
            return parse_token(ty.as_str());
        }
    }
    match body {
        "string" => Ok(Pattern::String),
        "number" => Ok(Pattern::Number),
        "boolean" => Ok(Pattern::Boolean),
        "null" => Ok(Pattern::Null),
        "url" => Ok(Pattern::Url(UrlScheme::Any)),
        "url http" => Ok(Pattern::Url(UrlScheme::Http)),
        "url https" => Ok(Pattern::Url(UrlScheme::Https)),
        "url path" => Ok(Pattern::Url(UrlScheme::Path)),
        name if TYPE_NAME.is_match(name) => Ok(Pattern::Deferred(name.to_string())),
        other => Err(ContractError::parse(format!("unrecognised pattern token ({other})"))),
    }
}

/// Convert a JSON document in pattern syntax.
pub fn pattern_from_json(json: &serde_json::Value) -> ContractResult<Pattern> {
    match json {
        serde_json::Value::Null => Ok(Pattern::Null),
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) => Ok(Pattern::Exact(Value::from_json(json))),
        serde_json::Value::String(s) => parsed_pattern(s),
        serde_json::Value::Object(map) => {
            let mut fields = IndexMap::with_capacity(map.len());
            for (key, value) in map {
                let pattern = pattern_from_json(value).map_err(|e| e.at(key.clone()))?;
                fields.insert(key.clone(), pattern);
            }
            Ok(Pattern::Object(ObjectPattern::new(fields, ObjectKind::Json)))
        }
        serde_json::Value::Array(items) => {
            let elements = items
                .iter()
                .enumerate()
                .map(|(index, item)| pattern_from_json(item).map_err(|e| e.at(format!("[{index}]"))))
                .collect::<ContractResult<Vec<_>>>()?;
            Ok(Pattern::Array(ArrayPattern::new(elements)?))
        }
    }
}

/// Tabular object from `(key, cell)` rows.
pub fn from_rows<K, V, I>(rows: I) -> ContractResult<Pattern>
where
    K: Into<String>,
    V: AsRef<str>,
    I: IntoIterator<Item = (K, V)>,
{
    let mut fields = IndexMap::new();
    for (key, cell) in rows {
        let key = key.into();
        let pattern = cell_pattern(cell.as_ref()).map_err(|e| e.at(key.clone()))?;
        fields.insert(key, pattern);
    }
    Ok(Pattern::Object(ObjectPattern::new(fields, ObjectKind::Tabular)))
}

/// A table cell: numbers, quoted strings and `true`/`false`/`null` are
/// literals; anything else is pattern text.
pub fn cell_pattern(cell: &str) -> ContractResult<Pattern> {
    let trimmed = cell.trim();
    if let Ok(number) = trimmed.parse::<serde_json::Number>() {
        return Ok(Pattern::Exact(Value::Number(number)));
    }
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        return Ok(Pattern::Exact(Value::string(&trimmed[1..trimmed.len() - 1])));
    }
    match trimmed {
        "null" => Ok(Pattern::Exact(Value::Null)),
        "true" => Ok(Pattern::Exact(Value::Boolean(true))),
        "false" => Ok(Pattern::Exact(Value::Boolean(false))),
        _ => parsed_pattern(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::UnexpectedKeys;
    use pretty_assertions::assert_eq;

    #[test]
    fn scalar_tokens() {
        assert_eq!(parsed_pattern("(string)").unwrap(), Pattern::String);
        assert_eq!(parsed_pattern(" (number) ").unwrap(), Pattern::Number);
        assert_eq!(parsed_pattern("(url https)").unwrap(), Pattern::Url(UrlScheme::Https));
        assert_eq!(parsed_pattern("(id:number)").unwrap(), Pattern::Number);
    }

    #[test]
    fn nullable_and_rest_tokens() {
        assert_eq!(
            parsed_pattern("(number?)").unwrap(),
            Pattern::AnyOf(vec![Pattern::Null, Pattern::Number])
        );
        assert_eq!(
            parsed_pattern("(string?...)").unwrap(),
            Pattern::rest(Pattern::nullable(Pattern::String))
        );
        assert_eq!(parsed_pattern("(Customer)").unwrap(), Pattern::deferred("Customer"));
    }

    #[test]
    fn non_tokens_are_literals() {
        assert_eq!(parsed_pattern("hello").unwrap(), Pattern::Exact(Value::string("hello")));
        assert!(parsed_pattern("(not a name!)").is_err());
    }

    #[test]
    fn json_text_becomes_composites() {
        let pattern = parsed_pattern(r#"{"id": "(number)", "tags": ["(string...)"], "kind": "gold", "...": ""}"#).unwrap();
        let Pattern::Object(object) = pattern else { panic!("expected object") };
        assert_eq!(object.unexpected_keys(), UnexpectedKeys::Ignore);
        assert_eq!(object.fields()["id"], Pattern::Number);
        assert_eq!(object.fields()["kind"], Pattern::Exact(Value::string("gold")));
        let Pattern::Array(tags) = &object.fields()["tags"] else { panic!("expected array") };
        assert!(tags.is_endless());
    }

    #[test]
    fn misplaced_rest_in_json_fails_with_location() {
        let err = parsed_pattern(r#"{"ids": ["(number...)", "(string)"]}"#).unwrap_err();
        assert_eq!(err.path(), "ids");
        assert_eq!(err.root(), &ContractError::RestNotLast { index: 0 });
    }

    #[test]
    fn table_cells() {
        let pattern = from_rows([("id", "10"), ("name", "(string?)"), ("nick", "\"jd\""), ("active", "true")]).unwrap();
        let Pattern::Object(object) = pattern else { panic!("expected object") };
        assert_eq!(object.kind(), ObjectKind::Tabular);
        assert_eq!(object.fields()["id"], Pattern::Exact(Value::number(10)));
        assert_eq!(object.fields()["name"], Pattern::nullable(Pattern::String));
        assert_eq!(object.fields()["nick"], Pattern::Exact(Value::string("jd")));
        assert_eq!(object.fields()["active"], Pattern::Exact(Value::Boolean(true)));
    }

    #[test]
    fn keyed_tokens_split() {
        assert_eq!(keyed("(id:number)"), Some(("id", "number")));
        assert_eq!(keyed("(number)"), None);
    }

    #[test]
    fn rendering_round_trips() {
        let text = r#"{"id":"(number)","name?":"(string?)","tags":["(string...)"]}"#;
        let pattern = parsed_pattern(text).unwrap();
        assert_eq!(parsed_pattern(&pattern.to_string()).unwrap(), pattern);
    }
}
