//! Schema model.
//!
//! A [`Pattern`] describes the set of [`Value`]s a contract accepts. The
//! variants form a closed set, and every algorithm (matching, encompassing,
//! generation, parsing) dispatches on it exhaustively:
//! - scalar leaves (`String`, `Number`, `Boolean`, `Null`, `Url`)
//! - `Exact` literals substituted from example rows
//! - `Rest`, the variadic tail of a sequence
//! - `Deferred`, a lazily resolved named reference
//! - `AnyOf`, a union (`(number?)` is `AnyOf[Null, Number]`)
//! - `Object` and `Array` composites
//!
//! Key optionality is a naming convention: an object key ending in `?` is
//! optional. [`is_optional`] and [`without_optionality`] are the only places
//! that know the suffix.
pub mod encompasses;
pub mod generate;
pub mod matches;
pub mod parse;
pub mod token;

use std::fmt;

use indexmap::IndexMap;

use crate::error::{ContractError, ContractResult};
use crate::resolver::Resolver;
use crate::value::Value;

pub use encompasses::TypeStack;
pub use token::{from_rows, is_pattern_token, parsed_pattern, pattern_from_json};

pub const OPTIONAL_SUFFIX: char = '?';
pub const IGNORE_UNEXPECTED_KEYS: &str = "...";

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    String,
    Number,
    Boolean,
    Null,
    Url(UrlScheme),
    Exact(Value),
    Rest(Box<Pattern>),
    Deferred(String),
    AnyOf(Vec<Pattern>),
    Object(ObjectPattern),
    Array(ArrayPattern),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlScheme {
    Http,
    Https,
    /// Either `http://` or `https://`.
    Any,
    /// A path relative to the host, starting with `/`.
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnexpectedKeys {
    Reject,
    Ignore,
}

/// Where an object pattern came from: inline JSON or a table of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Json,
    Tabular,
}

#[derive(Debug, Clone)]
pub struct ObjectPattern {
    fields: IndexMap<String, Pattern>,
    unexpected_keys: UnexpectedKeys,
    kind: ObjectKind,
    alias: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ArrayPattern {
    elements: Vec<Pattern>,
    alias: Option<String>,
}

/// A sequence split into its fixed prefix and optional variadic tail.
#[derive(Debug, Clone, Copy)]
pub struct Members<'a> {
    pub fixed: &'a [Pattern],
    pub rest: Option<&'a Pattern>,
}

// ————————————————————————————————————————————————————————————————————————————
// KEY OPTIONALITY
// ————————————————————————————————————————————————————————————————————————————

pub fn is_optional(key: &str) -> bool {
    key.ends_with(OPTIONAL_SUFFIX)
}

pub fn without_optionality(key: &str) -> &str {
    key.strip_suffix(OPTIONAL_SUFFIX).unwrap_or(key)
}

// ————————————————————————————————————————————————————————————————————————————
// PATTERN
// ————————————————————————————————————————————————————————————————————————————

impl Pattern {
    /// `T` or null.
    pub fn nullable(inner: Pattern) -> Self {
        match inner {
            Pattern::Null => Pattern::Null,
            Pattern::AnyOf(alternatives) if alternatives.contains(&Pattern::Null) => {
                Pattern::AnyOf(alternatives)
            }
            other => Pattern::AnyOf(vec![Pattern::Null, other]),
        }
    }

    pub fn deferred(name: &str) -> Self {
        Pattern::Deferred(token::type_name(name).to_string())
    }

    pub fn rest(inner: Pattern) -> Self {
        Pattern::Rest(Box::new(inner))
    }

    /// Stable, resolver-independent name used in messages.
    pub fn type_name(&self) -> String {
        match self {
            Pattern::String => "string".into(),
            Pattern::Number => "number".into(),
            Pattern::Boolean => "boolean".into(),
            Pattern::Null => "null".into(),
            Pattern::Url(scheme) => scheme.type_name().into(),
            Pattern::Exact(value) => format!("({})", value.display_value()),
            Pattern::Rest(inner) => format!("{}...", inner.type_name()),
            Pattern::Deferred(name) => name.clone(),
            Pattern::AnyOf(alternatives) => match nullable_core(alternatives) {
                Some(core) => format!("{}?", core.type_name()),
                None => alternatives
                    .iter()
                    .map(Pattern::type_name)
                    .collect::<Vec<_>>()
                    .join(" or "),
            },
            Pattern::Object(_) => "json object".into(),
            Pattern::Array(_) => "json array".into(),
        }
    }

    /// Registry name this pattern was defined under, if any.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Pattern::Object(object) => object.alias.as_deref(),
            Pattern::Array(array) => array.alias.as_deref(),
            _ => None,
        }
    }

    /// Name used by the recursion guard: the reference name of a deferred
    /// pattern, or the alias of a named composite.
    pub fn name(&self) -> Option<&str> {
        match self {
            Pattern::Deferred(name) => Some(name),
            other => other.alias(),
        }
    }

    /// Attach a registry name. Only composites carry one.
    pub fn with_alias(self, alias: &str) -> Self {
        match self {
            Pattern::Object(object) => Pattern::Object(ObjectPattern { alias: Some(alias.to_string()), ..object }),
            Pattern::Array(array) => Pattern::Array(ArrayPattern { alias: Some(alias.to_string()), ..array }),
            other => other,
        }
    }

    /// Scalars are not worth permuting when they sit behind an optional key.
    pub fn is_scalar(&self, resolver: &Resolver) -> bool {
        match self {
            Pattern::String
            | Pattern::Number
            | Pattern::Boolean
            | Pattern::Null
            | Pattern::Url(_)
            | Pattern::Exact(_) => true,
            Pattern::AnyOf(alternatives) => alternatives.iter().all(|p| p.is_scalar(resolver)),
            Pattern::Deferred(_) => resolve(self, resolver).is_ok_and(|p| p.is_scalar(resolver)),
            Pattern::Rest(_) | Pattern::Object(_) | Pattern::Array(_) => false,
        }
    }

    /// Pattern-syntax rendering (the inverse of [`parsed_pattern`]).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Pattern::Exact(value) => value.to_json(),
            Pattern::Null => serde_json::Value::String("(null)".into()),
            Pattern::Object(object) => {
                let mut map = serde_json::Map::new();
                for (key, pattern) in &object.fields {
                    map.insert(key.clone(), pattern.to_json());
                }
                if object.unexpected_keys == UnexpectedKeys::Ignore {
                    map.insert(IGNORE_UNEXPECTED_KEYS.into(), serde_json::Value::String(String::new()));
                }
                serde_json::Value::Object(map)
            }
            Pattern::Array(array) => serde_json::Value::Array(array.elements.iter().map(Pattern::to_json).collect()),
            other => serde_json::Value::String(other.to_token()),
        }
    }

    fn to_token(&self) -> String {
        match self {
            Pattern::String | Pattern::Number | Pattern::Boolean | Pattern::Null | Pattern::Url(_) => {
                format!("({})", self.type_name())
            }
            Pattern::Deferred(name) => format!("({name})"),
            Pattern::Rest(inner) => format!("({}...)", token_body(inner)),
            Pattern::AnyOf(_) => format!("({})", self.type_name()),
            Pattern::Exact(value) => value.to_text(),
            Pattern::Object(_) | Pattern::Array(_) => self.to_json().to_string(),
        }
    }
}

fn token_body(pattern: &Pattern) -> String {
    let token = pattern.to_token();
    token
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .map(str::to_string)
        .unwrap_or(token)
}

/// `Some(T)` when the alternatives are exactly `[Null, T]`.
pub(crate) fn nullable_core(alternatives: &[Pattern]) -> Option<&Pattern> {
    match alternatives {
        [Pattern::Null, core] | [core, Pattern::Null] => Some(core),
        _ => None,
    }
}

/// Follow deferred references until a concrete pattern is reached.
pub fn resolve<'a>(pattern: &'a Pattern, resolver: &'a Resolver) -> ContractResult<&'a Pattern> {
    let mut current = pattern;
    let mut hops = 0usize;
    while let Pattern::Deferred(name) = current {
        current = resolver.get_pattern(name)?;
        hops += 1;
        if hops > resolver.type_names().count() + 1 {
            return Err(ContractError::parse(format!(
                "type {name} is defined only in terms of itself"
            )));
        }
    }
    Ok(current)
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            serde_json::Value::String(s) => f.write_str(&s),
            other => write!(f, "{other}"),
        }
    }
}

impl UrlScheme {
    pub fn prefix(&self) -> &'static str {
        match self {
            UrlScheme::Http => "http://",
            UrlScheme::Https => "https://",
            UrlScheme::Any => "http",
            UrlScheme::Path => "/",
        }
    }

    pub fn accepts(&self, text: &str) -> bool {
        match self {
            UrlScheme::Any => text.starts_with("http://") || text.starts_with("https://"),
            other => text.starts_with(other.prefix()),
        }
    }

    /// Every url this scheme admits is also admitted by `self`.
    pub fn encompasses(&self, other: &UrlScheme) -> bool {
        self == other || (*self == UrlScheme::Any && matches!(other, UrlScheme::Http | UrlScheme::Https))
    }

    fn type_name(&self) -> &'static str {
        match self {
            UrlScheme::Http => "url http",
            UrlScheme::Https => "url https",
            UrlScheme::Any => "url",
            UrlScheme::Path => "url path",
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// OBJECTS
// ————————————————————————————————————————————————————————————————————————————

impl ObjectPattern {
    /// A literal `"..."` key switches the unexpected-key policy to ignore and
    /// is dropped from the fields.
    pub fn new(mut fields: IndexMap<String, Pattern>, kind: ObjectKind) -> Self {
        let unexpected_keys = match fields.shift_remove(IGNORE_UNEXPECTED_KEYS) {
            Some(_) => UnexpectedKeys::Ignore,
            None => UnexpectedKeys::Reject,
        };
        Self { fields, unexpected_keys, kind, alias: None }
    }

    pub fn json<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Pattern)>,
    {
        Self::new(fields.into_iter().map(|(k, p)| (k.into(), p)).collect(), ObjectKind::Json)
    }

    pub fn tabular<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Pattern)>,
    {
        Self::new(fields.into_iter().map(|(k, p)| (k.into(), p)).collect(), ObjectKind::Tabular)
    }

    pub fn fields(&self) -> &IndexMap<String, Pattern> {
        &self.fields
    }

    pub fn unexpected_keys(&self) -> UnexpectedKeys {
        self.unexpected_keys
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Look a field up by its bare name, whether declared optional or not.
    pub fn field(&self, name: &str) -> Option<(&str, &Pattern)> {
        self.fields
            .get_key_value(name)
            .or_else(|| self.fields.get_key_value(format!("{name}{OPTIONAL_SUFFIX}").as_str()))
            .map(|(k, p)| (k.as_str(), p))
    }

    pub fn required_keys(&self) -> impl Iterator<Item = (&str, &Pattern)> {
        self.fields
            .iter()
            .filter(|(k, _)| !is_optional(k))
            .map(|(k, p)| (k.as_str(), p))
    }

    /// Same policy, kind and alias; different fields.
    pub(crate) fn with_fields(&self, fields: IndexMap<String, Pattern>) -> Self {
        Self { fields, ..self.clone() }
    }
}

/// Kind and alias do not take part: a tabular row and a JSON object with the
/// same fields and policy accept the same values.
impl PartialEq for ObjectPattern {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields && self.unexpected_keys == other.unexpected_keys
    }
}

impl From<ObjectPattern> for Pattern {
    fn from(object: ObjectPattern) -> Self {
        Pattern::Object(object)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ARRAYS
// ————————————————————————————————————————————————————————————————————————————

impl ArrayPattern {
    /// Fails fast when a rest pattern is not the final element.
    pub fn new(elements: Vec<Pattern>) -> ContractResult<Self> {
        let last = elements.len().saturating_sub(1);
        if let Some(index) = elements.iter().position(|p| matches!(p, Pattern::Rest(_))) {
            if index != last {
                return Err(ContractError::RestNotLast { index });
            }
        }
        Ok(Self { elements, alias: None })
    }

    pub fn elements(&self) -> &[Pattern] {
        &self.elements
    }

    pub fn members(&self) -> Members<'_> {
        match self.elements.split_last() {
            Some((Pattern::Rest(inner), fixed)) => Members { fixed, rest: Some(&**inner) },
            _ => Members { fixed: &self.elements, rest: None },
        }
    }

    pub fn is_endless(&self) -> bool {
        self.members().rest.is_some()
    }

    pub(crate) fn with_elements(&self, elements: Vec<Pattern>) -> Self {
        Self { elements, alias: self.alias.clone() }
    }
}

impl PartialEq for ArrayPattern {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl From<ArrayPattern> for Pattern {
    fn from(array: ArrayPattern) -> Self {
        Pattern::Array(array)
    }
}

impl<'a> Members<'a> {
    pub fn is_endless(&self) -> bool {
        self.rest.is_some()
    }

    /// Pattern governing position `index`, expanding the rest slot.
    pub fn at(&self, index: usize) -> Option<&'a Pattern> {
        self.fixed.get(index).or(self.rest)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
