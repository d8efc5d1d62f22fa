//! Concrete data: parsed payloads and generated examples.
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Object(IndexMap<String, Value>),
    Array(Vec<Value>),
    Xml(XmlNode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<XmlChild>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlChild {
    Node(XmlNode),
    Text(String),
}

// ————————————————————————————————————————————————————————————————————————————
// VALUE
// ————————————————————————————————————————————————————————————————————————————

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn number(n: impl Into<Number>) -> Self {
        Self::Number(n.into())
    }

    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The empty string doubles as "no body" in HTTP payloads.
    pub fn is_empty_string(&self) -> bool {
        matches!(self, Self::String(s) if s.is_empty())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(_) => "json object",
            Self::Array(_) => "json array",
            Self::Xml(_) => "xml",
        }
    }

    /// Rendering used in mismatch messages: strings are quoted, everything
    /// else prints as its JSON (or XML) text.
    pub fn display_value(&self) -> String {
        match self {
            Self::Xml(node) => node.to_string(),
            other => other.to_json().to_string(),
        }
    }

    /// Plain text form, as it would appear in a request body or a query
    /// string (strings unquoted, null empty).
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::String(s) => s.clone(),
            Self::Xml(node) => node.to_string(),
            other => other.to_json().to_string(),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::Number(n) => Self::Number(n.clone()),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(xs) => Self::Array(xs.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::Object(
                map.iter().map(|(k, v)| (k.clone(), Self::from_json(v))).collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(xs) => serde_json::Value::Array(xs.iter().map(Self::to_json).collect()),
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Xml(node) => serde_json::Value::String(node.to_string()),
        }
    }

    /// Parse JSON text; the error message names the offending input.
    pub fn parse_json(text: &str) -> Result<Self, String> {
        serde_json::from_str::<serde_json::Value>(text)
            .map(|json| Self::from_json(&json))
            .map_err(|error| format!("expected json, actual was \"{text}\": {error}"))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => numbers_equal(a, b),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v == w))
            }
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Xml(a), Self::Xml(b)) => a == b,
            _ => false,
        }
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_value())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(|json| Self::from_json(&json))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::from_json(&json)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// XML
// ————————————————————————————————————————————————————————————————————————————

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), attributes: IndexMap::new(), children: Vec::new() }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(XmlChild::Node(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlChild::Text(text.into()));
        self
    }
}

impl fmt::Display for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}=\"{}\"", escape_xml(value))?;
        }
        if self.children.is_empty() {
            return f.write_str("/>");
        }
        f.write_str(">")?;
        for child in &self.children {
            match child {
                XmlChild::Node(node) => write!(f, "{node}")?,
                XmlChild::Text(text) => f.write_str(&escape_xml(text))?,
            }
        }
        write!(f, "</{}>", self.name)
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_encoding_preserves_key_order() {
        let json = json!({"zeta": 1, "alpha": [true, null, "x"]});
        let value = Value::from_json(&json);
        match &value {
            Value::Object(map) => {
                assert_eq!(map.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
            }
            other => panic!("expected object, got {other:?}"),
        }
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(Value::from_json(&json!(10)), Value::from_json(&json!(10.0)));
        assert_ne!(Value::from_json(&json!(10)), Value::from_json(&json!(11)));
        assert_ne!(Value::from_json(&json!(10)), Value::string("10"));
    }

    #[test]
    fn display_quotes_strings_only() {
        assert_eq!(Value::string("abc").display_value(), "\"abc\"");
        assert_eq!(Value::number(5).display_value(), "5");
        assert_eq!(Value::string("abc").to_text(), "abc");
        assert_eq!(Value::Null.to_text(), "");
    }

    #[test]
    fn xml_renders_as_text_in_json() {
        let node = XmlNode::new("customer")
            .with_attribute("id", "10")
            .with_child(XmlNode::new("name").with_text("Jane & co"));
        let value = Value::Xml(node);
        assert_eq!(
            value.to_json(),
            json!("<customer id=\"10\"><name>Jane &amp; co</name></customer>")
        );
        assert_eq!(value.type_name(), "xml");
    }
}
