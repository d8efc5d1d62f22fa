//! The environment threaded through every pattern operation.
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ContractError, ContractResult};
use crate::pattern::{Pattern, token};

/// How optional keys expand during `new_based_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyCombinations {
    /// Optional composite keys yield "included" and "omitted" variants;
    /// optional scalar keys are only omitted.
    #[default]
    CompositeOnly,
    /// Every optional key yields both variants.
    Exhaustive,
}

/// Literal example overrides, keyed by field name (without `?`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    fields: IndexMap<String, String>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

static NULL_TYPE: Pattern = Pattern::Null;

/// Named-type registry plus generation context.
///
/// Cheap to clone: the registry is shared. Resolvers of two contract
/// versions are never merged.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    types: Arc<IndexMap<String, Pattern>>,
    null_tolerant: bool,
    row: Option<Row>,
    key_combinations: KeyCombinations,
}

impl Resolver {
    /// Registry keys may be given bare (`Customer`) or as tokens (`(Customer)`).
    pub fn new<K, I>(types: I) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Pattern)>,
    {
        let types = types
            .into_iter()
            .map(|(name, pattern)| {
                let name = token::type_name(name.as_ref()).to_string();
                let pattern = pattern.with_alias(&name);
                (name, pattern)
            })
            .collect();
        Self { types: Arc::new(types), ..Self::default() }
    }

    pub fn get_pattern(&self, name: &str) -> ContractResult<&Pattern> {
        let bare = token::type_name(name);
        if let Some(pattern) = self.types.get(bare) {
            return Ok(pattern);
        }
        if self.null_tolerant && bare == "null" {
            return Ok(&NULL_TYPE);
        }
        Err(ContractError::UnknownType(bare.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(token::type_name(name))
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Same registry, with `null` admitted as a stand-in for absent or
    /// nullable values.
    pub fn with_null_type(&self) -> Self {
        if self.null_tolerant {
            return self.clone();
        }
        Self { null_tolerant: true, ..self.clone() }
    }

    pub fn is_null_tolerant(&self) -> bool {
        self.null_tolerant
    }

    pub fn with_row(&self, row: Row) -> Self {
        Self { row: Some(row), ..self.clone() }
    }

    pub fn row(&self) -> Option<&Row> {
        self.row.as_ref()
    }

    pub fn with_key_combinations(&self, key_combinations: KeyCombinations) -> Self {
        Self { key_combinations, ..self.clone() }
    }

    pub fn key_combinations(&self) -> KeyCombinations {
        self.key_combinations
    }
}
