//! Contract documents: the JSON form a feature is written in.
//!
//! ```json
//! {
//!   "name": "customers",
//!   "types": {"Customer": {"name": "(string)", "email?": "(string)"}},
//!   "tables": {"Address": {"street": "(string)", "zip": "(number)"}},
//!   "scenarios": [{
//!     "name": "get customer",
//!     "tags": ["@wip"],
//!     "request": {"method": "GET", "path": "/customers/(id:number)", "query": {}, "headers": {}, "body": null},
//!     "response": {"status": 200, "headers": {}, "body": "(Customer)"},
//!     "examples": [{"id": 10}]
//!   }]
//! }
//! ```
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ContractError, ContractResult};
use crate::feature::{Feature, PathPattern, RequestPattern, ResponsePattern, Scenario, headers_pattern};
use crate::path_de::from_str_with_path;
use crate::pattern::{ObjectKind, ObjectPattern, Pattern, from_rows, parsed_pattern, pattern_from_json};
use crate::resolver::{Resolver, Row};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FeatureDocument {
    #[serde(default)]
    name: String,
    #[serde(default)]
    types: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    tables: IndexMap<String, IndexMap<String, String>>,
    #[serde(default)]
    scenarios: Vec<ScenarioDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioDocument {
    name: String,
    #[serde(default)]
    tags: Vec<String>,
    request: RequestDocument,
    response: ResponseDocument,
    #[serde(default)]
    examples: Vec<IndexMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RequestDocument {
    method: String,
    path: String,
    #[serde(default)]
    query: IndexMap<String, String>,
    #[serde(default)]
    headers: IndexMap<String, String>,
    #[serde(default)]
    body: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResponseDocument {
    status: u16,
    #[serde(default)]
    headers: IndexMap<String, String>,
    #[serde(default)]
    body: serde_json::Value,
}

pub fn load_feature(path: impl AsRef<Path>) -> ContractResult<Feature> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .map_err(|error| ContractError::Document(format!("cannot read {}: {error}", path.display())))?;
    let feature = parse_feature(&source)?;
    debug!(path = %path.display(), scenarios = feature.scenarios.len(), "loaded contract");
    Ok(feature)
}

pub fn parse_feature(source: &str) -> ContractResult<Feature> {
    let document: FeatureDocument = from_str_with_path(source)?;
    document.into_feature()
}

impl FeatureDocument {
    fn into_feature(self) -> ContractResult<Feature> {
        let mut types = Vec::with_capacity(self.types.len() + self.tables.len());
        for (name, json) in &self.types {
            let pattern = pattern_from_json(json).map_err(|e| e.at(name.clone()))?;
            types.push((name.clone(), pattern));
        }
        for (name, rows) in &self.tables {
            let pattern = from_rows(rows.iter().map(|(key, cell)| (key.clone(), cell))).map_err(|e| e.at(name.clone()))?;
            types.push((name.clone(), pattern));
        }
        let resolver = Resolver::new(types);

        let scenarios = self
            .scenarios
            .into_iter()
            .map(|scenario| {
                let name = scenario.name.clone();
                scenario.into_scenario(&resolver).map_err(|e| e.at(name))
            })
            .collect::<ContractResult<Vec<_>>>()?;
        Ok(Feature::new(self.name, resolver, scenarios))
    }
}

impl ScenarioDocument {
    fn into_scenario(self, resolver: &Resolver) -> ContractResult<Scenario> {
        let request = RequestPattern {
            query: text_patterns(&self.request.query).map(|fields| ObjectPattern::new(fields, ObjectKind::Json))?,
            headers: headers_pattern(text_patterns(&self.request.headers)?),
            body: pattern_from_json(&self.request.body).map_err(|e| e.at("BODY"))?,
            ..RequestPattern::new(self.request.method, PathPattern::parse(&self.request.path)?)
        };
        let response = ResponsePattern {
            headers: headers_pattern(text_patterns(&self.response.headers)?),
            body: pattern_from_json(&self.response.body).map_err(|e| e.at("BODY"))?,
            ..ResponsePattern::new(self.response.status)
        };
        let examples = self
            .examples
            .into_iter()
            .map(|row| row.into_iter().map(|(key, cell)| (key, cell_text(cell))).collect::<Row>())
            .collect();
        Ok(Scenario {
            name: self.name,
            request,
            response,
            resolver: resolver.clone(),
            tags: self.tags,
            examples,
        })
    }
}

fn text_patterns(fields: &IndexMap<String, String>) -> ContractResult<IndexMap<String, Pattern>> {
    fields
        .iter()
        .map(|(key, text)| {
            parsed_pattern(text)
                .map(|pattern| (key.clone(), pattern))
                .map_err(|e| e.at(key.clone()))
        })
        .collect()
}

/// Example cells are text; JSON scalars are written back as their literal.
fn cell_text(cell: serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => "null".into(),
        other => other.to_string(),
    }
}
