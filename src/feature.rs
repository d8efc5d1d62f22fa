//! Features and scenarios: the request and response shapes of one contract
//! version, each scenario carrying the resolver of the feature it came from.
use std::fmt;

use indexmap::IndexMap;

use crate::error::ContractResult;
use crate::http::{HttpRequest, HttpResponse};
use crate::pattern::{IGNORE_UNEXPECTED_KEYS, ObjectKind, ObjectPattern, Pattern, token};
use crate::resolver::{Resolver, Row};
use crate::result::MatchResult;
use crate::value::Value;

const WIP_TAG: &str = "WIP";

#[derive(Debug, Clone)]
pub struct Feature {
    pub name: String,
    /// The named types every scenario of this feature resolves against.
    pub resolver: Resolver,
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub request: RequestPattern,
    pub response: ResponsePattern,
    pub resolver: Resolver,
    pub tags: Vec<String>,
    /// Worked examples; each row yields its own set of test scenarios.
    pub examples: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestPattern {
    pub method: String,
    pub path: PathPattern,
    pub query: ObjectPattern,
    pub headers: ObjectPattern,
    pub body: Pattern,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePattern {
    pub status: u16,
    pub headers: ObjectPattern,
    pub body: Pattern,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathPattern {
    segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Literal(String),
    /// `(id:number)`
    Param { name: String, pattern: Pattern },
}

// ————————————————————————————————————————————————————————————————————————————
// FEATURE
// ————————————————————————————————————————————————————————————————————————————

impl Feature {
    pub fn new(name: impl Into<String>, resolver: Resolver, scenarios: Vec<Scenario>) -> Self {
        Self { name: name.into(), resolver, scenarios }
    }

    /// Scenarios that take part in testing and compatibility checks.
    pub fn active_scenarios(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter().filter(|scenario| !scenario.is_wip())
    }

    pub fn scenario(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|scenario| scenario.name == name)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SCENARIO
// ————————————————————————————————————————————————————————————————————————————

impl Scenario {
    pub fn is_wip(&self) -> bool {
        self.tags
            .iter()
            .any(|tag| tag.trim().trim_start_matches('@').eq_ignore_ascii_case(WIP_TAG))
    }

    /// Concrete request shapes for one example row. Path parameters, query
    /// and body expand; headers are taken as declared.
    pub fn request_variants(&self, row: &Row, resolver: &Resolver) -> ContractResult<Vec<RequestPattern>> {
        let paths = self.request.path.new_based_on(row, resolver).map_err(|e| e.at("PATH"))?;
        let queries = Pattern::Object(self.request.query.clone())
            .new_based_on(row, resolver)
            .map_err(|e| e.at("QUERY"))?;
        let bodies = self.request.body.new_based_on(row, resolver).map_err(|e| e.at("BODY"))?;

        let mut variants = Vec::with_capacity(paths.len() * queries.len() * bodies.len());
        for path in &paths {
            for query in &queries {
                let Pattern::Object(query) = query else { continue };
                for body in &bodies {
                    variants.push(RequestPattern {
                        method: self.request.method.clone(),
                        path: path.clone(),
                        query: query.clone(),
                        headers: self.request.headers.clone(),
                        body: body.clone(),
                    });
                }
            }
        }
        Ok(variants)
    }

    /// One scenario per request variant per example row (a single empty row
    /// when the scenario has no examples).
    pub fn generate_test_scenarios(&self) -> ContractResult<Vec<Scenario>> {
        let rows = if self.examples.is_empty() { vec![Row::new()] } else { self.examples.clone() };
        let mut scenarios = Vec::new();
        for row in rows {
            let resolver = self.resolver.with_row(row.clone());
            let variants = self.request_variants(&row, &resolver).map_err(|e| e.at("REQUEST"))?;
            for request in variants {
                scenarios.push(Scenario {
                    request,
                    resolver: resolver.clone(),
                    examples: Vec::new(),
                    ..self.clone()
                });
            }
        }
        Ok(scenarios)
    }

    pub fn generate_request(&self) -> ContractResult<HttpRequest> {
        let resolver = &self.resolver;
        let request = &self.request;
        Ok(HttpRequest {
            method: request.method.clone(),
            path: request.path.generate(resolver).map_err(|e| e.at("PATH"))?,
            query: generate_text_fields(&request.query, resolver).map_err(|e| e.at("QUERY"))?,
            headers: generate_text_fields(&request.headers, resolver).map_err(|e| e.at("HEADERS"))?,
            body: request.body.generate(resolver).map_err(|e| e.at("BODY"))?,
        })
    }

    pub fn generate_response(&self) -> ContractResult<HttpResponse> {
        let resolver = &self.resolver;
        let response = &self.response;
        Ok(HttpResponse {
            status: response.status,
            headers: generate_text_fields(&response.headers, resolver).map_err(|e| e.at("HEADERS"))?,
            body: response.body.generate(resolver).map_err(|e| e.at("BODY"))?,
        })
    }

    pub fn matches_request(&self, request: &HttpRequest) -> MatchResult {
        let resolver = &self.resolver;
        let expected = &self.request;
        let method = if expected.method.eq_ignore_ascii_case(&request.method) {
            MatchResult::Success
        } else {
            MatchResult::failure(format!("Expected method {}, actual was {}", expected.method, request.method))
                .breadcrumb("METHOD")
        };
        method
            .and_then(|| expected.path.matches(&request.path, resolver).breadcrumb("PATH"))
            .and_then(|| matches_text_fields(&expected.query, &request.query, resolver).breadcrumb("QUERY"))
            .and_then(|| {
                matches_text_fields(&expected.headers, &lowercase_keys(&request.headers), resolver).breadcrumb("HEADERS")
            })
            .and_then(|| matches_body(&expected.body, &request.body, resolver).breadcrumb("BODY"))
            .breadcrumb("REQUEST")
    }

    pub fn matches_response(&self, response: &HttpResponse) -> MatchResult {
        let resolver = &self.resolver;
        let expected = &self.response;
        let status = if expected.status == response.status {
            MatchResult::Success
        } else {
            MatchResult::failure(format!("Expected status {}, actual was {}", expected.status, response.status))
                .breadcrumb("STATUS")
        };
        status
            .and_then(|| {
                matches_text_fields(&expected.headers, &lowercase_keys(&response.headers), resolver).breadcrumb("HEADERS")
            })
            .and_then(|| matches_body(&expected.body, &response.body, resolver).breadcrumb("BODY"))
            .breadcrumb("RESPONSE")
    }
}

fn generate_text_fields(object: &ObjectPattern, resolver: &Resolver) -> ContractResult<IndexMap<String, String>> {
    match Pattern::Object(object.clone()).generate(resolver)? {
        Value::Object(fields) => Ok(fields.into_iter().map(|(key, value)| (key, value.to_text())).collect()),
        _ => Ok(IndexMap::new()),
    }
}

/// Query parameters and headers arrive as text; each is read through the
/// pattern declared for it before the whole set is matched.
fn matches_text_fields(object: &ObjectPattern, actual: &IndexMap<String, String>, resolver: &Resolver) -> MatchResult {
    let mut fields = IndexMap::with_capacity(actual.len());
    for (key, text) in actual {
        let value = match object.field(key) {
            Some((_, declared)) => match declared.parse(text, resolver) {
                Ok(value) => value,
                Err(error) => return MatchResult::failure(error.to_string()).breadcrumb(key.clone()),
            },
            None => Value::string(text.clone()),
        };
        fields.insert(key.clone(), value);
    }
    object.matches(&Value::Object(fields), resolver)
}

/// Text bodies may carry numbers or JSON; give them a second chance through
/// the declared pattern.
fn matches_body(pattern: &Pattern, body: &Value, resolver: &Resolver) -> MatchResult {
    let result = pattern.matches(body, resolver);
    if result.is_success() {
        return result;
    }
    if let Value::String(text) = body {
        if let Ok(parsed) = pattern.parse(text, resolver) {
            let reparsed = pattern.matches(&parsed, resolver);
            if reparsed.is_success() {
                return reparsed;
            }
        }
    }
    result
}

fn lowercase_keys(headers: &IndexMap<String, String>) -> IndexMap<String, String> {
    headers.iter().map(|(k, v)| (k.to_ascii_lowercase(), v.clone())).collect()
}

/// Header patterns are case-insensitive and tolerate headers they do not
/// declare.
pub fn headers_pattern(fields: IndexMap<String, Pattern>) -> ObjectPattern {
    let mut fields: IndexMap<String, Pattern> = fields
        .into_iter()
        .map(|(key, pattern)| (key.to_ascii_lowercase(), pattern))
        .collect();
    fields.insert(IGNORE_UNEXPECTED_KEYS.to_string(), Pattern::String);
    ObjectPattern::new(fields, ObjectKind::Json)
}

// ————————————————————————————————————————————————————————————————————————————
// REQUEST & RESPONSE SHAPES
// ————————————————————————————————————————————————————————————————————————————

impl RequestPattern {
    pub fn new(method: impl Into<String>, path: PathPattern) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path,
            query: ObjectPattern::json(Vec::<(String, Pattern)>::new()),
            headers: headers_pattern(IndexMap::new()),
            body: Pattern::Null,
        }
    }

    /// Same method and the same path shape: literals equal, parameters in
    /// the same positions.
    pub fn same_shape(&self, other: &RequestPattern) -> bool {
        self.method.eq_ignore_ascii_case(&other.method) && self.path.same_shape(&other.path)
    }

    /// Does this request shape accept every request `smaller` describes?
    pub fn encompasses(&self, smaller: &RequestPattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        self.path
            .encompasses(&smaller.path, this_resolver, other_resolver)
            .breadcrumb("PATH")
            .and_then(|| self.query.encompasses(&smaller.query, this_resolver, other_resolver).breadcrumb("QUERY"))
            .and_then(|| self.headers.encompasses(&smaller.headers, this_resolver, other_resolver).breadcrumb("HEADERS"))
            .and_then(|| {
                self.body
                    .encompasses_pattern(&smaller.body, this_resolver, other_resolver)
                    .breadcrumb("BODY")
            })
            .breadcrumb("REQUEST")
    }
}

impl ResponsePattern {
    pub fn new(status: u16) -> Self {
        Self { status, headers: headers_pattern(IndexMap::new()), body: Pattern::Null }
    }

    pub fn encompasses(&self, smaller: &ResponsePattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        let status = if self.status == smaller.status {
            MatchResult::Success
        } else {
            MatchResult::failure(format!("Expected status {}, got {}", self.status, smaller.status)).breadcrumb("STATUS")
        };
        status
            .and_then(|| self.headers.encompasses(&smaller.headers, this_resolver, other_resolver).breadcrumb("HEADERS"))
            .and_then(|| {
                self.body
                    .encompasses_pattern(&smaller.body, this_resolver, other_resolver)
                    .breadcrumb("BODY")
            })
            .breadcrumb("RESPONSE")
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PATHS
// ————————————————————————————————————————————————————————————————————————————

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let path = path.split('?').next().unwrap_or_default();
    path.split('/').filter(|segment| !segment.is_empty())
}

impl PathPattern {
    /// `/customers/(id:number)/orders`. An unnamed token segment such as
    /// `(number)` is named after its type.
    pub fn parse(path: &str) -> ContractResult<Self> {
        let segments = split_path(path)
            .map(|segment| -> ContractResult<PathSegment> {
                if !token::is_pattern_token(segment) {
                    return Ok(PathSegment::Literal(segment.to_string()));
                }
                let (name, ty) = token::keyed(segment).unwrap_or_else(|| {
                    let bare = token::type_name(segment);
                    (bare, bare)
                });
                let pattern = token::parsed_pattern(&format!("({ty})")).map_err(|e| e.at(name))?;
                Ok(PathSegment::Param { name: name.to_string(), pattern })
            })
            .collect::<ContractResult<Vec<_>>>()?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &Pattern)> {
        self.segments.iter().filter_map(|segment| match segment {
            PathSegment::Param { name, pattern } => Some((name.as_str(), pattern)),
            PathSegment::Literal(_) => None,
        })
    }

    pub fn same_shape(&self, other: &PathPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|pair| match pair {
                (PathSegment::Literal(a), PathSegment::Literal(b)) => a == b,
                (PathSegment::Param { .. }, PathSegment::Param { .. }) => true,
                _ => false,
            })
    }

    pub fn matches(&self, path: &str, resolver: &Resolver) -> MatchResult {
        let actual: Vec<&str> = split_path(path).collect();
        if actual.len() != self.segments.len() {
            return MatchResult::failure(format!("Expected a path like {self}, actual was \"{path}\""));
        }
        for (segment, text) in self.segments.iter().zip(actual) {
            match segment {
                PathSegment::Literal(expected) if expected == text => {}
                PathSegment::Literal(expected) => {
                    return MatchResult::failure(format!("Expected \"{expected}\", actual was \"{text}\""));
                }
                PathSegment::Param { name, pattern } => {
                    let result = match pattern.parse(text, resolver) {
                        Ok(value) => pattern.matches(&value, resolver),
                        Err(error) => MatchResult::failure(error.to_string()),
                    };
                    if result.is_failure() {
                        return result.breadcrumb(name.clone());
                    }
                }
            }
        }
        MatchResult::Success
    }

    pub fn generate(&self, resolver: &Resolver) -> ContractResult<String> {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                PathSegment::Literal(text) => path.push_str(text),
                PathSegment::Param { name, pattern } => {
                    let value = pattern.generate(resolver).map_err(|e| e.at(name.clone()))?;
                    path.push_str(&value.to_text());
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }

    /// Parameters compare by position; a renamed parameter is not a change.
    pub fn encompasses(&self, smaller: &PathPattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        for pair in self.segments.iter().zip(&smaller.segments) {
            if let (PathSegment::Param { name, pattern: bigger }, PathSegment::Param { pattern: smaller, .. }) = pair {
                let result = bigger.encompasses_pattern(smaller, this_resolver, other_resolver);
                if result.is_failure() {
                    return result.breadcrumb(name.clone());
                }
            }
        }
        MatchResult::Success
    }

    /// Parameters expand like the fields of an object: a row value replaces
    /// the declared type.
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> ContractResult<Vec<PathPattern>> {
        let params = ObjectPattern::json(self.params().map(|(name, pattern)| (name.to_string(), pattern.clone())));
        let variants = Pattern::Object(params).new_based_on(row, resolver)?;
        Ok(variants
            .iter()
            .filter_map(|variant| match variant {
                Pattern::Object(params) => Some(self.with_params(params)),
                _ => None,
            })
            .collect())
    }

    fn with_params(&self, params: &ObjectPattern) -> PathPattern {
        let segments = self
            .segments
            .iter()
            .map(|segment| match segment {
                PathSegment::Param { name, pattern } => PathSegment::Param {
                    name: name.clone(),
                    pattern: params.fields().get(name).cloned().unwrap_or_else(|| pattern.clone()),
                },
                literal => literal.clone(),
            })
            .collect();
        PathPattern { segments }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                PathSegment::Literal(text) => write!(f, "/{text}")?,
                PathSegment::Param { pattern: Pattern::Exact(value), .. } => write!(f, "/{}", value.to_text())?,
                PathSegment::Param { name, pattern } => write!(f, "/({name}:{})", pattern.type_name())?,
            }
        }
        Ok(())
    }
}
