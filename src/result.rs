//! Outcomes of structural checks.
//!
//! A [`Failure`] is a chain: the innermost link holds the mismatch message,
//! every enclosing link adds one breadcrumb (a key or an `[index]`) as the
//! check unwinds. Rendering walks the chain outermost first, so a mismatch at
//! index 2, key `name` prints as `[2].name`.
use std::fmt;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Success,
    Failure(Failure),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Failure {
    pub message: String,
    pub breadcrumb: Option<String>,
    pub cause: Option<Box<Failure>>,
    pub scenario: Option<String>,
}

impl MatchResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(Failure::new(message))
    }

    /// Standard "expected X, actual was Y" mismatch.
    pub fn mismatch(expected: impl fmt::Display, actual: &Value) -> Self {
        Self::failure(format!("Expected {expected}, actual was {}", actual.display_value()))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn breadcrumb(self, crumb: impl Into<String>) -> Self {
        match self {
            Self::Success => Self::Success,
            Self::Failure(failure) => Self::Failure(failure.breadcrumb(crumb)),
        }
    }

    pub fn with_scenario(self, scenario: impl Into<String>) -> Self {
        match self {
            Self::Success => Self::Success,
            Self::Failure(failure) => Self::Failure(failure.with_scenario(scenario)),
        }
    }

    /// Run `next` only when this result is a success.
    pub fn and_then(self, next: impl FnOnce() -> MatchResult) -> Self {
        match self {
            Self::Success => next(),
            failure => failure,
        }
    }

    /// First failure among siblings wins; success needs all of them.
    pub fn all<I>(results: I) -> Self
    where
        I: IntoIterator<Item = MatchResult>,
    {
        results
            .into_iter()
            .find(MatchResult::is_failure)
            .unwrap_or(MatchResult::Success)
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Success => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }

    /// Wrap this failure in one more breadcrumb.
    pub fn breadcrumb(self, crumb: impl Into<String>) -> Self {
        let scenario = self.scenario.clone();
        Self {
            message: String::new(),
            breadcrumb: Some(crumb.into()),
            cause: Some(Box::new(self)),
            scenario,
        }
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    fn chain(&self) -> impl Iterator<Item = &Failure> {
        std::iter::successors(Some(self), |f| f.cause.as_deref())
    }

    pub fn breadcrumbs(&self) -> Vec<&str> {
        self.chain().filter_map(|f| f.breadcrumb.as_deref()).collect()
    }

    pub fn path(&self) -> String {
        render_path(self.breadcrumbs())
    }

    /// Messages along the chain, innermost first.
    pub fn messages(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .chain()
            .map(|f| f.message.as_str())
            .filter(|m| !m.is_empty())
            .collect();
        out.reverse();
        out
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        if let Some(scenario) = &self.scenario {
            out.push_str(&format!("In scenario \"{scenario}\"\n"));
        }
        let path = self.path();
        if !path.is_empty() {
            out.push_str(&format!(">> {path}\n\n"));
        }
        out.push_str(&self.messages().join("\n"));
        out
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

/// Join breadcrumbs: index crumbs (`[n]`, `[n...m]`) attach directly, keys
/// are dot separated.
pub fn render_path<'a, I>(crumbs: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = String::new();
    for crumb in crumbs {
        if !out.is_empty() && !crumb.starts_with('[') {
            out.push('.');
        }
        out.push_str(crumb);
    }
    out
}

// ————————————————————————————————————————————————————————————————————————————
// RESULTS
// ————————————————————————————————————————————————————————————————————————————

/// An ordered batch of results, one per compared unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Results {
    pub results: Vec<MatchResult>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: MatchResult) {
        self.results.push(result);
    }

    pub fn merge(mut self, other: Results) -> Self {
        self.results.extend(other.results);
        self
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    pub fn success(&self) -> bool {
        !self.has_failures()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Failure> {
        self.results.iter().filter_map(MatchResult::as_failure)
    }

    pub fn report(&self) -> String {
        self.failures()
            .map(Failure::report)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl FromIterator<MatchResult> for Results {
    fn from_iter<I: IntoIterator<Item = MatchResult>>(iter: I) -> Self {
        Self { results: iter.into_iter().collect() }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
