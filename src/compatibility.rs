//! Backward compatibility between two versions of a contract.
//!
//! Every request the older contract allows must still be accepted by the
//! newer one, and every response the newer contract may return must still
//! fit what the older one promised. Requests are checked variant by variant:
//! each older scenario is expanded over its optional keys and unions, and
//! each variant yields one result.
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::document::load_feature;
use crate::feature::{Feature, RequestPattern, Scenario};
use crate::resolver::{KeyCombinations, Row};
use crate::result::{MatchResult, Results};

pub const DEFAULT_THREADS: usize = 3;

const COMPATIBLE: &str = "The newer contract is backward compatible";
const INCOMPATIBLE: &str = "The newer contract is NOT backward compatible";

/// A compatibility run either produced results or could not start.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Checked(Results),
    Unresolvable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityOutput {
    pub exit_code: i32,
    pub message: String,
}

// ————————————————————————————————————————————————————————————————————————————
// ORCHESTRATION
// ————————————————————————————————————————————————————————————————————————————

/// Compare every active scenario of `older` against `newer` on a pool of
/// `threads` workers. Results come back in older-scenario order.
pub fn test_backward_compatibility(older: &Feature, newer: &Feature, threads: usize) -> Results {
    let older_scenarios: Vec<&Scenario> = older.active_scenarios().collect();
    let newer_scenarios: Vec<&Scenario> = newer.active_scenarios().collect();
    info!(
        older = older_scenarios.len(),
        newer = newer_scenarios.len(),
        threads,
        "checking backward compatibility"
    );

    let check = |scenario: &&Scenario| check_unit(scenario, &newer_scenarios);
    let per_scenario: Vec<Vec<MatchResult>> = match rayon::ThreadPoolBuilder::new().num_threads(threads.max(1)).build() {
        Ok(pool) => pool.install(|| older_scenarios.par_iter().map(check).collect()),
        Err(error) => {
            warn!(%error, "could not start worker pool, checking sequentially");
            older_scenarios.iter().map(check).collect()
        }
    };

    let results: Results = per_scenario.into_iter().flatten().collect();
    info!(
        passed = results.success_count(),
        failed = results.failure_count(),
        "backward compatibility check finished"
    );
    results
}

/// One older scenario, isolated so a panic fails only this scenario.
fn check_unit(older: &Scenario, newer: &[&Scenario]) -> Vec<MatchResult> {
    match panic::catch_unwind(AssertUnwindSafe(|| compare_scenario(older, newer))) {
        Ok(results) => results,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(scenario = %older.name, %message, "scenario check panicked");
            vec![MatchResult::failure(format!("Unexpected error: {message}")).with_scenario(older.name.clone())]
        }
    }
}

fn compare_scenario(older: &Scenario, newer: &[&Scenario]) -> Vec<MatchResult> {
    let resolver = older.resolver.with_key_combinations(KeyCombinations::Exhaustive);
    let variants = match older.request_variants(&Row::new(), &resolver) {
        Ok(variants) => variants,
        Err(error) => {
            warn!(scenario = %older.name, %error, "could not expand scenario");
            return vec![MatchResult::failure(error.to_string()).breadcrumb("REQUEST").with_scenario(older.name.clone())];
        }
    };

    let counterparts: Vec<&Scenario> = newer
        .iter()
        .copied()
        .filter(|candidate| candidate.request.same_shape(&older.request))
        .collect();
    debug!(
        scenario = %older.name,
        variants = variants.len(),
        counterparts = counterparts.len(),
        "comparing scenario"
    );

    if counterparts.is_empty() {
        return vec![
            MatchResult::failure(format!(
                "API was removed: no {} {} in the newer contract",
                older.request.method, older.request.path
            ))
            .breadcrumb("REQUEST")
            .with_scenario(older.name.clone()),
        ];
    }

    variants
        .iter()
        .map(|variant| compare_variant(older, variant, &counterparts).with_scenario(older.name.clone()))
        .collect()
}

/// Contravariant request, covariant response.
fn compare_variant(older: &Scenario, variant: &RequestPattern, counterparts: &[&Scenario]) -> MatchResult {
    let mut request_failure = None;
    let mut accepting = Vec::new();
    for newer in counterparts {
        match newer.request.encompasses(variant, &newer.resolver, &older.resolver) {
            MatchResult::Success => accepting.push(*newer),
            failure => {
                request_failure.get_or_insert(failure);
            }
        }
    }
    if accepting.is_empty() {
        return request_failure.unwrap_or_else(|| MatchResult::failure("No matching request").breadcrumb("REQUEST"));
    }

    let same_status: Vec<&Scenario> = accepting
        .into_iter()
        .filter(|newer| newer.response.status == older.response.status)
        .collect();
    if same_status.is_empty() {
        return MatchResult::failure(format!(
            "The newer contract no longer returns status {} for this request",
            older.response.status
        ))
        .breadcrumb("STATUS")
        .breadcrumb("RESPONSE");
    }

    MatchResult::all(
        same_status
            .iter()
            .map(|newer| older.response.encompasses(&newer.response, &older.resolver, &newer.resolver)),
    )
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return message.to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".into()
}

// ————————————————————————————————————————————————————————————————————————————
// FILES
// ————————————————————————————————————————————————————————————————————————————

/// Load both contract documents and compare them. A document that cannot be
/// loaded makes the whole run unresolvable.
pub fn backward_compatible_files(older: &Path, newer: &Path, threads: usize) -> Outcome {
    let older_feature = match load_feature(older) {
        Ok(feature) => feature,
        Err(error) => return Outcome::Unresolvable(format!("Could not load {}: {error}", older.display())),
    };
    let newer_feature = match load_feature(newer) {
        Ok(feature) => feature,
        Err(error) => return Outcome::Unresolvable(format!("Could not load {}: {error}", newer.display())),
    };
    Outcome::Checked(test_backward_compatibility(&older_feature, &newer_feature, threads))
}

// ————————————————————————————————————————————————————————————————————————————
// REPORTING
// ————————————————————————————————————————————————————————————————————————————

pub fn compatibility_report(results: &Results, message: &str) -> String {
    let counts = format!(
        "Tests run: {}, Passed: {}, Failed: {}\n\n",
        results.success_count() + results.failure_count(),
        results.success_count(),
        results.failure_count()
    );
    let report = results.report();
    let report = report.trim();
    let report = if report.is_empty() { String::new() } else { format!("{report}\n\n") };
    format!("{counts}{report}{message}").trim().to_string()
}

pub fn compatibility_message(outcome: &Outcome) -> CompatibilityOutput {
    match outcome {
        Outcome::Unresolvable(message) => CompatibilityOutput { exit_code: 1, message: message.clone() },
        Outcome::Checked(results) if results.success() => CompatibilityOutput {
            exit_code: 0,
            message: compatibility_report(results, COMPATIBLE),
        },
        Outcome::Checked(results) => CompatibilityOutput {
            exit_code: 1,
            message: compatibility_report(results, INCOMPATIBLE),
        },
    }
}

/// Run a check and turn anything unexpected into a failing output.
pub fn check_compatibility(check: impl FnOnce() -> Outcome) -> CompatibilityOutput {
    match panic::catch_unwind(AssertUnwindSafe(check)) {
        Ok(outcome) => compatibility_message(&outcome),
        Err(panic) => CompatibilityOutput {
            exit_code: 1,
            message: format!(
                "Could not run backward compatibility check, got exception\n{}",
                panic_message(panic.as_ref())
            ),
        },
    }
}
