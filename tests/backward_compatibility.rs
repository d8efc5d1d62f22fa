use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde_json::json;
use shape_compat::compatibility::{Outcome, backward_compatible_files, check_compatibility, test_backward_compatibility};
use shape_compat::document::parse_feature;
use shape_compat::feature::Feature;
use shape_compat::pattern::{Pattern, pattern_from_json};
use shape_compat::resolver::Resolver;
use shape_compat::stub::StubRecord;
use shape_compat::value::Value;

fn feature(document: serde_json::Value) -> Feature {
    parse_feature(&document.to_string()).unwrap()
}

fn write(dir: &tempfile::TempDir, name: &str, document: serde_json::Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();
    path
}

fn people_api() -> serde_json::Value {
    json!({
        "name": "people",
        "types": {
            "Person": {"name": "(string)", "age?": "(number)", "friends?": ["(Person...)"]},
            "Address": {"street": "(string)", "zip": "(number?)"}
        },
        "scenarios": [
            {
                "name": "add person",
                "request": {
                    "method": "POST",
                    "path": "/people",
                    "headers": {"X-Trace?": "(string)"},
                    "body": {"person": "(Person)", "address?": "(Address)"}
                },
                "response": {"status": 201, "body": {"id": "(number)"}}
            },
            {
                "name": "get person",
                "request": {"method": "GET", "path": "/people/(id:number)", "query": {"expand?": "(boolean)"}},
                "response": {"status": 200, "body": "(Person)"}
            },
            {
                "name": "export people",
                "tags": ["@WIP"],
                "request": {"method": "GET", "path": "/people/export"},
                "response": {"status": 200, "body": ["(Person...)"]}
            }
        ]
    })
}

#[test]
fn a_contract_is_compatible_with_itself() {
    let contract = feature(people_api());
    let results = test_backward_compatibility(&contract, &contract, 3);
    assert_eq!(results.failure_count(), 0, "{}", results.report());
    assert!(results.success_count() >= 2);
}

#[test]
fn wip_scenarios_are_not_scored() {
    let document = json!({
        "scenarios": [
            {"name": "ping", "request": {"method": "GET", "path": "/ping"}, "response": {"status": 200}},
            {"name": "draft", "tags": ["wip"], "request": {"method": "GET", "path": "/draft"}, "response": {"status": 200}}
        ]
    });
    let older = feature(document);
    // the draft is gone from the newer contract without counting as a removal
    let newer = feature(json!({
        "scenarios": [{"name": "ping", "request": {"method": "GET", "path": "/ping"}, "response": {"status": 200}}]
    }));
    let results = test_backward_compatibility(&older, &newer, 1);
    assert_eq!((results.success_count(), results.failure_count()), (1, 0));

    let only_draft = feature(json!({
        "scenarios": [{"name": "draft", "tags": ["@wip"], "request": {"method": "GET", "path": "/draft"}, "response": {"status": 200}}]
    }));
    let results = test_backward_compatibility(&only_draft, &only_draft, 1);
    assert_eq!((results.success_count(), results.failure_count()), (0, 0));
}

#[test]
fn making_an_optional_request_key_required_breaks_old_clients() {
    let dir = tempfile::tempdir().unwrap();
    let contract = |optional_key: &str| {
        json!({
            "scenarios": [{
                "name": "add",
                "request": {"method": "POST", "path": "/data", "body": {"value": "(number)", (optional_key): "(number)"}},
                "response": {"status": 200}
            }]
        })
    };
    let older = write(&dir, "older.json", contract("optional?"));
    let newer = write(&dir, "newer.json", contract("optional"));

    let Outcome::Checked(results) = backward_compatible_files(&older, &newer, 2) else { panic!("expected results") };
    assert_eq!((results.success_count(), results.failure_count()), (1, 1));
    assert_eq!(results.failures().next().unwrap().path(), "REQUEST.BODY.optional");

    // the other direction relaxes the request, which old clients never notice
    let Outcome::Checked(results) = backward_compatible_files(&newer, &older, 2) else { panic!("expected results") };
    assert!(results.success());

    let output = check_compatibility(|| backward_compatible_files(&older, &newer, 2));
    assert_eq!(output.exit_code, 1);
    assert!(output.message.starts_with("Tests run: 2, Passed: 1, Failed: 1"), "{}", output.message);
}

#[test]
fn unbounded_arrays_do_not_fit_bounded_ones() {
    let contract = |ids: serde_json::Value| {
        feature(json!({
            "scenarios": [{
                "name": "list",
                "request": {"method": "GET", "path": "/ids"},
                "response": {"status": 200, "body": {"ids": ids}}
            }]
        }))
    };
    let bounded = contract(json!(["(number)", "(number)"]));
    let unbounded = contract(json!(["(number...)"]));

    let results = test_backward_compatibility(&bounded, &unbounded, 1);
    assert_eq!(results.failure_count(), 1);
    assert_eq!(results.failures().next().unwrap().path(), "RESPONSE.BODY.ids");

    assert!(test_backward_compatibility(&unbounded, &bounded, 1).success());
}

#[test]
fn nullable_and_optional_fields_tolerate_absence() {
    let pattern = pattern_from_json(&json!({"id": "(number?)", "note?": "(string)"})).unwrap();
    let resolver = Resolver::default();
    for sample in [json!({"id": 10}), json!({"id": null}), json!({}), json!({"id": 1, "note": "hi"})] {
        let result = pattern.matches(&Value::from_json(&sample), &resolver);
        assert!(result.is_success(), "{sample} should match: {result:?}");
    }
    let result = pattern.matches(&Value::from_json(&json!({"id": "ten"})), &resolver);
    assert_eq!(result.as_failure().unwrap().path(), "id");
}

#[test]
fn nested_failures_name_the_index_and_key() {
    let resolver = Resolver::new([("Person".to_string(), pattern_from_json(&json!({"name": "(string)"})).unwrap())]);
    let pattern = pattern_from_json(&json!(["(Person...)"])).unwrap();
    let sample = json!([{"name": "a"}, {"name": "b"}, {"name": 3}]);
    let result = pattern.matches(&Value::from_json(&sample), &resolver);
    assert_eq!(result.as_failure().unwrap().path(), "[2].name");
}

#[test]
fn diverged_named_types_are_detected() {
    let contract = |name_type: &str| {
        feature(json!({
            "types": {"Customer": {"name": name_type}},
            "scenarios": [{
                "name": "add customer",
                "request": {"method": "POST", "path": "/customers", "body": "(Customer)"},
                "response": {"status": 201}
            }]
        }))
    };
    let older = contract("(string)");
    assert!(test_backward_compatibility(&older, &contract("(string)"), 2).success());

    let results = test_backward_compatibility(&older, &contract("(number)"), 2);
    assert_eq!(results.failure_count(), 1);
    let failure = results.failures().next().unwrap();
    assert_eq!(failure.path(), "REQUEST.BODY.name");
    assert_eq!(failure.scenario.as_deref(), Some("add customer"));
}

#[test]
fn unreadable_contracts_are_unresolvable() {
    let dir = tempfile::tempdir().unwrap();
    let newer = write(&dir, "newer.json", people_api());
    let missing = dir.path().join("older.json");
    let outcome = backward_compatible_files(&missing, &newer, 1);
    let Outcome::Unresolvable(message) = &outcome else { panic!("expected an unresolvable outcome") };
    assert!(message.contains("older.json"));

    let output = check_compatibility(|| outcome);
    assert_eq!(output.exit_code, 1);
}

#[test]
fn generated_stubs_fit_their_contract() {
    let contract = feature(people_api());
    let stubs = contract.generate_stubs().unwrap();
    assert_eq!(stubs.keys().collect::<Vec<_>>(), ["add person", "get person"]);
    for (name, stub) in &stubs {
        let decoded = StubRecord::from_json(&stub.to_json().unwrap()).unwrap();
        let StubRecord::Http { request, response, .. } = decoded else { panic!("expected an http stub") };
        assert_eq!(&contract.match_stub(&request, &response).unwrap().name, name);
    }

    let person = Pattern::deferred("Person");
    let generated = person.generate(&contract.resolver).unwrap();
    assert!(person.matches(&generated, &contract.resolver).is_success());
}

fn response_contract(types: serde_json::Value, body: serde_json::Value) -> Feature {
    feature(json!({
        "types": types,
        "scenarios": [{
            "name": "fetch",
            "request": {"method": "GET", "path": "/records"},
            "response": {"status": 200, "body": body}
        }]
    }))
}

#[test]
fn required_response_key_made_optional_breaks_old_clients() {
    let older = response_contract(json!({}), json!({"id": "(number)"}));
    let newer = response_contract(json!({}), json!({"id?": "(number)"}));

    let results = test_backward_compatibility(&older, &newer, 1);
    assert_eq!((results.success_count(), results.failure_count()), (0, 1));
    let failure = results.failures().next().unwrap();
    assert_eq!(failure.path(), "RESPONSE.BODY.id");
    assert_eq!(failure.messages(), vec!["Key id was missing"]);

    // promising a key that used to be optional is fine
    assert!(test_backward_compatibility(&newer, &older, 1).success());
}

#[test]
fn diverged_types_behind_nullable_references_are_located() {
    let body = json!({"address": "(Address?)"});
    let older = response_contract(json!({"Address": {"street": "(string)", "zip": "(number)"}}), body.clone());
    let newer = response_contract(json!({"Address": {"street": "(string)", "zip": "(string)"}}), body);

    let results = test_backward_compatibility(&older, &newer, 1);
    assert_eq!(results.failure_count(), 1);
    assert_eq!(results.failures().next().unwrap().path(), "RESPONSE.BODY.address.zip");
}
