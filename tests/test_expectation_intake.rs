//! End-to-end intake: untrusted JSON through the schema gate and the
//! canonical layer into the live store.

use mockbird::canonical::{expectation_to_canonical, expectations_from_json, to_pretty_string};
use mockbird::model::Times;
use mockbird::{ExpectationStore, HttpRequest, SchemaRegistry};

fn registry() -> SchemaRegistry {
    SchemaRegistry::expectation().expect("embedded schemas compile")
}

/// A well-formed expectation document flows through gate, parse, store,
/// and match.
#[test]
fn valid_document_reaches_the_store() {
    let json = r#"{
        "httpRequest": { "method": "GET", "path": "/widgets" },
        "httpResponse": { "statusCode": 200, "body": "all widgets" }
    }"#;
    let expectations = expectations_from_json(&registry(), json).unwrap();
    assert_eq!(expectations.len(), 1);

    let store = ExpectationStore::new();
    for expectation in expectations {
        store.register(expectation);
    }
    let matched = store.first_match(&HttpRequest::new().with_method("GET").with_path("/widgets"));
    assert!(matched.is_some(), "registered expectation should match");
}

/// A bare array registers every element; a single object registers one.
#[test]
fn array_and_single_object_forms_accepted() {
    let array = r#"[
        { "httpRequest": { "path": "/a" }, "httpResponse": { "statusCode": 200 } },
        { "httpRequest": { "path": "/b" }, "httpResponse": { "statusCode": 404 } }
    ]"#;
    assert_eq!(expectations_from_json(&registry(), array).unwrap().len(), 2);

    let single = r#"{ "httpResponse": { "statusCode": 200 } }"#;
    assert_eq!(expectations_from_json(&registry(), single).unwrap().len(), 1);
}

/// Syntax errors and shape errors are rejected before any state change,
/// with distinguishable messages.
#[test]
fn malformed_and_invalid_documents_rejected() {
    let registry = registry();

    let malformed = expectations_from_json(&registry, "{ not json").unwrap_err();
    assert!(malformed.is_rejected_input());
    assert!(
        malformed.to_string().contains("incorrect json format"),
        "syntax error message: {malformed}"
    );

    let no_action = expectations_from_json(&registry, r#"{ "httpRequest": {} }"#).unwrap_err();
    assert!(no_action.is_rejected_input());
    assert!(
        no_action.to_string().contains("incorrect request format"),
        "shape error message: {no_action}"
    );
}

/// Every element of an array is validated; one bad element rejects the
/// whole submission.
#[test]
fn one_bad_element_rejects_the_batch() {
    let json = r#"[
        { "httpResponse": { "statusCode": 200 } },
        { "bogusKey": true }
    ]"#;
    assert!(expectations_from_json(&registry(), json).is_err());
}

/// A document without an id gets a generated one; ids are unique per
/// parse.
#[test]
fn missing_ids_are_generated() {
    let json = r#"{ "httpResponse": { "statusCode": 200 } }"#;
    let registry = registry();
    let first = &expectations_from_json(&registry, json).unwrap()[0];
    let second = &expectations_from_json(&registry, json).unwrap()[0];
    assert!(!first.id.is_empty());
    assert_ne!(first.id, second.id, "each parse gets its own id");
}

/// Re-submitting an id replaces the stored expectation in place.
#[test]
fn resubmitted_id_replaces_in_place() {
    let registry = registry();
    let store = ExpectationStore::new();

    let original = r#"{
        "id": "widget-rule",
        "httpRequest": { "path": "/widgets" },
        "httpResponse": { "statusCode": 200 }
    }"#;
    let replacement = r#"{
        "id": "widget-rule",
        "httpRequest": { "path": "/widgets" },
        "httpResponse": { "statusCode": 503 }
    }"#;
    for json in [original, replacement] {
        for expectation in expectations_from_json(&registry, json).unwrap() {
            store.register(expectation);
        }
    }
    assert_eq!(store.len(), 1, "same id should not duplicate");
}

/// A schema-valid document with a calendar-breaking ttl magnitude must
/// register and match instead of panicking the store.
#[test]
fn extreme_ttl_document_is_survivable() {
    let json = r#"{
        "httpRequest": { "path": "/durable" },
        "timeToLive": { "timeUnit": "DAYS", "timeToLive": 9223372036854775807 },
        "httpResponse": { "statusCode": 200 }
    }"#;
    let store = ExpectationStore::new();
    for expectation in expectations_from_json(&registry(), json).unwrap() {
        store.register(expectation);
    }
    let matched = store.first_match(&HttpRequest::new().with_path("/durable"));
    assert!(matched.is_some(), "saturated ttl should never expire");
}

/// The canonical form of a parsed document omits defaulted fields and
/// pretty-prints with two-space indentation.
#[test]
fn canonical_output_is_stable_and_minimal() {
    let json = r#"{
        "id": "stable",
        "httpRequest": { "path": "/widgets" },
        "times": { "remainingTimes": 2 },
        "httpResponse": { "statusCode": 200 }
    }"#;
    let expectation = expectations_from_json(&registry(), json)
        .unwrap()
        .remove(0);
    assert_eq!(expectation.times, Times::exactly(2));

    let canonical = expectation_to_canonical(&expectation);
    let rendered = to_pretty_string(&canonical);
    assert!(rendered.contains("\n  \"id\": \"stable\""));
    assert!(
        !rendered.contains("priority"),
        "default priority must be omitted: {rendered}"
    );
    assert!(
        !rendered.contains("timeToLive"),
        "unlimited ttl must be omitted: {rendered}"
    );
}
