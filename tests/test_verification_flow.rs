//! Verification queries parsed from wire JSON and run against an
//! observed-request log.

use mockbird::HttpRequest;
use mockbird::schema::SchemaRegistry;
use mockbird::verify::{verification_from_json, verification_sequence_from_json};

fn observed() -> Vec<HttpRequest> {
    vec![
        HttpRequest::new().with_method("POST").with_path("/login"),
        HttpRequest::new().with_method("GET").with_path("/widgets"),
        HttpRequest::new().with_method("GET").with_path("/widgets"),
        HttpRequest::new().with_method("POST").with_path("/logout"),
    ]
}

/// A count verification parsed from JSON runs against the log.
#[test]
fn count_verification_from_wire() {
    let registry = SchemaRegistry::verification().unwrap();
    let verification = verification_from_json(
        &registry,
        r#"{
            "httpRequest": { "method": "GET", "path": "/widgets" },
            "times": { "atLeast": 2, "atMost": 2 }
        }"#,
    )
    .unwrap();
    assert!(verification.verify(&observed()).is_ok());

    let too_many = verification_from_json(
        &registry,
        r#"{ "httpRequest": { "path": "/widgets" }, "times": { "atMost": 1 } }"#,
    )
    .unwrap();
    let err = too_many.verify(&observed()).unwrap_err();
    assert_eq!(err.actual, 2);
    assert_eq!(err.expected, "at most 1");
}

/// A sequence verification parsed from JSON accepts interleaved noise
/// but rejects reordering, with a useful diagnostic.
#[test]
fn sequence_verification_from_wire() {
    let registry = SchemaRegistry::verification_sequence().unwrap();
    let in_order = verification_sequence_from_json(
        &registry,
        r#"{ "httpRequests": [ { "path": "/login" }, { "path": "/logout" } ] }"#,
    )
    .unwrap();
    assert!(in_order.verify(&observed()).is_ok());

    let reversed = verification_sequence_from_json(
        &registry,
        r#"{ "httpRequests": [ { "path": "/logout" }, { "path": "/login" } ] }"#,
    )
    .unwrap();
    let err = reversed.verify(&observed()).unwrap_err();
    assert_eq!(err.unmatched_index, 1, "the /login matcher fails");
    assert_eq!(
        err.nearest_candidate,
        Some(0),
        "its only match sits before /logout"
    );
    assert!(
        err.to_string().contains("nearest candidate"),
        "diagnostic should point at the too-early match: {err}"
    );
}

/// Schema gating rejects shapes the verification purposes do not allow.
#[test]
fn wire_shapes_are_gated() {
    let registry = SchemaRegistry::verification().unwrap();
    let err = verification_from_json(
        &registry,
        r#"{ "httpRequest": { "path": "/a" }, "httpResponse": {} }"#,
    )
    .unwrap_err();
    assert!(err.is_rejected_input());

    let sequence_registry = SchemaRegistry::verification_sequence().unwrap();
    let err = verification_sequence_from_json(
        &sequence_registry,
        r#"{ "httpRequests": { "path": "/not-an-array" } }"#,
    )
    .unwrap_err();
    assert!(err.is_rejected_input());
}
