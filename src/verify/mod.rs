//! Verification of observed traffic against count and sequence queries.
//!
//! Both queries are read-only: they consume a snapshot of the request
//! log owned by the caller and report pass or fail with a diagnostic.
//! Lifecycle state is never touched.

use serde_json::Value;
use tracing::debug;

use crate::canonical::definition_from_canonical;
use crate::error::{CanonicalError, MockbirdError, SequenceMismatch, VerificationFailed};
use crate::model::{HttpRequest, RequestDefinition};
use crate::schema::SchemaRegistry;

// ============================================================================
// Verification Times
// ============================================================================

/// How many matching requests a verification demands.
///
/// Either bound may be absent; the default demands at least one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationTimes {
    /// Inclusive lower bound on the match count
    pub at_least: Option<usize>,
    /// Inclusive upper bound on the match count
    pub at_most: Option<usize>,
}

impl Default for VerificationTimes {
    fn default() -> Self {
        Self::at_least(1)
    }
}

impl VerificationTimes {
    /// At least `count` matches.
    #[must_use]
    pub const fn at_least(count: usize) -> Self {
        Self {
            at_least: Some(count),
            at_most: None,
        }
    }

    /// At most `count` matches.
    #[must_use]
    pub const fn at_most(count: usize) -> Self {
        Self {
            at_least: None,
            at_most: Some(count),
        }
    }

    /// Exactly `count` matches.
    #[must_use]
    pub const fn exactly(count: usize) -> Self {
        Self {
            at_least: Some(count),
            at_most: Some(count),
        }
    }

    /// Exactly one match.
    #[must_use]
    pub const fn once() -> Self {
        Self::exactly(1)
    }

    /// No matches at all.
    #[must_use]
    pub const fn never() -> Self {
        Self::exactly(0)
    }

    /// Returns `true` when `count` satisfies both bounds.
    #[must_use]
    pub fn is_satisfied(self, count: usize) -> bool {
        self.at_least.is_none_or(|bound| count >= bound)
            && self.at_most.is_none_or(|bound| count <= bound)
    }

    /// Human-readable description of the demanded window.
    #[must_use]
    pub fn describe(self) -> String {
        match (self.at_least, self.at_most) {
            (Some(lower), Some(upper)) if lower == upper => format!("exactly {lower}"),
            (Some(lower), Some(upper)) => format!("between {lower} and {upper}"),
            (Some(lower), None) => format!("at least {lower}"),
            (None, Some(upper)) => format!("at most {upper}"),
            (None, None) => "any number of".to_string(),
        }
    }
}

// ============================================================================
// Count Verification
// ============================================================================

/// A count query: how many observed requests matched a definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    /// Which observed requests count as matches
    pub request: RequestDefinition,
    /// Demanded match-count window
    pub times: VerificationTimes,
    /// Expectation id supplied on the wire, if any; resolving it to
    /// requests is the request log owner's job
    pub expectation_id: Option<String>,
}

impl Verification {
    /// A verification demanding at least one match of `request`.
    #[must_use]
    pub fn new(request: impl Into<RequestDefinition>) -> Self {
        Self {
            request: request.into(),
            times: VerificationTimes::default(),
            expectation_id: None,
        }
    }

    /// Sets the demanded count window.
    #[must_use]
    pub const fn with_times(mut self, times: VerificationTimes) -> Self {
        self.times = times;
        self
    }

    /// Checks the query against an observed-request log.
    ///
    /// # Errors
    ///
    /// [`VerificationFailed`] carrying the demanded window and the
    /// actual count when the window is not satisfied.
    pub fn verify(&self, log: &[HttpRequest]) -> Result<(), VerificationFailed> {
        let actual = log
            .iter()
            .filter(|request| self.request.matches(request))
            .count();
        debug!(actual, expected = %self.times.describe(), "count verification");
        if self.times.is_satisfied(actual) {
            Ok(())
        } else {
            Err(VerificationFailed {
                expected: self.times.describe(),
                actual,
            })
        }
    }
}

// ============================================================================
// Sequence Verification
// ============================================================================

/// An ordered-subsequence query against the observed-request log.
///
/// Each matcher must be satisfied by a log entry strictly after the
/// entry that satisfied the previous matcher; unrelated interleaved
/// entries are permitted. Duplicate matchers therefore need distinct,
/// strictly later log positions each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationSequence {
    /// Matchers, in demanded order
    pub requests: Vec<RequestDefinition>,
    /// Expectation ids supplied on the wire, if any; resolution is the
    /// request log owner's job
    pub expectation_ids: Vec<String>,
}

impl VerificationSequence {
    /// A sequence over the given matchers.
    #[must_use]
    pub fn new(requests: impl IntoIterator<Item = RequestDefinition>) -> Self {
        Self {
            requests: requests.into_iter().collect(),
            expectation_ids: Vec::new(),
        }
    }

    /// Checks the sequence against an observed-request log.
    ///
    /// # Errors
    ///
    /// [`SequenceMismatch`] naming the first matcher that could not be
    /// satisfied, the log position its search started from, and the
    /// position of a too-early match when one exists.
    pub fn verify(&self, log: &[HttpRequest]) -> Result<(), SequenceMismatch> {
        let mut cursor = 0usize;
        for (index, matcher) in self.requests.iter().enumerate() {
            let found = log[cursor.min(log.len())..]
                .iter()
                .position(|request| matcher.matches(request));
            match found {
                Some(offset) => cursor = cursor + offset + 1,
                None => {
                    let nearest_candidate = log[..cursor.min(log.len())]
                        .iter()
                        .position(|request| matcher.matches(request));
                    debug!(index, cursor, "sequence matcher unsatisfied");
                    return Err(SequenceMismatch {
                        unmatched_index: index,
                        searched_from: cursor,
                        nearest_candidate,
                    });
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Canonical Parsing
// ============================================================================

/// Deserializes a count verification from its canonical form.
///
/// # Errors
///
/// Propagates [`CanonicalError`] from the nested request definition.
pub fn verification_from_canonical(value: &Value) -> Result<Verification, CanonicalError> {
    let object = value.as_object().ok_or_else(|| CanonicalError::InvalidField {
        field: "verification".to_string(),
        message: "expected an object".to_string(),
    })?;
    let mut verification = Verification::default();
    if let Some(value) = object.get("httpRequest") {
        verification.request = definition_from_canonical(value)?;
    }
    if let Some(times) = object.get("times").and_then(Value::as_object) {
        verification.times = VerificationTimes {
            at_least: times
                .get("atLeast")
                .and_then(Value::as_u64)
                .map(|n| usize::try_from(n).unwrap_or(usize::MAX)),
            at_most: times
                .get("atMost")
                .and_then(Value::as_u64)
                .map(|n| usize::try_from(n).unwrap_or(usize::MAX)),
        };
    }
    verification.expectation_id = object
        .get("expectationId")
        .and_then(|id| id.get("id"))
        .and_then(Value::as_str)
        .map(ToString::to_string);
    Ok(verification)
}

/// Deserializes a sequence verification from its canonical form.
///
/// # Errors
///
/// Propagates [`CanonicalError`] from any nested request definition.
pub fn verification_sequence_from_canonical(
    value: &Value,
) -> Result<VerificationSequence, CanonicalError> {
    let object = value.as_object().ok_or_else(|| CanonicalError::InvalidField {
        field: "verificationSequence".to_string(),
        message: "expected an object".to_string(),
    })?;
    let mut sequence = VerificationSequence::default();
    if let Some(requests) = object.get("httpRequests").and_then(Value::as_array) {
        sequence.requests = requests
            .iter()
            .map(definition_from_canonical)
            .collect::<Result<_, _>>()?;
    }
    if let Some(ids) = object.get("expectationIds").and_then(Value::as_array) {
        sequence.expectation_ids = ids
            .iter()
            .filter_map(|id| id.get("id").and_then(Value::as_str))
            .map(ToString::to_string)
            .collect();
    }
    Ok(sequence)
}

/// Parses an untrusted count verification: schema gate, then canonical.
///
/// # Errors
///
/// [`crate::error::ValidationError`] for malformed or schema-invalid
/// text; [`CanonicalError`] for documents the schema cannot distinguish.
pub fn verification_from_json(
    registry: &SchemaRegistry,
    json_text: &str,
) -> Result<Verification, MockbirdError> {
    let value = registry.check(json_text)?;
    Ok(verification_from_canonical(&value)?)
}

/// Parses an untrusted sequence verification: schema gate, then
/// canonical.
///
/// # Errors
///
/// [`crate::error::ValidationError`] for malformed or schema-invalid
/// text; [`CanonicalError`] for documents the schema cannot distinguish.
pub fn verification_sequence_from_json(
    registry: &SchemaRegistry,
    json_text: &str,
) -> Result<VerificationSequence, MockbirdError> {
    let value = registry.check(json_text)?;
    Ok(verification_sequence_from_canonical(&value)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn get(path: &str) -> HttpRequest {
        HttpRequest::new().with_method("GET").with_path(path)
    }

    fn matcher(path: &str) -> RequestDefinition {
        RequestDefinition::from(HttpRequest::new().with_path(path))
    }

    #[test]
    fn test_count_default_demands_at_least_one() {
        let verification = Verification::new(HttpRequest::new().with_path("/a"));
        assert!(verification.verify(&[get("/a"), get("/b")]).is_ok());
        let err = verification.verify(&[get("/b")]).unwrap_err();
        assert_eq!(err.expected, "at least 1");
        assert_eq!(err.actual, 0);
    }

    #[test]
    fn test_count_never_rejects_any_match() {
        let verification = Verification::new(HttpRequest::new().with_path("/a"))
            .with_times(VerificationTimes::never());
        assert!(verification.verify(&[get("/b")]).is_ok());
        let err = verification.verify(&[get("/a")]).unwrap_err();
        assert_eq!(err.expected, "exactly 0");
        assert_eq!(err.actual, 1);
    }

    #[test]
    fn test_count_window_descriptions() {
        assert_eq!(VerificationTimes::at_least(2).describe(), "at least 2");
        assert_eq!(VerificationTimes::at_most(3).describe(), "at most 3");
        assert_eq!(VerificationTimes::exactly(1).describe(), "exactly 1");
        assert_eq!(
            VerificationTimes {
                at_least: Some(1),
                at_most: Some(3)
            }
            .describe(),
            "between 1 and 3"
        );
    }

    #[test]
    fn test_sequence_allows_interleaved_noise() {
        let sequence = VerificationSequence::new([matcher("/a"), matcher("/b")]);
        assert!(sequence.verify(&[get("/a"), get("/x"), get("/b")]).is_ok());
    }

    #[test]
    fn test_sequence_rejects_out_of_order() {
        let sequence = VerificationSequence::new([matcher("/b"), matcher("/a")]);
        let err = sequence
            .verify(&[get("/a"), get("/x"), get("/b")])
            .unwrap_err();
        // /b matched at position 2, so /a was searched from 3 and its
        // only occurrence (position 0) is a too-early candidate.
        assert_eq!(err.unmatched_index, 1);
        assert_eq!(err.searched_from, 3);
        assert_eq!(err.nearest_candidate, Some(0));
    }

    #[test]
    fn test_sequence_reversed_pair() {
        let sequence = VerificationSequence::new([matcher("/a"), matcher("/b")]);
        let err = sequence.verify(&[get("/b"), get("/a")]).unwrap_err();
        assert_eq!(err.unmatched_index, 1);
        assert_eq!(err.nearest_candidate, Some(0));
    }

    #[test]
    fn test_duplicate_matchers_need_distinct_positions() {
        let sequence = VerificationSequence::new([matcher("/a"), matcher("/a")]);
        assert!(sequence.verify(&[get("/a"), get("/a")]).is_ok());

        let err = sequence.verify(&[get("/a")]).unwrap_err();
        assert_eq!(err.unmatched_index, 1);
        assert_eq!(err.searched_from, 1);
        assert_eq!(err.nearest_candidate, Some(0));
    }

    #[test]
    fn test_empty_sequence_always_passes() {
        let sequence = VerificationSequence::default();
        assert!(sequence.verify(&[]).is_ok());
        assert!(sequence.verify(&[get("/anything")]).is_ok());
    }

    #[test]
    fn test_verification_from_canonical() {
        let verification = verification_from_canonical(&json!({
            "httpRequest": { "path": "/widgets" },
            "times": { "atLeast": 2, "atMost": 4 }
        }))
        .unwrap();
        assert_eq!(verification.times.at_least, Some(2));
        assert_eq!(verification.times.at_most, Some(4));
        assert_eq!(
            verification.request.as_request().map(|r| r.path.as_str()),
            Some("/widgets")
        );
    }

    #[test]
    fn test_sequence_from_canonical() {
        let sequence = verification_sequence_from_canonical(&json!({
            "httpRequests": [
                { "path": "/first" },
                { "path": "/second" }
            ]
        }))
        .unwrap();
        assert_eq!(sequence.requests.len(), 2);
    }

    #[test]
    fn test_verification_from_json_gates_shape() {
        let registry = SchemaRegistry::verification().unwrap();
        let err = verification_from_json(&registry, r#"{ "bogus": true }"#).unwrap_err();
        assert!(err.is_rejected_input());

        let ok = verification_from_json(
            &registry,
            r#"{ "httpRequest": { "path": "/a" }, "times": { "atLeast": 1 } }"#,
        );
        assert!(ok.is_ok());
    }
}
