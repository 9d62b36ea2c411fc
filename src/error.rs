//! Error types for `mockbird`
//!
//! This module provides the error hierarchy for the expectation core:
//! validation, canonical-form, template-evaluation, and verification
//! failures, aggregated under a single top-level error.

use thiserror::Error;

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `mockbird` operations.
///
/// This enum aggregates all domain-specific errors and provides
/// a unified interface for error handling at the API boundary.
#[derive(Debug, Error)]
pub enum MockbirdError {
    /// Input validation error (malformed JSON or schema violation)
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Canonical-form serialization or deserialization error
    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    /// Template evaluation error
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Verification count not satisfied
    #[error(transparent)]
    Verification(#[from] VerificationFailed),

    /// Verification sequence not satisfied
    #[error(transparent)]
    Sequence(#[from] SequenceMismatch),
}

impl MockbirdError {
    /// Returns `true` when the error is caller-recoverable: the input was
    /// rejected at the boundary and no lifecycle state was touched.
    #[must_use]
    pub const fn is_rejected_input(&self) -> bool {
        matches!(self, Self::Validation(_))
            || matches!(
                self,
                Self::Canonical(CanonicalError::UnknownBodyVariant { .. })
                    | Self::Canonical(CanonicalError::InvalidField { .. })
            )
    }
}

// ============================================================================
// Validation Errors
// ============================================================================

/// Errors produced by the schema registry when gating untrusted JSON.
///
/// Malformed JSON (a syntax error) is a distinct kind from a schema
/// violation (well-formed JSON of the wrong shape) so callers and
/// humans can tell the two apart.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The input is not valid JSON at all
    #[error("incorrect json format: {message}")]
    MalformedJson {
        /// Parser message, including line/column where available
        message: String,
    },

    /// The input is valid JSON but does not match the schema
    #[error("incorrect request format: {}", format_violations(.violations))]
    SchemaViolation {
        /// Root schema the document was validated against
        schema: String,
        /// Every violation found, not just the first
        violations: Vec<SchemaViolation>,
    },

    /// An embedded schema fragment failed to compile at registry
    /// construction. A defect in the fragments, never in caller input.
    #[error("schema '{name}' failed to compile: {message}")]
    InvalidSchema {
        /// Root fragment name of the registry being built
        name: String,
        /// Compiler message
        message: String,
    },
}

/// A single schema violation at a named path within the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON pointer to the offending value (e.g. `/httpRequest/body`)
    pub path: String,
    /// Description of the violation
    pub message: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "$" } else { &self.path };
        write!(f, "{} at {path}", self.message)
    }
}

fn format_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Canonical-Form Errors
// ============================================================================

/// Errors from the canonical DTO layer.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// Body `type` discriminator not recognized
    #[error("unknown body type '{variant}'")]
    UnknownBodyVariant {
        /// The discriminator value found in the document
        variant: String,
    },

    /// A field had a value the canonical form cannot represent
    #[error("invalid value for '{field}': {message}")]
    InvalidField {
        /// Dotted path of the field within the document
        field: String,
        /// Description of what was wrong
        message: String,
    },

    /// Internal invariant violation: a canonicalized object did not
    /// deserialize back to an equal object. Programmer error, never
    /// caused by well-formed client input.
    #[error("canonical round-trip mismatch: {detail}")]
    RoundTripMismatch {
        /// Description of the divergence
        detail: String,
    },
}

impl CanonicalError {
    /// Builds a [`CanonicalError::RoundTripMismatch`], logging it loudly.
    ///
    /// Round-trip mismatches are defects in the canonical layer itself,
    /// so they are logged at error level the moment they are observed.
    #[must_use]
    pub fn round_trip_mismatch(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(detail = %detail, "canonical round-trip mismatch");
        Self::RoundTripMismatch { detail }
    }
}

// ============================================================================
// Template Errors
// ============================================================================

/// Errors propagated from the external script evaluator.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The evaluator failed to produce a message from the template
    #[error("{language} template for expectation {expectation_id} failed: {message}")]
    Evaluation {
        /// Id of the expectation whose template failed
        expectation_id: String,
        /// Declared template dialect
        language: String,
        /// Evaluator-supplied failure description
        message: String,
    },
}

// ============================================================================
// Verification Diagnostics
// ============================================================================

/// A verification count was not satisfied.
///
/// Diagnostic, not fatal: lifecycle state is untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("expected {expected} but found {actual} matching requests")]
pub struct VerificationFailed {
    /// Human-readable description of the expected count window
    pub expected: String,
    /// Number of observed requests that matched
    pub actual: usize,
}

/// A verification sequence could not be satisfied by the observed log.
///
/// Carries the index of the first unmatched sequence element plus the
/// nearest out-of-order candidate, to aid debugging.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "sequence matcher at index {unmatched_index} not satisfied after log position {}{}",
    .searched_from,
    .nearest_candidate.map_or_else(String::new, |p| format!(" (nearest candidate at position {p})"))
)]
pub struct SequenceMismatch {
    /// Index of the first sequence element that could not be matched
    pub unmatched_index: usize,
    /// Log position after which the search ran (exclusive)
    pub searched_from: usize,
    /// Position of a matching log entry that appeared too early, if any
    pub nearest_candidate: Option<usize>,
}

/// Result type alias for `mockbird` operations.
pub type Result<T> = std::result::Result<T, MockbirdError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_violation_display() {
        let violation = SchemaViolation {
            path: "/httpRequest/body".to_string(),
            message: "expected object or string".to_string(),
        };
        assert_eq!(
            violation.to_string(),
            "expected object or string at /httpRequest/body"
        );
    }

    #[test]
    fn test_schema_violation_root_path() {
        let violation = SchemaViolation {
            path: String::new(),
            message: "\"priority\" is a required property".to_string(),
        };
        assert!(violation.to_string().ends_with(" at $"));
    }

    #[test]
    fn test_validation_error_aggregates_violations() {
        let err = ValidationError::SchemaViolation {
            schema: "expectation".to_string(),
            violations: vec![
                SchemaViolation {
                    path: "/times".to_string(),
                    message: "not a valid times".to_string(),
                },
                SchemaViolation {
                    path: "/priority".to_string(),
                    message: "not an integer".to_string(),
                },
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("/times"));
        assert!(rendered.contains("/priority"));
    }

    #[test]
    fn test_malformed_json_distinct_from_schema_violation() {
        let malformed = ValidationError::MalformedJson {
            message: "EOF while parsing".to_string(),
        };
        assert!(malformed.to_string().starts_with("incorrect json format"));

        let violation = ValidationError::SchemaViolation {
            schema: "expectation".to_string(),
            violations: vec![],
        };
        assert!(violation.to_string().starts_with("incorrect request format"));
    }

    #[test]
    fn test_rejected_input_classification() {
        let err: MockbirdError = ValidationError::MalformedJson {
            message: "bad".to_string(),
        }
        .into();
        assert!(err.is_rejected_input());

        let err: MockbirdError = CanonicalError::round_trip_mismatch("divergence").into();
        assert!(!err.is_rejected_input());
    }

    #[test]
    fn test_sequence_mismatch_display() {
        let err = SequenceMismatch {
            unmatched_index: 0,
            searched_from: 1,
            nearest_candidate: Some(0),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("index 0"));
        assert!(rendered.contains("position 0"));
    }
}
