//! Schema registry and validator.
//!
//! Untrusted JSON is gated here before it may touch lifecycle state.
//! A registry is built once per validation *purpose* (expectation,
//! verification, verification sequence), pulling only the fragment
//! subset that purpose needs, resolving cross-references in memory, and
//! compiling a single validator. Registries are immutable afterwards
//! and safe to share across concurrent validations.
//!
//! There are deliberately no process-wide singletons: callers construct
//! registries at startup and inject them, which keeps test isolation
//! trivial.

pub mod documents;

use std::collections::HashMap;

use jsonschema::{Draft, Retrieve, Uri, Validator};
use serde_json::Value;
use tracing::debug;

use crate::error::{SchemaViolation, ValidationError};

// ============================================================================
// Purpose
// ============================================================================

/// A named validation purpose, each with its own fragment subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Expectation definitions submitted for registration
    Expectation,
    /// Verification (match-count) queries
    Verification,
    /// Verification-sequence queries
    VerificationSequence,
}

impl Purpose {
    /// Root fragment name validated against.
    #[must_use]
    pub const fn root(self) -> &'static str {
        match self {
            Self::Expectation => "expectation",
            Self::Verification => "verification",
            Self::VerificationSequence => "verificationSequence",
        }
    }

    /// Every fragment this purpose pulls, root first.
    #[must_use]
    pub const fn fragments(self) -> &'static [&'static str] {
        match self {
            Self::Expectation => &[
                "expectation",
                "requestDefinition",
                "httpRequest",
                "openAPIDefinition",
                "body",
                "bodyWithContentType",
                "keyToMultiValue",
                "keyToValue",
                "socketAddress",
                "times",
                "timeToLive",
                "delay",
                "httpResponse",
                "httpTemplate",
                "httpForward",
                "httpError",
                "httpClassCallback",
            ],
            Self::Verification => &[
                "verification",
                "expectationId",
                "verificationTimes",
                "requestDefinition",
                "httpRequest",
                "openAPIDefinition",
                "body",
                "keyToMultiValue",
                "keyToValue",
            ],
            Self::VerificationSequence => &[
                "verificationSequence",
                "expectationId",
                "requestDefinition",
                "httpRequest",
                "openAPIDefinition",
                "body",
                "keyToMultiValue",
                "keyToValue",
            ],
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Resolves `$ref`s against the registry's own fragment namespace.
struct FragmentRetriever {
    fragments: HashMap<String, Value>,
}

impl Retrieve for FragmentRetriever {
    fn retrieve(
        &self,
        uri: &Uri<String>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        self.fragments
            .get(uri.as_str())
            .cloned()
            .ok_or_else(|| format!("schema fragment not registered: {uri}").into())
    }
}

/// A compiled, purpose-scoped schema validator.
///
/// Load once, validate many: construction parses and compiles every
/// fragment; validation calls never re-parse or mutate.
pub struct SchemaRegistry {
    purpose: Purpose,
    validator: Validator,
}

impl SchemaRegistry {
    /// Builds the registry for `purpose` from the embedded fragments.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidSchema`] if the embedded
    /// fragment graph fails to compile; this indicates a defect in the
    /// fragments themselves, never in caller input.
    pub fn for_purpose(purpose: Purpose) -> Result<Self, ValidationError> {
        let fragments: HashMap<String, Value> = purpose
            .fragments()
            .iter()
            .map(|name| (documents::uri(name), documents::document(name)))
            .collect();
        let root = fragments[&documents::uri(purpose.root())].clone();
        let validator = jsonschema::options()
            .with_draft(Draft::Draft7)
            .with_retriever(FragmentRetriever { fragments })
            .build(&root)
            .map_err(|error| ValidationError::InvalidSchema {
                name: purpose.root().to_string(),
                message: error.to_string(),
            })?;
        debug!(purpose = purpose.root(), "compiled schema registry");
        Ok(Self { purpose, validator })
    }

    /// Shorthand for the expectation registry.
    ///
    /// # Errors
    ///
    /// See [`SchemaRegistry::for_purpose`].
    pub fn expectation() -> Result<Self, ValidationError> {
        Self::for_purpose(Purpose::Expectation)
    }

    /// Shorthand for the verification registry.
    ///
    /// # Errors
    ///
    /// See [`SchemaRegistry::for_purpose`].
    pub fn verification() -> Result<Self, ValidationError> {
        Self::for_purpose(Purpose::Verification)
    }

    /// Shorthand for the verification-sequence registry.
    ///
    /// # Errors
    ///
    /// See [`SchemaRegistry::for_purpose`].
    pub fn verification_sequence() -> Result<Self, ValidationError> {
        Self::for_purpose(Purpose::VerificationSequence)
    }

    /// The purpose this registry validates for.
    #[must_use]
    pub const fn purpose(&self) -> Purpose {
        self.purpose
    }

    /// Validates an already-parsed document, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SchemaViolation`] carrying all
    /// violations found, not just the first.
    pub fn validate_value(&self, value: &Value) -> Result<(), ValidationError> {
        let violations: Vec<SchemaViolation> = self
            .validator
            .iter_errors(value)
            .map(|error| SchemaViolation {
                path: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::SchemaViolation {
                schema: self.purpose.root().to_string(),
                violations,
            })
        }
    }

    /// Parses and validates untrusted JSON text, returning the parsed
    /// document so callers never parse twice.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MalformedJson`] when the text is not JSON at
    /// all; [`ValidationError::SchemaViolation`] when it is JSON of the
    /// wrong shape.
    pub fn check(&self, json_text: &str) -> Result<Value, ValidationError> {
        let value: Value =
            serde_json::from_str(json_text).map_err(|error| ValidationError::MalformedJson {
                message: error.to_string(),
            })?;
        self.validate_value(&value)?;
        Ok(value)
    }

    /// String-contract validation: empty string when `json_text` is
    /// valid, otherwise a human-readable description of every violation.
    #[must_use]
    pub fn validate(&self, json_text: &str) -> String {
        match self.check(json_text) {
            Ok(_) => String::new(),
            Err(error) => error.to_string(),
        }
    }
}
