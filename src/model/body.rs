//! Body variant union for HTTP message bodies and body matchers.
//!
//! Exactly one variant is populated by construction (sum type), so the
//! "exactly one body kind" invariant is structural rather than checked.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use super::keys::Parameters;

/// JSON body match strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonMatchType {
    /// Document must match field-for-field
    Strict,
    /// Extra fields in the observed document are ignored
    OnlyMatchingFields,
}

impl JsonMatchType {
    /// Wire name of the match type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "STRICT",
            Self::OnlyMatchingFields => "ONLY_MATCHING_FIELDS",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "STRICT" => Some(Self::Strict),
            "ONLY_MATCHING_FIELDS" => Some(Self::OnlyMatchingFields),
            _ => None,
        }
    }
}

/// An HTTP message body, or a matcher over one.
///
/// Every variant carries a `not` flag negating the body match; most carry
/// variant-specific options. Binary and XML bodies retain raw bytes
/// alongside their text rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Exact (or substring) text body
    String {
        /// The body text
        value: String,
        /// Declared media type, if any
        content_type: Option<String>,
        /// Match as substring instead of whole-body equality
        sub_string: bool,
        /// Negate the body match
        not: bool,
    },
    /// JSON document body
    Json {
        /// The JSON document
        value: Value,
        /// Declared media type, if any
        content_type: Option<String>,
        /// Strictness when used as a matcher
        match_type: Option<JsonMatchType>,
        /// Negate the body match
        not: bool,
    },
    /// JSON Schema matcher
    JsonSchema {
        /// The schema document
        schema: Value,
        /// Negate the body match
        not: bool,
    },
    /// JSONPath matcher
    JsonPath {
        /// The JSONPath expression
        path: String,
        /// Negate the body match
        not: bool,
    },
    /// XML document body
    Xml {
        /// The XML text
        value: String,
        /// Original bytes, when the text form is lossy
        raw_bytes: Option<Vec<u8>>,
        /// Declared media type, if any
        content_type: Option<String>,
        /// Negate the body match
        not: bool,
    },
    /// XML Schema (XSD) matcher
    XmlSchema {
        /// The schema text
        schema: String,
        /// Negate the body match
        not: bool,
    },
    /// XPath matcher
    XPath {
        /// The XPath expression
        path: String,
        /// Negate the body match
        not: bool,
    },
    /// Regular-expression matcher
    Regex {
        /// The pattern source
        pattern: String,
        /// Negate the body match
        not: bool,
    },
    /// Raw byte body
    Binary {
        /// The body bytes
        bytes: Vec<u8>,
        /// Declared media type, if any
        content_type: Option<String>,
        /// Negate the body match
        not: bool,
    },
    /// Form-parameter body
    Parameters {
        /// The decoded parameters
        parameters: Parameters,
        /// Negate the body match
        not: bool,
    },
}

impl Body {
    /// A default-optioned text body.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String {
            value: value.into(),
            content_type: None,
            sub_string: false,
            not: false,
        }
    }

    /// A default-optioned JSON body.
    #[must_use]
    pub const fn json(value: Value) -> Self {
        Self::Json {
            value,
            content_type: None,
            match_type: None,
            not: false,
        }
    }

    /// A default-optioned binary body.
    #[must_use]
    pub const fn binary(bytes: Vec<u8>) -> Self {
        Self::Binary {
            bytes,
            content_type: None,
            not: false,
        }
    }

    /// A default-optioned XML body.
    #[must_use]
    pub fn xml(value: impl Into<String>) -> Self {
        Self::Xml {
            value: value.into(),
            raw_bytes: None,
            content_type: None,
            not: false,
        }
    }

    /// A regex body matcher.
    #[must_use]
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex {
            pattern: pattern.into(),
            not: false,
        }
    }

    /// Wire discriminator of the populated variant.
    #[must_use]
    pub const fn discriminator(&self) -> &'static str {
        match self {
            Self::String { .. } => "STRING",
            Self::Json { .. } => "JSON",
            Self::JsonSchema { .. } => "JSON_SCHEMA",
            Self::JsonPath { .. } => "JSON_PATH",
            Self::Xml { .. } => "XML",
            Self::XmlSchema { .. } => "XML_SCHEMA",
            Self::XPath { .. } => "XPATH",
            Self::Regex { .. } => "REGEX",
            Self::Binary { .. } => "BINARY",
            Self::Parameters { .. } => "PARAMETERS",
        }
    }

    /// The `not` flag of the populated variant.
    #[must_use]
    pub const fn is_not(&self) -> bool {
        match self {
            Self::String { not, .. }
            | Self::Json { not, .. }
            | Self::JsonSchema { not, .. }
            | Self::JsonPath { not, .. }
            | Self::Xml { not, .. }
            | Self::XmlSchema { not, .. }
            | Self::XPath { not, .. }
            | Self::Regex { not, .. }
            | Self::Binary { not, .. }
            | Self::Parameters { not, .. } => *not,
        }
    }

    /// Renders the body to its one stable string form.
    ///
    /// This is the representation template authors see and the canonical
    /// layer emits: JSON stays JSON text, binary renders as base64,
    /// parameter bodies render form-encoded.
    #[must_use]
    pub fn canonical_text(&self) -> String {
        match self {
            Self::String { value, .. } | Self::Xml { value, .. } => value.clone(),
            Self::Json { value, .. } => value.to_string(),
            Self::JsonSchema { schema, .. } => schema.to_string(),
            Self::JsonPath { path, .. } | Self::XPath { path, .. } => path.clone(),
            Self::XmlSchema { schema, .. } => schema.clone(),
            Self::Regex { pattern, .. } => pattern.clone(),
            Self::Binary { bytes, .. } => BASE64.encode(bytes),
            Self::Parameters { parameters, .. } => {
                let mut pairs = Vec::new();
                for (name, values) in parameters.iter() {
                    for value in values {
                        pairs.push(format!("{name}={value}"));
                    }
                }
                pairs.join("&")
            }
        }
    }

    /// Returns `true` when this is a text body with every option at its
    /// default, eligible for the bare-string wire shorthand.
    #[must_use]
    pub fn is_plain_string(&self) -> bool {
        matches!(
            self,
            Self::String {
                content_type: None,
                sub_string: false,
                not: false,
                ..
            }
        )
    }
}
