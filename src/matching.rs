//! Structural request matching.
//!
//! Subset semantics: fields left unset on the matcher side match
//! anything; every field the matcher does define must be satisfied by
//! the observed request. String fields compare literal-first, falling
//! back to whole-string regex when the pattern compiles. The richer
//! matcher engine (OpenAPI, XML schema validation, JSONPath evaluation)
//! is an external collaborator; those variants match conservatively on
//! canonical text equality here.

use std::sync::LazyLock;

use dashmap::DashMap;
use serde_json::Value;

use crate::model::{Body, HttpRequest, JsonMatchType, RequestDefinition};

impl RequestDefinition {
    /// Tests whether this definition matches an observed request.
    ///
    /// OpenAPI-derived definitions never match in-core; interpreting
    /// them requires the external OpenAPI engine.
    #[must_use]
    pub fn matches(&self, request: &HttpRequest) -> bool {
        match self {
            Self::Request(matcher) => request_matches(matcher, request),
            Self::OpenApi(_) => false,
        }
    }
}

fn request_matches(matcher: &HttpRequest, request: &HttpRequest) -> bool {
    let matched = string_field_matches(&matcher.method, &request.method)
        && string_field_matches(&matcher.path, &request.path)
        && parameters_match(&matcher.path_parameters, &request.path_parameters)
        && parameters_match(
            &matcher.query_string_parameters,
            &request.query_string_parameters,
        )
        && headers_match(matcher, request)
        && cookies_match(matcher, request)
        && flag_matches(matcher.secure, request.secure)
        && flag_matches(matcher.keep_alive, request.keep_alive)
        && address_matches(matcher.local_address.as_deref(), request.local_address.as_deref())
        && address_matches(
            matcher.remote_address.as_deref(),
            request.remote_address.as_deref(),
        )
        && body_matches(matcher.body.as_ref(), request.body.as_ref());
    matched != matcher.not
}

/// Literal-first string match with regex fallback.
///
/// An empty pattern matches anything. The regex is compiled with a size
/// limit and anchored to the whole value; a pattern that fails to
/// compile only matches its literal self.
fn string_field_matches(pattern: &str, value: &str) -> bool {
    if pattern.is_empty() || pattern == value {
        return true;
    }
    compile_anchored(pattern).is_some_and(|re| re.is_match(value))
}

/// Compiled patterns memoized by source text, failures included, so a
/// matcher evaluated per incoming request never recompiles. Patterns
/// come from registered matchers, which bounds the cache.
static ANCHORED: LazyLock<DashMap<String, Option<regex::Regex>>> = LazyLock::new(DashMap::new);

fn compile_anchored(pattern: &str) -> Option<regex::Regex> {
    if let Some(compiled) = ANCHORED.get(pattern) {
        return compiled.clone();
    }
    let compiled = regex::RegexBuilder::new(&format!("\\A(?:{pattern})\\z"))
        .size_limit(1 << 20)
        .build()
        .ok();
    ANCHORED.insert(pattern.to_string(), compiled.clone());
    compiled
}

fn parameters_match(
    matcher: &crate::model::Parameters,
    observed: &crate::model::Parameters,
) -> bool {
    matcher.iter().all(|(name, wanted)| {
        observed.values(name).is_some_and(|actual| {
            wanted
                .iter()
                .all(|want| actual.iter().any(|have| string_field_matches(want, have)))
        })
    })
}

fn headers_match(matcher: &HttpRequest, request: &HttpRequest) -> bool {
    matcher.headers.iter().all(|(name, wanted)| {
        request.headers.values(name).is_some_and(|actual| {
            wanted
                .iter()
                .all(|want| actual.iter().any(|have| string_field_matches(want, have)))
        })
    })
}

fn cookies_match(matcher: &HttpRequest, request: &HttpRequest) -> bool {
    matcher.cookies.iter().all(|(name, wanted)| {
        request
            .cookies
            .value(name)
            .is_some_and(|have| string_field_matches(wanted, have))
    })
}

const fn flag_matches(wanted: Option<bool>, actual: Option<bool>) -> bool {
    match wanted {
        None => true,
        Some(want) => matches!(actual, Some(have) if have == want),
    }
}

fn address_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(want) => actual.is_some_and(|have| string_field_matches(want, have)),
    }
}

fn body_matches(matcher: Option<&Body>, observed: Option<&Body>) -> bool {
    let Some(matcher) = matcher else {
        return true;
    };
    let matched = observed.is_some_and(|observed| body_variant_matches(matcher, observed));
    matched != matcher.is_not()
}

fn body_variant_matches(matcher: &Body, observed: &Body) -> bool {
    let observed_text = observed.canonical_text();
    match matcher {
        Body::String {
            value, sub_string, ..
        } => {
            if *sub_string {
                observed_text.contains(value.as_str())
            } else {
                observed_text == *value
            }
        }
        Body::Json {
            value, match_type, ..
        } => serde_json::from_str::<Value>(&observed_text).is_ok_and(|observed_json| {
            match match_type.unwrap_or(JsonMatchType::OnlyMatchingFields) {
                JsonMatchType::Strict => observed_json == *value,
                JsonMatchType::OnlyMatchingFields => json_subset(value, &observed_json),
            }
        }),
        Body::Regex { pattern, .. } => compile_anchored(pattern)
            .is_some_and(|re| re.is_match(&observed_text)),
        Body::Binary { bytes, .. } => match observed {
            Body::Binary {
                bytes: observed_bytes,
                ..
            } => bytes == observed_bytes,
            _ => false,
        },
        Body::Parameters { parameters, .. } => match observed {
            Body::Parameters {
                parameters: observed_parameters,
                ..
            } => parameters_match(parameters, observed_parameters),
            _ => false,
        },
        // Schema, path, and XML-comparison matchers need external engines;
        // canonical text equality is the conservative in-core behavior.
        Body::JsonSchema { .. }
        | Body::JsonPath { .. }
        | Body::Xml { .. }
        | Body::XmlSchema { .. }
        | Body::XPath { .. } => matcher.canonical_text() == observed_text,
    }
}

/// Returns `true` when every field of `expected` appears with an equal
/// (or recursively subset) value in `observed`. Arrays compare
/// element-wise and must be the same length.
fn json_subset(expected: &Value, observed: &Value) -> bool {
    match (expected, observed) {
        (Value::Object(expected), Value::Object(observed)) => {
            expected.iter().all(|(key, value)| {
                observed
                    .get(key)
                    .is_some_and(|observed_value| json_subset(value, observed_value))
            })
        }
        (Value::Array(expected), Value::Array(observed)) => {
            expected.len() == observed.len()
                && expected
                    .iter()
                    .zip(observed)
                    .all(|(e, o)| json_subset(e, o))
        }
        (expected, observed) => expected == observed,
    }
}
