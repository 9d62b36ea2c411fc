//! Flattened request context handed to template evaluators.
//!
//! The context is the only view of the matched request a script ever
//! sees: a deep copy with no reference back to the source, so an
//! untrusted evaluator can neither observe nor cause mutation.

use crate::model::{Cookies, Headers, HttpRequest, Parameters, X509Certificate};

/// Read-only projection of a matched request for template evaluation.
///
/// Path parameters, query parameters, and headers stay multi-valued;
/// cookies stay scalar. The body is rendered to its canonical string
/// form regardless of the original variant. Equality and hashing are
/// structural, so projecting the same request twice yields contexts that
/// compare and hash identically (used to cache repeated evaluations).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateContext {
    /// Request method; empty when no source request
    pub method: String,
    /// Request path; empty when no source request
    pub path: String,
    /// Path parameters, name to ordered values
    pub path_parameters: Parameters,
    /// Query-string parameters, name to ordered values
    pub query_string_parameters: Parameters,
    /// Headers, insertion-ordered, name to ordered values
    pub headers: Headers,
    /// Cookies, name to scalar value
    pub cookies: Cookies,
    /// Body in canonical string form; empty when absent
    pub body: String,
    /// TLS flag of the source request
    pub secure: Option<bool>,
    /// Keep-alive flag of the source request
    pub keep_alive: Option<bool>,
    /// Client certificate chain from mutual TLS
    pub client_certificate_chain: Vec<X509Certificate>,
    /// Local socket address
    pub local_address: Option<String>,
    /// Remote socket address
    pub remote_address: Option<String>,
}

impl TemplateContext {
    /// Projects a matched request into an evaluator-safe context.
    ///
    /// Never fails: `None` (a minimal or negated match with no concrete
    /// request) yields a context with every field at its zero value, so
    /// templates can still run.
    #[must_use]
    pub fn from_request(request: Option<&HttpRequest>) -> Self {
        let Some(request) = request else {
            return Self::default();
        };
        Self {
            method: request.method.clone(),
            path: request.path.clone(),
            path_parameters: request.path_parameters.clone(),
            query_string_parameters: request.query_string_parameters.clone(),
            headers: request.headers.clone(),
            cookies: request.cookies.clone(),
            body: request
                .body
                .as_ref()
                .map(crate::model::Body::canonical_text)
                .unwrap_or_default(),
            secure: request.secure,
            keep_alive: request.keep_alive,
            client_certificate_chain: request.client_certificate_chain.clone(),
            local_address: request.local_address.clone(),
            remote_address: request.remote_address.clone(),
        }
    }

    /// The context as a JSON value, the shape script engines bind their
    /// variables from.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
