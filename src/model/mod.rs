//! Domain model: HTTP messages, request definitions, and expectations.
//!
//! These types are plain data. Construction goes through builder-style
//! `with_*` methods; once an expectation is registered it is treated as
//! immutable apart from `Times` decrements inside the store.

pub mod body;
pub mod keys;
pub mod time;

pub use body::{Body, JsonMatchType};
pub use keys::{Cookies, Headers, Parameters};
pub use time::{Delay, TimeToLive, TimeUnit, Times};

use crate::template::Template;

// ============================================================================
// HTTP Request
// ============================================================================

/// A client certificate presented on a mutual-TLS connection.
///
/// Data only; certificate parsing and chain validation happen in the
/// TLS layer outside this core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct X509Certificate {
    /// Subject distinguished name
    pub subject_distinguished_name: String,
    /// Issuer distinguished name
    pub issuer_distinguished_name: String,
    /// Serial number, decimal text
    pub serial_number: String,
    /// PEM-encoded certificate text
    #[serde(rename = "certificate")]
    pub certificate_pem: String,
}

/// An HTTP request, used both as an observed message and as the concrete
/// request matcher inside a [`RequestDefinition`].
///
/// Unset fields are "match anything" in matcher position and "absent" in
/// message position. Path and query parameters and headers are
/// multi-valued; cookies are single-valued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method; empty matches any
    pub method: String,
    /// Request path; empty matches any
    pub path: String,
    /// Path parameters extracted from the path template
    pub path_parameters: Parameters,
    /// Query-string parameters
    pub query_string_parameters: Parameters,
    /// Headers, insertion-ordered
    pub headers: Headers,
    /// Cookies
    pub cookies: Cookies,
    /// Body, or body matcher
    pub body: Option<Body>,
    /// Whether the request arrived over TLS
    pub secure: Option<bool>,
    /// Client certificate chain from mutual TLS
    pub client_certificate_chain: Vec<X509Certificate>,
    /// Local socket address the request arrived on
    pub local_address: Option<String>,
    /// Remote socket address the request came from
    pub remote_address: Option<String>,
    /// Whether the connection is keep-alive
    pub keep_alive: Option<bool>,
    /// Negates the whole match in matcher position
    pub not: bool,
}

impl HttpRequest {
    /// Creates an empty request (matches anything in matcher position).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Sets the path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Adds a path parameter value.
    #[must_use]
    pub fn with_path_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.path_parameters.add(name, value);
        self
    }

    /// Adds a query-string parameter value.
    #[must_use]
    pub fn with_query_string_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.query_string_parameters.add(name, value);
        self
    }

    /// Adds a header value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Sets a cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the secure flag.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Sets the keep-alive flag.
    #[must_use]
    pub const fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Sets the local socket address.
    #[must_use]
    pub fn with_local_address(mut self, address: impl Into<String>) -> Self {
        self.local_address = Some(address.into());
        self
    }

    /// Sets the remote socket address.
    #[must_use]
    pub fn with_remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = Some(address.into());
        self
    }

    /// Negates the whole match.
    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.not = true;
        self
    }
}

// ============================================================================
// Request Definition
// ============================================================================

/// An OpenAPI-derived request matcher.
///
/// Carried through validation, the canonical layer, and the store; the
/// matcher engine interpreting it is an external collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenApiDefinition {
    /// URL of, or inline payload for, the OpenAPI document
    pub spec_url_or_payload: String,
    /// Operation to match; absent matches any operation in the document
    pub operation_id: Option<String>,
}

/// The matcher capability of an expectation: which incoming requests it
/// applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDefinition {
    /// Concrete HTTP request matcher
    Request(HttpRequest),
    /// OpenAPI-derived matcher
    OpenApi(OpenApiDefinition),
}

impl RequestDefinition {
    /// The concrete request matcher, when this is one.
    #[must_use]
    pub const fn as_request(&self) -> Option<&HttpRequest> {
        match self {
            Self::Request(request) => Some(request),
            Self::OpenApi(_) => None,
        }
    }
}

impl Default for RequestDefinition {
    fn default() -> Self {
        Self::Request(HttpRequest::new())
    }
}

impl From<HttpRequest> for RequestDefinition {
    fn from(request: HttpRequest) -> Self {
        Self::Request(request)
    }
}

// ============================================================================
// HTTP Response
// ============================================================================

/// An HTTP response served for a matched expectation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code; 200 when unset
    pub status_code: Option<u16>,
    /// Reason phrase; derived from the status code when unset
    pub reason_phrase: Option<String>,
    /// Response headers, insertion-ordered
    pub headers: Headers,
    /// Set-cookie values
    pub cookies: Cookies,
    /// Response body
    pub body: Option<Body>,
    /// Delay before the response is sent
    pub delay: Option<Delay>,
}

impl HttpResponse {
    /// Creates an empty response (renders as 200 with no body).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the status code.
    #[must_use]
    pub const fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Sets the reason phrase.
    #[must_use]
    pub fn with_reason_phrase(mut self, reason_phrase: impl Into<String>) -> Self {
        self.reason_phrase = Some(reason_phrase.into());
        self
    }

    /// Adds a header value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Sets a cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the pre-send delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = Some(delay);
        self
    }
}

// ============================================================================
// Forward, Error, Callback Actions
// ============================================================================

/// Scheme used when forwarding a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scheme {
    /// Plain HTTP
    #[default]
    Http,
    /// HTTP over TLS
    Https,
}

impl Scheme {
    /// Wire name of the scheme.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "HTTP" => Some(Self::Http),
            "HTTPS" => Some(Self::Https),
            _ => None,
        }
    }
}

/// Forwards the matched request to another host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpForward {
    /// Target host
    pub host: Option<String>,
    /// Target port; 80 when unset
    pub port: Option<u16>,
    /// Scheme to reach the target with
    pub scheme: Option<Scheme>,
    /// Delay before forwarding
    pub delay: Option<Delay>,
}

/// Injects a low-level error instead of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpError {
    /// Delay before the error is injected
    pub delay: Option<Delay>,
    /// Close the connection without responding
    pub drop_connection: Option<bool>,
    /// Raw bytes to write before closing, if any
    pub response_bytes: Option<Vec<u8>>,
}

/// Delegates response or forward construction to a named callback class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpClassCallback {
    /// Fully qualified name of the callback implementation
    pub callback_class: String,
}

// ============================================================================
// Expectation
// ============================================================================

/// The action taken when an expectation matches.
///
/// Exactly one action is set, by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Serve a static response
    Respond(HttpResponse),
    /// Generate a response by evaluating a template
    RespondTemplate(Template),
    /// Delegate response construction to a callback class
    RespondCallback(HttpClassCallback),
    /// Forward the request unchanged
    Forward(HttpForward),
    /// Generate the forwarded request by evaluating a template
    ForwardTemplate(Template),
    /// Delegate forward construction to a callback class
    ForwardCallback(HttpClassCallback),
    /// Inject a connection-level error
    Error(HttpError),
}

impl Action {
    /// Canonical wire key of this action.
    #[must_use]
    pub const fn canonical_key(&self) -> &'static str {
        match self {
            Self::Respond(_) => "httpResponse",
            Self::RespondTemplate(_) => "httpResponseTemplate",
            Self::RespondCallback(_) => "httpResponseClassCallback",
            Self::Forward(_) => "httpForward",
            Self::ForwardTemplate(_) => "httpForwardTemplate",
            Self::ForwardCallback(_) => "httpForwardClassCallback",
            Self::Error(_) => "httpError",
        }
    }
}

/// A stored rule pairing a request matcher with an action, plus
/// match-count and expiry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    /// Unique id; generated when not supplied by the caller
    pub id: String,
    /// Higher priority wins; ties break on registration order
    pub priority: i64,
    /// Which requests this expectation applies to
    pub request: RequestDefinition,
    /// Remaining-match counter
    pub times: Times,
    /// Wall-clock expiry policy
    pub time_to_live: TimeToLive,
    /// What to do on a match
    pub action: Action,
}

impl Expectation {
    /// Creates an expectation matching `request` and serving `action`,
    /// with a generated id, priority 0, and unlimited times and ttl.
    #[must_use]
    pub fn new(request: impl Into<RequestDefinition>, action: Action) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            priority: 0,
            request: request.into(),
            times: Times::unlimited(),
            time_to_live: TimeToLive::unlimited(),
            action,
        }
    }

    /// Shorthand for a static-response expectation.
    #[must_use]
    pub fn respond(request: impl Into<RequestDefinition>, response: HttpResponse) -> Self {
        Self::new(request, Action::Respond(response))
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the remaining-match counter.
    #[must_use]
    pub const fn with_times(mut self, times: Times) -> Self {
        self.times = times;
        self
    }

    /// Sets the expiry policy.
    #[must_use]
    pub const fn with_time_to_live(mut self, time_to_live: TimeToLive) -> Self {
        self.time_to_live = time_to_live;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder_collects_multi_values() {
        let request = HttpRequest::new()
            .with_method("GET")
            .with_path("/widgets")
            .with_query_string_parameter("q", "1")
            .with_query_string_parameter("q", "2")
            .with_cookie("session", "abc");
        assert_eq!(
            request.query_string_parameters.values("q"),
            Some(&["1".to_string(), "2".to_string()][..])
        );
        assert_eq!(request.cookies.value("session"), Some("abc"));
    }

    #[test]
    fn test_expectation_defaults() {
        let expectation = Expectation::respond(HttpRequest::new(), HttpResponse::new());
        assert!(!expectation.id.is_empty());
        assert_eq!(expectation.priority, 0);
        assert_eq!(expectation.times, Times::unlimited());
        assert_eq!(expectation.time_to_live, TimeToLive::unlimited());
    }

    #[test]
    fn test_action_canonical_keys() {
        assert_eq!(
            Action::Respond(HttpResponse::new()).canonical_key(),
            "httpResponse"
        );
        assert_eq!(
            Action::Error(HttpError::default()).canonical_key(),
            "httpError"
        );
    }

    #[test]
    fn test_default_request_definition_is_match_all() {
        let definition = RequestDefinition::default();
        assert_eq!(definition.as_request(), Some(&HttpRequest::new()));
    }
}
