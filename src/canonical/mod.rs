//! Canonical DTO layer: the single wire representation of the domain.
//!
//! Canonical JSON is order- and omission-normalized: unset or empty
//! fields are omitted (part of the wire contract, fixtures and diffs
//! depend on it), header maps keep insertion order, and every other map
//! serializes in stable key-sorted order. For every object `d` built
//! through the public constructors, `from_canonical(to_canonical(d))`
//! is structurally equal to `d`.
//!
//! Untrusted input must pass the schema registry before it reaches the
//! `*_from_canonical` functions; the gate-and-parse entry points at the
//! bottom of this module wire the two together.

pub mod body;

pub use body::{body_from_canonical, body_to_canonical};

use chrono::TimeZone as _;
use serde_json::{Map, Value, json};

use crate::error::{CanonicalError, MockbirdError, ValidationError};
use crate::model::{
    Action, Cookies, Delay, Expectation, Headers, HttpClassCallback, HttpError, HttpForward,
    HttpRequest, HttpResponse, OpenApiDefinition, Parameters, RequestDefinition, Scheme,
    TimeToLive, TimeUnit, Times, X509Certificate,
};
use crate::template::{Template, TemplateLanguage};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

// ============================================================================
// Pretty Printing
// ============================================================================

/// Renders a canonical value with the golden-file convention: two-space
/// indent, `\n` newlines, no trailing newline.
#[must_use]
pub fn to_pretty_string(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// ============================================================================
// Collections
// ============================================================================

/// Serializes a parameter map in key-sorted order.
#[must_use]
pub fn parameters_to_canonical(parameters: &Parameters) -> Value {
    let mut object = Map::new();
    for (name, values) in parameters.iter() {
        object.insert(name.to_string(), json!(values));
    }
    Value::Object(object)
}

/// Deserializes a parameter map.
///
/// # Errors
///
/// [`CanonicalError::InvalidField`] when the value is not an object of
/// string arrays.
pub fn parameters_from_canonical(value: &Value, field: &str) -> Result<Parameters, CanonicalError> {
    let object = expect_object(value, field)?;
    let mut parameters = Parameters::new();
    for (name, values) in object {
        parameters.insert(name.clone(), string_list(values, field)?);
    }
    Ok(parameters)
}

fn headers_to_canonical(headers: &Headers) -> Value {
    // Insertion order survives: the map preserves it and so does the
    // serializer.
    let mut object = Map::new();
    for (name, values) in headers.iter() {
        object.insert(name.to_string(), json!(values));
    }
    Value::Object(object)
}

fn headers_from_canonical(value: &Value, field: &str) -> Result<Headers, CanonicalError> {
    let object = expect_object(value, field)?;
    let mut headers = Headers::new();
    for (name, values) in object {
        headers.insert(name.clone(), string_list(values, field)?);
    }
    Ok(headers)
}

fn cookies_to_canonical(cookies: &Cookies) -> Value {
    let mut object = Map::new();
    for (name, value) in cookies.iter() {
        object.insert(name.to_string(), json!(value));
    }
    Value::Object(object)
}

fn cookies_from_canonical(value: &Value, field: &str) -> Result<Cookies, CanonicalError> {
    let object = expect_object(value, field)?;
    let mut cookies = Cookies::new();
    for (name, value) in object {
        let value = value.as_str().ok_or_else(|| CanonicalError::InvalidField {
            field: field.to_string(),
            message: format!("cookie '{name}' must be a string"),
        })?;
        cookies.insert(name.clone(), value);
    }
    Ok(cookies)
}

fn string_list(value: &Value, field: &str) -> Result<Vec<String>, CanonicalError> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(ToString::to_string)
                        .ok_or_else(|| CanonicalError::InvalidField {
                            field: field.to_string(),
                            message: "values must be strings".to_string(),
                        })
                })
                .collect()
        })
        .ok_or_else(|| CanonicalError::InvalidField {
            field: field.to_string(),
            message: "expected an array of strings".to_string(),
        })?
}

fn expect_object<'a>(
    value: &'a Value,
    field: &str,
) -> Result<&'a Map<String, Value>, CanonicalError> {
    value.as_object().ok_or_else(|| CanonicalError::InvalidField {
        field: field.to_string(),
        message: "expected an object".to_string(),
    })
}

// ============================================================================
// Requests
// ============================================================================

/// Serializes a request (or concrete request matcher).
#[must_use]
pub fn request_to_canonical(request: &HttpRequest) -> Value {
    let mut object = Map::new();
    if !request.method.is_empty() {
        object.insert("method".to_string(), json!(request.method));
    }
    if !request.path.is_empty() {
        object.insert("path".to_string(), json!(request.path));
    }
    if !request.path_parameters.is_empty() {
        object.insert(
            "pathParameters".to_string(),
            parameters_to_canonical(&request.path_parameters),
        );
    }
    if !request.query_string_parameters.is_empty() {
        object.insert(
            "queryStringParameters".to_string(),
            parameters_to_canonical(&request.query_string_parameters),
        );
    }
    if !request.headers.is_empty() {
        object.insert("headers".to_string(), headers_to_canonical(&request.headers));
    }
    if !request.cookies.is_empty() {
        object.insert("cookies".to_string(), cookies_to_canonical(&request.cookies));
    }
    if let Some(keep_alive) = request.keep_alive {
        object.insert("keepAlive".to_string(), json!(keep_alive));
    }
    if let Some(secure) = request.secure {
        object.insert("secure".to_string(), json!(secure));
    }
    if !request.client_certificate_chain.is_empty() {
        object.insert(
            "clientCertificateChain".to_string(),
            Value::Array(
                request
                    .client_certificate_chain
                    .iter()
                    .map(certificate_to_canonical)
                    .collect(),
            ),
        );
    }
    if let Some(local_address) = &request.local_address {
        object.insert("localAddress".to_string(), json!(local_address));
    }
    if let Some(remote_address) = &request.remote_address {
        object.insert("remoteAddress".to_string(), json!(remote_address));
    }
    if let Some(request_body) = &request.body {
        object.insert("body".to_string(), body_to_canonical(request_body));
    }
    if request.not {
        object.insert("not".to_string(), json!(true));
    }
    Value::Object(object)
}

/// Deserializes a request (or concrete request matcher).
///
/// # Errors
///
/// Propagates [`CanonicalError`] for any field the canonical form
/// cannot represent; malformed documents should already have been
/// rejected by the schema gate.
pub fn request_from_canonical(value: &Value) -> Result<HttpRequest, CanonicalError> {
    let object = expect_object(value, "httpRequest")?;
    let mut request = HttpRequest::new();
    if let Some(method) = object.get("method").and_then(Value::as_str) {
        request.method = method.to_string();
    }
    if let Some(path) = object.get("path").and_then(Value::as_str) {
        request.path = path.to_string();
    }
    if let Some(value) = object.get("pathParameters") {
        request.path_parameters = parameters_from_canonical(value, "pathParameters")?;
    }
    if let Some(value) = object.get("queryStringParameters") {
        request.query_string_parameters =
            parameters_from_canonical(value, "queryStringParameters")?;
    }
    if let Some(value) = object.get("headers") {
        request.headers = headers_from_canonical(value, "headers")?;
    }
    if let Some(value) = object.get("cookies") {
        request.cookies = cookies_from_canonical(value, "cookies")?;
    }
    request.keep_alive = object.get("keepAlive").and_then(Value::as_bool);
    request.secure = object.get("secure").and_then(Value::as_bool);
    if let Some(chain) = object.get("clientCertificateChain").and_then(Value::as_array) {
        request.client_certificate_chain = chain
            .iter()
            .map(certificate_from_canonical)
            .collect::<Result<_, _>>()?;
    }
    request.local_address = object
        .get("localAddress")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    request.remote_address = object
        .get("remoteAddress")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    if let Some(value) = object.get("body") {
        request.body = Some(body_from_canonical(value)?);
    }
    request.not = object.get("not").and_then(Value::as_bool).unwrap_or(false);
    Ok(request)
}

fn certificate_to_canonical(certificate: &X509Certificate) -> Value {
    let mut object = Map::new();
    if !certificate.subject_distinguished_name.is_empty() {
        object.insert(
            "subjectDistinguishedName".to_string(),
            json!(certificate.subject_distinguished_name),
        );
    }
    if !certificate.issuer_distinguished_name.is_empty() {
        object.insert(
            "issuerDistinguishedName".to_string(),
            json!(certificate.issuer_distinguished_name),
        );
    }
    if !certificate.serial_number.is_empty() {
        object.insert("serialNumber".to_string(), json!(certificate.serial_number));
    }
    if !certificate.certificate_pem.is_empty() {
        object.insert("certificate".to_string(), json!(certificate.certificate_pem));
    }
    Value::Object(object)
}

fn certificate_from_canonical(value: &Value) -> Result<X509Certificate, CanonicalError> {
    let object = expect_object(value, "clientCertificateChain")?;
    let field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Ok(X509Certificate {
        subject_distinguished_name: field("subjectDistinguishedName"),
        issuer_distinguished_name: field("issuerDistinguishedName"),
        serial_number: field("serialNumber"),
        certificate_pem: field("certificate"),
    })
}

// ============================================================================
// Request Definitions
// ============================================================================

/// Canonical key and value for a request definition.
#[must_use]
pub fn definition_to_canonical(definition: &RequestDefinition) -> (&'static str, Value) {
    match definition {
        RequestDefinition::Request(request) => ("httpRequest", request_to_canonical(request)),
        RequestDefinition::OpenApi(open_api) => {
            let mut object = Map::new();
            object.insert(
                "specUrlOrPayload".to_string(),
                json!(open_api.spec_url_or_payload),
            );
            if let Some(operation_id) = &open_api.operation_id {
                object.insert("operationId".to_string(), json!(operation_id));
            }
            ("openAPIDefinition", Value::Object(object))
        }
    }
}

/// Deserializes a request definition from either wire shape.
///
/// An object carrying `specUrlOrPayload` is an OpenAPI definition;
/// anything else is a concrete request matcher.
///
/// # Errors
///
/// Propagates [`CanonicalError`] from the underlying request parse.
pub fn definition_from_canonical(value: &Value) -> Result<RequestDefinition, CanonicalError> {
    let object = expect_object(value, "requestDefinition")?;
    if let Some(spec) = object.get("specUrlOrPayload").and_then(Value::as_str) {
        return Ok(RequestDefinition::OpenApi(OpenApiDefinition {
            spec_url_or_payload: spec.to_string(),
            operation_id: object
                .get("operationId")
                .and_then(Value::as_str)
                .map(ToString::to_string),
        }));
    }
    Ok(RequestDefinition::Request(request_from_canonical(value)?))
}

// ============================================================================
// Responses
// ============================================================================

/// Serializes a response.
#[must_use]
pub fn response_to_canonical(response: &HttpResponse) -> Value {
    let mut object = Map::new();
    if let Some(status_code) = response.status_code {
        object.insert("statusCode".to_string(), json!(status_code));
    }
    if let Some(reason_phrase) = &response.reason_phrase {
        object.insert("reasonPhrase".to_string(), json!(reason_phrase));
    }
    if !response.headers.is_empty() {
        object.insert(
            "headers".to_string(),
            headers_to_canonical(&response.headers),
        );
    }
    if !response.cookies.is_empty() {
        object.insert(
            "cookies".to_string(),
            cookies_to_canonical(&response.cookies),
        );
    }
    if let Some(response_body) = &response.body {
        object.insert("body".to_string(), body_to_canonical(response_body));
    }
    if let Some(delay) = response.delay {
        object.insert("delay".to_string(), delay_to_canonical(delay));
    }
    Value::Object(object)
}

/// Deserializes a response.
///
/// # Errors
///
/// Propagates [`CanonicalError`] for unrepresentable fields.
pub fn response_from_canonical(value: &Value) -> Result<HttpResponse, CanonicalError> {
    let object = expect_object(value, "httpResponse")?;
    let mut response = HttpResponse::new();
    if let Some(status_code) = object.get("statusCode").and_then(Value::as_u64) {
        response.status_code =
            Some(
                u16::try_from(status_code).map_err(|_| CanonicalError::InvalidField {
                    field: "statusCode".to_string(),
                    message: format!("{status_code} is out of range"),
                })?,
            );
    }
    response.reason_phrase = object
        .get("reasonPhrase")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    if let Some(value) = object.get("headers") {
        response.headers = headers_from_canonical(value, "headers")?;
    }
    if let Some(value) = object.get("cookies") {
        response.cookies = cookies_from_canonical(value, "cookies")?;
    }
    if let Some(value) = object.get("body") {
        response.body = Some(body_from_canonical(value)?);
    }
    if let Some(value) = object.get("delay") {
        response.delay = Some(delay_from_canonical(value)?);
    }
    Ok(response)
}

// ============================================================================
// Times, TTL, Delay
// ============================================================================

fn times_to_canonical(times: Times) -> Option<Value> {
    match times {
        Times::Unlimited => None,
        Times::Exactly { remaining } => Some(json!({ "remainingTimes": remaining })),
    }
}

fn times_from_canonical(value: &Value) -> Result<Times, CanonicalError> {
    let object = expect_object(value, "times")?;
    if object.get("unlimited").and_then(Value::as_bool) == Some(true) {
        return Ok(Times::unlimited());
    }
    match object.get("remainingTimes").and_then(Value::as_u64) {
        Some(remaining) => Ok(Times::exactly(u32::try_from(remaining).map_err(|_| {
            CanonicalError::InvalidField {
                field: "times.remainingTimes".to_string(),
                message: format!("{remaining} is out of range"),
            }
        })?)),
        None => Ok(Times::unlimited()),
    }
}

fn ttl_to_canonical(time_to_live: TimeToLive) -> Option<Value> {
    match time_to_live {
        TimeToLive::Unlimited => None,
        TimeToLive::Limited {
            time_unit,
            ttl,
            end_date,
        } => {
            let mut object = Map::new();
            object.insert("timeUnit".to_string(), json!(time_unit.as_str()));
            object.insert("timeToLive".to_string(), json!(ttl));
            if let Some(end_date) = end_date {
                object.insert("endDate".to_string(), json!(end_date.timestamp_millis()));
            }
            Some(Value::Object(object))
        }
    }
}

fn ttl_from_canonical(value: &Value) -> Result<TimeToLive, CanonicalError> {
    let object = expect_object(value, "timeToLive")?;
    if object.get("unlimited").and_then(Value::as_bool) == Some(true) {
        return Ok(TimeToLive::unlimited());
    }
    let Some(time_unit) = object.get("timeUnit").and_then(Value::as_str) else {
        return Ok(TimeToLive::unlimited());
    };
    let time_unit = parse_time_unit(time_unit, "timeToLive.timeUnit")?;
    let ttl = object
        .get("timeToLive")
        .and_then(Value::as_i64)
        .unwrap_or_default();
    let end_date = object
        .get("endDate")
        .and_then(Value::as_i64)
        .and_then(|millis| chrono::Utc.timestamp_millis_opt(millis).single());
    Ok(TimeToLive::Limited {
        time_unit,
        ttl,
        end_date,
    })
}

fn delay_to_canonical(delay: Delay) -> Value {
    json!({
        "timeUnit": delay.time_unit.as_str(),
        "value": delay.value,
    })
}

fn delay_from_canonical(value: &Value) -> Result<Delay, CanonicalError> {
    let object = expect_object(value, "delay")?;
    let time_unit = object
        .get("timeUnit")
        .and_then(Value::as_str)
        .ok_or_else(|| CanonicalError::InvalidField {
            field: "delay.timeUnit".to_string(),
            message: "missing".to_string(),
        })?;
    Ok(Delay::new(
        parse_time_unit(time_unit, "delay.timeUnit")?,
        object.get("value").and_then(Value::as_i64).unwrap_or_default(),
    ))
}

fn parse_time_unit(name: &str, field: &str) -> Result<TimeUnit, CanonicalError> {
    TimeUnit::parse(name).ok_or_else(|| CanonicalError::InvalidField {
        field: field.to_string(),
        message: format!("unknown time unit '{name}'"),
    })
}

// ============================================================================
// Actions
// ============================================================================

fn template_to_canonical(template: &Template) -> Value {
    let mut object = Map::new();
    object.insert(
        "templateType".to_string(),
        json!(template.language.as_str()),
    );
    object.insert("template".to_string(), json!(template.source));
    if let Some(delay) = template.delay {
        object.insert("delay".to_string(), delay_to_canonical(delay));
    }
    Value::Object(object)
}

fn template_from_canonical(value: &Value, field: &str) -> Result<Template, CanonicalError> {
    let object = expect_object(value, field)?;
    let language = object
        .get("templateType")
        .and_then(Value::as_str)
        .and_then(TemplateLanguage::parse)
        .ok_or_else(|| CanonicalError::InvalidField {
            field: format!("{field}.templateType"),
            message: "missing or unknown template dialect".to_string(),
        })?;
    let source = object
        .get("template")
        .and_then(Value::as_str)
        .ok_or_else(|| CanonicalError::InvalidField {
            field: format!("{field}.template"),
            message: "missing template source".to_string(),
        })?;
    let mut template = Template::new(language, source);
    if let Some(value) = object.get("delay") {
        template = template.with_delay(delay_from_canonical(value)?);
    }
    Ok(template)
}

fn forward_to_canonical(forward: &HttpForward) -> Value {
    let mut object = Map::new();
    if let Some(host) = &forward.host {
        object.insert("host".to_string(), json!(host));
    }
    if let Some(port) = forward.port {
        object.insert("port".to_string(), json!(port));
    }
    if let Some(scheme) = forward.scheme {
        object.insert("scheme".to_string(), json!(scheme.as_str()));
    }
    if let Some(delay) = forward.delay {
        object.insert("delay".to_string(), delay_to_canonical(delay));
    }
    Value::Object(object)
}

fn forward_from_canonical(value: &Value) -> Result<HttpForward, CanonicalError> {
    let object = expect_object(value, "httpForward")?;
    let scheme = match object.get("scheme").and_then(Value::as_str) {
        None => None,
        Some(name) => Some(Scheme::parse(name).ok_or_else(|| CanonicalError::InvalidField {
            field: "httpForward.scheme".to_string(),
            message: format!("unknown scheme '{name}'"),
        })?),
    };
    let port = match object.get("port").and_then(Value::as_u64) {
        None => None,
        Some(port) => Some(u16::try_from(port).map_err(|_| CanonicalError::InvalidField {
            field: "httpForward.port".to_string(),
            message: format!("{port} is out of range"),
        })?),
    };
    let mut forward = HttpForward {
        host: object
            .get("host")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        port,
        scheme,
        delay: None,
    };
    if let Some(value) = object.get("delay") {
        forward.delay = Some(delay_from_canonical(value)?);
    }
    Ok(forward)
}

fn error_to_canonical(error: &HttpError) -> Value {
    let mut object = Map::new();
    if let Some(delay) = error.delay {
        object.insert("delay".to_string(), delay_to_canonical(delay));
    }
    if let Some(drop_connection) = error.drop_connection {
        object.insert("dropConnection".to_string(), json!(drop_connection));
    }
    if let Some(response_bytes) = &error.response_bytes {
        object.insert(
            "responseBytes".to_string(),
            json!(BASE64.encode(response_bytes)),
        );
    }
    Value::Object(object)
}

fn error_from_canonical(value: &Value) -> Result<HttpError, CanonicalError> {
    let object = expect_object(value, "httpError")?;
    let mut error = HttpError::default();
    if let Some(value) = object.get("delay") {
        error.delay = Some(delay_from_canonical(value)?);
    }
    error.drop_connection = object.get("dropConnection").and_then(Value::as_bool);
    if let Some(encoded) = object.get("responseBytes").and_then(Value::as_str) {
        error.response_bytes = Some(BASE64.decode(encoded).map_err(|decode_error| {
            CanonicalError::InvalidField {
                field: "httpError.responseBytes".to_string(),
                message: format!("invalid base64: {decode_error}"),
            }
        })?);
    }
    Ok(error)
}

fn callback_to_canonical(callback: &HttpClassCallback) -> Value {
    json!({ "callbackClass": callback.callback_class })
}

fn callback_from_canonical(value: &Value, field: &str) -> Result<HttpClassCallback, CanonicalError> {
    let object = expect_object(value, field)?;
    let callback_class = object
        .get("callbackClass")
        .and_then(Value::as_str)
        .ok_or_else(|| CanonicalError::InvalidField {
            field: format!("{field}.callbackClass"),
            message: "missing".to_string(),
        })?;
    Ok(HttpClassCallback {
        callback_class: callback_class.to_string(),
    })
}

fn action_to_canonical(action: &Action) -> (&'static str, Value) {
    let value = match action {
        Action::Respond(response) => response_to_canonical(response),
        Action::RespondTemplate(template) | Action::ForwardTemplate(template) => {
            template_to_canonical(template)
        }
        Action::RespondCallback(callback) | Action::ForwardCallback(callback) => {
            callback_to_canonical(callback)
        }
        Action::Forward(forward) => forward_to_canonical(forward),
        Action::Error(error) => error_to_canonical(error),
    };
    (action.canonical_key(), value)
}

const ACTION_KEYS: [&str; 7] = [
    "httpResponse",
    "httpResponseTemplate",
    "httpResponseClassCallback",
    "httpForward",
    "httpForwardTemplate",
    "httpForwardClassCallback",
    "httpError",
];

fn action_from_canonical(object: &Map<String, Value>) -> Result<Action, CanonicalError> {
    let mut found: Vec<&str> = ACTION_KEYS
        .iter()
        .copied()
        .filter(|key| object.contains_key(*key))
        .collect();
    let Some(key) = found.pop() else {
        return Err(CanonicalError::InvalidField {
            field: "expectation".to_string(),
            message: "no action set".to_string(),
        });
    };
    if !found.is_empty() {
        return Err(CanonicalError::InvalidField {
            field: "expectation".to_string(),
            message: format!("more than one action set: {found:?} and {key}"),
        });
    }
    let value = &object[key];
    Ok(match key {
        "httpResponse" => Action::Respond(response_from_canonical(value)?),
        "httpResponseTemplate" => Action::RespondTemplate(template_from_canonical(value, key)?),
        "httpResponseClassCallback" => {
            Action::RespondCallback(callback_from_canonical(value, key)?)
        }
        "httpForward" => Action::Forward(forward_from_canonical(value)?),
        "httpForwardTemplate" => Action::ForwardTemplate(template_from_canonical(value, key)?),
        "httpForwardClassCallback" => {
            Action::ForwardCallback(callback_from_canonical(value, key)?)
        }
        _ => Action::Error(error_from_canonical(value)?),
    })
}

// ============================================================================
// Expectations
// ============================================================================

/// Serializes an expectation.
#[must_use]
pub fn expectation_to_canonical(expectation: &Expectation) -> Value {
    let mut object = Map::new();
    object.insert("id".to_string(), json!(expectation.id));
    if expectation.priority != 0 {
        object.insert("priority".to_string(), json!(expectation.priority));
    }
    let (definition_key, definition_value) = definition_to_canonical(&expectation.request);
    // An all-defaults matcher serializes to an empty object; omit it.
    if definition_value
        .as_object()
        .is_none_or(|fields| !fields.is_empty())
    {
        object.insert(definition_key.to_string(), definition_value);
    }
    if let Some(times) = times_to_canonical(expectation.times) {
        object.insert("times".to_string(), times);
    }
    if let Some(time_to_live) = ttl_to_canonical(expectation.time_to_live) {
        object.insert("timeToLive".to_string(), time_to_live);
    }
    let (action_key, action_value) = action_to_canonical(&expectation.action);
    object.insert(action_key.to_string(), action_value);
    Value::Object(object)
}

/// Deserializes an expectation.
///
/// A missing `id` gets a generated one, so two parses of an id-less
/// document yield distinct expectations.
///
/// # Errors
///
/// Propagates [`CanonicalError`] for unknown body variants, unknown
/// action keys, or unrepresentable fields.
pub fn expectation_from_canonical(value: &Value) -> Result<Expectation, CanonicalError> {
    let object = expect_object(value, "expectation")?;
    let request = match (object.get("httpRequest"), object.get("openAPIDefinition")) {
        (Some(_), Some(_)) => {
            return Err(CanonicalError::InvalidField {
                field: "expectation".to_string(),
                message: "both httpRequest and openAPIDefinition set".to_string(),
            });
        }
        (Some(value), None) | (None, Some(value)) => definition_from_canonical(value)?,
        (None, None) => RequestDefinition::default(),
    };
    let action = action_from_canonical(object)?;
    let mut expectation = Expectation::new(request, action);
    if let Some(id) = object.get("id").and_then(Value::as_str) {
        expectation.id = id.to_string();
    }
    expectation.priority = object
        .get("priority")
        .and_then(Value::as_i64)
        .unwrap_or_default();
    if let Some(value) = object.get("times") {
        expectation.times = times_from_canonical(value)?;
    }
    if let Some(value) = object.get("timeToLive") {
        expectation.time_to_live = ttl_from_canonical(value)?;
    }
    Ok(expectation)
}

/// Serializes a list of expectations as a canonical JSON array.
#[must_use]
pub fn expectations_to_canonical(expectations: &[Expectation]) -> Value {
    Value::Array(expectations.iter().map(expectation_to_canonical).collect())
}

/// Deserializes a collection of expectations from either a bare array
/// or a single top-level object.
///
/// # Errors
///
/// Propagates [`CanonicalError`] from any element.
pub fn expectations_from_canonical(value: &Value) -> Result<Vec<Expectation>, CanonicalError> {
    match value {
        Value::Array(items) => items.iter().map(expectation_from_canonical).collect(),
        other => Ok(vec![expectation_from_canonical(other)?]),
    }
}

// ============================================================================
// Gate-And-Parse Entry Points
// ============================================================================

/// Parses untrusted expectation JSON: schema gate first, then the
/// canonical layer. Accepts a single object or an array of them.
///
/// # Errors
///
/// [`ValidationError`] when the text is malformed or schema-invalid
/// (each array element is validated individually); [`CanonicalError`]
/// only for documents the schema cannot distinguish.
pub fn expectations_from_json(
    registry: &crate::schema::SchemaRegistry,
    json_text: &str,
) -> Result<Vec<Expectation>, MockbirdError> {
    let value: Value =
        serde_json::from_str(json_text).map_err(|error| ValidationError::MalformedJson {
            message: error.to_string(),
        })?;
    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    items
        .iter()
        .map(|item| {
            registry.validate_value(item)?;
            Ok(expectation_from_canonical(item)?)
        })
        .collect()
}

/// Round-trip-checked serialization: canonicalizes, re-parses, and
/// compares. A divergence is a defect in this layer and surfaces as
/// [`CanonicalError::RoundTripMismatch`], logged loudly.
///
/// # Errors
///
/// [`CanonicalError::RoundTripMismatch`] on divergence.
pub fn expectation_to_canonical_checked(
    expectation: &Expectation,
) -> Result<Value, CanonicalError> {
    let canonical = expectation_to_canonical(expectation);
    let reparsed = expectation_from_canonical(&canonical)?;
    if reparsed == *expectation {
        Ok(canonical)
    } else {
        Err(CanonicalError::round_trip_mismatch(format!(
            "expectation {} did not survive canonicalization",
            expectation.id
        )))
    }
}
