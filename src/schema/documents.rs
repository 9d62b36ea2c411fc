//! Embedded JSON Schema fragment documents.
//!
//! One draft-07 document per fragment name, cross-referencing siblings
//! by absolute `$id` URI. The registry resolves these references
//! in-memory; nothing is fetched.

use serde_json::{Value, json};

/// Base URI under which every fragment is addressable.
pub const SCHEMA_BASE: &str = "https://mockbird.dev/schema/";

/// Absolute `$id` URI of a named fragment.
#[must_use]
pub fn uri(name: &str) -> String {
    format!("{SCHEMA_BASE}{name}")
}

fn reference(name: &str) -> Value {
    json!({ "$ref": uri(name) })
}

fn envelope(name: &str, schema: Value) -> Value {
    let mut document = json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "$id": uri(name),
        "title": name,
    });
    if let (Value::Object(document), Value::Object(schema)) = (&mut document, schema) {
        document.extend(schema);
    }
    document
}

const BODY_TYPES: [&str; 10] = [
    "STRING",
    "JSON",
    "JSON_SCHEMA",
    "JSON_PATH",
    "XML",
    "XML_SCHEMA",
    "XPATH",
    "REGEX",
    "BINARY",
    "PARAMETERS",
];

const TIME_UNITS: [&str; 7] = [
    "NANOSECONDS",
    "MICROSECONDS",
    "MILLISECONDS",
    "SECONDS",
    "MINUTES",
    "HOURS",
    "DAYS",
];

/// Returns the document for a named fragment.
///
/// # Panics
///
/// Panics if `name` is not a known fragment; fragment sets are fixed at
/// compile time, so an unknown name is a programmer error.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn document(name: &str) -> Value {
    match name {
        "keyToMultiValue" => envelope(name, json!({
            "type": "object",
            "additionalProperties": {
                "type": "array",
                "items": { "type": "string" }
            }
        })),
        "keyToValue" => envelope(name, json!({
            "type": "object",
            "additionalProperties": { "type": "string" }
        })),
        "socketAddress" => envelope(name, json!({
            "type": "object",
            "properties": {
                "host": { "type": "string" },
                "port": { "type": "integer", "minimum": 0, "maximum": 65535 },
                "scheme": { "enum": ["HTTP", "HTTPS"] }
            }
        })),
        "body" => envelope(name, json!({
            "oneOf": [
                { "type": "string" },
                { "type": "array" },
                {
                    "type": "object",
                    "properties": {
                        "type": { "enum": BODY_TYPES },
                        "not": { "type": "boolean" },
                        "contentType": { "type": "string" },
                        "string": { "type": "string" },
                        "subString": { "type": "boolean" },
                        "json": {},
                        "matchType": { "enum": ["STRICT", "ONLY_MATCHING_FIELDS"] },
                        "jsonSchema": {},
                        "jsonPath": { "type": "string" },
                        "xml": { "type": "string" },
                        "rawBytes": { "type": "string" },
                        "xmlSchema": { "type": "string" },
                        "xpath": { "type": "string" },
                        "regex": { "type": "string" },
                        "base64Bytes": { "type": "string" },
                        "parameters": reference("keyToMultiValue")
                    }
                }
            ]
        })),
        "bodyWithContentType" => envelope(name, json!({
            "oneOf": [
                { "type": "string" },
                { "type": "array" },
                {
                    "type": "object",
                    "properties": {
                        "type": { "enum": ["STRING", "JSON", "XML", "BINARY", "PARAMETERS"] },
                        "not": { "type": "boolean" },
                        "contentType": { "type": "string" },
                        "string": { "type": "string" },
                        "json": {},
                        "xml": { "type": "string" },
                        "rawBytes": { "type": "string" },
                        "base64Bytes": { "type": "string" },
                        "parameters": reference("keyToMultiValue")
                    }
                }
            ]
        })),
        "httpRequest" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "method": { "type": "string" },
                "path": { "type": "string" },
                "pathParameters": reference("keyToMultiValue"),
                "queryStringParameters": reference("keyToMultiValue"),
                "headers": reference("keyToMultiValue"),
                "cookies": reference("keyToValue"),
                "body": reference("body"),
                "secure": { "type": "boolean" },
                "clientCertificateChain": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {
                            "subjectDistinguishedName": { "type": "string" },
                            "issuerDistinguishedName": { "type": "string" },
                            "serialNumber": { "type": "string" },
                            "certificate": { "type": "string" }
                        }
                    }
                },
                "localAddress": { "type": "string" },
                "remoteAddress": { "type": "string" },
                "keepAlive": { "type": "boolean" },
                "not": { "type": "boolean" }
            }
        })),
        "openAPIDefinition" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["specUrlOrPayload"],
            "properties": {
                "specUrlOrPayload": { "type": "string" },
                "operationId": { "type": "string" }
            }
        })),
        "requestDefinition" => envelope(name, json!({
            "oneOf": [
                reference("httpRequest"),
                reference("openAPIDefinition")
            ]
        })),
        "times" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "remainingTimes": { "type": "integer", "minimum": 0 },
                "unlimited": { "type": "boolean" }
            }
        })),
        "timeToLive" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "timeUnit": { "enum": TIME_UNITS },
                "timeToLive": { "type": "integer", "minimum": 0 },
                "endDate": { "type": "integer" },
                "unlimited": { "type": "boolean" }
            }
        })),
        "delay" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["timeUnit", "value"],
            "properties": {
                "timeUnit": { "enum": TIME_UNITS },
                "value": { "type": "integer", "minimum": 0 }
            }
        })),
        "httpResponse" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "statusCode": { "type": "integer", "minimum": 100, "maximum": 599 },
                "reasonPhrase": { "type": "string" },
                "headers": reference("keyToMultiValue"),
                "cookies": reference("keyToValue"),
                "body": reference("bodyWithContentType"),
                "delay": reference("delay")
            }
        })),
        "httpTemplate" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["templateType", "template"],
            "properties": {
                "templateType": { "enum": ["MUSTACHE", "VELOCITY", "JAVASCRIPT"] },
                "template": { "type": "string" },
                "delay": reference("delay")
            }
        })),
        "httpForward" => envelope(name, json!({
            "allOf": [reference("socketAddress")],
            "properties": {
                "host": true,
                "port": true,
                "scheme": true,
                "delay": reference("delay")
            },
            "additionalProperties": false
        })),
        "httpError" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "delay": reference("delay"),
                "dropConnection": { "type": "boolean" },
                "responseBytes": { "type": "string" }
            }
        })),
        "httpClassCallback" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["callbackClass"],
            "properties": {
                "callbackClass": { "type": "string" }
            }
        })),
        "expectationId" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["id"],
            "properties": {
                "id": { "type": "string" }
            }
        })),
        "expectation" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "id": { "type": "string" },
                "priority": { "type": "integer" },
                "httpRequest": reference("httpRequest"),
                "openAPIDefinition": reference("openAPIDefinition"),
                "times": reference("times"),
                "timeToLive": reference("timeToLive"),
                "httpResponse": reference("httpResponse"),
                "httpResponseTemplate": reference("httpTemplate"),
                "httpResponseClassCallback": reference("httpClassCallback"),
                "httpForward": reference("httpForward"),
                "httpForwardTemplate": reference("httpTemplate"),
                "httpForwardClassCallback": reference("httpClassCallback"),
                "httpError": reference("httpError")
            },
            "oneOf": [
                { "required": ["httpResponse"] },
                { "required": ["httpResponseTemplate"] },
                { "required": ["httpResponseClassCallback"] },
                { "required": ["httpForward"] },
                { "required": ["httpForwardTemplate"] },
                { "required": ["httpForwardClassCallback"] },
                { "required": ["httpError"] }
            ],
            "not": { "required": ["httpRequest", "openAPIDefinition"] }
        })),
        "verificationTimes" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "atLeast": { "type": "integer", "minimum": 0 },
                "atMost": { "type": "integer", "minimum": 0 }
            }
        })),
        "verification" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "httpRequest": reference("requestDefinition"),
                "expectationId": reference("expectationId"),
                "times": reference("verificationTimes")
            }
        })),
        "verificationSequence" => envelope(name, json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "httpRequests": {
                    "type": "array",
                    "items": reference("requestDefinition")
                },
                "expectationIds": {
                    "type": "array",
                    "items": reference("expectationId")
                }
            }
        })),
        other => unreachable!("unknown schema fragment '{other}'"),
    }
}
