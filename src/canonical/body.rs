//! Canonical wire form of the body variant union.
//!
//! Each variant emits a `type` discriminator plus variant-specific
//! keys. One deliberate shorthand exists on both sides: a text body
//! with every option at its default serializes as a bare JSON string,
//! and a bare object or array with no `type` key deserializes as a
//! default-optioned JSON body.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value, json};

use crate::error::CanonicalError;
use crate::model::{Body, JsonMatchType, Parameters};

use super::{parameters_to_canonical, parameters_from_canonical};

/// Serializes a body to its canonical wire form.
#[must_use]
pub fn body_to_canonical(body: &Body) -> Value {
    if body.is_plain_string() {
        if let Body::String { value, .. } = body {
            return Value::String(value.clone());
        }
    }

    let mut object = Map::new();
    object.insert("type".to_string(), json!(body.discriminator()));
    if body.is_not() {
        object.insert("not".to_string(), json!(true));
    }
    match body {
        Body::String {
            value,
            content_type,
            sub_string,
            ..
        } => {
            object.insert("string".to_string(), json!(value));
            if *sub_string {
                object.insert("subString".to_string(), json!(true));
            }
            insert_content_type(&mut object, content_type);
        }
        Body::Json {
            value,
            content_type,
            match_type,
            ..
        } => {
            object.insert("json".to_string(), value.clone());
            if let Some(match_type) = match_type {
                object.insert("matchType".to_string(), json!(match_type.as_str()));
            }
            insert_content_type(&mut object, content_type);
        }
        Body::JsonSchema { schema, .. } => {
            object.insert("jsonSchema".to_string(), schema.clone());
        }
        Body::JsonPath { path, .. } => {
            object.insert("jsonPath".to_string(), json!(path));
        }
        Body::Xml {
            value,
            raw_bytes,
            content_type,
            ..
        } => {
            object.insert("xml".to_string(), json!(value));
            if let Some(raw_bytes) = raw_bytes {
                object.insert("rawBytes".to_string(), json!(BASE64.encode(raw_bytes)));
            }
            insert_content_type(&mut object, content_type);
        }
        Body::XmlSchema { schema, .. } => {
            object.insert("xmlSchema".to_string(), json!(schema));
        }
        Body::XPath { path, .. } => {
            object.insert("xpath".to_string(), json!(path));
        }
        Body::Regex { pattern, .. } => {
            object.insert("regex".to_string(), json!(pattern));
        }
        Body::Binary {
            bytes,
            content_type,
            ..
        } => {
            object.insert("base64Bytes".to_string(), json!(BASE64.encode(bytes)));
            insert_content_type(&mut object, content_type);
        }
        Body::Parameters { parameters, .. } => {
            object.insert(
                "parameters".to_string(),
                parameters_to_canonical(parameters),
            );
        }
    }
    Value::Object(object)
}

fn insert_content_type(object: &mut Map<String, Value>, content_type: &Option<String>) {
    if let Some(content_type) = content_type {
        object.insert("contentType".to_string(), json!(content_type));
    }
}

/// Deserializes a body from its canonical wire form.
///
/// # Errors
///
/// [`CanonicalError::UnknownBodyVariant`] when the `type` discriminator
/// is not recognized; [`CanonicalError::InvalidField`] when a
/// variant-specific key is missing or malformed.
pub fn body_from_canonical(value: &Value) -> Result<Body, CanonicalError> {
    match value {
        // Bare string shorthand: a default-optioned text body.
        Value::String(text) => Ok(Body::string(text.clone())),
        // Bare document shorthand: a default-optioned JSON body.
        Value::Array(_) => Ok(Body::json(value.clone())),
        Value::Object(object) => {
            let Some(discriminator) = object.get("type") else {
                return Ok(Body::json(value.clone()));
            };
            let Some(discriminator) = discriminator.as_str() else {
                return Err(CanonicalError::InvalidField {
                    field: "body.type".to_string(),
                    message: "discriminator must be a string".to_string(),
                });
            };
            body_from_object(discriminator, object)
        }
        other => Err(CanonicalError::InvalidField {
            field: "body".to_string(),
            message: format!("expected string, object, or array, got {other}"),
        }),
    }
}

fn body_from_object(
    discriminator: &str,
    object: &Map<String, Value>,
) -> Result<Body, CanonicalError> {
    let not = object
        .get("not")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let content_type = object
        .get("contentType")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    match discriminator {
        "STRING" => Ok(Body::String {
            value: required_string(object, "string")?,
            content_type,
            sub_string: object
                .get("subString")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            not,
        }),
        "JSON" => {
            let match_type = match object.get("matchType").and_then(Value::as_str) {
                None => None,
                Some(name) => Some(JsonMatchType::parse(name).ok_or_else(|| {
                    CanonicalError::InvalidField {
                        field: "body.matchType".to_string(),
                        message: format!("unknown match type '{name}'"),
                    }
                })?),
            };
            Ok(Body::Json {
                value: required_value(object, "json")?,
                content_type,
                match_type,
                not,
            })
        }
        "JSON_SCHEMA" => Ok(Body::JsonSchema {
            schema: required_value(object, "jsonSchema")?,
            not,
        }),
        "JSON_PATH" => Ok(Body::JsonPath {
            path: required_string(object, "jsonPath")?,
            not,
        }),
        "XML" => Ok(Body::Xml {
            value: required_string(object, "xml")?,
            raw_bytes: object
                .get("rawBytes")
                .and_then(Value::as_str)
                .map(|encoded| decode_base64(encoded, "body.rawBytes"))
                .transpose()?,
            content_type,
            not,
        }),
        "XML_SCHEMA" => Ok(Body::XmlSchema {
            schema: required_string(object, "xmlSchema")?,
            not,
        }),
        "XPATH" => Ok(Body::XPath {
            path: required_string(object, "xpath")?,
            not,
        }),
        "REGEX" => Ok(Body::Regex {
            pattern: required_string(object, "regex")?,
            not,
        }),
        "BINARY" => Ok(Body::Binary {
            bytes: decode_base64(&required_string(object, "base64Bytes")?, "body.base64Bytes")?,
            content_type,
            not,
        }),
        "PARAMETERS" => {
            let parameters: Parameters = match object.get("parameters") {
                Some(value) => parameters_from_canonical(value, "body.parameters")?,
                None => Parameters::new(),
            };
            Ok(Body::Parameters { parameters, not })
        }
        other => Err(CanonicalError::UnknownBodyVariant {
            variant: other.to_string(),
        }),
    }
}

fn required_string(object: &Map<String, Value>, key: &str) -> Result<String, CanonicalError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| CanonicalError::InvalidField {
            field: format!("body.{key}"),
            message: "missing or not a string".to_string(),
        })
}

fn required_value(object: &Map<String, Value>, key: &str) -> Result<Value, CanonicalError> {
    object
        .get(key)
        .cloned()
        .ok_or_else(|| CanonicalError::InvalidField {
            field: format!("body.{key}"),
            message: "missing".to_string(),
        })
}

fn decode_base64(encoded: &str, field: &str) -> Result<Vec<u8>, CanonicalError> {
    BASE64
        .decode(encoded)
        .map_err(|error| CanonicalError::InvalidField {
            field: field.to_string(),
            message: format!("invalid base64: {error}"),
        })
}
