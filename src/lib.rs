//! `mockbird` - Expectation core for an HTTP mocking server
//!
//! This library provides the expectation-definition and dynamic-response
//! core of an HTTP mock: schema-gated intake of expectation JSON, the
//! canonical wire form, prioritized expectation lifecycle, template
//! contexts for script-generated responses, and traffic verification.

pub mod canonical;
pub mod error;
pub mod lifecycle;
pub mod matching;
pub mod model;
pub mod schema;
pub mod template;
pub mod verify;

pub use error::{MockbirdError, Result};
pub use lifecycle::ExpectationStore;
pub use model::{Expectation, HttpRequest, HttpResponse};
pub use schema::SchemaRegistry;
