//! Dynamic response flow: match an expectation carrying a template
//! action, build the evaluation context, run a toy evaluator, and parse
//! the generated message back through the canonical layer.

use mockbird::canonical::response_from_canonical;
use mockbird::model::{Action, Body};
use mockbird::template::{
    CompiledTemplateCache, Template, TemplateContext, TemplateEvaluator, TemplateLanguage,
};
use mockbird::{ExpectationStore, Expectation, HttpRequest};

use serde_json::{Value, json};

/// Minimal evaluator: substitutes `{{method}}`, `{{path}}`, and
/// `{{body}}` into the source and wraps the result as a response
/// document.
struct SubstitutingEvaluator;

impl TemplateEvaluator for SubstitutingEvaluator {
    type Compiled = String;

    fn compile(&self, _language: TemplateLanguage, source: &str) -> Result<String, String> {
        Ok(source.to_string())
    }

    fn evaluate(&self, compiled: &String, context: &TemplateContext) -> Result<Value, String> {
        let rendered = compiled
            .replace("{{method}}", &context.method)
            .replace("{{path}}", &context.path)
            .replace("{{body}}", &context.body);
        serde_json::from_str(&rendered).map_err(|e| e.to_string())
    }
}

/// The full pipeline: store match, context projection, evaluation, and
/// canonical re-parse of the generated response.
#[test]
fn template_action_produces_a_response() {
    let store = ExpectationStore::new();
    let template = Template::new(
        TemplateLanguage::Mustache,
        r#"{ "statusCode": 200, "body": "{{method}} {{path}}" }"#,
    );
    store.register(Expectation::new(
        HttpRequest::new().with_path("/echo"),
        Action::RespondTemplate(template),
    ));

    let observed = HttpRequest::new().with_method("POST").with_path("/echo");
    let matched = store.first_match(&observed).expect("template rule matches");
    let Action::RespondTemplate(template) = &matched.action else {
        panic!("expected a template action");
    };

    let cache = CompiledTemplateCache::new(SubstitutingEvaluator);
    let context = TemplateContext::from_request(Some(&observed));
    let generated = cache.evaluate(&matched.id, template, &context).unwrap();

    let response = response_from_canonical(&generated).unwrap();
    assert_eq!(response.status_code, Some(200));
    assert_eq!(response.body, Some(Body::string("POST /echo")));
}

/// The context projects multi-valued query parameters as ordered lists
/// and cookies as scalars.
#[test]
fn context_projection_shapes() {
    let request = HttpRequest::new()
        .with_query_string_parameter("q", "1")
        .with_query_string_parameter("q", "2")
        .with_cookie("session", "abc");
    let context = TemplateContext::from_request(Some(&request));

    assert_eq!(
        context.query_string_parameters.values("q"),
        Some(&["1".to_string(), "2".to_string()][..])
    );
    assert_eq!(context.cookies.value("session"), Some("abc"));
}

/// An evaluator failure surfaces as a template error naming the
/// expectation and dialect; the expectation stays registered.
#[test]
fn evaluation_failure_is_per_request() {
    let store = ExpectationStore::new();
    store.register(
        Expectation::new(
            HttpRequest::new().with_path("/broken"),
            Action::RespondTemplate(Template::new(TemplateLanguage::JavaScript, "not json")),
        )
        .with_id("broken-rule"),
    );

    let observed = HttpRequest::new().with_path("/broken");
    let matched = store.first_match(&observed).unwrap();
    let Action::RespondTemplate(template) = &matched.action else {
        panic!("expected a template action");
    };

    let cache = CompiledTemplateCache::new(SubstitutingEvaluator);
    let context = TemplateContext::from_request(Some(&observed));
    let err = cache.evaluate(&matched.id, template, &context).unwrap_err();
    assert!(err.to_string().contains("broken-rule"), "got: {err}");
    assert!(err.to_string().contains("JAVASCRIPT"), "got: {err}");

    // The failing rule still matches the next request.
    assert!(store.first_match(&observed).is_some());
}

/// The context body is the canonical text of whatever body variant the
/// request carried.
#[test]
fn context_body_is_canonical_text() {
    let request =
        HttpRequest::new().with_body(Body::json(json!({ "widget": { "size": 3 } })));
    let context = TemplateContext::from_request(Some(&request));
    assert_eq!(context.body, r#"{"widget":{"size":3}}"#);
}
