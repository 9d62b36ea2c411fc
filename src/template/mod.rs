//! Response/forward templates and the evaluation boundary.
//!
//! A [`Template`] is the action payload: a dialect tag, source text, and
//! an optional delay. The script engines themselves live outside this
//! core; [`TemplateEvaluator`] is the seam they plug into, and
//! [`CompiledTemplateCache`] keys their compiled form by source text so
//! repeated matches do not recompile.

pub mod context;

pub use context::TemplateContext;

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::TemplateError;
use crate::model::time::Delay;

// ============================================================================
// Template
// ============================================================================

/// Supported template dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateLanguage {
    /// Logic-less mustache templates
    Mustache,
    /// Velocity templates
    Velocity,
    /// JavaScript templates
    JavaScript,
}

impl TemplateLanguage {
    /// Wire name of the dialect.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mustache => "MUSTACHE",
            Self::Velocity => "VELOCITY",
            Self::JavaScript => "JAVASCRIPT",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "MUSTACHE" => Some(Self::Mustache),
            "VELOCITY" => Some(Self::Velocity),
            "JAVASCRIPT" => Some(Self::JavaScript),
            _ => None,
        }
    }
}

/// A response or forward template: dialect, source, optional delay.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Dialect the source is written in
    pub language: TemplateLanguage,
    /// Template source text
    pub source: String,
    /// Delay applied before the generated message is used
    pub delay: Option<Delay>,
}

impl Template {
    /// Creates a template with no delay.
    #[must_use]
    pub fn new(language: TemplateLanguage, source: impl Into<String>) -> Self {
        Self {
            language,
            source: source.into(),
            delay: None,
        }
    }

    /// Sets the pre-use delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = Some(delay);
        self
    }
}

// ============================================================================
// Evaluation Boundary
// ============================================================================

/// The seam an embedded script engine plugs into.
///
/// `compile` runs once per distinct source text; `evaluate` receives the
/// flattened [`TemplateContext`] and returns the generated message as a
/// JSON value, to be parsed back through the canonical layer.
pub trait TemplateEvaluator: Send + Sync {
    /// The engine's compiled template form.
    type Compiled: Send + Sync;

    /// Compiles template source. Errors are engine-specific text.
    ///
    /// # Errors
    ///
    /// Returns the engine's compile failure description.
    fn compile(&self, language: TemplateLanguage, source: &str) -> Result<Self::Compiled, String>;

    /// Evaluates a compiled template against a context.
    ///
    /// # Errors
    ///
    /// Returns the engine's evaluation failure description.
    fn evaluate(
        &self,
        compiled: &Self::Compiled,
        context: &TemplateContext,
    ) -> Result<Value, String>;
}

/// Caches compiled templates keyed by source text.
///
/// Safe for concurrent use; each key compiles at most once per cache
/// unless eviction races, which is harmless (compilation is pure).
pub struct CompiledTemplateCache<E: TemplateEvaluator> {
    evaluator: E,
    compiled: DashMap<String, Arc<E::Compiled>>,
}

impl<E: TemplateEvaluator> CompiledTemplateCache<E> {
    /// Creates an empty cache around an evaluator.
    #[must_use]
    pub fn new(evaluator: E) -> Self {
        Self {
            evaluator,
            compiled: DashMap::new(),
        }
    }

    /// Number of distinct compiled sources held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// Returns `true` when nothing has been compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Evaluates `template` for `expectation_id` against `context`,
    /// compiling and caching on first use of the source text.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Evaluation`] tagged with the expectation
    /// id and dialect when the engine fails to compile or evaluate. The
    /// failing expectation stays registered; the error is per-request.
    pub fn evaluate(
        &self,
        expectation_id: &str,
        template: &Template,
        context: &TemplateContext,
    ) -> Result<Value, TemplateError> {
        let compiled = match self.compiled.get(&template.source) {
            Some(entry) => Arc::clone(&entry),
            None => {
                debug!(
                    expectation_id,
                    language = template.language.as_str(),
                    "compiling template"
                );
                let fresh = self
                    .evaluator
                    .compile(template.language, &template.source)
                    .map_err(|message| TemplateError::Evaluation {
                        expectation_id: expectation_id.to_string(),
                        language: template.language.as_str().to_string(),
                        message,
                    })?;
                let fresh = Arc::new(fresh);
                self.compiled
                    .insert(template.source.clone(), Arc::clone(&fresh));
                fresh
            }
        };
        self.evaluator
            .evaluate(&compiled, context)
            .map_err(|message| TemplateError::Evaluation {
                expectation_id: expectation_id.to_string(),
                language: template.language.as_str().to_string(),
                message,
            })
    }
}
