use std::sync::Arc;

use regex::Regex;

use crate::convert::TypeConverter;
use crate::handler::ActionBean;

use super::filter::EventFilter;

/// Post-conversion predicate evaluated against the fully-bound handler.
/// Runs last in the binding sequence so it can reference every property
/// that was bound in the same request.
pub type ExpressionFn = Arc<dyn Fn(&dyn ActionBean) -> bool + Send + Sync>;

/// When a custom validation method runs relative to already-present errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    /// Run even when earlier stages already produced errors.
    Always,
    /// Run when the global always-invoke flag is set, or when there are no
    /// errors yet.
    Default,
}

/// Validation constraints for one bindable property.
///
/// Built fluently at registration time, e.g.
/// `ValidationMetadata::new().required().max_length(40).on(["save"])`.
#[derive(Clone, Default)]
pub struct ValidationMetadata {
    required: bool,
    on: EventFilter,
    ignore: bool,
    no_trim: bool,
    encrypted: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    mask: Option<Regex>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    expression: Option<ExpressionFn>,
    converter: Option<Arc<dyn TypeConverter>>,
    label: Option<String>,
}

impl ValidationMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The field must be submitted with a non-empty value.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict which events the required check (and only that check)
    /// applies to. Supports leading-`!` negation.
    #[must_use]
    pub fn on<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.on = EventFilter::new(events);
        self
    }

    /// Exclude the field from binding and validation entirely.
    #[must_use]
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Keep surrounding whitespace on submitted values (trimming is the
    /// default).
    #[must_use]
    pub fn no_trim(mut self) -> Self {
        self.no_trim = true;
        self
    }

    /// Submitted values arrive sealed and are unsealed before conversion.
    #[must_use]
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Regex the entire raw value must match (checked pre-conversion, only
    /// on non-empty values). The pattern is anchored to the whole value; a
    /// partial match does not satisfy it.
    #[must_use]
    pub fn mask(mut self, mask: Regex) -> Self {
        let anchored = Regex::new(&format!(r"\A(?:{})\z", mask.as_str())).unwrap_or(mask);
        self.mask = Some(anchored);
        self
    }

    #[must_use]
    pub fn min_value(mut self, value: f64) -> Self {
        self.min_value = Some(value);
        self
    }

    #[must_use]
    pub fn max_value(mut self, value: f64) -> Self {
        self.max_value = Some(value);
        self
    }

    /// Post-conversion predicate over the fully-bound handler.
    #[must_use]
    pub fn expression(mut self, expression: ExpressionFn) -> Self {
        self.expression = Some(expression);
        self
    }

    /// Override the registry-selected converter for this property.
    #[must_use]
    pub fn converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Human-facing field label for error display.
    #[must_use]
    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Whether the field is required when processing the given event.
    #[must_use]
    pub fn required_on(&self, event: &str) -> bool {
        self.required && !self.ignore && self.on.applies(event)
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    #[must_use]
    pub fn trims(&self) -> bool {
        !self.no_trim
    }

    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    #[must_use]
    pub fn min_length_limit(&self) -> Option<usize> {
        self.min_length
    }

    #[must_use]
    pub fn max_length_limit(&self) -> Option<usize> {
        self.max_length
    }

    #[must_use]
    pub fn mask_pattern(&self) -> Option<&Regex> {
        self.mask.as_ref()
    }

    #[must_use]
    pub fn min_value_limit(&self) -> Option<f64> {
        self.min_value
    }

    #[must_use]
    pub fn max_value_limit(&self) -> Option<f64> {
        self.max_value
    }

    #[must_use]
    pub fn expression_fn(&self) -> Option<&ExpressionFn> {
        self.expression.as_ref()
    }

    #[must_use]
    pub fn converter_override(&self) -> Option<&Arc<dyn TypeConverter>> {
        self.converter.as_ref()
    }

    #[must_use]
    pub fn field_label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl std::fmt::Debug for ValidationMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationMetadata")
            .field("required", &self.required)
            .field("ignore", &self.ignore)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("min_value", &self.min_value)
            .field("max_value", &self.max_value)
            .field("mask", &self.mask.as_ref().map(Regex::as_str))
            .field("encrypted", &self.encrypted)
            .finish_non_exhaustive()
    }
}
