use std::collections::BTreeMap;

use serde::Serialize;

/// Reserved key under which errors not tied to a single field are stored.
pub const GLOBAL_ERROR: &str = "__global_error";

/// A single validation failure.
///
/// Carries a message key (stable, suitable for lookup by a localization
/// layer), optional replacement parameters, the raw submitted value, and —
/// once finalized by the pipeline — the binding path of the owning handler.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationError {
    /// Stable key identifying the kind of failure, e.g.
    /// `validation.required.valueNotPresent`.
    pub message_key: String,
    /// Replacement parameters for the message, already stringified.
    pub parameters: Vec<String>,
    /// Explicit message text, when the error was constructed with one.
    pub message: Option<String>,
    /// The field the error is bound to. Set when added to
    /// [`ValidationErrors`]; empty until then.
    pub field_name: String,
    /// The raw submitted value, HTML-encoded during finalization.
    pub field_value: Option<String>,
    /// The binding path of the handler that owns the field. Set once by
    /// error finalization; used by the view layer to scope re-display.
    pub action_path: Option<String>,
}

impl ValidationError {
    /// A scoped error identified only by its message key.
    #[must_use]
    pub fn scoped(message_key: &str) -> Self {
        ValidationError {
            message_key: message_key.to_string(),
            parameters: Vec::new(),
            message: None,
            field_name: String::new(),
            field_value: None,
            action_path: None,
        }
    }

    /// An error with explicit message text.
    #[must_use]
    pub fn simple(message: &str) -> Self {
        ValidationError {
            message_key: "validation.simple".to_string(),
            parameters: Vec::new(),
            message: Some(message.to_string()),
            field_name: String::new(),
            field_value: None,
            action_path: None,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, parameter: impl ToString) -> Self {
        self.parameters.push(parameter.to_string());
        self
    }

    #[must_use]
    pub fn with_field_value(mut self, value: &str) -> Self {
        self.field_value = Some(value.to_string());
        self
    }

    /// Render the message for display. Explicit text wins; otherwise the
    /// key plus any parameters.
    #[must_use]
    pub fn render_message(&self) -> String {
        match &self.message {
            Some(text) => text.clone(),
            None if self.parameters.is_empty() => self.message_key.clone(),
            None => format!("{} [{}]", self.message_key, self.parameters.join(", ")),
        }
    }
}

/// Field name → ordered list of errors, with a reserved global key.
///
/// Accumulated across binding, custom validation, and handler execution;
/// read by error handling and by the view layer. Ordered so serialized
/// reports are deterministic.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    map: BTreeMap<String, Vec<ValidationError>>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error for a field. The error's `field_name` is set to the
    /// field as a side effect.
    pub fn add(&mut self, field: &str, mut error: ValidationError) {
        if error.field_name.is_empty() {
            error.field_name = field.to_string();
        }
        self.map.entry(field.to_string()).or_default().push(error);
    }

    /// Add several errors for one field.
    pub fn add_all(&mut self, field: &str, errors: impl IntoIterator<Item = ValidationError>) {
        for error in errors {
            self.add(field, error);
        }
    }

    /// Add an error not tied to a single field.
    pub fn add_global(&mut self, error: ValidationError) {
        self.add(GLOBAL_ERROR, error);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Total number of individual errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    /// True if any error is bound to a real field (not the global key).
    #[must_use]
    pub fn has_field_errors(&self) -> bool {
        self.map.keys().any(|k| k != GLOBAL_ERROR)
    }

    #[must_use]
    pub fn contains_field(&self, field: &str) -> bool {
        self.map.contains_key(field)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[ValidationError]> {
        self.map.get(field).map(Vec::as_slice)
    }

    #[must_use]
    pub fn global(&self) -> &[ValidationError] {
        self.map.get(GLOBAL_ERROR).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ValidationError])> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Vec<ValidationError>)> {
        self.map.iter_mut().map(|(k, v)| (k.as_str(), v))
    }
}

/// Minimal HTML encoding for raw submitted values echoed back into pages.
#[must_use]
pub fn html_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
