use std::fmt::{Display, Formatter};
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;

use crate::error::ConfigError;

/// The reserved parameter name that selects the event to execute.
pub const PARAMETER_NAME_EVENT: &str = "$event";

/// A named parameter inside a binding pattern, with an optional default
/// value used when the request path does not supply one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingParameter {
    pub name: String,
    pub default_value: Option<String>,
}

impl BindingParameter {
    /// True if this is the reserved `$event` parameter.
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.name == PARAMETER_NAME_EVENT
    }
}

impl Display for BindingParameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.default_value {
            Some(dflt) => write!(f, "{}={}", self.name, dflt),
            None => write!(f, "{}", self.name),
        }
    }
}

/// One component of a parsed pattern: a literal delimiter or a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Literal(String),
    Parameter(BindingParameter),
}

/// Most patterns have a handful of components at most; keep them inline.
pub type ComponentVec = SmallVec<[Component; 6]>;

/// A parsed URL binding pattern. Immutable once built; created at startup
/// for every registered handler type.
///
/// Invariant: exactly one literal "path" precedes the first parameter, and a
/// trailing literal (if any) is the "suffix".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBindingPattern {
    path: String,
    components: ComponentVec,
    suffix: Option<String>,
}

impl UrlBindingPattern {
    /// Parse a binding pattern string.
    ///
    /// Malformed nesting (an unterminated `{`) or a trailing escape
    /// character is a fatal [`ConfigError`], raised at startup rather than
    /// at request time.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.is_empty() {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern must not be empty".to_string(),
            });
        }

        let mut path: Option<String> = None;
        let mut components = ComponentVec::new();
        let mut buf = String::with_capacity(pattern.len());
        let mut brace_level = 0u32;
        let mut escape = false;

        for c in pattern.chars() {
            if !escape {
                match c {
                    '{' => {
                        brace_level += 1;
                        if brace_level == 1 {
                            match path {
                                None => {
                                    // The literal before the first parameter is
                                    // split into the path (ending at the last
                                    // identifier character) and a leading
                                    // literal delimiter.
                                    let cut = trailing_literal_start(&buf);
                                    if cut == buf.len() {
                                        path = Some(std::mem::take(&mut buf));
                                    } else {
                                        path = Some(buf[..cut].to_string());
                                        components.push(Component::Literal(buf[cut..].to_string()));
                                        buf.clear();
                                    }
                                }
                                Some(_) => {
                                    components.push(Component::Literal(std::mem::take(&mut buf)));
                                }
                            }
                            continue;
                        }
                    }
                    '}' => {
                        if brace_level > 0 {
                            brace_level -= 1;
                        }
                        if brace_level == 0 {
                            components.push(Component::Parameter(parse_parameter(&buf)));
                            buf.clear();
                            continue;
                        }
                    }
                    '\\' => {
                        escape = true;
                        continue;
                    }
                    _ => {}
                }
            }

            buf.push(c);
            escape = false;
        }

        if escape {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern must not end with an escape character".to_string(),
            });
        }
        if brace_level > 0 {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "unterminated left brace ('{')".to_string(),
            });
        }
        if !buf.is_empty() {
            match path {
                None => path = Some(buf),
                Some(_) => components.push(Component::Literal(buf)),
            }
        }

        let path = path.unwrap_or_default();
        let suffix = match components.last() {
            Some(Component::Literal(lit)) if components.iter().any(is_parameter) => {
                Some(lit.clone())
            }
            _ => None,
        };

        trace!(path = %path, components = components.len(), "Parsed URL binding pattern");

        Ok(UrlBindingPattern {
            path,
            components,
            suffix,
        })
    }

    /// The literal characters of the pattern up to the first parameter.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All components, in the order they appear in the pattern definition.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The trailing literal, when the pattern has parameters and ends with a
    /// literal. `None` otherwise.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// The pattern's parameters, in order.
    pub fn parameters(&self) -> impl Iterator<Item = &BindingParameter> {
        self.components.iter().filter_map(|c| match c {
            Component::Parameter(p) => Some(p),
            Component::Literal(_) => None,
        })
    }

    /// True if any component is the reserved `$event` parameter.
    #[must_use]
    pub fn has_event_parameter(&self) -> bool {
        self.parameters().any(BindingParameter::is_event)
    }

    /// Return a copy of this pattern with the `$event` parameter's default
    /// value filled in. Used by the second startup phase, once the handler's
    /// default event is known.
    #[must_use]
    pub fn with_event_default(&self, event: &str) -> Self {
        let mut copy = self.clone();
        for component in &mut copy.components {
            if let Component::Parameter(p) = component {
                if p.is_event() && p.default_value.is_none() {
                    p.default_value = Some(event.to_string());
                }
            }
        }
        copy
    }

    /// Evaluate this pattern against a concrete request path, extracting
    /// parameter values positionally.
    ///
    /// Trailing slashes in the path are ignored, as is the pattern's literal
    /// suffix. Each literal component is consumed as a delimiter; each
    /// parameter takes everything up to the next literal (or the end of the
    /// path). Parameters the path does not reach keep their defaults.
    #[must_use]
    pub fn evaluate(self: &Arc<Self>, request_path: &str) -> LiveBinding {
        let mut length = request_path.len();
        while length > 0 && request_path.as_bytes()[length - 1] == b'/' {
            length -= 1;
        }
        if let Some(suffix) = &self.suffix {
            if request_path[..length].ends_with(suffix.as_str()) {
                length -= suffix.len();
            }
        }

        let mut values: ParameterValues = SmallVec::new();
        let mut index = self.path.len().min(length);
        let mut current: Option<&BindingParameter> = None;

        let mut iter = self.components.iter();
        while index < length {
            let Some(component) = iter.next() else { break };
            match component {
                Component::Literal(literal) => {
                    let value = match request_path[index..length].find(literal.as_str()) {
                        Some(offset) => {
                            let end = index + offset;
                            let v = &request_path[index..end];
                            index = end + literal.len();
                            v
                        }
                        None => {
                            let v = &request_path[index..length];
                            index = length;
                            v
                        }
                    };
                    if let Some(param) = current.take() {
                        if !value.is_empty() {
                            values.push((param.clone(), Some(value.to_string())));
                        } else {
                            values.push((param.clone(), None));
                        }
                    }
                }
                Component::Parameter(param) => {
                    current = Some(param);
                }
            }
        }

        // The component list ended before the path did, or the path ended
        // with a parameter still pending.
        if let Some(param) = current.take() {
            if index < length {
                values.push((
                    param.clone(),
                    Some(request_path[index..length].to_string()),
                ));
            } else {
                values.push((param.clone(), None));
            }
        }

        // Unreached parameters carry no extracted value; their defaults are
        // still reachable through the LiveBinding accessor.
        for component in iter {
            if let Component::Parameter(param) = component {
                values.push((param.clone(), None));
            }
        }

        LiveBinding {
            pattern: Arc::clone(self),
            values,
        }
    }
}

impl Display for UrlBindingPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)?;
        for component in &self.components {
            match component {
                Component::Literal(lit) => write!(f, "{lit}")?,
                Component::Parameter(p) => write!(f, "{{{p}}}")?,
            }
        }
        Ok(())
    }
}

type ParameterValues = SmallVec<[(BindingParameter, Option<String>); 4]>;

/// A [`UrlBindingPattern`] evaluated against one concrete request path.
/// Created per request and discarded at request end.
#[derive(Debug, Clone)]
pub struct LiveBinding {
    pattern: Arc<UrlBindingPattern>,
    values: ParameterValues,
}

impl LiveBinding {
    /// The prototype pattern this binding was evaluated from.
    #[must_use]
    pub fn pattern(&self) -> &Arc<UrlBindingPattern> {
        &self.pattern
    }

    /// The value for a named parameter: the extracted path segment if one
    /// was present, otherwise the parameter's configured default.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(p, _)| p.name == name)
            .and_then(|(p, v)| v.as_deref().or(p.default_value.as_deref()))
    }

    /// All parameters with their resolved values (extracted or default).
    pub fn parameters(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values
            .iter()
            .map(|(p, v)| (p.name.as_str(), v.as_deref().or(p.default_value.as_deref())))
    }

    /// The event named by the `$event` parameter, extracted or defaulted.
    #[must_use]
    pub fn event(&self) -> Option<&str> {
        self.parameter(PARAMETER_NAME_EVENT)
    }
}

/// Find the byte offset where the trailing non-identifier run of `buf`
/// starts. The path keeps everything up to (and including) the last
/// identifier character; the rest becomes a leading literal component.
fn trailing_literal_start(buf: &str) -> usize {
    let mut cut = buf.len();
    for (i, c) in buf.char_indices().rev() {
        if c.is_alphanumeric() || c == '_' || c == '$' {
            break;
        }
        cut = i;
    }
    cut
}

/// Parse a parameter body (`name` or `name=default`), escape-aware.
fn parse_parameter(body: &str) -> BindingParameter {
    let mut name = String::new();
    let mut default_value = String::new();
    let mut in_default = false;
    let mut escape = false;

    for c in body.chars() {
        if !escape {
            match c {
                '\\' => {
                    escape = true;
                    continue;
                }
                '=' if !in_default => {
                    in_default = true;
                    continue;
                }
                _ => {}
            }
        }
        if in_default {
            default_value.push(c);
        } else {
            name.push(c);
        }
        escape = false;
    }

    BindingParameter {
        name,
        default_value: if default_value.is_empty() {
            None
        } else {
            Some(default_value)
        },
    }
}

fn is_parameter(component: &Component) -> bool {
    matches!(component, Component::Parameter(_))
}
