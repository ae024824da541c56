use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::asynch::AsyncCompletion;
use crate::constants;
use crate::server::{Attribute, Request, Response};
use crate::validation::ValidationErrors;

/// Custom response-producing effect, for applications that need more than
/// the built-in variants.
pub trait ResolutionExec: Send {
    fn execute(&mut self, request: &Arc<Request>, response: &Response) -> anyhow::Result<()>;
}

/// Server-side forward to another resource, optionally naming the event a
/// nested dispatch should fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardResolution {
    pub path: String,
    pub event: Option<String>,
}

impl ForwardResolution {
    #[must_use]
    pub fn new(path: &str) -> Self {
        ForwardResolution {
            path: path.to_string(),
            event: None,
        }
    }

    /// Name the event the forwarded-to handler should fire, disambiguating
    /// nested dispatch where the original parameters are still present.
    #[must_use]
    pub fn with_event(mut self, event: &str) -> Self {
        self.event = Some(event.to_string());
        self
    }
}

/// Client redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResolution {
    pub url: String,
    pub permanent: bool,
}

impl RedirectResolution {
    #[must_use]
    pub fn new(url: &str) -> Self {
        RedirectResolution {
            url: url.to_string(),
            permanent: false,
        }
    }

    #[must_use]
    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self
    }
}

/// Status-coded error sent through the response's error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResolution {
    pub status: u16,
    pub message: String,
}

impl ErrorResolution {
    #[must_use]
    pub fn new(status: u16, message: &str) -> Self {
        ErrorResolution {
            status,
            message: message.to_string(),
        }
    }
}

/// JSON body with a status code; the REST-style outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResolution {
    pub status: u16,
    pub body: Value,
}

impl JsonResolution {
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        JsonResolution { status, body }
    }

    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }
}

/// The outcome of handling a request.
///
/// Produced by a handler method, an interceptor, or pipeline error
/// handling, and executed against the response exactly once by the
/// ResolutionExecution stage.
pub enum Resolution {
    Forward(ForwardResolution),
    Redirect(RedirectResolution),
    Error(ErrorResolution),
    Json(JsonResolution),
    /// Suspended outcome: the handler method runs later, on a worker, and
    /// completes the response through the [`AsyncCompletion`].
    Async(AsyncCompletion),
    Custom(Box<dyn ResolutionExec>),
}

impl Resolution {
    #[must_use]
    pub fn forward(path: &str) -> Self {
        Resolution::Forward(ForwardResolution::new(path))
    }

    #[must_use]
    pub fn redirect(url: &str) -> Self {
        Resolution::Redirect(RedirectResolution::new(url))
    }

    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Resolution::Error(ErrorResolution::new(status, message))
    }

    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Resolution::Json(JsonResolution::new(status, body))
    }

    /// Execute this resolution's effect against the response.
    pub fn execute(&mut self, request: &Arc<Request>, response: &Response) -> anyhow::Result<()> {
        match self {
            Resolution::Forward(fwd) => {
                debug!(path = %fwd.path, event = ?fwd.event, "Executing forward resolution");
                if let Some(event) = &fwd.event {
                    request.set_attribute(
                        constants::REQ_ATTR_EVENT_NAME,
                        Attribute::Text(event.clone()),
                    );
                }
                response.forward(&fwd.path);
                Ok(())
            }
            Resolution::Redirect(redir) => {
                debug!(url = %redir.url, "Executing redirect resolution");
                response.redirect(&redir.url, redir.permanent);
                Ok(())
            }
            Resolution::Error(err) => {
                debug!(status = err.status, "Executing error resolution");
                response.send_error(err.status, &err.message);
                Ok(())
            }
            Resolution::Json(json_res) => {
                debug!(status = json_res.status, "Executing JSON resolution");
                response.set_status(json_res.status);
                response.set_header("content-type", "application/json");
                let serialized = serde_json::to_string(&json_res.body)?;
                response.write(serialized.as_bytes());
                Ok(())
            }
            Resolution::Async(completion) => completion.execute(),
            Resolution::Custom(custom) => custom.execute(request, response),
        }
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Forward(fwd) => f.debug_tuple("Forward").field(fwd).finish(),
            Resolution::Redirect(redir) => f.debug_tuple("Redirect").field(redir).finish(),
            Resolution::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Resolution::Json(body) => f.debug_tuple("Json").field(body).finish(),
            Resolution::Async(_) => f.write_str("Async(..)"),
            Resolution::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Serialize accumulated validation errors into the structured REST error
/// body: global errors first (only when no field errors exist), then
/// per-field errors with field name, submitted value, and messages.
#[must_use]
pub fn error_report(errors: &ValidationErrors, status: u16) -> Resolution {
    let mut global_errors: Vec<String> = Vec::new();
    if !errors.has_field_errors() {
        for error in errors.global() {
            global_errors.push(error.render_message());
        }
    }

    let mut field_errors: Vec<Value> = Vec::new();
    for (field, list) in errors.iter() {
        if field == crate::validation::GLOBAL_ERROR {
            continue;
        }
        let messages: Vec<String> = list.iter().map(|e| e.render_message()).collect();
        field_errors.push(json!({
            "fieldName": field,
            "fieldValue": list.first().and_then(|e| e.field_value.clone()),
            "errorMessages": messages,
        }));
    }

    let mut body = json!({ "globalErrors": global_errors });
    if !field_errors.is_empty() {
        body["fieldErrors"] = Value::Array(field_errors);
    }

    Resolution::Json(JsonResolution::new(status, body))
}
