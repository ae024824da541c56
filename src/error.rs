//! Error taxonomy for the dispatch engine.
//!
//! Two families, split by when they can occur:
//!
//! - [`ConfigError`] — startup-time configuration problems (duplicate event
//!   names, unparsable binding patterns, missing defaults). These are fatal
//!   and abort initialization; they can never surface during a request.
//! - [`DispatchError`] — request-time failures (no handler bound to a path,
//!   ambiguous event parameters, construction failures). For REST-style
//!   handlers most of these are converted into structured error resolutions
//!   before they ever propagate; for ordinary handlers they reach the
//!   dispatcher boundary as errors.

use thiserror::Error;

/// Fatal startup-time configuration errors.
///
/// Raised while registering handler specs and building the binding registry.
/// Initialization must abort on any of these; none are recoverable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A binding pattern could not be parsed.
    #[error("invalid URL binding pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Two event handlers in the same spec claim the same event name.
    #[error("handler '{handler}' declares multiple event handlers for event '{event}'")]
    DuplicateEvent { handler: String, event: String },

    /// Two event handlers in the same spec are both flagged default.
    #[error("handler '{handler}' declares multiple default event handlers")]
    DuplicateDefault { handler: String },

    /// A `$event` binding parameter needs a default, but the handler has no
    /// determinable default handler.
    #[error("handler '{handler}' uses the $event parameter but has no determinable default handler")]
    NoDefaultForEventParameter { handler: String },

    /// Two handler specs registered the same binding path.
    #[error("binding path '{path}' is claimed by both '{first}' and '{second}'")]
    ConflictingBinding {
        path: String,
        first: String,
        second: String,
    },

    /// A spec was registered with an empty event table.
    #[error("handler '{handler}' declares no event handlers")]
    NoEvents { handler: String },
}

/// Request-time dispatch failures.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler type is bound to the requested path.
    #[error("no handler is bound to path '{path}'")]
    HandlerNotFound { path: String },

    /// The event name resolved, but the handler has no method for it.
    #[error("no handler method for event '{event}' on handler '{handler}'")]
    EventNotFound { handler: String, event: String },

    /// No event name was given and no default handler is determinable.
    #[error("no default handler could be found for handler '{handler}'")]
    NoDefaultHandler { handler: String },

    /// More than one request parameter names a known event.
    #[error("multiple event parameters {events:?} are present in this request; only one event parameter may be specified per request")]
    AmbiguousEvent { events: Vec<String> },

    /// The pluggable object factory failed to construct a handler instance.
    #[error("could not create instance of handler '{handler}': {reason}")]
    Construction { handler: String, reason: String },

    /// The resolved handler method does not support the request's HTTP verb.
    #[error("handler method '{event}' on '{handler}' does not support the request method {method}")]
    VerbMismatch {
        handler: String,
        event: String,
        method: http::Method,
    },

    /// Wizard-mode submission without the sealed fields-present manifest.
    #[error("wizard-mode submission for handler '{handler}' is missing the sealed fields-present manifest")]
    MissingFieldsManifest { handler: String },

    /// Async events were requested but the selected executor cannot suspend.
    #[error("async events are not available: the configured executor has no suspension support")]
    AsyncUnsupported,

    /// An event handler (or before/after/validation method) failed. Carries
    /// the root cause, unwrapped from any intermediate wrappers.
    #[error("handler execution failed: {0}")]
    Handler(#[source] anyhow::Error),

    /// Executing a resolution against the response failed.
    #[error("resolution execution failed: {0}")]
    Resolution(#[source] anyhow::Error),
}

impl DispatchError {
    /// Status code used when this error is surfaced as a structured REST
    /// outcome instead of propagating.
    #[must_use]
    pub fn rest_status(&self) -> u16 {
        match self {
            DispatchError::HandlerNotFound { .. }
            | DispatchError::EventNotFound { .. }
            | DispatchError::NoDefaultHandler { .. } => 404,
            DispatchError::VerbMismatch { .. } => 405,
            DispatchError::AmbiguousEvent { .. } => 400,
            _ => 500,
        }
    }
}
