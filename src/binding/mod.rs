//! # Binding Module
//!
//! URL binding patterns and the registry that maps request paths to them.
//!
//! ## Overview
//!
//! A binding pattern associates a handler type with a templated URL:
//! literal text interleaved with named parameters, e.g.
//! `/user/{id}/{$event=view}`. The module provides:
//!
//! - [`UrlBindingPattern`] — the parsed, immutable form of a pattern
//! - [`LiveBinding`] — a pattern evaluated against one concrete request
//!   path, holding the extracted parameter values
//! - [`UrlBindingRegistry`] — all registered patterns indexed by their
//!   literal path prefix, matched longest-prefix-first
//!
//! ## Pattern grammar
//!
//! `{` opens a parameter and `}` closes it; `\` escapes the following
//! character. Everything before the first `{` is literal text: it is split
//! into the binding "path" (trimmed back to the last identifier character)
//! and an optional leading literal component. A parameter body is `name` or
//! `name=default`. The reserved parameter name `$event` selects the event to
//! fire; its default is resolved in a second startup phase, once the
//! handler's own default event is known.
//!
//! ## Matching
//!
//! The registry picks the pattern whose literal path is the longest prefix
//! of the request path. Equal-length prefixes break by lexical order; this
//! is deterministic compatibility behavior, not a priority rule.

mod pattern;
mod registry;
#[cfg(test)]
mod tests;

pub use pattern::{
    BindingParameter, Component, LiveBinding, UrlBindingPattern, PARAMETER_NAME_EVENT,
};
pub use registry::UrlBindingRegistry;
