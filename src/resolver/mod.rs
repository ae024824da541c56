//! # Resolver Module
//!
//! Maps request paths to handler types and requests to the event method
//! that answers them.
//!
//! ## Overview
//!
//! The resolver is built once at startup from the registered
//! [`HandlerSpec`](crate::handler::HandlerSpec)s:
//!
//! 1. Each spec's binding pattern is parsed (or synthesized from the spec
//!    name), `$event` parameter defaults are resolved against the spec's
//!    default event — a second phase, since a pattern's `$event` default
//!    can only be computed once the handler's own default handler is known
//!    — and the pattern lands in the
//!    [`UrlBindingRegistry`](crate::binding::UrlBindingRegistry).
//! 2. At request time the resolver finds the spec for a path, fetches or
//!    creates the handler instance in its declared scope, and resolves the
//!    event name through a strict ladder: forwarded-event attribute, the
//!    `_eventName` parameter, parameters named after events, then the path
//!    segment following the binding.
//!
//! The registry tables sit behind an `ArcSwap`, so concurrent request
//! threads read lock-free and handlers can still be added at runtime.
//!
//! ## Not-found fallback
//!
//! With a [`ViewLocator`] configured, a path with no bound handler is
//! probed for a same-named view resource (as-is, lower-first, snake_case)
//! and, when one exists, answered by a synthesized view handler instead of
//! failing the request.

mod core;
mod fallback;

pub use core::{ActionResolver, ActionResolverBuilder, RegisteredHandler};
pub use fallback::{synthesize_binding, DefaultViewBean, ViewLocator};
