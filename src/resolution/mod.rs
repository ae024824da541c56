//! # Resolution Module
//!
//! The deferred, response-producing effect chosen by a handler method or by
//! pipeline error handling.
//!
//! A handler method does not write to the response directly; it returns a
//! [`Resolution`] which the ResolutionExecution lifecycle stage executes
//! exactly once, wrapped by that stage's interceptor chain. The enum covers
//! the built-in effects — forward, redirect, error, JSON body, asynchronous
//! completion — with a [`ResolutionExec`] escape hatch for custom effects.

mod core;

pub use core::{
    error_report, ErrorResolution, ForwardResolution, JsonResolution, RedirectResolution,
    Resolution, ResolutionExec,
};
