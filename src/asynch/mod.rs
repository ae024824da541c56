//! # Async Completion Module
//!
//! The optional asynchronous branch of the dispatch pipeline.
//!
//! An event method registered as asynchronous is not invoked during
//! EventHandling. Instead an [`AsyncCompletion`] is constructed and
//! returned as the outcome; executing it hands the method to a worker
//! coroutine together with the completion object, and the normal pipeline
//! gives up control of the response. The method eventually calls
//! [`complete`](AsyncCompletion::complete),
//! [`complete_with`](AsyncCompletion::complete_with), or
//! [`dispatch`](AsyncCompletion::dispatch); a watchdog enforces the
//! configured timeout; and an atomic guard makes the registered cleanup run
//! exactly once no matter which of completion, timeout, or error arrives
//! first (or how many times).
//!
//! Suspension is a capability of the environment, probed once at startup:
//! [`CoroutineExecutor`] supplies it on the `may` runtime, while
//! [`SyncOnlyExecutor`] makes construction of an `AsyncCompletion` fail
//! fatally — a hard precondition, not a recoverable error.

mod core;
mod executor;

pub use core::{AsyncCompletion, AsyncListener, AsyncState};
pub use executor::{AsyncExecutor, CoroutineExecutor, SyncOnlyExecutor};
