//! # Server Module
//!
//! The container-facing boundary of the dispatch engine.
//!
//! The engine does not own an HTTP server; it consumes a [`Request`]
//! abstraction (method, path, parameter map, attributes, session) and
//! executes outcomes against a [`Response`] handle (status, headers, body,
//! forward/redirect, send-error). A container adapter — or the test suite —
//! builds requests with [`RequestBuilder`] and inspects the response state
//! afterwards.
//!
//! Multipart parsing mechanics are out of scope: file parameters arrive
//! pre-parsed as [`FileUpload`] metadata in a distinct namespace from the
//! regular parameter map.

pub mod request;
pub mod response;

pub use request::{Attribute, FileUpload, Request, RequestBuilder, Session};
pub use response::{Disposition, Response};
