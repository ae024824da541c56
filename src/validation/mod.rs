//! # Validation Module
//!
//! Accumulated validation state for one request, plus the per-property
//! validation metadata handlers declare at registration time.
//!
//! Binding and validation failures are never errors in the `Result` sense:
//! they accumulate into [`ValidationErrors`] and are dealt with by the
//! ValidationErrorHandling lifecycle stage. One bad field must not prevent
//! other fields from binding.

mod errors;
mod filter;
mod metadata;

pub use errors::{html_encode, ValidationError, ValidationErrors, GLOBAL_ERROR};
pub use filter::EventFilter;
pub use metadata::{ExpressionFn, ValidationMetadata, ValidationState};
