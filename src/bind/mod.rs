//! # Bind Module
//!
//! Converts submitted string parameters into typed values and assigns them
//! onto handler instance properties, enforcing the declared validation
//! rules along the way.
//!
//! ## Sequence
//!
//! 1. Collect submitted parameters (request plus URL-extracted binding
//!    parameters) as [`ParameterName`]s, sorted so simpler names precede
//!    longer/indexed ones.
//! 2. Required-field checks run first, before any conversion, so an
//!    entirely-missing field is reported even when conversion would fail.
//! 3. Each parameter with a matching property runs the binding-policy
//!    check, pre-conversion string validations, then type conversion;
//!    converted values are applied to the handler.
//! 4. Fields listed in the sealed fields-present manifest but absent from
//!    the submission are cleared (checkbox semantics). Wizard mode makes
//!    the manifest mandatory.
//! 5. File parameters bind after regular parameters.
//! 6. Post-conversion validations (numeric ranges, expression predicates)
//!    run last, over the fully-bound handler.
//!
//! Binding never fails for an individual field: errors accumulate into the
//! context's [`ValidationErrors`](crate::validation::ValidationErrors) and
//! the remaining fields still bind.

mod binder;
mod manifest;
mod name;
mod policy;

pub use binder::PropertyBinder;
pub use manifest::{seal_fields, unseal_fields};
pub use name::ParameterName;
pub use policy::BindingPolicy;
