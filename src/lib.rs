//! # Stagecoach
//!
//! **Stagecoach** is a lifecycle-driven HTTP request-dispatch engine: the
//! pipeline that takes an inbound request, resolves it to a handler type
//! and event method, binds and validates request parameters onto the
//! handler's typed properties, runs interceptors around every lifecycle
//! stage, invokes the method, and executes the resulting outcome against
//! the response.
//!
//! ## Architecture
//!
//! The library is organized leaf-to-root:
//!
//! - **[`binding`]** - URL binding patterns (literals + `{name=default}`
//!   parameters) and the longest-prefix registry
//! - **[`validation`]** - accumulated validation errors and per-property
//!   validation metadata
//! - **[`convert`]** - the type-converter seam between raw strings and
//!   typed properties
//! - **[`bind`]** - the property binder: required checks, policy,
//!   conversion, manifests, partial-failure semantics
//! - **[`handler`]** - the handler capability and the declarative
//!   [`HandlerSpec`](handler::HandlerSpec) registration API
//! - **[`resolution`]** - the deferred response-producing outcome
//! - **[`server`]** - the container-facing request/response boundary
//! - **[`resolver`]** - path → handler type, request → event method
//! - **[`lifecycle`]** - the nine-stage state machine, interceptor
//!   chains, and the [`DispatchPipeline`](lifecycle::DispatchPipeline)
//! - **[`asynch`]** - suspended outcomes completed from worker coroutines
//!
//! ## Request flow
//!
//! ```text
//! RequestInit
//!   └─ ActionBeanResolution    resolve + scope the handler instance
//!        └─ HandlerResolution  event name ladder, default handler
//!             └─ BindingAndValidation   property binder
//!                  └─ CustomValidation  spec validation methods
//!                       └─ ValidationErrorHandling
//!                            └─ EventHandling   invoke (or suspend)
//!                                 └─ ResolutionExecution
//!                                      └─ RequestComplete
//! ```
//!
//! Every stage is wrapped by its interceptor chain; an outcome produced at
//! any stage short-circuits the rest and jumps straight to
//! ResolutionExecution.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use stagecoach::handler::{Event, HandlerSpec, Property};
//! use stagecoach::lifecycle::DispatchPipeline;
//! use stagecoach::resolver::ActionResolver;
//! use stagecoach::validation::ValidationMetadata;
//!
//! let spec = HandlerSpec::of::<ContactAction>("ContactAction")
//!     .binding("/contact/{id}/{$event=view}")
//!     .event(Event::new::<ContactAction, _>("view", ContactAction::view).default_handler())
//!     .event(Event::new::<ContactAction, _>("save", ContactAction::save))
//!     .property(
//!         Property::scalar::<ContactAction, i64>("id", |b, v| b.id = v)
//!             .validate(ValidationMetadata::new().required().on(["save"])),
//!     )
//!     .build()?;
//!
//! let resolver = ActionResolver::builder().register(spec).build()?;
//! let pipeline = DispatchPipeline::builder(resolver).build();
//! // pipeline.dispatch(request, response)?;
//! ```
//!
//! ## Concurrency model
//!
//! The pipeline is single-threaded per in-flight request. Startup-time
//! state (the binding registry, handler specs) is read-mostly and shared
//! without locking; per-handler method caches populate lazily and tolerate
//! concurrent first access; the async completion path re-enters cleanup
//! from a worker coroutine behind an exactly-once guard.

pub mod asynch;
pub mod bind;
pub mod binding;
pub mod constants;
pub mod convert;
pub mod error;
pub mod handler;
pub mod ids;
pub mod lifecycle;
pub mod resolution;
pub mod resolver;
pub mod runtime_config;
pub mod server;
pub mod validation;

pub use error::{ConfigError, DispatchError};
pub use handler::{ActionBean, ActionBeanContext, Attachment, Event, HandlerSpec, Property};
pub use lifecycle::{DispatchOutcome, DispatchPipeline, LifecycleStage};
pub use resolution::Resolution;
pub use resolver::ActionResolver;
pub use server::{Request, RequestBuilder, Response, Session};
pub use validation::{ValidationError, ValidationErrors, ValidationMetadata};
