//! # Lifecycle Module
//!
//! The dispatch state machine and its interception points.
//!
//! ## Stages
//!
//! A request moves through the stages of [`LifecycleStage`] strictly in
//! order. Every stage is wrapped by the interceptor chain registered for
//! it: interceptor₁ wraps interceptor₂ wraps … wraps the stage's core
//! action, and each link explicitly calls [`Invocation::proceed`] to
//! continue. Code before `proceed` is before-advice, code after is
//! after-advice, and a link may skip `proceed` entirely to short-circuit
//! the stage with its own outcome.
//!
//! When any stage produces an outcome, the remaining ordinary stages are
//! skipped and control jumps straight to ResolutionExecution with it.
//!
//! ## Built-in interception
//!
//! [`BeforeAfterInterceptor`] runs the before/after methods handler specs
//! declare, split by stage and filtered by event, with a lazily-populated
//! per-handler cache that tolerates concurrent first access.
//!
//! ## Pipeline
//!
//! [`DispatchPipeline`] owns the resolver, the binder, the interceptor
//! table, and the async executor, and drives one request from RequestInit
//! to RequestComplete — or hands the tail of the request to an
//! [`AsyncCompletion`](crate::asynch::AsyncCompletion) when EventHandling
//! produces a suspended outcome.

mod before_after;
mod context;
mod pipeline;
mod stage;

pub use before_after::BeforeAfterInterceptor;
pub use context::{ExecutionContext, Interceptor, Invocation};
pub use pipeline::{
    DefaultExceptionHandler, DispatchOutcome, DispatchPipeline, DispatchPipelineBuilder,
    ExceptionHandler,
};
pub use stage::LifecycleStage;
