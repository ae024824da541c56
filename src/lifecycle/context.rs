use std::sync::Arc;

use tracing::debug;

use crate::binding::LiveBinding;
use crate::handler::{ActionBeanContext, BeanHandle};
use crate::resolution::Resolution;
use crate::resolver::RegisteredHandler;
use crate::server::{Request, Response};

use super::stage::LifecycleStage;

/// Cross-cutting code registered to wrap one or more lifecycle stages.
///
/// An interceptor runs around each stage it declares in
/// [`Interceptor::intercepts`]: it may inspect and mutate the
/// [`ExecutionContext`], call [`Invocation::proceed`] to continue the
/// chain, and either pass the nested outcome through, replace it, or skip
/// `proceed` entirely to short-circuit the stage.
pub trait Interceptor: Send + Sync {
    /// The stages this interceptor wraps.
    fn intercepts(&self) -> &[LifecycleStage];

    fn intercept(&self, invocation: &mut Invocation<'_>) -> anyhow::Result<Option<Resolution>>;
}

/// Per-request mutable record carried through every stage and handed to
/// every interceptor.
///
/// Populated in pieces as the request progresses: the handler instance
/// after ActionBeanResolution, the resolved event after HandlerResolution,
/// the outcome just before ResolutionExecution.
pub struct ExecutionContext {
    request: Arc<Request>,
    response: Response,
    stage: LifecycleStage,
    action_ctx: ActionBeanContext,
    bean: Option<BeanHandle>,
    registered: Option<Arc<RegisteredHandler>>,
    live_binding: Option<LiveBinding>,
    handler_event: Option<String>,
    resolution: Option<Resolution>,
    resolution_from_handler: bool,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(request: Arc<Request>, response: Response) -> Self {
        let action_ctx = ActionBeanContext::new(Arc::clone(&request), response.clone());
        ExecutionContext {
            request,
            response,
            stage: LifecycleStage::RequestInit,
            action_ctx,
            bean: None,
            registered: None,
            live_binding: None,
            handler_event: None,
            resolution: None,
            resolution_from_handler: false,
        }
    }

    #[must_use]
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// The stage currently being processed; always set before any
    /// interceptor runs, so multi-stage interceptors can tell which stage
    /// they are wrapping.
    #[must_use]
    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    pub fn set_stage(&mut self, stage: LifecycleStage) {
        debug!(stage = %stage, "Transitioning to lifecycle stage");
        self.stage = stage;
    }

    #[must_use]
    pub fn action_context(&self) -> &ActionBeanContext {
        &self.action_ctx
    }

    pub fn action_context_mut(&mut self) -> &mut ActionBeanContext {
        &mut self.action_ctx
    }

    /// The handler instance, available after ActionBeanResolution.
    #[must_use]
    pub fn bean(&self) -> Option<&BeanHandle> {
        self.bean.as_ref()
    }

    pub fn set_bean(&mut self, bean: BeanHandle) {
        self.bean = Some(bean);
    }

    /// The handler registration, available after ActionBeanResolution.
    #[must_use]
    pub fn registered(&self) -> Option<&Arc<RegisteredHandler>> {
        self.registered.as_ref()
    }

    pub fn set_registered(&mut self, registered: Arc<RegisteredHandler>) {
        self.registered = Some(registered);
    }

    /// The binding evaluated against this request's path.
    #[must_use]
    pub fn live_binding(&self) -> Option<&LiveBinding> {
        self.live_binding.as_ref()
    }

    pub fn set_live_binding(&mut self, live: LiveBinding) {
        self.live_binding = Some(live);
    }

    /// The name of the resolved event method, available after
    /// HandlerResolution.
    #[must_use]
    pub fn handler_event(&self) -> Option<&str> {
        self.handler_event.as_deref()
    }

    pub fn set_handler_event(&mut self, event: String) {
        self.handler_event = Some(event);
    }

    /// The pending outcome; generally populated just before
    /// ResolutionExecution.
    #[must_use]
    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn resolution_mut(&mut self) -> Option<&mut Resolution> {
        self.resolution.as_mut()
    }

    /// Replace the pending outcome. This — before `proceed` — is the only
    /// effective way for an interceptor wrapping ResolutionExecution to
    /// substitute an alternate outcome.
    pub fn set_resolution(&mut self, resolution: Option<Resolution>) {
        self.resolution = resolution;
    }

    pub fn take_resolution(&mut self) -> Option<Resolution> {
        self.resolution.take()
    }

    /// Whether the pending outcome was produced by the handler method
    /// itself rather than by an interceptor or by error handling.
    #[must_use]
    pub fn is_resolution_from_handler(&self) -> bool {
        self.resolution_from_handler
    }

    pub fn set_resolution_from_handler(&mut self, from_handler: bool) {
        self.resolution_from_handler = from_handler;
    }
}

/// The core action a stage runs when every interceptor has proceeded.
pub type StageAction<'t> =
    dyn FnMut(&mut ExecutionContext) -> anyhow::Result<Option<Resolution>> + 't;

/// One traversal of a stage's interceptor chain.
///
/// Holds the chain position; [`proceed`](Self::proceed) invokes the next
/// link, or the stage's core action when the chain is exhausted.
pub struct Invocation<'a> {
    ctx: &'a mut ExecutionContext,
    chain: &'a [Arc<dyn Interceptor>],
    index: usize,
    target: &'a mut StageAction<'a>,
}

impl<'a> Invocation<'a> {
    #[must_use]
    pub fn new(
        ctx: &'a mut ExecutionContext,
        chain: &'a [Arc<dyn Interceptor>],
        target: &'a mut StageAction<'a>,
    ) -> Self {
        Invocation {
            ctx,
            chain,
            index: 0,
            target,
        }
    }

    /// The execution context being processed.
    pub fn context(&mut self) -> &mut ExecutionContext {
        self.ctx
    }

    /// Continue the flow of execution: the next interceptor in the chain
    /// if one remains, otherwise the stage's core action.
    pub fn proceed(&mut self) -> anyhow::Result<Option<Resolution>> {
        if self.index < self.chain.len() {
            let interceptor = Arc::clone(&self.chain[self.index]);
            self.index += 1;
            interceptor.intercept(self)
        } else {
            (self.target)(self.ctx)
        }
    }
}
