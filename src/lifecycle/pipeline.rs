use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, error, info, warn};

use crate::asynch::{AsyncCompletion, AsyncExecutor, CoroutineExecutor};
use crate::bind::PropertyBinder;
use crate::constants;
use crate::convert::TypeConverterRegistry;
use crate::error::DispatchError;
use crate::handler::EventDef;
use crate::resolution::{error_report, Resolution};
use crate::resolver::ActionResolver;
use crate::runtime_config::RuntimeOverrides;
use crate::server::{Attribute, Request, Response};
use crate::validation::html_encode;

use super::before_after::BeforeAfterInterceptor;
use super::context::{ExecutionContext, Interceptor, Invocation, StageAction};
use super::stage::LifecycleStage;

/// Collaborator handed any error that escapes the pipeline's outermost
/// boundary, already unwrapped to its root cause.
pub trait ExceptionHandler: Send + Sync {
    fn handle(&self, error: &DispatchError, request: &Arc<Request>, response: &Response);
}

/// Default boundary behavior: log the failure and emit a 500 if the
/// response is still open.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExceptionHandler;

impl ExceptionHandler for DefaultExceptionHandler {
    fn handle(&self, err: &DispatchError, request: &Arc<Request>, response: &Response) {
        error!(
            request_id = %request.id(),
            path = request.path(),
            error = %err,
            "Request processing failed"
        );
        if !response.is_committed() {
            response.send_error(500, "Internal error processing request");
        }
    }
}

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The request ran to RequestComplete on the calling thread.
    Completed,
    /// EventHandling produced a suspended outcome; ResolutionExecution ran,
    /// but cleanup and RequestComplete are deferred to the async
    /// completion.
    Suspended,
}

struct PipelineInner {
    resolver: Arc<ActionResolver>,
    binder: Arc<PropertyBinder>,
    interceptors: HashMap<LifecycleStage, Vec<Arc<dyn Interceptor>>>,
    executor: Arc<dyn AsyncExecutor>,
    exception_handler: Arc<dyn ExceptionHandler>,
    always_invoke_validate: bool,
    async_timeout: Duration,
}

/// The top-level dispatch state machine.
///
/// Sequences one request through
/// `RequestInit → ActionBeanResolution → HandlerResolution →
/// BindingAndValidation → CustomValidation → ValidationErrorHandling →
/// EventHandling → ResolutionExecution → RequestComplete`, each stage
/// wrapped by its interceptor chain. Any stage producing an outcome skips
/// the remaining ordinary stages and jumps to ResolutionExecution.
#[derive(Clone)]
pub struct DispatchPipeline {
    inner: Arc<PipelineInner>,
}

impl DispatchPipeline {
    #[must_use]
    pub fn builder(resolver: Arc<ActionResolver>) -> DispatchPipelineBuilder {
        DispatchPipelineBuilder::new(resolver)
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<ActionResolver> {
        &self.inner.resolver
    }

    #[must_use]
    pub fn binder(&self) -> &Arc<PropertyBinder> {
        &self.inner.binder
    }

    /// Dispatch one request.
    ///
    /// Returns [`DispatchOutcome::Suspended`] when an asynchronous event
    /// engaged; the response is then completed later by the worker, and
    /// RequestComplete runs from the completion's cleanup callback. Errors
    /// have already been handed to the exception-handling collaborator
    /// when this returns `Err`.
    pub fn dispatch(
        &self,
        request: Arc<Request>,
        response: Response,
    ) -> Result<DispatchOutcome, DispatchError> {
        info!(
            request_id = %request.id(),
            method = %request.method(),
            path = request.path(),
            "Dispatching request"
        );

        let mut ctx = ExecutionContext::new(Arc::clone(&request), response.clone());
        save_action_bean(&request);

        let resolution = match self.run_stages(&mut ctx) {
            Ok(resolution) => resolution,
            Err(e) => {
                let err = to_dispatch_error(e);
                self.inner.exception_handler.handle(&err, &request, &response);
                self.request_complete(&mut ctx);
                restore_action_bean(&request);
                return Err(err);
            }
        };

        if let Some(resolution) = resolution {
            let completion = match &resolution {
                Resolution::Async(completion) => Some(completion.clone()),
                _ => None,
            };

            if let Err(e) = self.execute_resolution(&mut ctx, resolution) {
                let err = to_dispatch_error(e);
                self.inner.exception_handler.handle(&err, &request, &response);
                self.request_complete(&mut ctx);
                restore_action_bean(&request);
                return Err(err);
            }

            if let Some(completion) = completion {
                // Cleanup is deferred to async processing: the completion
                // runs it exactly once whenever completion, timeout, or
                // error arrives — even if that already happened.
                let pipeline = self.clone();
                let cleanup_request = Arc::clone(&request);
                let ctx_cell = Mutex::new(Some(ctx));
                completion.set_cleanup(Box::new(move || {
                    debug!("Running deferred async request cleanup");
                    if let Some(mut ctx) =
                        ctx_cell.lock().unwrap_or_else(|e| e.into_inner()).take()
                    {
                        pipeline.request_complete(&mut ctx);
                    }
                    restore_action_bean(&cleanup_request);
                }));
                return Ok(DispatchOutcome::Suspended);
            }
        }

        self.request_complete(&mut ctx);
        restore_action_bean(&request);
        Ok(DispatchOutcome::Completed)
    }

    /// The ordinary stages, in order, stopping at the first outcome.
    fn run_stages(
        &self,
        ctx: &mut ExecutionContext,
    ) -> anyhow::Result<Option<Resolution>> {
        let mut resolution = self.request_init(ctx)?;
        if resolution.is_none() {
            resolution = self.resolve_action_bean(ctx)?;
        }
        if resolution.is_none() {
            resolution = self.resolve_handler(ctx)?;
        }
        if resolution.is_none() {
            resolution = self.binding_and_validation(ctx)?;
        }
        if resolution.is_none() {
            resolution = self.custom_validation(ctx)?;
        }
        if resolution.is_none() {
            resolution = self.handle_validation_errors(ctx)?;
        }
        if resolution.is_none() {
            resolution = self.invoke_event_handler(ctx)?;
        }
        Ok(resolution)
    }

    fn run_stage(
        &self,
        ctx: &mut ExecutionContext,
        stage: LifecycleStage,
        target: &mut StageAction<'_>,
    ) -> anyhow::Result<Option<Resolution>> {
        ctx.set_stage(stage);
        let chain = self
            .inner
            .interceptors
            .get(&stage)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let mut invocation = Invocation::new(ctx, chain, target);
        invocation.proceed()
    }

    /// RequestInit exists purely as an interception point.
    fn request_init(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Option<Resolution>> {
        self.run_stage(ctx, LifecycleStage::RequestInit, &mut |_ctx| Ok(None))
    }

    /// Resolve the handler instance and register it as the request's
    /// current handler.
    fn resolve_action_bean(
        &self,
        ctx: &mut ExecutionContext,
    ) -> anyhow::Result<Option<Resolution>> {
        let resolver = Arc::clone(&self.inner.resolver);
        self.run_stage(ctx, LifecycleStage::ActionBeanResolution, &mut |ctx| {
            let (bean, registered) = resolver.resolve_bean(ctx.action_context())?;

            let live = registered.pattern.evaluate(ctx.request().path());
            ctx.request().set_attribute(
                constants::REQ_ATTR_ACTION_BEAN,
                Attribute::Bean(Arc::clone(&bean)),
            );

            ctx.set_bean(bean);
            ctx.set_live_binding(live);
            ctx.set_registered(registered);
            Ok(None)
        })
    }

    /// Resolve the event name, then the event method. REST-style handlers
    /// turn resolution failures into 404 outcomes; ordinary handlers let
    /// them propagate.
    fn resolve_handler(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Option<Resolution>> {
        let resolver = Arc::clone(&self.inner.resolver);
        self.run_stage(ctx, LifecycleStage::HandlerResolution, &mut |ctx| {
            let registered = Arc::clone(
                ctx.registered()
                    .ok_or_else(|| anyhow!("handler was not resolved"))?,
            );
            let spec = &registered.spec;

            let event =
                resolver.event_name(spec, ctx.action_context(), ctx.live_binding())?;
            ctx.action_context_mut().set_event_name(event.clone());

            let resolved = match &event {
                Some(event) => resolver.handler(spec, event),
                None if spec.is_rest() => {
                    // With no named event, a REST handler falls back to
                    // the HTTP verb itself as the event name.
                    let verb = ctx.request().method().as_str().to_ascii_lowercase();
                    resolver.handler(spec, &verb)
                }
                None => resolver.default_handler(spec),
            };

            let def = match resolved {
                Ok(def) => def,
                Err(e) if spec.is_rest() => {
                    error!(
                        handler = spec.name(),
                        event = ?event,
                        method = %ctx.request().method(),
                        "No handler method found for REST request"
                    );
                    return Ok(Some(Resolution::error(404, &e.to_string())));
                }
                Err(e) => return Err(e.into()),
            };

            debug!(
                handler = spec.name(),
                event = def.name(),
                method = %ctx.request().method(),
                "Resolved event"
            );

            let name = def.name().to_string();
            ctx.action_context_mut().set_event_name(Some(name.clone()));
            ctx.set_handler_event(name);
            Ok(None)
        })
    }

    /// Delegate to the property binder, unless the resolved method skips
    /// binding; validation alone can also be skipped per method.
    fn binding_and_validation(
        &self,
        ctx: &mut ExecutionContext,
    ) -> anyhow::Result<Option<Resolution>> {
        let (do_bind, do_validate) = match self.resolved_event(ctx) {
            Some(def) => (!def.skips_binding(), !def.skips_binding() && !def.skips_validation()),
            None => (true, true),
        };
        let binder = Arc::clone(&self.inner.binder);

        self.run_stage(ctx, LifecycleStage::BindingAndValidation, &mut |ctx| {
            if !do_bind {
                return Ok(None);
            }
            let registered = Arc::clone(
                ctx.registered()
                    .ok_or_else(|| anyhow!("handler was not resolved"))?,
            );
            let bean = Arc::clone(
                ctx.bean().ok_or_else(|| anyhow!("handler was not resolved"))?,
            );
            let live = ctx.live_binding().cloned();

            {
                let mut guard = bean.lock().unwrap_or_else(|e| e.into_inner());
                binder.bind(
                    &registered.spec,
                    live.as_ref(),
                    guard.as_mut(),
                    ctx.action_context_mut(),
                    do_validate,
                )?;
            }

            fill_in_validation_errors(ctx);
            Ok(None)
        })
    }

    /// Run the spec's custom validation methods, in (priority, name) order,
    /// honoring each method's run-state and event filter.
    fn custom_validation(
        &self,
        ctx: &mut ExecutionContext,
    ) -> anyhow::Result<Option<Resolution>> {
        let run_stage_at_all = match self.resolved_event(ctx) {
            Some(def) => !def.skips_binding() && !def.skips_validation(),
            None => true,
        };
        if !run_stage_at_all {
            return Ok(None);
        }

        let always_invoke = self.inner.always_invoke_validate;
        self.run_stage(ctx, LifecycleStage::CustomValidation, &mut |ctx| {
            let registered = Arc::clone(
                ctx.registered()
                    .ok_or_else(|| anyhow!("handler was not resolved"))?,
            );
            let bean = Arc::clone(
                ctx.bean().ok_or_else(|| anyhow!("handler was not resolved"))?,
            );
            let event = ctx
                .action_context()
                .event_name()
                .unwrap_or_default()
                .to_string();

            for method in registered.spec.validation_methods() {
                let errors_empty = ctx.action_context().validation_errors().is_empty();
                let run = match method.state() {
                    crate::validation::ValidationState::Always => true,
                    crate::validation::ValidationState::Default => always_invoke || errors_empty,
                };
                if !run || !method.applies_to(&event) {
                    continue;
                }

                debug!(method = method.name(), "Running custom validation method");
                let mut guard = bean.lock().unwrap_or_else(|e| e.into_inner());
                method.invoke(guard.as_mut(), ctx.action_context_mut())?;
            }

            fill_in_validation_errors(ctx);
            Ok(None)
        })
    }

    /// Give accumulated errors a chance to produce an outcome: the
    /// handler's own error-handling capability first, then the structured
    /// REST error body or the source-page return.
    fn handle_validation_errors(
        &self,
        ctx: &mut ExecutionContext,
    ) -> anyhow::Result<Option<Resolution>> {
        let do_validate = match self.resolved_event(ctx) {
            Some(def) => !def.skips_validation(),
            None => true,
        };

        self.run_stage(ctx, LifecycleStage::ValidationErrorHandling, &mut |ctx| {
            fill_in_validation_errors(ctx);
            if !do_validate {
                return Ok(None);
            }

            let registered = Arc::clone(
                ctx.registered()
                    .ok_or_else(|| anyhow!("handler was not resolved"))?,
            );
            let bean = Arc::clone(
                ctx.bean().ok_or_else(|| anyhow!("handler was not resolved"))?,
            );
            let spec = &registered.spec;

            let mut resolution: Option<Resolution> = None;
            if !ctx.action_context().validation_errors().is_empty() {
                if let Some(handler) = spec.error_handler() {
                    let handler = Arc::clone(handler);
                    let mut guard = bean.lock().unwrap_or_else(|e| e.into_inner());
                    resolution = (*handler)(guard.as_mut(), ctx.action_context_mut())?;
                    drop(guard);
                    fill_in_validation_errors(ctx);
                }
            }

            if spec.is_rest() {
                if resolution.is_some() {
                    // The handler wanted to deal with the errors itself.
                    return Ok(resolution);
                }
                let errors = ctx.action_context().validation_errors();
                if !errors.is_empty() {
                    debug!(
                        handler = spec.name(),
                        errors = errors.len(),
                        "Returning structured validation error report"
                    );
                    return Ok(Some(error_report(errors, 400)));
                }
                return Ok(None);
            }

            if resolution.is_none() && !ctx.action_context().validation_errors().is_empty() {
                log_validation_errors(ctx);
                resolution = Some(
                    ctx.action_context()
                        .source_page_resolution()
                        .ok_or_else(|| {
                            anyhow!(
                                "validation errors occurred but no source page was supplied \
                                 to return the user to"
                            )
                        })?,
                );
            }

            Ok(resolution)
        })
    }

    /// Verify verb compatibility, then invoke the resolved method — or,
    /// for an async-marked method, construct the suspended outcome
    /// instead.
    fn invoke_event_handler(
        &self,
        ctx: &mut ExecutionContext,
    ) -> anyhow::Result<Option<Resolution>> {
        let executor = Arc::clone(&self.inner.executor);
        let async_timeout = self.inner.async_timeout;

        self.run_stage(ctx, LifecycleStage::EventHandling, &mut |ctx| {
            let registered = Arc::clone(
                ctx.registered()
                    .ok_or_else(|| anyhow!("handler was not resolved"))?,
            );
            let spec = &registered.spec;
            let event_name = ctx
                .handler_event()
                .ok_or_else(|| anyhow!("event method was not resolved"))?
                .to_string();
            let def = spec
                .event(&event_name)
                .ok_or_else(|| anyhow!("event method was not resolved"))?;

            let method = ctx.request().method().clone();
            if !def.supports_verb(&method) {
                let err = DispatchError::VerbMismatch {
                    handler: spec.name().to_string(),
                    event: event_name.clone(),
                    method: method.clone(),
                };
                if spec.is_rest() {
                    error!(handler = spec.name(), event = %event_name, method = %method,
                        "Handler method does not support the request method");
                    return Ok(Some(Resolution::error(405, &err.to_string())));
                }
                return Err(err.into());
            }

            if def.is_async() {
                let event_fn = def
                    .async_fn()
                    .ok_or_else(|| anyhow!("async event without a body"))?;
                let bean = Arc::clone(
                    ctx.bean().ok_or_else(|| anyhow!("handler was not resolved"))?,
                );
                let completion = AsyncCompletion::new(
                    Arc::clone(ctx.request()),
                    ctx.response().clone(),
                    bean,
                    &event_name,
                    event_fn,
                    Arc::clone(&executor),
                    async_timeout,
                )?;
                return Ok(Some(Resolution::Async(completion)));
            }

            debug!(handler = spec.name(), event = %event_name, "Invoking event handler");
            let bean = Arc::clone(
                ctx.bean().ok_or_else(|| anyhow!("handler was not resolved"))?,
            );
            let resolution = {
                let mut guard = bean.lock().unwrap_or_else(|e| e.into_inner());
                def.invoke(guard.as_mut(), ctx.action_context_mut())?
            };

            fill_in_validation_errors(ctx);

            if resolution.is_some() {
                ctx.set_resolution_from_handler(true);
            }
            Ok(resolution)
        })
    }

    /// Execute the outcome against the response, wrapped by the
    /// ResolutionExecution interceptor chain. A resolution *returned* by
    /// one of those interceptors is ineffective by construction and is
    /// logged as such.
    fn execute_resolution(
        &self,
        ctx: &mut ExecutionContext,
        resolution: Resolution,
    ) -> anyhow::Result<()> {
        ctx.set_resolution(Some(resolution));

        let returned = self.run_stage(ctx, LifecycleStage::ResolutionExecution, &mut |ctx| {
            let request = Arc::clone(ctx.request());
            let response = ctx.response().clone();
            if let Some(resolution) = ctx.resolution_mut() {
                resolution
                    .execute(&request, &response)
                    .map_err(|e| match e.downcast::<DispatchError>() {
                        Ok(dispatch) => anyhow::Error::new(dispatch),
                        Err(other) => anyhow::Error::new(DispatchError::Resolution(other)),
                    })?;
            }
            Ok(None)
        })?;

        if returned.is_some() {
            warn!(
                "An interceptor wrapping ResolutionExecution returned a Resolution. This almost \
                 certainly did NOT have the desired effect: at this stage interceptors run \
                 around the actual execution of the Resolution, so returning an alternate one \
                 stops the original from executing while NOT causing the alternate to execute. \
                 Interceptor code running before proceed() can substitute the outcome by \
                 mutating the pending resolution on the ExecutionContext instead; code running \
                 after proceed() is too late to change what was executed."
            );
        }

        Ok(())
    }

    /// RequestComplete exists purely as an interception point; outcomes
    /// returned from it are too late to execute and are ignored.
    fn request_complete(&self, ctx: &mut ExecutionContext) {
        let result = self.run_stage(ctx, LifecycleStage::RequestComplete, &mut |_ctx| Ok(None));
        match result {
            Ok(Some(_)) => warn!(
                "Resolutions returned from interceptors for RequestComplete are ignored \
                 because it is too late to execute them."
            ),
            Ok(None) => {}
            Err(e) => error!(error = %e, "RequestComplete interceptor failed"),
        }
    }

    fn resolved_event<'c>(&self, ctx: &'c ExecutionContext) -> Option<&'c EventDef> {
        let registered = ctx.registered()?;
        registered.spec.event(ctx.handler_event()?)
    }
}

/// Finalize validation errors: attach the owning handler's binding path,
/// and HTML-encode the raw submitted value when no value was already set
/// on the error. Each error is finalized only once, no matter how often
/// this runs.
fn fill_in_validation_errors(ctx: &mut ExecutionContext) {
    let Some(registered) = ctx.registered().map(Arc::clone) else {
        return;
    };
    if ctx.action_context().validation_errors().is_empty() {
        return;
    }

    let request = Arc::clone(ctx.request());
    for (field, errors) in ctx.action_context_mut().validation_errors_mut().iter_mut() {
        for err in errors.iter_mut() {
            if err.action_path.is_some() {
                continue;
            }
            err.action_path = Some(registered.canonical.clone());
            if err.field_value.is_none() {
                err.field_value = request.parameter(field).map(html_encode);
            }
        }
    }
}

fn log_validation_errors(ctx: &ExecutionContext) {
    let errors = ctx.action_context().validation_errors();
    for (field, list) in errors.iter() {
        for err in list {
            debug!(
                field,
                message = %err.render_message(),
                "Validation error needs to be fixed"
            );
        }
    }
}

/// Stash the current handler attribute on a stack so nested dispatch can
/// restore it afterwards.
fn save_action_bean(request: &Arc<Request>) {
    if let Some(bean) = request.bean_attribute(constants::REQ_ATTR_ACTION_BEAN) {
        request.push_bean_stack(constants::REQ_ATTR_ACTION_BEAN_STACK, bean);
    }
}

fn restore_action_bean(request: &Arc<Request>) {
    if let Some(bean) = request.pop_bean_stack(constants::REQ_ATTR_ACTION_BEAN_STACK) {
        request.set_attribute(constants::REQ_ATTR_ACTION_BEAN, Attribute::Bean(bean));
    }
}

/// Unwrap an error that escaped a stage to the dispatch taxonomy: an
/// underlying [`DispatchError`] comes back as itself; anything else is a
/// handler failure carrying its root cause.
fn to_dispatch_error(e: anyhow::Error) -> DispatchError {
    match e.downcast::<DispatchError>() {
        Ok(err) => err,
        Err(other) => DispatchError::Handler(other),
    }
}

/// Builds a [`DispatchPipeline`].
///
/// The before/after interceptor is always installed first; additional
/// interceptors wrap stages in registration order after it.
pub struct DispatchPipelineBuilder {
    resolver: Arc<ActionResolver>,
    binder: Option<Arc<PropertyBinder>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    executor: Option<Arc<dyn AsyncExecutor>>,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
    always_invoke_validate: Option<bool>,
    async_timeout: Option<Duration>,
}

impl DispatchPipelineBuilder {
    #[must_use]
    pub fn new(resolver: Arc<ActionResolver>) -> Self {
        DispatchPipelineBuilder {
            resolver,
            binder: None,
            interceptors: Vec::new(),
            executor: None,
            exception_handler: None,
            always_invoke_validate: None,
            async_timeout: None,
        }
    }

    #[must_use]
    pub fn binder(mut self, binder: Arc<PropertyBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Register an interceptor; it wraps every stage its
    /// [`Interceptor::intercepts`] declares.
    #[must_use]
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Replace the async executor (default: coroutine-backed).
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn AsyncExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    #[must_use]
    pub fn exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.exception_handler = Some(handler);
        self
    }

    /// Run Default-state custom validation methods even when errors
    /// already exist.
    #[must_use]
    pub fn always_invoke_validate(mut self, always: bool) -> Self {
        self.always_invoke_validate = Some(always);
        self
    }

    #[must_use]
    pub fn async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn build(self) -> DispatchPipeline {
        let overrides = RuntimeOverrides::from_env();

        let mut interceptors: HashMap<LifecycleStage, Vec<Arc<dyn Interceptor>>> = HashMap::new();
        let before_after: Arc<dyn Interceptor> = Arc::new(BeforeAfterInterceptor::new());
        for interceptor in std::iter::once(&before_after).chain(self.interceptors.iter()) {
            for stage in interceptor.intercepts() {
                interceptors
                    .entry(*stage)
                    .or_default()
                    .push(Arc::clone(interceptor));
            }
        }

        let binder = self.binder.unwrap_or_else(|| {
            Arc::new(PropertyBinder::new(
                TypeConverterRegistry::with_defaults(),
                overrides.manifest_secret.clone(),
            ))
        });

        DispatchPipeline {
            inner: Arc::new(PipelineInner {
                resolver: self.resolver,
                binder,
                interceptors,
                executor: self
                    .executor
                    .unwrap_or_else(|| Arc::new(CoroutineExecutor::new(overrides.async_stack_size))),
                exception_handler: self
                    .exception_handler
                    .unwrap_or_else(|| Arc::new(DefaultExceptionHandler)),
                always_invoke_validate: self
                    .always_invoke_validate
                    .unwrap_or(overrides.always_invoke_validate),
                async_timeout: self
                    .async_timeout
                    .unwrap_or_else(|| Duration::from_millis(overrides.async_timeout_ms)),
            }),
        }
    }
}
