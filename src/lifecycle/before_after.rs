use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::handler::{Advice, HandlerSpec, LifecycleMethodDef};
use crate::resolution::Resolution;

use super::context::{Interceptor, Invocation};
use super::stage::LifecycleStage;

/// Built-in interceptor running the before/after methods declared on
/// handler specs.
///
/// Before-methods run ahead of the wrapped stage, after-methods behind it;
/// either may short-circuit by returning a resolution. Applicability per
/// event follows the same `!`-negation rule as custom validation, and a
/// method is simply skipped while the event name is still unresolved.
///
/// The per-handler split of methods by stage is computed lazily on first
/// use and cached; the cache tolerates concurrent first access from
/// multiple request threads (worst case the split is computed twice, both
/// computations being identical).
pub struct BeforeAfterInterceptor {
    cache: DashMap<String, Arc<FilterMethods>>,
}

struct FilterMethods {
    before: HashMap<LifecycleStage, Vec<LifecycleMethodDef>>,
    after: HashMap<LifecycleStage, Vec<LifecycleMethodDef>>,
}

impl FilterMethods {
    fn build(spec: &HandlerSpec) -> Self {
        let mut before: HashMap<LifecycleStage, Vec<LifecycleMethodDef>> = HashMap::new();
        let mut after: HashMap<LifecycleStage, Vec<LifecycleMethodDef>> = HashMap::new();

        for method in spec.lifecycle_methods() {
            for stage in method.stages() {
                match method.advice() {
                    Advice::Before => {
                        if *stage == LifecycleStage::ActionBeanResolution {
                            // There is no handler instance yet before this
                            // stage, so the method could never run.
                            warn!(
                                handler = spec.name(),
                                method = method.name(),
                                "Before-methods cannot wrap ActionBeanResolution; skipping"
                            );
                            continue;
                        }
                        before.entry(*stage).or_default().push(method.clone());
                    }
                    Advice::After => {
                        after.entry(*stage).or_default().push(method.clone());
                    }
                }
            }
        }

        FilterMethods { before, after }
    }

    fn before(&self, stage: LifecycleStage) -> &[LifecycleMethodDef] {
        self.before.get(&stage).map_or(&[], Vec::as_slice)
    }

    fn after(&self, stage: LifecycleStage) -> &[LifecycleMethodDef] {
        self.after.get(&stage).map_or(&[], Vec::as_slice)
    }
}

impl BeforeAfterInterceptor {
    #[must_use]
    pub fn new() -> Self {
        BeforeAfterInterceptor {
            cache: DashMap::new(),
        }
    }

    fn filter_methods(&self, key: &str, spec: &HandlerSpec) -> Arc<FilterMethods> {
        Arc::clone(
            &self
                .cache
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(FilterMethods::build(spec))),
        )
    }
}

impl Default for BeforeAfterInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

const INTERCEPTED_STAGES: [LifecycleStage; 6] = [
    LifecycleStage::ActionBeanResolution,
    LifecycleStage::HandlerResolution,
    LifecycleStage::BindingAndValidation,
    LifecycleStage::CustomValidation,
    LifecycleStage::EventHandling,
    LifecycleStage::ResolutionExecution,
];

impl Interceptor for BeforeAfterInterceptor {
    fn intercepts(&self) -> &[LifecycleStage] {
        &INTERCEPTED_STAGES
    }

    fn intercept(&self, invocation: &mut Invocation<'_>) -> anyhow::Result<Option<Resolution>> {
        let stage = invocation.context().stage();

        // Before-methods, as long as there is a handler to run them on.
        if let Some((bean, methods)) = self.current_methods(invocation) {
            let event = invocation
                .context()
                .action_context()
                .event_name()
                .map(String::from);
            for method in methods.before(stage) {
                let applies = event.as_deref().is_none_or(|e| method.applies_to(e));
                if !applies {
                    continue;
                }
                debug!(method = method.name(), stage = %stage, "Calling before-method");
                let resolution = {
                    let mut guard = bean.lock().unwrap_or_else(|e| e.into_inner());
                    method.invoke(guard.as_mut(), invocation.context().action_context_mut())?
                };
                if resolution.is_some() {
                    return Ok(resolution);
                }
            }
        }

        // Continue on through other interceptors and the stage itself.
        let resolution = invocation.proceed()?;

        // After-methods; the event name is re-read since HandlerResolution
        // may have just produced it.
        if let Some((bean, methods)) = self.current_methods(invocation) {
            let event = invocation
                .context()
                .action_context()
                .event_name()
                .map(String::from);
            for method in methods.after(stage) {
                let applies = event.as_deref().is_none_or(|e| method.applies_to(e));
                if !applies {
                    continue;
                }
                debug!(method = method.name(), stage = %stage, "Calling after-method");
                let override_resolution = {
                    let mut guard = bean.lock().unwrap_or_else(|e| e.into_inner());
                    method.invoke(guard.as_mut(), invocation.context().action_context_mut())?
                };
                if override_resolution.is_some() {
                    return Ok(override_resolution);
                }
            }
        }

        Ok(resolution)
    }
}

impl BeforeAfterInterceptor {
    fn current_methods(
        &self,
        invocation: &mut Invocation<'_>,
    ) -> Option<(crate::handler::BeanHandle, Arc<FilterMethods>)> {
        let ctx = invocation.context();
        let bean = Arc::clone(ctx.bean()?);
        let registered = ctx.registered()?;
        let methods = self.filter_methods(&registered.canonical, &registered.spec);
        Some((bean, methods))
    }
}
