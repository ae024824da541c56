use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use http::Method;
use tracing::debug;

use crate::asynch::AsyncCompletion;
use crate::bind::BindingPolicy;
use crate::binding::UrlBindingPattern;
use crate::error::{ConfigError, DispatchError};
use crate::lifecycle::LifecycleStage;
use crate::resolution::Resolution;
use crate::validation::{EventFilter, ValidationState};

use super::core::{ActionBean, ActionBeanContext};
use super::property::PropertyDef;

/// Lifetime of a handler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// One instance per request, discarded at request end.
    #[default]
    Request,
    /// One instance per session, shared across that session's requests.
    Session,
}

/// Error-handling temperament of a handler type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerKind {
    /// Resolution failures propagate as errors; validation failures forward
    /// back to the source page.
    #[default]
    Standard,
    /// Resolution failures become structured 404/405 outcomes; validation
    /// failures become structured 400 bodies.
    Rest,
}

/// Re-export under the name the registration API reads best with:
/// `.when(When::Always)`.
pub type When = ValidationState;

/// Typed dispatch-table entry for a synchronous event handler method.
pub type EventFn = Arc<
    dyn Fn(&mut dyn ActionBean, &mut ActionBeanContext) -> anyhow::Result<Option<Resolution>>
        + Send
        + Sync,
>;

/// Dispatch-table entry for an asynchronous event handler method; invoked
/// on a worker with the completion object instead of returning an outcome.
pub type AsyncEventFn =
    Arc<dyn Fn(&mut dyn ActionBean, &AsyncCompletion) -> anyhow::Result<()> + Send + Sync>;

/// Constructs a fresh handler instance; the pluggable object-construction
/// capability. Failures propagate as fatal construction errors.
pub type ConstructorFn = Arc<dyn Fn() -> anyhow::Result<Box<dyn ActionBean>> + Send + Sync>;

/// The validation-error-handling capability: first chance to turn
/// accumulated errors into an outcome before the engine's own handling.
pub type ErrorHandlerFn = Arc<
    dyn Fn(&mut dyn ActionBean, &mut ActionBeanContext) -> anyhow::Result<Option<Resolution>>
        + Send
        + Sync,
>;

/// A custom validation method body.
pub type ValidationMethodFn =
    Arc<dyn Fn(&mut dyn ActionBean, &mut ActionBeanContext) -> anyhow::Result<()> + Send + Sync>;

/// A before/after lifecycle method body. A returned resolution
/// short-circuits the wrapped stage.
pub type LifecycleMethodFn = Arc<
    dyn Fn(&mut dyn ActionBean, &mut ActionBeanContext) -> anyhow::Result<Option<Resolution>>
        + Send
        + Sync,
>;

#[derive(Clone)]
enum EventCall {
    Sync(EventFn),
    Async(AsyncEventFn),
}

/// One event mapping: a name, the method that answers it, and its
/// per-event dispatch options.
#[derive(Clone)]
pub struct EventDef {
    name: String,
    call: EventCall,
    default: bool,
    verbs: Vec<Method>,
    skip_binding: bool,
    skip_validation: bool,
}

impl EventDef {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.default
    }

    /// Verbs this method declares support for. Empty means all verbs.
    #[must_use]
    pub fn verbs(&self) -> &[Method] {
        &self.verbs
    }

    /// Verb compatibility: no declared verbs means every verb is
    /// supported; a method named identically to the verb is implicitly
    /// exempt from the check.
    #[must_use]
    pub fn supports_verb(&self, method: &Method) -> bool {
        if self.name.eq_ignore_ascii_case(method.as_str()) {
            return true;
        }
        self.verbs.is_empty() || self.verbs.contains(method)
    }

    #[must_use]
    pub fn skips_binding(&self) -> bool {
        self.skip_binding
    }

    #[must_use]
    pub fn skips_validation(&self) -> bool {
        self.skip_validation
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self.call, EventCall::Async(_))
    }

    /// Invoke a synchronous event method. Errors for async events, which
    /// must go through an [`AsyncCompletion`] instead.
    pub fn invoke(
        &self,
        bean: &mut dyn ActionBean,
        ctx: &mut ActionBeanContext,
    ) -> anyhow::Result<Option<Resolution>> {
        match &self.call {
            EventCall::Sync(f) => (**f)(bean, ctx),
            EventCall::Async(_) => Err(anyhow!(
                "event '{}' is asynchronous and cannot be invoked directly",
                self.name
            )),
        }
    }

    /// The async body, when this is an async event.
    #[must_use]
    pub fn async_fn(&self) -> Option<AsyncEventFn> {
        match &self.call {
            EventCall::Async(f) => Some(Arc::clone(f)),
            EventCall::Sync(_) => None,
        }
    }
}

impl std::fmt::Debug for EventDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDef")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("verbs", &self.verbs)
            .field("async", &self.is_async())
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`EventDef`]s.
pub struct Event;

impl Event {
    /// A synchronous event method on handler type `B`.
    #[must_use]
    pub fn new<B, F>(name: &str, method: F) -> EventDef
    where
        B: ActionBean,
        F: Fn(&mut B, &mut ActionBeanContext) -> anyhow::Result<Option<Resolution>>
            + Send
            + Sync
            + 'static,
    {
        let event = name.to_string();
        let call: EventFn = Arc::new(move |bean, ctx| {
            let bean = bean.as_any_mut().downcast_mut::<B>().ok_or_else(|| {
                anyhow!("event '{event}' was registered for a different handler type")
            })?;
            method(bean, ctx)
        });
        EventDef {
            name: name.to_string(),
            call: EventCall::Sync(call),
            default: false,
            verbs: Vec::new(),
            skip_binding: false,
            skip_validation: false,
        }
    }

    /// An asynchronous event method on handler type `B`: invoked on a
    /// worker with the completion object as its argument.
    #[must_use]
    pub fn asynchronous<B, F>(name: &str, method: F) -> EventDef
    where
        B: ActionBean,
        F: Fn(&mut B, &AsyncCompletion) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let event = name.to_string();
        let call: AsyncEventFn = Arc::new(move |bean, completion| {
            let bean = bean.as_any_mut().downcast_mut::<B>().ok_or_else(|| {
                anyhow!("event '{event}' was registered for a different handler type")
            })?;
            method(bean, completion)
        });
        EventDef {
            name: name.to_string(),
            call: EventCall::Async(call),
            default: false,
            verbs: Vec::new(),
            skip_binding: false,
            skip_validation: false,
        }
    }
}

impl EventDef {
    /// Flag this method as the handler's default event.
    #[must_use]
    pub fn default_handler(mut self) -> Self {
        self.default = true;
        self
    }

    /// Declare the verbs this method supports.
    #[must_use]
    pub fn on_verbs<I>(mut self, verbs: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.verbs = verbs.into_iter().collect();
        self
    }

    /// Skip binding and validation entirely for this event.
    #[must_use]
    pub fn skip_binding(mut self) -> Self {
        self.skip_binding = true;
        self
    }

    /// Bind, but skip validation for this event.
    #[must_use]
    pub fn skip_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }
}

/// A registered custom validation method with its ordering and
/// applicability rules.
#[derive(Clone)]
pub struct ValidationMethodDef {
    pub(crate) name: String,
    pub(crate) priority: i32,
    pub(crate) when: ValidationState,
    pub(crate) on: EventFilter,
    pub(crate) call: ValidationMethodFn,
}

impl ValidationMethodDef {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub fn state(&self) -> ValidationState {
        self.when
    }

    #[must_use]
    pub fn applies_to(&self, event: &str) -> bool {
        self.on.applies(event)
    }

    pub fn invoke(
        &self,
        bean: &mut dyn ActionBean,
        ctx: &mut ActionBeanContext,
    ) -> anyhow::Result<()> {
        (*self.call)(bean, ctx)
    }
}

/// Builder for [`ValidationMethodDef`]s.
pub struct ValidationMethod;

impl ValidationMethod {
    #[must_use]
    pub fn new<B, F>(name: &str, method: F) -> ValidationMethodDef
    where
        B: ActionBean,
        F: Fn(&mut B, &mut ActionBeanContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let method_name = name.to_string();
        let call: ValidationMethodFn = Arc::new(move |bean, ctx| {
            let bean = bean.as_any_mut().downcast_mut::<B>().ok_or_else(|| {
                anyhow!("validation method '{method_name}' was registered for a different handler type")
            })?;
            method(bean, ctx)
        });
        ValidationMethodDef {
            name: name.to_string(),
            priority: 0,
            when: ValidationState::Default,
            on: EventFilter::all(),
            call,
        }
    }
}

impl ValidationMethodDef {
    /// Lower priorities run first; ties order by name.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn when(mut self, when: ValidationState) -> Self {
        self.when = when;
        self
    }

    /// Events this method applies to; supports leading-`!` negation.
    #[must_use]
    pub fn on<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.on = EventFilter::new(events);
        self
    }
}

/// Whether a lifecycle method runs before or after its stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    Before,
    After,
}

/// A registered before/after lifecycle method.
#[derive(Clone)]
pub struct LifecycleMethodDef {
    pub(crate) name: String,
    pub(crate) advice: Advice,
    pub(crate) stages: Vec<LifecycleStage>,
    pub(crate) on: EventFilter,
    pub(crate) call: LifecycleMethodFn,
}

impl LifecycleMethodDef {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn advice(&self) -> Advice {
        self.advice
    }

    #[must_use]
    pub fn stages(&self) -> &[LifecycleStage] {
        &self.stages
    }

    #[must_use]
    pub fn applies_to(&self, event: &str) -> bool {
        self.on.applies(event)
    }

    pub fn invoke(
        &self,
        bean: &mut dyn ActionBean,
        ctx: &mut ActionBeanContext,
    ) -> anyhow::Result<Option<Resolution>> {
        (*self.call)(bean, ctx)
    }
}

/// Builder for [`LifecycleMethodDef`]s.
pub struct LifecycleMethod;

impl LifecycleMethod {
    /// A method to run before the given stage.
    #[must_use]
    pub fn before<B, F>(name: &str, stage: LifecycleStage, method: F) -> LifecycleMethodDef
    where
        B: ActionBean,
        F: Fn(&mut B, &mut ActionBeanContext) -> anyhow::Result<Option<Resolution>>
            + Send
            + Sync
            + 'static,
    {
        Self::build::<B, F>(name, Advice::Before, stage, method)
    }

    /// A method to run after the given stage.
    #[must_use]
    pub fn after<B, F>(name: &str, stage: LifecycleStage, method: F) -> LifecycleMethodDef
    where
        B: ActionBean,
        F: Fn(&mut B, &mut ActionBeanContext) -> anyhow::Result<Option<Resolution>>
            + Send
            + Sync
            + 'static,
    {
        Self::build::<B, F>(name, Advice::After, stage, method)
    }

    fn build<B, F>(
        name: &str,
        advice: Advice,
        stage: LifecycleStage,
        method: F,
    ) -> LifecycleMethodDef
    where
        B: ActionBean,
        F: Fn(&mut B, &mut ActionBeanContext) -> anyhow::Result<Option<Resolution>>
            + Send
            + Sync
            + 'static,
    {
        let method_name = name.to_string();
        let call: LifecycleMethodFn = Arc::new(move |bean, ctx| {
            let bean = bean.as_any_mut().downcast_mut::<B>().ok_or_else(|| {
                anyhow!("lifecycle method '{method_name}' was registered for a different handler type")
            })?;
            method(bean, ctx)
        });
        LifecycleMethodDef {
            name: name.to_string(),
            advice,
            stages: vec![stage],
            on: EventFilter::all(),
            call,
        }
    }
}

impl LifecycleMethodDef {
    /// Run at additional stages beyond the one given at construction.
    #[must_use]
    pub fn and_stage(mut self, stage: LifecycleStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Events this method applies to; supports leading-`!` negation.
    #[must_use]
    pub fn on<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.on = EventFilter::new(events);
        self
    }
}

/// Everything the engine knows about one handler type. Built once at
/// startup, immutable afterwards, shared by `Arc`.
pub struct HandlerSpec {
    name: String,
    pattern: Option<UrlBindingPattern>,
    scope: Scope,
    kind: HandlerKind,
    constructor: ConstructorFn,
    events: Vec<EventDef>,
    default_event: Option<String>,
    properties: Vec<PropertyDef>,
    validation_methods: Vec<ValidationMethodDef>,
    lifecycle_methods: Vec<LifecycleMethodDef>,
    wizard_start_events: Option<Vec<String>>,
    policy: BindingPolicy,
    error_handler: Option<ErrorHandlerFn>,
}

impl HandlerSpec {
    /// Start a spec for handler type `B`, constructed via `Default`.
    #[must_use]
    pub fn of<B>(name: &str) -> HandlerSpecBuilder
    where
        B: ActionBean + Default,
    {
        HandlerSpecBuilder::new(name).with_constructor(Arc::new(|| {
            Ok(Box::new(B::default()) as Box<dyn ActionBean>)
        }))
    }

    /// Start a spec primed with another spec's registrations. Later
    /// registrations with the same name override the inherited ones while
    /// keeping base-first order — the inheritance-precedence rule.
    #[must_use]
    pub fn extending(name: &str, parent: &HandlerSpec) -> HandlerSpecBuilder {
        let mut builder = HandlerSpecBuilder::new(name).with_constructor(Arc::clone(&parent.constructor));
        builder.pattern_source = parent.pattern.as_ref().map(|p| p.to_string());
        builder.scope = parent.scope;
        builder.kind = parent.kind;
        builder.events = parent.events.clone();
        builder.inherited_events = parent.events.iter().map(|e| e.name.clone()).collect();
        builder.inherited_default = parent.events.iter().any(EventDef::is_default);
        builder.properties = parent.properties.clone();
        builder.validation_methods = parent.validation_methods.clone();
        builder.lifecycle_methods = parent.lifecycle_methods.clone();
        builder.wizard_start_events = parent.wizard_start_events.clone();
        builder.policy = parent.policy.clone();
        builder.error_handler = parent.error_handler.as_ref().map(Arc::clone);
        builder
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared binding pattern, when one was registered. Specs without
    /// one get a synthesized binding from the resolver.
    #[must_use]
    pub fn pattern(&self) -> Option<&UrlBindingPattern> {
        self.pattern.as_ref()
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    #[must_use]
    pub fn is_rest(&self) -> bool {
        self.kind == HandlerKind::Rest
    }

    /// Construct a fresh instance via the object-construction capability.
    pub fn construct(&self) -> anyhow::Result<Box<dyn ActionBean>> {
        (*self.constructor)()
    }

    #[must_use]
    pub fn event(&self, name: &str) -> Option<&EventDef> {
        self.events.iter().find(|e| e.name == name)
    }

    #[must_use]
    pub fn events(&self) -> &[EventDef] {
        &self.events
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|e| e.name.as_str())
    }

    /// The default event method: the sole method if only one exists,
    /// otherwise the method flagged default. Absence of a determinable
    /// default is a resolution-time error.
    pub fn default_event(&self) -> Result<&EventDef, DispatchError> {
        self.default_event
            .as_deref()
            .and_then(|name| self.event(name))
            .ok_or_else(|| DispatchError::NoDefaultHandler {
                handler: self.name.clone(),
            })
    }

    /// The default event's name, when one is determinable.
    #[must_use]
    pub fn default_event_name(&self) -> Option<&str> {
        self.default_event.as_deref()
    }

    #[must_use]
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Custom validation methods, pre-sorted by (priority, name).
    #[must_use]
    pub fn validation_methods(&self) -> &[ValidationMethodDef] {
        &self.validation_methods
    }

    #[must_use]
    pub fn lifecycle_methods(&self) -> &[LifecycleMethodDef] {
        &self.lifecycle_methods
    }

    #[must_use]
    pub fn is_wizard(&self) -> bool {
        self.wizard_start_events.is_some()
    }

    /// Events that may legitimately start a wizard flow without a sealed
    /// fields-present manifest.
    #[must_use]
    pub fn wizard_start_events(&self) -> &[String] {
        self.wizard_start_events.as_deref().unwrap_or(&[])
    }

    #[must_use]
    pub fn policy(&self) -> &BindingPolicy {
        &self.policy
    }

    #[must_use]
    pub fn error_handler(&self) -> Option<&ErrorHandlerFn> {
        self.error_handler.as_ref()
    }
}

impl std::fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_ref().map(ToString::to_string))
            .field("scope", &self.scope)
            .field("kind", &self.kind)
            .field("events", &self.events.len())
            .field("properties", &self.properties.len())
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`HandlerSpec`]s; see the module docs for the shape
/// of a registration.
pub struct HandlerSpecBuilder {
    name: String,
    pattern_source: Option<String>,
    scope: Scope,
    kind: HandlerKind,
    constructor: Option<ConstructorFn>,
    events: Vec<EventDef>,
    inherited_events: HashSet<String>,
    inherited_default: bool,
    properties: Vec<PropertyDef>,
    validation_methods: Vec<ValidationMethodDef>,
    lifecycle_methods: Vec<LifecycleMethodDef>,
    wizard_start_events: Option<Vec<String>>,
    policy: BindingPolicy,
    error_handler: Option<ErrorHandlerFn>,
}

impl HandlerSpecBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        HandlerSpecBuilder {
            name: name.to_string(),
            pattern_source: None,
            scope: Scope::Request,
            kind: HandlerKind::Standard,
            constructor: None,
            events: Vec::new(),
            inherited_events: HashSet::new(),
            inherited_default: false,
            properties: Vec::new(),
            validation_methods: Vec::new(),
            lifecycle_methods: Vec::new(),
            wizard_start_events: None,
            policy: BindingPolicy::default(),
            error_handler: None,
        }
    }

    /// Replace the object-construction capability for this handler type.
    #[must_use]
    pub fn with_constructor(mut self, constructor: ConstructorFn) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Declare the URL binding pattern. Without one, the resolver
    /// synthesizes a binding from the spec name at registration.
    #[must_use]
    pub fn binding(mut self, pattern: &str) -> Self {
        self.pattern_source = Some(pattern.to_string());
        self
    }

    /// One instance per session instead of per request.
    #[must_use]
    pub fn session_scope(mut self) -> Self {
        self.scope = Scope::Session;
        self
    }

    /// REST-style error behavior: structured status-coded outcomes instead
    /// of propagated errors and page forwards.
    #[must_use]
    pub fn rest(mut self) -> Self {
        self.kind = HandlerKind::Rest;
        self
    }

    /// Wizard mode: submissions outside the start events absolutely require
    /// the sealed fields-present manifest.
    #[must_use]
    pub fn wizard<I, S>(mut self, start_events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.wizard_start_events = Some(
            start_events
                .into_iter()
                .map(|e| e.as_ref().to_string())
                .collect(),
        );
        self
    }

    /// Register an event method. Re-registering a name inherited from a
    /// parent spec overrides it in place; a newly-flagged default displaces
    /// an inherited one.
    #[must_use]
    pub fn event(mut self, event: EventDef) -> Self {
        if event.default && self.inherited_default {
            for existing in &mut self.events {
                existing.default = false;
            }
            self.inherited_default = false;
        }
        if let Some(slot) = self.events.iter().position(|e| e.name == event.name) {
            // Overriding an inherited entry is the inheritance rule;
            // anything else is a duplicate caught at build().
            if self.inherited_events.remove(&event.name) {
                self.events[slot] = event;
                return self;
            }
        }
        self.events.push(event);
        self
    }

    /// Register a bindable property.
    #[must_use]
    pub fn property(mut self, property: PropertyDef) -> Self {
        if let Some(slot) = self
            .properties
            .iter()
            .position(|p| p.name() == property.name())
        {
            self.properties[slot] = property;
        } else {
            self.properties.push(property);
        }
        self
    }

    /// Register a custom validation method.
    #[must_use]
    pub fn validation_method(mut self, method: ValidationMethodDef) -> Self {
        if let Some(slot) = self
            .validation_methods
            .iter()
            .position(|m| m.name == method.name)
        {
            self.validation_methods[slot] = method;
        } else {
            self.validation_methods.push(method);
        }
        self
    }

    /// Register a before/after lifecycle method.
    #[must_use]
    pub fn lifecycle_method(mut self, method: LifecycleMethodDef) -> Self {
        if let Some(slot) = self
            .lifecycle_methods
            .iter()
            .position(|m| m.name == method.name && m.advice == method.advice)
        {
            self.lifecycle_methods[slot] = method;
        } else {
            self.lifecycle_methods.push(method);
        }
        self
    }

    /// Restrict which parameters may bind onto this handler type.
    #[must_use]
    pub fn policy(mut self, policy: BindingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Give the handler first chance at turning accumulated validation
    /// errors into an outcome.
    #[must_use]
    pub fn on_validation_errors(mut self, handler: ErrorHandlerFn) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Validate the registrations and produce the immutable spec.
    ///
    /// Duplicate event names and duplicate default flags within this
    /// builder (overrides of inherited entries excepted) are fatal
    /// configuration errors, as is an empty event table.
    pub fn build(self) -> Result<Arc<HandlerSpec>, ConfigError> {
        let mut seen = HashSet::new();
        for event in &self.events {
            if !seen.insert(event.name.clone()) {
                return Err(ConfigError::DuplicateEvent {
                    handler: self.name.clone(),
                    event: event.name.clone(),
                });
            }
        }
        if self.events.is_empty() {
            return Err(ConfigError::NoEvents {
                handler: self.name.clone(),
            });
        }

        let defaults: Vec<&EventDef> = self.events.iter().filter(|e| e.default).collect();
        if defaults.len() > 1 {
            return Err(ConfigError::DuplicateDefault {
                handler: self.name.clone(),
            });
        }

        // The sole method is the default without needing a flag.
        let default_event = if self.events.len() == 1 {
            Some(self.events[0].name.clone())
        } else {
            defaults.first().map(|e| e.name.clone())
        };

        let pattern = match &self.pattern_source {
            Some(source) => Some(UrlBindingPattern::parse(source)?),
            None => None,
        };

        let mut validation_methods = self.validation_methods;
        validation_methods.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.name.cmp(&b.name))
        });

        let constructor = self.constructor.ok_or_else(|| ConfigError::NoEvents {
            handler: self.name.clone(),
        })?;

        debug!(
            handler = %self.name,
            events = self.events.len(),
            properties = self.properties.len(),
            default = ?default_event,
            "Handler spec built"
        );

        Ok(Arc::new(HandlerSpec {
            name: self.name,
            pattern,
            scope: self.scope,
            kind: self.kind,
            constructor,
            events: self.events,
            default_event,
            properties: self.properties,
            validation_methods,
            lifecycle_methods: self.lifecycle_methods,
            wizard_start_events: self.wizard_start_events,
            policy: self.policy,
            error_handler: self.error_handler,
        }))
    }
}
