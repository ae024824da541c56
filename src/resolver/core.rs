use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use crate::binding::{LiveBinding, UrlBindingPattern, UrlBindingRegistry};
use crate::constants;
use crate::error::{ConfigError, DispatchError};
use crate::handler::{
    ActionBeanContext, BeanHandle, Event, EventDef, HandlerSpec, HandlerSpecBuilder, Scope,
};
use crate::resolution::Resolution;
use crate::server::{Attribute, Request};

use super::fallback::{view_candidates, DefaultViewBean, ViewLocator};
use super::synthesize_binding;

/// One handler type as registered with the resolver: its spec, its fully
/// resolved binding pattern (with `$event` defaults filled in), and the
/// canonical binding string used as the scope-storage key.
pub struct RegisteredHandler {
    pub spec: Arc<HandlerSpec>,
    pub pattern: Arc<UrlBindingPattern>,
    pub canonical: String,
}

/// The read-mostly lookup tables, swapped atomically when handlers are
/// added at runtime.
struct Tables {
    registry: UrlBindingRegistry,
    by_path: HashMap<String, Arc<RegisteredHandler>>,
}

impl Tables {
    fn build(
        specs: &[Arc<HandlerSpec>],
        base_segments: &[String],
        binding_suffix: &str,
    ) -> Result<Self, ConfigError> {
        let mut registry = UrlBindingRegistry::new();
        let mut by_path = HashMap::new();

        for spec in specs {
            let mut pattern = match spec.pattern() {
                Some(pattern) => pattern.clone(),
                None => {
                    let synthesized =
                        synthesize_binding(spec.name(), base_segments, binding_suffix);
                    UrlBindingPattern::parse(&synthesized)?
                }
            };

            // Second startup phase: a $event default can only be computed
            // once the handler's own default handler is known.
            if pattern.has_event_parameter() {
                let default_event = spec.default_event_name().ok_or_else(|| {
                    ConfigError::NoDefaultForEventParameter {
                        handler: spec.name().to_string(),
                    }
                })?;
                pattern = pattern.with_event_default(default_event);
            }

            let pattern = Arc::new(pattern);
            let canonical = pattern.to_string();
            registry.add(Arc::clone(&pattern))?;

            info!(
                handler = spec.name(),
                binding = %canonical,
                events = spec.events().len(),
                "Handler registered"
            );

            by_path.insert(
                pattern.path().to_string(),
                Arc::new(RegisteredHandler {
                    spec: Arc::clone(spec),
                    pattern,
                    canonical,
                }),
            );
        }

        Ok(Tables { registry, by_path })
    }
}

/// Resolves request paths to handler instances and requests to event
/// methods.
///
/// Built once at startup; the lookup tables are read lock-free through an
/// `ArcSwap` so concurrent requests never contend, while
/// [`ActionResolver::add_handler`] can still swap in additions at runtime.
pub struct ActionResolver {
    tables: ArcSwap<Tables>,
    specs: Mutex<Vec<Arc<HandlerSpec>>>,
    base_segments: Vec<String>,
    binding_suffix: String,
    view_locator: Option<Arc<dyn ViewLocator>>,
    view_suffix: String,
}

impl ActionResolver {
    #[must_use]
    pub fn builder() -> ActionResolverBuilder {
        ActionResolverBuilder::new()
    }

    /// Register an additional handler type after startup. The tables are
    /// rebuilt and swapped atomically; in-flight requests keep reading the
    /// previous tables.
    pub fn add_handler(&self, spec: Arc<HandlerSpec>) -> Result<(), ConfigError> {
        let mut specs = self.specs.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = specs.clone();
        next.push(spec);
        let tables = Tables::build(&next, &self.base_segments, &self.binding_suffix)?;
        *specs = next;
        self.tables.store(Arc::new(tables));
        Ok(())
    }

    /// The canonical binding string for a request path, when one matches.
    #[must_use]
    pub fn binding_from_path(&self, path: &str) -> Option<String> {
        let tables = self.tables.load();
        let pattern = tables.registry.match_path(path)?;
        tables
            .by_path
            .get(pattern.path())
            .map(|reg| reg.canonical.clone())
    }

    /// The registered handler whose binding matches a request path.
    #[must_use]
    pub fn registered_for_path(&self, path: &str) -> Option<Arc<RegisteredHandler>> {
        let tables = self.tables.load();
        let pattern = tables.registry.match_path(path)?;
        tables.by_path.get(pattern.path()).map(Arc::clone)
    }

    /// Match and evaluate the binding for a path, producing the
    /// per-request [`LiveBinding`] alongside the registration.
    #[must_use]
    pub fn live_binding(&self, path: &str) -> Option<(Arc<RegisteredHandler>, LiveBinding)> {
        let registered = self.registered_for_path(path)?;
        let live = registered.pattern.evaluate(path);
        Some((registered, live))
    }

    /// Resolve the handler instance for the current request: look up the
    /// handler type by path, then fetch-or-create the instance in its
    /// declared scope, keyed by the canonical binding string.
    ///
    /// When no handler matches and a view locator is configured, a
    /// same-named view resource is probed for and, if found, answered with
    /// a synthesized view handler instead of a not-found error.
    pub fn resolve_bean(
        &self,
        ctx: &ActionBeanContext,
    ) -> Result<(BeanHandle, Arc<RegisteredHandler>), DispatchError> {
        let request = ctx.request();
        let path = request.path().to_string();

        let registered = match self.registered_for_path(&path) {
            Some(registered) => registered,
            None => self
                .handle_bean_not_found(&path)
                .ok_or(DispatchError::HandlerNotFound { path: path.clone() })?,
        };

        request.set_attribute(
            constants::REQ_ATTR_RESOLVED_BINDING,
            Attribute::Text(registered.canonical.clone()),
        );

        let handle = self.fetch_or_create(&registered, request)?;
        Ok((handle, registered))
    }

    fn fetch_or_create(
        &self,
        registered: &Arc<RegisteredHandler>,
        request: &Arc<Request>,
    ) -> Result<BeanHandle, DispatchError> {
        let key = registered.canonical.as_str();
        let existing = match registered.spec.scope() {
            Scope::Session => request.session().bean(key),
            Scope::Request => request.bean_attribute(key),
        };

        let handle = match existing {
            Some(handle) => handle,
            None => {
                let bean = registered.spec.construct().map_err(|e| {
                    DispatchError::Construction {
                        handler: registered.spec.name().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                let handle: BeanHandle = Arc::new(Mutex::new(bean));
                match registered.spec.scope() {
                    Scope::Session => request.session().set_bean(key, Arc::clone(&handle)),
                    Scope::Request => {
                        request.set_attribute(key, Attribute::Bean(Arc::clone(&handle)));
                    }
                }
                debug!(
                    handler = registered.spec.name(),
                    binding = key,
                    scope = ?registered.spec.scope(),
                    "Handler instance created"
                );
                handle
            }
        };

        // Attach the instance to the current request unless it is already
        // attached to this exact request; re-attaching during nested
        // dispatch of the same instance would clobber its state.
        {
            let mut bean = handle.lock().unwrap_or_else(|e| e.into_inner());
            if !bean.attachment().is_attached_to(request) {
                bean.attachment_mut().attach(Arc::clone(request));
            }
        }

        Ok(handle)
    }

    fn handle_bean_not_found(&self, path: &str) -> Option<Arc<RegisteredHandler>> {
        let locator = self.view_locator.as_ref()?;
        for candidate in view_candidates(path, &self.view_suffix) {
            if locator.exists(&candidate) {
                debug!(
                    path,
                    view = %candidate,
                    "No handler bound; forwarding to same-named view"
                );
                return self.view_registration(path, &candidate);
            }
        }
        None
    }

    fn view_registration(&self, path: &str, view: &str) -> Option<Arc<RegisteredHandler>> {
        let view = view.to_string();
        let spec = HandlerSpecBuilder::new("DefaultViewBean")
            .with_constructor({
                let view = view.clone();
                Arc::new(move || {
                    Ok(Box::new(DefaultViewBean::new(&view)) as Box<dyn crate::handler::ActionBean>)
                })
            })
            .event(Event::new::<DefaultViewBean, _>("view", |bean, _ctx| {
                Ok(Some(Resolution::forward(bean.view())))
            }))
            .build()
            .ok()?;

        let pattern = Arc::new(UrlBindingPattern::parse(path).ok()?);
        Some(Arc::new(RegisteredHandler {
            spec,
            canonical: pattern.to_string(),
            pattern,
        }))
    }

    /// Resolve the event name for the request, in strict order: the
    /// forwarded-event request attribute, the single-valued `_eventName`
    /// parameter naming a known event, exactly one parameter named after a
    /// known event (`name` or `name.x`), then the path segment following
    /// the binding. More than one event-named parameter is a fatal
    /// ambiguity.
    pub fn event_name(
        &self,
        spec: &HandlerSpec,
        ctx: &ActionBeanContext,
        live: Option<&LiveBinding>,
    ) -> Result<Option<String>, DispatchError> {
        let request = ctx.request();

        if let Some(event) = request.text_attribute(constants::REQ_ATTR_EVENT_NAME) {
            return Ok(Some(event));
        }

        if let Some(event) = self.event_name_from_event_param(spec, request) {
            return Ok(Some(event));
        }

        if let Some(event) = self.event_name_from_parameters(spec, request)? {
            return Ok(Some(event));
        }

        Ok(self.event_name_from_path(spec, request, live))
    }

    /// The `_eventName` parameter: honored when single-valued and naming a
    /// known event. Warns when a parameter named after a different event is
    /// also present, since `_eventName` overrides it.
    fn event_name_from_event_param(
        &self,
        spec: &HandlerSpec,
        request: &Arc<Request>,
    ) -> Option<String> {
        let values = request.parameter_values(constants::URL_KEY_EVENT_NAME)?;
        if values.len() != 1 || spec.event(&values[0]).is_none() {
            return None;
        }
        let event = values[0].clone();

        if let Ok(Some(other)) = self.event_name_from_parameters(spec, request) {
            if other != event {
                warn!(
                    chosen = %event,
                    other = %other,
                    "Event named by two request parameters; {} overrides",
                    constants::URL_KEY_EVENT_NAME
                );
            }
        }

        Some(event)
    }

    /// Parameters named after known events (including the `name.x` form
    /// produced by image-button submits). Exactly one may match.
    fn event_name_from_parameters(
        &self,
        spec: &HandlerSpec,
        request: &Arc<Request>,
    ) -> Result<Option<String>, DispatchError> {
        let mut matches: Vec<String> = Vec::new();
        for event in spec.event_names() {
            let image_button = format!("{event}.x");
            if request.parameter_values(event).is_some()
                || request.parameter_values(&image_button).is_some()
            {
                matches.push(event.to_string());
            }
        }

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(DispatchError::AmbiguousEvent { events: matches }),
        }
    }

    /// The path segment immediately following the matched binding, when it
    /// names a known event: the `$event` binding parameter if present,
    /// otherwise the first extra `/`-separated segment.
    fn event_name_from_path(
        &self,
        spec: &HandlerSpec,
        request: &Arc<Request>,
        live: Option<&LiveBinding>,
    ) -> Option<String> {
        let live = live?;

        if let Some(event) = live.event() {
            if spec.event(event).is_some() {
                return Some(event.to_string());
            }
        }

        let prefix = live.pattern().path();
        let path = request.path();
        if path.starts_with(prefix) && path.len() > prefix.len() + 1 {
            let extra = &path[prefix.len() + 1..];
            let segment = extra.split('/').next().unwrap_or_default();
            if spec.event(segment).is_some() {
                return Some(segment.to_string());
            }
        }

        None
    }

    /// Exact lookup of the event method for a named event.
    pub fn handler<'a>(
        &self,
        spec: &'a HandlerSpec,
        event: &str,
    ) -> Result<&'a EventDef, DispatchError> {
        spec.event(event).ok_or_else(|| DispatchError::EventNotFound {
            handler: spec.name().to_string(),
            event: event.to_string(),
        })
    }

    /// The default event method: the sole method if only one exists,
    /// otherwise the one flagged default.
    pub fn default_handler<'a>(
        &self,
        spec: &'a HandlerSpec,
    ) -> Result<&'a EventDef, DispatchError> {
        spec.default_event()
    }
}

/// Builds an [`ActionResolver`] from registered handler specs.
pub struct ActionResolverBuilder {
    specs: Vec<Arc<HandlerSpec>>,
    base_segments: Vec<String>,
    binding_suffix: String,
    view_locator: Option<Arc<dyn ViewLocator>>,
    view_suffix: String,
}

impl ActionResolverBuilder {
    #[must_use]
    pub fn new() -> Self {
        ActionResolverBuilder {
            specs: Vec::new(),
            base_segments: ["web", "www", "app", "handlers"]
                .into_iter()
                .map(String::from)
                .collect(),
            binding_suffix: ".action".to_string(),
            view_locator: None,
            view_suffix: ".html".to_string(),
        }
    }

    /// Register a handler spec.
    #[must_use]
    pub fn register(mut self, spec: Arc<HandlerSpec>) -> Self {
        self.specs.push(spec);
        self
    }

    /// Replace the base segments stripped from type names when
    /// synthesizing bindings.
    #[must_use]
    pub fn base_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.base_segments = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        self
    }

    /// Suffix appended to synthesized bindings (default `.action`).
    #[must_use]
    pub fn binding_suffix(mut self, suffix: &str) -> Self {
        self.binding_suffix = suffix.to_string();
        self
    }

    /// Enable the not-found view fallback with the given locator.
    #[must_use]
    pub fn view_locator(mut self, locator: Arc<dyn ViewLocator>) -> Self {
        self.view_locator = Some(locator);
        self
    }

    /// Suffix of probed view resources (default `.html`).
    #[must_use]
    pub fn view_suffix(mut self, suffix: &str) -> Self {
        self.view_suffix = suffix.to_string();
        self
    }

    /// Build the resolver, parsing and registering every binding. Any
    /// configuration error aborts startup.
    pub fn build(self) -> Result<Arc<ActionResolver>, ConfigError> {
        let tables = Tables::build(&self.specs, &self.base_segments, &self.binding_suffix)?;
        info!(handlers = self.specs.len(), "Action resolver initialized");
        Ok(Arc::new(ActionResolver {
            tables: ArcSwap::from_pointee(tables),
            specs: Mutex::new(self.specs),
            base_segments: self.base_segments,
            binding_suffix: self.binding_suffix,
            view_locator: self.view_locator,
            view_suffix: self.view_suffix,
        }))
    }
}

impl Default for ActionResolverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
