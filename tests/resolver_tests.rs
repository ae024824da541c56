//! Tests for handler registration and resolution: binding synthesis, the
//! two-phase `$event` default, scope storage, the event-name ladder, and
//! the not-found view fallback.

mod common;
mod tracing_util;

use std::any::Any;
use std::sync::Arc;

use http::Method;

use common::{contact_spec, resolver_with, ContactAction, SetViewLocator};
use stagecoach::error::{ConfigError, DispatchError};
use stagecoach::handler::{
    ActionBean, ActionBeanContext, Attachment, Event, HandlerSpec,
};
use stagecoach::resolution::Resolution;
use stagecoach::resolver::{synthesize_binding, ActionResolver};
use stagecoach::server::{Request, Response, Session};
use tracing_util::TestTracing;

#[derive(Default)]
struct ListAction {
    attachment: Attachment,
}

impl ActionBean for ListAction {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn list_spec(binding: Option<&str>) -> Arc<HandlerSpec> {
    let mut builder = HandlerSpec::of::<ListAction>("web::contact::ListAction").event(
        Event::new::<ListAction, _>("list", |_b, _c| {
            Ok(Some(Resolution::forward("/contact/list.html")))
        }),
    );
    if let Some(binding) = binding {
        builder = builder.binding(binding);
    }
    builder.build().expect("list spec")
}

fn context_for(request: Arc<Request>) -> ActionBeanContext {
    ActionBeanContext::new(request, Response::new())
}

#[test]
fn bindings_are_synthesized_from_type_names() {
    let _tracing = TestTracing::init();
    let resolver = resolver_with(vec![list_spec(None)]);

    let registered = resolver
        .registered_for_path("/contact/List.action")
        .expect("registered");
    assert_eq!(registered.canonical, "/contact/List.action");
}

#[test]
fn synthesize_binding_strips_configured_segments() {
    let binding = synthesize_binding(
        "app::web::user::RegisterActionBean",
        &["web".to_string()],
        ".action",
    );
    assert_eq!(binding, "/user/Register.action");
}

#[test]
fn event_parameter_default_is_resolved_from_the_default_handler() {
    let _tracing = TestTracing::init();
    // The pattern declares {$event} with no default; the handler's sole
    // event ("list") becomes the default in a second phase.
    let resolver = resolver_with(vec![list_spec(Some("/contact/{$event}"))]);

    let registered = resolver
        .registered_for_path("/contact/anything")
        .expect("registered");
    assert_eq!(registered.canonical, "/contact/{$event=list}");

    let (_, live) = resolver.live_binding("/contact").expect("live binding");
    assert_eq!(live.event(), Some("list"));
}

#[test]
fn single_event_is_the_default_without_a_flag() {
    let spec = list_spec(None);
    assert_eq!(spec.default_event().expect("default").name(), "list");
}

#[test]
fn conflicting_bindings_fail_startup() {
    let first = list_spec(Some("/contact/list"));
    let second = contact_spec();
    let err = ActionResolver::builder()
        .register(first)
        .register(list_spec(Some("/contact/list")))
        .register(second)
        .build();
    assert!(matches!(err, Err(ConfigError::ConflictingBinding { .. })));
}

#[test]
fn request_scoped_beans_are_created_per_request() {
    let _tracing = TestTracing::init();
    let resolver = resolver_with(vec![contact_spec()]);

    let request = Request::builder(Method::GET, "/contact/42").build();
    let ctx = context_for(Arc::clone(&request));
    let (first, registered) = resolver.resolve_bean(&ctx).expect("resolve");

    // Same request: same instance.
    let (again, _) = resolver.resolve_bean(&ctx).expect("resolve again");
    assert!(Arc::ptr_eq(&first, &again));

    // New request: fresh instance.
    let other = Request::builder(Method::GET, "/contact/42").build();
    let other_ctx = context_for(other);
    let (second, _) = resolver.resolve_bean(&other_ctx).expect("resolve other");
    assert!(!Arc::ptr_eq(&first, &second));

    assert_eq!(registered.canonical, "/contact/{id}/{$event=view}");
}

#[test]
fn session_scoped_beans_are_shared_across_the_session() {
    let _tracing = TestTracing::init();
    let resolver = resolver_with(vec![common::counter_spec()]);
    let session = Session::new();

    let first_request = Request::builder(Method::GET, "/counter")
        .session(Arc::clone(&session))
        .build();
    let (first, _) = resolver
        .resolve_bean(&context_for(first_request))
        .expect("resolve");

    let second_request = Request::builder(Method::GET, "/counter")
        .session(Arc::clone(&session))
        .build();
    let (second, _) = resolver
        .resolve_bean(&context_for(second_request))
        .expect("resolve");

    assert!(Arc::ptr_eq(&first, &second));

    let elsewhere = Request::builder(Method::GET, "/counter").build();
    let (third, _) = resolver
        .resolve_bean(&context_for(elsewhere))
        .expect("resolve");
    assert!(!Arc::ptr_eq(&first, &third));
}

#[test]
fn unknown_paths_are_not_found() {
    let resolver = resolver_with(vec![contact_spec()]);
    let request = Request::builder(Method::GET, "/nowhere").build();
    let err = resolver.resolve_bean(&context_for(request));
    assert!(matches!(err, Err(DispatchError::HandlerNotFound { .. })));
}

#[test]
fn not_found_paths_fall_back_to_same_named_views() {
    let _tracing = TestTracing::init();
    let locator = SetViewLocator::new(["/account/view_account.html"]);
    let resolver = ActionResolver::builder()
        .register(contact_spec())
        .view_locator(locator)
        .build()
        .expect("resolver");

    let request = Request::builder(Method::GET, "/account/ViewAccount.action").build();
    let ctx = context_for(request);
    let (bean, registered) = resolver.resolve_bean(&ctx).expect("fallback bean");

    assert_eq!(registered.canonical, "/account/ViewAccount.action");
    let guard = bean.lock().expect("bean lock");
    let view = guard
        .as_any()
        .downcast_ref::<stagecoach::resolver::DefaultViewBean>()
        .expect("view bean");
    assert_eq!(view.view(), "/account/view_account.html");
}

#[test]
fn event_name_prefers_the_forwarded_attribute() {
    let resolver = resolver_with(vec![contact_spec()]);
    let registered = resolver
        .registered_for_path("/contact/42")
        .expect("registered");

    let request = Request::builder(Method::GET, "/contact/42")
        .parameter("save", "submitted")
        .build();
    request.set_attribute(
        stagecoach::constants::REQ_ATTR_EVENT_NAME,
        stagecoach::server::Attribute::Text("view".to_string()),
    );
    let ctx = context_for(request);

    let event = resolver
        .event_name(&registered.spec, &ctx, None)
        .expect("event");
    assert_eq!(event.as_deref(), Some("view"));
}

#[test]
fn event_name_honors_the_event_name_parameter() {
    let resolver = resolver_with(vec![contact_spec()]);
    let registered = resolver
        .registered_for_path("/contact/42")
        .expect("registered");

    let request = Request::builder(Method::POST, "/contact/42")
        .parameter("_eventName", "save")
        .build();
    let ctx = context_for(request);

    let event = resolver
        .event_name(&registered.spec, &ctx, None)
        .expect("event");
    assert_eq!(event.as_deref(), Some("save"));
}

#[test]
fn event_name_matches_event_named_parameters() {
    let resolver = resolver_with(vec![contact_spec()]);
    let registered = resolver
        .registered_for_path("/contact/42")
        .expect("registered");

    let request = Request::builder(Method::POST, "/contact/42")
        .parameter("save", "Save")
        .build();
    let ctx = context_for(request);
    let event = resolver
        .event_name(&registered.spec, &ctx, None)
        .expect("event");
    assert_eq!(event.as_deref(), Some("save"));

    // Image-button submits arrive as name.x / name.y pairs.
    let request = Request::builder(Method::POST, "/contact/42")
        .parameter("save.x", "10")
        .build();
    let ctx = context_for(request);
    let event = resolver
        .event_name(&registered.spec, &ctx, None)
        .expect("event");
    assert_eq!(event.as_deref(), Some("save"));
}

#[test]
fn two_event_named_parameters_are_a_fatal_ambiguity() {
    let resolver = resolver_with(vec![contact_spec()]);
    let registered = resolver
        .registered_for_path("/contact/42")
        .expect("registered");

    let request = Request::builder(Method::POST, "/contact/42")
        .parameter("save", "x")
        .parameter("view", "y")
        .build();
    let ctx = context_for(request);

    let err = resolver.event_name(&registered.spec, &ctx, None);
    assert!(matches!(err, Err(DispatchError::AmbiguousEvent { .. })));
}

#[test]
fn event_name_falls_back_to_the_path_segment() {
    let resolver = resolver_with(vec![contact_spec()]);
    let (registered, live) = resolver
        .live_binding("/contact/42/save")
        .expect("live binding");

    let request = Request::builder(Method::POST, "/contact/42/save").build();
    let ctx = context_for(request);
    let event = resolver
        .event_name(&registered.spec, &ctx, Some(&live))
        .expect("event");
    assert_eq!(event.as_deref(), Some("save"));
}

#[test]
fn missing_event_name_means_the_default_handler() {
    let resolver = resolver_with(vec![contact_spec()]);
    let (registered, live) = resolver.live_binding("/contact/42").expect("live binding");

    let request = Request::builder(Method::GET, "/contact/42").build();
    let ctx = context_for(request);
    let event = resolver
        .event_name(&registered.spec, &ctx, Some(&live))
        .expect("event");
    // The binding's $event default names the default handler's event.
    assert_eq!(event.as_deref(), Some("view"));
}

#[test]
fn pattern_scenario_from_the_binding_grammar() {
    let _tracing = TestTracing::init();
    let resolver = resolver_with(vec![contact_spec()]);
    let (_, live) = resolver.live_binding("/contact/42").expect("live");
    assert_eq!(live.parameter("id"), Some("42"));
    assert_eq!(live.event(), Some("view"));
}

#[test]
fn runtime_registration_swaps_in_new_handlers() {
    let _tracing = TestTracing::init();
    let resolver = resolver_with(vec![contact_spec()]);
    assert!(resolver.registered_for_path("/reports/Weekly.action").is_none());

    resolver
        .add_handler(list_spec(Some("/reports/Weekly.action")))
        .expect("add handler");
    assert!(resolver.registered_for_path("/reports/Weekly.action").is_some());
}

#[test]
fn duplicate_events_fail_spec_construction() {
    let result = HandlerSpec::of::<ContactAction>("Dup")
        .event(Event::new::<ContactAction, _>("save", |_b, _c| Ok(None)))
        .event(Event::new::<ContactAction, _>("save", |_b, _c| Ok(None)))
        .build();
    assert!(matches!(result, Err(ConfigError::DuplicateEvent { .. })));
}

#[test]
fn duplicate_defaults_fail_spec_construction() {
    let result = HandlerSpec::of::<ContactAction>("Dup")
        .event(Event::new::<ContactAction, _>("a", |_b, _c| Ok(None)).default_handler())
        .event(Event::new::<ContactAction, _>("b", |_b, _c| Ok(None)).default_handler())
        .build();
    assert!(matches!(result, Err(ConfigError::DuplicateDefault { .. })));
}

#[test]
fn extending_specs_override_inherited_events() {
    let base = HandlerSpec::of::<ContactAction>("Base")
        .event(Event::new::<ContactAction, _>("view", |_b, _c| Ok(None)).default_handler())
        .event(Event::new::<ContactAction, _>("save", |_b, _c| Ok(None)))
        .build()
        .expect("base spec");

    let child = HandlerSpec::extending("Child", &base)
        .event(
            Event::new::<ContactAction, _>("save", |b, _c| {
                b.saved = true;
                Ok(None)
            })
            .default_handler(),
        )
        .build()
        .expect("child spec");

    // The override replaced the inherited entry in place and displaced the
    // inherited default.
    assert_eq!(child.events().len(), 2);
    assert_eq!(child.default_event().expect("default").name(), "save");
}
