//! End-to-end tests for the dispatch pipeline: stage sequencing,
//! short-circuiting interceptors, before/after methods, validation error
//! handling for ordinary and REST-style handlers, and verb checking.

mod common;
mod tracing_util;

use std::sync::{Arc, Mutex};

use http::Method;
use serde_json::Value;

use common::{
    contact_spec, item_api_spec, read_only_api_spec, resolver_with, with_bean, ContactAction,
};
use stagecoach::constants;
use stagecoach::error::DispatchError;
use stagecoach::handler::{Event, HandlerSpec, LifecycleMethod, Property};
use stagecoach::lifecycle::{
    DispatchOutcome, DispatchPipeline, Interceptor, Invocation, LifecycleStage,
};
use stagecoach::resolution::Resolution;
use stagecoach::server::{Disposition, Request, Response, Session};
use stagecoach::validation::ValidationMetadata;
use tracing_util::TestTracing;

const CONTACT_BINDING: &str = "/contact/{id}/{$event=view}";

fn contact_pipeline() -> DispatchPipeline {
    DispatchPipeline::builder(resolver_with(vec![contact_spec()])).build()
}

#[test]
fn default_event_runs_when_no_event_is_named() {
    let _tracing = TestTracing::init();
    let pipeline = contact_pipeline();

    let request = Request::builder(Method::GET, "/contact/42").build();
    let response = Response::new();
    let outcome = pipeline
        .dispatch(Arc::clone(&request), response.clone())
        .expect("dispatch");

    assert_eq!(outcome, DispatchOutcome::Completed);
    assert_eq!(
        response.disposition(),
        Some(Disposition::Forward {
            path: "/contact/detail.html".to_string()
        })
    );

    let bean = request
        .bean_attribute(CONTACT_BINDING)
        .expect("request-scoped bean");
    with_bean::<ContactAction, _>(&bean, |b| {
        assert_eq!(b.id, Some(42));
        assert_eq!(b.trace, vec!["view"]);
    });
}

#[test]
fn named_event_binds_and_invokes_the_right_method() {
    let _tracing = TestTracing::init();
    let pipeline = contact_pipeline();

    let request = Request::builder(Method::POST, "/contact/42/save")
        .parameter("email", "someone@example.org")
        .parameter("age", "33")
        .build();
    let response = Response::new();
    pipeline
        .dispatch(Arc::clone(&request), response.clone())
        .expect("dispatch");

    assert_eq!(
        response.disposition(),
        Some(Disposition::Redirect {
            url: "/contact/list.html".to_string(),
            permanent: false
        })
    );

    let bean = request.bean_attribute(CONTACT_BINDING).expect("bean");
    with_bean::<ContactAction, _>(&bean, |b| {
        assert!(b.saved);
        assert_eq!(b.id, Some(42));
        assert_eq!(b.email.as_deref(), Some("someone@example.org"));
        assert_eq!(b.age, Some(33));
        // Custom validation ran before the event handler.
        assert_eq!(b.trace, vec!["check_email_domain", "save"]);
    });
}

#[test]
fn validation_failures_return_to_the_source_page() {
    let _tracing = TestTracing::init();
    let pipeline = contact_pipeline();

    let request = Request::builder(Method::POST, "/contact/42/save")
        .parameter("_sourcePage", "/contact/form.html")
        .build();
    let response = Response::new();
    pipeline
        .dispatch(Arc::clone(&request), response.clone())
        .expect("dispatch");

    assert_eq!(
        response.disposition(),
        Some(Disposition::Forward {
            path: "/contact/form.html".to_string()
        })
    );

    // The handler never ran; the errors carry the owning binding.
    let bean = request.bean_attribute(CONTACT_BINDING).expect("bean");
    with_bean::<ContactAction, _>(&bean, |b| assert!(!b.saved));
}

#[test]
fn custom_validation_errors_also_block_the_handler() {
    let _tracing = TestTracing::init();
    let pipeline = contact_pipeline();

    let request = Request::builder(Method::POST, "/contact/42/save")
        .parameter("email", "someone@blocked.example")
        .parameter("_sourcePage", "/contact/form.html")
        .build();
    let response = Response::new();
    pipeline
        .dispatch(Arc::clone(&request), response.clone())
        .expect("dispatch");

    assert_eq!(
        response.disposition(),
        Some(Disposition::Forward {
            path: "/contact/form.html".to_string()
        })
    );
    let bean = request.bean_attribute(CONTACT_BINDING).expect("bean");
    with_bean::<ContactAction, _>(&bean, |b| {
        assert!(!b.saved);
        assert_eq!(b.trace, vec!["check_email_domain"]);
    });
}

#[test]
fn ambiguous_event_parameters_fail_the_dispatch() {
    let _tracing = TestTracing::init();
    let pipeline = contact_pipeline();

    let request = Request::builder(Method::POST, "/contact/42")
        .parameter("save", "x")
        .parameter("view", "y")
        .build();
    let err = pipeline.dispatch(request, Response::new());
    assert!(matches!(err, Err(DispatchError::AmbiguousEvent { .. })));
}

struct ShortCircuit;

impl Interceptor for ShortCircuit {
    fn intercepts(&self) -> &[LifecycleStage] {
        &[LifecycleStage::HandlerResolution]
    }

    fn intercept(&self, _invocation: &mut Invocation<'_>) -> anyhow::Result<Option<Resolution>> {
        // Never proceeds: the stage's own logic and everything after it
        // are skipped in favor of this outcome.
        Ok(Some(Resolution::error(418, "intercepted")))
    }
}

#[test]
fn interceptors_can_short_circuit_a_stage() {
    let _tracing = TestTracing::init();
    let pipeline = DispatchPipeline::builder(resolver_with(vec![contact_spec()]))
        .interceptor(Arc::new(ShortCircuit))
        .build();

    let request = Request::builder(Method::GET, "/contact/42").build();
    let response = Response::new();
    pipeline
        .dispatch(Arc::clone(&request), response.clone())
        .expect("dispatch");

    assert_eq!(
        response.disposition(),
        Some(Disposition::Error {
            status: 418,
            message: "intercepted".to_string()
        })
    );
    let bean = request.bean_attribute(CONTACT_BINDING).expect("bean");
    with_bean::<ContactAction, _>(&bean, |b| assert!(b.trace.is_empty()));
}

struct StageRecorder {
    stages: Mutex<Vec<(LifecycleStage, &'static str)>>,
}

impl Interceptor for StageRecorder {
    fn intercepts(&self) -> &[LifecycleStage] {
        &[
            LifecycleStage::RequestInit,
            LifecycleStage::ActionBeanResolution,
            LifecycleStage::HandlerResolution,
            LifecycleStage::BindingAndValidation,
            LifecycleStage::CustomValidation,
            LifecycleStage::ValidationErrorHandling,
            LifecycleStage::EventHandling,
            LifecycleStage::ResolutionExecution,
            LifecycleStage::RequestComplete,
        ]
    }

    fn intercept(&self, invocation: &mut Invocation<'_>) -> anyhow::Result<Option<Resolution>> {
        let stage = invocation.context().stage();
        self.stages.lock().expect("lock").push((stage, "before"));
        let resolution = invocation.proceed()?;
        self.stages.lock().expect("lock").push((stage, "after"));
        Ok(resolution)
    }
}

#[test]
fn stages_run_in_order_and_interceptors_nest_around_each() {
    let _tracing = TestTracing::init();
    let recorder = Arc::new(StageRecorder {
        stages: Mutex::new(Vec::new()),
    });
    let pipeline = DispatchPipeline::builder(resolver_with(vec![contact_spec()]))
        .interceptor(Arc::clone(&recorder) as Arc<dyn Interceptor>)
        .build();

    let request = Request::builder(Method::GET, "/contact/42").build();
    pipeline.dispatch(request, Response::new()).expect("dispatch");

    let observed = recorder.stages.lock().expect("lock").clone();
    let order: Vec<LifecycleStage> = observed
        .iter()
        .filter(|(_, phase)| *phase == "before")
        .map(|(stage, _)| *stage)
        .collect();
    assert_eq!(order, LifecycleStage::ALL.to_vec());

    // Each stage's before ran before its after.
    for stage in LifecycleStage::ALL {
        let before = observed
            .iter()
            .position(|(s, p)| *s == stage && *p == "before");
        let after = observed
            .iter()
            .position(|(s, p)| *s == stage && *p == "after");
        assert!(before.expect("before") < after.expect("after"), "{stage}");
    }
}

#[test]
fn before_and_after_methods_run_with_event_filters() {
    let _tracing = TestTracing::init();

    let spec = {
        let base = contact_spec();
        HandlerSpec::extending("FilteredContact", &base)
            .lifecycle_method(
                LifecycleMethod::before::<ContactAction, _>(
                    "audit_save",
                    LifecycleStage::EventHandling,
                    |b, _c| {
                        b.trace.push("audit_save".to_string());
                        Ok(None)
                    },
                )
                .on(["save"]),
            )
            .lifecycle_method(
                LifecycleMethod::after::<ContactAction, _>(
                    "after_binding",
                    LifecycleStage::BindingAndValidation,
                    |b, _c| {
                        b.trace.push("after_binding".to_string());
                        Ok(None)
                    },
                )
                .on(["!view"]),
            )
            .build()
            .expect("spec")
    };

    let pipeline = DispatchPipeline::builder(resolver_with(vec![spec])).build();

    // A save: both methods apply.
    let request = Request::builder(Method::POST, "/contact/42/save")
        .parameter("email", "a@b.c")
        .build();
    pipeline
        .dispatch(Arc::clone(&request), Response::new())
        .expect("dispatch");
    let bean = request.bean_attribute(CONTACT_BINDING).expect("bean");
    with_bean::<ContactAction, _>(&bean, |b| {
        assert_eq!(
            b.trace,
            vec!["after_binding", "check_email_domain", "audit_save", "save"]
        );
    });

    // A view: both filtered out.
    let request = Request::builder(Method::GET, "/contact/42").build();
    pipeline
        .dispatch(Arc::clone(&request), Response::new())
        .expect("dispatch");
    let bean = request.bean_attribute(CONTACT_BINDING).expect("bean");
    with_bean::<ContactAction, _>(&bean, |b| {
        assert_eq!(b.trace, vec!["view"]);
    });
}

#[test]
fn rest_handlers_fall_back_to_the_verb_as_the_event_name() {
    let _tracing = TestTracing::init();
    let pipeline = DispatchPipeline::builder(resolver_with(vec![item_api_spec()])).build();

    let response = Response::new();
    pipeline
        .dispatch(
            Request::builder(Method::GET, "/api/items").build(),
            response.clone(),
        )
        .expect("dispatch");
    assert_eq!(response.status(), 200);
    assert_eq!(response.header("content-type").as_deref(), Some("application/json"));
}

#[test]
fn rest_unresolved_events_become_404_outcomes() {
    let _tracing = TestTracing::init();
    let pipeline = DispatchPipeline::builder(resolver_with(vec![read_only_api_spec()])).build();

    // POST with an unknown "archive" segment: no event name resolves, the
    // verb fallback finds no "post" method, and the result is a structured
    // 404 — not a propagated error.
    let response = Response::new();
    let outcome = pipeline
        .dispatch(
            Request::builder(Method::POST, "/api/reports/archive").build(),
            response.clone(),
        )
        .expect("dispatch must not error for REST handlers");
    assert_eq!(outcome, DispatchOutcome::Completed);
    assert_eq!(
        response.disposition().map(|d| match d {
            Disposition::Error { status, .. } => status,
            _ => 0,
        }),
        Some(404)
    );
}

#[test]
fn rest_verb_mismatches_become_405_outcomes() {
    let _tracing = TestTracing::init();
    let pipeline = DispatchPipeline::builder(resolver_with(vec![item_api_spec()])).build();

    // "update" only supports POST.
    let response = Response::new();
    pipeline
        .dispatch(
            Request::builder(Method::GET, "/api/items/update").build(),
            response.clone(),
        )
        .expect("dispatch");
    assert!(matches!(
        response.disposition(),
        Some(Disposition::Error { status: 405, .. })
    ));
}

#[test]
fn standard_verb_mismatches_propagate_as_errors() {
    let _tracing = TestTracing::init();
    let spec = HandlerSpec::of::<ContactAction>("StrictVerbs")
        .binding("/strict")
        .event(
            Event::new::<ContactAction, _>("submit", |_b, _c| {
                Ok(Some(Resolution::forward("/done.html")))
            })
            .on_verbs([Method::POST]),
        )
        .build()
        .expect("spec");
    let pipeline = DispatchPipeline::builder(resolver_with(vec![spec])).build();

    let err = pipeline.dispatch(
        Request::builder(Method::GET, "/strict/submit").build(),
        Response::new(),
    );
    assert!(matches!(err, Err(DispatchError::VerbMismatch { .. })));
}

#[test]
fn rest_validation_failures_return_a_structured_error_report() {
    let _tracing = TestTracing::init();
    let pipeline = DispatchPipeline::builder(resolver_with(vec![item_api_spec()])).build();

    // POST without the required "name": binding records the error and the
    // ValidationErrorHandling stage serializes it with a 400.
    let response = Response::new();
    pipeline
        .dispatch(
            Request::builder(Method::POST, "/api/items").build(),
            response.clone(),
        )
        .expect("dispatch");

    assert_eq!(response.status(), 400);
    let body: Value = serde_json::from_str(&response.body_string()).expect("json body");
    let field_errors = body["fieldErrors"].as_array().expect("fieldErrors");
    assert_eq!(field_errors.len(), 1);
    assert_eq!(field_errors[0]["fieldName"], "name");
    assert!(field_errors[0]["errorMessages"]
        .as_array()
        .is_some_and(|m| !m.is_empty()));
}

#[test]
fn skip_binding_events_bypass_binding_and_validation() {
    let _tracing = TestTracing::init();
    let spec = HandlerSpec::of::<ContactAction>("SkipBinding")
        .binding("/skip")
        .event(
            Event::new::<ContactAction, _>("raw", |b, _c| {
                b.trace.push("raw".to_string());
                Ok(Some(Resolution::forward("/raw.html")))
            })
            .skip_binding(),
        )
        .property(
            Property::scalar::<ContactAction, String>("email", |b, v| b.email = v)
                .validate(ValidationMetadata::new().required()),
        )
        .build()
        .expect("spec");
    let pipeline = DispatchPipeline::builder(resolver_with(vec![spec])).build();

    // email is required, but the event skips binding entirely, so the
    // dispatch succeeds and nothing was bound.
    let request = Request::builder(Method::POST, "/skip/raw")
        .parameter("email", "would-bind@example.org")
        .build();
    let response = Response::new();
    pipeline
        .dispatch(Arc::clone(&request), response.clone())
        .expect("dispatch");

    let bean = request.bean_attribute("/skip").expect("bean");
    with_bean::<ContactAction, _>(&bean, |b| {
        assert_eq!(b.email, None);
        assert_eq!(b.trace, vec!["raw"]);
    });
}

#[test]
fn nested_dispatch_restores_the_previous_handler_attribute() {
    let _tracing = TestTracing::init();
    let pipeline = contact_pipeline();
    let session = Session::new();

    let request = Request::builder(Method::GET, "/contact/42")
        .session(Arc::clone(&session))
        .build();
    pipeline
        .dispatch(Arc::clone(&request), Response::new())
        .expect("dispatch");
    let original = request
        .bean_attribute(constants::REQ_ATTR_ACTION_BEAN)
        .expect("current bean");

    // A nested dispatch on the same request (a forward) replaces the
    // current-bean attribute for its duration, then restores it.
    request.set_attribute(
        constants::REQ_ATTR_EVENT_NAME,
        stagecoach::server::Attribute::Text("view".to_string()),
    );
    pipeline
        .dispatch(Arc::clone(&request), Response::new())
        .expect("nested dispatch");
    request.remove_attribute(constants::REQ_ATTR_EVENT_NAME);

    let restored = request
        .bean_attribute(constants::REQ_ATTR_ACTION_BEAN)
        .expect("restored bean");
    assert!(Arc::ptr_eq(&original, &restored));
}
