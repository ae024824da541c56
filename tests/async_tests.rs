//! Tests for asynchronous completion: suspension capability probing, the
//! worker handoff, the completion paths, and the exactly-once cleanup
//! guard.

mod common;
mod tracing_util;

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::Method;
use serde_json::json;

use common::{resolver_with, ManualExecutor};
use stagecoach::asynch::{AsyncCompletion, AsyncListener, AsyncState, SyncOnlyExecutor};
use stagecoach::error::DispatchError;
use stagecoach::handler::{
    ActionBean, Attachment, BeanHandle, Event, HandlerSpec,
};
use stagecoach::lifecycle::{DispatchOutcome, DispatchPipeline};
use stagecoach::resolution::Resolution;
use stagecoach::server::{Disposition, Request, Response};
use tracing_util::TestTracing;

#[derive(Default)]
struct StreamAction {
    attachment: Attachment,
}

impl ActionBean for StreamAction {
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

fn stream_spec(
    body: impl Fn(&mut StreamAction, &AsyncCompletion) -> anyhow::Result<()>
        + Send
        + Sync
        + 'static,
) -> Arc<HandlerSpec> {
    HandlerSpec::of::<StreamAction>("StreamAction")
        .binding("/stream")
        .event(Event::asynchronous::<StreamAction, _>("go", body))
        .build()
        .expect("stream spec")
}

fn bean_handle() -> BeanHandle {
    Arc::new(Mutex::new(Box::new(StreamAction::default()) as Box<dyn ActionBean>))
}

struct CountingListener {
    completed: AtomicUsize,
    timed_out: AtomicUsize,
    errored: AtomicUsize,
}

impl CountingListener {
    fn new() -> Arc<Self> {
        Arc::new(CountingListener {
            completed: AtomicUsize::new(0),
            timed_out: AtomicUsize::new(0),
            errored: AtomicUsize::new(0),
        })
    }
}

impl AsyncListener for CountingListener {
    fn on_complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, _error: &str) {
        self.errored.fetch_add(1, Ordering::SeqCst);
    }
}

fn completion_with(executor: Arc<ManualExecutor>) -> AsyncCompletion {
    let spec = stream_spec(|_b, c| {
        c.complete();
        Ok(())
    });
    let def = spec.event("go").expect("event");
    AsyncCompletion::new(
        Request::builder(Method::GET, "/stream/go").build(),
        Response::new(),
        bean_handle(),
        "go",
        def.async_fn().expect("async fn"),
        executor,
        Duration::from_secs(30),
    )
    .expect("completion")
}

#[test]
fn construction_fails_without_suspension_support() {
    let _tracing = TestTracing::init();
    let spec = stream_spec(|_b, c| {
        c.complete();
        Ok(())
    });
    let def = spec.event("go").expect("event");
    let err = AsyncCompletion::new(
        Request::builder(Method::GET, "/stream/go").build(),
        Response::new(),
        bean_handle(),
        "go",
        def.async_fn().expect("async fn"),
        Arc::new(SyncOnlyExecutor),
        Duration::from_secs(30),
    );
    assert!(matches!(err, Err(DispatchError::AsyncUnsupported)));
}

#[test]
fn sync_only_pipelines_fail_async_events_fatally() {
    let _tracing = TestTracing::init();
    let spec = stream_spec(|_b, c| {
        c.complete();
        Ok(())
    });
    let pipeline = DispatchPipeline::builder(resolver_with(vec![spec]))
        .executor(Arc::new(SyncOnlyExecutor))
        .build();

    let err = pipeline.dispatch(
        Request::builder(Method::GET, "/stream/go").build(),
        Response::new(),
    );
    assert!(matches!(err, Err(DispatchError::AsyncUnsupported)));
}

#[test]
fn cleanup_runs_exactly_once_across_repeated_completion() {
    let _tracing = TestTracing::init();
    let executor = ManualExecutor::new();
    let completion = completion_with(executor);

    let cleanups = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cleanups);
    completion.set_cleanup(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    completion.complete();
    completion.complete();

    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert_eq!(completion.state(), AsyncState::Completed);
}

#[test]
fn cleanup_registered_after_completion_still_runs_once() {
    let _tracing = TestTracing::init();
    let executor = ManualExecutor::new();
    let completion = completion_with(executor);

    completion.complete();

    let cleanups = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cleanups);
    completion.set_cleanup(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[test]
fn listeners_are_notified_before_cleanup() {
    let _tracing = TestTracing::init();
    let executor = ManualExecutor::new();
    let completion = completion_with(executor);
    let listener = CountingListener::new();
    completion.add_listener(Arc::clone(&listener) as Arc<dyn AsyncListener>);

    let listener_for_cleanup = Arc::clone(&listener);
    let observed_at_cleanup = Arc::new(AtomicUsize::new(usize::MAX));
    let observed = Arc::clone(&observed_at_cleanup);
    completion.set_cleanup(Box::new(move || {
        observed.store(
            listener_for_cleanup.completed.load(Ordering::SeqCst),
            Ordering::SeqCst,
        );
    }));

    completion.complete();

    // By the time cleanup ran, on_complete had already fired.
    assert_eq!(observed_at_cleanup.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_async_handlers_emit_a_500_and_notify_listeners() {
    let _tracing = TestTracing::init();
    let executor = ManualExecutor::new();
    let spec = stream_spec(|_b, _c| Err(anyhow::anyhow!("backend unavailable")));
    let def = spec.event("go").expect("event");
    let response = Response::new();
    let completion = AsyncCompletion::new(
        Request::builder(Method::GET, "/stream/go").build(),
        response.clone(),
        bean_handle(),
        "go",
        def.async_fn().expect("async fn"),
        Arc::clone(&executor) as Arc<dyn stagecoach::asynch::AsyncExecutor>,
        Duration::from_secs(30),
    )
    .expect("completion");

    let listener = CountingListener::new();
    completion.add_listener(Arc::clone(&listener) as Arc<dyn AsyncListener>);

    completion.execute().expect("execute");
    // Worker plus watchdog were handed to the executor; run the worker.
    assert_eq!(executor.task_count(), 2);
    executor.run_next();

    assert_eq!(completion.state(), AsyncState::Errored);
    assert_eq!(listener.errored.load(Ordering::SeqCst), 1);
    assert!(matches!(
        response.disposition(),
        Some(Disposition::Error { status: 500, .. })
    ));
}

#[test]
fn execute_may_only_run_once() {
    let _tracing = TestTracing::init();
    let executor = ManualExecutor::new();
    let completion = completion_with(Arc::clone(&executor));

    completion.execute().expect("first execute");
    assert!(completion.execute().is_err());
}

#[test]
fn suspended_dispatch_completes_from_the_worker() {
    let _tracing = TestTracing::init();
    let executor = ManualExecutor::new();
    let spec = stream_spec(|_b, c| {
        c.complete_with(Resolution::json(200, json!({ "streamed": true })));
        Ok(())
    });
    let pipeline = DispatchPipeline::builder(resolver_with(vec![spec]))
        .executor(Arc::clone(&executor) as Arc<dyn stagecoach::asynch::AsyncExecutor>)
        .build();

    let request = Request::builder(Method::GET, "/stream/go").build();
    let response = Response::new();
    let outcome = pipeline
        .dispatch(Arc::clone(&request), response.clone())
        .expect("dispatch");

    // The pipeline gave up the response without committing it.
    assert_eq!(outcome, DispatchOutcome::Suspended);
    assert!(!response.is_committed());

    // Run the worker; the handler completes with a JSON resolution.
    executor.run_next();
    assert!(response.is_committed());
    assert_eq!(response.status(), 200);
    assert_eq!(response.body_string(), "{\"streamed\":true}");
}

#[test]
fn async_dispatch_forwards_to_another_resource() {
    let _tracing = TestTracing::init();
    let executor = ManualExecutor::new();
    let spec = stream_spec(|_b, c| {
        c.dispatch("/stream/render.html");
        Ok(())
    });
    let pipeline = DispatchPipeline::builder(resolver_with(vec![spec]))
        .executor(Arc::clone(&executor) as Arc<dyn stagecoach::asynch::AsyncExecutor>)
        .build();

    let response = Response::new();
    pipeline
        .dispatch(
            Request::builder(Method::GET, "/stream/go").build(),
            response.clone(),
        )
        .expect("dispatch");
    executor.run_next();

    assert_eq!(
        response.disposition(),
        Some(Disposition::Forward {
            path: "/stream/render.html".to_string()
        })
    );
}
