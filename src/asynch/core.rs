use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use tracing::{debug, error, warn};

use crate::error::DispatchError;
use crate::handler::{AsyncEventFn, BeanHandle};
use crate::resolution::Resolution;
use crate::server::{Request, Response};

use super::executor::AsyncExecutor;

/// Lifecycle of an asynchronous completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncState {
    Created,
    Running,
    Completed,
    TimedOut,
    Errored,
}

/// High-level listener notified when the completion finishes, before the
/// low-level cleanup runs.
pub trait AsyncListener: Send + Sync {
    fn on_complete(&self) {}
    fn on_timeout(&self) {}
    fn on_error(&self, _error: &str) {}
}

type CleanupFn = Box<dyn FnOnce() + Send>;

struct Shared {
    state: Mutex<AsyncState>,
    invoked: AtomicBool,
    finished: AtomicBool,
    timeout: Mutex<Duration>,
    listeners: Mutex<Vec<Arc<dyn AsyncListener>>>,
    cleanup: Mutex<Option<CleanupFn>>,
    request: Arc<Request>,
    response: Response,
    bean: BeanHandle,
    event: AsyncEventFn,
    event_name: String,
    executor: Arc<dyn AsyncExecutor>,
}

enum Finish {
    Completed,
    TimedOut,
    Errored(String),
}

/// The suspended outcome of an asynchronous event method.
///
/// Constructed during EventHandling instead of invoking the method;
/// executing it hands `(handler, method)` to a worker along with this
/// completion object, which the method uses to finish the response:
/// [`complete`](Self::complete) (no further output),
/// [`complete_with`](Self::complete_with) (execute one more resolution),
/// or [`dispatch`](Self::dispatch) (forward to another resource).
///
/// Cleanup runs exactly once — normal completion, timeout, and error all
/// funnel through the same atomic guard, and the guard tolerates being hit
/// from the worker thread while the watchdog fires on another.
#[derive(Clone)]
pub struct AsyncCompletion {
    shared: Arc<Shared>,
}

impl AsyncCompletion {
    /// Construct the completion, switching the request into suspended
    /// processing.
    ///
    /// Fails fatally when the configured executor has no suspension
    /// support: async events are an environment precondition, not
    /// something to degrade around.
    pub fn new(
        request: Arc<Request>,
        response: Response,
        bean: BeanHandle,
        event_name: &str,
        event: AsyncEventFn,
        executor: Arc<dyn AsyncExecutor>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        if !executor.supports_suspension() {
            return Err(DispatchError::AsyncUnsupported);
        }

        debug!(event = event_name, "Async completion created; request suspended");

        Ok(AsyncCompletion {
            shared: Arc::new(Shared {
                state: Mutex::new(AsyncState::Created),
                invoked: AtomicBool::new(false),
                finished: AtomicBool::new(false),
                timeout: Mutex::new(timeout),
                listeners: Mutex::new(Vec::new()),
                cleanup: Mutex::new(None),
                request,
                response,
                bean,
                event,
                event_name: event_name.to_string(),
                executor,
            }),
        })
    }

    #[must_use]
    pub fn state(&self) -> AsyncState {
        *self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn request(&self) -> &Arc<Request> {
        &self.shared.request
    }

    #[must_use]
    pub fn response(&self) -> &Response {
        &self.shared.response
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        *self.shared.timeout.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_timeout(&self, timeout: Duration) {
        *self.shared.timeout.lock().unwrap_or_else(|e| e.into_inner()) = timeout;
    }

    /// Register a high-level listener; notified before low-level cleanup.
    pub fn add_listener(&self, listener: Arc<dyn AsyncListener>) {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    /// Register the low-level cleanup action, run exactly once whichever
    /// way the completion finishes. A worker may finish the completion
    /// before the dispatching thread gets here; in that case the action
    /// runs immediately instead of being stored.
    pub fn set_cleanup(&self, cleanup: CleanupFn) {
        {
            let mut slot = self.shared.cleanup.lock().unwrap_or_else(|e| e.into_inner());
            if !self.shared.finished.load(Ordering::SeqCst) {
                *slot = Some(cleanup);
                return;
            }
        }
        // Already finished: finish() found no cleanup to take, so the
        // late-registered action runs here, still exactly once.
        cleanup();
    }

    /// Start asynchronous processing: invoke the event method on a worker
    /// with this completion as its argument, and arm the timeout watchdog.
    ///
    /// May be executed only once; a second execution is a hard error.
    pub fn execute(&self) -> anyhow::Result<()> {
        if self.shared.invoked.swap(true, Ordering::SeqCst) {
            bail!("async event handler already invoked");
        }
        self.set_state(AsyncState::Running);

        let worker = self.clone();
        self.shared.executor.spawn(Box::new(move || {
            let result = {
                let mut bean = worker.shared.bean.lock().unwrap_or_else(|e| e.into_inner());
                (*worker.shared.event)(bean.as_mut(), &worker)
            };
            if let Err(e) = result {
                error!(
                    event = worker.shared.event_name.as_str(),
                    error = %e,
                    "Async event handler failed"
                );
                worker.finish(Finish::Errored(e.to_string()));
            }
        }))?;

        let watchdog = self.clone();
        let timeout = self.timeout();
        self.shared.executor.spawn(Box::new(move || {
            may::coroutine::sleep(timeout);
            if !watchdog.is_finished() {
                warn!(
                    event = watchdog.shared.event_name.as_str(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Async completion timed out"
                );
            }
            watchdog.finish(Finish::TimedOut);
        }))?;

        Ok(())
    }

    /// Complete asynchronous processing with no further output.
    pub fn complete(&self) {
        debug!(event = self.shared.event_name.as_str(), "Completing async response");
        self.finish(Finish::Completed);
    }

    /// Execute one more resolution against the response, then complete.
    pub fn complete_with(&self, mut resolution: Resolution) {
        debug!(
            event = self.shared.event_name.as_str(),
            "Completing async response with a resolution"
        );
        match resolution.execute(&self.shared.request, &self.shared.response) {
            Ok(()) => self.finish(Finish::Completed),
            Err(e) => {
                error!(error = %e, "Resolution execution failed during async completion");
                self.finish(Finish::Errored(e.to_string()));
            }
        }
    }

    /// Forward to another resource, then complete.
    pub fn dispatch(&self, path: &str) {
        debug!(
            event = self.shared.event_name.as_str(),
            path, "Dispatching async response"
        );
        self.shared.response.forward(path);
        self.finish(Finish::Completed);
    }

    /// Record an error observed by the caller's own plumbing and finish
    /// through the error path.
    pub fn fail(&self, message: &str) {
        self.finish(Finish::Errored(message.to_string()));
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: AsyncState) {
        *self.shared.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// The single exit: first caller wins, everyone else is a no-op. The
    /// order is fixed — state, high-level listeners, the 500 for
    /// timeout/error on an uncommitted response, then low-level cleanup.
    fn finish(&self, outcome: Finish) {
        if self.shared.finished.swap(true, Ordering::SeqCst) {
            debug!(
                event = self.shared.event_name.as_str(),
                "Async completion already finished; ignoring"
            );
            return;
        }

        let listeners = self
            .shared
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        match &outcome {
            Finish::Completed => {
                self.set_state(AsyncState::Completed);
                for listener in &listeners {
                    listener.on_complete();
                }
            }
            Finish::TimedOut => {
                self.set_state(AsyncState::TimedOut);
                for listener in &listeners {
                    listener.on_timeout();
                }
                if !self.shared.response.is_committed() {
                    self.shared.response.send_error(500, "Operation timed out");
                }
            }
            Finish::Errored(message) => {
                self.set_state(AsyncState::Errored);
                for listener in &listeners {
                    listener.on_error(message);
                }
                if !self.shared.response.is_committed() {
                    self.shared.response.send_error(500, message);
                }
            }
        }

        let cleanup = self
            .shared
            .cleanup
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(cleanup) = cleanup {
            debug!(
                event = self.shared.event_name.as_str(),
                "Running async completion cleanup"
            );
            cleanup();
        }
    }
}
