use anyhow::anyhow;
use tracing::{debug, error};

/// Capability interface for handing work to a container-managed worker.
///
/// Selected once at startup by probing what the environment supports;
/// never per-request.
pub trait AsyncExecutor: Send + Sync {
    /// Whether the environment can suspend a request and complete it from
    /// a worker later.
    fn supports_suspension(&self) -> bool;

    /// Run the task on a worker. The task owns everything it needs.
    fn spawn(&self, task: Box<dyn FnOnce() + Send>) -> anyhow::Result<()>;
}

/// Executor for environments with no suspension support. Constructing an
/// async completion against this executor fails fatally.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncOnlyExecutor;

impl AsyncExecutor for SyncOnlyExecutor {
    fn supports_suspension(&self) -> bool {
        false
    }

    fn spawn(&self, _task: Box<dyn FnOnce() + Send>) -> anyhow::Result<()> {
        Err(anyhow!("async events are not available in this environment"))
    }
}

/// Coroutine-backed executor. Each task runs on its own `may` coroutine
/// with a configurable stack size.
#[derive(Debug, Clone, Copy)]
pub struct CoroutineExecutor {
    stack_size: usize,
}

impl CoroutineExecutor {
    #[must_use]
    pub fn new(stack_size: usize) -> Self {
        CoroutineExecutor { stack_size }
    }
}

impl Default for CoroutineExecutor {
    fn default() -> Self {
        // 64KB default; async event bodies tend to have deeper call chains
        // than plain handlers.
        CoroutineExecutor::new(0x10000)
    }
}

impl AsyncExecutor for CoroutineExecutor {
    fn supports_suspension(&self) -> bool {
        true
    }

    fn spawn(&self, task: Box<dyn FnOnce() + Send>) -> anyhow::Result<()> {
        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the
        // may runtime; the unsafety comes from the runtime's requirements,
        // not from this function's logic. The task is Send + 'static and
        // owns all of its state, and completion signaling goes through the
        // AsyncCompletion guard rather than through the join handle.
        #[allow(unsafe_code)]
        let spawned = unsafe {
            may::coroutine::Builder::new()
                .stack_size(self.stack_size)
                .spawn(move || {
                    debug!("Async worker coroutine start");
                    task();
                })
        };

        match spawned {
            Ok(_handle) => Ok(()),
            Err(e) => {
                error!(error = %e, "Failed to spawn async worker coroutine");
                Err(anyhow!("failed to spawn async worker: {e}"))
            }
        }
    }
}
