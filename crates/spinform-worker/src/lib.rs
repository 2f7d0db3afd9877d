//! Background worker thread for outline tracing.
//!
//! Tracing and refinement are heavy (nested pixel loops plus a greedy
//! walk per component), so they run on a dedicated thread instead of the
//! caller's render loop. [`ShapeWorker`] owns that thread. Each call to
//! [`ShapeWorker::submit`] moves a mask to the worker and returns a
//! [`PendingTrace`] that later yields the complete polygon list.
//!
//! Requests carry a generation counter. Submitting a new request makes
//! every older [`PendingTrace`] stale from the caller's point of view,
//! but there is no cancellation: the worker finishes whatever it is
//! running and answers every request in order.
//!
//! Nothing is shared between caller and worker while a request is in
//! flight. The mask and config are moved into the request and the
//! polygons are moved back.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use spinform_pipeline::{Mask, PipelineConfig, PipelineError, Polygon};

/// Name given to worker threads.
pub const THREAD_NAME: &str = "spinform-trace";

/// Errors surfaced by the worker.
///
/// Every variant means "no polygons": callers fall back to the default
/// flat shape ([`spinform_pipeline::ShapeSet::fallback`]).
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The worker thread is gone, or the request was already answered.
    #[error("trace worker is not running")]
    Disconnected,

    /// The trace panicked. The worker keeps serving later requests.
    #[error("trace worker panicked while processing generation {0}")]
    Panicked(u64),

    /// No answer arrived within the allotted time. The request is still
    /// pending and may be waited on again.
    #[error("timed out waiting for the trace worker")]
    Timeout,

    /// The OS refused to start the worker thread.
    #[error("failed to spawn trace worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// The request was rejected before reaching the worker.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Computation run by the worker for each request.
type TraceFn = fn(&Mask, &PipelineConfig) -> Vec<Polygon>;

type Reply = Result<Vec<Polygon>, WorkerError>;

struct Request {
    generation: u64,
    mask: Mask,
    config: PipelineConfig,
    reply: mpsc::SyncSender<Reply>,
}

/// Handle to a dedicated trace thread.
///
/// Dropping the handle closes the request channel and joins the thread
/// after it finishes its queue.
pub struct ShapeWorker {
    requests: Option<mpsc::Sender<Request>>,
    thread: Option<JoinHandle<()>>,
    next_generation: AtomicU64,
    latest: Arc<AtomicU64>,
}

impl ShapeWorker {
    /// Start a new worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Spawn`] if the thread cannot be created.
    pub fn spawn() -> Result<Self, WorkerError> {
        Self::spawn_with(spinform_pipeline::extract_polygons)
    }

    fn spawn_with(trace: TraceFn) -> Result<Self, WorkerError> {
        let (requests, inbox) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || serve(&inbox, trace))?;
        tracing::debug!("started trace worker");

        Ok(Self {
            requests: Some(requests),
            thread: Some(thread),
            next_generation: AtomicU64::new(0),
            latest: Arc::new(AtomicU64::new(0)),
        })
    }

    /// The process-wide worker, started on first use and kept alive for
    /// the rest of the process.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Spawn`] if the first start fails. A later
    /// call tries again.
    pub fn shared() -> Result<&'static Self, WorkerError> {
        static SHARED: OnceLock<ShapeWorker> = OnceLock::new();

        if let Some(worker) = SHARED.get() {
            return Ok(worker);
        }
        // A racing caller may also spawn; the loser's worker is dropped.
        let worker = Self::spawn()?;
        Ok(SHARED.get_or_init(|| worker))
    }

    /// Send `mask` to the worker for tracing and refinement.
    ///
    /// The returned [`PendingTrace`] becomes stale as soon as another
    /// request is submitted to this worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Pipeline`] if `config` is invalid.
    /// Returns [`WorkerError::Disconnected`] if the worker thread has
    /// exited.
    pub fn submit(&self, mask: Mask, config: PipelineConfig) -> Result<PendingTrace, WorkerError> {
        config.validate()?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.latest.fetch_max(generation, Ordering::AcqRel);

        let (reply, answer) = mpsc::sync_channel(1);
        let request = Request {
            generation,
            mask,
            config,
            reply,
        };
        self.requests
            .as_ref()
            .ok_or(WorkerError::Disconnected)?
            .send(request)
            .map_err(|_| WorkerError::Disconnected)?;

        tracing::trace!(generation, "submitted trace request");
        Ok(PendingTrace {
            generation,
            latest: Arc::clone(&self.latest),
            answer,
        })
    }

    /// Generation of the most recent submission (0 before the first).
    #[must_use]
    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }
}

impl Drop for ShapeWorker {
    fn drop(&mut self) {
        drop(self.requests.take());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("trace worker exited abnormally");
        }
    }
}

/// Worker loop: answer requests in order until every sender is gone.
fn serve(inbox: &mpsc::Receiver<Request>, trace: TraceFn) {
    for request in inbox {
        let Request {
            generation,
            mask,
            config,
            reply,
        } = request;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| trace(&mask, &config)))
            .map_err(|_| {
                tracing::warn!(generation, "trace panicked");
                WorkerError::Panicked(generation)
            });

        if let Ok(polygons) = &outcome {
            tracing::debug!(generation, polygons = polygons.len(), "trace finished");
        }
        if reply.send(outcome).is_err() {
            tracing::trace!(generation, "caller dropped its pending trace");
        }
    }
    tracing::debug!("trace worker shutting down");
}

/// A submitted request awaiting its answer.
#[derive(Debug)]
pub struct PendingTrace {
    generation: u64,
    latest: Arc<AtomicU64>,
    answer: mpsc::Receiver<Reply>,
}

impl PendingTrace {
    /// Generation assigned at submission.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` once a newer request has been submitted to the same worker.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.latest.load(Ordering::Acquire) != self.generation
    }

    /// Block until the worker answers.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Panicked`] if the trace panicked, or
    /// [`WorkerError::Disconnected`] if the worker exited without
    /// answering.
    pub fn wait(self) -> Result<Vec<Polygon>, WorkerError> {
        self.answer.recv().map_err(|_| WorkerError::Disconnected)?
    }

    /// Block for at most `timeout`.
    ///
    /// # Errors
    ///
    /// As [`wait`](Self::wait), plus [`WorkerError::Timeout`] if no
    /// answer arrived in time. After a timeout the request is still
    /// pending.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Vec<Polygon>, WorkerError> {
        match self.answer.recv_timeout(timeout) {
            Ok(reply) => reply,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(WorkerError::Timeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(WorkerError::Disconnected),
        }
    }

    /// The answer if it has already arrived, without blocking.
    #[must_use]
    pub fn poll(&self) -> Option<Result<Vec<Polygon>, WorkerError>> {
        match self.answer.try_recv() {
            Ok(reply) => Some(reply),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(WorkerError::Disconnected)),
        }
    }
}
