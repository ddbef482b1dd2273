use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::app::{App, HostOps};
use crate::provider::{
    CancelSignal, ChatMessage, ProviderProfile, RunEvent, RunId, RunProvider, RunRequest,
};

pub const ERROR_RUN_ALREADY_ACTIVE: &str = "Run already active";

/// Destination for events produced by run workers.
///
/// The foreground loop owns the receiving end and feeds each event back into
/// [`RuntimeController::apply_run_event`], one at a time.
pub type RunEventSink = Arc<dyn Fn(RunEvent) + Send + Sync>;

struct ActiveRun {
    run_id: RunId,
    cancel: CancelSignal,
    join_handle: Option<JoinHandle<()>>,
}

/// Owns worker threads and the active run, and applies relayed events to `App`.
///
/// Lock order is `app` before `active_run`; nothing takes them the other way.
pub struct RuntimeController {
    app: Arc<Mutex<App>>,
    sink: RunEventSink,
    next_run_id: AtomicU64,
    active_run: Mutex<Option<ActiveRun>>,
    provider: Arc<dyn RunProvider>,
}

impl RuntimeController {
    pub fn new(
        app: Arc<Mutex<App>>,
        provider: Arc<dyn RunProvider>,
        sink: RunEventSink,
    ) -> Arc<Self> {
        Arc::new(Self {
            app,
            sink,
            next_run_id: AtomicU64::new(1),
            active_run: Mutex::new(None),
            provider,
        })
    }

    pub fn app(&self) -> &Arc<Mutex<App>> {
        &self.app
    }

    pub fn provider_profile(&self) -> ProviderProfile {
        self.provider.profile()
    }

    /// Returns the run the controller still owns a worker for, if any.
    pub fn active_run_id(&self) -> Option<RunId> {
        self.lock_active_run().as_ref().map(|active| active.run_id)
    }

    fn start_run_internal(self: &Arc<Self>, messages: Vec<ChatMessage>) -> Result<RunId, String> {
        let mut active_run = self.lock_active_run();
        if active_run.is_some() {
            return Err(ERROR_RUN_ALREADY_ACTIVE.to_string());
        }

        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        let cancel = Arc::new(AtomicBool::new(false));
        let request = RunRequest { run_id, messages };
        let join_handle = self.spawn_worker(request, Arc::clone(&cancel))?;

        debug!(run_id, "run started");
        *active_run = Some(ActiveRun {
            run_id,
            cancel,
            join_handle: Some(join_handle),
        });

        Ok(run_id)
    }

    fn spawn_worker(
        self: &Arc<Self>,
        request: RunRequest,
        cancel: CancelSignal,
    ) -> Result<JoinHandle<()>, String> {
        let run_id = request.run_id;
        let controller = Arc::clone(self);
        thread::Builder::new()
            .name(format!("codybot-run-{run_id}"))
            .spawn(move || controller.run_worker(request, cancel))
            .map_err(|error| format!("Failed to spawn run worker: {error}"))
    }

    fn run_worker(self: Arc<Self>, request: RunRequest, cancel: CancelSignal) {
        let run_id = request.run_id;
        let terminal_emitted = AtomicBool::new(false);
        let sink = Arc::clone(&self.sink);
        let provider = Arc::clone(&self.provider);

        let mut emit = |event: RunEvent| {
            if event.run_id() != run_id || terminal_emitted.load(Ordering::SeqCst) {
                return;
            }
            if event.is_terminal() {
                terminal_emitted.store(true, Ordering::SeqCst);
            }

            sink(event);
        };
        let run_outcome = catch_unwind(AssertUnwindSafe(|| {
            provider.run(request, Arc::clone(&cancel), &mut emit)
        }));

        match run_outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => emit(RunEvent::Error { run_id, error }),
            Err(_) => emit(RunEvent::Error {
                run_id,
                error: "Provider panicked".to_string(),
            }),
        }

        if !terminal_emitted.load(Ordering::SeqCst) {
            warn!(run_id, "provider exited without terminal event");
            emit(RunEvent::Error {
                run_id,
                error: "Provider exited without terminal event".to_string(),
            });
        }
    }

    /// Applies one relayed event to the session, then releases the worker
    /// slot when the event ends the run that currently owns it.
    pub fn apply_run_event(&self, event: RunEvent) {
        let run_id = event.run_id();
        let terminal = event.is_terminal();

        {
            let mut app = lock_unpoisoned(&self.app);
            if app.active_run_id() != Some(run_id) {
                trace!(run_id, "dropping stale run event");
            }

            match event {
                RunEvent::Token { run_id, text } => app.on_run_token(run_id, &text),
                RunEvent::Done { run_id } => app.on_run_done(run_id),
                RunEvent::Error { run_id, error } => {
                    if app.active_run_id() == Some(run_id) {
                        warn!(run_id, %error, "run failed");
                    }
                    app.on_run_error(run_id, &error);
                }
                RunEvent::Cancelled { run_id } => app.on_run_cancelled(run_id),
            }
        }

        if terminal {
            debug!(run_id, "run finished");
            self.clear_active_run_if_matching(run_id);
        }
    }

    fn clear_active_run_if_matching(&self, run_id: RunId) {
        let mut active_run = self.lock_active_run();
        let matches = active_run.as_ref().map(|active| active.run_id) == Some(run_id);
        if !matches {
            return;
        }

        let Some(mut completed) = active_run.take() else {
            return;
        };

        if let Some(join_handle) = completed.join_handle.take() {
            let is_current_thread = join_handle.thread().id() == thread::current().id();
            if !is_current_thread && join_handle.is_finished() {
                let _ = join_handle.join();
            }
        }
    }

    /// Signals cancellation and detaches the worker so a new run can start
    /// immediately; its remaining events are dropped as stale.
    fn cancel_run_internal(&self, run_id: RunId) {
        let mut active_run = self.lock_active_run();
        let matches = active_run.as_ref().map(|active| active.run_id) == Some(run_id);
        if !matches {
            return;
        }

        if let Some(cancelled) = active_run.take() {
            cancelled.cancel.store(true, Ordering::SeqCst);
            debug!(run_id, "run cancelled");
        }
    }

    fn lock_active_run(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        lock_unpoisoned(&self.active_run)
    }
}

impl HostOps for Arc<RuntimeController> {
    fn start_run(&mut self, messages: Vec<ChatMessage>) -> Result<RunId, String> {
        self.start_run_internal(messages)
    }

    fn cancel_run(&mut self, run_id: RunId) {
        self.cancel_run_internal(run_id);
    }
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
