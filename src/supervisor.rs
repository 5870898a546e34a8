// 🎛️ Control surface for background imports
//
// ImportController owns at most one worker thread at a time. The worker opens
// its own store connection and runs an Importer; the controller only reads
// the progress snapshot and raises the interrupt flag.

use crate::config::ImportConfig;
use crate::db::Store;
use crate::error::{ImportError, Result};
use crate::geocode::{Geocoder, PostcodesIo};
use crate::importer::{Importer, Outcome};
use crate::progress::{InterruptFlag, Progress, ProgressHandle};
use crate::workbook::{open_workbook, Workbook};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info};

pub type SharedGeocoder = Arc<dyn Geocoder + Send + Sync>;

#[derive(Default)]
struct RunState {
    progress: ProgressHandle,
    interrupt: InterruptFlag,
    worker: Option<JoinHandle<Result<Outcome>>>,
}

pub struct ImportController {
    config: ImportConfig,
    /// Used instead of building a PostcodesIo client per run
    geocoder: Option<SharedGeocoder>,
    state: Mutex<RunState>,
}

impl ImportController {
    pub fn new(config: ImportConfig) -> Self {
        ImportController {
            config,
            geocoder: None,
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn with_geocoder(mut self, geocoder: SharedGeocoder) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load the workbook at `path` and import it on a background thread.
    /// Sheet problems are reported here, before any worker exists.
    pub fn start(&self, path: &Path, prime_geocoder: bool) -> Result<()> {
        if self.is_running() {
            return Err(ImportError::AlreadyRunning);
        }
        let workbook = open_workbook(path)?;
        info!(source = %path.display(), "Loaded workbook");
        self.start_with_workbook(workbook, prime_geocoder)
    }

    pub fn start_with_workbook(&self, workbook: Workbook, prime_geocoder: bool) -> Result<()> {
        let mut state = self.state();

        if let Some(previous) = state.worker.take() {
            if !previous.is_finished() {
                state.worker = Some(previous);
                return Err(ImportError::AlreadyRunning);
            }
            // Nobody collected the last run
            match previous.join() {
                Ok(result) => debug!(?result, "Discarding previous run outcome"),
                Err(_) => debug!("Previous import worker panicked"),
            }
        }

        let progress = ProgressHandle::new();
        let interrupt = InterruptFlag::new();

        let job = ImportJob {
            config: self.config.clone(),
            geocoder: self.geocoder.clone(),
            workbook,
            prime_geocoder,
            progress: progress.clone(),
            interrupt: interrupt.clone(),
        };

        let worker = thread::Builder::new()
            .name("adviser-import".to_string())
            .spawn(move || job.run())?;

        *state = RunState {
            progress,
            interrupt,
            worker: Some(worker),
        };
        Ok(())
    }

    /// Ask the running import to stop after its current row
    pub fn interrupt(&self) {
        self.state().interrupt.raise();
    }

    pub fn is_running(&self) -> bool {
        self.state()
            .worker
            .as_ref()
            .map(|w| !w.is_finished())
            .unwrap_or(false)
    }

    pub fn progress(&self) -> Progress {
        self.state().progress.snapshot()
    }

    /// Wait for the current worker and collect its outcome.
    /// Ok(None) when there is nothing to collect.
    pub fn join(&self) -> Result<Option<Outcome>> {
        let worker = self.state().worker.take();

        match worker {
            Some(worker) => {
                let outcome = worker.join().map_err(|_| ImportError::WorkerPanicked)??;
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }
}

/// Everything a worker thread needs, moved in at spawn time
struct ImportJob {
    config: ImportConfig,
    geocoder: Option<SharedGeocoder>,
    workbook: Workbook,
    prime_geocoder: bool,
    progress: ProgressHandle,
    interrupt: InterruptFlag,
}

impl ImportJob {
    fn run(self) -> Result<Outcome> {
        let store = Store::open(&self.config.database)?;

        let client;
        let geocoder: &dyn Geocoder = match &self.geocoder {
            Some(shared) => shared.as_ref(),
            None => {
                client = PostcodesIo::new(&self.config.geocoder_url, self.config.geocoder_timeout)?;
                &client
            }
        };

        Importer::new(&store, &self.workbook, geocoder)
            .with_progress(self.progress)
            .with_interrupt(self.interrupt)
            .prime_geocoder(self.prime_geocoder)
            .run()
    }
}

// ============================================================================
// SUPERVISING LOOP
// ============================================================================

/// Poll the running import, printing progress every `interval`.
/// Ctrl-C interrupts the worker; either way this returns once it has exited.
pub async fn supervise(controller: Arc<ImportController>, interval: Duration) -> Result<Option<Outcome>> {
    supervise_until(controller, interval, async {
        let _ = signal::ctrl_c().await;
    })
    .await
}

/// Shortest accepted polling interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Same as `supervise`, with `stop` standing in for Ctrl-C
pub async fn supervise_until<F>(
    controller: Arc<ImportController>,
    interval: Duration,
    stop: F,
) -> Result<Option<Outcome>>
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
    tokio::pin!(stop);
    let mut stopping = false;

    while controller.is_running() {
        tokio::select! {
            _ = ticker.tick() => {
                println!("{}", controller.progress());
            }
            _ = &mut stop, if !stopping => {
                println!("Interrupting importer thread");
                controller.interrupt();
                stopping = true;
            }
        }
    }

    let joiner = Arc::clone(&controller);
    let outcome = tokio::task::spawn_blocking(move || joiner.join())
        .await
        .map_err(|_| ImportError::WorkerPanicked)??;

    if stopping {
        println!("Importer stopped");
    }
    Ok(outcome)
}
