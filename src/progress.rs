// 📶 Progress snapshot + interrupt flag
//
// The import worker is the only writer of both; the supervisor (CLI loop or
// HTTP handlers) only reads the snapshot and raises the flag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

pub const TASK_INITIALISING: &str = "initialising";
pub const TASK_PRIMING: &str = "Caching known postcode locations";
pub const TASK_DONE: &str = "done";

/// What the worker is doing right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Progress {
    /// A task without row counts
    pub fn task(name: &str) -> Self {
        Progress {
            task: name.to_string(),
            total: None,
            count: None,
        }
    }

    /// Start of a phase over `total` rows
    pub fn phase(name: &str, total: usize) -> Self {
        Progress {
            task: name.to_string(),
            total: Some(total),
            count: Some(0),
        }
    }

    pub fn done() -> Self {
        Self::task(TASK_DONE)
    }

    pub fn is_done(&self) -> bool {
        self.task == TASK_DONE
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::task(TASK_INITIALISING)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.count, self.total) {
            (Some(count), Some(total)) => write!(f, "{}: {} / {}", self.task, count, total),
            _ => write!(f, "{}", self.task),
        }
    }
}

/// Shared, atomically replaced progress snapshot
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    inner: Arc<RwLock<Progress>>,
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, progress: Progress) {
        let mut current = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *current = progress;
    }

    /// Count one more processed row in the current phase
    pub fn increment(&self) {
        let mut current = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = current.count.as_mut() {
            *count += 1;
        }
    }

    pub fn snapshot(&self) -> Progress {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Cooperative stop request, one per run
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
