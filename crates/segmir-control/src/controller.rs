//! Thread-safe handle around a [`Mirror`].

use std::sync::{Arc, Mutex};

use log::warn;

use crate::device::StateHandle;
use crate::error::MirrorError;
use crate::mirror::Mirror;
use crate::report::BatchReport;

/// Shares one mirror between threads.
///
/// Operations take the mirror lock for their whole duration. The stop flag
/// lives outside the lock, so [`MirrorController::stop`] interrupts an
/// alignment or a move that another thread is running.
#[derive(Clone, Debug)]
pub struct MirrorController {
    inner: Arc<Mutex<Mirror>>,
    state: StateHandle,
}

impl MirrorController {
    pub fn new(mirror: Mirror) -> Self {
        let state = mirror.state_handle();
        Self {
            inner: Arc::new(Mutex::new(mirror)),
            state,
        }
    }

    /// Handle that can switch the mirror off without the lock.
    pub fn stop_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// Run `f` with exclusive access to the mirror.
    pub fn with<T>(&self, f: impl FnOnce(&mut Mirror) -> Result<T, MirrorError>) -> Result<T, MirrorError> {
        let mut guard = self.inner.lock().map_err(|_| MirrorError::Poisoned)?;
        f(&mut guard)
    }

    /// Switch the mirror off, then stop its selected panels once the running
    /// operation has let go of the lock.
    pub fn stop(&self) -> Result<BatchReport, MirrorError> {
        self.state.stop();
        let report = self.with(|mirror| Ok(mirror.stop_all_selected_panels()))?;
        if !report.is_success() {
            warn!("{} panels did not acknowledge stop", report.len() - report.succeeded());
        }
        Ok(report)
    }

    /// Switch the mirror back on after a stop.
    pub fn resume(&self) {
        self.state.set(crate::device::DeviceState::On);
    }
}
