//! In-process detection listeners.
//!
//! These replace the desktop menu-bar collaborator: [`LogNotifier`] announces
//! each code in the log and [`LatestCodeTracker`] remembers the most recent
//! one together with when it arrived.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use postmaster_core::{DetectionEvent, DetectionSource};
use tracing::info;

use crate::domain::DetectionHandler;

/// Logs every detected code at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl DetectionHandler for LogNotifier {
    fn on_detection(&self, event: &DetectionEvent) {
        match &event.source {
            DetectionSource::Store { guid } => {
                info!(code = %event.code, guid = %guid, "one-time code detected");
            }
            DetectionSource::Synthetic => {
                info!(code = %event.code, "synthetic one-time code dispatched");
            }
        }
    }
}

/// The most recently detected code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestCode {
    pub code: String,
    pub detected_at: SystemTime,
}

/// Remembers the most recently detected code.
///
/// Clones share state, so one clone can be registered with the dispatcher and
/// another kept for reading.
#[derive(Debug, Default, Clone)]
pub struct LatestCodeTracker {
    latest: Arc<Mutex<Option<LatestCode>>>,
}

impl LatestCodeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest code, or `None` if nothing has been detected yet.
    pub fn latest(&self) -> Option<LatestCode> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DetectionHandler for LatestCodeTracker {
    fn on_detection(&self, event: &DetectionEvent) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(LatestCode {
            code: event.code.clone(),
            detected_at: SystemTime::now(),
        });
    }
}
