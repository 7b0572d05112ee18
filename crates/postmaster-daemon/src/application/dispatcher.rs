//! Ordered fan-out of detection events to registered listeners.

use std::sync::{Arc, PoisonError, RwLock};

use postmaster_core::DetectionEvent;
use rand::Rng;
use tracing::debug;

use crate::domain::DetectionHandler;

/// Length of codes produced by [`generate_synthetic_code`].
pub const SYNTHETIC_CODE_LEN: usize = 6;

/// A cheaply cloneable, ordered list of [`DetectionHandler`]s.
///
/// The monitor owns one; clones share the same list, so the debug trigger can
/// inject codes while the monitor thread runs.  Listeners are never
/// de-duplicated: registering the same listener twice makes it fire twice.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: Arc<RwLock<Vec<Arc<dyn DetectionHandler>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the end of the dispatch order.
    pub fn register<H>(&self, handler: H)
    where
        H: DetectionHandler + 'static,
    {
        self.register_shared(Arc::new(handler));
    }

    /// Appends an already shared handler (e.g. an `Arc<Broadcaster>`).
    pub fn register_shared(&self, handler: Arc<dyn DetectionHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every handler with `event`, in registration order.
    ///
    /// The handler list is snapshotted first, so no lock is held while the
    /// handlers run and a handler may itself register new handlers.
    pub fn dispatch(&self, event: &DetectionEvent) {
        let snapshot: Vec<Arc<dyn DetectionHandler>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        debug!(handlers = snapshot.len(), source = ?event.source, "dispatching detection");
        for handler in snapshot {
            handler.on_detection(event);
        }
    }

    /// Dispatches a caller-supplied code, bypassing store, decoder and extractor.
    pub fn inject_synthetic(&self, code: impl Into<String>) {
        self.dispatch(&DetectionEvent::synthetic(code));
    }
}

/// Generates a random numeric code of [`SYNTHETIC_CODE_LEN`] digits.
pub fn generate_synthetic_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SYNTHETIC_CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
