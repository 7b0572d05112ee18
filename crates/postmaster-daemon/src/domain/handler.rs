//! Listener traits invoked by the message monitor.
//!
//! Dispatch is synchronous: the monitor calls every listener in registration
//! order before it moves on to the next row.  A listener that needs to do slow
//! or asynchronous work must hand it off (to a channel, a task, a thread)
//! instead of blocking inside the callback.

use postmaster_core::DetectionEvent;

/// Receives every detected code.
///
/// Closures of the shape `Fn(&DetectionEvent)` implement this trait, so simple
/// listeners need no dedicated type:
///
/// ```rust
/// use postmaster_daemon::application::Dispatcher;
/// use postmaster_core::DetectionEvent;
///
/// let dispatcher = Dispatcher::new();
/// dispatcher.register(|event: &DetectionEvent| println!("code: {}", event.code));
/// ```
pub trait DetectionHandler: Send + Sync {
    /// Handles one detected code.  Panics are the listener's own problem.
    fn on_detection(&self, event: &DetectionEvent);
}

impl<F> DetectionHandler for F
where
    F: Fn(&DetectionEvent) + Send + Sync,
{
    fn on_detection(&self, event: &DetectionEvent) {
        self(event)
    }
}

/// Invoked once per episode in which the message store cannot be read.
///
/// Lets a collaborator (a UI, a permission helper) prompt the user for access
/// without the monitor knowing anything about OS permissions.
pub trait NoAccessHandler: Send {
    fn on_no_access(&self);
}

impl<F> NoAccessHandler for F
where
    F: Fn() + Send,
{
    fn on_no_access(&self) {
        self()
    }
}
