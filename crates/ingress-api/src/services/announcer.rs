//! Status announcer
//!
//! Lifecycle events are emitted without waiting on delivery. Ordering per
//! request id is carried by the dispatcher; the caller only learns whether an
//! event was queued at all.

use super::dispatch::Dispatcher;
use ingress_core::models::StatusEvent;

pub trait Announcer: Send + Sync {
    /// Queue a status event. Returns `false` if it was dropped.
    fn status(&self, event: StatusEvent) -> bool;
}

pub struct DispatchAnnouncer {
    dispatcher: Dispatcher<StatusEvent>,
}

impl DispatchAnnouncer {
    pub fn new(dispatcher: Dispatcher<StatusEvent>) -> Self {
        Self { dispatcher }
    }
}

impl Announcer for DispatchAnnouncer {
    fn status(&self, event: StatusEvent) -> bool {
        tracing::debug!(
            request_id = %event.request_id,
            status = %event.status,
            status_msg = %event.status_msg,
            "Announcing status"
        );
        self.dispatcher.dispatch(event)
    }
}
