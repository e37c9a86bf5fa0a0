//! Internal utilities.

pub(crate) mod event_queue;
