//! Scenario event logging.
//!
//! Nodes narrate noteworthy moments (arrivals, departures, backpressure
//! transitions) through [`SimContext::log`](crate::simulation::SimContext::log).
//! The attached [`EventLog`] decides what happens to those lines; the
//! default [`NoopEventLog`] discards them without even formatting them.

use std::cell::RefCell;
use std::rc::Rc;

use crate::time::MonotonicTime;

/// Sink for timestamped scenario narration.
pub trait EventLog {
    /// Records one line.
    fn log(&mut self, time: MonotonicTime, message: &str);

    /// Whether lines should be formatted and recorded at all.
    fn enabled(&self) -> bool {
        true
    }
}

/// Discards all lines; message formatting is skipped entirely.
pub struct NoopEventLog;

impl EventLog for NoopEventLog {
    fn log(&mut self, _time: MonotonicTime, _message: &str) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// Forwards lines to the `tracing` subscriber at info level.
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn log(&mut self, time: MonotonicTime, message: &str) {
        tracing::info!(target: "quaysim::events", time = %time, "{message}");
    }
}

/// Buffers lines in memory, with a shared handle for later inspection.
#[derive(Default)]
pub struct MemoryEventLog {
    entries: Rc<RefCell<Vec<(MonotonicTime, String)>>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle to the buffered lines, valid after the log itself has been
    /// handed to the scenario.
    pub fn handle(&self) -> Rc<RefCell<Vec<(MonotonicTime, String)>>> {
        Rc::clone(&self.entries)
    }
}

impl EventLog for MemoryEventLog {
    fn log(&mut self, time: MonotonicTime, message: &str) {
        self.entries.borrow_mut().push((time, message.to_owned()));
    }
}
