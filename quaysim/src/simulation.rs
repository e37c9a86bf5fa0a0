//! Discrete-event simulation kernel.
//!
//! A simulation is built from a [`ScenarioBuilder`](scenario::ScenarioBuilder)
//! and processed event by event. The kernel owns:
//!
//! * the event queue, a time-ordered schedule of node continuations where
//!   same-time events run in scheduling order,
//! * the node graph, with every node parked in its arena slot between
//!   dispatches,
//! * the pending dispatch queue, holding same-instant wakeups (channel
//!   signals and explicit activations) raised while another node was being
//!   dispatched.
//!
//! # Dispatch discipline
//!
//! Exactly one node runs at a time. When a node's callback executes, the
//! node is checked out of its slot and handed an exclusive [`SimContext`];
//! item transfer is synchronous ([`SimContext::send`] nests straight into
//! the receiver's `on_arrive`, [`SimContext::receive`] nests into the
//! supplier's `supply`), so a transfer chain that loops back into a node
//! already running is detected as re-entrant dispatch and aborts the run.
//!
//! Channel state transitions instead take effect in two phases: the flag
//! flips immediately at the call site, while listener notification is
//! deferred to the pending queue and delivered in FIFO order once the
//! current chain has unwound. Nodes therefore always consult live flags
//! before transferring and treat signals as wakeups rather than as the
//! source of truth.
//!
//! After each processed event the kernel drains the pending queue and then
//! samples every continuous metric group, which is exact for the
//! piecewise-constant signals produced by this kernel.
//!
//! Item transfers and channel transitions are narrated to the attached
//! [`EventLog`](event_log::EventLog) when one is enabled; the log observes
//! the run and never participates in control flow.

pub mod event_log;
pub mod scenario;

use std::collections::VecDeque;
use std::error;
use std::fmt;
use std::time::Duration;

use crate::channel::{ChannelSignal, PullChannelId, PushChannelId};
use crate::metrics::{Gauge, MetricGroup};
use crate::node::{Network, Node, NodeId};
use crate::time::{Deadline, MonotonicTime};
use crate::util::event_queue::EventQueue;

use event_log::EventLog;
use scenario::Scenario;

/// Error returned when a simulation deadline does not lie in the future.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulingError {
    /// The specified time or deadline is not in the future of the current
    /// simulation time.
    InvalidScheduledTime,
}

impl fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidScheduledTime => {
                f.write_str("the specified scheduled time is not in the future")
            }
        }
    }
}

impl error::Error for SchedulingError {}

/// Observer invoked after every processed event, once metrics have been
/// sampled.
pub trait MetricReporter {
    fn report(&mut self, time: MonotonicTime, metrics: &[MetricGroup]);
}

impl<F: FnMut(MonotonicTime, &[MetricGroup])> MetricReporter for F {
    fn report(&mut self, time: MonotonicTime, metrics: &[MetricGroup]) {
        self(time, metrics)
    }
}

type ActionFn<T> = Box<dyn FnOnce(&mut dyn Node<T>, &mut SimContext<T>)>;

/// A scheduled continuation on a node.
pub(crate) struct ScheduledAction<T: 'static> {
    node: NodeId,
    action: ActionFn<T>,
}

fn wrap_action<T, N, F>(action: F) -> ActionFn<T>
where
    T: 'static,
    N: Node<T> + 'static,
    F: FnOnce(&mut N, &mut SimContext<T>) + 'static,
{
    Box::new(move |node, ctx| {
        let label = node.label().to_owned();
        let Some(node) = node.as_any_mut().downcast_mut::<N>() else {
            panic!("scheduled action targets node '{label}' of a different type");
        };
        action(node, ctx)
    })
}

/// A same-instant wakeup raised during a dispatch.
pub(crate) enum PendingEvent {
    /// Channel availability notification for a listener.
    Signal { node: NodeId, signal: ChannelSignal },
    /// Explicit activation requested through [`SimContext::activate`].
    Activate { node: NodeId },
}

/// A fully wired simulation, ready to process events.
pub struct Simulation<T: 'static> {
    queue: EventQueue<MonotonicTime, ScheduledAction<T>>,
    time: MonotonicTime,
    net: Network<T>,
    scenario: Scenario,
    pending: VecDeque<PendingEvent>,
    log: Box<dyn EventLog>,
    reporter: Option<Box<dyn MetricReporter>>,
    metric_groups: Vec<MetricGroup>,
}

impl<T: 'static> Simulation<T> {
    pub(crate) fn new(
        net: Network<T>,
        time: MonotonicTime,
        scenario: Scenario,
        log: Box<dyn EventLog>,
        reporter: Option<Box<dyn MetricReporter>>,
        metric_groups: Vec<MetricGroup>,
    ) -> Self {
        Self {
            queue: EventQueue::new(),
            time,
            net,
            scenario,
            pending: VecDeque::new(),
            log,
            reporter,
            metric_groups,
        }
    }

    /// The current simulation time.
    pub fn time(&self) -> MonotonicTime {
        self.time
    }

    /// Whether the event queue is empty.
    pub fn is_finished(&self) -> bool {
        self.queue.is_empty()
    }

    /// Schedules a typed continuation on a node after the given delay.
    pub fn schedule_in<N, F>(&mut self, delay: Duration, node: NodeId, action: F)
    where
        N: Node<T> + 'static,
        F: FnOnce(&mut N, &mut SimContext<T>) + 'static,
    {
        self.queue.insert(
            self.time + delay,
            ScheduledAction {
                node,
                action: wrap_action::<T, N, F>(action),
            },
        );
    }

    /// Processes the next event, if any, advancing the simulation time to
    /// its timestamp.
    pub fn step(&mut self) -> bool {
        let Some((time, scheduled)) = self.queue.pull() else {
            return false;
        };
        assert!(
            time >= self.time,
            "event time precedes the current simulation time"
        );
        self.time = time;
        tracing::trace!(time = %self.time, node = scheduled.node.0, "processing event");

        let action = scheduled.action;
        self.dispatch(scheduled.node, move |node, ctx| action(node, ctx));
        self.drain_pending();
        self.sample_metrics();
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.report(self.time, &self.metric_groups);
        }

        true
    }

    /// Processes events until the queue is exhausted.
    pub fn run(&mut self) {
        while self.step() {}
    }

    /// Processes events for the given simulated duration, then advances the
    /// time to the end of that span.
    pub fn run_for(&mut self, duration: Duration) {
        self.advance_to(self.time + duration);
    }

    /// Processes events up to the given deadline, then advances the time to
    /// it. The deadline must lie in the future of the current time.
    pub fn run_until(&mut self, deadline: impl Deadline) -> Result<(), SchedulingError> {
        let target = deadline.into_time(self.time);
        if target <= self.time {
            return Err(SchedulingError::InvalidScheduledTime);
        }
        self.advance_to(target);

        Ok(())
    }

    fn advance_to(&mut self, target: MonotonicTime) {
        loop {
            match self.queue.peek_key() {
                Some(&key) if key <= target => {
                    self.step();
                }
                _ => break,
            }
        }
        self.time = target;
        // Capture the tail span up to the bound in the time-weighted
        // estimators.
        self.sample_metrics();
    }

    /// The frozen scenario description: sources and the closure of nodes
    /// reachable from them.
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// The metric groups registered on the scenario.
    pub fn metrics(&self) -> &[MetricGroup] {
        &self.metric_groups
    }

    /// Looks up a metric group by label.
    pub fn metric(&self, label: &str) -> Option<&MetricGroup> {
        self.metric_groups.iter().find(|m| m.label() == label)
    }

    /// Snapshot of a node's internal counters, for display purposes.
    pub fn node_report(&self, node: NodeId) -> Vec<(String, f64)> {
        self.net.nodes[node.0]
            .node
            .as_ref()
            .map(|n| n.report())
            .unwrap_or_default()
    }

    /// Dispatches a callback on a node, checking it out of its slot for the
    /// duration of the call.
    pub(crate) fn dispatch(
        &mut self,
        node_id: NodeId,
        f: impl FnOnce(&mut dyn Node<T>, &mut SimContext<T>),
    ) {
        let mut node = match self.net.nodes[node_id.0].node.take() {
            Some(node) => node,
            None => panic!(
                "re-entrant dispatch on node '{}'",
                self.net.nodes[node_id.0].label
            ),
        };
        let mut ctx = SimContext {
            time: self.time,
            current: node_id,
            queue: &mut self.queue,
            net: &mut self.net,
            pending: &mut self.pending,
            log: self.log.as_mut(),
        };
        f(node.as_mut(), &mut ctx);
        self.net.nodes[node_id.0].node = Some(node);
    }

    /// Delivers deferred wakeups in FIFO order. Wakeup handlers may raise
    /// further wakeups, which are appended and delivered in turn.
    pub(crate) fn drain_pending(&mut self) {
        while let Some(event) = self.pending.pop_front() {
            match event {
                PendingEvent::Signal { node, signal } => {
                    self.dispatch(node, move |n, ctx| n.on_signal(signal, ctx));
                }
                PendingEvent::Activate { node } => {
                    self.dispatch(node, |n, ctx| n.on_activate(ctx));
                }
            }
        }
    }

    pub(crate) fn sample_metrics(&mut self) {
        for group in &mut self.metric_groups {
            group.sample(self.time);
        }
    }
}

/// Exclusive handle to the simulation, passed to every node callback.
///
/// The context knows which node it was issued to; channel discovery and
/// self-scheduling are expressed relative to that node.
pub struct SimContext<'a, T: 'static> {
    time: MonotonicTime,
    current: NodeId,
    queue: &'a mut EventQueue<MonotonicTime, ScheduledAction<T>>,
    net: &'a mut Network<T>,
    pending: &'a mut VecDeque<PendingEvent>,
    log: &'a mut dyn EventLog,
}

impl<T: 'static> SimContext<'_, T> {
    /// The current simulation time.
    pub fn time(&self) -> MonotonicTime {
        self.time
    }

    /// The node this context was issued to.
    pub fn current(&self) -> NodeId {
        self.current
    }

    /// The current node's label.
    pub fn label(&self) -> &str {
        &self.net.nodes[self.current.0].label
    }

    /// The label of an arbitrary node.
    pub fn node_label(&self, node: NodeId) -> &str {
        &self.net.nodes[node.0].label
    }

    /// The current node's incoming push channels, in wiring order.
    pub fn incoming_push(&self) -> Vec<PushChannelId> {
        self.net.nodes[self.current.0].incoming_push.clone()
    }

    /// The current node's outgoing push channels, in wiring order.
    pub fn outgoing_push(&self) -> Vec<PushChannelId> {
        self.net.nodes[self.current.0].outgoing_push.clone()
    }

    /// The current node's incoming pull channels, in wiring order.
    pub fn incoming_pull(&self) -> Vec<PullChannelId> {
        self.net.nodes[self.current.0].incoming_pull.clone()
    }

    /// The current node's outgoing pull channels, in wiring order.
    pub fn outgoing_pull(&self) -> Vec<PullChannelId> {
        self.net.nodes[self.current.0].outgoing_pull.clone()
    }

    /// Schedules a typed continuation on the current node after the given
    /// delay.
    pub fn schedule_self_in<N, F>(&mut self, delay: Duration, action: F)
    where
        N: Node<T> + 'static,
        F: FnOnce(&mut N, &mut SimContext<T>) + 'static,
    {
        self.schedule_in(delay, self.current, action);
    }

    /// Schedules a typed continuation on an arbitrary node after the given
    /// delay.
    pub fn schedule_in<N, F>(&mut self, delay: Duration, node: NodeId, action: F)
    where
        N: Node<T> + 'static,
        F: FnOnce(&mut N, &mut SimContext<T>) + 'static,
    {
        self.queue.insert(
            self.time + delay,
            ScheduledAction {
                node,
                action: wrap_action::<T, N, F>(action),
            },
        );
    }

    /// Whether a push channel is currently open.
    pub fn is_open(&self, channel: PushChannelId) -> bool {
        self.net.push[channel.0].open
    }

    /// Whether a pull channel is currently ready.
    pub fn is_ready(&self, channel: PullChannelId) -> bool {
        self.net.pull[channel.0].ready
    }

    /// Delivers an item to the downstream node of a push channel.
    ///
    /// Delivery is synchronous: the receiver's `on_arrive` runs to completion
    /// within this call.
    ///
    /// # Panics
    ///
    /// Panics if the channel is closed or the transfer chain loops back into
    /// a node that is already running.
    pub fn send(&mut self, channel: PushChannelId, item: T) {
        let state = &self.net.push[channel.0];
        if !state.open {
            panic!("send on closed push channel '{}'", state.label);
        }
        let target = state.downstream;
        if self.log.enabled() {
            let line = format!("channel '{}': item pushed", self.net.push[channel.0].label);
            self.log.log(self.time, &line);
        }
        self.dispatch_nested(target, move |node, ctx| node.on_arrive(channel, item, ctx));
    }

    /// Obtains an item from the upstream node of a pull channel.
    ///
    /// The transfer is synchronous: the supplier's `supply` runs to
    /// completion within this call.
    ///
    /// # Panics
    ///
    /// Panics if the channel is not ready, has no bound supplier, or the
    /// transfer chain loops back into a node that is already running.
    pub fn receive(&mut self, channel: PullChannelId) -> T {
        let state = &self.net.pull[channel.0];
        if !state.ready {
            panic!("receive on not ready pull channel '{}'", state.label);
        }
        let Some(supplier) = state.upstream else {
            panic!("pull channel '{}' has no upstream node bound", state.label);
        };
        if self.log.enabled() {
            let line = format!("channel '{}': item pulled", self.net.pull[channel.0].label);
            self.log.log(self.time, &line);
        }

        self.dispatch_nested(supplier, move |node, ctx| node.supply(channel, ctx))
    }

    /// Opens a push channel. On an actual transition, listeners are notified
    /// once the current dispatch chain has unwound.
    pub fn open(&mut self, channel: PushChannelId) {
        if self.net.push[channel.0].set_open(true) {
            self.narrate_push(channel, "opened");
            self.notify_push(channel, ChannelSignal::Opened(channel));
        }
    }

    /// Closes a push channel. On an actual transition, listeners are
    /// notified once the current dispatch chain has unwound.
    pub fn close(&mut self, channel: PushChannelId) {
        if self.net.push[channel.0].set_open(false) {
            self.narrate_push(channel, "closed");
            self.notify_push(channel, ChannelSignal::Closed(channel));
        }
    }

    /// Marks a pull channel ready. On an actual transition, listeners are
    /// notified once the current dispatch chain has unwound.
    pub fn mark_ready(&mut self, channel: PullChannelId) {
        if self.net.pull[channel.0].set_ready(true) {
            self.narrate_pull(channel, "ready");
            self.notify_pull(channel, ChannelSignal::Ready(channel));
        }
    }

    /// Marks a pull channel not ready. On an actual transition, listeners
    /// are notified once the current dispatch chain has unwound.
    pub fn mark_not_ready(&mut self, channel: PullChannelId) {
        if self.net.pull[channel.0].set_ready(false) {
            self.narrate_pull(channel, "no longer ready");
            self.notify_pull(channel, ChannelSignal::NotReady(channel));
        }
    }

    /// Requests a same-instant `on_activate` wakeup on another node, e.g. to
    /// re-arm a gate after returning a token to its pool.
    pub fn activate(&mut self, node: NodeId) {
        self.pending.push_back(PendingEvent::Activate { node });
    }

    /// Resolves the nearest tagged container downstream of a push channel.
    ///
    /// Intended for `on_start`, where occupancy-driven policies bind their
    /// gauges once.
    pub fn downstream_container(&self, channel: PushChannelId) -> Option<Gauge> {
        self.net.downstream_container(channel)
    }

    /// Resolves the nearest tagged container upstream of a pull channel.
    pub fn upstream_container(&self, channel: PullChannelId) -> Option<Gauge> {
        self.net.upstream_container(channel)
    }

    /// Appends a line to the scenario event log, if one is attached. The
    /// message closure is only evaluated when the log is enabled.
    pub fn log(&mut self, message: impl FnOnce() -> String) {
        if self.log.enabled() {
            let message = message();
            self.log.log(self.time, &message);
        }
    }

    fn narrate_push(&mut self, channel: PushChannelId, transition: &str) {
        if self.log.enabled() {
            let line = format!("channel '{}' {transition}", self.net.push[channel.0].label);
            self.log.log(self.time, &line);
        }
    }

    fn narrate_pull(&mut self, channel: PullChannelId, transition: &str) {
        if self.log.enabled() {
            let line = format!("channel '{}' {transition}", self.net.pull[channel.0].label);
            self.log.log(self.time, &line);
        }
    }

    fn notify_push(&mut self, channel: PushChannelId, signal: ChannelSignal) {
        for &node in &self.net.push[channel.0].listeners {
            self.pending.push_back(PendingEvent::Signal { node, signal });
        }
    }

    fn notify_pull(&mut self, channel: PullChannelId, signal: ChannelSignal) {
        for &node in &self.net.pull[channel.0].listeners {
            self.pending.push_back(PendingEvent::Signal { node, signal });
        }
    }

    fn dispatch_nested<R>(
        &mut self,
        target: NodeId,
        f: impl FnOnce(&mut dyn Node<T>, &mut SimContext<T>) -> R,
    ) -> R {
        let mut node = match self.net.nodes[target.0].node.take() {
            Some(node) => node,
            None => panic!(
                "re-entrant delivery to node '{}'",
                self.net.nodes[target.0].label
            ),
        };
        let mut ctx = SimContext {
            time: self.time,
            current: target,
            queue: &mut *self.queue,
            net: &mut *self.net,
            pending: &mut *self.pending,
            log: &mut *self.log,
        };
        let result = f(node.as_mut(), &mut ctx);
        self.net.nodes[target.0].node = Some(node);

        result
    }
}
