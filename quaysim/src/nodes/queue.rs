//! Buffering under a pluggable storage discipline.

use std::marker::PhantomData;

use crate::channel::{ChannelSignal, PullChannelId, PushChannelId};
use crate::metrics::Gauge;
use crate::node::Node;
use crate::policy::{FifoQueue, QueuePolicy};
use crate::simulation::SimContext;

/// A tagged container buffering items under a [`QueuePolicy`].
///
/// The queue accepts items on any number of push inputs and hands them out
/// on exactly one output, which is either a push channel (items are forwarded
/// as soon as the channel is open) or a pull channel (the queue marks it
/// ready while non-empty and downstream consumers draw at their own pace).
///
/// An optional capacity turns the queue into a bounded buffer: its inputs
/// close the moment the capacity is reached and reopen as soon as an item
/// leaves. The policy decides order only; admission is the queue's job.
pub struct QueueNode<T, P: QueuePolicy<T>> {
    label: String,
    policy: P,
    capacity: Option<usize>,
    gauge: Gauge,
    inputs: Vec<PushChannelId>,
    output: Output,
    _item: PhantomData<fn() -> T>,
}

#[derive(Copy, Clone)]
enum Output {
    Unresolved,
    Push(PushChannelId),
    Pull(PullChannelId),
}

impl<T: 'static> QueueNode<T, FifoQueue<T>> {
    /// Creates an unbounded first-in, first-out queue.
    pub fn fifo(label: impl Into<String>) -> Self {
        Self::new(label, FifoQueue::new())
    }
}

impl<T: 'static, P: QueuePolicy<T> + 'static> QueueNode<T, P> {
    /// Creates an unbounded queue under the given discipline.
    ///
    /// The policy may be pre-seeded with initial stock, which is offered
    /// downstream as soon as the simulation starts.
    pub fn new(label: impl Into<String>, policy: P) -> Self {
        Self {
            label: label.into(),
            policy,
            capacity: None,
            gauge: Gauge::new(),
            inputs: Vec::new(),
            output: Output::Unresolved,
            _item: PhantomData,
        }
    }

    /// Bounds the queue to the given capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    fn update_gauge(&self) {
        self.gauge.set(self.policy.occupancy() as f64);
    }

    /// Forwards items on a push output while it stays open.
    fn drain(&mut self, output: PushChannelId, ctx: &mut SimContext<T>) {
        while self.policy.occupancy() > 0 && ctx.is_open(output) {
            let item = self.policy.dequeue();
            self.update_gauge();
            ctx.send(output, item);
        }
    }

    /// Closes the inputs at capacity, reopens them below it.
    fn update_inputs(&mut self, ctx: &mut SimContext<T>) {
        let full = self
            .capacity
            .map_or(false, |capacity| self.policy.occupancy() >= capacity);
        for &input in &self.inputs {
            if full {
                ctx.close(input);
            } else {
                ctx.open(input);
            }
        }
    }

    fn offer(&mut self, ctx: &mut SimContext<T>) {
        match self.output {
            Output::Unresolved => {}
            Output::Push(output) => self.drain(output, ctx),
            Output::Pull(output) => {
                if self.policy.occupancy() > 0 {
                    ctx.mark_ready(output);
                }
            }
        }
    }
}

impl<T: 'static, P: QueuePolicy<T> + 'static> Node<T> for QueueNode<T, P> {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_start(&mut self, ctx: &mut SimContext<T>) {
        self.inputs = ctx.incoming_push();
        let push_outputs = ctx.outgoing_push();
        let pull_outputs = ctx.outgoing_pull();
        self.output = match (push_outputs.as_slice(), pull_outputs.as_slice()) {
            ([output], []) => Output::Push(*output),
            ([], [output]) => Output::Pull(*output),
            _ => panic!(
                "queue '{}' requires exactly one output channel, found {}",
                self.label,
                push_outputs.len() + pull_outputs.len()
            ),
        };
        self.update_gauge();
        self.update_inputs(ctx);

        // Initial stock is offered once all nodes have started.
        if self.policy.occupancy() > 0 {
            ctx.schedule_self_in(std::time::Duration::ZERO, |node: &mut Self, ctx| {
                node.offer(ctx);
            });
        }
    }

    fn on_arrive(&mut self, _channel: PushChannelId, item: T, ctx: &mut SimContext<T>) {
        self.policy.enqueue(item);
        self.update_gauge();
        self.offer(ctx);
        self.update_inputs(ctx);
    }

    fn supply(&mut self, channel: PullChannelId, ctx: &mut SimContext<T>) -> T {
        let item = self.policy.dequeue();
        self.update_gauge();
        if self.policy.occupancy() == 0 {
            ctx.mark_not_ready(channel);
        }
        self.update_inputs(ctx);

        item
    }

    fn on_signal(&mut self, signal: ChannelSignal, ctx: &mut SimContext<T>) {
        if let ChannelSignal::Opened(channel) = signal {
            if matches!(self.output, Output::Push(output) if output == channel) {
                self.drain(channel, ctx);
                self.update_inputs(ctx);
            }
        }
    }

    fn occupancy(&self) -> usize {
        self.policy.occupancy()
    }

    fn gauge(&self) -> Option<Gauge> {
        Some(self.gauge.clone())
    }

    fn report(&self) -> Vec<(String, f64)> {
        vec![("occupancy".into(), self.policy.occupancy() as f64)]
    }
}
