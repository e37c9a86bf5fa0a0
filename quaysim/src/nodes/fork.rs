//! Routing across parallel outputs.

use std::collections::VecDeque;

use crate::channel::{ChannelSignal, PushChannelId};
use crate::node::Node;
use crate::policy::ForkPolicy;
use crate::simulation::SimContext;

/// Routes each incoming item to one of several push outputs, chosen by a
/// [`ForkPolicy`].
///
/// The fork binds its policy in `on_start`, resolving the nearest tagged
/// container behind each output for occupancy-driven disciplines. Its inputs
/// mirror the outputs: they close when every output is closed and reopen
/// with the first output.
///
/// The policy's availability view is refreshed from deferred channel
/// signals, so it can briefly lag the live flags; the fork re-checks the
/// selected channel before sending and corrects the policy on the spot when
/// it finds the flag stale. An item that cannot be routed at all is held in
/// arrival order until an output reopens.
pub struct ForkNode<T, P: ForkPolicy> {
    label: String,
    policy: P,
    inputs: Vec<PushChannelId>,
    outputs: Vec<PushChannelId>,
    backlog: VecDeque<T>,
}

impl<T: 'static, P: ForkPolicy + 'static> ForkNode<T, P> {
    pub fn new(label: impl Into<String>, policy: P) -> Self {
        Self {
            label: label.into(),
            policy,
            inputs: Vec::new(),
            outputs: Vec::new(),
            backlog: VecDeque::new(),
        }
    }

    /// Picks an open output, repairing the policy's view where it has not
    /// yet caught up with a close transition.
    fn pick(&mut self, ctx: &mut SimContext<T>) -> Option<usize> {
        loop {
            if self.policy.all_closed() {
                return None;
            }
            let index = self.policy.select();
            if ctx.is_open(self.outputs[index]) {
                return Some(index);
            }
            self.policy.on_channel_close(index);
        }
    }

    fn pump(&mut self, ctx: &mut SimContext<T>) {
        while let Some(item) = self.backlog.pop_front() {
            match self.pick(ctx) {
                Some(index) => ctx.send(self.outputs[index], item),
                None => {
                    self.backlog.push_front(item);
                    break;
                }
            }
        }
        self.update_inputs(ctx);
    }

    fn update_inputs(&mut self, ctx: &mut SimContext<T>) {
        let blocked = self.policy.all_closed();
        for &input in &self.inputs {
            if blocked {
                ctx.close(input);
            } else {
                ctx.open(input);
            }
        }
    }

    fn output_index(&self, channel: PushChannelId) -> Option<usize> {
        self.outputs.iter().position(|&c| c == channel)
    }
}

impl<T: 'static, P: ForkPolicy + 'static> Node<T> for ForkNode<T, P> {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_start(&mut self, ctx: &mut SimContext<T>) {
        self.inputs = ctx.incoming_push();
        self.outputs = ctx.outgoing_push();
        if self.outputs.is_empty() {
            panic!("fork '{}' requires at least one output channel", self.label);
        }
        let open: Vec<bool> = self.outputs.iter().map(|&c| ctx.is_open(c)).collect();
        let gauges: Vec<_> = self
            .outputs
            .iter()
            .map(|&c| ctx.downstream_container(c))
            .collect();
        self.policy.init(&open, &gauges);
        self.update_inputs(ctx);
    }

    fn on_arrive(&mut self, _channel: PushChannelId, item: T, ctx: &mut SimContext<T>) {
        self.backlog.push_back(item);
        self.pump(ctx);
    }

    fn on_signal(&mut self, signal: ChannelSignal, ctx: &mut SimContext<T>) {
        match signal {
            ChannelSignal::Opened(channel) => {
                if let Some(index) = self.output_index(channel) {
                    self.policy.on_channel_open(index);
                    self.pump(ctx);
                }
            }
            ChannelSignal::Closed(channel) => {
                if let Some(index) = self.output_index(channel) {
                    self.policy.on_channel_close(index);
                    self.update_inputs(ctx);
                }
            }
            _ => {}
        }
    }

    fn report(&self) -> Vec<(String, f64)> {
        vec![("held".into(), self.backlog.len() as f64)]
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::nodes::service::ServiceNode;
    use crate::nodes::sink::SinkNode;
    use crate::nodes::source::SourceNode;
    use crate::policy::{FirstAvailableFork, RoundRobinFork};
    use crate::simulation::scenario::ScenarioBuilder;
    use crate::time::MonotonicTime;

    use super::*;

    #[test]
    fn round_robin_alternates_between_sinks() {
        let mut builder = ScenarioBuilder::new();
        let left = SinkNode::new("left");
        let right = SinkNode::new("right");
        let (left_count, right_count) = (left.counter(), right.counter());
        let source = builder.add_source(
            SourceNode::every("ticker", Duration::from_secs(1), |_, n| n).with_limit(6),
        );
        let fork = builder.add_node(ForkNode::new("split", RoundRobinFork::new()));
        let left = builder.add_node(left);
        let right = builder.add_node(right);
        builder.connect_push(source, fork, "in");
        builder.connect_push(fork, left, "to left");
        builder.connect_push(fork, right, "to right");

        let mut sim = builder.build(MonotonicTime::EPOCH);
        sim.run();

        assert_eq!(left_count.get(), 3);
        assert_eq!(right_count.get(), 3);
    }

    #[test]
    fn first_available_overflows_when_the_preferred_branch_saturates() {
        let mut builder = ScenarioBuilder::new();
        let preferred = SinkNode::new("preferred");
        let overflow = SinkNode::new("overflow");
        let (preferred_count, overflow_count) = (preferred.counter(), overflow.counter());
        let source = builder.add_source(
            SourceNode::every("ticker", Duration::from_secs(1), |_, n| n).with_limit(4),
        );
        let fork = builder.add_node(ForkNode::new("split", FirstAvailableFork::new()));
        // A single slot with a long service time saturates immediately.
        let berth = builder.add_node(ServiceNode::fixed("berth", 1, Duration::from_secs(60)));
        let preferred = builder.add_node(preferred);
        let overflow = builder.add_node(overflow);
        builder.connect_push(source, fork, "in");
        builder.connect_push(fork, berth, "to berth");
        builder.connect_push(fork, overflow, "to overflow");
        builder.connect_push(berth, preferred, "berth exit");

        let mut sim = builder.build(MonotonicTime::EPOCH);
        sim.run_until(Duration::from_secs(10)).unwrap();

        // The first item takes the berth, the rest overflow while it is
        // occupied.
        assert_eq!(preferred_count.get(), 0);
        assert_eq!(overflow_count.get(), 3);
    }
}
