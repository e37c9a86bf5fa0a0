//! Merging parallel pull inputs.

use crate::channel::{ChannelSignal, PullChannelId, PushChannelId};
use crate::node::Node;
use crate::policy::JoinPolicy;
use crate::simulation::SimContext;

/// Draws items from several pull inputs, chosen by a [`JoinPolicy`], and
/// forwards them on a single push output.
///
/// The join is the demand-driven counterpart of
/// [`ForkNode`](crate::nodes::ForkNode): it transfers whenever its output is
/// open and at least one input is ready, so its throughput is set by
/// whichever side is the bottleneck. Like the fork, it re-checks the
/// selected channel against the live readiness flag and corrects the
/// policy's lagging view on the spot.
pub struct JoinNode<T, P: JoinPolicy> {
    label: String,
    policy: P,
    inputs: Vec<PullChannelId>,
    output: Option<PushChannelId>,
    _item: std::marker::PhantomData<fn() -> T>,
}

impl<T: 'static, P: JoinPolicy + 'static> JoinNode<T, P> {
    pub fn new(label: impl Into<String>, policy: P) -> Self {
        Self {
            label: label.into(),
            policy,
            inputs: Vec::new(),
            output: None,
            _item: std::marker::PhantomData,
        }
    }

    fn pump(&mut self, ctx: &mut SimContext<T>) {
        let Some(output) = self.output else {
            return;
        };
        while ctx.is_open(output) && !self.policy.none_ready() {
            let index = self.policy.select();
            let channel = self.inputs[index];
            if !ctx.is_ready(channel) {
                // Stale flag: the channel went not-ready before its signal
                // was delivered.
                self.policy.on_channel_not_ready(index);
                continue;
            }
            let item = ctx.receive(channel);
            ctx.send(output, item);
        }
    }

    fn input_index(&self, channel: PullChannelId) -> Option<usize> {
        self.inputs.iter().position(|&c| c == channel)
    }
}

impl<T: 'static, P: JoinPolicy + 'static> Node<T> for JoinNode<T, P> {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_start(&mut self, ctx: &mut SimContext<T>) {
        self.inputs = ctx.incoming_pull();
        if self.inputs.is_empty() {
            panic!("join '{}' requires at least one input channel", self.label);
        }
        let outputs = ctx.outgoing_push();
        if outputs.len() != 1 {
            panic!(
                "join '{}' requires exactly one output channel, found {}",
                self.label,
                outputs.len()
            );
        }
        self.output = Some(outputs[0]);

        let ready: Vec<bool> = self.inputs.iter().map(|&c| ctx.is_ready(c)).collect();
        let gauges: Vec<_> = self
            .inputs
            .iter()
            .map(|&c| ctx.upstream_container(c))
            .collect();
        self.policy.init(&ready, &gauges);
    }

    fn on_signal(&mut self, signal: ChannelSignal, ctx: &mut SimContext<T>) {
        match signal {
            ChannelSignal::Ready(channel) => {
                if let Some(index) = self.input_index(channel) {
                    self.policy.on_channel_ready(index);
                    self.pump(ctx);
                }
            }
            ChannelSignal::NotReady(channel) => {
                if let Some(index) = self.input_index(channel) {
                    self.policy.on_channel_not_ready(index);
                }
            }
            ChannelSignal::Opened(channel) => {
                if Some(channel) == self.output {
                    self.pump(ctx);
                }
            }
            ChannelSignal::Closed(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::nodes::queue::QueueNode;
    use crate::nodes::sink::SinkNode;
    use crate::nodes::source::SourceNode;
    use crate::policy::{FirstReadyJoin, MostFullJoin};
    use crate::simulation::scenario::ScenarioBuilder;
    use crate::time::MonotonicTime;

    use super::*;

    #[test]
    fn join_merges_two_buffered_lanes() {
        let mut builder = ScenarioBuilder::new();
        let sink = SinkNode::new("sink");
        let counter = sink.counter();
        let north = builder.add_source(
            SourceNode::every("north", Duration::from_secs(2), |_, n| n).with_limit(4),
        );
        let south = builder.add_source(
            SourceNode::every("south", Duration::from_secs(3), |_, n| 100 + n).with_limit(4),
        );
        let north_buf = builder.add_node(QueueNode::fifo("north buffer"));
        let south_buf = builder.add_node(QueueNode::fifo("south buffer"));
        let merge = builder.add_node(JoinNode::new("merge", FirstReadyJoin::new()));
        let sink = builder.add_node(sink);
        builder.connect_push(north, north_buf, "north in");
        builder.connect_push(south, south_buf, "south in");
        builder.connect_pull(north_buf, merge, "north out");
        builder.connect_pull(south_buf, merge, "south out");
        builder.connect_push(merge, sink, "merged");

        let mut sim = builder.build(MonotonicTime::EPOCH);
        sim.run();

        assert_eq!(counter.get(), 8);
    }

    #[test]
    fn most_full_join_drains_the_longer_queue_first() {
        let mut builder = ScenarioBuilder::new();
        let sink = SinkNode::new("sink");
        let counter = sink.counter();
        // Both lanes fill while the merge's output is effectively unbounded,
        // so pre-seed the imbalance through different arrival rates.
        let fast = builder.add_source(
            SourceNode::every("fast", Duration::from_secs(1), |_, n| n).with_limit(6),
        );
        let slow = builder.add_source(
            SourceNode::every("slow", Duration::from_secs(5), |_, n| 100 + n).with_limit(2),
        );
        let fast_buf = builder.add_node(QueueNode::fifo("fast buffer"));
        let slow_buf = builder.add_node(QueueNode::fifo("slow buffer"));
        let merge = builder.add_node(JoinNode::new("merge", MostFullJoin::new()));
        let sink = builder.add_node(sink);
        builder.connect_push(fast, fast_buf, "fast in");
        builder.connect_push(slow, slow_buf, "slow in");
        builder.connect_pull(fast_buf, merge, "fast out");
        builder.connect_pull(slow_buf, merge, "slow out");
        builder.connect_push(merge, sink, "merged");

        let mut sim = builder.build(MonotonicTime::EPOCH);
        sim.run();

        assert_eq!(counter.get(), 8);
    }
}
