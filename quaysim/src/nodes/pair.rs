//! Pairing items up and taking them apart.

use std::collections::VecDeque;

use crate::channel::{ChannelSignal, PullChannelId, PushChannelId};
use crate::node::Node;
use crate::simulation::SimContext;

/// Combines one item from each of two pull inputs into a single item.
///
/// The match fires only when both inputs are ready and the output is open,
/// so neither side is ever drawn without its counterpart. The classic use is
/// marrying a job to a resource: a container to the truck that will carry
/// it, a vessel to a tug.
pub struct MatchNode<T> {
    label: String,
    combine: Box<dyn FnMut(T, T) -> T>,
    first: Option<PullChannelId>,
    second: Option<PullChannelId>,
    output: Option<PushChannelId>,
}

impl<T: 'static> MatchNode<T> {
    /// Creates a match node; the closure receives one item from each input,
    /// in wiring order.
    pub fn new(label: impl Into<String>, combine: impl FnMut(T, T) -> T + 'static) -> Self {
        Self {
            label: label.into(),
            combine: Box::new(combine),
            first: None,
            second: None,
            output: None,
        }
    }

    fn pump(&mut self, ctx: &mut SimContext<T>) {
        let (Some(first), Some(second), Some(output)) = (self.first, self.second, self.output)
        else {
            return;
        };
        while ctx.is_open(output) && ctx.is_ready(first) && ctx.is_ready(second) {
            let a = ctx.receive(first);
            let b = ctx.receive(second);
            let combined = (self.combine)(a, b);
            ctx.send(output, combined);
        }
    }
}

impl<T: 'static> Node<T> for MatchNode<T> {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_start(&mut self, ctx: &mut SimContext<T>) {
        let inputs = ctx.incoming_pull();
        let outputs = ctx.outgoing_push();
        if inputs.len() != 2 || outputs.len() != 1 {
            panic!(
                "match '{}' requires exactly two input and one output channels",
                self.label
            );
        }
        self.first = Some(inputs[0]);
        self.second = Some(inputs[1]);
        self.output = Some(outputs[0]);
    }

    fn on_signal(&mut self, signal: ChannelSignal, ctx: &mut SimContext<T>) {
        match signal {
            ChannelSignal::Ready(_) => self.pump(ctx),
            ChannelSignal::Opened(channel) if Some(channel) == self.output => self.pump(ctx),
            _ => {}
        }
    }
}

/// Decomposes each incoming item into two items, one per push output.
///
/// The inverse of [`MatchNode`]: a split accepts an item only while both
/// outputs are open, since both halves must leave together. Items arriving
/// while a half is blocked are held in arrival order.
pub struct SplitNode<T> {
    label: String,
    split: Box<dyn FnMut(T) -> (T, T)>,
    inputs: Vec<PushChannelId>,
    first: Option<PushChannelId>,
    second: Option<PushChannelId>,
    backlog: VecDeque<T>,
}

impl<T: 'static> SplitNode<T> {
    /// Creates a split node; the closure's results go to the outputs in
    /// wiring order.
    pub fn new(label: impl Into<String>, split: impl FnMut(T) -> (T, T) + 'static) -> Self {
        Self {
            label: label.into(),
            split: Box::new(split),
            inputs: Vec::new(),
            first: None,
            second: None,
            backlog: VecDeque::new(),
        }
    }

    fn pump(&mut self, ctx: &mut SimContext<T>) {
        let (Some(first), Some(second)) = (self.first, self.second) else {
            return;
        };
        while ctx.is_open(first) && ctx.is_open(second) {
            let Some(item) = self.backlog.pop_front() else {
                break;
            };
            let (a, b) = (self.split)(item);
            ctx.send(first, a);
            ctx.send(second, b);
        }
        self.update_inputs(ctx);
    }

    fn update_inputs(&mut self, ctx: &mut SimContext<T>) {
        let (Some(first), Some(second)) = (self.first, self.second) else {
            return;
        };
        let blocked = !(ctx.is_open(first) && ctx.is_open(second));
        for &input in &self.inputs {
            if blocked {
                ctx.close(input);
            } else {
                ctx.open(input);
            }
        }
    }
}

impl<T: 'static> Node<T> for SplitNode<T> {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_start(&mut self, ctx: &mut SimContext<T>) {
        self.inputs = ctx.incoming_push();
        let outputs = ctx.outgoing_push();
        if outputs.len() != 2 {
            panic!(
                "split '{}' requires exactly two output channels, found {}",
                self.label,
                outputs.len()
            );
        }
        self.first = Some(outputs[0]);
        self.second = Some(outputs[1]);
        self.update_inputs(ctx);
    }

    fn on_arrive(&mut self, _channel: PushChannelId, item: T, ctx: &mut SimContext<T>) {
        self.backlog.push_back(item);
        self.pump(ctx);
    }

    fn on_signal(&mut self, signal: ChannelSignal, ctx: &mut SimContext<T>) {
        match signal {
            ChannelSignal::Opened(_) => self.pump(ctx),
            ChannelSignal::Closed(channel)
                if Some(channel) == self.first || Some(channel) == self.second =>
            {
                self.update_inputs(ctx);
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

    use crate::nodes::queue::QueueNode;
    use crate::nodes::sink::SinkNode;
    use crate::nodes::source::SourceNode;
    use crate::simulation::scenario::ScenarioBuilder;
    use crate::time::MonotonicTime;

    use super::*;

    #[test]
    fn match_waits_for_both_sides() {
        let mut builder = ScenarioBuilder::new();
        let sink = SinkNode::new("sink");
        let counter = sink.counter();
        // Four jobs against two resources: only two pairs can form.
        let jobs = builder.add_source(
            SourceNode::every("jobs", Duration::from_secs(1), |_, n| n).with_limit(4),
        );
        let resources = builder.add_source(
            SourceNode::every("resources", Duration::from_secs(10), |_, n| 100 + n).with_limit(2),
        );
        let job_buf = builder.add_node(QueueNode::fifo("job buffer"));
        let resource_buf = builder.add_node(QueueNode::fifo("resource buffer"));
        let pair = builder.add_node(MatchNode::new("pair", |job, resource| job + resource));
        let sink = builder.add_node(sink);
        builder.connect_push(jobs, job_buf, "jobs in");
        builder.connect_push(resources, resource_buf, "resources in");
        builder.connect_pull(job_buf, pair, "jobs out");
        builder.connect_pull(resource_buf, pair, "resources out");
        builder.connect_push(pair, sink, "paired");

        let mut sim = builder.build(MonotonicTime::EPOCH);
        sim.run();

        assert_eq!(counter.get(), 2);
        // Two jobs remain unmatched in the buffer.
        assert_eq!(sim.node_report(job_buf)[0].1, 2.0);
    }

    #[test]
    fn split_emits_both_halves() {
        let mut builder = ScenarioBuilder::new();
        let left = SinkNode::new("left");
        let right = SinkNode::new("right");
        let (left_count, right_count) = (left.counter(), right.counter());
        let source = builder.add_source(
            SourceNode::every("ticker", Duration::from_secs(1), |_, n| n).with_limit(3),
        );
        let split = builder.add_node(SplitNode::new("unpack", |n| (n, n + 1000)));
        let left = builder.add_node(left);
        let right = builder.add_node(right);
        builder.connect_push(source, split, "in");
        builder.connect_push(split, left, "first half");
        builder.connect_push(split, right, "second half");

        let mut sim = builder.build(MonotonicTime::EPOCH);
        sim.run();

        assert_eq!(left_count.get(), 3);
        assert_eq!(right_count.get(), 3);
    }
}
