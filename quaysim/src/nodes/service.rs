//! Capacity-limited service.

use std::collections::VecDeque;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::channel::{ChannelSignal, PushChannelId};
use crate::metrics::Gauge;
use crate::node::Node;
use crate::simulation::SimContext;

/// Holds each item for a service time, up to a fixed number of items at
/// once.
///
/// This is the shape of a road segment, lock chamber or crane pool: items
/// occupy a slot for the duration of their service and then leave through
/// the single push output. An item whose service is complete but whose
/// output is closed keeps its slot, so downstream congestion propagates
/// upstream: the inputs close exactly when every slot is taken and reopen on
/// the first departure.
pub struct ServiceNode<T> {
    label: String,
    capacity: usize,
    service_time: Box<dyn FnMut(&T, &mut ChaCha8Rng) -> Duration>,
    rng: ChaCha8Rng,
    in_service: usize,
    done: VecDeque<T>,
    gauge: Gauge,
    inputs: Vec<PushChannelId>,
    output: Option<PushChannelId>,
}

impl<T: 'static> ServiceNode<T> {
    /// Creates a service with an item-dependent, possibly stochastic service
    /// time.
    pub fn new(
        label: impl Into<String>,
        capacity: usize,
        seed: u64,
        service_time: impl FnMut(&T, &mut ChaCha8Rng) -> Duration + 'static,
    ) -> Self {
        assert!(capacity > 0, "service capacity must be positive");
        Self {
            label: label.into(),
            capacity,
            service_time: Box::new(service_time),
            rng: ChaCha8Rng::seed_from_u64(seed),
            in_service: 0,
            done: VecDeque::new(),
            gauge: Gauge::new(),
            inputs: Vec::new(),
            output: None,
        }
    }

    /// Creates a service with a fixed service time, e.g. a road segment with
    /// a constant transit time.
    pub fn fixed(label: impl Into<String>, capacity: usize, service_time: Duration) -> Self {
        Self::new(label, capacity, 0, move |_, _| service_time)
    }

    fn content(&self) -> usize {
        self.in_service + self.done.len()
    }

    fn complete(&mut self, item: T, ctx: &mut SimContext<T>) {
        self.in_service -= 1;
        self.done.push_back(item);
        self.flush(ctx);
    }

    /// Sends out completed items while the output is open, then reconciles
    /// the input state with the remaining content.
    fn flush(&mut self, ctx: &mut SimContext<T>) {
        if let Some(output) = self.output {
            while ctx.is_open(output) {
                let Some(item) = self.done.pop_front() else {
                    break;
                };
                self.gauge.set(self.content() as f64);
                ctx.send(output, item);
            }
        }
        self.update_inputs(ctx);
    }

    fn update_inputs(&mut self, ctx: &mut SimContext<T>) {
        let full = self.content() >= self.capacity;
        for &input in &self.inputs {
            if full {
                ctx.close(input);
            } else {
                ctx.open(input);
            }
        }
    }
}

impl<T: 'static> Node<T> for ServiceNode<T> {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_start(&mut self, ctx: &mut SimContext<T>) {
        self.inputs = ctx.incoming_push();
        let outputs = ctx.outgoing_push();
        if outputs.len() != 1 {
            panic!(
                "service '{}' requires exactly one output channel, found {}",
                self.label,
                outputs.len()
            );
        }
        self.output = Some(outputs[0]);
    }

    fn on_arrive(&mut self, _channel: PushChannelId, item: T, ctx: &mut SimContext<T>) {
        self.in_service += 1;
        self.gauge.set(self.content() as f64);
        if self.content() >= self.capacity {
            // The slot just taken was the last one.
            for &input in &self.inputs {
                ctx.close(input);
            }
        }
        let delay = (self.service_time)(&item, &mut self.rng);
        ctx.schedule_self_in(delay, move |node: &mut Self, ctx| node.complete(item, ctx));
    }

    fn on_signal(&mut self, signal: ChannelSignal, ctx: &mut SimContext<T>) {
        if let ChannelSignal::Opened(channel) = signal {
            if Some(channel) == self.output {
                self.flush(ctx);
            }
        }
    }

    fn occupancy(&self) -> usize {
        self.content()
    }

    fn gauge(&self) -> Option<Gauge> {
        Some(self.gauge.clone())
    }

    fn report(&self) -> Vec<(String, f64)> {
        vec![
            ("in service".into(), self.in_service as f64),
            ("awaiting departure".into(), self.done.len() as f64),
        ]
    }
}

#[cfg(test)]
mod tests {
    use crate::nodes::sink::SinkNode;
    use crate::nodes::source::SourceNode;
    use crate::simulation::scenario::ScenarioBuilder;
    use crate::time::MonotonicTime;

    use super::*;

    #[test]
    fn items_leave_after_their_service_time() {
        let mut builder = ScenarioBuilder::new();
        let sink = SinkNode::new("sink");
        let counter = sink.counter();
        let source = builder.add_source(
            SourceNode::every("gate", Duration::from_secs(10), |_, n| n).with_limit(3),
        );
        let road = builder.add_node(ServiceNode::fixed("road", 5, Duration::from_secs(4)));
        let sink = builder.add_node(sink);
        builder.connect_push(source, road, "entry");
        builder.connect_push(road, sink, "exit");

        let mut sim = builder.build(MonotonicTime::EPOCH);
        sim.run_until(Duration::from_secs(15)).unwrap();
        assert_eq!(counter.get(), 1);
        sim.run();
        assert_eq!(counter.get(), 3);
        // Last arrival at t = 30 leaves at t = 34.
        assert_eq!(sim.time(), MonotonicTime::EPOCH + Duration::from_secs(34));
    }

    #[test]
    fn saturation_closes_the_inputs_until_a_departure() {
        let mut builder = ScenarioBuilder::new();
        let sink = SinkNode::new("sink");
        let counter = sink.counter();
        // Arrivals every second against a single 5 s slot: the source must
        // hold arrivals while the slot is taken.
        let source = builder.add_source(
            SourceNode::every("gate", Duration::from_secs(1), |_, n| n).with_limit(3),
        );
        let lock = builder.add_node(ServiceNode::fixed("lock", 1, Duration::from_secs(5)));
        let sink = builder.add_node(sink);
        builder.connect_push(source, lock, "entry");
        builder.connect_push(lock, sink, "exit");
        builder.watch_node(lock);

        let mut sim = builder.build(MonotonicTime::EPOCH);
        sim.run();

        assert_eq!(counter.get(), 3);
        // Departures at t = 6, 11 and 16, one service at a time.
        assert_eq!(sim.time(), MonotonicTime::EPOCH + Duration::from_secs(16));
    }
}
