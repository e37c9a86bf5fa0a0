//! Item generation.

use std::collections::VecDeque;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Exp;

use crate::channel::{ChannelSignal, PushChannelId};
use crate::node::Node;
use crate::simulation::SimContext;
use crate::time::MonotonicTime;

/// Generates items on an arrival process and pushes them downstream.
///
/// The interarrival closure draws the delay to the next arrival from the
/// source's private random stream, so two sources with the same seed produce
/// identical arrival sequences regardless of the rest of the scenario. The
/// factory closure receives the arrival time and a zero-based sequence
/// number.
///
/// A source never discards items: arrivals generated while the output is
/// closed are held in a backlog and flushed, oldest first, when the channel
/// reopens.
pub struct SourceNode<T> {
    label: String,
    rng: ChaCha8Rng,
    interarrival: Box<dyn FnMut(&mut ChaCha8Rng) -> Duration>,
    factory: Box<dyn FnMut(MonotonicTime, u64) -> T>,
    limit: Option<u64>,
    produced: u64,
    output: Option<PushChannelId>,
    backlog: VecDeque<T>,
}

impl<T: 'static> SourceNode<T> {
    /// Creates a source with an arbitrary arrival process.
    pub fn new(
        label: impl Into<String>,
        seed: u64,
        interarrival: impl FnMut(&mut ChaCha8Rng) -> Duration + 'static,
        factory: impl FnMut(MonotonicTime, u64) -> T + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            interarrival: Box::new(interarrival),
            factory: Box::new(factory),
            limit: None,
            produced: 0,
            output: None,
            backlog: VecDeque::new(),
        }
    }

    /// Creates a Poisson source with the given mean interarrival time.
    pub fn poisson(
        label: impl Into<String>,
        seed: u64,
        mean_interarrival: Duration,
        factory: impl FnMut(MonotonicTime, u64) -> T + 'static,
    ) -> Self {
        let dist = Exp::new(1.0 / mean_interarrival.as_secs_f64())
            .expect("mean interarrival time must be positive");

        Self::new(
            label,
            seed,
            move |rng| Duration::from_secs_f64(rng.sample(dist)),
            factory,
        )
    }

    /// Creates a deterministic source with a fixed interarrival period.
    pub fn every(
        label: impl Into<String>,
        period: Duration,
        factory: impl FnMut(MonotonicTime, u64) -> T + 'static,
    ) -> Self {
        Self::new(label, 0, move |_| period, factory)
    }

    /// Caps the total number of generated items.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn emit(&mut self, ctx: &mut SimContext<T>) {
        let Some(output) = self.output else {
            return;
        };
        let item = (self.factory)(ctx.time(), self.produced);
        self.produced += 1;

        if self.backlog.is_empty() && ctx.is_open(output) {
            ctx.send(output, item);
        } else {
            self.backlog.push_back(item);
            let label = self.label.clone();
            let held = self.backlog.len();
            ctx.log(move || format!("{label}: output closed, holding {held} arrivals"));
        }

        if self.limit.map_or(true, |limit| self.produced < limit) {
            let delay = (self.interarrival)(&mut self.rng);
            ctx.schedule_self_in(delay, Self::emit);
        }
    }

    fn flush(&mut self, ctx: &mut SimContext<T>) {
        let Some(output) = self.output else {
            return;
        };
        while ctx.is_open(output) {
            let Some(item) = self.backlog.pop_front() else {
                break;
            };
            ctx.send(output, item);
        }
    }
}

impl<T: 'static> Node<T> for SourceNode<T> {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_start(&mut self, ctx: &mut SimContext<T>) {
        let outputs = ctx.outgoing_push();
        if outputs.len() != 1 {
            panic!(
                "source '{}' requires exactly one output channel, found {}",
                self.label,
                outputs.len()
            );
        }
        self.output = Some(outputs[0]);

        let delay = (self.interarrival)(&mut self.rng);
        ctx.schedule_self_in(delay, Self::emit);
    }

    fn on_signal(&mut self, signal: ChannelSignal, ctx: &mut SimContext<T>) {
        if let ChannelSignal::Opened(channel) = signal {
            if Some(channel) == self.output {
                self.flush(ctx);
            }
        }
    }

    fn report(&self) -> Vec<(String, f64)> {
        vec![
            ("produced".into(), self.produced as f64),
            ("backlog".into(), self.backlog.len() as f64),
        ]
    }
}

#[cfg(test)]
mod tests {
    use crate::nodes::sink::SinkNode;
    use crate::simulation::scenario::ScenarioBuilder;

    use super::*;

    #[test]
    fn fixed_period_source_honors_its_limit() {
        let mut builder = ScenarioBuilder::new();
        let sink = SinkNode::new("sink");
        let counter = sink.counter();
        let source =
            builder.add_source(SourceNode::every("ticker", Duration::from_secs(2), |_, n| n).with_limit(5));
        let sink = builder.add_node(sink);
        builder.connect_push(source, sink, "feed");

        let mut sim = builder.build(MonotonicTime::EPOCH);
        sim.run();

        assert_eq!(counter.get(), 5);
        // Arrivals at t = 2, 4, 6, 8, 10.
        assert_eq!(sim.time(), MonotonicTime::EPOCH + Duration::from_secs(10));
    }

    #[test]
    fn poisson_sources_are_reproducible() {
        let arrivals = |seed| {
            let mut source: SourceNode<u64> =
                SourceNode::poisson("ship", seed, Duration::from_secs(60), |_, n| n);
            (0..32)
                .map(|_| (source.interarrival)(&mut source.rng))
                .collect::<Vec<_>>()
        };

        assert_eq!(arrivals(11), arrivals(11));
        assert_ne!(arrivals(11), arrivals(12));
    }

    #[test]
    fn factory_sees_time_and_sequence_number() {
        let mut builder = ScenarioBuilder::new();
        let sink = SinkNode::new("sink");
        let source = builder.add_source(SourceNode::every(
            "ticker",
            Duration::from_secs(3),
            |time, n| (time, n),
        ));
        let sink_id = builder.add_node(sink);
        builder.connect_push(source, sink_id, "feed");

        let mut sim = builder.build(MonotonicTime::EPOCH);
        sim.run_until(Duration::from_secs(7)).unwrap();
        assert_eq!(sim.node_report(source)[0].1, 2.0);
    }
}
