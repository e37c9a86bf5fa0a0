//! End-to-end scenario tests: item conservation, reproducibility and the
//! statistics engine on a congested chain.

use std::time::Duration;

use quaysim::metrics::{InstantaneousMetric, StatsConfig};
use quaysim::nodes::{QueueNode, ServiceNode, SinkNode, SourceNode};
use quaysim::simulation::event_log::MemoryEventLog;
use quaysim::simulation::scenario::ScenarioBuilder;
use quaysim::simulation::Simulation;
use quaysim::time::MonotonicTime;

/// Poisson arrivals into a bounded holding area feeding a two-slot service.
///
/// The chain is congested on purpose: the holding area regularly fills and
/// pushes backpressure all the way into the source.
fn congested_chain(seed: u64, arrivals: u64) -> (Simulation<MonotonicTime>, quaysim::nodes::Counter) {
    let mut builder = ScenarioBuilder::new();
    let sink = SinkNode::new("handled");
    let counter = sink.counter();

    let source = builder.add_source(
        SourceNode::poisson("vessels", seed, Duration::from_secs(50), |time, _| time)
            .with_limit(arrivals),
    );
    let anchorage = builder.add_node(QueueNode::fifo("anchorage").with_capacity(5));
    let berths = builder.add_node(ServiceNode::fixed("berths", 2, Duration::from_secs(80)));
    let sink = builder.add_node(sink);
    builder.connect_push(source, anchorage, "approach");
    builder.connect_push(anchorage, berths, "berthing");
    builder.connect_push(berths, sink, "departure");
    builder.watch_node(anchorage);

    (builder.build(MonotonicTime::EPOCH), counter)
}

#[test]
fn every_arrival_is_eventually_handled() {
    let (mut sim, counter) = congested_chain(7, 200);
    sim.run();

    // Nothing is dropped anywhere in the chain, including items held back
    // by the bounded holding area.
    assert_eq!(counter.get(), 200);
    assert!(sim.is_finished());
}

#[test]
fn a_capacity_bounded_road_conserves_flow() {
    let mut builder = ScenarioBuilder::new();
    let sink = SinkNode::new("arrived");
    let counter = sink.counter();

    // Arrivals outpace the road, so the entry closes at five occupants and
    // reopens on each departure while the source holds the excess back.
    let source = builder.add_source(
        SourceNode::poisson("gate", 11, Duration::from_secs(1), |time, _| time).with_limit(100),
    );
    let road = builder.add_node(ServiceNode::fixed("road", 5, Duration::from_secs(5)));
    let sink = builder.add_node(sink);
    builder.connect_push(source, road, "entry");
    builder.connect_push(road, sink, "exit");

    let mut sim = builder.build(MonotonicTime::EPOCH);
    sim.run();

    assert_eq!(counter.get(), 100);
    assert!(sim.is_finished());
}

#[test]
fn a_saturated_road_closes_and_reopens_at_exact_instants() {
    let log = MemoryEventLog::new();
    let lines = log.handle();

    let mut builder = ScenarioBuilder::new();
    builder.set_event_log(log);
    let source = builder.add_source(
        SourceNode::every("gate", Duration::from_secs(1), |time, _| time).with_limit(7),
    );
    let road = builder.add_node(ServiceNode::fixed("road", 5, Duration::from_secs(5)));
    let sink = builder.add_node(SinkNode::new("arrived"));
    builder.connect_push(source, road, "entry");
    builder.connect_push(road, sink, "exit");

    let mut sim = builder.build(MonotonicTime::EPOCH);
    sim.run();

    // The fifth arrival takes the last slot at t = 5; each departure
    // reopens the entry, and the next arrival refills it one second later
    // until the arrivals run out.
    let transitions: Vec<(u64, String)> = lines
        .borrow()
        .iter()
        .filter(|(_, line)| line.starts_with("channel 'entry' "))
        .map(|(time, line)| {
            (
                time.duration_since(MonotonicTime::EPOCH).as_secs(),
                line.clone(),
            )
        })
        .collect();
    let expected = [
        (5, "channel 'entry' closed"),
        (6, "channel 'entry' opened"),
        (6, "channel 'entry' closed"),
        (7, "channel 'entry' opened"),
        (7, "channel 'entry' closed"),
        (8, "channel 'entry' opened"),
    ];
    assert_eq!(transitions.len(), expected.len());
    for ((time, line), (secs, text)) in transitions.iter().zip(expected) {
        assert_eq!((*time, line.as_str()), (secs, text));
    }
}

#[test]
fn identical_seeds_give_identical_runs() {
    let (mut a, count_a) = congested_chain(99, 150);
    let (mut b, count_b) = congested_chain(99, 150);
    a.run();
    b.run();

    assert_eq!(count_a.get(), count_b.get());
    assert_eq!(a.time(), b.time());
    let mean_a = a.metric("anchorage").unwrap().mean();
    let mean_b = b.metric("anchorage").unwrap().mean();
    assert_eq!(mean_a.to_bits(), mean_b.to_bits());
}

#[test]
fn different_seeds_diverge() {
    let (mut a, _) = congested_chain(1, 150);
    let (mut b, _) = congested_chain(2, 150);
    a.run();
    b.run();

    assert_ne!(a.time(), b.time());
}

#[test]
fn occupancy_reaches_a_steady_state_with_a_confidence_interval() {
    let mut builder = ScenarioBuilder::new();
    builder.set_stats_config(StatsConfig {
        batch_seconds: 120.0,
        ..Default::default()
    });
    let sink = SinkNode::new("handled");

    // Utilization of 0.6, stable but busy enough for a fluctuating queue.
    let source = builder.add_source(SourceNode::poisson(
        "trucks",
        21,
        Duration::from_secs(100),
        |time, _| time,
    ));
    let yard = builder.add_node(QueueNode::fifo("yard"));
    let crane = builder.add_node(ServiceNode::fixed("crane", 1, Duration::from_secs(60)));
    let sink = builder.add_node(sink);
    builder.connect_push(source, yard, "in");
    builder.connect_push(yard, crane, "to crane");
    builder.connect_push(crane, sink, "out");
    builder.watch_node(yard);

    let mut sim = builder.build(MonotonicTime::EPOCH);
    sim.run_until(Duration::from_secs(2_000_000)).unwrap();

    let yard_length = sim.metric("yard").unwrap();
    assert!(yard_length.is_steady());
    let interval = sim
        .metric("yard")
        .unwrap()
        .confidence_interval(sim.time())
        .expect("a long stable run should produce an interval");
    assert!(interval.lower <= interval.mean && interval.mean <= interval.upper);
    assert!(interval.upper - interval.lower < 1.0);
    // M/D/1 at this utilization averages well under one waiting truck.
    assert!(interval.mean >= 0.0 && interval.mean < 2.0);
}

#[test]
fn sojourn_times_feed_a_discrete_metric_group() {
    let metric = InstantaneousMetric::new("sojourn");

    let mut builder = ScenarioBuilder::new();
    builder.set_stats_config(StatsConfig {
        target_batches: 4,
        batch_size: 8,
        steady_period: 10,
        steady_crossings: 2,
        ..Default::default()
    });
    builder.watch_samples(std::rc::Rc::clone(&metric));
    let sink = SinkNode::new("handled").with_samples(metric, |now, created: &MonotonicTime| {
        now.duration_since(*created).as_secs_f64()
    });

    let source = builder.add_source(SourceNode::poisson(
        "trucks",
        5,
        Duration::from_secs(100),
        |time, _| time,
    ));
    let crane = builder.add_node(ServiceNode::fixed("crane", 4, Duration::from_secs(30)));
    let sink = builder.add_node(sink);
    builder.connect_push(source, crane, "in");
    builder.connect_push(crane, sink, "out");

    let mut sim = builder.build(MonotonicTime::EPOCH);
    sim.run_until(Duration::from_secs(50_000)).unwrap();

    // Four slots against this arrival rate leave almost every truck
    // unqueued, so the mean sojourn sits at the fixed service time.
    let sojourn = sim.metric("sojourn").unwrap();
    assert!((sojourn.mean() - 30.0).abs() < 1.0);
    assert!(sojourn.is_steady() || sojourn.confidence_interval(sim.time()).is_none());
}
