//! A container terminal: trucks are admitted under a terminal-wide cap,
//! travel an access road, pick the emptier of two yard lanes and are handled
//! by that lane's crane before leaving.
//!
//! Run with: cargo run --example terminal

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use quaysim::metrics::InstantaneousMetric;
use quaysim::nodes::{
    ForkNode, QueueNode, ServiceNode, SinkNode, SourceNode, TokenGate, TokenRelease,
};
use quaysim::policy::{LeastFullFork, TokenPool};
use quaysim::simulation::scenario::ScenarioBuilder;
use quaysim::time::MonotonicTime;

#[derive(Clone, Copy)]
struct Truck {
    arrived: MonotonicTime,
}

fn main() {
    let sojourn = InstantaneousMetric::new("truck sojourn [s]");
    let admitted = Rc::new(RefCell::new(TokenPool::new(25)));

    let mut builder = ScenarioBuilder::new();
    let exit = SinkNode::new("exit").with_samples(Rc::clone(&sojourn), |now, truck: &Truck| {
        now.duration_since(truck.arrived).as_secs_f64()
    });
    let departed = exit.counter();

    let arrivals = builder.add_source(SourceNode::poisson(
        "arrivals",
        2026,
        Duration::from_secs(90),
        |time, _| Truck { arrived: time },
    ));
    let terminal = builder.add_group("terminal");
    let gate = builder.add_node(TokenGate::new("gate", Rc::clone(&admitted)));
    let road = builder.add_node_in(
        ServiceNode::fixed("access road", 40, Duration::from_secs(120)),
        terminal,
    );
    let lanes = builder.add_node_in(ForkNode::new("lane pick", LeastFullFork::new()), terminal);
    let north_lane = builder.add_node_in(QueueNode::fifo("north lane"), terminal);
    let south_lane = builder.add_node_in(QueueNode::fifo("south lane"), terminal);
    let north_crane = builder.add_node_in(
        ServiceNode::fixed("north crane", 1, Duration::from_secs(150)),
        terminal,
    );
    let south_crane = builder.add_node_in(
        ServiceNode::fixed("south crane", 1, Duration::from_secs(180)),
        terminal,
    );
    let release = builder.add_node(TokenRelease::new("exit gate", admitted, gate));
    let exit = builder.add_node(exit);

    builder.connect_push(arrivals, gate, "approach");
    builder.connect_push(gate, road, "admitted");
    builder.connect_push(road, lanes, "road end");
    builder.connect_push(lanes, north_lane, "to north");
    builder.connect_push(lanes, south_lane, "to south");
    builder.connect_push(north_lane, north_crane, "north handling");
    builder.connect_push(south_lane, south_crane, "south handling");
    builder.connect_push(north_crane, release, "north done");
    builder.connect_push(south_crane, release, "south done");
    builder.connect_push(release, exit, "leave");

    builder.watch_node(north_lane);
    builder.watch_node(south_lane);
    builder.watch_group(terminal);
    builder.watch_samples(sojourn);

    let mut sim = builder.build(MonotonicTime::EPOCH);
    sim.run_until(Duration::from_secs(30 * 24 * 3600))
        .expect("deadline lies in the future");

    println!("simulated 30 days, {} trucks handled\n", departed.get());
    for metric in sim.metrics() {
        match metric.confidence_interval(sim.time()) {
            Some(interval) => println!(
                "{:<24} mean {:8.3}   95% CI [{:.3}, {:.3}]",
                metric.label(),
                interval.mean,
                interval.lower,
                interval.upper
            ),
            None => println!(
                "{:<24} mean {:8.3}   (no steady-state interval yet)",
                metric.label(),
                metric.mean()
            ),
        }
    }
}
