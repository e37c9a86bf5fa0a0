//! A discrete-event simulation kernel for queueing-network models.
//!
//! quaysim targets traffic and logistics studies: port terminals, road
//! networks, cargo handling chains and similar systems where discrete items
//! flow through capacity-limited stages. A model is a graph of [nodes]
//! connected by typed, directional [channels]; the [simulation] kernel
//! processes the resulting events in time order while a [metrics] engine
//! watches occupancies and completion times and reports steady-state
//! confidence intervals.
//!
//! [nodes]: crate::nodes
//! [channels]: crate::channel
//! [simulation]: crate::simulation
//! [metrics]: crate::metrics
//!
//! # Flow control
//!
//! Channels come in two disciplines. *Push* channels are producer-driven and
//! carry backpressure: a node that cannot accept more items closes its
//! inputs, and upstream nodes hold their items until the channel reopens.
//! *Pull* channels are consumer-driven: a node with items to offer marks the
//! channel ready, and the consumer draws at its own pace. Items are never
//! dropped anywhere in a well-formed model; protocol violations (sending on
//! a closed channel, receiving from a channel that is not ready) are treated
//! as model bugs and abort the run.
//!
//! # Determinism
//!
//! Runs are reproducible by construction: events at the same timestamp are
//! processed in scheduling order, and every stochastic node or policy owns a
//! private random stream seeded at construction.
//!
//! # Example
//!
//! Trucks arrive at a terminal, wait in a holding area and are handled by a
//! two-slot crane pool:
//!
//! ```
//! use std::time::Duration;
//!
//! use quaysim::nodes::{QueueNode, ServiceNode, SinkNode, SourceNode};
//! use quaysim::simulation::scenario::ScenarioBuilder;
//! use quaysim::time::MonotonicTime;
//!
//! let mut builder = ScenarioBuilder::new();
//! let sink = SinkNode::new("processed");
//! let completed = sink.counter();
//!
//! let arrivals = builder.add_source(
//!     SourceNode::poisson("trucks", 42, Duration::from_secs(60), |time, _| time)
//!         .with_limit(100),
//! );
//! let buffer = builder.add_node(QueueNode::fifo("holding area"));
//! let cranes = builder.add_node(ServiceNode::fixed("cranes", 2, Duration::from_secs(90)));
//! let sink = builder.add_node(sink);
//! builder.connect_push(arrivals, buffer, "arrivals");
//! builder.connect_push(buffer, cranes, "to cranes");
//! builder.connect_push(cranes, sink, "handled");
//! builder.watch_node(buffer);
//!
//! let mut sim = builder.build(MonotonicTime::EPOCH);
//! sim.run();
//!
//! assert_eq!(completed.get(), 100);
//! let queue_length = sim.metric("holding area").unwrap();
//! assert!(queue_length.mean() >= 0.0);
//! ```

pub mod channel;
pub mod metrics;
pub mod node;
pub mod nodes;
pub mod policy;
pub mod simulation;
pub mod time;

mod util;
