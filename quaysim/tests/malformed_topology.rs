//! Protocol violations are model bugs and must abort the run loudly.

use std::time::Duration;

use quaysim::channel::{PullChannelId, PushChannelId};
use quaysim::node::Node;
use quaysim::nodes::{SinkNode, SourceNode};
use quaysim::simulation::scenario::ScenarioBuilder;
use quaysim::simulation::SimContext;
use quaysim::time::MonotonicTime;

/// Pushes one item on its sole output at t = 1 without consulting the
/// channel state.
struct BlindSender {
    output: Option<PushChannelId>,
}

impl Node<u32> for BlindSender {
    fn label(&self) -> &str {
        "blind sender"
    }

    fn on_start(&mut self, ctx: &mut SimContext<u32>) {
        self.output = Some(ctx.outgoing_push()[0]);
        ctx.schedule_self_in(Duration::from_secs(1), |node: &mut Self, ctx| {
            ctx.send(node.output.unwrap(), 42);
        });
    }
}

/// Closes its input for good during initialization.
struct Refuser;

impl Node<u32> for Refuser {
    fn label(&self) -> &str {
        "refuser"
    }

    fn on_start(&mut self, ctx: &mut SimContext<u32>) {
        for channel in ctx.incoming_push() {
            ctx.close(channel);
        }
    }
}

#[test]
#[should_panic(expected = "closed push channel")]
fn sending_on_a_closed_channel_panics() {
    let mut builder = ScenarioBuilder::new();
    let sender = builder.add_source(BlindSender { output: None });
    let refuser = builder.add_node(Refuser);
    builder.connect_push(sender, refuser, "refused feed");

    let mut sim = builder.build(MonotonicTime::EPOCH);
    sim.run();
}

/// Pulls from its sole input at t = 1 without consulting the readiness
/// flag.
struct BlindReceiver {
    input: Option<PullChannelId>,
}

impl Node<u32> for BlindReceiver {
    fn label(&self) -> &str {
        "blind receiver"
    }

    fn on_start(&mut self, ctx: &mut SimContext<u32>) {
        self.input = Some(ctx.incoming_pull()[0]);
        ctx.schedule_self_in(Duration::from_secs(1), |node: &mut Self, ctx| {
            ctx.receive(node.input.unwrap());
        });
    }
}

struct SilentSupplier;

impl Node<u32> for SilentSupplier {
    fn label(&self) -> &str {
        "silent supplier"
    }
}

#[test]
#[should_panic(expected = "not ready pull channel")]
fn receiving_from_a_not_ready_channel_panics() {
    let mut builder = ScenarioBuilder::new();
    let supplier = builder.add_source(SilentSupplier);
    let receiver = builder.add_node(BlindReceiver { input: None });
    builder.connect_pull(supplier, receiver, "dry feed");

    let mut sim = builder.build(MonotonicTime::EPOCH);
    sim.run();
}

/// Forwards every arrival without delay, half of a zero-delay cycle.
struct Echo {
    output: Option<PushChannelId>,
    kick: bool,
}

impl Node<u32> for Echo {
    fn label(&self) -> &str {
        "echo"
    }

    fn on_start(&mut self, ctx: &mut SimContext<u32>) {
        self.output = Some(ctx.outgoing_push()[0]);
        if self.kick {
            ctx.schedule_self_in(Duration::from_secs(1), |node: &mut Self, ctx| {
                ctx.send(node.output.unwrap(), 0);
            });
        }
    }

    fn on_arrive(&mut self, _channel: PushChannelId, item: u32, ctx: &mut SimContext<u32>) {
        ctx.send(self.output.unwrap(), item);
    }
}

#[test]
#[should_panic(expected = "re-entrant")]
fn a_zero_delay_cycle_is_detected() {
    let mut builder = ScenarioBuilder::new();
    let a = builder.add_source(Echo {
        output: None,
        kick: true,
    });
    let b = builder.add_node(Echo {
        output: None,
        kick: false,
    });
    builder.connect_push(a, b, "there");
    builder.connect_push(b, a, "back again");

    let mut sim = builder.build(MonotonicTime::EPOCH);
    sim.run();
}

#[test]
#[should_panic(expected = "requires exactly one output channel")]
fn a_source_without_an_output_is_rejected_at_build_time() {
    let mut builder = ScenarioBuilder::new();
    builder.add_source(SourceNode::every(
        "dangling",
        Duration::from_secs(1),
        |_, n: u64| n,
    ));
    builder.build(MonotonicTime::EPOCH);
}

#[test]
#[should_panic(expected = "does not accept pushed items")]
fn pushing_into_a_non_consumer_panics() {
    let mut builder = ScenarioBuilder::new();
    let source = builder.add_source(
        SourceNode::every("ticker", Duration::from_secs(1), |_, n: u64| n).with_limit(1),
    );
    // Sources have no arrival callback.
    let other = builder.add_node(SourceNode::every(
        "other",
        Duration::from_secs(1),
        |_, n: u64| n,
    ));
    let sink = builder.add_node(SinkNode::new("sink"));
    builder.connect_push(source, other, "bad feed");
    builder.connect_push(other, sink, "out");

    let mut sim = builder.build(MonotonicTime::EPOCH);
    sim.run();
}
