//! Scenario assembly.
//!
//! A scenario is described by registering nodes and groups on a
//! [`ScenarioBuilder`], wiring channels between them and declaring which
//! quantities to watch. [`ScenarioBuilder::build`] then freezes the graph:
//! it computes the set of nodes reachable from the registered sources,
//! resolves every watch declaration to a metric group and runs each node's
//! `on_start` exactly once, sources first in breadth-first order. All graph
//! walks happen here; nothing is resolved again while events are processed.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::channel::{PullChannelId, PushChannelId};
use crate::metrics::{
    ContinuousMetric, Gauge, InstantaneousMetric, MetricGroup, StatsConfig,
};
use crate::node::{GroupId, Network, Node, NodeId};
use crate::simulation::event_log::{EventLog, NoopEventLog};
use crate::simulation::{MetricReporter, Simulation};
use crate::time::MonotonicTime;

enum Watch {
    Node(NodeId),
    Group(GroupId),
    Samples(Rc<RefCell<InstantaneousMetric>>),
}

/// Read-only description of a frozen scenario: the declared sources and the
/// breadth-first closure of nodes reachable from them.
///
/// Consumers that need the whole graph, e.g. visualization or reporting
/// front ends, read it from [`Simulation::scenario`] instead of walking the
/// channels again.
pub struct Scenario {
    pub(crate) sources: Vec<NodeId>,
    pub(crate) reachable: Vec<(NodeId, String)>,
}

impl Scenario {
    /// The declared source nodes, in registration order.
    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    /// Every node reachable from a source, with its label, in breadth-first
    /// order.
    pub fn reachable(&self) -> &[(NodeId, String)] {
        &self.reachable
    }

    /// Whether a node is part of the reachable closure.
    pub fn contains(&self, node: NodeId) -> bool {
        self.reachable.iter().any(|(id, _)| *id == node)
    }
}

/// Incremental description of a simulation scenario.
pub struct ScenarioBuilder<T: 'static> {
    net: Network<T>,
    sources: Vec<NodeId>,
    stats: StatsConfig,
    watches: Vec<Watch>,
    log: Box<dyn EventLog>,
    reporter: Option<Box<dyn MetricReporter>>,
}

impl<T: 'static> Default for ScenarioBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ScenarioBuilder<T> {
    pub fn new() -> Self {
        Self {
            net: Network::new(),
            sources: Vec::new(),
            stats: StatsConfig::default(),
            watches: Vec::new(),
            log: Box::new(NoopEventLog),
            reporter: None,
        }
    }

    /// Registers a node outside any group.
    pub fn add_node(&mut self, node: impl Node<T> + 'static) -> NodeId {
        self.net.add_node(Box::new(node), None)
    }

    /// Registers a node inside a group.
    pub fn add_node_in(&mut self, node: impl Node<T> + 'static, group: GroupId) -> NodeId {
        self.net.add_node(Box::new(node), Some(group))
    }

    /// Registers a node and marks it as a scenario source: a root of the
    /// reachability closure and of the initialization order.
    pub fn add_source(&mut self, node: impl Node<T> + 'static) -> NodeId {
        let id = self.add_node(node);
        self.sources.push(id);
        id
    }

    /// Registers a source node inside a group.
    pub fn add_source_in(&mut self, node: impl Node<T> + 'static, group: GroupId) -> NodeId {
        let id = self.add_node_in(node, group);
        self.sources.push(id);
        id
    }

    /// Creates a top-level node group.
    pub fn add_group(&mut self, label: impl Into<String>) -> GroupId {
        self.net.add_group(label.into(), None)
    }

    /// Creates a group nested under an existing one.
    pub fn add_subgroup(&mut self, label: impl Into<String>, parent: GroupId) -> GroupId {
        self.net.add_group(label.into(), Some(parent))
    }

    /// Wires a push channel from `from` to `to`.
    pub fn connect_push(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: impl Into<String>,
    ) -> PushChannelId {
        let channel = self.net.create_push_channel(label.into(), to);
        self.net.bind_push_upstream(from, channel);
        channel
    }

    /// Wires a pull channel supplied by `from` and consumed by `to`.
    pub fn connect_pull(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: impl Into<String>,
    ) -> PullChannelId {
        let channel = self.net.create_pull_channel(label.into(), to);
        self.net.bind_pull_upstream(from, channel);
        channel
    }

    /// Watches a container node's occupancy as a time-weighted metric.
    ///
    /// # Panics
    ///
    /// Panics at build time if the node is not a container.
    pub fn watch_node(&mut self, node: NodeId) {
        self.watches.push(Watch::Node(node));
    }

    /// Watches a group's summed container occupancy as a time-weighted
    /// metric. The sum covers the group's whole subtree.
    pub fn watch_group(&mut self, group: GroupId) {
        self.watches.push(Watch::Group(group));
    }

    /// Watches a discrete sample stream, e.g. sojourn times fired by a sink.
    pub fn watch_samples(&mut self, metric: Rc<RefCell<InstantaneousMetric>>) {
        self.watches.push(Watch::Samples(metric));
    }

    /// Overrides the statistical configuration applied to subsequently
    /// built metric groups.
    pub fn set_stats_config(&mut self, config: StatsConfig) {
        self.stats = config;
    }

    /// Attaches an event log.
    pub fn set_event_log(&mut self, log: impl EventLog + 'static) {
        self.log = Box::new(log);
    }

    /// Attaches a per-event metric reporter.
    pub fn set_reporter(&mut self, reporter: impl MetricReporter + 'static) {
        self.reporter = Some(Box::new(reporter));
    }

    /// Freezes the scenario into a runnable simulation starting at `start`.
    ///
    /// Every node's `on_start` runs here, sources first in breadth-first
    /// order over the channel graph, followed by any node not reachable from
    /// a source (which is also reported as a likely wiring mistake). Deferred
    /// wakeups raised during initialization are delivered before this
    /// returns.
    pub fn build(self, start: MonotonicTime) -> Simulation<T> {
        let Self {
            net,
            sources,
            stats,
            watches,
            log,
            reporter,
        } = self;

        let (order, reachable) = initialization_order(&net, &sources);
        let scenario = Scenario {
            reachable: order[..reachable]
                .iter()
                .map(|&id| (id, net.nodes[id.0].label.clone()))
                .collect(),
            sources,
        };
        let metric_groups = watches
            .into_iter()
            .map(|watch| resolve_watch(&net, watch, &stats))
            .collect();

        let mut sim = Simulation::new(net, start, scenario, log, reporter, metric_groups);
        for node in order {
            sim.dispatch(node, |n, ctx| n.on_start(ctx));
        }
        sim.drain_pending();
        sim.sample_metrics();

        sim
    }
}

/// Breadth-first order over the channel graph from the sources, followed by
/// unreachable nodes in registration order. The second value is the length
/// of the reachable prefix.
fn initialization_order<T: 'static>(
    net: &Network<T>,
    sources: &[NodeId],
) -> (Vec<NodeId>, usize) {
    let mut visited = vec![false; net.nodes.len()];
    let mut order = Vec::with_capacity(net.nodes.len());
    let mut frontier = VecDeque::new();

    for &source in sources {
        if !visited[source.0] {
            visited[source.0] = true;
            frontier.push_back(source);
        }
    }
    while let Some(node) = frontier.pop_front() {
        order.push(node);
        let slot = &net.nodes[node.0];
        let next = slot
            .outgoing_push
            .iter()
            .map(|ch| net.push[ch.0].downstream)
            .chain(slot.outgoing_pull.iter().map(|ch| net.pull[ch.0].downstream));
        for node in next {
            if !visited[node.0] {
                visited[node.0] = true;
                frontier.push_back(node);
            }
        }
    }

    let reachable = order.len();
    for (index, slot) in net.nodes.iter().enumerate() {
        if !visited[index] {
            if !sources.is_empty() {
                tracing::warn!(node = %slot.label, "node is not reachable from any source");
            }
            order.push(NodeId(index));
        }
    }

    (order, reachable)
}

fn resolve_watch<T: 'static>(net: &Network<T>, watch: Watch, stats: &StatsConfig) -> MetricGroup {
    match watch {
        Watch::Node(node) => {
            let slot = &net.nodes[node.0];
            let gauge = slot
                .node
                .as_ref()
                .and_then(|n| n.gauge())
                .unwrap_or_else(|| {
                    panic!("watched node '{}' is not a container", slot.label)
                });
            let metric = ContinuousMetric::new(slot.label.clone(), move |_| gauge.get());

            MetricGroup::continuous(metric, stats)
        }
        Watch::Group(group) => {
            let gauges = collect_group_gauges(net, group);
            let metric =
                ContinuousMetric::new(net.groups[group.0].label.clone(), move |_| {
                    gauges.iter().map(Gauge::get).sum()
                });

            MetricGroup::continuous(metric, stats)
        }
        Watch::Samples(metric) => MetricGroup::instantaneous(metric, stats),
    }
}

/// Gauges of every container node in the group's subtree.
fn collect_group_gauges<T: 'static>(net: &Network<T>, group: GroupId) -> Vec<Gauge> {
    let mut gauges = Vec::new();
    let mut frontier = vec![group];
    while let Some(group) = frontier.pop() {
        let state = &net.groups[group.0];
        for &node in &state.nodes {
            if let Some(gauge) = net.nodes[node.0].node.as_ref().and_then(|n| n.gauge()) {
                gauges.push(gauge);
            }
        }
        frontier.extend(state.children.iter().copied());
    }

    gauges
}

#[cfg(test)]
mod tests {
    use crate::simulation::event_log::MemoryEventLog;
    use crate::simulation::SimContext;

    use super::*;

    /// A container holding a fixed level, announcing its startup.
    struct Bin {
        label: String,
        level: f64,
        gauge: Gauge,
    }

    impl Bin {
        fn new(label: &str, level: f64) -> Self {
            Self {
                label: label.into(),
                level,
                gauge: Gauge::new(),
            }
        }
    }

    impl Node<u32> for Bin {
        fn label(&self) -> &str {
            &self.label
        }

        fn on_start(&mut self, ctx: &mut SimContext<u32>) {
            self.gauge.set(self.level);
            let label = self.label.clone();
            ctx.log(move || format!("{label} initialized"));
        }

        fn gauge(&self) -> Option<Gauge> {
            Some(self.gauge.clone())
        }
    }

    #[test]
    fn initialization_follows_the_flow_from_sources() {
        let log = MemoryEventLog::new();
        let lines = log.handle();

        let mut builder = ScenarioBuilder::new();
        builder.set_event_log(log);
        let downstream = builder.add_node(Bin::new("downstream", 0.0));
        let source = builder.add_source(Bin::new("source", 0.0));
        builder.connect_push(source, downstream, "feed");
        builder.build(MonotonicTime::EPOCH);

        let lines = lines.borrow();
        assert_eq!(lines[0].1, "source initialized");
        assert_eq!(lines[1].1, "downstream initialized");
    }

    #[test]
    fn the_reachable_closure_is_exposed_for_introspection() {
        let mut builder = ScenarioBuilder::new();
        let source = builder.add_source(Bin::new("source", 0.0));
        let downstream = builder.add_node(Bin::new("downstream", 0.0));
        let stray = builder.add_node(Bin::new("stray", 0.0));
        builder.connect_push(source, downstream, "feed");

        let sim = builder.build(MonotonicTime::EPOCH);
        let scenario = sim.scenario();
        assert_eq!(scenario.sources(), [source]);
        let labels: Vec<_> = scenario
            .reachable()
            .iter()
            .map(|(_, label)| label.as_str())
            .collect();
        assert_eq!(labels, ["source", "downstream"]);
        assert!(scenario.contains(downstream));
        assert!(!scenario.contains(stray));
    }

    #[test]
    fn group_watches_sum_the_subtree() {
        let mut builder = ScenarioBuilder::new();
        let yard = builder.add_group("yard");
        let west = builder.add_subgroup("west", yard);
        builder.add_source_in(Bin::new("a", 2.0), yard);
        builder.add_node_in(Bin::new("b", 3.0), west);
        builder.add_node(Bin::new("outside", 10.0));
        builder.watch_group(yard);

        let sim = builder.build(MonotonicTime::EPOCH);
        let group = sim.metric("yard").unwrap();
        assert_eq!(group.mean(), 0.0); // no time has elapsed yet

        let mut sim = sim;
        sim.run_for(std::time::Duration::from_secs(100));
        let group = sim.metric("yard").unwrap();
        assert_eq!(group.mean(), 5.0);
    }

    #[test]
    #[should_panic(expected = "is not a container")]
    fn watching_a_non_container_panics_at_build_time() {
        struct Plain;
        impl Node<u32> for Plain {
            fn label(&self) -> &str {
                "plain"
            }
        }

        let mut builder = ScenarioBuilder::new();
        let id = builder.add_node(Plain);
        builder.watch_node(id);
        builder.build(MonotonicTime::EPOCH);
    }
}
