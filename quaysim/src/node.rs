//! Simulation nodes and the node graph.
//!
//! # Node trait
//!
//! Every unit of simulated behavior implements the [`Node`] trait. A node
//! owns disjoint lists of incoming and outgoing channels and mutable internal
//! state (queue contents, in-flight counts) that only it may mutate. All
//! callbacks receive an explicit [`SimContext`] handle; there is no ambient
//! or thread-local simulation state.
//!
//! The lifecycle is:
//!
//! 1. [`Node::on_start`]: one-time initialization, invoked after the graph
//!    is fully wired but before the first event. Policies typically inspect
//!    initial channel states here.
//! 2. [`Node::on_arrive`]: invoked when an item is delivered on an incoming
//!    push channel. This must never fail for a well-formed model: the sender
//!    checked that the channel was open, and a node that cannot accept more
//!    items is expected to have closed its inputs beforehand.
//! 3. [`Node::supply`]: invoked when the downstream consumer of an outgoing
//!    pull channel receives; materializes and returns one item.
//! 4. [`Node::on_signal`]: channel availability notifications
//!    (open/close/ready/not-ready) for the channels the node listens on.
//! 5. [`Node::on_activate`]: an explicit same-instant wakeup requested by
//!    another node (used e.g. by token pools to re-arm their gate).
//!
//! Delayed continuations are scheduled through
//! [`SimContext::schedule_self_in`], which re-dispatches a closure on the
//! node at a later simulation time.
//!
//! # Node groups
//!
//! Nodes belong to at most one [`NodeGroup`], and groups nest to form a tree.
//! Groups have no behavior of their own; they exist for hierarchical metric
//! attribution (the occupancy of a group is the summed occupancy of its
//! descendant container nodes) and to delimit bounded subnetworks.

use std::any::Any;

use crate::channel::{ChannelSignal, PullChannelId, PullChannelState, PushChannelId, PushChannelState};
use crate::metrics::Gauge;
use crate::simulation::SimContext;

/// Handle to a node, issued at registration time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Handle to a node group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) usize);

/// Object-safe access to the concrete node type.
///
/// This is what allows scheduled continuations to be statically typed against
/// the concrete node while the graph stores nodes as trait objects. It is
/// blanket-implemented for all `'static` types.
pub trait AsAny: Any {
    /// Returns a mutable `Any` reference to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<N: Any> AsAny for N {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of simulated behavior with typed incoming/outgoing channels.
///
/// `T` is the item type flowing through the scenario this node belongs to.
pub trait Node<T>: AsAny {
    /// The node's display label, used in logs and fatal error messages.
    fn label(&self) -> &str;

    /// One-time initialization, after the graph is fully wired.
    fn on_start(&mut self, _ctx: &mut SimContext<T>) {}

    /// An item was delivered on an incoming push channel.
    fn on_arrive(&mut self, _channel: PushChannelId, _item: T, _ctx: &mut SimContext<T>) {
        panic!("node '{}' does not accept pushed items", self.label());
    }

    /// Materializes one item for an outgoing pull channel.
    fn supply(&mut self, _channel: PullChannelId, _ctx: &mut SimContext<T>) -> T {
        panic!("node '{}' does not supply pulled items", self.label());
    }

    /// A listened-on channel changed availability.
    fn on_signal(&mut self, _signal: ChannelSignal, _ctx: &mut SimContext<T>) {}

    /// An explicit same-instant wakeup requested by another node.
    fn on_activate(&mut self, _ctx: &mut SimContext<T>) {}

    /// Current number of items held by this node, if it is a container.
    fn occupancy(&self) -> usize {
        0
    }

    /// The shared occupancy gauge, if this node is a container.
    ///
    /// A node returning `Some` here is a *tagged container*: occupancy-driven
    /// fork/join policies resolve to the nearest such node when walking the
    /// graph at initialization time, and continuous metrics read the gauge
    /// directly.
    fn gauge(&self) -> Option<Gauge> {
        None
    }

    /// Best-effort snapshot of internal counters for display purposes.
    ///
    /// This is never used by the statistics engine.
    fn report(&self) -> Vec<(String, f64)> {
        Vec::new()
    }
}

/// A node's slot in the graph arena.
///
/// The boxed node is temporarily checked out of its slot while one of its
/// callbacks runs, which turns unexpected re-entrant dispatch into a
/// detectable error instead of aliased mutation.
pub(crate) struct NodeSlot<T> {
    pub(crate) node: Option<Box<dyn Node<T>>>,
    pub(crate) label: String,
    pub(crate) incoming_push: Vec<PushChannelId>,
    pub(crate) outgoing_push: Vec<PushChannelId>,
    pub(crate) incoming_pull: Vec<PullChannelId>,
    pub(crate) outgoing_pull: Vec<PullChannelId>,
}

/// A node group in the containment tree.
pub(crate) struct GroupState {
    pub(crate) label: String,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) children: Vec<GroupId>,
}

/// Arena-backed storage for the node graph: nodes, channels and groups.
///
/// All cross-references are integer handles issued at construction time;
/// nothing in the kernel relies on reference identity.
pub(crate) struct Network<T> {
    pub(crate) nodes: Vec<NodeSlot<T>>,
    pub(crate) push: Vec<PushChannelState>,
    pub(crate) pull: Vec<PullChannelState>,
    pub(crate) groups: Vec<GroupState>,
}

impl<T: 'static> Network<T> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            push: Vec::new(),
            pull: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub(crate) fn add_node(&mut self, node: Box<dyn Node<T>>, group: Option<GroupId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let label = node.label().to_owned();
        self.nodes.push(NodeSlot {
            node: Some(node),
            label,
            incoming_push: Vec::new(),
            outgoing_push: Vec::new(),
            incoming_pull: Vec::new(),
            outgoing_pull: Vec::new(),
        });
        if let Some(group) = group {
            self.groups[group.0].nodes.push(id);
        }

        id
    }

    pub(crate) fn add_group(&mut self, label: String, parent: Option<GroupId>) -> GroupId {
        let id = GroupId(self.groups.len());
        self.groups.push(GroupState {
            label,
            nodes: Vec::new(),
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.groups[parent.0].children.push(id);
        }

        id
    }

    pub(crate) fn create_push_channel(&mut self, label: String, downstream: NodeId) -> PushChannelId {
        let id = PushChannelId(self.push.len());
        self.push.push(PushChannelState::new(label, downstream));
        self.nodes[downstream.0].incoming_push.push(id);

        id
    }

    pub(crate) fn bind_push_upstream(&mut self, node: NodeId, channel: PushChannelId) {
        self.push[channel.0].bind_upstream(node);
        self.nodes[node.0].outgoing_push.push(channel);
    }

    pub(crate) fn create_pull_channel(&mut self, label: String, downstream: NodeId) -> PullChannelId {
        let id = PullChannelId(self.pull.len());
        self.pull.push(PullChannelState::new(label, downstream));
        self.nodes[downstream.0].incoming_pull.push(id);

        id
    }

    pub(crate) fn bind_pull_upstream(&mut self, node: NodeId, channel: PullChannelId) {
        self.pull[channel.0].bind_upstream(node);
        self.nodes[node.0].outgoing_pull.push(channel);
    }

    /// Reads the occupancy gauge of a node, if it is present in its slot and
    /// is a container.
    fn node_gauge(&self, node: NodeId) -> Option<Gauge> {
        self.nodes[node.0].node.as_ref().and_then(|n| n.gauge())
    }

    /// Resolves the nearest tagged container at or downstream of the given
    /// push channel's consumer, by breadth-first forward walk.
    ///
    /// This runs once per fork destination during initialization; the
    /// resolved gauge is then stored by the policy.
    pub(crate) fn downstream_container(&self, channel: PushChannelId) -> Option<Gauge> {
        let start = self.push[channel.0].downstream;
        self.walk_for_container(start, Direction::Downstream)
    }

    /// Resolves the nearest tagged container at or upstream of the given pull
    /// channel's supplier.
    pub(crate) fn upstream_container(&self, channel: PullChannelId) -> Option<Gauge> {
        let start = self.pull[channel.0].upstream?;
        self.walk_for_container(start, Direction::Upstream)
    }

    fn walk_for_container(&self, start: NodeId, direction: Direction) -> Option<Gauge> {
        let mut visited = vec![false; self.nodes.len()];
        let mut frontier = std::collections::VecDeque::new();
        visited[start.0] = true;
        frontier.push_back(start);

        while let Some(node) = frontier.pop_front() {
            if let Some(gauge) = self.node_gauge(node) {
                return Some(gauge);
            }
            let slot = &self.nodes[node.0];
            let next: Vec<NodeId> = match direction {
                Direction::Downstream => slot
                    .outgoing_push
                    .iter()
                    .map(|ch| self.push[ch.0].downstream)
                    .chain(slot.outgoing_pull.iter().map(|ch| self.pull[ch.0].downstream))
                    .collect(),
                Direction::Upstream => slot
                    .incoming_push
                    .iter()
                    .filter_map(|ch| self.push[ch.0].upstream)
                    .chain(slot.incoming_pull.iter().filter_map(|ch| self.pull[ch.0].upstream))
                    .collect(),
            };
            for node in next {
                if !visited[node.0] {
                    visited[node.0] = true;
                    frontier.push_back(node);
                }
            }
        }

        None
    }
}

#[derive(Copy, Clone)]
enum Direction {
    Downstream,
    Upstream,
}
