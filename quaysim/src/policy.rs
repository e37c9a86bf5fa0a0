//! Pluggable routing and queueing disciplines.
//!
//! Policies are the pure decision-making counterpart of the nodes that host
//! them: a [`QueuePolicy`](queue::QueuePolicy) decides storage order inside a
//! buffering node, a [`ForkPolicy`](fork::ForkPolicy) picks one of several
//! open output channels and a [`JoinPolicy`](join::JoinPolicy) picks one of
//! several ready input channels. Policies never touch the simulation
//! directly; the hosting node feeds them channel availability transitions and
//! asks them to select, so the same discipline can be reused behind any node
//! shape.
//!
//! Stochastic policies own a private [`ChaCha8Rng`](rand_chacha::ChaCha8Rng)
//! seeded at construction, keeping runs reproducible regardless of how many
//! other random streams the scenario uses.

pub mod fork;
pub mod join;
pub mod queue;

mod select;

pub use fork::{
    FirstAvailableFork, ForkPolicy, LeastFullFork, MostFullFork, PriorityFork, RandomFork,
    RoundRobinFork,
};
pub use join::{
    FirstReadyJoin, JoinPolicy, LeastFullJoin, MostFullJoin, PriorityJoin, RandomJoin,
    RoundRobinJoin,
};
pub use queue::{FifoQueue, PriorityQueue, QueuePolicy, RandomQueue, TokenPool};
