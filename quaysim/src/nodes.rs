//! Ready-made nodes for queueing-network models.
//!
//! These cover the usual cast of a traffic or logistics scenario:
//!
//! * [`SourceNode`] generates items on a stochastic or fixed arrival
//!   process,
//! * [`QueueNode`] buffers items under a pluggable storage discipline,
//! * [`ServiceNode`] holds items for a service time under a capacity limit,
//!   the shape of a road segment, lock or crane pool,
//! * [`ForkNode`] and [`JoinNode`] route across parallel branches under
//!   pluggable selection disciplines,
//! * [`MatchNode`] and [`SplitNode`] pair items up and take them apart
//!   again,
//! * [`TokenGate`] and [`TokenRelease`] bound the population of a subnetwork
//!   with a shared token pool,
//! * [`SinkNode`] absorbs items and feeds completion metrics.
//!
//! All of them follow the same flow-control contract: a node checks the live
//! state of a channel before transferring on it, closes its inputs the
//! moment it cannot accept another item and reopens them as soon as it can.
//! Items are never dropped; whatever cannot move on is held until the
//! blocking channel becomes available again.

pub mod fork;
pub mod gate;
pub mod join;
pub mod pair;
pub mod queue;
pub mod service;
pub mod sink;
pub mod source;

pub use fork::ForkNode;
pub use gate::{TokenGate, TokenRelease};
pub use join::JoinNode;
pub use pair::{MatchNode, SplitNode};
pub use queue::QueueNode;
pub use service::ServiceNode;
pub use sink::{Counter, SinkNode};
pub use source::SourceNode;
