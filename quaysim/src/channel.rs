//! Directional, typed conduits between simulation nodes.
//!
//! A channel connects exactly one upstream node to exactly one downstream
//! node and follows one of two flow-control disciplines:
//!
//! * *push* channels are producer-driven: the upstream node calls
//!   [`send`](crate::simulation::SimContext::send) and the item is delivered
//!   to the downstream node's `on_arrive` callback. A push channel is either
//!   `Open` (initial) or `Closed`; sending on a closed channel is a fatal
//!   topology bug and panics. Closing and reopening is how a saturated
//!   downstream node propagates backpressure to its upstream.
//! * *pull* channels are consumer-driven: the downstream node calls
//!   [`receive`](crate::simulation::SimContext::receive), which invokes the
//!   upstream node's `supply` callback to materialize an item. A pull channel
//!   is either `NotReady` (initial) or `Ready`; receiving from a not-ready
//!   channel panics. Readiness is how an upstream node solicits consumption.
//!
//! The two disciplines are deliberately kept as two distinct handle types,
//! [`PushChannelId`] and [`PullChannelId`], so that sending on a pull channel
//! (or receiving from a push channel) is a compile-time error rather than a
//! runtime discipline check.
//!
//! State transitions (`open`/`close`, `mark_ready`/`mark_not_ready`) are
//! idempotent. Each actual transition notifies the channel's listeners within
//! the same scheduler instant; by default the backpressured endpoint is the
//! sole listener (the upstream node of a push channel, the downstream node of
//! a pull channel).

pub(crate) mod pull;
pub(crate) mod push;

pub(crate) use pull::PullChannelState;
pub(crate) use push::PushChannelState;

/// Handle to a push (producer-driven) channel.
///
/// Handles are arena indices issued at wiring time and are only meaningful
/// within the scenario that created them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PushChannelId(pub(crate) usize);

/// Handle to a pull (consumer-driven) channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PullChannelId(pub(crate) usize);

/// A channel availability transition, delivered to channel listeners.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelSignal {
    /// A push channel transitioned from closed to open.
    Opened(PushChannelId),
    /// A push channel transitioned from open to closed.
    Closed(PushChannelId),
    /// A pull channel transitioned from not-ready to ready.
    Ready(PullChannelId),
    /// A pull channel transitioned from ready to not-ready.
    NotReady(PullChannelId),
}
