//! Pull (consumer-driven) channel state.

use crate::node::NodeId;

/// Arena-resident state of a pull channel.
///
/// The downstream (consuming) endpoint is fixed at creation and
/// auto-registered as a listener: it is the endpoint that reacts to
/// readiness transitions. The upstream (supplying) endpoint is bound exactly
/// once.
pub(crate) struct PullChannelState {
    pub(crate) label: String,
    pub(crate) upstream: Option<NodeId>,
    pub(crate) downstream: NodeId,
    pub(crate) ready: bool,
    pub(crate) listeners: Vec<NodeId>,
}

impl PullChannelState {
    pub(crate) fn new(label: String, downstream: NodeId) -> Self {
        Self {
            label,
            upstream: None,
            downstream,
            ready: false,
            listeners: vec![downstream],
        }
    }

    /// Binds the upstream (supplying) endpoint.
    pub(crate) fn bind_upstream(&mut self, node: NodeId) {
        if self.upstream.is_some() {
            panic!(
                "pull channel '{}' already has an upstream node bound",
                self.label
            );
        }
        self.upstream = Some(node);
    }

    /// Sets the ready flag, returning `true` if this was an actual transition.
    pub(crate) fn set_ready(&mut self, ready: bool) -> bool {
        let was = std::mem::replace(&mut self.ready, ready);
        was != ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_channel_initially_not_ready() {
        let state = PullChannelState::new("yard buffer".into(), NodeId(1));
        assert!(!state.ready);
        assert_eq!(state.listeners, vec![NodeId(1)]);
    }

    #[test]
    fn pull_channel_transitions_are_idempotent() {
        let mut state = PullChannelState::new("yard buffer".into(), NodeId(1));
        assert!(state.set_ready(true));
        assert!(!state.set_ready(true));
        assert!(state.set_ready(false));
        assert!(!state.set_ready(false));
    }

    #[test]
    #[should_panic(expected = "already has an upstream node bound")]
    fn pull_channel_rejects_double_binding() {
        let mut state = PullChannelState::new("yard buffer".into(), NodeId(1));
        state.bind_upstream(NodeId(0));
        state.bind_upstream(NodeId(2));
    }
}
