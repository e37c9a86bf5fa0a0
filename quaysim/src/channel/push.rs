//! Push (producer-driven) channel state.

use crate::node::NodeId;

/// Arena-resident state of a push channel.
///
/// The upstream endpoint is bound exactly once, after creation; binding it a
/// second time is a construction error and panics immediately.
pub(crate) struct PushChannelState {
    pub(crate) label: String,
    pub(crate) upstream: Option<NodeId>,
    pub(crate) downstream: NodeId,
    pub(crate) open: bool,
    /// Nodes notified on open/close transitions. The upstream node is
    /// auto-registered when bound; it is the endpoint that reacts to
    /// backpressure.
    pub(crate) listeners: Vec<NodeId>,
}

impl PushChannelState {
    pub(crate) fn new(label: String, downstream: NodeId) -> Self {
        Self {
            label,
            upstream: None,
            downstream,
            open: true,
            listeners: Vec::new(),
        }
    }

    /// Binds the upstream endpoint and registers it as a listener.
    pub(crate) fn bind_upstream(&mut self, node: NodeId) {
        if self.upstream.is_some() {
            panic!(
                "push channel '{}' already has an upstream node bound",
                self.label
            );
        }
        self.upstream = Some(node);
        self.listeners.push(node);
    }

    /// Sets the open flag, returning `true` if this was an actual transition.
    pub(crate) fn set_open(&mut self, open: bool) -> bool {
        let was = std::mem::replace(&mut self.open, open);
        was != open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_channel_initially_open() {
        let state = PushChannelState::new("berth feed".into(), NodeId(1));
        assert!(state.open);
        assert!(state.upstream.is_none());
    }

    #[test]
    fn push_channel_transitions_are_idempotent() {
        let mut state = PushChannelState::new("berth feed".into(), NodeId(1));
        assert!(state.set_open(false));
        assert!(!state.set_open(false));
        assert!(state.set_open(true));
        assert!(!state.set_open(true));
    }

    #[test]
    #[should_panic(expected = "already has an upstream node bound")]
    fn push_channel_rejects_double_binding() {
        let mut state = PushChannelState::new("berth feed".into(), NodeId(1));
        state.bind_upstream(NodeId(0));
        state.bind_upstream(NodeId(2));
    }
}
