//! Token-bounded subnetworks.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::channel::{ChannelSignal, PushChannelId};
use crate::node::{Node, NodeId};
use crate::policy::{QueuePolicy, TokenPool};
use crate::simulation::SimContext;

/// Admits items only while the shared token pool is non-empty, withdrawing
/// one token per admitted item.
///
/// Paired with a [`TokenRelease`] holding the same pool, the gate bounds the
/// number of items between the two nodes: think berths along a quay, or
/// trucks allowed inside a terminal. Items arriving while the pool is empty
/// are held in arrival order; a returned token is usable by a held item
/// within the same instant.
pub struct TokenGate<T> {
    label: String,
    pool: Rc<RefCell<TokenPool>>,
    inputs: Vec<PushChannelId>,
    output: Option<PushChannelId>,
    backlog: VecDeque<T>,
}

impl<T: 'static> TokenGate<T> {
    pub fn new(label: impl Into<String>, pool: Rc<RefCell<TokenPool>>) -> Self {
        Self {
            label: label.into(),
            pool,
            inputs: Vec::new(),
            output: None,
            backlog: VecDeque::new(),
        }
    }

    fn tokens(&self) -> usize {
        self.pool.borrow().occupancy()
    }

    fn pump(&mut self, ctx: &mut SimContext<T>) {
        let Some(output) = self.output else {
            return;
        };
        while self.tokens() > 0 && ctx.is_open(output) {
            let Some(item) = self.backlog.pop_front() else {
                break;
            };
            self.pool.borrow_mut().dequeue();
            ctx.send(output, item);
        }
        self.update_inputs(ctx);
    }

    fn update_inputs(&mut self, ctx: &mut SimContext<T>) {
        let admitting = self.tokens() > 0
            && self.output.map_or(false, |output| ctx.is_open(output));
        for &input in &self.inputs {
            if admitting {
                ctx.open(input);
            } else {
                ctx.close(input);
            }
        }
    }
}

impl<T: 'static> Node<T> for TokenGate<T> {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_start(&mut self, ctx: &mut SimContext<T>) {
        self.inputs = ctx.incoming_push();
        let outputs = ctx.outgoing_push();
        if outputs.len() != 1 {
            panic!(
                "gate '{}' requires exactly one output channel, found {}",
                self.label,
                outputs.len()
            );
        }
        self.output = Some(outputs[0]);
        self.update_inputs(ctx);
    }

    fn on_arrive(&mut self, _channel: PushChannelId, item: T, ctx: &mut SimContext<T>) {
        self.backlog.push_back(item);
        self.pump(ctx);
    }

    fn on_signal(&mut self, signal: ChannelSignal, ctx: &mut SimContext<T>) {
        match signal {
            ChannelSignal::Opened(channel) if Some(channel) == self.output => self.pump(ctx),
            ChannelSignal::Closed(channel) if Some(channel) == self.output => {
                self.update_inputs(ctx)
            }
            _ => {}
        }
    }

    // The release wakes the gate when it returns a token.
    fn on_activate(&mut self, ctx: &mut SimContext<T>) {
        self.pump(ctx);
    }

    fn report(&self) -> Vec<(String, f64)> {
        vec![
            ("tokens".into(), self.tokens() as f64),
            ("held".into(), self.backlog.len() as f64),
        ]
    }
}

/// Returns one token to the shared pool per passing item and wakes the gate
/// so a held item can use it within the same instant.
pub struct TokenRelease<T> {
    label: String,
    pool: Rc<RefCell<TokenPool>>,
    gate: NodeId,
    output: Option<PushChannelId>,
    backlog: VecDeque<T>,
}

impl<T: 'static> TokenRelease<T> {
    /// Creates a release node returning tokens to `pool` and re-arming the
    /// gate node at `gate`.
    pub fn new(label: impl Into<String>, pool: Rc<RefCell<TokenPool>>, gate: NodeId) -> Self {
        Self {
            label: label.into(),
            pool,
            gate,
            output: None,
            backlog: VecDeque::new(),
        }
    }

    fn flush(&mut self, ctx: &mut SimContext<T>) {
        let Some(output) = self.output else {
            return;
        };
        while ctx.is_open(output) {
            let Some(item) = self.backlog.pop_front() else {
                break;
            };
            ctx.send(output, item);
        }
    }
}

impl<T: 'static> Node<T> for TokenRelease<T> {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_start(&mut self, ctx: &mut SimContext<T>) {
        let outputs = ctx.outgoing_push();
        if outputs.len() != 1 {
            panic!(
                "release '{}' requires exactly one output channel, found {}",
                self.label,
                outputs.len()
            );
        }
        self.output = Some(outputs[0]);
    }

    fn on_arrive(&mut self, _channel: PushChannelId, item: T, ctx: &mut SimContext<T>) {
        self.pool.borrow_mut().enqueue(());
        ctx.activate(self.gate);
        self.backlog.push_back(item);
        self.flush(ctx);
    }

    fn on_signal(&mut self, signal: ChannelSignal, ctx: &mut SimContext<T>) {
        if let ChannelSignal::Opened(channel) = signal {
            if Some(channel) == self.output {
                self.flush(ctx);
            }
        }
    }
}
