//! Item absorption and completion metrics.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::channel::PushChannelId;
use crate::metrics::InstantaneousMetric;
use crate::node::Node;
use crate::simulation::SimContext;
use crate::time::MonotonicTime;

/// Shared handle to a sink's completion count.
#[derive(Clone, Default)]
pub struct Counter(Rc<Cell<u64>>);

impl Counter {
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    fn increment(&self) {
        self.0.set(self.0.get() + 1);
    }
}

/// Absorbs items, counting them and optionally firing a sample per item.
///
/// The sample closure typically computes a sojourn time from a creation
/// timestamp carried by the item; the fired samples feed an
/// [`InstantaneousMetric`] registered on the scenario.
pub struct SinkNode<T> {
    label: String,
    count: Counter,
    sample: Option<SampleTap<T>>,
}

struct SampleTap<T> {
    metric: Rc<RefCell<InstantaneousMetric>>,
    value: Box<dyn FnMut(MonotonicTime, &T) -> f64>,
}

impl<T: 'static> SinkNode<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            count: Counter::default(),
            sample: None,
        }
    }

    /// Fires one sample per absorbed item into the given metric.
    pub fn with_samples(
        mut self,
        metric: Rc<RefCell<InstantaneousMetric>>,
        value: impl FnMut(MonotonicTime, &T) -> f64 + 'static,
    ) -> Self {
        self.sample = Some(SampleTap {
            metric,
            value: Box::new(value),
        });
        self
    }

    /// A handle to the completion count, valid after the sink has been
    /// handed to the scenario.
    pub fn counter(&self) -> Counter {
        self.count.clone()
    }
}

impl<T: 'static> Node<T> for SinkNode<T> {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_arrive(&mut self, _channel: PushChannelId, item: T, ctx: &mut SimContext<T>) {
        self.count.increment();
        if let Some(tap) = &mut self.sample {
            let now = ctx.time();
            let value = (tap.value)(now, &item);
            tap.metric.borrow_mut().fire(now, value);
        }
    }

    fn report(&self) -> Vec<(String, f64)> {
        vec![("absorbed".into(), self.count.get() as f64)]
    }
}
