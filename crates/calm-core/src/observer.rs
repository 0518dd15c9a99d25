use crate::registry::SourceId;
use crate::score::ScoreUpdate;

#[derive(Clone, Debug, PartialEq)]
pub enum MonitorEvent {
    ScoreUpdated(ScoreUpdate),
    SourceAttached(SourceId),
    SourceDetached(SourceId),
    BreatheStarted { ends_at_ms: u64 },
    BreatheEnded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback = Box<dyn FnMut(&MonitorEvent)>;

/// Registered observers, notified synchronously in registration order.
///
/// Callbacks run while the monitor is mutably borrowed and must not call
/// back into it.
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    callbacks: Vec<(ObserverId, Callback)>,
}

impl Observers {
    pub fn subscribe(&mut self, callback: impl FnMut(&MonitorEvent) + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cid, _)| *cid != id);
        self.callbacks.len() != before
    }

    pub fn emit(&mut self, event: &MonitorEvent) {
        for (_, cb) in self.callbacks.iter_mut() {
            cb(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }
}
