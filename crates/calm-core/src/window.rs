use std::collections::VecDeque;

/// Time-ordered queue of events that only counts entries inside a trailing
/// window. An event at `t` is inside the window at `now` iff `now - t <= window`.
///
/// Mutation (`push`, `evict`) happens on the intake path; the `*_within`
/// readers are pure so getters stay side-effect free.
#[derive(Clone, Debug)]
pub struct TrailingWindow<T> {
    window_ms: u64,
    events: VecDeque<(u64, T)>,
}

impl<T> TrailingWindow<T> {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            events: VecDeque::new(),
        }
    }

    #[inline]
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    #[inline]
    fn is_live(&self, timestamp_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(timestamp_ms) <= self.window_ms
    }

    /// Inserts keeping timestamp order; late arrivals are placed where they belong.
    pub fn push(&mut self, timestamp_ms: u64, value: T) {
        match self.events.back() {
            Some((last, _)) if *last > timestamp_ms => {
                let idx = self.events.partition_point(|(t, _)| *t <= timestamp_ms);
                self.events.insert(idx, (timestamp_ms, value));
            }
            _ => self.events.push_back((timestamp_ms, value)),
        }
    }

    /// Drops events that have left the window.
    pub fn evict(&mut self, now_ms: u64) {
        while let Some((t, _)) = self.events.front() {
            if self.is_live(*t, now_ms) {
                break;
            }
            self.events.pop_front();
        }
    }

    pub fn iter_within(&self, now_ms: u64) -> impl Iterator<Item = &T> + '_ {
        self.events
            .iter()
            .filter(move |(t, _)| *t <= now_ms && self.is_live(*t, now_ms))
            .map(|(_, v)| v)
    }

    pub fn count_within(&self, now_ms: u64) -> usize {
        self.iter_within(now_ms).count()
    }

    /// Number of retained events, including any not yet evicted.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_inclusive() {
        let mut w = TrailingWindow::new(3_000);
        w.push(0, ());
        assert_eq!(w.count_within(2_999), 1);
        assert_eq!(w.count_within(3_000), 1);
        assert_eq!(w.count_within(3_001), 0);
    }

    #[test]
    fn evict_only_drops_expired() {
        let mut w = TrailingWindow::new(100);
        w.push(10, 'a');
        w.push(50, 'b');
        w.push(120, 'c');
        w.evict(140);
        assert_eq!(w.len(), 2);
        assert_eq!(w.iter_within(140).copied().collect::<Vec<_>>(), vec!['b', 'c']);
    }

    #[test]
    fn late_push_keeps_order() {
        let mut w = TrailingWindow::new(1_000);
        w.push(100, 1);
        w.push(300, 3);
        w.push(200, 2);
        assert_eq!(w.iter_within(300).copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
