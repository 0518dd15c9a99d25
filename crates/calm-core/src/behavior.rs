use crate::config::BehaviorConfig;
use crate::window::TrailingWindow;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollEvent {
    pub timestamp_ms: u64,
    pub velocity_px_per_sec: f64,
    pub delta_px: f64,
}

/// Page state observed when monitoring starts; baselines for scroll and DOM deltas.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PageSnapshot {
    pub scroll_y: f64,
    pub document_height: f64,
}

/// Scroll velocity and DOM churn over trailing windows, plus session time.
///
/// Only `on_scroll` and `poll_dom` mutate; every other method is a pure read.
pub struct BehaviorTracker {
    config: BehaviorConfig,
    started_ms: Option<u64>,
    last_scroll: Option<(u64, f64)>,
    last_height: Option<f64>,
    scrolls: TrailingWindow<ScrollEvent>,
    dom_changes: TrailingWindow<()>,
}

impl BehaviorTracker {
    pub fn new(config: BehaviorConfig) -> Self {
        let scrolls = TrailingWindow::new(config.scroll_window_ms);
        let dom_changes = TrailingWindow::new(config.dom_change_window_ms);
        Self {
            config,
            started_ms: None,
            last_scroll: None,
            last_height: None,
            scrolls,
            dom_changes,
        }
    }

    pub fn start(&mut self, now_ms: u64, page: PageSnapshot) {
        self.reset();
        self.started_ms = Some(now_ms);
        self.last_scroll = Some((now_ms, page.scroll_y));
        self.last_height = Some(page.document_height);
    }

    /// Records a scroll notification at absolute position `scroll_y`.
    /// The first notification without a baseline only establishes one.
    pub fn on_scroll(&mut self, now_ms: u64, scroll_y: f64) -> Option<ScrollEvent> {
        let (last_ms, last_y) = match self.last_scroll.replace((now_ms, scroll_y)) {
            Some(prev) => prev,
            None => return None,
        };
        let dt_ms = (now_ms.saturating_sub(last_ms) as f64).max(self.config.min_scroll_dt_ms);
        let delta_px = scroll_y - last_y;
        let event = ScrollEvent {
            timestamp_ms: now_ms,
            velocity_px_per_sec: delta_px.abs() / dt_ms * 1000.0,
            delta_px,
        };
        self.scrolls.push(now_ms, event);
        self.scrolls.evict(now_ms);
        log::trace!(
            "[behavior] scroll {:.0}px at {:.0}px/s",
            delta_px,
            event.velocity_px_per_sec
        );
        Some(event)
    }

    /// Compares the document height with the last poll; returns whether it changed.
    pub fn poll_dom(&mut self, now_ms: u64, document_height: f64) -> bool {
        let changed = matches!(self.last_height, Some(h) if h != document_height);
        self.last_height = Some(document_height);
        if changed {
            self.dom_changes.push(now_ms, ());
        }
        self.dom_changes.evict(now_ms);
        changed
    }

    pub fn fast_scroll_count(&self, now_ms: u64) -> usize {
        let threshold = self.config.fast_scroll_px_per_sec;
        self.scrolls
            .iter_within(now_ms)
            .filter(|e| e.velocity_px_per_sec > threshold)
            .count()
    }

    pub fn scroll_event_count(&self, now_ms: u64) -> usize {
        self.scrolls.count_within(now_ms)
    }

    pub fn dom_change_count(&self, now_ms: u64) -> usize {
        self.dom_changes.count_within(now_ms)
    }

    pub fn elapsed_secs(&self, now_ms: u64) -> f64 {
        self.started_ms
            .map(|s| now_ms.saturating_sub(s) as f64 / 1000.0)
            .unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        self.started_ms = None;
        self.last_scroll = None;
        self.last_height = None;
        self.scrolls.clear();
        self.dom_changes.clear();
    }
}
