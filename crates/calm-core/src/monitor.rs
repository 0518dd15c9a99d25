//! One monitored page: owns every component and exposes the control surface
//! plus one entry point per periodic activity.
//!
//! Hosts drive it from independent timers (frame sampling, DOM polling, score
//! recomputation, animation frames). Every entry point is a no-op while
//! stopped, and none of them return errors: failures inside a tick are logged
//! and absorbed so the next tick runs normally.

use crate::backend::ReferenceDistance;
use crate::behavior::{BehaviorTracker, PageSnapshot};
use crate::config::{CalmConfig, Settings};
use crate::effects::{EffectController, EffectState, EffectTick};
use crate::error::ConfigError;
use crate::frame::{FrameSample, FrameSignalExtractor, FrameStats, PendingComparison, VisualSource};
use crate::observer::{MonitorEvent, ObserverId, Observers};
use crate::registry::SourceId;
use crate::score::{ScoreAggregator, ScoreUpdate, SignalSnapshot, SubScores};
use fnv::FnvHashMap;

/// Snapshot surfaced to UI collaborators.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorState {
    pub score: f32,
    pub platform_label: String,
    pub active_time_secs: f64,
    pub video_count: usize,
    pub sensitivity: f32,
    pub enabled: bool,
    pub running: bool,
    pub breathing: bool,
    pub sub_scores: SubScores,
}

pub struct Monitor {
    config: CalmConfig,
    settings: Settings,
    running: bool,
    generation: u64,
    platform_label: String,
    extractors: FnvHashMap<SourceId, FrameSignalExtractor>,
    behavior: BehaviorTracker,
    aggregator: ScoreAggregator,
    effects: EffectController,
    reference: ReferenceDistance,
    observers: Observers,
    last_video_count: usize,
    last_sub_scores: SubScores,
}

impl Monitor {
    pub fn new(config: CalmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let settings = Settings::default();
        Ok(Self {
            behavior: BehaviorTracker::new(config.behavior.clone()),
            aggregator: ScoreAggregator::new(config.score.clone(), settings.sensitivity),
            effects: EffectController::new(config.effects.clone()),
            config,
            settings,
            running: false,
            generation: 0,
            platform_label: String::new(),
            extractors: FnvHashMap::default(),
            reference: ReferenceDistance,
            observers: Observers::default(),
            last_video_count: 0,
            last_sub_scores: SubScores::default(),
        })
    }

    pub fn config(&self) -> &CalmConfig {
        &self.config
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Bumped on every start and stop; results computed for an older
    /// generation are discarded.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn effects(&self) -> &EffectController {
        &self.effects
    }

    pub fn score_history(&self) -> impl Iterator<Item = &ScoreUpdate> {
        self.aggregator.history()
    }

    // ---------------- Control surface ----------------

    pub fn start(
        &mut self,
        now_ms: u64,
        settings: Settings,
        platform_label: impl Into<String>,
        page: PageSnapshot,
    ) {
        if self.running {
            log::warn!("[monitor] start ignored, already running");
            return;
        }
        self.running = true;
        self.generation += 1;
        self.platform_label = platform_label.into();
        self.settings.enabled = settings.enabled;
        self.set_sensitivity(settings.sensitivity);
        self.behavior.start(now_ms, page);
        self.aggregator.reset();
        self.effects.reset();
        log::info!(
            "[monitor] started on {:?} (enabled={}, sensitivity={:.2})",
            self.platform_label,
            self.settings.enabled,
            self.settings.sensitivity
        );
    }

    /// Halts everything synchronously. Sources are detached and all state is
    /// cleared; late results from the stopped generation are dropped.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        let mut ids: Vec<SourceId> = self.extractors.keys().copied().collect();
        ids.sort();
        for id in ids {
            self.detach_source(id);
        }
        self.running = false;
        self.generation += 1;
        self.end_breathe_early();
        self.behavior.reset();
        self.aggregator.reset();
        self.effects.reset();
        self.last_video_count = 0;
        self.last_sub_scores = SubScores::default();
        log::info!("[monitor] stopped");
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.aggregator.set_sensitivity(sensitivity);
        self.settings.sensitivity = self.aggregator.state().sensitivity;
    }

    /// Disabling resets the score and eases every effect back to neutral.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.settings.enabled == enabled {
            return;
        }
        self.settings.enabled = enabled;
        if !enabled {
            self.end_breathe_early();
            self.aggregator.reset();
            self.effects.set_neutral();
            self.last_sub_scores = SubScores::default();
            for extractor in self.extractors.values_mut() {
                extractor.reset();
            }
        }
        log::info!("[monitor] enabled={}", enabled);
    }

    /// Returns `false` when not running, disabled, or already breathing.
    pub fn trigger_breathe(&mut self, now_ms: u64) -> bool {
        if !self.running || !self.settings.enabled {
            return false;
        }
        if self.effects.expire_breathe(now_ms) {
            self.observers.emit(&MonitorEvent::BreatheEnded);
        }
        if !self.effects.trigger_breathe(now_ms) {
            return false;
        }
        let ends_at_ms = now_ms.saturating_add(self.config.effects.breathe_duration_ms);
        self.observers
            .emit(&MonitorEvent::BreatheStarted { ends_at_ms });
        true
    }

    // Observers that saw BreatheStarted always get the matching end.
    fn end_breathe_early(&mut self) {
        if self.effects.is_breathing() {
            self.effects.set_neutral();
            self.observers.emit(&MonitorEvent::BreatheEnded);
        }
    }

    pub fn state(&self, now_ms: u64) -> MonitorState {
        MonitorState {
            score: self.aggregator.score(),
            platform_label: self.platform_label.clone(),
            active_time_secs: self.behavior.elapsed_secs(now_ms),
            video_count: self.last_video_count,
            sensitivity: self.settings.sensitivity,
            enabled: self.settings.enabled,
            running: self.running,
            breathing: self.effects.is_breathing(),
            sub_scores: self.last_sub_scores,
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&MonitorEvent) + 'static) -> ObserverId {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ---------------- Sources ----------------

    pub fn attach_source(&mut self, id: SourceId) -> bool {
        if !self.running || self.extractors.contains_key(&id) {
            return false;
        }
        self.extractors
            .insert(id, FrameSignalExtractor::new(self.config.frame.clone()));
        log::info!("[monitor] attached {}", id);
        self.observers.emit(&MonitorEvent::SourceAttached(id));
        true
    }

    pub fn detach_source(&mut self, id: SourceId) -> bool {
        if self.extractors.remove(&id).is_none() {
            return false;
        }
        log::info!("[monitor] detached {}", id);
        self.observers.emit(&MonitorEvent::SourceDetached(id));
        true
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self.extractors.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn frame_stats(&self, id: SourceId, now_ms: u64) -> Option<FrameStats> {
        self.extractors.get(&id).map(|e| e.stats(now_ms))
    }

    // ---------------- Periodic entry points ----------------

    /// Captures a frame and returns the comparison whose distance should be
    /// committed with [`Self::record_comparison`] under the current generation.
    pub fn frame_tick(
        &mut self,
        id: SourceId,
        source: &mut dyn VisualSource,
        now_ms: u64,
    ) -> Option<PendingComparison> {
        if !self.running || !self.settings.enabled {
            return None;
        }
        self.extractors
            .get_mut(&id)?
            .capture(source, now_ms)
            .and_then(|c| c.comparison)
    }

    /// Commits a cut decision computed elsewhere (possibly asynchronously).
    /// Returns whether it was accepted and counted as a cut.
    pub fn record_comparison(
        &mut self,
        generation: u64,
        id: SourceId,
        timestamp_ms: u64,
        distance: f32,
    ) -> bool {
        if !self.running || generation != self.generation || !self.settings.enabled {
            log::debug!("[monitor] dropping stale comparison for {}", id);
            return false;
        }
        match self.extractors.get_mut(&id) {
            Some(e) => e.record_comparison(timestamp_ms, distance),
            None => false,
        }
    }

    /// Capture and decide synchronously with the reference distance.
    pub fn sample_source(
        &mut self,
        id: SourceId,
        source: &mut dyn VisualSource,
        now_ms: u64,
    ) -> Option<FrameSample> {
        if !self.running || !self.settings.enabled {
            return None;
        }
        let reference = self.reference;
        self.extractors
            .get_mut(&id)?
            .sample(source, now_ms, &reference)
    }

    pub fn scroll(&mut self, now_ms: u64, scroll_y: f64) {
        if self.running {
            self.behavior.on_scroll(now_ms, scroll_y);
        }
    }

    pub fn dom_poll(&mut self, now_ms: u64, document_height: f64) {
        if self.running {
            self.behavior.poll_dom(now_ms, document_height);
        }
    }

    /// Signals as the aggregator would see them now. The dominant source
    /// (highest cut rate and motion) drives the frame terms.
    pub fn signals(&self, now_ms: u64, active_video_count: usize) -> SignalSnapshot {
        let (cut_rate, avg_motion) = self
            .extractors
            .values()
            .map(|e| e.stats(now_ms))
            .fold((0.0f32, 0.0f32), |(c, m), s| {
                (c.max(s.cut_rate), m.max(s.avg_motion))
            });
        SignalSnapshot {
            cut_rate,
            avg_motion,
            fast_scroll_count: self.behavior.fast_scroll_count(now_ms),
            elapsed_secs: self.behavior.elapsed_secs(now_ms),
            dom_change_count: self.behavior.dom_change_count(now_ms),
            active_video_count,
        }
    }

    pub fn score_tick(&mut self, now_ms: u64, active_video_count: usize) -> Option<ScoreUpdate> {
        if !self.running {
            return None;
        }
        self.last_video_count = active_video_count;
        if !self.settings.enabled {
            return None;
        }
        let signals = self.signals(now_ms, active_video_count);
        let update = self.aggregator.update(now_ms, &signals);
        self.last_sub_scores = update.sub_scores;
        if self.effects.expire_breathe(now_ms) {
            self.observers.emit(&MonitorEvent::BreatheEnded);
        }
        self.effects.apply_score(update.score, now_ms);
        self.observers.emit(&MonitorEvent::ScoreUpdated(update));
        Some(update)
    }

    pub fn animation_tick(&mut self, now_ms: u64) -> Option<EffectTick> {
        if !self.running {
            return None;
        }
        let tick = self.effects.tick(now_ms);
        if tick.breathe_ended {
            self.observers.emit(&MonitorEvent::BreatheEnded);
        }
        Some(tick)
    }

    /// Whether the animation loop has anything left to do.
    pub fn needs_animation(&self) -> bool {
        self.running && (self.effects.is_converging() || self.effects.is_breathing())
    }

    pub fn current_effects(&self) -> EffectState {
        self.effects.current()
    }
}
