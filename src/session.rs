use crate::audio::{self, AudioPipeline, SourceNodes};
use crate::bridge;
use crate::capture::VideoCapture;
use crate::constants::SCROLL_EVENT;
use crate::contract;
use crate::dom;
use crate::events::Listener;
use crate::frame::AnimationLoop;
use crate::schedule::Interval;
use calm_core::{
    AudioContract, CalmConfig, CalmError, ConfigError, DistanceBackend, DistanceEngine,
    EffectState, Monitor, MonitorEvent, PageSnapshot, PendingComparison, Release, Settings,
    SourceId, SourceRegistry,
};
use instant::Instant;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::spawn_local;
use web_sys as web;

/// Everything attached to one monitored video element.
struct VideoBinding {
    capture: VideoCapture,
    audio: Option<AudioPipeline>,
    audio_tried: bool,
    base_rate: f64,
    applied_rate: f64,
    applied_filter: String,
}

impl VideoBinding {
    fn new(capture: VideoCapture) -> Self {
        let base_rate = capture.video().playback_rate();
        Self {
            capture,
            audio: None,
            audio_tried: false,
            base_rate,
            applied_rate: base_rate,
            applied_filter: String::new(),
        }
    }

    fn apply(&mut self, state: &EffectState, filter: &str) {
        let video = self.capture.video();
        if self.applied_filter != filter {
            _ = video.style().set_property("filter", filter);
            self.applied_filter = filter.to_string();
        }
        let rate = contract::scaled_playback_rate(self.base_rate, state.playback_rate);
        if contract::needs_rate_update(self.applied_rate, rate) {
            video.set_playback_rate(rate);
            self.applied_rate = rate;
        }
        if let Some(a) = self.audio.as_mut() {
            a.apply(state.audio_intensity);
        }
    }
}

impl Release for VideoBinding {
    fn release(&mut self) -> Result<(), CalmError> {
        let video = self.capture.video();
        _ = video.style().remove_property("filter");
        video.set_playback_rate(self.base_rate);
        dom::untag_source(video);
        match self.audio.as_mut() {
            Some(a) => a.release(),
            None => Ok(()),
        }
    }
}

// Handles that keep the periodic activities alive; dropping them halts
// every timer, listener and pending animation frame.
struct Running {
    _timers: Vec<Interval>,
    _scroll: Listener,
    animation: AnimationLoop,
}

struct Shared {
    monitor: RefCell<Monitor>,
    bindings: RefCell<SourceRegistry<VideoBinding>>,
    engine: Rc<DistanceEngine>,
    events: Rc<RefCell<Vec<MonitorEvent>>>,
    callbacks: RefCell<Vec<js_sys::Function>>,
    epoch: Instant,
    next_source: Cell<u32>,
    audio_ctx: RefCell<Option<web::AudioContext>>,
    source_nodes: RefCell<SourceNodes>,
    running: RefCell<Option<Running>>,
}

/// Browser wiring around one [`Monitor`].
pub struct Session {
    shared: Rc<Shared>,
}

impl Session {
    pub fn new(
        config: CalmConfig,
        backend: Option<Box<dyn DistanceBackend>>,
    ) -> Result<Self, ConfigError> {
        let mut monitor = Monitor::new(config)?;
        // Observers only queue; JS callbacks run once the monitor is released
        let events: Rc<RefCell<Vec<MonitorEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let queue = events.clone();
        monitor.subscribe(move |e| queue.borrow_mut().push(e.clone()));
        let engine = DistanceEngine::with_backend(backend);
        log::info!(
            "[backend] decisions via {}",
            bridge::backend_label(engine.active_kind())
        );
        Ok(Self {
            shared: Rc::new(Shared {
                monitor: RefCell::new(monitor),
                bindings: RefCell::new(SourceRegistry::new()),
                engine: Rc::new(engine),
                events,
                callbacks: RefCell::new(Vec::new()),
                epoch: Instant::now(),
                next_source: Cell::new(1),
                audio_ctx: RefCell::new(None),
                source_nodes: RefCell::new(SourceNodes::default()),
                running: RefCell::new(None),
            }),
        })
    }

    pub fn start(&self, settings: Settings, platform_label: &str) -> anyhow::Result<()> {
        let shared = &self.shared;
        if shared.running.borrow().is_some() {
            log::warn!("[monitor] start ignored, already running");
            return Ok(());
        }
        let window = web::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| anyhow::anyhow!("no document"))?;
        let page = PageSnapshot {
            scroll_y: dom::scroll_y(),
            document_height: dom::document_height(&document),
        };
        let config = shared.monitor.borrow().config().clone();

        let weak = Rc::downgrade(shared);
        let frame_timer = Interval::new(config.frame.sample_interval_ms as u64, {
            let weak = weak.clone();
            move || with_shared(&weak, Shared::frame_tick)
        })?;
        let dom_timer = Interval::new(config.behavior.dom_poll_interval_ms as u64, {
            let weak = weak.clone();
            move || with_shared(&weak, Shared::dom_tick)
        })?;
        let score_timer = Interval::new(config.score.interval_ms as u64, {
            let weak = weak.clone();
            move || with_shared(&weak, Shared::score_tick)
        })?;
        let scroll = Listener::new(window.as_ref(), SCROLL_EVENT, {
            let weak = weak.clone();
            move |_e: web::Event| with_shared(&weak, Shared::scroll_tick)
        })?;
        let animation = AnimationLoop::new(move || {
            weak.upgrade()
                .map(|s| s.animation_frame())
                .unwrap_or(false)
        });

        let now = shared.now_ms();
        shared
            .monitor
            .borrow_mut()
            .start(now, settings, platform_label, page);
        *shared.running.borrow_mut() = Some(Running {
            _timers: vec![frame_timer, dom_timer, score_timer],
            _scroll: scroll,
            animation,
        });
        shared.sync_sources(now);
        shared.flush_events();
        Ok(())
    }

    /// Synchronous halt: no timer, listener or animation frame fires after
    /// this returns, and in-flight distance results are discarded.
    pub fn stop(&self) {
        let shared = &self.shared;
        let Some(running) = shared.running.borrow_mut().take() else {
            return;
        };
        drop(running);
        shared.monitor.borrow_mut().stop();
        shared.bindings.borrow_mut().release_all();
        shared.flush_events();
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.borrow().is_some()
    }

    pub fn set_sensitivity(&self, sensitivity: f32) {
        self.shared.monitor.borrow_mut().set_sensitivity(sensitivity);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.shared.monitor.borrow_mut().set_enabled(enabled);
        self.shared.wake_animation();
    }

    pub fn trigger_breathe(&self) -> bool {
        let now = self.shared.now_ms();
        let started = self.shared.monitor.borrow_mut().trigger_breathe(now);
        if started {
            self.shared.wake_animation();
        }
        self.shared.flush_events();
        started
    }

    pub fn state(&self) -> js_sys::Object {
        let now = self.shared.now_ms();
        let state = self.shared.monitor.borrow().state(now);
        bridge::state_object(&state, self.shared.engine.active_kind())
    }

    pub fn on_event(&self, callback: js_sys::Function) {
        self.shared.callbacks.borrow_mut().push(callback);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

fn with_shared(weak: &Weak<Shared>, f: impl FnOnce(&Rc<Shared>)) {
    if let Some(shared) = weak.upgrade() {
        f(&shared);
    }
}

impl Shared {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn wake_animation(&self) {
        if let Some(r) = self.running.borrow().as_ref() {
            r.animation.wake();
        }
    }

    fn frame_tick(self: &Rc<Self>) {
        let now = self.now_ms();
        self.sync_sources(now);
        let accelerated = self.engine.is_accelerated();
        let mut comparisons: Vec<(SourceId, PendingComparison)> = Vec::new();
        let generation = {
            let mut monitor = self.monitor.borrow_mut();
            let mut bindings = self.bindings.borrow_mut();
            for (id, binding) in bindings.iter_mut() {
                if accelerated {
                    if let Some(c) = monitor.frame_tick(id, &mut binding.capture, now) {
                        comparisons.push((id, c));
                    }
                } else {
                    monitor.sample_source(id, &mut binding.capture, now);
                }
            }
            monitor.generation()
        };
        for (id, comparison) in comparisons {
            self.decide(generation, id, comparison);
        }
        self.route_audio(now);
        self.flush_events();
    }

    // Awaits the accelerated distance, then commits under the generation the
    // frame was captured in.
    fn decide(self: &Rc<Self>, generation: u64, id: SourceId, comparison: PendingComparison) {
        let weak = Rc::downgrade(self);
        let engine = self.engine.clone();
        spawn_local(async move {
            let distance = match engine
                .compute(&comparison.previous, &comparison.current)
                .await
            {
                Ok(d) => d,
                Err(e) => {
                    log::error!("[frame] {} comparison failed: {}", id, e);
                    return;
                }
            };
            if let Some(shared) = weak.upgrade() {
                shared.monitor.borrow_mut().record_comparison(
                    generation,
                    id,
                    comparison.timestamp_ms,
                    distance,
                );
            }
        });
    }

    /// Attaches newly playing videos and detaches those removed from the page.
    fn sync_sources(&self, now: u64) {
        if self.running.borrow().is_none() {
            return;
        }
        let Some(document) = dom::window_document() else {
            return;
        };
        let mut monitor = self.monitor.borrow_mut();
        let mut bindings = self.bindings.borrow_mut();

        let gone: Vec<SourceId> = bindings
            .ids()
            .filter(|id| {
                bindings
                    .get(*id)
                    .map(|b| !b.capture.video().is_connected())
                    .unwrap_or(true)
            })
            .collect();
        for id in gone {
            monitor.detach_source(id);
            bindings.detach(id);
        }
        let mut nodes = self.source_nodes.borrow_mut();
        let pruned = nodes.prune_disconnected();
        if pruned > 0 {
            log::debug!(
                "[audio] dropped {} source nodes for removed videos, {} kept",
                pruned,
                nodes.len()
            );
        }
        drop(nodes);

        for video in dom::collect_videos(&document) {
            if dom::source_id_of(&video).is_some_and(|id| bindings.contains(id)) {
                continue;
            }
            if !dom::is_playing(&video) {
                continue;
            }
            let id = SourceId(self.next_source.get());
            self.next_source.set(id.0 + 1);
            match VideoCapture::new(&document, video.clone()) {
                Ok(capture) => {
                    if monitor.attach_source(id) {
                        dom::tag_source(&video, id);
                        bindings.attach(id, VideoBinding::new(capture));
                    }
                }
                Err(e) => log::warn!("[frame] cannot capture video: {}", e),
            }
        }
        log::trace!("[frame] {} sources at {}ms", bindings.len(), now);
    }

    // Audio routing waits for a readable frame: tainted media would be
    // silenced by the audio graph.
    fn route_audio(&self, now: u64) {
        let monitor = self.monitor.borrow();
        let audio_contract = *monitor.effects().audio_contract();
        let mut bindings = self.bindings.borrow_mut();
        for (id, binding) in bindings.iter_mut() {
            if binding.audio_tried {
                continue;
            }
            let readable = monitor
                .frame_stats(id, now)
                .is_some_and(|s| s.total_frames > 0);
            if !readable {
                continue;
            }
            binding.audio_tried = true;
            binding.audio = self.build_audio(binding.capture.video(), audio_contract);
        }
    }

    fn build_audio(
        &self,
        video: &web::HtmlVideoElement,
        audio_contract: AudioContract,
    ) -> Option<AudioPipeline> {
        let mut slot = self.audio_ctx.borrow_mut();
        if slot.is_none() {
            *slot = audio::create_context();
        }
        let ctx = slot.as_ref()?;
        _ = ctx.resume();
        let media: &web::HtmlMediaElement = video.as_ref();
        let pipeline = self
            .source_nodes
            .borrow_mut()
            .get_or_create(ctx, media)
            .and_then(|source| AudioPipeline::attach(ctx, source, audio_contract));
        match pipeline {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("[audio] dampening unavailable: {}", e);
                None
            }
        }
    }

    fn dom_tick(self: &Rc<Self>) {
        let Some(document) = dom::window_document() else {
            return;
        };
        let now = self.now_ms();
        self.monitor
            .borrow_mut()
            .dom_poll(now, dom::document_height(&document));
    }

    fn scroll_tick(self: &Rc<Self>) {
        let now = self.now_ms();
        self.monitor.borrow_mut().scroll(now, dom::scroll_y());
    }

    fn score_tick(self: &Rc<Self>) {
        let now = self.now_ms();
        let active = dom::window_document()
            .map(|d| dom::count_active_videos(&d))
            .unwrap_or(0);
        let update = self.monitor.borrow_mut().score_tick(now, active);
        if let Some(u) = update {
            log::debug!("[score] {:.1} (raw {:.1})", u.score, u.raw_score);
            self.wake_animation();
        }
        self.flush_events();
    }

    /// One convergence step; returns whether another frame is needed.
    fn animation_frame(&self) -> bool {
        let now = self.now_ms();
        let tick = self.monitor.borrow_mut().animation_tick(now);
        let Some(tick) = tick else {
            return false;
        };
        let filter = contract::css_filter(&tick.state);
        for (_, binding) in self.bindings.borrow_mut().iter_mut() {
            binding.apply(&tick.state, &filter);
        }
        self.flush_events();
        self.monitor.borrow().needs_animation()
    }

    fn flush_events(&self) {
        let events = std::mem::take(&mut *self.events.borrow_mut());
        if events.is_empty() {
            return;
        }
        let callbacks = self.callbacks.borrow().clone();
        for event in &events {
            let payload: JsValue = bridge::event_object(event).into();
            for cb in &callbacks {
                if let Err(e) = cb.call1(&JsValue::NULL, &payload) {
                    log::warn!("[monitor] event callback threw: {:?}", e);
                }
            }
        }
    }
}
