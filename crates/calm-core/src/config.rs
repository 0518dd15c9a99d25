//! Immutable configuration handed to each component at construction.
//!
//! `CalmConfig::default()` reproduces the values in `constants.rs`. Tests and
//! hosts override individual fields and call [`CalmConfig::validate`] before
//! building a [`crate::Monitor`].

use crate::constants::*;
use crate::effects::EffectState;
use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq)]
pub struct FrameConfig {
    pub sample_interval_ms: u32,
    pub capture_width: u32,
    pub capture_height: u32,
    pub histogram_bins: usize,
    pub scene_cut_threshold: f32,
    pub scene_cut_window_ms: u64,
    pub motion_pixel_stride: usize,
    pub motion_history_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: FRAME_SAMPLE_INTERVAL_MS,
            capture_width: CAPTURE_WIDTH,
            capture_height: CAPTURE_HEIGHT,
            histogram_bins: HISTOGRAM_BINS,
            scene_cut_threshold: SCENE_CUT_THRESHOLD,
            scene_cut_window_ms: SCENE_CUT_WINDOW_MS,
            motion_pixel_stride: MOTION_PIXEL_STRIDE,
            motion_history_len: MOTION_HISTORY_LEN,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BehaviorConfig {
    pub scroll_window_ms: u64,
    pub fast_scroll_px_per_sec: f64,
    pub min_scroll_dt_ms: f64,
    pub dom_poll_interval_ms: u32,
    pub dom_change_window_ms: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            scroll_window_ms: SCROLL_WINDOW_MS,
            fast_scroll_px_per_sec: FAST_SCROLL_PX_PER_SEC,
            min_scroll_dt_ms: MIN_SCROLL_DT_MS,
            dom_poll_interval_ms: DOM_POLL_INTERVAL_MS,
            dom_change_window_ms: DOM_CHANGE_WINDOW_MS,
        }
    }
}

/// Relative weight of each sub-score in the raw score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreWeights {
    pub scene_cut: f32,
    pub scroll: f32,
    pub time_on_page: f32,
    pub content_change: f32,
    pub active_video: f32,
}

impl ScoreWeights {
    pub fn sum(&self) -> f32 {
        self.scene_cut + self.scroll + self.time_on_page + self.content_change + self.active_video
    }

    fn all_non_negative(&self) -> bool {
        [
            self.scene_cut,
            self.scroll,
            self.time_on_page,
            self.content_change,
            self.active_video,
        ]
        .iter()
        .all(|w| w.is_finite() && *w >= 0.0)
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            scene_cut: WEIGHT_SCENE_CUT,
            scroll: WEIGHT_SCROLL,
            time_on_page: WEIGHT_TIME_ON_PAGE,
            content_change: WEIGHT_CONTENT_CHANGE,
            active_video: WEIGHT_ACTIVE_VIDEO,
        }
    }
}

/// Signal level at which each sub-score reaches 100.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Saturations {
    /// cuts per 10s
    pub cut_rate: f32,
    pub motion: f32,
    pub fast_scroll: f32,
    pub dom_change: f32,
    pub active_video: f32,
}

impl Saturations {
    fn all_positive(&self) -> bool {
        [
            self.cut_rate,
            self.motion,
            self.fast_scroll,
            self.dom_change,
            self.active_video,
        ]
        .iter()
        .all(|v| v.is_finite() && *v > 0.0)
    }
}

impl Default for Saturations {
    fn default() -> Self {
        Self {
            cut_rate: CUT_RATE_SATURATION,
            motion: MOTION_SATURATION,
            fast_scroll: FAST_SCROLL_SATURATION,
            dom_change: DOM_CHANGE_SATURATION,
            active_video: ACTIVE_VIDEO_SATURATION,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoreConfig {
    pub interval_ms: u32,
    pub weights: ScoreWeights,
    pub saturations: Saturations,
    /// Share of the scene sub-score driven by cut rate; motion gets the rest.
    pub cut_rate_share: f32,
    /// Multiplier at sensitivity 0; sensitivity 1 adds `sensitivity_span`.
    pub sensitivity_min: f32,
    pub sensitivity_span: f32,
    pub smoothing_alpha: f32,
    pub history_len: usize,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            interval_ms: SCORE_INTERVAL_MS,
            weights: ScoreWeights::default(),
            saturations: Saturations::default(),
            cut_rate_share: CUT_RATE_SHARE,
            sensitivity_min: SENSITIVITY_MULT_MIN,
            sensitivity_span: SENSITIVITY_MULT_SPAN,
            smoothing_alpha: SMOOTHING_ALPHA,
            history_len: SCORE_HISTORY_LEN,
        }
    }
}

/// Score values at which the intensity curve changes slope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub low: f32,
    pub moderate: f32,
    pub high: f32,
    pub critical: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: THRESHOLD_LOW,
            moderate: THRESHOLD_MODERATE,
            high: THRESHOLD_HIGH,
            critical: THRESHOLD_CRITICAL,
        }
    }
}

/// Intensity reached at the moderate, high and critical thresholds.
/// Intensity is 0 at `low` and 1 at a score of 100.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntensityCurve {
    pub at_moderate: f32,
    pub at_high: f32,
    pub at_critical: f32,
}

impl Default for IntensityCurve {
    fn default() -> Self {
        Self {
            at_moderate: INTENSITY_AT_MODERATE,
            at_high: INTENSITY_AT_HIGH,
            at_critical: INTENSITY_AT_CRITICAL,
        }
    }
}

/// Audio parameters at neutral and full intensity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioContract {
    pub lowpass_max_hz: f32,
    pub lowpass_min_hz: f32,
    /// High-shelf gain at full intensity; 0 dB at neutral.
    pub highshelf_min_db: f32,
    pub gain_min: f32,
    pub ramp_sec: f64,
}

impl Default for AudioContract {
    fn default() -> Self {
        Self {
            lowpass_max_hz: AUDIO_LOWPASS_MAX_HZ,
            lowpass_min_hz: AUDIO_LOWPASS_MIN_HZ,
            highshelf_min_db: AUDIO_HIGHSHELF_MIN_DB,
            gain_min: AUDIO_GAIN_MIN,
            ramp_sec: AUDIO_RAMP_SEC,
        }
    }
}

/// Extremes each channel reaches at full intensity. Neutral values are fixed
/// (grayscale 0, saturation 1, brightness 1, blur 0, rate 1, audio 0).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectBounds {
    pub saturation_min: f32,
    pub brightness_min: f32,
    pub blur_max: f32,
    pub playback_rate_min: f32,
}

impl Default for EffectBounds {
    fn default() -> Self {
        Self {
            saturation_min: SATURATION_MIN,
            brightness_min: BRIGHTNESS_MIN,
            blur_max: BLUR_MAX_PX,
            playback_rate_min: PLAYBACK_RATE_MIN,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EffectConfig {
    pub thresholds: Thresholds,
    pub curve: IntensityCurve,
    pub bounds: EffectBounds,
    pub audio: AudioContract,
    pub convergence_rate: f32,
    pub snap_epsilon: f32,
    pub breathe_duration_ms: u64,
    pub breathe_preset: EffectState,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            curve: IntensityCurve::default(),
            bounds: EffectBounds::default(),
            audio: AudioContract::default(),
            convergence_rate: CONVERGENCE_RATE,
            snap_epsilon: SNAP_EPSILON,
            breathe_duration_ms: BREATHE_DURATION_MS,
            breathe_preset: EffectState {
                grayscale: BREATHE_GRAYSCALE,
                saturation: BREATHE_SATURATION,
                brightness: BREATHE_BRIGHTNESS,
                blur: BREATHE_BLUR_PX,
                playback_rate: BREATHE_PLAYBACK_RATE,
                audio_intensity: BREATHE_AUDIO_INTENSITY,
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalmConfig {
    pub frame: FrameConfig,
    pub behavior: BehaviorConfig,
    pub score: ScoreConfig,
    pub effects: EffectConfig,
}

fn check_range(name: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

impl CalmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.frame;
        if f.sample_interval_ms == 0 {
            return Err(ConfigError::ZeroPeriod("frame.sample_interval_ms"));
        }
        if f.capture_width == 0 || f.capture_height == 0 {
            return Err(ConfigError::ZeroPeriod("frame.capture size"));
        }
        if f.histogram_bins == 0 || f.histogram_bins > 256 {
            return Err(ConfigError::HistogramBins(f.histogram_bins));
        }
        if f.scene_cut_window_ms == 0 {
            return Err(ConfigError::ZeroPeriod("frame.scene_cut_window_ms"));
        }
        if f.motion_pixel_stride == 0 {
            return Err(ConfigError::ZeroPeriod("frame.motion_pixel_stride"));
        }
        if f.motion_history_len == 0 {
            return Err(ConfigError::ZeroPeriod("frame.motion_history_len"));
        }
        if !(f.scene_cut_threshold.is_finite() && f.scene_cut_threshold > 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "frame.scene_cut_threshold",
                value: f.scene_cut_threshold,
                min: f32::EPSILON,
                max: f32::MAX,
            });
        }

        let b = &self.behavior;
        if b.scroll_window_ms == 0 {
            return Err(ConfigError::ZeroPeriod("behavior.scroll_window_ms"));
        }
        if b.dom_change_window_ms == 0 {
            return Err(ConfigError::ZeroPeriod("behavior.dom_change_window_ms"));
        }
        if b.dom_poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPeriod("behavior.dom_poll_interval_ms"));
        }
        if !(b.min_scroll_dt_ms > 0.0) {
            return Err(ConfigError::ZeroPeriod("behavior.min_scroll_dt_ms"));
        }

        let s = &self.score;
        if s.interval_ms == 0 {
            return Err(ConfigError::ZeroPeriod("score.interval_ms"));
        }
        if !s.weights.all_non_negative() || s.weights.sum() <= 0.0 {
            return Err(ConfigError::Weights);
        }
        if !s.saturations.all_positive() {
            return Err(ConfigError::Saturations);
        }
        check_range("score.cut_rate_share", s.cut_rate_share, 0.0, 1.0)?;
        check_range("score.sensitivity_min", s.sensitivity_min, 0.0, f32::MAX)?;
        check_range("score.sensitivity_span", s.sensitivity_span, 0.0, f32::MAX)?;
        if !(s.smoothing_alpha > 0.0 && s.smoothing_alpha <= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "score.smoothing_alpha",
                value: s.smoothing_alpha,
                min: 0.0,
                max: 1.0,
            });
        }

        let e = &self.effects;
        let t = e.thresholds;
        if !(t.low < t.moderate && t.moderate < t.high && t.high < t.critical && t.critical <= 100.0)
        {
            return Err(ConfigError::Thresholds);
        }
        let c = e.curve;
        if !(0.0 <= c.at_moderate
            && c.at_moderate <= c.at_high
            && c.at_high <= c.at_critical
            && c.at_critical <= 1.0)
        {
            return Err(ConfigError::IntensityCurve);
        }
        let a = e.audio;
        check_range(
            "effects.audio.lowpass_max_hz",
            a.lowpass_max_hz,
            f32::EPSILON,
            f32::MAX,
        )?;
        check_range(
            "effects.audio.lowpass_min_hz",
            a.lowpass_min_hz,
            f32::EPSILON,
            a.lowpass_max_hz,
        )?;
        check_range("effects.audio.highshelf_min_db", a.highshelf_min_db, f32::MIN, 0.0)?;
        check_range("effects.audio.gain_min", a.gain_min, 0.0, 1.0)?;
        if !(a.ramp_sec.is_finite() && a.ramp_sec >= 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "effects.audio.ramp_sec",
                value: a.ramp_sec as f32,
                min: 0.0,
                max: f32::MAX,
            });
        }
        check_range("effects.saturation_min", e.bounds.saturation_min, 0.0, 1.0)?;
        check_range("effects.brightness_min", e.bounds.brightness_min, 0.0, 1.0)?;
        check_range("effects.playback_rate_min", e.bounds.playback_rate_min, 0.0, 1.0)?;
        check_range("effects.blur_max", e.bounds.blur_max, 0.0, f32::MAX)?;
        if !(e.convergence_rate > 0.0 && e.convergence_rate <= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "effects.convergence_rate",
                value: e.convergence_rate,
                min: 0.0,
                max: 1.0,
            });
        }
        if !(e.snap_epsilon > 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "effects.snap_epsilon",
                value: e.snap_epsilon,
                min: f32::EPSILON,
                max: f32::MAX,
            });
        }
        if e.breathe_duration_ms == 0 {
            return Err(ConfigError::ZeroPeriod("effects.breathe_duration_ms"));
        }
        if let Some(channel) = e.breathe_preset.first_out_of_bounds(&e.bounds) {
            return Err(ConfigError::BreathePreset(channel));
        }
        Ok(())
    }
}

/// Externally persisted user settings, read once when monitoring starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    pub enabled: bool,
    pub sensitivity: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitivity: DEFAULT_SENSITIVITY,
        }
    }
}
