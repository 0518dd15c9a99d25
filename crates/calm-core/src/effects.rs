//! Score → intensity → effect targets, and the per-frame convergence toward them.

use crate::config::{AudioContract, EffectBounds, EffectConfig, IntensityCurve, Thresholds};

/// Six effect channels. Neutral is grayscale 0, saturation 1, brightness 1,
/// blur 0, playback rate 1 and audio intensity 0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectState {
    pub grayscale: f32,
    pub saturation: f32,
    pub brightness: f32,
    /// CSS pixels
    pub blur: f32,
    pub playback_rate: f32,
    pub audio_intensity: f32,
}

impl Default for EffectState {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl EffectState {
    pub const NEUTRAL: EffectState = EffectState {
        grayscale: 0.0,
        saturation: 1.0,
        brightness: 1.0,
        blur: 0.0,
        playback_rate: 1.0,
        audio_intensity: 0.0,
    };

    pub const CHANNEL_NAMES: [&'static str; 6] = [
        "grayscale",
        "saturation",
        "brightness",
        "blur",
        "playback_rate",
        "audio_intensity",
    ];

    #[inline]
    pub fn channels(&self) -> [f32; 6] {
        [
            self.grayscale,
            self.saturation,
            self.brightness,
            self.blur,
            self.playback_rate,
            self.audio_intensity,
        ]
    }

    #[inline]
    pub fn from_channels(c: [f32; 6]) -> Self {
        Self {
            grayscale: c[0],
            saturation: c[1],
            brightness: c[2],
            blur: c[3],
            playback_rate: c[4],
            audio_intensity: c[5],
        }
    }

    /// Inclusive (min, max) per channel, in `channels()` order.
    pub fn channel_ranges(bounds: &EffectBounds) -> [(f32, f32); 6] {
        [
            (0.0, 1.0),
            (bounds.saturation_min, 1.0),
            (bounds.brightness_min, 1.0),
            (0.0, bounds.blur_max),
            (bounds.playback_rate_min, 1.0),
            (0.0, 1.0),
        ]
    }

    pub fn clamped(&self, bounds: &EffectBounds) -> Self {
        let ranges = Self::channel_ranges(bounds);
        let mut c = self.channels();
        for (v, (lo, hi)) in c.iter_mut().zip(ranges) {
            *v = if v.is_finite() { (*v).clamp(lo, hi) } else { lo };
        }
        Self::from_channels(c)
    }

    pub fn first_out_of_bounds(&self, bounds: &EffectBounds) -> Option<&'static str> {
        self.channels()
            .iter()
            .zip(Self::channel_ranges(bounds))
            .zip(Self::CHANNEL_NAMES)
            .find(|((v, (lo, hi)), _)| !(v.is_finite() && **v >= *lo && **v <= *hi))
            .map(|(_, name)| name)
    }

    #[inline]
    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }
}

/// Four-segment piecewise-linear map from score to intensity in [0, 1].
pub fn intensity_for_score(score: f32, t: &Thresholds, curve: &IntensityCurve) -> f32 {
    if !score.is_finite() || score < t.low {
        return 0.0;
    }
    let segment =
        |from: f32, to: f32, base: f32, span: f32| base + (score - from) / (to - from) * span;
    let intensity = if score < t.moderate {
        segment(t.low, t.moderate, 0.0, curve.at_moderate)
    } else if score < t.high {
        segment(
            t.moderate,
            t.high,
            curve.at_moderate,
            curve.at_high - curve.at_moderate,
        )
    } else if score < t.critical {
        segment(
            t.high,
            t.critical,
            curve.at_high,
            curve.at_critical - curve.at_high,
        )
    } else {
        let span = (100.0 - t.critical).max(f32::EPSILON);
        curve.at_critical + (score - t.critical) / span * (1.0 - curve.at_critical)
    };
    intensity.clamp(0.0, 1.0)
}

/// Interpolates every channel between neutral and its extreme.
pub fn targets_for_intensity(intensity: f32, bounds: &EffectBounds) -> EffectState {
    let i = if intensity.is_finite() {
        intensity.clamp(0.0, 1.0)
    } else {
        0.0
    };
    EffectState {
        grayscale: i,
        saturation: 1.0 - i * (1.0 - bounds.saturation_min),
        brightness: 1.0 - i * (1.0 - bounds.brightness_min),
        blur: i * bounds.blur_max,
        playback_rate: 1.0 - i * (1.0 - bounds.playback_rate_min),
        audio_intensity: i,
    }
}

/// One exponential step toward `target`, snapping once the remainder is below `epsilon`.
#[inline]
pub fn converge_step(current: f32, target: f32, rate: f32, epsilon: f32) -> f32 {
    let next = current + (target - current) * rate;
    if (target - next).abs() < epsilon {
        target
    } else {
        next
    }
}

/// Parameters the audio collaborator ramps to for a given audio intensity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioParams {
    pub lowpass_hz: f32,
    pub highshelf_db: f32,
    pub gain: f32,
}

impl AudioParams {
    pub fn from_intensity(intensity: f32, contract: &AudioContract) -> Self {
        let i = if intensity.is_finite() {
            intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            lowpass_hz: contract.lowpass_max_hz
                + (contract.lowpass_min_hz - contract.lowpass_max_hz) * i,
            highshelf_db: contract.highshelf_min_db * i,
            gain: 1.0 + (contract.gain_min - 1.0) * i,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectTick {
    pub state: EffectState,
    /// Still moving after this tick.
    pub converging: bool,
    /// A breathe override expired during this tick.
    pub breathe_ended: bool,
}

pub struct EffectController {
    config: EffectConfig,
    current: EffectState,
    target: EffectState,
    // What the score asks for; becomes the target again when breathe ends.
    score_target: EffectState,
    breathe_until_ms: Option<u64>,
    converging: bool,
}

impl EffectController {
    pub fn new(config: EffectConfig) -> Self {
        Self {
            config,
            current: EffectState::NEUTRAL,
            target: EffectState::NEUTRAL,
            score_target: EffectState::NEUTRAL,
            breathe_until_ms: None,
            converging: false,
        }
    }

    #[inline]
    pub fn current(&self) -> EffectState {
        self.current
    }

    #[inline]
    pub fn target(&self) -> EffectState {
        self.target
    }

    #[inline]
    pub fn score_target(&self) -> EffectState {
        self.score_target
    }

    #[inline]
    pub fn is_converging(&self) -> bool {
        self.converging
    }

    #[inline]
    pub fn is_breathing(&self) -> bool {
        self.breathe_until_ms.is_some()
    }

    pub fn breathe_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.breathe_until_ms.map(|end| end.saturating_sub(now_ms))
    }

    pub fn intensity_for(&self, score: f32) -> f32 {
        intensity_for_score(score, &self.config.thresholds, &self.config.curve)
    }

    #[inline]
    pub fn audio_contract(&self) -> &AudioContract {
        &self.config.audio
    }

    fn set_target(&mut self, target: EffectState) {
        self.target = target.clamped(&self.config.bounds);
        self.converging = self.current != self.target;
    }

    /// Recomputes the score-driven target. While breathing, only the saved
    /// target moves; the preset stays in force until the override expires.
    pub fn apply_score(&mut self, score: f32, now_ms: u64) -> EffectState {
        self.expire_breathe(now_ms);
        let intensity = self.intensity_for(score);
        self.score_target = targets_for_intensity(intensity, &self.config.bounds);
        if !self.is_breathing() {
            self.set_target(self.score_target);
        }
        self.target
    }

    /// Drives the score-driven target to neutral and cancels any breathe.
    pub fn set_neutral(&mut self) {
        self.breathe_until_ms = None;
        self.score_target = EffectState::NEUTRAL;
        self.set_target(EffectState::NEUTRAL);
    }

    /// Starts the calming override. Re-triggering while active is ignored and
    /// returns `false`; the running override keeps its original end time.
    pub fn trigger_breathe(&mut self, now_ms: u64) -> bool {
        self.expire_breathe(now_ms);
        if self.is_breathing() {
            log::debug!("[breathe] already active, ignoring trigger");
            return false;
        }
        self.breathe_until_ms = Some(now_ms.saturating_add(self.config.breathe_duration_ms));
        self.set_target(self.config.breathe_preset);
        log::info!(
            "[breathe] started for {}ms",
            self.config.breathe_duration_ms
        );
        true
    }

    /// Restores the score-driven target once the override has run its full
    /// duration. Returns whether it ended on this call.
    pub fn expire_breathe(&mut self, now_ms: u64) -> bool {
        match self.breathe_until_ms {
            Some(end) if now_ms >= end => {
                self.breathe_until_ms = None;
                self.set_target(self.score_target);
                log::info!("[breathe] ended, restoring score-driven target");
                true
            }
            _ => false,
        }
    }

    /// One convergence step for every channel.
    pub fn tick(&mut self, now_ms: u64) -> EffectTick {
        let breathe_ended = self.expire_breathe(now_ms);
        if self.converging {
            let rate = self.config.convergence_rate;
            let eps = self.config.snap_epsilon;
            let cur = self.current.channels();
            let tgt = self.target.channels();
            let mut next = [0.0f32; 6];
            for i in 0..6 {
                next[i] = converge_step(cur[i], tgt[i], rate, eps);
            }
            self.current = EffectState::from_channels(next).clamped(&self.config.bounds);
            self.converging = self.current != self.target;
        }
        EffectTick {
            state: self.current,
            converging: self.converging,
            breathe_ended,
        }
    }

    pub fn reset(&mut self) {
        self.current = EffectState::NEUTRAL;
        self.target = EffectState::NEUTRAL;
        self.score_target = EffectState::NEUTRAL;
        self.breathe_until_ms = None;
        self.converging = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_happens_below_epsilon() {
        assert_eq!(converge_step(0.9995, 1.0, 0.06, 0.001), 1.0);
        let v = converge_step(0.0, 1.0, 0.06, 0.001);
        assert!((v - 0.06).abs() < 1e-6);
    }

    #[test]
    fn full_intensity_hits_every_extreme() {
        let b = EffectBounds::default();
        let t = targets_for_intensity(1.0, &b);
        assert_eq!(t.grayscale, 1.0);
        assert!((t.saturation - b.saturation_min).abs() < 1e-6);
        assert!((t.brightness - b.brightness_min).abs() < 1e-6);
        assert_eq!(t.blur, b.blur_max);
        assert!((t.playback_rate - b.playback_rate_min).abs() < 1e-6);
        assert_eq!(t.audio_intensity, 1.0);
    }

    #[test]
    fn zero_intensity_is_neutral() {
        assert!(targets_for_intensity(0.0, &EffectBounds::default()).is_neutral());
    }

    #[test]
    fn audio_contract_endpoints() {
        let contract = AudioContract::default();
        let quiet = AudioParams::from_intensity(0.0, &contract);
        assert_eq!(quiet.lowpass_hz, 20_000.0);
        assert_eq!(quiet.highshelf_db, 0.0);
        assert_eq!(quiet.gain, 1.0);
        let full = AudioParams::from_intensity(1.0, &contract);
        assert_eq!(full.lowpass_hz, 2_000.0);
        assert_eq!(full.highshelf_db, -12.0);
        assert!((full.gain - 0.85).abs() < 1e-6);
    }
}
