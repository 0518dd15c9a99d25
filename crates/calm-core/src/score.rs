//! Weighted, sensitivity-scaled and exponentially smoothed stimulation score.

use crate::config::ScoreConfig;
use crate::constants::DEFAULT_SENSITIVITY;
use std::collections::VecDeque;

/// Raw signals sampled at one score tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SignalSnapshot {
    pub cut_rate: f32,
    pub avg_motion: f32,
    pub fast_scroll_count: usize,
    pub elapsed_secs: f64,
    pub dom_change_count: usize,
    pub active_video_count: usize,
}

/// Each sub-score is independently normalised to [0, 100].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SubScores {
    pub scene_cut: f32,
    pub scroll: f32,
    pub time_on_page: f32,
    pub content_change: f32,
    pub active_video: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreUpdate {
    pub timestamp_ms: u64,
    pub score: f32,
    /// Weighted sum after the sensitivity multiplier, before clamping.
    pub raw_score: f32,
    pub sub_scores: SubScores,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreState {
    pub current_score: f32,
    pub sensitivity: f32,
}

#[inline]
fn finite_non_negative(v: f32) -> f32 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

#[inline]
fn saturating_ratio(value: f32, saturation: f32) -> f32 {
    (finite_non_negative(value) / saturation).min(1.0)
}

pub fn sub_scores(s: &SignalSnapshot, config: &ScoreConfig) -> SubScores {
    let sat = &config.saturations;
    let share = config.cut_rate_share;
    let cut = saturating_ratio(s.cut_rate, sat.cut_rate);
    let motion = saturating_ratio(s.avg_motion, sat.motion);
    let elapsed = if s.elapsed_secs.is_finite() && s.elapsed_secs > 0.0 {
        s.elapsed_secs
    } else {
        0.0
    };
    let time_on_page = ((1.0 + elapsed / 60.0).log10() * 50.0).min(100.0) as f32;
    SubScores {
        scene_cut: (cut * share + motion * (1.0 - share)) * 100.0,
        scroll: saturating_ratio(s.fast_scroll_count as f32, sat.fast_scroll) * 100.0,
        time_on_page,
        content_change: saturating_ratio(s.dom_change_count as f32, sat.dom_change) * 100.0,
        active_video: saturating_ratio(s.active_video_count as f32, sat.active_video) * 100.0,
    }
}

/// Maps sensitivity in [0, 1] onto `[min, min + span]` (0.5 to 2.0 by default).
#[inline]
pub fn sensitivity_multiplier(sensitivity: f32, config: &ScoreConfig) -> f32 {
    config.sensitivity_min + sensitivity.clamp(0.0, 1.0) * config.sensitivity_span
}

pub struct ScoreAggregator {
    config: ScoreConfig,
    state: ScoreState,
    history: VecDeque<ScoreUpdate>,
}

impl ScoreAggregator {
    pub fn new(config: ScoreConfig, sensitivity: f32) -> Self {
        let history = VecDeque::with_capacity(config.history_len);
        let mut agg = Self {
            config,
            state: ScoreState {
                current_score: 0.0,
                sensitivity: DEFAULT_SENSITIVITY,
            },
            history,
        };
        agg.set_sensitivity(sensitivity);
        agg
    }

    #[inline]
    pub fn state(&self) -> ScoreState {
        self.state
    }

    #[inline]
    pub fn score(&self) -> f32 {
        self.state.current_score
    }

    /// Clamped to [0, 1]; non-finite values are ignored.
    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        if sensitivity.is_finite() {
            self.state.sensitivity = sensitivity.clamp(0.0, 1.0);
        } else {
            log::warn!("[score] ignoring non-finite sensitivity");
        }
    }

    /// Weighted raw score for a breakdown, including the sensitivity multiplier.
    pub fn raw_score(&self, subs: &SubScores) -> f32 {
        let w = &self.config.weights;
        let weighted = subs.scene_cut * w.scene_cut
            + subs.scroll * w.scroll
            + subs.time_on_page * w.time_on_page
            + subs.content_change * w.content_change
            + subs.active_video * w.active_video;
        weighted * sensitivity_multiplier(self.state.sensitivity, &self.config)
    }

    pub fn update(&mut self, timestamp_ms: u64, signals: &SignalSnapshot) -> ScoreUpdate {
        let subs = sub_scores(signals, &self.config);
        let raw = self.raw_score(&subs);
        let alpha = self.config.smoothing_alpha;
        let clamped_raw = finite_non_negative(raw).min(100.0);
        let smoothed = alpha * clamped_raw + (1.0 - alpha) * self.state.current_score;
        self.state.current_score = smoothed.clamp(0.0, 100.0);

        let update = ScoreUpdate {
            timestamp_ms,
            score: self.state.current_score,
            raw_score: raw,
            sub_scores: subs,
        };
        if self.config.history_len > 0 {
            if self.history.len() >= self.config.history_len {
                self.history.pop_front();
            }
            self.history.push_back(update);
        }
        log::debug!(
            "[score] {:.1} (raw {:.1}; cut {:.0} scroll {:.0} time {:.0} dom {:.0} video {:.0})",
            update.score,
            raw,
            subs.scene_cut,
            subs.scroll,
            subs.time_on_page,
            subs.content_change,
            subs.active_video
        );
        update
    }

    /// Recent updates, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &ScoreUpdate> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        self.state.current_score = 0.0;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_spans_half_to_double() {
        let cfg = ScoreConfig::default();
        assert_eq!(sensitivity_multiplier(0.0, &cfg), 0.5);
        assert_eq!(sensitivity_multiplier(1.0, &cfg), 2.0);
        assert_eq!(sensitivity_multiplier(7.0, &cfg), 2.0);
    }

    #[test]
    fn time_on_page_reaches_fifty_after_nine_minutes() {
        // log10(1 + 540/60) = 1
        let subs = sub_scores(
            &SignalSnapshot {
                elapsed_secs: 540.0,
                ..Default::default()
            },
            &ScoreConfig::default(),
        );
        assert!((subs.time_on_page - 50.0).abs() < 1e-3);
    }

    #[test]
    fn nan_signals_contribute_nothing() {
        let subs = sub_scores(
            &SignalSnapshot {
                cut_rate: f32::NAN,
                avg_motion: f32::INFINITY,
                elapsed_secs: f64::NAN,
                ..Default::default()
            },
            &ScoreConfig::default(),
        );
        assert_eq!(subs, SubScores::default());
    }
}
