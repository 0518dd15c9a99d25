//! Per-source frame sampling: colour histogram, motion and scene-cut rate.

use crate::backend::ReferenceDistance;
use crate::config::FrameConfig;
use crate::error::{CalmError, CaptureError};
use crate::histogram::Histogram;
use crate::window::TrailingWindow;
use glam::Vec3;
use std::collections::VecDeque;

/// Anything that can hand out a downscaled RGBA frame.
pub trait VisualSource {
    fn is_paused(&self) -> bool;
    fn is_ended(&self) -> bool;
    /// Natural pixel size, `None` while unknown.
    fn dimensions(&self) -> Option<(u32, u32)>;
    /// Captures the current frame scaled to `width`×`height`, 4 bytes per pixel.
    fn capture_rgba(&mut self, width: u32, height: u32) -> Result<Vec<u8>, CaptureError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameSample {
    pub histogram: Histogram,
    pub motion_magnitude: f32,
    pub timestamp_ms: u64,
}

/// Histogram pair whose distance decides whether `timestamp_ms` was a cut.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingComparison {
    pub timestamp_ms: u64,
    pub previous: Histogram,
    pub current: Histogram,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Captured {
    pub sample: FrameSample,
    pub comparison: Option<PendingComparison>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Cuts per 10 seconds over the trailing window.
    pub cut_rate: f32,
    pub avg_motion: f32,
    pub total_frames: u64,
}

pub struct FrameSignalExtractor {
    config: FrameConfig,
    previous: Option<FrameSample>,
    previous_pixels: Option<Vec<u8>>,
    cuts: TrailingWindow<()>,
    motion_history: VecDeque<f32>,
    total_frames: u64,
}

impl FrameSignalExtractor {
    pub fn new(config: FrameConfig) -> Self {
        let cuts = TrailingWindow::new(config.scene_cut_window_ms);
        let motion_history = VecDeque::with_capacity(config.motion_history_len);
        Self {
            config,
            previous: None,
            previous_pixels: None,
            cuts,
            motion_history,
            total_frames: 0,
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn previous_sample(&self) -> Option<&FrameSample> {
        self.previous.as_ref()
    }

    /// Captures one frame and updates motion state. The cut decision for the
    /// returned comparison is committed separately via [`Self::record_comparison`].
    ///
    /// Returns `None` (never an error) when the source is paused, ended,
    /// dimensionless or unreadable.
    pub fn capture(&mut self, source: &mut dyn VisualSource, now_ms: u64) -> Option<Captured> {
        if source.is_paused() || source.is_ended() {
            return None;
        }
        match source.dimensions() {
            Some((w, h)) if w > 0 && h > 0 => {}
            _ => return None,
        }
        let (w, h) = (self.config.capture_width, self.config.capture_height);
        let pixels = match source.capture_rgba(w, h) {
            Ok(p) => p,
            Err(e) => {
                log::debug!("[frame] capture skipped: {}", e);
                return None;
            }
        };
        if pixels.len() != (w as usize) * (h as usize) * 4 {
            log::debug!(
                "[frame] capture skipped: {} bytes for {}x{}",
                pixels.len(),
                w,
                h
            );
            return None;
        }
        let histogram = match color_histogram(&pixels, self.config.histogram_bins) {
            Ok(hist) => hist,
            Err(e) => {
                log::error!("[frame] histogram failed: {}", e);
                return None;
            }
        };
        let motion = self
            .previous_pixels
            .as_deref()
            .map(|prev| motion_magnitude(&pixels, prev, self.config.motion_pixel_stride))
            .unwrap_or(0.0);

        if self.motion_history.len() >= self.config.motion_history_len {
            self.motion_history.pop_front();
        }
        self.motion_history.push_back(motion);
        self.total_frames += 1;
        self.cuts.evict(now_ms);

        let sample = FrameSample {
            histogram,
            motion_magnitude: motion,
            timestamp_ms: now_ms,
        };
        let comparison = self.previous.take().map(|prev| PendingComparison {
            timestamp_ms: now_ms,
            previous: prev.histogram,
            current: sample.histogram.clone(),
        });
        self.previous = Some(sample.clone());
        self.previous_pixels = Some(pixels);
        Some(Captured { sample, comparison })
    }

    /// Commits a cut decision. Returns whether it counted as a cut.
    pub fn record_comparison(&mut self, timestamp_ms: u64, distance: f32) -> bool {
        let is_cut = distance > self.config.scene_cut_threshold;
        if is_cut {
            self.cuts.push(timestamp_ms, ());
            log::debug!("[frame] scene cut at {}ms (distance {:.3})", timestamp_ms, distance);
        }
        is_cut
    }

    /// Capture plus an immediate decision through the reference distance.
    pub fn sample(
        &mut self,
        source: &mut dyn VisualSource,
        now_ms: u64,
        reference: &ReferenceDistance,
    ) -> Option<FrameSample> {
        let captured = self.capture(source, now_ms)?;
        if let Some(cmp) = &captured.comparison {
            match reference.distance(&cmp.previous, &cmp.current) {
                Ok(d) => {
                    self.record_comparison(cmp.timestamp_ms, d);
                }
                Err(e) => log::error!("[frame] distance failed: {}", e),
            }
        }
        Some(captured.sample)
    }

    pub fn cut_count(&self, now_ms: u64) -> usize {
        self.cuts.count_within(now_ms)
    }

    pub fn stats(&self, now_ms: u64) -> FrameStats {
        let window_secs = self.cuts.window_ms() as f32 / 1000.0;
        let cut_rate = if window_secs > 0.0 {
            self.cut_count(now_ms) as f32 / window_secs * 10.0
        } else {
            0.0
        };
        let avg_motion = if self.motion_history.is_empty() {
            0.0
        } else {
            self.motion_history.iter().sum::<f32>() / self.motion_history.len() as f32
        };
        FrameStats {
            cut_rate,
            avg_motion,
            total_frames: self.total_frames,
        }
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.previous_pixels = None;
        self.cuts.clear();
        self.motion_history.clear();
        self.total_frames = 0;
    }
}

/// Per-channel RGB histogram of an RGBA buffer, `bins` buckets per channel,
/// laid out `[R.., G.., B..]` with each channel normalised by pixel count.
pub fn color_histogram(rgba: &[u8], bins: usize) -> Result<Histogram, CalmError> {
    if bins == 0 {
        return Err(CalmError::EmptyHistogram);
    }
    let mut counts = vec![0u32; bins * 3];
    for px in rgba.chunks_exact(4) {
        for ch in 0..3 {
            // floor(v / (256 / bins)) without the float division
            let bucket = (px[ch] as usize * bins) / 256;
            counts[ch * bins + bucket] += 1;
        }
    }
    Histogram::from_counts(&counts, bins)
}

/// Mean absolute RGB change in [0, 1], sampling every `stride`-th pixel.
/// Buffers of different size are treated as no motion.
pub fn motion_magnitude(current: &[u8], previous: &[u8], stride: usize) -> f32 {
    if current.len() != previous.len() || current.len() < 4 {
        return 0.0;
    }
    let step = stride.max(1) * 4;
    let mut sum = 0.0f32;
    let mut n = 0u32;
    for i in (0..current.len() - 3).step_by(step) {
        let a = Vec3::new(current[i] as f32, current[i + 1] as f32, current[i + 2] as f32);
        let b = Vec3::new(previous[i] as f32, previous[i + 1] as f32, previous[i + 2] as f32);
        sum += (a - b).abs().element_sum() / (3.0 * 255.0);
        n += 1;
    }
    if n == 0 {
        0.0
    } else {
        (sum / n as f32).clamp(0.0, 1.0)
    }
}
