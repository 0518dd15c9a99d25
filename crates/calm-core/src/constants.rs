// Default tuning for the sampling, scoring and effect layers.
//
// These are only defaults: every component reads its values from the
// `CalmConfig` it was constructed with, so tests can override any of them.

// Frame sampling
pub const FRAME_SAMPLE_INTERVAL_MS: u32 = 500;
pub const CAPTURE_WIDTH: u32 = 160; // downscaled capture buffer
pub const CAPTURE_HEIGHT: u32 = 90;
pub const HISTOGRAM_BINS: usize = 16; // per colour channel
pub const HISTOGRAM_CHANNELS: usize = 3; // R, G, B
pub const SCENE_CUT_THRESHOLD: f32 = 0.35; // chi-squared distance that counts as a cut
pub const SCENE_CUT_WINDOW_MS: u64 = 3_000;
pub const MOTION_PIXEL_STRIDE: usize = 4; // sample every 4th pixel for motion
pub const MOTION_HISTORY_LEN: usize = 20;

// Behaviour tracking
pub const SCROLL_WINDOW_MS: u64 = 10_000;
pub const FAST_SCROLL_PX_PER_SEC: f64 = 800.0;
pub const MIN_SCROLL_DT_MS: f64 = 1.0; // guards the velocity division
pub const DOM_POLL_INTERVAL_MS: u32 = 500;
pub const DOM_CHANGE_WINDOW_MS: u64 = 10_000;

// Score aggregation
pub const SCORE_INTERVAL_MS: u32 = 1_000;
pub const WEIGHT_SCENE_CUT: f32 = 0.35;
pub const WEIGHT_SCROLL: f32 = 0.25;
pub const WEIGHT_TIME_ON_PAGE: f32 = 0.15;
pub const WEIGHT_CONTENT_CHANGE: f32 = 0.15;
pub const WEIGHT_ACTIVE_VIDEO: f32 = 0.10;
pub const CUT_RATE_SATURATION: f32 = 8.0; // cuts per 10s that max out the cut term
pub const MOTION_SATURATION: f32 = 0.25;
pub const CUT_RATE_SHARE: f32 = 0.7; // cut rate vs motion inside the scene sub-score
pub const FAST_SCROLL_SATURATION: f32 = 5.0;
pub const DOM_CHANGE_SATURATION: f32 = 20.0;
pub const ACTIVE_VIDEO_SATURATION: f32 = 3.0;
pub const SMOOTHING_ALPHA: f32 = 0.15; // new = α*raw + (1-α)*previous
pub const SENSITIVITY_MULT_MIN: f32 = 0.5;
pub const SENSITIVITY_MULT_SPAN: f32 = 1.5; // multiplier spans [0.5, 2.0]
pub const SCORE_HISTORY_LEN: usize = 120;
pub const DEFAULT_SENSITIVITY: f32 = 0.5;

// Intensity curve thresholds (score units)
pub const THRESHOLD_LOW: f32 = 25.0;
pub const THRESHOLD_MODERATE: f32 = 45.0;
pub const THRESHOLD_HIGH: f32 = 65.0;
pub const THRESHOLD_CRITICAL: f32 = 85.0;

// Intensity reached at the start of each segment
pub const INTENSITY_AT_MODERATE: f32 = 0.25;
pub const INTENSITY_AT_HIGH: f32 = 0.60;
pub const INTENSITY_AT_CRITICAL: f32 = 0.85;

// Effect channel extremes (reached at intensity 1)
pub const SATURATION_MIN: f32 = 0.2;
pub const BRIGHTNESS_MIN: f32 = 0.75;
pub const BLUR_MAX_PX: f32 = 2.0;
pub const PLAYBACK_RATE_MIN: f32 = 0.8;

// Convergence
pub const CONVERGENCE_RATE: f32 = 0.06; // fraction of the remaining delta per tick
pub const SNAP_EPSILON: f32 = 0.001;

// Breathe override
pub const BREATHE_DURATION_MS: u64 = 5_000;
pub const BREATHE_GRAYSCALE: f32 = 0.6;
pub const BREATHE_SATURATION: f32 = 0.4;
pub const BREATHE_BRIGHTNESS: f32 = 0.85;
pub const BREATHE_BLUR_PX: f32 = 0.8;
pub const BREATHE_PLAYBACK_RATE: f32 = 0.9;
pub const BREATHE_AUDIO_INTENSITY: f32 = 0.5;

// Audio collaborator contract
pub const AUDIO_LOWPASS_MAX_HZ: f32 = 20_000.0;
pub const AUDIO_LOWPASS_MIN_HZ: f32 = 2_000.0;
pub const AUDIO_HIGHSHELF_MIN_DB: f32 = -12.0;
pub const AUDIO_GAIN_MIN: f32 = 0.85;
pub const AUDIO_RAMP_SEC: f64 = 0.3;

// Distance backends
pub const BACKEND_RELATIVE_TOLERANCE: f32 = 1e-4;
pub const BACKEND_MAX_CONSECUTIVE_FAILURES: u32 = 3;
