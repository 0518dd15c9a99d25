use thiserror::Error;

/// Why a frame could not be read from a visual source.
///
/// Every variant is a transient condition: the extractor swallows it and
/// simply produces no sample for that tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("frame pixels are not readable (cross-origin)")]
    CrossOrigin,
    #[error("source is not ready for capture")]
    NotReady,
    #[error("capture failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroPeriod(&'static str),
    #[error("histogram bins must be in 1..=256, got {0}")]
    HistogramBins(usize),
    #[error("{name} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("score weights must be non-negative and not all zero")]
    Weights,
    #[error("sub-score saturations must be finite and positive")]
    Saturations,
    #[error("intensity thresholds must be strictly increasing and end at or below 100")]
    Thresholds,
    #[error("intensity curve must be non-decreasing within [0, 1]")]
    IntensityCurve,
    #[error("breathe preset channel {0} lies outside the effect bounds")]
    BreathePreset(&'static str),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalmError {
    #[error("histogram length mismatch: {left} vs {right}")]
    HistogramLengthMismatch { left: usize, right: usize },
    #[error("histogram has no bins")]
    EmptyHistogram,
    #[error("histogram value at bin {0} is negative or not finite")]
    InvalidHistogramValue(usize),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("distance backend failed: {0}")]
    Backend(String),
    #[error("resource teardown failed: {0}")]
    Teardown(String),
}
