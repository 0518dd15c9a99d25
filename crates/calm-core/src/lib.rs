//! Platform-free core for calm-web: turns page signals into a bounded
//! stimulation score and smoothly converging sensory effects.

pub mod backend;
pub mod behavior;
pub mod config;
pub mod constants;
pub mod effects;
pub mod error;
pub mod frame;
pub mod histogram;
pub mod monitor;
pub mod observer;
pub mod registry;
pub mod score;
pub mod window;

pub use backend::{
    agrees_with_reference, select_backend, BackendKind, DistanceBackend, DistanceEngine,
    DistanceFuture, ReferenceDistance,
};
pub use behavior::{BehaviorTracker, PageSnapshot, ScrollEvent};
pub use config::{
    AudioContract, BehaviorConfig, CalmConfig, EffectBounds, EffectConfig, FrameConfig,
    IntensityCurve, Saturations, ScoreConfig, ScoreWeights, Settings, Thresholds,
};
pub use effects::{
    converge_step, intensity_for_score, targets_for_intensity, AudioParams, EffectController,
    EffectState, EffectTick,
};
pub use error::{CalmError, CaptureError, ConfigError};
pub use frame::{
    color_histogram, motion_magnitude, Captured, FrameSample, FrameSignalExtractor, FrameStats,
    PendingComparison, VisualSource,
};
pub use histogram::{chi_squared_distance, Histogram};
pub use monitor::{Monitor, MonitorState};
pub use observer::{MonitorEvent, ObserverId, Observers};
pub use registry::{Release, SourceId, SourceRegistry};
pub use score::{
    sensitivity_multiplier, sub_scores, ScoreAggregator, ScoreState, ScoreUpdate, SignalSnapshot,
    SubScores,
};
pub use window::TrailingWindow;
