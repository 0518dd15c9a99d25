//! Pluggable histogram distance backends.
//!
//! Every backend computes the same chi-squared distance as
//! [`crate::histogram::chi_squared_distance`]; they differ only in where the
//! work runs. [`ReferenceDistance`] is always available and synchronous;
//! accelerated backends are optional and may suspend.

use crate::constants::{BACKEND_MAX_CONSECUTIVE_FAILURES, BACKEND_RELATIVE_TOLERANCE};
use crate::error::CalmError;
use crate::histogram::Histogram;
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;

pub type DistanceFuture<'a> = Pin<Box<dyn Future<Output = Result<f32, CalmError>> + 'a>>;

/// Backend classes in selection order: dedicated accelerators first, then
/// general purpose GPUs, then the reference implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BackendKind {
    Accelerator,
    Gpu,
    Reference,
}

pub trait DistanceBackend {
    fn name(&self) -> &str;
    fn kind(&self) -> BackendKind;
    fn is_ready(&self) -> bool {
        true
    }
    fn compute<'a>(&'a self, a: &'a Histogram, b: &'a Histogram) -> DistanceFuture<'a>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceDistance;

impl ReferenceDistance {
    #[inline]
    pub fn distance(&self, a: &Histogram, b: &Histogram) -> Result<f32, CalmError> {
        a.distance(b)
    }
}

impl DistanceBackend for ReferenceDistance {
    fn name(&self) -> &str {
        "reference"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Reference
    }

    fn compute<'a>(&'a self, a: &'a Histogram, b: &'a Histogram) -> DistanceFuture<'a> {
        Box::pin(std::future::ready(self.distance(a, b)))
    }
}

/// Picks the first ready non-reference candidate in [`BackendKind`] order.
/// `None` means the reference implementation should be used alone.
pub fn select_backend(
    mut candidates: Vec<Box<dyn DistanceBackend>>,
) -> Option<Box<dyn DistanceBackend>> {
    candidates.retain(|b| b.kind() != BackendKind::Reference);
    candidates.sort_by_key(|b| b.kind());
    let picked = candidates.into_iter().find(|b| b.is_ready());
    match &picked {
        Some(b) => log::info!("[backend] selected {} ({:?})", b.name(), b.kind()),
        None => log::info!("[backend] no accelerated backend ready, using reference"),
    }
    picked
}

/// True when an accelerated result matches the reference within the allowed
/// relative tolerance.
pub fn agrees_with_reference(accelerated: f32, reference: f32) -> bool {
    let diff = (accelerated - reference).abs();
    let scale = reference.abs().max(accelerated.abs());
    diff <= BACKEND_RELATIVE_TOLERANCE * scale || diff <= 1e-7
}

/// Accelerated backend with transparent fallback to the reference.
///
/// Callers always get a distance for well-formed input; backend errors are
/// logged and absorbed. A backend that fails repeatedly is demoted for the
/// rest of the session.
pub struct DistanceEngine {
    accelerated: Option<Box<dyn DistanceBackend>>,
    reference: ReferenceDistance,
    consecutive_failures: Cell<u32>,
    demoted: Cell<bool>,
}

impl Default for DistanceEngine {
    fn default() -> Self {
        Self::reference_only()
    }
}

impl DistanceEngine {
    pub fn reference_only() -> Self {
        Self {
            accelerated: None,
            reference: ReferenceDistance,
            consecutive_failures: Cell::new(0),
            demoted: Cell::new(false),
        }
    }

    pub fn with_backend(backend: Option<Box<dyn DistanceBackend>>) -> Self {
        Self {
            accelerated: backend,
            ..Self::reference_only()
        }
    }

    fn active_backend(&self) -> Option<&dyn DistanceBackend> {
        if self.demoted.get() {
            return None;
        }
        self.accelerated
            .as_deref()
            .filter(|b| b.is_ready())
    }

    /// Whether decisions will currently go through an accelerated backend.
    pub fn is_accelerated(&self) -> bool {
        self.active_backend().is_some()
    }

    pub fn active_kind(&self) -> BackendKind {
        self.active_backend()
            .map(|b| b.kind())
            .unwrap_or(BackendKind::Reference)
    }

    pub fn reference(&self) -> &ReferenceDistance {
        &self.reference
    }

    /// Synchronous path, always the reference implementation.
    pub fn compute_sync(&self, a: &Histogram, b: &Histogram) -> Result<f32, CalmError> {
        self.reference.distance(a, b)
    }

    pub async fn compute(&self, a: &Histogram, b: &Histogram) -> Result<f32, CalmError> {
        // Malformed input is a caller bug, not a backend failure.
        if a.len() != b.len() || a.is_empty() {
            return self.reference.distance(a, b);
        }
        if let Some(backend) = self.active_backend() {
            match backend.compute(a, b).await {
                Ok(d) if d.is_finite() && d >= 0.0 => {
                    self.consecutive_failures.set(0);
                    return Ok(d);
                }
                Ok(d) => log::warn!("[backend] {} returned invalid distance {}", backend.name(), d),
                Err(e) => log::warn!("[backend] {} failed: {}", backend.name(), e),
            }
            self.record_failure(backend.name());
        }
        self.reference.distance(a, b)
    }

    fn record_failure(&self, name: &str) {
        let failures = self.consecutive_failures.get() + 1;
        self.consecutive_failures.set(failures);
        if failures >= BACKEND_MAX_CONSECUTIVE_FAILURES && !self.demoted.get() {
            self.demoted.set(true);
            log::warn!(
                "[backend] {} demoted after {} consecutive failures",
                name,
                failures
            );
        }
    }
}
