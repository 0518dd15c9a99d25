// Host-side tests for the chi-squared distance and its backends.

use calm_core::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;

fn random_histogram(rng: &mut StdRng, bins: usize) -> Histogram {
    let counts: Vec<u32> = (0..bins * 3).map(|_| rng.gen_range(0..50)).collect();
    Histogram::from_counts(&counts, bins).unwrap()
}

#[test]
fn distance_is_zero_symmetric_and_non_negative() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let a = random_histogram(&mut rng, 16);
        let b = random_histogram(&mut rng, 16);
        let self_d = a.distance(&a).unwrap();
        assert!(self_d.abs() < 1e-6, "d(h,h) = {}", self_d);
        let ab = a.distance(&b).unwrap();
        let ba = b.distance(&a).unwrap();
        assert!(ab >= 0.0, "negative distance {}", ab);
        assert!((ab - ba).abs() < 1e-6, "asymmetric: {} vs {}", ab, ba);
    }
}

#[test]
fn distance_is_mean_of_per_bin_terms() {
    let a = Histogram::from_values(&[1.0, 0.0, 0.0, 0.0]).unwrap();
    let b = Histogram::from_values(&[0.0, 1.0, 0.0, 0.0]).unwrap();
    // two bins each contribute 1, divided by 4 bins
    assert!((a.distance(&b).unwrap() - 0.5).abs() < 1e-6);
}

#[test]
fn empty_bins_contribute_nothing() {
    let a = Histogram::from_values(&[0.0, 0.5, 0.5]).unwrap();
    let b = Histogram::from_values(&[0.0, 0.5, 0.5]).unwrap();
    let d = a.distance(&b).unwrap();
    assert!(d.is_finite());
    assert_eq!(d, 0.0);
}

#[test]
fn length_mismatch_fails_loudly() {
    let a = Histogram::from_values(&[0.5, 0.5]).unwrap();
    let b = Histogram::from_values(&[0.2, 0.3, 0.5]).unwrap();
    match a.distance(&b) {
        Err(CalmError::HistogramLengthMismatch { left, right }) => {
            assert_eq!((left, right), (2, 3));
        }
        other => panic!("expected length mismatch, got {:?}", other),
    }
}

#[test]
fn invalid_values_are_rejected() {
    assert!(matches!(
        Histogram::from_values(&[0.5, f32::NAN]),
        Err(CalmError::InvalidHistogramValue(1))
    ));
    assert!(matches!(
        Histogram::from_values(&[-0.1]),
        Err(CalmError::InvalidHistogramValue(0))
    ));
    assert!(matches!(
        Histogram::from_values(&[]),
        Err(CalmError::EmptyHistogram)
    ));
}

// ---------------- Backends ----------------

struct FixedBackend {
    kind: BackendKind,
    ready: bool,
    result: Result<f32, String>,
    calls: Cell<u32>,
}

impl FixedBackend {
    fn new(kind: BackendKind, result: Result<f32, String>) -> Self {
        Self {
            kind,
            ready: true,
            result,
            calls: Cell::new(0),
        }
    }
}

impl DistanceBackend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn compute<'a>(&'a self, _a: &'a Histogram, _b: &'a Histogram) -> DistanceFuture<'a> {
        self.calls.set(self.calls.get() + 1);
        let r = self.result.clone().map_err(CalmError::Backend);
        Box::pin(std::future::ready(r))
    }
}

// Mirrors the reference on the host so agreement can be checked.
struct MirrorBackend;

impl DistanceBackend for MirrorBackend {
    fn name(&self) -> &str {
        "mirror"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn compute<'a>(&'a self, a: &'a Histogram, b: &'a Histogram) -> DistanceFuture<'a> {
        Box::pin(async move {
            let sum: f32 = a
                .bins()
                .iter()
                .zip(b.bins())
                .rev()
                .map(|(&x, &y)| if x + y > 0.0 { (x - y) * (x - y) / (x + y) } else { 0.0 })
                .sum();
            Ok(sum / a.len() as f32)
        })
    }
}

fn pair() -> (Histogram, Histogram) {
    (
        Histogram::from_values(&[0.7, 0.3, 0.0, 0.0]).unwrap(),
        Histogram::from_values(&[0.1, 0.2, 0.3, 0.4]).unwrap(),
    )
}

#[test]
fn selection_prefers_accelerator_then_gpu() {
    let picked = select_backend(vec![
        Box::new(FixedBackend::new(BackendKind::Gpu, Ok(0.0))),
        Box::new(FixedBackend::new(BackendKind::Accelerator, Ok(0.0))),
    ])
    .unwrap();
    assert_eq!(picked.kind(), BackendKind::Accelerator);

    let mut not_ready = FixedBackend::new(BackendKind::Accelerator, Ok(0.0));
    not_ready.ready = false;
    let picked = select_backend(vec![
        Box::new(not_ready),
        Box::new(FixedBackend::new(BackendKind::Gpu, Ok(0.0))),
    ])
    .unwrap();
    assert_eq!(picked.kind(), BackendKind::Gpu);
}

#[test]
fn selection_without_candidates_means_reference() {
    assert!(select_backend(Vec::new()).is_none());
    assert!(select_backend(vec![Box::new(ReferenceDistance)]).is_none());
    let engine = DistanceEngine::with_backend(None);
    assert_eq!(engine.active_kind(), BackendKind::Reference);
    assert!(!engine.is_accelerated());
}

#[test]
fn accelerated_result_is_used_when_available() {
    let (a, b) = pair();
    let engine = DistanceEngine::with_backend(Some(Box::new(FixedBackend::new(
        BackendKind::Gpu,
        Ok(0.42),
    ))));
    let d = pollster::block_on(engine.compute(&a, &b)).unwrap();
    assert_eq!(d, 0.42);
}

#[test]
fn failing_backend_falls_back_then_is_demoted() {
    let (a, b) = pair();
    let reference = a.distance(&b).unwrap();
    let engine = DistanceEngine::with_backend(Some(Box::new(FixedBackend::new(
        BackendKind::Accelerator,
        Err("device lost".to_string()),
    ))));
    assert!(engine.is_accelerated());
    for _ in 0..3 {
        let d = pollster::block_on(engine.compute(&a, &b)).unwrap();
        assert_eq!(d, reference);
    }
    assert!(!engine.is_accelerated(), "backend should be demoted after 3 failures");
    assert_eq!(engine.active_kind(), BackendKind::Reference);
}

#[test]
fn invalid_backend_output_counts_as_failure() {
    let (a, b) = pair();
    let reference = a.distance(&b).unwrap();
    let engine = DistanceEngine::with_backend(Some(Box::new(FixedBackend::new(
        BackendKind::Gpu,
        Ok(f32::NAN),
    ))));
    let d = pollster::block_on(engine.compute(&a, &b)).unwrap();
    assert_eq!(d, reference);
}

#[test]
fn malformed_input_is_reported_even_with_a_backend() {
    let a = Histogram::from_values(&[1.0]).unwrap();
    let b = Histogram::from_values(&[0.5, 0.5]).unwrap();
    let engine = DistanceEngine::with_backend(Some(Box::new(FixedBackend::new(
        BackendKind::Gpu,
        Ok(0.0),
    ))));
    assert!(pollster::block_on(engine.compute(&a, &b)).is_err());
    assert!(engine.is_accelerated(), "caller bugs must not demote the backend");
}

#[test]
fn equivalent_backend_agrees_within_tolerance() {
    let mut rng = StdRng::seed_from_u64(99);
    let engine = DistanceEngine::with_backend(Some(Box::new(MirrorBackend)));
    for _ in 0..200 {
        let a = random_histogram(&mut rng, 16);
        let b = random_histogram(&mut rng, 16);
        let fast = pollster::block_on(engine.compute(&a, &b)).unwrap();
        let slow = engine.compute_sync(&a, &b).unwrap();
        assert!(
            agrees_with_reference(fast, slow),
            "{} vs {} outside tolerance",
            fast,
            slow
        );
    }
}

#[test]
fn agreement_rejects_real_differences() {
    assert!(agrees_with_reference(1.0, 1.00005));
    assert!(!agrees_with_reference(1.0, 1.01));
    assert!(agrees_with_reference(0.0, 0.0));
}
