// Host-side tests for the intensity curve, convergence and breathe override.

use calm_core::*;

fn controller() -> EffectController {
    EffectController::new(EffectConfig::default())
}

fn max_gap(a: &EffectState, b: &EffectState) -> f32 {
    a.channels()
        .iter()
        .zip(b.channels())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}

#[test]
fn intensity_hits_documented_points() {
    let t = Thresholds::default();
    let curve = IntensityCurve::default();
    assert_eq!(intensity_for_score(0.0, &t, &curve), 0.0);
    assert_eq!(intensity_for_score(24.9, &t, &curve), 0.0);
    assert_eq!(intensity_for_score(25.0, &t, &curve), 0.0);
    assert_eq!(intensity_for_score(45.0, &t, &curve), 0.25);
    assert_eq!(intensity_for_score(65.0, &t, &curve), 0.60);
    assert_eq!(intensity_for_score(85.0, &t, &curve), 0.85);
    assert_eq!(intensity_for_score(100.0, &t, &curve), 1.0);
    assert_eq!(intensity_for_score(150.0, &t, &curve), 1.0);
    assert_eq!(intensity_for_score(f32::NAN, &t, &curve), 0.0);
}

#[test]
fn intensity_is_continuous_and_monotonic() {
    let t = Thresholds::default();
    let curve = IntensityCurve::default();
    for boundary in [25.0f32, 45.0, 65.0, 85.0] {
        let below = intensity_for_score(boundary - 1e-3, &t, &curve);
        let at = intensity_for_score(boundary, &t, &curve);
        assert!((at - below).abs() < 1e-3, "jump at {}: {} -> {}", boundary, below, at);
    }
    let mut last = 0.0;
    for i in 0..=1000 {
        let v = intensity_for_score(i as f32 / 10.0, &t, &curve);
        assert!(v >= last - 1e-6, "not monotonic at {}", i);
        last = v;
    }
}

#[test]
fn targets_interpolate_between_neutral_and_extremes() {
    let bounds = EffectBounds::default();
    let half = targets_for_intensity(0.5, &bounds);
    assert!((half.grayscale - 0.5).abs() < 1e-6);
    assert!((half.saturation - 0.6).abs() < 1e-6);
    assert!((half.brightness - 0.875).abs() < 1e-6);
    assert!((half.blur - 1.0).abs() < 1e-6);
    assert!((half.playback_rate - 0.9).abs() < 1e-6);
    assert!((half.audio_intensity - 0.5).abs() < 1e-6);
    assert!(targets_for_intensity(0.0, &bounds).is_neutral());
}

#[test]
fn convergence_terminates_within_bound() {
    let mut c = controller();
    c.apply_score(100.0, 0);
    let target = c.target();
    let initial = max_gap(&c.current(), &target);
    let bound = ((initial / 0.001).ln() / (1.0f32 / 0.94).ln()).ceil() as usize;

    let mut prev_gap = initial;
    let mut ticks = 0;
    while c.is_converging() {
        let tick = c.tick(16 * ticks as u64);
        ticks += 1;
        let gap = max_gap(&tick.state, &target);
        assert!(gap < prev_gap || gap == 0.0, "gap grew at tick {}", ticks);
        prev_gap = gap;
        assert!(ticks <= bound + 1, "no convergence after {} ticks", ticks);
    }
    assert_eq!(c.current(), target);
    assert!(ticks <= bound + 1);
}

#[test]
fn converged_loop_idles() {
    let mut c = controller();
    let tick = c.tick(0);
    assert!(!tick.converging);
    assert!(tick.state.is_neutral());
    c.apply_score(50.0, 0);
    assert!(c.is_converging());
    c.apply_score(10.0, 0);
    c.apply_score(50.0, 0);
    assert!(c.is_converging());
}

#[test]
fn breathe_overrides_then_restores_latest_score_target() {
    let cfg = EffectConfig::default();
    let mut c = controller();
    c.apply_score(30.0, 0);
    let before = c.target();

    assert!(c.trigger_breathe(1_000));
    assert_eq!(c.target(), cfg.breathe_preset);

    // the score moves during the override; only the saved target follows
    c.apply_score(90.0, 2_000);
    assert_eq!(c.target(), cfg.breathe_preset);
    let latest = c.score_target();
    assert_ne!(latest, before);

    let tick = c.tick(5_999);
    assert!(!tick.breathe_ended);
    assert_eq!(c.target(), cfg.breathe_preset);

    let tick = c.tick(6_000);
    assert!(tick.breathe_ended);
    assert_eq!(c.target(), latest);
    assert!(!c.is_breathing());

    // normal updates resume
    c.apply_score(0.0, 6_100);
    assert!(c.target().is_neutral());
}

#[test]
fn breathe_retrigger_is_ignored() {
    let mut c = controller();
    assert!(c.trigger_breathe(0));
    assert!(!c.trigger_breathe(2_500));
    assert_eq!(c.breathe_remaining_ms(2_500), Some(2_500));
    // allowed again once the first override has run out
    assert!(c.trigger_breathe(5_000));
    assert_eq!(c.breathe_remaining_ms(5_000), Some(5_000));
}

#[test]
fn neutral_cancels_breathe() {
    let mut c = controller();
    c.apply_score(95.0, 0);
    c.trigger_breathe(0);
    c.set_neutral();
    assert!(!c.is_breathing());
    assert!(c.target().is_neutral());
}

#[test]
fn states_stay_within_bounds() {
    let bounds = EffectBounds::default();
    let mut c = controller();
    for (i, score) in [0.0, 100.0, 40.0, 85.0, 20.0].into_iter().enumerate() {
        c.apply_score(score, i as u64 * 1000);
        for _ in 0..50 {
            let s = c.tick(i as u64 * 1000).state;
            assert_eq!(s.first_out_of_bounds(&bounds), None, "{:?}", s);
        }
    }
}

#[test]
fn audio_contract_is_linear() {
    let contract = AudioContract::default();
    let p = AudioParams::from_intensity(0.5, &contract);
    assert!((p.lowpass_hz - 11_000.0).abs() < 1e-2);
    assert!((p.highshelf_db + 6.0).abs() < 1e-5);
    assert!((p.gain - 0.925).abs() < 1e-6);
    assert_eq!(contract.ramp_sec, 0.3);
}

#[test]
fn audio_contract_follows_configuration() {
    let contract = AudioContract {
        lowpass_max_hz: 10_000.0,
        lowpass_min_hz: 1_000.0,
        highshelf_min_db: -6.0,
        gain_min: 0.5,
        ramp_sec: 0.1,
    };
    let full = AudioParams::from_intensity(1.0, &contract);
    assert_eq!(full.lowpass_hz, 1_000.0);
    assert_eq!(full.highshelf_db, -6.0);
    assert_eq!(full.gain, 0.5);
    let quiet = AudioParams::from_intensity(0.0, &contract);
    assert_eq!(quiet.lowpass_hz, 10_000.0);
}

#[test]
fn intensity_breakpoints_follow_configuration() {
    let t = Thresholds {
        low: 10.0,
        moderate: 20.0,
        high: 30.0,
        critical: 40.0,
    };
    let curve = IntensityCurve {
        at_moderate: 0.5,
        at_high: 0.7,
        at_critical: 0.9,
    };
    assert_eq!(intensity_for_score(20.0, &t, &curve), 0.5);
    assert_eq!(intensity_for_score(30.0, &t, &curve), 0.7);
    assert_eq!(intensity_for_score(40.0, &t, &curve), 0.9);
    assert!((intensity_for_score(15.0, &t, &curve) - 0.25).abs() < 1e-6);
    assert_eq!(intensity_for_score(100.0, &t, &curve), 1.0);

    let config = EffectConfig {
        thresholds: t,
        curve,
        ..EffectConfig::default()
    };
    assert_eq!(EffectController::new(config).intensity_for(20.0), 0.5);
}
