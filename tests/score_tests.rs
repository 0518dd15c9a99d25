// Host-side tests for score aggregation and smoothing.

use calm_core::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn saturated() -> SignalSnapshot {
    SignalSnapshot {
        cut_rate: 8.0,
        avg_motion: 0.25,
        fast_scroll_count: 5,
        // log10(1 + 6000/60) * 50 > 100
        elapsed_secs: 6000.0,
        dom_change_count: 20,
        active_video_count: 3,
    }
}

#[test]
fn step_response_is_damped() {
    let mut agg = ScoreAggregator::new(ScoreConfig::default(), 0.5);
    let first = agg.update(1000, &saturated());
    assert!(first.raw_score >= 100.0, "raw {}", first.raw_score);
    assert!((first.score - 15.0).abs() < 1e-4, "first {}", first.score);
    let second = agg.update(2000, &saturated());
    assert!((second.score - 27.75).abs() < 1e-4, "second {}", second.score);
}

#[test]
fn repeated_saturation_approaches_but_never_exceeds_100() {
    let mut agg = ScoreAggregator::new(ScoreConfig::default(), 1.0);
    let mut last = 0.0;
    for i in 0..200 {
        let u = agg.update(i * 1000, &saturated());
        assert!(u.score >= last && u.score <= 100.0);
        last = u.score;
    }
    assert!(last > 99.0);
}

#[test]
fn score_stays_bounded_for_arbitrary_signals() {
    let mut rng = StdRng::seed_from_u64(0xCA1);
    let mut agg = ScoreAggregator::new(ScoreConfig::default(), 0.5);
    for i in 0..2000u64 {
        if i % 97 == 0 {
            agg.set_sensitivity(rng.gen_range(-1.0..2.0));
        }
        let pick = |rng: &mut StdRng, wild: f32| -> f32 {
            match rng.gen_range(0..10) {
                0 => f32::NAN,
                1 => f32::INFINITY,
                2 => -wild,
                _ => rng.gen_range(0.0..wild),
            }
        };
        let s = SignalSnapshot {
            cut_rate: pick(&mut rng, 50.0),
            avg_motion: pick(&mut rng, 2.0),
            fast_scroll_count: rng.gen_range(0..100),
            elapsed_secs: pick(&mut rng, 1e6) as f64,
            dom_change_count: rng.gen_range(0..500),
            active_video_count: rng.gen_range(0..20),
        };
        let u = agg.update(i * 1000, &s);
        assert!(
            (0.0..=100.0).contains(&u.score),
            "score {} out of range at step {}",
            u.score,
            i
        );
        let subs = u.sub_scores;
        for v in [
            subs.scene_cut,
            subs.scroll,
            subs.time_on_page,
            subs.content_change,
            subs.active_video,
        ] {
            assert!((0.0..=100.0).contains(&v), "sub-score {} out of range", v);
        }
    }
}

#[test]
fn sub_scores_follow_their_formulas() {
    let s = SignalSnapshot {
        cut_rate: 4.0,
        avg_motion: 0.125,
        fast_scroll_count: 1,
        elapsed_secs: 540.0,
        dom_change_count: 5,
        active_video_count: 1,
    };
    let subs = sub_scores(&s, &ScoreConfig::default());
    assert!((subs.scene_cut - 50.0).abs() < 1e-4);
    assert!((subs.scroll - 20.0).abs() < 1e-4);
    // log10(1 + 9) * 50
    assert!((subs.time_on_page - 50.0).abs() < 1e-4);
    assert!((subs.content_change - 25.0).abs() < 1e-4);
    assert!((subs.active_video - 100.0 / 3.0).abs() < 1e-3);
}

#[test]
fn sensitivity_scales_raw_score() {
    let subs = sub_scores(
        &SignalSnapshot {
            dom_change_count: 20,
            ..SignalSnapshot::default()
        },
        &ScoreConfig::default(),
    );
    let low = ScoreAggregator::new(ScoreConfig::default(), 0.0).raw_score(&subs);
    let high = ScoreAggregator::new(ScoreConfig::default(), 1.0).raw_score(&subs);
    assert!((low - 15.0 * 0.5).abs() < 1e-4);
    assert!((high - 15.0 * 2.0).abs() < 1e-4);
}

#[test]
fn saturations_and_multiplier_follow_configuration() {
    let config = ScoreConfig {
        saturations: Saturations {
            cut_rate: 4.0,
            motion: 1.0,
            fast_scroll: 2.0,
            dom_change: 10.0,
            active_video: 1.0,
        },
        cut_rate_share: 1.0,
        sensitivity_min: 1.0,
        sensitivity_span: 0.0,
        ..ScoreConfig::default()
    };
    let subs = sub_scores(
        &SignalSnapshot {
            cut_rate: 4.0,
            fast_scroll_count: 1,
            dom_change_count: 5,
            active_video_count: 1,
            ..SignalSnapshot::default()
        },
        &config,
    );
    assert!((subs.scene_cut - 100.0).abs() < 1e-4);
    assert!((subs.scroll - 50.0).abs() < 1e-4);
    assert!((subs.content_change - 50.0).abs() < 1e-4);
    assert!((subs.active_video - 100.0).abs() < 1e-4);
    assert_eq!(sensitivity_multiplier(0.0, &config), 1.0);
    assert_eq!(sensitivity_multiplier(1.0, &config), 1.0);

    // Defaults give 35 for the same cut rate
    let defaults = sub_scores(
        &SignalSnapshot {
            cut_rate: 4.0,
            ..SignalSnapshot::default()
        },
        &ScoreConfig::default(),
    );
    assert!((defaults.scene_cut - 35.0).abs() < 1e-4);
}

#[test]
fn sensitivity_is_clamped() {
    let mut agg = ScoreAggregator::new(ScoreConfig::default(), 3.0);
    assert_eq!(agg.state().sensitivity, 1.0);
    agg.set_sensitivity(-2.0);
    assert_eq!(agg.state().sensitivity, 0.0);
    agg.set_sensitivity(f32::NAN);
    assert_eq!(agg.state().sensitivity, 0.0);
}

#[test]
fn history_is_bounded_and_ordered() {
    let mut agg = ScoreAggregator::new(
        ScoreConfig {
            history_len: 4,
            ..ScoreConfig::default()
        },
        0.5,
    );
    for i in 0..10 {
        agg.update(i * 1000, &saturated());
    }
    let stamps: Vec<u64> = agg.history().map(|u| u.timestamp_ms).collect();
    assert_eq!(stamps, vec![6000, 7000, 8000, 9000]);
    agg.reset();
    assert_eq!(agg.score(), 0.0);
    assert_eq!(agg.history().count(), 0);
}
