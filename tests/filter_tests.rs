// Host-side tests for what the effect sink writes to the page.
// The main crate is wasm-only, so we include the pure-Rust modules directly.

#![allow(dead_code)]
mod contract {
    include!("../src/contract.rs");
}
mod constants {
    include!("../src/constants.rs");
}

use calm_core::{targets_for_intensity, EffectBounds, EffectConfig, EffectState};
use contract::*;

#[test]
fn neutral_state_clears_the_filter() {
    assert_eq!(css_filter(&EffectState::NEUTRAL), "none");
}

#[test]
fn filter_lists_every_visual_channel() {
    let s = targets_for_intensity(1.0, &EffectBounds::default());
    assert_eq!(
        css_filter(&s),
        "grayscale(1.000) saturate(0.200) brightness(0.750) blur(2.00px)"
    );
}

#[test]
fn breathe_preset_renders() {
    let preset = EffectConfig::default().breathe_preset;
    assert_eq!(
        css_filter(&preset),
        "grayscale(0.600) saturate(0.400) brightness(0.850) blur(0.80px)"
    );
}

#[test]
fn audio_is_rescheduled_only_on_real_moves() {
    assert!(needs_audio_reschedule(None, 0.0));
    assert!(!needs_audio_reschedule(Some(0.5), 0.503));
    assert!(needs_audio_reschedule(Some(0.5), 0.51));
    // settling to silence always lands exactly
    assert!(needs_audio_reschedule(Some(0.004), 0.0));
    assert!(!needs_audio_reschedule(Some(0.0), 0.0));
}

#[test]
fn playback_rate_scales_page_choice() {
    assert!((scaled_playback_rate(1.5, 0.8) - 1.2).abs() < 1e-6);
    assert!(!needs_rate_update(1.0, 1.0005));
    assert!(needs_rate_update(1.0, 0.99));
}

#[test]
fn shader_workgroup_matches_dispatch() {
    let wgsl = include_str!("../shaders/chi_squared.wgsl");
    let attr = format!("@workgroup_size({})", constants::DISTANCE_WORKGROUP_SIZE);
    assert!(wgsl.contains(&attr), "shader does not declare {}", attr);
}

#[test]
fn element_cache_creates_once_per_element() {
    let mut cache: ElementCache<u32, String> = ElementCache::default();
    let mut created = 0;
    for _ in 0..3 {
        let v = cache.get_or_try_insert(&7, || {
            created += 1;
            Ok::<_, ()>("node-7".to_string())
        });
        assert_eq!(v, Ok("node-7".to_string()));
    }
    assert_eq!(created, 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn element_cache_failed_create_is_not_stored() {
    let mut cache: ElementCache<u32, String> = ElementCache::default();
    assert_eq!(cache.get_or_try_insert(&1, || Err("tainted")), Err("tainted"));
    assert_eq!(cache.len(), 0);
    let retried = cache.get_or_try_insert(&1, || Ok::<_, &str>("ok".to_string()));
    assert_eq!(retried, Ok("ok".to_string()));
}

#[test]
fn element_cache_drops_removed_elements() {
    let mut cache: ElementCache<u32, u32> = ElementCache::default();
    for id in 0..100u32 {
        let _ = cache.get_or_try_insert(&id, || Ok::<_, ()>(id * 10));
    }
    // A feed that keeps only the last five items in the document
    let live = |id: &u32| *id >= 95;
    assert_eq!(cache.prune(live), 95);
    assert_eq!(cache.len(), 5);
    assert_eq!(cache.prune(live), 0);
    // Surviving entries are served from the cache
    assert_eq!(cache.get_or_try_insert(&99, || Ok::<_, ()>(0)), Ok(990));
    // A re-inserted element gets a fresh entry
    assert_eq!(cache.get_or_try_insert(&3, || Ok::<_, ()>(31)), Ok(31));
    assert_eq!(cache.len(), 6);
}
