// Pure helpers describing what the effect sink writes to the page.
// Kept free of web-sys so host tests can include this file directly.

use calm_core::EffectState;

// Minimum audio intensity change before new ramps are scheduled
pub const AUDIO_RESCHEDULE_EPSILON: f32 = 0.005;

// Minimum playback-rate change worth writing to the media element
pub const PLAYBACK_RATE_EPSILON: f64 = 0.001;

/// CSS `filter` value for an effect state; `none` when neutral.
pub fn css_filter(state: &EffectState) -> String {
    if state.is_neutral() {
        return "none".to_string();
    }
    format!(
        "grayscale({:.3}) saturate({:.3}) brightness({:.3}) blur({:.2}px)",
        state.grayscale, state.saturation, state.brightness, state.blur
    )
}

/// Whether the audio ramps need rescheduling for `next`. Always true for
/// the first value and when settling back to silence.
#[inline]
pub fn needs_audio_reschedule(last: Option<f32>, next: f32) -> bool {
    match last {
        None => true,
        Some(l) if next == 0.0 => l != 0.0,
        Some(l) => (l - next).abs() > AUDIO_RESCHEDULE_EPSILON,
    }
}

#[inline]
pub fn needs_rate_update(current: f64, target: f64) -> bool {
    (current - target).abs() > PLAYBACK_RATE_EPSILON
}

/// Playback rate to apply: the dampening factor scales the rate the page
/// itself had chosen.
#[inline]
pub fn scaled_playback_rate(base_rate: f64, factor: f32) -> f64 {
    base_rate * factor as f64
}

/// Values keyed by page element, created at most once per element.
///
/// Entries whose element has left the page are dropped by [`Self::prune`],
/// so the cache never outgrows the live document.
pub struct ElementCache<E, N> {
    entries: Vec<(E, N)>,
}

impl<E, N> Default for ElementCache<E, N> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: PartialEq + Clone, N: Clone> ElementCache<E, N> {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the cached value, or stores what `create` builds. A failed
    /// `create` leaves the cache untouched.
    pub fn get_or_try_insert<Err>(
        &mut self,
        element: &E,
        create: impl FnOnce() -> Result<N, Err>,
    ) -> Result<N, Err> {
        if let Some((_, value)) = self.entries.iter().find(|(e, _)| e == element) {
            return Ok(value.clone());
        }
        let value = create()?;
        self.entries.push((element.clone(), value.clone()));
        Ok(value)
    }

    /// Drops every entry whose element is no longer live. Returns how many went.
    pub fn prune(&mut self, mut is_live: impl FnMut(&E) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(e, _)| is_live(e));
        before - self.entries.len()
    }
}
