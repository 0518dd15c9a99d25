//! Colour histograms and the chi-squared distance used for scene-cut detection.

use crate::error::CalmError;
use smallvec::SmallVec;

/// Normalised frequency distribution over a fixed number of bins.
///
/// For frame histograms the bins are laid out as `[R.., G.., B..]`, each
/// channel summing to 1.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    bins: SmallVec<[f32; 48]>,
}

impl Histogram {
    /// Builds a histogram from values that are already normalised.
    pub fn from_values(values: &[f32]) -> Result<Self, CalmError> {
        if values.is_empty() {
            return Err(CalmError::EmptyHistogram);
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite() || *v < 0.0) {
            return Err(CalmError::InvalidHistogramValue(i));
        }
        Ok(Self {
            bins: SmallVec::from_slice(values),
        })
    }

    /// Builds a histogram from raw per-channel counts, normalising each
    /// `channel_len` run by its own total. Channels with no samples stay zero.
    pub fn from_counts(counts: &[u32], channel_len: usize) -> Result<Self, CalmError> {
        if counts.is_empty() || channel_len == 0 {
            return Err(CalmError::EmptyHistogram);
        }
        let mut bins: SmallVec<[f32; 48]> = SmallVec::with_capacity(counts.len());
        for channel in counts.chunks(channel_len) {
            let total: u64 = channel.iter().map(|&c| c as u64).sum();
            for &c in channel {
                bins.push(if total > 0 {
                    c as f32 / total as f32
                } else {
                    0.0
                });
            }
        }
        Ok(Self { bins })
    }

    #[inline]
    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// The `index`-th run of `channel_len` bins, if present.
    pub fn channel(&self, index: usize, channel_len: usize) -> Option<&[f32]> {
        let start = index.checked_mul(channel_len)?;
        self.bins.get(start..start + channel_len)
    }

    pub fn distance(&self, other: &Histogram) -> Result<f32, CalmError> {
        chi_squared_distance(self.bins(), other.bins())
    }
}

/// Mean per-bin chi-squared term between two equal-length distributions.
///
/// Bins where both inputs are zero contribute nothing. The result is
/// symmetric, zero for identical inputs and never negative.
pub fn chi_squared_distance(a: &[f32], b: &[f32]) -> Result<f32, CalmError> {
    if a.len() != b.len() {
        return Err(CalmError::HistogramLengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Err(CalmError::EmptyHistogram);
    }
    let sum: f32 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| chi_squared_term(x, y))
        .sum();
    Ok(sum / a.len() as f32)
}

#[inline]
pub fn chi_squared_term(x: f32, y: f32) -> f32 {
    let s = x + y;
    if s > 0.0 {
        let d = x - y;
        d * d / s
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_counts_normalises_each_channel() {
        let h = Histogram::from_counts(&[1, 3, 0, 2, 1, 1], 2).unwrap();
        assert_eq!(h.bins(), &[0.25, 0.75, 0.0, 1.0, 0.5, 0.5]);
        assert_eq!(h.channel(1, 2), Some(&[0.0, 1.0][..]));
        assert_eq!(h.channel(2, 2), Some(&[0.5, 0.5][..]));
        assert_eq!(h.channel(3, 2), None);
    }

    #[test]
    fn empty_channel_stays_zero() {
        let h = Histogram::from_counts(&[0, 0, 2, 6], 2).unwrap();
        assert_eq!(h.bins(), &[0.0, 0.0, 0.25, 0.75]);
    }

    #[test]
    fn holds_a_full_frame_histogram_inline() {
        let h = Histogram::from_values(&[1.0 / 16.0; 48]).unwrap();
        assert!(!h.bins.spilled());
        assert_eq!(h.len(), 48);
    }

    #[test]
    fn rejects_negative_values() {
        assert_eq!(
            Histogram::from_values(&[0.5, -0.1]),
            Err(CalmError::InvalidHistogramValue(1))
        );
    }

    #[test]
    fn disjoint_distributions_have_distance_one_per_bin_pair() {
        // (1-0)^2/1 + (0-1)^2/1 over 2 bins
        let d = chi_squared_distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!((d - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_bins_contribute_nothing() {
        let d = chi_squared_distance(&[0.0, 0.0, 1.0], &[0.0, 0.0, 1.0]).unwrap();
        assert_eq!(d, 0.0);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert_eq!(
            chi_squared_distance(&[1.0], &[0.5, 0.5]),
            Err(CalmError::HistogramLengthMismatch { left: 1, right: 2 })
        );
    }
}
