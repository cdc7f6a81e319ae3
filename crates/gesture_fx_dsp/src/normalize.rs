//! Output Gain and Peak Normalization
//!
//! Volume is a plain linear multiply. Normalization is buffer-local: when the
//! loudest sample exceeds full scale the whole buffer is divided by that peak,
//! so the output never clips. Quieter buffers pass through untouched, which
//! means loudness can jump between buffers that straddle the limit.

/// Largest absolute sample in `buffer` (0.0 for an empty buffer)
#[inline]
pub fn peak(buffer: &[f32]) -> f32 {
    buffer.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
}

/// Multiply every sample by `gain`
///
/// # Real-time Safety
/// No allocations, O(n) time.
#[inline]
pub fn apply_gain(buffer: &mut [f32], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for sample in buffer.iter_mut() {
        *sample *= gain;
    }
}

/// Scale `buffer` into [-1.0, 1.0] if its peak exceeds 1.0
///
/// Returns the divisor applied (1.0 when the buffer was left alone).
#[inline]
pub fn peak_normalize(buffer: &mut [f32]) -> f32 {
    let max = peak(buffer);
    if max > 1.0 {
        let scale = 1.0 / max;
        for sample in buffer.iter_mut() {
            *sample = (*sample * scale).clamp(-1.0, 1.0);
        }
        max
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak() {
        assert_eq!(peak(&[]), 0.0);
        assert_eq!(peak(&[0.1, -0.7, 0.3]), 0.7);
    }

    #[test]
    fn test_below_full_scale_untouched() {
        let mut buffer = vec![0.5, -1.0, 0.25];
        let divisor = peak_normalize(&mut buffer);

        assert_eq!(divisor, 1.0);
        assert_eq!(buffer, vec![0.5, -1.0, 0.25]);
    }

    #[test]
    fn test_over_full_scale_divided_by_peak() {
        let mut buffer = vec![1.0, -2.0, 0.5];
        let divisor = peak_normalize(&mut buffer);

        assert_eq!(divisor, 2.0);
        assert_eq!(buffer, vec![0.5, -1.0, 0.25]);
    }

    #[test]
    fn test_normalized_never_exceeds_one() {
        let mut buffer: Vec<f32> = (0..100).map(|i| (i as f32 * 0.37).sin() * 7.3).collect();
        peak_normalize(&mut buffer);
        assert!(buffer.iter().all(|s| s.abs() <= 1.0));
        assert!((peak(&buffer) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_gain() {
        let mut buffer = vec![0.5, -0.25];
        apply_gain(&mut buffer, 0.5);
        assert_eq!(buffer, vec![0.25, -0.125]);

        apply_gain(&mut buffer, 0.0);
        assert_eq!(buffer, vec![0.0, -0.0]);
    }
}
