/// Compute a periodic Hamming window.
///
/// The periodic variant (denominator `n` rather than `n - 1`) satisfies the
/// constant overlap-add property at 50% overlap, which makes it the window of
/// choice for analysis/masking/resynthesis chains.
///
/// # Arguments
/// * `n` - Window length
///
/// # Returns
/// Hamming window of length `n`
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1.0];
    }
    let m = n as f64;
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / m).cos())
        .collect()
}

/// Compute a triangular window.
///
/// Matches the convention of scipy's `triang`: for even `n` the endpoints are
/// `1/n`, for odd `n` they are `2/(n + 1)`. The two halves of an even-length
/// triangular window sum to unit gain when overlapped, which is what the
/// segment cross-fade in the extended pipeline relies on.
///
/// # Arguments
/// * `n` - Window length
///
/// # Returns
/// Triangular window of length `n`
pub fn triangular(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1.0];
    }
    let mut window = vec![0.0f64; n];
    let half = n / 2;
    if n % 2 == 0 {
        for i in 0..half {
            window[i] = (2 * i + 1) as f64 / n as f64;
            window[n - 1 - i] = window[i];
        }
    } else {
        for i in 0..=half {
            window[i] = 2.0 * (i + 1) as f64 / (n + 1) as f64;
            window[n - 1 - i] = window[i];
        }
    }
    window
}

/// Compute the constant overlap-add gain of a window at a given hop.
///
/// This is the sum of the window samples taken every `step` samples,
/// `w[0] + w[step] + w[2 step] + ...`. For a window satisfying COLA at that
/// hop, dividing an overlap-added resynthesis by this gain restores unit
/// amplitude.
pub fn cola_gain(window: &[f64], step: usize) -> f64 {
    if step == 0 {
        return 0.0;
    }
    window.iter().step_by(step).sum()
}
