use ndarray::Array2;

// Median of a scratch buffer, averaging the two middle elements for even
// counts. The buffer is reordered in place.
pub(crate) fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    debug_assert!(n > 0);
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

// Soft mask from a repeating spectrogram that has already been clamped by
// the original: (repeating + eps) / (original + eps), in (0, 1].
fn ratio_mask(repeating: &Array2<f64>, original: &Array2<f64>) -> Array2<f64> {
    let mut mask = Array2::<f64>::zeros(original.raw_dim());
    for ((index, &original_value), &repeating_value) in
        original.indexed_iter().zip(repeating.iter())
    {
        mask[index] = (repeating_value + f64::EPSILON) / (original_value + f64::EPSILON);
    }
    mask
}

/// Build the repeating mask for a fixed repeating period.
///
/// The spectrogram is cut into `⌈n_frames / period⌉` consecutive segments of
/// `period` frames (the last one partial). The repeating segment is the
/// per-bin median across segments: offsets covered by every segment use all
/// of them, offsets past the end of the partial segment use only the full
/// ones. Each frame's repeating spectrum is that segment clamped by the
/// frame itself, and the mask is the epsilon-regularized ratio of repeating
/// to original energy.
///
/// # Arguments
/// * `spectrogram` - Half-spectrum magnitude spectrogram (n_freq x n_frames)
/// * `period` - Repeating period, in frames (must be >= 1)
///
/// # Returns
/// Soft mask of the same shape, values in (0, 1]
pub fn repeating_mask(spectrogram: &Array2<f64>, period: usize) -> Array2<f64> {
    let number_frequencies = spectrogram.nrows();
    let number_times = spectrogram.ncols();
    let period = period.max(1);
    let number_segments = number_times.div_ceil(period);
    // Offsets below this bound exist in every segment, including the last.
    let full_bound = number_times - (number_segments - 1) * period;

    let mut repeating_segment = Array2::<f64>::zeros((number_frequencies, period));
    let mut scratch: Vec<f64> = Vec::with_capacity(number_segments);
    for offset in 0..period.min(number_times) {
        let segments = if offset < full_bound {
            number_segments
        } else {
            number_segments - 1
        };
        for f in 0..number_frequencies {
            scratch.clear();
            for segment in 0..segments {
                scratch.push(spectrogram[(f, segment * period + offset)]);
            }
            repeating_segment[(f, offset)] = median(&mut scratch);
        }
    }

    let mut repeating = Array2::<f64>::zeros((number_frequencies, number_times));
    for t in 0..number_times {
        let offset = t % period;
        for f in 0..number_frequencies {
            repeating[(f, t)] = repeating_segment[(f, offset)].min(spectrogram[(f, t)]);
        }
    }

    ratio_mask(&repeating, spectrogram)
}

/// Build the repeating mask for a time-varying repeating period.
///
/// For frame `i` with period `p`, the repeating spectrum is the per-bin
/// median over the frames `i + k·p` for `k` centered on zero with
/// `filter_order` taps, clipped to the spectrogram bounds, clamped by the
/// frame itself.
///
/// # Arguments
/// * `spectrogram` - Half-spectrum magnitude spectrogram (n_freq x n_frames)
/// * `periods` - One repeating period per frame, in frames
/// * `filter_order` - Number of median taps per frame
///
/// # Returns
/// Soft mask of the same shape, values in (0, 1]
pub fn adaptive_mask(
    spectrogram: &Array2<f64>,
    periods: &[usize],
    filter_order: usize,
) -> Array2<f64> {
    let number_frequencies = spectrogram.nrows();
    let number_times = spectrogram.ncols();
    let center = filter_order.div_ceil(2) as isize;

    let mut repeating = Array2::<f64>::zeros((number_frequencies, number_times));
    let mut frames: Vec<usize> = Vec::with_capacity(filter_order);
    let mut scratch: Vec<f64> = Vec::with_capacity(filter_order);
    for t in 0..number_times.min(periods.len()) {
        let period = periods[t] as isize;
        frames.clear();
        for tap in 1..=filter_order as isize {
            let frame = t as isize + (tap - center) * period;
            if frame >= 0 && (frame as usize) < number_times {
                frames.push(frame as usize);
            }
        }
        for f in 0..number_frequencies {
            scratch.clear();
            scratch.extend(frames.iter().map(|&frame| spectrogram[(f, frame)]));
            let value = median(&mut scratch);
            repeating[(f, t)] = value.min(spectrogram[(f, t)]);
        }
    }

    ratio_mask(&repeating, spectrogram)
}

/// Build the repeating mask from per-frame similarity indices.
///
/// For frame `i`, the repeating spectrum is the per-bin median over the
/// frames listed in `indices[i]`, clamped by the frame itself.
///
/// # Arguments
/// * `spectrogram` - Half-spectrum magnitude spectrogram (n_freq x n_frames)
/// * `indices` - One list of repeating frames per frame
///
/// # Returns
/// Soft mask of the same shape, values in (0, 1]
///
/// # Errors
/// Returns [`crate::Error::DegenerateStructure`] if any frame has an empty
/// index list (no repetition was found for it).
pub fn sim_mask(
    spectrogram: &Array2<f64>,
    indices: &[Vec<usize>],
) -> crate::Result<Array2<f64>> {
    let number_frequencies = spectrogram.nrows();
    let number_times = spectrogram.ncols();
    if indices.len() < number_times {
        return Err(crate::Error::ShapeMismatch {
            expected: format!("{number_times} index lists"),
            got: format!("{}", indices.len()),
        });
    }

    let mut repeating = Array2::<f64>::zeros((number_frequencies, number_times));
    let mut scratch: Vec<f64> = Vec::new();
    for t in 0..number_times {
        if indices[t].is_empty() {
            return Err(crate::Error::DegenerateStructure(format!(
                "no similar frame found for frame {t}"
            )));
        }
        for f in 0..number_frequencies {
            scratch.clear();
            scratch.extend(indices[t].iter().map(|&frame| spectrogram[(f, frame)]));
            let value = median(&mut scratch);
            repeating[(f, t)] = value.min(spectrogram[(f, t)]);
        }
    }

    Ok(ratio_mask(&repeating, spectrogram))
}

/// Override the low-frequency rows of a mask with ones.
///
/// Rows 1 through `cutoff_bin` (the DC row excluded) are forced to 1.0 so
/// that all low-frequency energy is allocated to the background.
pub fn highpass(mask: &mut Array2<f64>, cutoff_bin: usize) {
    let stop = cutoff_bin.min(mask.nrows().saturating_sub(1));
    for f in 1..=stop {
        for t in 0..mask.ncols() {
            mask[(f, t)] = 1.0;
        }
    }
}

/// Mirror a half-spectrum mask onto the full FFT length.
///
/// Appends rows `n_freq - 2` down to 1 (excluding both the DC and the
/// Nyquist rows, which appear once), producing `2 · (n_freq - 1)` rows.
pub fn mirror(mask: &Array2<f64>) -> Array2<f64> {
    let number_frequencies = mask.nrows();
    let number_times = mask.ncols();
    let full_length = 2 * (number_frequencies - 1);
    let mut full = Array2::<f64>::zeros((full_length, number_times));
    for f in 0..number_frequencies {
        for t in 0..number_times {
            full[(f, t)] = mask[(f, t)];
        }
    }
    for f in number_frequencies..full_length {
        let source = full_length - f;
        for t in 0..number_times {
            full[(f, t)] = mask[(source, t)];
        }
    }
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_repeating_mask_constant_spectrogram() {
        // A perfectly repeating spectrogram passes through untouched.
        let spectrogram = Array2::<f64>::from_elem((5, 12), 2.0);
        let mask = repeating_mask(&spectrogram, 4);
        for &value in mask.iter() {
            assert_relative_eq!(value, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_repeating_mask_range() {
        let mut spectrogram = Array2::<f64>::zeros((4, 10));
        for ((f, t), value) in spectrogram.indexed_iter_mut() {
            *value = ((f * 7 + t * 3) % 5) as f64 + 0.1;
        }
        let mask = repeating_mask(&spectrogram, 3);
        assert!(mask.iter().all(|&v| v > 0.0 && v <= 1.0));
    }

    #[test]
    fn test_repeating_mask_suppresses_outlier() {
        // A one-frame burst on top of a repeating floor is masked down.
        let mut spectrogram = Array2::<f64>::from_elem((3, 12), 1.0);
        spectrogram[(1, 5)] = 10.0;
        let mask = repeating_mask(&spectrogram, 4);
        assert!(mask[(1, 5)] < 0.2);
        assert_relative_eq!(mask[(0, 5)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_repeating_mask_partial_last_segment() {
        // 10 frames, period 4: the last segment holds only 2 frames, so
        // offsets 2 and 3 take their median over the first two segments.
        let mut spectrogram = Array2::<f64>::zeros((1, 10));
        for t in 0..10 {
            spectrogram[(0, t)] = t as f64;
        }
        let mask = repeating_mask(&spectrogram, 4);
        assert!(mask.iter().all(|&v| v > 0.0 && v <= 1.0));
        // Offset 0 median over frames {0, 4, 8} = 4; frame 8 (value 8)
        // is clamped down by it.
        let expected = (4.0 + f64::EPSILON) / (8.0 + f64::EPSILON);
        assert_relative_eq!(mask[(0, 8)], expected, epsilon = 1e-12);
        // Offset 2 median over frames {2, 6} only = 4.
        let expected = (4.0 + f64::EPSILON) / (6.0 + f64::EPSILON);
        assert_relative_eq!(mask[(0, 6)], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_adaptive_mask_constant_period() {
        let spectrogram = Array2::<f64>::from_elem((4, 20), 3.0);
        let periods = vec![5usize; 20];
        let mask = adaptive_mask(&spectrogram, &periods, 5);
        for &value in mask.iter() {
            assert_relative_eq!(value, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sim_mask_identical_frames() {
        let spectrogram = Array2::<f64>::from_elem((4, 3), 2.0);
        let indices = vec![vec![0, 1, 2], vec![0, 2], vec![1]];
        let mask = sim_mask(&spectrogram, &indices).unwrap();
        for &value in mask.iter() {
            assert_relative_eq!(value, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sim_mask_empty_indices() {
        let spectrogram = Array2::<f64>::from_elem((4, 2), 1.0);
        let indices = vec![vec![0], vec![]];
        assert!(sim_mask(&spectrogram, &indices).is_err());
    }

    #[test]
    fn test_highpass_rows() {
        let mut mask = Array2::<f64>::zeros((6, 4));
        highpass(&mut mask, 3);
        for t in 0..4 {
            assert_relative_eq!(mask[(0, t)], 0.0, epsilon = 1e-12);
            for f in 1..=3 {
                assert_relative_eq!(mask[(f, t)], 1.0, epsilon = 1e-12);
            }
            assert_relative_eq!(mask[(4, t)], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_mirror_shape_and_symmetry() {
        let mut mask = Array2::<f64>::zeros((5, 2));
        for ((f, t), value) in mask.indexed_iter_mut() {
            *value = (f * 10 + t) as f64;
        }
        let full = mirror(&mask);
        assert_eq!(full.dim(), (8, 2));
        for t in 0..2 {
            // DC and Nyquist appear once; the rest mirrors.
            assert_relative_eq!(full[(0, t)], mask[(0, t)], epsilon = 1e-12);
            assert_relative_eq!(full[(4, t)], mask[(4, t)], epsilon = 1e-12);
            assert_relative_eq!(full[(5, t)], mask[(3, t)], epsilon = 1e-12);
            assert_relative_eq!(full[(6, t)], mask[(2, t)], epsilon = 1e-12);
            assert_relative_eq!(full[(7, t)], mask[(1, t)], epsilon = 1e-12);
        }
    }
}
