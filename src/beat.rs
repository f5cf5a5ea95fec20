use ndarray::Array2;
use realfft::RealFftPlanner;

/// Compute the column-wise unbiased autocorrelation of a matrix.
///
/// Uses the Wiener-Khinchin theorem: each column is zero-padded to twice its
/// length, transformed, turned into a power spectral density, and transformed
/// back. Row `r` of the result holds the lag-`r` correlation divided by
/// `rows - r` (the unbiased estimator).
///
/// # Arguments
/// * `data` - Input matrix (n_points x n_columns)
///
/// # Returns
/// Autocorrelation matrix with the same shape as the input
pub fn autocorrelate(data: &Array2<f64>) -> Array2<f64> {
    let number_points = data.nrows();
    let number_columns = data.ncols();
    if number_points == 0 || number_columns == 0 {
        return Array2::zeros((number_points, number_columns));
    }

    let padded_length = 2 * number_points;
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(padded_length);
    let c2r = planner.plan_fft_inverse(padded_length);

    let mut autocorrelation = Array2::<f64>::zeros((number_points, number_columns));
    let mut in_buf = r2c.make_input_vec();
    let mut spectrum = r2c.make_output_vec();
    let mut out_buf = c2r.make_output_vec();
    let scale = 1.0 / padded_length as f64;

    for column in 0..number_columns {
        in_buf[..number_points]
            .iter_mut()
            .enumerate()
            .for_each(|(i, v)| *v = data[(i, column)]);
        in_buf[number_points..].fill(0.0);
        let _ = r2c.process(&mut in_buf, &mut spectrum);
        for bin in spectrum.iter_mut() {
            *bin = num_complex::Complex64::new(bin.norm_sqr(), 0.0);
        }
        let _ = c2r.process(&mut spectrum, &mut out_buf);
        for lag in 0..number_points {
            autocorrelation[(lag, column)] =
                out_buf[lag] * scale / (number_points - lag) as f64;
        }
    }

    autocorrelation
}

/// Compute the beat spectrum of a magnitude spectrogram.
///
/// The beat spectrum is the mean over frequency channels of the unbiased
/// autocorrelation of every channel along time; peaks mark lags at which the
/// spectrogram repeats itself.
///
/// # Arguments
/// * `spectrogram` - Magnitude (or power) spectrogram (n_freq x n_frames)
///
/// # Returns
/// Beat spectrum of length n_frames
pub fn beat_spectrum(spectrogram: &Array2<f64>) -> Vec<f64> {
    let autocorrelation = autocorrelate(&spectrogram.t().to_owned());
    let number_lags = autocorrelation.nrows();
    let number_channels = autocorrelation.ncols();
    let mut beat = vec![0.0f64; number_lags];
    if number_channels == 0 {
        return beat;
    }
    for lag in 0..number_lags {
        let mut sum = 0.0;
        for channel in 0..number_channels {
            sum += autocorrelation[(lag, channel)];
        }
        beat[lag] = sum / number_channels as f64;
    }
    beat
}

/// Compute the beat spectrogram of a magnitude spectrogram.
///
/// A beat spectrum is computed every `segment_step` frames on a
/// `segment_length`-frame window centered on the current frame (the
/// spectrogram is zero-padded at both ends), and the resulting column is
/// replicated into the intervening frames.
///
/// # Arguments
/// * `spectrogram` - Magnitude (or power) spectrogram (n_freq x n_frames)
/// * `segment_length` - Analysis window, in frames
/// * `segment_step` - Stride between analyses, in frames
///
/// # Returns
/// Beat spectrogram of shape (segment_length, n_frames)
pub fn beat_spectrogram(
    spectrogram: &Array2<f64>,
    segment_length: usize,
    segment_step: usize,
) -> Array2<f64> {
    let number_frequencies = spectrogram.nrows();
    let number_times = spectrogram.ncols();
    let step = segment_step.max(1);

    let pad_left = segment_length.saturating_sub(1).div_ceil(2);
    let pad_right = segment_length.saturating_sub(1) / 2;
    let mut padded = Array2::<f64>::zeros((number_frequencies, number_times + pad_left + pad_right));
    for f in 0..number_frequencies {
        for t in 0..number_times {
            padded[(f, pad_left + t)] = spectrogram[(f, t)];
        }
    }

    let mut beat = Array2::<f64>::zeros((segment_length, number_times));
    let mut anchor = 0;
    while anchor < number_times {
        let mut segment = Array2::<f64>::zeros((number_frequencies, segment_length));
        for f in 0..number_frequencies {
            for t in 0..segment_length {
                segment[(f, t)] = padded[(f, anchor + t)];
            }
        }
        let column = beat_spectrum(&segment);
        for t in anchor..(anchor + step).min(number_times) {
            for (lag, &value) in column.iter().enumerate() {
                beat[(lag, t)] = value;
            }
        }
        anchor += step;
    }

    beat
}

// Argmax over lags lo+1..=hi of one beat spectrum column; first maximum wins.
fn peak_lag(column: impl Fn(usize) -> f64, lo: usize, hi: usize) -> usize {
    let mut best_lag = lo + 1;
    let mut best_value = column(lo + 1);
    for lag in lo + 2..=hi {
        let value = column(lag);
        if value > best_value {
            best_value = value;
            best_lag = lag;
        }
    }
    best_lag
}

// The period search skips lag zero and is capped at a third of the window so
// that at least three repetitions fit in the segment the median sees.
fn search_bounds(
    number_lags: usize,
    period_range: (usize, usize),
) -> crate::Result<(usize, usize)> {
    let (lo, hi) = period_range;
    let hi = hi.min(number_lags / 3);
    if lo + 1 > hi {
        return Err(crate::Error::DegenerateStructure(format!(
            "no candidate period in lags {}..={} of a {}-lag beat spectrum",
            lo + 1,
            hi,
            number_lags
        )));
    }
    Ok((lo, hi))
}

/// Estimate the repeating period from a beat spectrum.
///
/// # Arguments
/// * `beat_spectrum` - Beat spectrum values, lag zero first
/// * `period_range` - Inclusive lag range to search, in frames
///
/// # Returns
/// The lag of the strongest repetition peak, in frames
///
/// # Errors
/// Returns [`crate::Error::DegenerateStructure`] when the search range is
/// empty after capping at a third of the spectrum length.
pub fn repeating_period(
    beat_spectrum: &[f64],
    period_range: (usize, usize),
) -> crate::Result<usize> {
    let (lo, hi) = search_bounds(beat_spectrum.len(), period_range)?;
    Ok(peak_lag(|lag| beat_spectrum[lag], lo, hi))
}

/// Estimate one repeating period per frame from a beat spectrogram.
///
/// # Arguments
/// * `beat_spectrogram` - Beat spectrogram (n_lags x n_frames)
/// * `period_range` - Inclusive lag range to search, in frames
///
/// # Returns
/// One period per frame, in frames
///
/// # Errors
/// Returns [`crate::Error::DegenerateStructure`] when the search range is
/// empty after capping at a third of the lag count.
pub fn repeating_periods(
    beat_spectrogram: &Array2<f64>,
    period_range: (usize, usize),
) -> crate::Result<Vec<usize>> {
    let (lo, hi) = search_bounds(beat_spectrogram.nrows(), period_range)?;
    Ok((0..beat_spectrogram.ncols())
        .map(|t| peak_lag(|lag| beat_spectrogram[(lag, t)], lo, hi))
        .collect())
}
