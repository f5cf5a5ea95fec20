use crate::window::cola_gain;
use ndarray::Array2;
use num_complex::Complex64;
use rustfft::FftPlanner;

/// Analysis window length for a sampling frequency.
///
/// The window covers 40 ms rounded up to the next power of two, e.g. 2048
/// samples at 44.1 kHz and 512 samples at 8 kHz.
pub fn window_length(sampling_frequency: f64) -> usize {
    2usize.pow((0.04 * sampling_frequency).log2().ceil() as u32)
}

/// Compute the centered Short-Time Fourier Transform of a mono signal.
///
/// The signal is zero-padded by half a window on the left so that analysis
/// windows are centered on samples, and by enough on the right that the
/// frames exactly cover the padded signal. Every frame is windowed and
/// transformed with a full-size FFT; the redundant negative-frequency bins
/// are kept so that a mirrored mask can be applied directly to the output.
///
/// # Arguments
/// * `signal` - Mono input samples
/// * `window` - Analysis window (its length sets the FFT size)
/// * `step` - Hop between consecutive frames, in samples
///
/// # Returns
/// Complex STFT matrix of shape (window_length, n_frames)
///
/// # Errors
/// Returns an error if the signal or window is empty, or if the step is zero.
pub fn stft(signal: &[f64], window: &[f64], step: usize) -> crate::Result<Array2<Complex64>> {
    if signal.is_empty() {
        return Err(crate::Error::EmptyAudio);
    }
    if window.is_empty() {
        return Err(crate::Error::InvalidSize {
            name: "window",
            value: 0,
            reason: "must be non-empty",
        });
    }
    if step == 0 {
        return Err(crate::Error::InvalidSize {
            name: "step",
            value: 0,
            reason: "must be > 0",
        });
    }

    let window_length = window.len();
    let half_window = window_length / 2;
    let number_samples = signal.len();

    // Frame count over the padded signal, then pad the tail so the last
    // frame fits exactly.
    let number_times = (number_samples + 2 * half_window - window_length).div_ceil(step) + 1;
    let padded_length = (number_times - 1) * step + window_length;

    let mut padded = vec![0.0f64; padded_length];
    padded[half_window..half_window + number_samples].copy_from_slice(signal);

    let fft = FftPlanner::new().plan_fft_forward(window_length);
    let mut audio_stft = Array2::<Complex64>::zeros((window_length, number_times));
    let mut buffer = vec![Complex64::new(0.0, 0.0); window_length];
    for frame in 0..number_times {
        let start = frame * step;
        for i in 0..window_length {
            buffer[i] = Complex64::new(padded[start + i] * window[i], 0.0);
        }
        fft.process(&mut buffer);
        for (f, &value) in buffer.iter().enumerate() {
            audio_stft[(f, frame)] = value;
        }
    }

    Ok(audio_stft)
}

/// Invert a centered STFT by overlap-add.
///
/// Takes the real part of the inverse FFT of each column, overlap-adds at
/// the analysis hop and strips the `window_length - step` transient samples
/// from both ends. The inverse transform is left unnormalized inside the
/// frame loop; its 1/N factor is folded into the single division by the
/// constant overlap-add gain at the end. The result is truncated to
/// `length` samples.
///
/// # Arguments
/// * `audio_stft` - Complex STFT matrix (window_length x n_frames), full spectrum
/// * `window` - The analysis window used by the forward transform
/// * `step` - Hop between consecutive frames, in samples
/// * `length` - Number of output samples to keep
///
/// # Errors
/// Returns an error if the matrix is empty or its row count does not match
/// the window length.
pub fn istft(
    audio_stft: &Array2<Complex64>,
    window: &[f64],
    step: usize,
    length: usize,
) -> crate::Result<Vec<f64>> {
    let window_length = audio_stft.nrows();
    let number_times = audio_stft.ncols();
    if window_length == 0 || number_times == 0 {
        return Err(crate::Error::InvalidSize {
            name: "audio_stft",
            value: 0,
            reason: "STFT matrix must be non-empty",
        });
    }
    if window.len() != window_length {
        return Err(crate::Error::ShapeMismatch {
            expected: format!("window of length {window_length}"),
            got: format!("window of length {}", window.len()),
        });
    }
    if step == 0 || step > window_length {
        return Err(crate::Error::InvalidSize {
            name: "step",
            value: step,
            reason: "must be in 1..=window_length",
        });
    }

    let number_samples = number_times * step + (window_length - step);
    let mut signal = vec![0.0f64; number_samples];

    let ifft = FftPlanner::new().plan_fft_inverse(window_length);
    let mut buffer = vec![Complex64::new(0.0, 0.0); window_length];
    for frame in 0..number_times {
        for f in 0..window_length {
            buffer[f] = audio_stft[(f, frame)];
        }
        ifft.process(&mut buffer);
        let start = frame * step;
        for i in 0..window_length {
            signal[start + i] += buffer[i].re;
        }
    }

    // The analysis window appears once per sample after overlap-add, so one
    // division restores unit amplitude: the COLA gain times the FFT length
    // the unnormalized inverse transform left in place.
    let transient = window_length - step;
    let scale = window_length as f64 * cola_gain(window, step);
    let mut output: Vec<f64> = signal[transient..number_samples - transient]
        .iter()
        .map(|&v| v / scale)
        .collect();
    output.truncate(length);
    Ok(output)
}

/// Extract the magnitude spectrogram from a full-spectrum STFT.
///
/// Keeps the DC bin through the Nyquist bin, discarding the mirrored
/// negative frequencies.
///
/// # Returns
/// Non-negative matrix of shape (window_length / 2 + 1, n_frames)
pub fn magnitude(audio_stft: &Array2<Complex64>) -> Array2<f64> {
    let number_frequencies = audio_stft.nrows() / 2 + 1;
    let number_times = audio_stft.ncols();
    let mut spectrogram = Array2::<f64>::zeros((number_frequencies, number_times));
    for f in 0..number_frequencies {
        for t in 0..number_times {
            spectrogram[(f, t)] = audio_stft[(f, t)].norm();
        }
    }
    spectrogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::hamming;

    #[test]
    fn test_window_length_values() {
        assert_eq!(window_length(44100.0), 2048);
        assert_eq!(window_length(22050.0), 1024);
        assert_eq!(window_length(8000.0), 512);
    }

    #[test]
    fn test_stft_shape() {
        let signal: Vec<f64> = (0..4000).map(|i| (i as f64 * 0.02).sin()).collect();
        let window = hamming(512);
        let stft_matrix = stft(&signal, &window, 256).unwrap();
        assert_eq!(stft_matrix.nrows(), 512);
        // ceil((4000 + 512 - 512) / 256) + 1 frames
        assert_eq!(stft_matrix.ncols(), 4000usize.div_ceil(256) + 1);
    }

    #[test]
    fn test_stft_istft_roundtrip() {
        let signal: Vec<f64> = (0..3000)
            .map(|i| (i as f64 * 0.013).sin() + 0.3 * (i as f64 * 0.047).cos())
            .collect();
        let window = hamming(512);
        let stft_matrix = stft(&signal, &window, 256).unwrap();
        let reconstructed = istft(&stft_matrix, &window, 256, signal.len()).unwrap();
        assert_eq!(reconstructed.len(), signal.len());

        let mut num = 0.0f64;
        let mut den = 0.0f64;
        for (a, b) in signal.iter().zip(reconstructed.iter()) {
            num += (a - b) * (a - b);
            den += a * a;
        }
        assert!((num / den).sqrt() < 1e-10);
    }

    #[test]
    fn test_stft_empty_input() {
        let window = hamming(512);
        assert!(stft(&[], &window, 256).is_err());
    }

    #[test]
    fn test_istft_window_mismatch() {
        let stft_matrix = Array2::<Complex64>::zeros((512, 4));
        let window = hamming(256);
        assert!(istft(&stft_matrix, &window, 128, 1000).is_err());
    }

    #[test]
    fn test_magnitude_nonnegative() {
        let signal: Vec<f64> = (0..2000).map(|i| (i as f64 * 0.02).sin()).collect();
        let window = hamming(512);
        let stft_matrix = stft(&signal, &window, 256).unwrap();
        let spectrogram = magnitude(&stft_matrix);
        assert_eq!(spectrogram.nrows(), 257);
        assert!(spectrogram.iter().all(|&v| v >= 0.0));
    }
}
