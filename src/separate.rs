use crate::beat::{beat_spectrogram, beat_spectrum, repeating_period, repeating_periods};
use crate::mask::{adaptive_mask, highpass, mirror, repeating_mask, sim_mask};
use crate::similarity::{local_maxima, self_similarity, similarity_indices};
use crate::spectrum::{istft, magnitude, stft, window_length};
use crate::window::{cola_gain, hamming, triangular};
use ndarray::{s, Array2, ArrayView2};
use num_complex::Complex64;
use rustfft::FftPlanner;

/// Tuning constants shared by the separation pipelines.
///
/// The defaults are the published REPET parameters; the plain pipeline
/// functions use them as-is, the `*_with_config` variants accept a
/// customized copy.
#[derive(Debug, Clone)]
pub struct RepetConfig {
    /// Frequency below which the background keeps all energy, in Hz.
    pub cutoff_frequency: f64,
    /// Repeating period search range, in seconds.
    pub period_range: (f64, f64),
    /// Segmentation window of the extended and adaptive pipelines, in seconds.
    pub segment_length: f64,
    /// Segmentation stride of the extended and adaptive pipelines, in seconds.
    pub segment_step: f64,
    /// Number of median taps of the adaptive pipeline.
    pub filter_order: usize,
    /// Minimum cosine similarity of a repeating frame.
    pub similarity_threshold: f64,
    /// Exclusion radius around a similar frame, in seconds.
    pub similarity_distance: f64,
    /// Maximum number of repeating frames per frame.
    pub similarity_number: usize,
    /// Past-frame buffer of the online pipeline, in seconds.
    pub buffer_length: f64,
}

impl Default for RepetConfig {
    fn default() -> Self {
        Self {
            cutoff_frequency: 100.0,
            period_range: (1.0, 10.0),
            segment_length: 10.0,
            segment_step: 5.0,
            filter_order: 5,
            similarity_threshold: 0.0,
            similarity_distance: 1.0,
            similarity_number: 100,
            buffer_length: 10.0,
        }
    }
}

// Analysis window and hop derived from the sampling frequency.
struct Transform {
    window: Vec<f64>,
    step: usize,
}

fn invalid(name: &'static str, value: String, reason: &str) -> crate::Error {
    crate::Error::InvalidParameter {
        name,
        value,
        reason: reason.to_string(),
    }
}

fn validate(
    audio: &Array2<f64>,
    sampling_frequency: f64,
    config: &RepetConfig,
) -> crate::Result<Transform> {
    if !(config.period_range.0 > 0.0) || config.period_range.1 <= config.period_range.0 {
        return Err(invalid(
            "period_range",
            format!("{:?}", config.period_range),
            "must satisfy 0 < lo < hi",
        ));
    }
    if !(config.segment_step > 0.0)
        || config.segment_length < config.segment_step
        || !(config.buffer_length > 0.0)
    {
        return Err(invalid(
            "segmentation",
            format!(
                "length {}, step {}, buffer {}",
                config.segment_length, config.segment_step, config.buffer_length
            ),
            "must satisfy 0 < step <= length and buffer > 0",
        ));
    }
    if config.filter_order == 0 || config.similarity_number == 0 {
        return Err(crate::Error::InvalidSize {
            name: "filter_order/similarity_number",
            value: 0,
            reason: "must be >= 1",
        });
    }
    if !(sampling_frequency > 0.0) || !sampling_frequency.is_finite() {
        return Err(invalid(
            "sampling_frequency",
            format!("{sampling_frequency}"),
            "must be a positive finite number of Hz",
        ));
    }
    if audio.nrows() == 0 || audio.ncols() == 0 {
        return Err(crate::Error::EmptyAudio);
    }
    let window_length = window_length(sampling_frequency);
    if window_length < 2 {
        return Err(invalid(
            "sampling_frequency",
            format!("{sampling_frequency}"),
            "too low for a power-of-two analysis window",
        ));
    }
    if audio.nrows() < window_length {
        return Err(crate::Error::SignalTooShort {
            samples: audio.nrows(),
            window_length,
        });
    }
    Ok(Transform {
        window: hamming(window_length),
        step: window_length / 2,
    })
}

fn to_frames(seconds: f64, sampling_frequency: f64, step: usize) -> usize {
    (seconds * sampling_frequency / step as f64).round() as usize
}

fn period_range_frames(config: &RepetConfig, sampling_frequency: f64, step: usize) -> (usize, usize) {
    (
        to_frames(config.period_range.0, sampling_frequency, step),
        to_frames(config.period_range.1, sampling_frequency, step),
    )
}

fn round_cutoff_bin(config: &RepetConfig, transform: &Transform, sampling_frequency: f64) -> usize {
    (config.cutoff_frequency * transform.window.len() as f64 / sampling_frequency).round() as usize
}

fn channel_stfts(
    audio: ArrayView2<f64>,
    transform: &Transform,
) -> crate::Result<Vec<Array2<Complex64>>> {
    (0..audio.ncols())
        .map(|c| stft(&audio.column(c).to_vec(), &transform.window, transform.step))
        .collect()
}

// Mean over channels of the half-spectrum magnitudes; squared when feeding
// the autocorrelation, where squaring sharpens the repetition peaks.
fn channel_mean(spectrograms: &[Array2<f64>], squared: bool) -> Array2<f64> {
    let mut mean = Array2::<f64>::zeros(spectrograms[0].raw_dim());
    for spectrogram in spectrograms {
        for (index, &value) in spectrogram.indexed_iter() {
            mean[index] += if squared { value * value } else { value };
        }
    }
    let channels = spectrograms.len() as f64;
    mean.mapv_inplace(|v| v / channels);
    mean
}

// Shared epilogue: high-pass override, mirror, mask the complex STFT, invert.
fn masked_background(
    audio_stft: &Array2<Complex64>,
    mut half_mask: Array2<f64>,
    cutoff_bin: usize,
    transform: &Transform,
    length: usize,
) -> crate::Result<Vec<f64>> {
    highpass(&mut half_mask, cutoff_bin);
    let full_mask = mirror(&half_mask);
    let mut background_stft = Array2::<Complex64>::zeros(audio_stft.raw_dim());
    for ((index, &bin), &weight) in audio_stft.indexed_iter().zip(full_mask.iter()) {
        background_stft[index] = bin * weight;
    }
    istft(&background_stft, &transform.window, transform.step, length)
}

fn channel_backgrounds<F>(channels: usize, compute: F) -> crate::Result<Vec<Vec<f64>>>
where
    F: Fn(usize) -> crate::Result<Vec<f64>> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..channels).into_par_iter().map(compute).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..channels).map(compute).collect()
    }
}

// Stack per-channel sample vectors into the output matrix and reject any
// non-finite result.
fn finish(channels: Vec<Vec<f64>>, number_samples: usize) -> crate::Result<Array2<f64>> {
    let mut background = Array2::<f64>::zeros((number_samples, channels.len()));
    for (c, samples) in channels.iter().enumerate() {
        for (i, &value) in samples.iter().take(number_samples).enumerate() {
            background[(i, c)] = value;
        }
    }
    ensure_finite(&background)?;
    Ok(background)
}

fn ensure_finite(background: &Array2<f64>) -> crate::Result<()> {
    if background.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(crate::Error::NonFiniteOutput)
    }
}

// One fixed-period separation pass, used directly by `original` and per
// segment by `extended`.
fn separate_fixed(
    audio: ArrayView2<f64>,
    transform: &Transform,
    period_range: (usize, usize),
    cutoff_bin: usize,
) -> crate::Result<Array2<f64>> {
    let number_samples = audio.nrows();
    let stfts = channel_stfts(audio, transform)?;
    let spectrograms: Vec<Array2<f64>> = stfts.iter().map(magnitude).collect();

    let beat = beat_spectrum(&channel_mean(&spectrograms, true));
    let period = repeating_period(&beat, period_range)?;

    let backgrounds = channel_backgrounds(stfts.len(), |c| {
        let half_mask = repeating_mask(&spectrograms[c], period);
        masked_background(&stfts[c], half_mask, cutoff_bin, transform, number_samples)
    })?;
    finish(backgrounds, number_samples)
}

/// Separate the repeating background with a single global repeating period.
///
/// Estimates one repeating period from the beat spectrum of the whole
/// mixture and models the background as the per-period median of the
/// magnitude spectrogram. The mixture has shape (n_samples, n_channels);
/// the background comes back with the same shape and the foreground is
/// `audio_signal - background`.
///
/// # Errors
/// Returns an error for empty input, a non-positive sampling frequency, a
/// signal shorter than one analysis window, or when no repeating period
/// exists in the configured range.
///
/// # Example
/// ```
/// use ndarray::Array2;
///
/// let samples = repet::synth::tone(440.0, 8000.0, 4.0, 0.5);
/// let mixture = Array2::from_shape_vec((samples.len(), 1), samples).unwrap();
/// let background = repet::separate::original(&mixture, 8000.0).unwrap();
/// assert_eq!(background.dim(), mixture.dim());
/// ```
pub fn original(audio_signal: &Array2<f64>, sampling_frequency: f64) -> crate::Result<Array2<f64>> {
    original_with_config(audio_signal, sampling_frequency, &RepetConfig::default())
}

/// [`original`] with custom tuning constants.
pub fn original_with_config(
    audio_signal: &Array2<f64>,
    sampling_frequency: f64,
    config: &RepetConfig,
) -> crate::Result<Array2<f64>> {
    let transform = validate(audio_signal, sampling_frequency, config)?;
    let period_range = period_range_frames(config, sampling_frequency, transform.step);
    let cutoff_bin = round_cutoff_bin(config, &transform, sampling_frequency);

    separate_fixed(audio_signal.view(), &transform, period_range, cutoff_bin)
}

/// Separate the repeating background with a sliding window.
///
/// Cuts the mixture into fixed-length segments, runs the [`original`]
/// machinery on each and reassembles them with a triangular cross-fade over
/// the segment overlap, letting the repeating period vary slowly over time.
/// A signal shorter than one segment plus one step is processed as a single
/// segment.
///
/// # Errors
/// Same conditions as [`original`].
pub fn extended(audio_signal: &Array2<f64>, sampling_frequency: f64) -> crate::Result<Array2<f64>> {
    extended_with_config(audio_signal, sampling_frequency, &RepetConfig::default())
}

/// [`extended`] with custom tuning constants.
pub fn extended_with_config(
    audio_signal: &Array2<f64>,
    sampling_frequency: f64,
    config: &RepetConfig,
) -> crate::Result<Array2<f64>> {
    let transform = validate(audio_signal, sampling_frequency, config)?;
    let period_range = period_range_frames(config, sampling_frequency, transform.step);
    let cutoff_bin = round_cutoff_bin(config, &transform, sampling_frequency);

    let number_samples = audio_signal.nrows();
    let number_channels = audio_signal.ncols();
    let segment_length = (config.segment_length * sampling_frequency).round() as usize;
    let segment_step = (config.segment_step * sampling_frequency).round() as usize;

    if number_samples < segment_length + segment_step {
        log::warn!(
            "signal shorter than one segment plus one step ({number_samples} samples), \
             falling back to single-segment separation"
        );
        return separate_fixed(audio_signal.view(), &transform, period_range, cutoff_bin);
    }

    let number_segments = 1 + (number_samples - segment_length) / segment_step;
    let segment_overlap = segment_length - segment_step;
    let crossfade = triangular(2 * segment_overlap);

    let mut background = Array2::<f64>::zeros((number_samples, number_channels));
    for segment in 0..number_segments {
        let start = segment * segment_step;
        // The last segment absorbs the tail of the signal.
        let stop = if segment + 1 < number_segments {
            start + segment_length
        } else {
            number_samples
        };
        let segment_background = separate_fixed(
            audio_signal.slice(s![start..stop, ..]),
            &transform,
            period_range,
            cutoff_bin,
        )?;

        if segment == 0 {
            background
                .slice_mut(s![0..segment_length, ..])
                .assign(&segment_background);
        } else {
            // Fade the buffer out and the new segment in over the overlap;
            // the two window halves sum to unit gain. Past the overlap the
            // buffer is still zero.
            for t in 0..segment_background.nrows() {
                for c in 0..number_channels {
                    let value = segment_background[(t, c)];
                    background[(start + t, c)] = if t < segment_overlap {
                        background[(start + t, c)] * crossfade[segment_overlap + t]
                            + value * crossfade[t]
                    } else {
                        background[(start + t, c)] + value
                    };
                }
            }
        }
    }

    ensure_finite(&background)?;
    Ok(background)
}

/// Separate the repeating background with a time-varying repeating period.
///
/// Estimates one repeating period per frame from a beat spectrogram and
/// models the background frame by frame as the median over a few
/// period-spaced neighbor frames.
///
/// # Errors
/// Same conditions as [`original`].
pub fn adaptive(audio_signal: &Array2<f64>, sampling_frequency: f64) -> crate::Result<Array2<f64>> {
    adaptive_with_config(audio_signal, sampling_frequency, &RepetConfig::default())
}

/// [`adaptive`] with custom tuning constants.
pub fn adaptive_with_config(
    audio_signal: &Array2<f64>,
    sampling_frequency: f64,
    config: &RepetConfig,
) -> crate::Result<Array2<f64>> {
    let transform = validate(audio_signal, sampling_frequency, config)?;
    let period_range = period_range_frames(config, sampling_frequency, transform.step);
    let cutoff_bin = round_cutoff_bin(config, &transform, sampling_frequency);
    let segment_length = to_frames(config.segment_length, sampling_frequency, transform.step).max(1);
    let segment_step = to_frames(config.segment_step, sampling_frequency, transform.step).max(1);

    let number_samples = audio_signal.nrows();
    let stfts = channel_stfts(audio_signal.view(), &transform)?;
    let spectrograms: Vec<Array2<f64>> = stfts.iter().map(magnitude).collect();

    let beat = beat_spectrogram(&channel_mean(&spectrograms, true), segment_length, segment_step);
    let periods = repeating_periods(&beat, period_range)?;

    let backgrounds = channel_backgrounds(stfts.len(), |c| {
        let half_mask = adaptive_mask(&spectrograms[c], &periods, config.filter_order);
        masked_background(&stfts[c], half_mask, cutoff_bin, &transform, number_samples)
    })?;
    finish(backgrounds, number_samples)
}

/// Separate the repeating background through non-periodic self-similarity.
///
/// Finds, for every frame, the most similar frames anywhere in the mixture
/// and models the background as their per-bin median, which captures
/// repetitions that recur without a fixed period.
///
/// # Errors
/// Same conditions as [`original`], with [`crate::Error::DegenerateStructure`]
/// raised when some frame has no similar frame at all.
pub fn sim(audio_signal: &Array2<f64>, sampling_frequency: f64) -> crate::Result<Array2<f64>> {
    sim_with_config(audio_signal, sampling_frequency, &RepetConfig::default())
}

/// [`sim`] with custom tuning constants.
pub fn sim_with_config(
    audio_signal: &Array2<f64>,
    sampling_frequency: f64,
    config: &RepetConfig,
) -> crate::Result<Array2<f64>> {
    let transform = validate(audio_signal, sampling_frequency, config)?;
    let distance_frames = to_frames(config.similarity_distance, sampling_frequency, transform.step);
    // Historical quirk kept on purpose: this pipeline rounds the cutoff bin
    // up from window_length - 1 where the others round from window_length.
    // See the crate documentation.
    let cutoff_bin = (config.cutoff_frequency * (transform.window.len() - 1) as f64
        / sampling_frequency)
        .ceil() as usize;

    let number_samples = audio_signal.nrows();
    let stfts = channel_stfts(audio_signal.view(), &transform)?;
    let spectrograms: Vec<Array2<f64>> = stfts.iter().map(magnitude).collect();

    let similarity_matrix = self_similarity(&channel_mean(&spectrograms, false));
    let indices = similarity_indices(
        &similarity_matrix,
        config.similarity_threshold,
        distance_frames,
        config.similarity_number,
    );

    let backgrounds = channel_backgrounds(stfts.len(), |c| {
        let half_mask = sim_mask(&spectrograms[c], &indices)?;
        masked_background(&stfts[c], half_mask, cutoff_bin, &transform, number_samples)
    })?;
    finish(backgrounds, number_samples)
}

// Write one frame's magnitudes into the per-channel and channel-averaged ring slots.
fn write_ring_slot(
    slot: usize,
    spectra: &[Vec<Complex64>],
    buffers: &mut [Array2<f64>],
    mean_buffer: &mut Array2<f64>,
) {
    let number_frequencies = mean_buffer.nrows();
    let number_channels = spectra.len();
    for f in 0..number_frequencies {
        let mut mean = 0.0;
        for (c, spectrum) in spectra.iter().enumerate() {
            let value = spectrum[f].norm();
            buffers[c][(f, slot)] = value;
            mean += value;
        }
        mean_buffer[(f, slot)] = mean / number_channels as f64;
    }
}

/// Separate the repeating background causally, frame by frame.
///
/// Maintains a ring buffer of past magnitude frames. Each new frame is
/// compared against the buffer with cosine similarity, masked by the median
/// of its most similar past frames and overlap-added into the output. The
/// first `buffer_length` of output is silent while the buffer warms up; if
/// the whole signal fits inside the warm-up, the result is all-zero.
///
/// # Errors
/// Same conditions as [`original`], with [`crate::Error::DegenerateStructure`]
/// raised when a frame has no similar past frame (e.g. digital silence).
pub fn sim_online(
    audio_signal: &Array2<f64>,
    sampling_frequency: f64,
) -> crate::Result<Array2<f64>> {
    sim_online_with_config(audio_signal, sampling_frequency, &RepetConfig::default())
}

/// [`sim_online`] with custom tuning constants.
pub fn sim_online_with_config(
    audio_signal: &Array2<f64>,
    sampling_frequency: f64,
    config: &RepetConfig,
) -> crate::Result<Array2<f64>> {
    let transform = validate(audio_signal, sampling_frequency, config)?;
    let window_length = transform.window.len();
    let step = transform.step;
    let number_samples = audio_signal.nrows();
    let number_channels = audio_signal.ncols();
    let number_frequencies = window_length / 2 + 1;

    let buffer_frames = to_frames(config.buffer_length, sampling_frequency, step).max(2);
    let distance_frames = to_frames(config.similarity_distance, sampling_frequency, step);
    let cutoff_bin = round_cutoff_bin(config, &transform, sampling_frequency);

    // Frames slide over the raw signal here, no centering pad; the tail is
    // zero-padded so the last frame fits.
    let number_times = (number_samples - window_length).div_ceil(step) + 1;
    if number_times < buffer_frames {
        log::debug!(
            "signal has {number_times} frames but the buffer needs {buffer_frames}, \
             output stays in warm-up"
        );
        return Ok(Array2::zeros((number_samples, number_channels)));
    }
    let padded_length = (number_times - 1) * step + window_length;
    let padded: Vec<Vec<f64>> = (0..number_channels)
        .map(|c| {
            let mut samples = audio_signal.column(c).to_vec();
            samples.resize(padded_length, 0.0);
            samples
        })
        .collect();

    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(window_length);
    let inverse = planner.plan_fft_inverse(window_length);
    let mut frame_buffer = vec![Complex64::new(0.0, 0.0); window_length];
    let mut frame_fft = |channel: usize, frame: usize, out: &mut Vec<Complex64>| {
        let start = frame * step;
        for i in 0..window_length {
            frame_buffer[i] = Complex64::new(padded[channel][start + i] * transform.window[i], 0.0);
        }
        forward.process(&mut frame_buffer);
        out.clear();
        out.extend_from_slice(&frame_buffer);
    };

    // Ring buffers of past magnitude frames, one per channel plus the
    // channel average the similarity search runs on.
    let mut buffers =
        vec![Array2::<f64>::zeros((number_frequencies, buffer_frames)); number_channels];
    let mut mean_buffer = Array2::<f64>::zeros((number_frequencies, buffer_frames));
    let mut spectra: Vec<Vec<Complex64>> = vec![Vec::new(); number_channels];

    let mut output = Array2::<f64>::zeros((padded_length, number_channels));
    let mut similarity_vector = vec![0.0f64; buffer_frames];
    let mut scratch: Vec<f64> = Vec::with_capacity(config.similarity_number);
    let mut half_mask = vec![0.0f64; number_frequencies];
    let mut masked = vec![Complex64::new(0.0, 0.0); window_length];

    for frame in 0..number_times {
        let slot = frame % buffer_frames;
        for channel in 0..number_channels {
            frame_fft(channel, frame, &mut spectra[channel]);
        }
        write_ring_slot(slot, &spectra, &mut buffers, &mut mean_buffer);
        // The first frames only warm the buffer up; no output yet.
        if frame + 1 < buffer_frames {
            continue;
        }

        // Cosine similarity of the current frame against the whole buffer.
        let slot_norm = (0..number_frequencies)
            .map(|f| mean_buffer[(f, slot)] * mean_buffer[(f, slot)])
            .sum::<f64>()
            .sqrt();
        for j in 0..buffer_frames {
            let mut dot = 0.0;
            let mut norm = 0.0;
            for f in 0..number_frequencies {
                let value = mean_buffer[(f, j)];
                dot += mean_buffer[(f, slot)] * value;
                norm += value * value;
            }
            similarity_vector[j] =
                dot / ((slot_norm + f64::EPSILON) * (norm.sqrt() + f64::EPSILON));
        }
        let (_, indices) = local_maxima(
            &similarity_vector,
            config.similarity_threshold,
            distance_frames,
            config.similarity_number,
        );
        if indices.is_empty() {
            return Err(crate::Error::DegenerateStructure(format!(
                "no similar past frame for frame {frame}"
            )));
        }

        let start = frame * step;
        for channel in 0..number_channels {
            for (f, mask_value) in half_mask.iter_mut().enumerate() {
                scratch.clear();
                scratch.extend(indices.iter().map(|&j| buffers[channel][(f, j)]));
                let median = crate::mask::median(&mut scratch);
                let original_value = buffers[channel][(f, slot)];
                let repeating = median.min(original_value);
                *mask_value = (repeating + f64::EPSILON) / (original_value + f64::EPSILON);
            }
            for f in 1..=cutoff_bin.min(number_frequencies - 1) {
                half_mask[f] = 1.0;
            }
            for i in 0..window_length {
                let weight = if i < number_frequencies {
                    half_mask[i]
                } else {
                    half_mask[window_length - i]
                };
                masked[i] = spectra[channel][i] * weight;
            }
            inverse.process(&mut masked);
            for i in 0..window_length {
                output[(start + i, channel)] += masked[i].re;
            }
        }
    }

    // One normalization at the very end: the COLA gain times the FFT length
    // the unnormalized inverse transform left in place.
    let scale = window_length as f64 * cola_gain(&transform.window, step);
    let mut background = Array2::<f64>::zeros((number_samples, number_channels));
    for c in 0..number_channels {
        for i in 0..number_samples {
            background[(i, c)] = output[(i, c)] / scale;
        }
    }
    ensure_finite(&background)?;
    Ok(background)
}
