//! Deterministic test-signal generators.
//!
//! Small synthesis helpers used by the tests and benchmarks: pure tones,
//! linear chirps, seeded noise and impulse trains. They return mono sample
//! vectors; stack the columns yourself for multichannel fixtures.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a pure sine tone.
///
/// # Arguments
/// * `frequency` - Tone frequency in Hz
/// * `sampling_frequency` - Sampling frequency in Hz
/// * `duration` - Length in seconds
/// * `amplitude` - Peak amplitude
pub fn tone(frequency: f64, sampling_frequency: f64, duration: f64, amplitude: f64) -> Vec<f64> {
    let number_samples = (duration * sampling_frequency) as usize;
    let angular_frequency = 2.0 * std::f64::consts::PI * frequency / sampling_frequency;
    (0..number_samples)
        .map(|i| amplitude * (angular_frequency * i as f64).sin())
        .collect()
}

/// Generate a linear chirp sweeping from `f0` to `f1` Hz.
pub fn chirp(
    f0: f64,
    f1: f64,
    sampling_frequency: f64,
    duration: f64,
    amplitude: f64,
) -> Vec<f64> {
    let number_samples = (duration * sampling_frequency) as usize;
    let rate = (f1 - f0) / duration;
    (0..number_samples)
        .map(|i| {
            let t = i as f64 / sampling_frequency;
            let phase = 2.0 * std::f64::consts::PI * (f0 * t + 0.5 * rate * t * t);
            amplitude * phase.sin()
        })
        .collect()
}

/// Generate seeded Gaussian white noise.
///
/// Samples are drawn with the Box-Muller transform from a deterministic
/// generator, so the same seed always produces the same signal.
///
/// # Arguments
/// * `sampling_frequency` - Sampling frequency in Hz
/// * `duration` - Length in seconds
/// * `sigma` - Standard deviation
/// * `seed` - Generator seed
pub fn noise(sampling_frequency: f64, duration: f64, sigma: f64, seed: u64) -> Vec<f64> {
    let number_samples = (duration * sampling_frequency) as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity(number_samples);
    while samples.len() < number_samples {
        let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        let u2: f64 = rng.gen();
        let radius = (-2.0 * u1.ln()).sqrt();
        let angle = 2.0 * std::f64::consts::PI * u2;
        samples.push(sigma * radius * angle.cos());
        if samples.len() < number_samples {
            samples.push(sigma * radius * angle.sin());
        }
    }
    samples
}

/// Generate seeded pink (1/f) noise.
///
/// White noise shaped by Paul Kellet's three-pole filter approximation,
/// scaled to roughly unit variance before the amplitude is applied.
pub fn pink_noise(
    sampling_frequency: f64,
    duration: f64,
    amplitude: f64,
    seed: u64,
) -> Vec<f64> {
    let white = noise(sampling_frequency, duration, 1.0, seed);
    let mut b0 = 0.0f64;
    let mut b1 = 0.0f64;
    let mut b2 = 0.0f64;
    white
        .iter()
        .map(|&w| {
            b0 = 0.99765 * b0 + w * 0.0990460;
            b1 = 0.96300 * b1 + w * 0.2965164;
            b2 = 0.57000 * b2 + w * 1.0526913;
            amplitude * 0.25 * (b0 + b1 + b2 + w * 0.1848)
        })
        .collect()
}

/// Generate a periodic impulse train.
///
/// One unit impulse every `period` seconds, starting at time zero.
pub fn impulse_train(
    period: f64,
    sampling_frequency: f64,
    duration: f64,
    amplitude: f64,
) -> Vec<f64> {
    let number_samples = (duration * sampling_frequency) as usize;
    let mut samples = vec![0.0f64; number_samples];
    let period_samples = (period * sampling_frequency).round().max(1.0) as usize;
    for i in (0..number_samples).step_by(period_samples) {
        samples[i] = amplitude;
    }
    samples
}

/// Sum several signals sample by sample, truncating to the shortest.
pub fn mix<S: AsRef<[f64]>>(signals: &[S]) -> Vec<f64> {
    let length = signals.iter().map(|s| s.as_ref().len()).min().unwrap_or(0);
    (0..length)
        .map(|i| signals.iter().map(|s| s.as_ref()[i]).sum())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tone_amplitude_and_length() {
        let signal = tone(440.0, 8000.0, 0.5, 0.5);
        assert_eq!(signal.len(), 4000);
        let peak = signal.iter().cloned().fold(0.0f64, |a, b| a.max(b.abs()));
        assert!(peak <= 0.5 + 1e-12);
        assert!(peak > 0.45);
    }

    #[test]
    fn test_noise_deterministic() {
        let a = noise(8000.0, 0.25, 0.3, 7);
        let b = noise(8000.0, 0.25, 0.3, 7);
        assert_eq!(a, b);
        let c = noise(8000.0, 0.25, 0.3, 8);
        assert_ne!(a, c);
    }

    #[test]
    fn test_noise_moments() {
        let signal = noise(8000.0, 10.0, 0.3, 42);
        let mean = signal.iter().sum::<f64>() / signal.len() as f64;
        let variance =
            signal.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / signal.len() as f64;
        assert_relative_eq!(mean, 0.0, epsilon = 0.02);
        assert_relative_eq!(variance.sqrt(), 0.3, epsilon = 0.02);
    }

    #[test]
    fn test_impulse_train_spacing() {
        let signal = impulse_train(0.25, 8000.0, 1.0, 1.0);
        assert_eq!(signal.len(), 8000);
        let impulses: Vec<usize> = signal
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(impulses, vec![0, 2000, 4000, 6000]);
    }

    #[test]
    fn test_mix_lengths() {
        let a = tone(100.0, 1000.0, 1.0, 1.0);
        let b = tone(200.0, 1000.0, 1.0, 1.0);
        let mixed = mix(&[&a, &b]);
        assert_eq!(mixed.len(), 1000);
        assert_relative_eq!(mixed[10], a[10] + b[10], epsilon = 1e-12);
    }

    #[test]
    fn test_pink_noise_finite() {
        let signal = pink_noise(8000.0, 1.0, 0.5, 3);
        assert_eq!(signal.len(), 8000);
        assert!(signal.iter().all(|v| v.is_finite()));
    }
}
