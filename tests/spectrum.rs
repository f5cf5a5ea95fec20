//! Transform-layer tests: round-trip accuracy, shapes and boundary errors.

use repet::spectrum::{istft, magnitude, stft, window_length};
use repet::synth;
use repet::window::hamming;

fn relative_l2_error(reference: &[f64], estimate: &[f64]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for (a, b) in reference.iter().zip(estimate.iter()) {
        num += (a - b) * (a - b);
        den += a * a;
    }
    (num / den).sqrt()
}

#[test]
fn roundtrip_at_reference_parameters() {
    // 8 kHz and a 512-sample periodic Hamming at 50% overlap, the setup the
    // separation pipelines run with.
    let sampling_frequency = 8000.0;
    let tone = synth::tone(440.0, sampling_frequency, 4.0, 0.5);
    let chirp = synth::chirp(500.0, 2000.0, sampling_frequency, 4.0, 0.2);
    let signal = synth::mix(&[&tone, &chirp]);

    let n_fft = window_length(sampling_frequency);
    assert_eq!(n_fft, 512);
    let window = hamming(n_fft);
    let step = n_fft / 2;

    let stft_matrix = stft(&signal, &window, step).unwrap();
    let reconstructed = istft(&stft_matrix, &window, step, signal.len()).unwrap();
    assert_eq!(reconstructed.len(), signal.len());
    assert!(relative_l2_error(&signal, &reconstructed) < 1e-10);
}

#[test]
fn roundtrip_noise() {
    let signal = synth::noise(8000.0, 2.0, 0.3, 11);
    let window = hamming(512);
    let stft_matrix = stft(&signal, &window, 256).unwrap();
    let reconstructed = istft(&stft_matrix, &window, 256, signal.len()).unwrap();
    assert!(relative_l2_error(&signal, &reconstructed) < 1e-10);
}

#[test]
fn roundtrip_odd_length() {
    // Lengths that do not divide the hop still reconstruct exactly.
    let signal = synth::tone(313.0, 8000.0, 1.2345, 0.7);
    let window = hamming(512);
    let stft_matrix = stft(&signal, &window, 256).unwrap();
    let reconstructed = istft(&stft_matrix, &window, 256, signal.len()).unwrap();
    assert_eq!(reconstructed.len(), signal.len());
    assert!(relative_l2_error(&signal, &reconstructed) < 1e-10);
}

#[test]
fn stft_frame_count() {
    let signal = vec![0.5; 32000];
    let window = hamming(512);
    let stft_matrix = stft(&signal, &window, 256).unwrap();
    assert_eq!(stft_matrix.nrows(), 512);
    assert_eq!(stft_matrix.ncols(), 32000usize.div_ceil(256) + 1);
}

#[test]
fn magnitude_halves_the_spectrum() {
    let signal = synth::tone(440.0, 8000.0, 1.0, 0.5);
    let window = hamming(512);
    let stft_matrix = stft(&signal, &window, 256).unwrap();
    let spectrogram = magnitude(&stft_matrix);
    assert_eq!(spectrogram.nrows(), 257);
    assert_eq!(spectrogram.ncols(), stft_matrix.ncols());
    assert!(spectrogram.iter().all(|&v| v >= 0.0));
}

#[test]
fn stft_rejects_empty_signal() {
    let window = hamming(512);
    assert!(stft(&[], &window, 256).is_err());
}

#[test]
fn stft_rejects_zero_step() {
    let window = hamming(512);
    assert!(stft(&[0.0; 1000], &window, 0).is_err());
}

#[test]
fn window_length_tracks_sampling_frequency() {
    assert_eq!(window_length(8000.0), 512);
    assert_eq!(window_length(16000.0), 1024);
    assert_eq!(window_length(44100.0), 2048);
    assert_eq!(window_length(48000.0), 2048);
}
