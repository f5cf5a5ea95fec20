//! REPET audio source separation for Rust.
//!
//! Repet implements the REPET family of algorithms, which split an audio
//! mixture into a *repeating background* (accompaniment, beat, texture) and
//! a *non-repeating foreground* (vocals, leads) by finding repetition in the
//! magnitude spectrogram. Five variants share one pipeline — STFT, magnitude,
//! repetition model, time-frequency mask, inverse STFT — and differ only in
//! how they decide what repeats:
//!
//! - [`separate::original`] — one global repeating period
//! - [`separate::extended`] — sliding windows with a triangular cross-fade
//! - [`separate::adaptive`] — a repeating period per frame, via a beat spectrogram
//! - [`separate::sim`] — non-periodic repetition, via a self-similarity matrix
//! - [`separate::sim_online`] — causal frame-by-frame variant over a ring buffer
//!
//! # Quick Start
//!
//! ```rust
//! use ndarray::Array2;
//! use repet::{separate, synth};
//!
//! // A 440 Hz tone is its own repeating background.
//! let samples = synth::tone(440.0, 8000.0, 4.0, 0.5);
//! let mixture = Array2::from_shape_vec((samples.len(), 1), samples).unwrap();
//!
//! let background = separate::original(&mixture, 8000.0).unwrap();
//! let foreground = &mixture - &background;
//! assert_eq!(background.dim(), mixture.dim());
//! assert_eq!(foreground.dim(), mixture.dim());
//! ```
//!
//! Signals are `ndarray::Array2<f64>` matrices of shape
//! `(n_samples, n_channels)`, sample-normalized to roughly [-1, 1]. Every
//! pipeline returns the background; subtract it from the mixture for the
//! foreground.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`separate`] | The five separation pipelines and their configuration |
//! | [`spectrum`] | Centered STFT/ISTFT with constant overlap-add inversion |
//! | [`beat`] | Unbiased autocorrelation, beat spectrum/spectrogram, period estimation |
//! | [`similarity`] | Cosine similarity, constrained local maxima, similarity indices |
//! | [`mask`] | Repeating/adaptive/similarity mask builders, high-pass override, mirroring |
//! | [`window`] | Periodic Hamming and triangular windows, COLA gain |
//! | [`synth`] | Deterministic test-signal generators |
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. The [`Error`] enum distinguishes invalid
//! input (empty signals, bad sampling frequencies, signals shorter than one
//! analysis window), degenerate structure (no repetition found within the
//! configured search ranges) and non-finite output. Nothing is retried and
//! no partial result is returned on error.
//!
//! # Known quirk
//!
//! The [`separate::sim`] pipeline computes its high-pass cutoff bin as
//! `⌈cutoff · (W - 1) / fs⌉` while the other pipelines use
//! `round(cutoff · W / fs)`, faithfully reproducing the reference
//! implementation. The two formulas can differ by one bin.
//!
//! # Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `parallel` | Run per-channel separation passes on a rayon thread pool |
//!
//! # Safety
//!
//! This crate uses `#![deny(unsafe_code)]` — no unsafe Rust anywhere.

#![deny(unsafe_code)]

pub mod error;
pub use error::{Error, Result};

pub mod beat;
pub mod mask;
pub mod separate;
pub mod similarity;
pub mod spectrum;
pub mod synth;
pub mod window;

pub use separate::{adaptive, extended, original, sim, sim_online, RepetConfig};
