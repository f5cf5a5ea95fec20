use ndarray::Array2;
use proptest::prelude::*;
use repet::mask::{highpass, mirror, repeating_mask};
use repet::similarity::local_maxima;
use repet::spectrum::{istft, stft};
use repet::window::hamming;

proptest! {
    #[test]
    fn stft_istft_roundtrip_prop(len in 512usize..4096, freq in 0.001f64..0.4) {
        let window = hamming(128);
        let signal: Vec<f64> = (0..len)
            .map(|i| (i as f64 * freq * std::f64::consts::PI).sin())
            .collect();
        let s = stft(&signal, &window, 64).unwrap();
        let reconstructed = istft(&s, &window, 64, signal.len()).unwrap();
        prop_assert_eq!(reconstructed.len(), signal.len());

        let mut num = 0.0f64;
        let mut den = 0.0f64;
        for (a, b) in signal.iter().zip(reconstructed.iter()) {
            num += (a - b) * (a - b);
            den += a * a;
        }
        prop_assert!((num / den.max(1e-12)).sqrt() < 1e-10);
    }

    #[test]
    fn repeating_mask_stays_in_unit_interval(
        values in proptest::collection::vec(0.0f64..10.0, 8 * 30),
        period in 1usize..12,
    ) {
        let spectrogram = Array2::from_shape_vec((8, 30), values).unwrap();
        let mask = repeating_mask(&spectrogram, period);
        prop_assert_eq!(mask.dim(), (8, 30));
        for &v in mask.iter() {
            prop_assert!(v > 0.0 && v <= 1.0);
        }
    }

    #[test]
    fn highpass_overrides_exactly_the_low_rows(
        values in proptest::collection::vec(0.0f64..1.0, 16 * 10),
        cutoff in 0usize..20,
    ) {
        let mut mask = Array2::from_shape_vec((16, 10), values).unwrap();
        let before = mask.clone();
        highpass(&mut mask, cutoff);
        let stop = cutoff.min(15);
        for ((f, t), &v) in mask.indexed_iter() {
            if f >= 1 && f <= stop {
                prop_assert_eq!(v, 1.0);
            } else {
                prop_assert_eq!(v, before[(f, t)]);
            }
        }
    }

    #[test]
    fn mirror_doubles_without_dc_or_nyquist(
        values in proptest::collection::vec(0.0f64..1.0, 9 * 5),
    ) {
        let mask = Array2::from_shape_vec((9, 5), values).unwrap();
        let full = mirror(&mask);
        prop_assert_eq!(full.dim(), (16, 5));
        for t in 0..5 {
            for f in 1..8 {
                prop_assert_eq!(full[(16 - f, t)], mask[(f, t)]);
            }
        }
    }

    #[test]
    fn local_maxima_contract(
        values in proptest::collection::vec(-1.0f64..1.0, 40),
        distance in 1usize..6,
        cap in 1usize..8,
    ) {
        let (maxima, indices) = local_maxima(&values, 0.0, distance, cap);
        prop_assert!(indices.len() <= cap);
        prop_assert_eq!(maxima.len(), indices.len());
        for &i in &indices {
            prop_assert!(values[i] >= 0.0);
            let start = i.saturating_sub(distance);
            let stop = (i + distance + 1).min(values.len());
            for j in start..stop {
                if j != i {
                    prop_assert!(values[i] > values[j]);
                }
            }
        }
    }
}
