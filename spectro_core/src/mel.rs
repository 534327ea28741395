//! Mel power spectrogram and its per-clip dB rescaling.
//!
//! Frames are centred (the signal is zero-padded by `n_fft / 2` on both
//! sides), the STFT comes from `mel_spec`, and the filterbank is
//! `mel_spec`'s Slaney-scale, area-normalised one spanning 0 Hz to Nyquist.
use mel_spec::mel::mel;
use mel_spec::prelude::Spectrogram;
use ndarray::Array2;
use num_complex::Complex;

use crate::config::SpectrogramConfig;
use crate::types::DbSpectrogram;

/// Number of centred frames for a clip of `n_samples`.
pub fn frame_count(n_samples: usize, hop_length: usize) -> usize {
    1 + n_samples / hop_length
}

/// Power spectrogram shaped `[n_fft / 2 + 1, n_frames]`.
pub fn power_spectrogram(samples: &[f32], config: &SpectrogramConfig) -> Array2<f64> {
    let n_fft = config.n_fft;
    let hop = config.hop_length;
    let n_freqs = config.n_freqs();
    let pad = n_fft / 2;
    let n_frames = frame_count(samples.len(), hop);

    let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
    padded.resize(pad, 0.0f32);
    padded.extend_from_slice(samples);
    padded.resize(padded.len() + pad, 0.0);

    let mut stft = Spectrogram::new(n_fft, hop);
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(n_frames);
    for chunk in padded.chunks(hop) {
        if columns.len() == n_frames {
            break;
        }
        if let Some(fft_frame) = stft.add(chunk) {
            columns.push(frame_power(fft_frame, n_freqs));
        }
    }

    // Short of frames only when the hop does not divide n_fft.
    let silence = vec![0.0f32; hop];
    let mut flushes = 0;
    while columns.len() < n_frames && flushes <= n_frames + n_fft / hop {
        if let Some(fft_frame) = stft.add(&silence) {
            columns.push(frame_power(fft_frame, n_freqs));
        }
        flushes += 1;
    }
    columns.resize(n_frames, vec![0.0; n_freqs]);

    Array2::from_shape_fn((n_freqs, n_frames), |(k, t)| columns[t][k])
}

fn frame_power<I>(fft_frame: I, n_freqs: usize) -> Vec<f64>
where
    I: IntoIterator<Item = Complex<f64>>,
{
    let mut power: Vec<f64> = fft_frame
        .into_iter()
        .take(n_freqs)
        .map(|c| c.norm_sqr())
        .collect();
    power.resize(n_freqs, 0.0);
    power
}

/// Mel power spectrogram shaped `[n_mels, n_frames]`.
pub fn mel_spectrogram(samples: &[f32], sample_rate: u32, config: &SpectrogramConfig) -> Array2<f64> {
    let sr = sample_rate as f64;
    let filters = mel(sr, config.n_fft, config.n_mels, Some(0.0), Some(sr / 2.0), false, true);
    let power = power_spectrogram(samples, config);
    filters.dot(&power)
}

/// Convert power to dB relative to the largest value in `power`.
///
/// Values are floored at `max - top_db`, so the result lies in `[-top_db, 0]`
/// and its maximum is exactly 0.
pub fn power_to_db(power: &Array2<f64>, amin: f64, top_db: f64) -> Array2<f64> {
    let reference = power.iter().copied().fold(0.0f64, f64::max);
    let ref_db = 10.0 * reference.max(amin).log10();
    let db = power.mapv(|v| 10.0 * v.max(amin).log10() - ref_db);

    let max_db = db.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let floor = max_db - top_db;
    db.mapv(|v| v.max(floor))
}

/// Mel spectrogram rescaled to per-clip dB.
pub fn db_mel_spectrogram(samples: &[f32], sample_rate: u32, config: &SpectrogramConfig) -> DbSpectrogram {
    let mel = mel_spectrogram(samples, sample_rate, config);
    DbSpectrogram {
        data: power_to_db(&mel, config.amin, config.top_db),
        sample_rate,
        hop_length: config.hop_length,
        fmax: sample_rate as f64 / 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_matches_centred_framing() {
        let config = SpectrogramConfig::default();
        // 44100 and 1000 are not multiples of the hop; 44032 is.
        for (n, expected) in [(44100usize, 87usize), (1000, 2), (44032, 87), (3, 1)] {
            let samples: Vec<f32> = (0..n).map(|i| ((i % 50) as f32 / 50.0) - 0.5).collect();
            let power = power_spectrogram(&samples, &config);
            assert_eq!(frame_count(n, config.hop_length), expected);
            assert_eq!(power.dim(), (config.n_freqs(), expected), "n = {n}");
        }
    }

    #[test]
    fn test_silent_tail_frames_are_zero() {
        let config = SpectrogramConfig::default();
        let power = power_spectrogram(&[0.0; 600], &config);
        assert_eq!(power.ncols(), 2);
        assert!(power.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_power_to_db_reference_is_max() {
        let power = Array2::from_shape_vec((2, 2), vec![1.0, 0.1, 0.01, 0.0]).unwrap();
        let db = power_to_db(&power, 1e-10, 80.0);

        assert_eq!(db[[0, 0]], 0.0);
        assert!((db[[0, 1]] + 10.0).abs() < 1e-9);
        assert!((db[[1, 0]] + 20.0).abs() < 1e-9);
        // Zero power is clipped at top_db below the peak.
        assert!((db[[1, 1]] + 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_power_to_db_silence() {
        let power = Array2::<f64>::zeros((3, 4));
        let db = power_to_db(&power, 1e-10, 80.0);
        assert!(db.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_db_spectrogram_bounds() {
        let config = SpectrogramConfig::default();
        let sr = 16000;
        let samples: Vec<f32> = (0..sr)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr as f32).sin() * 0.5)
            .collect();

        let spec = db_mel_spectrogram(&samples, sr as u32, &config);
        assert_eq!(spec.n_mels(), 128);
        assert!(spec.n_frames() > 0);
        assert_eq!(spec.max_db(), 0.0);
        assert!(spec.min_db() >= -80.0);
        assert!(spec.data.iter().all(|&v| v <= 0.0));
    }

    #[test]
    fn test_very_short_clip_still_has_frames() {
        let config = SpectrogramConfig::default();
        let spec = db_mel_spectrogram(&[0.1, -0.1, 0.2], 8000, &config);
        assert!(spec.n_frames() >= 1);
        assert_eq!(spec.max_db(), 0.0);
    }
}
