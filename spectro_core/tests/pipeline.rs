//! End-to-end checks of the decode → mel → dB → PNG pipeline.

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use spectro_core::datauri::{decode_upload, encode_data_uri, split_data_uri};
use spectro_core::decode::decode;
use mel_spec::mel::mel_frequencies;
use spectro_core::{AudioFormat, AudioPayload, PipelineError, SpectrogramPipeline};

fn sine_wav(freq: f32, sample_rate: u32, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let n = (sample_rate as f32 * seconds) as usize;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..n {
            let t = i as f32 / sample_rate as f32;
            let s = (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5;
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[test]
fn test_sine_scenario() {
    let wav = sine_wav(440.0, 22050, 2.0);
    let pipeline = SpectrogramPipeline::default();

    let (decoded, image) = pipeline.render(&wav).unwrap();

    assert_eq!(decoded.sample_rate, 22050);
    assert_eq!(decoded.format, AudioFormat::Wav);
    assert!((decoded.samples.len() as i64 - 44100).abs() <= 1);

    assert!(!image.png.is_empty());
    let png = image::load_from_memory(&image.png).unwrap().to_rgb8();
    let (w, h) = png.dimensions();
    assert_eq!((w, h), (1000, 400));
    assert_eq!(w * 4, h * 10);
}

#[test]
fn test_decoding_is_deterministic() {
    let payload = AudioPayload::from_bytes(sine_wav(440.0, 22050, 0.5));
    let first = decode(&payload).unwrap();
    let second = decode(&payload).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_db_scale_is_relative_to_clip_peak() {
    let pipeline = SpectrogramPipeline::default();
    let decoded = decode(&AudioPayload::from_bytes(sine_wav(440.0, 22050, 1.0))).unwrap();
    let spec = pipeline.analyze(&decoded);

    assert_eq!(spec.max_db(), 0.0);
    assert!(spec.data.iter().all(|&v| v <= 0.0));
    assert!(spec.min_db() >= -pipeline.config().top_db);
    // 22050 samples, not a multiple of the hop.
    assert_eq!(spec.n_frames(), 1 + 22050 / 512);

    // Same samples, same numbers.
    let again = pipeline.analyze(&decoded);
    assert_eq!(spec.data, again.data);
}

#[test]
fn test_energy_peaks_near_tone_frequency() {
    let pipeline = SpectrogramPipeline::default();
    let decoded = decode(&AudioPayload::from_bytes(sine_wav(440.0, 22050, 1.0))).unwrap();
    let spec = pipeline.analyze(&decoded);

    let mean_per_bin: Vec<f64> = spec
        .data
        .rows()
        .into_iter()
        .map(|row| row.iter().sum::<f64>() / row.len() as f64)
        .collect();
    let peak = mean_per_bin
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();

    let centres = mel_frequencies(spec.n_mels() + 2, 0.0, spec.fmax, false);
    let centre = centres[peak + 1];
    assert!((centre - 440.0).abs() < 60.0, "peak band centred at {centre} Hz");
}

#[test]
fn test_louder_input_gives_same_relative_scale() {
    let pipeline = SpectrogramPipeline::default();
    let quiet = decode(&AudioPayload::from_bytes(sine_wav(440.0, 16000, 0.5))).unwrap();
    let mut loud = quiet.clone();
    for s in loud.samples.iter_mut() {
        *s *= 1.5;
    }

    let a = pipeline.analyze(&quiet);
    let b = pipeline.analyze(&loud);
    assert_eq!(a.max_db(), 0.0);
    assert_eq!(b.max_db(), 0.0);
    let max_diff = a
        .data
        .iter()
        .zip(b.data.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0f64, f64::max);
    assert!(max_diff < 1e-3);
}

#[test]
fn test_truncated_wav_is_decode_error() {
    let wav = sine_wav(440.0, 22050, 0.1);
    let pipeline = SpectrogramPipeline::default();
    let result = pipeline.render(&wav[..20]);
    assert!(matches!(result, Err(PipelineError::Decode(_))));
}

#[test]
fn test_random_bytes_are_decode_error() {
    let noise: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8 & 0x7f).collect();
    let pipeline = SpectrogramPipeline::default();
    assert!(matches!(pipeline.render(&noise), Err(PipelineError::Decode(_))));
}

#[test]
fn test_float_stereo_wav() {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 48000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..4800 {
            let s = ((i % 48) as f32 / 48.0) - 0.5;
            writer.write_sample(s).unwrap();
            writer.write_sample(-s).unwrap();
        }
        writer.finalize().unwrap();
    }

    let pipeline = SpectrogramPipeline::default();
    let (decoded, image) = pipeline.render(&cursor.into_inner()).unwrap();
    assert_eq!(decoded.sample_rate, 48000);
    assert_eq!(decoded.samples.len(), 4800);
    // Opposite channels cancel out.
    assert!(decoded.samples.iter().all(|s| s.abs() < 1e-6));
    assert!(!image.png.is_empty());
}

#[test]
fn test_upload_round_trip() {
    let wav = sine_wav(440.0, 22050, 0.5);
    let contents = encode_data_uri("audio/wav", &wav);

    let payload = decode_upload(&contents, Some("tone.wav".to_string())).unwrap();
    assert_eq!(payload.bytes, wav);
    assert_eq!(payload.mime.as_deref(), Some("audio/wav"));

    let pipeline = SpectrogramPipeline::default();
    let (_, image) = pipeline.render_payload(&payload, "Spectrogram 1").unwrap();

    let image_src = encode_data_uri("image/png", &image.png);
    assert!(image_src.starts_with("data:image/png;base64,"));
    let (_, encoded) = split_data_uri(&image_src).unwrap();
    assert_eq!(general_purpose::STANDARD.decode(encoded).unwrap(), image.png);
}

#[test]
fn test_upload_without_comma_is_input_format_error() {
    let result = decode_upload("data:audio/wav;base64", None);
    assert!(matches!(result, Err(PipelineError::InputFormat(_))));
}

#[test]
fn test_concurrent_renders_are_independent() {
    let pipeline = std::sync::Arc::new(SpectrogramPipeline::default());
    let inputs = [220.0f32, 440.0, 880.0, 1760.0];

    let expected: Vec<Vec<u8>> = inputs
        .iter()
        .map(|&f| pipeline.render(&sine_wav(f, 16000, 0.3)).unwrap().1.png)
        .collect();

    let handles: Vec<_> = inputs
        .iter()
        .map(|&f| {
            let pipeline = pipeline.clone();
            std::thread::spawn(move || pipeline.render(&sine_wav(f, 16000, 0.3)).unwrap().1.png)
        })
        .collect();

    for (handle, want) in handles.into_iter().zip(expected) {
        assert_eq!(handle.join().unwrap(), want);
    }
}
