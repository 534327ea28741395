//! Audio decoding to mono f32 at the source's native sample rate.
//!
//! RIFF/WAVE goes through `hound`; everything else (and WAV flavours hound
//! rejects) is probed with `symphonia`. No resampling is performed.
use std::io::Cursor;

use hound::{SampleFormat, WavReader};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    CodecType, DecoderOptions, CODEC_TYPE_AAC, CODEC_TYPE_ALAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP3,
    CODEC_TYPE_NULL, CODEC_TYPE_VORBIS,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{AudioFormat, AudioPayload, DecodedAudio};

/// Decode an uploaded file.
///
/// Fails with [`PipelineError::Decode`] for anything that is not a
/// supported audio encoding or that decodes to zero samples.
pub fn decode(payload: &AudioPayload) -> PipelineResult<DecodedAudio> {
    if payload.bytes.is_empty() {
        return Err(PipelineError::Decode("payload is empty".to_string()));
    }

    let decoded = if is_riff_wave(&payload.bytes) {
        match decode_wav(&payload.bytes) {
            Ok(decoded) => decoded,
            Err(wav_err) => {
                let mut decoded = decode_with_symphonia(payload).map_err(|_| wav_err)?;
                decoded.format = AudioFormat::Wav;
                decoded
            }
        }
    } else {
        decode_with_symphonia(payload)?
    };

    if decoded.sample_rate == 0 {
        return Err(PipelineError::Decode("stream reports a sample rate of 0".to_string()));
    }
    if decoded.samples.is_empty() {
        return Err(PipelineError::Decode("stream contains no audio samples".to_string()));
    }
    Ok(decoded)
}

fn is_riff_wave(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn decode_wav(bytes: &[u8]) -> PipelineResult<DecodedAudio> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let shift = u32::from(spec.bits_per_sample).saturating_sub(1);
            let max_val = (1u64 << shift) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(DecodedAudio {
        samples: downmix(&interleaved, spec.channels as usize),
        sample_rate: spec.sample_rate,
        format: AudioFormat::Wav,
    })
}

fn decode_with_symphonia(payload: &AudioPayload) -> PipelineResult<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(payload.bytes.clone())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = payload.extension() {
        hint.with_extension(&ext);
    }
    if let Some(mime) = payload.mime.as_deref() {
        hint.mime_type(mime);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::Decode("no decodable audio track".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if sample_rate == 0 {
                    sample_rate = spec.rate;
                }
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend(downmix(buf.samples(), spec.channels.count()));
            }
            // A corrupt packet is skipped; the stream may still recover.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        format: format_for_codec(codec_params.codec),
    })
}

fn format_for_codec(codec: CodecType) -> AudioFormat {
    if codec == CODEC_TYPE_MP3 {
        AudioFormat::Mp3
    } else if codec == CODEC_TYPE_FLAC {
        AudioFormat::Flac
    } else if codec == CODEC_TYPE_VORBIS {
        AudioFormat::Ogg
    } else if codec == CODEC_TYPE_AAC {
        AudioFormat::Aac
    } else if codec == CODEC_TYPE_ALAC {
        AudioFormat::Alac
    } else {
        AudioFormat::Unknown
    }
}

/// Average interleaved channels into one.
pub(crate) fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
