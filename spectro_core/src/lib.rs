//! Audio upload to mel-spectrogram image pipeline.
//!
//! [`SpectrogramPipeline::render`] takes the raw bytes of an encoded audio
//! file and returns the decoded mono waveform together with a PNG figure of
//! its mel spectrogram in dB relative to the clip's own peak.

mod canvas;
pub mod config;
pub mod datauri;
pub mod decode;
pub mod error;
pub mod mel;
pub mod render;
pub mod types;

use std::time::Instant;

use tracing::debug;

pub use config::SpectrogramConfig;
pub use error::{PipelineError, PipelineResult};
pub use types::{AudioFormat, AudioPayload, DbSpectrogram, DecodedAudio, SpectrogramImage};

/// Title used when the caller does not supply one.
pub const DEFAULT_TITLE: &str = "Spectrogram";

/// Stateless decode → mel → dB → PNG pipeline.
///
/// Holds only read-only configuration, so one instance can be shared across
/// threads; every call allocates and releases its own buffers.
#[derive(Debug, Clone, Default)]
pub struct SpectrogramPipeline {
    config: SpectrogramConfig,
}

impl SpectrogramPipeline {
    pub fn new(config: SpectrogramConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    /// Render raw audio bytes with the default title.
    pub fn render(&self, audio_bytes: &[u8]) -> PipelineResult<(DecodedAudio, SpectrogramImage)> {
        self.render_payload(&AudioPayload::from_bytes(audio_bytes), DEFAULT_TITLE)
    }

    /// Render an upload, using its filename and declared type as decoder hints.
    pub fn render_payload(
        &self,
        payload: &AudioPayload,
        title: &str,
    ) -> PipelineResult<(DecodedAudio, SpectrogramImage)> {
        let started = Instant::now();
        let decoded = decode::decode(payload)?;
        debug!(
            samples = decoded.samples.len(),
            sample_rate = decoded.sample_rate,
            format = ?decoded.format,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "decoded audio"
        );

        let spec = self.analyze(&decoded);
        debug!(
            n_mels = spec.n_mels(),
            n_frames = spec.n_frames(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "computed mel spectrogram"
        );

        let image = render::render_png(&spec, title, &self.config)?;
        debug!(
            png_bytes = image.png.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered spectrogram"
        );
        Ok((decoded, image))
    }

    /// Mel spectrogram of decoded audio in dB relative to its maximum.
    pub fn analyze(&self, decoded: &DecodedAudio) -> DbSpectrogram {
        mel::db_mel_spectrogram(&decoded.samples, decoded.sample_rate, &self.config)
    }
}
