use thiserror::Error;

/// Failures of a single render call. None of them are retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The upload is not a `<type>,<base64>` pair or the payload is not base64.
    #[error("invalid upload payload: {0}")]
    InputFormat(String),

    /// The bytes are not an audio encoding the decoder understands.
    #[error("could not decode audio: {0}")]
    Decode(String),

    /// The spectrogram image could not be produced.
    #[error("could not render spectrogram: {0}")]
    Render(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<hound::Error> for PipelineError {
    fn from(e: hound::Error) -> Self {
        PipelineError::Decode(format!("wav: {e}"))
    }
}

impl From<symphonia::core::errors::Error> for PipelineError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        PipelineError::Decode(e.to_string())
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(e: image::ImageError) -> Self {
        PipelineError::Render(format!("png encode: {e}"))
    }
}

impl From<base64::DecodeError> for PipelineError {
    fn from(e: base64::DecodeError) -> Self {
        PipelineError::InputFormat(format!("payload is not valid base64: {e}"))
    }
}
