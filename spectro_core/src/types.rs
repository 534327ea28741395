use ndarray::Array2;

/// Raw bytes of an uploaded audio file.
#[derive(Debug, Clone, Default)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    /// Display name only.
    pub filename: Option<String>,
    /// MIME type declared by the uploader, e.g. `audio/wav`.
    pub mime: Option<String>,
}

impl AudioPayload {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: None,
            mime: None,
        }
    }

    /// Lowercased file extension, if the filename has one.
    pub fn extension(&self) -> Option<String> {
        let name = self.filename.as_deref()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Container or codec the decoder recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    Aac,
    Alac,
    Unknown,
}

impl AudioFormat {
    /// MIME type a browser `<audio>` element accepts for this format.
    pub fn mime(&self) -> Option<&'static str> {
        match self {
            AudioFormat::Wav => Some("audio/wav"),
            AudioFormat::Mp3 => Some("audio/mpeg"),
            AudioFormat::Flac => Some("audio/flac"),
            AudioFormat::Ogg => Some("audio/ogg"),
            AudioFormat::Aac | AudioFormat::Alac => Some("audio/mp4"),
            AudioFormat::Unknown => None,
        }
    }
}

/// Mono samples at the file's native rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub format: AudioFormat,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Mel power spectrogram rescaled to dB relative to its own maximum.
///
/// `data` is indexed `[mel_bin, frame]`. The maximum is 0 and every other
/// value lies in `[-top_db, 0]`.
#[derive(Debug, Clone)]
pub struct DbSpectrogram {
    pub data: Array2<f64>,
    pub sample_rate: u32,
    pub hop_length: usize,
    /// Upper edge of the mel filterbank in Hz.
    pub fmax: f64,
}

impl DbSpectrogram {
    pub fn n_mels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_frames(&self) -> usize {
        self.data.ncols()
    }

    /// Time covered by the frames, in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.n_frames() * self.hop_length) as f64 / self.sample_rate as f64
    }

    pub fn max_db(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_db(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

/// Encoded PNG plus its pixel dimensions.
#[derive(Debug, Clone)]
pub struct SpectrogramImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}
