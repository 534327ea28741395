// Analysis and rendering parameters for the spectrogram pipeline

/// Parameters shared by every render. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramConfig {
    /// FFT window length in samples.
    pub n_fft: usize,
    /// Distance between successive frames in samples.
    pub hop_length: usize,
    /// Number of mel bands.
    pub n_mels: usize,
    /// Floor applied below the per-clip maximum, in dB.
    pub top_db: f64,
    /// Smallest power value considered before taking the log.
    pub amin: f64,
    /// Output image width in pixels.
    pub width: u32,
    /// Output image height in pixels.
    pub height: u32,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            top_db: 80.0,
            amin: 1e-10,
            // 10 x 4 inch figure at 100 dpi
            width: 1000,
            height: 400,
        }
    }
}

impl SpectrogramConfig {
    /// Number of non-negative FFT bins.
    pub fn n_freqs(&self) -> usize {
        self.n_fft / 2 + 1
    }
}
