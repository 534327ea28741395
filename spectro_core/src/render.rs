//! Spectrogram figure: heatmap, time and mel-frequency axes, dB colorbar.
use image::Rgb;
use mel_spec::mel::hz_to_mel;

use crate::canvas::{text_height, text_width, Canvas, BLACK};
use crate::config::SpectrogramConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{DbSpectrogram, SpectrogramImage};

const MIN_WIDTH: u32 = 320;
const MIN_HEIGHT: u32 = 160;

const TICK_LEN: i64 = 4;
const TITLE_SCALE: i64 = 2;
const LABEL_SCALE: i64 = 1;

/// Nice 1-2-5 progression of time tick intervals in seconds.
const TIME_TICKS: &[f64] = &[
    0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0, 600.0,
];
const MAX_TIME_TICKS: f64 = 8.0;

/// Frequencies labelled on the mel axis, in Hz.
const FREQ_TICKS: &[f64] = &[0.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0, 8192.0, 16384.0];
const MIN_FREQ_TICK_GAP: i64 = 12;

const DB_STEPS: &[f64] = &[1.0, 2.0, 5.0, 10.0, 20.0];
const MAX_DB_TICKS: f64 = 8.0;

/// Anchor colors of matplotlib's magma colormap, evenly spaced on [0, 1].
const MAGMA: &[[u8; 3]] = &[
    [0, 0, 4],
    [28, 16, 68],
    [79, 18, 123],
    [129, 37, 129],
    [181, 54, 122],
    [229, 80, 100],
    [251, 135, 97],
    [254, 194, 135],
    [252, 253, 191],
];

/// Map `t` in [0, 1] onto the magma colormap.
pub fn magma(t: f64) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (MAGMA.len() - 1) as f64;
    let i = (pos.floor() as usize).min(MAGMA.len() - 2);
    let frac = pos - i as f64;
    let (a, b) = (MAGMA[i], MAGMA[i + 1]);
    let mix = |c: usize| (a[c] as f64 + (b[c] as f64 - a[c] as f64) * frac).round() as u8;
    Rgb([mix(0), mix(1), mix(2)])
}

/// Pixel boxes of the figure's parts.
#[derive(Debug, Clone, Copy)]
struct Layout {
    plot_left: i64,
    plot_top: i64,
    /// Exclusive.
    plot_right: i64,
    /// Exclusive.
    plot_bottom: i64,
    bar_left: i64,
    bar_right: i64,
}

impl Layout {
    fn new(width: i64, height: i64) -> Self {
        let plot_left = 84;
        let plot_top = 34;
        let plot_right = width - 150;
        let plot_bottom = height - 52;
        let bar_left = plot_right + 20;
        Self {
            plot_left,
            plot_top,
            plot_right,
            plot_bottom,
            bar_left,
            bar_right: bar_left + 18,
        }
    }

    fn plot_width(&self) -> i64 {
        self.plot_right - self.plot_left
    }

    fn plot_height(&self) -> i64 {
        self.plot_bottom - self.plot_top
    }
}

/// Draw `spec` as a titled figure and encode it as PNG.
///
/// The canvas lives only for the duration of this call.
pub fn render_png(spec: &DbSpectrogram, title: &str, config: &SpectrogramConfig) -> PipelineResult<SpectrogramImage> {
    if config.width < MIN_WIDTH || config.height < MIN_HEIGHT {
        return Err(PipelineError::Render(format!(
            "figure size {}x{} is below the {MIN_WIDTH}x{MIN_HEIGHT} minimum",
            config.width, config.height
        )));
    }
    if spec.n_mels() == 0 || spec.n_frames() == 0 {
        return Err(PipelineError::Render("spectrogram has no cells".to_string()));
    }

    let mut canvas = Canvas::new(config.width, config.height)?;
    let layout = Layout::new(canvas.width(), canvas.height());

    let vmax = spec.max_db();
    let vmin = spec.min_db();

    draw_heatmap(&mut canvas, &layout, spec, vmin, vmax);
    draw_time_axis(&mut canvas, &layout, spec.duration_secs());
    draw_freq_axis(&mut canvas, &layout, spec.fmax);
    draw_colorbar(&mut canvas, &layout, vmin, vmax);
    draw_title(&mut canvas, &layout, title);

    let png = canvas.into_png()?;
    Ok(SpectrogramImage {
        png,
        width: config.width,
        height: config.height,
    })
}

fn normalize(v: f64, vmin: f64, vmax: f64) -> f64 {
    let span = vmax - vmin;
    if span > 0.0 {
        (v - vmin) / span
    } else {
        0.0
    }
}

fn draw_heatmap(canvas: &mut Canvas, layout: &Layout, spec: &DbSpectrogram, vmin: f64, vmax: f64) {
    let lut: Vec<Rgb<u8>> = (0..256).map(|i| magma(i as f64 / 255.0)).collect();
    let n_frames = spec.n_frames() as i64;
    let n_mels = spec.n_mels() as i64;
    let (w, h) = (layout.plot_width(), layout.plot_height());

    for py in 0..h {
        // Low mel bins at the bottom.
        let mel = ((h - 1 - py) * n_mels / h).min(n_mels - 1) as usize;
        for px in 0..w {
            let frame = (px * n_frames / w).min(n_frames - 1) as usize;
            let t = normalize(spec.data[[mel, frame]], vmin, vmax);
            let color = lut[(t * 255.0).round() as usize];
            canvas.put(layout.plot_left + px, layout.plot_top + py, color);
        }
    }

    canvas.stroke_rect(
        layout.plot_left - 1,
        layout.plot_top - 1,
        layout.plot_right,
        layout.plot_bottom,
        BLACK,
    );
}

/// Tick label whose precision matches the tick interval.
fn format_seconds(seconds: f64, interval: f64) -> String {
    if interval >= 1.0 {
        format!("{seconds:.0}")
    } else if interval >= 0.1 {
        format!("{seconds:.1}")
    } else {
        format!("{seconds:.2}")
    }
}

fn pick_time_interval(duration: f64) -> f64 {
    TIME_TICKS
        .iter()
        .copied()
        .find(|&step| duration / step <= MAX_TIME_TICKS)
        .unwrap_or(TIME_TICKS[TIME_TICKS.len() - 1])
}

fn draw_time_axis(canvas: &mut Canvas, layout: &Layout, duration: f64) {
    let label_h = text_height(LABEL_SCALE);
    if duration > 0.0 {
        let interval = pick_time_interval(duration);
        let mut k = 0u32;
        loop {
            let t = k as f64 * interval;
            if t > duration + 1e-9 {
                break;
            }
            let x = layout.plot_left + ((t / duration) * (layout.plot_width() - 1) as f64).round() as i64;
            canvas.vline(x, layout.plot_bottom, layout.plot_bottom + TICK_LEN, BLACK);
            let label = format_seconds(t, interval);
            let lx = x - text_width(&label, LABEL_SCALE) / 2;
            canvas.text(lx, layout.plot_bottom + TICK_LEN + 4, &label, LABEL_SCALE, BLACK);
            k += 1;
        }
    }

    let axis = "Time";
    let cx = layout.plot_left + layout.plot_width() / 2;
    canvas.text(
        cx - text_width(axis, LABEL_SCALE) / 2,
        layout.plot_bottom + TICK_LEN + label_h + 12,
        axis,
        LABEL_SCALE,
        BLACK,
    );
}

fn draw_freq_axis(canvas: &mut Canvas, layout: &Layout, fmax: f64) {
    let label_h = text_height(LABEL_SCALE);
    let mel_max = hz_to_mel(fmax, false);
    let mut last_y: Option<i64> = None;

    if mel_max > 0.0 {
        for &hz in FREQ_TICKS.iter().filter(|&&hz| hz <= fmax) {
            let frac = hz_to_mel(hz, false) / mel_max;
            let y = layout.plot_bottom - 1 - (frac * (layout.plot_height() - 1) as f64).round() as i64;
            if last_y.is_some_and(|prev| prev - y < MIN_FREQ_TICK_GAP) {
                continue;
            }
            last_y = Some(y);

            canvas.hline(layout.plot_left - 1 - TICK_LEN, layout.plot_left - 1, y, BLACK);
            let label = format!("{hz:.0}");
            let lx = layout.plot_left - 1 - TICK_LEN - 4 - text_width(&label, LABEL_SCALE);
            canvas.text(lx, y - label_h / 2, &label, LABEL_SCALE, BLACK);
        }
    }

    let axis = "Frequency";
    let cy = layout.plot_top + layout.plot_height() / 2;
    canvas.text_vertical(10, cy + text_width(axis, LABEL_SCALE) / 2, axis, LABEL_SCALE, BLACK);
}

fn pick_db_step(range: f64) -> f64 {
    DB_STEPS
        .iter()
        .copied()
        .find(|&step| range / step <= MAX_DB_TICKS)
        .unwrap_or(DB_STEPS[DB_STEPS.len() - 1])
}

/// Colorbar label in the `%+2.0f dB` style.
fn format_db(db: f64) -> String {
    format!("{db:+.0} dB")
}

fn draw_colorbar(canvas: &mut Canvas, layout: &Layout, vmin: f64, vmax: f64) {
    let h = layout.plot_height();
    for py in 0..h {
        // Top row is the loudest value.
        let t = 1.0 - py as f64 / (h - 1).max(1) as f64;
        let color = magma(t);
        canvas.hline(layout.bar_left, layout.bar_right - 1, layout.plot_top + py, color);
    }
    canvas.stroke_rect(
        layout.bar_left - 1,
        layout.plot_top - 1,
        layout.bar_right,
        layout.plot_bottom,
        BLACK,
    );

    let label_h = text_height(LABEL_SCALE);
    let range = vmax - vmin;
    let y_for = |db: f64| -> i64 {
        let frac = if range > 0.0 { (vmax - db) / range } else { 0.0 };
        layout.plot_top + (frac * (h - 1) as f64).round() as i64
    };

    let step = if range > 0.0 { pick_db_step(range) } else { 1.0 };
    let mut k = 0u32;
    loop {
        let db = vmax - k as f64 * step;
        if db < vmin - 1e-9 {
            break;
        }
        let y = y_for(db);
        canvas.hline(layout.bar_right, layout.bar_right + TICK_LEN, y, BLACK);
        canvas.text(
            layout.bar_right + TICK_LEN + 4,
            y - label_h / 2,
            &format_db(db),
            LABEL_SCALE,
            BLACK,
        );
        if range <= 0.0 {
            break;
        }
        k += 1;
    }
}

fn draw_title(canvas: &mut Canvas, layout: &Layout, title: &str) {
    let cx = layout.plot_left + layout.plot_width() / 2;
    let x = cx - text_width(title, TITLE_SCALE) / 2;
    canvas.text(x, 8, title, TITLE_SCALE, BLACK);
}
