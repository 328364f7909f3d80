//! Overlay rendering.
//!
//! Composites the cached (possibly decayed) mask onto a copy of the current
//! frame: alpha-tinted fill where the mask clears the render threshold,
//! stroked external contours, hollow boxes for object detections, and a
//! small telemetry HUD. The renderer never mutates the cache or the input
//! frame.

use std::time::Duration;

use clap::ValueEnum;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use serde::Deserialize;

use crate::cache::CachedMask;
use crate::detect::BoxDetection;
use crate::mask::{outer_contours, threshold_intensities};

/// Mask intensity (0..255) above which a pixel is tinted.
pub const RENDER_THRESHOLD: f32 = 128.0;

/// Boundary fill tint (blue).
pub const TINT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
/// Contour stroke color (red).
pub const CONTOUR_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Object box color (yellow).
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

const HUD_FPS_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const HUD_STALENESS_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const HUD_BACKGROUND: Rgb<u8> = Rgb([32, 32, 32]);
const HUD_BAR_WIDTH: u32 = 120;
const HUD_BAR_HEIGHT: u32 = 6;
const HUD_FPS_FULL_SCALE: f32 = 60.0;
const HUD_STALENESS_FULL_SCALE: f32 = 5.0;

/// How batch outputs are decorated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Frame passes through untouched.
    None,
    /// Light fill plus contour strokes.
    #[default]
    Draw,
    /// Stronger fill, no contour strokes.
    Highlight,
}

/// Fill/stroke parameters for one rendering flavor.
#[derive(Clone, Copy, Debug)]
pub struct RenderStyle {
    pub alpha: f32,
    pub contours: bool,
}

impl DisplayMode {
    /// Batch style for this mode; `None` means pass-through.
    pub fn style(self) -> Option<RenderStyle> {
        match self {
            DisplayMode::None => None,
            DisplayMode::Draw => Some(RenderStyle {
                alpha: 0.1,
                contours: true,
            }),
            DisplayMode::Highlight => Some(RenderStyle {
                alpha: 0.3,
                contours: false,
            }),
        }
    }
}

/// Loop telemetry drawn onto live frames.
#[derive(Clone, Copy, Debug)]
pub struct Telemetry {
    /// Instantaneous display rate.
    pub fps: f32,
    /// Time since the detector last ran, if it ever has.
    pub staleness: Option<Duration>,
}

pub struct OverlayRenderer {
    style: RenderStyle,
    tint: Rgb<u8>,
    contour_color: Rgb<u8>,
    box_color: Rgb<u8>,
    stroke: u32,
    threshold: f32,
}

impl OverlayRenderer {
    pub fn new(style: RenderStyle) -> Self {
        Self {
            style,
            tint: TINT_COLOR,
            contour_color: CONTOUR_COLOR,
            box_color: BOX_COLOR,
            stroke: 2,
            threshold: RENDER_THRESHOLD,
        }
    }

    /// Renderer for the live loop: configured fill alpha, contours always on.
    pub fn live(alpha: f32) -> Self {
        Self::new(RenderStyle {
            alpha,
            contours: true,
        })
    }

    /// Renderer for a batch display mode; `None` when the mode is
    /// pass-through.
    pub fn for_mode(mode: DisplayMode) -> Option<Self> {
        mode.style().map(Self::new)
    }

    pub fn with_tint(mut self, tint: Rgb<u8>) -> Self {
        self.tint = tint;
        self
    }

    /// Composite mask, boxes and telemetry onto a copy of the frame.
    pub fn render(
        &self,
        frame: &RgbImage,
        mask: Option<&CachedMask>,
        boxes: &[BoxDetection],
        telemetry: Option<&Telemetry>,
    ) -> RgbImage {
        let mut out = frame.clone();

        if let Some(mask) = mask {
            if mask.width() == frame.width() && mask.height() == frame.height() {
                self.blend_mask(&mut out, mask);
                if self.style.contours {
                    self.stroke_contours(&mut out, mask);
                }
            } else {
                log::warn!(
                    "cached mask {}x{} does not match frame {}x{}, skipping overlay",
                    mask.width(),
                    mask.height(),
                    frame.width(),
                    frame.height()
                );
            }
        }

        for b in boxes {
            self.draw_box(&mut out, b);
        }

        if let Some(telemetry) = telemetry {
            self.draw_telemetry(&mut out, telemetry);
        }

        out
    }

    /// `out = alpha*tint + (1-alpha)*original` for above-threshold pixels.
    fn blend_mask(&self, out: &mut RgbImage, mask: &CachedMask) {
        let alpha = self.style.alpha.clamp(0.0, 1.0);
        if alpha == 0.0 || mask.is_faded() {
            return;
        }
        for (x, y, px) in out.enumerate_pixels_mut() {
            if mask.intensity(x, y) > self.threshold {
                for c in 0..3 {
                    let orig = px.0[c] as f32;
                    let tint = self.tint.0[c] as f32;
                    let blended = alpha * tint + (1.0 - alpha) * orig;
                    px.0[c] = blended.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    fn stroke_contours(&self, out: &mut RgbImage, mask: &CachedMask) {
        let binary = threshold_intensities(
            mask.width(),
            mask.height(),
            mask.intensities(),
            self.threshold,
        );
        let offset = (self.stroke / 2) as i32;
        for contour in outer_contours(&binary) {
            for point in &contour.points {
                let rect =
                    Rect::at(point.x - offset, point.y - offset).of_size(self.stroke, self.stroke);
                draw_filled_rect_mut(out, rect, self.contour_color);
            }
        }
    }

    fn draw_box(&self, out: &mut RgbImage, b: &BoxDetection) {
        let w = b.width().round() as u32;
        let h = b.height().round() as u32;
        if w == 0 || h == 0 {
            return;
        }
        let (x, y) = (b.x1.round() as i32, b.y1.round() as i32);
        // Nested rectangles stand in for stroke width.
        for inset in 0..self.stroke as i32 {
            let iw = w.saturating_sub(2 * inset as u32);
            let ih = h.saturating_sub(2 * inset as u32);
            if iw == 0 || ih == 0 {
                break;
            }
            draw_hollow_rect_mut(out, Rect::at(x + inset, y + inset).of_size(iw, ih), self.box_color);
        }
        log::debug!("box {} {:.2} at ({:.0},{:.0})", b.label, b.confidence, b.x1, b.y1);
    }

    /// FPS and staleness as horizontal gauge bars in the top-left corner.
    /// Glyph rendering would need a bundled font; the gauges plus debug logs
    /// carry the same numbers.
    fn draw_telemetry(&self, out: &mut RgbImage, telemetry: &Telemetry) {
        if out.width() < HUD_BAR_WIDTH + 20 || out.height() < 40 {
            return;
        }

        let fps_frac = (telemetry.fps / HUD_FPS_FULL_SCALE).clamp(0.0, 1.0);
        draw_gauge(out, 10, 10, fps_frac, HUD_FPS_COLOR);

        if let Some(staleness) = telemetry.staleness {
            let frac = (staleness.as_secs_f32() / HUD_STALENESS_FULL_SCALE).clamp(0.0, 1.0);
            draw_gauge(out, 10, 10 + HUD_BAR_HEIGHT as i32 + 4, frac, HUD_STALENESS_COLOR);
            log::debug!(
                "telemetry fps={:.1} staleness={:.1}s",
                telemetry.fps,
                staleness.as_secs_f32()
            );
        } else {
            log::debug!("telemetry fps={:.1} (no detection yet)", telemetry.fps);
        }
    }
}

fn draw_gauge(out: &mut RgbImage, x: i32, y: i32, fraction: f32, color: Rgb<u8>) {
    draw_filled_rect_mut(
        out,
        Rect::at(x, y).of_size(HUD_BAR_WIDTH, HUD_BAR_HEIGHT),
        HUD_BACKGROUND,
    );
    let filled = (fraction * HUD_BAR_WIDTH as f32).round() as u32;
    if filled > 0 {
        draw_filled_rect_mut(out, Rect::at(x, y).of_size(filled, HUD_BAR_HEIGHT), color);
    }
}
