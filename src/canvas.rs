use egui::{Color32, ColorImage};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use rayon::prelude::*;

// ============================================================================
// MASK BUFFER — two-tone raster the user paints into
// ============================================================================

/// Maximum bounding box for the mask buffer. Source images larger than this
/// are scaled down (aspect preserved) before a buffer is allocated; smaller
/// images are used at their natural size, never upscaled.
pub const MAX_BUFFER_WIDTH: u32 = 800;
pub const MAX_BUFFER_HEIGHT: u32 = 600;

/// Gray value for a pixel the user has painted over.
pub const SELECTED: u8 = 255;
/// Gray value for an untouched pixel.
pub const UNSELECTED: u8 = 0;

/// Opacity of the selected region in the live preview composite.
const PREVIEW_OVERLAY_ALPHA: f32 = 0.5;

/// Brush diameter limits in buffer pixels.
pub const MIN_BRUSH_DIAMETER: f32 = 5.0;
pub const MAX_BRUSH_DIAMETER: f32 = 50.0;

/// User-adjustable round brush.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushConfig {
    /// Diameter in buffer pixels, clamped to [MIN_BRUSH_DIAMETER, MAX_BRUSH_DIAMETER].
    pub diameter: f32,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self { diameter: 20.0 }
    }
}

impl BrushConfig {
    pub fn radius(&self) -> f32 {
        self.diameter.clamp(MIN_BRUSH_DIAMETER, MAX_BRUSH_DIAMETER) / 2.0
    }
}

/// Painting was attempted before an image was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskError {
    Uninitialized,
}

impl std::fmt::Display for MaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaskError::Uninitialized => write!(f, "mask buffer not initialized (no image loaded)"),
        }
    }
}

impl std::error::Error for MaskError {}

/// Errors producing the uploadable mask artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// No image has been loaded, so there is no buffer to export.
    Uninitialized,
    /// PNG encoding failed.
    Encode(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Uninitialized => {
                write!(f, "nothing to export: mask buffer not initialized")
            }
            ExportError::Encode(e) => write!(f, "mask PNG encoding failed: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

/// Scale `(src_w, src_h)` to fit inside `(max_w, max_h)` preserving aspect
/// ratio. Sources already inside the box are returned unchanged — the buffer
/// is never upscaled past the natural image size.
pub fn fit_within(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let src_w = src_w.max(1);
    let src_h = src_h.max(1);
    if src_w <= max_w && src_h <= max_h {
        return (src_w, src_h);
    }
    let ratio = (max_w as f32 / src_w as f32).min(max_h as f32 / src_h as f32);
    (
        ((src_w as f32 * ratio).round() as u32).max(1),
        ((src_h as f32 * ratio).round() as u32).max(1),
    )
}

/// The two-tone mask raster. Black (`UNSELECTED`) everywhere until the user
/// paints; painted pixels are white (`SELECTED`). Dimensions are fixed at
/// `initialize` time and only change when a new image replaces the old one.
///
/// All mutation goes through `paint_disc` / `paint_segment` / `reset`;
/// nothing outside this type touches pixels directly.
pub struct MaskBuffer {
    mask: Option<GrayImage>,
}

impl Default for MaskBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskBuffer {
    /// An uninitialized buffer. Painting and export fail until `initialize`
    /// is called with the loaded image's dimensions.
    pub fn new() -> Self {
        Self { mask: None }
    }

    /// (Re)allocate the buffer for a source image of the given natural size,
    /// scaled to fit `MAX_BUFFER_WIDTH`×`MAX_BUFFER_HEIGHT`, filled entirely
    /// with `UNSELECTED`. Returns the buffer dimensions chosen.
    pub fn initialize(&mut self, source_w: u32, source_h: u32) -> (u32, u32) {
        let (w, h) = fit_within(source_w, source_h, MAX_BUFFER_WIDTH, MAX_BUFFER_HEIGHT);
        self.mask = Some(GrayImage::from_pixel(w, h, Luma([UNSELECTED])));
        (w, h)
    }

    pub fn is_initialized(&self) -> bool {
        self.mask.is_some()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.mask.as_ref().map(|m| m.dimensions())
    }

    /// Read access for preview compositing. `None` until initialized.
    pub fn image(&self) -> Option<&GrayImage> {
        self.mask.as_ref()
    }

    /// Number of selected pixels. Zero for an uninitialized or blank buffer.
    pub fn selected_count(&self) -> u64 {
        match &self.mask {
            Some(mask) => mask.pixels().filter(|p| p[0] != UNSELECTED).count() as u64,
            None => 0,
        }
    }

    /// Refill with `UNSELECTED` without changing dimensions. No-op when
    /// uninitialized. Idempotent.
    pub fn reset(&mut self) {
        if let Some(mask) = self.mask.as_mut() {
            for px in mask.pixels_mut() {
                *px = Luma([UNSELECTED]);
            }
        }
    }

    /// Fill a disc of `radius` centered at `(x, y)` with `SELECTED`.
    /// Coordinates are buffer-space; parts of the disc falling outside the
    /// buffer are clipped. Repainting already-selected pixels changes nothing.
    pub fn paint_disc(&mut self, x: f32, y: f32, radius: f32) -> Result<(), MaskError> {
        let mask = self.mask.as_mut().ok_or(MaskError::Uninitialized)?;
        let (w, h) = mask.dimensions();
        let r = radius.max(0.5);

        let min_x = (x - r).floor().max(0.0) as u32;
        let min_y = (y - r).floor().max(0.0) as u32;
        let max_x = ((x + r).ceil().max(0.0) as u32).min(w.saturating_sub(1));
        let max_y = ((y + r).ceil().max(0.0) as u32).min(h.saturating_sub(1));

        let r_sq = r * r;
        for py in min_y..=max_y {
            for px in min_x..=max_x {
                // Sample at the pixel center
                let dx = px as f32 + 0.5 - x;
                let dy = py as f32 + 0.5 - y;
                if dx * dx + dy * dy <= r_sq {
                    mask.put_pixel(px, py, Luma([SELECTED]));
                }
            }
        }
        Ok(())
    }

    /// Paint discs along the segment `from` → `to` so that fast pointer
    /// motion leaves no gaps: one stamp roughly every 2 buffer units,
    /// including both endpoints. Short hops (< 2 units) stamp only at `to`.
    pub fn paint_segment(
        &mut self,
        from: (f32, f32),
        to: (f32, f32),
        radius: f32,
    ) -> Result<(), MaskError> {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let distance = (dx * dx + dy * dy).sqrt();

        if distance < 2.0 {
            return self.paint_disc(to.0, to.1, radius);
        }

        let steps = (distance / 2.0).ceil() as u32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.paint_disc(from.0 + dx * t, from.1 + dy * t, radius)?;
        }
        Ok(())
    }

    /// Produce the uploadable artifact: an RGBA image of identical dimensions
    /// where every pixel is fully opaque — white where selected, black where
    /// not. Downstream consumers require an opaque two-tone mask, so the
    /// distinction is carried in the color value, never the alpha channel.
    pub fn export(&self) -> Result<RgbaImage, ExportError> {
        let mask = self.mask.as_ref().ok_or(ExportError::Uninitialized)?;
        let (w, h) = mask.dimensions();
        let mut out = RgbaImage::new(w, h);
        for (src, dst) in mask.pixels().zip(out.pixels_mut()) {
            let v = if src[0] == UNSELECTED { 0 } else { 255 };
            *dst = Rgba([v, v, v, 255]);
        }
        Ok(out)
    }
}

/// Composite the mask over the (buffer-sized) source for on-screen preview:
/// selected pixels are lifted toward white at `PREVIEW_OVERLAY_ALPHA`,
/// unselected pixels show the source unchanged. `source` and `mask` must
/// share dimensions.
pub fn compose_preview(source: &RgbaImage, mask: &GrayImage) -> ColorImage {
    debug_assert_eq!(source.dimensions(), mask.dimensions());
    let (w, h) = source.dimensions();
    let src = source.as_raw();
    let sel = mask.as_raw();

    let mut pixels = vec![Color32::BLACK; (w as usize) * (h as usize)];
    pixels.par_iter_mut().enumerate().for_each(|(i, out)| {
        let r = src[i * 4] as f32;
        let g = src[i * 4 + 1] as f32;
        let b = src[i * 4 + 2] as f32;
        *out = if sel[i] != UNSELECTED {
            let a = PREVIEW_OVERLAY_ALPHA;
            Color32::from_rgb(
                (r + (255.0 - r) * a) as u8,
                (g + (255.0 - g) * a) as u8,
                (b + (255.0 - b) * a) as u8,
            )
        } else {
            Color32::from_rgb(r as u8, g as u8, b as u8)
        };
    });

    ColorImage {
        size: [w as usize, h as usize],
        pixels,
    }
}

// ============================================================================
// LETTERBOX GEOMETRY — display-space ↔ buffer-space mapping
// ============================================================================

/// How the buffer-aspect image sits inside a display rectangle of a
/// (generally) different aspect ratio: scaled to touch on one axis and
/// centered along the other. Built once per frame from the measured display
/// rect; both pointer mapping and the brush-cursor overlay consume the same
/// struct so the geometry exists in exactly one place.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LetterboxFit {
    buffer_w: f32,
    buffer_h: f32,
    /// On-screen size of the rendered image (≤ display size on each axis).
    pub rendered_w: f32,
    pub rendered_h: f32,
    /// Margin between the display rect's origin and the rendered image.
    /// One of the two is always zero.
    pub offset_x: f32,
    pub offset_y: f32,
}

impl LetterboxFit {
    pub fn new(display_w: f32, display_h: f32, buffer_w: u32, buffer_h: u32) -> Self {
        let display_w = display_w.max(1.0);
        let display_h = display_h.max(1.0);
        let buffer_w = buffer_w.max(1) as f32;
        let buffer_h = buffer_h.max(1) as f32;

        let buffer_aspect = buffer_w / buffer_h;
        let display_aspect = display_w / display_h;

        let (rendered_w, rendered_h, offset_x, offset_y) = if buffer_aspect > display_aspect {
            // Wider than the display slot: fill width, center vertically
            let rendered_h = display_w / buffer_aspect;
            (display_w, rendered_h, 0.0, (display_h - rendered_h) / 2.0)
        } else {
            // Taller (or equal): fill height, center horizontally
            let rendered_w = display_h * buffer_aspect;
            (rendered_w, display_h, (display_w - rendered_w) / 2.0, 0.0)
        };

        Self {
            buffer_w,
            buffer_h,
            rendered_w,
            rendered_h,
            offset_x,
            offset_y,
        }
    }

    /// Map a pointer position (relative to the display rect's top-left) into
    /// buffer coordinates. Returns `None` when the pointer is over a
    /// letterbox margin or otherwise off the rendered image — the caller
    /// must treat that as "outside", never as a paintable point.
    pub fn display_to_buffer(&self, mouse_x: f32, mouse_y: f32) -> Option<(f32, f32)> {
        let rel_x = mouse_x - self.offset_x;
        let rel_y = mouse_y - self.offset_y;
        if rel_x < 0.0 || rel_x > self.rendered_w || rel_y < 0.0 || rel_y > self.rendered_h {
            return None;
        }
        Some((
            rel_x / self.rendered_w * self.buffer_w,
            rel_y / self.rendered_h * self.buffer_h,
        ))
    }

    /// Inverse of `display_to_buffer`, used to place overlays (brush cursor)
    /// over buffer positions.
    pub fn buffer_to_display(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x / self.buffer_w * self.rendered_w + self.offset_x,
            y / self.buffer_h * self.rendered_h + self.offset_y,
        )
    }

    /// On-screen pixels per buffer pixel (horizontal == vertical, since the
    /// fit preserves aspect).
    pub fn display_scale(&self) -> f32 {
        self.rendered_w / self.buffer_w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-3, "expected {} ≈ {}", a, b);
    }

    #[test]
    fn fit_scales_width_bound_source() {
        assert_eq!(fit_within(1920, 1080, 800, 600), (800, 450));
    }

    #[test]
    fn fit_keeps_small_source_unscaled() {
        assert_eq!(fit_within(400, 300, 800, 600), (400, 300));
        // Never upscale
        assert_eq!(fit_within(200, 150, 800, 600), (200, 150));
    }

    #[test]
    fn fit_scales_height_bound_source() {
        assert_eq!(fit_within(1200, 1600, 800, 600), (450, 600));
        assert_eq!(fit_within(1600, 1200, 800, 600), (800, 600));
    }

    #[test]
    fn letterbox_square_display_wide_buffer() {
        // 1600×1200 image → 800×600 buffer shown in a 500×500 slot:
        // rendered 500×375, vertically centered with 62.5 px bands.
        let fit = LetterboxFit::new(500.0, 500.0, 800, 600);
        assert_close(fit.rendered_w, 500.0);
        assert_close(fit.rendered_h, 375.0);
        assert_close(fit.offset_x, 0.0);
        assert_close(fit.offset_y, 62.5);

        // Above the top letterbox band
        assert_eq!(fit.display_to_buffer(250.0, 10.0), None);

        let (x, y) = fit.display_to_buffer(250.0, 250.0).unwrap();
        assert_close(x, 400.0);
        assert_close(y, 300.0);
    }

    #[test]
    fn letterbox_tall_buffer_centers_horizontally() {
        let fit = LetterboxFit::new(600.0, 300.0, 300, 300);
        assert_close(fit.rendered_w, 300.0);
        assert_close(fit.rendered_h, 300.0);
        assert_close(fit.offset_x, 150.0);
        assert_close(fit.offset_y, 0.0);
        assert_eq!(fit.display_to_buffer(10.0, 150.0), None);
        assert_eq!(fit.display_to_buffer(580.0, 150.0), None);
        let (x, y) = fit.display_to_buffer(300.0, 150.0).unwrap();
        assert_close(x, 150.0);
        assert_close(y, 150.0);
    }

    #[test]
    fn letterbox_roundtrip_through_inverse() {
        let fit = LetterboxFit::new(500.0, 500.0, 800, 600);
        let (dx, dy) = fit.buffer_to_display(400.0, 300.0);
        let (bx, by) = fit.display_to_buffer(dx, dy).unwrap();
        assert_close(bx, 400.0);
        assert_close(by, 300.0);
    }

    #[test]
    fn paint_disc_stays_local() {
        let mut buffer = MaskBuffer::new();
        buffer.initialize(100, 80);
        buffer.paint_disc(50.0, 40.0, 5.0).unwrap();

        let mask = buffer.image().unwrap();
        assert_eq!(mask.get_pixel(50, 40)[0], SELECTED);
        // Every selected pixel lies within radius+1 of the center
        for (x, y, px) in mask.enumerate_pixels() {
            if px[0] == SELECTED {
                let dx = x as f32 + 0.5 - 50.0;
                let dy = y as f32 + 0.5 - 40.0;
                assert!(dx * dx + dy * dy <= 6.0 * 6.0, "stray pixel at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn paint_disc_clips_at_edges() {
        let mut buffer = MaskBuffer::new();
        buffer.initialize(100, 80);
        buffer.paint_disc(0.0, 0.0, 10.0).unwrap();
        buffer.paint_disc(100.0, 80.0, 10.0).unwrap();
        assert!(buffer.selected_count() > 0);
    }

    #[test]
    fn paint_requires_initialization() {
        let mut buffer = MaskBuffer::new();
        assert_eq!(buffer.paint_disc(10.0, 10.0, 5.0), Err(MaskError::Uninitialized));
        assert_eq!(
            buffer.paint_segment((0.0, 0.0), (10.0, 10.0), 5.0),
            Err(MaskError::Uninitialized)
        );
    }

    #[test]
    fn segment_leaves_no_gaps() {
        let mut buffer = MaskBuffer::new();
        buffer.initialize(200, 200);
        let a = (10.0, 10.0);
        let b = (90.0, 30.0);
        let c = (180.0, 170.0);
        buffer.paint_segment(a, b, 5.0).unwrap();
        buffer.paint_segment(b, c, 5.0).unwrap();

        let mask = buffer.image().unwrap();
        // Walk both legs at 1-unit spacing: every sample must be painted
        for (from, to) in [(a, b), (b, c)] {
            let dx = to.0 - from.0;
            let dy = to.1 - from.1;
            let len = (dx * dx + dy * dy).sqrt();
            let samples = len.ceil() as u32;
            for i in 0..=samples {
                let t = i as f32 / samples as f32;
                let x = (from.0 + dx * t) as u32;
                let y = (from.1 + dy * t) as u32;
                assert_eq!(mask.get_pixel(x, y)[0], SELECTED, "gap at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn short_segment_paints_endpoint_only_once() {
        let mut buffer = MaskBuffer::new();
        buffer.initialize(100, 100);
        buffer.paint_segment((50.0, 50.0), (50.5, 50.0), 3.0).unwrap();
        let mask = buffer.image().unwrap();
        assert_eq!(mask.get_pixel(50, 50)[0], SELECTED);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut buffer = MaskBuffer::new();
        buffer.initialize(100, 80);
        buffer.paint_disc(50.0, 40.0, 10.0).unwrap();
        assert!(buffer.selected_count() > 0);

        buffer.reset();
        assert_eq!(buffer.selected_count(), 0);
        let first = buffer.image().unwrap().clone();

        buffer.reset();
        assert_eq!(buffer.image().unwrap(), &first);
        // Dimensions survive the reset
        assert_eq!(buffer.dimensions(), Some((100, 80)));
    }

    #[test]
    fn reinitialize_replaces_dimensions() {
        let mut buffer = MaskBuffer::new();
        assert_eq!(buffer.initialize(1920, 1080), (800, 450));
        buffer.paint_disc(100.0, 100.0, 10.0).unwrap();
        assert_eq!(buffer.initialize(400, 300), (400, 300));
        assert_eq!(buffer.selected_count(), 0);
    }

    #[test]
    fn export_uninitialized_fails() {
        let buffer = MaskBuffer::new();
        assert_eq!(buffer.export(), Err(ExportError::Uninitialized));
    }

    #[test]
    fn export_blank_buffer_is_opaque_black() {
        let mut buffer = MaskBuffer::new();
        buffer.initialize(40, 30);
        let out = buffer.export().unwrap();
        assert_eq!(out.dimensions(), (40, 30));
        for px in out.pixels() {
            assert_eq!(*px, Rgba([0, 0, 0, 255]));
        }
    }

    #[test]
    fn export_is_two_tone_and_fully_opaque() {
        let mut buffer = MaskBuffer::new();
        buffer.initialize(60, 60);
        buffer.paint_disc(30.0, 30.0, 8.0).unwrap();
        let out = buffer.export().unwrap();
        let mut saw_white = false;
        for px in out.pixels() {
            assert_eq!(px[3], 255);
            assert!(
                *px == Rgba([0, 0, 0, 255]) || *px == Rgba([255, 255, 255, 255]),
                "non-two-tone pixel {:?}",
                px
            );
            if px[0] == 255 {
                saw_white = true;
            }
        }
        assert!(saw_white);
    }

    #[test]
    fn preview_tints_only_selected_pixels() {
        let mut buffer = MaskBuffer::new();
        buffer.initialize(20, 20);
        buffer.paint_disc(5.0, 5.0, 2.0).unwrap();
        let source = RgbaImage::from_pixel(20, 20, Rgba([100, 100, 100, 255]));
        let preview = compose_preview(&source, buffer.image().unwrap());
        assert_eq!(preview.size, [20, 20]);
        // (5,5) painted, far corner untouched
        assert_ne!(preview.pixels[5 * 20 + 5], Color32::from_rgb(100, 100, 100));
        assert_eq!(preview.pixels[19 * 20 + 19], Color32::from_rgb(100, 100, 100));
    }

    #[test]
    fn brush_radius_clamps_diameter() {
        let brush = BrushConfig { diameter: 500.0 };
        assert_close(brush.radius(), MAX_BRUSH_DIAMETER / 2.0);
        let brush = BrushConfig { diameter: 1.0 };
        assert_close(brush.radius(), MIN_BRUSH_DIAMETER / 2.0);
        assert_close(BrushConfig::default().radius(), 10.0);
    }
}
