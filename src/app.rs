use std::sync::Arc;
use std::sync::mpsc::{self, TryRecvError};
use std::time::{Duration, Instant};

use eframe::egui;
use egui::{Color32, Rect, TextureHandle, TextureOptions, Vec2};
use image::RgbaImage;
use image::imageops::FilterType;

use crate::canvas::{self, BrushConfig, LetterboxFit, MaskBuffer};
use crate::io;
use crate::ops::service::{
    AcceptAll, EchoService, EditService, MODIFY_TIMEOUT, ModifyRequest, ModifyResponse,
    ServiceError, SubjectValidator, spawn_modify_job,
};
use crate::session::DrawingSession;
use crate::{log_err, log_info, log_warn};

// ============================================================================
// APPLICATION — upload, paint, prompt, submit
// ============================================================================

/// The loaded photo. `scaled` is resampled to the mask buffer's dimensions
/// once at load time; both the preview and the submission use it, so the
/// uploaded artifact always matches the mask pixel-for-pixel.
struct SourceImage {
    natural_w: u32,
    natural_h: u32,
    scaled: RgbaImage,
}

/// An in-flight submission to the editing service.
struct SubmissionJob {
    rx: mpsc::Receiver<Result<ModifyResponse, ServiceError>>,
    started: Instant,
}

struct StatusLine {
    text: String,
    is_error: bool,
}

pub struct MaskPaintApp {
    source: Option<SourceImage>,
    mask: MaskBuffer,
    session: DrawingSession,
    brush: BrushConfig,
    prompt: String,

    /// Source + mask composite shown on the canvas. Rebuilt lazily whenever
    /// a stroke or reset touched the mask.
    preview_texture: Option<TextureHandle>,
    preview_dirty: bool,

    result_texture: Option<TextureHandle>,
    show_result: bool,

    status: Option<StatusLine>,
    job: Option<SubmissionJob>,

    service: Arc<dyn EditService>,
    validator: Box<dyn SubjectValidator>,
}

impl MaskPaintApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self {
            source: None,
            mask: MaskBuffer::new(),
            session: DrawingSession::new(),
            brush: BrushConfig::default(),
            prompt: String::new(),
            preview_texture: None,
            preview_dirty: false,
            result_texture: None,
            show_result: false,
            status: None,
            job: None,
            service: Arc::new(EchoService),
            validator: Box::new(AcceptAll),
        }
    }

    fn set_status(&mut self, text: String) {
        self.status = Some(StatusLine {
            text,
            is_error: false,
        });
    }

    fn set_error(&mut self, text: String) {
        self.status = Some(StatusLine {
            text,
            is_error: true,
        });
    }

    // -- Image upload --------------------------------------------------------

    fn open_image(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", io::SUPPORTED_EXTENSIONS)
            .pick_file()
        else {
            return;
        };

        let image = match io::load_image(&path) {
            Ok(image) => image,
            Err(e) => {
                log_err!("open '{}' failed: {}", path.display(), e);
                self.set_error(format!("Could not open image: {}", e));
                return;
            }
        };

        // Validation gate: on rejection the mask buffer is never initialized
        match self.validator.contains_subject(&image) {
            Ok(true) => {}
            Ok(false) => {
                let msg = self.validator.rejection_message().to_string();
                log_warn!("upload rejected: '{}'", path.display());
                self.set_error(msg);
                return;
            }
            Err(e) => {
                log_err!("upload validation failed: {}", e);
                self.set_error(format!("Upload validation failed: {}", e));
                return;
            }
        }

        let (natural_w, natural_h) = image.dimensions();
        let (bw, bh) = self.mask.initialize(natural_w, natural_h);
        let scaled = if (natural_w, natural_h) == (bw, bh) {
            image
        } else {
            image::imageops::resize(&image, bw, bh, FilterType::Triangle)
        };

        log_info!(
            "loaded '{}': {}×{} → buffer {}×{}",
            path.display(),
            natural_w,
            natural_h,
            bw,
            bh
        );

        self.source = Some(SourceImage {
            natural_w,
            natural_h,
            scaled,
        });
        self.session = DrawingSession::new();
        self.preview_texture = None;
        self.preview_dirty = true;
        self.result_texture = None;
        self.show_result = false;
        self.set_status("Image loaded — paint over the region to modify.".into());
    }

    // -- Submission ----------------------------------------------------------

    fn can_submit(&self) -> bool {
        self.source.is_some()
            && !self.prompt.trim().is_empty()
            && self.mask.selected_count() > 0
            && self.job.is_none()
            && !self.session.is_drawing()
    }

    fn submit(&mut self) {
        if self.job.is_some() || self.session.is_drawing() {
            return;
        }
        if self.mask.selected_count() == 0 {
            self.set_error("Paint the area to modify first.".into());
            return;
        }
        if self.prompt.trim().is_empty() {
            self.set_error("Describe the edit in the prompt field.".into());
            return;
        }

        let encoded = self.source.as_ref().map(|s| io::encode_png(&s.scaled));
        let original_png = match encoded {
            None => return,
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                log_err!("original encode failed: {}", e);
                self.set_error(format!("Could not encode image: {}", e));
                return;
            }
        };

        let mask_result = io::export_mask_png(&self.mask);
        let mask_png = match mask_result {
            Ok(bytes) => bytes,
            Err(e) => {
                log_err!("mask export failed: {}", e);
                self.set_error(format!("Could not export mask: {}", e));
                return;
            }
        };

        let request = ModifyRequest {
            original_png,
            mask_png,
            prompt: self.prompt.trim().to_string(),
        };
        log_info!(
            "submitting edit: prompt \"{}\", original {} B, mask {} B",
            request.prompt,
            request.original_png.len(),
            request.mask_png.len()
        );

        self.job = Some(SubmissionJob {
            rx: spawn_modify_job(self.service.clone(), request),
            started: Instant::now(),
        });
        self.set_status("Submitting edit…".into());
    }

    fn poll_job(&mut self, ctx: &egui::Context) {
        let Some(job) = self.job.as_ref() else { return };
        let received = job.rx.try_recv();
        let elapsed = job.started.elapsed();

        match received {
            Ok(Ok(response)) => {
                self.job = None;
                match image::load_from_memory(&response.edited_png) {
                    Ok(img) => {
                        let rgba = img.into_rgba8();
                        let size = [rgba.width() as usize, rgba.height() as usize];
                        let color =
                            egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
                        self.result_texture =
                            Some(ctx.load_texture("edit-result", color, TextureOptions::LINEAR));
                        self.show_result = true;
                        log_info!("edit complete: {}×{} result", size[0], size[1]);
                        self.set_status("Edit complete.".into());
                    }
                    Err(e) => {
                        log_err!("result decode failed: {}", e);
                        self.set_error(format!("Service returned an unreadable image: {}", e));
                    }
                }
            }
            Ok(Err(e)) => {
                self.job = None;
                log_err!("edit failed: {}", e);
                self.set_error(format!("Edit failed: {}", e));
            }
            Err(TryRecvError::Empty) => {
                if elapsed >= MODIFY_TIMEOUT {
                    // Abandon the worker; its send will land on a dead channel
                    self.job = None;
                    log_warn!("edit timed out after {:?}", MODIFY_TIMEOUT);
                    self.set_error(
                        "The edit timed out — your painted mask is untouched, try again.".into(),
                    );
                } else {
                    ctx.request_repaint_after(Duration::from_millis(100));
                }
            }
            Err(TryRecvError::Disconnected) => {
                self.job = None;
                log_err!("edit worker disappeared without answering");
                self.set_error("Edit failed: the worker stopped unexpectedly.".into());
            }
        }
    }

    // -- Canvas --------------------------------------------------------------

    fn show_canvas(&mut self, ui: &mut egui::Ui) {
        let Some((bw, bh)) = self.mask.dimensions() else {
            return;
        };

        let avail = ui.available_size();
        let (rect, response) = ui.allocate_exact_size(avail, egui::Sense::click_and_drag());
        let fit = LetterboxFit::new(rect.width(), rect.height(), bw, bh);

        // Pointer events first, so this frame's stroke shows in this frame's
        // texture rebuild. Positions are mapped relative to the display rect;
        // the letterbox margins map to the outside sentinel.
        let hover = response.hover_pos();
        let mapped =
            hover.and_then(|pos| fit.display_to_buffer(pos.x - rect.min.x, pos.y - rect.min.y));

        if self.job.is_none() {
            let primary_pressed = ui.input(|i| i.pointer.primary_pressed());
            let primary_down = ui.input(|i| i.pointer.primary_down());
            let primary_released = ui.input(|i| i.pointer.primary_released());

            if primary_pressed && response.hovered() {
                self.session.pointer_down(mapped, &mut self.mask, &self.brush);
                self.preview_dirty |= self.session.is_drawing();
            } else if primary_down && self.session.is_drawing() {
                self.session.pointer_move(mapped, &mut self.mask, &self.brush);
                self.preview_dirty = true;
            }
            if primary_released && self.session.is_drawing() {
                self.session.pointer_up();
            }
            if hover.is_none() && self.session.is_drawing() {
                self.session.pointer_leave();
            }
        }

        if self.preview_dirty || self.preview_texture.is_none() {
            if let (Some(source), Some(mask_img)) = (&self.source, self.mask.image()) {
                let composite = canvas::compose_preview(&source.scaled, mask_img);
                match &mut self.preview_texture {
                    Some(tex) => tex.set(composite, TextureOptions::LINEAR),
                    None => {
                        self.preview_texture = Some(ui.ctx().load_texture(
                            "mask-preview",
                            composite,
                            TextureOptions::LINEAR,
                        ))
                    }
                }
            }
            self.preview_dirty = false;
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_gray(24));
        let image_rect = Rect::from_min_size(
            rect.min + Vec2::new(fit.offset_x, fit.offset_y),
            Vec2::new(fit.rendered_w, fit.rendered_h),
        );
        if let Some(tex) = &self.preview_texture {
            painter.image(
                tex.id(),
                image_rect,
                Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        // Brush cursor: outline of the brush footprint at the hover position
        if let (Some(pos), Some(_)) = (hover, mapped) {
            painter.circle_stroke(
                pos,
                self.brush.radius() * fit.display_scale(),
                egui::Stroke::new(1.0, Color32::WHITE),
            );
        }

        if self.session.is_drawing() {
            ui.ctx().request_repaint();
        }
    }
}

impl eframe::App for MaskPaintApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_job(ctx);

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                if ui
                    .add_enabled(self.job.is_none(), egui::Button::new("Open Image…"))
                    .clicked()
                {
                    self.open_image();
                }
                ui.separator();

                ui.label("Brush:");
                ui.add(
                    egui::Slider::new(
                        &mut self.brush.diameter,
                        canvas::MIN_BRUSH_DIAMETER..=canvas::MAX_BRUSH_DIAMETER,
                    )
                    .suffix(" px"),
                );
                if ui
                    .add_enabled(self.mask.is_initialized(), egui::Button::new("Clear Mask"))
                    .clicked()
                {
                    self.session.reset(&mut self.mask);
                    self.preview_dirty = true;
                    self.set_status("Mask cleared.".into());
                }
                ui.separator();

                ui.label("Prompt:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.prompt)
                        .hint_text("Describe the change for the painted region…")
                        .desired_width(280.0),
                );
                if ui
                    .add_enabled(self.can_submit(), egui::Button::new("Apply Edit"))
                    .clicked()
                {
                    self.submit();
                }
                if self.job.is_some() {
                    ui.spinner();
                    ui.label("Editing…");
                }
            });
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match &self.status {
                    Some(status) if status.is_error => {
                        ui.colored_label(Color32::from_rgb(235, 100, 100), &status.text);
                    }
                    Some(status) => {
                        ui.label(&status.text);
                    }
                    None => {
                        ui.label(
                            "Open an image, paint the region to change, describe the edit, then apply.",
                        );
                    }
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(source) = &self.source
                        && let Some((bw, bh)) = self.mask.dimensions()
                    {
                        ui.label(format!(
                            "{}×{} → {}×{}",
                            source.natural_w, source.natural_h, bw, bh
                        ));
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.source.is_some() {
                self.show_canvas(ui);
            } else {
                ui.centered_and_justified(|ui| {
                    ui.label("Open an image to begin.");
                });
            }
        });

        if self.show_result
            && let Some(tex) = self.result_texture.clone()
        {
            let mut open = self.show_result;
            egui::Window::new("Edited result")
                .open(&mut open)
                .resizable(true)
                .show(ctx, |ui| {
                    let size = tex.size_vec2();
                    let scale = (520.0 / size.x).min(1.0);
                    ui.image((tex.id(), size * scale));
                });
            self.show_result = open;
        }
    }
}
