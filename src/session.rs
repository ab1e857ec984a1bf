use crate::canvas::{BrushConfig, MaskBuffer};

// ============================================================================
// DRAWING SESSION — pointer events → stroke rasterization
// ============================================================================

/// Whether a stroke is in progress. `Drawing` carries the last committed
/// buffer-space point so the next pointer-move can be joined to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StrokeState {
    Idle,
    Drawing { last: (f32, f32) },
}

/// Drives the mask buffer from discrete pointer events. Points arrive
/// pre-mapped to buffer space; `None` is the "outside" sentinel from the
/// letterbox mapping (pointer over a margin or off the image).
///
/// Leaving the image ends the stroke rather than pausing it: re-entry starts
/// a fresh disc instead of interpolating a long segment from the last
/// interior point across unpainted ground.
///
/// Every event is a no-op while the buffer is uninitialized (image still
/// decoding, or no image loaded).
pub struct DrawingSession {
    state: StrokeState,
}

impl Default for DrawingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingSession {
    pub fn new() -> Self {
        Self {
            state: StrokeState::Idle,
        }
    }

    pub fn state(&self) -> StrokeState {
        self.state
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, StrokeState::Drawing { .. })
    }

    /// Primary button pressed. A stroke only starts on a valid interior
    /// point; pressing over a letterbox margin does nothing.
    pub fn pointer_down(
        &mut self,
        point: Option<(f32, f32)>,
        mask: &mut MaskBuffer,
        brush: &BrushConfig,
    ) {
        let Some((x, y)) = point else { return };
        if mask.paint_disc(x, y, brush.radius()).is_ok() {
            self.state = StrokeState::Drawing { last: (x, y) };
        }
    }

    /// Pointer moved. While drawing, a valid point extends the stroke with an
    /// interpolated segment from the last point; an outside point ends the
    /// stroke without painting anything. Moves while idle are ignored.
    pub fn pointer_move(
        &mut self,
        point: Option<(f32, f32)>,
        mask: &mut MaskBuffer,
        brush: &BrushConfig,
    ) {
        let StrokeState::Drawing { last } = self.state else {
            return;
        };
        match point {
            Some((x, y)) => {
                if mask.paint_segment(last, (x, y), brush.radius()).is_ok() {
                    self.state = StrokeState::Drawing { last: (x, y) };
                } else {
                    self.state = StrokeState::Idle;
                }
            }
            None => self.state = StrokeState::Idle,
        }
    }

    /// Primary button released: stroke ends, nothing painted.
    pub fn pointer_up(&mut self) {
        self.state = StrokeState::Idle;
    }

    /// Pointer left the display area entirely. Same as release.
    pub fn pointer_leave(&mut self) {
        self.state = StrokeState::Idle;
    }

    /// Clear the mask and abandon any in-progress stroke. Valid in any state.
    pub fn reset(&mut self, mask: &mut MaskBuffer) {
        mask.reset();
        self.state = StrokeState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{SELECTED, UNSELECTED};

    fn initialized_buffer() -> MaskBuffer {
        let mut buffer = MaskBuffer::new();
        buffer.initialize(100, 80);
        buffer
    }

    #[test]
    fn down_on_valid_point_starts_stroke_and_paints() {
        let mut mask = initialized_buffer();
        let mut session = DrawingSession::new();
        let brush = BrushConfig::default();

        session.pointer_down(Some((50.0, 40.0)), &mut mask, &brush);
        assert!(session.is_drawing());
        assert_eq!(session.state(), StrokeState::Drawing { last: (50.0, 40.0) });
        assert_eq!(mask.image().unwrap().get_pixel(50, 40)[0], SELECTED);
    }

    #[test]
    fn down_outside_never_starts_stroke() {
        let mut mask = initialized_buffer();
        let mut session = DrawingSession::new();
        let brush = BrushConfig::default();

        session.pointer_down(None, &mut mask, &brush);
        assert!(!session.is_drawing());
        assert_eq!(mask.selected_count(), 0);
    }

    #[test]
    fn down_before_image_load_is_ignored() {
        let mut mask = MaskBuffer::new();
        let mut session = DrawingSession::new();
        let brush = BrushConfig::default();

        session.pointer_down(Some((10.0, 10.0)), &mut mask, &brush);
        assert!(!session.is_drawing());
        assert!(!mask.is_initialized());
    }

    #[test]
    fn move_extends_stroke_with_segment() {
        let mut mask = initialized_buffer();
        let mut session = DrawingSession::new();
        let brush = BrushConfig::default();

        session.pointer_down(Some((10.0, 40.0)), &mut mask, &brush);
        session.pointer_move(Some((60.0, 40.0)), &mut mask, &brush);
        assert_eq!(session.state(), StrokeState::Drawing { last: (60.0, 40.0) });
        // Midpoint of the segment is covered
        assert_eq!(mask.image().unwrap().get_pixel(35, 40)[0], SELECTED);
    }

    #[test]
    fn move_outside_ends_stroke_without_painting() {
        let mut mask = initialized_buffer();
        let mut session = DrawingSession::new();
        let brush = BrushConfig::default();

        session.pointer_down(Some((10.0, 10.0)), &mut mask, &brush);
        let before = mask.selected_count();

        session.pointer_move(None, &mut mask, &brush);
        assert!(!session.is_drawing());
        assert_eq!(mask.selected_count(), before);

        // Re-entry is a fresh stroke: the gap between the two discs stays
        // unpainted, no segment bridges them.
        session.pointer_down(Some((80.0, 70.0)), &mut mask, &brush);
        assert_eq!(mask.image().unwrap().get_pixel(45, 40)[0], UNSELECTED);
    }

    #[test]
    fn move_while_idle_paints_nothing() {
        let mut mask = initialized_buffer();
        let mut session = DrawingSession::new();
        let brush = BrushConfig::default();

        session.pointer_move(Some((50.0, 40.0)), &mut mask, &brush);
        assert_eq!(mask.selected_count(), 0);
        assert!(!session.is_drawing());
    }

    #[test]
    fn up_and_leave_end_stroke() {
        let mut mask = initialized_buffer();
        let mut session = DrawingSession::new();
        let brush = BrushConfig::default();

        session.pointer_down(Some((50.0, 40.0)), &mut mask, &brush);
        session.pointer_up();
        assert_eq!(session.state(), StrokeState::Idle);

        session.pointer_down(Some((50.0, 40.0)), &mut mask, &brush);
        session.pointer_leave();
        assert_eq!(session.state(), StrokeState::Idle);
    }

    #[test]
    fn reset_clears_buffer_and_stroke_in_any_state() {
        let mut mask = initialized_buffer();
        let mut session = DrawingSession::new();
        let brush = BrushConfig::default();

        session.pointer_down(Some((50.0, 40.0)), &mut mask, &brush);
        assert!(session.is_drawing());

        session.reset(&mut mask);
        assert!(!session.is_drawing());
        assert_eq!(mask.selected_count(), 0);

        // Also fine while idle, and idempotent
        session.reset(&mut mask);
        assert_eq!(mask.selected_count(), 0);
        assert_eq!(mask.dimensions(), Some((100, 80)));
    }

    #[test]
    fn scripted_event_sequence_drives_buffer() {
        // The state machine is drivable without any rendering surface.
        let mut mask = initialized_buffer();
        let mut session = DrawingSession::new();
        let brush = BrushConfig { diameter: 10.0 };

        let script: &[(&str, Option<(f32, f32)>)] = &[
            ("down", Some((20.0, 20.0))),
            ("move", Some((40.0, 20.0))),
            ("move", Some((40.0, 40.0))),
            ("up", None),
            ("down", Some((70.0, 60.0))),
            ("move", None), // wandered off the image
            ("move", Some((75.0, 65.0))), // ignored: stroke already ended
        ];
        for (event, point) in script {
            match *event {
                "down" => session.pointer_down(*point, &mut mask, &brush),
                "move" => session.pointer_move(*point, &mut mask, &brush),
                "up" => session.pointer_up(),
                _ => unreachable!(),
            }
        }

        let image = mask.image().unwrap();
        assert_eq!(image.get_pixel(30, 20)[0], SELECTED);
        assert_eq!(image.get_pixel(40, 30)[0], SELECTED);
        assert_eq!(image.get_pixel(70, 60)[0], SELECTED);
        // The post-exit move must not have painted
        assert_eq!(image.get_pixel(75, 65)[0], UNSELECTED);
        assert!(!session.is_drawing());
    }
}
