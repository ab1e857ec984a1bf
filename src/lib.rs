//! MaskPaint — paint a freehand region over a photo and submit it, with a
//! text instruction, to an AI image-editing service.
//!
//! The interesting machinery lives in [`canvas`] (letterbox geometry, the
//! two-tone mask buffer, stroke rasterization, export) and [`session`] (the
//! pointer-event state machine). [`app`] is the egui front end, [`cli`] the
//! headless stroke-replay mode, and [`ops`] holds the seams to the remote
//! collaborators.

pub mod app;
pub mod canvas;
pub mod cli;
pub mod io;
pub mod logger;
pub mod ops;
pub mod session;
