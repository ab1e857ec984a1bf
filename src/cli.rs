// ============================================================================
// MaskPaint CLI — headless mask generation via stroke replay
// ============================================================================
//
// Usage examples:
//   maskpaint --input photo.jpg --strokes roof.strokes --output mask.png
//   maskpaint -i photo.png -o blank.png                 (no strokes → blank mask)
//   maskpaint -i photo.png -s sel.strokes -o mask.png --brush 32 --verbose
//
// Stroke scripts drive the same session state machine and rasterizer as the
// GUI, one event per line, coordinates in buffer space:
//   down X Y     press at (X, Y)
//   move X Y     drag to (X, Y)
//   up           release
//   clear        reset the mask to all-black
// Blank lines and lines starting with '#' are ignored. Points outside the
// buffer count as "outside" and end the stroke, exactly as leaving the image
// does in the GUI.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{BrushConfig, MaskBuffer};
use crate::io;
use crate::session::DrawingSession;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MaskPaint headless mask generator.
///
/// Replay a stroke script over an image and write the resulting two-tone
/// mask PNG — no GUI required.
#[derive(Parser, Debug)]
#[command(
    name = "maskpaint",
    about = "MaskPaint headless mask generator",
    long_about = "Replay a scripted stroke sequence against an image's mask buffer and\n\
                  write the resulting opaque two-tone mask as PNG, without opening the\n\
                  GUI. The buffer is sized exactly as the GUI would size it (fit within\n\
                  800×600, aspect preserved, never upscaled).\n\n\
                  Example:\n  \
                  maskpaint --input photo.jpg --strokes roof.strokes --output mask.png"
)]
pub struct CliArgs {
    /// Input image file (PNG, JPEG, WEBP, BMP). Determines the mask buffer
    /// dimensions; its pixels are not otherwise used.
    #[arg(short, long, value_name = "IMAGE")]
    pub input: PathBuf,

    /// Stroke script file. If omitted, a blank (all-black) mask is written.
    #[arg(short, long, value_name = "SCRIPT")]
    pub strokes: Option<PathBuf>,

    /// Output mask PNG path.
    #[arg(short, long, value_name = "MASK.png")]
    pub output: PathBuf,

    /// Brush diameter in buffer pixels (5–50).
    #[arg(short, long, default_value_t = 20.0, value_name = "5-50")]
    pub brush: f32,

    /// Print buffer dimensions, selected-pixel count and timing.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process
    /// arguments. Used by `main()` to route before creating a window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run headless processing and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();

    let image = match io::load_image(&args.input) {
        Ok(img) => img,
        Err(e) => {
            eprintln!("error: '{}': {}", args.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut mask = MaskBuffer::new();
    let (bw, bh) = mask.initialize(image.width(), image.height());
    if args.verbose {
        println!(
            "{}: {}×{} → buffer {}×{}",
            args.input.display(),
            image.width(),
            image.height(),
            bw,
            bh
        );
    }

    if let Some(script_path) = &args.strokes {
        let source = match std::fs::read_to_string(script_path) {
            Ok(src) => src,
            Err(e) => {
                eprintln!("error: could not read script '{}': {}", script_path.display(), e);
                return ExitCode::FAILURE;
            }
        };
        let brush = BrushConfig { diameter: args.brush };
        match replay_script(&source, &mut mask, &brush) {
            Ok(events) => {
                if args.verbose {
                    println!("replayed {} events", events);
                }
            }
            Err(e) => {
                eprintln!("error: '{}': {}", script_path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    let bytes = match io::export_mask_png(&mask) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = io::write_bytes(&args.output, &bytes) {
        eprintln!("error: '{}': {}", args.output.display(), e);
        return ExitCode::FAILURE;
    }

    if args.verbose {
        println!(
            "wrote {} ({} selected pixels) in {:.1?}",
            args.output.display(),
            mask.selected_count(),
            start.elapsed()
        );
    }
    ExitCode::SUCCESS
}

// ============================================================================
// Stroke script replay
// ============================================================================

#[derive(Debug, PartialEq)]
pub enum ScriptError {
    /// Line number and offending content.
    BadLine(usize, String),
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::BadLine(n, line) => {
                write!(f, "line {}: unrecognized stroke event '{}'", n, line)
            }
        }
    }
}

impl std::error::Error for ScriptError {}

/// Feed a stroke script through a fresh drawing session against `mask`.
/// Returns the number of events applied.
pub fn replay_script(
    source: &str,
    mask: &mut MaskBuffer,
    brush: &BrushConfig,
) -> Result<usize, ScriptError> {
    let mut session = DrawingSession::new();
    let mut applied = 0usize;

    for (idx, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let lineno = idx + 1;
        let mut parts = line.split_whitespace();
        let bad = || ScriptError::BadLine(lineno, raw.to_string());

        match parts.next() {
            Some("down") => {
                let point = parse_point(&mut parts, mask).ok_or_else(bad)?;
                session.pointer_down(point, mask, brush);
            }
            Some("move") => {
                let point = parse_point(&mut parts, mask).ok_or_else(bad)?;
                session.pointer_move(point, mask, brush);
            }
            Some("up") => session.pointer_up(),
            Some("clear") => session.reset(mask),
            _ => return Err(bad()),
        }
        if parts.next().is_some() {
            return Err(bad());
        }
        applied += 1;
    }
    Ok(applied)
}

/// Parse "X Y" from the remaining tokens. Outer `None` = parse failure;
/// inner `None` = a well-formed point that lies outside the buffer (the
/// headless equivalent of the letterbox "outside" sentinel).
#[allow(clippy::option_option)]
fn parse_point(
    parts: &mut std::str::SplitWhitespace<'_>,
    mask: &MaskBuffer,
) -> Option<Option<(f32, f32)>> {
    let x: f32 = parts.next()?.parse().ok()?;
    let y: f32 = parts.next()?.parse().ok()?;
    let (w, h) = mask.dimensions()?;
    if x < 0.0 || y < 0.0 || x > w as f32 || y > h as f32 {
        return Some(None);
    }
    Some(Some((x, y)))
}
