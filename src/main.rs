use std::process::ExitCode;

use maskpaint::{app::MaskPaintApp, cli, log_err, logger};

fn main() -> ExitCode {
    // -- CLI / headless mode -------------------------------------------------
    // Routed before any window is created, mirroring the GUI-vs-batch split.
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        return cli::run(args);
    }

    // -- GUI mode ------------------------------------------------------------

    // Session log (overwrites the previous session's file)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_title("MaskPaint"),
        ..Default::default()
    };

    match eframe::run_native(
        "MaskPaint",
        options,
        Box::new(|cc| Box::new(MaskPaintApp::new(cc))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("eframe failed to start: {}", e);
            eprintln!("error: could not start GUI: {}", e);
            ExitCode::FAILURE
        }
    }
}
