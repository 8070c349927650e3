use eframe::egui;
use thresholdfe::app::ThresholdFEApp;
use thresholdfe::{cli, i18n, logger};

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        i18n::init();
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------
    logger::init();
    i18n::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 720.0])
            .with_title("ThresholdFE"),
        ..Default::default()
    };

    eframe::run_native(
        "ThresholdFE",
        options,
        Box::new(|cc| Box::new(ThresholdFEApp::new(cc))),
    )
}
