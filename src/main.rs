mod app;
mod state;
mod ui;

use app::StockCheckerApp;
use eframe::egui;
use stock_checker::config::DashboardConfig;

fn main() -> eframe::Result {
    env_logger::init();

    let path = DashboardConfig::default_path();
    let config = DashboardConfig::load(&path).unwrap_or_else(|e| {
        log::error!("Ignoring config {}: {e:#}", path.display());
        DashboardConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "StockChecker",
        options,
        Box::new(|_cc| Ok(Box::new(StockCheckerApp::new(config)))),
    )
}
