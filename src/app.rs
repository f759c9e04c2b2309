use eframe::egui;

use stock_checker::config::DashboardConfig;

use crate::state::AppState;
use crate::ui::panels::{self, PanelAction};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct StockCheckerApp {
    pub state: AppState,
}

impl StockCheckerApp {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }
}

impl eframe::App for StockCheckerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Blocking fetch of the visible dataset; a no-op once attempted.
        let active = self.state.active;
        self.state.ensure_loaded(active);

        // ---- Top panel: title and dataset tabs ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        let Some(panel) = self.state.panels.get_mut(self.state.active) else {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.label("No datasets configured.");
            });
            return;
        };

        // ---- Left side panel: columns and filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, panel);
            });

        // ---- Central panel: result table ----
        let action = egui::CentralPanel::default()
            .show(ctx, |ui| panels::dataset_view(ui, panel))
            .inner;

        if let Some(PanelAction::Reload) = action {
            let idx = self.state.active;
            self.state.reload(idx);
        }
    }
}
