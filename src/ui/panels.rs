use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use stock_checker::data::fetch::FetchErrorKind;
use stock_checker::data::filter::FilterSpec;
use stock_checker::data::model::ColumnKind;

use crate::state::{AppState, PanelState};
use crate::ui::table;

/// Requests a panel makes of the app that it cannot fulfil itself.
pub enum PanelAction {
    Reload,
}

// ---------------------------------------------------------------------------
// Left side panel – column and filter selection
// ---------------------------------------------------------------------------

/// Render column choices, filter choices and filter widgets for one panel.
pub fn side_panel(ui: &mut Ui, panel: &mut PanelState) {
    ui.heading("Filters");
    ui.separator();

    // Hold our own Arc so we can mutate the panel inside the loop.
    let Some(Ok(fetched)) = panel.loaded.clone() else {
        ui.label("No dataset loaded.");
        return;
    };
    let table = &fetched.table;
    let columns = table.column_names();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- 1. display columns ----
            let header = format!(
                "1. Columns  ({}/{})",
                panel.selected_columns.len(),
                columns.len()
            );
            egui::CollapsingHeader::new(RichText::new(header).strong())
                .id_salt("display_columns")
                .default_open(false)
                .show(ui, |ui: &mut Ui| {
                    for col in &columns {
                        let mut checked = panel.selected_columns.contains(col);
                        if ui.checkbox(&mut checked, col).changed() {
                            panel.toggle_column(col);
                        }
                    }
                });

            // ---- 2. filtered columns ----
            egui::CollapsingHeader::new(RichText::new("2. Filter by").strong())
                .id_salt("filter_columns")
                .default_open(false)
                .show(ui, |ui: &mut Ui| {
                    for desc in table.descriptors() {
                        let hint = match desc.kind {
                            ColumnKind::Numeric => "range",
                            ColumnKind::Text => "keyword",
                        };
                        let mut checked = panel.filter_columns.contains(&desc.name);
                        let label = format!("{}  ({hint})", desc.name);
                        if ui.checkbox(&mut checked, label).changed() {
                            panel.toggle_filter_column(&desc.name);
                        }
                    }
                });

            if let Some(exclude) = panel.dataset.exclude.clone() {
                let mut show = panel.show_excluded;
                if ui.checkbox(&mut show, &exclude.label).changed() {
                    panel.set_show_excluded(show);
                }
            }
            ui.separator();

            // ---- per-column widgets ----
            for col in panel.filter_columns.clone() {
                let Some(column) = table.column(&col) else {
                    continue;
                };
                let Some(current) = panel.filters.get(&col).cloned() else {
                    continue;
                };

                egui::CollapsingHeader::new(RichText::new(&col).strong())
                    .id_salt(("filter", &col))
                    .default_open(true)
                    .show(ui, |ui: &mut Ui| {
                        let edited = match (column.kind(), current) {
                            (ColumnKind::Numeric, FilterSpec::Range { low, high }) => {
                                let (min, max) = column.numeric_range().unwrap_or((low, high));
                                range_widget(ui, min, max, low, high)
                            }
                            (_, FilterSpec::Keyword(keyword)) => keyword_widget(ui, keyword),
                            _ => None,
                        };
                        if let Some(spec) = edited {
                            panel.set_filter(&col, spec);
                        }
                    });
            }
        });
}

fn range_widget(ui: &mut Ui, min: f64, max: f64, low: f64, high: f64) -> Option<FilterSpec> {
    let (mut lo, mut hi) = (low, high);
    let mut changed = false;
    changed |= ui
        .add(egui::Slider::new(&mut lo, min..=max).text("min"))
        .changed();
    changed |= ui
        .add(egui::Slider::new(&mut hi, min..=max).text("max"))
        .changed();
    changed.then_some(FilterSpec::Range { low: lo, high: hi })
}

fn keyword_widget(ui: &mut Ui, keyword: String) -> Option<FilterSpec> {
    let mut text = keyword;
    let response = ui.add(egui::TextEdit::singleline(&mut text).hint_text("keyword"));
    response.changed().then(|| FilterSpec::Keyword(text))
}

// ---------------------------------------------------------------------------
// Central panel – freshness, counts and result table
// ---------------------------------------------------------------------------

pub fn dataset_view(ui: &mut Ui, panel: &PanelState) -> Option<PanelAction> {
    let mut action = None;

    ui.horizontal(|ui: &mut Ui| {
        ui.heading(&panel.dataset.title);
        if ui.small_button("Reload").clicked() {
            action = Some(PanelAction::Reload);
        }
    });

    match &panel.loaded {
        None => {
            ui.spinner();
        }
        Some(Err(e)) => {
            let what = match e.kind() {
                FetchErrorKind::Retrieval => "Could not download the data.",
                FetchErrorKind::Parse => "Could not read the downloaded data.",
            };
            ui.label(RichText::new(what).color(Color32::RED));
            ui.label(format!("Details: {e}"));
        }
        Some(Ok(fetched)) => {
            ui.label(RichText::new(format!("Last updated: {}", fetched.freshness)).weak());
            ui.separator();

            if panel.selected_columns.is_empty() {
                ui.label("Select at least one column to display.");
            } else if let Some(view) = &panel.view {
                ui.label(format!("Matches: {} / {} rows", view.matched, view.total));
                ui.push_id(&panel.dataset.key, |ui: &mut Ui| {
                    table::result_table(ui, view);
                });
            }
        }
    }

    action
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the title and one tab per dataset.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.strong("StockChecker");
        ui.separator();

        for (idx, panel) in state.panels.iter().enumerate() {
            let mut label = RichText::new(&panel.dataset.title);
            if matches!(panel.loaded, Some(Err(_))) {
                label = label.color(Color32::RED);
            }
            if ui.selectable_label(state.active == idx, label).clicked() {
                state.active = idx;
            }
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}
