use eframe::egui::{Color32, RichText, Ui};
use egui_extras::{Column as TableColumn, TableBuilder};

use stock_checker::data::filter::FilteredView;
use stock_checker::data::model::{format_number, Value};

// ---------------------------------------------------------------------------
// Result table (central panel)
// ---------------------------------------------------------------------------

const ROW_HEIGHT: f32 = 18.0;

/// Render the projected rows of a filtered view.
pub fn result_table(ui: &mut Ui, view: &FilteredView) {
    let columns = view.table.columns();
    if columns.is_empty() {
        return;
    }

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .auto_shrink([false, false])
        .columns(TableColumn::auto().at_least(60.0).clip(true), columns.len())
        .header(ROW_HEIGHT + 4.0, |mut header| {
            for col in columns {
                header.col(|ui| {
                    ui.strong(&col.name);
                });
            }
        })
        .body(|body| {
            body.rows(ROW_HEIGHT, view.table.row_count(), |mut row| {
                let idx = row.index();
                for col in columns {
                    row.col(|ui| {
                        cell(ui, col.value(idx));
                    });
                }
            });
        });
}

fn cell(ui: &mut Ui, value: Option<Value>) {
    match value {
        None => {
            ui.label(RichText::new("—").weak());
        }
        Some(Value::Number(v)) => {
            let text = RichText::new(format_grouped(v)).monospace();
            ui.label(if v < 0.0 { text.color(Color32::RED) } else { text });
        }
        Some(Value::Text(s)) => {
            ui.label(s);
        }
    }
}

/// Number with thousands separators in the integer part.
pub fn format_grouped(v: f64) -> String {
    let plain = format_number(v);
    let (sign, rest) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int, frac) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };
    if !int.bytes().all(|b| b.is_ascii_digit()) {
        return plain;
    }

    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    match frac {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands() {
        assert_eq!(format_grouped(0.0), "0");
        assert_eq!(format_grouped(999.0), "999");
        assert_eq!(format_grouped(1234567.0), "1,234,567");
        assert_eq!(format_grouped(-1234.5), "-1,234.5");
        assert_eq!(format_grouped(f64::NAN), "NaN");
    }
}
