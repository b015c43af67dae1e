//! ASCII statistics table shown on demand.

use crate::core::{CapacityState, JobClass, StatsSnapshot};

const HEADER: [&str; 6] = ["Process Type", "Last Run", "Total", "Successful", "Failed", "Threads"];

/// Render per-class statistics and thread usage as an ASCII table.
#[must_use]
pub fn render_stats_table(stats: &StatsSnapshot, capacity: &CapacityState) -> String {
    let rows: Vec<[String; 6]> = JobClass::ALL
        .iter()
        .map(|&class| {
            let s = stats.get(class);
            let slot = capacity.slot(class);
            [
                class.to_string(),
                s.last_run.format("%H:%M:%S").to_string(),
                s.total.to_string(),
                s.successful.to_string(),
                s.failed.to_string(),
                format!("{}/{}", slot.used, slot.max),
            ]
        })
        .collect();

    let mut widths = HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let separator = {
        let mut line = String::from("+");
        for width in widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line
    };
    let format_row = |cells: &[String]| {
        let mut line = String::from("|");
        for (cell, width) in cells.iter().zip(widths) {
            line.push_str(&format!(" {cell:<width$} |"));
        }
        line
    };

    let mut out = Vec::with_capacity(rows.len() + 4);
    out.push(separator.clone());
    out.push(format_row(&HEADER.map(str::to_uppercase)));
    out.push(separator.clone());
    for row in &rows {
        out.push(format_row(row));
    }
    out.push(format!(
        "{separator}\n  capacity: {} used of {} total",
        capacity.used(),
        capacity.total()
    ));
    out.join("\n")
}
