//! Plain-text seating chart, one pod per 3x3 block.

use std::fmt::Write as _;

use shared::domain::{ClassPeriod, Pod};

use crate::LayoutState;

const CELL_WIDTH: usize = 10;
const RESERVED: &str = "##########";

pub fn render_layout(state: &LayoutState) -> String {
    let mut out = String::new();
    if state.periods().is_empty() {
        out.push_str("No class periods.\n");
        return out;
    }
    match state.selected_period() {
        Some(period) => out.push_str(&render_period(period)),
        None if state.is_adding_period() => out.push_str("Adding a new period.\n"),
        None => out.push_str("No period selected.\n"),
    }
    out
}

pub fn render_period(period: &ClassPeriod) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Period {}", period.number);
    for (row_index, row) in period.rows.iter().enumerate() {
        let _ = writeln!(out, "Row {}", row_index + 1);
        if row.pods.is_empty() {
            out.push_str("  (no pods)\n");
        }
        for (pod_index, pod) in row.pods.iter().enumerate() {
            let _ = writeln!(out, "  Pod {}", pod_index + 1);
            out.push_str(&render_pod(pod, "    "));
        }
    }
    if period.unassigned_students.is_empty() {
        out.push_str("Unassigned: none\n");
    } else {
        let names: Vec<&str> = period
            .unassigned_students
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        let _ = writeln!(out, "Unassigned: {}", names.join(", "));
    }
    out
}

fn render_pod(pod: &Pod, indent: &str) -> String {
    let mut out = String::new();
    for (r, line) in pod.seat_grid().iter().enumerate() {
        out.push_str(indent);
        let cells: Vec<String> = line
            .iter()
            .enumerate()
            .map(|(c, seat)| {
                let text = match seat {
                    _ if r == 1 && c == 1 => RESERVED.to_string(),
                    Some(student) => fit(&student.name),
                    None => String::new(),
                };
                format!("[{text:<CELL_WIDTH$}]")
            })
            .collect();
        out.push_str(&cells.join(" "));
        out.push('\n');
    }
    out
}

fn fit(name: &str) -> String {
    name.chars().take(CELL_WIDTH).collect()
}
