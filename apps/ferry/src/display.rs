//! Output rendering for command results

use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use ferry_pipeline::RunReport;
use ferry_types::SyncMode;
use serde_json::json;

/// Checkpoint progress of one mode
pub struct ModeStatus {
    pub mode: SyncMode,
    pub completed: usize,
    pub locked: bool,
}

/// Renders results as tables or JSON
pub struct OutputRenderer {
    json: bool,
}

impl OutputRenderer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn render_report(&self, report: &RunReport) -> Result<(), serde_json::Error> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }

        let mut table = Self::table();
        table.set_header(vec![format!("{} run", report.mode), String::new()]);
        let rows: [(&str, String); 12] = [
            ("records seen", report.seen.to_string()),
            ("yanked", report.yanked.to_string()),
            ("already done", report.already_done.to_string()),
            ("duplicates", report.duplicates.to_string()),
            ("missing archives", report.missing.to_string()),
            ("parse errors", report.parse_errors.to_string()),
            ("enqueued", report.enqueued.to_string()),
            ("succeeded", report.succeeded.to_string()),
            ("failed", report.failed.to_string()),
            ("peak queue", report.peak_queue.to_string()),
            ("cancelled", report.cancelled.to_string()),
            ("elapsed", format!("{:.1}s", report.elapsed.as_secs_f64())),
        ];
        for (label, value) in rows {
            table.add_row(vec![
                Cell::new(label),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
        Ok(())
    }

    pub fn render_status(&self, statuses: &[ModeStatus]) {
        if self.json {
            let modes: Vec<_> = statuses
                .iter()
                .map(|s| json!({ "mode": s.mode, "completed": s.completed, "locked": s.locked }))
                .collect();
            println!("{}", json!({ "modes": modes }));
            return;
        }

        let mut table = Self::table();
        table.set_header(vec!["mode", "completed", "running"]);
        for status in statuses {
            table.add_row(vec![
                Cell::new(status.mode),
                Cell::new(status.completed).set_alignment(CellAlignment::Right),
                Cell::new(if status.locked { "yes" } else { "no" }),
            ]);
        }
        println!("{table}");
    }

    pub fn render_shard_paths(&self, paths: &[(String, String)]) {
        if self.json {
            let map: serde_json::Map<_, _> = paths
                .iter()
                .map(|(name, path)| (name.clone(), json!(path)))
                .collect();
            println!("{}", serde_json::Value::Object(map));
            return;
        }
        for (_, path) in paths {
            println!("{path}");
        }
    }

    fn table() -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }
}
