//! Human-readable stdout formatting.
//!
//! Each shape has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects. Machine consumers use
//! `--json` instead; diagnostics never print here.

use crate::report::{ItemStatus, Summary};

/// The short per-item status list shown after a run.
pub fn format_summary(summary: &Summary) -> Vec<String> {
    let mut lines = vec![format!("operation: {}", summary.operation)];

    if let Some(run_id) = &summary.run_id {
        lines.push(format!("run: {run_id}"));
    }

    for item in &summary.items {
        let status = match item.status {
            ItemStatus::Ok => "ok",
            ItemStatus::Error => "error",
        };
        let line = match &item.output_path {
            Some(output) => format!("- {status}: {} -> {output}", item.input_path),
            None => format!("- {status}: {}", item.input_path),
        };
        lines.push(line);
        if let Some(error) = &item.error {
            lines.push(format!("  error: {error}"));
        }
    }

    lines
}

pub fn print_summary(summary: &Summary) {
    for line in format_summary(summary) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ItemResult, OptionsEcho, SCHEMA_VERSION};
    use crate::toolchain::ImageInfo;

    fn summary_with(items: Vec<ItemResult>) -> Summary {
        Summary {
            schema_version: SCHEMA_VERSION,
            run_id: None,
            cwd: "/work".to_string(),
            operation: "resize".to_string(),
            backend: "imagemagick:magick".to_string(),
            report_path: None,
            dry_run: false,
            options: OptionsEcho {
                overwrite: false,
                auto_orient: Some(true),
                strip_metadata: false,
                background: None,
                report: false,
            },
            commands: Vec::new(),
            collisions: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
            items,
        }
    }

    fn item(status: ItemStatus, output: Option<&str>, error: Option<&str>) -> ItemResult {
        ItemResult {
            input_path: "photos/a.png".to_string(),
            output_path: output.map(str::to_string),
            status,
            input_info: ImageInfo::default(),
            output_info: None,
            commands: Vec::new(),
            warnings: Vec::new(),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn lists_items_with_arrows() {
        let lines = summary_with(vec![item(ItemStatus::Ok, Some("out/a.png"), None)]);
        let lines = format_summary(&lines);
        assert_eq!(lines[0], "operation: resize");
        assert_eq!(lines[1], "- ok: photos/a.png -> out/a.png");
    }

    #[test]
    fn info_items_have_no_arrow() {
        let lines = format_summary(&summary_with(vec![item(ItemStatus::Ok, None, None)]));
        assert_eq!(lines[1], "- ok: photos/a.png");
    }

    #[test]
    fn errors_get_a_detail_line() {
        let lines = format_summary(&summary_with(vec![item(
            ItemStatus::Error,
            Some("out/a.png"),
            Some("resize failed"),
        )]));
        assert_eq!(lines[1], "- error: photos/a.png -> out/a.png");
        assert_eq!(lines[2], "  error: resize failed");
    }

    #[test]
    fn run_id_is_shown_when_present() {
        let mut summary = summary_with(vec![]);
        summary.run_id = Some("20260805-120000-abc123".to_string());
        let lines = format_summary(&summary);
        assert_eq!(lines[1], "run: 20260805-120000-abc123");
    }
}
