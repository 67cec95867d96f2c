//! Run reporting: the summary object, `summary.json`, and `report.md`.
//!
//! The summary is the run's externally observed artifact besides the output
//! files themselves. Its shape is versioned (`schema_version`) and stable:
//! consumers parse it from stdout (`--json`) or from
//! `out/image-processing/runs/<run-id>/summary.json`.

use crate::toolchain::ImageInfo;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;

/// One input file's outcome within the batch.
#[derive(Debug, Serialize)]
pub struct ItemResult {
    pub input_path: String,
    pub output_path: Option<String>,
    pub status: ItemStatus,
    pub input_info: ImageInfo,
    pub output_info: Option<ImageInfo>,
    pub commands: Vec<String>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl ItemResult {
    pub fn is_error(&self) -> bool {
        self.status == ItemStatus::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Ok,
    Error,
}

/// Echo of the shared options, so summary consumers see what ran.
#[derive(Debug, Serialize)]
pub struct OptionsEcho {
    pub overwrite: bool,
    /// `None` for operations the toggle does not apply to.
    pub auto_orient: Option<bool>,
    pub strip_metadata: bool,
    pub background: Option<String>,
    pub report: bool,
}

/// The whole run's outcome.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub schema_version: u32,
    pub run_id: Option<String>,
    pub cwd: String,
    pub operation: String,
    pub backend: String,
    pub report_path: Option<String>,
    pub dry_run: bool,
    pub options: OptionsEcho,
    pub commands: Vec<String>,
    pub collisions: Vec<String>,
    /// Reserved schema slot; nothing populates it today.
    pub skipped: Vec<String>,
    pub warnings: Vec<String>,
    pub items: Vec<ItemResult>,
}

impl Summary {
    pub fn any_item_errored(&self) -> bool {
        self.items.iter().any(ItemResult::is_error)
    }
}

/// A fresh run id: UTC timestamp plus a short random suffix, so concurrent
/// runs in the same second do not share a directory.
pub fn new_run_id() -> String {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let suffix: String = {
        let mut rng = rand::thread_rng();
        (0..6)
            .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
            .collect()
    };
    format!("{stamp}-{suffix}")
}

/// The repository root anchors the run directory and relativizes paths in
/// the summary. Git toplevel when available, cwd otherwise.
pub fn find_repo_root() -> PathBuf {
    let git = std::process::Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output();
    if let Ok(output) = git
        && output.status.success()
    {
        let top = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !top.is_empty() {
            return PathBuf::from(top);
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Where a run's artifacts land.
pub fn run_dir(repo_root: &Path, run_id: &str) -> PathBuf {
    repo_root
        .join("out")
        .join("image-processing")
        .join("runs")
        .join(run_id)
}

/// Repo-root-relative display form when the path is under the root,
/// absolute otherwise.
pub fn display_path(path: &Path, repo_root: &Path) -> String {
    match path.strip_prefix(repo_root) {
        Ok(relative) => relative.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

/// Render the markdown report: operation header, command list, per-item
/// results with byte-size deltas.
pub fn render_report(summary: &Summary) -> String {
    let mut lines: Vec<String> = Vec::new();

    let run_id = summary.run_id.as_deref().unwrap_or("unidentified");
    lines.push(format!("# Image Processing Report ({run_id})"));
    lines.push(String::new());
    lines.push(format!("- Operation: `{}`", summary.operation));
    lines.push(format!("- Dry run: `{}`", summary.dry_run));
    lines.push(String::new());

    lines.push("## Commands".to_string());
    for command in &summary.commands {
        lines.push(format!("- `{command}`"));
    }
    lines.push(String::new());

    lines.push("## Results".to_string());
    for item in &summary.items {
        let status = match item.status {
            ItemStatus::Ok => "ok",
            ItemStatus::Error => "error",
        };
        let output = item.output_path.as_deref().unwrap_or("-");
        lines.push(format!(
            "- `{status}`: `{}` -> `{output}`",
            item.input_path
        ));

        let in_bytes = item.input_info.size_bytes;
        let out_bytes = item.output_info.as_ref().and_then(|i| i.size_bytes);
        if let Some(bytes) = in_bytes {
            lines.push(format!("  - input_bytes: {bytes}"));
        }
        if let Some(bytes) = out_bytes {
            lines.push(format!("  - output_bytes: {bytes}"));
        }
        if let (Some(before), Some(after)) = (in_bytes, out_bytes)
            && before > 0
        {
            let delta = after as i64 - before as i64;
            let pct = delta as f64 / before as f64 * 100.0;
            lines.push(format!("  - delta_bytes: {delta} ({pct:.2}%)"));
        }
        if let Some(error) = &item.error {
            lines.push(format!("  - error: {error}"));
        }
    }
    lines.push(String::new());

    lines.join("\n") + "\n"
}

/// Write `summary.json` into the run directory.
pub fn write_summary(run_dir: &Path, summary: &Summary) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(run_dir.join("summary.json"), json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(status: ItemStatus, in_bytes: Option<u64>, out_bytes: Option<u64>) -> ItemResult {
        ItemResult {
            input_path: "photos/a.png".to_string(),
            output_path: Some("out/a.png".to_string()),
            status,
            input_info: ImageInfo {
                size_bytes: in_bytes,
                ..ImageInfo::default()
            },
            output_info: out_bytes.map(|b| ImageInfo {
                size_bytes: Some(b),
                ..ImageInfo::default()
            }),
            commands: vec!["magick photos/a.png out/a.png".to_string()],
            warnings: Vec::new(),
            error: None,
        }
    }

    fn summary(items: Vec<ItemResult>) -> Summary {
        Summary {
            schema_version: SCHEMA_VERSION,
            run_id: Some("20260805-120000-abc123".to_string()),
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
            commands: vec!["magick photos/a.png out/a.png".to_string()],
            collisions: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
            items,
        }
    }

    #[test]
    fn run_ids_are_unique_and_shaped() {
        let a = new_run_id();
        let b = new_run_id();
        assert_ne!(a, b);
        // 20260805-120000-abc123
        assert_eq!(a.len(), "20260805-120000-".len() + 6);
        assert_eq!(a.matches('-').count(), 2);
    }

    #[test]
    fn run_dir_layout() {
        let dir = run_dir(Path::new("/repo"), "20260805-120000-abc123");
        assert_eq!(
            dir,
            Path::new("/repo/out/image-processing/runs/20260805-120000-abc123")
        );
    }

    #[test]
    fn display_path_relativizes_under_root() {
        assert_eq!(
            display_path(Path::new("/repo/photos/a.png"), Path::new("/repo")),
            "photos/a.png"
        );
        assert_eq!(
            display_path(Path::new("/elsewhere/a.png"), Path::new("/repo")),
            "/elsewhere/a.png"
        );
    }

    #[test]
    fn report_includes_byte_delta() {
        let report = render_report(&summary(vec![item(ItemStatus::Ok, Some(1000), Some(600))]));
        assert!(report.contains("# Image Processing Report (20260805-120000-abc123)"));
        assert!(report.contains("- Operation: `resize`"));
        assert!(report.contains("  - input_bytes: 1000"));
        assert!(report.contains("  - output_bytes: 600"));
        assert!(report.contains("  - delta_bytes: -400 (-40.00%)"));
    }

    #[test]
    fn report_shows_errors() {
        let mut failed = item(ItemStatus::Error, Some(1000), None);
        failed.error = Some("resize failed".to_string());
        let report = render_report(&summary(vec![failed]));
        assert!(report.contains("- `error`:"));
        assert!(report.contains("  - error: resize failed"));
    }

    #[test]
    fn summary_error_aggregation() {
        assert!(!summary(vec![item(ItemStatus::Ok, None, None)]).any_item_errored());
        assert!(summary(vec![
            item(ItemStatus::Ok, None, None),
            item(ItemStatus::Error, None, None),
        ])
        .any_item_errored());
    }

    #[test]
    fn summary_serializes_with_schema_fields() {
        let json = serde_json::to_string(&summary(vec![])).unwrap();
        assert!(json.contains("\"schema_version\":1"));
        assert!(json.contains("\"backend\":\"imagemagick:magick\""));
        assert!(json.contains("\"skipped\":[]"));
        assert!(json.contains("\"auto_orient\":true"));
    }
}
