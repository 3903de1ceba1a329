pub mod changes;
pub mod channel_versions;
pub mod history;
pub mod install;
pub mod revert;
pub mod update;
pub mod verify;

use indicatif::{ProgressBar, ProgressStyle};
use quarry_core::CoreError;
use quarry_resolve::ResolveError;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;
pub const EXIT_RESOLUTION_ERROR: u8 = 4;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Render a core error so that its prefix selects the exit code in `main`.
pub fn describe(e: &CoreError) -> String {
    match e {
        CoreError::Resolve(inner @ ResolveError::Config(_)) => inner.to_string(),
        other => other.to_string(),
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(style("{spinner:.cyan} {msg}").tick_strings(&[
        "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
    ]));
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(style("{msg}"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(style("{msg}"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Run `op` under a spinner unless the output is JSON.
pub fn with_spinner<T>(
    json: bool,
    working: &str,
    done: &str,
    failed: &str,
    op: impl FnOnce() -> Result<T, CoreError>,
) -> Result<T, String> {
    let pb = if json { None } else { Some(spinner(working)) };
    match op() {
        Ok(v) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, done);
            }
            Ok(v)
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, failed);
            }
            Err(describe(&e))
        }
    }
}

pub fn colorize_kind(kind: &str) -> String {
    use console::Style;
    match kind {
        "INSTALL" => Style::new().green().apply_to(kind).to_string(),
        "UPDATE" => Style::new().cyan().apply_to(kind).to_string(),
        "ROLLBACK" => Style::new().yellow().apply_to(kind).to_string(),
        other => other.to_owned(),
    }
}

pub fn format_timestamp(epoch_seconds: i64) -> String {
    chrono::DateTime::from_timestamp(epoch_seconds, 0).map_or_else(
        || epoch_seconds.to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn downgrade_marker(downgrade: bool) -> String {
    if downgrade {
        console::Style::new()
            .red()
            .bold()
            .apply_to(" (downgrade)")
            .to_string()
    } else {
        String::new()
    }
}
