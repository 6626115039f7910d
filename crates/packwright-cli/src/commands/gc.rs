use super::{json_pretty, open_session, CommandError, EXIT_SUCCESS};
use std::path::Path;

/// Remove every layer under `layers` except those named in `keep`.
pub fn run(layers: &Path, keep: &[String], dry_run: bool, json: bool) -> Result<u8, CommandError> {
    let session = open_session(layers, None, None)?;
    for name in keep {
        session.layer(name)?;
    }

    let report = session.finish_with(dry_run)?;
    if json {
        let payload = serde_json::json!({
            "dry_run": dry_run,
            "untouched": report.untouched,
            "removed": report.removed,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        let prefix = if dry_run { "would remove" } else { "removed" };
        let count = if dry_run {
            report.untouched.len()
        } else {
            report.removed
        };
        println!("gc: {prefix} {count} layer(s)");
        for name in &report.untouched {
            println!("  {name}");
        }
    }
    Ok(EXIT_SUCCESS)
}
