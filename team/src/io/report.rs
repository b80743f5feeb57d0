//! JSON run reports written by `team run --report`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::looping::PlanOutcome;

/// Atomically write the plan outcome as pretty JSON (temp file + rename).
pub fn write_report(path: &Path, outcome: &PlanOutcome) -> Result<()> {
    debug!(path = %path.display(), plan = %outcome.plan, "writing run report");
    let mut buf = serde_json::to_string_pretty(outcome).context("serialize run report")?;
    buf.push('\n');
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create report dir {}", parent.display()))?;
        }
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
