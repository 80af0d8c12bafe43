//! One-shot maintenance commands run from the CLI instead of the daemon loop

use anyhow::{bail, Context, Result};
use guardian_common::preferences::summarize;
use guardian_common::{GuardianConfig, PreferenceLog};
use owo_colors::OwoColorize;
use std::fmt::Write as _;
use std::path::Path;

/// Write the built-in defaults to `path`. Never overwrites an existing file.
pub fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists; not overwriting", path.display());
    }
    GuardianConfig::default()
        .save(path)
        .with_context(|| format!("writing {}", path.display()))
}

/// Human-readable tally of past confirmation answers
pub fn preference_report(config: &GuardianConfig) -> Result<String> {
    let log = PreferenceLog::new(config.learning.enabled, config.preferences_path());
    let records = log
        .read_all()
        .with_context(|| format!("reading {}", log.path().display()))?;

    let mut report = String::new();
    if records.is_empty() {
        writeln!(report, "No confirmation answers recorded in {}.", log.path().display())?;
        return Ok(report);
    }

    writeln!(report, "{}", "Confirmation history".bold())?;
    for pref in summarize(&records) {
        writeln!(
            report,
            "  {:<28} {} allowed, {} denied",
            pref.tool,
            pref.allowed.to_string().green(),
            pref.denied.to_string().red()
        )?;
    }
    Ok(report)
}
