//! Output of API responses and run summaries.
//!
//! Results are either logged as pretty JSON or written to a file.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Logs `value` as pretty-printed JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `value` as pretty-printed JSON to `path`, replacing any existing
/// file. Missing parent directories are created.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), "JSON written");
    Ok(())
}

/// Writes to `path` when given, logs otherwise.
pub fn emit<T: Serialize + ?Sized>(path: Option<&Path>, value: &T) -> Result<()> {
    match path {
        Some(path) => {
            write_json(path, value)?;
            info!(path = %path.display(), "Result saved");
            Ok(())
        }
        None => print_json(value),
    }
}
