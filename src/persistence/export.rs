// export.rs - CSV/JSON export of report tables

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Write `rows` as CSV with a header line taken from the field names
pub fn write_csv<T: Serialize, P: AsRef<Path>>(path: P, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write CSV row to {}", path.display()))?;
    }
    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

/// Write `value` as pretty-printed JSON
pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let file = File::create(path)
        .with_context(|| format!("Failed to create JSON file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
    Ok(())
}
