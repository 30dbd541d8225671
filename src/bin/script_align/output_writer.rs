use std::fs;
use std::io::Write;
use std::path::Path;

use script_align_rs::alignment::report::Report;
use tempfile::Builder as TempFileBuilder;

/// Writes `contents` to a temporary file in the destination directory and
/// renames it into place, so a failed run never leaves a truncated file behind.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), String> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
            parent
        }
        None => Path::new("."),
    };

    let mut temp_file = TempFileBuilder::new()
        .prefix(".script-align-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|err| {
            format!(
                "Failed to create temporary file in '{}': {err}",
                parent.display()
            )
        })?;
    temp_file
        .write_all(contents)
        .and_then(|()| temp_file.as_file().sync_all())
        .map_err(|err| format!("Failed to write '{}': {err}", path.display()))?;
    temp_file
        .persist(path)
        .map_err(|err| format!("Failed to write '{}': {}", path.display(), err.error))?;
    Ok(())
}

pub fn write_report(path: &Path, report: &Report) -> Result<(), String> {
    let mut json = serde_json::to_vec_pretty(report).map_err(|err| {
        format!(
            "Failed to serialize report JSON '{}': {err}",
            path.display()
        )
    })?;
    json.push(b'\n');
    write_atomic(path, &json)
}
