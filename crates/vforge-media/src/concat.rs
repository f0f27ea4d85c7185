//! Concat demuxer list files.

use std::path::{Path, PathBuf};

use crate::error::MediaResult;

/// Render a concat demuxer list, one `file '<abs path>'` line per entry.
pub fn render_concat_list(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|file| {
            let path = file.to_string_lossy().replace('\\', "/").replace('\'', "'\\''");
            format!("file '{}'\n", path)
        })
        .collect()
}

/// Write a concat demuxer list to `list_path`.
///
/// Paths must be absolute; the list is read with `-safe 0`.
pub async fn write_concat_list(list_path: &Path, files: &[PathBuf]) -> MediaResult<()> {
    tokio::fs::write(list_path, render_concat_list(files)).await?;
    Ok(())
}
