use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

const UPLOAD_EXTENSIONS: [&str; 2] = ["csv", "txt"];

/// Collect upload candidates under `uploads_dir`, skipping anything inside
/// the excluded (results/archive) directories. Sorted for a deterministic
/// processing order.
pub fn find_upload_files(uploads_dir: &Path, exclude: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in WalkDir::new(uploads_dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "uploads walk error");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !has_upload_extension(path) {
            continue;
        }
        if exclude.iter().any(|dir| path.starts_with(dir)) {
            continue;
        }
        found.push(path.to_path_buf());
    }
    found.sort();
    found
}

fn has_upload_extension(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| {
        UPLOAD_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

/// Move a consumed upload into the archive, appending `_1`, `_2`, ... before
/// the extension when the name is already taken.
pub fn archive_upload(path: &Path, archive_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(archive_dir)
        .with_context(|| format!("create archive dir {}", archive_dir.display()))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("upload path has no file name: {}", path.display()))?;

    let mut dest = archive_dir.join(file_name);
    let mut counter = 1;
    while dest.exists() {
        dest = archive_dir.join(numbered_name(path, counter));
        counter += 1;
    }

    move_file(path, &dest).with_context(|| format!("move {} to archive", path.display()))?;
    info!(from = %path.display(), to = %dest.display(), "upload archived");
    Ok(dest)
}

fn numbered_name(path: &Path, counter: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("upload");
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => PathBuf::from(format!("{stem}_{counter}.{ext}")),
        None => PathBuf::from(format!("{stem}_{counter}")),
    }
}

/// Rename when possible, copy-and-remove across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn find_skips_excluded_dirs_and_foreign_extensions() {
        let temp = TempDir::new().expect("temp dir");
        let uploads = temp.path().join("uploads");
        let archive = uploads.join("archive");
        fs::create_dir_all(&archive).expect("dirs");
        fs::write(uploads.join("a.csv"), "x").expect("write");
        fs::write(uploads.join("b.TXT"), "x").expect("write");
        fs::write(uploads.join("c.log"), "x").expect("write");
        fs::write(archive.join("old.csv"), "x").expect("write");

        let found = find_upload_files(&uploads, &[archive.clone()]);
        assert_eq!(found, vec![uploads.join("a.csv"), uploads.join("b.TXT")]);
    }

    #[test]
    fn archive_appends_suffix_on_collision() {
        let temp = TempDir::new().expect("temp dir");
        let archive = temp.path().join("archive");
        let first = temp.path().join("calls.csv");
        let second = temp.path().join("more").join("calls.csv");
        fs::create_dir_all(second.parent().expect("parent")).expect("dirs");
        fs::write(&first, "1").expect("write");
        fs::write(&second, "2").expect("write");

        let dest_first = archive_upload(&first, &archive).expect("archive first");
        let dest_second = archive_upload(&second, &archive).expect("archive second");
        assert_eq!(dest_first, archive.join("calls.csv"));
        assert_eq!(dest_second, archive.join("calls_1.csv"));
        assert!(!first.exists());
        assert!(!second.exists());
    }
}
