//! Small filesystem helpers shared by the file-backed stores.

use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::errors::{ConsoleError, ConsoleResult};

/// Read a UTF-8 file, returning `None` when it does not exist.
pub(crate) async fn read_text(path: &Path) -> ConsoleResult<Option<String>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ConsoleError::FileRead {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        }
    };
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| ConsoleError::Malformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Replace `path` with `content` so readers see either the old or the new file.
///
/// Content goes to a uniquely named sibling first and is renamed over the
/// target; concurrent writers each win or lose as a whole.
pub(crate) async fn write_atomic(path: &Path, content: &str) -> ConsoleResult<()> {
    let write_err = |reason: String| ConsoleError::FileWrite {
        path: path.display().to_string(),
        reason,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| write_err("path has no file name".to_string()))?
        .to_string_lossy();

    fs::create_dir_all(parent)
        .await
        .map_err(|e| write_err(e.to_string()))?;

    let tmp = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));
    fs::write(&tmp, content)
        .await
        .map_err(|e| write_err(e.to_string()))?;

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(write_err(e.to_string()));
    }
    Ok(())
}

/// Files in `dir` with the given extension, sorted by name. A missing
/// directory has no files.
pub(crate) async fn list_files(dir: &Path, extension: &str) -> ConsoleResult<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(ConsoleError::FileRead {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })
        }
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let hidden = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        if !hidden && path.extension().is_some_and(|e| e == extension) && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File stem as an owned string.
pub(crate) fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_creates_parents_and_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a/b/out.yaml");

        write_atomic(&path, "first").await.unwrap();
        write_atomic(&path, "second").await.unwrap();

        assert_eq!(read_text(&path).await.unwrap().as_deref(), Some("second"));
        let leftovers = list_files(path.parent().unwrap(), "tmp").await.unwrap();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_read_text_missing_and_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        assert!(read_text(&temp_dir.path().join("nope")).await.unwrap().is_none());

        let bad = temp_dir.path().join("bad.conf");
        std::fs::write(&bad, [0xff, 0xfe, 0x00]).unwrap();
        let err = read_text(&bad).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_list_files_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["b.conf", "a.conf", "c.txt", ".hidden.conf"] {
            std::fs::write(temp_dir.path().join(name), "").unwrap();
        }
        let files = list_files(temp_dir.path(), "conf").await.unwrap();
        let names: Vec<String> = files.iter().map(|p| stem(p)).collect();
        assert_eq!(names, vec!["a", "b"]);

        let missing = list_files(&temp_dir.path().join("missing"), "conf").await.unwrap();
        assert!(missing.is_empty());
    }
}
