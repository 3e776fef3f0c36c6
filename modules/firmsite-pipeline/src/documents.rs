// Whole-document JSON files: pipeline inputs, outputs and checkpoints.
//
// Writes go to a hidden temp file in the target directory and are renamed into
// place, so a reader sees either the previous document or the new one.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::warn;

use firmsite_common::{FirmsiteError, Result};

/// Read and parse a required JSON document.
pub async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(FirmsiteError::MissingInput(path.to_path_buf()))
        }
        Err(e) => return Err(FirmsiteError::io(path, e)),
    };
    serde_json::from_str(&raw).map_err(|e| FirmsiteError::json(path, e))
}

/// Pretty-print `value` to `path`, replacing any existing file atomically.
pub async fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| FirmsiteError::json(path, e))?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent)
        .await
        .map_err(|e| FirmsiteError::io(&parent, e))?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || replace_file(&parent, &target, &bytes))
        .await
        .map_err(|e| FirmsiteError::io(path, std::io::Error::other(e)))?
}

fn replace_file(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| FirmsiteError::io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| FirmsiteError::io(tmp.path(), e))?;

    match tmp.persist(path) {
        Ok(_) => Ok(()),
        Err(e) => {
            let tmp_path = e.file.path().to_path_buf();
            if let Err(close_err) = e.file.close() {
                warn!(path = %tmp_path.display(), error = %close_err, "Failed to remove temp file");
            }
            Err(FirmsiteError::io(path, e.error))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[tokio::test]
    async fn write_then_read_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("site-map.json");

        write_document(&path, &json!({ "a": 1 })).await.unwrap();
        write_document(&path, &json!({ "a": 2 })).await.unwrap();

        let back: Value = read_document(&path).await.unwrap();
        assert_eq!(back, json!({ "a": 2 }));

        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_to_one_target_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("practice-areas.json");

        let writes = (0..16).map(|i| {
            let path = path.clone();
            tokio::spawn(async move { write_document(&path, &json!({ "n": i })).await })
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap().unwrap();
        }

        let back: Value = read_document(&path).await.unwrap();
        assert!(back["n"].as_u64().unwrap() < 16);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn missing_input_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_document::<Value>(&dir.path().join("nope.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, FirmsiteError::MissingInput(_)));
    }

    #[tokio::test]
    async fn invalid_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{").unwrap();
        let err = read_document::<Value>(&path).await.unwrap_err();
        assert!(matches!(err, FirmsiteError::Json { .. }));
        assert!(err.to_string().contains("bad.json"));
    }
}
