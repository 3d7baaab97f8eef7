//! File adapter: read/atomic-write/backup/restore of the target's
//! environment-variable file (§4.2.c, §4.5).

use async_trait::async_trait;
use shared::{Error, Result};
use std::path::Path;

const ADAPTER: &str = "file";

#[async_trait]
pub trait FileAdapter: Send + Sync {
    async fn read(&self, path: &str) -> Result<String>;

    /// Write `contents` to `path` atomically (write to a temp file in the
    /// same directory, then rename over the destination).
    async fn atomic_write(&self, path: &str, contents: &str) -> Result<()>;

    /// Copy `path` to `<path>.bak`, returning the backup path.
    async fn backup_to_sibling(&self, path: &str) -> Result<String>;

    /// Restore `path` from `<path>.bak`, then remove the backup.
    async fn restore_from_sibling(&self, path: &str, backup_path: &str) -> Result<()>;
}

pub struct LocalFileAdapter;

impl LocalFileAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalFileAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileAdapter for LocalFileAdapter {
    async fn read(&self, path: &str) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("failed to read {path}: {e}")))
    }

    async fn atomic_write(&self, path: &str, contents: &str) -> Result<()> {
        let path_ref = Path::new(path);
        let dir = path_ref.parent().unwrap_or_else(|| Path::new("."));
        let tmp_path = dir.join(format!(
            ".{}.tmp-{}",
            path_ref
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("file"),
            uuid::Uuid::new_v4()
        ));

        tokio::fs::write(&tmp_path, contents)
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("failed to write temp file: {e}")))?;

        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            Error::adapter(ADAPTER, format!("failed to rename temp file into place: {e}"))
        })?;

        Ok(())
    }

    async fn backup_to_sibling(&self, path: &str) -> Result<String> {
        let backup_path = format!("{path}.bak");
        tokio::fs::copy(path, &backup_path)
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("failed to back up {path}: {e}")))?;
        Ok(backup_path)
    }

    async fn restore_from_sibling(&self, path: &str, backup_path: &str) -> Result<()> {
        tokio::fs::copy(backup_path, path)
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("failed to restore {path}: {e}")))?;
        tokio::fs::remove_file(backup_path)
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("failed to remove backup {backup_path}: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_roundtrip_write_backup_restore() {
        let dir = std::env::temp_dir().join(format!("file-adapter-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("env").to_string_lossy().to_string();

        {
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(b"ORIGINAL=1\n").unwrap();
        }

        let adapter = LocalFileAdapter::new();
        let original = adapter.read(&path).await.unwrap();
        assert_eq!(original, "ORIGINAL=1\n");

        let backup = adapter.backup_to_sibling(&path).await.unwrap();
        adapter.atomic_write(&path, "CORRUPTED=1\n").await.unwrap();
        assert_eq!(adapter.read(&path).await.unwrap(), "CORRUPTED=1\n");

        adapter.restore_from_sibling(&path, &backup).await.unwrap();
        assert_eq!(adapter.read(&path).await.unwrap(), original);
        assert!(!Path::new(&backup).exists());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
