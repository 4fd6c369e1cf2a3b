use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct LocalImageStorage {
    base_dir: PathBuf,
}

impl LocalImageStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Writes `data` to a new uniquely named `.png` file and returns its path.
    pub async fn save_png(&self, data: &[u8]) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.base_dir).await?;
        let path = self.base_dir.join(Self::unique_file_name("png"));
        if let Err(err) = fs::write(&path, data).await {
            self.remove(&path).await;
            return Err(err);
        }
        Ok(path)
    }

    pub async fn remove(&self, path: &Path) {
        if let Err(err) = fs::remove_file(path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), "Failed to remove image file: {}", err);
            }
        }
    }

    fn unique_file_name(ext: &str) -> String {
        format!("{}.{ext}", Uuid::new_v4().simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_creates_directory_and_unique_files() {
        let temp = tempfile::tempdir().unwrap();
        let base_dir = temp.path().join("nested/images");
        let storage = LocalImageStorage::new(base_dir.clone());

        let first = storage.save_png(b"first").await.unwrap();
        let second = storage.save_png(b"first").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(first.parent().unwrap(), base_dir.as_path());
        assert_eq!(first.extension().and_then(|ext| ext.to_str()), Some("png"));
        assert_eq!(std::fs::read(&second).unwrap(), b"first");
    }

    #[tokio::test]
    async fn remove_deletes_file_and_ignores_missing() {
        let temp = tempfile::tempdir().unwrap();
        let storage = LocalImageStorage::new(temp.path().to_path_buf());
        let path = storage.save_png(b"x").await.unwrap();

        storage.remove(&path).await;
        assert!(!path.exists());
        storage.remove(&path).await;
    }
}
