//! Request-scoped spooling of uploaded files.
//!
//! A [`TempUpload`] owns its file on disk and removes it when dropped, so
//! every exit path of a request (success, validation failure, upstream
//! error, client disconnect) releases the upload.

use crate::models::{ImageAttachment, ImageType};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub struct TempUpload {
    path: PathBuf,
    content_type: String,
    file_name: Option<String>,
    size: usize,
    file: Option<File>,
    removed: bool,
}

impl TempUpload {
    /// Create an empty spool file under `dir`.
    pub async fn create(
        dir: &Path,
        content_type: &str,
        file_name: Option<&str>,
    ) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(format!("upload-{}", Uuid::new_v4().simple()));
        let file = File::create(&path).await?;

        Ok(Self {
            path,
            content_type: content_type.to_string(),
            file_name: file_name.map(str::to_string),
            size: 0,
            file: Some(file),
            removed: false,
        })
    }

    /// Spool `bytes` in one go.
    pub async fn write_all(
        dir: &Path,
        content_type: &str,
        file_name: Option<&str>,
        bytes: &[u8],
    ) -> io::Result<Self> {
        let mut upload = Self::create(dir, content_type, file_name).await?;
        upload.write_chunk(bytes).await?;
        upload.finish().await?;
        Ok(upload)
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("upload already finished"))?;
        file.write_all(chunk).await?;
        self.size += chunk.len();
        Ok(())
    }

    /// Flush and close the spool file.
    pub async fn finish(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Read the spooled bytes and encode them as a data URI of `image_type`.
    ///
    /// Consumes the upload; the file is removed once the read completes,
    /// whether or not it succeeded.
    pub async fn into_attachment(mut self, image_type: ImageType) -> io::Result<ImageAttachment> {
        self.finish().await?;
        let bytes = tokio::fs::read(&self.path).await?;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => self.removed = true,
            Err(e) => tracing::debug!(error = %e, "Deferring upload removal to drop"),
        }

        Ok(ImageAttachment::from_bytes(image_type, &bytes))
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        // Close the handle before unlinking.
        drop(self.file.take());
        if self.removed {
            return;
        }

        // Blocking unlink on error paths only; a single syscall.
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Removed temporary upload");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove temporary upload"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let upload = TempUpload::write_all(dir.path(), "image/png", Some("a.png"), b"data")
            .await
            .unwrap();
        let path = upload.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(upload.size(), 4);
        assert_eq!(upload.file_name(), Some("a.png"));

        drop(upload);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_removed_after_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let upload = TempUpload::write_all(dir.path(), "image/jpeg", None, b"hello")
            .await
            .unwrap();
        let path = upload.path().to_path_buf();

        let attachment = upload.into_attachment(ImageType::Jpeg).await.unwrap();

        assert_eq!(attachment.data_uri, "data:image/jpeg;base64,aGVsbG8=");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_chunks_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let mut upload = TempUpload::create(dir.path(), "image/png", None).await.unwrap();
        upload.write_chunk(b"ab").await.unwrap();
        upload.write_chunk(b"cd").await.unwrap();
        upload.finish().await.unwrap();

        assert_eq!(upload.size(), 4);
        assert_eq!(tokio::fs::read(upload.path()).await.unwrap(), b"abcd");
        assert!(upload.write_chunk(b"e").await.is_err());
    }
}
