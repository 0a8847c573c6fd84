use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use keepsake_types::models::{MediaKind, StoredMedia};

/// Manages attachment files on disk.
///
/// Each file lives flat at `{dir}/{name}` and is referenced as
/// `{url_prefix}/{name}`, the path under which it is statically served.
/// Names are `{utc timestamp}_{random uuid}_{sanitised original name}`.
pub struct MediaStore {
    dir: PathBuf,
    url_prefix: String,
}

impl MediaStore {
    pub async fn new(dir: PathBuf, url_prefix: &str) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media storage directory: {} (served at {})", dir.display(), url_prefix);
        Ok(Self {
            dir,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Write an attachment and return its reference plus recorded metadata.
    ///
    /// Bytes land in a `.part` file first and are renamed into place, so a
    /// visible name always holds a complete file.
    pub async fn save(&self, filename: &str, bytes: &[u8], content_type: &str) -> Result<StoredMedia> {
        let name = format!(
            "{}_{}_{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            Uuid::new_v4().simple(),
            sanitize_filename(filename)
        );
        let final_path = self.dir.join(&name);
        let part_path = self.dir.join(format!("{}.part", name));

        let written = async {
            let mut file = fs::File::create(&part_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            fs::rename(&part_path, &final_path).await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        if let Err(e) = written {
            fs::remove_file(&part_path).await.ok();
            return Err(anyhow::anyhow!("Failed to write {}: {}", final_path.display(), e));
        }

        let sha256 = hex::encode(Sha256::digest(bytes));
        let reference = format!("{}/{}", self.url_prefix, name);
        debug!("Stored {} ({} bytes)", reference, bytes.len());

        Ok(StoredMedia {
            kind: MediaKind::classify(&name, content_type),
            reference,
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            sha256,
        })
    }

    /// Map a reference back to its file, if this store owns it.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let name = reference
            .strip_prefix(&self.url_prefix)?
            .strip_prefix('/')?;

        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return None;
        }
        Some(self.dir.join(name))
    }

    /// Remove a stored file. Missing files and foreign references are not errors.
    pub async fn delete(&self, reference: &str) -> Result<()> {
        let Some(path) = self.resolve(reference) else {
            warn!("Ignoring delete of unmanaged media reference {}", reference);
            return Ok(());
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted media {}", reference);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Media {} already gone", reference);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Keep only the final path component and a conservative character set.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, MediaStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path().join("uploads"), "/static/uploads/")
            .await
            .unwrap();
        (tmp, store)
    }

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_filename("cake.png"), "cake.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\photos\\my cake!.jpg"), "my_cake_.jpg");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[tokio::test]
    async fn save_writes_file_and_records_metadata() {
        let (_tmp, store) = store().await;
        let media = store.save("cake.png", b"png-bytes", "image/png").await.unwrap();

        assert!(media.reference.starts_with("/static/uploads/"));
        assert!(media.reference.ends_with("_cake.png"));
        assert_eq!(media.kind, MediaKind::Image);
        assert_eq!(media.size, 9);
        assert_eq!(media.sha256, hex::encode(Sha256::digest(b"png-bytes")));

        let path = store.resolve(&media.reference).unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn same_name_same_second_does_not_collide() {
        let (_tmp, store) = store().await;
        let a = store.save("clip.mp4", b"first", "video/mp4").await.unwrap();
        let b = store.save("clip.mp4", b"second", "video/mp4").await.unwrap();

        assert_ne!(a.reference, b.reference);
        assert_eq!(fs::read(store.resolve(&a.reference).unwrap()).await.unwrap(), b"first");
        assert_eq!(fs::read(store.resolve(&b.reference).unwrap()).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_tmp, store) = store().await;
        let media = store.save("note.mp3", b"id3", "audio/mpeg").await.unwrap();
        let path = store.resolve(&media.reference).unwrap();

        store.delete(&media.reference).await.unwrap();
        assert!(!path.exists());
        store.delete(&media.reference).await.unwrap();
    }

    #[tokio::test]
    async fn foreign_references_are_left_alone() {
        let (tmp, store) = store().await;
        let outside = tmp.path().join("keep.txt");
        fs::write(&outside, b"keep").await.unwrap();

        assert!(store.resolve("/static/uploads/../keep.txt").is_none());
        assert!(store.resolve("/elsewhere/keep.txt").is_none());
        store.delete("/static/uploads/../keep.txt").await.unwrap();
        assert!(outside.exists());
    }
}
