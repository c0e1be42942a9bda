//! Disk-backed media store. Post images are partitioned per owner under
//! `posts/<owner_id>/`, profile images live flat under `profile/` keyed by
//! user id. Files are written to a `.part` name and renamed into place so a
//! cancelled upload never leaves a servable file.

pub mod guard;

use bytes::Bytes;
use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    public_base: String,
}

impl MediaStore {
    pub fn new(root: PathBuf, public_base: String) -> Self {
        Self { root, public_base }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a post image for `owner_id`; the filename is the upload's epoch
    /// milliseconds plus the original extension, so replacements get a fresh
    /// URL. Returns the generated filename.
    pub async fn save_post_image(
        &self,
        owner_id: &str,
        original_name: &str,
        bytes: Bytes,
    ) -> AppResult<String> {
        let ext = accepted_extension(original_name)?;
        let filename = format!("{}.{}", Utc::now().timestamp_millis(), ext);

        let dir = self.root.join("posts").join(owner_id);
        tokio::fs::create_dir_all(&dir).await?;
        write_atomic(&dir.join(&filename), &bytes).await?;

        Ok(filename)
    }

    /// Store a profile image as `profile/<user_id>.<ext>`, replacing any
    /// previous image for that user regardless of its extension.
    pub async fn save_profile_image(
        &self,
        user_id: &str,
        original_name: &str,
        bytes: Bytes,
    ) -> AppResult<String> {
        let ext = accepted_extension(original_name)?;
        let filename = format!("{user_id}.{ext}");

        let dir = self.root.join("profile");
        tokio::fs::create_dir_all(&dir).await?;

        // A previous image may carry a different extension; drop it so the
        // user has at most one profile file on disk
        for stale_ext in ACCEPTED_EXTENSIONS {
            if *stale_ext != ext {
                let _ = tokio::fs::remove_file(dir.join(format!("{user_id}.{stale_ext}"))).await;
            }
        }

        write_atomic(&dir.join(&filename), &bytes).await?;
        Ok(filename)
    }

    /// Best-effort removal of a post image; failures are logged, never
    /// surfaced.
    pub async fn remove_post_image(&self, owner_id: &str, filename: &str) {
        if filename.is_empty() {
            return;
        }
        let path = self.root.join("posts").join(owner_id).join(filename);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove post image {}: {}", path.display(), e);
            }
        }
    }

    pub fn post_image_url(&self, owner_id: &str, filename: &str) -> String {
        format!("{}/public/posts/{}/{}", self.public_base, owner_id, filename)
    }

    pub fn profile_image_url(&self, filename: &str) -> String {
        format!("{}/public/profile/{}", self.public_base, filename)
    }
}

fn accepted_extension(original_name: &str) -> AppResult<String> {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| ACCEPTED_EXTENSIONS.contains(&e.as_str()))
        .ok_or_else(|| AppError::BadRequest("Only JPEG and PNG images are accepted".into()))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let part = path.with_extension(match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.part"),
        None => "part".to_string(),
    });
    if let Err(e) = tokio::fs::write(&part, bytes).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(e.into());
    }
    tokio::fs::rename(&part, path).await?;
    Ok(())
}
