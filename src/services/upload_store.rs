use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{config::UploadConfig, error::Result};

/// URL prefix under which stored files are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Directory-backed store for uploaded product images.
///
/// Files are written under a generated collision-resistant name and exposed at
/// `/uploads/<file>`. Removal is best-effort: a file that is already gone never
/// fails the surrounding request.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

/// A file written to the store but not yet referenced by a product row.
/// Discarded if the surrounding database write fails.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub file_name: String,
    pub public_path: String,
}

impl UploadStore {
    pub async fn open(config: &UploadConfig) -> Result<Self> {
        let root = PathBuf::from(&config.dir);
        tokio::fs::create_dir_all(&root).await?;

        tracing::info!("Upload store ready at {}", root.display());

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under a fresh unique name and returns the staged handle.
    pub async fn stage(&self, original_name: &str, bytes: &[u8]) -> Result<StagedUpload> {
        let file_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(original_name));
        let path = self.root.join(&file_name);

        tokio::fs::write(&path, bytes).await?;

        Ok(StagedUpload {
            public_path: format!("{}/{}", PUBLIC_PREFIX, file_name),
            file_name,
        })
    }

    /// Deletes a staged file whose database write failed. Best-effort.
    pub async fn discard(&self, staged: &StagedUpload) {
        let path = self.root.join(&staged.file_name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to discard staged file {}: {}", staged.file_name, e);
            }
        }
    }

    /// Deletes the file behind a stored public path, e.g. after its product row
    /// now references a replacement. Missing files and foreign paths are ignored.
    pub async fn remove(&self, public_path: &str) {
        let Some(file_name) = file_name_from_public_path(public_path) else {
            tracing::warn!("Refusing to remove non-store path {}", public_path);
            return;
        };

        let path = self.root.join(file_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!("Removed superseded file {}", file_name),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove file {}: {}", file_name, e),
        }
    }
}

/// Strips any path components the client sent and replaces hostile characters,
/// keeping the extension readable.
fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim();

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

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Accepts only `/uploads/<single-component>` so a stored value can never walk
/// out of the store directory.
fn file_name_from_public_path(public_path: &str) -> Option<&str> {
    let file_name = public_path
        .strip_prefix(PUBLIC_PREFIX)?
        .strip_prefix('/')?;

    if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.contains("..") {
        return None;
    }

    Some(file_name)
}
