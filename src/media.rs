use crate::error::Result;
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{File, metadata},
    io::AsyncReadExt,
};

/// Telegram bot uploads are capped at 50 MiB.
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;
pub const DEFAULT_TITLE: &str = "video";

pub static VIDEO_EXTS: &[&str] = &["mp4", "webm", "mov", "mkv", "avi"];
pub static IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Simple media kind enum used when picking a file out of a download dir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Unknown,
}

/// A downloaded (and possibly re-encoded) file living in a request's temp dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub title: String,
    pub size_bytes: u64,
}

impl MediaArtifact {
    /// Stat `path` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be stat'ed.
    pub async fn from_path(path: impl Into<PathBuf>, title: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let size_bytes = metadata(&path).await?.len();
        Ok(Self {
            path,
            title: title.into(),
            size_bytes,
        })
    }

    /// Swap the backing file (e.g. for its compressed version), keeping the title.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the new file cannot be stat'ed.
    pub async fn replace_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.size_bytes = metadata(&path).await?.len();
        self.path = path;
        Ok(())
    }

    #[inline]
    #[must_use]
    pub const fn exceeds(&self, limit: u64) -> bool {
        self.size_bytes > limit
    }

    #[must_use]
    pub fn caption(&self) -> String {
        truncate_caption(&self.title, TELEGRAM_CAPTION_LIMIT)
    }
}

/// Cut `text` to at most `limit` characters.
#[must_use]
pub fn truncate_caption(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn kind_from_extension(path: &Path) -> Option<MediaKind> {
    let ext = path.extension().and_then(OsStr::to_str)?;
    if VIDEO_EXTS.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
        return Some(MediaKind::Video);
    }
    if IMAGE_EXTS.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
        return Some(MediaKind::Image);
    }
    None
}

fn kind_from_mime(mime: &str) -> MediaKind {
    if mime.starts_with("video/") {
        MediaKind::Video
    } else if mime.starts_with("image/") {
        MediaKind::Image
    } else {
        MediaKind::Unknown
    }
}

/// Detect media kind: check extension first, otherwise read a small
/// sample asynchronously and run `infer::get` on the buffer.
pub async fn detect_media_kind(path: &Path) -> MediaKind {
    if let Some(kind) = kind_from_extension(path) {
        return kind;
    }

    // Read a small prefix (8 KiB) and probe
    if let Ok(mut f) = File::open(path).await {
        let mut buf = vec![0u8; 8192];
        match f.read(&mut buf).await {
            Ok(n) if n > 0 => {
                buf.truncate(n);
                if let Some(k) = infer::get(&buf) {
                    return kind_from_mime(k.mime_type());
                }
            }
            _ => {}
        }
    }

    MediaKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn truncate_caption_limits_chars() {
        let long = "é".repeat(TELEGRAM_CAPTION_LIMIT + 10);
        let caption = truncate_caption(&long, TELEGRAM_CAPTION_LIMIT);
        assert_eq!(caption.chars().count(), TELEGRAM_CAPTION_LIMIT);
        assert_eq!(truncate_caption("Test Clip", TELEGRAM_CAPTION_LIMIT), "Test Clip");
    }

    #[tokio::test]
    async fn detect_by_extension() {
        assert_eq!(
            detect_media_kind(Path::new("clip.MP4")).await,
            MediaKind::Video
        );
        assert_eq!(
            detect_media_kind(Path::new("cover.jpg")).await,
            MediaKind::Image
        );
    }

    #[tokio::test]
    async fn detect_by_magic_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("noext");
        // Minimal ISO-BMFF header
        let mut header = vec![0x00, 0x00, 0x00, 0x18];
        header.extend_from_slice(b"ftypmp42");
        header.extend_from_slice(&[0; 12]);
        std::fs::write(&path, header).unwrap();
        assert_eq!(detect_media_kind(&path).await, MediaKind::Video);

        let junk = dir.path().join("junk");
        std::fs::write(&junk, b"hello").unwrap();
        assert_eq!(detect_media_kind(&junk).await, MediaKind::Unknown);
    }

    #[tokio::test]
    async fn artifact_replace_file_updates_size() {
        let dir = tempdir().unwrap();
        let original = dir.path().join("a.mp4");
        let compressed = dir.path().join("compressed.mp4");
        std::fs::write(&original, vec![0; 100]).unwrap();
        std::fs::write(&compressed, vec![0; 10]).unwrap();

        let mut artifact = MediaArtifact::from_path(&original, "Title").await.unwrap();
        assert_eq!(artifact.size_bytes, 100);
        assert!(artifact.exceeds(50));

        artifact.replace_file(&compressed).await.unwrap();
        assert_eq!(artifact.size_bytes, 10);
        assert_eq!(artifact.path, compressed);
        assert_eq!(artifact.title, "Title");
        assert!(!artifact.exceeds(50));
    }
}
