use anyhow::Context;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::storage::StorageClient;

/// Photos accepted per listing.
pub const MAX_PHOTOS: usize = 6;
/// Size ceiling for a single photo: 10 MiB.
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
/// Prefix of persisted photo paths; the same prefix is the public route.
pub const PUBLIC_PREFIX: &str = "uploads";

pub struct UploadItem {
    pub body: Bytes,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl UploadItem {
    /// Rejects a photo that would exceed the per-listing count or the size
    /// ceiling. `already` is the number of photos accepted so far.
    pub fn check_limits(&self, already: usize) -> Result<(), AppError> {
        if already >= MAX_PHOTOS {
            return Err(AppError::validation(format!(
                "At most {MAX_PHOTOS} photos are allowed"
            )));
        }
        if self.body.len() > MAX_PHOTO_BYTES {
            return Err(AppError::PayloadTooLarge(format!(
                "Each photo must be at most {} MB",
                MAX_PHOTO_BYTES / (1024 * 1024)
            )));
        }
        Ok(())
    }

    /// Extension for the stored file: the original one when it looks sane,
    /// otherwise one derived from the content type.
    fn extension(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .and_then(ext_from_file_name)
            .or_else(|| {
                self.content_type
                    .as_deref()
                    .and_then(ext_from_mime)
                    .map(str::to_string)
            })
    }
}

fn ext_from_file_name(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 8 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// `<unix-millis>-<random>[.<ext>]`
fn stored_name(item: &UploadItem, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let random = Uuid::new_v4().simple();
    match item.extension() {
        Some(ext) => format!("{millis}-{random}.{ext}"),
        None => format!("{millis}-{random}"),
    }
}

/// Writes every photo to storage in upload order and returns the relative
/// paths to persist (`uploads/<name>`). Files written before a failure stay
/// on disk.
pub async fn store_photos(
    storage: &dyn StorageClient,
    items: Vec<UploadItem>,
) -> anyhow::Result<Vec<String>> {
    let mut paths = Vec::with_capacity(items.len());
    for item in items {
        let name = stored_name(&item, OffsetDateTime::now_utc());
        storage
            .put_object(&name, item.body)
            .await
            .with_context(|| format!("store photo {}", name))?;
        debug!(%name, "photo stored");
        paths.push(format!("{PUBLIC_PREFIX}/{name}"));
    }
    Ok(paths)
}

#[cfg(test)]
mod upload_tests {
    use super::*;
    use crate::test_support::MemoryStorage;

    fn item(file_name: Option<&str>, content_type: Option<&str>) -> UploadItem {
        UploadItem {
            body: Bytes::from_static(b"img"),
            file_name: file_name.map(str::to_string),
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn original_extension_wins() {
        assert_eq!(
            item(Some("bull.JPEG"), Some("image/png")).extension().as_deref(),
            Some("jpeg")
        );
        assert_eq!(
            item(Some("noext"), Some("image/png")).extension().as_deref(),
            Some("png")
        );
        assert_eq!(
            item(Some(".hidden"), None).extension(),
            None
        );
        assert_eq!(item(Some("x.p/ng"), None).extension(), None);
        assert_eq!(item(None, None).extension(), None);
    }

    #[test]
    fn stored_names_are_unique_and_keep_extension() {
        let now = OffsetDateTime::now_utc();
        let a = stored_name(&item(Some("a.png"), None), now);
        let b = stored_name(&item(Some("a.png"), None), now);
        assert_ne!(a, b);
        assert!(a.ends_with(".png"));
        let millis = (now.unix_timestamp_nanos() / 1_000_000).to_string();
        assert!(a.starts_with(&format!("{millis}-")));
    }

    #[test]
    fn limits() {
        let small = item(Some("a.jpg"), None);
        assert!(small.check_limits(0).is_ok());
        assert!(small.check_limits(5).is_ok());
        assert!(matches!(small.check_limits(6), Err(AppError::Validation(_))));

        let big = UploadItem {
            body: Bytes::from(vec![0u8; MAX_PHOTO_BYTES + 1]),
            file_name: None,
            content_type: None,
        };
        assert!(matches!(big.check_limits(0), Err(AppError::PayloadTooLarge(_))));
    }

    #[tokio::test]
    async fn store_photos_keeps_upload_order() {
        let storage = MemoryStorage::default();
        let paths = store_photos(
            &storage,
            vec![item(Some("1.jpg"), None), item(Some("2.png"), None)],
        )
        .await
        .unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].starts_with("uploads/") && paths[0].ends_with(".jpg"));
        assert!(paths[1].starts_with("uploads/") && paths[1].ends_with(".png"));
        assert_eq!(storage.names().len(), 2);
    }
}
