use async_trait::async_trait;
use uuid::Uuid;

use rnm_shared::clients::minio::MinioClient;
use rnm_shared::errors::{AppError, AppResult, ErrorCode};

use crate::policy::{Actor, Capability};

pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// Public object storage for listing photos.
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Stores the object and returns its public URL.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<String, String>;
    async fn ping(&self) -> Result<(), String>;
}

#[async_trait]
impl PhotoStorage for MinioClient {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<String, String> {
        self.upload(key, body, content_type).await
    }

    async fn ping(&self) -> Result<(), String> {
        MinioClient::ping(self).await
    }
}

pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

pub async fn upload_listing_photo(
    storage: &dyn PhotoStorage,
    actor: &Actor,
    content_type: &str,
    body: Vec<u8>,
) -> AppResult<String> {
    actor.require(Capability::UploadPhotos)?;

    let ext = extension_for(content_type).ok_or_else(|| {
        AppError::new(
            ErrorCode::PhotoUploadFailed,
            "unsupported image format, accepted: jpeg, png, webp",
        )
    })?;
    if body.is_empty() {
        return Err(AppError::new(ErrorCode::PhotoUploadFailed, "file is empty"));
    }
    if body.len() > MAX_PHOTO_BYTES {
        return Err(AppError::with_details(
            ErrorCode::PayloadTooLarge,
            "photo is too large",
            serde_json::json!({ "max_bytes": MAX_PHOTO_BYTES }),
        ));
    }

    let key = format!("listings/{}/{}.{}", actor.id, Uuid::now_v7(), ext);
    let size = body.len();
    let url = storage
        .put(&key, body, content_type)
        .await
        .map_err(|e| AppError::new(ErrorCode::PhotoUploadFailed, e))?;

    tracing::info!(owner_id = %actor.id, key = %key, size, "listing photo uploaded");
    Ok(url)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rnm_shared::types::auth::UserRole;
    use tokio::sync::Mutex;

    /// Keeps uploaded keys in memory and hands out fake public URLs.
    #[derive(Default)]
    pub(crate) struct RecordingStorage {
        pub keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PhotoStorage for RecordingStorage {
        async fn put(&self, key: &str, _body: Vec<u8>, _content_type: &str) -> Result<String, String> {
            self.keys.lock().await.push(key.to_string());
            Ok(format!("http://photos.test/{key}"))
        }

        async fn ping(&self) -> Result<(), String> {
            Ok(())
        }
    }

    fn actor(role: UserRole) -> Actor {
        Actor {
            id: Uuid::now_v7(),
            role,
            is_blocked: false,
        }
    }

    #[tokio::test]
    async fn photo_key_is_scoped_to_owner() {
        let storage = RecordingStorage::default();
        let owner = actor(UserRole::Owner);

        let url = upload_listing_photo(&storage, &owner, "image/png", vec![1, 2, 3])
            .await
            .unwrap();

        let keys = storage.keys.lock().await;
        assert!(keys[0].starts_with(&format!("listings/{}/", owner.id)));
        assert!(keys[0].ends_with(".png"));
        assert!(url.ends_with(&keys[0]));
    }

    #[tokio::test]
    async fn rejects_unsupported_and_oversized_files() {
        let storage = RecordingStorage::default();
        let owner = actor(UserRole::Owner);

        let err = upload_listing_photo(&storage, &owner, "image/gif", vec![1])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PhotoUploadFailed);

        let err = upload_listing_photo(&storage, &owner, "image/jpeg", vec![0; MAX_PHOTO_BYTES + 1])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PayloadTooLarge);

        assert!(storage.keys.lock().await.is_empty());
    }

    #[tokio::test]
    async fn users_cannot_upload() {
        let storage = RecordingStorage::default();
        let err = upload_listing_photo(&storage, &actor(UserRole::User), "image/png", vec![1])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }
}
