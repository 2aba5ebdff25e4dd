pub mod services;

pub use services::{store_photos, UploadItem, MAX_PHOTOS, MAX_PHOTO_BYTES, PUBLIC_PREFIX};
