use axum::{
    async_trait,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection},
        DefaultBodyLimit, FromRequest,
        Multipart, Path, Request, State,
    },
    http::{header::CONTENT_TYPE, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};

use super::dto::{CreatedListingResponse, Listing, RawListing};
use super::services;
use crate::{
    auth::services::AuthUser,
    error::{ok, ApiResult, AppError, Data, Message},
    state::AppState,
    uploads::{UploadItem, MAX_PHOTOS, MAX_PHOTO_BYTES},
};

/// Room for the text fields of a multipart submission on top of the photos.
const FORM_FIELDS_BYTES: usize = 1024 * 1024;

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/listings", get(list_listings))
        .route("/listings/:id", get(get_listing))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/listings", post(create_listing))
        .route(
            "/listings/:id",
            put(update_listing).delete(delete_listing),
        )
        .layer(DefaultBodyLimit::max(
            MAX_PHOTOS * MAX_PHOTO_BYTES + FORM_FIELDS_BYTES,
        ))
}

/// Body of `POST /listings`: either a multipart form (text fields plus
/// `photos` files) or a JSON object without photos.
pub struct ListingSubmission {
    pub fields: RawListing,
    pub photos: Vec<UploadItem>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!(
            "Each photo must be at most {} MB",
            MAX_PHOTO_BYTES / (1024 * 1024)
        ))
    } else {
        AppError::validation(e.body_text())
    }
}

#[async_trait]
impl<S> FromRequest<S> for ListingSubmission
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(fields) = Json::<RawListing>::from_request(req, state).await?;
            return Ok(Self {
                fields,
                photos: Vec::new(),
            });
        }

        let mut mp = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        let mut fields = RawListing::default();
        let mut photos = Vec::new();

        while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "photos" || name == "photos[]" {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let body = field.bytes().await.map_err(multipart_error)?;
                // browsers send an empty part for an untouched file input
                if body.is_empty() && file_name.as_deref().unwrap_or_default().is_empty() {
                    continue;
                }
                let item = UploadItem {
                    body,
                    file_name,
                    content_type,
                };
                item.check_limits(photos.len())?;
                photos.push(item);
            } else {
                let text = field.text().await.map_err(multipart_error)?;
                fields.set_text(&name, text);
            }
        }

        Ok(Self { fields, photos })
    }
}

fn listing_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    match id {
        Ok(Path(id)) => Ok(id),
        Err(_) => Err(AppError::NotFound("Listing not found".into())),
    }
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_listings(State(state): State<AppState>) -> ApiResult<Data<Vec<Listing>>> {
    let data = services::list_listings(state.listings.as_ref()).await?;
    Ok(ok(Data { data }))
}

#[instrument(skip(state, id))]
pub async fn get_listing(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Data<Listing>> {
    let id = listing_id(id)?;
    let data = services::get_listing(state.listings.as_ref(), id).await?;
    Ok(ok(Data { data }))
}

/// POST /listings (multipart or JSON)
#[instrument(skip_all)]
pub async fn create_listing(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    submission: ListingSubmission,
) -> ApiResult<CreatedListingResponse> {
    let id = services::create_listing(
        state.listings.as_ref(),
        state.storage.as_ref(),
        &user,
        submission.fields,
        submission.photos,
    )
    .await?;
    Ok(ok(CreatedListingResponse {
        message: "Listing created",
        id,
    }))
}

#[instrument(skip_all)]
pub async fn update_listing(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RawListing>, JsonRejection>,
) -> ApiResult<Message> {
    let id = listing_id(id)?;
    let Json(raw) = payload.inspect_err(|e| warn!(error = %e, "bad update body"))?;
    services::update_listing(state.listings.as_ref(), &user, id, raw).await?;
    Ok(ok(Message {
        message: "Listing updated",
    }))
}

#[instrument(skip_all)]
pub async fn delete_listing(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Message> {
    let id = listing_id(id)?;
    services::delete_listing(state.listings.as_ref(), &user, id).await?;
    Ok(ok(Message {
        message: "Listing deleted",
    }))
}
