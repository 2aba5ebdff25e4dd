use serde_json::Value;
use tracing::{info, warn};

use super::dto::{Listing, ListingFields, RawListing};
use super::repo::ListingRepo;
use crate::auth::dto::Identity;
use crate::error::AppError;
use crate::storage::StorageClient;
use crate::uploads::{store_photos, UploadItem};

const REQUIRED_MSG: &str = "name, price, district, contact_phone are required";

fn not_found() -> AppError {
    AppError::NotFound("Listing not found".into())
}

/// Truthy encodings accepted for `has_race_exp`: `true`, `1`, `"true"`,
/// `"1"` and `"on"`. Anything else is false.
pub fn coerce_bool(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1) || n.as_f64() == Some(1.0),
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "1" | "on"),
        _ => false,
    }
}

/// Non-empty trimmed text. Numbers are accepted and rendered as text so a
/// JSON client may send e.g. a phone number unquoted.
fn text(v: Option<Value>) -> Option<String> {
    match v? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A present, non-empty value that is not `null`.
fn present(v: Option<Value>) -> Option<Value> {
    match v? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        other => Some(other),
    }
}

fn number(field: &str, v: Option<Value>) -> Result<Option<f64>, AppError> {
    let Some(v) = present(v) else {
        return Ok(None);
    };
    let n = match &v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() && n >= 0.0 => Ok(Some(n)),
        _ => Err(AppError::validation(format!("{field} must be a non-negative number"))),
    }
}

/// `4.0` counts as whole, `2.5` does not.
fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() <= i64::MAX as f64).then_some(f as i64)
}

fn whole(field: &str, v: Option<Value>) -> Result<Option<i32>, AppError> {
    let Some(v) = present(v) else {
        return Ok(None);
    };
    let n = match &v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    };
    match n.and_then(|n| i32::try_from(n).ok()) {
        Some(n) if n >= 0 => Ok(Some(n)),
        _ => Err(AppError::validation(format!("{field} must be a whole number"))),
    }
}

impl TryFrom<RawListing> for ListingFields {
    type Error = AppError;

    fn try_from(raw: RawListing) -> Result<Self, Self::Error> {
        let has_race_exp = coerce_bool(raw.has_race_exp.as_ref());

        let name = text(raw.name);
        let district = text(raw.district);
        let contact_phone = text(raw.contact_phone);
        let price = match present(raw.price) {
            None => None,
            Some(v) => match number("price", Some(v))? {
                Some(p) if p > 0.0 => Some(p),
                _ => None,
            },
        };

        let (Some(name), Some(price), Some(district), Some(contact_phone)) =
            (name, price, district, contact_phone)
        else {
            return Err(AppError::validation(REQUIRED_MSG));
        };

        Ok(Self {
            name,
            age_years: whole("age_years", raw.age_years)?,
            weight_kg: number("weight_kg", raw.weight_kg)?,
            color: text(raw.color),
            price,
            district,
            taluka: text(raw.taluka),
            village: text(raw.village),
            has_race_exp,
            races_count: whole("races_count", raw.races_count)?.unwrap_or(0),
            best_position: text(raw.best_position),
            description: text(raw.description),
            contact_phone,
            video_url: text(raw.video_url),
        })
    }
}

pub async fn list_listings(repo: &dyn ListingRepo) -> Result<Vec<Listing>, AppError> {
    Ok(repo.list_all().await?)
}

pub async fn get_listing(repo: &dyn ListingRepo, id: i64) -> Result<Listing, AppError> {
    repo.find_by_id(id).await?.ok_or_else(not_found)
}

/// Validates the submission, stores its photos and inserts the row.
/// Fields are checked before any photo is written.
pub async fn create_listing(
    repo: &dyn ListingRepo,
    storage: &dyn StorageClient,
    owner: &Identity,
    raw: RawListing,
    photos: Vec<UploadItem>,
) -> Result<i64, AppError> {
    let fields = ListingFields::try_from(raw).inspect_err(|e| {
        warn!(user_id = owner.id, error = %e, "listing rejected");
    })?;
    let photo_count = photos.len();
    let paths = store_photos(storage, photos).await?;
    let id = repo.insert(owner.id, &fields, &paths).await?;
    info!(listing_id = id, user_id = owner.id, photos = photo_count, "listing created");
    Ok(id)
}

async fn ensure_owner(repo: &dyn ListingRepo, user: &Identity, id: i64) -> Result<(), AppError> {
    let owner = repo.owner_of(id).await?.ok_or_else(not_found)?;
    if owner != user.id {
        warn!(listing_id = id, user_id = user.id, owner_id = owner, "not the owner");
        return Err(AppError::Forbidden(
            "You can only change your own listings".into(),
        ));
    }
    Ok(())
}

/// Full overwrite of every mutable field; owner, photos and creation time
/// never change.
pub async fn update_listing(
    repo: &dyn ListingRepo,
    user: &Identity,
    id: i64,
    raw: RawListing,
) -> Result<(), AppError> {
    ensure_owner(repo, user, id).await?;
    let fields = ListingFields::try_from(raw)?;
    // A concurrent delete between the check and the write leaves no row.
    if !repo.update_owned(id, user.id, &fields).await? {
        return Err(not_found());
    }
    info!(listing_id = id, user_id = user.id, "listing updated");
    Ok(())
}

/// Hard delete. Photo files are left in the upload area.
pub async fn delete_listing(
    repo: &dyn ListingRepo,
    user: &Identity,
    id: i64,
) -> Result<(), AppError> {
    ensure_owner(repo, user, id).await?;
    if !repo.delete_owned(id, user.id).await? {
        return Err(not_found());
    }
    info!(listing_id = id, user_id = user.id, "listing deleted");
    Ok(())
}
