use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;

use super::dto::Listing;

#[derive(Debug, FromRow)]
pub struct ListingRow {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub age_years: Option<i32>,
    pub weight_kg: Option<f64>,
    pub color: Option<String>,
    pub price: f64,
    pub district: String,
    pub taluka: Option<String>,
    pub village: Option<String>,
    pub has_race_exp: bool,
    pub races_count: i32,
    pub best_position: Option<String>,
    pub description: Option<String>,
    pub contact_phone: String,
    pub video_url: Option<String>,
    pub main_photo: Option<String>,
    pub photos_json: Option<Json<Vec<String>>>,
    pub created_at: OffsetDateTime,
}

impl From<ListingRow> for Listing {
    fn from(r: ListingRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            age_years: r.age_years,
            weight_kg: r.weight_kg,
            color: r.color,
            price: r.price,
            district: r.district,
            taluka: r.taluka,
            village: r.village,
            has_race_exp: r.has_race_exp,
            races_count: r.races_count,
            best_position: r.best_position,
            description: r.description,
            contact_phone: r.contact_phone,
            video_url: r.video_url,
            main_photo: r.main_photo,
            photos: r.photos_json.map(|Json(p)| p).unwrap_or_default(),
            created_at: r.created_at,
        }
    }
}
