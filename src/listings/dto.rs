use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// A bull listing as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
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
    pub photos: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Listing fields exactly as submitted, before coercion.
///
/// Multipart submissions deliver every value as text while JSON bodies carry
/// numbers and booleans, so each field is kept as a loose JSON value.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawListing {
    pub name: Option<Value>,
    pub age_years: Option<Value>,
    pub weight_kg: Option<Value>,
    pub color: Option<Value>,
    pub price: Option<Value>,
    pub district: Option<Value>,
    pub taluka: Option<Value>,
    pub village: Option<Value>,
    pub has_race_exp: Option<Value>,
    pub races_count: Option<Value>,
    pub best_position: Option<Value>,
    pub description: Option<Value>,
    pub contact_phone: Option<Value>,
    pub video_url: Option<Value>,
}

impl RawListing {
    /// Records a multipart text field. Unknown names are ignored.
    pub fn set_text(&mut self, name: &str, text: String) {
        let slot = match name {
            "name" => &mut self.name,
            "age_years" => &mut self.age_years,
            "weight_kg" => &mut self.weight_kg,
            "color" => &mut self.color,
            "price" => &mut self.price,
            "district" => &mut self.district,
            "taluka" => &mut self.taluka,
            "village" => &mut self.village,
            "has_race_exp" => &mut self.has_race_exp,
            "races_count" => &mut self.races_count,
            "best_position" => &mut self.best_position,
            "description" => &mut self.description,
            "contact_phone" => &mut self.contact_phone,
            "video_url" => &mut self.video_url,
            _ => return,
        };
        *slot = Some(Value::String(text));
    }
}

/// Validated, strongly-typed listing attributes. Everything a create or an
/// update writes, apart from owner and photos.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFields {
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
}

#[derive(Debug, Serialize)]
pub struct CreatedListingResponse {
    pub message: &'static str,
    pub id: i64,
}
