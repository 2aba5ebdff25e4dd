use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};

use super::dto::{Listing, ListingFields};
use super::repo_types::ListingRow;

/// Listing store.
///
/// Mutations take the owner id and only touch a row that still belongs to
/// it, so ownership is enforced by the same statement that writes.
#[async_trait]
pub trait ListingRepo: Send + Sync {
    /// All listings, newest first.
    async fn list_all(&self) -> anyhow::Result<Vec<Listing>>;

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Listing>>;

    /// Owner of a listing, if it exists.
    async fn owner_of(&self, id: i64) -> anyhow::Result<Option<i64>>;

    /// Inserts a listing owned by `owner`; `photos` in upload order, the
    /// first one becomes the main photo. Returns the new id.
    async fn insert(
        &self,
        owner: i64,
        fields: &ListingFields,
        photos: &[String],
    ) -> anyhow::Result<i64>;

    /// Overwrites every mutable field. Returns `false` when no row with that
    /// id and owner exists.
    async fn update_owned(&self, id: i64, owner: i64, fields: &ListingFields)
        -> anyhow::Result<bool>;

    /// Returns `false` when no row with that id and owner exists.
    async fn delete_owned(&self, id: i64, owner: i64) -> anyhow::Result<bool>;
}

const LISTING_COLUMNS: &str = r#"
    id, user_id, name, age_years, weight_kg, color, price, district, taluka, village,
    has_race_exp, races_count, best_position, description, contact_phone,
    video_url, main_photo, photos_json, created_at
"#;

pub struct PgListingRepo {
    db: PgPool,
}

impl PgListingRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ListingRepo for PgListingRepo {
    async fn list_all(&self) -> anyhow::Result<Vec<Listing>> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list listings")?;
        Ok(rows.into_iter().map(Listing::from).collect())
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get listing")?;
        Ok(row.map(Listing::from))
    }

    async fn owner_of(&self, id: i64) -> anyhow::Result<Option<i64>> {
        let owner = sqlx::query_scalar::<_, i64>("SELECT user_id FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("get listing owner")?;
        Ok(owner)
    }

    async fn insert(
        &self,
        owner: i64,
        fields: &ListingFields,
        photos: &[String],
    ) -> anyhow::Result<i64> {
        let main_photo = photos.first();
        let photos_json = (!photos.is_empty()).then(|| Json(photos.to_vec()));
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO listings
                (user_id, name, age_years, weight_kg, color, price, district, taluka, village,
                 has_race_exp, races_count, best_position, description, contact_phone,
                 video_url, main_photo, photos_json)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING id
            "#,
        )
        .bind(owner)
        .bind(&fields.name)
        .bind(fields.age_years)
        .bind(fields.weight_kg)
        .bind(&fields.color)
        .bind(fields.price)
        .bind(&fields.district)
        .bind(&fields.taluka)
        .bind(&fields.village)
        .bind(fields.has_race_exp)
        .bind(fields.races_count)
        .bind(&fields.best_position)
        .bind(&fields.description)
        .bind(&fields.contact_phone)
        .bind(&fields.video_url)
        .bind(main_photo)
        .bind(photos_json)
        .fetch_one(&self.db)
        .await
        .context("insert listing")?;
        Ok(id)
    }

    async fn update_owned(
        &self,
        id: i64,
        owner: i64,
        fields: &ListingFields,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE listings
               SET name = $3, age_years = $4, weight_kg = $5, color = $6, price = $7,
                   district = $8, taluka = $9, village = $10,
                   has_race_exp = $11, races_count = $12, best_position = $13,
                   description = $14, contact_phone = $15, video_url = $16
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(&fields.name)
        .bind(fields.age_years)
        .bind(fields.weight_kg)
        .bind(&fields.color)
        .bind(fields.price)
        .bind(&fields.district)
        .bind(&fields.taluka)
        .bind(&fields.village)
        .bind(fields.has_race_exp)
        .bind(fields.races_count)
        .bind(&fields.best_position)
        .bind(&fields.description)
        .bind(&fields.contact_phone)
        .bind(&fields.video_url)
        .execute(&self.db)
        .await
        .context("update listing")?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_owned(&self, id: i64, owner: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM listings WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await
            .context("delete listing")?;
        Ok(res.rows_affected() == 1)
    }
}
