//! In-memory stores standing in for PostgreSQL and the upload directory.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;

use crate::auth::{repo::UserRepo, repo_types::User};
use crate::listings::{
    dto::{Listing, ListingFields},
    repo::ListingRepo,
};
use crate::storage::StorageClient;

#[derive(Default)]
pub struct MemoryUserRepo {
    users: Mutex<Vec<User>>,
    next_id: AtomicI64,
    hide_lookups: bool,
}

impl MemoryUserRepo {
    /// Makes `find_by_mobile` always miss, as if a concurrent signup had not
    /// committed yet when the lookup ran.
    pub fn hide_lookups(mut self) -> Self {
        self.hide_lookups = true;
        self
    }

    pub fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_mobile(&self, mobile: &str) -> anyhow::Result<Option<User>> {
        if self.hide_lookups {
            return Ok(None);
        }
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.mobile == mobile).cloned())
    }

    async fn create(
        &self,
        name: &str,
        mobile: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.mobile == mobile) {
            return Ok(None);
        }
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: name.to_string(),
            mobile: mobile.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(Some(user))
    }
}

#[derive(Default)]
pub struct MemoryListingRepo {
    rows: Mutex<Vec<Listing>>,
    next_id: AtomicI64,
}

fn apply(listing: &mut Listing, f: &ListingFields) {
    listing.name = f.name.clone();
    listing.age_years = f.age_years;
    listing.weight_kg = f.weight_kg;
    listing.color = f.color.clone();
    listing.price = f.price;
    listing.district = f.district.clone();
    listing.taluka = f.taluka.clone();
    listing.village = f.village.clone();
    listing.has_race_exp = f.has_race_exp;
    listing.races_count = f.races_count;
    listing.best_position = f.best_position.clone();
    listing.description = f.description.clone();
    listing.contact_phone = f.contact_phone.clone();
    listing.video_url = f.video_url.clone();
}

#[async_trait]
impl ListingRepo for MemoryListingRepo {
    async fn list_all(&self) -> anyhow::Result<Vec<Listing>> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Listing>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|l| l.id == id).cloned())
    }

    async fn owner_of(&self, id: i64) -> anyhow::Result<Option<i64>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|l| l.id == id).map(|l| l.user_id))
    }

    async fn insert(
        &self,
        owner: i64,
        fields: &ListingFields,
        photos: &[String],
    ) -> anyhow::Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut listing = Listing {
            id,
            user_id: owner,
            name: String::new(),
            age_years: None,
            weight_kg: None,
            color: None,
            price: 0.0,
            district: String::new(),
            taluka: None,
            village: None,
            has_race_exp: false,
            races_count: 0,
            best_position: None,
            description: None,
            contact_phone: String::new(),
            video_url: None,
            main_photo: photos.first().cloned(),
            photos: photos.to_vec(),
            created_at: OffsetDateTime::now_utc(),
        };
        apply(&mut listing, fields);
        self.rows.lock().unwrap().push(listing);
        Ok(id)
    }

    async fn update_owned(
        &self,
        id: i64,
        owner: i64,
        fields: &ListingFields,
    ) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|l| l.id == id && l.user_id == owner) {
            Some(listing) => {
                apply(listing, fields);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_owned(&self, id: i64, owner: i64) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|l| !(l.id == id && l.user_id == owner));
        Ok(rows.len() != before)
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<Vec<(String, Bytes)>>,
}

impl MemoryStorage {
    pub fn names(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(&self, name: &str, body: Bytes) -> anyhow::Result<()> {
        let mut objects = self.objects.lock().unwrap();
        anyhow::ensure!(
            objects.iter().all(|(n, _)| n != name),
            "object {name} already exists"
        );
        objects.push((name.to_string(), body));
        Ok(())
    }
}
