use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::repo_types::User;

/// Credential store.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Find a user by mobile number.
    async fn find_by_mobile(&self, mobile: &str) -> anyhow::Result<Option<User>>;

    /// Insert a new user. Returns `None` when the mobile is already taken,
    /// which the store decides atomically through its unique constraint.
    async fn create(
        &self,
        name: &str,
        mobile: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>>;
}

pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_mobile(&self, mobile: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, mobile, password_hash, created_at
            FROM users
            WHERE mobile = $1
            "#,
        )
        .bind(mobile)
        .fetch_optional(&self.db)
        .await
        .context("find user by mobile")?;
        Ok(user)
    }

    async fn create(
        &self,
        name: &str,
        mobile: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, mobile, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (mobile) DO NOTHING
            RETURNING id, name, mobile, password_hash, created_at
            "#,
        )
        .bind(name)
        .bind(mobile)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }
}
