pub(crate) use crate::auth::dto::{Claims, Identity, JwtKeys};
use crate::auth::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::auth::repo::UserRepo;
use crate::config::JwtConfig;
use crate::error::AppError;
use crate::state::AppState;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{async_trait, extract::{FromRef, FromRequestParts}, http::request::Parts};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, info, warn};

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn sign_at(&self, identity: &Identity, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: identity.id,
            name: identity.name.clone(),
            mobile: identity.mobile.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = identity.id, "jwt signed");
        Ok(token)
    }

    pub fn sign(&self, identity: &Identity) -> anyhow::Result<String> {
        self.sign_at(identity, OffsetDateTime::now_utc())
    }

    /// Malformed, tampered, foreign and expired tokens all fail the same way.
    pub fn verify(&self, token: &str) -> anyhow::Result<Identity> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = data.claims.sub, "jwt verified");
        Ok(data.claims.into())
    }
}

/// Auth gate: verified identity of the bearer token.
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthenticated)?;

        let keys = JwtKeys::from_ref(state);
        match keys.verify(token) {
            Ok(identity) => Ok(AuthUser(identity)),
            Err(e) => {
                warn!(error = %e, "invalid or expired token");
                Err(AppError::InvalidCredential("Invalid token".into()))
            }
        }
    }
}

fn required(field: Option<String>) -> Option<String> {
    field
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn register(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    req: RegisterRequest,
) -> Result<AuthResponse, AppError> {
    let (Some(name), Some(mobile), Some(password)) = (
        required(req.name),
        required(req.mobile),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        warn!("signup with missing fields");
        return Err(AppError::validation("name, mobile and password are required"));
    };

    if users.find_by_mobile(&mobile).await?.is_some() {
        warn!(%mobile, "mobile already registered");
        return Err(mobile_taken());
    }

    let hash = hash_password(&password)?;

    // The unique index is the authoritative guard if two signups race past
    // the lookup above.
    let Some(user) = users.create(&name, &mobile, &hash).await? else {
        warn!(%mobile, "mobile registered concurrently");
        return Err(mobile_taken());
    };

    let identity = user.identity();
    let token = keys.sign(&identity)?;

    info!(user_id = user.id, mobile = %user.mobile, "user registered");
    Ok(AuthResponse {
        token,
        user: identity,
    })
}

pub async fn login(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<AuthResponse, AppError> {
    let (Some(mobile), Some(password)) =
        (required(req.mobile), req.password.filter(|p| !p.is_empty()))
    else {
        warn!("login with missing fields");
        return Err(AppError::validation("mobile and password are required"));
    };

    // Distinct messages for unknown mobile and wrong password reveal whether
    // an account exists. Kept deliberately for this low-sensitivity domain.
    let Some(user) = users.find_by_mobile(&mobile).await? else {
        warn!(%mobile, "login unknown mobile");
        return Err(AppError::validation("This mobile is not registered"));
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(%mobile, user_id = user.id, "login invalid password");
        return Err(AppError::WrongPassword);
    }

    let identity = user.identity();
    let token = keys.sign(&identity)?;

    info!(user_id = user.id, "user logged in");
    Ok(AuthResponse {
        token,
        user: identity,
    })
}

fn mobile_taken() -> AppError {
    AppError::Conflict("An account already exists for this mobile".into())
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "pass123";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        let msg = err.to_string();
        assert!(!msg.is_empty());
    }
}
