use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{
    role::{self, RoleName},
    user,
};

use super::{AppState, ApiErr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id (UUID, stored as string in JWT)
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub role: Option<String>,
    pub token_type: TokenKind,
    /// Unix timestamp expiry
    pub exp: u64,
}

pub fn encode_jwt(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

/// Sign a token of `kind` for `user`, valid for the configured lifetime.
pub fn issue(
    state: &AppState,
    user: &user::Model,
    role: Option<&str>,
    kind: TokenKind,
) -> Result<String, ApiErr> {
    let ttl_secs = match kind {
        TokenKind::Access => state.access_token_minutes * 60,
        TokenKind::Refresh => state.refresh_token_days * 24 * 3600,
    };
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        role: role.map(str::to_string),
        token_type: kind,
        exp: (Utc::now().timestamp() as u64) + ttl_secs,
    };
    encode_jwt(&claims, &state.jwt_secret).map_err(ApiErr::internal)
}

fn extract_bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Decode a token and require it to be of the expected kind.
pub fn verify(token: &str, secret: &str, kind: TokenKind) -> Result<Claims, ApiErr> {
    let claims = decode_jwt(token, secret)
        .map_err(|_| ApiErr::unauthorized("Token is invalid or expired"))?;
    if claims.token_type != kind {
        return Err(ApiErr::unauthorized("Token has wrong type"));
    }
    Ok(claims)
}

/// Extractor: validates the Bearer access token and loads the caller with
/// their role. Deleted or deactivated accounts are rejected.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: user::Model,
    pub role: Option<role::Model>,
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role_name(&self) -> Option<&str> {
        self.role.as_ref().map(|r| r.name.as_str())
    }

    pub fn has_role(&self, role: RoleName) -> bool {
        self.role_name() == Some(role.as_str())
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let token = extract_bearer(parts)
            .ok_or_else(|| ApiErr::unauthorized("Authentication credentials were not provided."))?;

        let claims = verify(token, &state.jwt_secret, TokenKind::Access)?;

        let (user, role) = user::Entity::find_by_id(claims.sub)
            .find_also_related(role::Entity)
            .one(&state.db)
            .await
            .map_err(ApiErr::internal)?
            .ok_or_else(|| ApiErr::unauthorized("User not found"))?;

        if !user.is_active {
            return Err(ApiErr::unauthorized("User is inactive"));
        }

        Ok(CurrentUser { user, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-jwt-secret-key-32-chars-pad";

    fn claims(kind: TokenKind, exp: u64) -> Claims {
        Claims {
            sub: Uuid::now_v7(),
            username: "amina".to_string(),
            email: "amina@univ.example".to_string(),
            role: Some("Student".to_string()),
            token_type: kind,
            exp,
        }
    }

    fn in_one_hour() -> u64 {
        (Utc::now().timestamp() as u64) + 3600
    }

    #[test]
    fn encode_then_verify_access() {
        let c = claims(TokenKind::Access, in_one_hour());
        let token = encode_jwt(&c, SECRET).unwrap();
        let back = verify(&token, SECRET, TokenKind::Access).unwrap();
        assert_eq!(back.sub, c.sub);
        assert_eq!(back.role.as_deref(), Some("Student"));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let token = encode_jwt(&claims(TokenKind::Refresh, in_one_hour()), SECRET).unwrap();
        let err = verify(&token, SECRET, TokenKind::Access).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn expired_token_rejected() {
        let token = encode_jwt(&claims(TokenKind::Access, 1_000), SECRET).unwrap();
        assert!(verify(&token, SECRET, TokenKind::Access).is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = encode_jwt(&claims(TokenKind::Access, in_one_hour()), SECRET).unwrap();
        assert!(decode_jwt(&token, "another-secret").is_err());
    }
}
