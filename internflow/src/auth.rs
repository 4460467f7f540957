use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use password_hash::SaltString;
use rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::entity::{
    role::{self, RoleName},
    user,
};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("User not found")]
    NotFound,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("User is inactive")]
    Inactive,
    #[error("Unknown role: {0}")]
    UnknownRole(String),
    #[error("Database error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("Hash error: {0}")]
    Hash(String),
}

/// Fields for a new account. Username and email are stored as given.
#[derive(Debug, Default, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role_id: Option<Uuid>,
    pub is_active: bool,
    pub is_staff: bool,
}

pub struct Auth {
    db: DatabaseConnection,
}

impl Auth {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Verify username/password and stamp `last_login_at`.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<user::Model, AuthError> {
        let user = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !user.is_active {
            return Err(AuthError::Inactive);
        }

        if !Self::verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidPassword);
        }

        let mut active: user::ActiveModel = user.into();
        active.last_login_at = Set(Some(Utc::now().naive_utc()));
        Ok(active.update(&self.db).await?)
    }

    /// Insert any of the default roles that are missing. Safe to call on every start.
    pub async fn ensure_default_roles(&self) -> Result<(), AuthError> {
        for name in RoleName::ALL {
            let exists = role::Entity::find()
                .filter(role::Column::Name.eq(name.as_str()))
                .one(&self.db)
                .await?
                .is_some();
            if !exists {
                role::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    name: Set(name.as_str().to_string()),
                }
                .insert(&self.db)
                .await?;
                tracing::info!(role = %name, "created default role");
            }
        }
        Ok(())
    }

    pub async fn role_by_name(&self, name: &str) -> Result<role::Model, AuthError> {
        find_role_by_name(&self.db, name)
            .await?
            .ok_or_else(|| AuthError::UnknownRole(name.to_string()))
    }

    /// Create a user with an Argon2-hashed password.
    pub async fn create_user(&self, new: NewUser) -> Result<user::Model, AuthError> {
        let password_hash = Self::hash_password(&new.password)?;
        let now = Utc::now().naive_utc();
        let model = user::ActiveModel {
            id: Set(Uuid::now_v7()),
            username: Set(new.username),
            email: Set(new.email),
            password_hash: Set(password_hash),
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            phone: Set(new.phone),
            profile_picture: Set(None),
            role_id: Set(new.role_id),
            is_active: Set(new.is_active),
            is_staff: Set(new.is_staff),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;
        Ok(model)
    }

    pub async fn count_users(&self) -> Result<u64, AuthError> {
        Ok(user::Entity::find().count(&self.db).await?)
    }

    /// Hash a plaintext password with Argon2id + a random salt.
    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
        let hash = PasswordHash::new(stored_hash).map_err(|e| AuthError::Hash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    }
}

pub async fn find_role_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<role::Model>, sea_orm::DbErr> {
    role::Entity::find()
        .filter(role::Column::Name.eq(name))
        .one(db)
        .await
}
