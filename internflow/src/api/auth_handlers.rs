use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, Set};
use validator::Validate;

use crate::{
    auth::{Auth, AuthError, NewUser},
    entity::{
        role::{self, RoleName},
        user,
    },
    password_policy::{self, UserAttributes},
};

use super::{
    AppState, ApiErr, JsonBody,
    dto::{
        AccessToken, ChangePasswordRequest, LoginRequest, LoginResponse, LoginUser,
        MessageResponse, ProfileResponse, RefreshRequest, RegisterRequest, TokenPair,
        UpdateProfileRequest,
    },
    jwt::{self, CurrentUser, TokenKind},
    user_handlers::{email_taken, username_taken},
};

const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

async fn authenticate(
    state: &AppState,
    body: &LoginRequest,
) -> Result<(user::Model, Option<role::Model>), ApiErr> {
    let user = state
        .auth
        .authenticate(&body.username, &body.password)
        .await
        .map_err(|e| match e {
            AuthError::Db(e) => ApiErr::internal(e),
            other => {
                tracing::info!(username = %body.username, reason = %other, "login refused");
                ApiErr::unauthorized(BAD_CREDENTIALS)
            }
        })?;

    let role = match user.role_id {
        Some(id) => role::Entity::find_by_id(id)
            .one(&state.db)
            .await
            .map_err(ApiErr::internal)?,
        None => None,
    };
    Ok((user, role))
}

fn token_pair(
    state: &AppState,
    user: &user::Model,
    role: Option<&role::Model>,
) -> Result<TokenPair, ApiErr> {
    let role = role.map(|r| r.name.as_str());
    Ok(TokenPair {
        refresh: jwt::issue(state, user, role, TokenKind::Refresh)?,
        access: jwt::issue(state, user, role, TokenKind::Access)?,
    })
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiErr> {
    let (user, role) = authenticate(&state, &body).await?;
    let tokens = token_pair(&state, &user, role.as_ref())?;

    Ok(Json(LoginResponse {
        refresh: tokens.refresh,
        access: tokens.access,
        user: LoginUser {
            id: user.id,
            username: user.username,
            email: user.email,
            role: role.map(|r| r.name),
        },
    }))
}

pub async fn obtain_token_pair(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<TokenPair>, ApiErr> {
    let (user, role) = authenticate(&state, &body).await?;
    Ok(Json(token_pair(&state, &user, role.as_ref())?))
}

pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> Result<Json<AccessToken>, ApiErr> {
    let claims = jwt::verify(&body.refresh, &state.jwt_secret, TokenKind::Refresh)?;

    let (user, role) = user::Entity::find_by_id(claims.sub)
        .find_also_related(role::Entity)
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::unauthorized("User not found"))?;
    if !user.is_active {
        return Err(ApiErr::unauthorized("User is inactive"));
    }

    let access = jwt::issue(
        &state,
        &user,
        role.as_ref().map(|r| r.name.as_str()),
        TokenKind::Access,
    )?;
    Ok(Json(AccessToken { access }))
}

/// Public sign-up. The administrator role cannot be self-assigned.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>), ApiErr> {
    body.validate()?;

    if username_taken(&state.db, &body.username).await? {
        return Err(ApiErr::field(
            "username",
            "A user with that username already exists.",
        ));
    }

    let role = match body.role {
        Some(id) => {
            let role = role::Entity::find_by_id(id)
                .one(&state.db)
                .await
                .map_err(ApiErr::internal)?
                .ok_or_else(|| {
                    ApiErr::field("role", format!("Invalid pk \"{id}\" - object does not exist."))
                })?;
            if role.name == RoleName::Administrator.as_str() {
                return Err(ApiErr::field(
                    "role",
                    "This role cannot be selected at registration.",
                ));
            }
            Some(role)
        }
        None => None,
    };

    let problems = password_policy::check(
        &body.password,
        &UserAttributes {
            username: &body.username,
            email: &body.email,
            first_name: &body.first_name,
            last_name: &body.last_name,
        },
    );
    if !problems.is_empty() {
        return Err(ApiErr::validation([("password".to_string(), problems)].into()));
    }

    let user = state
        .auth
        .create_user(NewUser {
            username: body.username,
            email: body.email,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
            phone: body.phone,
            role_id: role.as_ref().map(|r| r.id),
            is_active: true,
            is_staff: false,
        })
        .await
        .map_err(ApiErr::internal)?;

    tracing::info!(user = %user.id, username = %user.username, "account registered");
    Ok((
        StatusCode::CREATED,
        Json(ProfileResponse::new(user, role.as_ref())),
    ))
}

pub async fn me(caller: CurrentUser) -> Json<ProfileResponse> {
    Json(ProfileResponse::new(caller.user, caller.role.as_ref()))
}

/// Partial profile edit. Password and role are not editable here.
pub async fn update_profile(
    caller: CurrentUser,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiErr> {
    body.validate()?;

    let CurrentUser { user, role } = caller;
    let id = user.id;
    let mut active: user::ActiveModel = user.into();

    if let Some(email) = body.email {
        let email = email.trim().to_lowercase();
        if email_taken(&state.db, &email, Some(id)).await? {
            return Err(ApiErr::field("email", "A user with this email already exists."));
        }
        active.email = Set(email);
    }
    if let Some(first_name) = body.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = body.last_name {
        active.last_name = Set(last_name);
    }
    if let Some(phone) = body.phone {
        active.phone = Set(Some(phone).filter(|p| !p.is_empty()));
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let updated = active.update(&state.db).await.map_err(ApiErr::internal)?;
    Ok(Json(ProfileResponse::new(updated, role.as_ref())))
}

/// Permanently removes the caller's account.
pub async fn delete_account(
    caller: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiErr> {
    let id = caller.id();
    caller
        .user
        .delete(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    tracing::info!(user = %id, "account deleted by owner");
    Ok(Json(MessageResponse::new("Account deleted successfully.")))
}

pub async fn change_password(
    caller: CurrentUser,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiErr> {
    let verified = Auth::verify_password(&body.old_password, &caller.user.password_hash)
        .map_err(ApiErr::internal)?;
    if !verified {
        return Err(ApiErr::field("old_password", "Old password is incorrect."));
    }
    body.validate()?;
    if body.new_password != body.confirm_password {
        return Err(ApiErr::field("confirm_password", "Passwords do not match."));
    }

    let hash = Auth::hash_password(&body.new_password).map_err(ApiErr::internal)?;
    let mut active: user::ActiveModel = caller.user.into();
    active.password_hash = Set(hash);
    active.updated_at = Set(Utc::now().naive_utc());
    active.update(&state.db).await.map_err(ApiErr::internal)?;

    Ok(Json(MessageResponse::new("Password changed successfully.")))
}
