use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
    sea_query::{Expr, Func, LikeExpr},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{Auth, NewUser},
    entity::{
        role::{self, RoleName},
        user,
    },
    password_policy::{self, UserAttributes},
};

use super::{
    AppState, ApiErr, JsonBody, FieldErrors,
    dto::{
        CreateUserRequest, ListUsersQuery, MessageResponse, MessageWithData, PaginatedResponse,
        ResetPasswordRequest, RoleResponse, UpdateUserRequest, UserDetail, UserListItem,
        UserStats,
    },
    jwt::CurrentUser,
    policy::require_role,
};

const ADMIN_ONLY: &str = "Only administrators can manage users.";

// ---------- shared lookups ----------

fn lower(col: user::Column) -> Expr {
    Expr::expr(Func::lower(Expr::col((user::Entity, col))))
}

/// Case-insensitive username lookup.
pub(super) async fn username_taken(db: &DatabaseConnection, username: &str) -> Result<bool, ApiErr> {
    let n = user::Entity::find()
        .filter(lower(user::Column::Username).eq(username.to_lowercase()))
        .count(db)
        .await
        .map_err(ApiErr::internal)?;
    Ok(n > 0)
}

/// Case-insensitive email lookup, ignoring `excluding` (the user being edited).
pub(super) async fn email_taken(
    db: &DatabaseConnection,
    email: &str,
    excluding: Option<Uuid>,
) -> Result<bool, ApiErr> {
    let mut query = user::Entity::find().filter(lower(user::Column::Email).eq(email.to_lowercase()));
    if let Some(id) = excluding {
        query = query.filter(user::Column::Id.ne(id));
    }
    let n = query.count(db).await.map_err(ApiErr::internal)?;
    Ok(n > 0)
}

async fn find_user(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<(user::Model, Option<role::Model>), ApiErr> {
    user::Entity::find_by_id(id)
        .find_also_related(role::Entity)
        .one(db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("User not found"))
}

async fn find_role(db: &DatabaseConnection, id: Uuid) -> Result<role::Model, ApiErr> {
    role::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::field("role", format!("Invalid pk \"{id}\" - object does not exist.")))
}

fn valid_username(username: &str) -> bool {
    !username.is_empty() && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `%term%` with the LIKE wildcards in `term` escaped by `\\`.
fn contains_pattern(term: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape('\\')
}

fn truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

// ---------- handlers ----------

pub async fn list_users(
    caller: CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ListUsersQuery>,
) -> Result<Json<PaginatedResponse<UserListItem>>, ApiErr> {
    require_role(&caller, RoleName::Administrator, ADMIN_ONLY)?;

    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);

    let mut query = user::Entity::find().find_also_related(role::Entity);

    if let Some(role_id) = params.role {
        query = query.filter(user::Column::RoleId.eq(role_id));
    }
    if let Some(ref is_active) = params.is_active {
        query = query.filter(user::Column::IsActive.eq(truthy(is_active)));
    }
    if let Some(ref search) = params.search
        && !search.trim().is_empty()
    {
        let pattern = contains_pattern(&search.trim().to_lowercase());
        query = query.filter(
            Condition::any()
                .add(lower(user::Column::Username).like(pattern.clone()))
                .add(lower(user::Column::Email).like(pattern.clone()))
                .add(lower(user::Column::FirstName).like(pattern.clone()))
                .add(lower(user::Column::LastName).like(pattern)),
        );
    }

    let paginator = query
        .order_by_desc(user::Column::CreatedAt)
        .paginate(&state.db, page_size);

    let total = paginator.num_items().await.map_err(ApiErr::internal)?;
    let users = paginator
        .fetch_page(page - 1)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(PaginatedResponse {
        data: users
            .into_iter()
            .map(|(u, r)| UserListItem::new(u, r.as_ref()))
            .collect(),
        total,
        page,
        page_size,
    }))
}

pub async fn create_user(
    caller: CurrentUser,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<MessageWithData<UserDetail>>), ApiErr> {
    require_role(&caller, RoleName::Administrator, ADMIN_ONLY)?;
    body.validate()?;

    let username = body.username.trim().to_lowercase();
    let email = body.email.trim().to_lowercase();

    let mut fields = FieldErrors::new();
    if !valid_username(&username) {
        fields.entry("username".into()).or_default().push(
            "Username can only contain letters, numbers, and underscores.".to_string(),
        );
    } else if username_taken(&state.db, &username).await? {
        fields
            .entry("username".into())
            .or_default()
            .push("A user with this username already exists.".to_string());
    }
    if email_taken(&state.db, &email, None).await? {
        fields
            .entry("email".into())
            .or_default()
            .push("A user with this email already exists.".to_string());
    }
    let problems = password_policy::check(
        &body.password,
        &UserAttributes {
            username: &username,
            email: &email,
            first_name: &body.first_name,
            last_name: &body.last_name,
        },
    );
    if !problems.is_empty() {
        fields.insert("password".into(), problems);
    }
    if body.password != body.password_confirm {
        fields
            .entry("password_confirm".into())
            .or_default()
            .push("Passwords do not match.".to_string());
    }
    if !fields.is_empty() {
        return Err(ApiErr::validation(fields));
    }

    let role = match body.role {
        Some(id) => Some(find_role(&state.db, id).await?),
        None => None,
    };

    let user = state
        .auth
        .create_user(NewUser {
            username,
            email,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
            phone: body.phone.filter(|p| !p.is_empty()),
            role_id: role.as_ref().map(|r| r.id),
            is_active: body.is_active.unwrap_or(true),
            is_staff: false,
        })
        .await
        .map_err(ApiErr::internal)?;

    tracing::info!(admin = %caller.id(), user = %user.id, "user created");
    Ok((
        StatusCode::CREATED,
        Json(MessageWithData::new(
            "User created successfully.",
            UserDetail::new(user, role.as_ref()),
        )),
    ))
}

pub async fn get_user(
    caller: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDetail>, ApiErr> {
    require_role(&caller, RoleName::Administrator, ADMIN_ONLY)?;
    let (user, role) = find_user(&state.db, id).await?;
    Ok(Json(UserDetail::new(user, role.as_ref())))
}

pub async fn update_user(
    caller: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> Result<Json<MessageWithData<UserDetail>>, ApiErr> {
    require_role(&caller, RoleName::Administrator, ADMIN_ONLY)?;
    body.validate()?;

    let (user, mut role) = find_user(&state.db, id).await?;

    if body.is_active == Some(false) && caller.id() == id {
        return Err(ApiErr::bad_request("You cannot deactivate your own account."));
    }

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
    if let Some(role_id) = body.role {
        let new_role = find_role(&state.db, role_id).await?;
        active.role_id = Set(Some(new_role.id));
        role = Some(new_role);
    }
    if let Some(is_active) = body.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let updated = active.update(&state.db).await.map_err(ApiErr::internal)?;

    tracing::info!(admin = %caller.id(), user = %id, "user updated");
    Ok(Json(MessageWithData::new(
        "User updated successfully.",
        UserDetail::new(updated, role.as_ref()),
    )))
}

/// Soft delete: the account is deactivated, never removed.
pub async fn delete_user(
    caller: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiErr> {
    require_role(&caller, RoleName::Administrator, ADMIN_ONLY)?;
    let (user, _) = find_user(&state.db, id).await?;

    if caller.id() == id {
        return Err(ApiErr::bad_request("You cannot delete your own account."));
    }

    let mut active: user::ActiveModel = user.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().naive_utc());
    active.update(&state.db).await.map_err(ApiErr::internal)?;

    tracing::info!(admin = %caller.id(), user = %id, "user deactivated");
    Ok(Json(MessageResponse::new("User deactivated successfully.")))
}

pub async fn reset_password(
    caller: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiErr> {
    require_role(&caller, RoleName::Administrator, ADMIN_ONLY)?;
    let (user, _) = find_user(&state.db, id).await?;

    let mut fields = FieldErrors::new();
    let problems = password_policy::check(
        &body.new_password,
        &UserAttributes {
            username: &user.username,
            email: &user.email,
            first_name: &user.first_name,
            last_name: &user.last_name,
        },
    );
    if !problems.is_empty() {
        fields.insert("new_password".into(), problems);
    }
    if body.new_password != body.new_password_confirm {
        fields.insert(
            "new_password_confirm".into(),
            vec!["Passwords do not match.".to_string()],
        );
    }
    if !fields.is_empty() {
        return Err(ApiErr::validation(fields));
    }

    let hash = Auth::hash_password(&body.new_password).map_err(ApiErr::internal)?;
    let mut active: user::ActiveModel = user.into();
    active.password_hash = Set(hash);
    active.updated_at = Set(Utc::now().naive_utc());
    active.update(&state.db).await.map_err(ApiErr::internal)?;

    tracing::info!(admin = %caller.id(), user = %id, "password reset");
    Ok(Json(MessageResponse::new("Password reset successfully.")))
}

pub async fn list_roles(
    caller: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<RoleResponse>>, ApiErr> {
    require_role(&caller, RoleName::Administrator, ADMIN_ONLY)?;
    let roles = role::Entity::find()
        .order_by_asc(role::Column::Name)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// Head counts. Every role is listed, including those with no users.
pub async fn user_stats(
    caller: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<UserStats>, ApiErr> {
    require_role(&caller, RoleName::Administrator, ADMIN_ONLY)?;

    let total_users = user::Entity::find()
        .count(&state.db)
        .await
        .map_err(ApiErr::internal)?;
    let active_users = user::Entity::find()
        .filter(user::Column::IsActive.eq(true))
        .count(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    let mut users_by_role = BTreeMap::new();
    for r in role::Entity::find()
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?
    {
        let n = user::Entity::find()
            .filter(user::Column::RoleId.eq(r.id))
            .count(&state.db)
            .await
            .map_err(ApiErr::internal)?;
        users_by_role.insert(r.name, n);
    }

    Ok(Json(UserStats {
        total_users,
        active_users,
        inactive_users: total_users - active_users,
        users_by_role,
    }))
}

#[cfg(test)]
mod tests {
    use crate::auth::find_role_by_name;
    use crate::entity::{role::RoleName, user};
    use crate::test_support::*;
    use axum::http::{Method, StatusCode};
    use sea_orm::EntityTrait;
    use serde_json::json;

    #[tokio::test]
    async fn non_admin_is_forbidden() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let teacher = insert_user(&db, "prof_t1", Some(RoleName::Teacher)).await;
        let state = make_state(db, media.path());
        let auth = bearer(&state, &teacher);

        let (status, body) = call(
            router(state),
            request(Method::GET, "/administrator/users", Some(&auth)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Only administrators can manage users.");
    }

    #[tokio::test]
    async fn list_filters_and_searches() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let admin = insert_user(&db, "root_admin", Some(RoleName::Administrator)).await;
        insert_user(&db, "amina", Some(RoleName::Student)).await;
        insert_user(&db, "karim", Some(RoleName::Student)).await;
        insert_user(&db, "prof_t1", Some(RoleName::Teacher)).await;
        let student_role = find_role_by_name(&db, "Student").await.unwrap().unwrap();
        let state = make_state(db, media.path());
        let auth = bearer(&state, &admin);
        let app = router(state);

        let (status, body) = call(
            app.clone(),
            request(
                Method::GET,
                &format!("/administrator/users?role={}", student_role.id),
                Some(&auth),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);

        let (_, body) = call(
            app.clone(),
            request(Method::GET, "/administrator/users?search=AMI", Some(&auth)),
        )
        .await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["username"], "amina");
        assert_eq!(body["data"][0]["role_name"], "Student");

        let (_, body) = call(
            app.clone(),
            request(Method::GET, "/administrator/users?search=_", Some(&auth)),
        )
        .await;
        let mut names: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["username"].as_str().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, ["prof_t1", "root_admin"]);

        let (_, body) = call(
            app.clone(),
            request(Method::GET, "/administrator/users?search=%25", Some(&auth)),
        )
        .await;
        assert_eq!(body["total"], 0);

        let (_, body) = call(
            app.clone(),
            request(Method::GET, "/administrator/users?is_active=no", Some(&auth)),
        )
        .await;
        assert_eq!(body["total"], 0);

        let (_, body) = call(
            app,
            request(Method::GET, "/administrator/users?page=2&page_size=3", Some(&auth)),
        )
        .await;
        assert_eq!(body["total"], 4);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_normalizes_and_validates() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let admin = insert_user(&db, "root_admin", Some(RoleName::Administrator)).await;
        let state = make_state(db.clone(), media.path());
        let auth = bearer(&state, &admin);
        let app = router(state);

        let (status, body) = call(
            app.clone(),
            json_request(
                Method::POST,
                "/administrator/users/create",
                Some(&auth),
                json!({
                    "username": "bad name!",
                    "email": "ROOT_ADMIN@univ.example",
                    "password": "password",
                    "password_confirm": "other",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        for field in ["username", "email", "password", "password_confirm"] {
            assert!(body["fields"][field].is_array(), "missing {field}: {body}");
        }

        let (status, body) = call(
            app,
            json_request(
                Method::POST,
                "/administrator/users/create",
                Some(&auth),
                json!({
                    "username": "Nadia_K",
                    "email": "Nadia.K@Univ.Example",
                    "password": "Blue-Harbor-42",
                    "password_confirm": "Blue-Harbor-42",
                    "first_name": "Nadia",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User created successfully.");
        assert_eq!(body["data"]["username"], "nadia_k");
        assert_eq!(body["data"]["email"], "nadia.k@univ.example");
        assert_eq!(body["data"]["is_active"], true);
    }

    #[tokio::test]
    async fn admin_cannot_deactivate_or_delete_self() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let admin = insert_user(&db, "root_admin", Some(RoleName::Administrator)).await;
        let state = make_state(db.clone(), media.path());
        let auth = bearer(&state, &admin);
        let app = router(state);

        let (status, _) = call(
            app.clone(),
            json_request(
                Method::PATCH,
                &format!("/administrator/users/{}/update", admin.id),
                Some(&auth),
                json!({"is_active": false}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            app,
            request(
                Method::DELETE,
                &format!("/administrator/users/{}/delete", admin.id),
                Some(&auth),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let stored = user::Entity::find_by_id(admin.id).one(&db).await.unwrap().unwrap();
        assert!(stored.is_active);
    }

    #[tokio::test]
    async fn delete_is_soft() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let admin = insert_user(&db, "root_admin", Some(RoleName::Administrator)).await;
        let karim = insert_user(&db, "karim", Some(RoleName::Student)).await;
        let state = make_state(db.clone(), media.path());
        let auth = bearer(&state, &admin);

        let (status, _) = call(
            router(state),
            request(
                Method::DELETE,
                &format!("/administrator/users/{}/delete", karim.id),
                Some(&auth),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let stored = user::Entity::find_by_id(karim.id).one(&db).await.unwrap().unwrap();
        assert!(!stored.is_active);
    }

    #[tokio::test]
    async fn update_changes_role_and_rejects_taken_email() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let admin = insert_user(&db, "root_admin", Some(RoleName::Administrator)).await;
        let karim = insert_user(&db, "karim", Some(RoleName::Student)).await;
        let teacher_role = find_role_by_name(&db, "Teacher").await.unwrap().unwrap();
        let state = make_state(db, media.path());
        let auth = bearer(&state, &admin);
        let app = router(state);
        let uri = format!("/administrator/users/{}/update", karim.id);

        let (status, body) = call(
            app.clone(),
            json_request(Method::PATCH, &uri, Some(&auth), json!({"role": teacher_role.id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["role_name"], "Teacher");

        let (status, body) = call(
            app,
            json_request(
                Method::PATCH,
                &uri,
                Some(&auth),
                json!({"email": "Root_Admin@univ.example"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["email"].is_array());
    }

    #[tokio::test]
    async fn reset_password_requires_matching_strong_password() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let admin = insert_user(&db, "root_admin", Some(RoleName::Administrator)).await;
        let karim = insert_user(&db, "karim", Some(RoleName::Student)).await;
        let state = make_state(db, media.path());
        let auth = bearer(&state, &admin);
        let app = router(state);
        let uri = format!("/administrator/users/{}/reset-password", karim.id);

        let (status, _) = call(
            app.clone(),
            json_request(
                Method::POST,
                &uri,
                Some(&auth),
                json!({"new_password": "Blue-Harbor-42", "new_password_confirm": "Blue-Harbor-43"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            app.clone(),
            json_request(
                Method::POST,
                &uri,
                Some(&auth),
                json!({"new_password": "Blue-Harbor-42", "new_password_confirm": "Blue-Harbor-42"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            app,
            json_request(
                Method::POST,
                "/auth/login",
                None,
                json!({"username": "karim", "password": "Blue-Harbor-42"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn stats_list_every_role() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let admin = insert_user(&db, "root_admin", Some(RoleName::Administrator)).await;
        insert_user(&db, "amina", Some(RoleName::Student)).await;
        insert_user(&db, "loner", None).await;
        let state = make_state(db, media.path());
        let auth = bearer(&state, &admin);

        let (status, body) = call(
            router(state),
            request(Method::GET, "/administrator/stats", Some(&auth)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_users"], 3);
        assert_eq!(body["active_users"], 3);
        assert_eq!(body["inactive_users"], 0);
        assert_eq!(body["users_by_role"]["Student"], 1);
        assert_eq!(body["users_by_role"]["Administrator"], 1);
        assert_eq!(body["users_by_role"]["Company"], 0);
        assert_eq!(body["users_by_role"]["Teacher"], 0);
    }
}
