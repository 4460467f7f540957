//! Fixtures shared by the unit tests: an in-memory store, row builders and
//! request helpers for driving the router.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::{NaiveDate, Utc};
use migration::MigratorTrait as _;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use tower::ServiceExt;
use uuid::Uuid;

use tower_http::normalize_path::NormalizePath;

use crate::api::{
    AppState, app,
    jwt::{self, TokenKind},
};
use crate::auth::{Auth, find_role_by_name};
use crate::storage::MediaStore;
use crate::entity::{
    internship::{self, InternshipStatus},
    role::RoleName,
    user,
};

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Auth::new(db.clone()).ensure_default_roles().await.unwrap();
    db
}

/// Insert an active user whose password is `"pw"`.
pub async fn insert_user(
    db: &DatabaseConnection,
    username: &str,
    role: Option<RoleName>,
) -> user::Model {
    let role_id = match role {
        Some(r) => Some(find_role_by_name(db, r.as_str()).await.unwrap().unwrap().id),
        None => None,
    };
    let now = Utc::now().naive_utc();
    user::ActiveModel {
        id: Set(Uuid::now_v7()),
        username: Set(username.to_string()),
        email: Set(format!("{username}@univ.example")),
        password_hash: Set(Auth::hash_password("pw").unwrap()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        phone: Set(None),
        profile_picture: Set(None),
        role_id: Set(role_id),
        is_active: Set(true),
        is_staff: Set(false),
        last_login_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn insert_internship(db: &DatabaseConnection, student_id: Uuid) -> internship::Model {
    let now = Utc::now().naive_utc();
    internship::ActiveModel {
        id: Set(Uuid::now_v7()),
        student_id: Set(student_id),
        teacher_id: Set(None),
        kind: Set("PFE".to_string()),
        company_name: Set("Acme Robotics".to_string()),
        cahier_de_charges: Set("cahiers_de_charges/cdc.pdf".to_string()),
        status: Set(InternshipStatus::Pending),
        start_date: Set(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()),
        end_date: Set(NaiveDate::from_ymd_opt(2026, 7, 31).unwrap()),
        description: Set(None),
        title: Set("Fleet telemetry".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

// ---------- HTTP ----------

pub const JWT_SECRET: &str = "test-jwt-secret-key-32-chars-pad";
const BOUNDARY: &str = "internflow-test-boundary";

pub fn make_state(db: DatabaseConnection, media_root: &Path) -> AppState {
    AppState {
        auth: Arc::new(Auth::new(db.clone())),
        db,
        jwt_secret: JWT_SECRET.to_string(),
        access_token_minutes: 60,
        refresh_token_days: 1,
        media: MediaStore::new(media_root),
    }
}

pub fn router(state: AppState) -> NormalizePath<Router> {
    app(state, &[])
}

/// `Authorization` header value carrying a fresh access token for `user`.
pub fn bearer(state: &AppState, user: &user::Model) -> String {
    let token = jwt::issue(state, user, None, TokenKind::Access).unwrap();
    format!("Bearer {token}")
}

pub fn request(method: Method, uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// A file part: (field name, file name, content type, bytes).
pub type FilePart<'a> = (&'a str, &'a str, &'a str, &'a [u8]);

pub fn multipart_request(
    uri: &str,
    auth: &str,
    fields: &[(&str, &str)],
    file: Option<FilePart<'_>>,
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, file_name, content_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Authorization", auth)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Send one request and decode the JSON body (`Null` when empty).
pub async fn call(router: NormalizePath<Router>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = router.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
