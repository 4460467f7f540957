use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRequest, Request, rejection::JsonRejection},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
};
use sea_orm::DatabaseConnection;
use tower::Layer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::response::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::auth::Auth;
use crate::storage::{self, MediaStore, UploadError};
use crate::workflow::WorkflowError;

pub mod auth_handlers;
pub mod dto;
pub mod form;
pub mod internship_handlers;
pub mod invitation_handlers;
pub mod jwt;
pub mod policy;
pub mod report_handlers;
pub mod user_handlers;

// ---------- shared state ----------

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Auth>,
    pub db: DatabaseConnection,
    pub jwt_secret: String,
    pub access_token_minutes: u64,
    pub refresh_token_days: u64,
    pub media: MediaStore,
}

// ---------- error type ----------

pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// A JSON error response: `{"error": "..."}` with an HTTP status, plus
/// `"fields"` for per-field validation messages.
#[derive(Debug)]
pub struct ApiErr {
    status: StatusCode,
    message: String,
    fields: Option<FieldErrors>,
}

impl ApiErr {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            fields: None,
        }
    }

    /// Logs the cause; the client only sees a generic message.
    pub fn internal(e: impl std::fmt::Display) -> Self {
        tracing::error!(error = %e, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn validation(fields: FieldErrors) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Validation failed".to_string(),
            fields: Some(fields),
        }
    }

    pub fn field(name: &str, msg: impl Into<String>) -> Self {
        Self::validation(BTreeMap::from([(name.to_string(), vec![msg.into()])]))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let body = match self.fields {
            Some(fields) => serde_json::json!({ "error": self.message, "fields": fields }),
            None => serde_json::json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<WorkflowError> for ApiErr {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::InternshipNotFound | WorkflowError::InvitationNotFound => {
                Self::not_found(e.to_string())
            }
            WorkflowError::NotOwner | WorkflowError::NotInvitee => Self::forbidden(e.to_string()),
            WorkflowError::TeacherNotFound | WorkflowError::NotATeacher => {
                Self::field("teacher", e.to_string())
            }
            WorkflowError::Db(e) => Self::internal(e),
            _ => Self::bad_request(e.to_string()),
        }
    }
}

impl From<UploadError> for ApiErr {
    fn from(e: UploadError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiErr {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (name, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(m) => m.to_string(),
                    None => format!("Invalid value ({}).", e.code),
                })
                .collect();
            fields.insert(name.to_string(), messages);
        }
        Self::validation(fields)
    }
}

// ---------- request bodies ----------

/// `axum::Json` whose rejections (bad syntax, missing fields, wrong content
/// type) answer 400 with the usual `{"error": ...}` body.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiErr;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiErr::bad_request(rejection.body_text())),
        }
    }
}

// ---------- router ----------

/// The full service: trailing slashes are trimmed before routing, so
/// `/internship/create/` and `/internship/create` reach the same handler.
pub fn app(state: AppState, cors_allowed_origins: &[String]) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(app_router(state, cors_allowed_origins))
}

pub fn app_router(state: AppState, cors_allowed_origins: &[String]) -> Router {
    let allowed_origins: Vec<HeaderValue> = cors_allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new() // no origins allowed = same-origin only
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    // Uploaded files are downloads, never pages rendered on this origin.
    let media = SetResponseHeaderLayer::overriding(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment"),
    )
    .layer(ServeDir::new(state.media.root()));

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .merge(routes())
        .nest_service("/media", media)
        .layer(DefaultBodyLimit::max(storage::MAX_UPLOAD_BYTES + 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state)
}

fn routes() -> Router<AppState> {
    Router::new()
        // tokens
        .route("/auth/login", post(auth_handlers::login))
        .route("/api/token", post(auth_handlers::obtain_token_pair))
        .route("/api/token/refresh", post(auth_handlers::refresh))
        // self-service account
        .route("/auth/add-user", post(auth_handlers::register))
        .route("/auth/get-user", get(auth_handlers::me))
        .route(
            "/auth/profile/update",
            patch(auth_handlers::update_profile).put(auth_handlers::update_profile),
        )
        .route(
            "/auth/profile/delete",
            axum::routing::delete(auth_handlers::delete_account),
        )
        .route("/auth/password/change", post(auth_handlers::change_password))
        // internships
        .route("/internship/create", post(internship_handlers::create_internship))
        .route("/internship/my-internships", get(internship_handlers::my_internships))
        .route("/internship/{id}", get(internship_handlers::get_internship))
        .route("/internship/teachers", get(internship_handlers::list_teachers))
        .route("/internship/admin/pending", get(internship_handlers::list_pending))
        .route(
            "/internship/admin/{id}/approve",
            patch(internship_handlers::approve_internship),
        )
        .route(
            "/internship/admin/{id}/reject",
            patch(internship_handlers::reject_internship),
        )
        // invitations
        .route("/internship/invite", post(invitation_handlers::send_invitation))
        .route("/internship/invitations", get(invitation_handlers::student_invitations))
        .route(
            "/internship/teacher/invitations",
            get(invitation_handlers::teacher_invitations),
        )
        .route(
            "/internship/invitation/{id}/respond",
            patch(invitation_handlers::respond_to_invitation),
        )
        // administrator
        .route("/administrator/users", get(user_handlers::list_users))
        .route("/administrator/users/create", post(user_handlers::create_user))
        .route("/administrator/users/{id}", get(user_handlers::get_user))
        .route("/administrator/users/{id}/update", patch(user_handlers::update_user))
        .route(
            "/administrator/users/{id}/delete",
            axum::routing::delete(user_handlers::delete_user),
        )
        .route(
            "/administrator/users/{id}/reset-password",
            post(user_handlers::reset_password),
        )
        .route("/administrator/roles", get(user_handlers::list_roles))
        .route("/administrator/stats", get(user_handlers::user_stats))
        // reports
        .route(
            "/student/reports",
            get(report_handlers::list_archived_reports).post(report_handlers::create_report),
        )
}
