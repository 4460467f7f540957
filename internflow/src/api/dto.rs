use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sea_orm::ActiveEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::entity::{internship, report, role, soutenance, teacher_invitation, user};

// ---------- token / account requests ----------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Ensure this field has between 1 and 150 characters."))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
    pub role: Option<Uuid>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[validate(length(max = 15, message = "Ensure this field has no more than 15 characters."))]
    pub phone: Option<String>,
}

/// Profile edit. Unknown fields such as `password` or `role` are ignored.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(length(max = 15, message = "Ensure this field has no more than 15 characters."))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub new_password: String,
    pub confirm_password: String,
}

// ---------- administrator requests ----------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 150, message = "Ensure this field has between 1 and 150 characters."))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[validate(length(max = 15, message = "Ensure this field has no more than 15 characters."))]
    pub phone: Option<String>,
    pub role: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(length(max = 15, message = "Ensure this field has no more than 15 characters."))]
    pub phone: Option<String>,
    pub role: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
    pub new_password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub search: Option<String>,
    pub role: Option<Uuid>,
    /// "true", "1" or "yes" select active users; any other value inactive ones.
    pub is_active: Option<String>,
}

// ---------- internship / invitation requests ----------

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub internship: Uuid,
    pub teacher: Uuid,
    #[serde(default)]
    pub message: String,
}

/// `status` is kept raw so that type errors become workflow errors rather
/// than body rejections.
#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub status: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

// ---------- token / account responses ----------

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub refresh: String,
    pub access: String,
    pub user: LoginUser,
}

#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub role: Option<String>,
}

impl ProfileResponse {
    pub fn new(m: user::Model, role: Option<&role::Model>) -> Self {
        Self {
            id: m.id,
            username: m.username,
            email: m.email,
            first_name: m.first_name,
            last_name: m.last_name,
            phone: m.phone,
            profile_picture: m.profile_picture,
            role: role.map(|r| r.name.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// `{"message": ..., "data": ...}` envelope used by mutating admin endpoints.
#[derive(Debug, Serialize)]
pub struct MessageWithData<T> {
    pub message: String,
    pub data: T,
}

impl<T> MessageWithData<T> {
    pub fn new(msg: impl Into<String>, data: T) -> Self {
        Self {
            message: msg.into(),
            data,
        }
    }
}

// ---------- administrator responses ----------

#[derive(Debug, Serialize, Clone)]
pub struct UserListItem {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub role: Option<Uuid>,
    pub role_name: Option<String>,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
}

impl UserListItem {
    pub fn new(m: user::Model, role: Option<&role::Model>) -> Self {
        Self {
            id: m.id,
            username: m.username,
            email: m.email,
            first_name: m.first_name,
            last_name: m.last_name,
            phone: m.phone,
            profile_picture: m.profile_picture,
            role: m.role_id,
            role_name: role.map(|r| r.name.clone()),
            is_active: m.is_active,
            date_joined: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct UserDetail {
    #[serde(flatten)]
    pub summary: UserListItem,
    pub is_staff: bool,
    pub last_login: Option<NaiveDateTime>,
}

impl UserDetail {
    pub fn new(m: user::Model, role: Option<&role::Model>) -> Self {
        let is_staff = m.is_staff;
        let last_login = m.last_login_at;
        Self {
            summary: UserListItem::new(m, role),
            is_staff,
            last_login,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<role::Model> for RoleResponse {
    fn from(m: role::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub total_users: u64,
    pub active_users: u64,
    pub inactive_users: u64,
    pub users_by_role: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

// ---------- internship / invitation responses ----------

#[derive(Debug, Serialize)]
pub struct InternshipResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: Option<String>,
    pub teacher_id: Option<Uuid>,
    pub teacher_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "type_display")]
    pub kind_display: String,
    pub company_name: String,
    pub cahier_de_charges: String,
    pub status: i32,
    pub status_display: &'static str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: Option<String>,
    pub title: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl InternshipResponse {
    pub fn new(
        m: internship::Model,
        student: Option<&user::Model>,
        teacher: Option<&user::Model>,
    ) -> Self {
        Self {
            id: m.id,
            student_id: m.student_id,
            student_name: student.map(user::Model::full_name),
            teacher_id: m.teacher_id,
            teacher_name: teacher.map(user::Model::full_name),
            kind_display: internship::kind_label(&m.kind).to_string(),
            kind: m.kind,
            company_name: m.company_name,
            cahier_de_charges: m.cahier_de_charges,
            status: m.status.to_value(),
            status_display: m.status.label(),
            start_date: m.start_date,
            end_date: m.end_date,
            description: m.description,
            title: m.title,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InternshipDetail {
    #[serde(flatten)]
    pub internship: InternshipResponse,
    pub soutenances: Vec<SoutenanceResponse>,
}

#[derive(Debug, Serialize)]
pub struct SoutenanceResponse {
    pub id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub room: String,
    pub grade: Option<f64>,
    /// User ids of the jury members.
    pub jury: Vec<Uuid>,
}

impl SoutenanceResponse {
    pub fn new(m: soutenance::Model, jury: Vec<Uuid>) -> Self {
        Self {
            id: m.id,
            date: m.date,
            time: m.time,
            room: m.room,
            grade: m.grade,
            jury,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub id: Uuid,
    pub internship: Uuid,
    pub internship_title: Option<String>,
    pub student: Uuid,
    pub student_name: Option<String>,
    pub teacher: Uuid,
    pub teacher_name: Option<String>,
    pub status: i32,
    pub status_display: &'static str,
    pub message: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl InvitationResponse {
    pub fn new(
        m: teacher_invitation::Model,
        internship_title: Option<String>,
        student: Option<&user::Model>,
        teacher: Option<&user::Model>,
    ) -> Self {
        Self {
            id: m.id,
            internship: m.internship_id,
            internship_title,
            student: m.student_id,
            student_name: student.map(user::Model::full_name),
            teacher: m.teacher_id,
            teacher_name: teacher.map(user::Model::full_name),
            status: m.status.to_value(),
            status_display: m.status.label(),
            message: m.message,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeacherListItem {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role_name: Option<String>,
    pub profile_picture: Option<String>,
}

impl TeacherListItem {
    pub fn new(m: user::Model, role_name: &str) -> Self {
        Self {
            full_name: m.full_name(),
            id: m.id,
            username: m.username,
            email: m.email,
            first_name: m.first_name,
            last_name: m.last_name,
            role_name: Some(role_name.to_string()),
            profile_picture: m.profile_picture,
        }
    }
}

// ---------- reports ----------

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub file_path: String,
    pub is_archived: bool,
    pub added_by: Uuid,
    pub publish_date: Option<NaiveDate>,
}

impl From<report::Model> for ReportResponse {
    fn from(m: report::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            file_path: m.file_path,
            is_archived: m.is_archived,
            added_by: m.added_by,
            publish_date: m.publish_date,
        }
    }
}
