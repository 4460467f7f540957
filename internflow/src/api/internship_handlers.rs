use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDate;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::{
    auth::find_role_by_name,
    entity::{internship, jury, role::RoleName, soutenance, user},
    storage::{self, CAHIERS_DIR},
    workflow::{self, NewInternship},
};

use super::{
    AppState, ApiErr, FieldErrors,
    dto::{
        InternshipDetail, InternshipResponse, MessageWithData, RejectRequest, SoutenanceResponse,
        TeacherListItem,
    },
    form::FormData,
    jwt::CurrentUser,
    policy::{can_view_internship, require_role},
};

const ADMIN_ONLY: &str = "Only administrators can review internships.";

/// Load the given users in one query, keyed by id.
pub(super) async fn load_users(
    db: &DatabaseConnection,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, user::Model>, ApiErr> {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await
        .map_err(ApiErr::internal)?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

async fn present(
    db: &DatabaseConnection,
    internships: Vec<internship::Model>,
) -> Result<Vec<InternshipResponse>, ApiErr> {
    let users = load_users(
        db,
        internships
            .iter()
            .flat_map(|i| std::iter::once(i.student_id).chain(i.teacher_id)),
    )
    .await?;

    Ok(internships
        .into_iter()
        .map(|i| {
            let student = users.get(&i.student_id);
            let teacher = i.teacher_id.and_then(|t| users.get(&t));
            InternshipResponse::new(i, student, teacher)
        })
        .collect())
}

async fn present_one(
    db: &DatabaseConnection,
    internship: internship::Model,
) -> Result<InternshipResponse, ApiErr> {
    present(db, vec![internship])
        .await?
        .pop()
        .ok_or_else(|| ApiErr::internal("internship vanished while presenting"))
}

fn parse_date(form: &FormData, name: &str, fields: &mut FieldErrors) -> Option<NaiveDate> {
    let Some(raw) = form.text(name) else {
        fields.insert(name.into(), vec!["This field is required.".to_string()]);
        return None;
    };
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            fields.insert(
                name.into(),
                vec!["Date has wrong format. Use one of these formats instead: YYYY-MM-DD."
                    .to_string()],
            );
            None
        }
    }
}

/// Multipart submission by a student. Any client-supplied status or teacher
/// is ignored; the internship always starts pending.
pub async fn create_internship(
    caller: CurrentUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<InternshipResponse>), ApiErr> {
    require_role(&caller, RoleName::Student, "Only students can create internships.")?;

    let mut form = FormData::read(multipart).await?;
    let mut fields = FieldErrors::new();

    let kind = form.text("type").map(str::to_string);
    if kind.is_none() {
        fields.insert("type".into(), vec!["This field is required.".to_string()]);
    }
    let company_name = form.text("company_name").map(str::to_string);
    if company_name.is_none() {
        fields.insert(
            "company_name".into(),
            vec!["This field is required.".to_string()],
        );
    }
    let start_date = parse_date(&form, "start_date", &mut fields);
    let end_date = parse_date(&form, "end_date", &mut fields);
    if let (Some(start), Some(end)) = (start_date, end_date)
        && start >= end
    {
        fields.insert(
            "end_date".into(),
            vec!["End date must be after start date.".to_string()],
        );
    }

    let upload = form.take_file("cahier_de_charges");
    match &upload {
        None => {
            fields.insert(
                "cahier_de_charges".into(),
                vec!["No file was submitted.".to_string()],
            );
        }
        Some(u) => {
            if let Err(e) = storage::validate_document(u) {
                fields.insert("cahier_de_charges".into(), vec![e.to_string()]);
            }
        }
    }

    let (Some(kind), Some(company_name), Some(start_date), Some(end_date), Some(upload)) =
        (kind, company_name, start_date, end_date, upload)
    else {
        return Err(ApiErr::validation(fields));
    };
    if !fields.is_empty() {
        return Err(ApiErr::validation(fields));
    }

    let cahier_de_charges = state
        .media
        .save(CAHIERS_DIR, &upload)
        .await
        .map_err(ApiErr::internal)?;

    let submitted = workflow::submit_internship(
        &state.db,
        caller.id(),
        NewInternship {
            kind,
            company_name,
            title: form.text("title").unwrap_or("Untitled").to_string(),
            description: form.text("description").map(str::to_string),
            start_date,
            end_date,
            cahier_de_charges: cahier_de_charges.clone(),
        },
    )
    .await;
    let created = match submitted {
        Ok(created) => created,
        Err(e) => {
            state.media.discard(&cahier_de_charges).await;
            return Err(e.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(InternshipResponse::new(created, Some(&caller.user), None)),
    ))
}

/// Internships the caller owns or supervises, newest first.
pub async fn my_internships(
    caller: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<InternshipResponse>>, ApiErr> {
    let internships = internship::Entity::find()
        .filter(
            Condition::any()
                .add(internship::Column::StudentId.eq(caller.id()))
                .add(internship::Column::TeacherId.eq(caller.id())),
        )
        .order_by_desc(internship::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(present(&state.db, internships).await?))
}

pub async fn get_internship(
    caller: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InternshipDetail>, ApiErr> {
    let internship = internship::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("Internship not found"))?;

    if !can_view_internship(&caller, &internship) {
        return Err(ApiErr::forbidden(
            "You do not have permission to view this internship.",
        ));
    }

    let soutenances = soutenance::Entity::find()
        .filter(soutenance::Column::InternshipId.eq(id))
        .order_by_asc(soutenance::Column::Date)
        .order_by_asc(soutenance::Column::Time)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    let mut jury_by_soutenance: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    if !soutenances.is_empty() {
        let members = jury::Entity::find()
            .filter(jury::Column::SoutenanceId.is_in(soutenances.iter().map(|s| s.id)))
            .all(&state.db)
            .await
            .map_err(ApiErr::internal)?;
        for m in members {
            jury_by_soutenance
                .entry(m.soutenance_id)
                .or_default()
                .push(m.member_id);
        }
    }

    let soutenances = soutenances
        .into_iter()
        .map(|s| {
            let jury = jury_by_soutenance.remove(&s.id).unwrap_or_default();
            SoutenanceResponse::new(s, jury)
        })
        .collect();

    Ok(Json(InternshipDetail {
        internship: present_one(&state.db, internship).await?,
        soutenances,
    }))
}

/// Every user holding the Teacher role, the same set `invite` accepts.
pub async fn list_teachers(
    _caller: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<TeacherListItem>>, ApiErr> {
    let teacher_role = find_role_by_name(&state.db, RoleName::Teacher.as_str())
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("Teacher role not found."))?;

    let teachers = user::Entity::find()
        .filter(user::Column::RoleId.eq(teacher_role.id))
        .order_by_asc(user::Column::LastName)
        .order_by_asc(user::Column::FirstName)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(
        teachers
            .into_iter()
            .map(|t| TeacherListItem::new(t, &teacher_role.name))
            .collect(),
    ))
}

pub async fn list_pending(
    caller: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<InternshipResponse>>, ApiErr> {
    require_role(&caller, RoleName::Administrator, ADMIN_ONLY)?;

    let internships = internship::Entity::find()
        .filter(internship::Column::Status.eq(internship::InternshipStatus::Pending))
        .order_by_desc(internship::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(present(&state.db, internships).await?))
}

pub async fn approve_internship(
    caller: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageWithData<InternshipResponse>>, ApiErr> {
    require_role(&caller, RoleName::Administrator, ADMIN_ONLY)?;

    let updated = workflow::approve_internship(&state.db, id).await?;
    Ok(Json(MessageWithData::new(
        "Internship approved successfully.",
        present_one(&state.db, updated).await?,
    )))
}

/// The body is optional; when present it may carry a `reason`.
pub async fn reject_internship(
    caller: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<MessageWithData<InternshipResponse>>, ApiErr> {
    require_role(&caller, RoleName::Administrator, ADMIN_ONLY)?;

    let request: RejectRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RejectRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiErr::bad_request(e.to_string()))?
    };

    let updated =
        workflow::reject_internship(&state.db, id, request.reason.as_deref()).await?;
    Ok(Json(MessageWithData::new(
        "Internship rejected.",
        present_one(&state.db, updated).await?,
    )))
}
