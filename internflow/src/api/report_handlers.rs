use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    entity::report,
    storage::{self, REPORTS_DIR},
};

use super::{AppState, ApiErr, FieldErrors, dto::ReportResponse, form::FormData, jwt::CurrentUser};

/// Archived reports, most recently published first.
pub async fn list_archived_reports(
    _caller: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ReportResponse>>, ApiErr> {
    let reports = report::Entity::find()
        .filter(report::Column::IsArchived.eq(true))
        .order_by_desc(report::Column::PublishDate)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(reports.into_iter().map(ReportResponse::from).collect()))
}

/// Multipart upload: `name`, `description`, `is_archived`, `file`.
pub async fn create_report(
    caller: CurrentUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ReportResponse>), ApiErr> {
    let mut form = FormData::read(multipart).await?;
    let mut fields = FieldErrors::new();

    let name = form.text("name").map(str::to_string);
    if name.is_none() {
        fields.insert("name".into(), vec!["This field is required.".to_string()]);
    }
    let file = form.take_file("file");
    match &file {
        None => {
            fields.insert("file".into(), vec!["No file was submitted.".to_string()]);
        }
        Some(f) => {
            if let Err(e) = storage::check_size(f) {
                fields.insert("file".into(), vec![e.to_string()]);
            }
        }
    }

    let (Some(name), Some(file)) = (name, file) else {
        return Err(ApiErr::validation(fields));
    };
    if !fields.is_empty() {
        return Err(ApiErr::validation(fields));
    }

    let file_path = state
        .media
        .save(REPORTS_DIR, &file)
        .await
        .map_err(ApiErr::internal)?;

    let inserted = report::ActiveModel {
        id: Set(Uuid::now_v7()),
        name: Set(name),
        description: Set(form.text("description").unwrap_or_default().to_string()),
        file_path: Set(file_path.clone()),
        is_archived: Set(form.flag("is_archived")),
        added_by: Set(caller.id()),
        publish_date: Set(Some(Utc::now().date_naive())),
    }
    .insert(&state.db)
    .await;
    let created = match inserted {
        Ok(created) => created,
        Err(e) => {
            state.media.discard(&file_path).await;
            return Err(ApiErr::internal(e));
        }
    };

    tracing::info!(report = %created.id, user = %caller.id(), "report uploaded");
    Ok((StatusCode::CREATED, Json(ReportResponse::from(created))))
}
