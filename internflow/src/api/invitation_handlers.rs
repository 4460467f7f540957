use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    entity::{internship, role::RoleName, teacher_invitation},
    workflow::{self, Decision},
};

use super::{
    AppState, ApiErr, JsonBody,
    dto::{InvitationResponse, InviteRequest, MessageWithData, RespondRequest},
    internship_handlers::load_users,
    jwt::CurrentUser,
    policy::require_role,
};

async fn present(
    db: &DatabaseConnection,
    invitations: Vec<teacher_invitation::Model>,
) -> Result<Vec<InvitationResponse>, ApiErr> {
    let users = load_users(
        db,
        invitations.iter().flat_map(|i| [i.student_id, i.teacher_id]),
    )
    .await?;

    let mut internship_ids: Vec<Uuid> = invitations.iter().map(|i| i.internship_id).collect();
    internship_ids.sort();
    internship_ids.dedup();
    let titles: HashMap<Uuid, String> = if internship_ids.is_empty() {
        Default::default()
    } else {
        internship::Entity::find()
            .filter(internship::Column::Id.is_in(internship_ids))
            .all(db)
            .await
            .map_err(ApiErr::internal)?
            .into_iter()
            .map(|i| (i.id, i.title))
            .collect()
    };

    Ok(invitations
        .into_iter()
        .map(|inv| {
            let title = titles.get(&inv.internship_id).cloned();
            let student = users.get(&inv.student_id);
            let teacher = users.get(&inv.teacher_id);
            InvitationResponse::new(inv, title, student, teacher)
        })
        .collect())
}

async fn present_one(
    db: &DatabaseConnection,
    invitation: teacher_invitation::Model,
) -> Result<InvitationResponse, ApiErr> {
    present(db, vec![invitation])
        .await?
        .pop()
        .ok_or_else(|| ApiErr::internal("invitation vanished while presenting"))
}

pub async fn send_invitation(
    caller: CurrentUser,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<InviteRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>), ApiErr> {
    require_role(&caller, RoleName::Student, "Only students can send invitations.")?;

    let invitation = workflow::invite_teacher(
        &state.db,
        caller.id(),
        body.internship,
        body.teacher,
        body.message,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(present_one(&state.db, invitation).await?),
    ))
}

/// Invitations the caller has sent, newest first.
pub async fn student_invitations(
    caller: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<InvitationResponse>>, ApiErr> {
    let invitations = teacher_invitation::Entity::find()
        .filter(teacher_invitation::Column::StudentId.eq(caller.id()))
        .order_by_desc(teacher_invitation::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(present(&state.db, invitations).await?))
}

pub async fn teacher_invitations(
    caller: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<InvitationResponse>>, ApiErr> {
    require_role(
        &caller,
        RoleName::Teacher,
        "Only teachers can view received invitations.",
    )?;

    let invitations = teacher_invitation::Entity::find()
        .filter(teacher_invitation::Column::TeacherId.eq(caller.id()))
        .order_by_desc(teacher_invitation::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(present(&state.db, invitations).await?))
}

/// `{"status": 1}` accepts, `{"status": 2}` declines.
pub async fn respond_to_invitation(
    caller: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<RespondRequest>,
) -> Result<Json<MessageWithData<InvitationResponse>>, ApiErr> {
    require_role(
        &caller,
        RoleName::Teacher,
        "Only teachers can respond to invitations.",
    )?;

    let decision = Decision::from_input(body.status.as_ref());
    let outcome = workflow::respond_to_invitation(&state.db, id, caller.id(), decision).await?;

    let message = if outcome.internship.is_some() {
        "Invitation accepted. You are now the supervisor of this internship."
    } else {
        "Invitation rejected."
    };
    Ok(Json(MessageWithData::new(
        message,
        present_one(&state.db, outcome.invitation).await?,
    )))
}

#[cfg(test)]
mod tests {
    use crate::entity::{
        internship::{self, InternshipStatus},
        role::RoleName,
        teacher_invitation::{self, InvitationStatus},
    };
    use crate::test_support::*;
    use axum::http::{Method, StatusCode};
    use sea_orm::EntityTrait;
    use serde_json::json;

    #[tokio::test]
    async fn full_supervision_scenario() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let amina = insert_user(&db, "amina", Some(RoleName::Student)).await;
        let t1 = insert_user(&db, "prof_t1", Some(RoleName::Teacher)).await;
        let t2 = insert_user(&db, "prof_t2", Some(RoleName::Teacher)).await;
        let i = insert_internship(&db, amina.id).await;

        let state = make_state(db.clone(), media.path());
        let student = bearer(&state, &amina);
        let teacher1 = bearer(&state, &t1);
        let teacher2 = bearer(&state, &t2);
        let app = router(state);

        let mut invitations = Vec::new();
        for teacher in [&t1, &t2] {
            let (status, body) = call(
                app.clone(),
                json_request(
                    Method::POST,
                    "/internship/invite/",
                    Some(&student),
                    json!({"internship": i.id, "teacher": teacher.id, "message": "Would you supervise?"}),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            assert_eq!(body["status"], 0);
            assert_eq!(body["internship_title"], "Fleet telemetry");
            invitations.push(body["id"].as_str().unwrap().to_string());
        }

        let (status, body) = call(
            app.clone(),
            request(Method::GET, "/internship/teacher/invitations", Some(&teacher1)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = call(
            app.clone(),
            json_request(
                Method::PATCH,
                &format!("/internship/invitation/{}/respond/", invitations[0]),
                Some(&teacher1),
                json!({"status": 1}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], 1);

        let stored = internship::Entity::find_by_id(i.id).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.status, InternshipStatus::Approved);
        assert_eq!(stored.teacher_id, Some(t1.id));

        let (status, body) = call(
            app.clone(),
            json_request(
                Method::PATCH,
                &format!("/internship/invitation/{}/respond", invitations[1]),
                Some(&teacher2),
                json!({"status": "1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "This internship already has an assigned teacher.");

        let (status, _) = call(
            app.clone(),
            json_request(
                Method::PATCH,
                &format!("/internship/invitation/{}/respond", invitations[1]),
                Some(&teacher2),
                json!({"status": 2}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            app,
            request(Method::GET, "/internship/invitations", Some(&student)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let statuses: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|inv| inv["status"].as_i64().unwrap())
            .collect();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.contains(&1) && statuses.contains(&2));

        let stored = internship::Entity::find_by_id(i.id).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.teacher_id, Some(t1.id));
    }

    #[tokio::test]
    async fn duplicate_invitation_is_bad_request() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let amina = insert_user(&db, "amina", Some(RoleName::Student)).await;
        let t1 = insert_user(&db, "prof_t1", Some(RoleName::Teacher)).await;
        let i = insert_internship(&db, amina.id).await;
        let state = make_state(db, media.path());
        let auth = bearer(&state, &amina);
        let app = router(state);
        let body = json!({"internship": i.id, "teacher": t1.id});

        let (status, _) = call(
            app.clone(),
            json_request(Method::POST, "/internship/invite", Some(&auth), body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            app,
            json_request(Method::POST, "/internship/invite", Some(&auth), body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "An invitation has already been sent to this teacher."
        );
    }

    #[tokio::test]
    async fn invite_checks_ownership_and_target_role() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let amina = insert_user(&db, "amina", Some(RoleName::Student)).await;
        let karim = insert_user(&db, "karim", Some(RoleName::Student)).await;
        let t1 = insert_user(&db, "prof_t1", Some(RoleName::Teacher)).await;
        let i = insert_internship(&db, amina.id).await;
        let state = make_state(db, media.path());
        let owner = bearer(&state, &amina);
        let other = bearer(&state, &karim);
        let teacher = bearer(&state, &t1);
        let app = router(state);

        let (status, _) = call(
            app.clone(),
            json_request(
                Method::POST,
                "/internship/invite",
                Some(&other),
                json!({"internship": i.id, "teacher": t1.id}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            app.clone(),
            json_request(
                Method::POST,
                "/internship/invite",
                Some(&owner),
                json!({"internship": i.id, "teacher": karim.id}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["teacher"].is_array());

        let (status, _) = call(
            app,
            json_request(
                Method::POST,
                "/internship/invite",
                Some(&teacher),
                json!({"internship": i.id, "teacher": t1.id}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn respond_validates_status_and_invitee() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let amina = insert_user(&db, "amina", Some(RoleName::Student)).await;
        let t1 = insert_user(&db, "prof_t1", Some(RoleName::Teacher)).await;
        let t2 = insert_user(&db, "prof_t2", Some(RoleName::Teacher)).await;
        let i = insert_internship(&db, amina.id).await;
        let inv = crate::workflow::invite_teacher(&db, amina.id, i.id, t1.id, String::new())
            .await
            .unwrap();
        let state = make_state(db.clone(), media.path());
        let invitee = bearer(&state, &t1);
        let outsider = bearer(&state, &t2);
        let student = bearer(&state, &amina);
        let app = router(state);
        let uri = format!("/internship/invitation/{}/respond", inv.id);

        for (payload, expected) in [
            (json!({}), "Status is required. Use 1 for Accept, 2 for Reject."),
            (json!({"status": "maybe"}), "Invalid status format. Use 1 for Accept, 2 for Reject."),
            (json!({"status": 7}), "Invalid status. Use 1 for Accept, 2 for Reject."),
        ] {
            let (status, body) = call(
                app.clone(),
                json_request(Method::PATCH, &uri, Some(&invitee), payload),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], expected);
        }

        let (status, _) = call(
            app.clone(),
            json_request(Method::PATCH, &uri, Some(&outsider), json!({"status": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            app,
            json_request(Method::PATCH, &uri, Some(&student), json!({"status": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let stored = teacher_invitation::Entity::find_by_id(inv.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, InvitationStatus::Pending);
    }

    #[tokio::test]
    async fn malformed_bodies_are_json_bad_requests() {
        let db = setup_db().await;
        let media = tempfile::tempdir().unwrap();
        let amina = insert_user(&db, "amina", Some(RoleName::Student)).await;
        let t1 = insert_user(&db, "prof_t1", Some(RoleName::Teacher)).await;
        let i = insert_internship(&db, amina.id).await;
        let inv = crate::workflow::invite_teacher(&db, amina.id, i.id, t1.id, String::new())
            .await
            .unwrap();
        let state = make_state(db, media.path());
        let student = bearer(&state, &amina);
        let teacher = bearer(&state, &t1);
        let app = router(state);

        let (status, body) = call(
            app.clone(),
            json_request(
                Method::POST,
                "/internship/invite",
                Some(&student),
                json!({"internship": i.id}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("teacher"), "{body}");

        let raw = axum::http::Request::builder()
            .method(Method::PATCH)
            .uri(format!("/internship/invitation/{}/respond", inv.id))
            .header("Authorization", &teacher)
            .header("Content-Type", "application/json")
            .body(axum::body::Body::from("oops"))
            .unwrap();
        let (status, body) = call(app.clone(), raw).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = call(
            app,
            request(Method::POST, "/internship/invite", Some(&student)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
