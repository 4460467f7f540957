//! Internship and invitation state machines.
//!
//! Internship: `Pending → Approved | Rejected`, then `Approved → InProgress →
//! Completed` outside the API. Invitation: `Pending → Accepted | Rejected`.
//! Accepting an invitation also assigns the teacher and approves the
//! internship, in one transaction.

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, Set, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::entity::{
    internship::{self, InternshipStatus},
    role::RoleName,
    teacher_invitation::{self, InvitationStatus},
    user,
};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Internship not found")]
    InternshipNotFound,
    #[error("Invitation not found")]
    InvitationNotFound,
    #[error("Only pending internships can be {0}.")]
    InternshipNotPending(&'static str),
    #[error("You can only send invitations for your own internships.")]
    NotOwner,
    #[error("Teacher not found.")]
    TeacherNotFound,
    #[error("Selected user is not a teacher.")]
    NotATeacher,
    #[error("An invitation has already been sent to this teacher.")]
    DuplicateInvitation,
    #[error("You can only respond to invitations sent to you.")]
    NotInvitee,
    #[error("This invitation has already been responded to.")]
    AlreadyResponded,
    #[error("Status is required. Use 1 for Accept, 2 for Reject.")]
    MissingDecision,
    #[error("Invalid status format. Use 1 for Accept, 2 for Reject.")]
    MalformedDecision,
    #[error("Invalid status. Use 1 for Accept, 2 for Reject.")]
    InvalidDecision,
    #[error("This internship already has an assigned teacher.")]
    TeacherAlreadyAssigned,
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

impl InternshipStatus {
    pub fn approve(self) -> Result<Self, WorkflowError> {
        match self {
            Self::Pending => Ok(Self::Approved),
            _ => Err(WorkflowError::InternshipNotPending("approved")),
        }
    }

    pub fn reject(self) -> Result<Self, WorkflowError> {
        match self {
            Self::Pending => Ok(Self::Rejected),
            _ => Err(WorkflowError::InternshipNotPending("rejected")),
        }
    }
}

/// A teacher's answer to an invitation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    /// Parse the `status` field of a respond request: `1` accepts, `2`
    /// rejects. Integers and numeric strings are accepted.
    pub fn from_input(value: Option<&serde_json::Value>) -> Result<Self, WorkflowError> {
        let code = match value {
            None | Some(serde_json::Value::Null) => return Err(WorkflowError::MissingDecision),
            Some(serde_json::Value::Number(n)) => {
                n.as_i64().ok_or(WorkflowError::MalformedDecision)?
            }
            Some(serde_json::Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| WorkflowError::MalformedDecision)?,
            Some(_) => return Err(WorkflowError::MalformedDecision),
        };
        match code {
            1 => Ok(Self::Accept),
            2 => Ok(Self::Reject),
            _ => Err(WorkflowError::InvalidDecision),
        }
    }
}

impl InvitationStatus {
    pub fn respond(self, decision: Decision) -> Result<Self, WorkflowError> {
        if self != Self::Pending {
            return Err(WorkflowError::AlreadyResponded);
        }
        Ok(match decision {
            Decision::Accept => Self::Accepted,
            Decision::Reject => Self::Rejected,
        })
    }
}

// ---------- internship ----------

#[derive(Debug, Clone)]
pub struct NewInternship {
    pub kind: String,
    pub company_name: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cahier_de_charges: String,
}

/// Record a student's internship. Always starts `Pending` with no teacher.
pub async fn submit_internship(
    db: &DatabaseConnection,
    student_id: Uuid,
    new: NewInternship,
) -> Result<internship::Model, WorkflowError> {
    let now = Utc::now().naive_utc();
    let model = internship::ActiveModel {
        id: Set(Uuid::now_v7()),
        student_id: Set(student_id),
        teacher_id: Set(None),
        kind: Set(new.kind),
        company_name: Set(new.company_name),
        cahier_de_charges: Set(new.cahier_de_charges),
        status: Set(InternshipStatus::Pending),
        start_date: Set(new.start_date),
        end_date: Set(new.end_date),
        description: Set(new.description),
        title: Set(new.title),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    tracing::info!(internship = %model.id, student = %student_id, "internship submitted");
    Ok(model)
}

pub async fn approve_internship(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<internship::Model, WorkflowError> {
    let current = find_internship(db, id).await?;
    let next = current.status.approve()?;
    let updated = set_internship_status(db, current, next).await?;
    tracing::info!(internship = %id, "internship approved");
    Ok(updated)
}

/// Reject a pending internship. The reason is logged, not stored.
pub async fn reject_internship(
    db: &DatabaseConnection,
    id: Uuid,
    reason: Option<&str>,
) -> Result<internship::Model, WorkflowError> {
    let current = find_internship(db, id).await?;
    let next = current.status.reject()?;
    let updated = set_internship_status(db, current, next).await?;
    tracing::info!(internship = %id, reason = reason.unwrap_or(""), "internship rejected");
    Ok(updated)
}

async fn find_internship(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<internship::Model, WorkflowError> {
    internship::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(WorkflowError::InternshipNotFound)
}

async fn set_internship_status(
    db: &DatabaseConnection,
    current: internship::Model,
    status: InternshipStatus,
) -> Result<internship::Model, WorkflowError> {
    let mut active: internship::ActiveModel = current.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

// ---------- invitations ----------

/// Invite a teacher to supervise one of the student's internships.
pub async fn invite_teacher(
    db: &DatabaseConnection,
    student_id: Uuid,
    internship_id: Uuid,
    teacher_id: Uuid,
    message: String,
) -> Result<teacher_invitation::Model, WorkflowError> {
    let internship = find_internship(db, internship_id).await?;
    if internship.student_id != student_id {
        return Err(WorkflowError::NotOwner);
    }

    let (teacher, role) = user::Entity::find_by_id(teacher_id)
        .find_also_related(crate::entity::role::Entity)
        .one(db)
        .await?
        .ok_or(WorkflowError::TeacherNotFound)?;
    if role.is_none_or(|r| r.name != RoleName::Teacher.as_str()) {
        return Err(WorkflowError::NotATeacher);
    }

    let already_invited = teacher_invitation::Entity::find()
        .filter(teacher_invitation::Column::InternshipId.eq(internship_id))
        .filter(teacher_invitation::Column::TeacherId.eq(teacher.id))
        .count(db)
        .await?
        > 0;
    if already_invited {
        return Err(WorkflowError::DuplicateInvitation);
    }

    let now = Utc::now().naive_utc();
    let model = teacher_invitation::ActiveModel {
        id: Set(Uuid::now_v7()),
        internship_id: Set(internship_id),
        student_id: Set(student_id),
        teacher_id: Set(teacher.id),
        status: Set(InvitationStatus::Pending),
        message: Set(message),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(|e| {
        // Lost a race against a concurrent identical invite.
        let msg = e.to_string();
        if msg.contains("UNIQUE") || msg.contains("unique") {
            WorkflowError::DuplicateInvitation
        } else {
            WorkflowError::Db(e)
        }
    })?;

    tracing::info!(
        invitation = %model.id,
        internship = %internship_id,
        teacher = %teacher.id,
        "teacher invited"
    );
    Ok(model)
}

/// Outcome of a teacher's response. `internship` is set when the invitation
/// was accepted and the internship changed.
#[derive(Debug)]
pub struct Response {
    pub invitation: teacher_invitation::Model,
    pub internship: Option<internship::Model>,
}

/// Apply a teacher's response to an invitation.
///
/// `decision` is validated only after the invitation is known to be pending,
/// so a malformed status on an answered invitation reports the state error.
/// On accept the internship is assigned to the teacher and forced to
/// `Approved`, whatever its previous status; acceptance is refused while a
/// different teacher is already assigned.
pub async fn respond_to_invitation(
    db: &DatabaseConnection,
    invitation_id: Uuid,
    teacher_id: Uuid,
    decision: Result<Decision, WorkflowError>,
) -> Result<Response, WorkflowError> {
    let txn = db.begin().await?;

    let invitation = teacher_invitation::Entity::find_by_id(invitation_id)
        .one(&txn)
        .await?
        .ok_or(WorkflowError::InvitationNotFound)?;

    if invitation.teacher_id != teacher_id {
        return Err(WorkflowError::NotInvitee);
    }
    if invitation.status != InvitationStatus::Pending {
        return Err(WorkflowError::AlreadyResponded);
    }
    let decision = decision?;
    let next = invitation.status.respond(decision)?;

    let now = Utc::now().naive_utc();
    let internship = if decision == Decision::Accept {
        // The filter is re-evaluated after any concurrent writer commits, so
        // only one teacher can claim an unassigned internship.
        let claimed = internship::Entity::update_many()
            .col_expr(internship::Column::TeacherId, Expr::value(teacher_id))
            .col_expr(
                internship::Column::Status,
                Expr::value(InternshipStatus::Approved),
            )
            .col_expr(internship::Column::UpdatedAt, Expr::value(now))
            .filter(internship::Column::Id.eq(invitation.internship_id))
            .filter(
                Condition::any()
                    .add(internship::Column::TeacherId.is_null())
                    .add(internship::Column::TeacherId.eq(teacher_id)),
            )
            .exec(&txn)
            .await?;

        let internship = internship::Entity::find_by_id(invitation.internship_id)
            .one(&txn)
            .await?
            .ok_or(WorkflowError::InternshipNotFound)?;
        if claimed.rows_affected == 0 {
            return Err(WorkflowError::TeacherAlreadyAssigned);
        }
        Some(internship)
    } else {
        None
    };

    let mut active: teacher_invitation::ActiveModel = invitation.into();
    active.status = Set(next);
    active.updated_at = Set(now);
    let invitation = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        invitation = %invitation.id,
        internship = %invitation.internship_id,
        teacher = %teacher_id,
        status = next.label(),
        "invitation answered"
    );
    Ok(Response {
        invitation,
        internship,
    })
}
