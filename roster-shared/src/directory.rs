//! Read-only view of company membership.
//!
//! User and department management live in another service; this crate only
//! needs to resolve an actor's company and a broadcast audience.

use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::clients::db::{checkout, DbPool};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::schema::members;
use crate::types::auth::UserRole;

#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id: Uuid,
    pub company_id: Uuid,
    pub role: UserRole,
    pub display_name: String,
}

pub trait MemberDirectory: Send + Sync {
    fn find(&self, user_id: Uuid) -> AppResult<Option<Member>>;

    /// All members of a company, optionally restricted to one role.
    fn members_of(&self, company_id: Uuid, role: Option<UserRole>) -> AppResult<Vec<Member>>;
}

/// Resolve a member or fail with `UserNotFound`.
pub fn resolve(directory: &dyn MemberDirectory, user_id: Uuid) -> AppResult<Member> {
    directory
        .find(user_id)?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = members)]
struct MemberRow {
    id: Uuid,
    company_id: Uuid,
    role: String,
    display_name: String,
}

impl TryFrom<MemberRow> for Member {
    type Error = AppError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<UserRole>()
            .map_err(|e| AppError::internal(format!("corrupt member row {}: {e}", row.id)))?;
        Ok(Member {
            id: row.id,
            company_id: row.company_id,
            role,
            display_name: row.display_name,
        })
    }
}

pub struct PgMemberDirectory {
    pool: DbPool,
}

impl PgMemberDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl MemberDirectory for PgMemberDirectory {
    fn find(&self, user_id: Uuid) -> AppResult<Option<Member>> {
        let mut conn = checkout(&self.pool)?;
        members::table
            .find(user_id)
            .select(MemberRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(Member::try_from)
            .transpose()
    }

    fn members_of(&self, company_id: Uuid, role: Option<UserRole>) -> AppResult<Vec<Member>> {
        let mut conn = checkout(&self.pool)?;
        let mut query = members::table
            .filter(members::company_id.eq(company_id))
            .select(MemberRow::as_select())
            .into_boxed();
        if let Some(role) = role {
            query = query.filter(members::role.eq(role.as_str()));
        }
        query
            .load(&mut conn)?
            .into_iter()
            .map(Member::try_from)
            .collect()
    }
}
