//! Domain model: derived relationship views and the leader invariant.
//!
//! Everything here is defined as set operations over the explicit
//! relationship tables — `participants` is the distinct union of member
//! sets across a project's teams, `projects_of` is the distinct set of
//! projects reachable through a user's memberships. The views are pure
//! reads; the one mutation (`set_leader`) validates and commits atomically.

use crate::error::{Error, Result};
use crate::storage::{ProjectRow, Storage, TeamRow, UserRow};

// ─── Derived views ───────────────────────────────────────────────────────────

/// Distinct users who are members of any team belonging to the project.
pub async fn participants(storage: &Storage, project_id: i64) -> Result<Vec<UserRow>> {
    storage.project_participants(project_id).await
}

/// Teams where the user is a member.
pub async fn teams_of(storage: &Storage, user_id: i64) -> Result<Vec<TeamRow>> {
    storage.list_teams_for_member(user_id).await
}

/// Distinct projects reachable via the user's team memberships.
pub async fn projects_of(storage: &Storage, user_id: i64) -> Result<Vec<ProjectRow>> {
    storage.list_projects_for_member(user_id).await
}

// ─── Composite views ─────────────────────────────────────────────────────────
//
// Combined payloads assembled from several sub-queries. Not snapshot
// consistent: a write landing between sub-queries can show through.

#[derive(Debug)]
pub struct UserOverview {
    pub user: UserRow,
    pub projects: Vec<ProjectRow>,
    pub teams: Vec<TeamRow>,
}

/// User info plus their projects and teams in one payload.
pub async fn overview(storage: &Storage, user_id: i64) -> Result<UserOverview> {
    let user = storage
        .get_user(user_id)
        .await?
        .ok_or(Error::NotFound("user"))?;
    let projects = projects_of(storage, user_id).await?;
    let teams = teams_of(storage, user_id).await?;
    Ok(UserOverview {
        user,
        projects,
        teams,
    })
}

#[derive(Debug)]
pub struct ProjectDashboard {
    pub project: ProjectRow,
    pub teams: Vec<TeamRow>,
    pub participants: Vec<UserRow>,
}

/// Project plus its teams and participants in one payload.
pub async fn dashboard(storage: &Storage, project_id: i64) -> Result<ProjectDashboard> {
    let project = storage
        .get_project(project_id)
        .await?
        .ok_or(Error::NotFound("project"))?;
    let teams = storage.teams_of_project(project_id).await?;
    let participants = participants(storage, project_id).await?;
    Ok(ProjectDashboard {
        project,
        teams,
        participants,
    })
}

// ─── Leader assignment ───────────────────────────────────────────────────────

/// Make `user_id` the leader of `team_id`.
///
/// Fails with a validation error when the user does not exist or is not
/// currently a member of the team; the team is left unchanged. The actual
/// assignment is a single guarded UPDATE, so the membership check and the
/// write cannot be separated by a concurrent member removal.
pub async fn set_leader(storage: &Storage, team_id: i64, user_id: i64) -> Result<(TeamRow, UserRow)> {
    let team = storage
        .get_team(team_id)
        .await?
        .ok_or(Error::NotFound("team"))?;

    let user = match storage.get_user(user_id).await? {
        Some(user) => user,
        None => return Err(Error::validation("user not found")),
    };

    if !storage.assign_leader(team_id, user_id).await? {
        return Err(Error::validation(
            "the leader must be registered as a member of the team",
        ));
    }

    // Re-read for the updated leader reference.
    let team = storage
        .get_team(team.id)
        .await?
        .ok_or(Error::NotFound("team"))?;
    Ok((team, user))
}
