//! Query/Command Service: every operation the REST boundary exposes.
//!
//! Each operation takes the caller's `Identity`, asks the access policy
//! first, then executes against the domain model and data store. The
//! functions are transport-independent — the REST handlers are one-line
//! wrappers — which is also what the integration tests drive.
//!
//! Visibility rule for detail reads: a resource outside a regular caller's
//! scope answers "not found", never "forbidden", so existence is not
//! leaked.

pub mod dto;

use tracing::info;

use crate::domain;
use crate::error::{Error, Result};
use crate::policy::{authorize, Action, Entity, Identity, Scope};
use crate::storage::{
    NewProject, NewTeam, ProjectPatch, ProjectRow, ProjectStatus, Storage, TeamPatch, TeamRow,
    UserPatch,
};

use dto::{
    CreateProjectRequest, CreateTeamRequest, CreateUserRequest, ProjectDashboardDto, ProjectDto,
    TeamDto, UpdateProjectRequest, UpdateTeamRequest, UpdateUserRequest, UserDto, UserOverviewDto,
};

// ─── DTO assembly ────────────────────────────────────────────────────────────

async fn project_to_dto(storage: &Storage, row: ProjectRow) -> Result<ProjectDto> {
    let participants = storage.project_participants(row.id).await?;
    Ok(ProjectDto::from_row(row, participants))
}

async fn projects_to_dtos(storage: &Storage, rows: Vec<ProjectRow>) -> Result<Vec<ProjectDto>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(project_to_dto(storage, row).await?);
    }
    Ok(out)
}

async fn team_to_dto(storage: &Storage, row: TeamRow) -> Result<TeamDto> {
    let members = storage.team_members(row.id).await?;
    let leader = match row.leader_id {
        Some(id) => storage.get_user(id).await?,
        None => None,
    };
    Ok(TeamDto::from_row(row, leader, members))
}

async fn teams_to_dtos(storage: &Storage, rows: Vec<TeamRow>) -> Result<Vec<TeamDto>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(team_to_dto(storage, row).await?);
    }
    Ok(out)
}

// ─── Input validation ────────────────────────────────────────────────────────

fn require_nonempty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn check_date_order(
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
) -> Result<()> {
    if end < start {
        return Err(Error::validation(
            "expected end date must not precede the start date",
        ));
    }
    Ok(())
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub async fn list_users(storage: &Storage, identity: &Identity) -> Result<Vec<UserDto>> {
    authorize(identity, Entity::User, Action::List)?;
    let rows = storage.list_users().await?;
    Ok(rows.into_iter().map(UserDto::from).collect())
}

pub async fn get_user(storage: &Storage, identity: &Identity, id: i64) -> Result<UserDto> {
    authorize(identity, Entity::User, Action::Get)?;
    let row = storage.get_user(id).await?.ok_or(Error::NotFound("user"))?;
    Ok(UserDto::from(row))
}

pub async fn create_user(
    storage: &Storage,
    identity: &Identity,
    req: CreateUserRequest,
) -> Result<UserDto> {
    authorize(identity, Entity::User, Action::Create)?;
    require_nonempty(&req.username, "username")?;
    let row = storage
        .create_user(&req.username, &req.email, req.is_staff)
        .await?;
    info!(user_id = row.id, username = %row.username, "user created");
    Ok(UserDto::from(row))
}

pub async fn update_user(
    storage: &Storage,
    identity: &Identity,
    id: i64,
    req: UpdateUserRequest,
) -> Result<UserDto> {
    authorize(identity, Entity::User, Action::Update)?;
    if let Some(ref username) = req.username {
        require_nonempty(username, "username")?;
    }
    let patch = UserPatch {
        username: req.username,
        email: req.email,
        is_staff: req.is_staff,
    };
    let row = storage.update_user(id, &patch).await?;
    Ok(UserDto::from(row))
}

pub async fn delete_user(storage: &Storage, identity: &Identity, id: i64) -> Result<()> {
    authorize(identity, Entity::User, Action::Delete)?;
    storage.delete_user(id).await?;
    info!(user_id = id, "user deleted");
    Ok(())
}

/// Projects for a given user id, via the domain's derived view.
pub async fn user_projects(
    storage: &Storage,
    identity: &Identity,
    user_id: i64,
) -> Result<Vec<ProjectDto>> {
    authorize(identity, Entity::User, Action::UserViews { target: user_id })?;
    if storage.get_user(user_id).await?.is_none() {
        return Err(Error::NotFound("user"));
    }
    let rows = domain::projects_of(storage, user_id).await?;
    projects_to_dtos(storage, rows).await
}

/// Teams for a given user id.
pub async fn user_teams(
    storage: &Storage,
    identity: &Identity,
    user_id: i64,
) -> Result<Vec<TeamDto>> {
    authorize(identity, Entity::User, Action::UserViews { target: user_id })?;
    if storage.get_user(user_id).await?.is_none() {
        return Err(Error::NotFound("user"));
    }
    let rows = domain::teams_of(storage, user_id).await?;
    teams_to_dtos(storage, rows).await
}

/// Combined payload: user info + their projects + their teams.
pub async fn user_overview(
    storage: &Storage,
    identity: &Identity,
    user_id: i64,
) -> Result<UserOverviewDto> {
    authorize(identity, Entity::User, Action::UserViews { target: user_id })?;
    let view = domain::overview(storage, user_id).await?;
    Ok(UserOverviewDto {
        user: UserDto::from(view.user),
        projects: projects_to_dtos(storage, view.projects).await?,
        teams: teams_to_dtos(storage, view.teams).await?,
    })
}

// ─── Projects ────────────────────────────────────────────────────────────────

pub async fn list_projects(storage: &Storage, identity: &Identity) -> Result<Vec<ProjectDto>> {
    let scope = authorize(identity, Entity::Project, Action::List)?;
    let rows = match scope {
        Scope::All => storage.list_projects().await?,
        Scope::MemberOf(user_id) => storage.list_projects_for_member(user_id).await?,
    };
    projects_to_dtos(storage, rows).await
}

/// Fetch a project the caller is allowed to see, or NotFound.
async fn visible_project(storage: &Storage, identity: &Identity, id: i64) -> Result<ProjectRow> {
    let scope = authorize(identity, Entity::Project, Action::Get)?;
    if let Scope::MemberOf(user_id) = scope {
        if !storage.project_has_member(id, user_id).await? {
            return Err(Error::NotFound("project"));
        }
    }
    storage
        .get_project(id)
        .await?
        .ok_or(Error::NotFound("project"))
}

pub async fn get_project(storage: &Storage, identity: &Identity, id: i64) -> Result<ProjectDto> {
    let row = visible_project(storage, identity, id).await?;
    project_to_dto(storage, row).await
}

pub async fn create_project(
    storage: &Storage,
    identity: &Identity,
    req: CreateProjectRequest,
) -> Result<ProjectDto> {
    authorize(identity, Entity::Project, Action::Create)?;
    require_nonempty(&req.title, "title")?;
    check_date_order(req.start_date, req.end_date)?;
    let new = NewProject {
        title: req.title,
        description: req.description,
        client: req.client,
        status: req.status.unwrap_or(ProjectStatus::Planned),
        start_date: req.start_date,
        end_date: req.end_date,
    };
    let row = storage.create_project(&new).await?;
    info!(project_id = row.id, title = %row.title, "project created");
    project_to_dto(storage, row).await
}

pub async fn update_project(
    storage: &Storage,
    identity: &Identity,
    id: i64,
    req: UpdateProjectRequest,
) -> Result<ProjectDto> {
    authorize(identity, Entity::Project, Action::Update)?;
    if let Some(ref title) = req.title {
        require_nonempty(title, "title")?;
    }
    // Date order is re-checked against the stored row inside the update
    // transaction, so a single-bound patch cannot invert the range.
    let patch = ProjectPatch {
        title: req.title,
        description: req.description,
        client: req.client,
        status: req.status,
        start_date: req.start_date,
        end_date: req.end_date,
    };
    let row = storage.update_project(id, &patch).await?;
    project_to_dto(storage, row).await
}

pub async fn delete_project(storage: &Storage, identity: &Identity, id: i64) -> Result<()> {
    authorize(identity, Entity::Project, Action::Delete)?;
    storage.delete_project(id).await?;
    info!(project_id = id, "project deleted (teams cascaded)");
    Ok(())
}

/// Teams under a project the caller can see.
pub async fn project_teams(
    storage: &Storage,
    identity: &Identity,
    project_id: i64,
) -> Result<Vec<TeamDto>> {
    let project = visible_project(storage, identity, project_id).await?;
    let rows = storage.teams_of_project(project.id).await?;
    teams_to_dtos(storage, rows).await
}

/// `participants(project)` from the domain model.
pub async fn project_participants(
    storage: &Storage,
    identity: &Identity,
    project_id: i64,
) -> Result<Vec<UserDto>> {
    let project = visible_project(storage, identity, project_id).await?;
    let rows = domain::participants(storage, project.id).await?;
    Ok(rows.into_iter().map(UserDto::from).collect())
}

/// Combined payload: project + its teams + its participants.
pub async fn project_dashboard(
    storage: &Storage,
    identity: &Identity,
    project_id: i64,
) -> Result<ProjectDashboardDto> {
    let project = visible_project(storage, identity, project_id).await?;
    let view = domain::dashboard(storage, project.id).await?;
    Ok(ProjectDashboardDto {
        project: project_to_dto(storage, view.project).await?,
        teams: teams_to_dtos(storage, view.teams).await?,
        participants: view.participants.into_iter().map(UserDto::from).collect(),
    })
}

// ─── Teams ───────────────────────────────────────────────────────────────────

pub async fn list_teams(storage: &Storage, identity: &Identity) -> Result<Vec<TeamDto>> {
    let scope = authorize(identity, Entity::Team, Action::List)?;
    let rows = match scope {
        Scope::All => storage.list_teams().await?,
        Scope::MemberOf(user_id) => storage.list_teams_for_member(user_id).await?,
    };
    teams_to_dtos(storage, rows).await
}

pub async fn get_team(storage: &Storage, identity: &Identity, id: i64) -> Result<TeamDto> {
    let scope = authorize(identity, Entity::Team, Action::Get)?;
    if let Scope::MemberOf(user_id) = scope {
        if !storage.team_has_member(id, user_id).await? {
            return Err(Error::NotFound("team"));
        }
    }
    let row = storage.get_team(id).await?.ok_or(Error::NotFound("team"))?;
    team_to_dto(storage, row).await
}

pub async fn create_team(
    storage: &Storage,
    identity: &Identity,
    req: CreateTeamRequest,
) -> Result<TeamDto> {
    authorize(identity, Entity::Team, Action::Create)?;
    require_nonempty(&req.name, "name")?;
    if storage.get_project(req.project_id).await?.is_none() {
        return Err(Error::validation("project not found"));
    }
    let new = NewTeam {
        name: req.name,
        description: req.description,
        project_id: req.project_id,
        leader_id: req.leader_id,
        member_ids: req.member_ids,
    };
    let row = storage.create_team(&new).await?;
    info!(team_id = row.id, name = %row.name, "team created");
    team_to_dto(storage, row).await
}

pub async fn update_team(
    storage: &Storage,
    identity: &Identity,
    id: i64,
    req: UpdateTeamRequest,
) -> Result<TeamDto> {
    authorize(identity, Entity::Team, Action::Update)?;
    if let Some(ref name) = req.name {
        require_nonempty(name, "name")?;
    }
    if let Some(project_id) = req.project_id {
        if storage.get_project(project_id).await?.is_none() {
            return Err(Error::validation("project not found"));
        }
    }
    let patch = TeamPatch {
        name: req.name,
        description: req.description,
        project_id: req.project_id,
        leader_id: req.leader_id,
        member_ids: req.member_ids,
    };
    let row = storage.update_team(id, &patch).await?;
    team_to_dto(storage, row).await
}

pub async fn delete_team(storage: &Storage, identity: &Identity, id: i64) -> Result<()> {
    authorize(identity, Entity::Team, Action::Delete)?;
    storage.delete_team(id).await?;
    info!(team_id = id, "team deleted");
    Ok(())
}

/// Admin-only leader assignment. Returns the confirmation message naming
/// the new leader and team.
pub async fn set_leader(
    storage: &Storage,
    identity: &Identity,
    team_id: i64,
    user_id: i64,
) -> Result<String> {
    authorize(identity, Entity::Team, Action::SetLeader)?;
    let (team, user) = domain::set_leader(storage, team_id, user_id).await?;
    info!(team_id = team.id, leader = %user.username, "team leader assigned");
    Ok(format!(
        "{} is now leader of team {}",
        user.username, team.name
    ))
}
