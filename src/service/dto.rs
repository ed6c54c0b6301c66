// service/dto.rs — Wire representations for the request/response boundary.
//
// Reads nest user objects (leader, members, participants); writes accept
// flat ids (`leader_id`, `member_ids`). The mapping from storage rows is
// explicit so the internal representation can move without breaking the
// wire contract.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::storage::{ProjectRow, ProjectStatus, TeamRow, UserRow};

// ─── Read representations ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<UserRow> for UserDto {
    fn from(row: UserRow) -> Self {
        UserDto {
            id: row.id,
            username: row.username,
            email: row.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectDto {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub client: String,
    pub status: ProjectStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Computed: distinct members across the project's teams.
    pub participants: Vec<UserDto>,
}

impl ProjectDto {
    pub fn from_row(row: ProjectRow, participants: Vec<UserRow>) -> Self {
        ProjectDto {
            id: row.id,
            title: row.title,
            description: row.description,
            client: row.client,
            status: row.status,
            start_date: row.start_date,
            end_date: row.end_date,
            participants: participants.into_iter().map(UserDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeamDto {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub project_id: i64,
    pub leader: Option<UserDto>,
    pub members: Vec<UserDto>,
}

impl TeamDto {
    pub fn from_row(row: TeamRow, leader: Option<UserRow>, members: Vec<UserRow>) -> Self {
        TeamDto {
            id: row.id,
            name: row.name,
            description: row.description,
            project_id: row.project_id,
            leader: leader.map(UserDto::from),
            members: members.into_iter().map(UserDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserOverviewDto {
    pub user: UserDto,
    pub projects: Vec<ProjectDto>,
    pub teams: Vec<TeamDto>,
}

#[derive(Debug, Serialize)]
pub struct ProjectDashboardDto {
    pub project: ProjectDto,
    pub teams: Vec<TeamDto>,
    pub participants: Vec<UserDto>,
}

// ─── Write requests ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub is_staff: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub is_staff: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub client: String,
    pub status: Option<ProjectStatus>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub client: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub project_id: i64,
    pub leader_id: Option<i64>,
    #[serde(default)]
    pub member_ids: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub project_id: Option<i64>,
    pub leader_id: Option<i64>,
    pub member_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct SetLeaderRequest {
    pub user_id: i64,
}
