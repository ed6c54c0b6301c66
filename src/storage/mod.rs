//! SQLite-backed data store for users, projects, teams, and their
//! relationship tables.
//!
//! All SQL lives here. Derived views (project participants, a user's
//! projects) are explicit joins over the `team_members` relationship table;
//! nothing derived is ever stored. Writes that must preserve the leader
//! invariant run inside a single transaction or a single guarded UPDATE.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::internal(format!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        ))),
    }
}

// ─── Row types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planned,
    InProgress,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planned => "planned",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub client: String,
    pub status: ProjectStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeamRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub project_id: i64,
    pub leader_id: Option<i64>,
}

// ─── Write payloads ──────────────────────────────────────────────────────────
//
// Internal write representations, decoupled from the wire DTOs. Patch fields
// that are `None` leave the stored value unchanged.

#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub client: String,
    pub status: ProjectStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub client: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewTeam {
    pub name: String,
    pub description: String,
    pub project_id: i64,
    pub leader_id: Option<i64>,
    pub member_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct TeamPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub project_id: Option<i64>,
    pub leader_id: Option<i64>,
    pub member_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub is_staff: Option<bool>,
}

// ─── Storage ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding
    /// it are logged at WARN level. Set to 0 to disable.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| Error::internal(format!("cannot create data dir: {e}")))?;
        let db_path = data_dir.join("devlab.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .foreign_keys(true)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        sqlx::migrate!("src/storage/migrations")
            .run(&pool)
            .await
            .map_err(|e| Error::internal(format!("migration failed: {e}")))?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    // ─── Users ───────────────────────────────────────────────────────────────

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        is_staff: bool,
    ) -> Result<UserRow> {
        with_timeout(async {
            let result = sqlx::query(
                "INSERT INTO users (username, email, is_staff, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(username)
            .bind(email)
            .bind(is_staff)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if unique_violation(&e) {
                    Error::validation(format!("username '{username}' is already taken"))
                } else {
                    Error::from(e)
                }
            })?;

            self.get_user(result.last_insert_rowid())
                .await?
                .ok_or(Error::NotFound("user"))
        })
        .await
    }

    pub async fn list_users(&self) -> Result<Vec<UserRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT id, username, email, is_staff FROM users ORDER BY username",
            )
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        with_timeout(async {
            Ok(
                sqlx::query_as("SELECT id, username, email, is_staff FROM users WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?,
            )
        })
        .await
    }

    pub async fn update_user(&self, id: i64, patch: &UserPatch) -> Result<UserRow> {
        with_timeout(async {
            let result = sqlx::query(
                "UPDATE users SET
                   username = COALESCE(?, username),
                   email = COALESCE(?, email),
                   is_staff = COALESCE(?, is_staff)
                 WHERE id = ?",
            )
            .bind(patch.username.as_deref())
            .bind(patch.email.as_deref())
            .bind(patch.is_staff)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if unique_violation(&e) {
                    Error::validation("username is already taken")
                } else {
                    Error::from(e)
                }
            })?;

            if result.rows_affected() == 0 {
                return Err(Error::NotFound("user"));
            }
            self.get_user(id).await?.ok_or(Error::NotFound("user"))
        })
        .await
    }

    /// Delete a user. Foreign keys clean up the relationships: memberships
    /// are removed and any team led by the user becomes leaderless.
    pub async fn delete_user(&self, id: i64) -> Result<()> {
        with_timeout(async {
            let result = sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(Error::NotFound("user"));
            }
            Ok(())
        })
        .await
    }

    // ─── API tokens ──────────────────────────────────────────────────────────

    /// Issue a new bearer token for a user. Tokens are opaque UUIDs; a user
    /// may hold several (one per client).
    pub async fn issue_token(&self, user_id: i64) -> Result<String> {
        with_timeout(async {
            if self.get_user(user_id).await?.is_none() {
                return Err(Error::NotFound("user"));
            }
            let token = Uuid::new_v4().to_string().replace('-', "");
            sqlx::query("INSERT INTO api_tokens (token, user_id, created_at) VALUES (?, ?, ?)")
                .bind(&token)
                .bind(user_id)
                .bind(Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;
            Ok(token)
        })
        .await
    }

    /// Resolve a bearer token to its user, or None for unknown tokens.
    pub async fn user_for_token(&self, token: &str) -> Result<Option<UserRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT u.id, u.username, u.email, u.is_staff
                 FROM api_tokens t JOIN users u ON u.id = t.user_id
                 WHERE t.token = ?",
            )
            .bind(token)
            .fetch_optional(&self.pool)
            .await?)
        })
        .await
    }

    // ─── Projects ────────────────────────────────────────────────────────────

    pub async fn create_project(&self, new: &NewProject) -> Result<ProjectRow> {
        with_timeout(async {
            let result = sqlx::query(
                "INSERT INTO projects (title, description, client, status, start_date, end_date)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.client)
            .bind(new.status)
            .bind(new.start_date)
            .bind(new.end_date)
            .execute(&self.pool)
            .await?;

            self.get_project(result.last_insert_rowid())
                .await?
                .ok_or(Error::NotFound("project"))
        })
        .await
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectRow>> {
        with_timeout(async {
            Ok(sqlx::query_as("SELECT * FROM projects ORDER BY id")
                .fetch_all(&self.pool)
                .await?)
        })
        .await
    }

    /// Projects where the user belongs to at least one team.
    pub async fn list_projects_for_member(&self, user_id: i64) -> Result<Vec<ProjectRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT DISTINCT p.* FROM projects p
                 JOIN teams t ON t.project_id = p.id
                 JOIN team_members m ON m.team_id = t.id
                 WHERE m.user_id = ?
                 ORDER BY p.id",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    pub async fn get_project(&self, id: i64) -> Result<Option<ProjectRow>> {
        with_timeout(async {
            Ok(sqlx::query_as("SELECT * FROM projects WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await
    }

    /// Apply a partial update. Runs in one transaction: the date order is
    /// re-checked against the stored row after the UPDATE, so patching a
    /// single bound cannot invert the range.
    pub async fn update_project(&self, id: i64, patch: &ProjectPatch) -> Result<ProjectRow> {
        with_timeout(async {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                "UPDATE projects SET
                   title = COALESCE(?, title),
                   description = COALESCE(?, description),
                   client = COALESCE(?, client),
                   status = COALESCE(?, status),
                   start_date = COALESCE(?, start_date),
                   end_date = COALESCE(?, end_date)
                 WHERE id = ?",
            )
            .bind(patch.title.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.client.as_deref())
            .bind(patch.status)
            .bind(patch.start_date)
            .bind(patch.end_date)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(Error::NotFound("project"));
            }

            let dates: (NaiveDate, NaiveDate) =
                sqlx::query_as("SELECT start_date, end_date FROM projects WHERE id = ?")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            if dates.1 < dates.0 {
                return Err(Error::validation(
                    "expected end date must not precede the start date",
                ));
            }

            tx.commit().await?;
            self.get_project(id)
                .await?
                .ok_or(Error::NotFound("project"))
        })
        .await
    }

    /// Delete a project. Its teams (and their membership rows) cascade;
    /// users referenced only through those teams are untouched.
    pub async fn delete_project(&self, id: i64) -> Result<()> {
        with_timeout(async {
            let result = sqlx::query("DELETE FROM projects WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(Error::NotFound("project"));
            }
            Ok(())
        })
        .await
    }

    /// Whether the user is a member of any team under the project.
    pub async fn project_has_member(&self, project_id: i64, user_id: i64) -> Result<bool> {
        with_timeout(async {
            let row: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM teams t
                 JOIN team_members m ON m.team_id = t.id
                 WHERE t.project_id = ? AND m.user_id = ?",
            )
            .bind(project_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(row.0 > 0)
        })
        .await
    }

    // ─── Teams ───────────────────────────────────────────────────────────────

    /// Create a team with its member set and optional leader in one
    /// transaction. The leader, when given, must be in the member set.
    pub async fn create_team(&self, new: &NewTeam) -> Result<TeamRow> {
        if let Some(leader) = new.leader_id {
            if !new.member_ids.contains(&leader) {
                return Err(Error::validation(
                    "the leader must be registered as a member of the team",
                ));
            }
        }

        with_timeout(async {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                "INSERT INTO teams (name, description, project_id, leader_id) VALUES (?, ?, ?, ?)",
            )
            .bind(&new.name)
            .bind(&new.description)
            .bind(new.project_id)
            .bind(new.leader_id)
            .execute(&mut *tx)
            .await
            .map_err(map_team_write_error)?;
            let team_id = result.last_insert_rowid();

            for user_id in &new.member_ids {
                sqlx::query("INSERT OR IGNORE INTO team_members (team_id, user_id) VALUES (?, ?)")
                    .bind(team_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        if foreign_key_violation(&e) {
                            Error::validation(format!("user {user_id} not found"))
                        } else {
                            Error::from(e)
                        }
                    })?;
            }

            tx.commit().await?;
            self.get_team(team_id)
                .await?
                .ok_or(Error::NotFound("team"))
        })
        .await
    }

    pub async fn list_teams(&self) -> Result<Vec<TeamRow>> {
        with_timeout(async {
            Ok(sqlx::query_as("SELECT * FROM teams ORDER BY id")
                .fetch_all(&self.pool)
                .await?)
        })
        .await
    }

    /// Teams where the user is a member.
    pub async fn list_teams_for_member(&self, user_id: i64) -> Result<Vec<TeamRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT t.* FROM teams t
                 JOIN team_members m ON m.team_id = t.id
                 WHERE m.user_id = ?
                 ORDER BY t.id",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    pub async fn get_team(&self, id: i64) -> Result<Option<TeamRow>> {
        with_timeout(async {
            Ok(sqlx::query_as("SELECT * FROM teams WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await
    }

    /// Apply a partial update to a team, replacing the member set when
    /// `member_ids` is given. The whole update is one transaction and the
    /// leader invariant is re-checked before commit, so a membership change
    /// can never silently orphan the leader.
    pub async fn update_team(&self, id: i64, patch: &TeamPatch) -> Result<TeamRow> {
        with_timeout(async {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                "UPDATE teams SET
                   name = COALESCE(?, name),
                   description = COALESCE(?, description),
                   project_id = COALESCE(?, project_id),
                   leader_id = COALESCE(?, leader_id)
                 WHERE id = ?",
            )
            .bind(patch.name.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.project_id)
            .bind(patch.leader_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_team_write_error)?;

            if result.rows_affected() == 0 {
                return Err(Error::NotFound("team"));
            }

            if let Some(ref member_ids) = patch.member_ids {
                sqlx::query("DELETE FROM team_members WHERE team_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                for user_id in member_ids {
                    sqlx::query(
                        "INSERT OR IGNORE INTO team_members (team_id, user_id) VALUES (?, ?)",
                    )
                    .bind(id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        if foreign_key_violation(&e) {
                            Error::validation(format!("user {user_id} not found"))
                        } else {
                            Error::from(e)
                        }
                    })?;
                }
            }

            // Leader invariant check; dropping the tx on error rolls everything back.
            let leader: (Option<i64>,) =
                sqlx::query_as("SELECT leader_id FROM teams WHERE id = ?")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            if let Some(leader_id) = leader.0 {
                let member: (i64,) = sqlx::query_as(
                    "SELECT COUNT(*) FROM team_members WHERE team_id = ? AND user_id = ?",
                )
                .bind(id)
                .bind(leader_id)
                .fetch_one(&mut *tx)
                .await?;
                if member.0 == 0 {
                    return Err(Error::validation(
                        "the leader must be registered as a member of the team",
                    ));
                }
            }

            tx.commit().await?;
            self.get_team(id).await?.ok_or(Error::NotFound("team"))
        })
        .await
    }

    pub async fn delete_team(&self, id: i64) -> Result<()> {
        with_timeout(async {
            let result = sqlx::query("DELETE FROM teams WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(Error::NotFound("team"));
            }
            Ok(())
        })
        .await
    }

    pub async fn teams_of_project(&self, project_id: i64) -> Result<Vec<TeamRow>> {
        with_timeout(async {
            Ok(
                sqlx::query_as("SELECT * FROM teams WHERE project_id = ? ORDER BY id")
                    .bind(project_id)
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await
    }

    pub async fn team_members(&self, team_id: i64) -> Result<Vec<UserRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT u.id, u.username, u.email, u.is_staff
                 FROM team_members m JOIN users u ON u.id = m.user_id
                 WHERE m.team_id = ?
                 ORDER BY u.username",
            )
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    pub async fn team_has_member(&self, team_id: i64, user_id: i64) -> Result<bool> {
        with_timeout(async {
            let row: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM team_members WHERE team_id = ? AND user_id = ?",
            )
            .bind(team_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(row.0 > 0)
        })
        .await
    }

    /// Atomic leader assignment — a single UPDATE that only fires when the
    /// candidate is currently in the member set, so the invariant cannot
    /// break even when a member removal races the assignment.
    ///
    /// Returns false when nothing was updated (not a member, or no such
    /// team); the caller disambiguates.
    pub async fn assign_leader(&self, team_id: i64, user_id: i64) -> Result<bool> {
        with_timeout(async {
            let result = sqlx::query(
                "UPDATE teams SET leader_id = ?
                 WHERE id = ?
                   AND EXISTS (SELECT 1 FROM team_members WHERE team_id = ? AND user_id = ?)",
            )
            .bind(user_id)
            .bind(team_id)
            .bind(team_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_team_write_error)?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    // ─── Derived views ───────────────────────────────────────────────────────

    /// Distinct users who are members of any team belonging to the project.
    pub async fn project_participants(&self, project_id: i64) -> Result<Vec<UserRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT DISTINCT u.id, u.username, u.email, u.is_staff
                 FROM users u
                 JOIN team_members m ON m.user_id = u.id
                 JOIN teams t ON t.id = m.team_id
                 WHERE t.project_id = ?
                 ORDER BY u.username",
            )
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }
}

// ─── Constraint mapping ──────────────────────────────────────────────────────

fn unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|d| d.is_unique_violation())
        .unwrap_or(false)
}

fn foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|d| d.is_foreign_key_violation())
        .unwrap_or(false)
}

/// Map team-table constraint failures to client errors: the UNIQUE leader
/// column enforces "a user leads at most one team", and the project FK
/// rejects teams pointing at a missing project.
fn map_team_write_error(e: sqlx::Error) -> Error {
    if unique_violation(&e) {
        Error::validation("this user already leads another team")
    } else if foreign_key_violation(&e) {
        Error::validation("referenced project or user not found")
    } else {
        Error::from(e)
    }
}
