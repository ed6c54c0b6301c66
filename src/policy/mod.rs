//! Access policy: who may perform which action on which entity.
//!
//! Two identity classes — staff ("admin") and regular authenticated users.
//! The policy is a pure function evaluated before any data access; a denial
//! short-circuits the request. For reads it also yields the visibility
//! `Scope` the Query/Command Service must apply, so regular users only ever
//! see projects and teams they participate in.

use crate::error::Error;

// ─── Identity ────────────────────────────────────────────────────────────────

/// Authenticated caller, produced by the auth boundary (bearer token →
/// user lookup). The core never sees raw credentials.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub is_staff: bool,
}

// ─── Entities and actions ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Project,
    Team,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Get,
    Create,
    Update,
    Delete,
    /// Team leader assignment (`definir_lider`).
    SetLeader,
    /// A user's own sub-views: projetos, equipes, visao_geral.
    UserViews { target: i64 },
}

/// Visibility filter a read operation must apply after authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Staff: every row.
    All,
    /// Regular caller: only rows the given user participates in.
    MemberOf(i64),
}

// ─── Policy check ────────────────────────────────────────────────────────────

/// Decide whether `identity` may perform `action` on `entity`.
///
/// Returns the visibility scope on allow, `Error::Forbidden` on deny.
/// Pure — no storage access, independent of the transport layer.
pub fn authorize(identity: &Identity, entity: Entity, action: Action) -> Result<Scope, Error> {
    if identity.is_staff {
        return Ok(Scope::All);
    }

    match (entity, action) {
        // Regular users may only read their own sub-views. Without the
        // target check any authenticated user could enumerate everyone
        // else's memberships by id.
        (Entity::User, Action::UserViews { target }) => {
            if target == identity.user_id {
                Ok(Scope::MemberOf(identity.user_id))
            } else {
                Err(Error::Forbidden)
            }
        }

        // The user directory is staff-only in both directions.
        (Entity::User, _) => Err(Error::Forbidden),

        // Projects and teams: reads are member-scoped, writes staff-only.
        (Entity::Project | Entity::Team, Action::List | Action::Get) => {
            Ok(Scope::MemberOf(identity.user_id))
        }
        (Entity::Project | Entity::Team, _) => Err(Error::Forbidden),
    }
}
