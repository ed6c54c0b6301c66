//! Integration tests for the domain model and data store.
//!
//! Covers:
//! 1. Leader invariant (leader must be a member) across every mutation path
//! 2. Leader exclusivity (a user leads at most one team)
//! 3. Derived participants view as distinct union
//! 4. projects_of across teams in different projects
//! 5. Project delete cascades to teams but never to users
//! 6. User deletion clears leader references and membership rows

use chrono::NaiveDate;
use tempfile::TempDir;

use devlabd::domain;
use devlabd::error::Error;
use devlabd::storage::{NewProject, NewTeam, ProjectStatus, Storage, TeamPatch, UserRow};

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn make_storage() -> (TempDir, Storage) {
    let dir = TempDir::new().unwrap();
    let storage = Storage::new(dir.path()).await.unwrap();
    (dir, storage)
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

async fn make_user(storage: &Storage, name: &str) -> UserRow {
    storage
        .create_user(name, &format!("{name}@devlab.io"), false)
        .await
        .unwrap()
}

async fn make_project(storage: &Storage, title: &str) -> i64 {
    storage
        .create_project(&NewProject {
            title: title.into(),
            description: String::new(),
            client: "Acme".into(),
            status: ProjectStatus::Planned,
            start_date: date("2026-01-01"),
            end_date: date("2026-06-30"),
        })
        .await
        .unwrap()
        .id
}

async fn make_team(storage: &Storage, name: &str, project_id: i64, members: &[i64]) -> i64 {
    storage
        .create_team(&NewTeam {
            name: name.into(),
            description: String::new(),
            project_id,
            leader_id: None,
            member_ids: members.to_vec(),
        })
        .await
        .unwrap()
        .id
}

// ─── Leader invariant ────────────────────────────────────────────────────────

#[tokio::test]
async fn set_leader_requires_membership() {
    let (_dir, storage) = make_storage().await;
    let alice = make_user(&storage, "alice").await;
    let bob = make_user(&storage, "bob").await;
    let carol = make_user(&storage, "carol").await;

    let project = make_project(&storage, "Website Redesign").await;
    let backend = make_team(&storage, "Backend", project, &[alice.id, bob.id]).await;

    // bob is a member: assignment succeeds.
    let (team, leader) = domain::set_leader(&storage, backend, bob.id).await.unwrap();
    assert_eq!(team.leader_id, Some(bob.id));
    assert_eq!(leader.username, "bob");

    // carol is not a member: validation error, leader unchanged.
    let err = domain::set_leader(&storage, backend, carol.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let team = storage.get_team(backend).await.unwrap().unwrap();
    assert_eq!(team.leader_id, Some(bob.id));
}

#[tokio::test]
async fn set_leader_with_unknown_user_is_a_validation_error() {
    let (_dir, storage) = make_storage().await;
    let alice = make_user(&storage, "alice").await;
    let project = make_project(&storage, "P").await;
    let team = make_team(&storage, "T", project, &[alice.id]).await;

    let err = domain::set_leader(&storage, team, 9999).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let team = storage.get_team(team).await.unwrap().unwrap();
    assert_eq!(team.leader_id, None);
}

#[tokio::test]
async fn set_leader_on_unknown_team_is_not_found() {
    let (_dir, storage) = make_storage().await;
    let alice = make_user(&storage, "alice").await;
    let err = domain::set_leader(&storage, 9999, alice.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound("team")));
}

#[tokio::test]
async fn a_user_leads_at_most_one_team() {
    let (_dir, storage) = make_storage().await;
    let bob = make_user(&storage, "bob").await;
    let project = make_project(&storage, "P").await;
    let t1 = make_team(&storage, "T1", project, &[bob.id]).await;
    let t2 = make_team(&storage, "T2", project, &[bob.id]).await;

    domain::set_leader(&storage, t1, bob.id).await.unwrap();
    let err = domain::set_leader(&storage, t2, bob.id).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(
        storage.get_team(t2).await.unwrap().unwrap().leader_id,
        None
    );
}

#[tokio::test]
async fn team_create_rejects_leader_outside_member_set() {
    let (_dir, storage) = make_storage().await;
    let alice = make_user(&storage, "alice").await;
    let bob = make_user(&storage, "bob").await;
    let project = make_project(&storage, "P").await;

    let err = storage
        .create_team(&NewTeam {
            name: "T".into(),
            description: String::new(),
            project_id: project,
            leader_id: Some(bob.id),
            member_ids: vec![alice.id],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn member_update_cannot_orphan_the_leader() {
    let (_dir, storage) = make_storage().await;
    let alice = make_user(&storage, "alice").await;
    let bob = make_user(&storage, "bob").await;
    let project = make_project(&storage, "P").await;
    let team = make_team(&storage, "T", project, &[alice.id, bob.id]).await;
    domain::set_leader(&storage, team, bob.id).await.unwrap();

    // Replacing the member set without bob must fail and roll back.
    let err = storage
        .update_team(
            team,
            &TeamPatch {
                member_ids: Some(vec![alice.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let members = storage.team_members(team).await.unwrap();
    assert!(members.iter().any(|m| m.id == bob.id));
    assert_eq!(
        storage.get_team(team).await.unwrap().unwrap().leader_id,
        Some(bob.id)
    );
}

#[tokio::test]
async fn leader_invariant_holds_under_racing_member_removal() {
    let (_dir, storage) = make_storage().await;
    let alice = make_user(&storage, "alice").await;
    let bob = make_user(&storage, "bob").await;
    let project = make_project(&storage, "P").await;

    // Race the guarded leader assignment against a member replacement that
    // drops the candidate. Whichever write lands second must observe the
    // first; the stored state may never show a non-member leader.
    for i in 0..20 {
        let team = make_team(&storage, &format!("T{i}"), project, &[alice.id, bob.id]).await;

        let patch = TeamPatch {
            member_ids: Some(vec![alice.id]),
            ..Default::default()
        };
        let (assigned, replaced) = tokio::join!(
            domain::set_leader(&storage, team, bob.id),
            storage.update_team(team, &patch)
        );
        // The writes conflict, so at most one can win.
        assert!(!(assigned.is_ok() && replaced.is_ok()));

        let row = storage.get_team(team).await.unwrap().unwrap();
        if let Some(leader_id) = row.leader_id {
            assert!(storage.team_has_member(team, leader_id).await.unwrap());
        }

        storage.delete_team(team).await.unwrap();
    }
}

// ─── Derived views ───────────────────────────────────────────────────────────

#[tokio::test]
async fn participants_is_the_distinct_union_of_member_sets() {
    let (_dir, storage) = make_storage().await;
    let alice = make_user(&storage, "alice").await;
    let bob = make_user(&storage, "bob").await;
    let carol = make_user(&storage, "carol").await;

    let project = make_project(&storage, "P").await;
    let _t1 = make_team(&storage, "T1", project, &[alice.id, bob.id]).await;
    let t2 = make_team(&storage, "T2", project, &[bob.id, carol.id]).await;

    // bob appears in both teams but once in the union.
    let participants = domain::participants(&storage, project).await.unwrap();
    let mut ids: Vec<i64> = participants.iter().map(|u| u.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![alice.id, bob.id, carol.id]);

    // Adding a member to any team of the project adds them to the view.
    let dave = make_user(&storage, "dave").await;
    storage
        .update_team(
            t2,
            &TeamPatch {
                member_ids: Some(vec![bob.id, carol.id, dave.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let participants = domain::participants(&storage, project).await.unwrap();
    assert!(participants.iter().any(|u| u.id == dave.id));

    // Removing the last team referencing carol removes her from the view.
    storage.delete_team(t2).await.unwrap();
    let participants = domain::participants(&storage, project).await.unwrap();
    let mut ids: Vec<i64> = participants.iter().map(|u| u.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![alice.id, bob.id]);
}

#[tokio::test]
async fn projects_of_spans_all_team_memberships() {
    let (_dir, storage) = make_storage().await;
    let dave = make_user(&storage, "dave").await;

    let w = make_project(&storage, "W").await;
    let x = make_project(&storage, "X").await;
    let _y = make_project(&storage, "Y").await;
    make_team(&storage, "Backend", w, &[dave.id]).await;
    make_team(&storage, "QA", x, &[dave.id]).await;

    let projects = domain::projects_of(&storage, dave.id).await.unwrap();
    let mut ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![w, x]);
}

#[tokio::test]
async fn overview_combines_user_projects_and_teams() {
    let (_dir, storage) = make_storage().await;
    let dave = make_user(&storage, "dave").await;
    let w = make_project(&storage, "W").await;
    let backend = make_team(&storage, "Backend", w, &[dave.id]).await;

    let view = domain::overview(&storage, dave.id).await.unwrap();
    assert_eq!(view.user.id, dave.id);
    assert_eq!(view.projects.len(), 1);
    assert_eq!(view.teams.len(), 1);
    assert_eq!(view.teams[0].id, backend);
}

#[tokio::test]
async fn dashboard_combines_project_teams_and_participants() {
    let (_dir, storage) = make_storage().await;
    let alice = make_user(&storage, "alice").await;
    let bob = make_user(&storage, "bob").await;
    let project = make_project(&storage, "P").await;
    make_team(&storage, "T1", project, &[alice.id]).await;
    make_team(&storage, "T2", project, &[bob.id]).await;

    let view = domain::dashboard(&storage, project).await.unwrap();
    assert_eq!(view.project.id, project);
    assert_eq!(view.teams.len(), 2);
    assert_eq!(view.participants.len(), 2);
}

// ─── Deletion semantics ──────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_a_project_cascades_to_teams_but_not_users() {
    let (_dir, storage) = make_storage().await;
    let alice = make_user(&storage, "alice").await;
    let project = make_project(&storage, "P").await;
    let team = make_team(&storage, "T", project, &[alice.id]).await;

    storage.delete_project(project).await.unwrap();

    assert!(storage.get_team(team).await.unwrap().is_none());
    assert!(storage.get_user(alice.id).await.unwrap().is_some());
    assert!(domain::teams_of(&storage, alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_the_leader_user_leaves_the_team_leaderless() {
    let (_dir, storage) = make_storage().await;
    let alice = make_user(&storage, "alice").await;
    let bob = make_user(&storage, "bob").await;
    let project = make_project(&storage, "P").await;
    let team = make_team(&storage, "T", project, &[alice.id, bob.id]).await;
    domain::set_leader(&storage, team, bob.id).await.unwrap();

    storage.delete_user(bob.id).await.unwrap();

    let team = storage.get_team(team).await.unwrap().unwrap();
    assert_eq!(team.leader_id, None);
    let members = storage.team_members(team.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, alice.id);
}
