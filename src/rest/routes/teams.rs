// rest/routes/teams.rs — Visibility-scoped team CRUD and leader assignment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Error;
use crate::policy::Identity;
use crate::service::{
    self,
    dto::{CreateTeamRequest, SetLeaderRequest, TeamDto, UpdateTeamRequest},
};
use crate::AppContext;

pub async fn list_teams(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<TeamDto>>, Error> {
    Ok(Json(service::list_teams(&ctx.storage, &identity).await?))
}

pub async fn get_team(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<TeamDto>, Error> {
    Ok(Json(service::get_team(&ctx.storage, &identity, id).await?))
}

pub async fn create_team(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamDto>), Error> {
    let team = service::create_team(&ctx.storage, &identity, body).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn update_team(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTeamRequest>,
) -> Result<Json<TeamDto>, Error> {
    Ok(Json(
        service::update_team(&ctx.storage, &identity, id, body).await?,
    ))
}

pub async fn delete_team(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
    service::delete_team(&ctx.storage, &identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn definir_lider(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(body): Json<SetLeaderRequest>,
) -> Result<Json<Value>, Error> {
    let message = service::set_leader(&ctx.storage, &identity, id, body.user_id).await?;
    Ok(Json(json!({ "status": message })))
}
