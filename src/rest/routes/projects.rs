// rest/routes/projects.rs — Visibility-scoped project CRUD and sub-views.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;

use crate::error::Error;
use crate::policy::Identity;
use crate::service::{
    self,
    dto::{
        CreateProjectRequest, ProjectDashboardDto, ProjectDto, TeamDto, UpdateProjectRequest,
        UserDto,
    },
};
use crate::AppContext;

pub async fn list_projects(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<ProjectDto>>, Error> {
    Ok(Json(service::list_projects(&ctx.storage, &identity).await?))
}

pub async fn get_project(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<ProjectDto>, Error> {
    Ok(Json(
        service::get_project(&ctx.storage, &identity, id).await?,
    ))
}

pub async fn create_project(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectDto>), Error> {
    let project = service::create_project(&ctx.storage, &identity, body).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectDto>, Error> {
    Ok(Json(
        service::update_project(&ctx.storage, &identity, id, body).await?,
    ))
}

pub async fn delete_project(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
    service::delete_project(&ctx.storage, &identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn equipes(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TeamDto>>, Error> {
    Ok(Json(
        service::project_teams(&ctx.storage, &identity, id).await?,
    ))
}

pub async fn participantes(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<UserDto>>, Error> {
    Ok(Json(
        service::project_participants(&ctx.storage, &identity, id).await?,
    ))
}

pub async fn dashboard(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<ProjectDashboardDto>, Error> {
    Ok(Json(
        service::project_dashboard(&ctx.storage, &identity, id).await?,
    ))
}
