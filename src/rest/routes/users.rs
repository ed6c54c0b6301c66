// rest/routes/users.rs — User CRUD (admin-only) and per-user sub-views.

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
    dto::{CreateUserRequest, ProjectDto, TeamDto, UpdateUserRequest, UserDto, UserOverviewDto},
};
use crate::AppContext;

pub async fn list_users(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<UserDto>>, Error> {
    Ok(Json(service::list_users(&ctx.storage, &identity).await?))
}

pub async fn get_user(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<UserDto>, Error> {
    Ok(Json(service::get_user(&ctx.storage, &identity, id).await?))
}

pub async fn create_user(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserDto>), Error> {
    let user = service::create_user(&ctx.storage, &identity, body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserDto>, Error> {
    Ok(Json(
        service::update_user(&ctx.storage, &identity, id, body).await?,
    ))
}

pub async fn delete_user(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
    service::delete_user(&ctx.storage, &identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn projetos(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ProjectDto>>, Error> {
    Ok(Json(
        service::user_projects(&ctx.storage, &identity, id).await?,
    ))
}

pub async fn equipes(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TeamDto>>, Error> {
    Ok(Json(
        service::user_teams(&ctx.storage, &identity, id).await?,
    ))
}

pub async fn visao_geral(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<UserOverviewDto>, Error> {
    Ok(Json(
        service::user_overview(&ctx.storage, &identity, id).await?,
    ))
}
