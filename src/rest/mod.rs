// rest/mod.rs — Public REST API server.
//
// Axum HTTP server, local only by default. Every /api route except /api/health
// sits behind the bearer-token middleware, which resolves the token to an
// `Identity` before the handlers run.
//
// Endpoints:
//   GET  /api/health
//   GET/POST        /api/users            GET/PUT/PATCH/DELETE /api/users/{id}
//   GET  /api/users/{id}/projetos | /equipes | /visao_geral
//   GET/POST        /api/projetos         GET/PUT/PATCH/DELETE /api/projetos/{id}
//   GET  /api/projetos/{id}/equipes | /participantes | /dashboard
//   GET/POST        /api/equipes          GET/PUT/PATCH/DELETE /api/equipes/{id}
//   POST /api/equipes/{id}/definir_lider

pub mod auth;
pub mod routes;

use anyhow::Result;
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::error::Error;
use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let api = Router::new()
        // Users (admin-only CRUD + authenticated sub-views)
        .route(
            "/api/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/api/users/{id}",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .patch(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route("/api/users/{id}/projetos", get(routes::users::projetos))
        .route("/api/users/{id}/equipes", get(routes::users::equipes))
        .route("/api/users/{id}/visao_geral", get(routes::users::visao_geral))
        // Projects (visibility-scoped CRUD + sub-views)
        .route(
            "/api/projetos",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/api/projetos/{id}",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route("/api/projetos/{id}/equipes", get(routes::projects::equipes))
        .route(
            "/api/projetos/{id}/participantes",
            get(routes::projects::participantes),
        )
        .route(
            "/api/projetos/{id}/dashboard",
            get(routes::projects::dashboard),
        )
        // Teams (visibility-scoped CRUD + leader assignment)
        .route(
            "/api/equipes",
            get(routes::teams::list_teams).post(routes::teams::create_team),
        )
        .route(
            "/api/equipes/{id}",
            get(routes::teams::get_team)
                .put(routes::teams::update_team)
                .patch(routes::teams::update_team)
                .delete(routes::teams::delete_team),
        )
        .route(
            "/api/equipes/{id}/definir_lider",
            post(routes::teams::definir_lider),
        )
        .route_layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::require_auth,
        ));

    Router::new()
        // Health (no auth)
        .route("/api/health", get(routes::health::health))
        .merge(api)
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

// ─── Error → HTTP mapping ────────────────────────────────────────────────────

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Database(_) | Error::Internal(_) => {
                // Infrastructure failures are logged, never echoed to the caller.
                error!(error = %self, "internal failure");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response();
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn parts(err: Error) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn client_errors_carry_their_message() {
        let (status, body) = parts(Error::validation("title must not be empty")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("title must not be empty"));

        let (status, body) = parts(Error::NotFound("project")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("project not found"));

        let (status, _) = parts(Error::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = parts(Error::Forbidden).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn infrastructure_failures_answer_500_without_detail() {
        let (status, body) = parts(Error::internal("database query timed out after 30s")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"internal error"}"#);

        let (status, body) = parts(Error::Database(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"internal error"}"#);
    }
}
