// rest/auth.rs — Bearer token auth middleware.
//
// Tokens are provisioned out-of-band (`devlabd token issue --user-id <id>`)
// and stored in the api_tokens table. The middleware exchanges
// `Authorization: Bearer <token>` for an `Identity` and injects it as a
// request extension; everything past this point works with the identity,
// never the raw credential.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::Error;
use crate::policy::Identity;
use crate::AppContext;

pub async fn require_auth(
    State(ctx): State<Arc<AppContext>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Error::Unauthorized.into_response();
    };

    match ctx.storage.user_for_token(token).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(Identity {
                user_id: user.id,
                username: user.username,
                is_staff: user.is_staff,
            });
            next.run(req).await
        }
        Ok(None) => Error::Unauthorized.into_response(),
        Err(e) => e.into_response(),
    }
}
