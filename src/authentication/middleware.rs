use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::{
    identity::Identity,
    jwt::{verify_jwt_session, SessionData},
};
use crate::config::CatalogConfig;

/// Accepts `Token <jwt>` and `Bearer <jwt>`.
fn header_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    match scheme {
        "Token" | "Bearer" => Some(token.trim()),
        _ => None,
    }
}

/// Resolves the caller from the `Authorization` header, falling back to the
/// `session` cookie. Missing or invalid credentials resolve to `Anonymous`.
pub fn with_identity(
    config: &CatalogConfig,
) -> impl Filter<Extract = (Identity,), Error = Rejection> + Clone {
    let secret: Arc<Vec<u8>> = Arc::new(config.jwt_secret.as_bytes().to_vec());

    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>("session"))
        .map(move |header: Option<String>, cookie: Option<String>| {
            let token = header
                .as_deref()
                .and_then(header_token)
                .map(str::to_owned)
                .or(cookie);

            match token {
                Some(token) => verify_jwt_session(&token, &secret).ok().into(),
                None => Identity::Anonymous,
            }
        })
}

pub fn with_session(
    config: &CatalogConfig,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_identity(config).and_then(|identity: Identity| async move {
        identity
            .session()
            .map(SessionData::clone)
            .map_err(|e| -> Rejection { e.into() })
    })
}
