use axum::{
    async_trait,
    extract::{FromRef, FromRequest, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;
use uuid::Uuid;

use super::jwt::TokenService;
use crate::error::AppError;

/// `Json<T>` whose rejection renders through [`AppError`].
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                warn!(error = %rejection.body_text(), "rejected request body");
                Err(rejection.into())
            }
        }
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth = headers
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthenticated)?
        .to_str()
        .map_err(|_| AppError::MalformedHeader)?;

    auth.strip_prefix("Bearer ").ok_or(AppError::MalformedHeader)
}

fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<AuthUser, AppError> {
    let token = bearer_token(headers)?;
    match tokens.verify(token) {
        Ok(claims) => Ok(AuthUser(claims.sub)),
        Err(e) => {
            warn!(error = %e, "rejected bearer token");
            Err(e.into())
        }
    }
}

/// Authenticated user ID for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already verified by `require_auth`
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(*user);
        }
        let tokens = TokenService::from_ref(state);
        authenticate(&parts.headers, &tokens)
    }
}

/// Layer form of the check: verifies the bearer token and stores
/// [`AuthUser`] in the request extensions for downstream handlers.
pub async fn require_auth(
    State(tokens): State<TokenService>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(req.headers(), &tokens)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{HeaderValue, StatusCode},
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::auth::jwt::TokenError;

    fn tokens() -> TokenService {
        TokenService::new("mw-secret", Duration::from_secs(3600)).unwrap()
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn missing_header_is_unauthenticated() {
        let err = bearer_token(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[test]
    fn non_bearer_scheme_is_malformed_header() {
        for value in ["Basic abc", "bearer abc", "Bearerabc", "Token x"] {
            let err = bearer_token(&headers_with(value)).unwrap_err();
            assert!(matches!(err, AppError::MalformedHeader), "{value}");
        }
    }

    #[test]
    fn bearer_token_extracted() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn authenticate_maps_token_failures() {
        let err = authenticate(&headers_with("Bearer junk"), &tokens()).unwrap_err();
        assert!(matches!(err, AppError::Token(TokenError::Malformed)));

        let user_id = Uuid::new_v4();
        let token = tokens().issue(user_id).unwrap();
        let ok = authenticate(&headers_with(&format!("Bearer {token}")), &tokens()).unwrap();
        assert_eq!(ok, AuthUser(user_id));
    }

    #[tokio::test]
    async fn require_auth_attaches_user() {
        let tokens = tokens();
        let app = Router::new()
            .route(
                "/who",
                get(|Extension(AuthUser(id)): Extension<AuthUser>| async move { id.to_string() }),
            )
            .route_layer(axum::middleware::from_fn_with_state(
                tokens.clone(),
                require_auth,
            ));

        let user_id = Uuid::new_v4();
        let token = tokens.issue(user_id).unwrap();
        let res = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/who")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, user_id.to_string().as_bytes());

        let res = app
            .oneshot(axum::http::Request::builder().uri("/who").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
