use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use storefront_core::config::GuestConfig;
use storefront_core::domain::interaction::{Actor, GuestId};
use storefront_core::domain::session::SessionToken;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Request id taken from `x-correlation-id`, or generated when absent.
#[derive(Clone, Debug)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    fn from_headers(headers: &HeaderMap) -> Self {
        let supplied = headers
            .get(CORRELATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && value.len() <= 128);

        Self(supplied.map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Actor resolved once at the request boundary.
///
/// A bearer token wins over the guest cookie. Requests carrying neither get a
/// freshly minted guest id that [`RequestActor::attach_cookie`] hands back.
#[derive(Clone, Debug)]
pub struct RequestActor {
    pub actor: Actor,
    pub correlation_id: String,
    minted: bool,
}

impl RequestActor {
    pub fn is_minted_guest(&self) -> bool {
        self.minted
    }

    /// Adds the `Set-Cookie` header for a newly minted guest id.
    pub fn attach_cookie(&self, mut response: Response, guest: &GuestConfig) -> Response {
        let Actor::Guest(guest_id) = &self.actor else {
            return response;
        };
        if !self.minted {
            return response;
        }

        let cookie = format!(
            "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
            guest.cookie_name,
            guest_id.as_str(),
            guest.cookie_max_age_secs()
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(error) => warn!(
                event_name = "http.guest_cookie.invalid",
                correlation_id = %self.correlation_id,
                error = %error,
                "guest cookie could not be encoded"
            ),
        }
        response
    }
}

impl FromRequestParts<AppState> for RequestActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let correlation_id = CorrelationId::from_headers(&parts.headers).0;

        if let Some(header) = parts.headers.get(AUTHORIZATION) {
            let token = header
                .to_str()
                .ok()
                .and_then(SessionToken::from_authorization)
                .ok_or_else(|| ApiError::unauthorized("malformed bearer token", &correlation_id))?;

            let user_id = state
                .sessions
                .find_user(&token)
                .await
                .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?;
            let Some(user_id) = user_id else {
                return Err(ApiError::unauthorized("unknown or expired session", &correlation_id));
            };

            return Ok(Self { actor: Actor::User(user_id), correlation_id, minted: false });
        }

        if let Some(guest_id) = guest_from_cookies(&parts.headers, &state.guest.cookie_name) {
            return Ok(Self { actor: Actor::Guest(guest_id), correlation_id, minted: false });
        }

        Ok(Self { actor: Actor::Guest(GuestId::mint()), correlation_id, minted: true })
    }
}

/// Guest id from the named cookie. Malformed values are ignored.
pub fn guest_from_cookies(headers: &HeaderMap, cookie_name: &str) -> Option<GuestId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .and_then(|(_, value)| GuestId::new(value).ok())
}
