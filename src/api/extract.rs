use std::str::FromStr;

use actix_web::dev::Payload;
use actix_web::http::header::HeaderMap;
use actix_web::{FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use uuid::Uuid;

use super::error::ApiError;
use crate::domain::user::{Caller, Role};

// The gateway authenticates the request and forwards the identity in
// trusted headers. Role defaults to CLIENT when absent.
pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

impl FromRequest for Caller {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(caller_from_headers(req.headers()))
    }
}

fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("You must be authenticated to access this resource".to_string()))?
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("Malformed {} header", USER_ID_HEADER)))?;

    let role = match headers.get(USER_ROLE_HEADER) {
        None => Role::Client,
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|raw| Role::from_str(raw.trim()).ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("Unknown {} header value", USER_ROLE_HEADER)))?,
    };

    Ok(Caller { user_id, role })
}

/// Reject non-admin callers.
pub fn require_admin(caller: &Caller) -> Result<(), ApiError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("You do not have the required permissions".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(HeaderName::from_static(name), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_missing_user_id_is_unauthorized() {
        let result = caller_from_headers(&HeaderMap::new());
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_malformed_user_id_is_unauthorized() {
        let result = caller_from_headers(&headers(&[("x-user-id", "not-a-uuid")]));
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_role_defaults_to_client() {
        let id = Uuid::new_v4();
        let caller = caller_from_headers(&headers(&[("x-user-id", &id.to_string())])).unwrap();

        assert_eq!(caller, Caller::client(id));
    }

    #[test]
    fn test_admin_role_is_case_insensitive() {
        let id = Uuid::new_v4();
        let caller =
            caller_from_headers(&headers(&[("x-user-id", &id.to_string()), ("x-user-role", "admin")])).unwrap();

        assert!(caller.is_admin());
        assert!(require_admin(&caller).is_ok());
        assert!(matches!(require_admin(&Caller::client(id)), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn test_unknown_role_is_unauthorized() {
        let id = Uuid::new_v4();
        let result = caller_from_headers(&headers(&[("x-user-id", &id.to_string()), ("x-user-role", "ROOT")]));

        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }
}
