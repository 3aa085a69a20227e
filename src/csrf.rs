//! Double-submit CSRF check.
//!
//! Runs after authentication and before the route context is built. Safe
//! methods are exempt; for everything else the `csrftoken` cookie must be
//! present and match the `x-csrftoken` header.

use crate::context::RequestData;
use crate::error::ApiError;
use crate::permissions::is_safe_method;

pub(crate) const CSRF_COOKIE: &str = "csrftoken";
pub(crate) const CSRF_HEADER: &str = "x-csrftoken";

pub(crate) fn check_csrf(request: &RequestData) -> Result<(), ApiError> {
    if is_safe_method(request.method()) {
        return Ok(());
    }
    let cookie = request.cookie(CSRF_COOKIE);
    let header = request.header(CSRF_HEADER);
    match (cookie, header) {
        (Some(cookie), Some(header)) if cookie == header => Ok(()),
        _ => Err(ApiError::csrf()),
    }
}
