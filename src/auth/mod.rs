//! Staff identity for internal calls.
//!
//! intake-connect is not internet-facing. The intake app terminates staff
//! sessions itself and forwards requests with the shared `INTERNAL_SECRET`
//! plus the authenticated staff member's id. Subject identity always comes
//! from these verified headers or from a signed state payload, never from
//! decoding a token body.

use axum::http::HeaderMap;
use serde::Serialize;

use crate::error::ConnectError;
use crate::store::Subject;

/// The authenticated staff member behind a request.
#[derive(Debug, Clone, Serialize)]
pub struct StaffContext {
    pub staff_id: String,
}

impl StaffContext {
    /// The token-store subject for this staff member's own connections.
    pub fn subject(&self) -> Subject {
        Subject::Staff(self.staff_id.clone())
    }
}

/// Verify the shared-secret headers on a protected endpoint.
///
/// `x-internal-secret` must match the configured secret and `x-staff-id`
/// names the staff member the intake app authenticated.
pub fn require_staff(
    headers: &HeaderMap,
    expected_secret: &str,
) -> Result<StaffContext, ConnectError> {
    let provided = headers
        .get("x-internal-secret")
        .and_then(|v| v.to_str().ok())
        .ok_or(ConnectError::Unauthorized)?;

    if provided != expected_secret || expected_secret.is_empty() {
        return Err(ConnectError::Unauthorized);
    }

    let staff_id = headers
        .get("x-staff-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConnectError::BadRequest("x-staff-id header required".into()))?;

    Ok(StaffContext {
        staff_id: staff_id.to_string(),
    })
}
