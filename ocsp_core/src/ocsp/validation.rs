use crate::ocsp::codec::{CertStatus, OcspResponse};
use crate::ocsp::error::{NotYetValidSnafu, ResponseError, RevokedSnafu, StaleSnafu};
use crate::ocsp::target::OcspTarget;
use chrono::{DateTime, Utc};

/// Checks a conclusive response against the current time and its reported status.
pub fn verify_response(target: &OcspTarget, response: &OcspResponse) -> Result<(), ResponseError> {
    verify_response_at(target, response, Utc::now())
}

pub(crate) fn verify_response_at(
    target: &OcspTarget,
    response: &OcspResponse,
    now: DateTime<Utc>,
) -> Result<(), ResponseError> {
    if response.this_update > now {
        return NotYetValidSnafu {
            this_update: response.this_update,
            now,
        }
        .fail();
    }
    if let Some(next_update) = response.next_update
        && next_update < now
    {
        return StaleSnafu { next_update, now }.fail();
    }
    if response.status == CertStatus::Revoked {
        tracing::warn!(
            target: "ocsp_core::ocsp",
            responders = ?target.responder_urls,
            revoked_at = ?response.revoked_at,
            "Server certificate reported as revoked"
        );
        return RevokedSnafu {
            revoked_at: response.revoked_at,
        }
        .fail();
    }
    Ok(())
}
