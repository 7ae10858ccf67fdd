use crate::ocsp::certificate;
use crate::ocsp::codec::{OcspCodec, OcspResponse};
use crate::ocsp::error::{
    InvalidStapleSnafu, MissingStapleSnafu, ServerCertificateSnafu, StapleError,
};
use crate::ocsp::target::OcspTarget;
use snafu::ResultExt;

/// Checks the server-provided staple.
///
/// Returns `Ok(None)` when nothing was stapled and none was required; the caller should then
/// ask the responders. A staple that is present must decode and cover the server certificate.
pub fn parse_staple<C: OcspCodec + ?Sized>(
    codec: &C,
    target: &OcspTarget,
    staple: &[u8],
) -> Result<Option<OcspResponse>, StapleError> {
    let must_staple =
        certificate::has_must_staple(&target.server_cert).context(ServerCertificateSnafu)?;

    if staple.is_empty() {
        if must_staple {
            return MissingStapleSnafu.fail();
        }
        return Ok(None);
    }

    let response = codec
        .decode(staple, &target.server_cert, &target.issuer)
        .context(InvalidStapleSnafu)?;
    tracing::debug!(target: "ocsp_core::ocsp", status = ?response.status, "Accepted stapled OCSP response");
    Ok(Some(response))
}
