use crate::ocsp::certificate;
use crate::ocsp::error::{
    CertificateSnafu, ChainError, EmptyChainSnafu, IssuerNotFoundSnafu, NoVerifiedChainsSnafu,
};
use snafu::{OptionExt, ResultExt};

/// The certificate under test, the certificate that issued it, and where to ask about it.
/// Built fresh for every verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspTarget {
    pub server_cert: Vec<u8>,
    pub issuer: Vec<u8>,
    pub responder_urls: Vec<String>,
}

/// Builds the target from the first verified chain; any further chains are ignored.
pub fn resolve_target(chains: &[Vec<Vec<u8>>]) -> Result<OcspTarget, ChainError> {
    let chain = chains.first().context(NoVerifiedChainsSnafu)?;
    let server_cert = chain.first().context(EmptyChainSnafu)?;

    let issuer = if chain.len() == 1 {
        // Only a self-issued leaf can stand alone.
        if !certificate::is_issued_by(server_cert, server_cert).context(CertificateSnafu)? {
            return IssuerNotFoundSnafu.fail();
        }
        server_cert
    } else {
        let mut found = None;
        for candidate in &chain[1..] {
            if certificate::is_issued_by(server_cert, candidate).context(CertificateSnafu)? {
                found = Some(candidate);
                break;
            }
        }
        found.context(IssuerNotFoundSnafu)?
    };

    let responder_urls =
        certificate::extract_ocsp_responder_urls(server_cert).context(CertificateSnafu)?;
    Ok(OcspTarget {
        server_cert: server_cert.clone(),
        issuer: issuer.clone(),
        responder_urls,
    })
}
